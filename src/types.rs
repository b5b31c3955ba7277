//! Core types for the subscription registry.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_millis() as i64)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// This timestamp shifted forward by `d` (saturating).
    pub fn plus(&self, d: Duration) -> Self {
        Timestamp(self.0.saturating_add(d.as_millis() as i64))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of the current time.
///
/// Injected rather than read from the system so that TTL behavior is
/// deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock implementation used in production.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Minimum store-level TTL: one second.
pub const MIN_TTL: Duration = Duration::from_secs(1);

/// Maximum store-level TTL: 365 days. Could change in the future.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Clamp a requested lifetime into the store's supported TTL range,
/// in whole seconds. Out-of-range values clamp rather than error.
pub fn clamp_ttl_seconds(ttl: Duration) -> u32 {
    ttl.clamp(MIN_TTL, MAX_TTL).as_secs() as u32
}

/// Boundary to the external filter language.
///
/// The registry stores predicates only in their canonical string form; parsing
/// and printing belong to the filter-language collaborator. Implementations
/// must round-trip: `parse(canonical(f))` yields an equivalent predicate.
pub trait TableFilter: Sized {
    /// Parse the canonical string form. Failures are propagated to callers
    /// unchanged as [`StoreError::FilterParse`](crate::StoreError::FilterParse).
    fn parse(input: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>>;

    /// Canonical string serialization of this predicate.
    fn canonical(&self) -> String;
}

/// Opaque pass-through for callers that never evaluate filters locally.
impl TableFilter for String {
    fn parse(input: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(input.to_string())
    }

    fn canonical(&self) -> String {
        self.clone()
    }
}

/// A named, owned registration of interest in events matching a predicate,
/// with a bounded lifetime.
///
/// The row TTL applied at write time is the authoritative expiration
/// mechanism; `expires_at` is bookkeeping for callers.
#[derive(Clone, Debug)]
pub struct Subscription<F> {
    /// Unique name within the registry. Immutable once created; re-inserting
    /// the same name overwrites the prior record.
    pub name: String,

    /// Predicate selecting the events this subscription is interested in.
    pub table_filter: F,

    /// Absolute expiry hint, computed at insert time as now + lifetime.
    pub expires_at: Timestamp,

    /// Retention for events attributed to this subscription,
    /// clamped to [1s, 365d].
    pub event_ttl: Duration,

    /// Owning principal. Optional for records written before owner tracking.
    // TODO: enforce non-null once every registration path supplies an owner.
    pub owner_id: Option<String>,
}
