//! # Subscription Registry
//!
//! A durable registry of named, owned, time-limited subscriptions, backing a
//! publish/subscribe dispatch layer. Records are packed into a single
//! partition of a wide-column store; expiration is delegated to the store's
//! native per-write TTL; column identifiers are resolved at runtime from live
//! table metadata so the registry tolerates schema drift between cluster
//! generations.
//!
//! ## Core Concepts
//!
//! - **Subscription**: name, filter predicate, lifetime, event retention,
//!   optional owner
//! - **Single partition**: every record lives under one constant partition key
//! - **Store-native TTL**: the row's write-time TTL is the sole expiration
//!   mechanism; there is no application-level expiry pass
//! - **Schema binding**: column names are discovered once per process from
//!   table metadata, by structural position
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use subscription_registry::{
//!     InMemorySession, SubscriptionStore, SystemClock, TableMetadata,
//! };
//!
//! let session = InMemorySession::new(Arc::new(SystemClock));
//! session.create_table(TableMetadata {
//!     name: "subscription".to_string(),
//!     primary_key: vec!["rowkey".into(), "name".into()],
//!     columns: vec!["rowkey".into(), "name".into(), "subscription".into()],
//! });
//!
//! let store: SubscriptionStore<_, String> = SubscriptionStore::new(session);
//! store.insert(
//!     Some("alice"),
//!     "svc-1",
//!     "intrinsic(\"type\")=\"foo\"".to_string(),
//!     Duration::from_secs(30),
//!     Duration::from_secs(10),
//! )?;
//!
//! let subscription = store.get("svc-1")?.expect("just inserted");
//! assert_eq!(subscription.owner_id.as_deref(), Some("alice"));
//! # Ok::<(), subscription_registry::StoreError>(())
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod schema;
pub mod store;
pub mod types;

// Re-exports
pub use client::{
    ClientError, Consistency, InMemorySession, Page, PageState, PartitionScan, Row, RowDelete,
    RowRead, RowWrite, Session, TableMetadata, Value,
};
pub use error::{Result, StoreError};
pub use schema::{SchemaBinding, SchemaColumns, TABLE};
pub use store::{SubscriptionNames, SubscriptionStore, Subscriptions};
pub use types::{
    clamp_ttl_seconds, Clock, Subscription, SystemClock, TableFilter, Timestamp, MAX_TTL, MIN_TTL,
};
