//! End-to-end tests for the subscription registry over the in-memory session.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use subscription_registry::{
    Clock, Consistency, InMemorySession, RowWrite, Session, StoreError, SubscriptionStore,
    TableFilter, TableMetadata, Timestamp, Value, TABLE,
};

struct ManualClock(AtomicI64);

impl ManualClock {
    fn new(millis: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(millis)))
    }

    fn advance(&self, d: Duration) {
        self.0.fetch_add(d.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.0.load(Ordering::SeqCst))
    }
}

/// Modern provisioning: role-named columns.
fn modern_table() -> TableMetadata {
    TableMetadata {
        name: TABLE.to_string(),
        primary_key: vec!["rowkey".to_string(), "name".to_string()],
        columns: vec![
            "rowkey".to_string(),
            "name".to_string(),
            "subscription".to_string(),
        ],
    }
}

/// Legacy provisioning: generic CQL names from thrift-era tooling.
fn legacy_table() -> TableMetadata {
    TableMetadata {
        name: TABLE.to_string(),
        primary_key: vec!["key".to_string(), "column1".to_string()],
        columns: vec![
            "key".to_string(),
            "column1".to_string(),
            "value".to_string(),
        ],
    }
}

fn store_over(
    table: TableMetadata,
    clock: Arc<ManualClock>,
) -> SubscriptionStore<InMemorySession, String> {
    let session = InMemorySession::new(clock.clone());
    session.create_table(table);
    SubscriptionStore::with_clock(session, clock)
}

/// Write a raw payload row directly, bypassing the store, as a foreign or
/// older writer would have.
fn write_raw(session: &InMemorySession, table: &TableMetadata, name: &str, payload: &str) {
    session
        .write(RowWrite {
            table: TABLE,
            columns: vec![
                (table.primary_key[0].as_str(), Value::text("subscriptions")),
                (table.primary_key[1].as_str(), Value::text(name)),
                (table.columns[2].as_str(), Value::text(payload)),
            ],
            ttl_seconds: None,
            consistency: Consistency::LocalQuorum,
        })
        .unwrap();
}

// --- Registration lifecycle ---

#[test]
fn register_lookup_expire_scenario() {
    let clock = ManualClock::new(1_000_000);
    let store = store_over(modern_table(), clock.clone());

    store
        .insert(
            Some("alice"),
            "svc-1",
            "intrinsic(\"type\")=\"foo\"".to_string(),
            Duration::from_secs(30),
            Duration::from_secs(10),
        )
        .unwrap();

    let sub = store.get("svc-1").unwrap().expect("just registered");
    assert_eq!(sub.owner_id.as_deref(), Some("alice"));
    assert_eq!(sub.table_filter, "intrinsic(\"type\")=\"foo\"");
    assert_eq!(sub.event_ttl, Duration::from_secs(10));
    assert_eq!(sub.expires_at, Timestamp(1_000_000 + 30_000));

    // The store's TTL removes the row with no explicit delete.
    clock.advance(Duration::from_secs(31));
    assert!(store.get("svc-1").unwrap().is_none());
}

#[test]
fn lifetime_below_range_clamps_to_one_second() {
    let clock = ManualClock::new(0);
    let store = store_over(modern_table(), clock.clone());
    store
        .insert(None, "blink", "f()".to_string(), Duration::ZERO, Duration::ZERO)
        .unwrap();

    clock.advance(Duration::from_millis(500));
    assert!(store.get("blink").unwrap().is_some());
    clock.advance(Duration::from_millis(600));
    assert!(store.get("blink").unwrap().is_none());
}

#[test]
fn lifetime_above_range_clamps_to_one_year() {
    let clock = ManualClock::new(0);
    let store = store_over(modern_table(), clock.clone());
    let thousand_days = Duration::from_secs(1000 * 24 * 60 * 60);
    store
        .insert(None, "durable", "f()".to_string(), thousand_days, thousand_days)
        .unwrap();

    clock.advance(Duration::from_secs(364 * 24 * 60 * 60));
    let sub = store.get("durable").unwrap().expect("within clamped ttl");
    assert_eq!(sub.event_ttl, Duration::from_secs(365 * 24 * 60 * 60));
    // The expiry hint reflects the requested lifetime even though the row
    // TTL was clamped.
    assert_eq!(sub.expires_at, Timestamp(thousand_days.as_millis() as i64));

    clock.advance(Duration::from_secs(2 * 24 * 60 * 60));
    assert!(store.get("durable").unwrap().is_none());
}

#[test]
fn reinsert_overwrites_and_resets_ttl() {
    let clock = ManualClock::new(0);
    let store = store_over(modern_table(), clock.clone());
    store
        .insert(
            Some("alice"),
            "sub",
            "old()".to_string(),
            Duration::from_secs(60),
            Duration::from_secs(60),
        )
        .unwrap();

    clock.advance(Duration::from_secs(45));
    store
        .insert(
            Some("bob"),
            "sub",
            "new()".to_string(),
            Duration::from_secs(60),
            Duration::from_secs(60),
        )
        .unwrap();

    // 75s after the first write; alive because the overwrite reset the clock.
    clock.advance(Duration::from_secs(30));
    let sub = store.get("sub").unwrap().expect("ttl was reset");
    assert_eq!(sub.table_filter, "new()");
    assert_eq!(sub.owner_id.as_deref(), Some("bob"));
}

#[test]
fn delete_is_idempotent_and_final() {
    let store = store_over(modern_table(), ManualClock::new(0));
    store.delete("never-existed").unwrap();

    store
        .insert(
            None,
            "gone",
            "f()".to_string(),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        )
        .unwrap();
    store.delete("gone").unwrap();
    store.delete("gone").unwrap();
    assert!(store.get("gone").unwrap().is_none());
}

// --- Enumeration ---

#[test]
fn names_match_gettable_records_after_churn() {
    let clock = ManualClock::new(0);
    let store = store_over(modern_table(), clock.clone());
    let hour = Duration::from_secs(3600);

    for i in 0..20 {
        store
            .insert(None, &format!("sub-{i:02}"), "f()".to_string(), hour, hour)
            .unwrap();
    }
    for i in (0..20).step_by(3) {
        store.delete(&format!("sub-{i:02}")).unwrap();
    }
    // One record expires on its own.
    store
        .insert(None, "ephemeral", "f()".to_string(), Duration::from_secs(5), hour)
        .unwrap();
    clock.advance(Duration::from_secs(10));

    let names: BTreeSet<String> = store
        .list_all_names()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    for i in 0..20 {
        let name = format!("sub-{i:02}");
        assert_eq!(names.contains(&name), store.get(&name).unwrap().is_some());
    }
    assert!(!names.contains("ephemeral"));

    let listed: BTreeSet<String> = store
        .list_all()
        .unwrap()
        .map(|sub| sub.map(|s| s.name))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(listed, names);
}

#[test]
fn enumeration_is_restartable_and_abandonable() {
    let store = store_over(modern_table(), ManualClock::new(0));
    let hour = Duration::from_secs(3600);
    for i in 0..10 {
        store
            .insert(None, &format!("sub-{i}"), "f()".to_string(), hour, hour)
            .unwrap();
    }

    // Abandon a scan partway through, then start over.
    let mut partial = store.list_all().unwrap();
    assert!(partial.next().is_some());
    assert!(partial.next().is_some());
    drop(partial);

    assert_eq!(store.list_all().unwrap().count(), 10);
}

// --- Compatibility and corruption ---

#[test]
fn legacy_record_without_owner_decodes() {
    let clock = ManualClock::new(0);
    let table = modern_table();
    let session = InMemorySession::new(clock.clone());
    session.create_table(table.clone());
    write_raw(
        &session,
        &table,
        "pre-owner",
        r#"{"filter":"alwaysTrue()","expiresAt":9000000000000,"eventTtl":86400}"#,
    );

    let store: SubscriptionStore<_, String> = SubscriptionStore::with_clock(session, clock);
    let sub = store.get("pre-owner").unwrap().expect("legacy row");
    assert_eq!(sub.owner_id, None);
    assert_eq!(sub.table_filter, "alwaysTrue()");
}

#[test]
fn corrupt_payload_surfaces_without_hiding_other_rows() {
    let clock = ManualClock::new(0);
    let table = modern_table();
    let session = InMemorySession::new(clock.clone());
    session.create_table(table.clone());
    write_raw(&session, &table, "broken", r#"{"expiresAt":1000}"#);

    let store: SubscriptionStore<_, String> = SubscriptionStore::with_clock(session, clock);
    let hour = Duration::from_secs(3600);
    store.insert(None, "alpha", "f()".to_string(), hour, hour).unwrap();
    store.insert(None, "zulu", "f()".to_string(), hour, hour).unwrap();

    assert!(matches!(
        store.get("broken"),
        Err(StoreError::MissingField("filter"))
    ));

    let mut ok = Vec::new();
    let mut failed = 0;
    for item in store.list_all().unwrap() {
        match item {
            Ok(sub) => ok.push(sub.name),
            Err(StoreError::MissingField(_)) => failed += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(ok, vec!["alpha".to_string(), "zulu".to_string()]);
    assert_eq!(failed, 1);
}

// --- Schema drift ---

#[test]
fn legacy_column_names_resolve_and_operate() {
    let clock = ManualClock::new(0);
    let store = store_over(legacy_table(), clock.clone());
    let hour = Duration::from_secs(3600);
    store
        .insert(Some("alice"), "drifted", "f()".to_string(), hour, hour)
        .unwrap();

    let sub = store.get("drifted").unwrap().expect("stored under legacy columns");
    assert_eq!(sub.owner_id.as_deref(), Some("alice"));
    let names: Vec<_> = store
        .list_all_names()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(names, vec!["drifted".to_string()]);

    store.delete("drifted").unwrap();
    assert!(store.get("drifted").unwrap().is_none());
}

#[test]
fn missing_table_is_a_fatal_schema_error() {
    let clock = ManualClock::new(0);
    let session = InMemorySession::new(clock.clone());
    let store: SubscriptionStore<_, String> = SubscriptionStore::with_clock(session, clock);
    assert!(matches!(
        store.get("anything"),
        Err(StoreError::SchemaResolution(_))
    ));
}

// --- Filter-language boundary ---

/// Tiny structured filter standing in for the real predicate language.
#[derive(Clone, Debug, PartialEq)]
struct IntrinsicFilter {
    key: String,
    value: String,
}

impl TableFilter for IntrinsicFilter {
    fn parse(input: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let rest = input
            .strip_prefix("intrinsic(\"")
            .ok_or_else(|| format!("unparseable filter: {input}"))?;
        let (key, rest) = rest
            .split_once("\")=\"")
            .ok_or_else(|| format!("unparseable filter: {input}"))?;
        let value = rest
            .strip_suffix('"')
            .ok_or_else(|| format!("unparseable filter: {input}"))?;
        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    fn canonical(&self) -> String {
        format!("intrinsic(\"{}\")=\"{}\"", self.key, self.value)
    }
}

#[test]
fn structured_filter_round_trips_to_equivalent_predicate() {
    let clock = ManualClock::new(0);
    let session = InMemorySession::new(clock.clone());
    session.create_table(modern_table());
    let store: SubscriptionStore<_, IntrinsicFilter> =
        SubscriptionStore::with_clock(session, clock);

    let filter = IntrinsicFilter {
        key: "type".to_string(),
        value: "foo".to_string(),
    };
    store
        .insert(
            Some("alice"),
            "svc-1",
            filter.clone(),
            Duration::from_secs(30),
            Duration::from_secs(10),
        )
        .unwrap();

    let sub = store.get("svc-1").unwrap().unwrap();
    assert_eq!(sub.table_filter, filter);
}

#[test]
fn filter_parse_failures_propagate_unchanged() {
    let clock = ManualClock::new(0);
    let table = modern_table();
    let session = InMemorySession::new(clock.clone());
    session.create_table(table.clone());
    write_raw(
        &session,
        &table,
        "mangled",
        r#"{"filter":"not a predicate","expiresAt":9000000000000,"eventTtl":60}"#,
    );

    let store: SubscriptionStore<_, IntrinsicFilter> =
        SubscriptionStore::with_clock(session, clock);
    match store.get("mangled") {
        Err(StoreError::FilterParse(source)) => {
            assert_eq!(source.to_string(), "unparseable filter: not a predicate");
        }
        other => panic!("expected FilterParse, got {other:?}"),
    }
}
