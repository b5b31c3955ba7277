//! The subscription store: public registry operations over one table.
//!
//! Every record lives under a single constant partition key, so enumeration
//! is one partition scan and the store's replication protocol serializes all
//! writes at the partition level. Row expiration is delegated entirely to the
//! store-native per-write TTL; this component runs no expiry pass of its own.

use crate::client::{
    Consistency, PageState, PartitionScan, Row, RowDelete, RowRead, RowWrite, Session, Value,
};
use crate::codec;
use crate::error::Result;
use crate::schema::{SchemaBinding, TABLE};
use crate::types::{clamp_ttl_seconds, Clock, Subscription, SystemClock, TableFilter};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// All subscriptions are stored as rows of a single partition.
const ROW_KEY: &str = "subscriptions";

/// Page size when full records are read.
const SUBSCRIPTION_FETCH_SIZE: usize = 200;

/// Page size for the names-only scan; larger since the payload is not read.
const NAME_FETCH_SIZE: usize = 5000;

/// Registration is low-frequency, so every operation trades latency for
/// read-your-writes consistency.
const CONSISTENCY: Consistency = Consistency::LocalQuorum;

/// Durable registry of [`Subscription`] records.
///
/// `S` is the wide-column session; `F` is the filter-language representation
/// (see [`TableFilter`]).
pub struct SubscriptionStore<S, F = String> {
    session: S,
    clock: Arc<dyn Clock>,
    schema: SchemaBinding,
    _filter: PhantomData<F>,
}

impl<S: Session, F: TableFilter> SubscriptionStore<S, F> {
    /// Create a store over `session` using the system clock.
    pub fn new(session: S) -> Self {
        Self::with_clock(session, Arc::new(SystemClock))
    }

    /// Create a store over `session` with an explicit clock.
    pub fn with_clock(session: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            session,
            clock,
            schema: SchemaBinding::new(),
            _filter: PhantomData,
        }
    }

    /// Register (or replace) the subscription named `name`.
    ///
    /// The row is written with a store-native TTL equal to the clamped
    /// lifetime; re-inserting an existing name overwrites the record and
    /// resets its TTL clock. Both `subscription_ttl` and `event_ttl` are
    /// clamped to [1s, 365d], never rejected.
    pub fn insert(
        &self,
        owner_id: Option<&str>,
        name: &str,
        table_filter: F,
        subscription_ttl: Duration,
        event_ttl: Duration,
    ) -> Result<()> {
        let ttl = clamp_ttl_seconds(subscription_ttl);
        let subscription = Subscription {
            name: name.to_string(),
            table_filter,
            expires_at: self.clock.now().plus(subscription_ttl),
            event_ttl: Duration::from_secs(u64::from(clamp_ttl_seconds(event_ttl))),
            owner_id: owner_id.map(str::to_string),
        };
        let payload = codec::encode(&subscription)?;

        let columns = self.schema.get(&self.session)?;
        self.session.write(RowWrite {
            table: TABLE,
            columns: vec![
                (columns.partition_key.as_str(), Value::text(ROW_KEY)),
                (columns.subscription_name.as_str(), Value::text(name)),
                (columns.payload.as_str(), Value::Text(payload)),
            ],
            ttl_seconds: Some(ttl),
            consistency: CONSISTENCY,
        })?;
        debug!(name, ttl_seconds = ttl, "inserted subscription");
        Ok(())
    }

    /// Remove the subscription named `name`. Idempotent: succeeds whether or
    /// not the record exists.
    pub fn delete(&self, name: &str) -> Result<()> {
        let columns = self.schema.get(&self.session)?;
        self.session.delete(RowDelete {
            table: TABLE,
            key: vec![
                (columns.partition_key.as_str(), Value::text(ROW_KEY)),
                (columns.subscription_name.as_str(), Value::text(name)),
            ],
            consistency: CONSISTENCY,
        })?;
        debug!(name, "deleted subscription");
        Ok(())
    }

    /// Look up one subscription by name.
    ///
    /// Absence is a normal outcome (`Ok(None)`), not an error: rows vanish on
    /// their own once their TTL elapses.
    pub fn get(&self, name: &str) -> Result<Option<Subscription<F>>> {
        let columns = self.schema.get(&self.session)?;
        let row = self.session.read_one(RowRead {
            table: TABLE,
            select: vec![columns.subscription_name.as_str(), columns.payload.as_str()],
            key: vec![
                (columns.partition_key.as_str(), Value::text(ROW_KEY)),
                (columns.subscription_name.as_str(), Value::text(name)),
            ],
            consistency: CONSISTENCY,
        })?;
        row.map(|row| decode_row::<F>(&row)).transpose()
    }

    /// All current subscriptions, decoded lazily as the iterator is consumed.
    ///
    /// Rows are fetched in pages of 200; each call starts a fresh scan, and
    /// the iterator may be abandoned at any point.
    pub fn list_all(&self) -> Result<Subscriptions<'_, S, F>> {
        let columns = self.schema.get(&self.session)?;
        Ok(Subscriptions {
            pages: PagedRows::new(
                &self.session,
                vec![columns.subscription_name.clone(), columns.payload.clone()],
                columns.partition_key.clone(),
                SUBSCRIPTION_FETCH_SIZE,
            ),
            _filter: PhantomData,
        })
    }

    /// Names of all current subscriptions, without reading payloads.
    ///
    /// The cheap enumeration path for existence/membership scans; pages of
    /// 5000 rows.
    pub fn list_all_names(&self) -> Result<SubscriptionNames<'_, S>> {
        let columns = self.schema.get(&self.session)?;
        Ok(SubscriptionNames {
            pages: PagedRows::new(
                &self.session,
                vec![columns.subscription_name.clone()],
                columns.partition_key.clone(),
                NAME_FETCH_SIZE,
            ),
        })
    }
}

fn decode_row<F: TableFilter>(row: &Row) -> Result<Subscription<F>> {
    let name = row
        .text(0)
        .ok_or_else(|| crate::StoreError::Deserialization("null subscription name".into()))?;
    let payload = row.text(1).ok_or_else(|| {
        crate::StoreError::Deserialization(format!("null payload for subscription '{name}'"))
    })?;
    codec::decode(name, payload)
}

/// Pull-based pager over every row of the subscription partition.
struct PagedRows<'a, S: ?Sized> {
    session: &'a S,
    select: Vec<String>,
    partition_key: String,
    fetch_size: usize,
    rows: std::vec::IntoIter<Row>,
    state: Option<PageState>,
    started: bool,
    done: bool,
}

impl<'a, S: Session + ?Sized> PagedRows<'a, S> {
    fn new(session: &'a S, select: Vec<String>, partition_key: String, fetch_size: usize) -> Self {
        Self {
            session,
            select,
            partition_key,
            fetch_size,
            rows: Vec::new().into_iter(),
            state: None,
            started: false,
            done: false,
        }
    }
}

impl<S: Session + ?Sized> Iterator for PagedRows<'_, S> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.rows.next() {
                return Some(Ok(row));
            }
            if self.done || (self.started && self.state.is_none()) {
                return None;
            }
            let scan = PartitionScan {
                table: TABLE,
                select: self.select.iter().map(String::as_str).collect(),
                partition: (self.partition_key.as_str(), Value::text(ROW_KEY)),
                fetch_size: self.fetch_size,
                consistency: CONSISTENCY,
            };
            match self.session.scan(scan, self.state.take()) {
                Ok(page) => {
                    self.started = true;
                    self.rows = page.rows.into_iter();
                    self.state = page.next;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

/// Lazy iterator over all subscriptions. See [`SubscriptionStore::list_all`].
pub struct Subscriptions<'a, S: ?Sized, F> {
    pages: PagedRows<'a, S>,
    _filter: PhantomData<F>,
}

impl<S: Session + ?Sized, F: TableFilter> Iterator for Subscriptions<'_, S, F> {
    type Item = Result<Subscription<F>>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.pages.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e)),
        };
        Some(decode_row(&row))
    }
}

/// Lazy iterator over subscription names. See
/// [`SubscriptionStore::list_all_names`].
pub struct SubscriptionNames<'a, S: ?Sized> {
    pages: PagedRows<'a, S>,
}

impl<S: Session + ?Sized> Iterator for SubscriptionNames<'_, S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.pages.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e)),
        };
        match row.text(0) {
            Some(name) => Some(Ok(name.to_string())),
            None => Some(Err(crate::StoreError::Deserialization(
                "null subscription name".into(),
            ))),
        }
    }
}
