//! Wide-column store client seam.
//!
//! The registry talks to its backing store exclusively through [`Session`], a
//! minimal cut of a wide-column client: metadata inspection, keyed writes with
//! a per-write TTL, keyed deletes, point reads, and paged partition scans.
//! Connection management, topology, and retry/backoff live behind this trait.

mod memory;

pub use memory::InMemorySession;

use std::time::Duration;
use thiserror::Error;

/// Transient store-client failure, propagated to callers unchanged.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Request the store cannot execute (unknown table, malformed key).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for session operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Consistency level for a single request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Consistency {
    /// Single-replica acknowledgment.
    One,
    /// Majority of replicas within the local rack/zone.
    LocalQuorum,
    /// Majority of all replicas.
    Quorum,
}

/// Declared shape of a live table.
///
/// `columns` lists every column in declared order, primary-key columns first;
/// `primary_key` lists the key columns in key order (partition key, then
/// clustering keys).
#[derive(Clone, Debug)]
pub struct TableMetadata {
    pub name: String,
    pub primary_key: Vec<String>,
    pub columns: Vec<String>,
}

/// A single cell value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Null,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Null => None,
        }
    }
}

/// One result row; values are positional, matching the requested columns.
#[derive(Clone, Debug)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    /// Text value at position `idx`, if present and non-null.
    pub fn text(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(Value::as_text)
    }
}

/// Opaque resumption token for a paged scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageState(pub Vec<u8>);

/// One page of scan results.
#[derive(Clone, Debug)]
pub struct Page {
    pub rows: Vec<Row>,
    /// Token for the next page; `None` when the scan is exhausted.
    pub next: Option<PageState>,
}

/// An upsert of one row, with an optional store-native TTL applied to the
/// write itself.
#[derive(Clone, Debug)]
pub struct RowWrite<'a> {
    pub table: &'a str,
    /// Column/value pairs; must include every primary-key column.
    pub columns: Vec<(&'a str, Value)>,
    /// Row lifetime in seconds; the store physically removes the row once it
    /// elapses. `None` writes a permanent row.
    pub ttl_seconds: Option<u32>,
    pub consistency: Consistency,
}

/// A keyed row deletion.
#[derive(Clone, Debug)]
pub struct RowDelete<'a> {
    pub table: &'a str,
    /// Equality constraints on every primary-key column.
    pub key: Vec<(&'a str, Value)>,
    pub consistency: Consistency,
}

/// A keyed point read.
#[derive(Clone, Debug)]
pub struct RowRead<'a> {
    pub table: &'a str,
    /// Columns to return, in order.
    pub select: Vec<&'a str>,
    /// Equality constraints on every primary-key column.
    pub key: Vec<(&'a str, Value)>,
    pub consistency: Consistency,
}

/// A scan over every row of one partition, fetched in pages of `fetch_size`.
#[derive(Clone, Debug)]
pub struct PartitionScan<'a> {
    pub table: &'a str,
    /// Columns to return, in order.
    pub select: Vec<&'a str>,
    /// Equality constraint on the partition-key column.
    pub partition: (&'a str, Value),
    pub fetch_size: usize,
    pub consistency: Consistency,
}

/// Wide-column store session.
///
/// Implementations must return rows in clustering-key order from [`scan`]
/// and must treat TTL-expired rows as absent everywhere.
///
/// [`scan`]: Session::scan
pub trait Session: Send + Sync {
    /// Declared metadata for `table`, or `None` if the table does not exist.
    fn table_metadata(&self, table: &str) -> ClientResult<Option<TableMetadata>>;

    /// Upsert one row. Overwrites any prior row with the same key, resetting
    /// its TTL clock.
    fn write(&self, write: RowWrite<'_>) -> ClientResult<()>;

    /// Delete one row by key. Succeeds whether or not the row exists.
    fn delete(&self, delete: RowDelete<'_>) -> ClientResult<()>;

    /// Point read of one row by key.
    fn read_one(&self, read: RowRead<'_>) -> ClientResult<Option<Row>>;

    /// Fetch one page of a partition scan. Pass the previous page's
    /// [`PageState`] to resume; `None` starts from the beginning.
    fn scan(&self, scan: PartitionScan<'_>, state: Option<PageState>) -> ClientResult<Page>;
}
