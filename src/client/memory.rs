//! In-process wide-column session.
//!
//! Faithful enough for tests and embedding: per-write TTL expiry driven by an
//! injected [`Clock`], clustering-ordered paged scans with resumable page
//! state, and last-write-wins upserts. Consistency levels are accepted and
//! ignored since there is a single replica.

use super::{
    ClientError, ClientResult, Page, PageState, PartitionScan, Row, RowDelete, RowRead, RowWrite,
    Session, TableMetadata, Value,
};
use crate::types::{Clock, Timestamp};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Primary key of one stored row: partition key value, then clustering key
/// values in declared order. Ordered so scans iterate in clustering order.
type RowKey = (String, Vec<String>);

struct StoredRow {
    columns: HashMap<String, Value>,
    /// Store-native expiry; `None` for permanent rows.
    expires_at: Option<Timestamp>,
}

struct Table {
    metadata: TableMetadata,
    rows: BTreeMap<RowKey, StoredRow>,
}

/// In-memory [`Session`] implementation.
pub struct InMemorySession {
    clock: Arc<dyn Clock>,
    tables: RwLock<HashMap<String, Table>>,
    /// Error returned by the next operation, for transient-failure tests.
    fault: RwLock<Option<ClientError>>,
}

impl InMemorySession {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tables: RwLock::new(HashMap::new()),
            fault: RwLock::new(None),
        }
    }

    /// Declare a table. Replaces any existing table of the same name.
    pub fn create_table(&self, metadata: TableMetadata) {
        let mut tables = self.tables.write();
        tables.insert(
            metadata.name.clone(),
            Table {
                metadata,
                rows: BTreeMap::new(),
            },
        );
    }

    /// Make the next session operation fail with `err`.
    pub fn inject_fault(&self, err: ClientError) {
        *self.fault.write() = Some(err);
    }

    fn take_fault(&self) -> ClientResult<()> {
        match self.fault.write().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn is_live(&self, row: &StoredRow) -> bool {
        match row.expires_at {
            Some(expires_at) => self.clock.now() < expires_at,
            None => true,
        }
    }

    /// Assemble the row key from equality constraints, in primary-key order.
    fn key_from_constraints(
        metadata: &TableMetadata,
        constraints: &[(&str, Value)],
    ) -> ClientResult<RowKey> {
        let mut key_values = Vec::with_capacity(metadata.primary_key.len());
        for pk_column in &metadata.primary_key {
            let value = constraints
                .iter()
                .find(|(name, _)| name == pk_column)
                .map(|(_, value)| value)
                .ok_or_else(|| {
                    ClientError::InvalidRequest(format!(
                        "missing primary key column '{pk_column}' for table '{}'",
                        metadata.name
                    ))
                })?;
            match value {
                Value::Text(s) => key_values.push(s.clone()),
                Value::Null => {
                    return Err(ClientError::InvalidRequest(format!(
                        "null primary key column '{pk_column}'"
                    )))
                }
            }
        }
        let partition = key_values.remove(0);
        Ok((partition, key_values))
    }

    fn project(row: &StoredRow, select: &[&str]) -> Row {
        let values = select
            .iter()
            .map(|column| row.columns.get(*column).cloned().unwrap_or(Value::Null))
            .collect();
        Row { values }
    }
}

impl Session for InMemorySession {
    fn table_metadata(&self, table: &str) -> ClientResult<Option<TableMetadata>> {
        self.take_fault()?;
        let tables = self.tables.read();
        Ok(tables.get(table).map(|t| t.metadata.clone()))
    }

    fn write(&self, write: RowWrite<'_>) -> ClientResult<()> {
        self.take_fault()?;
        let now = self.clock.now();
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(write.table)
            .ok_or_else(|| ClientError::InvalidRequest(format!("no such table: {}", write.table)))?;
        let key = Self::key_from_constraints(&table.metadata, &write.columns)?;

        let mut columns = HashMap::with_capacity(write.columns.len());
        for (name, value) in write.columns {
            columns.insert(name.to_string(), value);
        }
        let expires_at = write
            .ttl_seconds
            .map(|ttl| now.plus(std::time::Duration::from_secs(u64::from(ttl))));

        // Housekeeping: drop rows the store would have compacted away.
        table.rows.retain(|_, row| match row.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        });
        table.rows.insert(key, StoredRow { columns, expires_at });
        Ok(())
    }

    fn delete(&self, delete: RowDelete<'_>) -> ClientResult<()> {
        self.take_fault()?;
        let mut tables = self.tables.write();
        let table = tables.get_mut(delete.table).ok_or_else(|| {
            ClientError::InvalidRequest(format!("no such table: {}", delete.table))
        })?;
        let key = Self::key_from_constraints(&table.metadata, &delete.key)?;
        table.rows.remove(&key);
        Ok(())
    }

    fn read_one(&self, read: RowRead<'_>) -> ClientResult<Option<Row>> {
        self.take_fault()?;
        let tables = self.tables.read();
        let table = tables
            .get(read.table)
            .ok_or_else(|| ClientError::InvalidRequest(format!("no such table: {}", read.table)))?;
        let key = Self::key_from_constraints(&table.metadata, &read.key)?;
        let row = table
            .rows
            .get(&key)
            .filter(|row| self.is_live(row))
            .map(|row| Self::project(row, &read.select));
        Ok(row)
    }

    fn scan(&self, scan: PartitionScan<'_>, state: Option<PageState>) -> ClientResult<Page> {
        self.take_fault()?;
        if scan.fetch_size == 0 {
            return Err(ClientError::InvalidRequest("fetch_size must be > 0".into()));
        }
        let partition = match &scan.partition.1 {
            Value::Text(s) => s.clone(),
            Value::Null => {
                return Err(ClientError::InvalidRequest("null partition key".into()));
            }
        };
        let resume_after: Option<Vec<String>> = match state {
            Some(PageState(bytes)) => Some(
                serde_json::from_slice(&bytes)
                    .map_err(|e| ClientError::InvalidRequest(format!("bad page state: {e}")))?,
            ),
            None => None,
        };

        let tables = self.tables.read();
        let table = tables
            .get(scan.table)
            .ok_or_else(|| ClientError::InvalidRequest(format!("no such table: {}", scan.table)))?;

        let mut rows = Vec::with_capacity(scan.fetch_size);
        let mut last_key: Option<&Vec<String>> = None;
        let mut more = false;
        for ((row_partition, clustering), row) in &table.rows {
            if *row_partition != partition || !self.is_live(row) {
                continue;
            }
            if let Some(after) = &resume_after {
                if clustering <= after {
                    continue;
                }
            }
            if rows.len() == scan.fetch_size {
                more = true;
                break;
            }
            rows.push(Self::project(row, &scan.select));
            last_key = Some(clustering);
        }

        let next = match (more, last_key) {
            (true, Some(clustering)) => {
                let bytes = serde_json::to_vec(clustering)
                    .map_err(|e| ClientError::InvalidRequest(format!("bad page state: {e}")))?;
                Some(PageState(bytes))
            }
            _ => None,
        };
        Ok(Page { rows, next })
    }
}
