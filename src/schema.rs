//! One-time schema binding for the subscription table.
//!
//! Historically the subscription table was provisioned by different tooling
//! across cluster generations, so the CQL-level column names for logically
//! identical roles are not guaranteed to match. Rather than assume names at
//! compile time, the live table metadata is inspected once and the column
//! identifiers are extracted by structural position.

use crate::client::Session;
use crate::error::{Result, StoreError};
use std::sync::OnceLock;

/// Name of the backing table.
pub const TABLE: &str = "subscription";

/// Resolved column identifiers for the subscription table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaColumns {
    /// Partition-key column; every row carries the same constant value.
    pub partition_key: String,
    /// Clustering-key column holding the subscription name.
    pub subscription_name: String,
    /// Column holding the encoded record payload.
    pub payload: String,
}

/// Lazily resolved, process-lifetime cache of [`SchemaColumns`].
///
/// Concurrent first calls may each query the table metadata, but the table
/// shape is immutable by the time the store is in use, so every resolution
/// yields the same identifiers; the first to finish publishes all three
/// atomically and the rest are discarded. Never invalidated.
#[derive(Default)]
pub struct SchemaBinding {
    columns: OnceLock<SchemaColumns>,
}

impl SchemaBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// The resolved columns, querying table metadata on first use.
    pub fn get<S: Session + ?Sized>(&self, session: &S) -> Result<&SchemaColumns> {
        if let Some(columns) = self.columns.get() {
            return Ok(columns);
        }
        let resolved = Self::resolve(session)?;
        Ok(self.columns.get_or_init(|| resolved))
    }

    fn resolve<S: Session + ?Sized>(session: &S) -> Result<SchemaColumns> {
        let metadata = session
            .table_metadata(TABLE)?
            .ok_or_else(|| StoreError::SchemaResolution(format!("table '{TABLE}' not found")))?;

        if metadata.primary_key.len() < 2 {
            return Err(StoreError::SchemaResolution(format!(
                "table '{TABLE}' declares {} primary key column(s), expected 2",
                metadata.primary_key.len()
            )));
        }
        // Payload sits at a fixed ordinal past the two key columns.
        if metadata.columns.len() < 3 {
            return Err(StoreError::SchemaResolution(format!(
                "table '{TABLE}' declares {} column(s), expected at least 3",
                metadata.columns.len()
            )));
        }

        let columns = SchemaColumns {
            partition_key: metadata.primary_key[0].clone(),
            subscription_name: metadata.primary_key[1].clone(),
            payload: metadata.columns[2].clone(),
        };
        tracing::debug!(
            partition_key = %columns.partition_key,
            subscription_name = %columns.subscription_name,
            payload = %columns.payload,
            "resolved subscription table columns"
        );
        Ok(columns)
    }
}
