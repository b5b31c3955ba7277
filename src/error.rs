//! Error types for the subscription registry.

use crate::client::ClientError;
use thiserror::Error;

/// Main error type for registry operations.
///
/// "Not found" on point lookup is not an error; [`crate::SubscriptionStore::get`]
/// returns `Ok(None)` for absent rows since TTL-driven disappearance is routine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The live table is missing or its shape does not match the expected
    /// schema. Fatal and non-retryable: signals a provisioning defect.
    #[error("schema resolution failed: {0}")]
    SchemaResolution(String),

    /// A stored payload lacks a required field, indicating corruption or an
    /// incompatible writer.
    #[error("stored subscription missing required field: {0}")]
    MissingField(&'static str),

    /// A stored filter string failed to parse. Bubbled unchanged from the
    /// filter-language collaborator.
    #[error("invalid table filter: {0}")]
    FilterParse(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Transient store-client failure. Retry policy belongs to the client.
    #[error("store client error: {0}")]
    Client(#[from] ClientError),

    #[error("payload serialization error: {0}")]
    Serialization(String),

    #[error("payload deserialization error: {0}")]
    Deserialization(String),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, StoreError>;
