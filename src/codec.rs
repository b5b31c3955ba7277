//! Record codec: [`Subscription`] to and from the stored payload string.
//!
//! The payload is a small JSON object. `ownerId` may be absent or null in
//! rows written before owner tracking existed; the other fields are required
//! and their absence is treated as data corruption, not coerced.

use crate::error::{Result, StoreError};
use crate::types::{Subscription, TableFilter, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wire form of one stored record. Field order is the serialization order.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    filter: Option<String>,
    expires_at: Option<i64>,
    event_ttl: Option<u64>,
    owner_id: Option<String>,
}

/// Encode a subscription into the payload column's string form.
pub fn encode<F: TableFilter>(subscription: &Subscription<F>) -> Result<String> {
    let raw = RawRecord {
        filter: Some(subscription.table_filter.canonical()),
        expires_at: Some(subscription.expires_at.as_millis()),
        event_ttl: Some(subscription.event_ttl.as_secs()),
        owner_id: subscription.owner_id.clone(),
    };
    serde_json::to_string(&raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decode a stored payload back into a subscription named `name`.
pub fn decode<F: TableFilter>(name: &str, payload: &str) -> Result<Subscription<F>> {
    let raw: RawRecord =
        serde_json::from_str(payload).map_err(|e| StoreError::Deserialization(e.to_string()))?;

    let filter = raw.filter.ok_or(StoreError::MissingField("filter"))?;
    let expires_at = raw.expires_at.ok_or(StoreError::MissingField("expiresAt"))?;
    let event_ttl = raw.event_ttl.ok_or(StoreError::MissingField("eventTtl"))?;
    let table_filter = F::parse(&filter).map_err(StoreError::FilterParse)?;

    Ok(Subscription {
        name: name.to_string(),
        table_filter,
        expires_at: Timestamp(expires_at),
        event_ttl: Duration::from_secs(event_ttl),
        owner_id: raw.owner_id,
    })
}
