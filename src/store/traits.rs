// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::diff::ListingPatch;
use crate::store::models::ListingRecord;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to encode or decode JSON column: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stored value is malformed: {0}")]
    Malformed(String),

    #[error("Listing {0} changed since it was read; patch not applied")]
    Conflict(i64),
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Stored external ids in ascending order, `limit` rows starting at `offset`
    async fn list_external_ids(&self, offset: u64, limit: u64) -> Result<Vec<i64>, StoreError>;

    /// Subset of `ids` whose stored image list is empty
    async fn ids_missing_images(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError>;

    async fn get_listing(&self, external_id: i64) -> Result<Option<ListingRecord>, StoreError>;

    /// Insert a listing, or replace every mapped column of an existing one
    async fn upsert_listing(&self, record: &ListingRecord) -> Result<(), StoreError>;

    /// Apply only the patched columns, provided each still holds the value the
    /// patch was computed against. Returns `StoreError::Conflict` otherwise.
    async fn patch_listing(
        &self,
        patch: &ListingPatch,
        api_log_id: Option<Uuid>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ResponseLog: Send + Sync {
    /// Persist a raw provider payload, returning its correlation id
    async fn log_response(&self, payload: &Value) -> Result<Uuid, StoreError>;
}
