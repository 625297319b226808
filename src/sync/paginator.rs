// SPDX-License-Identifier: GPL-3.0-only
use crate::store::{ListingStore, StoreError};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Largest batch whose ids still fit in one SQLite statement's bind parameters
pub const MAX_BATCH_SIZE: usize = 32_766;

/// Offset/limit window over stored external ids, ascending.
///
/// Rows inserted mid-run below the current offset shift the window and may
/// cause one id to be revisited or skipped. Ids are append-mostly, so this is
/// tolerated.
#[derive(Debug, Clone)]
pub struct KeyPaginator {
    batch_size: usize,
    offset: u64,
}

impl KeyPaginator {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            offset: 0,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Next slice of ids. An empty slice marks the end of the key space.
    pub async fn next_batch(&mut self, store: &dyn ListingStore) -> Result<Vec<i64>, StoreError> {
        let ids = store
            .list_external_ids(self.offset, self.batch_size as u64)
            .await?;
        self.offset += self.batch_size as u64;
        Ok(ids)
    }
}

impl Default for KeyPaginator {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}
