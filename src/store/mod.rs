// SPDX-License-Identifier: GPL-3.0-only
pub mod models;
pub mod traits;
pub mod sqlite;

pub use models::{FieldValue, ListingRecord};
pub use traits::{ListingStore, ResponseLog, StoreError};
pub use sqlite::SqliteStore;
