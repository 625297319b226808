// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Mutex;
use tempfile::TempDir;
use uuid::Uuid;

use crate::diff::ListingPatch;
use crate::mapping::map_listing;
use crate::provider::{FetchError, ListingProvider, ProviderPage};
use crate::store::{ListingRecord, ListingStore, ResponseLog, SqliteStore, StoreError};

/// Create a SQLite store in a fresh temporary directory.
/// Keep the returned `TempDir` alive for as long as the store is used.
pub async fn setup_test_store() -> (SqliteStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let store = SqliteStore::new(&dir.path().join("listings.db"))
        .await
        .expect("Failed to open test store");
    (store, dir)
}

/// A provider car payload with the nested shapes the real API returns
pub fn car_payload(id: i64, price: i64) -> Value {
    json!({
        "id": id,
        "licence_plate": format!("ABC{id:03}"),
        "brand": "Volvo",
        "model": "V60",
        "price": price,
        "prices": [{"price": price, "date": "2024-05-01"}],
        "status": "for_sale",
        "dates": {"published": "2024-05-01", "removed": null},
        "model_year": 2021,
        "power_kW": 145,
        "accelleration_0_to_100_kmh": "7.6",
        "wltp": {
            "fuel_consumption_combined": {"min": 6.1, "max": 6.8},
            "CO2_emission_combined": {"min": 139, "max": 155}
        },
        "euro_ncap": {"year": 2018, "result": 5},
        "fuels": ["petrol"],
        "images": []
    })
}

pub fn page(cars: Vec<Value>, have_more: bool) -> ProviderPage {
    ProviderPage::from_payload(json!({"result": cars, "have_more": have_more}))
        .expect("test page should have a result list")
}

/// Map and store a payload the way an earlier crawl would have
pub async fn seed_listing(store: &dyn ListingStore, car: Value) -> ListingRecord {
    let record = map_listing(&car, None).expect("seed payload should map");
    store.upsert_listing(&record).await.expect("seed upsert should succeed");
    record
}

/// In-memory provider: queued crawl pages plus a catalog answering id lookups.
#[derive(Default)]
pub struct ScriptedProvider {
    crawl_pages: Mutex<VecDeque<Result<ProviderPage, FetchError>>>,
    catalog: Mutex<BTreeMap<i64, Value>>,
    failing_calls: HashSet<usize>,
    id_requests: Mutex<Vec<Vec<i64>>>,
}

impl ScriptedProvider {
    pub fn with_pages(pages: Vec<Result<ProviderPage, FetchError>>) -> Self {
        Self {
            crawl_pages: Mutex::new(pages.into()),
            ..Self::default()
        }
    }

    /// Make the `call`-th (zero based) id lookup fail with a 503
    pub fn fail_call(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    pub fn set_car(&self, car: Value) {
        let id = car["id"].as_i64().expect("catalog car needs an integer id");
        self.catalog.lock().unwrap().insert(id, car);
    }

    /// Answer lookups of `id` with `car`, whatever id the car carries
    pub fn set_car_for(&self, id: i64, car: Value) {
        self.catalog.lock().unwrap().insert(id, car);
    }

    pub fn id_requests(&self) -> Vec<Vec<i64>> {
        self.id_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingProvider for ScriptedProvider {
    async fn fetch_page(&self) -> Result<ProviderPage, FetchError> {
        self.crawl_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(FetchError::MissingResult))
    }

    async fn fetch_by_ids(&self, ids: &[i64]) -> Result<ProviderPage, FetchError> {
        let call = {
            let mut requests = self.id_requests.lock().unwrap();
            requests.push(ids.to_vec());
            requests.len() - 1
        };

        if self.failing_calls.contains(&call) {
            return Err(FetchError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }

        let catalog = self.catalog.lock().unwrap();
        let cars = ids.iter().filter_map(|id| catalog.get(id).cloned()).collect();
        Ok(page(cars, false))
    }
}

/// Store wrapper that rejects writes for selected ids
pub struct RejectingStore {
    inner: SqliteStore,
    rejected: HashSet<i64>,
}

impl RejectingStore {
    pub fn new(inner: SqliteStore, rejected: impl IntoIterator<Item = i64>) -> Self {
        Self {
            inner,
            rejected: rejected.into_iter().collect(),
        }
    }

    fn check(&self, external_id: i64) -> Result<(), StoreError> {
        if self.rejected.contains(&external_id) {
            return Err(StoreError::Database(sqlx::Error::Protocol(format!(
                "write rejected for {external_id}"
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl ListingStore for RejectingStore {
    async fn list_external_ids(&self, offset: u64, limit: u64) -> Result<Vec<i64>, StoreError> {
        self.inner.list_external_ids(offset, limit).await
    }

    async fn ids_missing_images(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        self.inner.ids_missing_images(ids).await
    }

    async fn get_listing(&self, external_id: i64) -> Result<Option<ListingRecord>, StoreError> {
        self.inner.get_listing(external_id).await
    }

    async fn upsert_listing(&self, record: &ListingRecord) -> Result<(), StoreError> {
        self.check(record.external_id)?;
        self.inner.upsert_listing(record).await
    }

    async fn patch_listing(
        &self,
        patch: &ListingPatch,
        api_log_id: Option<Uuid>,
    ) -> Result<(), StoreError> {
        self.check(patch.external_id)?;
        self.inner.patch_listing(patch, api_log_id).await
    }
}

#[async_trait]
impl ResponseLog for RejectingStore {
    async fn log_response(&self, payload: &Value) -> Result<Uuid, StoreError> {
        self.inner.log_response(payload).await
    }
}

/// Audit log that is always unavailable
pub struct FailingLog;

#[async_trait]
impl ResponseLog for FailingLog {
    async fn log_response(&self, _payload: &Value) -> Result<Uuid, StoreError> {
        Err(StoreError::Malformed("audit log unavailable".to_string()))
    }
}
