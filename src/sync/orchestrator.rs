// SPDX-License-Identifier: GPL-3.0-only
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::diff::{diff_listings, diff_selected};
use crate::mapping::map_listing;
use crate::provider::{ListingProvider, ProviderPage};
use crate::store::{ListingRecord, ListingStore, ResponseLog, StoreError};
use crate::sync::paginator::KeyPaginator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Provider-driven enumeration of every listing
    Crawl,
    /// Re-fetch every stored id in batches
    Refresh,
    /// Re-fetch only stored ids without images, patching `image_urls`
    Images,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Crawl => write!(f, "crawl"),
            SyncMode::Refresh => write!(f, "refresh"),
            SyncMode::Images => write!(f, "images"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Fetching,
    Logging,
    Mapping,
    Writing,
    Advancing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: SyncMode,
    pub records_processed: u64,
    pub batches_issued: u64,
    pub failed_batches: u64,
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub errors: u64,
    /// Batches whose raw payload could not be written to the audit log
    pub log_failures: u64,
    /// Set when a full crawl stopped on a transport or schema failure
    pub aborted: bool,
}

impl RunSummary {
    fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            records_processed: 0,
            batches_issued: 0,
            failed_batches: 0,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            errors: 0,
            log_failures: 0,
            aborted: false,
        }
    }

    pub fn written(&self) -> u64 {
        self.inserted + self.updated
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} records processed in {} batches ({} failed), {} inserted, {} updated, {} unchanged, {} errors, {} audit log failures",
            self.mode,
            if self.aborted { "aborted" } else { "finished" },
            self.records_processed,
            self.batches_issued,
            self.failed_batches,
            self.inserted,
            self.updated,
            self.unchanged,
            self.errors,
            self.log_failures,
        )
    }
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Working set for the batch currently moving through the state machine.
#[derive(Debug, Default)]
struct Batch {
    page: Option<ProviderPage>,
    log_id: Option<Uuid>,
    records: Vec<ListingRecord>,
    requested: bool,
}

pub struct SyncOrchestrator {
    store: Arc<dyn ListingStore>,
    response_log: Arc<dyn ResponseLog>,
    provider: Arc<dyn ListingProvider>,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn ListingStore>,
        response_log: Arc<dyn ResponseLog>,
        provider: Arc<dyn ListingProvider>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            response_log,
            provider,
            settings,
        }
    }

    /// Drive one run to completion. Never fails: problems are counted in the
    /// returned summary, and a crawl that cannot continue is marked aborted.
    pub async fn run(&self, mode: SyncMode) -> RunSummary {
        info!(%mode, batch_size = self.settings.batch_size, "Starting sync run");

        let mut summary = RunSummary::new(mode);
        let mut paginator = KeyPaginator::new(self.settings.batch_size);
        let mut batch = Batch::default();
        let mut state = SyncState::Fetching;

        while state != SyncState::Done {
            debug!(?state, batches = summary.batches_issued, "Sync state");
            state = match state {
                SyncState::Fetching => {
                    batch = Batch::default();
                    self.fetch(mode, &mut paginator, &mut batch, &mut summary).await
                }
                SyncState::Logging => {
                    batch.log_id = self.log_payload(&batch, &mut summary).await;
                    SyncState::Mapping
                }
                SyncState::Mapping => {
                    self.map_batch(&mut batch, &mut summary);
                    SyncState::Writing
                }
                SyncState::Writing => {
                    self.write_batch(mode, &batch, &mut summary).await;
                    SyncState::Advancing
                }
                SyncState::Advancing => self.advance(mode, &batch).await,
                SyncState::Done => SyncState::Done,
            };
        }

        if summary.aborted {
            error!(%summary, written = summary.written(), "Sync run aborted");
        } else {
            info!(%summary, written = summary.written(), "Sync run finished");
        }
        summary
    }

    async fn fetch(
        &self,
        mode: SyncMode,
        paginator: &mut KeyPaginator,
        batch: &mut Batch,
        summary: &mut RunSummary,
    ) -> SyncState {
        if mode == SyncMode::Crawl {
            batch.requested = true;
            summary.batches_issued += 1;
            return match self.provider.fetch_page().await {
                Ok(page) => {
                    batch.page = Some(page);
                    SyncState::Logging
                }
                Err(e) => {
                    error!(error = %e, batch = summary.batches_issued, "Crawl request failed, aborting run");
                    summary.failed_batches += 1;
                    summary.aborted = true;
                    SyncState::Done
                }
            };
        }

        let offset = paginator.offset();
        let ids = match paginator.next_batch(self.store.as_ref()).await {
            Ok(ids) if ids.is_empty() => {
                info!(offset, "Key space exhausted");
                return SyncState::Done;
            }
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, offset, "Failed to enumerate stored ids, aborting run");
                summary.aborted = true;
                return SyncState::Done;
            }
        };

        let ids = if mode == SyncMode::Images {
            match self.store.ids_missing_images(&ids).await {
                Ok(missing) if missing.is_empty() => {
                    debug!(offset, "No listings without images in batch");
                    return SyncState::Advancing;
                }
                Ok(missing) => missing,
                Err(e) => {
                    warn!(error = %e, offset, "Failed to select listings without images, skipping batch");
                    summary.failed_batches += 1;
                    return SyncState::Advancing;
                }
            }
        } else {
            ids
        };

        batch.requested = true;
        summary.batches_issued += 1;
        info!(offset, count = ids.len(), batch = summary.batches_issued, "Requesting batch from provider");

        match self.provider.fetch_by_ids(&ids).await {
            Ok(page) => {
                batch.page = Some(page);
                SyncState::Logging
            }
            Err(e) => {
                // The key space is known, later batches are still worth fetching
                warn!(error = %e, offset, "Provider request failed, skipping batch");
                summary.failed_batches += 1;
                SyncState::Advancing
            }
        }
    }

    async fn log_payload(&self, batch: &Batch, summary: &mut RunSummary) -> Option<Uuid> {
        let page = batch.page.as_ref()?;
        match self.response_log.log_response(&page.raw).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Failed to log provider response, continuing without audit link");
                summary.log_failures += 1;
                None
            }
        }
    }

    fn map_batch(&self, batch: &mut Batch, summary: &mut RunSummary) {
        let Some(page) = batch.page.as_ref() else {
            return;
        };

        for car in &page.result {
            summary.records_processed += 1;
            match map_listing(car, batch.log_id) {
                Ok(record) => batch.records.push(record),
                Err(e) => {
                    warn!(error = %e, "Skipping unmappable listing");
                    summary.errors += 1;
                }
            }
        }
    }

    async fn write_batch(&self, mode: SyncMode, batch: &Batch, summary: &mut RunSummary) {
        for record in &batch.records {
            match self.write_record(mode, record).await {
                Ok(WriteOutcome::Inserted) => summary.inserted += 1,
                Ok(WriteOutcome::Updated) => summary.updated += 1,
                Ok(WriteOutcome::Unchanged) => summary.unchanged += 1,
                Err(e) => {
                    warn!(error = %e, external_id = record.external_id, "Failed to write listing");
                    summary.errors += 1;
                }
            }
        }
    }

    async fn write_record(
        &self,
        mode: SyncMode,
        candidate: &ListingRecord,
    ) -> Result<WriteOutcome, StoreError> {
        let Some(stored) = self.store.get_listing(candidate.external_id).await? else {
            // Only a crawl creates listings
            if mode != SyncMode::Crawl {
                debug!(external_id = candidate.external_id, %mode, "Listing not stored, skipping");
                return Ok(WriteOutcome::Unchanged);
            }
            self.store.upsert_listing(candidate).await?;
            return Ok(WriteOutcome::Inserted);
        };

        let patch = match mode {
            SyncMode::Images if !candidate.has_images() => return Ok(WriteOutcome::Unchanged),
            SyncMode::Images => diff_selected(&stored, candidate, &["image_urls"]),
            SyncMode::Crawl | SyncMode::Refresh => diff_listings(&stored, candidate),
        };

        if patch.is_empty() {
            return Ok(WriteOutcome::Unchanged);
        }

        debug!(
            external_id = candidate.external_id,
            columns = ?patch.columns().collect::<Vec<_>>(),
            "Listing changed"
        );

        match mode {
            SyncMode::Crawl => self.store.upsert_listing(candidate).await?,
            SyncMode::Refresh | SyncMode::Images => {
                self.store.patch_listing(&patch, candidate.api_log_id).await?
            }
        }
        Ok(WriteOutcome::Updated)
    }

    async fn advance(&self, mode: SyncMode, batch: &Batch) -> SyncState {
        if mode == SyncMode::Crawl && !batch.page.as_ref().is_some_and(|page| page.have_more) {
            info!("Provider reports no more pages");
            return SyncState::Done;
        }

        if batch.requested && !self.settings.inter_batch_delay.is_zero() {
            tokio::time::sleep(self.settings.inter_batch_delay).await;
        }
        SyncState::Fetching
    }
}
