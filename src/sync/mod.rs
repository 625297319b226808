// SPDX-License-Identifier: GPL-3.0-only
pub mod paginator;
pub mod orchestrator;

pub use paginator::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
pub use orchestrator::{SyncMode, SyncOrchestrator, SyncSettings};
