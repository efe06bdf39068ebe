//! Relocation: move many entities to new locations without stalling the
//! authoritative thread.
//!
//! A call is partitioned into fixed-size batches. Each batch is iterated on a
//! worker thread, which resolves destinations and then schedules exactly two
//! tasks on the authoritative thread: one that prefetches the batch's
//! destination regions, one that moves the batch's entities in order.
//!
//! # Invariants
//! - Partitioning is positional; duplicate entity handles stay distinct.
//! - Entities and regions are mutated only on the authoritative thread.
//! - A batch's prefetch task is queued before its relocation task, and the
//!   relocation re-checks the region, so no entity lands in an unloaded region.
//! - A skipped entity never affects any other entity; every skip is reported.

mod config;
mod dispatch;
mod error;
mod executor;
mod mapping;
mod partition;
mod pool;
mod report;
mod service;

pub use config::{ConfigError, DEFAULT_BATCH_SIZE, RelocateConfig};
pub use dispatch::Dispatcher;
pub use error::{RelocateError, StartError};
pub use executor::{RelocationExecutor, RelocationTask};
pub use mapping::{Destinations, MappingPolicy};
pub use partition::{Batch, batch_count, partition};
pub use pool::{InFlight, PoolState, WorkerPool};
pub use report::{BatchOutcome, RelocationReport, RelocationTicket, SkipReason, SkippedEntity};
pub use service::RelocationService;

pub fn crate_info() -> &'static str {
    "worldspace-relocate v0.1.0"
}
