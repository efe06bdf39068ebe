//! Streaming: region prefetch ahead of entity arrival.
//!
//! # Invariants
//! - A region is loaded at most once per prefetch; loaded regions are never
//!   reloaded.
//! - Prefetch runs on the authoritative thread only. Worker threads request it
//!   by scheduling a task, they never load regions themselves.

mod prefetch;

pub use prefetch::{PrefetchOutcome, PrefetchStats, RegionPrefetcher};

pub fn crate_info() -> &'static str {
    "worldspace-stream v0.1.0"
}
