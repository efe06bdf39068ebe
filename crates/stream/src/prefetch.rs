use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use worldspace_common::{Location, RegionCoord};
use worldspace_kernel::WorldEngine;

/// Result of a single [`RegionPrefetcher::ensure_loaded`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    /// The region was already loaded; nothing was requested.
    AlreadyLoaded(RegionCoord),
    /// The region was not loaded and a load was issued.
    Loaded(RegionCoord),
}

impl PrefetchOutcome {
    pub fn region(&self) -> RegionCoord {
        match *self {
            PrefetchOutcome::AlreadyLoaded(r) | PrefetchOutcome::Loaded(r) => r,
        }
    }
}

/// Snapshot of prefetch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchStats {
    /// Total `ensure_loaded` calls.
    pub requested: usize,
    /// Calls that found the region already loaded.
    pub already_loaded: usize,
    /// Calls that issued a load.
    pub loaded: usize,
}

#[derive(Debug, Default)]
struct Counters {
    requested: AtomicUsize,
    already_loaded: AtomicUsize,
    loaded: AtomicUsize,
}

/// Loads the region a location falls in, once.
///
/// Cloning is cheap and clones share counters, so every task that prefetches
/// on behalf of one scheduler reports into the same [`PrefetchStats`].
#[derive(Debug, Clone, Default)]
pub struct RegionPrefetcher {
    counters: Arc<Counters>,
}

impl RegionPrefetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure the region containing `location` is loaded.
    ///
    /// Must run on the authoritative thread: region state belongs to the world.
    pub fn ensure_loaded<W: WorldEngine>(
        &self,
        world: &mut W,
        location: &Location,
    ) -> PrefetchOutcome {
        self.counters.requested.fetch_add(1, Ordering::Relaxed);
        let region = world.region_of(location);
        if world.is_region_loaded(region) {
            self.counters.already_loaded.fetch_add(1, Ordering::Relaxed);
            return PrefetchOutcome::AlreadyLoaded(region);
        }
        tracing::debug!(?region, "prefetching region");
        world.load_region(region);
        self.counters.loaded.fetch_add(1, Ordering::Relaxed);
        PrefetchOutcome::Loaded(region)
    }

    /// Prefetch every location in order. Returns how many loads were issued.
    pub fn ensure_all_loaded<'a, W, I>(&self, world: &mut W, locations: I) -> usize
    where
        W: WorldEngine,
        I: IntoIterator<Item = &'a Location>,
    {
        locations
            .into_iter()
            .filter(|loc| matches!(self.ensure_loaded(world, loc), PrefetchOutcome::Loaded(_)))
            .count()
    }

    pub fn stats(&self) -> PrefetchStats {
        PrefetchStats {
            requested: self.counters.requested.load(Ordering::Relaxed),
            already_loaded: self.counters.already_loaded.load(Ordering::Relaxed),
            loaded: self.counters.loaded.load(Ordering::Relaxed),
        }
    }
}
