use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use worldspace_common::{EntityId, Location};
use worldspace_kernel::{AuthorityHandle, WorldEngine};
use worldspace_stream::{PrefetchStats, RegionPrefetcher};

use crate::config::RelocateConfig;
use crate::dispatch::Dispatcher;
use crate::error::{RelocateError, StartError};
use crate::executor::RelocationExecutor;
use crate::mapping::Destinations;
use crate::partition::partition;
use crate::pool::{PoolState, WorkerPool};
use crate::report::{BatchOutcome, RelocationTicket, SkipReason};

/// Owns the worker pool and serves relocation calls.
///
/// Constructed once by the host with a handle to its authoritative queue and
/// passed around by reference. Calls never block: they partition, submit and
/// return a [`RelocationTicket`] that completes as batches land on the
/// authoritative thread.
pub struct RelocationService<W> {
    config: RelocateConfig,
    batch_size: NonZeroUsize,
    pool: Arc<WorkerPool>,
    dispatcher: Dispatcher<W>,
}

impl<W: WorldEngine> RelocationService<W> {
    /// Validate `config` and spawn the worker pool.
    pub fn start(
        config: RelocateConfig,
        authority: AuthorityHandle<W>,
    ) -> Result<Self, StartError> {
        config.validate()?;
        let batch_size = config.batch_size()?;
        let pool = Arc::new(WorkerPool::start(config.worker_threads)?);
        let executor = RelocationExecutor::new(RegionPrefetcher::new());
        let dispatcher = Dispatcher::new(Arc::clone(&pool), authority, executor, config.prefetch);
        tracing::info!(
            batch_size = config.batch_size,
            workers = config.worker_threads,
            mapping = ?config.mapping,
            prefetch = config.prefetch,
            "relocation service started"
        );
        Ok(Self {
            config,
            batch_size,
            pool,
            dispatcher,
        })
    }

    pub fn config(&self) -> &RelocateConfig {
        &self.config
    }

    /// Move `entities[i]` to a location from `locations`, matched by position
    /// according to the configured [`crate::MappingPolicy`].
    pub fn relocate_all(
        &self,
        entities: &[EntityId],
        locations: &[Location],
    ) -> Result<RelocationTicket, RelocateError> {
        self.ensure_accepting()?;
        let destinations =
            Destinations::list(locations.to_vec(), entities.len(), self.config.mapping)?;
        self.dispatch(entities, destinations)
    }

    /// Move every entity to `location`.
    pub fn relocate_all_to(
        &self,
        entities: &[EntityId],
        location: Location,
    ) -> Result<RelocationTicket, RelocateError> {
        self.ensure_accepting()?;
        self.dispatch(entities, Destinations::shared(location))
    }

    fn ensure_accepting(&self) -> Result<(), RelocateError> {
        if self.pool.is_accepting() {
            Ok(())
        } else {
            tracing::warn!("relocation rejected: service is shut down");
            Err(RelocateError::Rejected)
        }
    }

    fn dispatch(
        &self,
        entities: &[EntityId],
        destinations: Destinations,
    ) -> Result<RelocationTicket, RelocateError> {
        let _span = tracing::info_span!(
            "relocate_all",
            entities = entities.len(),
            destinations = destinations.len(),
            shared = destinations.is_shared()
        )
        .entered();

        let batches = partition(entities, self.batch_size);
        let ticket = RelocationTicket::new(entities.len(), batches.len());
        let destinations = Arc::new(destinations);

        let mut batches = batches.into_iter();
        let mut submitted = 0usize;
        while let Some(batch) = batches.next() {
            let accepted = self
                .dispatcher
                .submit(batch, Arc::clone(&destinations), ticket.clone());
            if let Err(rejected) = accepted {
                if submitted == 0 {
                    tracing::warn!("relocation rejected: service is shut down");
                    return Err(RelocateError::Rejected);
                }
                // shutdown raced with this call: account for what never ran
                tracing::warn!(submitted, "shutdown during dispatch, remaining batches rejected");
                ticket.complete_batch(BatchOutcome::all_skipped(&rejected, SkipReason::Rejected));
                for rest in batches.by_ref() {
                    ticket.complete_batch(BatchOutcome::all_skipped(&rest, SkipReason::Rejected));
                }
                break;
            }
            submitted += 1;
        }
        tracing::debug!(batches = submitted, "relocation dispatched");
        Ok(ticket)
    }

    /// Stop accepting calls. In-flight batches still finish. Idempotent;
    /// returns true only for the call that started the shutdown.
    ///
    /// The state stays [`PoolState::ShuttingDown`] until the relocation task
    /// of every accepted batch has run on the authoritative thread.
    pub fn shutdown(&self) -> bool {
        self.pool.shutdown()
    }

    pub fn is_shutdown(&self) -> bool {
        !self.pool.is_accepting()
    }

    pub fn state(&self) -> PoolState {
        self.pool.state()
    }

    /// Wait for the worker threads to exit after [`shutdown`](Self::shutdown).
    ///
    /// Only worker-side work is waited on. Relocation tasks already queued on
    /// the authoritative thread run whenever the host drains its queue, and
    /// [`state`](Self::state) reports STOPPED once they have.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        self.pool.await_termination(timeout)
    }

    pub fn prefetch_stats(&self) -> PrefetchStats {
        self.dispatcher.executor().prefetcher().stats()
    }

    /// Regions loaded by relocation tasks because no prefetch got there first.
    pub fn late_loads(&self) -> usize {
        self.dispatcher.executor().late_loads()
    }
}
