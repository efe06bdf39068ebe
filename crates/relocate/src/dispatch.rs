use std::sync::Arc;

use worldspace_common::Location;
use worldspace_kernel::{AuthorityHandle, TaskKind, WorldEngine};

use crate::executor::{RelocationExecutor, RelocationTask};
use crate::mapping::Destinations;
use crate::partition::Batch;
use crate::pool::{InFlight, WorkerPool};
use crate::report::{BatchOutcome, RelocationTicket, SkipReason};

/// Moves batches from the caller, through a worker, onto the authoritative
/// thread.
///
/// Per batch the authoritative thread receives at most two tasks: one
/// prefetch task for the batch's distinct destinations, then one relocation
/// task carrying the batch's moves in order. Both go through the same FIFO,
/// so the prefetch always runs first.
pub struct Dispatcher<W> {
    pool: Arc<WorkerPool>,
    job: BatchJob<W>,
}

/// What a worker needs to hand one batch over. Holds no reference to the
/// pool, so the pool is only ever dropped by its owner.
struct BatchJob<W> {
    authority: AuthorityHandle<W>,
    executor: RelocationExecutor,
    prefetch: bool,
}

impl<W> Clone for BatchJob<W> {
    fn clone(&self) -> Self {
        Self {
            authority: self.authority.clone(),
            executor: self.executor.clone(),
            prefetch: self.prefetch,
        }
    }
}

impl<W: WorldEngine> Dispatcher<W> {
    pub fn new(
        pool: Arc<WorkerPool>,
        authority: AuthorityHandle<W>,
        executor: RelocationExecutor,
        prefetch: bool,
    ) -> Self {
        Self {
            pool,
            job: BatchJob {
                authority,
                executor,
                prefetch,
            },
        }
    }

    pub fn executor(&self) -> &RelocationExecutor {
        &self.job.executor
    }

    /// Queue `batch` on the worker pool. On rejection the batch is handed back
    /// so the caller can account for its entities.
    ///
    /// The batch stays in flight on the pool until its relocation task has
    /// run on the authoritative thread.
    pub fn submit(
        &self,
        batch: Batch,
        destinations: Arc<Destinations>,
        ticket: RelocationTicket,
    ) -> Result<(), Arc<Batch>> {
        let batch = Arc::new(batch);
        let job_batch = Arc::clone(&batch);
        let job = self.job.clone();
        self.pool
            .submit(move |in_flight| job.process(&job_batch, &destinations, ticket, in_flight))
            .map_err(|_| batch)
    }
}

impl<W: WorldEngine> BatchJob<W> {
    /// Worker-side half: resolve destinations, request prefetch, hand the
    /// moves to the authoritative thread.
    fn process(
        &self,
        batch: &Batch,
        destinations: &Destinations,
        ticket: RelocationTicket,
        in_flight: InFlight,
    ) {
        let offset = batch.offset();
        let tasks: Vec<RelocationTask> = batch
            .indexed()
            .map(|(index, entity)| RelocationTask {
                index,
                entity,
                location: *destinations.resolve(index),
            })
            .collect();

        if self.prefetch {
            let mut wanted: Vec<Location> = Vec::new();
            for task in &tasks {
                if !wanted.contains(&task.location) {
                    wanted.push(task.location);
                }
            }
            let prefetcher = self.executor.prefetcher().clone();
            let sent = self.authority.run(TaskKind::Prefetch, move |world: &mut W| {
                prefetcher.ensure_all_loaded(world, &wanted);
            });
            if sent.is_err() {
                tracing::warn!(offset, "authoritative queue closed before prefetch");
            }
        }

        tracing::debug!(offset, len = tasks.len(), "dispatching batch");
        let executor = self.executor.clone();
        let done = ticket.clone();
        let sent = self.authority.run(TaskKind::Relocate, move |world: &mut W| {
            let _span = tracing::debug_span!("relocate_batch", offset).entered();
            done.complete_batch(executor.run_batch(world, &tasks));
            drop(in_flight);
        });
        // on failure the task, and the in-flight guard with it, is already gone
        if sent.is_err() {
            tracing::warn!(offset, "authoritative queue closed, batch dropped");
            let outcome = BatchOutcome::all_skipped(batch, SkipReason::AuthorityUnavailable);
            ticket.complete_batch(outcome);
        }
    }
}
