use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use worldspace_common::EntityId;

use crate::partition::Batch;

/// Why an entity was not moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The world does not know the entity (despawned, never existed).
    MissingEntity,
    /// The destination's world does not exist.
    MissingLocation,
    /// The entity is not active.
    Inactive,
    /// The world engine refused the move.
    Failed(String),
    /// The batch was submitted after the service shut down.
    Rejected,
    /// The authoritative queue was gone before the batch could be delivered.
    AuthorityUnavailable,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingEntity => write!(f, "missing entity"),
            SkipReason::MissingLocation => write!(f, "missing location"),
            SkipReason::Inactive => write!(f, "inactive"),
            SkipReason::Failed(msg) => write!(f, "failed: {msg}"),
            SkipReason::Rejected => write!(f, "rejected"),
            SkipReason::AuthorityUnavailable => write!(f, "authoritative queue closed"),
        }
    }
}

/// One entity that was not moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntity {
    /// Position in the call's entity sequence.
    pub index: usize,
    pub entity: EntityId,
    pub reason: SkipReason,
}

/// What happened to one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub relocated: usize,
    pub skipped: Vec<SkippedEntity>,
}

impl BatchOutcome {
    /// Every entity of `batch` skipped for `reason`.
    pub fn all_skipped(batch: &Batch, reason: SkipReason) -> Self {
        Self {
            relocated: 0,
            skipped: batch
                .indexed()
                .map(|(index, entity)| SkippedEntity {
                    index,
                    entity,
                    reason: reason.clone(),
                })
                .collect(),
        }
    }
}

/// Result of a whole relocation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationReport {
    /// Entities in the call.
    pub requested: usize,
    /// Batches the call was split into.
    pub batches: usize,
    /// Entities actually moved.
    pub relocated: usize,
    /// Entities not moved, ordered by index.
    pub skipped: Vec<SkippedEntity>,
}

impl RelocationReport {
    /// True when every requested entity was moved.
    pub fn is_complete(&self) -> bool {
        self.relocated == self.requested
    }

    /// Number of skips matching `reason`.
    pub fn skipped_for(&self, reason: &SkipReason) -> usize {
        self.skipped.iter().filter(|s| &s.reason == reason).count()
    }
}

impl std::fmt::Display for RelocationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Relocation: requested={} batches={} relocated={} skipped={}",
            self.requested,
            self.batches,
            self.relocated,
            self.skipped.len()
        )
    }
}

struct Progress {
    pending_batches: usize,
    report: RelocationReport,
}

struct TicketState {
    progress: Mutex<Progress>,
    finished: Condvar,
}

/// Handle to an in-flight relocation call.
///
/// Batch tasks report into it as they finish on the authoritative thread.
/// Do not [`wait`](Self::wait) on the authoritative thread itself: the batches
/// it waits for can only finish there.
#[derive(Clone)]
pub struct RelocationTicket {
    state: Arc<TicketState>,
}

impl std::fmt::Debug for RelocationTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let progress = self.state.progress.lock();
        f.debug_struct("RelocationTicket")
            .field("requested", &progress.report.requested)
            .field("pending_batches", &progress.pending_batches)
            .finish()
    }
}

impl RelocationTicket {
    pub(crate) fn new(requested: usize, batches: usize) -> Self {
        Self {
            state: Arc::new(TicketState {
                progress: Mutex::new(Progress {
                    pending_batches: batches,
                    report: RelocationReport {
                        requested,
                        batches,
                        ..RelocationReport::default()
                    },
                }),
                finished: Condvar::new(),
            }),
        }
    }

    /// Merge one batch's outcome. The last batch finalizes the report.
    pub(crate) fn complete_batch(&self, outcome: BatchOutcome) {
        let mut progress = self.state.progress.lock();
        progress.report.relocated += outcome.relocated;
        progress.report.skipped.extend(outcome.skipped);
        progress.pending_batches = progress.pending_batches.saturating_sub(1);
        if progress.pending_batches == 0 {
            progress.report.skipped.sort_by_key(|s| s.index);
            self.state.finished.notify_all();
        }
    }

    /// Whether every batch has finished.
    pub fn is_done(&self) -> bool {
        self.state.progress.lock().pending_batches == 0
    }

    /// Batches still outstanding.
    pub fn pending_batches(&self) -> usize {
        self.state.progress.lock().pending_batches
    }

    /// The final report, if every batch has finished.
    pub fn try_report(&self) -> Option<RelocationReport> {
        let progress = self.state.progress.lock();
        (progress.pending_batches == 0).then(|| progress.report.clone())
    }

    /// Block until every batch has finished.
    pub fn wait(&self) -> RelocationReport {
        let mut progress = self.state.progress.lock();
        while progress.pending_batches > 0 {
            self.state.finished.wait(&mut progress);
        }
        progress.report.clone()
    }

    /// Block until every batch has finished or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<RelocationReport> {
        let deadline = Instant::now() + timeout;
        let mut progress = self.state.progress.lock();
        while progress.pending_batches > 0 {
            if self
                .state
                .finished
                .wait_until(&mut progress, deadline)
                .timed_out()
            {
                break;
            }
        }
        (progress.pending_batches == 0).then(|| progress.report.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn skipped(index: usize, reason: SkipReason) -> SkippedEntity {
        SkippedEntity {
            index,
            entity: EntityId::new(),
            reason,
        }
    }

    #[test]
    fn empty_call_is_done_immediately() {
        let ticket = RelocationTicket::new(0, 0);
        assert!(ticket.is_done());
        let report = ticket.wait();
        assert_eq!(report, RelocationReport::default());
        assert!(report.is_complete());
    }

    #[test]
    fn report_merges_batches_and_orders_skips() {
        let ticket = RelocationTicket::new(6, 2);
        ticket.complete_batch(BatchOutcome {
            relocated: 2,
            skipped: vec![skipped(4, SkipReason::Inactive)],
        });
        assert!(!ticket.is_done());
        assert!(ticket.try_report().is_none());
        ticket.complete_batch(BatchOutcome {
            relocated: 2,
            skipped: vec![skipped(1, SkipReason::MissingEntity)],
        });

        let report = ticket.try_report().unwrap();
        assert_eq!(report.relocated, 4);
        assert!(!report.is_complete());
        let indices: Vec<usize> = report.skipped.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 4]);
        assert_eq!(report.skipped_for(&SkipReason::Inactive), 1);
    }

    #[test]
    fn all_skipped_covers_batch_positions() {
        let batch = Batch::new(40, vec![EntityId::new(), EntityId::new()]);
        let outcome = BatchOutcome::all_skipped(&batch, SkipReason::Rejected);
        assert_eq!(outcome.relocated, 0);
        let indices: Vec<usize> = outcome.skipped.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![40, 41]);
    }

    #[test]
    fn wait_wakes_when_last_batch_completes() {
        let ticket = RelocationTicket::new(3, 3);
        let worker = ticket.clone();
        let handle = thread::spawn(move || {
            for _ in 0..3 {
                thread::sleep(Duration::from_millis(2));
                worker.complete_batch(BatchOutcome {
                    relocated: 1,
                    skipped: Vec::new(),
                });
            }
        });
        let report = ticket.wait();
        handle.join().unwrap();
        assert_eq!(report.relocated, 3);
        assert!(report.is_complete());
    }

    #[test]
    fn wait_timeout_gives_up() {
        let ticket = RelocationTicket::new(1, 1);
        assert!(ticket.wait_timeout(Duration::from_millis(10)).is_none());
        assert_eq!(ticket.pending_batches(), 1);
    }

    #[test]
    fn skip_reason_display() {
        assert_eq!(SkipReason::Inactive.to_string(), "inactive");
        assert_eq!(
            SkipReason::Failed("boom".into()).to_string(),
            "failed: boom"
        );
    }
}
