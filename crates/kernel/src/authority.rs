//! The authoritative-thread task queue.
//!
//! Worker threads never touch the world. They send closures through an
//! [`AuthorityHandle`]; the thread that owns the world drains the
//! [`AuthorityQueue`] once per tick (or blocks on it) and runs each task with
//! exclusive access to the world. Tasks run in the order they were sent.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};

/// What a task does. Used for instrumentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Region prefetch requests.
    Prefetch,
    /// Entity relocation.
    Relocate,
    /// Anything else a host schedules.
    Other,
}

type Job<W> = Box<dyn FnOnce(&mut W) + Send + 'static>;

struct Task<W> {
    kind: TaskKind,
    job: Job<W>,
}

/// Returned when the queue has been dropped and the task cannot be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("authoritative queue is closed")]
pub struct QueueClosed;

/// Counts of tasks executed on the authoritative thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthorityStats {
    pub prefetch_tasks: usize,
    pub relocate_tasks: usize,
    pub other_tasks: usize,
}

impl AuthorityStats {
    pub fn total(&self) -> usize {
        self.prefetch_tasks + self.relocate_tasks + self.other_tasks
    }

    fn record(&mut self, kind: TaskKind) {
        match kind {
            TaskKind::Prefetch => self.prefetch_tasks += 1,
            TaskKind::Relocate => self.relocate_tasks += 1,
            TaskKind::Other => self.other_tasks += 1,
        }
    }
}

/// Receiving end, owned by the authoritative thread.
pub struct AuthorityQueue<W> {
    sender: Sender<Task<W>>,
    receiver: Receiver<Task<W>>,
    stats: AuthorityStats,
}

/// Cloneable sending end, safe to move to any thread.
pub struct AuthorityHandle<W> {
    sender: Sender<Task<W>>,
}

impl<W> Clone for AuthorityHandle<W> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<W: 'static> AuthorityHandle<W> {
    /// Schedule `job` to run on the authoritative thread. Never blocks.
    pub fn run<F>(&self, kind: TaskKind, job: F) -> Result<(), QueueClosed>
    where
        F: FnOnce(&mut W) + Send + 'static,
    {
        self.sender
            .send(Task {
                kind,
                job: Box::new(job),
            })
            .map_err(|_| QueueClosed)
    }
}

impl<W: 'static> Default for AuthorityQueue<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: 'static> AuthorityQueue<W> {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            stats: AuthorityStats::default(),
        }
    }

    /// A handle for scheduling tasks from other threads.
    pub fn handle(&self) -> AuthorityHandle<W> {
        AuthorityHandle {
            sender: self.sender.clone(),
        }
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Tasks executed so far.
    pub fn stats(&self) -> AuthorityStats {
        self.stats
    }

    /// Run every task queued right now without blocking. Returns how many ran.
    pub fn run_pending(&mut self, world: &mut W) -> usize {
        let mut ran = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(task) => {
                    self.execute(world, task);
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        ran
    }

    /// Run tasks as they arrive until `done` returns true or `timeout` elapses.
    ///
    /// Returns whether `done` was satisfied. Intended for hosts without their
    /// own tick loop, and for tests.
    pub fn run_until<F>(&mut self, world: &mut W, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending(world);
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.receiver.recv_timeout(deadline - now) {
                Ok(task) => self.execute(world, task),
                Err(RecvTimeoutError::Timeout) => return done(),
                Err(RecvTimeoutError::Disconnected) => return done(),
            }
        }
    }

    fn execute(&mut self, world: &mut W, task: Task<W>) {
        self.stats.record(task.kind);
        tracing::trace!(kind = ?task.kind, "running authoritative task");
        (task.job)(world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn tasks_run_in_send_order() {
        let mut queue: AuthorityQueue<Vec<u32>> = AuthorityQueue::new();
        let handle = queue.handle();
        for i in 0..5 {
            handle.run(TaskKind::Other, move |log| log.push(i)).unwrap();
        }

        let mut log = Vec::new();
        assert_eq!(queue.pending(), 5);
        assert_eq!(queue.run_pending(&mut log), 5);
        assert_eq!(log, vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn stats_count_by_kind() {
        let mut queue: AuthorityQueue<u32> = AuthorityQueue::new();
        let handle = queue.handle();
        handle.run(TaskKind::Prefetch, |n| *n += 1).unwrap();
        handle.run(TaskKind::Relocate, |n| *n += 10).unwrap();
        handle.run(TaskKind::Relocate, |n| *n += 10).unwrap();

        let mut n = 0;
        queue.run_pending(&mut n);
        assert_eq!(n, 21);
        let stats = queue.stats();
        assert_eq!(stats.prefetch_tasks, 1);
        assert_eq!(stats.relocate_tasks, 2);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn run_until_waits_for_other_threads() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut queue: AuthorityQueue<Vec<u32>> = AuthorityQueue::new();
        let handle = queue.handle();
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let producer = thread::spawn(move || {
            for i in 0..3 {
                thread::sleep(Duration::from_millis(5));
                let counter = Arc::clone(&counter);
                handle
                    .run(TaskKind::Other, move |log| {
                        log.push(i);
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            }
        });

        let mut log = Vec::new();
        let ok = queue.run_until(&mut log, Duration::from_secs(5), || {
            delivered.load(Ordering::SeqCst) == 3
        });
        producer.join().unwrap();
        assert!(ok);
        assert_eq!(log, vec![0, 1, 2]);
    }

    #[test]
    fn run_until_times_out() {
        let mut queue: AuthorityQueue<()> = AuthorityQueue::new();
        let start = Instant::now();
        assert!(!queue.run_until(&mut (), Duration::from_millis(20), || false));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn closed_queue_rejects_tasks() {
        let queue: AuthorityQueue<()> = AuthorityQueue::new();
        let handle = queue.handle();
        drop(queue);
        assert_eq!(handle.run(TaskKind::Other, |_| {}), Err(QueueClosed));
    }
}
