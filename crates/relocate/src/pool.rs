//! Worker pool with an explicit lifecycle.
//!
//! ```text
//!   RUNNING --shutdown()--> SHUTTING_DOWN --last job done--> STOPPED
//! ```
//!
//! Shutdown stops accepting jobs but lets every accepted job finish. There is
//! no way back to RUNNING.
//!
//! A job is in flight until the [`InFlight`] guard it is given is dropped. A
//! job that hands its work to another thread moves the guard along with it,
//! so STOPPED is only reached once that work has run too.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::RelocateError;

type Job = Box<dyn FnOnce(InFlight) + Send + 'static>;

const RUNNING: u8 = 0;
const SHUTTING_DOWN: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle state of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Running,
    ShuttingDown,
    Stopped,
}

struct Shared {
    state: AtomicU8,
    in_flight: AtomicUsize,
    live_workers: Mutex<usize>,
    workers_exited: Condvar,
}

impl Shared {
    fn finish_job(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.try_stop();
        }
    }

    fn try_stop(&self) {
        if self
            .state
            .compare_exchange(SHUTTING_DOWN, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::debug!("worker pool stopped");
        }
    }

    fn worker_exited(&self) {
        let mut live = self.live_workers.lock();
        *live -= 1;
        if *live == 0 {
            self.workers_exited.notify_all();
        }
    }
}

/// Marks one accepted job as unfinished. Dropping it finishes the job.
#[must_use = "dropping the guard finishes the job"]
pub struct InFlight {
    shared: Arc<Shared>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.shared.finish_job();
    }
}

/// Fixed-size pool of named worker threads fed by one job queue.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    threads: usize,
}

impl WorkerPool {
    /// Spawn `threads` workers named `relocate-worker-N`.
    pub fn start(threads: usize) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let shared = Arc::new(Shared {
            state: AtomicU8::new(RUNNING),
            in_flight: AtomicUsize::new(0),
            live_workers: Mutex::new(0),
            workers_exited: Condvar::new(),
        });

        let pool = Self {
            sender: Mutex::new(Some(sender)),
            shared,
            handles: Mutex::new(Vec::with_capacity(threads)),
            threads,
        };
        for i in 0..threads {
            let receiver = receiver.clone();
            let shared = Arc::clone(&pool.shared);
            *pool.shared.live_workers.lock() += 1;
            let spawned = thread::Builder::new()
                .name(format!("relocate-worker-{i}"))
                .spawn(move || worker_loop(receiver, shared));
            match spawned {
                Ok(handle) => pool.handles.lock().push(handle),
                Err(e) => {
                    *pool.shared.live_workers.lock() -= 1;
                    // dropping the pool shuts down and joins the workers already spawned
                    return Err(e);
                }
            }
        }
        tracing::debug!(threads, "worker pool started");
        Ok(pool)
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn state(&self) -> PoolState {
        match self.shared.state.load(Ordering::SeqCst) {
            RUNNING => PoolState::Running,
            SHUTTING_DOWN => PoolState::ShuttingDown,
            _ => PoolState::Stopped,
        }
    }

    /// Whether new jobs are accepted.
    pub fn is_accepting(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Jobs accepted whose [`InFlight`] guard is still alive.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Queue a job. Never blocks. Fails with [`RelocateError::Rejected`] once
    /// shutdown has begun.
    pub fn submit<F>(&self, job: F) -> Result<(), RelocateError>
    where
        F: FnOnce(InFlight) + Send + 'static,
    {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return Err(RelocateError::Rejected);
        };
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        if sender.send(Box::new(job)).is_err() {
            // every worker is gone; nothing will run the job
            self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(RelocateError::Rejected);
        }
        Ok(())
    }

    /// Stop accepting jobs. Accepted jobs still run. Returns true for the call
    /// that started the shutdown, false for every later call.
    pub fn shutdown(&self) -> bool {
        let mut guard = self.sender.lock();
        if guard.take().is_none() {
            return false;
        }
        self.shared.state.store(SHUTTING_DOWN, Ordering::SeqCst);
        if self.shared.in_flight.load(Ordering::SeqCst) == 0 {
            self.shared.try_stop();
        }
        tracing::info!(in_flight = self.in_flight(), "worker pool shutting down");
        true
    }

    /// Wait up to `timeout` for every worker thread to exit after shutdown.
    /// Returns false on timeout or if shutdown was never requested.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        if self.is_accepting() {
            return false;
        }
        let deadline = Instant::now() + timeout;
        {
            let mut live = self.shared.live_workers.lock();
            while *live > 0 {
                if self
                    .shared
                    .workers_exited
                    .wait_until(&mut live, deadline)
                    .timed_out()
                {
                    return *live == 0;
                }
            }
        }
        for handle in self.handles.lock().drain(..) {
            if handle.join().is_err() {
                tracing::warn!("worker thread panicked");
            }
        }
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
        let current = thread::current().id();
        for handle in self.handles.get_mut().drain(..) {
            // a worker can end up holding the last reference; it cannot join itself
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
    }
}

fn worker_loop(receiver: Receiver<Job>, shared: Arc<Shared>) {
    // recv fails once the sender is dropped and the queue is drained
    while let Ok(job) = receiver.recv() {
        job(InFlight {
            shared: Arc::clone(&shared),
        });
    }
    shared.worker_exited();
}
