//! Background decode pool.
//!
//! A fixed set of worker threads pulling jobs from one FIFO queue. The queue
//! can be cleared at any time: every job queued before the clear is dropped
//! without running, jobs already running are left to finish, and jobs
//! submitted afterwards run normally.
//!
//! Clearing bumps a generation counter under the same lock that guards
//! submission and drains the channel. Workers compare a job's generation
//! with the current one right before running it, so a job that was already
//! pulled off the channel but not started is dropped as well.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Queued {
    generation: u64,
    job: Job,
}

/// Handle on the outcome of one submitted job.
///
/// Dropping the ticket does not cancel the job; the result is simply discarded.
pub struct JobTicket<T> {
    result: Receiver<T>,
}

impl<T> JobTicket<T> {
    /// A ticket for a job that will never run.
    pub fn discarded() -> Self {
        let (_, result) = crossbeam_channel::bounded(1);
        Self { result }
    }

    /// Block until the job finishes. `None` when it was cleared or the pool stopped.
    pub fn wait(self) -> Option<T> {
        self.result.recv().ok()
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Option<T>, Self> {
        match self.result.recv_timeout(timeout) {
            Ok(value) => Ok(Some(value)),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
            Err(RecvTimeoutError::Timeout) => Err(self),
        }
    }

    /// The result, if the job already finished.
    pub fn try_result(&self) -> Option<T> {
        match self.result.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

/// Fixed-size worker pool with a clearable FIFO queue.
pub struct WorkerPool {
    sender: Option<Sender<Queued>>,
    /// Second handle on the queue, used to drain it on clear.
    drain: Receiver<Queued>,
    generation: Arc<AtomicU64>,
    submit_lock: Mutex<()>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` worker threads (at least one).
    pub fn new(size: usize) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Queued>();
        let generation = Arc::new(AtomicU64::new(0));

        let workers = (0..size.max(1))
            .map(|index| {
                let receiver = receiver.clone();
                let generation = Arc::clone(&generation);
                thread::Builder::new()
                    .name(format!("vitrine-decode-{}", index))
                    .spawn(move || worker_loop(receiver, generation))
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        debug!(workers = workers.len(), "worker pool started");

        Ok(Self {
            sender: Some(sender),
            drain: receiver,
            generation,
            submit_lock: Mutex::new(()),
            workers,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Jobs waiting in the queue.
    pub fn pending(&self) -> usize {
        self.drain.len()
    }

    /// Queue `f` behind every job already submitted. Never blocks on the work itself.
    pub fn submit<F, T>(&self, f: F) -> JobTicket<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result) = crossbeam_channel::bounded(1);
        let job: Job = Box::new(move || {
            // The ticket may be gone already; fire-and-forget callers drop it
            let _ = result_tx.send(f());
        });

        let _guard = self.submit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = &self.sender {
            let queued = Queued {
                generation: self.generation.load(Ordering::SeqCst),
                job,
            };
            if sender.send(queued).is_err() {
                warn!("worker pool is gone, job dropped");
            }
        }

        JobTicket { result }
    }

    /// Drop every queued job that has not started. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let _guard = self.submit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);

        let mut dropped = 0;
        while self.drain.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "cleared pending jobs");
        }
        dropped
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Pending work is abandoned, running jobs finish
        self.clear();
        self.sender.take();

        let current = thread::current().id();
        for handle in self.workers.drain(..) {
            // The last owner can be a job running on one of our own workers
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
        debug!("worker pool stopped");
    }
}

fn worker_loop(receiver: Receiver<Queued>, generation: Arc<AtomicU64>) {
    for queued in receiver.iter() {
        if queued.generation != generation.load(Ordering::SeqCst) {
            continue;
        }
        if panic::catch_unwind(AssertUnwindSafe(queued.job)).is_err() {
            warn!("decode job panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const TIMEOUT: Duration = Duration::from_secs(10);

    /// Occupy every worker of `pool` until the returned sender is dropped.
    fn block_workers(pool: &WorkerPool) -> Sender<()> {
        let (release_tx, release_rx) = crossbeam_channel::unbounded::<()>();
        let (started_tx, started_rx) = crossbeam_channel::unbounded::<()>();
        for _ in 0..pool.size() {
            let release_rx = release_rx.clone();
            let started_tx = started_tx.clone();
            pool.submit(move || {
                started_tx.send(()).unwrap();
                let _ = release_rx.recv();
            });
        }
        for _ in 0..pool.size() {
            started_rx.recv_timeout(TIMEOUT).unwrap();
        }
        release_tx
    }

    #[test]
    fn test_submit_returns_result() {
        let pool = WorkerPool::new(2).unwrap();
        let ticket = pool.submit(|| 6 * 7);
        assert_eq!(ticket.wait(), Some(42));
    }

    #[test]
    fn test_fifo_on_single_worker() {
        let pool = WorkerPool::new(1).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let tickets: Vec<_> = (0..5)
            .map(|i| {
                let order = Arc::clone(&order);
                pool.submit(move || order.lock().unwrap().push(i))
            })
            .collect();
        for ticket in tickets {
            ticket.wait().unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_clear_drops_queued_jobs_only() {
        let pool = WorkerPool::new(1).unwrap();
        let release = block_workers(&pool);
        let ran = Arc::new(AtomicUsize::new(0));

        let queued: Vec<_> = (0..3)
            .map(|_| {
                let ran = Arc::clone(&ran);
                pool.submit(move || ran.fetch_add(1, Ordering::SeqCst))
            })
            .collect();
        assert_eq!(pool.pending(), 3);

        assert_eq!(pool.clear(), 3);
        assert_eq!(pool.pending(), 0);

        let after = {
            let ran = Arc::clone(&ran);
            pool.submit(move || ran.fetch_add(1, Ordering::SeqCst))
        };
        drop(release);

        assert_eq!(after.wait_timeout(TIMEOUT).ok().flatten(), Some(0));
        for ticket in queued {
            assert_eq!(ticket.wait(), None);
        }
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_does_not_interrupt_running_job() {
        let pool = WorkerPool::new(1).unwrap();
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);

        let running = pool.submit(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            "done"
        });
        started_rx.recv_timeout(TIMEOUT).unwrap();

        assert_eq!(pool.clear(), 0);
        release_tx.send(()).unwrap();
        assert_eq!(running.wait(), Some("done"));
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(1).unwrap();
        let failed: JobTicket<()> = pool.submit(|| panic!("corrupt file"));
        assert_eq!(failed.wait(), None);
        assert_eq!(pool.submit(|| 1).wait(), Some(1));
    }

    #[test]
    fn test_discarded_ticket() {
        let ticket: JobTicket<u8> = JobTicket::discarded();
        assert!(ticket.try_result().is_none());
        assert_eq!(ticket.wait(), None);
    }

    #[test]
    fn test_zero_size_pool_has_one_worker() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn test_drop_abandons_pending_jobs() {
        let pool = WorkerPool::new(1).unwrap();
        let release = block_workers(&pool);
        let pending = pool.submit(|| ());

        // Release the worker from another thread once drop has cleared the queue
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(release);
        });
        drop(pool);
        releaser.join().unwrap();

        assert_eq!(pending.wait(), None);
    }
}
