use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::runtime::Handle;

/// A unit of scheduled work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Event loop that runs dispatched callbacks.
///
/// `post` must return without running `job`. No ordering is promised
/// between posted jobs.
pub trait Scheduler: Send + Sync {
    fn post(&self, job: Job);
}

/// Runs each job as its own task on a Tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn post(&self, job: Job) {
        self.handle.spawn(async move { job() });
    }
}

/// Queues jobs until the owner drains them.
///
/// Useful when the host already runs its own loop, and for tests that need
/// to see exactly what was scheduled before anything runs.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<Job>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs posted but not yet run.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run queued jobs in submission order, including any they post.
    /// Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // Release the lock before running so jobs may post more work.
            let job = self.queue.lock().pop_front();
            let Some(job) = job else { break };
            job();
            ran += 1;
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn post(&self, job: Job) {
        self.queue.lock().push_back(job);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn manual_scheduler_defers_until_drained() {
        let scheduler = ManualScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let hits = hits.clone();
            scheduler.post(Box::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 3);
        assert_eq!(scheduler.run_pending(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn tokio_scheduler_runs_jobs_on_runtime() {
        let scheduler = TokioScheduler::new(Handle::current());
        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler.post(Box::new(move || {
            let _ = tx.send(7);
        }));
        assert_eq!(rx.await.unwrap(), 7);
    }
}
