//! A bounded pool for blocking jobs.
//!
//! Jobs run on tokio's blocking threads, gated by a semaphore so that at most
//! `workers` of them execute at once. Outcomes are returned in input order no
//! matter which job finishes first.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::progress::{NoProgress, ProgressObserver};
use crate::{RasterError, RasterResult};

/// What happened to one job.
#[derive(Debug)]
pub enum JobOutcome<T> {
    /// The job ran to completion and returned a value.
    Finished(T),
    /// The job exceeded the per-job limit. It may still be running in the background.
    TimedOut(Duration),
    /// Cancellation was requested before the job was dispatched.
    Cancelled,
    /// The job panicked.
    Panicked(String),
}

impl<T> JobOutcome<T> {
    /// Converts anything but [`JobOutcome::Finished`] into the matching error.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Timeout`], [`RasterError::Cancelled`] or
    /// [`RasterError::WorkerPanicked`].
    pub fn into_result(self) -> RasterResult<T> {
        match self {
            JobOutcome::Finished(value) => Ok(value),
            JobOutcome::TimedOut(limit) => Err(RasterError::Timeout(limit)),
            JobOutcome::Cancelled => Err(RasterError::Cancelled),
            JobOutcome::Panicked(message) => Err(RasterError::WorkerPanicked(message)),
        }
    }
}

/// Fixed-size pool of blocking workers.
#[derive(Clone)]
pub struct WorkerPool {
    workers: usize,
    timeout: Option<Duration>,
    cancellation: CancellationToken,
    observer: Arc<dyn ProgressObserver>,
}

impl WorkerPool {
    /// Creates a pool running at most `workers` jobs concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] if `workers` is zero.
    pub fn new(workers: usize) -> RasterResult<Self> {
        if workers == 0 {
            return Err(RasterError::invalid("worker count must be at least 1"));
        }
        Ok(Self {
            workers,
            timeout: None,
            cancellation: CancellationToken::new(),
            observer: Arc::new(NoProgress),
        })
    }

    /// Marks a job as timed out once it has run longer than `timeout`.
    ///
    /// The blocking call itself cannot be interrupted; it keeps its worker slot
    /// until it returns, and its value is discarded.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Stops dispatching new jobs once `token` is cancelled. Running jobs finish.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets the observer notified after every finished job.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// The token that cancels this pool's runs.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Runs `work` on every job and returns the outcomes in job order.
    pub async fn run<J, T, F>(&self, jobs: Vec<J>, work: F) -> Vec<JobOutcome<T>>
    where
        J: Send + 'static,
        T: Send + 'static,
        F: Fn(J) -> T + Send + Sync + 'static,
    {
        let total = jobs.len();
        let work = Arc::new(work);
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let completed = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(total);

        for (index, job) in jobs.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                () = self.cancellation.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                log::debug!("Cancelled before dispatching job {index} of {total}");
                handles.push(None);
                continue;
            };

            let work = Arc::clone(&work);
            let blocking = tokio::task::spawn_blocking(move || {
                // Held until the job returns, even after a timeout.
                let _permit = permit;
                work(job)
            });

            let timeout = self.timeout;
            let observer = Arc::clone(&self.observer);
            let completed = Arc::clone(&completed);
            handles.push(Some(tokio::spawn(async move {
                let outcome = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, blocking).await {
                        Ok(joined) => from_join(joined),
                        Err(_) => {
                            log::warn!("Job {index} exceeded {limit:?}");
                            JobOutcome::TimedOut(limit)
                        }
                    },
                    None => from_join(blocking.await),
                };
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                observer.on_progress(done, total);
                outcome
            })));
        }

        let mut outcomes = Vec::with_capacity(total);
        for handle in handles {
            let outcome = match handle {
                Some(handle) => match handle.await {
                    Ok(outcome) => outcome,
                    Err(err) => from_join::<T>(Err(err)),
                },
                None => JobOutcome::Cancelled,
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

fn from_join<T>(joined: Result<T, JoinError>) -> JobOutcome<T> {
    match joined {
        Ok(value) => JobOutcome::Finished(value),
        Err(err) if err.is_panic() => JobOutcome::Panicked(panic_message(err.into_panic())),
        Err(_) => JobOutcome::Cancelled,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread;

    use super::*;

    #[tokio::test]
    async fn test_outcomes_keep_job_order() {
        let pool = WorkerPool::new(4).unwrap();
        let outcomes = pool
            .run(vec![40_u64, 0, 20, 5], |delay| {
                thread::sleep(Duration::from_millis(delay));
                delay * 2
            })
            .await;

        let values: Vec<_> = outcomes
            .into_iter()
            .map(|o| o.into_result().unwrap())
            .collect();
        assert_eq!(values, vec![80, 0, 40, 10]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(2).unwrap();

        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        let outcomes = pool
            .run((0..8).collect(), move |_: i32| {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(15));
                r.fetch_sub(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(outcomes.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_observer_sees_every_job() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let pool = WorkerPool::new(3)
            .unwrap()
            .observer(Arc::new(move |done: usize, total: usize| {
                sink.lock().unwrap().push((done, total));
            }));

        pool.run((0..5).collect(), |x: u8| x).await;

        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
    }

    #[tokio::test]
    async fn test_timeout_marks_job() {
        let pool = WorkerPool::new(2)
            .unwrap()
            .timeout(Duration::from_millis(30));
        let outcomes = pool
            .run(vec![0_u64, 300], |delay| {
                thread::sleep(Duration::from_millis(delay));
            })
            .await;

        assert!(matches!(outcomes[0], JobOutcome::Finished(())));
        assert!(matches!(outcomes[1], JobOutcome::TimedOut(_)));
    }

    #[tokio::test]
    async fn test_cancelled_pool_dispatches_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let pool = WorkerPool::new(2).unwrap().cancellation(token);
        let outcomes = pool.run(vec![1, 2, 3], |x: i32| x).await;
        assert!(outcomes.iter().all(|o| matches!(o, JobOutcome::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_mid_run_lets_running_jobs_finish() {
        let token = CancellationToken::new();
        let pool = WorkerPool::new(1).unwrap().cancellation(token.clone());
        let trigger = token.clone();

        let outcomes = pool
            .run(vec![0, 1, 2, 3], move |index: usize| {
                if index == 1 {
                    trigger.cancel();
                    thread::sleep(Duration::from_millis(20));
                }
                index
            })
            .await;

        assert!(matches!(outcomes[0], JobOutcome::Finished(0)));
        assert!(matches!(outcomes[1], JobOutcome::Finished(1)));
        assert!(matches!(outcomes[2], JobOutcome::Cancelled));
        assert!(matches!(outcomes[3], JobOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let pool = WorkerPool::new(2).unwrap();
        let outcomes = pool
            .run(vec![1, 2, 3], |x: i32| {
                assert!(x != 2, "job two exploded");
                x
            })
            .await;

        assert!(matches!(outcomes[0], JobOutcome::Finished(1)));
        match &outcomes[1] {
            JobOutcome::Panicked(message) => assert!(message.contains("job two exploded")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(matches!(outcomes[2], JobOutcome::Finished(3)));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(RasterError::InvalidArgument(_))
        ));
    }
}
