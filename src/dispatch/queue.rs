//! Bounded confirmation queue
//!
//! A fixed-size worker pool (semaphore permits) plus explicit counters of
//! running and waiting tasks. The counters are what the dispatcher looks at
//! before admitting more work, so submission slows down when confirmation
//! falls behind instead of letting the backlog grow without bound.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::trace;

/// How full the queue is relative to its concurrency limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pressure {
    /// Below 70%
    Clear,
    /// 70% or more: one extra pacing delay before the next submission
    Elevated,
    /// 90% or more: hold submissions until the queue drains below 90%
    Saturated,
}

impl Pressure {
    /// Classify `depth` (running + waiting) against `limit`
    pub fn classify(depth: usize, limit: usize) -> Self {
        if depth * 10 >= limit * 9 {
            Pressure::Saturated
        } else if depth * 10 >= limit * 7 {
            Pressure::Elevated
        } else {
            Pressure::Clear
        }
    }
}

/// Semaphore-bounded task queue with depth accounting
#[derive(Debug, Clone)]
pub struct ConfirmationQueue {
    permits: Arc<Semaphore>,
    running: Arc<AtomicUsize>,
    waiting: Arc<AtomicUsize>,
    limit: usize,
}

impl ConfirmationQueue {
    /// Create a queue running at most `limit` tasks at once (`limit >= 1`)
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            running: Arc::new(AtomicUsize::new(0)),
            waiting: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Tasks currently holding a permit
    pub fn pending(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Tasks admitted but waiting for a permit
    pub fn queued(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// `pending + queued`
    pub fn depth(&self) -> usize {
        self.pending() + self.queued()
    }

    pub fn pressure(&self) -> Pressure {
        Pressure::classify(self.depth(), self.limit)
    }

    /// Admit a task. It is counted as queued before this returns, so the
    /// next depth check already sees it.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.waiting.fetch_add(1, Ordering::SeqCst);

        let permits = self.permits.clone();
        let running = self.running.clone();
        let waiting = self.waiting.clone();

        tokio::spawn(async move {
            // The semaphore is never closed; a closed one would just mean no bound.
            let _permit = permits.acquire_owned().await.ok();
            waiting.fetch_sub(1, Ordering::SeqCst);
            running.fetch_add(1, Ordering::SeqCst);
            let _running = scopeguard::guard(running, |running| {
                running.fetch_sub(1, Ordering::SeqCst);
            });

            task.await
        })
    }

    /// Hold the caller while the queue is saturated, polling every `poll`,
    /// then add one `pace` delay if it is still elevated.
    ///
    /// Returns the pressure observed on entry.
    pub async fn apply_backpressure(&self, poll: Duration, pace: Duration) -> Pressure {
        let observed = self.pressure();

        let mut pressure = observed;
        while pressure == Pressure::Saturated {
            trace!(depth = self.depth(), limit = self.limit, "Queue saturated, holding submissions");
            tokio::time::sleep(poll).await;
            pressure = self.pressure();
        }

        if pressure == Pressure::Elevated {
            tokio::time::sleep(pace).await;
        }

        observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_pressure_thresholds() {
        assert_eq!(Pressure::classify(0, 10), Pressure::Clear);
        assert_eq!(Pressure::classify(6, 10), Pressure::Clear);
        assert_eq!(Pressure::classify(7, 10), Pressure::Elevated);
        assert_eq!(Pressure::classify(8, 10), Pressure::Elevated);
        assert_eq!(Pressure::classify(9, 10), Pressure::Saturated);
        assert_eq!(Pressure::classify(10, 10), Pressure::Saturated);
        // 90% of 90 is 81
        assert_eq!(Pressure::classify(80, 90), Pressure::Elevated);
        assert_eq!(Pressure::classify(81, 90), Pressure::Saturated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let queue = ConfirmationQueue::new(2);
        let peak = Arc::new(AtomicUsize::new(0));
        let current = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let peak = peak.clone();
                let current = current.clone();
                queue.spawn(async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        assert_eq!(queue.depth(), 6);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturated_queue_holds_until_drained() {
        let queue = ConfirmationQueue::new(10);
        for _ in 0..9 {
            queue.spawn(tokio::time::sleep(Duration::from_secs(2)));
        }

        let started = Instant::now();
        let observed = queue
            .apply_backpressure(Duration::from_millis(100), Duration::from_millis(50))
            .await;

        assert_eq!(observed, Pressure::Saturated);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(queue.depth() < 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elevated_queue_adds_pace_delay() {
        let queue = ConfirmationQueue::new(10);
        for _ in 0..7 {
            queue.spawn(tokio::time::sleep(Duration::from_secs(60)));
        }

        let started = Instant::now();
        let observed = queue
            .apply_backpressure(Duration::from_millis(100), Duration::from_millis(50))
            .await;

        assert_eq!(observed, Pressure::Elevated);
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_queue_does_not_wait() {
        let queue = ConfirmationQueue::new(10);
        queue.spawn(tokio::time::sleep(Duration::from_secs(60)));

        let started = Instant::now();
        let observed = queue
            .apply_backpressure(Duration::from_millis(100), Duration::from_millis(50))
            .await;

        assert_eq!(observed, Pressure::Clear);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
