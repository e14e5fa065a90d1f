use std::future::{self, Future};
use std::task::Poll;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Fixed-period schedule, checked by polling
#[derive(Debug, Clone)]
pub struct Schedule {
    period: Duration,
    next_due: Instant,
}

impl Schedule {
    /// First run is due one period after `last_run`.
    pub fn after(last_run: Instant, period: Duration) -> Self {
        Self {
            period,
            next_due: last_run + period,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    pub fn mark_ran(&mut self, now: Instant) {
        self.next_due = now + self.period;
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }
}

/// Runs `job` now and then once per period until `shutdown` resolves.
///
/// `shutdown` is polled once before the first run so signal listeners are
/// armed while it runs; after that it is only observed between runs.
pub async fn run_forever<J, Fut, S>(period: Duration, poll: Duration, shutdown: S, mut job: J) -> usize
where
    J: FnMut() -> Fut,
    Fut: Future,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let stopped = future::poll_fn(|cx| Poll::Ready(shutdown.as_mut().poll(cx).is_ready())).await;
    if stopped {
        info!("Shutdown requested before the first check");
        return 0;
    }

    job().await;
    let mut runs = 1;
    let mut schedule = Schedule::after(Instant::now(), period);
    info!("Next check in {}s", period.as_secs());

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping scheduler");
                break;
            }
            _ = tokio::time::sleep(poll) => {
                let now = Instant::now();
                if schedule.is_due(now) {
                    job().await;
                    runs += 1;
                    schedule.mark_ran(Instant::now());
                } else {
                    debug!("Next check in {}s", schedule.next_due().saturating_duration_since(now).as_secs());
                }
            }
        }
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::oneshot;
    use std::sync::Arc;

    #[test]
    fn test_schedule_due_after_period() {
        let start = Instant::now();
        let mut schedule = Schedule::after(start, Duration::from_secs(60));

        assert!(!schedule.is_due(start + Duration::from_secs(59)));
        assert!(schedule.is_due(start + Duration::from_secs(60)));

        schedule.mark_ran(start + Duration::from_secs(61));
        assert!(!schedule.is_due(start + Duration::from_secs(120)));
        assert!(schedule.is_due(start + Duration::from_secs(121)));
    }

    #[tokio::test]
    async fn test_runs_immediately_then_periodically() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let runs = run_forever(
            Duration::from_millis(20),
            Duration::from_millis(5),
            tokio::time::sleep(Duration::from_millis(150)),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        )
        .await;

        assert_eq!(runs, count.load(Ordering::SeqCst));
        assert!(runs >= 2);
    }

    #[tokio::test]
    async fn test_shutdown_before_start_skips_run() {
        let runs = run_forever(Duration::from_secs(3600), Duration::from_millis(5), async {}, || async {}).await;
        assert_eq!(runs, 0);
    }

    #[tokio::test]
    async fn test_shutdown_is_armed_during_first_run() {
        let armed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel::<()>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let shutdown = {
            let armed = armed.clone();
            async move {
                armed.store(true, Ordering::SeqCst);
                let _ = rx.await;
            }
        };

        let runs = run_forever(Duration::from_secs(3600), Duration::from_millis(5), shutdown, || {
            let armed = armed.clone();
            let tx = tx.clone();
            async move {
                assert!(armed.load(Ordering::SeqCst));
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(());
                }
            }
        })
        .await;

        assert_eq!(runs, 1);
    }
}
