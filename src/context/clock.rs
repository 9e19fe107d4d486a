use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Notify;

pub type Sleep<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Source of "now" for query timestamps and deadlines.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Resolves once [`now`](Clock::now) has reached `deadline`.
    fn sleep_until(&self, deadline: DateTime<Utc>) -> Sleep<'_>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep_until(&self, deadline: DateTime<Utc>) -> Sleep<'_> {
        let remaining = (deadline - self.now()).to_std().unwrap_or_default();
        Box::pin(tokio::time::sleep_until(tokio::time::Instant::now() + remaining))
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }

    /// Time never moves, so a future deadline is never reached.
    fn sleep_until(&self, deadline: DateTime<Utc>) -> Sleep<'_> {
        let reached = self.0 >= deadline;
        Box::pin(async move {
            if !reached {
                std::future::pending::<()>().await;
            }
        })
    }
}

#[derive(Debug)]
struct ManualTime {
    now: Mutex<DateTime<Utc>>,
    moved: Notify,
}

/// A clock tests can move by hand. Clones share the same instant, and
/// moving it wakes every pending [`sleep_until`](Clock::sleep_until).
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<ManualTime>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(ManualTime {
                now: Mutex::new(start),
                moved: Notify::new(),
            }),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.time.now.lock() = instant;
        self.time.moved.notify_waiters();
    }

    pub fn advance(&self, by: Duration) {
        *self.time.now.lock() += by;
        self.time.moved.notify_waiters();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.now.lock()
    }

    fn sleep_until(&self, deadline: DateTime<Utc>) -> Sleep<'_> {
        Box::pin(async move {
            loop {
                let moved = self.time.moved.notified();
                tokio::pin!(moved);
                // register before reading the time so a concurrent move is not missed
                moved.as_mut().enable();
                if self.now() >= deadline {
                    return;
                }
                moved.await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let shared = clock.clone();

        shared.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start + Duration::seconds(90));

        clock.set(start);
        assert_eq!(shared.now(), start);
    }

    #[test]
    fn test_fixed_clock() {
        let instant = Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(FixedClock(instant).now(), instant);
    }

    #[tokio::test]
    async fn test_manual_clock_wakes_sleepers() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let sleeper = {
            let clock = clock.clone();
            tokio::spawn(async move { clock.sleep_until(start + Duration::hours(1)).await })
        };

        tokio::task::yield_now().await;
        clock.advance(Duration::minutes(30));
        tokio::task::yield_now().await;
        assert!(!sleeper.is_finished());

        clock.advance(Duration::minutes(30));
        tokio::time::timeout(std::time::Duration::from_secs(5), sleeper)
            .await
            .expect("sleeper woke")
            .unwrap();
    }

    #[tokio::test]
    async fn test_fixed_clock_past_deadline_returns() {
        let instant = Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap();
        FixedClock(instant).sleep_until(instant).await;
    }
}
