//! Reload scheduling.
//!
//! A fetcher re-arms a one-shot timer after every cycle instead of looping,
//! so there is never more than one pending reload and nothing is scheduled
//! while a batch is still settling.
//!
//! * [`ReloadInterval`] holds the delay between cycles. It is floored at one
//!   second and can only shrink after construction, so the fastest consumer
//!   sharing a fetcher wins without anyone hammering the source.
//! * [`ReloadTimer`] owns the single pending timer. Arming cancels whatever
//!   was pending before.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Lowest permitted reload interval in milliseconds.
pub const MIN_RELOAD_INTERVAL_MS: u64 = 1000;

/// Delay between fetch cycles.
#[derive(Debug)]
pub struct ReloadInterval {
    ms: AtomicU64,
}

impl ReloadInterval {
    /// Values below [`MIN_RELOAD_INTERVAL_MS`] are raised to it.
    pub fn new(ms: u64) -> Self {
        Self {
            ms: AtomicU64::new(ms.max(MIN_RELOAD_INTERVAL_MS)),
        }
    }

    pub fn millis(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }

    pub fn get(&self) -> Duration {
        Duration::from_millis(self.millis())
    }

    /// Replace the interval iff `MIN_RELOAD_INTERVAL_MS < ms < current`.
    ///
    /// Returns whether the interval changed.
    pub fn shrink(&self, ms: u64) -> bool {
        self.ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (ms > MIN_RELOAD_INTERVAL_MS && ms < current).then_some(ms)
            })
            .is_ok()
    }
}

/// Holder of the one pending reload.
#[derive(Debug, Default)]
pub struct ReloadTimer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl ReloadTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending timer, then run `fire` once after `delay`.
    ///
    /// `fire` runs on the timer task and should only hand work off (e.g.
    /// spawn the next cycle), so re-arming from inside that work never
    /// aborts a running cycle. Must be called within a tokio runtime.
    pub fn arm<F>(&self, delay: Duration, fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        tracing::debug!(delay = ?delay, "Schedule update timer");
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire();
        }));
    }

    /// Cancel the pending timer, if any.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
    }

    /// Whether a timer is armed and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ReloadTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn short_intervals_are_clamped() {
        assert_eq!(ReloadInterval::new(0).millis(), 1000);
        assert_eq!(ReloadInterval::new(999).millis(), 1000);
        assert_eq!(ReloadInterval::new(1000).millis(), 1000);
        assert_eq!(ReloadInterval::new(60_000).get(), Duration::from_secs(60));
    }

    #[test]
    fn shrink_only_accepts_faster_legal_values() {
        let interval = ReloadInterval::new(10_000);

        assert!(!interval.shrink(20_000), "slower is ignored");
        assert!(!interval.shrink(10_000), "equal is ignored");
        assert!(!interval.shrink(1000), "the floor itself is not accepted");
        assert!(!interval.shrink(500));
        assert_eq!(interval.millis(), 10_000);

        assert!(interval.shrink(5000));
        assert_eq!(interval.millis(), 5000);
    }

    proptest! {
        #[test]
        fn shrink_is_monotonic_and_floored(
            start in 0u64..200_000,
            requests in proptest::collection::vec(0u64..200_000, 0..50),
        ) {
            let interval = ReloadInterval::new(start);
            let mut previous = interval.millis();
            for ms in requests {
                let changed = interval.shrink(ms);
                let current = interval.millis();
                prop_assert_eq!(changed, ms > MIN_RELOAD_INTERVAL_MS && ms < previous);
                prop_assert!(current <= previous);
                prop_assert!(current >= MIN_RELOAD_INTERVAL_MS);
                previous = current;
            }
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let make = {
            let fired = Arc::clone(&fired);
            move || {
                let fired = Arc::clone(&fired);
                Box::new(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }) as Box<dyn FnOnce() + Send>
            }
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let timer = ReloadTimer::new();
        let (fired, make) = counter();

        timer.arm(Duration::from_secs(5), make());
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn arming_with_huge_delay_logs_and_cancels() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let timer = ReloadTimer::new();
        let (fired, make) = counter();

        timer.arm(Duration::MAX, make());
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_secs(86_400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        timer.cancel();
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_pending_timer() {
        let timer = ReloadTimer::new();
        let (fired, make) = counter();

        timer.arm(Duration::from_secs(5), make());
        timer.arm(Duration::from_secs(5), make());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let timer = ReloadTimer::new();
        let (fired, make) = counter();

        timer.arm(Duration::from_secs(1), make());
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timer.is_pending());
    }
}
