//! The fetcher: fetch cycle, scheduling and broadcast for one source.
//!
//! ```text
//!  start_fetch() ──► source.fetch() ──ok──► assemble() ──► replace items ──► on_receive
//!        ▲                 │                                                    │
//!        │                 └──err──► on_error ───────────────┐                  │
//!        │                                                   ▼                  ▼
//!        └──────────────── ReloadTimer (after interval) ◄── arm_next() ◄────────┘
//! ```
//!
//! A cycle always ends in [`Fetcher::arm_next`], on success, on failure and
//! even if a callback panics, so the fetcher keeps reloading indefinitely
//! until [`Fetcher::stop`] is called or the last handle is dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use crate::artifact::{ArtifactGenerator, QrCodeGenerator};
use crate::batch::{assemble, RenderedItem};
use crate::config::FetcherConfig;
use crate::error::{ConfigError, FetchError};
use crate::schedule::{ReloadInterval, ReloadTimer};
use crate::source::{HttpSource, ItemSource};

/// Called with the fetcher when a new batch is ready.
pub type ReceiveCallback = Arc<dyn Fn(&Fetcher) + Send + Sync>;

/// Called with the fetcher and the error when a cycle fails.
pub type ErrorCallback = Arc<dyn Fn(&Fetcher, &FetchError) + Send + Sync>;

/// Periodically fetches one source and broadcasts the rendered items.
///
/// `Fetcher` is a cheap handle; clones share the same state, timer and
/// callbacks. All methods that start work must be called from within a
/// tokio runtime.
#[derive(Clone)]
pub struct Fetcher {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn ItemSource>,
    generator: Arc<dyn ArtifactGenerator>,
    interval: ReloadInterval,
    timer: ReloadTimer,
    items: RwLock<Arc<Vec<RenderedItem>>>,
    on_receive: Mutex<Option<ReceiveCallback>>,
    on_error: Mutex<Option<ErrorCallback>>,
    in_flight: AtomicBool,
    stopped: AtomicBool,
}

impl Fetcher {
    /// Fetcher for an HTTP endpoint with QR-code artifacts.
    ///
    /// * `url` — endpoint returning a JSON item list or an RSS document.
    /// * `reload_interval_ms` — delay between cycles, at least 1000.
    /// * `encoding` — text encoding label for RSS documents.
    /// * `log_feed_warnings` — warn about items with missing fields.
    pub fn new(
        url: impl Into<String>,
        reload_interval_ms: u64,
        encoding: impl Into<String>,
        log_feed_warnings: bool,
    ) -> Result<Self, ConfigError> {
        Self::from_config(&FetcherConfig {
            url: url.into(),
            reload_interval_ms,
            encoding: encoding.into(),
            log_feed_warnings,
        })
    }

    pub fn from_config(config: &FetcherConfig) -> Result<Self, ConfigError> {
        let source = HttpSource::new(config)?;
        Ok(Self::with_parts(
            Arc::new(source),
            Arc::new(QrCodeGenerator),
            config.reload_interval_ms,
        ))
    }

    /// Assemble a fetcher from custom parts.
    pub fn with_parts(
        source: Arc<dyn ItemSource>,
        generator: Arc<dyn ArtifactGenerator>,
        reload_interval_ms: u64,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                generator,
                interval: ReloadInterval::new(reload_interval_ms),
                timer: ReloadTimer::new(),
                items: RwLock::new(Arc::new(Vec::new())),
                on_receive: Mutex::new(None),
                on_error: Mutex::new(None),
                in_flight: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    // -- scheduling ------------------------------------------------------------

    /// Speed up reloading, never slow it down.
    ///
    /// Takes effect from the next armed timer. Returns whether the interval
    /// changed.
    pub fn set_reload_interval(&self, interval_ms: u64) -> bool {
        let changed = self.inner.interval.shrink(interval_ms);
        if changed {
            tracing::debug!(url = %self.url(), interval_ms, "Reload interval shortened");
        }
        changed
    }

    pub fn reload_interval(&self) -> Duration {
        self.inner.interval.get()
    }

    /// Run a fetch cycle now.
    ///
    /// Ignored while a cycle is still in flight, so at most one batch per
    /// fetcher is ever settling. Clears a previous [`stop`](Self::stop).
    pub fn start_fetch(&self) {
        // Cleared first so a cycle still in flight re-arms when it ends.
        self.inner.stopped.store(false, Ordering::SeqCst);
        if self.inner.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!(url = %self.url(), "Fetch already in flight, ignoring start");
            return;
        }

        let fetcher = self.clone();
        tokio::spawn(async move {
            let _guard = CycleGuard(&fetcher);
            fetcher.run_cycle().await;
        });
    }

    /// Cancel any pending timer and schedule the next cycle after the
    /// current interval. Does nothing after [`stop`](Self::stop).
    pub fn arm_next(&self) {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.timer.arm(self.inner.interval.get(), move || {
            if let Some(inner) = weak.upgrade() {
                Fetcher { inner }.start_fetch();
            }
        });
    }

    /// Cancel the pending timer. A cycle already in flight finishes but does
    /// not schedule another one.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.timer.cancel();
        tracing::debug!(url = %self.url(), "Fetcher stopped");
    }

    /// Whether a cycle is currently fetching or settling its batch.
    pub fn is_fetching(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Whether a reload timer is armed.
    pub fn is_scheduled(&self) -> bool {
        self.inner.timer.is_pending()
    }

    async fn run_cycle(&self) {
        let raw = match self.inner.source.fetch().await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(url = %self.url(), error = %e, "Fetch failed");
                self.notify_error(&e);
                return;
            }
        };

        let expected = raw.len();
        let batch = assemble(raw, Arc::clone(&self.inner.generator)).await;
        if batch.is_empty() {
            tracing::debug!(url = %self.url(), "No items to broadcast yet");
            return;
        }

        let fallbacks = batch.iter().filter(|i| i.is_fallback()).count();
        *self.inner.items.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(batch);
        tracing::info!(url = %self.url(), items = expected, fallbacks, "Batch ready");

        self.broadcast_items();
    }

    // -- broadcast -------------------------------------------------------------

    /// Register the "items received" callback, replacing any previous one.
    pub fn on_receive<F>(&self, callback: F)
    where
        F: Fn(&Fetcher) + Send + Sync + 'static,
    {
        *self
            .inner
            .on_receive
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Register the "fetch failed" callback, replacing any previous one.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&Fetcher, &FetchError) + Send + Sync + 'static,
    {
        *self
            .inner
            .on_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Invoke the receive callback if there is anything to show.
    pub fn broadcast_items(&self) {
        if self.items().is_empty() {
            return;
        }
        let callback = self
            .inner
            .on_receive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(self);
        }
    }

    fn notify_error(&self, error: &FetchError) {
        let callback = self
            .inner
            .on_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(self, error);
        }
    }

    // -- accessors -------------------------------------------------------------

    pub fn url(&self) -> &str {
        self.inner.source.url()
    }

    /// The last completed batch.
    pub fn items(&self) -> Arc<Vec<RenderedItem>> {
        Arc::clone(&self.inner.items.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("url", &self.url())
            .field("reload_interval", &self.reload_interval())
            .field("items", &self.items().len())
            .field("fetching", &self.is_fetching())
            .finish()
    }
}

/// Ends a cycle: clears the in-flight flag and arms the next timer, also
/// when the cycle unwinds from a panicking callback.
struct CycleGuard<'a>(&'a Fetcher);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.inner.in_flight.store(false, Ordering::SeqCst);
        self.0.arm_next();
    }
}
