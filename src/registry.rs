//! One fetcher per distinct source URL.
//!
//! Several display widgets can point at the same feed. Instead of polling it
//! once per widget, the registry keeps a single [`Fetcher`] per URL; a later
//! subscriber can only make it reload faster.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::artifact::{ArtifactGenerator, QrCodeGenerator};
use crate::config::FetcherConfig;
use crate::error::{ConfigError, FetchError};
use crate::fetcher::{ErrorCallback, Fetcher, ReceiveCallback};
use crate::source::HttpSource;

/// Shared fetchers with common callbacks.
pub struct FeedRegistry {
    client: reqwest::Client,
    generator: Arc<dyn ArtifactGenerator>,
    on_receive: ReceiveCallback,
    on_error: ErrorCallback,
    fetchers: Mutex<HashMap<String, Fetcher>>,
}

impl FeedRegistry {
    /// Every fetcher created by the registry reports to these callbacks.
    pub fn new<R, E>(on_receive: R, on_error: E) -> Self
    where
        R: Fn(&Fetcher) + Send + Sync + 'static,
        E: Fn(&Fetcher, &FetchError) + Send + Sync + 'static,
    {
        Self {
            client: reqwest::Client::new(),
            generator: Arc::new(QrCodeGenerator),
            on_receive: Arc::new(on_receive),
            on_error: Arc::new(on_error),
            fetchers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn ArtifactGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Get the fetcher for `config.url`, creating and starting it if needed.
    ///
    /// A new fetcher starts its first cycle immediately. An existing one has
    /// its interval shrunk to `config.reload_interval_ms` where allowed and
    /// re-broadcasts its current items so the new subscriber is served
    /// without waiting for the next cycle.
    pub fn subscribe(&self, config: &FetcherConfig) -> Result<Fetcher, ConfigError> {
        let mut fetchers = self.fetchers.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = fetchers.get(&config.url).cloned();
        if let Some(existing) = existing {
            drop(fetchers);
            existing.set_reload_interval(config.reload_interval_ms);
            existing.broadcast_items();
            return Ok(existing);
        }

        let source = HttpSource::with_client(config, self.client.clone())?;
        let fetcher = Fetcher::with_parts(
            Arc::new(source),
            Arc::clone(&self.generator),
            config.reload_interval_ms,
        );

        let on_receive = Arc::clone(&self.on_receive);
        fetcher.on_receive(move |f| on_receive(f));
        let on_error = Arc::clone(&self.on_error);
        fetcher.on_error(move |f, e| on_error(f, e));

        fetchers.insert(config.url.clone(), fetcher.clone());
        drop(fetchers);

        tracing::info!(
            url = %config.url,
            interval = ?fetcher.reload_interval(),
            "Created fetcher"
        );
        fetcher.start_fetch();
        Ok(fetcher)
    }

    pub fn get(&self, url: &str) -> Option<Fetcher> {
        self.fetchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.fetchers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every fetcher and forget them.
    pub fn stop_all(&self) {
        let fetchers: Vec<Fetcher> = self
            .fetchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, fetcher)| fetcher)
            .collect();
        for fetcher in fetchers {
            fetcher.stop();
        }
    }
}
