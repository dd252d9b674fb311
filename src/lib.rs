//! newsfeed-fetcher — periodic news ingestion with QR-code artifacts.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────────┐ RawItem ┌────────────┐ generate() ┌─────────────┐
//! │   source/    │ ──────► │  batch.rs  │ ─────────► │ artifact.rs │
//! │ (HTTP, JSON, │         │ (settle N) │ ◄───────── │  (QR, JPEG) │
//! │     RSS)     │         └────────────┘  Artifact  └─────────────┘
//! └──────────────┘               │ RenderedItem
//!        ▲                       ▼
//!        │ fetch()         ┌────────────┐ on_receive / on_error
//!        └──────────────── │ fetcher.rs │ ─────────────────────► embedding app
//!                          └────────────┘
//!                                │ arm_next()
//!                                ▼
//!                          ┌─────────────┐
//!                          │ schedule.rs │
//!                          └─────────────┘
//! ```
//!
//! * **`source/`** — the [`ItemSource`] trait, the HTTP implementation and
//!   payload decoding into [`RawItem`]s.
//! * **`artifact`** — derives a QR-code image for each item's URL.
//! * **`batch`** — runs all derivations of a cycle concurrently and decides
//!   when the batch is complete.
//! * **`schedule`** — the reload interval and the single pending timer.
//! * **`fetcher`** — ties a cycle together and broadcasts ready batches.
//! * **`registry`** — shares one fetcher between subscribers of the same URL.
//! * **`config`** — fetcher and display-module settings.
//!
//! ```ignore
//! let fetcher = Fetcher::new("https://example.com/headlines", 60_000, "UTF-8", false)?;
//! fetcher.on_receive(|f| println!("{} items", f.items().len()));
//! fetcher.on_error(|f, e| eprintln!("{}: {e}", f.url()));
//! fetcher.start_fetch();
//! ```

pub mod artifact;
pub mod batch;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod registry;
pub mod schedule;
pub mod source;

pub use artifact::{Artifact, ArtifactGenerator, QrCodeGenerator};
pub use batch::{assemble, BatchState, RenderedItem};
pub use config::{FeedConfig, FetcherConfig, NewsfeedConfig};
pub use error::{ArtifactError, ConfigError, FetchError};
pub use fetcher::{ErrorCallback, Fetcher, ReceiveCallback};
pub use registry::FeedRegistry;
pub use schedule::{ReloadInterval, ReloadTimer, MIN_RELOAD_INTERVAL_MS};
pub use source::{HttpSource, ItemSource, RawItem};
