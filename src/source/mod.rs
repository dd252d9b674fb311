//! Item source abstraction layer.
//!
//! This module defines the [`ItemSource`] trait and the common [`RawItem`]
//! type. The HTTP implementation lives in [`http`]; payload decoding (JSON
//! item lists and RSS documents) lives in [`payload`] so it can be tested
//! without a network.
//!
//! ## Adding a new source
//!
//! 1. Define a struct holding whatever the source needs (URL, client, ...).
//! 2. Implement [`ItemSource`] for it and return [`RawItem`] values.
//! 3. Hand it to [`Fetcher::with_parts`](crate::Fetcher::with_parts).
//!
//! Scheduling, artifact derivation and broadcasting are source-agnostic.

mod http;
mod payload;
mod raw_item;

pub use http::HttpSource;
pub use payload::{parse_payload, strip_html};
pub use raw_item::RawItem;

use async_trait::async_trait;

use crate::error::FetchError;

/// Trait that every item source must implement.
///
/// The fetcher calls [`fetch()`](ItemSource::fetch) once per cycle from a
/// tokio task, so implementations must be [`Send`] and [`Sync`].
///
/// ```ignore
/// struct Fixed(Vec<RawItem>);
///
/// #[async_trait]
/// impl ItemSource for Fixed {
///     fn url(&self) -> &str { "memory://fixed" }
///
///     async fn fetch(&self) -> Result<Vec<RawItem>, FetchError> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Identity of the endpoint this source reads from.
    fn url(&self) -> &str;

    /// Retrieve the current item list.
    ///
    /// An error ends the cycle and is reported through the fetcher's error
    /// callback; the next cycle is scheduled normally.
    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError>;
}
