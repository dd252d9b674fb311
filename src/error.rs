//! Error types for fetching, artifact rendering and configuration.
//!
//! Only [`FetchError`] ever leaves the crate through a callback. Artifact
//! failures are absorbed per item by the batch assembler and configuration
//! errors surface at construction time.

use thiserror::Error;

/// Errors that end a single fetch cycle.
///
/// Every variant is reported through the fetcher's error callback and the
/// next cycle is scheduled as usual.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Payload is neither an item list nor a feed document
    #[error("Unusable payload: {0}")]
    Payload(String),
    /// Failure reported by a custom item source
    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

/// Errors from deriving the image artifact of a single item.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The reference could not be represented as a QR code
    #[error("Cannot encode {url:?} as QR code: {reason}")]
    Encoding { url: String, reason: String },
    /// Rasterising or compressing the code failed
    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    /// The item carries no reference to encode
    #[error("Item has no reference URL")]
    MissingReference,
    /// The blocking render task panicked or was cancelled
    #[error("Render task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),
}
