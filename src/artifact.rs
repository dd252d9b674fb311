//! QR-code artifacts for feed items.
//!
//! Each rendered item carries a scannable code pointing at its article. The
//! code is rasterised to a small greyscale JPEG and embedded as a data URI so
//! the display side needs no extra requests.

use std::io::Cursor;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, Luma};
use qrcode::{EcLevel, QrCode};

use crate::error::ArtifactError;

/// Display size of every artifact, in CSS pixels.
pub const ARTIFACT_SIZE: u32 = 150;

/// JPEG quality (0-100). Low on purpose: codes stay scannable and the data
/// URI stays small.
pub const JPEG_QUALITY: u8 = 30;

/// An embeddable image encoding one reference URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// The URL the image encodes.
    pub reference_url: String,
    /// `data:image/jpeg;base64,...`
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

impl Artifact {
    /// `<img>` tag for HTML-based displays.
    pub fn embed_html(&self) -> String {
        format!(
            "<img class='qrcode' src='{}' alt='{}' height='{}' width='{}'>",
            self.data_uri,
            self.reference_url.replace('\'', "&#39;"),
            self.height,
            self.width
        )
    }
}

/// Derives the artifact for a single item.
///
/// Implementations must be independent per call: the batch assembler fires
/// one call per item without waiting for the others.
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate(&self, reference_url: &str) -> Result<Artifact, ArtifactError>;
}

/// Renders QR codes at error-correction level H.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrCodeGenerator;

impl QrCodeGenerator {
    /// Synchronous rendering; [`generate`](ArtifactGenerator::generate) runs
    /// this on the blocking pool.
    pub fn render(reference_url: &str) -> Result<Artifact, ArtifactError> {
        let code = QrCode::with_error_correction_level(reference_url.as_bytes(), EcLevel::H)
            .map_err(|e| ArtifactError::Encoding {
                url: reference_url.to_string(),
                reason: e.to_string(),
            })?;

        let image = code
            .render::<Luma<u8>>()
            .min_dimensions(ARTIFACT_SIZE, ARTIFACT_SIZE)
            .build();

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), JPEG_QUALITY).encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::L8,
        )?;

        Ok(Artifact {
            reference_url: reference_url.to_string(),
            data_uri: format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg)),
            width: ARTIFACT_SIZE,
            height: ARTIFACT_SIZE,
        })
    }
}

#[async_trait]
impl ArtifactGenerator for QrCodeGenerator {
    async fn generate(&self, reference_url: &str) -> Result<Artifact, ArtifactError> {
        let url = reference_url.to_string();
        tokio::task::spawn_blocking(move || Self::render(&url)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn renders_jpeg_data_uri() {
        let artifact = QrCodeGenerator.generate("http://x").await.unwrap();

        assert_eq!(artifact.reference_url, "http://x");
        assert_eq!((artifact.width, artifact.height), (150, 150));
        let payload = artifact
            .data_uri
            .strip_prefix("data:image/jpeg;base64,")
            .unwrap();
        let bytes = BASE64.decode(payload).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8], "JPEG start-of-image marker");
    }

    #[test]
    fn distinct_urls_give_distinct_images() {
        let a = QrCodeGenerator::render("http://x").unwrap();
        let b = QrCodeGenerator::render("http://y").unwrap();
        assert_ne!(a.data_uri, b.data_uri);
    }

    #[test]
    fn oversized_reference_is_an_encoding_error() {
        // Level H holds at most 1273 bytes.
        let url = format!("http://example.com/{}", "a".repeat(2000));
        assert!(matches!(
            QrCodeGenerator::render(&url),
            Err(ArtifactError::Encoding { .. })
        ));
    }

    #[test]
    fn embed_html_carries_display_size() {
        let artifact = Artifact {
            reference_url: "http://x/'q".into(),
            data_uri: "data:image/jpeg;base64,AA==".into(),
            width: 150,
            height: 150,
        };
        assert_eq!(
            artifact.embed_html(),
            "<img class='qrcode' src='data:image/jpeg;base64,AA==' alt='http://x/&#39;q' height='150' width='150'>"
        );
    }
}
