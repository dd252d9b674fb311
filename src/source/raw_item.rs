//! The item type every source produces.
//!
//! `RawItem` is one entry as it arrived from the remote source, before any
//! artifact has been derived for it. Sources normalise their native format
//! (JSON list, RSS channel) into this struct so the batch assembler does not
//! need to know where an item came from.

use chrono::{DateTime, Utc};

/// A single feed entry as received from the remote source.
///
/// Missing fields are filled with empty values rather than rejected; the
/// source decides whether to log a warning about them.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RawItem {
    /// Name of the feed or publisher this came from (e.g. "Spectra News").
    pub source_label: Option<String>,

    /// Human-readable headline.
    pub title: String,

    /// URL encoded into the item's QR code.
    pub reference_url: String,

    /// Summary text with any HTML markup removed.
    pub description: String,

    /// Publication timestamp, if the source provided a parseable one.
    pub published: Option<DateTime<Utc>>,
}

impl RawItem {
    pub fn new(title: impl Into<String>, reference_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            reference_url: reference_url.into(),
            ..Self::default()
        }
    }

    /// Names of the expected fields this item arrived without.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.is_empty() {
            missing.push("title");
        }
        if self.reference_url.is_empty() {
            missing.push("url");
        }
        if self.published.is_none() {
            missing.push("pubdate");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_missing_fields() {
        let item = RawItem::new("", "http://x");
        assert_eq!(item.missing_fields(), vec!["title", "pubdate"]);

        let item = RawItem {
            published: Some(Utc::now()),
            ..RawItem::new("A", "http://x")
        };
        assert!(item.missing_fields().is_empty());
    }
}
