//! Payload decoding for the HTTP source.
//!
//! The remote endpoint answers either with a JSON array of item objects or
//! with an RSS 2.0 document. Both are normalised into [`RawItem`]s here,
//! without any I/O, so tests can exercise the decoding directly.
//!
//! Decoding is lenient per item and strict per payload: an item missing its
//! title or URL is kept with empty fields (and optionally logged), but a
//! payload that is not a list at all fails the whole cycle.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use encoding_rs::Encoding;
use regex::Regex;
use serde_json::{Map, Value};

use super::RawItem;
use crate::error::FetchError;

const URL_KEYS: &[&str] = &["url", "link", "referenceURL", "reference_url"];
const SOURCE_KEYS: &[&str] = &["sourceLabel", "source_label", "source", "sourceTitle"];
const DESCRIPTION_KEYS: &[&str] = &["description", "summary", "content"];
const DATE_KEYS: &[&str] = &["pubdate", "published", "updated", "dc:date"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Feed,
}

/// Decode a response body into raw items.
///
/// The format is taken from the `Content-Type` header when it names JSON or
/// XML, otherwise it is sniffed from the first significant byte. Feed
/// documents are decoded with `encoding` (a byte-order mark overrides it);
/// JSON is always UTF-8.
pub fn parse_payload(
    body: &[u8],
    content_type: Option<&str>,
    encoding: &'static Encoding,
    log_feed_warnings: bool,
) -> Result<Vec<RawItem>, FetchError> {
    let items = match detect_format(body, content_type)? {
        Format::Json => parse_json_items(body)?,
        Format::Feed => {
            let text = decode_text(body, encoding, log_feed_warnings);
            let channel = text
                .parse::<rss::Channel>()
                .map_err(|e| FetchError::Payload(format!("RSS parse error: {e}")))?;
            parse_channel(&channel)
        }
    };

    if log_feed_warnings {
        for item in &items {
            let missing = item.missing_fields();
            if !missing.is_empty() {
                tracing::warn!(
                    title = %item.title,
                    url = %item.reference_url,
                    missing = ?missing,
                    "Can't fully parse feed item"
                );
            }
        }
    }

    Ok(items)
}

fn detect_format(body: &[u8], content_type: Option<&str>) -> Result<Format, FetchError> {
    if let Some(ct) = content_type.map(str::to_ascii_lowercase) {
        if ct.contains("json") {
            return Ok(Format::Json);
        }
        if ct.contains("xml") || ct.contains("rss") {
            return Ok(Format::Feed);
        }
    }

    let start = Encoding::for_bom(body).map_or(0, |(_, bom_len)| bom_len);
    match body[start..].iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'[') | Some(b'{') => Ok(Format::Json),
        Some(b'<') => Ok(Format::Feed),
        Some(_) => Err(FetchError::Payload(
            "body is neither a JSON list nor a feed document".to_string(),
        )),
        None => Err(FetchError::Payload("empty response body".to_string())),
    }
}

/// Malformed sequences become U+FFFD; they never fail the payload.
fn decode_text(body: &[u8], encoding: &'static Encoding, log_feed_warnings: bool) -> String {
    let (text, used, had_errors) = encoding.decode(body);
    if had_errors && log_feed_warnings {
        tracing::warn!(
            encoding = used.name(),
            "Feed contains bytes invalid for its encoding, replaced"
        );
    }
    text.into_owned()
}

fn parse_json_items(body: &[u8]) -> Result<Vec<RawItem>, FetchError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| FetchError::Payload(format!("invalid JSON: {e}")))?;

    let Value::Array(entries) = value else {
        return Err(FetchError::Payload("expected a JSON list of items".to_string()));
    };

    Ok(entries
        .iter()
        .map(|entry| match entry {
            Value::Object(fields) => json_item(fields),
            // Not an object: keep the slot, every field empty.
            _ => RawItem::default(),
        })
        .collect())
}

fn json_item(fields: &Map<String, Value>) -> RawItem {
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| fields.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    };

    RawItem {
        source_label: text(SOURCE_KEYS).filter(|s| !s.is_empty()),
        title: text(&["title"]).unwrap_or_default(),
        reference_url: text(URL_KEYS).unwrap_or_default(),
        description: text(DESCRIPTION_KEYS)
            .map(|d| strip_html(&d))
            .unwrap_or_default(),
        published: text(DATE_KEYS).and_then(|d| parse_date(&d)),
    }
}

/// Convert an already-parsed [`rss::Channel`] into [`RawItem`]s.
///
/// The channel title becomes every item's source label.
fn parse_channel(channel: &rss::Channel) -> Vec<RawItem> {
    let label = Some(channel.title().trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    channel
        .items()
        .iter()
        .map(|item| {
            // Prefer <link>, fall back to a permalink <guid>.
            let reference_url = item
                .link()
                .map(String::from)
                .or_else(|| {
                    item.guid()
                        .filter(|g| g.is_permalink())
                        .map(|g| g.value().to_string())
                })
                .unwrap_or_default();

            let description = item
                .description()
                .or_else(|| item.content())
                .map(strip_html)
                .unwrap_or_default();

            RawItem {
                source_label: label.clone(),
                title: item.title().unwrap_or_default().to_string(),
                reference_url,
                description,
                published: item.pub_date().and_then(parse_date),
            }
        })
        .collect()
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Remove HTML tags from a snippet of feed text.
pub fn strip_html(text: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));
    tags.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Spectra News</title>
    <item>
      <title>First Post</title>
      <link>https://example.com/1</link>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
      <description>&lt;p&gt;First &lt;b&gt;description&lt;/b&gt;&lt;/p&gt;</description>
    </item>
    <item>
      <title>Second Post</title>
      <guid isPermaLink="true">https://example.com/2</guid>
    </item>
  </channel>
</rss>"#;

    fn parse(body: &[u8], content_type: Option<&str>) -> Result<Vec<RawItem>, FetchError> {
        parse_payload(body, content_type, encoding_rs::UTF_8, true)
    }

    #[test]
    fn parses_json_list() {
        let body = br#"[
            {"title": "A", "url": "http://x", "source": "Wire", "pubdate": "2024-01-01T00:00:00Z"},
            {"title": "B", "link": "http://y", "description": "<i>short</i>"}
        ]"#;
        let items = parse(body, Some("application/json")).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "A");
        assert_eq!(items[0].reference_url, "http://x");
        assert_eq!(items[0].source_label.as_deref(), Some("Wire"));
        assert!(items[0].published.is_some());
        assert_eq!(items[1].reference_url, "http://y");
        assert_eq!(items[1].description, "short");
        assert!(items[1].source_label.is_none());
    }

    #[test]
    fn missing_json_fields_default_to_empty() {
        let items = parse(br#"[{"url": "http://x"}, 42, {}]"#, None).unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "");
        assert_eq!(items[0].reference_url, "http://x");
        assert_eq!(items[1], RawItem::default());
        assert_eq!(items[2], RawItem::default());
    }

    #[test]
    fn non_list_json_is_rejected() {
        let err = parse(br#"{"title": "A"}"#, Some("application/json")).unwrap_err();
        assert!(matches!(err, FetchError::Payload(_)));

        let err = parse(b"[{\"title\": ", Some("application/json")).unwrap_err();
        assert!(matches!(err, FetchError::Payload(_)));
    }

    #[test]
    fn parses_rss_channel() {
        let items = parse(RSS.as_bytes(), Some("application/rss+xml")).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "First Post");
        assert_eq!(items[0].reference_url, "https://example.com/1");
        assert_eq!(items[0].description, "First description");
        assert_eq!(items[0].source_label.as_deref(), Some("Spectra News"));
        assert!(items[0].published.is_some());

        assert_eq!(items[1].reference_url, "https://example.com/2");
        assert!(items[1].published.is_none());
    }

    #[test]
    fn sniffs_format_without_content_type() {
        let items = parse(RSS.as_bytes(), Some("text/plain")).unwrap();
        assert_eq!(items.len(), 2);

        let items = parse(b"  []", None).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn decodes_feed_with_configured_encoding() {
        let xml = "<rss version=\"2.0\"><channel><title>Caf\u{e9}</title>\
                   <item><title>R\u{e9}sum\u{e9}</title><link>http://x</link></item>\
                   </channel></rss>";
        let (latin1, _, _) = encoding_rs::WINDOWS_1252.encode(xml);

        let items = parse_payload(&latin1, None, encoding_rs::WINDOWS_1252, false).unwrap();
        assert_eq!(items[0].title, "R\u{e9}sum\u{e9}");
        assert_eq!(items[0].source_label.as_deref(), Some("Caf\u{e9}"));
    }

    #[test]
    fn invalid_bytes_are_replaced_not_fatal() {
        let body = b"<rss version=\"2.0\"><channel><title>Wire</title>\
            <item><title>Good</title><link>http://x</link></item>\
            <item><title>Bad \xff</title><link>http://y</link></item>\
            </channel></rss>";
        let items = parse(body, None).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Good");
        assert_eq!(items[1].title, "Bad \u{fffd}");
        assert_eq!(items[1].reference_url, "http://y");
    }

    #[test]
    fn garbage_body_is_an_error() {
        assert!(matches!(parse(b"hello", None), Err(FetchError::Payload(_))));
        assert!(matches!(parse(b"   ", None), Err(FetchError::Payload(_))));
    }

    #[test]
    fn strips_tags() {
        assert_eq!(strip_html("<p>Hello <a href=\"x\">world</a></p>"), "Hello world");
        assert_eq!(strip_html("plain"), "plain");
    }
}
