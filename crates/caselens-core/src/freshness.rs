//! Freshness tokens: the rendered "last modified" value of a record.
//!
//! A cached extraction is reusable while its token is not older than the one
//! currently on the page.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use caselens_protocols::Document;

/// Date-time layouts the CRM renders, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y, %I:%M %p",
    "%m/%d/%Y %I:%M %p",
];

/// Date-time embedded in surrounding text, e.g. `Jane Doe, 3/1/2024, 10:05 AM`.
static EMBEDDED_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?|\d{1,2}/\d{1,2}/\d{4},?\s+\d{1,2}:\d{2}(?::\d{2})?(?:\s*[AP]M)?",
    )
    .expect("static datetime pattern")
});

/// Parse a token as a date-time. Offsets are normalized to UTC.
pub fn parse_token(token: &str) -> Option<NaiveDateTime> {
    let token = token.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Some(dt.naive_utc());
    }
    let token = token.trim_end_matches('Z');
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(token, fmt).ok())
}

/// Compare two tokens: chronologically when both parse, lexically otherwise.
pub fn compare_tokens(a: &str, b: &str) -> Ordering {
    match (parse_token(a), parse_token(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.trim().cmp(b.trim()),
    }
}

/// Whether an entry stored with `cached` may be reused when the page shows
/// `current`.
///
/// An unobtainable current token counts as fresh (best effort); a cached entry
/// with no token is never fresh against a known one.
pub fn is_fresh(cached: Option<&str>, current: Option<&str>) -> bool {
    match (cached, current) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(cached), Some(current)) => compare_tokens(cached, current) != Ordering::Less,
    }
}

/// Reduce scraped text to its date-time part when it has one.
pub fn normalize_token(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let token = EMBEDDED_DATETIME
        .find(text)
        .map(|m| m.as_str())
        .unwrap_or(text);
    Some(token.to_string())
}

/// Where the current freshness token comes from.
pub trait FreshnessSource: Send + Sync {
    /// The token currently displayed, `None` when it cannot be found.
    fn current_token(&self) -> Option<String>;
}

/// Default selector chain for the "Last Modified" field.
pub const LAST_MODIFIED_SELECTORS: &[&str] = &[
    "records-record-layout-item[field-label=\"Last Modified By\"] lightning-formatted-text",
    "records-record-layout-item[field-label=\"Last Modified Date\"] lightning-formatted-text",
    "records-record-layout-item[field-label=\"Last Modified By\"]",
    "[data-field=\"LastModifiedDate\"]",
];

/// Scrapes the freshness token from the live page.
pub struct LastModifiedScraper {
    document: Arc<dyn Document>,
    selectors: Vec<String>,
}

impl LastModifiedScraper {
    pub fn new(document: Arc<dyn Document>) -> Self {
        Self {
            document,
            selectors: LAST_MODIFIED_SELECTORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_selectors(mut self, selectors: Vec<String>) -> Self {
        self.selectors = selectors;
        self
    }
}

impl FreshnessSource for LastModifiedScraper {
    fn current_token(&self) -> Option<String> {
        let token = self.selectors.iter().find_map(|selector| {
            self.document
                .query(None, selector)
                .and_then(|el| normalize_token(&el.text))
        });
        trace!("Scraped freshness token: {:?}", token);
        token
    }
}
