//! Data models for QuoteCore.
//!
//! This module defines the core entities: Quote and Conflict.
//! Local ids are UUID7 hex strings with a `local-` prefix, server ids carry the
//! remote identifier with a `server-` prefix.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category assigned when a quote arrives without one
pub const DEFAULT_CATEGORY: &str = "General";

/// Category filter sentinel meaning "no filter"
pub const ALL_CATEGORIES: &str = "all";

/// Id prefix for quotes created on this device
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Id prefix for quotes that came from the remote source
pub const SERVER_ID_PREFIX: &str = "server-";

/// Where a quote record originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSource {
    #[default]
    Local,
    Server,
}

impl QuoteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteSource::Local => "local",
            QuoteSource::Server => "server",
        }
    }
}

/// A single quote.
///
/// Serialized with camelCase keys. Older payloads that only carry `text` and
/// `category` still deserialize: the missing fields are filled in as a fresh
/// local record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "QuoteRecord")]
pub struct Quote {
    /// Unique identifier, assigned once and never reused
    pub id: String,
    /// The quote text
    pub text: String,
    /// Free-form category label
    pub category: String,
    /// Local or server origin
    pub source: QuoteSource,
    /// When the record was created or last overwritten
    pub last_modified: DateTime<Utc>,
}

/// Wire shape of a quote with every field except `text` optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    source: Option<QuoteSource>,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
}

impl From<QuoteRecord> for Quote {
    fn from(record: QuoteRecord) -> Self {
        Self {
            id: record
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(generate_local_id),
            text: record.text,
            category: normalize_category(record.category.as_deref()),
            source: record.source.unwrap_or_default(),
            last_modified: record.last_modified.unwrap_or_else(Utc::now),
        }
    }
}

impl Quote {
    /// Create a new locally authored quote
    pub fn new_local(text: impl Into<String>, category: impl Into<String>) -> Self {
        let category = category.into();
        Self {
            id: generate_local_id(),
            text: text.into(),
            category: normalize_category(Some(&category)),
            source: QuoteSource::Local,
            last_modified: Utc::now(),
        }
    }

    /// Create a quote received from the remote source
    pub fn from_server(
        remote_id: impl fmt::Display,
        text: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        let category = category.into();
        Self {
            id: format!("{}{}", SERVER_ID_PREFIX, remote_id),
            text: text.into(),
            category: normalize_category(Some(&category)),
            source: QuoteSource::Server,
            last_modified: Utc::now(),
        }
    }

    pub fn is_from_server(&self) -> bool {
        self.source == QuoteSource::Server
    }

    /// True if text and category are identical (ids and timestamps are ignored)
    pub fn same_content(&self, other: &Quote) -> bool {
        self.text == other.text && self.category == other.category
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" — {}", self.text, self.category)
    }
}

/// A pending disagreement between a local and a server record that share a
/// lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub lookup_key: String,
    /// The local record as it was before the merge overwrote it
    pub local: Quote,
    /// The server record that replaced it
    pub server: Quote,
    #[serde(default = "Utc::now")]
    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    pub fn new(lookup_key: impl Into<String>, local: Quote, server: Quote) -> Self {
        Self {
            lookup_key: lookup_key.into(),
            local,
            server,
            detected_at: Utc::now(),
        }
    }

    pub fn text_differs(&self) -> bool {
        self.local.text != self.server.text
    }

    pub fn category_differs(&self) -> bool {
        self.local.category != self.server.category
    }
}

/// Generate a fresh local quote id
pub fn generate_local_id() -> String {
    format!("{}{}", LOCAL_ID_PREFIX, Uuid::now_v7().simple())
}

/// Trim a category, substituting the default for blank or missing values
pub fn normalize_category(category: Option<&str>) -> String {
    match category.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

/// The quotes a brand-new store starts with.
pub fn seed_quotes() -> Vec<Quote> {
    vec![
        Quote::new_local(
            "The only limit to our realization of tomorrow is our doubts of today.",
            "Motivation",
        ),
        Quote::new_local(
            "In the middle of every difficulty lies opportunity.",
            "Inspiration",
        ),
        Quote::new_local(
            "Life is what happens when you're busy making other plans.",
            "Life",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_creation() {
        let quote = Quote::new_local("Stay hungry", "Motivation");

        assert!(quote.id.starts_with(LOCAL_ID_PREFIX));
        assert_eq!(quote.text, "Stay hungry");
        assert_eq!(quote.category, "Motivation");
        assert_eq!(quote.source, QuoteSource::Local);
        assert!(!quote.is_from_server());
    }

    #[test]
    fn test_local_ids_are_unique() {
        let a = Quote::new_local("a", "x");
        let b = Quote::new_local("a", "x");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_server_quote() {
        let quote = Quote::from_server(42, "sunt aut facere", "Server");
        assert_eq!(quote.id, "server-42");
        assert!(quote.is_from_server());
    }

    #[test]
    fn test_blank_category_defaults_to_general() {
        let quote = Quote::new_local("text", "   ");
        assert_eq!(quote.category, DEFAULT_CATEGORY);
        assert_eq!(normalize_category(None), DEFAULT_CATEGORY);
        assert_eq!(normalize_category(Some(" Life ")), "Life");
    }

    #[test]
    fn test_display_format() {
        let quote = Quote::new_local("Hi", "Wisdom");
        assert_eq!(quote.to_string(), "\"Hi\" — Wisdom");
    }

    #[test]
    fn test_legacy_record_deserializes() {
        let quote: Quote =
            serde_json::from_str(r#"{"text": "Old quote", "category": "Life"}"#).unwrap();

        assert_eq!(quote.text, "Old quote");
        assert_eq!(quote.category, "Life");
        assert_eq!(quote.source, QuoteSource::Local);
        assert!(quote.id.starts_with(LOCAL_ID_PREFIX));
    }

    #[test]
    fn test_serialized_keys_are_camel_case() {
        let quote = Quote::from_server(7, "Hi", "Wisdom");
        let value = serde_json::to_value(&quote).unwrap();

        assert_eq!(value["source"], "server");
        assert!(value.get("lastModified").is_some());
        assert!(value.get("last_modified").is_none());

        let back: Quote = serde_json::from_value(value).unwrap();
        assert_eq!(back, quote);
    }

    #[test]
    fn test_seed_quotes() {
        let seed = seed_quotes();
        assert_eq!(seed.len(), 3);
        let categories: Vec<&str> = seed.iter().map(|q| q.category.as_str()).collect();
        assert_eq!(categories, vec!["Motivation", "Inspiration", "Life"]);
    }

    #[test]
    fn test_conflict_differences() {
        let local = Quote::new_local("Hi", "Motivation");
        let server = Quote::from_server(1, "Hi", "Wisdom");
        let conflict = Conflict::new("key", local, server);

        assert!(!conflict.text_differs());
        assert!(conflict.category_differs());
    }
}
