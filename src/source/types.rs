//! Source data types
//!
//! Typed shapes for what a source account exposes: the account profile,
//! the items it publishes and the identifiers used to order them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Identifier of a published item.
///
/// Identifiers are opaque strings whose ordering mirrors recency: a newer
/// item always has a greater identifier. Purely numeric identifiers (the
/// common snowflake style) compare by numeric value regardless of length or
/// leading zeros; other identifiers compare lexically. Numeric identifiers
/// sort before non-numeric ones so the order stays total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical spelling: numeric identifiers lose their leading zeros, so
    /// identifiers that compare equal share one spelling.
    pub fn canonical(&self) -> &str {
        match self.numeric() {
            Some("") => "0",
            Some(digits) => digits,
            None => &self.0,
        }
    }

    /// Digits with leading zeros stripped, if the identifier is numeric
    fn numeric(&self) -> Option<&str> {
        if !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit()) {
            Some(self.0.trim_start_matches('0'))
        } else {
            None
        }
    }
}

impl Ord for ItemId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ItemId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ItemId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ItemId {}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Public profile of a tracked account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub joined: Option<DateTime<Utc>>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub items_count: u64,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_private: bool,
}

/// Attached media
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    /// "photo", "video", "gif", ...
    #[serde(default = "default_media_kind")]
    pub kind: String,
    pub url: String,
}

fn default_media_kind() -> String {
    "photo".to_string()
}

/// A single published item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Absent identifiers are tolerated at the boundary; such items are
    /// never stored.
    #[serde(default)]
    pub id: Option<ItemId>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permanent_url: Option<String>,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub repost_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub is_reply: bool,
    #[serde(default)]
    pub is_repost: bool,
    #[serde(default)]
    pub is_quote: bool,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_sensitive: bool,
    #[serde(default)]
    pub in_reply_to: Option<ItemId>,
    /// Item quoted by this one
    #[serde(default)]
    pub quoted: Option<Box<Item>>,
    /// Item re-shared by this one
    #[serde(default)]
    pub reposted: Option<Box<Item>>,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
}

impl Item {
    /// Minimal item with only an identifier and text
    pub fn new(id: impl Into<ItemId>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// The item this one wraps, quoted or re-shared
    pub fn wrapped(&self) -> Option<&Item> {
        self.quoted.as_deref().or(self.reposted.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ids_compare_by_value() {
        assert!(ItemId::new("10") > ItemId::new("9"));
        assert!(ItemId::new("1790000000000000001") > ItemId::new("999999999999999999"));
        assert_eq!(ItemId::new("007"), ItemId::new("7"));
    }

    #[test]
    fn test_equal_ids_share_canonical_form() {
        assert_eq!(ItemId::new("007").canonical(), ItemId::new("7").canonical());
        assert_eq!(ItemId::new("0").canonical(), "0");
        assert_eq!(ItemId::new("00").canonical(), "0");
        assert_eq!(ItemId::new("x07").canonical(), "x07");
        // Display keeps the spelling the source used
        assert_eq!(ItemId::new("007").to_string(), "007");
    }

    #[test]
    fn test_non_numeric_ids_compare_lexically() {
        assert!(ItemId::new("b") > ItemId::new("a"));
        assert!(ItemId::new("2024-01-02") > ItemId::new("2024-01-01"));
    }

    #[test]
    fn test_mixed_ids_keep_total_order() {
        let numeric = ItemId::new("99");
        let other = ItemId::new("1a");
        assert!(numeric < other);

        let mut ids = vec![
            ItemId::new("1a"),
            ItemId::new("10"),
            ItemId::new("2"),
        ];
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(sorted, vec!["2", "10", "1a"]);
    }

    #[test]
    fn test_item_deserializes_with_missing_fields() {
        let item: Item = serde_json::from_str(r#"{"id": "42", "text": "hello"}"#).unwrap();
        assert_eq!(item.id, Some(ItemId::new("42")));
        assert_eq!(item.like_count, 0);
        assert!(item.media.is_empty());
        assert!(item.wrapped().is_none());
    }

    #[test]
    fn test_item_id_is_transparent_json() {
        let json = serde_json::to_string(&ItemId::new("123")).unwrap();
        assert_eq!(json, "\"123\"");
    }
}
