//! Canonical Text Formatting
//!
//! Turns profiles and items into the text stored in the content store.
//! Output is a pure function of the input: the same profile or item always
//! renders to the same bytes, which is what lets the store skip unchanged
//! records.

use crate::source::{Item, Profile};
use chrono::{DateTime, Utc};

/// Rendered for optional fields that are absent
pub const PLACEHOLDER: &str = "N/A";

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn or_placeholder(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => PLACEHOLDER,
    }
}

fn date(value: Option<&DateTime<Utc>>) -> String {
    value
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Render an account profile
pub fn format_profile(profile: &Profile) -> String {
    let lines = vec![
        format!("Profile: @{}", profile.username),
        format!("Name: {}", or_placeholder(profile.name.as_deref())),
        format!("ID: {}", profile.id),
        format!("Bio: {}", or_placeholder(profile.bio.as_deref())),
        format!("Location: {}", or_placeholder(profile.location.as_deref())),
        format!("Website: {}", or_placeholder(profile.website.as_deref())),
        format!("Avatar: {}", or_placeholder(profile.avatar_url.as_deref())),
        format!("Joined: {}", date(profile.joined.as_ref())),
        format!("Followers: {}", profile.followers_count),
        format!("Following: {}", profile.following_count),
        format!("Posts: {}", profile.items_count),
        format!("Likes: {}", profile.likes_count),
        format!("Verified: {}", yes_no(profile.is_verified)),
        format!("Private: {}", yes_no(profile.is_private)),
    ];

    lines.join("\n")
}

/// Render a single item, including the item it quotes or re-shares
pub fn format_item(item: &Item) -> String {
    let mut lines = vec![
        format!(
            "Item {} by {}",
            or_placeholder(item.id.as_ref().map(|id| id.as_str())),
            author(item)
        ),
        format!("Posted: {}", date(item.created_at.as_ref())),
        format!("URL: {}", or_placeholder(item.permanent_url.as_deref())),
    ];

    match item.reposted.as_deref() {
        Some(original) if item.is_repost => {
            lines.push(format!("Reposted from {}:", author(original)));
        }
        _ => {
            lines.push(format!("Text: {}", or_placeholder(item.text.as_deref())));
        }
    }

    lines.push(metrics(item));
    lines.push(format!(
        "Reply: {}{}",
        yes_no(item.is_reply),
        item.in_reply_to
            .as_ref()
            .map(|id| format!(" (to {})", id))
            .unwrap_or_default()
    ));
    lines.push(format!("Repost: {}", yes_no(item.is_repost)));
    lines.push(format!("Quote: {}", yes_no(item.is_quote)));
    lines.push(format!("Pinned: {}", yes_no(item.is_pinned)));
    lines.push(format!("Sensitive: {}", yes_no(item.is_sensitive)));

    if let Some(quoted) = item.quoted.as_deref() {
        lines.push("Quoted item:".to_string());
        lines.extend(wrapped(quoted));
    }
    if let Some(original) = item.reposted.as_deref() {
        lines.push("Original item:".to_string());
        lines.extend(wrapped(original));
    }

    if !item.media.is_empty() {
        lines.push("Media:".to_string());
        for media in &item.media {
            lines.push(format!("- {}: {}", media.kind, media.url));
        }
    }
    if !item.urls.is_empty() {
        lines.push("Links:".to_string());
        for url in &item.urls {
            lines.push(format!("- {}", url));
        }
    }
    if !item.hashtags.is_empty() {
        let tags: Vec<String> = item.hashtags.iter().map(|t| format!("#{}", t)).collect();
        lines.push(format!("Hashtags: {}", tags.join(", ")));
    }
    if !item.mentions.is_empty() {
        let mentions: Vec<String> = item.mentions.iter().map(|m| format!("@{}", m)).collect();
        lines.push(format!("Mentions: {}", mentions.join(", ")));
    }

    lines.join("\n")
}

fn author(item: &Item) -> String {
    match (item.username.as_deref(), item.name.as_deref()) {
        (Some(username), Some(name)) => format!("@{} ({})", username, name),
        (Some(username), None) => format!("@{}", username),
        (None, Some(name)) => name.to_string(),
        (None, None) => "unknown author".to_string(),
    }
}

fn metrics(item: &Item) -> String {
    format!(
        "Replies: {} | Reposts: {} | Likes: {} | Views: {}",
        item.reply_count,
        item.repost_count,
        item.like_count,
        item.view_count
            .map(|v| v.to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    )
}

/// Indented summary of a wrapped item. Only one level deep.
fn wrapped(inner: &Item) -> Vec<String> {
    let mut lines = vec![
        format!(
            "  Item {} by {}",
            or_placeholder(inner.id.as_ref().map(|id| id.as_str())),
            author(inner)
        ),
        format!("  Posted: {}", date(inner.created_at.as_ref())),
        format!("  Text: {}", or_placeholder(inner.text.as_deref())),
        format!("  {}", metrics(inner)),
    ];

    if let Some(id) = inner.wrapped().and_then(|i| i.id.as_ref()) {
        lines.push(format!("  Wraps item {}", id));
    }
    for media in &inner.media {
        lines.push(format!("  - {}: {}", media.kind, media.url));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ItemId, Media};
    use chrono::TimeZone;

    fn profile() -> Profile {
        Profile {
            id: "100".to_string(),
            username: "alice".to_string(),
            name: Some("Alice".to_string()),
            bio: None,
            followers_count: 12,
            following_count: 3,
            items_count: 40,
            likes_count: 7,
            is_verified: true,
            joined: Some(Utc.with_ymd_and_hms(2020, 5, 1, 12, 0, 0).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_profile_fields() {
        let text = format_profile(&profile());
        assert!(text.starts_with("Profile: @alice\nName: Alice\nID: 100"));
        assert!(text.contains("Bio: N/A"));
        assert!(text.contains("Joined: 2020-05-01 12:00:00 UTC"));
        assert!(text.contains("Followers: 12"));
        assert!(text.contains("Verified: Yes"));
        assert!(text.contains("Private: No"));
    }

    #[test]
    fn test_blank_optional_is_placeholder() {
        let mut p = profile();
        p.location = Some("   ".to_string());
        assert!(format_profile(&p).contains("Location: N/A"));
    }

    #[test]
    fn test_output_is_stable() {
        let mut item = Item::new("5", "hello");
        item.hashtags = vec!["rust".to_string()];
        assert_eq!(format_item(&item), format_item(&item.clone()));
        assert_eq!(format_profile(&profile()), format_profile(&profile()));
    }

    #[test]
    fn test_plain_item() {
        let mut item = Item::new("5", "hello world");
        item.username = Some("alice".to_string());
        item.like_count = 3;

        let text = format_item(&item);
        assert!(text.starts_with("Item 5 by @alice\n"));
        assert!(text.contains("Text: hello world"));
        assert!(text.contains("Replies: 0 | Reposts: 0 | Likes: 3 | Views: N/A"));
        assert!(text.contains("Reply: No"));
        assert!(!text.contains("Media:"));
        assert!(!text.contains("Links:"));
        assert!(!text.contains("Hashtags:"));
    }

    #[test]
    fn test_optional_sections_only_when_present() {
        let mut item = Item::new("5", "look");
        item.media = vec![Media {
            kind: "photo".to_string(),
            url: "https://img.example/1.jpg".to_string(),
        }];
        item.urls = vec!["https://example.com".to_string()];
        item.hashtags = vec!["a".to_string(), "b".to_string()];
        item.mentions = vec!["bob".to_string()];

        let text = format_item(&item);
        assert!(text.contains("Media:\n- photo: https://img.example/1.jpg"));
        assert!(text.contains("Links:\n- https://example.com"));
        assert!(text.contains("Hashtags: #a, #b"));
        assert!(text.contains("Mentions: @bob"));
    }

    #[test]
    fn test_quote_renders_both_items() {
        let mut quoted = Item::new("3", "original thought");
        quoted.username = Some("bob".to_string());
        quoted.like_count = 99;

        let mut item = Item::new("5", "so true");
        item.is_quote = true;
        item.quoted = Some(Box::new(quoted));

        let text = format_item(&item);
        assert!(text.contains("Text: so true"));
        assert!(text.contains("Quote: Yes"));
        assert!(text.contains("Quoted item:\n  Item 3 by @bob"));
        assert!(text.contains("  Text: original thought"));
        assert!(text.contains("  Replies: 0 | Reposts: 0 | Likes: 99 | Views: N/A"));
    }

    #[test]
    fn test_repost_renders_original() {
        let mut original = Item::new("3", "shared text");
        original.username = Some("bob".to_string());

        let item = Item {
            id: Some(ItemId::new("6")),
            username: Some("alice".to_string()),
            is_repost: true,
            reposted: Some(Box::new(original)),
            ..Default::default()
        };

        let text = format_item(&item);
        assert!(text.contains("Reposted from @bob:"));
        assert!(!text.contains("Text: N/A"));
        assert!(text.contains("Original item:\n  Item 3 by @bob"));
        assert!(text.contains("  Text: shared text"));
    }

    #[test]
    fn test_reply_target_rendered() {
        let mut item = Item::new("8", "agreed");
        item.is_reply = true;
        item.in_reply_to = Some(ItemId::new("7"));
        assert!(format_item(&item).contains("Reply: Yes (to 7)"));
    }
}
