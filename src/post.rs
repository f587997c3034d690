use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Engagement metrics that are carried through; every other key is dropped.
pub const ENGAGEMENT_KEYS: [&str; 3] = ["reactions", "comments", "shares"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[default]
    Text,
    Image,
    Video,
    Article,
    Repost,
}

impl PostType {
    pub const ALL: [PostType; 5] = [
        PostType::Text,
        PostType::Image,
        PostType::Video,
        PostType::Article,
        PostType::Repost,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PostType::Text => "text",
            PostType::Image => "image",
            PostType::Video => "video",
            PostType::Article => "article",
            PostType::Repost => "repost",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.key().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A captured post. Field names on the wire follow the capture backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    #[serde(rename = "post_number")]
    pub sequence_number: i64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub post_type: PostType,
    #[serde(rename = "media_urls")]
    pub media_references: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub local_media_paths: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub engagement: BTreeMap<String, String>,
    #[serde(rename = "post_url", skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(rename = "profile_url", skip_serializing_if = "Option::is_none")]
    pub profile_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
}

impl Post {
    pub fn new(sequence_number: i64, content: impl Into<String>) -> Self {
        Self {
            sequence_number,
            content: content.into(),
            timestamp: None,
            post_type: PostType::Text,
            media_references: Vec::new(),
            local_media_paths: Vec::new(),
            engagement: BTreeMap::new(),
            permalink: None,
            profile_identifier: None,
            author_name: None,
            author_avatar: None,
        }
    }

    /// Builds a post from one decoded JSON object. Missing or mistyped
    /// optional fields fall back to their defaults.
    pub(crate) fn from_object(position: usize, map: &Map<String, Value>) -> Self {
        let sequence_number = integer_field(map, &["post_number", "sequenceNumber"])
            .unwrap_or(position as i64 + 1);
        let post_type = string_field(map, &["post_type", "postType"])
            .and_then(|raw| PostType::from_key(&raw))
            .unwrap_or_default();

        let engagement = map
            .get("engagement")
            .and_then(Value::as_object)
            .map(|metrics| {
                ENGAGEMENT_KEYS
                    .iter()
                    .filter_map(|key| {
                        let display = display_value(metrics.get(*key)?)?;
                        Some(((*key).to_string(), display))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            sequence_number,
            content: string_field(map, &["content"]).unwrap_or_default(),
            timestamp: string_field(map, &["timestamp"]),
            post_type,
            media_references: string_list_field(map, &["media_urls", "mediaReferences"], false),
            local_media_paths: string_list_field(map, &["local_media_paths", "localMediaPaths"], true),
            engagement,
            permalink: string_field(map, &["post_url", "permalink"]),
            profile_identifier: string_field(map, &["profile_url", "profileIdentifier"]),
            author_name: string_field(map, &["author_name", "authorName"]),
            author_avatar: string_field(map, &["author_avatar", "authorAvatar"]),
        }
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }

    /// Cached copy for the raw media reference at `index`, if the capture
    /// session downloaded one.
    pub fn local_path(&self, index: usize) -> Option<&str> {
        self.local_media_paths
            .get(index)
            .map(|path| path.trim())
            .filter(|path| !path.is_empty())
    }

    pub fn engagement_metric(&self, key: &str) -> Option<&str> {
        self.engagement.get(key).map(String::as_str)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Display form used in post headers, e.g. `Feb 1, 2024 09:30`.
pub fn format_timestamp(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(parsed) => parsed.format("%b %-d, %Y %H:%M").to_string(),
        None => raw.trim().to_string(),
    }
}

fn string_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| value.as_str())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn integer_field(map: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
}

fn string_list_field(map: &Map<String, Value>, keys: &[&str], keep_gaps: bool) -> Vec<String> {
    let Some(items) = keys
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(Value::as_array)
    else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item.as_str().map(str::trim) {
            Some(text) if !text.is_empty() => Some(text.to_string()),
            // Cached paths stay index-aligned with the media list.
            _ if keep_gaps => Some(String::new()),
            _ => None,
        })
        .collect()
}

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
