use crate::message::{EmbedSnapshot, MessageSnapshot};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Tells the receiving client not to render link/embed previews.
pub const SUPPRESS_EMBEDS: u32 = 1 << 2;
/// Tells the receiving client not to notify members about the message.
pub const SUPPRESS_NOTIFICATIONS: u32 = 1 << 12;

pub const MAX_CONTENT_LEN: usize = 2000;
pub const MAX_DESCRIPTION_LEN: usize = 4096;
pub const MAX_EMBEDS: usize = 10;

/// The JSON object posted to the webhook endpoint. The wire contract
/// distinguishes absent keys from empty values, so every semantically empty
/// field is omitted instead of serialized as `""` or `[]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WirePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<WireEmbed>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WireEmbed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<WireEmbedAuthor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<WireEmbedMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<WireEmbedMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<WireEmbedFooter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<WireEmbedField>,
}

impl WireEmbed {
    /// An embed is only sent when it would render something: an author
    /// name, title, description, footer text, image, thumbnail, a field
    /// with content, or a timestamp.
    pub fn has_renderable_content(&self) -> bool {
        self.author.is_some()
            || self.title.is_some()
            || self.description.is_some()
            || self.footer.is_some()
            || self.image.is_some()
            || self.thumbnail.is_some()
            || self.timestamp.is_some()
            || !self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireEmbedAuthor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireEmbedMedia {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireEmbedFooter {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireEmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Materializes a stored snapshot into the exact payload the webhook target
/// expects. Empty fields are omitted, embeds without renderable content are
/// dropped silently and the two suppression toggles are folded into a
/// single flags bitmask.
pub fn build_payload(snapshot: &MessageSnapshot) -> WirePayload {
    let mut flags = 0;
    if snapshot.suppress_embeds {
        flags |= SUPPRESS_EMBEDS;
    }
    if snapshot.suppress_notifications {
        flags |= SUPPRESS_NOTIFICATIONS;
    }

    WirePayload {
        content: non_empty(&snapshot.content),
        username: non_empty(&snapshot.username),
        avatar_url: non_empty(&snapshot.avatar_url),
        thread_name: non_empty(&snapshot.thread_name),
        flags: if flags != 0 { Some(flags) } else { None },
        embeds: snapshot
            .embeds
            .iter()
            .filter_map(build_embed)
            .take(MAX_EMBEDS)
            .collect(),
    }
}

fn build_embed(embed: &EmbedSnapshot) -> Option<WireEmbed> {
    let wire = WireEmbed {
        author: non_empty(&embed.author_name).map(|name| WireEmbedAuthor {
            name,
            url: non_empty(&embed.author_url),
            icon_url: non_empty(&embed.author_icon_url),
        }),
        title: non_empty(&embed.title),
        url: non_empty(&embed.url),
        description: non_empty(&embed.description),
        color: parse_color(&embed.color),
        image: non_empty(&embed.image_url).map(|url| WireEmbedMedia { url }),
        thumbnail: non_empty(&embed.thumbnail_url).map(|url| WireEmbedMedia { url }),
        footer: non_empty(&embed.footer_text).map(|text| WireEmbedFooter {
            text,
            icon_url: non_empty(&embed.footer_icon_url),
        }),
        timestamp: normalize_timestamp(&embed.timestamp),
        fields: embed
            .fields
            .iter()
            .filter(|f| !f.name.trim().is_empty() || !f.value.trim().is_empty())
            .map(|f| WireEmbedField {
                name: f.name.trim().to_string(),
                value: f.value.trim().to_string(),
                inline: f.inline,
            })
            .collect(),
    };

    if wire.has_renderable_content() {
        Some(wire)
    } else {
        None
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A 6-hex-digit color string decoded to its integer wire form. Anything
/// else is treated as absent, never as zero.
fn parse_color(raw: &str) -> Option<u32> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// Normalizes a user-entered timestamp to RFC 3339 UTC. An unparsable
/// timestamp is dropped, not defaulted to now.
fn normalize_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(
            instant
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        );
    }
    // Datetime-local editor values carry no offset and are taken as UTC
    for format in &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(
                Utc.from_utc_datetime(&naive)
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            );
        }
    }
    None
}
