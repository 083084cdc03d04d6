use serde::{Deserialize, Serialize};

/// Total attachment size allowed on one message: 25 MiB.
pub const MAX_ATTACHMENTS_SIZE: usize = 25 * 1024 * 1024;

/// A point-in-time snapshot of composed message content, persisted on the
/// `Schedule` as JSON and materialized into a wire payload right before
/// delivery.
///
/// Every field is defaulted so that snapshots written by older schema
/// versions hydrate without errors: missing keys become empty values and
/// unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageSnapshot {
    pub content: String,
    pub username: String,
    pub avatar_url: String,
    pub thread_name: String,
    pub suppress_embeds: bool,
    pub suppress_notifications: bool,
    pub embeds: Vec<EmbedSnapshot>,
    pub attachments: Vec<Attachment>,
}

impl MessageSnapshot {
    /// Hydrates a persisted snapshot. Unreadable legacy data degrades to an
    /// empty snapshot rather than failing, a malformed row must never be
    /// able to block a dispatcher pass.
    pub fn from_json(stored: serde_json::Value) -> Self {
        serde_json::from_value(stored).unwrap_or_default()
    }

    pub fn total_attachments_size(&self) -> usize {
        self.attachments.iter().map(|a| a.data.len()).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbedSnapshot {
    pub author_name: String,
    pub author_url: String,
    pub author_icon_url: String,
    pub title: String,
    pub url: String,
    pub description: String,
    /// 6 hex digits, with or without a leading `#`
    pub color: String,
    pub image_url: String,
    pub thumbnail_url: String,
    pub footer_text: String,
    pub footer_icon_url: String,
    pub timestamp: String,
    pub fields: Vec<EmbedFieldSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbedFieldSnapshot {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Attachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}
