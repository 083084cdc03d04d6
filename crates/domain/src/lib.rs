mod message;
mod payload;
mod recurrence;
mod schedule;
mod shared;
mod user;

pub use message::{
    Attachment, EmbedFieldSnapshot, EmbedSnapshot, MessageSnapshot, MAX_ATTACHMENTS_SIZE,
};
pub use payload::{
    build_payload, WireEmbed, WireEmbedAuthor, WireEmbedField, WireEmbedFooter, WireEmbedMedia,
    WirePayload, MAX_CONTENT_LEN, MAX_DESCRIPTION_LEN, MAX_EMBEDS, SUPPRESS_EMBEDS,
    SUPPRESS_NOTIFICATIONS,
};
pub use recurrence::{compute_next, CronExpr, CronParseError, NextFire, Recurrence};
pub use schedule::Schedule;
pub use shared::entity::{Entity, ID};
pub use user::User;
