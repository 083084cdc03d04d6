mod create_schedule;
mod delete_schedule;
mod get_schedule;
mod run_schedule_now;
mod update_schedule;

pub use create_schedule::CreateScheduleUseCase;
pub use delete_schedule::DeleteScheduleUseCase;
pub use get_schedule::GetScheduleUseCase;
pub use run_schedule_now::RunScheduleNowUseCase;
pub use update_schedule::UpdateScheduleUseCase;

use hookpost_domain::{
    CronExpr, CronParseError, MessageSnapshot, Recurrence, MAX_ATTACHMENTS_SIZE, MAX_CONTENT_LEN,
    MAX_DESCRIPTION_LEN, MAX_EMBEDS,
};
use thiserror::Error;
use url::Url;

/// Everything that makes a schedule unacceptable at creation or update
/// time. Nothing here ever reaches the dispatcher: a stored schedule has
/// passed all of these checks.
#[derive(Debug, Error, PartialEq)]
pub enum ScheduleValidationError {
    #[error("Invalid target url: `{0}`. It must be an http(s) url on an allowed webhook host.")]
    InvalidTargetUrl(String),
    #[error("The message has no deliverable content")]
    EmptyMessage,
    #[error("The message content must be at most 2000 characters")]
    ContentTooLong,
    #[error("An embed description must be at most 4096 characters")]
    DescriptionTooLong,
    #[error("A message can hold at most 10 embeds")]
    TooManyEmbeds,
    #[error("Attachments must total at most 25 MiB")]
    AttachmentsTooLarge,
    #[error("Invalid cron expression: {0}")]
    InvalidCronExpression(#[from] CronParseError),
    #[error("max_executions must be at least 1 when set")]
    ZeroMaxExecutions,
}

pub(crate) fn validate_target_url(
    url: &str,
    allowed_hosts: &[String],
) -> Result<(), ScheduleValidationError> {
    let err = || ScheduleValidationError::InvalidTargetUrl(url.to_string());
    let parsed = Url::parse(url).map_err(|_| err())?;
    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(err());
    }
    let host = parsed.host_str().ok_or_else(err)?.to_lowercase();
    if !allowed_hosts.iter().any(|allowed| *allowed == host) {
        return Err(err());
    }
    Ok(())
}

pub(crate) fn validate_message(message: &MessageSnapshot) -> Result<(), ScheduleValidationError> {
    if message.content.chars().count() > MAX_CONTENT_LEN {
        return Err(ScheduleValidationError::ContentTooLong);
    }
    if message.embeds.len() > MAX_EMBEDS {
        return Err(ScheduleValidationError::TooManyEmbeds);
    }
    for embed in &message.embeds {
        if embed.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ScheduleValidationError::DescriptionTooLong);
        }
    }
    if message.total_attachments_size() > MAX_ATTACHMENTS_SIZE {
        return Err(ScheduleValidationError::AttachmentsTooLarge);
    }

    // Empty embeds are dropped at delivery time, so a message whose only
    // embed is empty would go out as nothing at all. Reject it here.
    let payload = hookpost_domain::build_payload(message);
    if payload.content.is_none() && payload.embeds.is_empty() && message.attachments.is_empty() {
        return Err(ScheduleValidationError::EmptyMessage);
    }
    Ok(())
}

pub(crate) fn validate_max_executions(
    max_executions: Option<u32>,
) -> Result<(), ScheduleValidationError> {
    match max_executions {
        Some(0) => Err(ScheduleValidationError::ZeroMaxExecutions),
        _ => Ok(()),
    }
}

pub(crate) fn validate_recurrence(recurrence: &Recurrence) -> Result<(), ScheduleValidationError> {
    match recurrence {
        Recurrence::Once => Ok(()),
        Recurrence::Cron { expression, .. } => {
            CronExpr::parse(expression)?;
            Ok(())
        }
    }
}
