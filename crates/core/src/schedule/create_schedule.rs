use super::{
    validate_max_executions, validate_message, validate_recurrence, validate_target_url,
    ScheduleValidationError,
};
use crate::shared::usecase::UseCase;
use hookpost_domain::{MessageSnapshot, Recurrence, Schedule, ID};
use hookpost_infra::HookpostContext;
use thiserror::Error;

#[derive(Debug)]
pub struct CreateScheduleUseCase {
    pub user_id: ID,
    pub message: MessageSnapshot,
    pub target_url: String,
    pub scheduled_at: i64,
    pub recurrence: Recurrence,
    pub max_executions: Option<u32>,
}

#[derive(Debug)]
pub struct UseCaseRes {
    pub schedule: Schedule,
}

#[derive(Debug, Error, PartialEq)]
pub enum UseCaseError {
    #[error("User with id: {0} was not found")]
    UserNotFound(ID),
    #[error("The user already holds the maximum number of schedules")]
    QuotaExceeded,
    #[error("A one-off schedule must fire in the future")]
    ScheduledAtInPast,
    #[error(transparent)]
    Invalid(#[from] ScheduleValidationError),
    #[error("Internal server error")]
    StorageError,
}

#[async_trait::async_trait]
impl UseCase for CreateScheduleUseCase {
    type Response = UseCaseRes;

    type Error = UseCaseError;

    const NAME: &'static str = "CreateSchedule";

    async fn execute(&mut self, ctx: &HookpostContext) -> Result<Self::Response, Self::Error> {
        if ctx.repos.users.find(&self.user_id).await.is_none() {
            return Err(UseCaseError::UserNotFound(self.user_id.clone()));
        }

        let owned = ctx.repos.schedules.find_by_user(&self.user_id).await;
        if owned.len() >= ctx.config.max_schedules_per_user {
            return Err(UseCaseError::QuotaExceeded);
        }

        validate_target_url(&self.target_url, &ctx.config.allowed_webhook_hosts)?;
        validate_message(&self.message)?;
        validate_recurrence(&self.recurrence)?;
        validate_max_executions(self.max_executions)?;

        let now = ctx.sys.get_timestamp_millis();
        if let Recurrence::Once = self.recurrence {
            if self.scheduled_at <= now {
                return Err(UseCaseError::ScheduledAtInPast);
            }
        }

        let mut schedule = Schedule::new(
            self.user_id.clone(),
            self.message.clone(),
            self.target_url.clone(),
            self.scheduled_at,
            self.recurrence.clone(),
            now,
        );
        schedule.max_executions = self.max_executions;

        ctx.repos
            .schedules
            .insert(&schedule)
            .await
            .map_err(|_| UseCaseError::StorageError)?;

        Ok(UseCaseRes { schedule })
    }
}
