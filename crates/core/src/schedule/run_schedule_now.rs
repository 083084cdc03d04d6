use crate::shared::usecase::UseCase;
use hookpost_domain::{Schedule, ID};
use hookpost_infra::HookpostContext;
use thiserror::Error;

/// Pulls a schedule's next fire forward to the current instant. The
/// dispatcher then picks it up on its next pass like any other due row,
/// so the manual path shares the claim and accounting logic with the
/// timed one.
#[derive(Debug)]
pub struct RunScheduleNowUseCase {
    pub user_id: ID,
    pub schedule_id: ID,
}

#[derive(Debug)]
pub struct UseCaseRes {
    pub schedule: Schedule,
}

#[derive(Debug, Error, PartialEq)]
pub enum UseCaseError {
    #[error("Schedule with id: {0} was not found")]
    ScheduleNotFound(ID),
    #[error("The schedule has terminated and cannot be run")]
    ScheduleInactive,
    #[error("Internal server error")]
    StorageError,
}

#[async_trait::async_trait]
impl UseCase for RunScheduleNowUseCase {
    type Response = UseCaseRes;

    type Error = UseCaseError;

    const NAME: &'static str = "RunScheduleNow";

    async fn execute(&mut self, ctx: &HookpostContext) -> Result<Self::Response, Self::Error> {
        let mut schedule = match ctx.repos.schedules.find(&self.schedule_id).await {
            Some(s) if s.user_id == self.user_id => s,
            _ => return Err(UseCaseError::ScheduleNotFound(self.schedule_id.clone())),
        };
        if !schedule.is_active {
            return Err(UseCaseError::ScheduleInactive);
        }

        let now = ctx.sys.get_timestamp_millis();
        schedule.next_execution_at = Some(now);
        schedule.updated_at = now;
        ctx.repos
            .schedules
            .save(&schedule)
            .await
            .map_err(|_| UseCaseError::StorageError)?;

        Ok(UseCaseRes { schedule })
    }
}
