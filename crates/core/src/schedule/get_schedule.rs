use crate::shared::usecase::UseCase;
use hookpost_domain::{Schedule, ID};
use hookpost_infra::HookpostContext;
use thiserror::Error;

#[derive(Debug)]
pub struct GetScheduleUseCase {
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
}

#[async_trait::async_trait]
impl UseCase for GetScheduleUseCase {
    type Response = UseCaseRes;

    type Error = UseCaseError;

    const NAME: &'static str = "GetSchedule";

    async fn execute(&mut self, ctx: &HookpostContext) -> Result<Self::Response, Self::Error> {
        match ctx.repos.schedules.find(&self.schedule_id).await {
            Some(schedule) if schedule.user_id == self.user_id => Ok(UseCaseRes { schedule }),
            _ => Err(UseCaseError::ScheduleNotFound(self.schedule_id.clone())),
        }
    }
}
