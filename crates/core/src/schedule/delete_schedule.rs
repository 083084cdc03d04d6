use crate::shared::usecase::UseCase;
use hookpost_domain::{Schedule, ID};
use hookpost_infra::HookpostContext;
use thiserror::Error;

#[derive(Debug)]
pub struct DeleteScheduleUseCase {
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
    #[error("Internal server error")]
    StorageError,
}

#[async_trait::async_trait]
impl UseCase for DeleteScheduleUseCase {
    type Response = UseCaseRes;

    type Error = UseCaseError;

    const NAME: &'static str = "DeleteSchedule";

    async fn execute(&mut self, ctx: &HookpostContext) -> Result<Self::Response, Self::Error> {
        match ctx.repos.schedules.find(&self.schedule_id).await {
            Some(schedule) if schedule.user_id == self.user_id => {
                match ctx.repos.schedules.delete(&self.schedule_id).await {
                    Some(schedule) => Ok(UseCaseRes { schedule }),
                    None => Err(UseCaseError::StorageError),
                }
            }
            _ => Err(UseCaseError::ScheduleNotFound(self.schedule_id.clone())),
        }
    }
}
