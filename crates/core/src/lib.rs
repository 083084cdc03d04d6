mod execution;
mod job_schedulers;
mod schedule;
mod shared;

pub use execution::{ExecuteDueSchedulesUseCase, TickReport};
pub use job_schedulers::start_execution_job;
pub use schedule::{
    CreateScheduleUseCase, DeleteScheduleUseCase, GetScheduleUseCase, RunScheduleNowUseCase,
    ScheduleValidationError, UpdateScheduleUseCase,
};
pub use shared::usecase::{execute, UseCase};
