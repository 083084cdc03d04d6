mod execute_due_schedules;

pub use execute_due_schedules::{ExecuteDueSchedulesUseCase, TickReport};
