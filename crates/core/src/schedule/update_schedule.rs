use super::{
    validate_max_executions, validate_message, validate_recurrence, validate_target_url,
    ScheduleValidationError,
};
use crate::shared::usecase::UseCase;
use hookpost_domain::{compute_next, MessageSnapshot, NextFire, Recurrence, Schedule, ID};
use hookpost_infra::HookpostContext;
use thiserror::Error;

/// Fields left as `None` keep their stored value. `max_executions` is
/// doubly optional so that `Some(None)` can clear the cap.
#[derive(Debug)]
pub struct UpdateScheduleUseCase {
    pub user_id: ID,
    pub schedule_id: ID,
    pub message: Option<MessageSnapshot>,
    pub target_url: Option<String>,
    pub scheduled_at: Option<i64>,
    pub recurrence: Option<Recurrence>,
    pub max_executions: Option<Option<u32>>,
}

#[derive(Debug)]
pub struct UseCaseRes {
    pub schedule: Schedule,
}

#[derive(Debug, Error, PartialEq)]
pub enum UseCaseError {
    #[error("Schedule with id: {0} was not found")]
    ScheduleNotFound(ID),
    #[error("The updated cadence has no upcoming fire")]
    NoUpcomingFire,
    #[error(transparent)]
    Invalid(#[from] ScheduleValidationError),
    #[error("Internal server error")]
    StorageError,
}

#[async_trait::async_trait]
impl UseCase for UpdateScheduleUseCase {
    type Response = UseCaseRes;

    type Error = UseCaseError;

    const NAME: &'static str = "UpdateSchedule";

    async fn execute(&mut self, ctx: &HookpostContext) -> Result<Self::Response, Self::Error> {
        let mut schedule = match ctx.repos.schedules.find(&self.schedule_id).await {
            Some(s) if s.user_id == self.user_id => s,
            _ => return Err(UseCaseError::ScheduleNotFound(self.schedule_id.clone())),
        };

        if let Some(target_url) = &self.target_url {
            validate_target_url(target_url, &ctx.config.allowed_webhook_hosts)?;
            schedule.target_url = target_url.clone();
        }
        if let Some(message) = &self.message {
            validate_message(message)?;
            schedule.message = message.clone();
        }
        if let Some(recurrence) = &self.recurrence {
            validate_recurrence(recurrence)?;
            schedule.recurrence = recurrence.clone();
        }
        if let Some(max_executions) = self.max_executions {
            validate_max_executions(max_executions)?;
            schedule.max_executions = max_executions;
        }

        let now = ctx.sys.get_timestamp_millis();

        // A new `scheduled_at` restarts the timeline at that instant. A
        // cadence change without one re-derives the next fire from now, so
        // an edit never causes an immediate catch-up burst.
        if let Some(scheduled_at) = self.scheduled_at {
            schedule.scheduled_at = scheduled_at;
            if schedule.is_active {
                schedule.next_execution_at = Some(scheduled_at);
            }
        } else if self.recurrence.is_some() && schedule.is_active {
            match compute_next(&schedule.recurrence, now)
                .map_err(ScheduleValidationError::from)?
            {
                NextFire::At(at) => schedule.next_execution_at = Some(at),
                NextFire::Terminal => return Err(UseCaseError::NoUpcomingFire),
            }
        }

        schedule.updated_at = now;
        ctx.repos
            .schedules
            .save(&schedule)
            .await
            .map_err(|_| UseCaseError::StorageError)?;

        Ok(UseCaseRes { schedule })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::CreateScheduleUseCase;
    use crate::shared::usecase::execute;
    use hookpost_domain::User;
    use hookpost_infra::{setup_context_inmemory, HookpostContext, ISys};
    use std::sync::Arc;

    struct StaticTimeSys(i64);
    impl ISys for StaticTimeSys {
        fn get_timestamp_millis(&self) -> i64 {
            self.0
        }
    }

    async fn seeded_ctx(now: i64) -> (HookpostContext, Schedule) {
        let mut ctx = setup_context_inmemory();
        ctx.sys = Arc::new(StaticTimeSys(now));
        let user = User::new(now);
        ctx.repos.users.insert(&user).await.unwrap();
        let res = execute(
            CreateScheduleUseCase {
                user_id: user.id,
                message: MessageSnapshot {
                    content: "release notes".into(),
                    ..Default::default()
                },
                target_url: "https://discord.com/api/webhooks/1/token".into(),
                scheduled_at: now + 60_000,
                recurrence: Recurrence::Once,
                max_executions: None,
            },
            &ctx,
        )
        .await
        .unwrap();
        (ctx, res.schedule)
    }

    fn noop_update(schedule: &Schedule) -> UpdateScheduleUseCase {
        UpdateScheduleUseCase {
            user_id: schedule.user_id.clone(),
            schedule_id: schedule.id.clone(),
            message: None,
            target_url: None,
            scheduled_at: None,
            recurrence: None,
            max_executions: None,
        }
    }

    #[tokio::test]
    async fn updates_message_in_place() {
        let now = 1_700_000_000_000;
        let (ctx, schedule) = seeded_ctx(now).await;

        let mut uc = noop_update(&schedule);
        uc.message = Some(MessageSnapshot {
            content: "updated".into(),
            ..Default::default()
        });
        let updated = execute(uc, &ctx).await.unwrap().schedule;

        assert_eq!(updated.message.content, "updated");
        // Untouched fields stay put
        assert_eq!(updated.next_execution_at, schedule.next_execution_at);
        let stored = ctx.repos.schedules.find(&schedule.id).await.unwrap();
        assert_eq!(stored.message.content, "updated");
    }

    #[tokio::test]
    async fn new_scheduled_at_resets_next_fire() {
        let now = 1_700_000_000_000;
        let (ctx, schedule) = seeded_ctx(now).await;

        let mut uc = noop_update(&schedule);
        uc.scheduled_at = Some(now + 3_600_000);
        let updated = execute(uc, &ctx).await.unwrap().schedule;

        assert_eq!(updated.next_execution_at, Some(now + 3_600_000));
    }

    #[tokio::test]
    async fn cadence_change_rederives_next_fire_from_now() {
        let now = 1_700_000_000_000;
        let (ctx, schedule) = seeded_ctx(now).await;

        let mut uc = noop_update(&schedule);
        uc.recurrence = Some(Recurrence::Cron {
            expression: "*/5 * * * *".into(),
            timezone: None,
        });
        let updated = execute(uc, &ctx).await.unwrap().schedule;

        let next = updated.next_execution_at.unwrap();
        assert!(next > now);
        assert!(next <= now + 5 * 60_000);
    }

    #[tokio::test]
    async fn cadence_with_no_upcoming_fire_is_rejected() {
        let now = 1_700_000_000_000;
        let (ctx, schedule) = seeded_ctx(now).await;

        let mut uc = noop_update(&schedule);
        uc.recurrence = Some(Recurrence::Cron {
            expression: "0 0 30 2 *".into(),
            timezone: None,
        });
        let res = execute(uc, &ctx).await;
        assert_eq!(res.unwrap_err(), UseCaseError::NoUpcomingFire);
    }

    #[tokio::test]
    async fn update_does_not_reactivate_terminated_schedules() {
        let now = 1_700_000_000_000;
        let (ctx, mut schedule) = seeded_ctx(now).await;
        schedule.deactivate();
        ctx.repos.schedules.save(&schedule).await.unwrap();

        let mut uc = noop_update(&schedule);
        uc.scheduled_at = Some(now + 3_600_000);
        let updated = execute(uc, &ctx).await.unwrap().schedule;

        assert!(!updated.is_active);
        assert_eq!(updated.next_execution_at, None);
    }

    #[tokio::test]
    async fn other_users_cannot_touch_the_schedule() {
        let now = 1_700_000_000_000;
        let (ctx, schedule) = seeded_ctx(now).await;

        let mut uc = noop_update(&schedule);
        uc.user_id = ID::default();
        let res = execute(uc, &ctx).await;
        assert_eq!(
            res.unwrap_err(),
            UseCaseError::ScheduleNotFound(schedule.id)
        );
    }

    #[tokio::test]
    async fn max_executions_can_be_set_and_cleared() {
        let now = 1_700_000_000_000;
        let (ctx, schedule) = seeded_ctx(now).await;

        let mut uc = noop_update(&schedule);
        uc.max_executions = Some(Some(3));
        let updated = execute(uc, &ctx).await.unwrap().schedule;
        assert_eq!(updated.max_executions, Some(3));

        let mut uc = noop_update(&schedule);
        uc.max_executions = Some(None);
        let updated = execute(uc, &ctx).await.unwrap().schedule;
        assert_eq!(updated.max_executions, None);
    }

    #[tokio::test]
    async fn rejects_a_zero_execution_cap() {
        let now = 1_700_000_000_000;
        let (ctx, schedule) = seeded_ctx(now).await;

        let mut uc = noop_update(&schedule);
        uc.max_executions = Some(Some(0));
        let res = execute(uc, &ctx).await;
        assert_eq!(
            res.unwrap_err(),
            UseCaseError::Invalid(ScheduleValidationError::ZeroMaxExecutions)
        );
    }
}
