use crate::shared::usecase::UseCase;
use futures::stream::{self, StreamExt};
use hookpost_domain::{build_payload, compute_next, NextFire, Schedule};
use hookpost_infra::HookpostContext;
use thiserror::Error;
use tracing::{error, warn};

/// One dispatcher pass: select due schedules, claim each one, deliver the
/// claimed ones concurrently and advance their state. Safe to run from
/// several processes at once, the claim makes each due occurrence fire at
/// most once.
#[derive(Debug, Default)]
pub struct ExecuteDueSchedulesUseCase {
    /// Overrides the clock for this pass. `None` means the system clock.
    pub now: Option<i64>,
}

#[derive(Debug, Default, PartialEq)]
pub struct TickReport {
    pub due: usize,
    pub claimed: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Due rows another pass claimed first
    pub lost_claims: usize,
}

#[derive(Debug, Error)]
pub enum UseCaseError {}

#[async_trait::async_trait]
impl UseCase for ExecuteDueSchedulesUseCase {
    type Response = TickReport;

    type Error = UseCaseError;

    const NAME: &'static str = "ExecuteDueSchedules";

    async fn execute(&mut self, ctx: &HookpostContext) -> Result<Self::Response, Self::Error> {
        let now = self.now.unwrap_or_else(|| ctx.sys.get_timestamp_millis());
        let due = ctx
            .repos
            .schedules
            .find_due(now, ctx.config.dispatch_batch_limit)
            .await;

        let mut report = TickReport {
            due: due.len(),
            ..Default::default()
        };

        let mut claimed = Vec::with_capacity(due.len());
        for schedule in due {
            match ctx.repos.schedules.claim(&schedule.id, schedule.version).await {
                // An update can drop the cap to or below the current count
                // after the row was stored, so exhaustion is re-checked on
                // the claimed row: such rows terminate without a delivery.
                Ok(Some(mut schedule)) if schedule.is_exhausted() => {
                    schedule.deactivate();
                    if let Err(e) = ctx.repos.schedules.save(&schedule).await {
                        error!(
                            "Failed to save exhausted schedule: {}. Err: {:?}",
                            schedule.id.as_string(),
                            e
                        );
                    }
                }
                Ok(Some(schedule)) => claimed.push(schedule),
                Ok(None) => report.lost_claims += 1,
                Err(e) => {
                    warn!(
                        "Failed to claim schedule: {}. Err: {:?}",
                        schedule.id.as_string(),
                        e
                    );
                    report.lost_claims += 1;
                }
            }
        }
        report.claimed = claimed.len();

        let outcomes: Vec<bool> = stream::iter(claimed)
            .map(|schedule| execute_one(schedule, now, ctx))
            .buffer_unordered(ctx.config.max_concurrent_deliveries)
            .collect()
            .await;
        report.delivered = outcomes.iter().filter(|ok| **ok).count();
        report.failed = outcomes.len() - report.delivered;

        Ok(report)
    }
}

/// Delivers one claimed schedule and advances its state. The occurrence is
/// consumed whether or not the webhook accepted it, a failed delivery is
/// never replayed.
async fn execute_one(mut schedule: Schedule, now: i64, ctx: &HookpostContext) -> bool {
    let payload = build_payload(&schedule.message);
    let result = ctx
        .delivery
        .deliver(&schedule.target_url, &payload, &schedule.message.attachments)
        .await;
    if !result.is_success() {
        warn!(
            "Delivery failed for schedule: {}. Result: {:?}",
            schedule.id.as_string(),
            result
        );
    }

    let next = match compute_next(&schedule.recurrence, now) {
        Ok(next) => next,
        Err(e) => {
            // A stored expression is validated at write time, so this only
            // happens if something corrupted the row. Terminate it rather
            // than retrying the same row every minute.
            error!(
                "Stored recurrence for schedule: {} no longer parses: {}",
                schedule.id.as_string(),
                e
            );
            NextFire::Terminal
        }
    };
    schedule.register_execution(now, next);

    if let Err(e) = ctx.repos.schedules.save(&schedule).await {
        error!(
            "Failed to save schedule: {} after execution. Err: {:?}",
            schedule.id.as_string(),
            e
        );
    }

    result.is_success()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::usecase::execute;
    use hookpost_domain::{Attachment, MessageSnapshot, Recurrence, User, WirePayload};
    use hookpost_infra::{setup_context_inmemory, DeliveryResult, IDeliveryService, ISys};
    use std::sync::{Arc, Mutex};

    struct StaticTimeSys(i64);
    impl ISys for StaticTimeSys {
        fn get_timestamp_millis(&self) -> i64 {
            self.0
        }
    }

    struct FakeDeliveryService {
        result: DeliveryResult,
        sent: Mutex<Vec<(String, WirePayload)>>,
    }

    impl FakeDeliveryService {
        fn new(result: DeliveryResult) -> Arc<Self> {
            Arc::new(Self {
                result,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<(String, WirePayload)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl IDeliveryService for FakeDeliveryService {
        async fn deliver(
            &self,
            url: &str,
            payload: &WirePayload,
            _attachments: &[Attachment],
        ) -> DeliveryResult {
            self.sent
                .lock()
                .unwrap()
                .push((url.to_string(), payload.clone()));
            match self.result {
                DeliveryResult::Success(s) => DeliveryResult::Success(s),
                DeliveryResult::Rejected(s) => DeliveryResult::Rejected(s),
                DeliveryResult::Transient(s) => DeliveryResult::Transient(s),
            }
        }
    }

    const NOW: i64 = 1_700_000_000_000;

    fn ctx_with(
        delivery: Arc<FakeDeliveryService>,
    ) -> hookpost_infra::HookpostContext {
        let mut ctx = setup_context_inmemory();
        ctx.sys = Arc::new(StaticTimeSys(NOW));
        ctx.delivery = delivery;
        ctx
    }

    async fn seed_schedule(
        ctx: &hookpost_infra::HookpostContext,
        recurrence: Recurrence,
        max_executions: Option<u32>,
    ) -> Schedule {
        let user = User::new(NOW);
        ctx.repos.users.insert(&user).await.unwrap();
        let mut schedule = Schedule::new(
            user.id,
            MessageSnapshot {
                content: "fire".into(),
                ..Default::default()
            },
            "https://discord.com/api/webhooks/1/token".into(),
            NOW - 1_000,
            recurrence,
            NOW - 1_000,
        );
        schedule.max_executions = max_executions;
        ctx.repos.schedules.insert(&schedule).await.unwrap();
        schedule
    }

    async fn tick(ctx: &hookpost_infra::HookpostContext, now: i64) -> TickReport {
        execute(ExecuteDueSchedulesUseCase { now: Some(now) }, ctx)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn delivers_due_one_off_schedule_and_terminates_it() {
        let delivery = FakeDeliveryService::new(DeliveryResult::Success(204));
        let ctx = ctx_with(delivery.clone());
        let schedule = seed_schedule(&ctx, Recurrence::Once, None).await;

        let report = tick(&ctx, NOW).await;
        assert_eq!(report.due, 1);
        assert_eq!(report.claimed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 0);

        let sent = delivery.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, schedule.target_url);
        assert_eq!(sent[0].1.content.as_deref(), Some("fire"));

        let stored = ctx.repos.schedules.find(&schedule.id).await.unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.next_execution_at, None);
        assert_eq!(stored.execution_count, 1);
        assert_eq!(stored.last_executed_at, Some(NOW));

        // Nothing left to do on the next pass
        let report = tick(&ctx, NOW + 60_000).await;
        assert_eq!(report, TickReport::default());
        assert_eq!(delivery.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_still_consumes_the_occurrence() {
        let delivery = FakeDeliveryService::new(DeliveryResult::Rejected(404));
        let ctx = ctx_with(delivery.clone());
        let schedule = seed_schedule(&ctx, Recurrence::Once, None).await;

        let report = tick(&ctx, NOW).await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed, 1);

        let stored = ctx.repos.schedules.find(&schedule.id).await.unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.execution_count, 1);

        // No replay of the failed occurrence
        let report = tick(&ctx, NOW + 60_000).await;
        assert_eq!(report.due, 0);
        assert_eq!(delivery.sent().len(), 1);
    }

    #[tokio::test]
    async fn recurring_schedule_advances_along_its_cadence() {
        let delivery = FakeDeliveryService::new(DeliveryResult::Success(204));
        let ctx = ctx_with(delivery.clone());
        let schedule = seed_schedule(
            &ctx,
            Recurrence::Cron {
                expression: "*/5 * * * *".into(),
                timezone: None,
            },
            None,
        )
        .await;

        tick(&ctx, NOW).await;

        let stored = ctx.repos.schedules.find(&schedule.id).await.unwrap();
        assert!(stored.is_active);
        let next = stored.next_execution_at.unwrap();
        assert!(next > NOW);
        assert!(next <= NOW + 5 * 60_000);
    }

    #[tokio::test]
    async fn max_executions_terminates_after_exactly_that_many_firings() {
        let delivery = FakeDeliveryService::new(DeliveryResult::Success(204));
        let ctx = ctx_with(delivery.clone());
        let schedule = seed_schedule(
            &ctx,
            Recurrence::Cron {
                expression: "* * * * *".into(),
                timezone: None,
            },
            Some(3),
        )
        .await;

        let mut now = NOW;
        for expected_count in 1..=3u32 {
            let report = tick(&ctx, now).await;
            assert_eq!(report.delivered, 1);
            let stored = ctx.repos.schedules.find(&schedule.id).await.unwrap();
            assert_eq!(stored.execution_count, expected_count);
            now += 5 * 60_000;
        }

        let stored = ctx.repos.schedules.find(&schedule.id).await.unwrap();
        assert!(!stored.is_active);

        let report = tick(&ctx, now).await;
        assert_eq!(report.due, 0);
        assert_eq!(delivery.sent().len(), 3);
    }

    #[tokio::test]
    async fn exhausted_cap_terminates_without_a_delivery() {
        let delivery = FakeDeliveryService::new(DeliveryResult::Success(204));
        let ctx = ctx_with(delivery.clone());
        // An update dropped the cap below the count after two firings
        let mut schedule = seed_schedule(
            &ctx,
            Recurrence::Cron {
                expression: "* * * * *".into(),
                timezone: None,
            },
            Some(1),
        )
        .await;
        schedule.execution_count = 2;
        ctx.repos.schedules.save(&schedule).await.unwrap();

        let report = tick(&ctx, NOW).await;
        assert_eq!(report.due, 1);
        assert_eq!(report.claimed, 0);
        assert_eq!(report.delivered, 0);
        assert!(delivery.sent().is_empty());

        let stored = ctx.repos.schedules.find(&schedule.id).await.unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.execution_count, 2);
    }

    /// Delivery that signals when it starts and waits for a release before
    /// answering, so a pass can be held mid-delivery across a tick boundary.
    struct GatedDeliveryService {
        started: Mutex<Option<futures::channel::oneshot::Sender<()>>>,
        release: Mutex<Option<futures::channel::oneshot::Receiver<()>>>,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl IDeliveryService for GatedDeliveryService {
        async fn deliver(
            &self,
            url: &str,
            _payload: &WirePayload,
            _attachments: &[Attachment],
        ) -> DeliveryResult {
            if let Some(started) = self.started.lock().unwrap().take() {
                let _ = started.send(());
            }
            let release = self.release.lock().unwrap().take();
            if let Some(release) = release {
                let _ = release.await;
            }
            self.sent.lock().unwrap().push(url.to_string());
            DeliveryResult::Success(204)
        }
    }

    #[tokio::test]
    async fn a_pass_outliving_its_tick_does_not_double_deliver() {
        let (started_tx, started_rx) = futures::channel::oneshot::channel();
        let (release_tx, release_rx) = futures::channel::oneshot::channel();
        let delivery = Arc::new(GatedDeliveryService {
            started: Mutex::new(Some(started_tx)),
            release: Mutex::new(Some(release_rx)),
            sent: Mutex::new(Vec::new()),
        });
        let mut ctx = setup_context_inmemory();
        ctx.sys = Arc::new(StaticTimeSys(NOW));
        ctx.delivery = delivery.clone();
        seed_schedule(&ctx, Recurrence::Once, None).await;

        let slow_ctx = ctx.clone();
        let first_pass = tokio::spawn(async move { tick(&slow_ctx, NOW).await });
        started_rx.await.expect("First pass to reach delivery");

        // The next minutely tick fires while the first is still delivering
        let second = tick(&ctx, NOW + 60_000).await;
        assert_eq!(second.due, 0);
        assert_eq!(second.delivered, 0);

        release_tx.send(()).expect("First pass to be waiting");
        let first = first_pass.await.expect("First pass to finish");
        assert_eq!(first.delivered, 1);
        assert_eq!(delivery.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_passes_deliver_each_occurrence_once() {
        let delivery = FakeDeliveryService::new(DeliveryResult::Success(204));
        let ctx = ctx_with(delivery.clone());
        seed_schedule(&ctx, Recurrence::Once, None).await;

        let (a, b) = futures::join!(tick(&ctx, NOW), tick(&ctx, NOW));

        assert_eq!(a.delivered + b.delivered, 1);
        assert_eq!(delivery.sent().len(), 1);
    }

    /// Always loses the claim race, as if another process got there first.
    struct AlwaysClaimedRepo(hookpost_infra::InMemoryScheduleRepo);

    #[async_trait::async_trait]
    impl hookpost_infra::IScheduleRepo for AlwaysClaimedRepo {
        async fn insert(&self, schedule: &Schedule) -> anyhow::Result<()> {
            self.0.insert(schedule).await
        }
        async fn save(&self, schedule: &Schedule) -> anyhow::Result<()> {
            self.0.save(schedule).await
        }
        async fn find(&self, schedule_id: &hookpost_domain::ID) -> Option<Schedule> {
            self.0.find(schedule_id).await
        }
        async fn find_by_user(&self, user_id: &hookpost_domain::ID) -> Vec<Schedule> {
            self.0.find_by_user(user_id).await
        }
        async fn find_due(&self, before: i64, limit: i64) -> Vec<Schedule> {
            self.0.find_due(before, limit).await
        }
        async fn claim(
            &self,
            _schedule_id: &hookpost_domain::ID,
            _version: i64,
        ) -> anyhow::Result<Option<Schedule>> {
            Ok(None)
        }
        async fn delete(&self, schedule_id: &hookpost_domain::ID) -> Option<Schedule> {
            self.0.delete(schedule_id).await
        }
        async fn delete_by_user(&self, user_id: &hookpost_domain::ID) -> anyhow::Result<usize> {
            self.0.delete_by_user(user_id).await
        }
    }

    #[tokio::test]
    async fn rows_claimed_by_another_pass_are_counted_as_lost() {
        let delivery = FakeDeliveryService::new(DeliveryResult::Success(204));
        let mut ctx = ctx_with(delivery.clone());
        ctx.repos.schedules = Arc::new(AlwaysClaimedRepo(
            hookpost_infra::InMemoryScheduleRepo::new(),
        ));
        seed_schedule(&ctx, Recurrence::Once, None).await;

        let report = tick(&ctx, NOW).await;
        assert_eq!(report.due, 1);
        assert_eq!(report.claimed, 0);
        assert_eq!(report.lost_claims, 1);
        assert!(delivery.sent().is_empty());
    }

    #[tokio::test]
    async fn schedules_not_yet_due_are_left_alone() {
        let delivery = FakeDeliveryService::new(DeliveryResult::Success(204));
        let ctx = ctx_with(delivery.clone());
        let user = User::new(NOW);
        ctx.repos.users.insert(&user).await.unwrap();
        let schedule = Schedule::new(
            user.id,
            MessageSnapshot {
                content: "later".into(),
                ..Default::default()
            },
            "https://discord.com/api/webhooks/1/token".into(),
            NOW + 3_600_000,
            Recurrence::Once,
            NOW,
        );
        ctx.repos.schedules.insert(&schedule).await.unwrap();

        let report = tick(&ctx, NOW).await;
        assert_eq!(report, TickReport::default());
        assert!(delivery.sent().is_empty());
    }

    #[tokio::test]
    async fn batch_limit_caps_one_pass() {
        let delivery = FakeDeliveryService::new(DeliveryResult::Success(204));
        let mut ctx = ctx_with(delivery.clone());
        ctx.config.dispatch_batch_limit = 2;
        for _ in 0..3 {
            seed_schedule(&ctx, Recurrence::Once, None).await;
        }

        let report = tick(&ctx, NOW).await;
        assert_eq!(report.due, 2);
        assert_eq!(report.delivered, 2);

        let report = tick(&ctx, NOW).await;
        assert_eq!(report.due, 1);
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn transient_failures_are_counted_but_not_replayed() {
        let delivery = FakeDeliveryService::new(DeliveryResult::Transient(None));
        let ctx = ctx_with(delivery.clone());
        let schedule = seed_schedule(
            &ctx,
            Recurrence::Cron {
                expression: "* * * * *".into(),
                timezone: None,
            },
            None,
        )
        .await;

        let report = tick(&ctx, NOW).await;
        assert_eq!(report.failed, 1);

        // The cadence moved past the failed occurrence
        let stored = ctx.repos.schedules.find(&schedule.id).await.unwrap();
        assert!(stored.is_active);
        assert!(stored.next_execution_at.unwrap() > NOW);
        assert_eq!(stored.execution_count, 1);
    }
}
