use crate::execution::ExecuteDueSchedulesUseCase;
use crate::shared::usecase::execute;
use hookpost_infra::HookpostContext;
use std::time::Duration;
use tokio::time::{interval, sleep};
use tracing::info;

pub fn get_start_delay(now_ts: usize, secs_before_min: usize) -> usize {
    let secs_to_next_minute = 60 - (now_ts / 1000) % 60;
    if secs_to_next_minute > secs_before_min {
        secs_to_next_minute - secs_before_min
    } else {
        secs_to_next_minute + (60 - secs_before_min)
    }
}

/// Spawns the dispatcher loop. Waits for the next minute boundary and then
/// runs one dispatch pass every 60 seconds. Each pass runs in its own task
/// so a slow batch of deliveries never delays the following tick.
pub fn start_execution_job(ctx: HookpostContext) {
    tokio::spawn(async move {
        let now = ctx.sys.get_timestamp_millis();
        let secs_to_next_run = get_start_delay(now as usize, 0);
        sleep(Duration::from_secs(secs_to_next_run as u64)).await;

        let mut minutely_interval = interval(Duration::from_secs(60));
        loop {
            minutely_interval.tick().await;
            let context = ctx.clone();
            tokio::spawn(dispatch_pass(context));
        }
    });
}

async fn dispatch_pass(context: HookpostContext) {
    let usecase = ExecuteDueSchedulesUseCase::default();
    if let Ok(report) = execute(usecase, &context).await {
        if report.due > 0 {
            info!(
                "Dispatch pass done. Due: {}, delivered: {}, failed: {}, lost claims: {}",
                report.due, report.delivered, report.failed, report.lost_claims
            );
        }
    }
}
