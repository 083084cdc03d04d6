use super::IScheduleRepo;
use hookpost_domain::{MessageSnapshot, Recurrence, Schedule, ID};
use sqlx::{types::Uuid, FromRow, PgPool};
use tracing::warn;

pub struct PostgresScheduleRepo {
    pool: PgPool,
}

impl PostgresScheduleRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ScheduleRaw {
    schedule_uid: Uuid,
    user_uid: Uuid,
    message: serde_json::Value,
    target_url: String,
    scheduled_at: i64,
    recurrence: serde_json::Value,
    max_executions: Option<i32>,
    execution_count: i32,
    next_execution_at: Option<i64>,
    last_executed_at: Option<i64>,
    is_active: bool,
    version: i64,
    created_at: i64,
    updated_at: i64,
}

impl From<ScheduleRaw> for Schedule {
    fn from(raw: ScheduleRaw) -> Self {
        let schedule_uid = raw.schedule_uid;
        let recurrence = serde_json::from_value(raw.recurrence).unwrap_or_else(|e| {
            // A row the current schema cannot read must still execute its
            // final pass, Once terminates it cleanly.
            warn!(
                "Unreadable recurrence on schedule {}, treating as once: {:?}",
                schedule_uid, e
            );
            Recurrence::Once
        });
        Self {
            id: raw.schedule_uid.into(),
            user_id: raw.user_uid.into(),
            message: MessageSnapshot::from_json(raw.message),
            target_url: raw.target_url,
            scheduled_at: raw.scheduled_at,
            recurrence,
            max_executions: raw.max_executions.map(|max| max as u32),
            execution_count: raw.execution_count as u32,
            next_execution_at: raw.next_execution_at,
            last_executed_at: raw.last_executed_at,
            is_active: raw.is_active,
            version: raw.version,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

#[async_trait::async_trait]
impl IScheduleRepo for PostgresScheduleRepo {
    async fn insert(&self, schedule: &Schedule) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO schedules
            (schedule_uid, user_uid, message, target_url, scheduled_at, recurrence,
             max_executions, execution_count, next_execution_at, last_executed_at,
             is_active, version, created_at, updated_at)
            VALUES($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(schedule.id.inner_ref())
        .bind(schedule.user_id.inner_ref())
        .bind(serde_json::to_value(&schedule.message)?)
        .bind(&schedule.target_url)
        .bind(schedule.scheduled_at)
        .bind(serde_json::to_value(&schedule.recurrence)?)
        .bind(schedule.max_executions.map(|max| max as i32))
        .bind(schedule.execution_count as i32)
        .bind(schedule.next_execution_at)
        .bind(schedule.last_executed_at)
        .bind(schedule.is_active)
        .bind(schedule.version)
        .bind(schedule.created_at)
        .bind(schedule.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save(&self, schedule: &Schedule) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE schedules
            SET message = $2,
                target_url = $3,
                scheduled_at = $4,
                recurrence = $5,
                max_executions = $6,
                execution_count = $7,
                next_execution_at = $8,
                last_executed_at = $9,
                is_active = $10,
                updated_at = $11
            WHERE schedule_uid = $1
            "#,
        )
        .bind(schedule.id.inner_ref())
        .bind(serde_json::to_value(&schedule.message)?)
        .bind(&schedule.target_url)
        .bind(schedule.scheduled_at)
        .bind(serde_json::to_value(&schedule.recurrence)?)
        .bind(schedule.max_executions.map(|max| max as i32))
        .bind(schedule.execution_count as i32)
        .bind(schedule.next_execution_at)
        .bind(schedule.last_executed_at)
        .bind(schedule.is_active)
        .bind(schedule.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, schedule_id: &ID) -> Option<Schedule> {
        sqlx::query_as::<_, ScheduleRaw>(
            r#"
            SELECT * FROM schedules
            WHERE schedule_uid = $1
            "#,
        )
        .bind(schedule_id.inner_ref())
        .fetch_optional(&self.pool)
        .await
        .unwrap_or(None)
        .map(|raw| raw.into())
    }

    async fn find_by_user(&self, user_id: &ID) -> Vec<Schedule> {
        sqlx::query_as::<_, ScheduleRaw>(
            r#"
            SELECT * FROM schedules
            WHERE user_uid = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id.inner_ref())
        .fetch_all(&self.pool)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|raw| raw.into())
        .collect()
    }

    async fn find_due(&self, before: i64, limit: i64) -> Vec<Schedule> {
        sqlx::query_as::<_, ScheduleRaw>(
            r#"
            SELECT * FROM schedules
            WHERE is_active = TRUE AND next_execution_at <= $1
            ORDER BY next_execution_at ASC
            LIMIT $2
            "#,
        )
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|raw| raw.into())
        .collect()
    }

    async fn claim(&self, schedule_id: &ID, version: i64) -> anyhow::Result<Option<Schedule>> {
        // Bumping the version makes concurrent claimers lose; clearing
        // next_execution_at makes the row invisible to find_due until the
        // executing pass saves the outcome, so a pass that outlives its
        // tick interval cannot race a later pass on the same occurrence.
        let claimed = sqlx::query_as::<_, ScheduleRaw>(
            r#"
            UPDATE schedules
            SET version = version + 1, next_execution_at = NULL
            WHERE schedule_uid = $1 AND is_active = TRUE AND version = $2
            RETURNING *
            "#,
        )
        .bind(schedule_id.inner_ref())
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(claimed.map(|raw| raw.into()))
    }

    async fn delete(&self, schedule_id: &ID) -> Option<Schedule> {
        sqlx::query_as::<_, ScheduleRaw>(
            r#"
            DELETE FROM schedules
            WHERE schedule_uid = $1
            RETURNING *
            "#,
        )
        .bind(schedule_id.inner_ref())
        .fetch_optional(&self.pool)
        .await
        .unwrap_or(None)
        .map(|raw| raw.into())
    }

    async fn delete_by_user(&self, user_id: &ID) -> anyhow::Result<usize> {
        let res = sqlx::query(
            r#"
            DELETE FROM schedules
            WHERE user_uid = $1
            "#,
        )
        .bind(user_id.inner_ref())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() as usize)
    }
}
