mod inmemory;
mod postgres;

use hookpost_domain::{Schedule, ID};
pub use inmemory::InMemoryScheduleRepo;
pub use postgres::PostgresScheduleRepo;

#[async_trait::async_trait]
pub trait IScheduleRepo: Send + Sync {
    async fn insert(&self, schedule: &Schedule) -> anyhow::Result<()>;
    async fn save(&self, schedule: &Schedule) -> anyhow::Result<()>;
    async fn find(&self, schedule_id: &ID) -> Option<Schedule>;
    async fn find_by_user(&self, user_id: &ID) -> Vec<Schedule>;
    /// Active schedules with `next_execution_at <= before`, oldest due
    /// first so that a backlog cannot starve the longest-waiting rows.
    async fn find_due(&self, before: i64, limit: i64) -> Vec<Schedule>;
    /// Atomically claims a due schedule for execution. Succeeds only when
    /// the row is still active and its version still equals `version`, and
    /// bumps the version so any concurrent pass racing on the same row
    /// loses. The claim also clears `next_execution_at`, taking the row out
    /// of `find_due` until the executing pass saves the outcome; a pass
    /// that is still delivering when the next tick fires therefore cannot
    /// have its occurrence delivered twice. Returns the claimed row, or
    /// None when the claim was lost.
    async fn claim(&self, schedule_id: &ID, version: i64) -> anyhow::Result<Option<Schedule>>;
    async fn delete(&self, schedule_id: &ID) -> Option<Schedule>;
    async fn delete_by_user(&self, user_id: &ID) -> anyhow::Result<usize>;
}
