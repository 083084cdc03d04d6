use super::IScheduleRepo;
use hookpost_domain::{Schedule, ID};
use std::sync::Mutex;

/// Schedule store backed by process memory. Used by tests and when no
/// DATABASE_URL is configured. The mutex makes `claim` atomic relative to
/// concurrent passes, mirroring the conditional update of the postgres
/// implementation.
pub struct InMemoryScheduleRepo {
    schedules: Mutex<Vec<Schedule>>,
}

impl InMemoryScheduleRepo {
    pub fn new() -> Self {
        Self {
            schedules: Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryScheduleRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IScheduleRepo for InMemoryScheduleRepo {
    async fn insert(&self, schedule: &Schedule) -> anyhow::Result<()> {
        let mut schedules = self.schedules.lock().unwrap();
        schedules.push(schedule.clone());
        Ok(())
    }

    async fn save(&self, schedule: &Schedule) -> anyhow::Result<()> {
        let mut schedules = self.schedules.lock().unwrap();
        if let Some(existing) = schedules.iter_mut().find(|s| s.id == schedule.id) {
            *existing = schedule.clone();
        }
        Ok(())
    }

    async fn find(&self, schedule_id: &ID) -> Option<Schedule> {
        let schedules = self.schedules.lock().unwrap();
        schedules.iter().find(|s| s.id == *schedule_id).cloned()
    }

    async fn find_by_user(&self, user_id: &ID) -> Vec<Schedule> {
        let schedules = self.schedules.lock().unwrap();
        schedules
            .iter()
            .filter(|s| s.user_id == *user_id)
            .cloned()
            .collect()
    }

    async fn find_due(&self, before: i64, limit: i64) -> Vec<Schedule> {
        let schedules = self.schedules.lock().unwrap();
        let mut due = schedules
            .iter()
            .filter(|s| s.is_due(before))
            .cloned()
            .collect::<Vec<_>>();
        due.sort_by_key(|s| s.next_execution_at);
        due.truncate(limit as usize);
        due
    }

    async fn claim(&self, schedule_id: &ID, version: i64) -> anyhow::Result<Option<Schedule>> {
        let mut schedules = self.schedules.lock().unwrap();
        let claimed = schedules
            .iter_mut()
            .find(|s| s.id == *schedule_id && s.is_active && s.version == version)
            .map(|s| {
                s.version += 1;
                // Consume the due-ness: a pass still delivering this row must
                // not leave it selectable by the next tick's find_due.
                s.next_execution_at = None;
                s.clone()
            });
        Ok(claimed)
    }

    async fn delete(&self, schedule_id: &ID) -> Option<Schedule> {
        let mut schedules = self.schedules.lock().unwrap();
        let pos = schedules.iter().position(|s| s.id == *schedule_id)?;
        Some(schedules.remove(pos))
    }

    async fn delete_by_user(&self, user_id: &ID) -> anyhow::Result<usize> {
        let mut schedules = self.schedules.lock().unwrap();
        let before = schedules.len();
        schedules.retain(|s| s.user_id != *user_id);
        Ok(before - schedules.len())
    }
}
