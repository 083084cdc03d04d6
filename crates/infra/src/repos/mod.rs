mod schedule;
mod user;

pub use schedule::{IScheduleRepo, InMemoryScheduleRepo, PostgresScheduleRepo};
pub use user::{IUserRepo, InMemoryUserRepo, PostgresUserRepo};

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct Repos {
    pub schedules: Arc<dyn IScheduleRepo>,
    pub users: Arc<dyn IUserRepo>,
}

impl Repos {
    pub async fn create_postgres(connection_string: &str) -> anyhow::Result<Self> {
        info!("DB CHECKING CONNECTION ...");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(connection_string)
            .await?;
        info!("DB CHECKING CONNECTION ... [done]");
        Ok(Self {
            schedules: Arc::new(PostgresScheduleRepo::new(pool.clone())),
            users: Arc::new(PostgresUserRepo::new(pool)),
        })
    }

    pub fn create_inmemory() -> Self {
        Self {
            schedules: Arc::new(InMemoryScheduleRepo::new()),
            users: Arc::new(InMemoryUserRepo::new()),
        }
    }
}
