mod config;
mod repos;
mod services;
mod system;

pub use config::Config;
pub use repos::{
    IScheduleRepo, IUserRepo, InMemoryScheduleRepo, InMemoryUserRepo, PostgresScheduleRepo,
    PostgresUserRepo, Repos,
};
pub use services::{DeliveryResult, IDeliveryService, WebhookDeliveryService};
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
pub use system::{ISys, RealSys};

#[derive(Clone)]
pub struct HookpostContext {
    pub repos: Repos,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
    pub delivery: Arc<dyn IDeliveryService>,
}

struct ContextParams {
    pub postgres_connection_string: String,
}

impl HookpostContext {
    async fn create(params: ContextParams) -> Self {
        let repos = Repos::create_postgres(&params.postgres_connection_string)
            .await
            .expect("Postgres credentials must be set and valid");
        let config = Config::new();
        let delivery = WebhookDeliveryService::new(Duration::from_secs(config.delivery_timeout_secs))
            .expect("To create the webhook delivery client");
        Self {
            repos,
            config,
            sys: Arc::new(RealSys {}),
            delivery: Arc::new(delivery),
        }
    }
}

/// Will setup the infrastructure context given the environment
pub async fn setup_context() -> HookpostContext {
    HookpostContext::create(ContextParams {
        postgres_connection_string: get_psql_connection_string(),
    })
    .await
}

/// Context backed by in-process repos, used by tests
pub fn setup_context_inmemory() -> HookpostContext {
    let config = Config::new();
    let delivery = WebhookDeliveryService::new(Duration::from_secs(config.delivery_timeout_secs))
        .expect("To create the webhook delivery client");
    HookpostContext {
        repos: Repos::create_inmemory(),
        config,
        sys: Arc::new(RealSys {}),
        delivery: Arc::new(delivery),
    }
}

fn get_psql_connection_string() -> String {
    const PSQL_CONNECTION_STRING: &str = "DATABASE_URL";

    std::env::var(PSQL_CONNECTION_STRING)
        .unwrap_or_else(|_| panic!("{} env var to be present.", PSQL_CONNECTION_STRING))
}

pub async fn run_migration() -> Result<(), MigrateError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&get_psql_connection_string())
        .await
        .expect("TO CONNECT TO POSTGRES");

    sqlx::migrate!().run(&pool).await
}
