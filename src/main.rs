mod telemetry;

use hookpost_core::start_execution_job;
use hookpost_infra::setup_context;
use telemetry::{get_subscriber, init_subscriber};
use tracing::info;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    openssl_probe::init_ssl_cert_env_vars();

    let subscriber = get_subscriber("hookpost".into(), "info".into());
    init_subscriber(subscriber);

    let context = setup_context().await;

    start_execution_job(context);
    info!("Schedule execution engine started");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
