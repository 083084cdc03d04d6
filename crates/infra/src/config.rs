use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    /// Hosts that a schedule's target url may point at. Everything else is
    /// rejected when the schedule is created or updated.
    pub allowed_webhook_hosts: Vec<String>,
    /// Maximum number of schedules one user may own
    pub max_schedules_per_user: usize,
    /// Timeout for one webhook delivery. A hung endpoint must not be able
    /// to stall a whole dispatcher pass.
    pub delivery_timeout_secs: u64,
    /// How many due schedules one pass delivers concurrently
    pub max_concurrent_deliveries: usize,
    /// Maximum number of due rows one pass will pick up
    pub dispatch_batch_limit: i64,
}

fn env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    "The given {}: {} is not valid, falling back to the default: {}.",
                    var, raw, default
                );
                default
            }
        },
        Err(_) => default,
    }
}

impl Config {
    pub fn new() -> Self {
        let allowed_webhook_hosts = std::env::var("ALLOWED_WEBHOOK_HOSTS")
            .unwrap_or_else(|_| "discord.com,ptb.discord.com,canary.discord.com".into())
            .split(',')
            .map(|host| host.trim().to_lowercase())
            .filter(|host| !host.is_empty())
            .collect();

        Self {
            allowed_webhook_hosts,
            max_schedules_per_user: env_or("MAX_SCHEDULES_PER_USER", 25),
            delivery_timeout_secs: env_or("DELIVERY_TIMEOUT_SECS", 10),
            max_concurrent_deliveries: env_or("MAX_CONCURRENT_DELIVERIES", 16).max(1),
            dispatch_batch_limit: env_or("DISPATCH_BATCH_LIMIT", 500).max(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
