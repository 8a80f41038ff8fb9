use std::time::Duration;

use courier_core::secrets::SecretKey;

/// Default queue polling interval.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default cap on jobs sending at the same time.
const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Default quiet period after which a running job counts as abandoned.
const DEFAULT_STALE_JOB_SECS: u64 = 900;

/// Dispatcher and runner settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub max_concurrent_jobs: usize,
    /// Pause between recipients within one job (SMTP rate limits).
    pub send_delay: Duration,
    /// Running jobs untouched for this long are failed at startup. Must
    /// exceed `send_delay` plus the slowest SMTP exchange.
    pub stale_job_after: Duration,
    /// Key that opens stored SMTP passwords.
    pub smtp_secret_key: SecretKey,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable                     | Required | Default |
    /// |------------------------------|----------|---------|
    /// | `SMTP_ENCRYPTION_KEY`        | yes      |         |
    /// | `WORKER_POLL_INTERVAL_MS`    | no       | `1000`  |
    /// | `WORKER_MAX_CONCURRENT_JOBS` | no       | `4`     |
    /// | `WORKER_SEND_DELAY_MS`       | no       | `0`     |
    /// | `WORKER_STALE_JOB_SECS`      | no       | `900`   |
    ///
    /// # Panics
    ///
    /// Panics if `SMTP_ENCRYPTION_KEY` is missing or is not a base64-encoded
    /// 32-byte key.
    pub fn from_env() -> Self {
        let encoded =
            std::env::var("SMTP_ENCRYPTION_KEY").expect("SMTP_ENCRYPTION_KEY must be set");
        let smtp_secret_key = SecretKey::from_base64(&encoded)
            .expect("SMTP_ENCRYPTION_KEY must be a base64-encoded 32-byte key");

        Self {
            poll_interval: Duration::from_millis(env_or("WORKER_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)),
            max_concurrent_jobs: env_or("WORKER_MAX_CONCURRENT_JOBS", DEFAULT_MAX_CONCURRENT_JOBS).max(1),
            send_delay: Duration::from_millis(env_or("WORKER_SEND_DELAY_MS", 0)),
            stale_job_after: Duration::from_secs(env_or("WORKER_STALE_JOB_SECS", DEFAULT_STALE_JOB_SECS)),
            smtp_secret_key,
        }
    }

    /// Config with defaults and the given key (tests, embedded use).
    pub fn with_key(smtp_secret_key: SecretKey) -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            send_delay: Duration::ZERO,
            stale_job_after: Duration::from_secs(DEFAULT_STALE_JOB_SECS),
            smtp_secret_key,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
