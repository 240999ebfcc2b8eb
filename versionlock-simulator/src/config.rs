use std::time::Duration;

use envconfig::Envconfig;
use versionlock::{Backoff, RetryPolicy};

/// Extra pause of the slow writer when it runs through the retry handler.
const RETRY_EXTRA_THINK_TIME: Duration = Duration::from_millis(150);

#[derive(Envconfig)]
pub struct Config {
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: log::LevelFilter,

    #[envconfig(from = "MAX_RETRIES", default = "3")]
    pub max_retries: u32,

    #[envconfig(from = "RETRY_BACKOFF_MS", default = "0")]
    pub retry_backoff_ms: u64,

    #[envconfig(from = "SLOW_WRITER_THINK_MS", default = "850")]
    pub slow_writer_think_ms: u64,

    #[envconfig(from = "FAST_WRITER_THINK_MS", default = "0")]
    pub fast_writer_think_ms: u64,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = match self.retry_backoff_ms {
            0 => Backoff::None,
            ms => Backoff::Fixed(Duration::from_millis(ms)),
        };

        RetryPolicy::new(self.max_retries).with_backoff(backoff)
    }

    pub fn slow_writer_think_time(&self) -> Duration {
        Duration::from_millis(self.slow_writer_think_ms)
    }

    pub fn slow_retrying_writer_think_time(&self) -> Duration {
        self.slow_writer_think_time() + RETRY_EXTRA_THINK_TIME
    }

    pub fn fast_writer_think_time(&self) -> Duration {
        Duration::from_millis(self.fast_writer_think_ms)
    }
}
