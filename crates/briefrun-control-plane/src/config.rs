//! Control plane configuration.

use std::time::Duration;

use clap::Parser;

use briefrun_core::DecompositionKind;

use crate::rate_limiter::QuotaLimits;

/// Control plane configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "briefrun-control-plane", version, about = "BriefRun orchestration server")]
pub struct Config {
    /// HTTP server bind address.
    #[arg(long, env = "BRIEFRUN_HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: String,

    /// Briefings admitted per calendar month.
    #[arg(long, env = "MONTHLY_LIMIT", default_value_t = 10_000)]
    pub monthly_limit: u64,

    /// Briefings admitted per calendar day.
    #[arg(long, env = "DAILY_LIMIT", default_value_t = 500)]
    pub daily_limit: u64,

    /// Topic task messages are published to.
    #[arg(long, env = "BRIEFRUN_TOPIC", default_value = "briefrun-tasks")]
    pub topic: String,

    /// Push endpoint for task messages. Without it messages stay in process.
    #[arg(long, env = "BRIEFRUN_PUBLISH_URL")]
    pub publish_url: Option<String>,

    /// Deadline for each document store call (milliseconds).
    #[arg(long, env = "BRIEFRUN_STORE_TIMEOUT_MS", default_value_t = 5_000)]
    pub store_timeout_ms: u64,

    /// Deadline for each publish call (milliseconds).
    #[arg(long, env = "BRIEFRUN_PUBLISH_TIMEOUT_MS", default_value_t = 5_000)]
    pub publish_timeout_ms: u64,

    /// Optimistic retries for one run update before giving up.
    #[arg(long, env = "BRIEFRUN_MAX_UPDATE_ATTEMPTS", default_value_t = 8)]
    pub max_update_attempts: u32,

    /// Decomposition table: `keyword` or `staged`.
    #[arg(long, env = "BRIEFRUN_DECOMPOSITION", default_value_t = DecompositionKind::Keyword)]
    pub decomposition: DecompositionKind,
}

impl Config {
    pub fn quota_limits(&self) -> QuotaLimits {
        QuotaLimits {
            monthly: self.monthly_limit,
            daily: self.daily_limit,
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            monthly_limit: 10_000,
            daily_limit: 500,
            topic: "briefrun-tasks".to_string(),
            publish_url: None,
            store_timeout_ms: 5_000,
            publish_timeout_ms: 5_000,
            max_update_attempts: 8,
            decomposition: DecompositionKind::Keyword,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::try_parse_from([
            "briefrun-control-plane",
            "--monthly-limit",
            "2",
            "--daily-limit",
            "1",
            "--decomposition",
            "staged",
            "--publish-url",
            "http://127.0.0.1:9000/push",
        ])
        .unwrap();

        assert_eq!(config.quota_limits(), QuotaLimits { monthly: 2, daily: 1 });
        assert_eq!(config.decomposition, DecompositionKind::Staged);
        assert_eq!(config.publish_url.as_deref(), Some("http://127.0.0.1:9000/push"));
    }

    #[test]
    fn test_unknown_decomposition_rejected() {
        assert!(Config::try_parse_from(["briefrun-control-plane", "--decomposition", "llm"]).is_err());
    }

    #[test]
    fn test_default_timeouts() {
        let config = Config::default();
        assert_eq!(config.store_timeout(), Duration::from_secs(5));
        assert_eq!(config.publish_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_update_attempts, 8);
    }
}
