//! HTTP request handlers.

mod briefings;
mod health;
mod runs;
mod stats;
mod tasks;

pub use briefings::submit_briefing;
pub use health::{health_check, metrics_handler};
pub use runs::{get_run, get_run_results};
pub use stats::get_stats;
pub use tasks::submit_task_result;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};

    use crate::channel::InMemoryChannel;
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::state::AppState;
    use crate::store::InMemoryDocumentStore;

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0).unwrap()
    }

    pub fn state_with(config: Config) -> Arc<AppState> {
        AppState::new(
            &config,
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryChannel::new()),
            Arc::new(ManualClock::new(t0())),
        )
    }

    pub fn state() -> Arc<AppState> {
        state_with(Config::default())
    }
}
