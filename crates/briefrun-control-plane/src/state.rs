//! Shared application state.

use std::sync::Arc;

use briefrun_core::DecompositionTable;

use crate::channel::TaskChannel;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::dispatcher::TaskDispatcher;
use crate::orchestrator::Orchestrator;
use crate::rate_limiter::RateLimiter;
use crate::registry::RunRegistry;
use crate::store::DocumentStore;

/// Shared application state.
pub struct AppState {
    /// Orchestration engine.
    pub orchestrator: Orchestrator,

    /// Time source for every request.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Assemble the orchestrator from configuration and adapters.
    pub fn new(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        channel: Arc<dyn TaskChannel>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let registry = Arc::new(RunRegistry::new(
            store,
            config.store_timeout(),
            config.max_update_attempts,
        ));
        let dispatcher = TaskDispatcher::new(channel, config.topic.clone(), config.publish_timeout());
        let orchestrator = Orchestrator::new(
            RateLimiter::new(config.quota_limits()),
            DecompositionTable::for_kind(config.decomposition),
            registry,
            dispatcher,
        );

        Arc::new(Self { orchestrator, clock })
    }

    /// State on the wall clock.
    pub fn with_system_clock(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        channel: Arc<dyn TaskChannel>,
    ) -> Arc<Self> {
        Self::new(config, store, channel, Arc::new(SystemClock))
    }
}
