//! BriefRun Control Plane Library
//!
//! This crate provides the orchestration engine for BriefRun: quota
//! admission, run creation, task dispatch and result collection, together
//! with the storage and channel ports it runs against and the HTTP boundary.

pub mod channel;
pub mod clock;
pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod metrics;
pub mod orchestrator;
pub mod rate_limiter;
pub mod registry;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::OrchestratorError;
pub use orchestrator::{BriefingReceipt, Orchestrator, RunResults};
pub use state::AppState;
