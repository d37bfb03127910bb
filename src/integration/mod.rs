pub mod config;
pub mod orchestrator;

pub use config::IntegrationConfig;
pub use orchestrator::{Orchestrator, OrchestratorCommand, OrchestratorEvent, OrchestratorHandle};
