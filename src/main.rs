use anyhow::Result;
use codevoice::gateway::GeminiGateway;
use codevoice::integration::{IntegrationConfig, Orchestrator, OrchestratorEvent};
use codevoice::session::{Mode, SessionStore};
use std::io::Read;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codevoice=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting codevoice assistant");

    // Usage: codevoice [debug|generate|explain] < input.txt
    let mode: Mode = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "debug".to_string())
        .parse()?;

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    let config = IntegrationConfig::default();
    let gateway = Arc::new(GeminiGateway::from_env()?.with_model(&config.model));
    let store = SessionStore::new(Arc::new(codevoice::session::JsonFileBackend::new(
        "sessions.json",
    )));

    let (orchestrator, handle) = Orchestrator::new(config, gateway, store)?;
    let worker = orchestrator.start()?;

    let request_id = handle.submit(input, mode, None)?;
    info!("Submitted request {}", request_id);

    let events = handle.event_receiver();
    loop {
        match events.recv()? {
            OrchestratorEvent::Completed { session, .. } => {
                println!("## {}", session.title);
                for block in &session.blocks {
                    println!("{}", block.render_markdown());
                }
                break;
            }
            OrchestratorEvent::Failed { error, .. } => {
                eprintln!("Request failed: {error}");
                break;
            }
            other => info!("Event: {:?}", other),
        }
    }

    handle.shutdown()?;
    worker.join().ok();

    Ok(())
}
