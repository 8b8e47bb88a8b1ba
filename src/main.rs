/// Flowsync: synchronization core for a visual workflow editor
///
/// Headless entry point. Loads one workflow from the configured service, runs
/// the same load path the editor uses (including the automatic layout decision)
/// and prints the resulting canvas graph as JSON.
///
/// Usage: `flowsync <workflow-id> [TB|LR]`
/// With a direction argument the graph is re-laid out before printing.

use anyhow::Context;
use flowsync::{Config, Direction, HttpWorkflowClient, SelectionStore, SyncController, WorkflowCache};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let workflow_id = args
        .next()
        .context("usage: flowsync <workflow-id> [TB|LR]")?;
    let direction = args
        .next()
        .map(|d| d.parse::<Direction>())
        .transpose()
        .map_err(anyhow::Error::msg)?;

    // Load configuration (defaults to localhost:8081)
    let config = Config::default();
    tracing::info!("🚀 Connecting to workflow service at {}", config.api.base_url);

    let store = Arc::new(HttpWorkflowClient::new(&config.api)?);
    let controller = SyncController::new(
        workflow_id.clone(),
        store,
        Arc::new(WorkflowCache::new()),
        Arc::new(SelectionStore::new()),
        &config,
    );

    controller
        .load()
        .await
        .with_context(|| format!("could not open workflow {}", workflow_id))?;

    if let Some(direction) = direction {
        controller.relayout(direction).await?;
    }

    let graph = controller.graph().await;
    println!("{}", serde_json::to_string_pretty(&graph)?);

    controller.close();
    Ok(())
}
