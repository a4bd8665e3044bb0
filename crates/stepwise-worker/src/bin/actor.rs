use std::sync::Arc;

use anyhow::Result;
use stepwise_core::service::testing::{InMemoryObjectStore, InMemoryWorkflowServiceClient};
use stepwise_worker::{ActorConfig, ActorLoop, ActorPool};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ActorConfig::from_env();
    if config.queue.is_empty() || config.command.is_empty() {
        anyhow::bail!("STEPWISE_QUEUE and STEPWISE_COMMAND must be set");
    }

    tracing::info!(queue = %config.queue, concurrency = config.concurrency, "starting stepwise actor");

    // No production WorkflowServiceClient/ObjectStoreClient ships in this
    // core; the wire encoding and credentials are external collaborators.
    // The in-memory doubles let this binary run standalone for local
    // smoke-testing against a pre-seeded queue.
    let service = Arc::new(InMemoryWorkflowServiceClient::new());
    let store = Arc::new(InMemoryObjectStore::new());

    let actor = Arc::new(ActorLoop::new(service, store, config.clone()));
    let pool = ActorPool::spawn(actor, config.concurrency);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    pool.shutdown().await;
    tracing::info!("stepwise actor stopped");
    Ok(())
}
