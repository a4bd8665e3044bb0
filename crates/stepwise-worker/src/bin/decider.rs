use std::sync::Arc;

use anyhow::Result;
use stepwise_core::plan::{EndPolicy, Plan, Task};
use stepwise_core::service::testing::InMemoryWorkflowServiceClient;
use stepwise_worker::{DeciderConfig, DeciderLoop, DeciderPool};

/// Builds a minimal single-activity Plan from environment variables for
/// local/manual runs. Real Plan construction is an external loader's job;
/// this is a convenience, not that loader.
fn plan_from_env() -> Plan {
    let start = Task {
        name: std::env::var("STEPWISE_START_TASK").unwrap_or_else(|_| "start".to_string()),
        version: std::env::var("STEPWISE_START_VERSION").unwrap_or_else(|_| "1".to_string()),
        queue: std::env::var("STEPWISE_QUEUE").unwrap_or_default(),
        timeout_seconds: std::env::var("STEPWISE_START_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60),
    };
    Plan {
        specs: vec![stepwise_core::plan::Spec::Work(start.clone())],
        start,
        end: EndPolicy::Stop,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = DeciderConfig::from_env();
    if config.queue.is_empty() {
        anyhow::bail!("STEPWISE_QUEUE must be set");
    }

    let plan = plan_from_env();
    tracing::info!(queue = %config.queue, concurrency = config.concurrency, "starting stepwise decider");

    let service = Arc::new(InMemoryWorkflowServiceClient::new());
    let decider = Arc::new(DeciderLoop::new(service, plan, config.clone()));
    let pool = DeciderPool::spawn(decider, config.concurrency);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    pool.shutdown().await;
    tracing::info!("stepwise decider stopped");
    Ok(())
}
