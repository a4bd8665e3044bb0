//! `N`-worker concurrency for the Actor Loop and Decider Loop: each worker
//! is an independent Tokio task running a sequential poll/respond loop with
//! no shared mutable state, coordinated only through a `watch`-channel
//! shutdown signal — no backpressure watermarks, no heartbeat machinery,
//! exactly one workspace per worker, unbounded acceptance.

use std::sync::Arc;
use std::time::Duration;

use stepwise_core::service::{ObjectStoreClient, WorkflowServiceClient};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::actor::ActorLoop;
use crate::decider::DeciderLoop;

/// How long a worker sleeps after an empty poll before polling again.
///
/// `Throttling` and `UnknownResource` service errors never reach here: the
/// Actor Loop and Decider Loop absorb those internally via
/// `stepwise_core::reliability::absorb_retriable` (indefinite 5s-sleep
/// retry, and a single retry, respectively). An `Err` out of `run_once`
/// is therefore always a non-retriable protocol or transport failure;
/// this short backoff just paces the next iteration's poll.
const IDLE_BACKOFF: Duration = Duration::from_millis(200);

/// Runs `N` independent Actor workers as Tokio tasks, each a sequential
/// `poll -> stage-in -> run -> stage-out -> respond` loop with no shared
/// mutable state.
pub struct ActorPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl ActorPool {
    pub fn spawn<S, O>(actor: Arc<ActorLoop<S, O>>, concurrency: usize) -> Self
    where
        S: WorkflowServiceClient + 'static,
        O: ObjectStoreClient + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = (0..concurrency)
            .map(|worker_index| {
                let actor = Arc::clone(&actor);
                let mut shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    loop {
                        if *shutdown_rx.borrow() || actor.should_quiesce() {
                            info!(worker_index, "actor worker quiescing");
                            break;
                        }

                        match actor.run_once().await {
                            Ok(true) => {}
                            Ok(false) => tokio::time::sleep(IDLE_BACKOFF).await,
                            Err(err) => {
                                error!(worker_index, error = %err, "actor iteration failed");
                                tokio::time::sleep(IDLE_BACKOFF).await;
                            }
                        }

                        if shutdown_rx.has_changed().unwrap_or(false) && *shutdown_rx.borrow_and_update() {
                            debug!(worker_index, "actor worker received shutdown signal");
                            break;
                        }
                    }
                })
            })
            .collect();

        Self { handles, shutdown_tx }
    }

    /// Signals all workers to stop after their current iteration and waits
    /// for them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

/// Runs `N` independent Decider workers, symmetric with [`ActorPool`].
pub struct DeciderPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl DeciderPool {
    pub fn spawn<S>(decider: Arc<DeciderLoop<S>>, concurrency: usize) -> Self
    where
        S: WorkflowServiceClient + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = (0..concurrency)
            .map(|worker_index| {
                let decider = Arc::clone(&decider);
                let mut shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    loop {
                        if *shutdown_rx.borrow() || decider.should_quiesce() {
                            info!(worker_index, "decider worker quiescing");
                            break;
                        }

                        match decider.run_once().await {
                            Ok(true) => {}
                            Ok(false) => tokio::time::sleep(IDLE_BACKOFF).await,
                            Err(err) => {
                                error!(worker_index, error = %err, "decider iteration failed");
                                tokio::time::sleep(IDLE_BACKOFF).await;
                            }
                        }

                        if shutdown_rx.has_changed().unwrap_or(false) && *shutdown_rx.borrow_and_update() {
                            debug!(worker_index, "decider worker received shutdown signal");
                            break;
                        }
                    }
                })
            })
            .collect();

        Self { handles, shutdown_tx }
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::plan::{EndPolicy, Plan, Spec, Task};
    use stepwise_core::service::testing::{InMemoryObjectStore, InMemoryWorkflowServiceClient};

    use crate::config::{ActorConfig, DeciderConfig};

    fn task(name: &str) -> Task {
        Task {
            name: name.to_string(),
            version: "1".to_string(),
            queue: "q".to_string(),
            timeout_seconds: 30,
        }
    }

    #[tokio::test]
    async fn actor_pool_processes_queued_work_then_quiesces() {
        let service = Arc::new(InMemoryWorkflowServiceClient::new());
        let store = Arc::new(InMemoryObjectStore::new());
        service.enqueue_activity("q", "uid-1", None);

        let dir = tempfile::tempdir().unwrap();
        let quiesce_path = dir.path().join("quiesce");
        std::fs::write(&quiesce_path, b"").unwrap();

        let config = ActorConfig::new("q", "true").with_nocopy(true).with_quiesce_path(&quiesce_path);
        let actor = Arc::new(ActorLoop::new(service.clone(), store, config));
        let pool = ActorPool::spawn(actor, 2);
        pool.shutdown().await;

        // Quiesce file was present from the start, so the pool may have
        // exited before polling; this test only asserts a clean shutdown.
    }

    #[tokio::test]
    async fn decider_pool_shuts_down_cleanly_with_no_work() {
        let service = Arc::new(InMemoryWorkflowServiceClient::new());
        let plan = Plan {
            start: task("start"),
            specs: vec![Spec::Work(task("a"))],
            end: EndPolicy::Stop,
        };
        let decider = Arc::new(DeciderLoop::new(service, plan, DeciderConfig::new("q")));
        let pool = DeciderPool::spawn(decider, 2);
        pool.shutdown().await;
    }
}
