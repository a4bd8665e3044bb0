//! The Decider Loop: poll -> decide -> respond, symmetric with the Actor
//! Loop. Polls a decision queue, feeds the returned event history through
//! `stepwise_core::decision::decide`, and replies with the resulting
//! decision(s).

use std::sync::{Arc, Mutex};

use stepwise_core::decision::{decide, UuidV7Source};
use stepwise_core::plan::Plan;
use stepwise_core::reliability::absorb_retriable;
use stepwise_core::service::{ServiceError, WorkflowServiceClient};
use tracing::instrument;

use crate::config::DeciderConfig;

#[derive(Debug, thiserror::Error)]
pub enum DeciderLoopError {
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// One Decider: wraps a concrete Workflow Service client and a static Plan,
/// driving `decide` against each polled event history.
pub struct DeciderLoop<S> {
    service: Arc<S>,
    plan: Plan,
    config: DeciderConfig,
    uids: Mutex<UuidV7Source>,
}

impl<S> DeciderLoop<S>
where
    S: WorkflowServiceClient,
{
    pub fn new(service: Arc<S>, plan: Plan, config: DeciderConfig) -> Self {
        Self {
            service,
            plan,
            config,
            uids: Mutex::new(UuidV7Source),
        }
    }

    /// Whether the configured quiesce file exists; checked before every
    /// iteration, same as the Actor Loop.
    pub fn should_quiesce(&self) -> bool {
        match &self.config.quiesce_path {
            Some(path) => path.exists(),
            None => false,
        }
    }

    /// Runs one iteration. Returns `Ok(true)` if a decision task was
    /// processed, `Ok(false)` if the poll returned no work.
    #[instrument(skip(self), fields(queue = %self.config.queue))]
    pub async fn run_once(&self) -> Result<bool, DeciderLoopError> {
        let Some(task) = absorb_retriable(|| self.service.poll_decision(&self.config.queue)).await? else {
            return Ok(false);
        };

        let mut uids = self.uids.lock().expect("uid source mutex poisoned");
        match decide(&self.plan, &task.events, &mut *uids) {
            Ok(decisions) => {
                absorb_retriable(|| self.service.respond_decision_completed(&task.token, decisions.clone())).await?;
            }
            Err(err) => {
                // The iteration ends, the token goes unresponded, letting
                // the service time out and re-dispatch.
                tracing::error!(error = %err, "history interpretation failed, leaving token unresponded");
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use stepwise_core::decision::{Decision, EventAttributes, HistoryEvent};
    use stepwise_core::plan::{EndPolicy, Spec, Task};
    use stepwise_core::service::testing::InMemoryWorkflowServiceClient;
    use stepwise_core::service::{ActivityTask, DecisionTask};

    /// Wraps [`InMemoryWorkflowServiceClient`] and returns `UnknownResource`
    /// on the first `poll_decision` call, then delegates — used to prove
    /// `run_once` absorbs a single unknown-resource race via
    /// `absorb_retriable` rather than leaving the iteration unserviced.
    struct ThrottleFirstPoll {
        inner: InMemoryWorkflowServiceClient,
        polled_once: AtomicBool,
    }

    #[async_trait::async_trait]
    impl WorkflowServiceClient for ThrottleFirstPoll {
        async fn register_domain(&self) -> Result<(), ServiceError> {
            self.inner.register_domain().await
        }

        async fn register_workflow_type(&self, name: &str, version: &str) -> Result<(), ServiceError> {
            self.inner.register_workflow_type(name, version).await
        }

        async fn register_activity_type(&self, name: &str, version: &str) -> Result<(), ServiceError> {
            self.inner.register_activity_type(name, version).await
        }

        async fn start_workflow(
            &self,
            uid: &str,
            name: &str,
            version: &str,
            queue: &str,
            input: Option<String>,
        ) -> Result<(), ServiceError> {
            self.inner.start_workflow(uid, name, version, queue, input).await
        }

        async fn poll_activity(&self, queue: &str) -> Result<Option<ActivityTask>, ServiceError> {
            self.inner.poll_activity(queue).await
        }

        async fn poll_decision(&self, queue: &str) -> Result<Option<DecisionTask>, ServiceError> {
            if !self.polled_once.swap(true, Ordering::SeqCst) {
                return Err(ServiceError::UnknownResource("stale decision token".to_string()));
            }
            self.inner.poll_decision(queue).await
        }

        async fn respond_activity_completed(&self, token: &str, result: Option<String>) -> Result<(), ServiceError> {
            self.inner.respond_activity_completed(token, result).await
        }

        async fn respond_activity_failed(&self, token: &str) -> Result<(), ServiceError> {
            self.inner.respond_activity_failed(token).await
        }

        async fn respond_activity_canceled(&self, token: &str) -> Result<(), ServiceError> {
            self.inner.respond_activity_canceled(token).await
        }

        async fn respond_decision_completed(&self, token: &str, decisions: Vec<Decision>) -> Result<(), ServiceError> {
            self.inner.respond_decision_completed(token, decisions).await
        }
    }

    fn task(name: &str) -> Task {
        Task {
            name: name.to_string(),
            version: "1".to_string(),
            queue: "q".to_string(),
            timeout_seconds: 30,
        }
    }

    fn sample_plan() -> Plan {
        Plan {
            start: task("start"),
            specs: vec![Spec::Work(task("a"))],
            end: EndPolicy::Stop,
        }
    }

    #[tokio::test]
    async fn run_once_returns_false_when_no_work() {
        let service = Arc::new(InMemoryWorkflowServiceClient::new());
        let decider = DeciderLoop::new(service, sample_plan(), DeciderConfig::new("q"));
        assert!(!decider.run_once().await.unwrap());
    }

    #[tokio::test]
    async fn run_once_schedules_first_spec_on_workflow_started() {
        let service = Arc::new(InMemoryWorkflowServiceClient::new());
        service.enqueue_decision(
            "q",
            vec![HistoryEvent {
                event_id: 1,
                attributes: EventAttributes::WorkflowExecutionStarted {
                    input: Some("x".to_string()),
                },
            }],
        );

        let decider = DeciderLoop::new(service.clone(), sample_plan(), DeciderConfig::new("q"));
        assert!(decider.run_once().await.unwrap());

        let completed = service.completed_decisions();
        assert_eq!(completed.len(), 1);
        match &completed[0].1[0] {
            Decision::ScheduleActivity { name, .. } => assert_eq!(name, "a"),
            other => panic!("expected ScheduleActivity, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn decision_error_leaves_token_unresponded() {
        let service = Arc::new(InMemoryWorkflowServiceClient::new());
        service.enqueue_decision("q", vec![]);

        let decider = DeciderLoop::new(service.clone(), sample_plan(), DeciderConfig::new("q"));
        assert!(decider.run_once().await.unwrap());
        assert!(service.completed_decisions().is_empty());
    }

    #[tokio::test]
    async fn run_once_absorbs_unknown_resource_on_poll_and_still_decides() {
        let inner = InMemoryWorkflowServiceClient::new();
        inner.enqueue_decision(
            "q",
            vec![HistoryEvent {
                event_id: 1,
                attributes: EventAttributes::WorkflowExecutionStarted {
                    input: Some("x".to_string()),
                },
            }],
        );
        let service = Arc::new(ThrottleFirstPoll {
            inner,
            polled_once: AtomicBool::new(false),
        });

        let decider = DeciderLoop::new(service.clone(), sample_plan(), DeciderConfig::new("q"));
        assert!(decider.run_once().await.unwrap());
        assert_eq!(service.inner.completed_decisions().len(), 1);
    }

    #[test]
    fn should_quiesce_reflects_file_presence() {
        let service = Arc::new(InMemoryWorkflowServiceClient::new());
        let dir = tempfile::tempdir().unwrap();
        let quiesce_path = dir.path().join("quiesce");
        let config = DeciderConfig::new("q").with_quiesce_path(&quiesce_path);
        let decider = DeciderLoop::new(service, sample_plan(), config);

        assert!(!decider.should_quiesce());
        std::fs::write(&quiesce_path, b"").unwrap();
        assert!(decider.should_quiesce());
    }
}
