//! The narrow set of operations the core requires from the Workflow Service
//! and the Object Store. Neither trait is implemented by production
//! transport code in this crate — the wire encoding and credentials are
//! external collaborators.

use async_trait::async_trait;

use crate::decision::{Decision, HistoryEvent};

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Errors a [`WorkflowServiceClient`] may report.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service is applying backpressure; callers should sleep ~5s and
    /// retry the same operation indefinitely.
    #[error("throttled: {0}")]
    Throttling(String),

    /// A token, workflow, or activity vanished — a benign race during
    /// decider/actor churn. Retried once after logging.
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// The resource already exists (registration calls); callers must
    /// swallow this silently.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Any other transport-level failure. Propagates; the current iteration
    /// ends and the loop driver retries on the next iteration.
    #[error("transport error: {0}")]
    Transport(String),
}

/// A long-poll result for an activity task. `None` means "no work".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityTask {
    pub token: String,
    pub uid: String,
    pub input: Option<String>,
}

/// A long-poll result for a decision task: a token plus the full event
/// history for the workflow execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionTask {
    pub token: String,
    pub events: Vec<HistoryEvent>,
}

/// The Workflow Service operations the core consumes.
#[async_trait]
pub trait WorkflowServiceClient: Send + Sync {
    /// Idempotent; `AlreadyExists` must be swallowed by the caller.
    async fn register_domain(&self) -> Result<(), ServiceError>;

    /// Idempotent; `AlreadyExists` must be swallowed by the caller.
    async fn register_workflow_type(&self, name: &str, version: &str) -> Result<(), ServiceError>;

    /// Idempotent; `AlreadyExists` must be swallowed by the caller.
    async fn register_activity_type(&self, name: &str, version: &str) -> Result<(), ServiceError>;

    async fn start_workflow(
        &self,
        uid: &str,
        name: &str,
        version: &str,
        queue: &str,
        input: Option<String>,
    ) -> Result<(), ServiceError>;

    /// Long-polling; `Ok(None)` means no work is available.
    async fn poll_activity(&self, queue: &str) -> Result<Option<ActivityTask>, ServiceError>;

    /// Long-polling; returns the full event history for the workflow.
    async fn poll_decision(&self, queue: &str) -> Result<Option<DecisionTask>, ServiceError>;

    async fn respond_activity_completed(
        &self,
        token: &str,
        result: Option<String>,
    ) -> Result<(), ServiceError>;

    async fn respond_activity_failed(&self, token: &str) -> Result<(), ServiceError>;

    async fn respond_activity_canceled(&self, token: &str) -> Result<(), ServiceError>;

    async fn respond_decision_completed(
        &self,
        token: &str,
        decisions: Vec<Decision>,
    ) -> Result<(), ServiceError>;
}

/// Errors an [`ObjectStoreClient`] may report.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ObjectStoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("object store transport error: {0}")]
    Transport(String),
}

/// The Object Store operations the core consumes: a flat key→bytes map,
/// namespaced by an activity uid prefix.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn list_keys(&self, uid_prefix: &str) -> Result<Vec<String>, ObjectStoreError>;
    async fn get(&self, uid_prefix: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError>;
    async fn put(&self, uid_prefix: &str, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError>;
}
