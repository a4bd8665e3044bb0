//! In-memory doubles for [`WorkflowServiceClient`] and [`ObjectStoreClient`]:
//! enough shared state behind a mutex to exercise the Actor Loop, Decider
//! Loop, and Artifact Stager end-to-end without a real Workflow Service or
//! Object Store.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ActivityTask, DecisionTask, ObjectStoreClient, ObjectStoreError, ServiceError, WorkflowServiceClient};
use crate::decision::{Decision, HistoryEvent};

/// A flat key→bytes store namespaced by uid prefix, guarded by a single
/// mutex — sufficient for tests, not a production object store.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStoreClient for InMemoryObjectStore {
    async fn list_keys(&self, uid_prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let objects = self.objects.lock().expect("object store mutex poisoned");
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|(uid, _)| uid == uid_prefix)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn get(&self, uid_prefix: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let objects = self.objects.lock().expect("object store mutex poisoned");
        objects
            .get(&(uid_prefix.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn put(&self, uid_prefix: &str, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.lock().expect("object store mutex poisoned");
        objects.insert((uid_prefix.to_string(), key.to_string()), bytes);
        Ok(())
    }
}

/// One queued unit of work for [`InMemoryWorkflowServiceClient`].
#[derive(Debug, Clone)]
enum QueuedTask {
    Activity { uid: String, input: Option<String> },
    Decision { events: Vec<HistoryEvent> },
}

#[derive(Debug, Default)]
struct State {
    registered_domain: bool,
    workflow_types: std::collections::HashSet<(String, String)>,
    activity_types: std::collections::HashSet<(String, String)>,
    activity_queues: HashMap<String, VecDeque<QueuedTask>>,
    decision_queues: HashMap<String, VecDeque<QueuedTask>>,
    next_token: u64,
    completed_activities: Vec<(String, Option<String>)>,
    failed_activities: Vec<String>,
    canceled_activities: Vec<String>,
    completed_decisions: Vec<(String, Vec<Decision>)>,
}

/// An in-process [`WorkflowServiceClient`] that queues activity and decision
/// tasks in memory. Tests enqueue work via [`Self::enqueue_activity`] /
/// [`Self::enqueue_decision`] and assert against the responses it records.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowServiceClient {
    state: Mutex<State>,
}

impl InMemoryWorkflowServiceClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_activity(&self, queue: &str, uid: &str, input: Option<String>) {
        let mut state = self.state.lock().expect("service mutex poisoned");
        state
            .activity_queues
            .entry(queue.to_string())
            .or_default()
            .push_back(QueuedTask::Activity {
                uid: uid.to_string(),
                input,
            });
    }

    pub fn enqueue_decision(&self, queue: &str, events: Vec<HistoryEvent>) {
        let mut state = self.state.lock().expect("service mutex poisoned");
        state
            .decision_queues
            .entry(queue.to_string())
            .or_default()
            .push_back(QueuedTask::Decision { events });
    }

    pub fn completed_activities(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().expect("service mutex poisoned").completed_activities.clone()
    }

    pub fn failed_activities(&self) -> Vec<String> {
        self.state.lock().expect("service mutex poisoned").failed_activities.clone()
    }

    pub fn canceled_activities(&self) -> Vec<String> {
        self.state.lock().expect("service mutex poisoned").canceled_activities.clone()
    }

    pub fn completed_decisions(&self) -> Vec<(String, Vec<Decision>)> {
        self.state.lock().expect("service mutex poisoned").completed_decisions.clone()
    }

    fn fresh_token(state: &mut State) -> String {
        state.next_token += 1;
        format!("token-{}", state.next_token)
    }
}

#[async_trait]
impl WorkflowServiceClient for InMemoryWorkflowServiceClient {
    async fn register_domain(&self) -> Result<(), ServiceError> {
        let mut state = self.state.lock().expect("service mutex poisoned");
        if state.registered_domain {
            return Err(ServiceError::AlreadyExists("domain".to_string()));
        }
        state.registered_domain = true;
        Ok(())
    }

    async fn register_workflow_type(&self, name: &str, version: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().expect("service mutex poisoned");
        let key = (name.to_string(), version.to_string());
        if !state.workflow_types.insert(key) {
            return Err(ServiceError::AlreadyExists(format!("{name}:{version}")));
        }
        Ok(())
    }

    async fn register_activity_type(&self, name: &str, version: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().expect("service mutex poisoned");
        let key = (name.to_string(), version.to_string());
        if !state.activity_types.insert(key) {
            return Err(ServiceError::AlreadyExists(format!("{name}:{version}")));
        }
        Ok(())
    }

    async fn start_workflow(
        &self,
        uid: &str,
        _name: &str,
        _version: &str,
        queue: &str,
        input: Option<String>,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock().expect("service mutex poisoned");
        let started = HistoryEvent {
            event_id: 1,
            attributes: crate::decision::EventAttributes::WorkflowExecutionStarted { input },
        };
        state
            .decision_queues
            .entry(queue.to_string())
            .or_default()
            .push_back(QueuedTask::Decision { events: vec![started] });
        let _ = uid;
        Ok(())
    }

    async fn poll_activity(&self, queue: &str) -> Result<Option<ActivityTask>, ServiceError> {
        let mut state = self.state.lock().expect("service mutex poisoned");
        let task = state
            .activity_queues
            .get_mut(queue)
            .and_then(VecDeque::pop_front);
        match task {
            Some(QueuedTask::Activity { uid, input }) => {
                let token = Self::fresh_token(&mut state);
                Ok(Some(ActivityTask { token, uid, input }))
            }
            Some(QueuedTask::Decision { .. }) | None => Ok(None),
        }
    }

    async fn poll_decision(&self, queue: &str) -> Result<Option<DecisionTask>, ServiceError> {
        let mut state = self.state.lock().expect("service mutex poisoned");
        let task = state
            .decision_queues
            .get_mut(queue)
            .and_then(VecDeque::pop_front);
        match task {
            Some(QueuedTask::Decision { events }) => {
                let token = Self::fresh_token(&mut state);
                Ok(Some(DecisionTask { token, events }))
            }
            Some(QueuedTask::Activity { .. }) | None => Ok(None),
        }
    }

    async fn respond_activity_completed(&self, token: &str, result: Option<String>) -> Result<(), ServiceError> {
        let mut state = self.state.lock().expect("service mutex poisoned");
        state.completed_activities.push((token.to_string(), result));
        Ok(())
    }

    async fn respond_activity_failed(&self, token: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().expect("service mutex poisoned");
        state.failed_activities.push(token.to_string());
        Ok(())
    }

    async fn respond_activity_canceled(&self, token: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().expect("service mutex poisoned");
        state.canceled_activities.push(token.to_string());
        Ok(())
    }

    async fn respond_decision_completed(&self, token: &str, decisions: Vec<Decision>) -> Result<(), ServiceError> {
        let mut state = self.state.lock().expect("service mutex poisoned");
        state.completed_decisions.push((token.to_string(), decisions));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn object_store_put_get_list_round_trip() {
        let store = InMemoryObjectStore::new();
        store.put("uid-1", "a.txt", b"hello".to_vec()).await.unwrap();
        store.put("uid-1", "b.txt", b"world".to_vec()).await.unwrap();
        store.put("uid-2", "c.txt", b"other".to_vec()).await.unwrap();

        let keys = store.list_keys("uid-1").await.unwrap();
        assert_eq!(keys, vec!["a.txt".to_string(), "b.txt".to_string()]);
        assert_eq!(store.get("uid-1", "a.txt").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn object_store_missing_key_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store.get("uid-1", "nope").await.unwrap_err();
        assert_eq!(err, ObjectStoreError::NotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn registration_is_idempotence_tolerant_but_reports_already_exists() {
        let service = InMemoryWorkflowServiceClient::new();
        service.register_domain().await.unwrap();
        let err = service.register_domain().await.unwrap_err();
        assert_eq!(err, ServiceError::AlreadyExists("domain".to_string()));
    }

    #[tokio::test]
    async fn poll_activity_returns_none_on_empty_queue() {
        let service = InMemoryWorkflowServiceClient::new();
        assert!(service.poll_activity("q").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn poll_activity_returns_queued_task_with_fresh_token() {
        let service = InMemoryWorkflowServiceClient::new();
        service.enqueue_activity("q", "uid-1", Some("input".to_string()));

        let task = service.poll_activity("q").await.unwrap().unwrap();
        assert_eq!(task.uid, "uid-1");
        assert_eq!(task.input.as_deref(), Some("input"));

        service.respond_activity_completed(&task.token, Some("done".to_string())).await.unwrap();
        assert_eq!(
            service.completed_activities(),
            vec![(task.token, Some("done".to_string()))]
        );
    }

    #[tokio::test]
    async fn poll_decision_returns_queued_events() {
        let service = InMemoryWorkflowServiceClient::new();
        let events = vec![HistoryEvent {
            event_id: 1,
            attributes: crate::decision::EventAttributes::WorkflowExecutionStarted {
                input: Some("x".to_string()),
            },
        }];
        service.enqueue_decision("q", events.clone());

        let task = service.poll_decision("q").await.unwrap().unwrap();
        assert_eq!(task.events, events);
    }
}
