//! The Actor Loop: poll -> stage-in -> run -> stage-out -> respond.

use std::path::Path;
use std::sync::Arc;

use stepwise_core::artifact::{ArtifactStager, StageError};
use stepwise_core::process::{Disposition, ProcessRunner};
use stepwise_core::reliability::absorb_retriable;
use stepwise_core::service::{ObjectStoreClient, ServiceError, WorkflowServiceClient};
use stepwise_core::workspace::{Workspace, WorkspaceError, WorkspaceOptions};
use tracing::{info, instrument, warn};

use crate::config::ActorConfig;

#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("artifact staging error: {0}")]
    Stage(#[from] StageError),

    #[error("io error writing {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The control document written to `data/control.json` on entry.
#[derive(Debug, serde::Serialize)]
struct ControlDocument<'a> {
    run_uid: &'a str,
}

/// One Actor: wraps a concrete Workflow Service + Object Store client and
/// drives the poll/stage/run/respond loop for a single activity queue.
pub struct ActorLoop<S, O> {
    service: Arc<S>,
    store: Arc<O>,
    config: ActorConfig,
    runner: ProcessRunner,
}

impl<S, O> ActorLoop<S, O>
where
    S: WorkflowServiceClient,
    O: ObjectStoreClient,
{
    pub fn new(service: Arc<S>, store: Arc<O>, config: ActorConfig) -> Self {
        Self {
            service,
            store,
            config,
            runner: ProcessRunner::new(),
        }
    }

    /// Whether the configured quiesce file exists; checked before every
    /// iteration.
    pub fn should_quiesce(&self) -> bool {
        match &self.config.quiesce_path {
            Some(path) => path.exists(),
            None => false,
        }
    }

    /// Runs one iteration. Returns `Ok(true)` if a task was processed,
    /// `Ok(false)` if the poll returned no work.
    #[instrument(skip(self), fields(queue = %self.config.queue))]
    pub async fn run_once(&self) -> Result<bool, ActorError> {
        let Some(task) = absorb_retriable(|| self.service.poll_activity(&self.config.queue)).await? else {
            return Ok(false);
        };

        info!(uid = %task.uid, "polled activity task");

        let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
        let options = WorkspaceOptions {
            nocopy: self.config.nocopy,
            local: self.config.local,
            local_root: None,
        };
        let workspace = Workspace::enter(&task.uid, &cwd, &options)?;

        self.write_control_document(&task.uid, &workspace)?;
        if let Some(input) = &task.input {
            self.write_metadata_file(&workspace.data_dir().join("input.json"), input)?;
        }

        let stager = ArtifactStager::new(self.store.as_ref(), self.config.gzip);
        stager.stage_in(&task.uid, &workspace.input_dir()).await?;

        let disposition = self.runner.run(&self.config.command, workspace.root());

        // Stage-out is always attempted, even on command failure, so partial
        // outputs are observable.
        if let Err(err) = stager.stage_out(&task.uid, &workspace.output_dir()).await {
            warn!(uid = %task.uid, error = %err, "stage-out failed");
        }

        let output = self.read_output_metadata(&workspace)?;

        self.respond(&task.token, disposition, output).await?;

        Ok(true)
    }

    fn write_control_document(&self, uid: &str, workspace: &Workspace) -> Result<(), ActorError> {
        let path = workspace.data_dir().join("control.json");
        let doc = ControlDocument { run_uid: uid };
        let json = serde_json::to_string(&doc).expect("ControlDocument always serializes");
        std::fs::write(&path, json).map_err(|source| ActorError::Io { path, source })
    }

    fn write_metadata_file(&self, path: &Path, content: &str) -> Result<(), ActorError> {
        std::fs::write(path, content).map_err(|source| ActorError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_output_metadata(&self, workspace: &Workspace) -> Result<Option<String>, ActorError> {
        let path = workspace.data_dir().join("output.json");
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ActorError::Io { path, source }),
        }
    }

    async fn respond(&self, token: &str, disposition: Disposition, output: Option<String>) -> Result<(), ActorError> {
        match disposition {
            Disposition::Success => {
                absorb_retriable(|| self.service.respond_activity_completed(token, output.clone())).await?;
            }
            Disposition::Canceled => {
                absorb_retriable(|| self.service.respond_activity_canceled(token)).await?;
            }
            Disposition::Failed(code) => {
                warn!(code, "command exited non-zero, failing activity");
                absorb_retriable(|| self.service.respond_activity_failed(token)).await?;
            }
            Disposition::SpawnFailed(message) => {
                warn!(message, "command failed to spawn, failing activity");
                absorb_retriable(|| self.service.respond_activity_failed(token)).await?;
            }
        }
        Ok(())
    }
}
