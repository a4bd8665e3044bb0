//! # stepwise-core
//!
//! The core of a workflow orchestration client built atop a hosted Workflow
//! Service (modelled on Amazon SWF) with an Object Store sidecar (modelled
//! on S3).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      decision::decide                        │
//! │  (pure function: Plan + event history -> next decisions)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              WorkflowServiceClient / ObjectStoreClient       │
//! │         (spec-defined traits, no production impl here)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │         Workspace + ArtifactStager + ProcessRunner            │
//! │   (per-activity scratch tree, stage in/out, run the command) │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! This crate implements the Plan Model, Workspace Manager, Artifact
//! Stager, Process Runner, Decision Engine, and the Service Client
//! Contract. The Actor Loop and Decider Loop that drive these primitives
//! against a concrete `WorkflowServiceClient` live in `stepwise-worker`.

pub mod artifact;
pub mod decision;
pub mod plan;
pub mod process;
pub mod reliability;
pub mod service;
pub mod workspace;

/// Common imports for crates that drive the Actor Loop or Decider Loop.
pub mod prelude {
    pub use crate::artifact::{Artifact, ArtifactStager, Blob, StageError};
    pub use crate::decision::{decide, Decision, DecisionError, HistoryEvent, UidSource, UuidV7Source};
    pub use crate::plan::{EndPolicy, Plan, PlanError, Spec, Task, Timer};
    pub use crate::process::{Disposition, ProcessRunner, CANCEL_EXIT_CODE};
    pub use crate::reliability::{absorb_retriable, register_idempotent};
    pub use crate::service::{ActivityTask, DecisionTask, ObjectStoreClient, ObjectStoreError, ServiceError, WorkflowServiceClient};
    pub use crate::workspace::{Workspace, WorkspaceError, WorkspaceOptions};
}
