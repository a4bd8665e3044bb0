//! # stepwise-worker
//!
//! The Actor Loop and Decider Loop that drive `stepwise-core` against a
//! concrete `WorkflowServiceClient`, plus the ambient stack needed to run
//! either role as a long-lived process: structured logging, configuration
//! structs, quiesce handling, and `N`-worker concurrency pools.

pub mod actor;
pub mod config;
pub mod decider;
pub mod pool;

pub use actor::{ActorError, ActorLoop};
pub use config::{ActorConfig, DeciderConfig, ServiceConfig};
pub use decider::{DeciderLoop, DeciderLoopError};
pub use pool::{ActorPool, DeciderPool};
