//! The static declaration of a workflow: an ordered list of steps plus a
//! terminal policy.
//!
//! A [`Plan`] is produced by an external configuration loader (out of scope
//! for this crate) and handed to the Decision Engine unchanged for the
//! lifetime of the Decider process.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A unit of work executed by an Actor: a named, versioned activity on a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub version: String,
    pub queue: String,
    pub timeout_seconds: u64,
}

/// A named timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub name: String,
    pub timeout_seconds: u64,
}

/// One step in a [`Plan`]: either a unit of work or a sleep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Spec {
    Work(Task),
    Sleep(Timer),
}

impl Spec {
    /// The name of the underlying `Task` or `Timer`.
    pub fn name(&self) -> &str {
        match self {
            Spec::Work(t) => &t.name,
            Spec::Sleep(t) => &t.name,
        }
    }

    /// Whether this spec is a `Work` step.
    pub fn is_work(&self) -> bool {
        matches!(self, Spec::Work(_))
    }

    /// Whether this spec is a `Sleep` step.
    pub fn is_sleep(&self) -> bool {
        matches!(self, Spec::Sleep(_))
    }
}

/// What happens after the last `Spec` in a [`Plan`] completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndPolicy {
    /// Complete the workflow execution.
    Stop,
    /// Start a child workflow carrying the original input, then complete.
    Continue,
}

/// The static specification of a workflow's steps and terminal behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub start: Task,
    pub specs: Vec<Spec>,
    pub end: EndPolicy,
}

/// Errors surfaced when a [`Plan`] fails validation.
///
/// These are configuration errors: fatal at startup only, never raised
/// mid-execution by the Decision Engine.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("duplicate work spec name: {0}")]
    DuplicateWorkName(String),
    #[error("duplicate sleep spec name: {0}")]
    DuplicateSleepName(String),
}

impl Plan {
    /// Checks the uniqueness invariant the Next-Spec rule depends on: no two
    /// `Work` specs share a task name, and no two `Sleep` specs share a
    /// timer name (the same name may appear once per variant).
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut work_names = HashSet::new();
        let mut sleep_names = HashSet::new();

        for spec in &self.specs {
            match spec {
                Spec::Work(task) => {
                    if !work_names.insert(task.name.clone()) {
                        return Err(PlanError::DuplicateWorkName(task.name.clone()));
                    }
                }
                Spec::Sleep(timer) => {
                    if !sleep_names.insert(timer.name.clone()) {
                        return Err(PlanError::DuplicateSleepName(timer.name.clone()));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Which [`Spec`] variant a Next-Spec lookup should match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Work,
    Sleep,
}

impl Variant {
    fn matches(self, spec: &Spec) -> bool {
        match self {
            Variant::Work => spec.is_work(),
            Variant::Sleep => spec.is_sleep(),
        }
    }
}

/// The Next-Spec rule:
///
/// Walk `plan.specs` left-to-right, drop every element until the first whose
/// variant is `variant` and whose task/timer name equals `name`, then return
/// the immediately-following element, if any. Produces the unique successor
/// — or `None` if no spec matches, or the match is the last element.
pub fn next_spec<'a>(plan: &'a Plan, variant: Variant, name: &str) -> Option<&'a Spec> {
    let mut iter = plan
        .specs
        .iter()
        .skip_while(|spec| !(variant.matches(spec) && spec.name() == name));

    // The first item yielded is the match itself (if any); advance past it.
    iter.next()?;
    iter.next()
}
