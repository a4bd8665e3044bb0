//! The Decision Engine: given a [`Plan`] and an event history, selects the
//! next decision(s). Stateless between ticks — the event history is the
//! sole source of truth, replayed fresh on every call to [`decide`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::plan::{next_spec, EndPolicy, Plan, Spec, Variant};

/// One entry in the event log returned by the Workflow Service. Append-only
/// and totally ordered by `event_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_id: u64,
    #[serde(flatten)]
    pub attributes: EventAttributes,
}

/// The type-specific attributes carried by a [`HistoryEvent`]. Parent
/// references (`scheduled_event_id`, `started_event_id`) are event-ids to be
/// resolved through [`DecisionContext::lookup`], never by a name search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventAttributes {
    WorkflowExecutionStarted {
        input: Option<String>,
    },
    ActivityTaskScheduled {
        name: String,
        version: String,
        queue: String,
        input: Option<String>,
    },
    ActivityTaskStarted,
    ActivityTaskCompleted {
        scheduled_event_id: u64,
        result: Option<String>,
    },
    ActivityTaskFailed {
        scheduled_event_id: u64,
    },
    ActivityTaskCanceled {
        scheduled_event_id: u64,
    },
    TimerStarted {
        control: String,
    },
    TimerFired {
        started_event_id: u64,
    },
    StartChildWorkflowExecutionInitiated {
        input: Option<String>,
    },
}

impl EventAttributes {
    /// Whether this event type participates in "most recent actionable"
    /// dispatch.
    fn is_actionable(&self) -> bool {
        matches!(
            self,
            EventAttributes::WorkflowExecutionStarted { .. }
                | EventAttributes::ActivityTaskCompleted { .. }
                | EventAttributes::ActivityTaskFailed { .. }
                | EventAttributes::ActivityTaskCanceled { .. }
                | EventAttributes::TimerFired { .. }
                | EventAttributes::StartChildWorkflowExecutionInitiated { .. }
        )
    }

    /// Short name used in error messages, matching the host service's own
    /// event-type vocabulary.
    fn type_name(&self) -> &'static str {
        match self {
            EventAttributes::WorkflowExecutionStarted { .. } => "WorkflowExecutionStarted",
            EventAttributes::ActivityTaskScheduled { .. } => "ActivityTaskScheduled",
            EventAttributes::ActivityTaskStarted => "ActivityTaskStarted",
            EventAttributes::ActivityTaskCompleted { .. } => "ActivityTaskCompleted",
            EventAttributes::ActivityTaskFailed { .. } => "ActivityTaskFailed",
            EventAttributes::ActivityTaskCanceled { .. } => "ActivityTaskCanceled",
            EventAttributes::TimerStarted { .. } => "TimerStarted",
            EventAttributes::TimerFired { .. } => "TimerFired",
            EventAttributes::StartChildWorkflowExecutionInitiated { .. } => {
                "StartChildWorkflowExecutionInitiated"
            }
        }
    }
}

/// A tick's output: one or more instructions for the Workflow Service to
/// carry out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    ScheduleActivity {
        uid: String,
        name: String,
        version: String,
        queue: String,
        input: Option<String>,
    },
    /// `name` doubles as the timer's control payload, recovered on
    /// `TimerFired` via `startedEventId`.
    StartTimer {
        uid: String,
        name: String,
        timeout_seconds: u64,
    },
    CompleteWorkflow {
        input: Option<String>,
    },
    FailWorkflow,
    CancelWorkflow,
    StartChildWorkflow {
        uid: String,
        name: String,
        version: String,
        queue: String,
        input: Option<String>,
    },
}

/// Errors produced while interpreting an event history. All are fatal for
/// the current tick, never recovered locally.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DecisionError {
    #[error("event history is empty")]
    EmptyHistory,

    #[error("duplicate event id: {0}")]
    DuplicateEventId(u64),

    #[error("no actionable event found in history")]
    NoActionableEvent,

    #[error("event {referrer} references missing event {target}")]
    DanglingReference { referrer: u64, target: u64 },

    #[error("no {expected} information for event {event_id} (found {found})")]
    WrongAttributeType {
        expected: &'static str,
        found: &'static str,
        event_id: u64,
    },

    #[error("no WorkflowExecutionStarted event found in history")]
    MissingWorkflowStarted,

    #[error("no prior WorkflowExecutionStarted or ActivityTaskCompleted event before event {0}")]
    MissingPriorPayload(u64),

    #[error("unknown actionable event type encountered during dispatch")]
    UnknownActionableEvent,
}

/// Scopes one decision tick: the Plan, the event slice, and an event-id
/// index built once per call (event ids must be unique, checked eagerly in
/// [`DecisionContext::new`]).
pub struct DecisionContext<'a> {
    events: &'a [HistoryEvent],
    index: HashMap<u64, usize>,
}

impl<'a> DecisionContext<'a> {
    pub fn new(events: &'a [HistoryEvent]) -> Result<Self, DecisionError> {
        let mut index = HashMap::with_capacity(events.len());
        for (position, event) in events.iter().enumerate() {
            if index.insert(event.event_id, position).is_some() {
                return Err(DecisionError::DuplicateEventId(event.event_id));
            }
        }
        Ok(Self { events, index })
    }

    /// Resolve a parent-id reference; never a name-based search.
    fn lookup(&self, referrer: u64, target: u64) -> Result<&'a HistoryEvent, DecisionError> {
        self.index
            .get(&target)
            .map(|&position| &self.events[position])
            .ok_or(DecisionError::DanglingReference { referrer, target })
    }

    /// The most recent (highest event-id) actionable event. Ordered by
    /// event id, never by position in the slice — a history need not
    /// arrive in event-id order.
    fn most_recent_actionable(&self) -> Result<&'a HistoryEvent, DecisionError> {
        let mut candidates: Vec<&HistoryEvent> = self
            .events
            .iter()
            .filter(|event| event.attributes.is_actionable())
            .collect();
        candidates.sort_by(|a, b| b.event_id.cmp(&a.event_id));
        candidates.into_iter().next().ok_or(DecisionError::NoActionableEvent)
    }

    /// The nearest event strictly before `before_event_id`, scanning by
    /// descending event-id, whose attributes are `WorkflowExecutionStarted`
    /// or `ActivityTaskCompleted` — used by the `TimerFired` dispatch to
    /// recover the payload that should feed the next scheduled Spec.
    fn prior_payload(&self, before_event_id: u64) -> Result<Option<String>, DecisionError> {
        let mut candidates: Vec<&HistoryEvent> = self
            .events
            .iter()
            .filter(|event| event.event_id < before_event_id)
            .collect();
        candidates.sort_by(|a, b| b.event_id.cmp(&a.event_id));

        for event in candidates {
            match &event.attributes {
                EventAttributes::WorkflowExecutionStarted { input } => return Ok(input.clone()),
                EventAttributes::ActivityTaskCompleted { result, .. } => return Ok(result.clone()),
                _ => continue,
            }
        }
        Err(DecisionError::MissingPriorPayload(before_event_id))
    }

    /// The originating workflow's input, recovered for end-of-plan
    /// continue-as-new and for completing after a child workflow has been
    /// initiated.
    fn workflow_started_input(&self) -> Result<Option<String>, DecisionError> {
        self.events
            .iter()
            .find_map(|event| match &event.attributes {
                EventAttributes::WorkflowExecutionStarted { input } => Some(input.clone()),
                _ => None,
            })
            .ok_or(DecisionError::MissingWorkflowStarted)
    }
}

/// The injected effect boundary for Uid generation: `decide` is pure in
/// `(Plan, events)` except for this.
pub trait UidSource {
    fn next_uid(&mut self) -> String;
}

/// Production [`UidSource`]: time-ordered, collision-free within a process.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7Source;

impl UidSource for UuidV7Source {
    fn next_uid(&mut self) -> String {
        uuid::Uuid::now_v7().to_string()
    }
}

fn schedule_spec(spec: &Spec, input: Option<String>, uids: &mut dyn UidSource) -> Decision {
    match spec {
        Spec::Work(task) => Decision::ScheduleActivity {
            uid: uids.next_uid(),
            name: task.name.clone(),
            version: task.version.clone(),
            queue: task.queue.clone(),
            input,
        },
        Spec::Sleep(timer) => Decision::StartTimer {
            uid: uids.next_uid(),
            name: timer.name.clone(),
            timeout_seconds: timer.timeout_seconds,
        },
    }
}

fn end_of_plan(
    ctx: &DecisionContext,
    plan: &Plan,
    latest_input: Option<String>,
    uids: &mut dyn UidSource,
) -> Result<Decision, DecisionError> {
    match plan.end {
        EndPolicy::Stop => Ok(Decision::CompleteWorkflow { input: latest_input }),
        EndPolicy::Continue => {
            let original = ctx.workflow_started_input()?;
            Ok(Decision::StartChildWorkflow {
                uid: uids.next_uid(),
                name: plan.start.name.clone(),
                version: plan.start.version.clone(),
                queue: plan.start.queue.clone(),
                input: original,
            })
        }
    }
}

/// Interpret one event history against a Plan and return the next
/// decision(s). Pure in `(plan, events)`; all non-determinism is routed
/// through `uids`.
#[instrument(skip(plan, events, uids), fields(events = events.len()))]
pub fn decide(
    plan: &Plan,
    events: &[HistoryEvent],
    uids: &mut dyn UidSource,
) -> Result<Vec<Decision>, DecisionError> {
    if events.is_empty() {
        return Err(DecisionError::EmptyHistory);
    }
    let ctx = DecisionContext::new(events)?;
    let latest = ctx.most_recent_actionable()?;

    let decision = match &latest.attributes {
        EventAttributes::WorkflowExecutionStarted { input } => match plan.specs.first() {
            Some(spec) => schedule_spec(spec, input.clone(), uids),
            None => end_of_plan(&ctx, plan, input.clone(), uids)?,
        },

        EventAttributes::ActivityTaskCompleted {
            scheduled_event_id,
            result,
        } => {
            let scheduled = ctx.lookup(latest.event_id, *scheduled_event_id)?;
            let name = match &scheduled.attributes {
                EventAttributes::ActivityTaskScheduled { name, .. } => name.clone(),
                other => {
                    return Err(DecisionError::WrongAttributeType {
                        expected: "ActivityTaskScheduled",
                        found: other.type_name(),
                        event_id: scheduled.event_id,
                    })
                }
            };
            match next_spec(plan, Variant::Work, &name) {
                Some(spec) => schedule_spec(spec, result.clone(), uids),
                None => end_of_plan(&ctx, plan, result.clone(), uids)?,
            }
        }

        EventAttributes::ActivityTaskFailed { .. } => {
            warn!(event_id = latest.event_id, "activity failed, failing workflow");
            Decision::FailWorkflow
        }

        EventAttributes::ActivityTaskCanceled { .. } => Decision::CancelWorkflow,

        EventAttributes::TimerFired { started_event_id } => {
            let started = ctx.lookup(latest.event_id, *started_event_id)?;
            let control = match &started.attributes {
                EventAttributes::TimerStarted { control } => control.clone(),
                other => {
                    return Err(DecisionError::WrongAttributeType {
                        expected: "TimerStarted",
                        found: other.type_name(),
                        event_id: started.event_id,
                    })
                }
            };
            let payload = ctx.prior_payload(latest.event_id)?;
            match next_spec(plan, Variant::Sleep, &control) {
                Some(spec) => schedule_spec(spec, payload, uids),
                None => end_of_plan(&ctx, plan, payload, uids)?,
            }
        }

        EventAttributes::StartChildWorkflowExecutionInitiated { .. } => {
            let original = ctx.workflow_started_input()?;
            Decision::CompleteWorkflow { input: original }
        }

        EventAttributes::ActivityTaskScheduled { .. } | EventAttributes::ActivityTaskStarted => {
            return Err(DecisionError::UnknownActionableEvent)
        }
    };

    Ok(vec![decision])
}
