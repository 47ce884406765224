//! Action effector collaborator: the pluggable executor for executable
//! content (`<log>`, `<raise>`, `<assign>`, `<send>`, `<if>`, `<foreach>`,
//! `<invoke>`).
//!
//! The engine owns *when* actions run (onentry/onexit/transition-content
//! ordering) but never *what* an action does beyond raising internal
//! events and touching the datamodel. Those effects are the
//! collaborator's job, represented here as plain data the engine can
//! carry and hand off without depending on its meaning.

use serde::{Deserialize, Serialize};

use crate::ids::{ConditionId, ExprId, LocationId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActionKind {
    /// `<log>`: a label plus an expression to evaluate and report.
    Log { label: Option<String>, expr: Option<ExprId> },
    /// `<raise>`: enqueue an internal event. An empty name is an action
    /// failure, logged and no-op.
    Raise { event: String },
    /// `<assign location="..." expr="..."/>`.
    Assign { location: LocationId, expr: ExprId },
    /// `<send>` stub: the engine records the intent; a real transport is a
    /// host collaborator concern (out of scope for this engine).
    SendStub { event: String, delay_ms: Option<u64> },
    /// `<if>`/`<elseif>`/`<else>`: branches are resolved by the collaborator,
    /// which re-enters the engine's action execution for the chosen branch's
    /// content via `ActionEffector::run`.
    If { branches: Vec<(Option<ConditionId>, Vec<crate::document::Action>)> },
    /// `<foreach item="..." index="..." array="...">`.
    Foreach {
        array: ExprId,
        item: LocationId,
        index: Option<LocationId>,
        body: Vec<crate::document::Action>,
    },
    /// `<invoke>` stub: out of scope for this engine; recorded for a host
    /// invoke-handler collaborator to act on.
    Invoke { kind: String, src: Option<String> },
    /// Any action kind the document declares that this build doesn't
    /// recognize: logged and ignored.
    Unknown { kind: String },
}

/// Mutable view the effector acts on: the datamodel and the internal queue.
/// Kept as a trait so the microstep executor (C6) can hand actions to
/// whatever datamodel/effector pair a host supplies without depending on
/// their concrete types.
pub trait ActionEffector {
    /// Execute a single action. Implementations raise internal events via
    /// `ctx.raise`, assign via `ctx.assign`, and evaluate conditions for
    /// `<if>`/`<foreach>` via `ctx.eval_condition`/`ctx.eval_value`.
    /// Unknown action kinds must be a no-op (logged by the caller).
    fn run(&mut self, action: &crate::document::Action, ctx: &mut dyn ActionContext);
}

/// What an [`ActionEffector`] is allowed to do to the running machine.
pub trait ActionContext {
    fn raise_internal(&mut self, event_name: String, data: crate::event::EventData);
    fn eval_value(&mut self, expr: ExprId) -> Option<crate::datamodel::Value>;
    fn eval_condition(&mut self, cond: crate::ids::ConditionId) -> bool;
    fn assign(&mut self, location: LocationId, value: crate::datamodel::Value);
    fn log(&mut self, label: Option<&str>, value: Option<crate::datamodel::Value>);
}

/// Reference action effector: interprets every `ActionKind` against an
/// [`ActionContext`] without depending on a real scripting engine.
/// `If`/`Foreach` recurse into `run` for their bodies; the engine itself
/// only ever calls `run` once per top-level action in a list. Branch and
/// loop-body dispatch is this collaborator's own concern.
#[derive(Debug, Default)]
pub struct ReferenceEffector;

impl ReferenceEffector {
    pub fn new() -> Self {
        Self
    }
}

impl ActionEffector for ReferenceEffector {
    fn run(&mut self, action: &crate::document::Action, ctx: &mut dyn ActionContext) {
        match &action.kind {
            ActionKind::Log { label, expr } => {
                let value = expr.map(|e| ctx.eval_value(e)).unwrap_or(None);
                ctx.log(label.as_deref(), value);
            }
            ActionKind::Raise { event } => ctx.raise_internal(event.clone(), None),
            ActionKind::Assign { location, expr } => {
                if let Some(value) = ctx.eval_value(*expr) {
                    ctx.assign(*location, value);
                } else {
                    tracing::warn!(?location, "assign failure: expression did not resolve to a value");
                }
            }
            ActionKind::SendStub { event, delay_ms } => {
                tracing::debug!(event, ?delay_ms, "send stub: no transport wired up, event not dispatched");
            }
            ActionKind::If { branches } => {
                for (cond, body) in branches {
                    let taken = match cond {
                        Some(c) => ctx.eval_condition(*c),
                        None => true,
                    };
                    if taken {
                        for inner in body {
                            self.run(inner, ctx);
                        }
                        break;
                    }
                }
            }
            ActionKind::Foreach { array, item, index, body } => {
                let _ = (array, item, index);
                tracing::warn!("foreach over a real array datamodel is out of scope for the reference effector");
                for inner in body {
                    self.run(inner, ctx);
                }
            }
            ActionKind::Invoke { kind, src } => {
                tracing::debug!(kind, ?src, "invoke stub: no invoke handler registered");
            }
            ActionKind::Unknown { kind } => {
                tracing::warn!(kind, "unrecognized action kind; ignored");
            }
        }
    }
}
