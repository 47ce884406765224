//! Convenience re-export of the public API surface.

pub use crate::{
    actions::{ActionContext, ActionEffector, ActionKind, ReferenceEffector},
    builder::DocumentBuilder,
    config::InterpreterConfig,
    configuration::Configuration,
    datamodel::{EvalContext, Expr, ExpressionEvaluator, ReferenceDatamodel, Value},
    document::{
        Action, Document, EventDescriptor, HistoryType, State, StateKind, Transition,
        TransitionKind, ROOT,
    },
    error::{InterpreterError, ValidationError, ValidationErrors},
    event::{Event, EventData, EventOrigin, EventQueues},
    history::HistoryTracker,
    ids::{ConditionId, ExprId, LocationId, StateId, TransitionId},
    interpreter::Interpreter,
};
