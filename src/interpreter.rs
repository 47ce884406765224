//! Macrostep driver: owns one running machine's mutable state and drives
//! the microstep executor through a macrostep: fire transitions for the
//! current event, close the eventless loop after each microstep, then
//! drain the internal queue one event at a time until both queues have
//! nothing left to enable.
//!
//! A plain synchronous driver method: no internal concurrency, no host
//! framework coupling.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::instrument;

use crate::actions::ActionEffector;
use crate::config::InterpreterConfig;
use crate::configuration::Configuration;
use crate::datamodel::{ExpressionEvaluator, Value};
use crate::document::{Document, StateKind, ROOT};
use crate::error::InterpreterError;
use crate::event::{Event, EventQueues};
use crate::history::HistoryTracker;
use crate::ids::{StateId, TransitionId};
use crate::microstep::{enter_initial, run_microstep, MicrostepInputs};
use crate::selector::select_transitions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Uninitialized,
    Stable,
    Terminated,
}

/// One running SCXML machine. Owns everything mutable; the document is
/// shared read-only ("document is immutable... may be shared
/// read-only across machines").
pub struct Interpreter {
    doc: Arc<Document>,
    config: InterpreterConfig,
    configuration: Configuration,
    history: HistoryTracker,
    queues: EventQueues,
    variables: HashMap<String, Value>,
    datamodel: Box<dyn ExpressionEvaluator>,
    effector: Box<dyn ActionEffector>,
    current_event: Option<Event>,
    status: Status,
}

impl Interpreter {
    pub fn new(
        doc: Arc<Document>,
        datamodel: Box<dyn ExpressionEvaluator>,
        effector: Box<dyn ActionEffector>,
        config: InterpreterConfig,
    ) -> Self {
        Interpreter {
            doc,
            config,
            configuration: Configuration::new(),
            history: HistoryTracker::new(),
            queues: EventQueues::new(),
            variables: HashMap::new(),
            datamodel,
            effector,
            current_event: None,
            status: Status::Uninitialized,
        }
    }

    /// Enter the root's initial child(ren) and run microsteps until stable.
    /// A no-op if already initialized.
    #[instrument(skip(self), fields(document = %self.doc.name))]
    pub fn initialize(&mut self) -> Result<(), InterpreterError> {
        if self.status != Status::Uninitialized {
            return Ok(());
        }
        {
            let mut inputs = self.inputs();
            enter_initial(&mut inputs);
        }
        self.status = Status::Stable;
        self.check_terminated();
        self.run_macrostep();
        Ok(())
    }

    /// Dispatch one event and run its macrostep to completion.
    /// Ignored once the machine has terminated.
    #[instrument(skip(self, event), fields(event = %event.name))]
    pub fn send_event(&mut self, event: Event) {
        if self.is_terminated() {
            tracing::warn!(event = %event.name, "send_event on a terminated machine; ignored");
            return;
        }
        match event.origin {
            crate::event::EventOrigin::Internal => self.queues.enqueue_internal(event.name, event.data),
            crate::event::EventOrigin::External => self.queues.enqueue_external(event),
        }
        self.run_macrostep();
    }

    pub fn active_leaves(&self) -> &std::collections::HashSet<StateId> {
        self.configuration.leaves()
    }

    pub fn active_all(&self) -> &std::collections::HashSet<StateId> {
        self.configuration.all_active()
    }

    pub fn is_active(&self, id: StateId) -> bool {
        self.configuration.contains(id)
    }

    pub fn is_terminated(&self) -> bool {
        self.status == Status::Terminated
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Run one full macrostep: the initial dequeue may come from either
    /// queue (internal preferred), but once `current_event` is set, every
    /// further event consumed within the same macrostep comes only from
    /// the internal queue; a second externally-sent event
    /// waits for its own `send_event` call.
    fn run_macrostep(&mut self) {
        self.run_eventless_loop();
        if self.is_terminated() {
            self.current_event = None;
            return;
        }
        let Some(first) = self.queues.dequeue() else {
            self.current_event = None;
            return;
        };
        self.current_event = Some(first);
        self.run_until_current_event_exhausted();

        loop {
            if self.is_terminated() {
                break;
            }
            let Some(event) = self.queues.dequeue_internal() else { break };
            self.current_event = Some(event);
            self.run_until_current_event_exhausted();
        }
        self.current_event = None;
    }

    /// Fire microsteps for `current_event` until none are enabled,
    /// running the eventless loop to quiescence after each one.
    fn run_until_current_event_exhausted(&mut self) {
        loop {
            let selected = self.select(self.current_event.clone());
            if selected.is_empty() {
                break;
            }
            self.microstep(&selected, self.current_event.clone());
            if self.is_terminated() {
                return;
            }
            self.run_eventless_loop();
            if self.is_terminated() {
                return;
            }
        }
    }

    /// Execute eventless (NULL) microsteps until none are enabled, capped
    /// by `config.eventless_cycle_cap` (the cycle guard).
    fn run_eventless_loop(&mut self) {
        let mut iterations = 0u32;
        loop {
            let selected = self.select(None);
            if selected.is_empty() {
                break;
            }
            iterations += 1;
            if iterations > self.config.eventless_cycle_cap {
                tracing::warn!(
                    cap = self.config.eventless_cycle_cap,
                    "eventless cycle guard tripped; halting eventless processing for this macrostep"
                );
                break;
            }
            self.microstep(&selected, None);
            if self.is_terminated() {
                break;
            }
        }
    }

    fn select(&self, event: Option<Event>) -> Vec<TransitionId> {
        select_transitions(
            &self.doc,
            &self.configuration,
            &self.history,
            self.datamodel.as_ref(),
            &self.variables,
            event.as_ref(),
        )
    }

    fn microstep(&mut self, transitions: &[TransitionId], event: Option<Event>) {
        {
            let mut inputs = self.inputs();
            run_microstep(&mut inputs, transitions, event.as_ref());
        }
        self.check_terminated();
    }

    fn inputs(&mut self) -> MicrostepInputs<'_> {
        MicrostepInputs {
            doc: self.doc.as_ref(),
            configuration: &mut self.configuration,
            history: &mut self.history,
            queues: &mut self.queues,
            variables: &mut self.variables,
            datamodel: self.datamodel.as_mut(),
            effector: self.effector.as_mut(),
        }
    }

    /// Entering any `final` child of the document root marks the machine
    /// terminated.
    fn check_terminated(&mut self) -> bool {
        let doc = &self.doc;
        let terminated = self
            .configuration
            .leaves()
            .iter()
            .any(|&s| doc.state(s).kind == StateKind::Final && doc.parent(s) == Some(ROOT));
        if terminated {
            self.status = Status::Terminated;
        }
        terminated
    }
}
