//! Event values and the internal/external FIFO queues (C3).
//!
//! An event is a plain name+data+origin triple. Priority rule: internal
//! strictly before external, FIFO within each.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventOrigin {
    Internal,
    External,
}

/// Opaque event payload. The engine never inspects this; it is handed to
/// the datamodel collaborator's evaluation context as `_event.data`.
pub type EventData = Option<crate::datamodel::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub data: EventData,
    pub origin: EventOrigin,
}

impl Event {
    pub fn external(name: impl Into<String>) -> Self {
        Event { name: name.into(), data: None, origin: EventOrigin::External }
    }

    pub fn external_with_data(name: impl Into<String>, data: crate::datamodel::Value) -> Self {
        Event { name: name.into(), data: Some(data), origin: EventOrigin::External }
    }

    pub(crate) fn internal(name: impl Into<String>, data: EventData) -> Self {
        Event { name: name.into(), data, origin: EventOrigin::Internal }
    }
}

/// SCXML token matching: a transition's event descriptor is a
/// space-separated list of tokens; `T` matches name `N` iff `T == N`, or
/// `T` is a `.`-delimited prefix of `N`, or `T` is `*`/ends in `.*`.
pub fn token_matches(token: &str, name: &str) -> bool {
    if token == "*" {
        return true;
    }
    if let Some(prefix) = token.strip_suffix(".*") {
        return name == prefix || name.starts_with(&format!("{prefix}."));
    }
    if token == name {
        return true;
    }
    name.starts_with(&format!("{token}."))
}

/// Does this transition's event descriptor match the given event name?
/// A `None` descriptor (eventless) only "matches" a `None` event name,
/// i.e. NULL-selection.
pub fn event_matches(descriptor: &crate::document::EventDescriptor, event_name: Option<&str>) -> bool {
    match (&descriptor.0, event_name) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some(_), None) => false,
        (Some(tokens), Some(name)) => tokens.iter().any(|t| token_matches(t, name)),
    }
}

/// Internal-over-external FIFO, single-owner, mutated only by the
/// macrostep driver.
#[derive(Debug, Default)]
pub struct EventQueues {
    internal: VecDeque<Event>,
    external: VecDeque<Event>,
}

impl EventQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_internal(&mut self, name: impl Into<String>, data: EventData) {
        self.internal.push_back(Event::internal(name, data));
    }

    pub fn enqueue_external(&mut self, event: Event) {
        self.external.push_back(event);
    }

    /// Internal has strict priority over external.
    pub fn dequeue(&mut self) -> Option<Event> {
        self.internal.pop_front().or_else(|| self.external.pop_front())
    }

    /// Pop an internal event only, leaving the external queue untouched
    /// ("drain the internal queue one event at a time" is a
    /// distinct step from dequeuing the next externally-triggered event).
    pub fn dequeue_internal(&mut self) -> Option<Event> {
        self.internal.pop_front()
    }

    pub fn has_internal(&self) -> bool {
        !self.internal.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.internal.is_empty() && self.external.is_empty()
    }
}
