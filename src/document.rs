//! The document model (C1): an immutable state tree with O(1)/O(depth)
//! lookup indices. States are linked by parent/children id pairs; the
//! document owns every node, and every other component refers to nodes
//! by id rather than holding or borrowing them directly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ConditionId, StateId, TransitionId};

/// The root is a synthetic compound pseudostate; it is never itself a
/// transition target but participates in LCCA/domain computation like any
/// other compound ancestor.
pub const ROOT: StateId = StateId(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateKind {
    Atomic,
    Compound,
    Parallel,
    Final,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryType {
    Shallow,
    Deep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    External,
    Internal,
}

impl Default for TransitionKind {
    fn default() -> Self {
        TransitionKind::External
    }
}

/// A space-separated list of event tokens, or `None` for an eventless
/// (NULL) transition. Matching rules are in [`crate::event::event_matches`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor(pub Option<Vec<String>>);

impl EventDescriptor {
    pub fn none() -> Self {
        EventDescriptor(None)
    }

    pub fn tokens(tokens: impl IntoIterator<Item = impl Into<String>>) -> Self {
        EventDescriptor(Some(tokens.into_iter().map(Into::into).collect()))
    }

    pub fn is_eventless(&self) -> bool {
        self.0.is_none()
    }
}

/// One entry of a transition's executable content.
/// The engine never interprets these beyond handing them to the
/// `ActionEffector` collaborator in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub kind: crate::actions::ActionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub source: StateId,
    pub targets: Vec<StateId>,
    pub event: EventDescriptor,
    pub condition: Option<ConditionId>,
    pub kind: TransitionKind,
    pub content: Vec<Action>,
    pub document_order: u32,
}

impl Transition {
    pub fn is_targetless(&self) -> bool {
        self.targets.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub name: String,
    pub kind: StateKind,
    pub parent: Option<StateId>,
    pub document_order: u32,
    pub children: Vec<StateId>,
    pub transitions: Vec<TransitionId>,
    pub onentry: Vec<Action>,
    pub onexit: Vec<Action>,
    /// Ordered initial children (`initial` attribute or `<initial>` element).
    /// Multiple entries are only meaningful when they target descendants of
    /// distinct parallel regions.
    pub initial: Option<Vec<StateId>>,
    /// Executable content attached to an `<initial>` element, run during
    /// entry of this state after its own `onentry`.
    pub initial_content: Vec<Action>,
    pub history_type: Option<HistoryType>,
    /// A history state's default transition, used when no recorded entry exists.
    pub history_default: Option<TransitionId>,
}

impl State {
    pub fn is_atomic_or_final(&self) -> bool {
        matches!(self.kind, StateKind::Atomic | StateKind::Final)
    }
}

/// Immutable, `Send + Sync` document. Built once by [`crate::builder::DocumentBuilder`]
/// and shared (typically via `Arc`) across however many running interpreters need it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub datamodel: String,
    pub(crate) states: Vec<State>,
    pub(crate) transitions: Vec<Transition>,
    #[serde(skip)]
    name_index: HashMap<String, StateId>,
}

impl Document {
    pub(crate) fn new(
        name: String,
        datamodel: String,
        states: Vec<State>,
        transitions: Vec<Transition>,
    ) -> Self {
        let name_index = states
            .iter()
            .map(|s| (s.name.clone(), s.id))
            .collect();
        Document {
            name,
            datamodel,
            states,
            transitions,
            name_index,
        }
    }

    #[inline]
    pub fn find_state(&self, id: StateId) -> Option<&State> {
        self.states.get(id.index())
    }

    /// Lookup by the human-readable state id the document was built with.
    /// `None` for the synthetic root and for unknown names.
    pub fn find_by_name(&self, name: &str) -> Option<StateId> {
        self.name_index.get(name).copied()
    }

    #[inline]
    pub fn state(&self, id: StateId) -> &State {
        self.find_state(id)
            .unwrap_or_else(|| panic!("invariant violated: unresolved state id {id}"))
    }

    #[inline]
    pub fn transition(&self, id: TransitionId) -> &Transition {
        self.transitions
            .get(id.index())
            .unwrap_or_else(|| panic!("invariant violated: unresolved transition id {id}"))
    }

    #[inline]
    pub fn transitions_from(&self, id: StateId) -> impl Iterator<Item = &Transition> {
        self.state(id).transitions.iter().map(move |t| self.transition(*t))
    }

    #[inline]
    pub fn children(&self, id: StateId) -> &[StateId] {
        &self.state(id).children
    }

    #[inline]
    pub fn parent(&self, id: StateId) -> Option<StateId> {
        self.state(id).parent
    }

    pub fn is_descendant(&self, candidate: StateId, ancestor: StateId) -> bool {
        self.ancestors(candidate).any(|a| a == ancestor)
    }

    /// Proper ancestors of `id`, leaf-to-root order, including the synthetic
    /// [`ROOT`] but stopping there (root has no further parent).
    pub fn ancestors(&self, id: StateId) -> AncestorIter<'_> {
        AncestorIter { doc: self, next: self.parent(id) }
    }

    /// `id` followed by its proper ancestors, leaf-to-root, including `id` itself.
    pub fn self_and_ancestors(&self, id: StateId) -> impl Iterator<Item = StateId> + '_ {
        std::iter::once(id).chain(self.ancestors(id))
    }

    pub fn document_order(&self, id: StateId) -> u32 {
        self.state(id).document_order
    }

    /// The deepest compound/parallel/root state that is a *proper* ancestor
    /// of `ids[0]` and an ancestor-or-self of every other id in `ids`.
    /// `ids` must be non-empty, and conventionally starts with a
    /// transition's source (domain.rs): using proper ancestors of `ids[0]`
    /// (never `ids[0]` itself) is what makes an external self-transition's
    /// domain land on the source's *parent* rather than the source, so the
    /// source is exited and re-entered rather than left untouched, as the
    /// W3C `findLCCA` pseudocode does by walking `getProperAncestors`
    /// of the list's head.
    pub fn common_compound_ancestor(&self, ids: &[StateId]) -> StateId {
        assert!(!ids.is_empty(), "LCCA requires at least one state");
        if ids[0] == ROOT {
            return ROOT;
        }
        let mut candidate_path: Vec<StateId> = self
            .ancestors(ids[0])
            .filter(|&a| self.is_compound_like(a))
            .collect();
        // candidate_path is ordered leaf-to-root; we want the first (deepest)
        // entry that is an ancestor-or-self of every other id.
        for &id in &ids[1..] {
            candidate_path.retain(|&c| c == id || self.is_descendant(id, c));
        }
        candidate_path.first().copied().unwrap_or(ROOT)
    }

    fn is_compound_like(&self, id: StateId) -> bool {
        id == ROOT || matches!(self.state(id).kind, StateKind::Compound | StateKind::Parallel)
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }
}

/// Leaf-to-root ancestor walk over plain document lookups.
pub struct AncestorIter<'a> {
    doc: &'a Document,
    next: Option<StateId>,
}

impl<'a> Iterator for AncestorIter<'a> {
    type Item = StateId;

    fn next(&mut self) -> Option<StateId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}
