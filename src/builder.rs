//! Document builder and validator: a programmatic constructor for a
//! [`Document`] plus the invariant checks that gate it.
//!
//! Builder callers always hold a [`StateId`] before they can reference it
//! (ids are returned from `add_state` and can only be constructed inside
//! this crate), so "unresolved reference" and "parent cycle" are structural
//! impossibilities here rather than things the validator must search for,
//! unlike a document built from a textual XML surface, where forward
//! references and typos are exactly what a validator exists to catch. The
//! remaining checks (history/parallel shape, conflicting initial, document
//! order) are still run in full, since they depend on *how* the builder was
//! used, not just on reference resolution.

use crate::document::{
    Action, Document, EventDescriptor, HistoryType, State, StateKind, Transition, TransitionKind,
    ROOT,
};
use crate::error::{ValidationError, ValidationErrors};
use crate::ids::{ConditionId, StateId, TransitionId};

pub struct DocumentBuilder {
    name: String,
    datamodel: String,
    states: Vec<State>,
    transitions: Vec<Transition>,
    /// How many times `initial` was set (attribute form or `<initial>`
    /// element form) per state, so `build()` can flag a state that declared
    /// both ("a compound state may carry at most one").
    initial_set_count: Vec<u32>,
}

impl DocumentBuilder {
    pub fn new(name: impl Into<String>, datamodel: impl Into<String>) -> Self {
        let root = State {
            id: ROOT,
            name: "__root__".to_string(),
            kind: StateKind::Compound,
            parent: None,
            document_order: 0,
            children: Vec::new(),
            transitions: Vec::new(),
            onentry: Vec::new(),
            onexit: Vec::new(),
            initial: None,
            initial_content: Vec::new(),
            history_type: None,
            history_default: None,
        };
        DocumentBuilder {
            name: name.into(),
            datamodel: datamodel.into(),
            states: vec![root],
            transitions: Vec::new(),
            initial_set_count: vec![0],
        }
    }

    pub fn root(&self) -> StateId {
        ROOT
    }

    /// Add a state. `parent` defaults to the document root when `None`.
    pub fn add_state(&mut self, name: impl Into<String>, kind: StateKind, parent: Option<StateId>) -> StateId {
        let parent = parent.unwrap_or(ROOT);
        let id = StateId(self.states.len() as u32);
        self.states.push(State {
            id,
            name: name.into(),
            kind,
            parent: Some(parent),
            document_order: 0,
            children: Vec::new(),
            transitions: Vec::new(),
            onentry: Vec::new(),
            onexit: Vec::new(),
            initial: None,
            initial_content: Vec::new(),
            history_type: None,
            history_default: None,
        });
        self.states[parent.index()].children.push(id);
        self.initial_set_count.push(0);
        id
    }

    pub fn add_onentry(&mut self, state: StateId, action: Action) {
        self.states[state.index()].onentry.push(action);
    }

    pub fn add_onexit(&mut self, state: StateId, action: Action) {
        self.states[state.index()].onexit.push(action);
    }

    /// Set a compound/parallel state's initial children via the `initial`
    /// attribute form (single-transition precedence rule).
    pub fn set_initial(&mut self, state: StateId, targets: Vec<StateId>) {
        self.states[state.index()].initial = Some(targets);
        self.initial_set_count[state.index()] += 1;
    }

    /// Set a compound state's initial children via the `<initial>` element
    /// form, with executable content run during entry.
    pub fn set_initial_element(&mut self, state: StateId, targets: Vec<StateId>, content: Vec<Action>) {
        self.states[state.index()].initial = Some(targets);
        self.states[state.index()].initial_content = content;
        self.initial_set_count[state.index()] += 1;
    }

    pub fn set_history(&mut self, state: StateId, history_type: HistoryType, default: Option<TransitionId>) {
        self.states[state.index()].history_type = Some(history_type);
        self.states[state.index()].history_default = default;
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_transition(
        &mut self,
        source: StateId,
        targets: Vec<StateId>,
        event: EventDescriptor,
        condition: Option<ConditionId>,
        kind: TransitionKind,
        content: Vec<Action>,
    ) -> TransitionId {
        let id = TransitionId(self.transitions.len() as u32);
        self.transitions.push(Transition {
            id,
            source,
            targets,
            event,
            condition,
            kind,
            content,
            document_order: 0,
        });
        self.states[source.index()].transitions.push(id);
        id
    }

    pub fn build(mut self) -> Result<Document, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        self.assign_document_order();
        self.validate(&mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Document::new(self.name, self.datamodel, self.states, self.transitions))
    }

    /// Pre-order walk from root assigning strictly increasing document
    /// order across the whole tree (document order is total and
    /// strictly monotone in a pre-order walk).
    fn assign_document_order(&mut self) {
        let mut order = 0u32;
        let mut stack = vec![ROOT];
        let mut visited = vec![false; self.states.len()];
        // iterative pre-order, pushing children in reverse so they pop in order
        while let Some(id) = stack.pop() {
            if visited[id.index()] {
                continue;
            }
            visited[id.index()] = true;
            self.states[id.index()].document_order = order;
            order += 1;
            for &child in self.states[id.index()].children.iter().rev() {
                stack.push(child);
            }
        }
        for (i, t) in self.transitions.iter_mut().enumerate() {
            t.document_order = i as u32;
        }
    }

    fn validate(&self, errors: &mut ValidationErrors) {
        use std::collections::HashSet;

        let mut seen_names = HashSet::new();
        for state in self.states.iter().skip(1) {
            if state.name.trim().is_empty() {
                errors.push(ValidationError::EmptyId(format!("{}", state.id)));
            } else if !seen_names.insert(state.name.clone()) {
                errors.push(ValidationError::DuplicateId(state.name.clone()));
            }

            match state.kind {
                StateKind::History => {
                    if !state.children.is_empty() {
                        errors.push(ValidationError::HistoryStateHasChildren(state.name.clone()));
                    }
                }
                StateKind::Parallel => {
                    if state.children.is_empty() {
                        errors.push(ValidationError::ParallelStateEmpty(state.name.clone()));
                    }
                }
                _ => {}
            }

            if self.initial_set_count[state.id.index()] > 1 {
                errors.push(ValidationError::ConflictingInitial(state.name.clone()));
            }
        }

        if !Self::document_order_is_monotone(&self.states) {
            errors.push(ValidationError::DocumentOrderNotMonotone);
        }
    }

    fn document_order_is_monotone(states: &[State]) -> bool {
        let mut orders: Vec<u32> = states.iter().map(|s| s.document_order).collect();
        let sorted = {
            let mut o = orders.clone();
            o.sort_unstable();
            o
        };
        orders.sort_unstable();
        orders == sorted && orders.windows(2).all(|w| w[0] != w[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_document_builds_and_assigns_document_order() {
        let mut b = DocumentBuilder::new("m", "null");
        let a = b.add_state("a", StateKind::Atomic, None);
        let bb = b.add_state("b", StateKind::Atomic, None);
        b.set_initial(b.root(), vec![a]);
        let doc = b.build().unwrap();
        assert!(doc.document_order(a) < doc.document_order(bb));
    }

    #[test]
    fn history_state_with_children_is_rejected() {
        let mut b = DocumentBuilder::new("m", "null");
        let h = b.add_state("h", StateKind::History, None);
        let _child = b.add_state("child", StateKind::Atomic, Some(h));
        let err = b.build().unwrap_err();
        assert!(err
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::HistoryStateHasChildren(_))));
    }

    #[test]
    fn empty_parallel_state_is_rejected() {
        let mut b = DocumentBuilder::new("m", "null");
        let _p = b.add_state("p", StateKind::Parallel, None);
        let err = b.build().unwrap_err();
        assert!(err
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::ParallelStateEmpty(_))));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut b = DocumentBuilder::new("m", "null");
        let _a = b.add_state("dup", StateKind::Atomic, None);
        let _b2 = b.add_state("dup", StateKind::Atomic, None);
        let err = b.build().unwrap_err();
        assert!(err.errors.iter().any(|e| matches!(e, ValidationError::DuplicateId(_))));
    }

    #[test]
    fn declaring_initial_twice_is_rejected() {
        let mut b = DocumentBuilder::new("m", "null");
        let parent = b.add_state("parent", StateKind::Compound, None);
        let a = b.add_state("a", StateKind::Atomic, Some(parent));
        let c = b.add_state("c", StateKind::Atomic, Some(parent));
        b.set_initial(parent, vec![a]);
        b.set_initial_element(parent, vec![c], vec![]);
        let err = b.build().unwrap_err();
        assert!(err
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::ConflictingInitial(_))));
    }
}
