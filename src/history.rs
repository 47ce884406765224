//! History tracker (C4): per-parent recorded shallow/deep descendant sets.
//!
//! Shallow history walks each active leaf up to the immediate child of
//! the exited parent; deep history keeps every active leaf under that
//! parent. Pulled out into a standalone, queryable tracker rather than
//! being interleaved with exit-set side effects.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::document::{Document, HistoryType, StateKind};
use crate::ids::StateId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryTracker {
    shallow: HashMap<StateId, Vec<StateId>>,
    deep: HashMap<StateId, Vec<StateId>>,
}

impl HistoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the history of `parent` given the leaves active *before* it is
    /// exited. `active_leaves` is the full leaf set of the running
    /// configuration; only the members within `parent`'s subtree matter.
    ///
    /// Deterministic in its inputs: recording twice with the same
    /// `active_leaves` yields the same stored sets (idempotence
    /// property) since both maps are simply overwritten with the same value.
    pub fn record(&mut self, parent: StateId, active_leaves: &HashSet<StateId>, doc: &Document) {
        // A = states from active_leaves ∪ proper_ancestors that are within
        // parent's subtree.
        let mut within_subtree: HashSet<StateId> = HashSet::new();
        for &leaf in active_leaves {
            if leaf == parent || doc.is_descendant(leaf, parent) {
                within_subtree.insert(leaf);
                for ancestor in doc.ancestors(leaf) {
                    if ancestor == parent {
                        break;
                    }
                    within_subtree.insert(ancestor);
                }
            }
        }

        let shallow_set: Vec<StateId> = within_subtree
            .iter()
            .copied()
            .filter(|&s| doc.parent(s) == Some(parent))
            .collect();

        let deep_set: Vec<StateId> = within_subtree
            .iter()
            .copied()
            .filter(|&s| matches!(doc.state(s).kind, StateKind::Atomic | StateKind::Final))
            .collect();

        self.shallow.insert(parent, shallow_set);
        self.deep.insert(parent, deep_set);
    }

    /// Resolve a history pseudostate to its recorded set, or `None` if no
    /// entry has ever been recorded for its parent (caller falls back to
    /// the history state's default transition).
    pub fn resolve(&self, history_state: StateId, doc: &Document) -> Option<&[StateId]> {
        let state = doc.state(history_state);
        let parent = state.parent?;
        let history_type = state.history_type?;
        let map = match history_type {
            HistoryType::Shallow => &self.shallow,
            HistoryType::Deep => &self.deep,
        };
        map.get(&parent).map(|v| v.as_slice())
    }

    pub fn has_recorded(&self, parent: StateId) -> bool {
        self.shallow.contains_key(&parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DocumentBuilder;
    use crate::document::StateKind;

    fn build_doc() -> (Document, StateId, StateId, StateId, StateId) {
        let mut b = DocumentBuilder::new("m", "null");
        let p = b.add_state("P", StateKind::Compound, None);
        let q = b.add_state("q", StateKind::Compound, Some(p));
        let q1 = b.add_state("q1", StateKind::Atomic, Some(q));
        let q2 = b.add_state("q2", StateKind::Atomic, Some(q));
        b.set_initial(q, vec![q1]);
        b.set_initial(p, vec![q]);
        let doc = b.build().unwrap();
        (doc, p, q, q1, q2)
    }

    #[test]
    fn shallow_history_saves_the_immediate_child() {
        let (doc, p, q, q1, _q2) = build_doc();
        let mut leaves = HashSet::new();
        leaves.insert(q1);
        let mut tracker = HistoryTracker::new();
        tracker.record(p, &leaves, &doc);
        assert_eq!(tracker.shallow.get(&p).unwrap(), &vec![q]);
    }

    #[test]
    fn deep_history_saves_the_atomic_descendant() {
        let (doc, p, _q, q1, _q2) = build_doc();
        let mut leaves = HashSet::new();
        leaves.insert(q1);
        let mut tracker = HistoryTracker::new();
        tracker.record(p, &leaves, &doc);
        assert_eq!(tracker.deep.get(&p).unwrap(), &vec![q1]);
    }

    #[test]
    fn recording_twice_is_idempotent() {
        let (doc, p, _q, q1, _q2) = build_doc();
        let mut leaves = HashSet::new();
        leaves.insert(q1);
        let mut tracker = HistoryTracker::new();
        tracker.record(p, &leaves, &doc);
        let first = tracker.deep.get(&p).cloned();
        tracker.record(p, &leaves, &doc);
        let second = tracker.deep.get(&p).cloned();
        assert_eq!(first, second);
    }

    #[test]
    fn unrecorded_history_resolves_to_none() {
        let (doc, p, _q, _q1, _q2) = build_doc();
        let tracker = HistoryTracker::new();
        assert!(tracker.shallow.get(&p).is_none());
    }
}
