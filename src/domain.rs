//! Shared geometry helpers used by both the transition selector (C5, for
//! preemption's exit-set intersection test) and the microstep executor
//! (C6, for the real exit/entry computation): effective targets, the
//! transition domain, and the LCCA.
//!
//! The LCCA is computed via the document's `common_compound_ancestor`,
//! generalized to handle an arbitrary number of targets since an SCXML
//! transition may target more than one state across parallel regions.

use std::collections::HashSet;

use crate::configuration::Configuration;
use crate::document::{Document, StateKind, Transition, TransitionKind};
use crate::history::HistoryTracker;
use crate::ids::StateId;

/// A transition's declared targets with any history pseudostate targets
/// replaced by their resolved ids ("effective targets").
/// A history target with no recorded entry resolves to its default
/// transition's targets (recursively, in case the default itself targets
/// another history state; SCXML documents in practice never nest these,
/// but nothing stops it structurally).
pub fn effective_targets(doc: &Document, history: &HistoryTracker, transition: &Transition) -> Vec<StateId> {
    let mut out = Vec::with_capacity(transition.targets.len());
    for &target in &transition.targets {
        expand_target(doc, history, target, &mut out, 0);
    }
    out
}

fn expand_target(doc: &Document, history: &HistoryTracker, target: StateId, out: &mut Vec<StateId>, depth: u32) {
    const MAX_HISTORY_INDIRECTION: u32 = 32;
    if doc.state(target).kind != StateKind::History {
        out.push(target);
        return;
    }
    if depth > MAX_HISTORY_INDIRECTION {
        // Pathological default-transition cycle; fall back to the history
        // state's parent rather than looping forever.
        if let Some(parent) = doc.parent(target) {
            out.push(parent);
        }
        return;
    }
    if let Some(resolved) = history.resolve(target, doc) {
        if resolved.is_empty() {
            if let Some(parent) = doc.parent(target) {
                out.push(parent);
            }
        } else {
            out.extend_from_slice(resolved);
        }
        return;
    }
    // No recorded entry: fall back to the default transition's targets.
    let default_targets = doc
        .state(target)
        .history_default
        .map(|tid| doc.transition(tid).targets.clone())
        .unwrap_or_default();
    if default_targets.is_empty() {
        if let Some(parent) = doc.parent(target) {
            out.push(parent);
        }
        return;
    }
    for t in default_targets {
        expand_target(doc, history, t, out, depth + 1);
    }
}

/// The transition domain: the compound-or-
/// parallel-or-root state whose active descendants this transition exits.
pub fn transition_domain(doc: &Document, transition: &Transition, effective_targets: &[StateId]) -> StateId {
    if transition.kind == TransitionKind::Internal
        && doc.state(transition.source).kind == StateKind::Compound
        && effective_targets
            .iter()
            .all(|&t| doc.is_descendant(t, transition.source))
    {
        return transition.source;
    }
    let mut ids = Vec::with_capacity(effective_targets.len() + 1);
    ids.push(transition.source);
    ids.extend_from_slice(effective_targets);
    doc.common_compound_ancestor(&ids)
}

/// Every state in `configuration`'s expanded active set that is a proper
/// descendant of `domain`. Returned as a set since both call sites
/// (preemption's intersection test and the real exit computation) only
/// care about membership, not order; ordering for the actual exit
/// happens later, by reverse document order.
pub fn exit_set(doc: &Document, configuration: &Configuration, domain: StateId) -> HashSet<StateId> {
    configuration
        .all_active()
        .iter()
        .copied()
        .filter(|&s| s != domain && doc.is_descendant(s, domain))
        .collect()
}

/// Full exit-set computation for one transition, including the special
/// case of a targetless transition: its contribution is empty regardless
/// of type (there is nothing to reach, so no domain is well-defined and
/// nothing is exited, it only runs its content).
pub fn exit_set_for_transition(
    doc: &Document,
    configuration: &Configuration,
    history: &HistoryTracker,
    transition: &Transition,
) -> HashSet<StateId> {
    if transition.is_targetless() {
        return HashSet::new();
    }
    let targets = effective_targets(doc, history, transition);
    let domain = transition_domain(doc, transition, &targets);
    exit_set(doc, configuration, domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DocumentBuilder;
    use crate::document::{EventDescriptor, StateKind, TransitionKind};

    #[test]
    fn domain_is_lcca_for_external_transition() {
        let mut b = DocumentBuilder::new("m", "null");
        let root_child = b.add_state("region", StateKind::Compound, None);
        let a = b.add_state("a", StateKind::Atomic, Some(root_child));
        let c = b.add_state("c", StateKind::Atomic, Some(root_child));
        let tid = b.add_transition(a, vec![c], EventDescriptor::tokens(["go"]), None, TransitionKind::External, vec![]);
        let doc = b.build().unwrap();
        let t = doc.transition(tid);
        let targets = effective_targets(&doc, &HistoryTracker::new(), t);
        let domain = transition_domain(&doc, t, &targets);
        assert_eq!(domain, root_child);
    }

    #[test]
    fn internal_self_transition_domain_is_source_when_compound_and_descendant_targets() {
        let mut b = DocumentBuilder::new("m", "null");
        let parent = b.add_state("parent", StateKind::Compound, None);
        let child = b.add_state("child", StateKind::Atomic, Some(parent));
        let tid = b.add_transition(
            parent,
            vec![child],
            EventDescriptor::tokens(["go"]),
            None,
            TransitionKind::Internal,
            vec![],
        );
        let doc = b.build().unwrap();
        let t = doc.transition(tid);
        let targets = effective_targets(&doc, &HistoryTracker::new(), t);
        let domain = transition_domain(&doc, t, &targets);
        assert_eq!(domain, parent);
    }
}
