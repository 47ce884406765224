//! Transition selector (C5): given the current configuration and an event
//! (or NULL), compute the optimal enabled transition set.
//!
//! Candidate collection evaluates each active state's ancestor chain in
//! order and takes the first enabled transition per branch; conflict
//! resolution follows the standard W3C `removeConflictingTransitions`
//! shape, since parallel regions mean this engine can select several
//! transitions at once and must resolve overlaps itself.

use std::collections::HashMap;

use crate::configuration::Configuration;
use crate::datamodel::{EvalContext, ExpressionEvaluator, Value};
use crate::document::{Document, TransitionKind};
use crate::domain::exit_set_for_transition;
use crate::event::{event_matches, Event};
use crate::history::HistoryTracker;
use crate::ids::TransitionId;

/// Select the optimal enabled transition set for `event` (or `None` for an
/// eventless/NULL selection pass). Transitions are returned ordered by the
/// document order of the atomic/final state whose candidate search found
/// them ("the selector's output list is ordered by source-state
/// document order").
pub fn select_transitions(
    doc: &Document,
    configuration: &Configuration,
    history: &HistoryTracker,
    datamodel: &dyn ExpressionEvaluator,
    variables: &HashMap<String, Value>,
    event: Option<&Event>,
) -> Vec<TransitionId> {
    let in_state = |name: &str| {
        doc.find_by_name(name)
            .map(|id| configuration.contains(id))
            .unwrap_or(false)
    };
    let ctx = EvalContext {
        current_event: event,
        in_state: &in_state,
        variables,
    };
    let event_name = event.map(|e| e.name.as_str());

    let mut leaves: Vec<_> = configuration.leaves().iter().copied().collect();
    leaves.sort_by_key(|&id| doc.document_order(id));

    let mut candidates: Vec<TransitionId> = Vec::new();
    for leaf in leaves {
        'ancestors: for ancestor in doc.self_and_ancestors(leaf) {
            for t in doc.transitions_from(ancestor) {
                if !event_matches(&t.event, event_name) {
                    continue;
                }
                let cond_ok = match t.condition {
                    Some(cond) => datamodel.eval_condition(cond, &ctx),
                    None => true,
                };
                if !cond_ok {
                    continue;
                }
                if !candidates.contains(&t.id) {
                    candidates.push(t.id);
                }
                break 'ancestors;
            }
        }
    }

    remove_conflicting_transitions(doc, configuration, history, candidates)
}

/// `removeConflictingTransitions`: scan candidates in collection order,
/// and for each one check it against the transitions already accepted.
/// Deeper-sourced transitions preempt shallower ones whose exit sets
/// overlap; an accepted transition with no overlap
/// against `t1` simply coexists with it (this is how parallel regions end
/// up firing independently in the same optimal set).
fn remove_conflicting_transitions(
    doc: &Document,
    configuration: &Configuration,
    history: &HistoryTracker,
    candidates: Vec<TransitionId>,
) -> Vec<TransitionId> {
    let mut accepted: Vec<TransitionId> = Vec::new();

    for t1_id in candidates {
        let t1 = doc.transition(t1_id);
        let t1_exit = exit_set_for_transition(doc, configuration, history, t1);

        let mut preempted = false;
        let mut to_remove: Vec<TransitionId> = Vec::new();

        for &t2_id in &accepted {
            let t2 = doc.transition(t2_id);
            let t2_exit = exit_set_for_transition(doc, configuration, history, t2);

            if t1_exit.intersection(&t2_exit).next().is_none() {
                continue;
            }

            if doc.is_descendant(t1.source, t2.source) {
                to_remove.push(t2_id);
            } else {
                preempted = true;
                break;
            }
        }

        if preempted {
            continue;
        }
        accepted.retain(|t| !to_remove.contains(t));
        accepted.push(t1_id);
    }

    accepted
}
