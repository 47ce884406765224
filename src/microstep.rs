//! Microstep executor: given the optimal enabled transition set, compute
//! the exit set, record history, run onexit and transition content,
//! compute the entry set, run onentry, enqueue `done.state.*` events, and
//! replace the configuration.
//!
//! Exit-before-enter with history captured first and `done.state.*`-shaped
//! completion events for parallel regions (waiting for every sibling
//! region to report a final state), implemented as a batch algorithm over
//! an entire optimal transition set since parallel regions mean more than
//! one transition can fire in the same microstep.

use std::collections::{HashMap, HashSet};

use crate::actions::{ActionContext, ActionEffector};
use crate::configuration::Configuration;
use crate::datamodel::{EvalContext, ExpressionEvaluator, Value};
use crate::document::{Action, Document, StateKind, ROOT};
use crate::domain::{effective_targets, exit_set_for_transition, transition_domain};
use crate::event::{Event, EventData, EventQueues};
use crate::history::HistoryTracker;
use crate::ids::{ConditionId, ExprId, LocationId, StateId, TransitionId};

/// Everything the microstep executor needs mutable access to for one
/// machine instance. Bundled so `run_microstep` and `enter_initial` don't
/// need a growing parameter list (each running machine owns
/// these independently).
pub struct MicrostepInputs<'a> {
    pub doc: &'a Document,
    pub configuration: &'a mut Configuration,
    pub history: &'a mut HistoryTracker,
    pub queues: &'a mut EventQueues,
    pub variables: &'a mut HashMap<String, Value>,
    pub datamodel: &'a mut dyn ExpressionEvaluator,
    pub effector: &'a mut dyn ActionEffector,
}

/// Execute one microstep for the optimal enabled transition set `transitions`
/// (already conflict-resolved by C5). `current_event` is the event this set
/// was selected for (`None` for an eventless/NULL microstep).
pub fn run_microstep(inputs: &mut MicrostepInputs, transitions: &[TransitionId], current_event: Option<&Event>) {
    let doc = inputs.doc;

    // Step 1: compute exit set (union over all selected transitions).
    let mut exit_set: HashSet<StateId> = HashSet::new();
    let mut domains: HashMap<TransitionId, StateId> = HashMap::new();
    for &tid in transitions {
        let t = doc.transition(tid);
        let t_exit = exit_set_for_transition(doc, inputs.configuration, inputs.history, t);
        if !t.is_targetless() {
            let targets = effective_targets(doc, inputs.history, t);
            domains.insert(tid, transition_domain(doc, t, &targets));
        }
        exit_set.extend(t_exit);
    }

    // Step 2: record history for every parent being exited that has history
    // children, using the leaves active *before* any exit happens.
    let pre_exit_leaves = inputs.configuration.leaves().clone();
    for &parent in &exit_set {
        let has_history_child = doc
            .children(parent)
            .iter()
            .any(|&c| doc.state(c).kind == StateKind::History);
        if has_history_child {
            inputs.history.record(parent, &pre_exit_leaves, doc);
        }
    }

    // Step 3: exit states in reverse document order, running onexit actions.
    let mut exit_order: Vec<StateId> = exit_set.iter().copied().collect();
    exit_order.sort_by_key(|&s| std::cmp::Reverse(doc.document_order(s)));
    for &s in &exit_order {
        run_action_list(inputs, current_event, &doc.state(s).onexit.clone());
    }

    // Step 4: execute transition content, in the order transitions appear in T.
    for &tid in transitions {
        let content = doc.transition(tid).content.clone();
        run_action_list(inputs, current_event, &content);
    }

    // Step 5/6: compute the entry set and enter it in document order.
    let mut entered: HashSet<StateId> = HashSet::new();
    let mut new_leaves: HashSet<StateId> = HashSet::new();
    let mut post_entry_content: HashMap<StateId, Vec<Action>> = HashMap::new();

    for &tid in transitions {
        let t = doc.transition(tid);
        if t.is_targetless() {
            continue;
        }
        let targets = effective_targets(doc, inputs.history, t);
        let domain = *domains.get(&tid).expect("domain computed in step 1 for every targeted transition");
        for &target in &targets {
            enter_target(doc, inputs.history, target, domain, &mut entered, &mut new_leaves, &mut post_entry_content);
        }
    }

    // The surviving configuration: leaves that were active and not exited,
    // plus whatever this microstep's entry computed.
    let mut leaves: HashSet<StateId> = pre_exit_leaves
        .iter()
        .copied()
        .filter(|s| !exit_set.contains(s))
        .collect();
    leaves.extend(new_leaves.iter().copied());

    let mut entry_order: Vec<StateId> = entered.into_iter().collect();
    entry_order.sort_by_key(|&s| doc.document_order(s));
    let mut parallel_candidates: HashSet<StateId> = HashSet::new();
    for &s in &entry_order {
        run_action_list(inputs, current_event, &doc.state(s).onentry.clone());
        if let Some(content) = post_entry_content.remove(&s) {
            run_action_list(inputs, current_event, &content);
        }
        if doc.state(s).kind == StateKind::Final {
            if let Some(grandparent) = enqueue_final_parent_done(inputs, s) {
                parallel_candidates.insert(grandparent);
            }
        }
    }
    enqueue_parallel_joins(inputs, &parallel_candidates, &leaves);

    // Step 7: replace the configuration.
    inputs.configuration.replace_leaves(leaves, doc);
}

/// Run the entry algorithm for the document's root initial child(ren), as
/// if driven by a synthetic transition whose domain is the root
/// (initialization).
pub fn enter_initial(inputs: &mut MicrostepInputs) {
    let doc = inputs.doc;
    let mut entered: HashSet<StateId> = HashSet::new();
    let mut leaves: HashSet<StateId> = HashSet::new();
    let mut post_entry_content: HashMap<StateId, Vec<Action>> = HashMap::new();

    complete_kind(doc, inputs.history, ROOT, &mut entered, &mut leaves, &mut post_entry_content);

    let mut entry_order: Vec<StateId> = entered.into_iter().collect();
    entry_order.sort_by_key(|&s| doc.document_order(s));
    let mut parallel_candidates: HashSet<StateId> = HashSet::new();
    for &s in &entry_order {
        run_action_list(inputs, None, &doc.state(s).onentry.clone());
        if let Some(content) = post_entry_content.remove(&s) {
            run_action_list(inputs, None, &content);
        }
        if doc.state(s).kind == StateKind::Final {
            if let Some(grandparent) = enqueue_final_parent_done(inputs, s) {
                parallel_candidates.insert(grandparent);
            }
        }
    }
    enqueue_parallel_joins(inputs, &parallel_candidates, &leaves);

    inputs.configuration.replace_leaves(leaves, doc);
}

fn run_action_list(inputs: &mut MicrostepInputs, current_event: Option<&Event>, actions: &[Action]) {
    for action in actions {
        let mut ctx = MicrostepContext {
            doc: inputs.doc,
            configuration: inputs.configuration,
            current_event,
            variables: inputs.variables,
            datamodel: inputs.datamodel,
            queues: inputs.queues,
        };
        inputs.effector.run(action, &mut ctx);
    }
}

/// `done.state.P` enqueuing for one entered `Final` child. Returns the
/// grandparent when it is a `Parallel` state, so the caller can check that
/// region's join completion once per ancestor rather than once per region.
fn enqueue_final_parent_done(inputs: &mut MicrostepInputs, final_state: StateId) -> Option<StateId> {
    let doc = inputs.doc;
    let parent = doc.parent(final_state)?;
    let parent_name = doc.state(parent).name.clone();
    inputs.queues.enqueue_internal(format!("done.state.{parent_name}"), None);

    let grandparent = doc.parent(parent)?;
    if doc.state(grandparent).kind != StateKind::Parallel {
        return None;
    }
    Some(grandparent)
}

/// `done.state.G` enqueuing: each candidate parallel ancestor is checked at
/// most once per microstep, after every region's `Final` has already been
/// entered and recorded in `leaves`, so a join with several regions
/// completing in the same microstep enqueues exactly one event.
fn enqueue_parallel_joins(inputs: &mut MicrostepInputs, candidates: &HashSet<StateId>, leaves: &HashSet<StateId>) {
    let doc = inputs.doc;
    for &grandparent in candidates {
        let all_regions_done = doc.children(grandparent).iter().all(|&region| {
            doc.children(region)
                .iter()
                .any(|&c| doc.state(c).kind == StateKind::Final && leaves.contains(&c))
        });
        if all_regions_done {
            let grandparent_name = doc.state(grandparent).name.clone();
            inputs.queues.enqueue_internal(format!("done.state.{grandparent_name}"), None);
        }
    }
}

/// Add `target` and the ancestors between it and (excluding) `boundary` to
/// the entry set, then complete `target`'s own kind to a stable leaf set.
fn enter_target(
    doc: &Document,
    history: &HistoryTracker,
    target: StateId,
    boundary: StateId,
    entered: &mut HashSet<StateId>,
    leaves: &mut HashSet<StateId>,
    post_entry_content: &mut HashMap<StateId, Vec<Action>>,
) {
    for ancestor in doc.self_and_ancestors(target) {
        if ancestor == boundary {
            break;
        }
        if doc.state(ancestor).kind != StateKind::History {
            entered.insert(ancestor);
        }
    }
    complete_kind(doc, history, target, entered, leaves, post_entry_content);
}

/// Expand `id` according to its own kind to reach a stable set of leaves,
/// assuming `id` itself (if not a history pseudostate) has already been
/// added to `entered` by the caller.
fn complete_kind(
    doc: &Document,
    history: &HistoryTracker,
    id: StateId,
    entered: &mut HashSet<StateId>,
    leaves: &mut HashSet<StateId>,
    post_entry_content: &mut HashMap<StateId, Vec<Action>>,
) {
    match doc.state(id).kind {
        StateKind::History => {
            let Some(parent) = doc.parent(id) else { return };
            if let Some(resolved) = history.resolve(id, doc) {
                if resolved.is_empty() {
                    // Recorded-but-empty only happens for a never-active
                    // subtree; fall back to the parent acting as the leaf.
                    leaves.insert(parent);
                } else {
                    for &r in resolved {
                        enter_target(doc, history, r, parent, entered, leaves, post_entry_content);
                    }
                }
                return;
            }
            let default_targets = doc
                .state(id)
                .history_default
                .map(|tid| doc.transition(tid).targets.clone())
                .unwrap_or_default();
            if default_targets.is_empty() {
                tracing::warn!(history = ?id, "history state has no recorded entry and no default transition");
                leaves.insert(parent);
                return;
            }
            let content = doc.transition(doc.state(id).history_default.unwrap()).content.clone();
            post_entry_content.entry(parent).or_default().extend(content);
            for target in default_targets {
                enter_target(doc, history, target, parent, entered, leaves, post_entry_content);
            }
        }
        StateKind::Atomic | StateKind::Final => {
            leaves.insert(id);
        }
        StateKind::Compound => {
            if let Some(initial_ids) = doc.state(id).initial.clone() {
                let content = doc.state(id).initial_content.clone();
                if !content.is_empty() {
                    post_entry_content.entry(id).or_default().extend(content);
                }
                for target in initial_ids {
                    enter_target(doc, history, target, id, entered, leaves, post_entry_content);
                }
            } else if let Some(&first) = doc
                .children(id)
                .iter()
                .find(|&&c| doc.state(c).kind != StateKind::History)
            {
                enter_target(doc, history, first, id, entered, leaves, post_entry_content);
            }
        }
        StateKind::Parallel => {
            for &child in doc.children(id) {
                if doc.state(child).kind != StateKind::History {
                    enter_target(doc, history, child, id, entered, leaves, post_entry_content);
                }
            }
        }
    }
}

/// Bridges the microstep executor's mutable pieces to the
/// [`ActionContext`] contract an [`ActionEffector`] runs against.
struct MicrostepContext<'a> {
    doc: &'a Document,
    configuration: &'a Configuration,
    current_event: Option<&'a Event>,
    variables: &'a mut HashMap<String, Value>,
    datamodel: &'a mut dyn ExpressionEvaluator,
    queues: &'a mut EventQueues,
}

impl ActionContext for MicrostepContext<'_> {
    fn raise_internal(&mut self, event_name: String, data: EventData) {
        if event_name.trim().is_empty() {
            tracing::warn!("<raise> with an empty event name: action failure, ignored");
            return;
        }
        self.queues.enqueue_internal(event_name, data);
    }

    fn eval_value(&mut self, expr: ExprId) -> Option<Value> {
        let doc = self.doc;
        let configuration = self.configuration;
        let in_state = move |name: &str| doc.find_by_name(name).map(|id| configuration.contains(id)).unwrap_or(false);
        let ctx = EvalContext { current_event: self.current_event, in_state: &in_state, variables: self.variables };
        self.datamodel.eval_value(expr, &ctx)
    }

    fn eval_condition(&mut self, cond: ConditionId) -> bool {
        let doc = self.doc;
        let configuration = self.configuration;
        let in_state = move |name: &str| doc.find_by_name(name).map(|id| configuration.contains(id)).unwrap_or(false);
        let ctx = EvalContext { current_event: self.current_event, in_state: &in_state, variables: self.variables };
        self.datamodel.eval_condition(cond, &ctx)
    }

    fn assign(&mut self, location: LocationId, value: Value) {
        if !self.datamodel.assign(location, value, self.variables) {
            tracing::warn!(?location, "assignment failure: action left the datamodel unchanged");
        }
    }

    fn log(&mut self, label: Option<&str>, value: Option<Value>) {
        tracing::info!(label = label.unwrap_or(""), ?value, "<log>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ReferenceEffector;
    use crate::builder::DocumentBuilder;
    use crate::datamodel::ReferenceDatamodel;
    use crate::document::{Action, EventDescriptor, HistoryType, TransitionKind};
    use crate::ids::TransitionId;

    fn base_inputs<'a>(
        doc: &'a Document,
        configuration: &'a mut Configuration,
        history: &'a mut HistoryTracker,
        queues: &'a mut EventQueues,
        variables: &'a mut HashMap<String, Value>,
        datamodel: &'a mut ReferenceDatamodel,
        effector: &'a mut ReferenceEffector,
    ) -> MicrostepInputs<'a> {
        MicrostepInputs { doc, configuration, history, queues, variables, datamodel, effector }
    }

    #[test]
    fn initialize_descends_into_compound_initial_child() {
        let mut b = DocumentBuilder::new("m", "null");
        let parent = b.add_state("parent", StateKind::Compound, None);
        let child_first = b.add_state("child_first", StateKind::Atomic, Some(parent));
        let child_target = b.add_state("child_target", StateKind::Atomic, Some(parent));
        let _ = child_first;
        b.set_initial(parent, vec![child_target]);
        b.set_initial(b.root(), vec![parent]);
        let doc = b.build().unwrap();

        let mut configuration = Configuration::new();
        let mut history = HistoryTracker::new();
        let mut queues = EventQueues::new();
        let mut variables = HashMap::new();
        let mut datamodel = ReferenceDatamodel::new();
        let mut effector = ReferenceEffector::new();
        let mut inputs = base_inputs(&doc, &mut configuration, &mut history, &mut queues, &mut variables, &mut datamodel, &mut effector);
        enter_initial(&mut inputs);

        assert_eq!(inputs.configuration.leaves(), &HashSet::from([child_target]));
        assert!(inputs.configuration.contains(parent));
    }

    #[test]
    fn parallel_internal_transition_preserves_sibling_region() {
        let mut b = DocumentBuilder::new("m", "null");
        let p = b.add_state("p", StateKind::Parallel, None);
        let region_a = b.add_state("A", StateKind::Compound, Some(p));
        let a1 = b.add_state("a1", StateKind::Atomic, Some(region_a));
        let a2 = b.add_state("a2", StateKind::Atomic, Some(region_a));
        let region_b = b.add_state("B", StateKind::Compound, Some(p));
        let b1 = b.add_state("b1", StateKind::Atomic, Some(region_b));
        b.set_initial(region_a, vec![a1]);
        b.set_initial(region_b, vec![b1]);
        b.set_initial(b.root(), vec![p]);
        let go = b.add_transition(a1, vec![a2], EventDescriptor::tokens(["go"]), None, TransitionKind::External, vec![]);
        let doc = b.build().unwrap();

        let mut configuration = Configuration::new();
        let mut history = HistoryTracker::new();
        let mut queues = EventQueues::new();
        let mut variables = HashMap::new();
        let mut datamodel = ReferenceDatamodel::new();
        let mut effector = ReferenceEffector::new();
        let mut inputs = base_inputs(&doc, &mut configuration, &mut history, &mut queues, &mut variables, &mut datamodel, &mut effector);
        enter_initial(&mut inputs);
        assert_eq!(inputs.configuration.leaves(), &HashSet::from([a1, b1]));

        run_microstep(&mut inputs, &[go], Some(&Event::external("go")));
        assert_eq!(inputs.configuration.leaves(), &HashSet::from([a2, b1]));
    }

    #[test]
    fn deep_history_restores_the_exact_atomic_descendant() {
        let mut b = DocumentBuilder::new("m", "null");
        let p = b.add_state("P", StateKind::Compound, None);
        let q = b.add_state("q", StateKind::Compound, Some(p));
        let q1 = b.add_state("q1", StateKind::Atomic, Some(q));
        let q2 = b.add_state("q2", StateKind::Atomic, Some(q));
        let h = b.add_state("h", StateKind::History, Some(p));
        let out = b.add_state("out", StateKind::Atomic, None);
        b.set_initial(q, vec![q1]);
        b.set_initial(p, vec![q]);
        b.set_initial(b.root(), vec![p]);
        let default = b.add_transition(h, vec![q1], EventDescriptor::none(), None, TransitionKind::External, vec![]);
        b.set_history(h, HistoryType::Deep, Some(default));
        let to_q2 = b.add_transition(q1, vec![q2], EventDescriptor::tokens(["next"]), None, TransitionKind::External, vec![]);
        let to_out = b.add_transition(p, vec![out], EventDescriptor::tokens(["leave"]), None, TransitionKind::External, vec![]);
        let to_h = b.add_transition(out, vec![h], EventDescriptor::tokens(["back"]), None, TransitionKind::External, vec![]);
        let doc = b.build().unwrap();

        let mut configuration = Configuration::new();
        let mut history = HistoryTracker::new();
        let mut queues = EventQueues::new();
        let mut variables = HashMap::new();
        let mut datamodel = ReferenceDatamodel::new();
        let mut effector = ReferenceEffector::new();
        let mut inputs = base_inputs(&doc, &mut configuration, &mut history, &mut queues, &mut variables, &mut datamodel, &mut effector);
        enter_initial(&mut inputs);
        assert_eq!(inputs.configuration.leaves(), &HashSet::from([q1]));

        run_microstep(&mut inputs, &[to_q2], Some(&Event::external("next")));
        assert_eq!(inputs.configuration.leaves(), &HashSet::from([q2]));

        run_microstep(&mut inputs, &[to_out], Some(&Event::external("leave")));
        assert_eq!(inputs.configuration.leaves(), &HashSet::from([out]));

        run_microstep(&mut inputs, &[to_h], Some(&Event::external("back")));
        assert_eq!(inputs.configuration.leaves(), &HashSet::from([q2]));
    }

    #[test]
    fn final_child_enqueues_done_state_event() {
        let mut b = DocumentBuilder::new("m", "null");
        let parent = b.add_state("parent", StateKind::Compound, None);
        let working = b.add_state("working", StateKind::Atomic, Some(parent));
        let done_final = b.add_state("done_final", StateKind::Final, Some(parent));
        b.set_initial(parent, vec![working]);
        b.set_initial(b.root(), vec![parent]);
        let finish = b.add_transition(working, vec![done_final], EventDescriptor::tokens(["finish"]), None, TransitionKind::External, vec![]);
        let doc = b.build().unwrap();

        let mut configuration = Configuration::new();
        let mut history = HistoryTracker::new();
        let mut queues = EventQueues::new();
        let mut variables = HashMap::new();
        let mut datamodel = ReferenceDatamodel::new();
        let mut effector = ReferenceEffector::new();
        let mut inputs = base_inputs(&doc, &mut configuration, &mut history, &mut queues, &mut variables, &mut datamodel, &mut effector);
        enter_initial(&mut inputs);

        run_microstep(&mut inputs, &[finish], Some(&Event::external("finish")));
        let enqueued = queues.dequeue().unwrap();
        assert_eq!(enqueued.name, "done.state.parent");
    }

    #[test]
    fn onentry_actions_can_raise_internal_events_consumed_next_turn() {
        let mut b = DocumentBuilder::new("m", "null");
        let a = b.add_state("a", StateKind::Atomic, None);
        let bstate = b.add_state("b", StateKind::Atomic, None);
        b.add_onentry(bstate, Action { kind: crate::actions::ActionKind::Raise { event: "arrived".into() } });
        b.set_initial(b.root(), vec![a]);
        let go: TransitionId = b.add_transition(a, vec![bstate], EventDescriptor::tokens(["go"]), None, TransitionKind::External, vec![]);
        let doc = b.build().unwrap();

        let mut configuration = Configuration::new();
        let mut history = HistoryTracker::new();
        let mut queues = EventQueues::new();
        let mut variables = HashMap::new();
        let mut datamodel = ReferenceDatamodel::new();
        let mut effector = ReferenceEffector::new();
        let mut inputs = base_inputs(&doc, &mut configuration, &mut history, &mut queues, &mut variables, &mut datamodel, &mut effector);
        enter_initial(&mut inputs);
        run_microstep(&mut inputs, &[go], Some(&Event::external("go")));

        assert!(queues.has_internal());
        assert_eq!(queues.dequeue().unwrap().name, "arrived");
    }
}
