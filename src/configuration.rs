//! The running configuration (C2): the set of active leaf states, plus
//! on-demand ancestor expansion.
//!
//! `active_leaves` is the source of truth; `active_cache` is an
//! ancestor-expanded cache recomputed after every transition.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::ids::StateId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    leaves: HashSet<StateId>,
    /// Ancestor-expanded cache, invalidated and rebuilt on every
    /// `replace_leaves` call (avoids recomputation on
    /// every `is_active`/`active_all` call between transitions).
    #[serde(skip)]
    active_cache: HashSet<StateId>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaves(&self) -> &HashSet<StateId> {
        &self.leaves
    }

    /// Replace the configuration's leaves and rebuild the ancestor cache.
    pub fn replace_leaves(&mut self, leaves: HashSet<StateId>, doc: &Document) {
        self.active_cache = Self::expand(&leaves, doc);
        self.leaves = leaves;
    }

    fn expand(leaves: &HashSet<StateId>, doc: &Document) -> HashSet<StateId> {
        let mut active = HashSet::with_capacity(leaves.len() * 2);
        for &leaf in leaves {
            active.insert(leaf);
            for ancestor in doc.ancestors(leaf) {
                if ancestor != crate::document::ROOT {
                    active.insert(ancestor);
                }
            }
        }
        active
    }

    /// Union of leaves and every proper ancestor, excluding the synthetic
    /// root pseudo-element).
    pub fn all_active(&self) -> &HashSet<StateId> {
        &self.active_cache
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.active_cache.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}
