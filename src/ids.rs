use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense index into a [`Document`](crate::document::Document)'s state table.
///
/// States are referred to by id everywhere outside the document itself:
/// the configuration, the history tracker, transitions, and the selector
/// all store `StateId`s rather than borrowing or owning state data. This
/// keeps the document as the single owner of the state tree and avoids any
/// parent/child back-reference cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateId(pub(crate) u32);

impl StateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Dense index into a [`Document`](crate::document::Document)'s transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub(crate) u32);

impl TransitionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t#{}", self.0)
    }
}

/// Opaque handle to a compiled condition, owned by the datamodel collaborator.
/// The engine never inspects it; it only carries it to `eval_condition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConditionId(pub u32);

/// Opaque handle to a compiled value expression (assignment right-hand side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExprId(pub u32);

/// Opaque handle to a compiled assignment location (the left-hand side of `<assign>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocationId(pub u32);
