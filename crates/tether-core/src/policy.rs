//! The [`Policy`] trait and the sparse [`TablePolicy`] implementation.
//!
//! A policy is an immutable snapshot. Loops share it as
//! `Arc<dyn Policy>` and replace it wholesale when a newer one arrives;
//! nothing ever edits a policy that another thread can see.

use indexmap::IndexMap;

use crate::id::{ActionId, StateId};

/// A (possibly partial) mapping from discrete state to action.
///
/// # Contract
///
/// - `action_for()` is pure: the same state always yields the same answer
///   for the lifetime of the snapshot.
/// - `None` means "undefined for this state"; callers fall back to
///   exploration rather than treating it as an error.
///
/// # Object safety
///
/// This trait is object-safe; loops store policies as `Arc<dyn Policy>`.
pub trait Policy: Send + Sync {
    /// The action this policy prescribes for `state`, if any.
    fn action_for(&self, state: StateId) -> Option<ActionId>;
}

impl<F> Policy for F
where
    F: Fn(StateId) -> Option<ActionId> + Send + Sync,
{
    fn action_for(&self, state: StateId) -> Option<ActionId> {
        self(state)
    }
}

/// A sparse state-to-action table.
///
/// Entries keep insertion order so that serializing a table (for the
/// link's policy side channel) is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TablePolicy {
    entries: IndexMap<StateId, ActionId>,
}

impl TablePolicy {
    /// Create an empty table. Every state is undefined.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the action for `state`, returning the previous one.
    pub fn insert(&mut self, state: StateId, action: ActionId) -> Option<ActionId> {
        self.entries.insert(state, action)
    }

    /// Number of defined states.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no state is defined.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(state, action)` entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (StateId, ActionId)> + '_ {
        self.entries.iter().map(|(s, a)| (*s, *a))
    }
}

impl Policy for TablePolicy {
    fn action_for(&self, state: StateId) -> Option<ActionId> {
        self.entries.get(&state).copied()
    }
}

impl FromIterator<(StateId, ActionId)> for TablePolicy {
    fn from_iter<I: IntoIterator<Item = (StateId, ActionId)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
