//! The component graph: a typed multiset of what exists right now.

use im::HashMap;

use crate::error::ExecutionError;
use crate::types::{ClassTable, Type};

use super::change::StateChange;

/// Current counts of every concrete component type.
///
/// Persistent under the hood, so snapshots are cheap clones.
#[derive(Clone, Debug, Default)]
pub struct ComponentGraph {
    counts: HashMap<Type, i64>,
}

impl ComponentGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The count stored under exactly this type.
    #[must_use]
    pub fn count_exact(&self, t: &Type) -> i64 {
        self.counts.get(t).copied().unwrap_or(0)
    }

    /// Total count of all components whose type is a subtype of `t`.
    #[must_use]
    pub fn count(&self, table: &ClassTable, t: &Type) -> i64 {
        self.counts
            .iter()
            .filter(|(held, _)| table.is_subtype(held, t))
            .map(|(_, n)| n)
            .sum()
    }

    /// All present types matching `t` with their counts, ordered by their
    /// printed form so output is deterministic.
    #[must_use]
    pub fn components_matching(&self, table: &ClassTable, t: &Type) -> Vec<(Type, i64)> {
        let mut found: Vec<(Type, i64)> = self
            .counts
            .iter()
            .filter(|(held, _)| table.is_subtype(held, t))
            .map(|(held, n)| (held.clone(), *n))
            .collect();
        found.sort_by_key(|(held, _)| table.expression_of(held).to_string());
        found
    }

    /// Every present type with its count, ordered by printed form.
    #[must_use]
    pub fn all(&self, table: &ClassTable) -> Vec<(Type, i64)> {
        let mut found: Vec<(Type, i64)> = self
            .counts
            .iter()
            .map(|(held, n)| (held.clone(), *n))
            .collect();
        found.sort_by_key(|(held, _)| table.expression_of(held).to_string());
        found
    }

    /// Apply a change, or fail without touching anything.
    pub fn apply(&mut self, change: &StateChange) -> Result<(), ExecutionError> {
        if let Some(removing) = &change.removing {
            let present = self.count_exact(removing);
            if present < change.count {
                return Err(ExecutionError::Underflow {
                    requested: change.count,
                    present,
                });
            }
        }
        if let Some(removing) = &change.removing {
            let left = self.count_exact(removing) - change.count;
            if left == 0 {
                self.counts.remove(removing);
            } else {
                self.counts.insert(removing.clone(), left);
            }
        }
        if let Some(gaining) = &change.gaining {
            let now = self.count_exact(gaining) + change.count;
            self.counts.insert(gaining.clone(), now);
        }
        Ok(())
    }

    /// Total number of components, all types together.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.counts.values().sum()
    }
}
