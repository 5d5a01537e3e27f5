//! Read and write views handed to collaborators.

use crate::ast::{Expression, Metric, Requirement};
use crate::error::{ExecutionError, ResolutionError};
use crate::types::{ClassTable, Type};

/// Read-only queries over a game in progress.
///
/// Everything here is a pure function of current state; calling these in any
/// order, any number of times, changes nothing.
pub trait GameReader {
    fn table(&self) -> &ClassTable;

    /// Resolve an expression against the game's class table.
    fn resolve(&self, expr: &Expression) -> Result<Type, ResolutionError>;

    /// Total count of components whose type is a subtype of `t`.
    fn count(&self, t: &Type) -> i64;

    /// Evaluate a metric: matching count divided by the unit.
    fn count_metric(&self, metric: &Metric) -> Result<i64, ResolutionError>;

    /// Evaluate a requirement against current counts.
    fn has(&self, requirement: &Requirement) -> Result<bool, ResolutionError>;

    /// All present types matching `t`, with counts, in deterministic order.
    fn components(&self, t: &Type) -> Vec<(Type, i64)>;
}

/// Write access scoped to one owner, for custom instructions that mutate
/// state directly. Every mutation goes through the log like any other.
pub trait GameWriter: GameReader {
    fn apply_change(
        &mut self,
        count: i64,
        gaining: Option<Type>,
        removing: Option<Type>,
    ) -> Result<(), ExecutionError>;
}
