//! Error taxonomy.
//!
//! Three families, matching how callers must react:
//!
//! - [`StructuralError`]: problems with the class table itself (cycles,
//!   dangling references, redeclaration, mutation after freeze). Always fatal
//!   to loading; never recovered.
//! - [`ResolutionError`]: a single type reference could not be resolved
//!   (unknown class, ambiguous intersection, no common type, invalid
//!   specialization). Fatal to that one `resolve` call only.
//! - [`ExecutionError`]: an instruction could not run or a task could not be
//!   revised. Every execution error leaves the component graph and task queue
//!   exactly as they were before the failing call.
//!
//! Nothing is retried automatically; every error surfaces to the direct
//! caller.

use thiserror::Error;

use crate::ast::{ClassName, Expression, Instruction, Requirement};
use crate::tasks::TaskId;

/// A defect in the class table: loading cannot proceed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StructuralError {
    /// Two declarations used the same class name.
    #[error("class `{0}` is already declared")]
    Redeclaration(ClassName),

    /// Resolving a class revisited a class already being resolved.
    #[error("cycle detected while resolving class `{0}`")]
    Cycle(ClassName),

    /// A supertype or dependency referenced an unregistered name.
    #[error("reference to undeclared class `{0}`")]
    DanglingReference(ClassName),

    /// `declare` was called after the table was frozen.
    #[error("class table is frozen; no further declarations are accepted")]
    FrozenTable,

    /// A declaration's body failed to resolve during freeze.
    #[error("invalid declaration of `{class}`: {source}")]
    InvalidDeclaration {
        class: ClassName,
        source: ResolutionError,
    },
}

/// A single type reference could not be turned into a canonical type.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    /// No class registered under this name.
    #[error("no class named `{0}`")]
    ClassNotFound(ClassName),

    /// Two classes are provably disjoint: their meet is empty.
    #[error("no common subtype of `{0}` and `{1}`")]
    NoCommonType(ClassName, ClassName),

    /// Two unrelated classes have more than one minimal common subclass.
    #[error("intersection of `{0}` and `{1}` is ambiguous")]
    AmbiguousIntersection(ClassName, ClassName),

    /// A specialization argument matched no unconsumed dependency slot.
    #[error("cannot match `{arg}` to any dependency of `{class}`")]
    InvalidSpecialization { arg: Expression, class: ClassName },

    /// A class type must take exactly one plain class name argument.
    #[error("a class type takes a single class name argument, got `{0}`")]
    BadClassExpression(Expression),

    /// A dependency declaration looped back into the class being resolved
    /// without an intervening concrete subclass.
    #[error("dependency of `{0}` refers back into its own resolution")]
    DependencyCycle(ClassName),
}

/// An instruction could not run, or a task revision was rejected.
///
/// The component graph and task queue are untouched by a failing call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// A mandatory change could not be satisfied by the current graph.
    #[error("cannot {action}: only {possible} of {requested} possible")]
    Limits {
        action: String,
        requested: i64,
        possible: i64,
    },

    /// A gate requirement was not met.
    #[error("requirement not met: `{0}`")]
    RequirementNotMet(Requirement),

    /// An attempted task revision is not a valid narrowing.
    #[error("not a valid narrowing: {0}")]
    Narrowing(String),

    /// Attempted to execute an OR that has not been narrowed to one branch.
    #[error("choice required in: `{0}`")]
    UnresolvedChoice(Instruction),

    /// Attempted to execute an instruction that is not fully concrete.
    #[error("instruction is abstract: `{0}`")]
    AbstractInstruction(Instruction),

    /// A state change named an abstract type.
    #[error("type is abstract: `{0}`")]
    AbstractType(Expression),

    /// A removal asked for more components than the graph holds.
    #[error("cannot remove {requested}; only {present} present")]
    Underflow { requested: i64, present: i64 },

    /// A change was structurally meaningless (zero count, same type on both
    /// sides, neither side named).
    #[error("{0}")]
    InvalidChange(String),

    /// No task with this id is queued.
    #[error("no such task: {0}")]
    UnknownTask(TaskId),

    /// No custom instruction implementation registered under this name.
    #[error("no custom instruction named `{0}`")]
    UnknownCustom(String),

    /// A transform bracket was not recognized by the normalization pass.
    #[error("unknown transform `{0}`")]
    UnknownTransform(String),

    /// A type reference inside the instruction failed to resolve.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// A piece of instruction text did not parse.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("syntax error at offset {offset}: {message}")]
pub struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

/// Umbrella error for callers that do not care which family failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}
