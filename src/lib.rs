//! # ruleset-engine
//!
//! A rules engine for card and board games whose rules are *data*: game
//! content declares classes of components, and instruction text attached to
//! them drives every change to the game state.
//!
//! ## Design Principles
//!
//! 1. **Declarative content**: games are class declarations plus instruction
//!    text; the engine supplies the semantics.
//!
//! 2. **Types all the way down**: every component is an instance of a
//!    canonical `Type` resolved against a frozen class table; subtyping and
//!    greatest-lower-bound drive specialization and narrowing alike.
//!
//! 3. **The log is the state**: every mutation appends exactly one event, and
//!    rollback replays inverses, so any failed operation leaves no trace.
//!
//! ## Modules
//!
//! - `ast`: syntax-tree nodes and the textual parser
//! - `types`: class table, dependencies, canonical types, the lattice
//! - `state`: component graph, change records, event log
//! - `tasks`: pending-work queue
//! - `exec`: instruction preparation/execution, narrowing, customs
//! - `engine`: the `Game` façade with checkpoint/rollback
//! - `error`: the error taxonomy

pub mod ast;
pub mod engine;
pub mod error;
pub mod exec;
pub mod state;
pub mod tasks;
pub mod types;

// Re-export commonly used types
pub use crate::ast::{
    ClassDeclaration, ClassName, Effect, Expression, Instruction, Intensity, Metric, Requirement,
    ScaledExpression, Trigger,
};
pub use crate::engine::{Game, GameReader, GameWriter, PlayerWriter};
pub use crate::error::{EngineError, ExecutionError, ResolutionError, StructuralError, SyntaxError};
pub use crate::exec::{CustomInstruction, CustomRegistry, Executor, Transformers, Translation};
pub use crate::state::{Cause, Checkpoint, ComponentGraph, EventLog, GameEvent, StateChange};
pub use crate::tasks::{Player, Task, TaskId, TaskQueue};
pub use crate::types::{
    Class, ClassId, ClassTable, ClassTableBuilder, DepKey, DepTarget, DependencyMap, Type,
};
