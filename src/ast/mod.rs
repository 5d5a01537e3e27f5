//! Syntax-tree nodes for the rules language.
//!
//! These are inert data: an [`Expression`] names a type, an [`Instruction`]
//! says what should happen to the game state, a [`Requirement`] is a yes/no
//! question about it, a [`Metric`] is a measurement of it. Giving these nodes
//! meaning is the job of the `types` and `exec` modules.
//!
//! Every node round-trips through its `Display` form; `parse` holds the
//! matching parser for the textual syntax.

pub mod declaration;
pub mod expression;
pub mod instruction;
pub mod metric;
pub mod name;
pub mod parse;
pub mod requirement;

pub use declaration::{ClassDeclaration, Effect, Trigger};
pub use expression::{Expression, ScaledExpression};
pub use instruction::{Instruction, Intensity};
pub use metric::Metric;
pub use name::ClassName;
pub use requirement::Requirement;
