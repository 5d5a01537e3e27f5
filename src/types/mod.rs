//! The type system: classes, dependencies, and the subtyping lattice.

pub mod class;
pub mod dependency;
pub mod table;
pub mod ty;

pub use class::{Class, ClassId};
pub use dependency::{DepKey, DepTarget, DependencyMap};
pub use table::{ClassTable, ClassTableBuilder};
pub use ty::Type;
