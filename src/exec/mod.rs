//! Live instruction semantics: normalization, preparation, execution,
//! narrowing validation, and custom-instruction dispatch.

pub mod custom;
pub mod executor;
pub mod narrowing;
pub mod transform;

pub use custom::{CustomInstruction, CustomRegistry, Translation};
pub use executor::Executor;
pub use transform::{apply_defaults, Transformers};
