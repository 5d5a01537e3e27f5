//! Externally supplied instruction implementations.
//!
//! Rules text can say `@name(args)` for behavior the rules language cannot
//! express. The engine only dispatches; the implementations are registered by
//! the embedding application.

use rustc_hash::FxHashMap;

use crate::engine::{GameReader, GameWriter};
use crate::error::ExecutionError;
use crate::types::Type;

/// How a custom instruction wants to run.
pub enum Translation {
    /// Replace the call with ordinary rules-language text, which is then
    /// prepared and executed like anything else. Preferred: the replacement
    /// is logged and rolled back like native instructions.
    Replace(crate::ast::Instruction),
    /// The implementation will mutate state itself through the writer handle.
    ExecuteDirect,
}

/// One `@name(...)` implementation.
pub trait CustomInstruction {
    /// The lowercase name this implementation answers to.
    fn name(&self) -> &str;

    /// Decide what the call does, given resolved arguments and read access
    /// to the current state.
    fn translate(
        &self,
        reader: &dyn GameReader,
        args: &[Type],
    ) -> Result<Translation, ExecutionError>;

    /// Perform the mutation directly. Only called when `translate` returned
    /// [`Translation::ExecuteDirect`].
    fn apply(&self, writer: &mut dyn GameWriter, args: &[Type]) -> Result<(), ExecutionError> {
        let _ = (writer, args);
        Err(ExecutionError::InvalidChange(format!(
            "custom instruction `{}` does not execute directly",
            self.name()
        )))
    }
}

/// Name-keyed registry of custom instruction implementations.
#[derive(Default)]
pub struct CustomRegistry {
    by_name: FxHashMap<String, Box<dyn CustomInstruction>>,
}

impl CustomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation under its own name, replacing any previous
    /// one with that name.
    pub fn register(&mut self, custom: Box<dyn CustomInstruction>) {
        self.by_name.insert(custom.name().to_owned(), custom);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn CustomInstruction> {
        self.by_name.get(name).map(Box::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
