//! Mutable game state: the component graph and the event log.

pub mod change;
pub mod graph;

pub use change::{Cause, Checkpoint, EventLog, GameEvent, StateChange};
pub use graph::ComponentGraph;
