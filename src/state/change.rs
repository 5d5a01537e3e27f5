//! State changes, causes, and the append-only event log.
//!
//! The log is the authority on history: rollback is defined as reverse-
//! replaying the inverse of every event after a checkpoint, so anything that
//! mutates the component graph or the task queue must be recorded here.

use im::Vector;
use serde::{Deserialize, Serialize};

use crate::ast::Expression;
use crate::error::ExecutionError;
use crate::tasks::{Player, Task};
use crate::types::Type;

/// Why a change happened: the component whose effect produced it, and the
/// ordinal of the log event that triggered that effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cause {
    pub context: Expression,
    pub trigger_event: Option<usize>,
}

/// One concrete mutation of the component graph.
///
/// Holds fully resolved types so rollback never re-resolves anything. At
/// least one side is present, the two sides differ, and the count is
/// positive; a transmute has both sides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub count: i64,
    pub gaining: Option<Type>,
    pub removing: Option<Type>,
}

impl StateChange {
    pub fn new(
        count: i64,
        gaining: Option<Type>,
        removing: Option<Type>,
    ) -> Result<Self, ExecutionError> {
        if count <= 0 {
            return Err(ExecutionError::InvalidChange(format!(
                "change count must be positive, got {count}"
            )));
        }
        if gaining.is_none() && removing.is_none() {
            return Err(ExecutionError::InvalidChange(
                "a change must gain or remove something".into(),
            ));
        }
        if gaining.is_some() && gaining == removing {
            return Err(ExecutionError::InvalidChange(
                "a change cannot gain and remove the same type".into(),
            ));
        }
        Ok(Self {
            count,
            gaining,
            removing,
        })
    }

    /// The change that exactly undoes this one.
    #[must_use]
    pub fn inverse(&self) -> StateChange {
        StateChange {
            count: self.count,
            gaining: self.removing.clone(),
            removing: self.gaining.clone(),
        }
    }
}

/// One entry in the event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// The component graph changed.
    Change {
        change: StateChange,
        owner: Player,
        cause: Option<Cause>,
    },
    /// A task entered the queue.
    TaskAdded(Task),
    /// A task left the queue, whether completed or withdrawn.
    TaskRemoved(Task),
    /// A task's instruction was revised in place.
    TaskEdited { before: Task, after: Task },
}

/// A position in the log that can be rolled back to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Checkpoint(usize);

impl Checkpoint {
    #[must_use]
    pub fn ordinal(self) -> usize {
        self.0
    }
}

/// Append-only history of everything that happened.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vector<GameEvent>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append an event and return its ordinal.
    pub fn push(&mut self, event: GameEvent) -> usize {
        self.events.push_back(event);
        self.events.len() - 1
    }

    #[must_use]
    pub fn get(&self, ordinal: usize) -> Option<&GameEvent> {
        self.events.get(ordinal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }

    /// The current position, for a later rollback.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.events.len())
    }

    /// Events at or after the checkpoint, oldest first.
    pub fn events_since(&self, checkpoint: Checkpoint) -> impl Iterator<Item = &GameEvent> {
        self.events.iter().skip(checkpoint.0)
    }

    /// Forget everything at or after the checkpoint.
    pub fn truncate(&mut self, checkpoint: Checkpoint) {
        self.events = self.events.take(checkpoint.0);
    }
}
