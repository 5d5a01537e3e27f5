//! Tasks and their owners.

use serde::{Deserialize, Serialize};

use crate::ast::{ClassName, Instruction};
use crate::state::change::Cause;

/// Handle to a queued task, displayed as spreadsheet-style letters:
/// `A`..`Z`, then `AA`, `AB`, and so on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(u32);

impl TaskId {
    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Parse the letter form back to an id.
    #[must_use]
    pub fn from_letters(letters: &str) -> Option<Self> {
        if letters.is_empty() {
            return None;
        }
        let mut value: u64 = 0;
        for c in letters.chars() {
            if !c.is_ascii_uppercase() {
                return None;
            }
            value = value * 26 + u64::from(c as u8 - b'A') + 1;
        }
        u32::try_from(value - 1).ok().map(Self)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut digits = Vec::new();
        let mut n = i64::from(self.0);
        loop {
            digits.push(b'A' + (n % 26) as u8);
            n = n / 26 - 1;
            if n < 0 {
                break;
            }
        }
        digits.reverse();
        f.write_str(std::str::from_utf8(&digits).map_err(|_| std::fmt::Error)?)
    }
}

/// Who a task belongs to. The engine itself owns setup work.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player(ClassName);

impl Player {
    #[must_use]
    pub fn new(name: ClassName) -> Self {
        Self(name)
    }

    #[must_use]
    pub fn number(n: u32) -> Self {
        Self(ClassName::new(format!("Player{n}")))
    }

    #[must_use]
    pub fn engine() -> Self {
        Self(ClassName::new("Engine"))
    }

    #[must_use]
    pub fn class_name(&self) -> &ClassName {
        &self.0
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of pending work: an instruction waiting to be executed, possibly
/// abstract until narrowed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub owner: Player,
    pub instruction: Instruction,
    /// Deferred tail, enqueued as a new task when this one completes.
    pub then: Option<Instruction>,
    pub cause: Option<Cause>,
    /// Why the task is sitting in the queue rather than already done.
    pub why_pending: Option<String>,
}

impl Task {
    #[must_use]
    pub fn new(id: TaskId, owner: Player, instruction: Instruction) -> Self {
        Self {
            id,
            owner,
            instruction,
            then: None,
            cause: None,
            why_pending: None,
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: [{}] {}", self.id, self.owner, self.instruction)?;
        if let Some(then) = &self.then {
            write!(f, " (THEN {then})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_display() {
        assert_eq!(TaskId::new(0).to_string(), "A");
        assert_eq!(TaskId::new(25).to_string(), "Z");
        assert_eq!(TaskId::new(26).to_string(), "AA");
        assert_eq!(TaskId::new(27).to_string(), "AB");
        assert_eq!(TaskId::new(701).to_string(), "ZZ");
        assert_eq!(TaskId::new(702).to_string(), "AAA");
    }

    #[test]
    fn test_letter_round_trip() {
        for raw in [0, 1, 25, 26, 51, 700, 702, 12345] {
            let id = TaskId::new(raw);
            assert_eq!(TaskId::from_letters(&id.to_string()), Some(id));
        }
        assert_eq!(TaskId::from_letters(""), None);
        assert_eq!(TaskId::from_letters("a"), None);
    }
}
