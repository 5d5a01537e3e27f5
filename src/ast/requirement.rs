//! Requirements: boolean questions about the game state.

use serde::{Deserialize, Serialize};

use super::expression::ScaledExpression;
use super::name::ClassName;

/// A condition that is deterministically true or false in any game state,
/// for example `MAX 4 OxygenStep`.
///
/// Evaluation is a pure function of the component graph's current counts;
/// it never mutates state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Requirement {
    /// At least this many: `2 Plant`.
    Min(ScaledExpression),
    /// At most this many: `MAX 0 Tile`.
    Max(ScaledExpression),
    /// Exactly this many: `=1 ActionPhase`.
    Exact(ScaledExpression),
    /// Any of these holds.
    Or(Vec<Requirement>),
    /// All of these hold.
    And(Vec<Requirement>),
}

impl Requirement {
    /// Collapse a list into a single requirement; two or more become `And`.
    ///
    /// Returns `None` for an empty list.
    #[must_use]
    pub fn and(mut requirements: Vec<Requirement>) -> Option<Requirement> {
        match requirements.len() {
            0 => None,
            1 => requirements.pop(),
            _ => Some(Requirement::And(requirements)),
        }
    }

    /// Join two optional requirements; both present become `And`.
    #[must_use]
    pub fn join(a: Option<Requirement>, b: Option<Requirement>) -> Option<Requirement> {
        match (a, b) {
            (None, x) | (x, None) => x,
            (Some(a), Some(b)) if a == b => Some(a),
            (Some(a), Some(b)) => Some(Requirement::And(vec![a, b])),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Requirement::And(_) => 1,
            Requirement::Or(_) => 3,
            _ => 10,
        }
    }

    /// Every class name mentioned anywhere in this requirement.
    pub fn collect_class_names<'a>(&'a self, out: &mut Vec<&'a ClassName>) {
        match self {
            Requirement::Min(s) | Requirement::Max(s) | Requirement::Exact(s) => {
                s.expression.collect_class_names(out);
            }
            Requirement::Or(parts) | Requirement::And(parts) => {
                for part in parts {
                    part.collect_class_names(out);
                }
            }
        }
    }

    fn fmt_part(&self, part: &Requirement, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if part.precedence() < self.precedence() {
            write!(f, "({part})")
        } else {
            write!(f, "{part}")
        }
    }
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // A bare minimum elides "1"; MAX and = always show the scalar,
            // since "MAX Heat" would read as a different statement.
            Requirement::Min(s) => write!(f, "{s}"),
            Requirement::Max(s) => write!(f, "MAX {}", s.to_full_string()),
            Requirement::Exact(s) => write!(f, "={}", s.to_full_string()),
            Requirement::Or(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    self.fmt_part(part, f)?;
                }
                Ok(())
            }
            Requirement::And(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.fmt_part(part, f)?;
                }
                Ok(())
            }
        }
    }
}
