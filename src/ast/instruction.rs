//! Instructions: what should happen to the game state.

use serde::{Deserialize, Serialize};

use super::expression::{Expression, ScaledExpression};
use super::metric::Metric;
use super::name::ClassName;
use super::requirement::Requirement;

/// How firmly a change must happen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intensity {
    /// `!`: the full amount must happen, or the instruction fails.
    Mandatory,
    /// `.`: do as much of the amount as possible; never fails.
    Amap,
    /// `?`: the player chooses how much to do, including none of it.
    Optional,
}

impl Intensity {
    /// The suffix symbol for this intensity.
    #[must_use]
    pub fn symbol(self) -> char {
        match self {
            Intensity::Mandatory => '!',
            Intensity::Amap => '.',
            Intensity::Optional => '?',
        }
    }

    /// Parse a suffix symbol.
    #[must_use]
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '!' => Some(Intensity::Mandatory),
            '.' => Some(Intensity::Amap),
            '?' => Some(Intensity::Optional),
            _ => None,
        }
    }
}

/// One instruction from the rules language.
///
/// An instruction may be *abstract* (an un-chosen `Or`, an `Optional` change,
/// an abstract type reference); abstract instructions sit in the task queue
/// until narrowed to concrete form. The `exec` module gives these nodes their
/// live semantics.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    /// The no-op sentinel, written `Ok`. Narrowing an optional task to this
    /// withdraws the task.
    NoOp,

    /// Gain N of a type: `2 Plant?`.
    Gain {
        scaled: ScaledExpression,
        intensity: Option<Intensity>,
    },

    /// Remove N of a type: `-2 Plant!`.
    Remove {
        scaled: ScaledExpression,
        intensity: Option<Intensity>,
    },

    /// Remove N of one type and gain N of another in one step:
    /// `2 Heat FROM Energy`.
    Transmute {
        count: i64,
        gaining: Expression,
        removing: Expression,
        intensity: Option<Intensity>,
    },

    /// Scale the inner change by a metric read at execution time:
    /// `Plant / 2 Heat`.
    Per {
        inner: Box<Instruction>,
        metric: Metric,
    },

    /// Execute the inner instruction only if the gate holds:
    /// `2 Heat: Plant!`. A mandatory gate fails when unmet; a non-mandatory
    /// one (`?:`) quietly becomes a no-op.
    Gated {
        gate: Requirement,
        mandatory: bool,
        inner: Box<Instruction>,
    },

    /// Dispatch to an externally registered implementation:
    /// `@gainLowestProduction(Player1)`.
    Custom {
        name: String,
        arguments: Vec<Expression>,
    },

    /// Exactly one branch must be chosen (by narrowing) before execution.
    Or(Vec<Instruction>),

    /// Parts happen strictly in order; the tail is deferred as a follow-up
    /// task so other effects can interleave.
    Then(Vec<Instruction>),

    /// Independent parts, split into sibling tasks at enqueue time.
    Multi(Vec<Instruction>),

    /// A bracketed rewrite scope like `PROD[-2 Plant]`, eliminated by a
    /// normalization pass before anything is enqueued or executed.
    Transform {
        kind: String,
        inner: Box<Instruction>,
    },
}

impl Instruction {
    /// Collapse a list into one instruction; two or more become `Multi`.
    #[must_use]
    pub fn multi(parts: Vec<Instruction>) -> Instruction {
        Self::combine(parts, Instruction::Multi)
    }

    /// Collapse a list into one instruction; two or more become `Then`.
    #[must_use]
    pub fn then(parts: Vec<Instruction>) -> Instruction {
        Self::combine(parts, Instruction::Then)
    }

    /// Collapse a list into one instruction; two or more become `Or`.
    #[must_use]
    pub fn or(parts: Vec<Instruction>) -> Instruction {
        Self::combine(parts, Instruction::Or)
    }

    fn combine(mut parts: Vec<Instruction>, wrap: fn(Vec<Instruction>) -> Instruction) -> Instruction {
        match parts.len() {
            0 => Instruction::NoOp,
            1 => parts.pop().unwrap_or(Instruction::NoOp),
            _ => wrap(parts),
        }
    }

    /// Flatten `Multi` nesting into a list of standalone instructions.
    #[must_use]
    pub fn split(self) -> Vec<Instruction> {
        match self {
            Instruction::Multi(parts) => parts.into_iter().flat_map(Instruction::split).collect(),
            other => vec![other],
        }
    }

    /// Multiply the instruction's counts by a non-negative factor.
    ///
    /// A factor of zero yields the no-op sentinel.
    #[must_use]
    pub fn times(&self, factor: i64) -> Instruction {
        assert!(factor >= 0, "cannot scale by a negative factor");
        if factor == 0 {
            return Instruction::NoOp;
        }
        match self {
            Instruction::NoOp => Instruction::NoOp,
            Instruction::Gain { scaled, intensity } => Instruction::Gain {
                scaled: ScaledExpression::new(scaled.scalar * factor, scaled.expression.clone()),
                intensity: *intensity,
            },
            Instruction::Remove { scaled, intensity } => Instruction::Remove {
                scaled: ScaledExpression::new(scaled.scalar * factor, scaled.expression.clone()),
                intensity: *intensity,
            },
            Instruction::Transmute {
                count,
                gaining,
                removing,
                intensity,
            } => Instruction::Transmute {
                count: count * factor,
                gaining: gaining.clone(),
                removing: removing.clone(),
                intensity: *intensity,
            },
            Instruction::Per { inner, metric } => Instruction::Per {
                inner: Box::new(inner.times(factor)),
                metric: metric.clone(),
            },
            Instruction::Gated {
                gate,
                mandatory,
                inner,
            } => Instruction::Gated {
                gate: gate.clone(),
                mandatory: *mandatory,
                inner: Box::new(inner.times(factor)),
            },
            Instruction::Custom { .. } => {
                Instruction::multi(std::iter::repeat(self.clone()).take(factor as usize).collect())
            }
            Instruction::Or(parts) => {
                Instruction::Or(parts.iter().map(|p| p.times(factor)).collect())
            }
            Instruction::Then(parts) => {
                Instruction::Then(parts.iter().map(|p| p.times(factor)).collect())
            }
            Instruction::Multi(parts) => {
                Instruction::Multi(parts.iter().map(|p| p.times(factor)).collect())
            }
            Instruction::Transform { kind, inner } => Instruction::Transform {
                kind: kind.clone(),
                inner: Box::new(inner.times(factor)),
            },
        }
    }

    /// True if any `Transform` bracket remains anywhere in the tree.
    #[must_use]
    pub fn has_transform(&self) -> bool {
        match self {
            Instruction::Transform { .. } => true,
            Instruction::Per { inner, .. } | Instruction::Gated { inner, .. } => {
                inner.has_transform()
            }
            Instruction::Or(parts) | Instruction::Then(parts) | Instruction::Multi(parts) => {
                parts.iter().any(Instruction::has_transform)
            }
            _ => false,
        }
    }

    /// Every class name mentioned anywhere in this instruction.
    pub fn collect_class_names<'a>(&'a self, out: &mut Vec<&'a ClassName>) {
        match self {
            Instruction::NoOp => {}
            Instruction::Gain { scaled, .. } | Instruction::Remove { scaled, .. } => {
                scaled.expression.collect_class_names(out);
            }
            Instruction::Transmute {
                gaining, removing, ..
            } => {
                gaining.collect_class_names(out);
                removing.collect_class_names(out);
            }
            Instruction::Per { inner, metric } => {
                inner.collect_class_names(out);
                metric.collect_class_names(out);
            }
            Instruction::Gated { gate, inner, .. } => {
                gate.collect_class_names(out);
                inner.collect_class_names(out);
            }
            Instruction::Custom { arguments, .. } => {
                for arg in arguments {
                    arg.collect_class_names(out);
                }
            }
            Instruction::Or(parts) | Instruction::Then(parts) | Instruction::Multi(parts) => {
                for part in parts {
                    part.collect_class_names(out);
                }
            }
            Instruction::Transform { inner, .. } => inner.collect_class_names(out),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Instruction::Multi(_) => 0,
            Instruction::Then(_) => 2,
            Instruction::Or(_) => 4,
            Instruction::Gated { .. } => 6,
            Instruction::Per { .. } => 8,
            _ => 11,
        }
    }

    fn fmt_part(&self, part: &Instruction, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if part.precedence() < self.precedence() {
            write!(f, "({part})")
        } else {
            write!(f, "{part}")
        }
    }
}

fn fmt_intensity(intensity: &Option<Intensity>, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if let Some(intensity) = intensity {
        write!(f, "{}", intensity.symbol())?;
    }
    Ok(())
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::NoOp => write!(f, "Ok"),
            Instruction::Gain { scaled, intensity } => {
                write!(f, "{scaled}")?;
                fmt_intensity(intensity, f)
            }
            Instruction::Remove { scaled, intensity } => {
                write!(f, "-{scaled}")?;
                fmt_intensity(intensity, f)
            }
            Instruction::Transmute {
                count,
                gaining,
                removing,
                intensity,
            } => {
                if *count != 1 {
                    write!(f, "{count} ")?;
                }
                write!(f, "{gaining} FROM {removing}")?;
                fmt_intensity(intensity, f)
            }
            Instruction::Per { inner, metric } => {
                self.fmt_part(inner, f)?;
                write!(f, " / {metric}")
            }
            Instruction::Gated {
                gate,
                mandatory,
                inner,
            } => {
                match gate {
                    Requirement::Or(_) | Requirement::And(_) => write!(f, "({gate})")?,
                    _ => write!(f, "{gate}")?,
                }
                write!(f, "{}", if *mandatory { ": " } else { " ?: " })?;
                self.fmt_part(inner, f)
            }
            Instruction::Custom { name, arguments } => {
                write!(f, "@{name}(")?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Instruction::Or(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    self.fmt_part(part, f)?;
                }
                Ok(())
            }
            Instruction::Then(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " THEN ")?;
                    }
                    self.fmt_part(part, f)?;
                }
                Ok(())
            }
            Instruction::Multi(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.fmt_part(part, f)?;
                }
                Ok(())
            }
            Instruction::Transform { kind, inner } => write!(f, "{kind}[{inner}]"),
        }
    }
}
