//! Live instruction semantics: prepare, then execute.
//!
//! `prepare` folds current state into an instruction without mutating
//! anything: metrics are read, gates evaluated, as-much-as-possible amounts
//! clamped, non-viable OR branches dropped. `execute` prepares and then
//! performs the result, appending to the log as it goes. Abstract remainders
//! (an un-chosen OR, an optional change) fail execution; they belong in the
//! task queue until narrowed.

use crate::ast::{Instruction, Intensity, ScaledExpression};
use crate::engine::{Game, PlayerWriter};
use crate::error::ExecutionError;
use crate::state::{Cause, StateChange};
use crate::tasks::Player;
use crate::types::Type;

use super::custom::Translation;

pub struct Executor;

impl Executor {
    /// Fold current state into `instruction` without mutating anything.
    pub fn prepare(game: &Game, instruction: &Instruction) -> Result<Instruction, ExecutionError> {
        match instruction {
            Instruction::NoOp => Ok(Instruction::NoOp),

            Instruction::Gain { scaled, intensity } => {
                Self::prepare_change(game, scaled, *intensity, false, instruction)
            }
            Instruction::Remove { scaled, intensity } => {
                Self::prepare_change(game, scaled, *intensity, true, instruction)
            }

            Instruction::Transmute {
                count,
                gaining,
                removing,
                intensity,
            } => {
                if *count == 0 {
                    return Ok(Instruction::NoOp);
                }
                let from = game.resolve(removing)?;
                Self::require_concrete(game, &from, removing)?;
                let to = game.resolve(gaining)?;
                Self::require_concrete(game, &to, gaining)?;
                let possible = game.graph().count_exact(&from);
                let count = match intensity.unwrap_or(Intensity::Mandatory) {
                    Intensity::Optional => {
                        return Err(ExecutionError::AbstractInstruction(instruction.clone()))
                    }
                    Intensity::Mandatory => {
                        if possible < *count {
                            return Err(ExecutionError::Limits {
                                action: format!("transmute from {removing}"),
                                requested: *count,
                                possible,
                            });
                        }
                        *count
                    }
                    Intensity::Amap => count.min(&possible).to_owned(),
                };
                if count == 0 {
                    return Ok(Instruction::NoOp);
                }
                Ok(Instruction::Transmute {
                    count,
                    gaining: gaining.clone(),
                    removing: removing.clone(),
                    intensity: Some(Intensity::Mandatory),
                })
            }

            Instruction::Per { inner, metric } => {
                let value = game.count_metric(metric)?;
                if value == 0 {
                    return Ok(Instruction::NoOp);
                }
                Self::prepare(game, &inner.times(value))
            }

            Instruction::Gated {
                gate,
                mandatory,
                inner,
            } => {
                if game.has(gate)? {
                    Self::prepare(game, inner)
                } else if *mandatory {
                    Err(ExecutionError::RequirementNotMet(gate.clone()))
                } else {
                    Ok(Instruction::NoOp)
                }
            }

            Instruction::Or(arms) => {
                // Keep every arm that could still happen or be chosen; drop
                // arms that current state has already made impossible.
                let mut viable = Vec::new();
                let mut first_error = None;
                for arm in arms {
                    match Self::prepare(game, arm) {
                        Ok(prepared) => viable.push(prepared),
                        Err(
                            ExecutionError::AbstractInstruction(_)
                            | ExecutionError::AbstractType(_)
                            | ExecutionError::UnresolvedChoice(_),
                        ) => viable.push(arm.clone()),
                        Err(e) => {
                            if first_error.is_none() {
                                first_error = Some(e);
                            }
                        }
                    }
                }
                match (viable.len(), first_error) {
                    (0, Some(e)) => Err(e),
                    (0, None) => Err(ExecutionError::UnresolvedChoice(instruction.clone())),
                    _ => Ok(Instruction::or(viable)),
                }
            }

            Instruction::Then(parts) => {
                let mut parts = parts.clone();
                if let Some(head) = parts.first_mut() {
                    *head = Self::prepare(game, head)?;
                }
                Ok(Instruction::then(parts))
            }

            // Parts stay independent; each is prepared at its own execution.
            Instruction::Multi(_) | Instruction::Custom { .. } => Ok(instruction.clone()),

            Instruction::Transform { kind, .. } => {
                Err(ExecutionError::UnknownTransform(kind.clone()))
            }
        }
    }

    fn prepare_change(
        game: &Game,
        scaled: &ScaledExpression,
        intensity: Option<Intensity>,
        removal: bool,
        original: &Instruction,
    ) -> Result<Instruction, ExecutionError> {
        if scaled.scalar == 0 {
            return Ok(Instruction::NoOp);
        }
        let t = game.resolve(&scaled.expression)?;
        Self::require_concrete(game, &t, &scaled.expression)?;
        let count = match intensity.unwrap_or(Intensity::Mandatory) {
            Intensity::Optional => {
                return Err(ExecutionError::AbstractInstruction(original.clone()))
            }
            Intensity::Mandatory => {
                if removal {
                    let possible = game.graph().count_exact(&t);
                    if possible < scaled.scalar {
                        return Err(ExecutionError::Limits {
                            action: format!("remove {}", scaled.expression),
                            requested: scaled.scalar,
                            possible,
                        });
                    }
                }
                scaled.scalar
            }
            Intensity::Amap => {
                if removal {
                    scaled.scalar.min(game.graph().count_exact(&t))
                } else {
                    scaled.scalar
                }
            }
        };
        if count == 0 {
            return Ok(Instruction::NoOp);
        }
        let scaled = ScaledExpression::new(count, scaled.expression.clone());
        let intensity = Some(Intensity::Mandatory);
        Ok(if removal {
            Instruction::Remove { scaled, intensity }
        } else {
            Instruction::Gain { scaled, intensity }
        })
    }

    /// Only a settled, mandatory change may mutate state.
    fn require_settled(
        intensity: Option<Intensity>,
        instruction: &Instruction,
    ) -> Result<(), ExecutionError> {
        if intensity == Some(Intensity::Mandatory) {
            Ok(())
        } else {
            Err(ExecutionError::AbstractInstruction(instruction.clone()))
        }
    }

    fn require_concrete(
        game: &Game,
        t: &Type,
        expr: &crate::ast::Expression,
    ) -> Result<(), ExecutionError> {
        if game.table().is_abstract(t) {
            Err(ExecutionError::AbstractType(expr.clone()))
        } else {
            Ok(())
        }
    }

    /// Prepare and perform an instruction.
    ///
    /// Completed parts of a `Multi` stay done even when a later part fails;
    /// callers wanting all-or-nothing wrap the call in [`Game::atomic`].
    pub fn execute(
        game: &mut Game,
        instruction: &Instruction,
        owner: &Player,
        cause: Option<&Cause>,
    ) -> Result<(), ExecutionError> {
        let prepared = Self::prepare(game, instruction)?;
        Self::perform(game, &prepared, owner, cause)
    }

    fn perform(
        game: &mut Game,
        prepared: &Instruction,
        owner: &Player,
        cause: Option<&Cause>,
    ) -> Result<(), ExecutionError> {
        // A change arrives here unprepared when an OR collapses to its one
        // viable arm, so settledness and concreteness are checked again.
        match prepared {
            Instruction::NoOp => Ok(()),

            Instruction::Gain { scaled, intensity } => {
                Self::require_settled(*intensity, prepared)?;
                let t = game.resolve(&scaled.expression)?;
                Self::require_concrete(game, &t, &scaled.expression)?;
                let change = StateChange::new(scaled.scalar, Some(t), None)?;
                game.record_change(change, owner, cause)?;
                Ok(())
            }

            Instruction::Remove { scaled, intensity } => {
                Self::require_settled(*intensity, prepared)?;
                let t = game.resolve(&scaled.expression)?;
                Self::require_concrete(game, &t, &scaled.expression)?;
                let change = StateChange::new(scaled.scalar, None, Some(t))?;
                game.record_change(change, owner, cause)?;
                Ok(())
            }

            Instruction::Transmute {
                count,
                gaining,
                removing,
                intensity,
            } => {
                Self::require_settled(*intensity, prepared)?;
                let to = game.resolve(gaining)?;
                Self::require_concrete(game, &to, gaining)?;
                let from = game.resolve(removing)?;
                Self::require_concrete(game, &from, removing)?;
                let change = StateChange::new(*count, Some(to), Some(from))?;
                game.record_change(change, owner, cause)?;
                Ok(())
            }

            // Preparation can leave these only when invoked directly.
            Instruction::Per { .. } | Instruction::Gated { .. } => {
                Self::execute(game, prepared, owner, cause)
            }

            Instruction::Or(_) => Err(ExecutionError::UnresolvedChoice(prepared.clone())),

            Instruction::Then(parts) => {
                let Some((head, tail)) = parts.split_first() else {
                    return Ok(());
                };
                Self::perform(game, head, owner, cause)?;
                if !tail.is_empty() {
                    game.enqueue(&Instruction::then(tail.to_vec()), owner.clone(), cause.cloned())?;
                }
                Ok(())
            }

            Instruction::Multi(parts) => {
                let mut first_error = None;
                for part in parts {
                    if let Err(e) = Self::execute(game, part, owner, cause) {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
                first_error.map_or(Ok(()), Err)
            }

            Instruction::Custom { name, arguments } => {
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    let t = game.resolve(argument)?;
                    if game.table().is_abstract(&t) {
                        return Err(ExecutionError::AbstractInstruction(prepared.clone()));
                    }
                    args.push(t);
                }
                let registry = game.customs();
                let custom = registry
                    .get(name)
                    .ok_or_else(|| ExecutionError::UnknownCustom(name.clone()))?;
                match custom.translate(&*game, &args)? {
                    Translation::Replace(replacement) => {
                        Self::execute(game, &replacement, owner, cause)
                    }
                    Translation::ExecuteDirect => {
                        let mut writer = PlayerWriter::new(game, owner.clone(), cause.cloned());
                        custom.apply(&mut writer, &args)
                    }
                }
            }

            Instruction::Transform { kind, .. } => {
                Err(ExecutionError::UnknownTransform(kind.clone()))
            }
        }
    }
}
