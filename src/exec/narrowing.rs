//! Validation of task revisions.
//!
//! A queued task may only be revised to something the current instruction
//! already permits: a choice picked from an `Or`, a concrete type substituted
//! for an abstract one, an optional amount pinned down. The rules are purely
//! shape-directed; nothing here mutates state.

use crate::ast::{Instruction, Intensity, ScaledExpression};
use crate::error::ExecutionError;
use crate::types::ClassTable;

/// Check that `proposed` is a valid narrowing of `current`.
pub fn check_narrows(
    table: &ClassTable,
    proposed: &Instruction,
    current: &Instruction,
) -> Result<(), ExecutionError> {
    if proposed == current {
        return Ok(());
    }
    match (proposed, current) {
        // Choosing from an OR: the proposal must narrow at least one branch.
        (_, Instruction::Or(arms)) => {
            if arms
                .iter()
                .any(|arm| check_narrows(table, proposed, arm).is_ok())
            {
                Ok(())
            } else {
                Err(mismatch(proposed, current))
            }
        }

        // An optional change may be reified to nothing at all.
        (
            Instruction::NoOp,
            Instruction::Gain {
                intensity: Some(Intensity::Optional),
                ..
            }
            | Instruction::Remove {
                intensity: Some(Intensity::Optional),
                ..
            }
            | Instruction::Transmute {
                intensity: Some(Intensity::Optional),
                ..
            },
        ) => Ok(()),

        (
            Instruction::Gain {
                scaled: p,
                intensity: pi,
            },
            Instruction::Gain {
                scaled: c,
                intensity: ci,
            },
        )
        | (
            Instruction::Remove {
                scaled: p,
                intensity: pi,
            },
            Instruction::Remove {
                scaled: c,
                intensity: ci,
            },
        ) => {
            check_scaled(table, p, c, *ci)?;
            check_intensity(*pi, *ci).map_err(|()| mismatch(proposed, current))
        }

        (
            Instruction::Transmute {
                count: pn,
                gaining: pg,
                removing: pr,
                intensity: pi,
            },
            Instruction::Transmute {
                count: cn,
                gaining: cg,
                removing: cr,
                intensity: ci,
            },
        ) => {
            check_expression(table, pg, cg)?;
            check_expression(table, pr, cr)?;
            check_count(*pn, *cn, *ci).map_err(|()| mismatch(proposed, current))?;
            check_intensity(*pi, *ci).map_err(|()| mismatch(proposed, current))
        }

        (
            Instruction::Per {
                inner: pi,
                metric: pm,
            },
            Instruction::Per {
                inner: ci,
                metric: cm,
            },
        ) if pm == cm => check_narrows(table, pi, ci),

        (
            Instruction::Gated {
                gate: pg,
                mandatory: pmand,
                inner: pi,
            },
            Instruction::Gated {
                gate: cg,
                mandatory: cmand,
                inner: ci,
            },
        ) if pg == cg && pmand == cmand => check_narrows(table, pi, ci),

        (
            Instruction::Custom {
                name: pn,
                arguments: pa,
            },
            Instruction::Custom {
                name: cn,
                arguments: ca,
            },
        ) if pn == cn && pa.len() == ca.len() => {
            for (p, c) in pa.iter().zip(ca) {
                check_expression(table, p, c)?;
            }
            Ok(())
        }

        (Instruction::Then(ps), Instruction::Then(cs)) | (Instruction::Multi(ps), Instruction::Multi(cs))
            if ps.len() == cs.len() =>
        {
            for (p, c) in ps.iter().zip(cs) {
                check_narrows(table, p, c)?;
            }
            Ok(())
        }

        _ => Err(mismatch(proposed, current)),
    }
}

fn mismatch(proposed: &Instruction, current: &Instruction) -> ExecutionError {
    ExecutionError::Narrowing(format!("`{proposed}` does not narrow `{current}`"))
}

fn check_scaled(
    table: &ClassTable,
    proposed: &ScaledExpression,
    current: &ScaledExpression,
    current_intensity: Option<Intensity>,
) -> Result<(), ExecutionError> {
    check_expression(table, &proposed.expression, &current.expression)?;
    check_count(proposed.scalar, current.scalar, current_intensity).map_err(|()| {
        ExecutionError::Narrowing(format!(
            "count {} does not narrow {}",
            proposed.scalar, current.scalar
        ))
    })
}

fn check_expression(
    table: &ClassTable,
    proposed: &crate::ast::Expression,
    current: &crate::ast::Expression,
) -> Result<(), ExecutionError> {
    let p = table.resolve(proposed)?;
    let c = table.resolve(current)?;
    if table.is_subtype(&p, &c) {
        Ok(())
    } else {
        Err(ExecutionError::Narrowing(format!(
            "`{proposed}` is not a subtype of `{current}`"
        )))
    }
}

/// An optional amount may shrink (including to the same value); any other
/// intensity pins the amount exactly.
fn check_count(proposed: i64, current: i64, current_intensity: Option<Intensity>) -> Result<(), ()> {
    let ok = if current_intensity == Some(Intensity::Optional) {
        proposed <= current
    } else {
        proposed == current
    };
    if ok {
        Ok(())
    } else {
        Err(())
    }
}

/// Intensity is preserved, except that OPTIONAL may harden to `!` or `.`.
fn check_intensity(proposed: Option<Intensity>, current: Option<Intensity>) -> Result<(), ()> {
    let ok = match current {
        Some(Intensity::Optional) => proposed.is_some(),
        other => proposed == other,
    };
    if ok {
        Ok(())
    } else {
        Err(())
    }
}
