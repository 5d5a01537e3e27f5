//! Normalization passes applied before instructions are enqueued or executed.
//!
//! Two passes run, in order: transform brackets like `PROD[...]` are
//! rewritten away, then declared defaults fill in whatever the text omitted
//! (intensities, default specializations). The executor itself never sees a
//! `Transform` node or a missing intensity.

use crate::ast::{ClassName, Expression, Instruction, Metric, Requirement, ScaledExpression};
use crate::ast::Intensity;
use crate::error::{ExecutionError, ResolutionError};
use crate::types::{ClassId, ClassTable};

/// Configured rewrites for transform brackets.
#[derive(Clone, Debug, Default)]
pub struct Transformers {
    prod: Option<ProdTransform>,
}

#[derive(Clone, Debug)]
struct ProdTransform {
    kind: String,
    production: ClassName,
    producible: ClassName,
}

impl Transformers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite `kind[...]` brackets by wrapping each leaf expression whose
    /// class is a subclass of `producible` into
    /// `production<args..., Class<Leaf>>`.
    #[must_use]
    pub fn with_production(
        mut self,
        kind: impl Into<String>,
        production: ClassName,
        producible: ClassName,
    ) -> Self {
        self.prod = Some(ProdTransform {
            kind: kind.into(),
            production,
            producible,
        });
        self
    }

    /// Eliminate every transform bracket in the instruction.
    pub fn apply(
        &self,
        table: &ClassTable,
        instruction: &Instruction,
    ) -> Result<Instruction, ExecutionError> {
        if !instruction.has_transform() {
            return Ok(instruction.clone());
        }
        self.walk(table, instruction, None)
    }

    fn walk(
        &self,
        table: &ClassTable,
        instruction: &Instruction,
        active: Option<&ProdTransform>,
    ) -> Result<Instruction, ExecutionError> {
        Ok(match instruction {
            Instruction::Transform { kind, inner } => {
                let prod = self
                    .prod
                    .as_ref()
                    .filter(|p| p.kind == *kind)
                    .ok_or_else(|| ExecutionError::UnknownTransform(kind.clone()))?;
                self.walk(table, inner, Some(prod))?
            }
            Instruction::NoOp => Instruction::NoOp,
            Instruction::Gain { scaled, intensity } => Instruction::Gain {
                scaled: self.rewrite_scaled(table, scaled, active)?,
                intensity: *intensity,
            },
            Instruction::Remove { scaled, intensity } => Instruction::Remove {
                scaled: self.rewrite_scaled(table, scaled, active)?,
                intensity: *intensity,
            },
            Instruction::Transmute {
                count,
                gaining,
                removing,
                intensity,
            } => Instruction::Transmute {
                count: *count,
                gaining: self.rewrite_expression(table, gaining, active)?,
                removing: self.rewrite_expression(table, removing, active)?,
                intensity: *intensity,
            },
            Instruction::Per { inner, metric } => Instruction::Per {
                inner: Box::new(self.walk(table, inner, active)?),
                metric: Metric::new(
                    metric.unit,
                    self.rewrite_expression(table, &metric.expression, active)?,
                ),
            },
            Instruction::Gated {
                gate,
                mandatory,
                inner,
            } => Instruction::Gated {
                gate: self.rewrite_requirement(table, gate, active)?,
                mandatory: *mandatory,
                inner: Box::new(self.walk(table, inner, active)?),
            },
            Instruction::Custom { name, arguments } => Instruction::Custom {
                name: name.clone(),
                arguments: arguments
                    .iter()
                    .map(|a| self.rewrite_expression(table, a, active))
                    .collect::<Result<_, _>>()?,
            },
            Instruction::Or(parts) => Instruction::Or(
                parts
                    .iter()
                    .map(|p| self.walk(table, p, active))
                    .collect::<Result<_, _>>()?,
            ),
            Instruction::Then(parts) => Instruction::Then(
                parts
                    .iter()
                    .map(|p| self.walk(table, p, active))
                    .collect::<Result<_, _>>()?,
            ),
            Instruction::Multi(parts) => Instruction::Multi(
                parts
                    .iter()
                    .map(|p| self.walk(table, p, active))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn rewrite_scaled(
        &self,
        table: &ClassTable,
        scaled: &ScaledExpression,
        active: Option<&ProdTransform>,
    ) -> Result<ScaledExpression, ExecutionError> {
        Ok(ScaledExpression::new(
            scaled.scalar,
            self.rewrite_expression(table, &scaled.expression, active)?,
        ))
    }

    fn rewrite_requirement(
        &self,
        table: &ClassTable,
        requirement: &Requirement,
        active: Option<&ProdTransform>,
    ) -> Result<Requirement, ExecutionError> {
        Ok(match requirement {
            Requirement::Min(s) => Requirement::Min(self.rewrite_scaled(table, s, active)?),
            Requirement::Max(s) => Requirement::Max(self.rewrite_scaled(table, s, active)?),
            Requirement::Exact(s) => Requirement::Exact(self.rewrite_scaled(table, s, active)?),
            Requirement::Or(parts) => Requirement::Or(
                parts
                    .iter()
                    .map(|p| self.rewrite_requirement(table, p, active))
                    .collect::<Result<_, _>>()?,
            ),
            Requirement::And(parts) => Requirement::And(
                parts
                    .iter()
                    .map(|p| self.rewrite_requirement(table, p, active))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn rewrite_expression(
        &self,
        table: &ClassTable,
        expression: &Expression,
        active: Option<&ProdTransform>,
    ) -> Result<Expression, ExecutionError> {
        let Some(prod) = active else {
            return Ok(expression.clone());
        };
        let class = table.class_id(&expression.class_name)?;
        let producible = table.class_id(&prod.producible)?;
        if table.is_subclass(class, producible) {
            let mut arguments = expression.arguments.clone();
            arguments.push(Expression::of(
                ClassName::class(),
                vec![Expression::name(expression.class_name.clone())],
            ));
            let mut wrapped = Expression::of(prod.production.clone(), arguments);
            if let Some(refinement) = &expression.refinement {
                wrapped = wrapped.has((**refinement).clone());
            }
            return Ok(wrapped);
        }
        Ok(expression.clone())
    }
}

/// Fill declared defaults into an instruction: missing intensities take the
/// class default (falling back to mandatory), and a bare gain picks up its
/// class's default specializations.
pub fn apply_defaults(
    table: &ClassTable,
    instruction: &Instruction,
) -> Result<Instruction, ResolutionError> {
    Ok(match instruction {
        Instruction::NoOp => Instruction::NoOp,
        Instruction::Gain { scaled, intensity } => {
            let class = table.class_id(&scaled.expression.class_name)?;
            Instruction::Gain {
                scaled: ScaledExpression::new(
                    scaled.scalar,
                    default_specialized(table, &scaled.expression, class),
                ),
                intensity: intensity
                    .or_else(|| table.default_gain_intensity(class))
                    .or(Some(Intensity::Mandatory)),
            }
        }
        Instruction::Remove { scaled, intensity } => {
            let class = table.class_id(&scaled.expression.class_name)?;
            Instruction::Remove {
                scaled: scaled.clone(),
                intensity: intensity
                    .or_else(|| table.default_remove_intensity(class))
                    .or(Some(Intensity::Mandatory)),
            }
        }
        Instruction::Transmute {
            count,
            gaining,
            removing,
            intensity,
        } => {
            let class = table.class_id(&gaining.class_name)?;
            Instruction::Transmute {
                count: *count,
                gaining: gaining.clone(),
                removing: removing.clone(),
                intensity: intensity
                    .or_else(|| table.default_gain_intensity(class))
                    .or(Some(Intensity::Mandatory)),
            }
        }
        Instruction::Per { inner, metric } => Instruction::Per {
            inner: Box::new(apply_defaults(table, inner)?),
            metric: metric.clone(),
        },
        Instruction::Gated {
            gate,
            mandatory,
            inner,
        } => Instruction::Gated {
            gate: gate.clone(),
            mandatory: *mandatory,
            inner: Box::new(apply_defaults(table, inner)?),
        },
        Instruction::Custom { .. } => instruction.clone(),
        Instruction::Or(parts) => Instruction::Or(
            parts
                .iter()
                .map(|p| apply_defaults(table, p))
                .collect::<Result<_, _>>()?,
        ),
        Instruction::Then(parts) => Instruction::Then(
            parts
                .iter()
                .map(|p| apply_defaults(table, p))
                .collect::<Result<_, _>>()?,
        ),
        Instruction::Multi(parts) => Instruction::Multi(
            parts
                .iter()
                .map(|p| apply_defaults(table, p))
                .collect::<Result<_, _>>()?,
        ),
        Instruction::Transform { kind, inner } => Instruction::Transform {
            kind: kind.clone(),
            inner: Box::new(apply_defaults(table, inner)?),
        },
    })
}

fn default_specialized(table: &ClassTable, expression: &Expression, class: ClassId) -> Expression {
    if !expression.is_simple() {
        return expression.clone();
    }
    let specs = table.default_specializations(class);
    if specs.is_empty() {
        expression.clone()
    } else {
        Expression::of(expression.class_name.clone(), specs)
    }
}
