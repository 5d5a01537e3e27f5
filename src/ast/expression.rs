//! Type references as written in rules text.

use serde::{Deserialize, Deserializer, Serialize};

use super::name::ClassName;
use super::requirement::Requirement;

/// A syntactic reference to a type: a class name, optional specialization
/// arguments, and an optional `(HAS ...)` refinement.
///
/// `Heat<Player2>` or `Tile<LandArea>(HAS MAX 0 Tile)` are expressions. An
/// expression means nothing on its own; the type resolver turns it into a
/// canonical `Type` against a frozen class table.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expression {
    pub class_name: ClassName,
    pub arguments: Vec<Expression>,
    pub refinement: Option<Box<Requirement>>,
}

impl Expression {
    /// A bare class name with no arguments.
    #[must_use]
    pub fn name(class_name: impl Into<ClassName>) -> Self {
        Self {
            class_name: class_name.into(),
            arguments: Vec::new(),
            refinement: None,
        }
    }

    /// A class name with specialization arguments.
    #[must_use]
    pub fn of(class_name: impl Into<ClassName>, arguments: Vec<Expression>) -> Self {
        Self {
            class_name: class_name.into(),
            arguments,
            refinement: None,
        }
    }

    /// Attach a refinement requirement.
    #[must_use]
    pub fn has(mut self, refinement: Requirement) -> Self {
        self.refinement = Some(Box::new(refinement));
        self
    }

    /// True if this is a bare class name: no arguments, no refinement.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        self.arguments.is_empty() && self.refinement.is_none()
    }

    /// Every class name mentioned anywhere in this expression.
    pub fn collect_class_names<'a>(&'a self, out: &mut Vec<&'a ClassName>) {
        out.push(&self.class_name);
        for arg in &self.arguments {
            arg.collect_class_names(out);
        }
        if let Some(refinement) = &self.refinement {
            refinement.collect_class_names(out);
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.class_name)?;
        if !self.arguments.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.arguments.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        if let Some(refinement) = &self.refinement {
            write!(f, "(HAS {refinement})")?;
        }
        Ok(())
    }
}

/// A count applied to an expression, like `2 Plant`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScaledExpression {
    #[serde(deserialize_with = "non_negative_scalar")]
    pub scalar: i64,
    pub expression: Expression,
}

fn non_negative_scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let scalar = i64::deserialize(deserializer)?;
    if scalar < 0 {
        return Err(serde::de::Error::custom("scalar must be non-negative"));
    }
    Ok(scalar)
}

impl ScaledExpression {
    #[must_use]
    pub fn new(scalar: i64, expression: Expression) -> Self {
        assert!(scalar >= 0, "scalar must be non-negative");
        Self { scalar, expression }
    }

    /// `"1 Plant"` rather than the usual elided `"Plant"`.
    #[must_use]
    pub fn to_full_string(&self) -> String {
        format!("{} {}", self.scalar, self.expression)
    }
}

impl std::fmt::Display for ScaledExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.scalar == 1 {
            write!(f, "{}", self.expression)
        } else {
            write!(f, "{} {}", self.scalar, self.expression)
        }
    }
}
