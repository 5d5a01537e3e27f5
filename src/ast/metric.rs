//! Metrics: non-negative measurements of the game state.

use serde::{Deserialize, Deserializer, Serialize};

use super::expression::Expression;
use super::name::ClassName;

/// A measurement: the count of some type, divided by a positive unit.
///
/// Metrics appear after the slash in a `Per` instruction; `3 Plant / 2 Heat`
/// gains three plants per two heat. The metric is re-read at execution time,
/// never at task-creation time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metric {
    /// How many counted components make one unit of the measurement.
    #[serde(deserialize_with = "positive_unit")]
    pub unit: i64,
    pub expression: Expression,
}

fn positive_unit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let unit = i64::deserialize(deserializer)?;
    if unit < 1 {
        return Err(serde::de::Error::custom("metric unit must be positive"));
    }
    Ok(unit)
}

impl Metric {
    #[must_use]
    pub fn new(unit: i64, expression: Expression) -> Self {
        assert!(unit >= 1, "metric unit must be positive");
        Self { unit, expression }
    }

    /// A plain count of one type.
    #[must_use]
    pub fn count(expression: Expression) -> Self {
        Self::new(1, expression)
    }

    /// Every class name mentioned in this metric.
    pub fn collect_class_names<'a>(&'a self, out: &mut Vec<&'a ClassName>) {
        self.expression.collect_class_names(out);
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.unit == 1 {
            write!(f, "{}", self.expression)
        } else {
            write!(f, "{} {}", self.unit, self.expression)
        }
    }
}
