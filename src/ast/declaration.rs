//! Class declarations: the static source material the class table is built from.

use serde::{Deserialize, Serialize};

use super::expression::Expression;
use super::instruction::{Instruction, Intensity};
use super::name::ClassName;

/// When an effect fires.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// A component of the given type was gained.
    OnGain(Expression),
    /// A component of the given type was removed.
    OnRemove(Expression),
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::OnGain(expr) => write!(f, "{expr}"),
            Trigger::OnRemove(expr) => write!(f, "-{expr}"),
        }
    }
}

/// One effect line on a class: a trigger and the instruction it queues.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Effect {
    pub trigger: Trigger,
    /// `::` effects execute immediately; `:` effects queue a task.
    pub automatic: bool,
    pub instruction: Instruction,
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sep = if self.automatic { "::" } else { ":" };
        write!(f, "{}{} {}", self.trigger, sep, self.instruction)
    }
}

/// The declared form of a single class, before table loading.
///
/// Declarations carry only what was written: the resolver and table builder
/// compute everything derived (full supertype sets, inherited dependencies,
/// intersection status).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDeclaration {
    pub name: ClassName,
    pub is_abstract: bool,
    /// Declared dependency targets, in declaration order. `Owned<Player>`
    /// declares one dependency whose bound is `Player`.
    pub dependencies: Vec<Expression>,
    /// Declared direct supertypes. Empty means `Component` (except for
    /// `Component` itself).
    pub supertypes: Vec<Expression>,
    pub effects: Vec<Effect>,
    /// Default intensity when a bare gain of this class omits one.
    pub default_gain_intensity: Option<Intensity>,
    /// Default intensity when a bare removal of this class omits one.
    pub default_remove_intensity: Option<Intensity>,
    /// Specializations applied to a bare gain of this class, like
    /// `GrossHazard` defaulting its area to `WaterArea`.
    pub default_specializations: Vec<Expression>,
}

impl ClassDeclaration {
    #[must_use]
    pub fn new(name: impl Into<ClassName>) -> Self {
        Self {
            name: name.into(),
            is_abstract: false,
            dependencies: Vec::new(),
            supertypes: Vec::new(),
            effects: Vec::new(),
            default_gain_intensity: None,
            default_remove_intensity: None,
            default_specializations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    #[must_use]
    pub fn with_supertype(mut self, supertype: Expression) -> Self {
        self.supertypes.push(supertype);
        self
    }

    #[must_use]
    pub fn with_dependency(mut self, bound: Expression) -> Self {
        self.dependencies.push(bound);
        self
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_default_gain_intensity(mut self, intensity: Intensity) -> Self {
        self.default_gain_intensity = Some(intensity);
        self
    }

    #[must_use]
    pub fn with_default_remove_intensity(mut self, intensity: Intensity) -> Self {
        self.default_remove_intensity = Some(intensity);
        self
    }

    #[must_use]
    pub fn with_default_specialization(mut self, specialization: Expression) -> Self {
        self.default_specializations.push(specialization);
        self
    }
}
