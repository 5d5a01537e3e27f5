//! Frozen classes and their numeric handles.

use serde::{Deserialize, Serialize};

use crate::ast::{ClassName, Effect, Expression, Intensity};

use super::dependency::DependencyMap;

/// Compact handle to a class in a frozen table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassId(u32);

impl ClassId {
    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// One class in a frozen table, with everything derived at freeze time.
#[derive(Clone, Debug)]
pub struct Class {
    pub id: ClassId,
    pub name: ClassName,
    pub is_abstract: bool,
    /// Direct declared superclasses. Empty only for the root.
    pub direct_supers: Vec<ClassId>,
    /// Inherited dependency entries first, own declared entries after.
    pub base_deps: DependencyMap,
    pub default_gain_intensity: Option<Intensity>,
    pub default_remove_intensity: Option<Intensity>,
    /// Specializations applied to a bare gain of this class.
    pub default_specializations: Vec<Expression>,
    pub effects: Vec<Effect>,
}
