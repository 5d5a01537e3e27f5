//! Dependency keys, targets, and maps.

use serde::{Deserialize, Serialize};

use super::class::ClassId;
use super::ty::{self, Lookup, Type};

/// Identifies one dependency slot: the class that declared it, and the
/// position among that class's own declarations.
///
/// A subclass inherits its superclasses' slots under their original keys, so
/// `Heat`'s owner slot is still keyed by `Owned`, not by `Heat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepKey {
    pub declaring: ClassId,
    pub index: u32,
}

/// What a dependency slot currently points at.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepTarget {
    /// An ordinary type-valued slot.
    Type(Type),
    /// The metaclass's slot, which names a class rather than a type.
    Class(ClassId),
}

/// An ordered map from dependency keys to their targets.
///
/// Order is declaration order: inherited entries first, own entries after.
/// Two maps for the same class always carry the same keys in the same order,
/// only the targets differ.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyMap {
    // Targets contain types, which contain maps; the indirection through the
    // heap keeps the recursion finite.
    entries: Vec<(DepKey, DepTarget)>,
}

impl DependencyMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: DepKey) -> Option<&DepTarget> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DepKey, &DepTarget)> {
        self.entries.iter().map(|(k, t)| (*k, t))
    }

    #[must_use]
    pub fn keys(&self) -> Vec<DepKey> {
        self.entries.iter().map(|(k, _)| *k).collect()
    }

    /// Add or replace the entry under `key`. New keys go at the end.
    pub fn set(&mut self, key: DepKey, target: DepTarget) {
        for (k, t) in &mut self.entries {
            if *k == key {
                *t = target;
                return;
            }
        }
        self.entries.push((key, target));
    }

    /// Apply positional specialization arguments.
    ///
    /// Each argument consumes the first not-yet-consumed slot whose current
    /// target it narrows; the slot's target is replaced by the argument. An
    /// argument that matches no open slot fails with its position.
    pub(crate) fn specialize(
        &self,
        lookup: &dyn Lookup,
        args: &[Type],
    ) -> Result<DependencyMap, usize> {
        let mut entries = self.entries.clone();
        let mut consumed = vec![false; entries.len()];
        'args: for (position, arg) in args.iter().enumerate() {
            for (slot, (_, target)) in entries.iter_mut().enumerate() {
                if consumed[slot] {
                    continue;
                }
                if let Some(narrowed) = narrow_target(lookup, target, arg) {
                    *target = narrowed;
                    consumed[slot] = true;
                    continue 'args;
                }
            }
            return Err(position);
        }
        Ok(Self { entries })
    }
}

/// The argument's replacement for `target`, if the argument narrows it.
fn narrow_target(lookup: &dyn Lookup, target: &DepTarget, arg: &Type) -> Option<DepTarget> {
    match target {
        DepTarget::Type(bound) => {
            ty::is_subtype(lookup, arg, bound).then(|| DepTarget::Type(arg.clone()))
        }
        DepTarget::Class(bound) => {
            // Only a class type can fill a class-valued slot.
            if arg.class != lookup.class_class() {
                return None;
            }
            match arg.deps.iter().next() {
                Some((_, DepTarget::Class(named))) if lookup.is_subclass(*named, *bound) => {
                    Some(DepTarget::Class(*named))
                }
                _ => None,
            }
        }
    }
}
