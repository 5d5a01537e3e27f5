//! Canonical types and the subtyping lattice.
//!
//! A [`Type`] is an expression made unambiguous against a frozen class table:
//! a class handle, a full dependency map, and an optional refinement. Two
//! expressions that mean the same thing resolve to the same `Type`, so types
//! are usable directly as map keys.

use serde::{Deserialize, Serialize};

use crate::ast::{ClassName, Expression, Requirement};
use crate::error::ResolutionError;

use super::class::ClassId;
use super::dependency::{DepKey, DepTarget, DependencyMap};

/// Class-level queries the lattice operations run against.
///
/// Implemented by the frozen table and, during freeze, by the loader, so
/// resolution works identically in both phases.
pub(crate) trait Lookup {
    fn class_id(&self, name: &ClassName) -> Result<ClassId, ResolutionError>;
    fn name_of(&self, id: ClassId) -> &ClassName;
    fn is_abstract_class(&self, id: ClassId) -> bool;
    fn is_subclass(&self, sub: ClassId, sup: ClassId) -> bool;
    fn meet_class(&self, a: ClassId, b: ClassId) -> Result<ClassId, ResolutionError>;
    fn base_deps(&self, id: ClassId) -> Result<DependencyMap, ResolutionError>;
    fn class_class(&self) -> ClassId;
    fn component_class(&self) -> ClassId;
}

/// A canonical, fully specialized type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Type {
    pub class: ClassId,
    pub deps: DependencyMap,
    /// A refined type is never concrete; it exists to be narrowed from.
    pub refinement: Option<Requirement>,
}

impl Type {
    /// The shortest expression that resolves back to this type: arguments
    /// equal to the class's declared bound are elided.
    pub(crate) fn expression_with(&self, lookup: &dyn Lookup) -> Expression {
        // The metaclass prints its named class directly; `Class<Component>`
        // is the bound and stays bare.
        if self.class == lookup.class_class() {
            let named = match self.deps.iter().next() {
                Some((_, DepTarget::Class(named))) => *named,
                _ => lookup.component_class(),
            };
            let name = lookup.name_of(self.class).clone();
            let mut expression = if named == lookup.component_class() {
                Expression::name(name)
            } else {
                Expression::of(name, vec![Expression::name(lookup.name_of(named).clone())])
            };
            if let Some(refinement) = &self.refinement {
                expression = expression.has(refinement.clone());
            }
            return expression;
        }

        let base = lookup.base_deps(self.class).unwrap_or_default();
        let mut arguments = Vec::new();
        for (key, target) in self.deps.iter() {
            if base.get(key) == Some(target) {
                continue;
            }
            arguments.push(match target {
                DepTarget::Type(inner) => inner.expression_with(lookup),
                DepTarget::Class(named) => {
                    Expression::of(ClassName::class(), vec![Expression::name(
                        lookup.name_of(*named).clone(),
                    )])
                }
            });
        }
        let mut expression = Expression::of(lookup.name_of(self.class).clone(), arguments);
        if let Some(refinement) = &self.refinement {
            expression = expression.has(refinement.clone());
        }
        expression
    }
}

/// Resolve an expression to a canonical type.
pub(crate) fn resolve(lookup: &dyn Lookup, expr: &Expression) -> Result<Type, ResolutionError> {
    let class = lookup.class_id(&expr.class_name)?;
    let refinement = expr.refinement.as_deref().cloned();

    // `Class<X>` names a class, not a component type; its one slot is filled
    // directly rather than by type-level specialization.
    if class == lookup.class_class() {
        let named = match expr.arguments.as_slice() {
            [] => lookup.component_class(),
            [arg] if arg.is_simple() => lookup.class_id(&arg.class_name)?,
            _ => return Err(ResolutionError::BadClassExpression(expr.clone())),
        };
        let mut deps = DependencyMap::new();
        deps.set(
            DepKey {
                declaring: class,
                index: 0,
            },
            DepTarget::Class(named),
        );
        return Ok(Type {
            class,
            deps,
            refinement,
        });
    }

    let mut args = Vec::with_capacity(expr.arguments.len());
    for arg in &expr.arguments {
        args.push(resolve(lookup, arg)?);
    }
    let deps = lookup
        .base_deps(class)?
        .specialize(lookup, &args)
        .map_err(|position| ResolutionError::InvalidSpecialization {
            arg: expr.arguments[position].clone(),
            class: expr.class_name.clone(),
        })?;
    Ok(Type {
        class,
        deps,
        refinement,
    })
}

/// Subtyping: subclass at the class level, then slotwise on dependencies.
///
/// A refinement on the right must be matched verbatim on the left; a
/// refinement only on the left narrows and is always allowed.
pub(crate) fn is_subtype(lookup: &dyn Lookup, a: &Type, b: &Type) -> bool {
    if !lookup.is_subclass(a.class, b.class) {
        return false;
    }
    for (key, target_b) in b.deps.iter() {
        match a.deps.get(key) {
            Some(target_a) if target_is_subtype(lookup, target_a, target_b) => {}
            _ => return false,
        }
    }
    match (&a.refinement, &b.refinement) {
        (_, None) => true,
        (Some(x), Some(y)) => x == y,
        (None, Some(_)) => false,
    }
}

fn target_is_subtype(lookup: &dyn Lookup, a: &DepTarget, b: &DepTarget) -> bool {
    match (a, b) {
        (DepTarget::Type(a), DepTarget::Type(b)) => is_subtype(lookup, a, b),
        (DepTarget::Class(a), DepTarget::Class(b)) => lookup.is_subclass(*a, *b),
        _ => false,
    }
}

/// Greatest lower bound of two types.
///
/// The class is the meet of the two classes, each dependency slot is the glb
/// of the two targets, and refinements conjoin.
pub(crate) fn glb(lookup: &dyn Lookup, a: &Type, b: &Type) -> Result<Type, ResolutionError> {
    let class = lookup.meet_class(a.class, b.class)?;
    let mut deps = lookup.base_deps(class)?;
    for key in deps.keys() {
        let merged = match (a.deps.get(key), b.deps.get(key)) {
            (Some(x), Some(y)) => Some(target_glb(lookup, x, y)?),
            (Some(x), None) => Some(x.clone()),
            (None, Some(y)) => Some(y.clone()),
            (None, None) => None,
        };
        if let Some(target) = merged {
            deps.set(key, target);
        }
    }
    Ok(Type {
        class,
        deps,
        refinement: Requirement::join(a.refinement.clone(), b.refinement.clone()),
    })
}

pub(crate) fn target_glb(
    lookup: &dyn Lookup,
    a: &DepTarget,
    b: &DepTarget,
) -> Result<DepTarget, ResolutionError> {
    match (a, b) {
        (DepTarget::Type(x), DepTarget::Type(y)) => glb(lookup, x, y).map(DepTarget::Type),
        (DepTarget::Class(x), DepTarget::Class(y)) => {
            lookup.meet_class(*x, *y).map(DepTarget::Class)
        }
        (DepTarget::Type(x), DepTarget::Class(y)) | (DepTarget::Class(y), DepTarget::Type(x)) => {
            Err(ResolutionError::NoCommonType(
                lookup.name_of(x.class).clone(),
                lookup.name_of(*y).clone(),
            ))
        }
    }
}

/// A type is abstract if its class is abstract, any dependency target is
/// abstract, or it carries a refinement. Only concrete types can be counted
/// or changed.
pub(crate) fn is_abstract(lookup: &dyn Lookup, t: &Type) -> bool {
    if t.refinement.is_some() || lookup.is_abstract_class(t.class) {
        return true;
    }
    t.deps.iter().any(|(_, target)| match target {
        DepTarget::Type(inner) => is_abstract(lookup, inner),
        DepTarget::Class(_) => false,
    })
}
