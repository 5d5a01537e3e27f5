//! The class table: declaration, freezing, and frozen queries.
//!
//! The table lives in two phases. A [`ClassTableBuilder`] accepts
//! declarations in any order and checks nothing but name collisions. `freeze`
//! then validates everything at once (dangling references, superclass cycles,
//! dependency resolution) and produces an immutable [`ClassTable`]; every
//! later resolution and lattice query runs against that frozen table.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{ClassDeclaration, ClassName, Effect, Expression, Intensity, Trigger};
use crate::error::{ResolutionError, StructuralError};

use super::class::{Class, ClassId};
use super::dependency::{DepKey, DepTarget, DependencyMap};
use super::ty::{self, Lookup, Type};

/// Accumulates declarations until `freeze`.
///
/// The builtins `Component`, `Class`, and `Ok` are pre-declared.
pub struct ClassTableBuilder {
    decls: Vec<ClassDeclaration>,
    by_name: FxHashMap<ClassName, ClassId>,
    frozen: bool,
}

impl ClassTableBuilder {
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Self {
            decls: Vec::new(),
            by_name: FxHashMap::default(),
            frozen: false,
        };
        builder.seed(ClassDeclaration::new(ClassName::component()).with_abstract());
        builder.seed(ClassDeclaration::new(ClassName::class()));
        builder.seed(ClassDeclaration::new(ClassName::ok()));
        builder
    }

    fn seed(&mut self, decl: ClassDeclaration) {
        let id = ClassId::new(self.decls.len() as u32);
        self.by_name.insert(decl.name.clone(), id);
        self.decls.push(decl);
    }

    /// Register one declaration. Order does not matter; forward references
    /// are checked only at freeze.
    pub fn declare(&mut self, decl: ClassDeclaration) -> Result<(), StructuralError> {
        if self.frozen {
            return Err(StructuralError::FrozenTable);
        }
        if self.by_name.contains_key(&decl.name) {
            return Err(StructuralError::Redeclaration(decl.name));
        }
        self.seed(decl);
        Ok(())
    }

    pub fn declare_all(
        &mut self,
        decls: impl IntoIterator<Item = ClassDeclaration>,
    ) -> Result<(), StructuralError> {
        for decl in decls {
            self.declare(decl)?;
        }
        Ok(())
    }

    /// Validate everything and produce the frozen table.
    ///
    /// The builder stays frozen afterwards whether or not this succeeds.
    pub fn freeze(&mut self) -> Result<ClassTable, StructuralError> {
        self.frozen = true;
        let n = self.decls.len();
        let component = self.by_name[&ClassName::component()];
        let class_class = self.by_name[&ClassName::class()];
        let ok_class = self.by_name[&ClassName::ok()];

        // Every name mentioned anywhere must be declared.
        for decl in &self.decls {
            let mut names = Vec::new();
            for e in &decl.supertypes {
                e.collect_class_names(&mut names);
            }
            for e in &decl.dependencies {
                e.collect_class_names(&mut names);
            }
            for e in &decl.default_specializations {
                e.collect_class_names(&mut names);
            }
            for effect in &decl.effects {
                match &effect.trigger {
                    Trigger::OnGain(e) | Trigger::OnRemove(e) => e.collect_class_names(&mut names),
                }
                effect.instruction.collect_class_names(&mut names);
            }
            for name in names {
                if !self.by_name.contains_key(name) {
                    return Err(StructuralError::DanglingReference(name.clone()));
                }
            }
        }

        let mut direct_supers: Vec<Vec<ClassId>> = Vec::with_capacity(n);
        for (i, decl) in self.decls.iter().enumerate() {
            let id = ClassId::new(i as u32);
            let supers = if id == component {
                Vec::new()
            } else if decl.supertypes.is_empty() {
                vec![component]
            } else {
                decl.supertypes
                    .iter()
                    .map(|e| self.by_name[&e.class_name])
                    .collect()
            };
            direct_supers.push(supers);
        }

        let names: Vec<ClassName> = self.decls.iter().map(|d| d.name.clone()).collect();
        let mut all: Vec<Option<FxHashSet<ClassId>>> = vec![None; n];
        let mut visiting = vec![false; n];
        for i in 0..n {
            compute_supers(i, &direct_supers, &names, &mut all, &mut visiting)?;
        }
        let supers: Vec<FxHashSet<ClassId>> =
            all.into_iter().map(Option::unwrap_or_default).collect();

        let mut subs: Vec<FxHashSet<ClassId>> = vec![FxHashSet::default(); n];
        for (i, sup_set) in supers.iter().enumerate() {
            for sup in sup_set {
                subs[sup.raw() as usize].insert(ClassId::new(i as u32));
            }
        }

        let abstracts: Vec<bool> = self.decls.iter().map(|d| d.is_abstract).collect();

        let classes = {
            let loader = Loader {
                decls: &self.decls,
                by_name: &self.by_name,
                supers: &supers,
                subs: &subs,
                abstracts: &abstracts,
                class_class,
                component_class: component,
                dep_memo: RefCell::new(FxHashMap::default()),
                in_progress: RefCell::new(FxHashSet::default()),
                partial: RefCell::new(FxHashMap::default()),
                merging: RefCell::new(Vec::new()),
                truncations: Cell::new(0),
            };
            let mut classes = Vec::with_capacity(n);
            for (i, decl) in self.decls.iter().enumerate() {
                let id = ClassId::new(i as u32);
                let base_deps = loader.base_deps(id).map_err(|e| match e {
                    ResolutionError::DependencyCycle(name) => StructuralError::Cycle(name),
                    other => StructuralError::InvalidDeclaration {
                        class: decl.name.clone(),
                        source: other,
                    },
                })?;
                if !decl.default_specializations.is_empty() {
                    let check = Expression::of(
                        decl.name.clone(),
                        decl.default_specializations.clone(),
                    );
                    ty::resolve(&loader, &check).map_err(|e| {
                        StructuralError::InvalidDeclaration {
                            class: decl.name.clone(),
                            source: e,
                        }
                    })?;
                }
                classes.push(Class {
                    id,
                    name: decl.name.clone(),
                    is_abstract: decl.is_abstract,
                    direct_supers: direct_supers[i].clone(),
                    base_deps,
                    default_gain_intensity: decl.default_gain_intensity,
                    default_remove_intensity: decl.default_remove_intensity,
                    default_specializations: decl.default_specializations.clone(),
                    effects: decl.effects.clone(),
                });
            }
            classes
        };

        Ok(ClassTable {
            classes,
            by_name: self.by_name.clone(),
            supers,
            subs,
            meet_memo: RefCell::new(FxHashMap::default()),
            class_class,
            component_class: component,
            ok_class,
        })
    }
}

impl Default for ClassTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_supers(
    idx: usize,
    direct: &[Vec<ClassId>],
    names: &[ClassName],
    all: &mut Vec<Option<FxHashSet<ClassId>>>,
    visiting: &mut [bool],
) -> Result<(), StructuralError> {
    if all[idx].is_some() {
        return Ok(());
    }
    if visiting[idx] {
        return Err(StructuralError::Cycle(names[idx].clone()));
    }
    visiting[idx] = true;
    let mut set = FxHashSet::default();
    set.insert(ClassId::new(idx as u32));
    for sup in &direct[idx] {
        compute_supers(sup.raw() as usize, direct, names, all, visiting)?;
        if let Some(sup_set) = &all[sup.raw() as usize] {
            set.extend(sup_set.iter().copied());
        }
    }
    visiting[idx] = false;
    all[idx] = Some(set);
    Ok(())
}

/// Meet of two classes: the unique most-general common subclass.
///
/// Subsumption short-circuits; otherwise the common subclasses are filtered
/// to their maximal elements. Anything but exactly one survivor is an error.
fn meet_in_hierarchy(
    a: ClassId,
    b: ClassId,
    supers: &[FxHashSet<ClassId>],
    subs: &[FxHashSet<ClassId>],
    name_of: impl Fn(ClassId) -> ClassName,
) -> Result<ClassId, ResolutionError> {
    let is_sub = |x: ClassId, y: ClassId| supers[x.raw() as usize].contains(&y);
    if is_sub(a, b) {
        return Ok(a);
    }
    if is_sub(b, a) {
        return Ok(b);
    }
    let mut candidates: Vec<ClassId> = subs[a.raw() as usize]
        .intersection(&subs[b.raw() as usize])
        .copied()
        .collect();
    candidates.sort_unstable();
    let maximal: Vec<ClassId> = candidates
        .iter()
        .copied()
        .filter(|&c| !candidates.iter().any(|&d| d != c && is_sub(c, d)))
        .collect();
    match maximal.as_slice() {
        [only] => Ok(*only),
        [] => Err(ResolutionError::NoCommonType(name_of(a), name_of(b))),
        _ => Err(ResolutionError::AmbiguousIntersection(name_of(a), name_of(b))),
    }
}

/// Resolution context used while the table is still being frozen.
///
/// Dependency maps are computed on demand and memoized. Re-entering a class
/// already being computed is a dependency cycle, unless the re-entry runs
/// through the supertype merge of a subclass: that is the self-referencing
/// generic the data model allows, and its recursive bound is truncated at
/// the entries already known.
struct Loader<'a> {
    decls: &'a [ClassDeclaration],
    by_name: &'a FxHashMap<ClassName, ClassId>,
    supers: &'a [FxHashSet<ClassId>],
    subs: &'a [FxHashSet<ClassId>],
    abstracts: &'a [bool],
    class_class: ClassId,
    component_class: ClassId,
    dep_memo: RefCell<FxHashMap<ClassId, DependencyMap>>,
    in_progress: RefCell<FxHashSet<ClassId>>,
    /// Inherited entries of classes whose own slots are still being filled.
    partial: RefCell<FxHashMap<ClassId, DependencyMap>>,
    /// Classes whose supertype merge is underway.
    merging: RefCell<Vec<ClassId>>,
    truncations: Cell<u32>,
}

impl Loader<'_> {
    fn compute_base_deps(&self, id: ClassId) -> Result<DependencyMap, ResolutionError> {
        let decl = &self.decls[id.raw() as usize];
        let mut map = DependencyMap::new();
        self.merging.borrow_mut().push(id);
        let merged = self.merge_inherited(decl, &mut map);
        self.merging.borrow_mut().pop();
        merged?;
        self.partial.borrow_mut().insert(id, map.clone());
        for (index, bound) in decl.dependencies.iter().enumerate() {
            let target = ty::resolve(self, bound)?;
            map.set(
                DepKey {
                    declaring: id,
                    index: index as u32,
                },
                DepTarget::Type(target),
            );
        }
        Ok(map)
    }

    fn merge_inherited(
        &self,
        decl: &ClassDeclaration,
        map: &mut DependencyMap,
    ) -> Result<(), ResolutionError> {
        for sup_expr in &decl.supertypes {
            let sup = ty::resolve(self, sup_expr)?;
            for (key, target) in sup.deps.iter() {
                // Diamond inheritance merges colliding slots by glb.
                let merged = match map.get(key) {
                    None => Some(target.clone()),
                    Some(existing) if existing == target => None,
                    Some(existing) => Some(ty::target_glb(self, existing, target)?),
                };
                if let Some(target) = merged {
                    map.set(key, target);
                }
            }
        }
        Ok(())
    }
}

impl Lookup for Loader<'_> {
    fn class_id(&self, name: &ClassName) -> Result<ClassId, ResolutionError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ResolutionError::ClassNotFound(name.clone()))
    }

    fn name_of(&self, id: ClassId) -> &ClassName {
        &self.decls[id.raw() as usize].name
    }

    fn is_abstract_class(&self, id: ClassId) -> bool {
        self.abstracts[id.raw() as usize]
    }

    fn is_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        self.supers[sub.raw() as usize].contains(&sup)
    }

    fn meet_class(&self, a: ClassId, b: ClassId) -> Result<ClassId, ResolutionError> {
        meet_in_hierarchy(a, b, self.supers, self.subs, |id| {
            self.decls[id.raw() as usize].name.clone()
        })
    }

    fn base_deps(&self, id: ClassId) -> Result<DependencyMap, ResolutionError> {
        if let Some(map) = self.dep_memo.borrow().get(&id) {
            return Ok(map.clone());
        }
        if id == self.class_class {
            let mut map = DependencyMap::new();
            map.set(
                DepKey {
                    declaring: id,
                    index: 0,
                },
                DepTarget::Class(self.component_class),
            );
            return Ok(map);
        }
        if !self.in_progress.borrow_mut().insert(id) {
            let through_subclass = self
                .merging
                .borrow()
                .iter()
                .any(|&sub| self.supers[sub.raw() as usize].contains(&id));
            if through_subclass {
                self.truncations.set(self.truncations.get() + 1);
                return Ok(self.partial.borrow().get(&id).cloned().unwrap_or_default());
            }
            return Err(ResolutionError::DependencyCycle(self.name_of(id).clone()));
        }
        let before = self.truncations.get();
        let result = self.compute_base_deps(id);
        self.in_progress.borrow_mut().remove(&id);
        if let Ok(map) = &result {
            // A map built on a truncated view is not cached; recomputing it
            // once its neighbors are settled yields the full entries.
            if self.truncations.get() == before {
                self.dep_memo.borrow_mut().insert(id, map.clone());
            }
        }
        result
    }

    fn class_class(&self) -> ClassId {
        self.class_class
    }

    fn component_class(&self) -> ClassId {
        self.component_class
    }
}

/// The frozen class table.
pub struct ClassTable {
    classes: Vec<Class>,
    by_name: FxHashMap<ClassName, ClassId>,
    supers: Vec<FxHashSet<ClassId>>,
    subs: Vec<FxHashSet<ClassId>>,
    meet_memo: RefCell<FxHashMap<(ClassId, ClassId), Result<ClassId, ResolutionError>>>,
    class_class: ClassId,
    component_class: ClassId,
    ok_class: ClassId,
}

impl ClassTable {
    #[must_use]
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.raw() as usize]
    }

    pub fn class_id(&self, name: &ClassName) -> Result<ClassId, ResolutionError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ResolutionError::ClassNotFound(name.clone()))
    }

    pub fn class_by_name(&self, name: &ClassName) -> Result<&Class, ResolutionError> {
        Ok(self.class(self.class_id(name)?))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.classes.iter()
    }

    #[must_use]
    pub fn component(&self) -> ClassId {
        self.component_class
    }

    #[must_use]
    pub fn metaclass(&self) -> ClassId {
        self.class_class
    }

    #[must_use]
    pub fn noop_class(&self) -> ClassId {
        self.ok_class
    }

    #[must_use]
    pub fn is_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        self.supers[sub.raw() as usize].contains(&sup)
    }

    /// Resolve an expression to a canonical type.
    pub fn resolve(&self, expr: &Expression) -> Result<Type, ResolutionError> {
        ty::resolve(self, expr)
    }

    #[must_use]
    pub fn is_subtype(&self, a: &Type, b: &Type) -> bool {
        ty::is_subtype(self, a, b)
    }

    pub fn glb(&self, a: &Type, b: &Type) -> Result<Type, ResolutionError> {
        ty::glb(self, a, b)
    }

    #[must_use]
    pub fn is_abstract(&self, t: &Type) -> bool {
        ty::is_abstract(self, t)
    }

    /// The shortest expression resolving back to this type.
    #[must_use]
    pub fn expression_of(&self, t: &Type) -> Expression {
        t.expression_with(self)
    }

    /// The intensity a bare gain of this class defaults to, searching the
    /// class then its superclasses breadth-first.
    #[must_use]
    pub fn default_gain_intensity(&self, class: ClassId) -> Option<Intensity> {
        self.find_default(class, |c| c.default_gain_intensity)
    }

    #[must_use]
    pub fn default_remove_intensity(&self, class: ClassId) -> Option<Intensity> {
        self.find_default(class, |c| c.default_remove_intensity)
    }

    /// Specializations a bare gain of this class defaults to.
    #[must_use]
    pub fn default_specializations(&self, class: ClassId) -> Vec<Expression> {
        self.find_default(class, |c| {
            if c.default_specializations.is_empty() {
                None
            } else {
                Some(c.default_specializations.clone())
            }
        })
        .unwrap_or_default()
    }

    /// Effects this class carries: its own declarations first, then the
    /// inherited ones in class-id order.
    #[must_use]
    pub fn effects_of(&self, class: ClassId) -> Vec<&Effect> {
        let mut out: Vec<&Effect> = self.class(class).effects.iter().collect();
        let mut inherited: Vec<ClassId> = self.supers[class.raw() as usize]
            .iter()
            .copied()
            .filter(|&c| c != class)
            .collect();
        inherited.sort_unstable();
        for sup in inherited {
            out.extend(self.class(sup).effects.iter());
        }
        out
    }

    fn find_default<T>(&self, start: ClassId, get: impl Fn(&Class) -> Option<T>) -> Option<T> {
        let mut queue = VecDeque::from([start]);
        let mut seen = FxHashSet::default();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let class = self.class(id);
            if let Some(found) = get(class) {
                return Some(found);
            }
            queue.extend(class.direct_supers.iter().copied());
        }
        None
    }

    fn meet(&self, a: ClassId, b: ClassId) -> Result<ClassId, ResolutionError> {
        let key = if a <= b { (a, b) } else { (b, a) };
        if let Some(cached) = self.meet_memo.borrow().get(&key) {
            return cached.clone();
        }
        let result = meet_in_hierarchy(a, b, &self.supers, &self.subs, |id| {
            self.classes[id.raw() as usize].name.clone()
        });
        self.meet_memo.borrow_mut().insert(key, result.clone());
        result
    }
}

impl Lookup for ClassTable {
    fn class_id(&self, name: &ClassName) -> Result<ClassId, ResolutionError> {
        ClassTable::class_id(self, name)
    }

    fn name_of(&self, id: ClassId) -> &ClassName {
        &self.class(id).name
    }

    fn is_abstract_class(&self, id: ClassId) -> bool {
        self.class(id).is_abstract
    }

    fn is_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        ClassTable::is_subclass(self, sub, sup)
    }

    fn meet_class(&self, a: ClassId, b: ClassId) -> Result<ClassId, ResolutionError> {
        self.meet(a, b)
    }

    fn base_deps(&self, id: ClassId) -> Result<DependencyMap, ResolutionError> {
        Ok(self.class(id).base_deps.clone())
    }

    fn class_class(&self) -> ClassId {
        self.class_class
    }

    fn component_class(&self) -> ClassId {
        self.component_class
    }
}
