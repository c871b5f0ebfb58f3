//! Variable scopes.
//!
//! A [`Scope`] is a persistent value: every write returns a new scope and the
//! original stays valid, so the condition visitor can derive one scope per
//! branch without copying whole variable tables. Scopes form a parent chain;
//! only [`ScopeKind::Branch`] layers fall through to their parent on lookup.
//! The other kinds are closed: a function body never sees the caller's
//! variables.
//!
//! The global scope is the exception to persistence. Its variables live in a
//! shared [`GlobalState`] that every global-scope lookup in the same analysis
//! run reads, so an assignment at file level is visible to later files.

use bitflags::bitflags;
use indexmap::IndexMap;
use phz_solver::{Qsn, UnionType};
use rustc_hash::FxBuildHasher;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct VariableFlags: u8 {
        /// Bound from a function or method parameter.
        const PARAMETER = 1 << 0;
        /// Imported into a closure through `use`.
        const CLOSURE_USE = 1 << 1;
        /// `$this` inside an instance method.
        const THIS = 1 << 2;
    }
}

/// A named variable and what is known about its value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    pub name: Arc<str>,
    pub union_type: UnionType,
    /// Line of the write that produced this binding.
    pub line: u32,
    pub flags: VariableFlags,
}

impl Variable {
    pub fn new(name: impl Into<Arc<str>>, union_type: UnionType, line: u32) -> Self {
        Variable {
            name: name.into(),
            union_type,
            line,
            flags: VariableFlags::empty(),
        }
    }

    pub fn with_flags(mut self, flags: VariableFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// The same binding with a different type.
    pub fn with_union_type(&self, union_type: UnionType) -> Self {
        Variable {
            union_type,
            ..self.clone()
        }
    }

    pub fn is_possibly_undefined(&self) -> bool {
        self.union_type.is_possibly_undefined()
    }
}

/// What introduced a scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Global,
    Closure,
    /// A function or method body.
    Method,
    /// A class body, outside any method.
    Class,
    /// A property default or constant initializer.
    Property,
    /// One arm of a condition, layered over its parent.
    Branch,
}

impl ScopeKind {
    /// Closed scopes do not fall through to their parent on lookup.
    pub fn is_closed(self) -> bool {
        !matches!(self, ScopeKind::Branch)
    }
}

type VariableTable = IndexMap<Arc<str>, Variable, FxBuildHasher>;

/// Writes made in one scope layer. `None` records an `unset`.
type Layer = IndexMap<Arc<str>, Option<Variable>, FxBuildHasher>;

// =============================================================================
// GlobalState
// =============================================================================

/// The variables of the global scope, shared by every global [`Scope`] of an
/// analysis run.
///
/// Created when a run starts and cleared between independent runs.
#[derive(Debug, Default)]
pub struct GlobalState {
    variables: RwLock<VariableTable>,
}

impl GlobalState {
    pub fn new() -> Arc<GlobalState> {
        Arc::new(GlobalState::default())
    }

    pub fn get(&self, name: &str) -> Option<Variable> {
        self.read(|variables| variables.get(name).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read(|variables| variables.contains_key(name))
    }

    pub fn set(&self, variable: Variable) {
        trace!(name = %variable.name, ty = %variable.union_type, "global variable set");
        self.write(|variables| {
            variables.insert(variable.name.clone(), variable);
        });
    }

    pub fn remove(&self, name: &str) -> Option<Variable> {
        self.write(|variables| variables.shift_remove(name))
    }

    pub fn len(&self) -> usize {
        self.read(IndexMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of every global variable, in first-assignment order.
    pub fn snapshot(&self) -> VariableTable {
        self.read(Clone::clone)
    }

    /// Forget every global variable.
    pub fn clear(&self) {
        self.write(IndexMap::clear);
    }

    // A panicking writer cannot leave the table half-updated, so a poisoned
    // lock still holds usable data.
    fn read<T>(&self, f: impl FnOnce(&VariableTable) -> T) -> T {
        let guard = self.variables.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut VariableTable) -> T) -> T {
        let mut guard = self.variables.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

// =============================================================================
// Scope
// =============================================================================

#[derive(Debug)]
struct ScopeData {
    kind: ScopeKind,
    parent: Option<Scope>,
    layer: Layer,
    class: Option<Qsn>,
    function: Option<Qsn>,
    /// Class a closure is bound to, overriding the lexical class.
    bound_class: Option<Qsn>,
    global: Option<Arc<GlobalState>>,
}

/// An immutable variable scope. Cloning is a reference-count bump.
#[derive(Clone, Debug)]
pub struct Scope(Arc<ScopeData>);

impl Scope {
    fn from_data(data: ScopeData) -> Scope {
        Scope(Arc::new(data))
    }

    fn closed(kind: ScopeKind, class: Option<Qsn>, function: Option<Qsn>) -> Scope {
        Scope::from_data(ScopeData {
            kind,
            parent: None,
            layer: Layer::default(),
            class,
            function,
            bound_class: None,
            global: None,
        })
    }

    /// The file-level scope, backed by `state`.
    pub fn global(state: Arc<GlobalState>) -> Scope {
        Scope::from_data(ScopeData {
            kind: ScopeKind::Global,
            parent: None,
            layer: Layer::default(),
            class: None,
            function: None,
            bound_class: None,
            global: Some(state),
        })
    }

    /// The body of a function (`class` is `None`) or a method.
    pub fn function_like(class: Option<Qsn>, function: Qsn) -> Scope {
        Scope::closed(ScopeKind::Method, class, Some(function))
    }

    /// A class body outside any method.
    pub fn class_body(class: Qsn) -> Scope {
        Scope::closed(ScopeKind::Class, Some(class), None)
    }

    /// The initializer of a property or class constant.
    pub fn property(class: Qsn) -> Scope {
        Scope::closed(ScopeKind::Property, Some(class), None)
    }

    /// A closure body declared inside `outer`.
    ///
    /// The closure inherits the lexical class of `outer` but none of its
    /// variables; `use` imports are written into the new scope by the caller.
    /// Without an explicit `bound_class` it keeps the binding of `outer`.
    pub fn closure(outer: &Scope, function: Qsn, bound_class: Option<Qsn>) -> Scope {
        Scope::from_data(ScopeData {
            kind: ScopeKind::Closure,
            parent: Some(outer.clone()),
            layer: Layer::default(),
            class: outer.0.class.clone(),
            function: Some(function),
            bound_class: bound_class.or_else(|| outer.0.bound_class.clone()),
            global: None,
        })
    }

    /// A branch layered over `parent`. Reads fall through to `parent`; writes
    /// stay in the branch.
    pub fn branch(parent: &Scope) -> Scope {
        Scope::from_data(ScopeData {
            kind: ScopeKind::Branch,
            parent: Some(parent.clone()),
            layer: Layer::default(),
            class: parent.0.class.clone(),
            function: parent.0.function.clone(),
            bound_class: parent.0.bound_class.clone(),
            global: None,
        })
    }

    pub fn kind(&self) -> ScopeKind {
        self.0.kind
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.0.parent.as_ref()
    }

    /// Whether writes here go to a shared [`GlobalState`] instead of a new
    /// scope value.
    pub fn writes_shared_state(&self) -> bool {
        self.0.global.is_some()
    }

    /// The class `self` and `static` resolve to here: the bound class of an
    /// enclosing closure if it has one, else the lexical class.
    pub fn class_qsn(&self) -> Option<&Qsn> {
        self.0.bound_class.as_ref().or(self.0.class.as_ref())
    }

    /// The class the code here is written in, ignoring closure binding.
    pub fn lexical_class(&self) -> Option<&Qsn> {
        self.0.class.as_ref()
    }

    pub fn bound_class(&self) -> Option<&Qsn> {
        self.0.bound_class.as_ref()
    }

    pub fn function_qsn(&self) -> Option<&Qsn> {
        self.0.function.as_ref()
    }

    pub fn is_in_class_scope(&self) -> bool {
        self.class_qsn().is_some()
    }

    /// Whether `self` and `other` are the same scope object.
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The number of branch layers above the nearest closed scope.
    pub fn branch_depth(&self) -> usize {
        let mut depth = 0;
        let mut scope = self;
        while scope.kind() == ScopeKind::Branch {
            depth += 1;
            match scope.parent() {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        depth
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn get_variable(&self, name: &str) -> Option<Variable> {
        let mut scope = self;
        loop {
            if let Some(state) = &scope.0.global {
                return state.get(name);
            }
            if let Some(entry) = scope.0.layer.get(name) {
                return entry.clone();
            }
            if scope.kind().is_closed() {
                return None;
            }
            scope = scope.parent()?;
        }
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.get_variable(name).is_some()
    }

    /// Every variable visible here, oldest binding first.
    pub fn variable_map(&self) -> IndexMap<Arc<str>, Variable, FxBuildHasher> {
        let mut chain = Vec::new();
        let mut scope = Some(self);
        while let Some(current) = scope {
            chain.push(current);
            if current.kind().is_closed() {
                break;
            }
            scope = current.parent();
        }

        let mut variables = VariableTable::default();
        for layer_scope in chain.into_iter().rev() {
            if let Some(state) = &layer_scope.0.global {
                variables = state.snapshot();
                continue;
            }
            for (name, entry) in &layer_scope.0.layer {
                match entry {
                    Some(variable) => {
                        variables.insert(name.clone(), variable.clone());
                    }
                    None => {
                        variables.shift_remove(name);
                    }
                }
            }
        }
        variables
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    fn with_layer_entry(&self, name: Arc<str>, entry: Option<Variable>) -> Scope {
        let mut layer = self.0.layer.clone();
        if entry.is_none() && self.kind().is_closed() {
            layer.shift_remove(&name);
        } else {
            layer.insert(name, entry);
        }
        Scope::from_data(ScopeData {
            kind: self.0.kind,
            parent: self.0.parent.clone(),
            layer,
            class: self.0.class.clone(),
            function: self.0.function.clone(),
            bound_class: self.0.bound_class.clone(),
            global: None,
        })
    }

    /// A scope where `variable` is bound. For the global scope the write goes
    /// to the shared state and the same scope is returned.
    pub fn with_variable(&self, variable: Variable) -> Scope {
        if let Some(state) = &self.0.global {
            state.set(variable);
            return self.clone();
        }
        self.with_layer_entry(variable.name.clone(), Some(variable))
    }

    /// Rebind `name` with a new type, keeping its line and flags. An unbound
    /// name is created at line 0.
    pub fn with_union_type(&self, name: &str, union_type: UnionType) -> Scope {
        let variable = match self.get_variable(name) {
            Some(existing) => existing.with_union_type(union_type),
            None => Variable::new(name, union_type, 0),
        };
        self.with_variable(variable)
    }

    /// A scope where `name` is unbound, as after `unset($name)`.
    pub fn with_unset_variable(&self, name: &str) -> Scope {
        if let Some(state) = &self.0.global {
            state.remove(name);
            return self.clone();
        }
        self.with_layer_entry(Arc::from(name), None)
    }

    // -------------------------------------------------------------------------
    // Merge
    // -------------------------------------------------------------------------

    /// Join the scopes reached at the end of each branch of a condition.
    ///
    /// Every `branch` must descend from `base`. A variable bound in every
    /// branch gets the union of its branch types; one missing from any branch
    /// is additionally marked possibly undefined. A variable visible in
    /// `base` but unset in every branch is unset in the result. The result
    /// does not depend on the order of `branches`.
    pub fn merge(base: &Scope, branches: &[Scope]) -> Scope {
        if branches.is_empty() {
            return base.clone();
        }
        let maps: Vec<_> = branches.iter().map(Scope::variable_map).collect();

        let mut names: IndexMap<Arc<str>, (), FxBuildHasher> = IndexMap::default();
        for map in &maps {
            for name in map.keys() {
                names.insert(name.clone(), ());
            }
        }

        let mut merged = base.clone();
        for name in names.keys() {
            let mut union_type: Option<UnionType> = None;
            let mut line = u32::MAX;
            let mut flags = VariableFlags::empty();
            let mut missing = false;
            for map in &maps {
                match map.get(name) {
                    Some(variable) => {
                        union_type = Some(match union_type {
                            Some(acc) => acc.with_union_type(&variable.union_type),
                            None => variable.union_type.clone(),
                        });
                        line = line.min(variable.line);
                        flags |= variable.flags;
                    }
                    None => missing = true,
                }
            }
            let Some(mut union_type) = union_type else {
                continue;
            };
            if missing {
                union_type = union_type.with_possibly_undefined(true);
            }
            let variable = Variable {
                name: name.clone(),
                union_type,
                line,
                flags,
            };
            if base.get_variable(name).as_ref() != Some(&variable) {
                merged = merged.with_variable(variable);
            }
        }

        for name in base.variable_map().keys() {
            if !names.contains_key(name) {
                merged = merged.with_unset_variable(name);
            }
        }

        trace!(branches = branches.len(), "scopes merged");
        merged
    }
}

#[cfg(test)]
#[path = "../tests/scope_tests.rs"]
mod tests;
