//! The whole-program symbol table.
//!
//! `CodeBase` owns every declaration record, keyed by its [`Qsn`]. It never
//! merges two records with the same name: a second declaration of a name has
//! to be given a free alternate id (see [`CodeBase::next_free_alternate`])
//! before it is added.
//!
//! Each record remembers the file that declared it, which lets
//! [`CodeBase::remove_file`] drop exactly that file's declarations before the
//! file is declared again.

use crate::decls::{ClassDecl, ConstantDecl, DeclInfo, FunctionDecl, MethodDecl, PropertyDecl};
use crate::error::CodeBaseError;
use indexmap::{IndexMap, IndexSet};
use phz_common::limits;
use phz_solver::{Ancestors, ExpansionCache, Qsn, SymbolKind, TypeDatabase};
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Common view of every declaration record.
pub trait Declaration {
    fn qsn(&self) -> &Qsn;
    fn info(&self) -> &DeclInfo;
}

macro_rules! impl_declaration {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Declaration for $ty {
                #[inline]
                fn qsn(&self) -> &Qsn {
                    &self.qsn
                }

                #[inline]
                fn info(&self) -> &DeclInfo {
                    &self.info
                }
            }
        )*
    };
}

impl_declaration!(ClassDecl, FunctionDecl, MethodDecl, PropertyDecl, ConstantDecl);

/// Members of one class-like, by member name, in declaration order.
pub type ScopeMap<'a, T> = IndexMap<&'a str, &'a T, FxBuildHasher>;

type MemberSet = IndexSet<Qsn, FxBuildHasher>;

#[derive(Debug, Default)]
struct MemberIndex {
    methods: MemberSet,
    properties: MemberSet,
    constants: MemberSet,
}

impl MemberIndex {
    fn set_mut(&mut self, kind: SymbolKind) -> Option<&mut MemberSet> {
        match kind {
            SymbolKind::Method => Some(&mut self.methods),
            SymbolKind::Property => Some(&mut self.properties),
            SymbolKind::ClassConstant => Some(&mut self.constants),
            _ => None,
        }
    }

    fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.properties.is_empty() && self.constants.is_empty()
    }
}

#[derive(Debug)]
pub struct CodeBase {
    classes: FxHashMap<Qsn, ClassDecl>,
    methods: FxHashMap<Qsn, MethodDecl>,
    functions: FxHashMap<Qsn, FunctionDecl>,
    properties: FxHashMap<Qsn, PropertyDecl>,
    constants: FxHashMap<Qsn, ConstantDecl>,
    members: FxHashMap<Qsn, MemberIndex>,
    /// Symbols declared by each loaded file, in declaration order.
    files: IndexMap<Arc<str>, Vec<Qsn>, FxBuildHasher>,
    generation: u64,
    expansion_cache: ExpansionCache,
    expansion_depth_limit: u32,
}

impl Default for CodeBase {
    fn default() -> Self {
        CodeBase::new()
    }
}

impl CodeBase {
    pub fn new() -> CodeBase {
        CodeBase {
            classes: FxHashMap::default(),
            methods: FxHashMap::default(),
            functions: FxHashMap::default(),
            properties: FxHashMap::default(),
            constants: FxHashMap::default(),
            members: FxHashMap::default(),
            files: IndexMap::default(),
            generation: 0,
            expansion_cache: ExpansionCache::new(),
            expansion_depth_limit: limits::MAX_TYPE_EXPANSION_DEPTH,
        }
    }

    pub fn with_expansion_depth_limit(mut self, limit: u32) -> CodeBase {
        self.set_expansion_depth_limit(limit);
        self
    }

    pub fn set_expansion_depth_limit(&mut self, limit: u32) {
        if limit != self.expansion_depth_limit {
            self.expansion_depth_limit = limit.max(1);
            self.bump_generation();
        }
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    pub fn add_class(&mut self, decl: ClassDecl) -> Result<(), CodeBaseError> {
        if self.classes.contains_key(&decl.qsn) {
            return Err(CodeBaseError::already_declared(&decl.qsn));
        }
        debug!(class = %decl.qsn, file = %decl.info.file, "add class");
        self.record_file_symbol(&decl.info.file, &decl.qsn);
        self.classes.insert(decl.qsn.clone(), decl);
        self.bump_generation();
        Ok(())
    }

    pub fn add_function(&mut self, decl: FunctionDecl) -> Result<(), CodeBaseError> {
        if self.functions.contains_key(&decl.qsn) {
            return Err(CodeBaseError::already_declared(&decl.qsn));
        }
        debug!(function = %decl.qsn, file = %decl.info.file, "add function");
        self.record_file_symbol(&decl.info.file, &decl.qsn);
        self.functions.insert(decl.qsn.clone(), decl);
        Ok(())
    }

    pub fn add_method(&mut self, decl: MethodDecl) -> Result<(), CodeBaseError> {
        if self.methods.contains_key(&decl.qsn) {
            return Err(CodeBaseError::already_declared(&decl.qsn));
        }
        trace!(method = %decl.qsn, "add method");
        self.record_file_symbol(&decl.info.file, &decl.qsn);
        self.index_member(&decl.qsn);
        self.methods.insert(decl.qsn.clone(), decl);
        Ok(())
    }

    pub fn add_property(&mut self, decl: PropertyDecl) -> Result<(), CodeBaseError> {
        if self.properties.contains_key(&decl.qsn) {
            return Err(CodeBaseError::already_declared(&decl.qsn));
        }
        trace!(property = %decl.qsn, "add property");
        self.record_file_symbol(&decl.info.file, &decl.qsn);
        self.index_member(&decl.qsn);
        self.properties.insert(decl.qsn.clone(), decl);
        Ok(())
    }

    /// Add a global constant or a class constant.
    pub fn add_constant(&mut self, decl: ConstantDecl) -> Result<(), CodeBaseError> {
        if self.constants.contains_key(&decl.qsn) {
            return Err(CodeBaseError::already_declared(&decl.qsn));
        }
        trace!(constant = %decl.qsn, "add constant");
        self.record_file_symbol(&decl.info.file, &decl.qsn);
        if decl.is_class_constant() {
            self.index_member(&decl.qsn);
        }
        self.constants.insert(decl.qsn.clone(), decl);
        Ok(())
    }

    fn record_file_symbol(&mut self, file: &Arc<str>, qsn: &Qsn) {
        self.files
            .entry(Arc::clone(file))
            .or_default()
            .push(qsn.clone());
    }

    fn index_member(&mut self, qsn: &Qsn) {
        let Some(owner) = qsn.owner() else {
            return;
        };
        if let Some(set) = self.members.entry(owner.clone()).or_default().set_mut(qsn.kind()) {
            set.insert(qsn.clone());
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn get_class(&self, qsn: &Qsn) -> Result<&ClassDecl, CodeBaseError> {
        self.classes
            .get(qsn)
            .ok_or_else(|| CodeBaseError::not_found(qsn))
    }

    pub fn has_class(&self, qsn: &Qsn) -> bool {
        self.classes.contains_key(qsn)
    }

    pub fn get_function(&self, qsn: &Qsn) -> Result<&FunctionDecl, CodeBaseError> {
        self.functions
            .get(qsn)
            .ok_or_else(|| CodeBaseError::not_found(qsn))
    }

    pub fn has_function(&self, qsn: &Qsn) -> bool {
        self.functions.contains_key(qsn)
    }

    pub fn get_method(&self, qsn: &Qsn) -> Result<&MethodDecl, CodeBaseError> {
        self.methods
            .get(qsn)
            .ok_or_else(|| CodeBaseError::not_found(qsn))
    }

    pub fn has_method(&self, qsn: &Qsn) -> bool {
        self.methods.contains_key(qsn)
    }

    pub fn get_property(&self, qsn: &Qsn) -> Result<&PropertyDecl, CodeBaseError> {
        self.properties
            .get(qsn)
            .ok_or_else(|| CodeBaseError::not_found(qsn))
    }

    pub fn has_property(&self, qsn: &Qsn) -> bool {
        self.properties.contains_key(qsn)
    }

    pub fn get_constant(&self, qsn: &Qsn) -> Result<&ConstantDecl, CodeBaseError> {
        self.constants
            .get(qsn)
            .ok_or_else(|| CodeBaseError::not_found(qsn))
    }

    pub fn has_constant(&self, qsn: &Qsn) -> bool {
        self.constants.contains_key(qsn)
    }

    /// Whether any record of `qsn`'s kind is stored under `qsn`.
    pub fn has_symbol(&self, qsn: &Qsn) -> bool {
        match qsn.kind() {
            SymbolKind::Class => self.has_class(qsn),
            SymbolKind::Function => self.has_function(qsn),
            SymbolKind::Method => self.has_method(qsn),
            SymbolKind::Property => self.has_property(qsn),
            SymbolKind::GlobalConstant | SymbolKind::ClassConstant => self.has_constant(qsn),
        }
    }

    /// The declaration site of `qsn`, whatever its kind.
    pub fn decl_info(&self, qsn: &Qsn) -> Option<&DeclInfo> {
        match qsn.kind() {
            SymbolKind::Class => self.classes.get(qsn).map(Declaration::info),
            SymbolKind::Function => self.functions.get(qsn).map(Declaration::info),
            SymbolKind::Method => self.methods.get(qsn).map(Declaration::info),
            SymbolKind::Property => self.properties.get(qsn).map(Declaration::info),
            SymbolKind::GlobalConstant | SymbolKind::ClassConstant => {
                self.constants.get(qsn).map(Declaration::info)
            }
        }
    }

    pub fn get_method_map_for_scope(&self, class: &Qsn) -> ScopeMap<'_, MethodDecl> {
        self.scope_map(class, |index| &index.methods, &self.methods)
    }

    pub fn get_property_map_for_scope(&self, class: &Qsn) -> ScopeMap<'_, PropertyDecl> {
        self.scope_map(class, |index| &index.properties, &self.properties)
    }

    pub fn get_constant_map_for_scope(&self, class: &Qsn) -> ScopeMap<'_, ConstantDecl> {
        self.scope_map(class, |index| &index.constants, &self.constants)
    }

    fn scope_map<'a, T>(
        &'a self,
        class: &Qsn,
        select: impl Fn(&'a MemberIndex) -> &'a MemberSet,
        records: &'a FxHashMap<Qsn, T>,
    ) -> ScopeMap<'a, T> {
        let mut map = ScopeMap::default();
        let Some(index) = self.members.get(class) else {
            return map;
        };
        for qsn in select(index) {
            if let Some(record) = records.get(qsn) {
                map.entry(qsn.name()).or_insert(record);
            }
        }
        map
    }

    /// Resolve `name` on `class` the way a call does: the class itself, its
    /// traits, then up the parent chain, then the interfaces.
    pub fn find_method(&self, class: &Qsn, name: &str) -> Option<&MethodDecl> {
        self.find_member(SymbolKind::Method, class, name, &self.methods)
    }

    pub fn find_property(&self, class: &Qsn, name: &str) -> Option<&PropertyDecl> {
        self.find_member(SymbolKind::Property, class, name, &self.properties)
    }

    pub fn find_class_constant(&self, class: &Qsn, name: &str) -> Option<&ConstantDecl> {
        self.find_member(SymbolKind::ClassConstant, class, name, &self.constants)
    }

    fn find_member<'a, T>(
        &'a self,
        kind: SymbolKind,
        class: &Qsn,
        name: &str,
        records: &'a FxHashMap<Qsn, T>,
    ) -> Option<&'a T> {
        let limit = self.expansion_depth_limit as usize;
        let mut visited: FxHashSet<Qsn> = FxHashSet::default();
        let mut interfaces: Vec<Qsn> = Vec::new();
        let mut current = Some(class.clone());

        while let Some(class) = current.take() {
            if visited.len() >= limit || !visited.insert(class.clone()) {
                break;
            }
            if let Some(found) = records.get(&Qsn::member(kind, &class, name, 0)) {
                return Some(found);
            }
            let decl = self.classes.get(&class)?;
            for used in &decl.traits {
                if let Some(found) = records.get(&Qsn::member(kind, used, name, 0)) {
                    return Some(found);
                }
            }
            interfaces.extend(decl.interfaces.iter().cloned());
            current = decl.parent.clone();
        }

        let mut next = 0;
        while next < interfaces.len() && visited.len() < limit {
            let iface = interfaces[next].clone();
            next += 1;
            if !visited.insert(iface.clone()) {
                continue;
            }
            if let Some(found) = records.get(&Qsn::member(kind, &iface, name, 0)) {
                return Some(found);
            }
            if let Some(decl) = self.classes.get(&iface) {
                interfaces.extend(decl.interfaces.iter().cloned());
            }
        }
        None
    }

    // =========================================================================
    // Alternates
    // =========================================================================

    /// The first sibling of `qsn` (starting at alternate 0) that is not yet
    /// taken. Nothing is inserted; `None` once every id up to
    /// `MAX_ALTERNATE_ID` is in use.
    pub fn next_free_alternate(&self, qsn: &Qsn) -> Option<Qsn> {
        (0..=limits::MAX_ALTERNATE_ID)
            .map(|id| qsn.with_alternate_id(id))
            .find(|candidate| !self.has_symbol(candidate))
    }

    /// Every declared alternate of `qsn`, ordered by alternate id.
    pub fn alternates_of(&self, qsn: &Qsn) -> Vec<Qsn> {
        let canonical = qsn.canonical();
        let keys: Box<dyn Iterator<Item = &Qsn>> = match qsn.kind() {
            SymbolKind::Class => Box::new(self.classes.keys()),
            SymbolKind::Function => Box::new(self.functions.keys()),
            SymbolKind::Method => Box::new(self.methods.keys()),
            SymbolKind::Property => Box::new(self.properties.keys()),
            SymbolKind::GlobalConstant | SymbolKind::ClassConstant => {
                Box::new(self.constants.keys())
            }
        };
        let mut found: Vec<Qsn> = keys
            .filter(|key| key.kind() == canonical.kind() && key.canonical() == canonical)
            .cloned()
            .collect();
        found.sort_by_key(Qsn::alternate_id);
        found
    }

    /// The declaration a lookup of `qsn` should use: `qsn` itself when it is
    /// declared, else its lowest surviving alternate.
    pub fn resolve_alternate(&self, qsn: &Qsn) -> Option<Qsn> {
        if self.has_symbol(qsn) {
            return Some(qsn.clone());
        }
        self.alternates_of(qsn).into_iter().next()
    }

    // =========================================================================
    // Enumeration
    // =========================================================================

    pub fn classes(&self) -> impl Iterator<Item = &ClassDecl> + '_ {
        self.classes.values()
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> + '_ {
        self.functions.values()
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> + '_ {
        self.methods.values()
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDecl> + '_ {
        self.properties.values()
    }

    pub fn constants(&self) -> impl Iterator<Item = &ConstantDecl> + '_ {
        self.constants.values()
    }

    /// Total number of declaration records.
    pub fn len(&self) -> usize {
        self.classes.len()
            + self.functions.len()
            + self.methods.len()
            + self.properties.len()
            + self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Mark `file` as loaded. Returns `false` if it already was.
    pub fn begin_file(&mut self, file: &str) -> bool {
        if self.files.contains_key(file) {
            return false;
        }
        self.files.insert(Arc::from(file), Vec::new());
        true
    }

    pub fn is_file_loaded(&self, file: &str) -> bool {
        self.files.contains_key(file)
    }

    /// Symbols declared by `file`, in declaration order.
    pub fn declared_in_file(&self, file: &str) -> &[Qsn] {
        self.files.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn loaded_files(&self) -> impl Iterator<Item = &Arc<str>> + '_ {
        self.files.keys()
    }

    /// Drop every declaration made by `file` and forget that it was loaded.
    /// Returns the number of records removed.
    pub fn remove_file(&mut self, file: &str) -> usize {
        let Some(symbols) = self.files.shift_remove(file) else {
            return 0;
        };
        let removed = symbols
            .iter()
            .filter(|qsn| self.remove_symbol(qsn, file))
            .count();
        self.bump_generation();
        debug!(file, removed, "removed file declarations");
        removed
    }

    fn remove_symbol(&mut self, qsn: &Qsn, file: &str) -> bool {
        let removed = match qsn.kind() {
            SymbolKind::Class => remove_if_from(&mut self.classes, qsn, file),
            SymbolKind::Function => remove_if_from(&mut self.functions, qsn, file),
            SymbolKind::Method => remove_if_from(&mut self.methods, qsn, file),
            SymbolKind::Property => remove_if_from(&mut self.properties, qsn, file),
            SymbolKind::GlobalConstant | SymbolKind::ClassConstant => {
                remove_if_from(&mut self.constants, qsn, file)
            }
        };
        if removed
            && let Some(owner) = qsn.owner()
            && let Some(index) = self.members.get_mut(owner)
        {
            if let Some(set) = index.set_mut(qsn.kind()) {
                set.shift_remove(qsn);
            }
            if index.is_empty() {
                self.members.remove(owner);
            }
        }
        removed
    }

    /// Remove everything, including file bookkeeping.
    pub fn clear(&mut self) {
        self.classes.clear();
        self.functions.clear();
        self.methods.clear();
        self.properties.clear();
        self.constants.clear();
        self.members.clear();
        self.files.clear();
        self.bump_generation();
    }

    // =========================================================================
    // Generation
    // =========================================================================

    /// Counter that moves whenever the class hierarchy may have changed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn expansion_cache(&self) -> &ExpansionCache {
        &self.expansion_cache
    }
}

fn remove_if_from<T: Declaration>(records: &mut FxHashMap<Qsn, T>, qsn: &Qsn, file: &str) -> bool {
    let owned = records
        .get(qsn)
        .is_some_and(|record| &*record.info().file == file);
    owned && records.remove(qsn).is_some()
}

impl TypeDatabase for CodeBase {
    fn direct_ancestors(&self, class: &Qsn) -> Option<Ancestors> {
        self.classes.get(class).map(ClassDecl::direct_ancestors)
    }

    fn has_class(&self, class: &Qsn) -> bool {
        CodeBase::has_class(self, class)
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn expansion_cache(&self) -> &ExpansionCache {
        &self.expansion_cache
    }

    fn expansion_depth_limit(&self) -> u32 {
        self.expansion_depth_limit
    }
}

#[cfg(test)]
#[path = "../tests/codebase_tests.rs"]
mod tests;
