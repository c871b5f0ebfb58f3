//! Qualified symbol names.
//!
//! A [`Qsn`] names one declared element: a class-like, a function, a global
//! constant, or a member (method, property, class constant) of a class-like.
//! Values are interned process-wide, so two names built from the same text
//! share one allocation and compare by pointer first. The intern table
//! outlives any one analysis run; [`Qsn::release_unused`] drops the entries
//! no live value refers to any more.
//!
//! String forms:
//!
//! | Kind | Text |
//! |------|------|
//! | class / function / global constant | `\Ns\Sub\name` (`\name` in the root namespace) |
//! | method / property / class constant | `\Ns\class::name` |
//!
//! A non-zero alternate id is appended as `,N` (`\Ns\foo,1`). Alternates
//! distinguish multiple declarations of the same name (conditional
//! definitions, duplicates across files).
//!
//! Case rules: class-like names compare case-insensitively including their
//! namespace; function and method names are folded to lower case but the
//! namespace of a function is compared as written; property and constant
//! names are case-sensitive.

use crate::error::NameError;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use rustc_hash::{FxBuildHasher, FxHashMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

/// What a [`Qsn`] names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymbolKind {
    Class,
    Function,
    GlobalConstant,
    Method,
    Property,
    ClassConstant,
}

impl SymbolKind {
    /// Members live inside a class-like and are written `Class::name`.
    pub const fn is_member(self) -> bool {
        matches!(
            self,
            SymbolKind::Method | SymbolKind::Property | SymbolKind::ClassConstant
        )
    }

    /// Whether the bare name is folded to lower case.
    pub const fn folds_name_case(self) -> bool {
        matches!(
            self,
            SymbolKind::Class | SymbolKind::Function | SymbolKind::Method
        )
    }
}

struct QsnData {
    kind: SymbolKind,
    namespace: Arc<str>,
    name: Arc<str>,
    alternate_id: u32,
    owner: Option<Qsn>,
    text: Arc<str>,
    key: Arc<str>,
}

/// An interned, immutable qualified symbol name.
#[derive(Clone)]
pub struct Qsn(Arc<QsnData>);

type InternTable = DashMap<(SymbolKind, Arc<str>), Qsn, FxBuildHasher>;

static INTERNER: Lazy<InternTable> = Lazy::new(|| DashMap::with_hasher(FxBuildHasher));

const ROOT_NAMESPACE: &str = "\\";

impl Qsn {
    /// Build a non-member name. `namespace` may be written with or without
    /// leading/trailing separators; `""` is the root namespace.
    pub fn make(kind: SymbolKind, namespace: &str, name: &str, alternate_id: u32) -> Qsn {
        debug_assert!(!kind.is_member(), "use Qsn::member for {kind:?}");
        let namespace = normalize_namespace(namespace);
        let name = canonical_name(kind, name);
        let mut text = join_namespace(&namespace, &name);
        push_alternate(&mut text, alternate_id);
        let key = match kind {
            SymbolKind::Class => text.to_ascii_lowercase(),
            _ => text.clone(),
        };
        intern(QsnData {
            kind,
            namespace: Arc::from(namespace),
            name: Arc::from(name),
            alternate_id,
            owner: None,
            text: Arc::from(text),
            key: Arc::from(key),
        })
    }

    pub fn class(namespace: &str, name: &str) -> Qsn {
        Qsn::make(SymbolKind::Class, namespace, name, 0)
    }

    pub fn function(namespace: &str, name: &str) -> Qsn {
        Qsn::make(SymbolKind::Function, namespace, name, 0)
    }

    pub fn constant(namespace: &str, name: &str) -> Qsn {
        Qsn::make(SymbolKind::GlobalConstant, namespace, name, 0)
    }

    /// Build a member name owned by the class-like `owner`.
    pub fn member(kind: SymbolKind, owner: &Qsn, name: &str, alternate_id: u32) -> Qsn {
        debug_assert!(kind.is_member(), "use Qsn::make for {kind:?}");
        let bare = match kind {
            SymbolKind::Property => name.strip_prefix('$').unwrap_or(name),
            _ => name,
        };
        let name = canonical_name(kind, bare);
        let mut text = format!("{}::{}", owner.as_str(), name);
        push_alternate(&mut text, alternate_id);
        let mut key = format!("{}::{}", owner.lookup_key(), name);
        push_alternate(&mut key, alternate_id);
        intern(QsnData {
            kind,
            namespace: owner.0.namespace.clone(),
            name: Arc::from(name),
            alternate_id,
            owner: Some(owner.clone()),
            text: Arc::from(text),
            key: Arc::from(key),
        })
    }

    /// Parse a fully qualified name such as `\A\B\foo`, `\A\B::bar` or
    /// `\A\foo,2`. A leading separator is optional.
    pub fn from_fully_qualified_string(kind: SymbolKind, text: &str) -> Result<Qsn, NameError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(NameError::malformed(text, "empty name"));
        }
        if kind.is_member() {
            let (owner_text, member_text) = split_member(trimmed, text)?;
            let owner = Qsn::from_fully_qualified_string(SymbolKind::Class, owner_text)?;
            return parse_member(kind, &owner, member_text, text);
        }
        let (body, alternate_id) = split_alternate(trimmed, text)?;
        let body = body.strip_prefix('\\').unwrap_or(body);
        let (namespace, name) = body.rsplit_once('\\').unwrap_or(("", body));
        if !namespace.is_empty() && !namespace.split('\\').all(is_identifier) {
            return Err(NameError::malformed(text, "invalid namespace segment"));
        }
        if !is_identifier(name) {
            return Err(NameError::malformed(text, "invalid identifier"));
        }
        Ok(Qsn::make(kind, namespace, name, alternate_id))
    }

    /// Resolve a name as written in source against the current namespace and
    /// its `use` imports.
    ///
    /// Fully qualified names are taken as-is. A qualified name (`Sub\Foo`)
    /// has its first segment looked up among the class imports. An
    /// unqualified name is looked up among the imports of its own kind.
    /// Otherwise the name is placed in the current namespace.
    pub fn from_string_in_context(
        kind: SymbolKind,
        text: &str,
        map: &NamespaceMap,
    ) -> Result<Qsn, NameError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(NameError::malformed(text, "empty name"));
        }
        if trimmed.starts_with('\\') {
            return Qsn::from_fully_qualified_string(kind, trimmed);
        }
        if kind.is_member() {
            let (owner_text, member_text) = split_member(trimmed, text)?;
            let owner = Qsn::from_string_in_context(SymbolKind::Class, owner_text, map)?;
            return parse_member(kind, &owner, member_text, text);
        }
        let (body, alternate_id) = split_alternate(trimmed, text)?;
        let resolved = match body.split_once('\\') {
            Some((first, rest)) => match map.resolve_import(ImportKind::Class, first) {
                Some(target) => format!("{target}\\{rest}"),
                None => join_namespace(map.namespace(), body),
            },
            None => match map.resolve_import(ImportKind::for_symbol(kind), body) {
                Some(target) => target.to_string(),
                None => join_namespace(map.namespace(), body),
            },
        };
        let qsn = Qsn::from_fully_qualified_string(kind, &resolved)?;
        Ok(qsn.with_alternate_id(alternate_id))
    }

    #[inline]
    pub fn kind(&self) -> SymbolKind {
        self.0.kind
    }

    /// Normalized namespace (`\` for the root). Members report their owner's.
    #[inline]
    pub fn namespace(&self) -> &str {
        &self.0.namespace
    }

    /// Canonical bare name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn alternate_id(&self) -> u32 {
        self.0.alternate_id
    }

    /// The owning class-like of a member name.
    #[inline]
    pub fn owner(&self) -> Option<&Qsn> {
        self.0.owner.as_ref()
    }

    /// The canonical string form.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0.text
    }

    /// The case-folded form used for equality and hashing.
    #[inline]
    pub fn lookup_key(&self) -> &str {
        &self.0.key
    }

    pub fn with_alternate_id(&self, alternate_id: u32) -> Qsn {
        if alternate_id == self.0.alternate_id {
            return self.clone();
        }
        match &self.0.owner {
            Some(owner) => Qsn::member(self.0.kind, owner, &self.0.name, alternate_id),
            None => Qsn::make(self.0.kind, &self.0.namespace, &self.0.name, alternate_id),
        }
    }

    /// This name with alternate id 0.
    pub fn canonical(&self) -> Qsn {
        self.with_alternate_id(0)
    }

    #[inline]
    pub fn is_alternate(&self) -> bool {
        self.0.alternate_id != 0
    }

    /// Number of names in the intern table.
    pub fn interned_count() -> usize {
        INTERNER.len()
    }

    /// Drop every interned name held only by the intern table and return
    /// how many were dropped. Names still referenced elsewhere keep their
    /// identity. Members hold their owner, so passes repeat until one
    /// releases nothing.
    pub fn release_unused() -> usize {
        let mut released = 0;
        loop {
            let mut pass = 0;
            INTERNER.retain(|_, qsn| {
                let live = Arc::strong_count(&qsn.0) > 1;
                if !live {
                    pass += 1;
                }
                live
            });
            if pass == 0 {
                break;
            }
            released += pass;
        }
        debug!(released, remaining = INTERNER.len(), "released unused names");
        released
    }
}

fn intern(data: QsnData) -> Qsn {
    let memo_key = (data.kind, data.text.clone());
    if let Some(existing) = INTERNER.get(&memo_key) {
        return existing.value().clone();
    }
    INTERNER
        .entry(memo_key)
        .or_insert_with(|| Qsn(Arc::new(data)))
        .value()
        .clone()
}

fn normalize_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim().trim_matches('\\');
    if trimmed.is_empty() {
        ROOT_NAMESPACE.to_string()
    } else {
        format!("\\{trimmed}")
    }
}

fn join_namespace(namespace: &str, name: &str) -> String {
    if namespace.is_empty() || namespace == ROOT_NAMESPACE {
        format!("\\{name}")
    } else {
        format!("{namespace}\\{name}")
    }
}

fn canonical_name(kind: SymbolKind, name: &str) -> String {
    let name = name.trim();
    if kind.folds_name_case() {
        name.to_ascii_lowercase()
    } else {
        name.to_string()
    }
}

fn push_alternate(text: &mut String, alternate_id: u32) {
    if alternate_id != 0 {
        text.push(',');
        text.push_str(&alternate_id.to_string());
    }
}

fn split_alternate<'a>(text: &'a str, original: &str) -> Result<(&'a str, u32), NameError> {
    match text.rsplit_once(',') {
        Some((body, id)) => {
            let alternate_id = id
                .trim()
                .parse::<u32>()
                .map_err(|_| NameError::malformed(original, "invalid alternate id"))?;
            Ok((body.trim_end(), alternate_id))
        }
        None => Ok((text, 0)),
    }
}

fn split_member<'a>(text: &'a str, original: &str) -> Result<(&'a str, &'a str), NameError> {
    let (owner, member) = text
        .split_once("::")
        .ok_or_else(|| NameError::malformed(original, "expected Class::member"))?;
    if owner.trim().is_empty() {
        return Err(NameError::malformed(original, "missing class name"));
    }
    Ok((owner.trim(), member.trim()))
}

fn parse_member(
    kind: SymbolKind,
    owner: &Qsn,
    member_text: &str,
    original: &str,
) -> Result<Qsn, NameError> {
    let (member, alternate_id) = split_alternate(member_text, original)?;
    let bare = match kind {
        SymbolKind::Property => member.strip_prefix('$').unwrap_or(member),
        _ => member,
    };
    if !is_identifier(bare) {
        return Err(NameError::malformed(original, "invalid member name"));
    }
    Ok(Qsn::member(kind, owner, bare, alternate_id))
}

/// `[A-Za-z_\x80-..][A-Za-z0-9_\x80-..]*`
fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() || !c.is_ascii() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric() || !c.is_ascii())
}

impl PartialEq for Qsn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || (self.0.kind == other.0.kind && self.0.key == other.0.key)
    }
}

impl Eq for Qsn {}

impl Hash for Qsn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.kind.hash(state);
        self.0.key.hash(state);
    }
}

impl PartialOrd for Qsn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Qsn {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .kind
            .cmp(&other.0.kind)
            .then_with(|| self.0.key.cmp(&other.0.key))
    }
}

impl fmt::Display for Qsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.text)
    }
}

impl fmt::Debug for Qsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qsn({:?} {})", self.0.kind, self.0.text)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename = "Qsn")]
struct QsnRepr {
    kind: SymbolKind,
    name: String,
}

impl Serialize for Qsn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        QsnRepr {
            kind: self.kind(),
            name: self.as_str().to_string(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Qsn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = QsnRepr::deserialize(deserializer)?;
        Qsn::from_fully_qualified_string(repr.kind, &repr.name).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// NamespaceMap
// =============================================================================

/// Which `use` table an import belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImportKind {
    /// `use A\B;` (classes and namespace prefixes)
    Class,
    /// `use function A\b;`
    Function,
    /// `use const A\B;`
    Constant,
}

impl ImportKind {
    pub fn for_symbol(kind: SymbolKind) -> ImportKind {
        match kind {
            SymbolKind::Function => ImportKind::Function,
            SymbolKind::GlobalConstant => ImportKind::Constant,
            _ => ImportKind::Class,
        }
    }

    fn alias_key(self, alias: &str) -> Box<str> {
        match self {
            ImportKind::Constant => alias.into(),
            ImportKind::Class | ImportKind::Function => alias.to_ascii_lowercase().into(),
        }
    }
}

/// The current namespace plus its `use` imports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceMap {
    namespace: Arc<str>,
    classes: FxHashMap<Box<str>, Arc<str>>,
    functions: FxHashMap<Box<str>, Arc<str>>,
    constants: FxHashMap<Box<str>, Arc<str>>,
}

impl Default for NamespaceMap {
    fn default() -> Self {
        NamespaceMap::new()
    }
}

impl NamespaceMap {
    /// The root namespace with no imports.
    pub fn new() -> NamespaceMap {
        NamespaceMap::for_namespace("")
    }

    /// A fresh map for `namespace`. Imports do not carry across namespaces.
    pub fn for_namespace(namespace: &str) -> NamespaceMap {
        NamespaceMap {
            namespace: Arc::from(normalize_namespace(namespace)),
            classes: FxHashMap::default(),
            functions: FxHashMap::default(),
            constants: FxHashMap::default(),
        }
    }

    /// Normalized current namespace (`\` for the root).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Record `use target [as alias]`. Without an alias the last segment of
    /// `target` is used.
    pub fn add_import(&mut self, kind: ImportKind, target: &str, alias: Option<&str>) {
        let target = target.trim().trim_start_matches('\\');
        let alias = alias
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .unwrap_or_else(|| target.rsplit('\\').next().unwrap_or(target));
        let key = kind.alias_key(alias);
        let value: Arc<str> = Arc::from(format!("\\{target}"));
        self.table_mut(kind).insert(key, value);
    }

    /// The fully qualified target imported under `alias`.
    pub fn resolve_import(&self, kind: ImportKind, alias: &str) -> Option<&str> {
        self.table(kind)
            .get(&*kind.alias_key(alias))
            .map(|target| &**target)
    }

    pub fn import_count(&self) -> usize {
        self.classes.len() + self.functions.len() + self.constants.len()
    }

    fn table(&self, kind: ImportKind) -> &FxHashMap<Box<str>, Arc<str>> {
        match kind {
            ImportKind::Class => &self.classes,
            ImportKind::Function => &self.functions,
            ImportKind::Constant => &self.constants,
        }
    }

    fn table_mut(&mut self, kind: ImportKind) -> &mut FxHashMap<Box<str>, Arc<str>> {
        match kind {
            ImportKind::Class => &mut self.classes,
            ImportKind::Function => &mut self.functions,
            ImportKind::Constant => &mut self.constants,
        }
    }
}

#[cfg(test)]
#[path = "../tests/qsn_tests.rs"]
mod tests;
