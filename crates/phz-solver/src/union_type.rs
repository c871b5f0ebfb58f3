//! Immutable sets of atomic types.
//!
//! A [`UnionType`] carries two member lists: the inferred types and the
//! "real" types (those guaranteed by native declarations). The real list is
//! empty when nothing is guaranteed. Every operation returns a new value.
//!
//! Two states have no members:
//! - **unknown** (`UnionType::empty()`): nothing is known; casts freely.
//! - **impossible** (`UnionType::impossible()`): the value cannot exist,
//!   e.g. after narrowing `int` by `is_string()`.

use crate::error::NameError;
use crate::qsn::{NamespaceMap, Qsn, SymbolKind};
use crate::types::{ArrayKey, ShapeKey, Truthiness, Type};
use bitflags::bitflags;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

bitflags! {
    /// State bits carried alongside the members.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct UnionFlags: u8 {
        /// The variable may not be defined on some path reaching this point.
        const POSSIBLY_UNDEFINED = 1 << 0;
        /// No value can have this type.
        const IMPOSSIBLE = 1 << 1;
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct UnionType {
    types: Arc<[Type]>,
    real: Arc<[Type]>,
    flags: UnionFlags,
}

impl Default for UnionType {
    fn default() -> Self {
        UnionType::empty()
    }
}

fn no_types() -> Arc<[Type]> {
    Arc::from(Vec::new())
}

/// Deduplicate, then fold `true|false` into `bool` and drop `true`/`false`
/// next to `bool`.
fn normalize(types: impl IntoIterator<Item = Type>) -> Arc<[Type]> {
    let mut out: Vec<Type> = Vec::new();
    for ty in types {
        if !out.contains(&ty) {
            out.push(ty);
        }
    }
    let has_true = out.contains(&Type::True);
    let has_false = out.contains(&Type::False);
    if has_true && has_false && !out.contains(&Type::Bool) {
        let first = out
            .iter()
            .position(|ty| matches!(ty, Type::True | Type::False))
            .unwrap_or(out.len());
        out.insert(first, Type::Bool);
    }
    if out.contains(&Type::Bool) {
        out.retain(|ty| !matches!(ty, Type::True | Type::False));
    }
    Arc::from(out)
}

impl UnionType {
    /// The unknown type.
    pub fn empty() -> UnionType {
        UnionType {
            types: no_types(),
            real: no_types(),
            flags: UnionFlags::empty(),
        }
    }

    /// The bottom type.
    pub fn impossible() -> UnionType {
        UnionType {
            types: no_types(),
            real: no_types(),
            flags: UnionFlags::IMPOSSIBLE,
        }
    }

    pub fn of(ty: Type) -> UnionType {
        UnionType::from_types([ty])
    }

    pub fn from_types(types: impl IntoIterator<Item = Type>) -> UnionType {
        UnionType {
            types: normalize(types),
            real: no_types(),
            flags: UnionFlags::empty(),
        }
    }

    /// A union whose members are also its real types (native declarations).
    pub fn from_real_types(types: impl IntoIterator<Item = Type>) -> UnionType {
        let types = normalize(types);
        UnionType {
            real: types.clone(),
            types,
            flags: UnionFlags::empty(),
        }
    }

    /// Build from narrowed parts. An empty member list means the value can
    /// no longer exist.
    pub(crate) fn from_narrowed(types: Vec<Type>, real: Vec<Type>, flags: UnionFlags) -> UnionType {
        if types.is_empty() {
            return UnionType {
                types: no_types(),
                real: no_types(),
                flags: (flags - UnionFlags::POSSIBLY_UNDEFINED) | UnionFlags::IMPOSSIBLE,
            };
        }
        UnionType {
            types: normalize(types),
            real: normalize(real),
            flags: flags - UnionFlags::IMPOSSIBLE,
        }
    }

    pub fn nullable(ty: Type) -> UnionType {
        UnionType::from_types([ty, Type::Null])
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[inline]
    pub fn types(&self) -> &[Type] {
        &self.types
    }

    #[inline]
    pub fn real_types(&self) -> &[Type] {
        &self.real
    }

    #[inline]
    pub fn flags(&self) -> UnionFlags {
        self.flags
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// No members (unknown or impossible).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    #[inline]
    pub fn is_unknown(&self) -> bool {
        self.types.is_empty() && !self.flags.contains(UnionFlags::IMPOSSIBLE)
    }

    #[inline]
    pub fn is_impossible(&self) -> bool {
        self.flags.contains(UnionFlags::IMPOSSIBLE)
    }

    #[inline]
    pub fn is_possibly_undefined(&self) -> bool {
        self.flags.contains(UnionFlags::POSSIBLY_UNDEFINED)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Type> {
        self.types.iter()
    }

    pub fn has_type(&self, ty: &Type) -> bool {
        self.types.contains(ty)
    }

    /// Exactly `null` (or `void`), and nothing else.
    pub fn is_null(&self) -> bool {
        !self.types.is_empty() && self.types.iter().all(Type::is_null)
    }

    pub fn contains_nullable(&self) -> bool {
        self.types.iter().any(Type::is_null)
    }

    pub fn has_mixed(&self) -> bool {
        self.types.iter().any(Type::is_mixed)
    }

    pub fn has_class_types(&self) -> bool {
        self.types.iter().any(|ty| ty.class_qsn().is_some())
    }

    pub fn class_types(&self) -> impl Iterator<Item = &Qsn> + '_ {
        self.types.iter().filter_map(Type::class_qsn)
    }

    /// Truthiness of the union as a whole. Unknown is `Either`.
    pub fn truthiness(&self) -> Truthiness {
        let mut members = self.types.iter().map(Type::truthiness);
        let Some(first) = members.next() else {
            return Truthiness::Either;
        };
        if members.all(|t| t == first) {
            first
        } else {
            Truthiness::Either
        }
    }

    /// The real types as a union of their own.
    pub fn real_union(&self) -> UnionType {
        UnionType::from_types(self.real.iter().cloned())
    }

    // -------------------------------------------------------------------------
    // Derivation
    // -------------------------------------------------------------------------

    /// Add one member. Flags carry over, `POSSIBLY_UNDEFINED` included, and
    /// an impossible union stops being impossible. Adding a new member drops
    /// the real types.
    pub fn with_type(&self, ty: Type) -> UnionType {
        if self.has_type(&ty) && !self.is_impossible() {
            return self.clone();
        }
        UnionType {
            types: normalize(self.types.iter().cloned().chain(std::iter::once(ty))),
            real: no_types(),
            flags: self.flags - UnionFlags::IMPOSSIBLE,
        }
    }

    /// Set union. An impossible side contributes nothing; real types are kept
    /// only when both sides have them.
    pub fn with_union_type(&self, other: &UnionType) -> UnionType {
        if self.is_impossible() {
            return other.clone();
        }
        if other.is_impossible() {
            return self.clone();
        }
        let real = if self.real.is_empty() || other.real.is_empty() {
            no_types()
        } else {
            normalize(self.real.iter().chain(other.real.iter()).cloned())
        };
        UnionType {
            types: normalize(self.types.iter().chain(other.types.iter()).cloned()),
            real,
            flags: self.flags | other.flags,
        }
    }

    pub fn without_type(&self, ty: &Type) -> UnionType {
        UnionType {
            types: normalize(self.types.iter().filter(|t| *t != ty).cloned()),
            real: normalize(self.real.iter().filter(|t| *t != ty).cloned()),
            flags: self.flags,
        }
    }

    /// Strip `null`; a union without it comes back unchanged.
    pub fn as_non_nullable(&self) -> UnionType {
        UnionType {
            types: normalize(self.types.iter().filter(|t| !t.is_null()).cloned()),
            real: normalize(self.real.iter().filter(|t| !t.is_null()).cloned()),
            flags: self.flags,
        }
    }

    pub fn as_nullable(&self) -> UnionType {
        let mut out = self.with_type(Type::Null);
        if !self.real.is_empty() {
            out.real = normalize(self.real.iter().cloned().chain(std::iter::once(Type::Null)));
        }
        out
    }

    pub fn with_possibly_undefined(&self, possibly_undefined: bool) -> UnionType {
        let mut out = self.clone();
        out.flags.set(UnionFlags::POSSIBLY_UNDEFINED, possibly_undefined);
        out
    }

    pub fn with_real_types(&self, real: impl IntoIterator<Item = Type>) -> UnionType {
        UnionType {
            types: self.types.clone(),
            real: normalize(real),
            flags: self.flags,
        }
    }

    /// This union with its members also recorded as real types.
    pub fn as_real(&self) -> UnionType {
        UnionType {
            types: self.types.clone(),
            real: self.types.clone(),
            flags: self.flags,
        }
    }

    pub fn without_real_types(&self) -> UnionType {
        UnionType {
            types: self.types.clone(),
            real: no_types(),
            flags: self.flags,
        }
    }

    // -------------------------------------------------------------------------
    // Parsing
    // -------------------------------------------------------------------------

    /// Parse a declared type such as `?int`, `Foo|null`, `string[]`,
    /// `array<int,Foo>` or `array{id:int}`. Class names resolve through `map`.
    pub fn from_type_string(text: &str, map: &NamespaceMap) -> Result<UnionType, NameError> {
        UnionType::from_type_string_with_templates(text, map, &[])
    }

    /// Like [`from_type_string`](Self::from_type_string), treating the names
    /// in `templates` as template parameters.
    pub fn from_type_string_with_templates(
        text: &str,
        map: &NamespaceMap,
        templates: &[Arc<str>],
    ) -> Result<UnionType, NameError> {
        let mut types = Vec::new();
        for part in split_top_level(text, '|') {
            types.extend(parse_atomic(part, text, map, templates)?);
        }
        Ok(UnionType::from_types(types))
    }
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '{' | '(' | '[' => depth += 1,
            '>' | '}' | ')' | ']' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_atomic(
    part: &str,
    original: &str,
    map: &NamespaceMap,
    templates: &[Arc<str>],
) -> Result<Vec<Type>, NameError> {
    let part = part.trim();
    if part.is_empty() {
        return Err(NameError::malformed(original, "empty type"));
    }
    if let Some(inner) = part.strip_prefix('?') {
        let mut types = parse_atomic(inner, original, map, templates)?;
        types.push(Type::Null);
        return Ok(types);
    }
    if let Some(inner) = part.strip_prefix('(').and_then(|p| p.strip_suffix(')')) {
        return Ok(UnionType::from_type_string_with_templates(inner, map, templates)?
            .types()
            .to_vec());
    }
    if let Some(element) = part.strip_suffix("[]") {
        let element = UnionType::from_types(parse_atomic(element, original, map, templates)?);
        return Ok(vec![Type::array_of(element)]);
    }
    let lower = part.to_ascii_lowercase();
    if lower.starts_with("array<") && part.ends_with('>') {
        let inner = &part["array<".len()..part.len() - 1];
        let args = split_top_level(inner, ',');
        let (key, element) = match args.as_slice() {
            [element] => (ArrayKey::Mixed, *element),
            [key, element] => {
                let key = match key.trim().to_ascii_lowercase().as_str() {
                    "int" => ArrayKey::Int,
                    "string" => ArrayKey::String,
                    _ => ArrayKey::Mixed,
                };
                (key, *element)
            }
            _ => return Err(NameError::malformed(original, "bad array parameters")),
        };
        let element = UnionType::from_type_string_with_templates(element, map, templates)?;
        return Ok(vec![Type::GenericArray { key, element }]);
    }
    if lower.starts_with("array{") && part.ends_with('}') {
        let inner = &part["array{".len()..part.len() - 1];
        let mut fields = Vec::new();
        for field in split_top_level(inner, ',') {
            if field.trim().is_empty() {
                continue;
            }
            let (key, value) = field
                .split_once(':')
                .ok_or_else(|| NameError::malformed(original, "shape field needs a type"))?;
            let key = key.trim().trim_matches(|c| c == '\'' || c == '"');
            let key = match key.parse::<i64>() {
                Ok(index) => ShapeKey::Int(index),
                Err(_) => ShapeKey::String(Arc::from(key)),
            };
            let value = UnionType::from_type_string_with_templates(value, map, templates)?;
            fields.push((key, value));
        }
        return Ok(vec![Type::array_shape(fields)]);
    }
    if let Some(keyword) = Type::from_keyword(part) {
        return Ok(vec![keyword]);
    }
    if let Some(template) = templates.iter().find(|t| &***t == part) {
        return Ok(vec![Type::Template(template.clone())]);
    }
    let qsn = Qsn::from_string_in_context(SymbolKind::Class, part, map)?;
    Ok(vec![Type::Class(qsn)])
}

fn same_members(a: &[Type], b: &[Type]) -> bool {
    a.len() == b.len() && a.iter().all(|ty| b.contains(ty))
}

impl PartialEq for UnionType {
    fn eq(&self, other: &Self) -> bool {
        self.flags == other.flags
            && same_members(&self.types, &other.types)
            && same_members(&self.real, &other.real)
    }
}

impl Eq for UnionType {}

/// Order-independent: members are hashed individually and combined with a
/// commutative sum.
impl Hash for UnionType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        fn member_sum(types: &[Type]) -> u64 {
            types.iter().fold(0u64, |acc, ty| {
                let mut hasher = FxHasher::default();
                ty.hash(&mut hasher);
                acc.wrapping_add(hasher.finish())
            })
        }
        self.flags.hash(state);
        state.write_usize(self.types.len());
        state.write_u64(member_sum(&self.types));
        state.write_u64(member_sum(&self.real));
    }
}

impl fmt::Display for UnionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_impossible() {
            return f.write_str("impossible");
        }
        let mut parts: Vec<String> = self.types.iter().map(ToString::to_string).collect();
        parts.sort();
        if self.is_possibly_undefined() {
            parts.push("undefined".to_string());
        }
        f.write_str(&parts.join("|"))
    }
}

impl fmt::Debug for UnionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnionType({self})")
    }
}

impl FromIterator<Type> for UnionType {
    fn from_iter<I: IntoIterator<Item = Type>>(iter: I) -> Self {
        UnionType::from_types(iter)
    }
}

#[cfg(test)]
#[path = "../tests/union_type_tests.rs"]
mod tests;
