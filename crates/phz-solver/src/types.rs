//! The atomic types a [`UnionType`] is built from.

use crate::qsn::Qsn;
use crate::union_type::UnionType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A literal value carried by a literal type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LiteralValue {
    Int(i64),
    String(Arc<str>),
}

impl LiteralValue {
    pub fn is_falsy(&self) -> bool {
        match self {
            LiteralValue::Int(value) => *value == 0,
            LiteralValue::String(value) => value.is_empty() || &**value == "0",
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Int(value) => write!(f, "{value}"),
            LiteralValue::String(value) => write!(f, "'{value}'"),
        }
    }
}

/// Key of an array-shape field.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShapeKey {
    Int(i64),
    String(Arc<str>),
}

impl fmt::Display for ShapeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeKey::Int(value) => write!(f, "{value}"),
            ShapeKey::String(value) => f.write_str(value),
        }
    }
}

/// Key type of a generic array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArrayKey {
    Int,
    String,
    Mixed,
}

/// One atomic type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Null,
    Bool,
    True,
    False,
    Int,
    Float,
    String,
    Array,
    Iterable,
    Object,
    Callable,
    Resource,
    Mixed,
    Void,
    Literal(LiteralValue),
    /// An instance of a class-like.
    Class(Qsn),
    /// `array<key, element>`, written `element[]` when the key is mixed.
    GenericArray {
        key: ArrayKey,
        element: UnionType,
    },
    /// `array{k: T, ...}`, fields sorted by key.
    ArrayShape(Arc<[(ShapeKey, UnionType)]>),
    /// A template parameter of the enclosing class or function.
    Template(Arc<str>),
    /// `static` inside a class body, bound late.
    StaticType,
    SelfType,
    ParentType,
}

/// Whether every value of a type is truthy, falsy, or could be either.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Truthiness {
    AlwaysTruthy,
    AlwaysFalsy,
    Either,
}

impl Type {
    /// Map a keyword (`int`, `?` excluded) to its type, or `None` when the
    /// word names a class.
    pub fn from_keyword(word: &str) -> Option<Type> {
        let lower = word.to_ascii_lowercase();
        let ty = match lower.as_str() {
            "null" => Type::Null,
            "bool" | "boolean" => Type::Bool,
            "true" => Type::True,
            "false" => Type::False,
            "int" | "integer" => Type::Int,
            "float" | "double" => Type::Float,
            "string" => Type::String,
            "array" => Type::Array,
            "iterable" => Type::Iterable,
            "object" => Type::Object,
            "callable" => Type::Callable,
            "resource" => Type::Resource,
            "mixed" => Type::Mixed,
            "void" => Type::Void,
            "static" => Type::StaticType,
            "self" => Type::SelfType,
            "parent" => Type::ParentType,
            _ => return None,
        };
        Some(ty)
    }

    pub fn int_literal(value: i64) -> Type {
        Type::Literal(LiteralValue::Int(value))
    }

    pub fn string_literal(value: &str) -> Type {
        Type::Literal(LiteralValue::String(Arc::from(value)))
    }

    /// `element[]`
    pub fn array_of(element: UnionType) -> Type {
        Type::GenericArray {
            key: ArrayKey::Mixed,
            element,
        }
    }

    /// An array shape with fields sorted by key (last duplicate wins).
    pub fn array_shape(fields: impl IntoIterator<Item = (ShapeKey, UnionType)>) -> Type {
        let mut sorted: Vec<(ShapeKey, UnionType)> = Vec::new();
        for (key, value) in fields {
            match sorted.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = value,
                None => sorted.push((key, value)),
            }
        }
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        Type::ArrayShape(Arc::from(sorted))
    }

    /// `array{}`
    pub fn empty_array() -> Type {
        Type::ArrayShape(Arc::from(Vec::new()))
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Type::Null | Type::Void)
    }

    #[inline]
    pub fn is_mixed(&self) -> bool {
        matches!(self, Type::Mixed)
    }

    /// The class named by a `Class` type.
    #[inline]
    pub fn class_qsn(&self) -> Option<&Qsn> {
        match self {
            Type::Class(qsn) => Some(qsn),
            _ => None,
        }
    }

    /// Object types, including the late-bound class keywords.
    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            Type::Object | Type::Class(_) | Type::StaticType | Type::SelfType | Type::ParentType
        )
    }

    pub fn is_array_like(&self) -> bool {
        matches!(
            self,
            Type::Array | Type::GenericArray { .. } | Type::ArrayShape(_)
        )
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Type::Bool | Type::True | Type::False | Type::Int | Type::Float | Type::String
        ) || matches!(self, Type::Literal(_))
    }

    /// Whether this type could hold a value whose class has ancestors.
    pub fn needs_expansion(&self) -> bool {
        match self {
            Type::Class(_) => true,
            Type::GenericArray { element, .. } => element.types().iter().any(Type::needs_expansion),
            _ => false,
        }
    }

    pub fn truthiness(&self) -> Truthiness {
        match self {
            Type::Null | Type::False | Type::Void => Truthiness::AlwaysFalsy,
            Type::True
            | Type::Object
            | Type::Class(_)
            | Type::Callable
            | Type::Resource
            | Type::StaticType
            | Type::SelfType
            | Type::ParentType => Truthiness::AlwaysTruthy,
            Type::Literal(value) if value.is_falsy() => Truthiness::AlwaysFalsy,
            Type::Literal(_) => Truthiness::AlwaysTruthy,
            Type::ArrayShape(fields) if fields.is_empty() => Truthiness::AlwaysFalsy,
            Type::ArrayShape(_) => Truthiness::AlwaysTruthy,
            Type::Bool
            | Type::Int
            | Type::Float
            | Type::String
            | Type::Array
            | Type::Iterable
            | Type::Mixed
            | Type::GenericArray { .. }
            | Type::Template(_) => Truthiness::Either,
        }
    }

    /// The part of this type that survives a truthy check.
    pub fn truthy_variants(&self) -> Vec<Type> {
        match self.truthiness() {
            Truthiness::AlwaysTruthy => vec![self.clone()],
            Truthiness::AlwaysFalsy => Vec::new(),
            Truthiness::Either => match self {
                Type::Bool => vec![Type::True],
                _ => vec![self.clone()],
            },
        }
    }

    /// The part of this type that survives a falsy check.
    pub fn falsy_variants(&self) -> Vec<Type> {
        match self.truthiness() {
            Truthiness::AlwaysFalsy => vec![self.clone()],
            Truthiness::AlwaysTruthy => Vec::new(),
            Truthiness::Either => match self {
                Type::Bool => vec![Type::False],
                Type::Int => vec![Type::int_literal(0)],
                Type::String => vec![Type::string_literal(""), Type::string_literal("0")],
                Type::Array | Type::GenericArray { .. } | Type::Iterable => {
                    vec![Type::empty_array()]
                }
                _ => vec![self.clone()],
            },
        }
    }

    /// `int` for `1`, `string` for `'a'`, `bool` for `true`/`false`.
    pub fn widened(&self) -> Type {
        match self {
            Type::Literal(LiteralValue::Int(_)) => Type::Int,
            Type::Literal(LiteralValue::String(_)) => Type::String,
            Type::True | Type::False => Type::Bool,
            Type::ArrayShape(_) | Type::GenericArray { .. } => Type::Array,
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Null => f.write_str("null"),
            Type::Bool => f.write_str("bool"),
            Type::True => f.write_str("true"),
            Type::False => f.write_str("false"),
            Type::Int => f.write_str("int"),
            Type::Float => f.write_str("float"),
            Type::String => f.write_str("string"),
            Type::Array => f.write_str("array"),
            Type::Iterable => f.write_str("iterable"),
            Type::Object => f.write_str("object"),
            Type::Callable => f.write_str("callable"),
            Type::Resource => f.write_str("resource"),
            Type::Mixed => f.write_str("mixed"),
            Type::Void => f.write_str("void"),
            Type::Literal(value) => write!(f, "{value}"),
            Type::Class(qsn) => write!(f, "{qsn}"),
            Type::GenericArray { key, element } => {
                let key = match key {
                    ArrayKey::Int => "int",
                    ArrayKey::String => "string",
                    ArrayKey::Mixed => {
                        return if element.len() == 1 {
                            write!(f, "{element}[]")
                        } else {
                            write!(f, "array<{element}>")
                        };
                    }
                };
                write!(f, "array<{key},{element}>")
            }
            Type::ArrayShape(fields) => {
                f.write_str("array{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{key}:{value}")?;
                }
                f.write_str("}")
            }
            Type::Template(name) => f.write_str(name),
            Type::StaticType => f.write_str("static"),
            Type::SelfType => f.write_str("self"),
            Type::ParentType => f.write_str("parent"),
        }
    }
}

#[cfg(test)]
#[path = "../tests/types_tests.rs"]
mod tests;
