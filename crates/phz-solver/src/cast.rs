//! Cast compatibility between types.
//!
//! The structural rules live on [`Type::can_cast_to_type`]. Class
//! inheritance is not structural: callers that need `Derived` to cast to
//! `Base` go through [`UnionType::can_cast_to_union_type_in`], which expands
//! the source over its ancestors first.

use crate::expand::TypeDatabase;
use crate::types::{ArrayKey, LiteralValue, ShapeKey, Type};
use crate::union_type::UnionType;
use tracing::trace;

/// How many members of the source must be castable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Soundness {
    /// At least one source member casts to some target member.
    #[default]
    Lenient,
    /// Every source member casts to some target member.
    Strict,
}

impl Type {
    /// Whether a value of this type may be used where `target` is expected,
    /// without consulting the class hierarchy.
    pub fn can_cast_to_type(&self, target: &Type) -> bool {
        if self == target {
            return true;
        }
        match (self, target) {
            (_, Type::Mixed) | (Type::Mixed, _) => true,
            (Type::Template(_), _) | (_, Type::Template(_)) => true,

            (Type::Null | Type::Void, Type::Null | Type::Void) => true,
            (Type::Null | Type::Void, _) => false,

            (Type::True | Type::False, Type::Bool) => true,
            (Type::Int, Type::Float) => true,
            (Type::Literal(LiteralValue::Int(_)), Type::Int | Type::Float) => true,
            (Type::Literal(LiteralValue::String(_)), Type::String | Type::Callable) => true,
            (Type::String, Type::Callable) => true,

            (Type::Array, Type::Iterable | Type::GenericArray { .. } | Type::ArrayShape(_)) => {
                true
            }
            (Type::GenericArray { .. } | Type::ArrayShape(_), Type::Array | Type::Iterable) => {
                true
            }
            (Type::GenericArray { .. } | Type::ArrayShape(_), Type::Callable) => true,
            (Type::Array, Type::Callable) => true,
            (
                Type::GenericArray {
                    key: source_key,
                    element: source,
                },
                Type::GenericArray {
                    key: target_key,
                    element: target,
                },
            ) => {
                (*target_key == ArrayKey::Mixed || source_key == target_key)
                    && source.can_cast_to_union_type(target, Soundness::Lenient)
            }
            (Type::ArrayShape(fields), Type::GenericArray { key, element }) => {
                fields.iter().all(|(field_key, value)| {
                    let key_ok = match (key, field_key) {
                        (ArrayKey::Mixed, _) => true,
                        (ArrayKey::Int, ShapeKey::Int(_)) => true,
                        (ArrayKey::String, ShapeKey::String(_)) => true,
                        _ => false,
                    };
                    key_ok && value.can_cast_to_union_type(element, Soundness::Lenient)
                })
            }
            (Type::ArrayShape(source), Type::ArrayShape(target)) => {
                target.iter().all(|(key, expected)| {
                    source
                        .iter()
                        .find(|(field, _)| field == key)
                        .is_some_and(|(_, actual)| {
                            actual.can_cast_to_union_type(expected, Soundness::Lenient)
                        })
                })
            }
            (Type::GenericArray { .. }, Type::ArrayShape(_)) => true,

            (Type::Class(qsn), Type::Callable) => qsn.lookup_key() == "\\closure",
            (Type::Class(_), Type::Object) => true,
            (Type::StaticType | Type::SelfType | Type::ParentType, Type::Object) => true,

            _ => false,
        }
    }
}

impl UnionType {
    /// Structural cast check. Unknown, impossible and empty sides always cast.
    pub fn can_cast_to_union_type(&self, target: &UnionType, mode: Soundness) -> bool {
        if self.is_empty() || target.is_empty() {
            return true;
        }
        let castable = |source: &Type| target.iter().any(|t| source.can_cast_to_type(t));
        match mode {
            Soundness::Lenient => self.iter().any(castable),
            Soundness::Strict => self.iter().all(castable),
        }
    }

    /// Cast check that honours class inheritance: each source member is
    /// expanded over its ancestors before comparing. An expansion failure
    /// falls back to the member itself.
    pub fn can_cast_to_union_type_in(
        &self,
        target: &UnionType,
        mode: Soundness,
        db: &dyn TypeDatabase,
    ) -> bool {
        if self.is_empty() || target.is_empty() {
            return true;
        }
        let castable = |source: &Type| {
            if !source.needs_expansion() {
                return target.iter().any(|t| source.can_cast_to_type(t));
            }
            let expanded = match UnionType::of(source.clone()).as_expanded_types(db) {
                Ok(expanded) => expanded,
                Err(err) => {
                    trace!(source = %source, error = %err, "cast check without expansion");
                    UnionType::of(source.clone())
                }
            };
            expanded
                .iter()
                .any(|member| target.iter().any(|t| member.can_cast_to_type(t)))
        };
        match mode {
            Soundness::Lenient => self.iter().any(castable),
            Soundness::Strict => self.iter().all(castable),
        }
    }
}

#[cfg(test)]
#[path = "../tests/cast_tests.rs"]
mod tests;
