//! Type narrowing for conditions.
//!
//! A [`TypeGuard`] is the AST-agnostic form of a condition about one value:
//! `is_string($x)`, `$x instanceof Foo`, `$x === null`, `$x`, `isset($x)`.
//! [`NarrowingContext::narrow`] applies a guard to a union for either branch
//! of the condition (`sense == true` for the branch where it holds).
//!
//! Architecture:
//! - **Checker**: recognizes guards in condition expressions (WHERE)
//! - **Solver**: applies guards to union types (WHAT)
//!
//! An empty result is [`UnionType::impossible`]; the caller decides whether
//! that deserves a diagnostic.

use crate::error::TypeError;
use crate::expand::TypeDatabase;
use crate::qsn::Qsn;
use crate::types::{LiteralValue, Truthiness, Type};
use crate::union_type::UnionType;
use phz_common::limits;
use std::cell::RefCell;
use tracing::{Level, span, trace};

/// Built-in `is_*` checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeCheck {
    String,
    Int,
    Float,
    Bool,
    Null,
    Array,
    Object,
    Numeric,
    Scalar,
    Callable,
    Iterable,
    Resource,
}

impl TypeCheck {
    /// Recognize a type-check function by name (`is_string`, `\is_int`, `is_long`, ...).
    pub fn from_function_name(name: &str) -> Option<TypeCheck> {
        let name = name.trim_start_matches('\\').to_ascii_lowercase();
        let check = match name.as_str() {
            "is_string" => TypeCheck::String,
            "is_int" | "is_integer" | "is_long" => TypeCheck::Int,
            "is_float" | "is_double" => TypeCheck::Float,
            "is_bool" => TypeCheck::Bool,
            "is_null" => TypeCheck::Null,
            "is_array" => TypeCheck::Array,
            "is_object" => TypeCheck::Object,
            "is_numeric" => TypeCheck::Numeric,
            "is_scalar" => TypeCheck::Scalar,
            "is_callable" => TypeCheck::Callable,
            "is_iterable" => TypeCheck::Iterable,
            "is_resource" => TypeCheck::Resource,
            _ => return None,
        };
        Some(check)
    }

    pub fn function_name(self) -> &'static str {
        match self {
            TypeCheck::String => "is_string",
            TypeCheck::Int => "is_int",
            TypeCheck::Float => "is_float",
            TypeCheck::Bool => "is_bool",
            TypeCheck::Null => "is_null",
            TypeCheck::Array => "is_array",
            TypeCheck::Object => "is_object",
            TypeCheck::Numeric => "is_numeric",
            TypeCheck::Scalar => "is_scalar",
            TypeCheck::Callable => "is_callable",
            TypeCheck::Iterable => "is_iterable",
            TypeCheck::Resource => "is_resource",
        }
    }

    /// The types a value of unknown type has after the check passes.
    pub fn target_types(self) -> Vec<Type> {
        match self {
            TypeCheck::String => vec![Type::String],
            TypeCheck::Int => vec![Type::Int],
            TypeCheck::Float => vec![Type::Float],
            TypeCheck::Bool => vec![Type::Bool],
            TypeCheck::Null => vec![Type::Null],
            TypeCheck::Array => vec![Type::Array],
            TypeCheck::Object => vec![Type::Object],
            TypeCheck::Numeric => vec![Type::Int, Type::Float, Type::String],
            TypeCheck::Scalar => vec![Type::Bool, Type::Int, Type::Float, Type::String],
            TypeCheck::Callable => vec![Type::Callable],
            TypeCheck::Iterable => vec![Type::Iterable],
            TypeCheck::Resource => vec![Type::Resource],
        }
    }

    pub fn target(self) -> UnionType {
        UnionType::from_types(self.target_types())
    }

    fn classify(self, ty: &Type) -> Membership {
        match ty {
            Type::Mixed => return Membership::Split(self.target_types(), vec![Type::Mixed]),
            Type::Template(_) => return Membership::Split(vec![ty.clone()], vec![ty.clone()]),
            _ => {}
        }
        let always = match self {
            TypeCheck::String => matches!(
                ty,
                Type::String | Type::Literal(LiteralValue::String(_))
            ),
            TypeCheck::Int => matches!(ty, Type::Int | Type::Literal(LiteralValue::Int(_))),
            TypeCheck::Float => matches!(ty, Type::Float),
            TypeCheck::Bool => matches!(ty, Type::Bool | Type::True | Type::False),
            TypeCheck::Null => ty.is_null(),
            TypeCheck::Array => ty.is_array_like(),
            TypeCheck::Object => ty.is_object_like(),
            TypeCheck::Numeric => match ty {
                Type::Int | Type::Float | Type::Literal(LiteralValue::Int(_)) => true,
                Type::Literal(LiteralValue::String(text)) => is_numeric_string(text),
                _ => false,
            },
            TypeCheck::Scalar => ty.is_scalar(),
            TypeCheck::Callable => {
                matches!(ty, Type::Callable) || ty.class_qsn().is_some_and(is_closure)
            }
            TypeCheck::Iterable => ty.is_array_like() || matches!(ty, Type::Iterable),
            TypeCheck::Resource => matches!(ty, Type::Resource),
        };
        if always {
            return Membership::Always;
        }
        let sometimes = match self {
            TypeCheck::String => match ty {
                Type::Callable => Some((vec![Type::String], vec![Type::Callable])),
                _ => None,
            },
            TypeCheck::Array => match ty {
                Type::Iterable => Some((vec![Type::Array], vec![traversable()])),
                Type::Callable => Some((vec![Type::Array], vec![Type::Callable])),
                _ => None,
            },
            TypeCheck::Object => match ty {
                Type::Iterable => Some((vec![traversable()], vec![Type::Array])),
                Type::Callable => Some((vec![closure()], vec![Type::Callable])),
                _ => None,
            },
            TypeCheck::Numeric => match ty {
                Type::String => Some((vec![Type::String], vec![Type::String])),
                _ => None,
            },
            TypeCheck::Callable => match ty {
                Type::String
                | Type::Literal(LiteralValue::String(_))
                | Type::Array
                | Type::GenericArray { .. }
                | Type::ArrayShape(_)
                | Type::Object
                | Type::Class(_)
                | Type::StaticType
                | Type::SelfType
                | Type::ParentType => Some((vec![ty.clone()], vec![ty.clone()])),
                _ => None,
            },
            TypeCheck::Iterable => match ty {
                Type::Object => Some((vec![traversable()], vec![Type::Object])),
                Type::Class(_) | Type::StaticType | Type::SelfType | Type::ParentType => {
                    Some((vec![ty.clone()], vec![ty.clone()]))
                }
                _ => None,
            },
            _ => None,
        };
        match sometimes {
            Some((when_true, when_false)) => Membership::Split(when_true, when_false),
            None => Membership::Never,
        }
    }
}

/// How a member relates to a [`TypeCheck`].
enum Membership {
    Always,
    Never,
    /// Partly: `(survives when true, survives when false)`.
    Split(Vec<Type>, Vec<Type>),
}

fn is_numeric_string(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed.parse::<f64>().is_ok()
}

fn is_closure(qsn: &Qsn) -> bool {
    qsn.lookup_key() == "\\closure"
}

fn closure() -> Type {
    Type::Class(Qsn::class("", "Closure"))
}

fn traversable() -> Type {
    Type::Class(Qsn::class("", "Traversable"))
}

/// `<`, `<=`, `>`, `>=` with the narrowed value on the left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelationalOp {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl RelationalOp {
    /// The operator that holds exactly when this one does not.
    pub fn negated(self) -> RelationalOp {
        match self {
            RelationalOp::Less => RelationalOp::GreaterOrEqual,
            RelationalOp::LessOrEqual => RelationalOp::Greater,
            RelationalOp::Greater => RelationalOp::LessOrEqual,
            RelationalOp::GreaterOrEqual => RelationalOp::Less,
        }
    }

    /// The operator with its operands swapped (`a < b` is `b > a`).
    pub fn flipped(self) -> RelationalOp {
        match self {
            RelationalOp::Less => RelationalOp::Greater,
            RelationalOp::LessOrEqual => RelationalOp::GreaterOrEqual,
            RelationalOp::Greater => RelationalOp::Less,
            RelationalOp::GreaterOrEqual => RelationalOp::LessOrEqual,
        }
    }
}

/// AST-agnostic representation of a narrowing condition.
///
/// ```php
/// is_string($x)            // TypeGuard::IsType(TypeCheck::String)
/// $x instanceof Foo        // TypeGuard::InstanceOf(Foo)
/// get_class($x) === A::class // TypeGuard::ExactClass(\A)
/// $x === null              // TypeGuard::Identical(Type::Null)
/// $x == 5                  // TypeGuard::LooseEqual(5)
/// $x                       // TypeGuard::Truthy
/// isset($x)                // TypeGuard::IsSet
/// $x > 0                   // TypeGuard::Relational { op: Greater, value: 0 }
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum TypeGuard {
    IsType(TypeCheck),
    /// Narrows to the given classes or their subclasses.
    InstanceOf(UnionType),
    /// Narrows to exactly the given class.
    ExactClass(Qsn),
    /// `===` against a value of the given type.
    Identical(Type),
    /// `==` against a value of the given type.
    LooseEqual(Type),
    /// The value "has type T": keep compatible members, specialize
    /// supertypes of T down to T.
    HasType(UnionType),
    Truthy,
    IsSet,
    Relational {
        op: RelationalOp,
        value: LiteralValue,
    },
}

/// Applies [`TypeGuard`]s to unions, expanding classes through `db` when one
/// is available.
///
/// Expansion failures do not abort narrowing: the member is treated as
/// having no ancestors and the error is kept for [`take_errors`](Self::take_errors).
pub struct NarrowingContext<'a> {
    db: Option<&'a dyn TypeDatabase>,
    errors: RefCell<Vec<TypeError>>,
}

impl<'a> NarrowingContext<'a> {
    pub fn new(db: &'a dyn TypeDatabase) -> Self {
        NarrowingContext {
            db: Some(db),
            errors: RefCell::new(Vec::new()),
        }
    }

    /// Narrowing with no class hierarchy: classes only match themselves.
    pub fn without_hierarchy() -> NarrowingContext<'static> {
        NarrowingContext {
            db: None,
            errors: RefCell::new(Vec::new()),
        }
    }

    /// Expansion errors recorded since the last call.
    pub fn take_errors(&self) -> Vec<TypeError> {
        self.errors.take()
    }

    /// Narrow `source` by `guard`. `sense` selects the branch where the
    /// condition holds (`true`) or fails (`false`).
    pub fn narrow(&self, source: &UnionType, guard: &TypeGuard, sense: bool) -> UnionType {
        let span = span!(Level::TRACE, "narrow", source = %source, sense);
        let _enter = span.enter();

        if source.is_impossible() {
            return source.clone();
        }
        let result = match guard {
            TypeGuard::IsType(check) => self.narrow_by_check(source, *check, sense),
            TypeGuard::InstanceOf(target) => {
                if sense {
                    self.narrow_to_instance(source, target)
                } else {
                    self.narrow_excluding_instance(source, target)
                }
            }
            TypeGuard::ExactClass(class) => {
                if sense {
                    self.narrow_to_exact_class(source, class)
                } else {
                    source.clone()
                }
            }
            TypeGuard::Identical(value) => self.narrow_by_identity(source, value, sense),
            TypeGuard::LooseEqual(value) => self.narrow_by_loose_equality(source, value, sense),
            TypeGuard::HasType(target) => {
                if sense {
                    self.narrow_to_type(source, target)
                } else {
                    self.narrow_excluding_type(source, target)
                }
            }
            TypeGuard::Truthy => self.narrow_by_truthiness(source, sense),
            TypeGuard::IsSet => self.narrow_by_isset(source, sense),
            TypeGuard::Relational { op, value } => {
                let op = if sense { *op } else { op.negated() };
                self.narrow_by_relation(source, op, value)
            }
        };

        trace!(guard = ?guard, result = %result, "narrowed");
        result
    }

    /// Apply `f` to every member (inferred and real) and collect the survivors.
    fn map_members(&self, source: &UnionType, f: impl Fn(&Type, &mut Vec<Type>)) -> UnionType {
        let mut types = Vec::with_capacity(source.len());
        for ty in source.types() {
            f(ty, &mut types);
        }
        let mut real = Vec::with_capacity(source.real_types().len());
        for ty in source.real_types() {
            f(ty, &mut real);
        }
        UnionType::from_narrowed(types, real, source.flags())
    }

    fn narrow_by_check(&self, source: &UnionType, check: TypeCheck, sense: bool) -> UnionType {
        if source.is_unknown() {
            return if sense { check.target() } else { source.clone() };
        }
        self.map_members(source, |ty, out| match check.classify(ty) {
            Membership::Always => {
                if sense {
                    out.push(ty.clone());
                }
            }
            Membership::Never => {
                if !sense {
                    out.push(ty.clone());
                }
            }
            Membership::Split(when_true, when_false) => {
                out.extend(if sense { when_true } else { when_false });
            }
        })
    }

    fn narrow_by_truthiness(&self, source: &UnionType, sense: bool) -> UnionType {
        if source.is_unknown() {
            return source.clone();
        }
        self.map_members(source, |ty, out| {
            out.extend(if sense {
                ty.truthy_variants()
            } else {
                ty.falsy_variants()
            });
        })
    }

    fn narrow_by_isset(&self, source: &UnionType, sense: bool) -> UnionType {
        if sense {
            if source.is_unknown() {
                return source.with_possibly_undefined(false);
            }
            let narrowed = self.map_members(source, |ty, out| {
                if !ty.is_null() {
                    out.push(ty.clone());
                }
            });
            return narrowed.with_possibly_undefined(false);
        }
        let may_be_unset = source.is_unknown()
            || source.is_possibly_undefined()
            || source
                .iter()
                .any(|ty| ty.is_null() || matches!(ty, Type::Mixed | Type::Template(_)));
        if may_be_unset {
            UnionType::of(Type::Null).with_possibly_undefined(source.is_possibly_undefined())
        } else {
            UnionType::impossible()
        }
    }

    fn narrow_by_identity(&self, source: &UnionType, value: &Type, sense: bool) -> UnionType {
        match value {
            Type::Null | Type::Void => {
                if sense {
                    if source.is_unknown() {
                        return UnionType::of(Type::Null);
                    }
                    self.map_members(source, |ty, out| {
                        if ty.is_null() || matches!(ty, Type::Mixed | Type::Template(_)) {
                            out.push(Type::Null);
                        }
                    })
                } else {
                    if source.is_unknown() {
                        return source.clone();
                    }
                    self.map_members(source, |ty, out| {
                        if !ty.is_null() {
                            out.push(ty.clone());
                        }
                    })
                }
            }
            Type::True | Type::False => {
                let other = if *value == Type::True {
                    Type::False
                } else {
                    Type::True
                };
                if source.is_unknown() {
                    return if sense {
                        UnionType::of(value.clone())
                    } else {
                        source.clone()
                    };
                }
                self.map_members(source, |ty, out| {
                    if sense {
                        if ty == value || matches!(ty, Type::Bool | Type::Mixed | Type::Template(_)) {
                            out.push(value.clone());
                        }
                    } else if ty == &Type::Bool {
                        out.push(other.clone());
                    } else if ty != value {
                        out.push(ty.clone());
                    }
                })
            }
            Type::Literal(literal) => {
                if source.is_unknown() {
                    return if sense {
                        UnionType::of(value.clone())
                    } else {
                        source.clone()
                    };
                }
                let base = value.widened();
                self.map_members(source, |ty, out| {
                    if sense {
                        let compatible = ty == value
                            || *ty == base
                            || matches!(ty, Type::Mixed | Type::Template(_))
                            || (matches!(literal, LiteralValue::String(_))
                                && matches!(ty, Type::Callable));
                        if compatible {
                            out.push(value.clone());
                        }
                    } else if ty != value {
                        out.push(ty.clone());
                    }
                })
            }
            other => {
                if sense {
                    self.narrow_to_type(source, &UnionType::of(other.clone()))
                } else {
                    source.clone()
                }
            }
        }
    }

    fn narrow_by_loose_equality(&self, source: &UnionType, value: &Type, sense: bool) -> UnionType {
        match value {
            Type::Null | Type::Void | Type::False => self.narrow_by_truthiness(source, !sense),
            Type::True => self.narrow_by_truthiness(source, sense),
            Type::Literal(literal) if !literal.is_falsy() && sense => {
                self.narrow_by_truthiness(source, true)
            }
            _ => source.clone(),
        }
    }

    /// Only comparisons that rule out `0`, `null` and `false` narrow.
    fn narrow_by_relation(
        &self,
        source: &UnionType,
        op: RelationalOp,
        value: &LiteralValue,
    ) -> UnionType {
        let LiteralValue::Int(bound) = value else {
            return source.clone();
        };
        let excludes_falsy = match op {
            RelationalOp::Greater => *bound >= 0,
            RelationalOp::GreaterOrEqual => *bound > 0,
            RelationalOp::Less | RelationalOp::LessOrEqual => false,
        };
        if !excludes_falsy || source.is_unknown() {
            return source.clone();
        }
        self.map_members(source, |ty, out| match ty.truthiness() {
            Truthiness::AlwaysFalsy => {}
            _ if *ty == Type::Bool => out.push(Type::True),
            _ => out.push(ty.clone()),
        })
    }

    // -------------------------------------------------------------------------
    // Class-aware narrowing
    // -------------------------------------------------------------------------

    /// `class` plus its ancestors, or just `class` when no hierarchy is
    /// available or the expansion fails.
    fn ancestors_of(&self, class: &Qsn) -> Vec<Qsn> {
        let Some(db) = self.db else {
            return vec![class.clone()];
        };
        match UnionType::of(Type::Class(class.clone())).as_expanded_types(db) {
            Ok(expanded) => expanded.class_types().cloned().collect(),
            Err(err) => {
                trace!(class = %class, error = %err, "narrowing without expansion");
                self.errors.borrow_mut().push(err);
                vec![class.clone()]
            }
        }
    }

    fn is_subclass_of(&self, class: &Qsn, ancestor: &Qsn) -> bool {
        let ancestor = ancestor.canonical();
        self.ancestors_of(class)
            .iter()
            .any(|candidate| candidate.canonical() == ancestor)
    }

    /// Whether `ty` could hold an object of a class we know nothing about.
    fn is_open_object(ty: &Type) -> bool {
        matches!(
            ty,
            Type::Object
                | Type::Mixed
                | Type::Template(_)
                | Type::Iterable
                | Type::Callable
                | Type::StaticType
                | Type::SelfType
                | Type::ParentType
        )
    }

    fn narrow_to_instance(&self, source: &UnionType, target: &UnionType) -> UnionType {
        let targets: Vec<Qsn> = target.class_types().cloned().collect();
        if targets.is_empty() {
            return source.clone();
        }
        if source.is_unknown() {
            return UnionType::from_types(targets.into_iter().map(Type::Class));
        }
        let expand = source.len() <= limits::MAX_NARROWING_UNION_SIZE;
        let narrowed = self.map_members(source, |ty, out| match ty {
            Type::Class(class) => {
                let is_instance = if expand {
                    targets.iter().any(|t| self.is_subclass_of(class, t))
                } else {
                    targets.iter().any(|t| t.canonical() == class.canonical())
                };
                if is_instance {
                    out.push(ty.clone());
                } else if expand {
                    out.extend(
                        targets
                            .iter()
                            .filter(|t| self.is_subclass_of(t, class))
                            .cloned()
                            .map(Type::Class),
                    );
                }
            }
            other if Self::is_open_object(other) => {
                out.extend(targets.iter().cloned().map(Type::Class));
            }
            _ => {}
        });
        // An object of an unrelated class may still implement the interface.
        if narrowed.is_impossible() && source.has_class_types() {
            return UnionType::from_types(targets.into_iter().map(Type::Class));
        }
        narrowed
    }

    fn narrow_excluding_instance(&self, source: &UnionType, target: &UnionType) -> UnionType {
        let targets: Vec<Qsn> = target.class_types().cloned().collect();
        if targets.is_empty() || source.is_unknown() {
            return source.clone();
        }
        self.map_members(source, |ty, out| {
            let excluded = ty
                .class_qsn()
                .is_some_and(|class| targets.iter().any(|t| self.is_subclass_of(class, t)));
            if !excluded {
                out.push(ty.clone());
            }
        })
    }

    fn narrow_to_exact_class(&self, source: &UnionType, class: &Qsn) -> UnionType {
        let exact = Type::Class(class.clone());
        if source.is_unknown() {
            return UnionType::of(exact);
        }
        self.map_members(source, |ty, out| match ty {
            Type::Class(member) if member.canonical() == class.canonical() => out.push(ty.clone()),
            Type::Class(member) => {
                if self.is_subclass_of(class, member) {
                    out.push(exact.clone());
                }
            }
            other if Self::is_open_object(other) => out.push(exact.clone()),
            _ => {}
        })
    }

    /// Whether `source` is usable as `target`, class inheritance included.
    fn member_casts(&self, source: &Type, target: &Type) -> bool {
        if source.can_cast_to_type(target) {
            return true;
        }
        match (source, target) {
            (Type::Class(from), Type::Class(to)) => self.is_subclass_of(from, to),
            _ => false,
        }
    }

    /// Keep members compatible with `target`; a member that is a supertype
    /// of some target member is replaced by that target member.
    fn narrow_to_type(&self, source: &UnionType, target: &UnionType) -> UnionType {
        if target.is_empty() {
            return source.clone();
        }
        if source.is_unknown() {
            return target.clone();
        }
        let narrowed = self.map_members(source, |ty, out| {
            if matches!(ty, Type::Mixed | Type::Template(_)) {
                out.extend(target.iter().cloned());
            } else if target.iter().any(|t| self.member_casts(ty, t)) {
                out.push(ty.clone());
            } else {
                out.extend(target.iter().filter(|t| self.member_casts(t, ty)).cloned());
            }
        });
        if narrowed.is_impossible() && target.iter().all(|t| t.class_qsn().is_some()) {
            return target.clone();
        }
        narrowed
    }

    fn narrow_excluding_type(&self, source: &UnionType, target: &UnionType) -> UnionType {
        if target.is_empty() || source.is_unknown() {
            return source.clone();
        }
        self.map_members(source, |ty, out| {
            let open = matches!(ty, Type::Mixed | Type::Template(_));
            if open || !target.iter().any(|t| self.member_casts(ty, t)) {
                out.push(ty.clone());
            }
        })
    }
}

#[cfg(test)]
#[path = "../tests/narrowing_tests.rs"]
mod tests;
