//! Condition narrowing.
//!
//! [`ConditionVisitor`] turns the condition of an `if`, `elseif` or `while`
//! into the two contexts the branches start from: one where the condition
//! held and one where it failed. Only variables already bound in the
//! incoming scope are narrowed; a condition never binds a new name.
//!
//! Supported condition forms:
//!
//! ```php
//! if ($x)                      // truthiness
//! if (!cond)                   // negation
//! if (a && b) / if (a || b)    // short-circuit, both senses
//! if ($x instanceof Foo)
//! if (isset($x, $y))
//! if (is_string($x))           // every is_* type check
//! if ($x === null) / ($x == 5) / ($x > 0)
//! if (get_class($x) === Foo::class)
//! if (is_int($x) === false)    // a boolean condition compared to a literal
//! ```

mod binary;

pub use binary::BinaryCondition;

use crate::context::Context;
use crate::scope::Scope;
use phz_ast::{BinaryOp, NodeArena, NodeIndex, NodeKind};
use phz_codebase::CodeBase;
use phz_common::{IssueCollector, IssueKind};
use phz_solver::{
    DepthCounter, NarrowingContext, RecursionProfile, TypeCheck, TypeGuard, Type, UnionType,
};
use tracing::{debug, trace};

pub struct ConditionVisitor<'a> {
    codebase: &'a CodeBase,
    arena: &'a NodeArena,
    issues: &'a mut IssueCollector,
    depth: DepthCounter,
}

impl<'a> ConditionVisitor<'a> {
    pub fn new(codebase: &'a CodeBase, arena: &'a NodeArena, issues: &'a mut IssueCollector) -> Self {
        ConditionVisitor {
            codebase,
            arena,
            issues,
            depth: DepthCounter::with_profile(RecursionProfile::ConditionNesting),
        }
    }

    pub(crate) fn codebase(&self) -> &'a CodeBase {
        self.codebase
    }

    pub(crate) fn arena(&self) -> &'a NodeArena {
        self.arena
    }

    /// `(when the condition holds, when it fails)`.
    pub fn branches(&mut self, ctx: &Context, condition: NodeIndex) -> (Context, Context) {
        let when_true = self.narrow(ctx, condition, true);
        let when_false = self.narrow(ctx, condition, false);
        (when_true, when_false)
    }

    /// The context after `condition` evaluated to `sense`.
    ///
    /// Conditions nested deeper than the condition limit are left
    /// unanalysed and return `ctx` unchanged. Narrowing never writes into
    /// the incoming scope: over the global scope the narrowed bindings live
    /// in a branch layer on top of it.
    pub fn narrow(&mut self, ctx: &Context, condition: NodeIndex, sense: bool) -> Context {
        if ctx.scope().writes_shared_state() {
            let layered = ctx.with_scope(Scope::branch(ctx.scope()));
            return self.narrow(&layered, condition, sense);
        }
        if !self.depth.enter() {
            debug!(at = %ctx, "condition nesting limit reached");
            return ctx.clone();
        }
        let result = self.narrow_condition(ctx, condition, sense);
        self.depth.leave();
        result
    }

    fn narrow_condition(&mut self, ctx: &Context, condition: NodeIndex, sense: bool) -> Context {
        let Some(kind) = self.arena.kind(condition) else {
            return ctx.clone();
        };
        match kind {
            NodeKind::Variable => match self.arena.variable_name(condition) {
                Some(name) => self.narrow_variable(ctx, name, &TypeGuard::Truthy, sense),
                None => ctx.clone(),
            },
            NodeKind::Not => match self.arena.not_operand(condition) {
                Some(inner) => self.narrow(ctx, inner, !sense),
                None => ctx.clone(),
            },
            NodeKind::Binary => self.narrow_binary(ctx, condition, sense),
            NodeKind::InstanceOf => self.narrow_instanceof(ctx, condition, sense),
            NodeKind::Isset => self.narrow_isset(ctx, condition, sense),
            NodeKind::Call => self.narrow_type_check_call(ctx, condition, sense),
            _ => ctx.clone(),
        }
    }

    fn narrow_binary(&mut self, ctx: &Context, condition: NodeIndex, sense: bool) -> Context {
        let Some((op, left, right)) = self.arena.binary_parts(condition) else {
            return ctx.clone();
        };
        match (op, sense) {
            // a && b holds: both hold, b seen after a.
            (BinaryOp::BooleanAnd, true) => {
                let after_left = self.narrow(ctx, left, true);
                self.narrow(&after_left, right, true)
            }
            // a || b fails: both fail.
            (BinaryOp::BooleanOr, false) => {
                let after_left = self.narrow(ctx, left, false);
                self.narrow(&after_left, right, false)
            }
            // a && b fails: !a, or a && !b.
            (BinaryOp::BooleanAnd, false) => {
                let left_failed = self.narrow(ctx, left, false);
                let left_held = self.narrow(ctx, left, true);
                let right_failed = self.narrow(&left_held, right, false);
                self.join(ctx, &[left_failed, right_failed])
            }
            // a || b holds: a, or !a && b.
            (BinaryOp::BooleanOr, true) => {
                let left_held = self.narrow(ctx, left, true);
                let left_failed = self.narrow(ctx, left, false);
                let right_held = self.narrow(&left_failed, right, true);
                self.join(ctx, &[left_held, right_held])
            }
            _ => match BinaryCondition::from_op(op) {
                Some(comparison) => {
                    let comparison = if sense { comparison } else { comparison.negated() };
                    comparison.analyze(self, ctx, left, right)
                }
                None => ctx.clone(),
            },
        }
    }

    fn join(&self, ctx: &Context, alternatives: &[Context]) -> Context {
        let scopes: Vec<Scope> = alternatives.iter().map(|alt| alt.scope().clone()).collect();
        ctx.with_scope(Scope::merge(ctx.scope(), &scopes))
    }

    fn narrow_instanceof(&mut self, ctx: &Context, condition: NodeIndex, sense: bool) -> Context {
        let Some((expr, class_name)) = self.arena.instanceof_parts(condition) else {
            return ctx.clone();
        };
        let Some(name) = self.arena.variable_name(expr) else {
            return ctx.clone();
        };
        let class = match ctx.resolve_class_name(class_name, self.codebase) {
            Ok(class) => class,
            Err(err) => {
                self.issues.emit(err.to_issue(ctx.file(), ctx.line()));
                return ctx.clone();
            }
        };
        let guard = TypeGuard::InstanceOf(UnionType::of(Type::Class(class)));
        self.narrow_variable(ctx, name, &guard, sense)
    }

    fn narrow_isset(&mut self, ctx: &Context, condition: NodeIndex, sense: bool) -> Context {
        let names: Vec<&str> = self
            .arena
            .children(condition)
            .iter()
            .filter_map(|&var| self.arena.variable_name(var))
            .collect();
        if sense {
            // isset($a, $b) holds only when every argument is set.
            return names.into_iter().fold(ctx.clone(), |acc, name| {
                self.narrow_variable(&acc, name, &TypeGuard::IsSet, true)
            });
        }
        match names.as_slice() {
            [name] => self.narrow_variable(ctx, name, &TypeGuard::IsSet, false),
            _ => ctx.clone(),
        }
    }

    fn narrow_type_check_call(&mut self, ctx: &Context, condition: NodeIndex, sense: bool) -> Context {
        let Some((function, args)) = self.arena.call_parts(condition) else {
            return ctx.clone();
        };
        let function = function.trim_start_matches('\\');
        let Some(check) = TypeCheck::from_function_name(function) else {
            return ctx.clone();
        };
        let [arg] = args else {
            return ctx.clone();
        };
        match self.arena.variable_name(*arg) {
            Some(name) => self.narrow_variable(ctx, name, &TypeGuard::IsType(check), sense),
            None => ctx.clone(),
        }
    }

    // =========================================================================
    // Variable narrowing
    // =========================================================================

    /// Rebind `name` with its type narrowed by `guard`. An unbound name is
    /// left alone.
    ///
    /// A narrowing that leaves no possible value is reported: as an
    /// impossible condition when `sense` is `true`, as a redundant one when
    /// it is `false`.
    pub fn narrow_variable(
        &mut self,
        ctx: &Context,
        name: &str,
        guard: &TypeGuard,
        sense: bool,
    ) -> Context {
        let Some(variable) = ctx.get_variable(name) else {
            trace!(name, "condition on unbound variable");
            return ctx.clone();
        };
        let narrowing = NarrowingContext::new(self.codebase);
        let narrowed = narrowing.narrow(&variable.union_type, guard, sense);
        for err in narrowing.take_errors() {
            self.issues.emit(ctx.issue(
                IssueKind::RecursionDepthExceeded,
                vec![err.class().to_string()],
            ));
        }

        let source = &variable.union_type;
        if narrowed.is_impossible() && !source.is_impossible() && !source.is_unknown() {
            let kind = if sense {
                IssueKind::ImpossibleCondition
            } else {
                IssueKind::RedundantCondition
            };
            self.issues.emit(ctx.issue(
                kind,
                vec![name.to_string(), source.to_string(), describe_guard(guard)],
            ));
        }

        trace!(name, from = %source, to = %narrowed, sense, "variable narrowed");
        ctx.with_variable(variable.with_union_type(narrowed))
    }

    /// The type of a comparison operand when it is a literal or a bound
    /// variable.
    pub(crate) fn operand_type(&self, ctx: &Context, expr: NodeIndex) -> Option<UnionType> {
        if let Some(name) = self.arena.variable_name(expr) {
            return ctx.get_variable(name).map(|variable| variable.union_type);
        }
        let ty = phz_codebase::literal_type(self.arena, expr);
        (!ty.is_unknown()).then_some(ty)
    }
}

fn describe_guard(guard: &TypeGuard) -> String {
    match guard {
        TypeGuard::IsType(check) => check.target().to_string(),
        TypeGuard::InstanceOf(target) | TypeGuard::HasType(target) => target.to_string(),
        TypeGuard::ExactClass(class) => class.to_string(),
        TypeGuard::Identical(ty) | TypeGuard::LooseEqual(ty) => ty.to_string(),
        TypeGuard::Truthy => "truthy".to_string(),
        TypeGuard::IsSet => "set".to_string(),
        TypeGuard::Relational { op, value } => format!("{} {value}", binary::relational_symbol(*op)),
    }
}

#[cfg(test)]
#[path = "../../tests/conditions_tests.rs"]
mod tests;
