//! Comparison conditions: `===`, `!==`, `==`, `!=`, `<`, `<=`, `>`, `>=`.

use super::ConditionVisitor;
use crate::context::Context;
use phz_ast::{BinaryOp, NodeIndex, NodeKind};
use phz_solver::{LiteralValue, Qsn, RelationalOp, SymbolKind, Type, TypeGuard};

/// A comparison operator appearing as (part of) a condition.
///
/// The condition visitor negates the operator for the failing branch, so
/// every `analyze_*` method narrows for "this comparison holds".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryCondition {
    Identical,
    NotIdentical,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl BinaryCondition {
    pub fn from_op(op: BinaryOp) -> Option<BinaryCondition> {
        Some(match op {
            BinaryOp::Identical => BinaryCondition::Identical,
            BinaryOp::NotIdentical => BinaryCondition::NotIdentical,
            BinaryOp::Equal => BinaryCondition::Equal,
            BinaryOp::NotEqual => BinaryCondition::NotEqual,
            BinaryOp::Less => BinaryCondition::Less,
            BinaryOp::LessOrEqual => BinaryCondition::LessOrEqual,
            BinaryOp::Greater => BinaryCondition::Greater,
            BinaryOp::GreaterOrEqual => BinaryCondition::GreaterOrEqual,
            _ => return None,
        })
    }

    /// The comparison that holds exactly when this one does not.
    pub fn negated(self) -> BinaryCondition {
        match self {
            BinaryCondition::Identical => BinaryCondition::NotIdentical,
            BinaryCondition::NotIdentical => BinaryCondition::Identical,
            BinaryCondition::Equal => BinaryCondition::NotEqual,
            BinaryCondition::NotEqual => BinaryCondition::Equal,
            BinaryCondition::Less => BinaryCondition::GreaterOrEqual,
            BinaryCondition::LessOrEqual => BinaryCondition::Greater,
            BinaryCondition::Greater => BinaryCondition::LessOrEqual,
            BinaryCondition::GreaterOrEqual => BinaryCondition::Less,
        }
    }

    /// The comparison with its operands swapped.
    pub fn flipped(self) -> BinaryCondition {
        match self {
            BinaryCondition::Less => BinaryCondition::Greater,
            BinaryCondition::LessOrEqual => BinaryCondition::GreaterOrEqual,
            BinaryCondition::Greater => BinaryCondition::Less,
            BinaryCondition::GreaterOrEqual => BinaryCondition::LessOrEqual,
            other => other,
        }
    }

    fn relational_op(self) -> Option<RelationalOp> {
        match self {
            BinaryCondition::Less => Some(RelationalOp::Less),
            BinaryCondition::LessOrEqual => Some(RelationalOp::LessOrEqual),
            BinaryCondition::Greater => Some(RelationalOp::Greater),
            BinaryCondition::GreaterOrEqual => Some(RelationalOp::GreaterOrEqual),
            _ => None,
        }
    }

    /// `true` for `===`/`==`, `false` for `!==`/`!=`, `None` for relations.
    fn equality_sense(self) -> Option<bool> {
        match self {
            BinaryCondition::Identical | BinaryCondition::Equal => Some(true),
            BinaryCondition::NotIdentical | BinaryCondition::NotEqual => Some(false),
            _ => None,
        }
    }

    /// Narrow `ctx` for `left <op> right` holding. The left operand is tried
    /// as the narrowing subject first, then the right one with the operator
    /// flipped.
    pub fn analyze(
        self,
        visitor: &mut ConditionVisitor<'_>,
        ctx: &Context,
        left: NodeIndex,
        right: NodeIndex,
    ) -> Context {
        if let Some(narrowed) = self.analyze_subject(visitor, ctx, left, right) {
            return narrowed;
        }
        self.flipped()
            .analyze_subject(visitor, ctx, right, left)
            .unwrap_or_else(|| ctx.clone())
    }

    fn analyze_subject(
        self,
        visitor: &mut ConditionVisitor<'_>,
        ctx: &Context,
        subject: NodeIndex,
        other: NodeIndex,
    ) -> Option<Context> {
        match visitor.arena().kind(subject)? {
            NodeKind::Variable => self.analyze_var(visitor, ctx, subject, other),
            NodeKind::Call => {
                let (function, _) = visitor.arena().call_parts(subject)?;
                if function.trim_start_matches('\\').eq_ignore_ascii_case("get_class") {
                    self.analyze_class_check(visitor, ctx, subject, other)
                } else {
                    self.analyze_call(visitor, ctx, subject, other)
                }
            }
            NodeKind::Not | NodeKind::InstanceOf | NodeKind::Isset | NodeKind::Binary => {
                self.analyze_complex_condition(visitor, ctx, subject, other)
            }
            _ => None,
        }
    }

    /// `$x <op> expr`.
    ///
    /// Returns `None` when `expr` says nothing about `$x` (its type is not
    /// known here), so the caller can try the operands the other way round.
    pub fn analyze_var(
        self,
        visitor: &mut ConditionVisitor<'_>,
        ctx: &Context,
        var: NodeIndex,
        expr: NodeIndex,
    ) -> Option<Context> {
        let name = visitor.arena().variable_name(var)?;
        let other = visitor.operand_type(ctx, expr)?;
        if other.is_unknown() || other.is_impossible() {
            return None;
        }

        if let Some(op) = self.relational_op() {
            let value = match other.types() {
                [Type::Literal(value @ LiteralValue::Int(_))] => value.clone(),
                _ => return Some(ctx.clone()),
            };
            let guard = TypeGuard::Relational { op, value };
            return Some(visitor.narrow_variable(ctx, name, &guard, true));
        }

        let sense = self.equality_sense()?;
        let strict = matches!(self, BinaryCondition::Identical | BinaryCondition::NotIdentical);
        let guard = match (other.types(), strict) {
            ([single], true) => TypeGuard::Identical(single.clone()),
            ([single], false) => TypeGuard::LooseEqual(single.clone()),
            // `$x === $y` with several possible types for `$y`: `$x` takes
            // one of them. The failing side says nothing.
            (_, true) if sense => TypeGuard::HasType(other.without_real_types()),
            _ => return Some(ctx.clone()),
        };
        Some(visitor.narrow_variable(ctx, name, &guard, sense))
    }

    /// `get_class($x) <op> Foo::class` or `get_class($x) <op> 'Foo'`.
    pub fn analyze_class_check(
        self,
        visitor: &mut ConditionVisitor<'_>,
        ctx: &Context,
        call: NodeIndex,
        expr: NodeIndex,
    ) -> Option<Context> {
        let sense = self.equality_sense()?;
        let (_, args) = visitor.arena().call_parts(call)?;
        let [arg] = args else {
            return None;
        };
        let name = visitor.arena().variable_name(*arg)?;
        let class = class_named_by(visitor, ctx, expr)?;
        Some(visitor.narrow_variable(ctx, name, &TypeGuard::ExactClass(class), sense))
    }

    /// `is_string($x) === false` and the like: a type-check call compared to
    /// a boolean literal.
    pub fn analyze_call(
        self,
        visitor: &mut ConditionVisitor<'_>,
        ctx: &Context,
        call: NodeIndex,
        expr: NodeIndex,
    ) -> Option<Context> {
        let holds = self.boolean_comparison(visitor, expr)?;
        Some(visitor.narrow(ctx, call, holds))
    }

    /// `($x instanceof Foo) === true`, `!$x == false`, `(a && b) !== false`.
    pub fn analyze_complex_condition(
        self,
        visitor: &mut ConditionVisitor<'_>,
        ctx: &Context,
        condition: NodeIndex,
        expr: NodeIndex,
    ) -> Option<Context> {
        let holds = self.boolean_comparison(visitor, expr)?;
        Some(visitor.narrow(ctx, condition, holds))
    }

    /// Whether the boolean-valued subject must be true for this comparison
    /// against the literal `expr` to hold.
    fn boolean_comparison(self, visitor: &ConditionVisitor<'_>, expr: NodeIndex) -> Option<bool> {
        let literal = visitor.arena().bool_literal(expr)?;
        let sense = self.equality_sense()?;
        Some(literal == sense)
    }
}

/// The class named by `Foo::class` or by a string literal.
fn class_named_by(visitor: &ConditionVisitor<'_>, ctx: &Context, expr: NodeIndex) -> Option<Qsn> {
    let arena = visitor.arena();
    if let Some((class, constant)) = arena.class_const_parts(expr) {
        if !constant.eq_ignore_ascii_case("class") {
            return None;
        }
        return ctx.resolve_class_name(class, visitor.codebase()).ok();
    }
    match phz_codebase::literal_type(arena, expr).types() {
        [Type::Literal(LiteralValue::String(text))] => {
            Qsn::from_fully_qualified_string(SymbolKind::Class, text).ok()
        }
        _ => None,
    }
}

pub(super) fn relational_symbol(op: RelationalOp) -> &'static str {
    match op {
        RelationalOp::Less => "<",
        RelationalOp::LessOrEqual => "<=",
        RelationalOp::Greater => ">",
        RelationalOp::GreaterOrEqual => ">=",
    }
}
