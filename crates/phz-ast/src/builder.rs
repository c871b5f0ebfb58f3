//! Programmatic construction of syntax trees.
//!
//! External parsers lower their own trees through this builder; tests use it
//! to write fixtures without a parser.

use crate::arena::NodeArena;
use crate::node::{BinaryOp, Node, NodeIndex, NodeKind, NodeValue, node_flags};
use smallvec::SmallVec;
use std::sync::Arc;

pub struct AstBuilder {
    arena: NodeArena,
    line: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            line: 1,
        }
    }

    /// Set the line number stamped on subsequently created nodes.
    pub fn at(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    pub fn current_line(&self) -> u32 {
        self.line
    }

    pub fn finish(self) -> NodeArena {
        self.arena
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn node(
        &mut self,
        kind: NodeKind,
        value: NodeValue,
        flags: u32,
        children: &[NodeIndex],
    ) -> NodeIndex {
        self.arena.push(Node {
            kind,
            line: self.line,
            flags,
            value,
            children: children.iter().copied().filter(|c| c.is_some()).collect(),
        })
    }

    fn named(&mut self, kind: NodeKind, name: &str, flags: u32, children: &[NodeIndex]) -> NodeIndex {
        self.node(kind, NodeValue::Name(Arc::from(name)), flags, children)
    }

    // Statements

    pub fn file(&mut self, path: &str, statements: &[NodeIndex]) -> NodeIndex {
        self.named(NodeKind::File, path, node_flags::NONE, statements)
    }

    pub fn namespace(&mut self, name: &str, statements: &[NodeIndex]) -> NodeIndex {
        self.named(NodeKind::Namespace, name, node_flags::NONE, statements)
    }

    /// `use Foo\Bar [as Alias];` (`flags` selects function/const imports).
    pub fn use_import(&mut self, name: &str, alias: Option<&str>, flags: u32) -> NodeIndex {
        let alias = alias.map(|a| self.name(a)).unwrap_or(NodeIndex::NONE);
        self.named(NodeKind::Use, name, flags, &[alias])
    }

    pub fn block(&mut self, statements: &[NodeIndex]) -> NodeIndex {
        self.node(NodeKind::Block, NodeValue::None, node_flags::NONE, statements)
    }

    pub fn if_stmt(
        &mut self,
        condition: NodeIndex,
        then_block: NodeIndex,
        else_ifs: &[(NodeIndex, NodeIndex)],
        else_block: Option<NodeIndex>,
    ) -> NodeIndex {
        let mut children: SmallVec<[NodeIndex; 4]> = SmallVec::new();
        children.push(condition);
        children.push(then_block);
        for &(cond, block) in else_ifs {
            let else_if = self.node(NodeKind::ElseIf, NodeValue::None, node_flags::NONE, &[cond, block]);
            children.push(else_if);
        }
        if let Some(block) = else_block {
            let else_node = self.node(NodeKind::Else, NodeValue::None, node_flags::NONE, &[block]);
            children.push(else_node);
        }
        self.node(NodeKind::If, NodeValue::None, node_flags::NONE, &children)
    }

    pub fn while_stmt(&mut self, condition: NodeIndex, body: NodeIndex) -> NodeIndex {
        self.node(NodeKind::While, NodeValue::None, node_flags::NONE, &[condition, body])
    }

    pub fn expr_stmt(&mut self, expr: NodeIndex) -> NodeIndex {
        self.node(NodeKind::ExprStmt, NodeValue::None, node_flags::NONE, &[expr])
    }

    /// `$name = value;`
    pub fn assign(&mut self, name: &str, value: NodeIndex) -> NodeIndex {
        let target = self.var(name);
        self.node(NodeKind::Assign, NodeValue::None, node_flags::NONE, &[target, value])
    }

    pub fn ret(&mut self, expr: Option<NodeIndex>) -> NodeIndex {
        let expr = expr.unwrap_or(NodeIndex::NONE);
        self.node(NodeKind::Return, NodeValue::None, node_flags::NONE, &[expr])
    }

    pub fn echo(&mut self, exprs: &[NodeIndex]) -> NodeIndex {
        self.node(NodeKind::Echo, NodeValue::None, node_flags::NONE, exprs)
    }

    pub fn unset(&mut self, vars: &[NodeIndex]) -> NodeIndex {
        self.node(NodeKind::Unset, NodeValue::None, node_flags::NONE, vars)
    }

    // Declarations

    pub fn function(
        &mut self,
        name: &str,
        params: &[NodeIndex],
        return_type: Option<&str>,
        body: NodeIndex,
    ) -> NodeIndex {
        let children = self.function_children(params, &[], return_type, body);
        self.named(NodeKind::FunctionDecl, name, node_flags::NONE, &children)
    }

    pub fn method(
        &mut self,
        name: &str,
        flags: u32,
        params: &[NodeIndex],
        return_type: Option<&str>,
        body: Option<NodeIndex>,
    ) -> NodeIndex {
        let body = body.unwrap_or(NodeIndex::NONE);
        let children = self.function_children(params, &[], return_type, body);
        self.named(NodeKind::MethodDecl, name, flags, &children)
    }

    pub fn closure(
        &mut self,
        flags: u32,
        params: &[NodeIndex],
        uses: &[&str],
        return_type: Option<&str>,
        body: NodeIndex,
    ) -> NodeIndex {
        let uses: Vec<NodeIndex> = uses
            .iter()
            .map(|u| self.named(NodeKind::ClosureUse, u, node_flags::NONE, &[]))
            .collect();
        let children = self.function_children(params, &uses, return_type, body);
        self.node(NodeKind::Closure, NodeValue::None, flags, &children)
    }

    fn function_children(
        &mut self,
        params: &[NodeIndex],
        uses: &[NodeIndex],
        return_type: Option<&str>,
        body: NodeIndex,
    ) -> Vec<NodeIndex> {
        let mut children: Vec<NodeIndex> = params.to_vec();
        children.extend_from_slice(uses);
        if let Some(hint) = return_type {
            children.push(self.type_hint(hint));
        }
        children.push(body);
        children
    }

    pub fn param(&mut self, name: &str, hint: Option<&str>, default: Option<NodeIndex>) -> NodeIndex {
        let hint = hint.map(|h| self.type_hint(h)).unwrap_or(NodeIndex::NONE);
        let default = default.unwrap_or(NodeIndex::NONE);
        self.named(NodeKind::Param, name, node_flags::NONE, &[hint, default])
    }

    pub fn type_hint(&mut self, text: &str) -> NodeIndex {
        self.named(NodeKind::TypeHint, text, node_flags::NONE, &[])
    }

    pub fn class(
        &mut self,
        name: &str,
        flags: u32,
        extends: Option<&str>,
        implements: &[&str],
        members: &[NodeIndex],
    ) -> NodeIndex {
        self.class_like(NodeKind::ClassDecl, name, flags, extends.as_slice(), implements, &[], members)
    }

    pub fn interface(&mut self, name: &str, extends: &[&str], members: &[NodeIndex]) -> NodeIndex {
        self.class_like(NodeKind::InterfaceDecl, name, node_flags::NONE, extends, &[], &[], members)
    }

    pub fn trait_decl(&mut self, name: &str, members: &[NodeIndex]) -> NodeIndex {
        self.class_like(NodeKind::TraitDecl, name, node_flags::NONE, &[], &[], &[], members)
    }

    pub fn class_like(
        &mut self,
        kind: NodeKind,
        name: &str,
        flags: u32,
        extends: &[&str],
        implements: &[&str],
        traits: &[&str],
        members: &[NodeIndex],
    ) -> NodeIndex {
        let mut children = Vec::with_capacity(members.len() + 3);
        if !extends.is_empty() {
            let names: Vec<NodeIndex> = extends.iter().map(|n| self.name(n)).collect();
            children.push(self.node(NodeKind::Extends, NodeValue::None, node_flags::NONE, &names));
        }
        if !implements.is_empty() {
            let names: Vec<NodeIndex> = implements.iter().map(|n| self.name(n)).collect();
            children.push(self.node(NodeKind::Implements, NodeValue::None, node_flags::NONE, &names));
        }
        if !traits.is_empty() {
            let names: Vec<NodeIndex> = traits.iter().map(|n| self.name(n)).collect();
            children.push(self.node(NodeKind::TraitUse, NodeValue::None, node_flags::NONE, &names));
        }
        children.extend_from_slice(members);
        self.named(kind, name, flags, &children)
    }

    pub fn property(
        &mut self,
        name: &str,
        flags: u32,
        hint: Option<&str>,
        default: Option<NodeIndex>,
    ) -> NodeIndex {
        let hint = hint.map(|h| self.type_hint(h)).unwrap_or(NodeIndex::NONE);
        let default = default.unwrap_or(NodeIndex::NONE);
        self.named(NodeKind::PropertyDecl, name, flags, &[hint, default])
    }

    pub fn class_const(&mut self, name: &str, value: NodeIndex) -> NodeIndex {
        self.named(NodeKind::ClassConstDecl, name, node_flags::NONE, &[value])
    }

    pub fn const_decl(&mut self, name: &str, value: NodeIndex) -> NodeIndex {
        self.named(NodeKind::ConstDecl, name, node_flags::NONE, &[value])
    }

    // Expressions

    pub fn var(&mut self, name: &str) -> NodeIndex {
        self.named(NodeKind::Variable, name, node_flags::NONE, &[])
    }

    pub fn name(&mut self, name: &str) -> NodeIndex {
        self.named(NodeKind::Name, name, node_flags::NONE, &[])
    }

    pub fn int(&mut self, value: i64) -> NodeIndex {
        self.node(NodeKind::IntLiteral, NodeValue::Int(value), node_flags::NONE, &[])
    }

    pub fn float(&mut self, value: f64) -> NodeIndex {
        self.node(NodeKind::FloatLiteral, NodeValue::Float(value), node_flags::NONE, &[])
    }

    pub fn string(&mut self, value: &str) -> NodeIndex {
        self.node(
            NodeKind::StringLiteral,
            NodeValue::Str(Arc::from(value)),
            node_flags::NONE,
            &[],
        )
    }

    pub fn const_fetch(&mut self, name: &str) -> NodeIndex {
        self.named(NodeKind::ConstFetch, name, node_flags::NONE, &[])
    }

    pub fn null(&mut self) -> NodeIndex {
        self.const_fetch("null")
    }

    pub fn bool_lit(&mut self, value: bool) -> NodeIndex {
        self.const_fetch(if value { "true" } else { "false" })
    }

    /// Array literal; items without a key use `None`.
    pub fn array(&mut self, items: &[(Option<NodeIndex>, NodeIndex)]) -> NodeIndex {
        let items: Vec<NodeIndex> = items
            .iter()
            .map(|&(key, value)| {
                let key = key.unwrap_or(NodeIndex::NONE);
                self.node(NodeKind::ArrayItem, NodeValue::None, node_flags::NONE, &[key, value])
            })
            .collect();
        self.node(NodeKind::Array, NodeValue::None, node_flags::NONE, &items)
    }

    pub fn new_object(&mut self, class: &str, args: &[NodeIndex]) -> NodeIndex {
        let mut children = vec![self.name(class)];
        children.extend_from_slice(args);
        self.node(NodeKind::New, NodeValue::None, node_flags::NONE, &children)
    }

    pub fn call(&mut self, function: &str, args: &[NodeIndex]) -> NodeIndex {
        let mut children = vec![self.name(function)];
        children.extend_from_slice(args);
        self.node(NodeKind::Call, NodeValue::None, node_flags::NONE, &children)
    }

    pub fn static_call(&mut self, class: &str, method: &str, args: &[NodeIndex]) -> NodeIndex {
        let mut children = vec![self.name(class)];
        children.extend_from_slice(args);
        self.named(NodeKind::StaticCall, method, node_flags::NONE, &children)
    }

    pub fn class_const_fetch(&mut self, class: &str, constant: &str) -> NodeIndex {
        let class = self.name(class);
        self.named(NodeKind::ClassConstFetch, constant, node_flags::NONE, &[class])
    }

    pub fn binary(&mut self, op: BinaryOp, left: NodeIndex, right: NodeIndex) -> NodeIndex {
        self.node(NodeKind::Binary, NodeValue::Op(op), node_flags::NONE, &[left, right])
    }

    pub fn not(&mut self, expr: NodeIndex) -> NodeIndex {
        self.node(NodeKind::Not, NodeValue::None, node_flags::NONE, &[expr])
    }

    pub fn instance_of(&mut self, expr: NodeIndex, class: &str) -> NodeIndex {
        let class = self.name(class);
        self.node(NodeKind::InstanceOf, NodeValue::None, node_flags::NONE, &[expr, class])
    }

    pub fn isset(&mut self, vars: &[NodeIndex]) -> NodeIndex {
        self.node(NodeKind::Isset, NodeValue::None, node_flags::NONE, vars)
    }
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}
