//! NodeArena storage and typed access methods.

use crate::node::{BinaryOp, Node, NodeIndex, NodeKind, NodeValue};

/// Flat storage for one file's syntax tree.
#[derive(Clone, Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

/// Decoded `If` node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IfParts {
    pub condition: NodeIndex,
    pub then_block: NodeIndex,
    /// `(condition, block)` per `elseif`, in source order.
    pub else_ifs: Vec<(NodeIndex, NodeIndex)>,
    pub else_block: Option<NodeIndex>,
}

/// Decoded function-like node (`FunctionDecl`, `MethodDecl`, `Closure`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionParts {
    pub params: Vec<NodeIndex>,
    pub uses: Vec<NodeIndex>,
    pub return_type: Option<NodeIndex>,
    pub body: Option<NodeIndex>,
}

/// Decoded class-like node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassParts {
    pub extends: Vec<NodeIndex>,
    pub implements: Vec<NodeIndex>,
    pub traits: Vec<NodeIndex>,
    pub members: Vec<NodeIndex>,
}

impl NodeArena {
    pub fn new() -> NodeArena {
        NodeArena::default()
    }

    pub fn with_capacity(capacity: usize) -> NodeArena {
        NodeArena {
            nodes: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a node and return its index.
    pub fn push(&mut self, node: Node) -> NodeIndex {
        let idx = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(node);
        idx
    }

    #[inline]
    pub fn get(&self, index: NodeIndex) -> Option<&Node> {
        if index.is_none() {
            None
        } else {
            self.nodes.get(index.0 as usize)
        }
    }

    #[inline]
    pub fn kind(&self, index: NodeIndex) -> Option<NodeKind> {
        self.get(index).map(|node| node.kind)
    }

    #[inline]
    pub fn line(&self, index: NodeIndex) -> u32 {
        self.get(index).map(|node| node.line).unwrap_or(0)
    }

    #[inline]
    pub fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        self.get(index)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Name payload of the node, if any.
    #[inline]
    pub fn name_of(&self, index: NodeIndex) -> Option<&str> {
        self.get(index).and_then(Node::name)
    }

    /// Name of a `Variable` node (without `$`).
    pub fn variable_name(&self, index: NodeIndex) -> Option<&str> {
        let node = self.get(index)?;
        if node.kind == NodeKind::Variable {
            node.name()
        } else {
            None
        }
    }

    /// `(op, left, right)` of a `Binary` node.
    pub fn binary_parts(&self, index: NodeIndex) -> Option<(BinaryOp, NodeIndex, NodeIndex)> {
        let node = self.get(index)?;
        if node.kind != NodeKind::Binary {
            return None;
        }
        let NodeValue::Op(op) = node.value else {
            return None;
        };
        let left = node.child(0);
        let right = node.child(1);
        if left.is_none() || right.is_none() {
            return None;
        }
        Some((op, left, right))
    }

    /// `(callee name, args)` of a `Call` or `New` node.
    pub fn call_parts(&self, index: NodeIndex) -> Option<(&str, &[NodeIndex])> {
        let node = self.get(index)?;
        if !matches!(node.kind, NodeKind::Call | NodeKind::New) {
            return None;
        }
        let (&callee, args) = node.children.split_first()?;
        Some((self.name_of(callee)?, args))
    }

    /// `(class name, method name, args)` of a `StaticCall` node.
    pub fn static_call_parts(&self, index: NodeIndex) -> Option<(&str, &str, &[NodeIndex])> {
        let node = self.get(index)?;
        if node.kind != NodeKind::StaticCall {
            return None;
        }
        let (&class, args) = node.children.split_first()?;
        Some((self.name_of(class)?, node.name()?, args))
    }

    /// `(class name, constant name)` of a `ClassConstFetch` node.
    pub fn class_const_parts(&self, index: NodeIndex) -> Option<(&str, &str)> {
        let node = self.get(index)?;
        if node.kind != NodeKind::ClassConstFetch {
            return None;
        }
        Some((self.name_of(node.child(0))?, node.name()?))
    }

    /// `(expr, class name)` of an `InstanceOf` node.
    pub fn instanceof_parts(&self, index: NodeIndex) -> Option<(NodeIndex, &str)> {
        let node = self.get(index)?;
        if node.kind != NodeKind::InstanceOf {
            return None;
        }
        let expr = node.child(0);
        if expr.is_none() {
            return None;
        }
        Some((expr, self.name_of(node.child(1))?))
    }

    /// Operand of a `Not` node.
    pub fn not_operand(&self, index: NodeIndex) -> Option<NodeIndex> {
        let node = self.get(index)?;
        if node.kind != NodeKind::Not {
            return None;
        }
        let inner = node.child(0);
        inner.is_some().then_some(inner)
    }

    /// `(target, value)` of an `Assign` node.
    pub fn assign_parts(&self, index: NodeIndex) -> Option<(NodeIndex, NodeIndex)> {
        let node = self.get(index)?;
        if node.kind != NodeKind::Assign {
            return None;
        }
        let target = node.child(0);
        let value = node.child(1);
        if target.is_none() || value.is_none() {
            return None;
        }
        Some((target, value))
    }

    pub fn if_parts(&self, index: NodeIndex) -> Option<IfParts> {
        let node = self.get(index)?;
        if node.kind != NodeKind::If {
            return None;
        }
        let condition = node.child(0);
        let then_block = node.child(1);
        if condition.is_none() || then_block.is_none() {
            return None;
        }
        let mut else_ifs = Vec::new();
        let mut else_block = None;
        for &child in node.children.iter().skip(2) {
            match self.kind(child) {
                Some(NodeKind::ElseIf) => {
                    let cond = self.children(child).first().copied()?;
                    let block = self.children(child).get(1).copied()?;
                    else_ifs.push((cond, block));
                }
                Some(NodeKind::Else) => {
                    else_block = self.children(child).first().copied();
                }
                _ => return None,
            }
        }
        Some(IfParts {
            condition,
            then_block,
            else_ifs,
            else_block,
        })
    }

    /// `(condition, body)` of a `While` node.
    pub fn while_parts(&self, index: NodeIndex) -> Option<(NodeIndex, NodeIndex)> {
        let node = self.get(index)?;
        if node.kind != NodeKind::While {
            return None;
        }
        let cond = node.child(0);
        let body = node.child(1);
        if cond.is_none() || body.is_none() {
            return None;
        }
        Some((cond, body))
    }

    pub fn function_parts(&self, index: NodeIndex) -> Option<FunctionParts> {
        let node = self.get(index)?;
        if !matches!(
            node.kind,
            NodeKind::FunctionDecl | NodeKind::MethodDecl | NodeKind::Closure
        ) {
            return None;
        }
        let mut parts = FunctionParts {
            params: Vec::new(),
            uses: Vec::new(),
            return_type: None,
            body: None,
        };
        for &child in &node.children {
            match self.kind(child) {
                Some(NodeKind::Param) => parts.params.push(child),
                Some(NodeKind::ClosureUse) => parts.uses.push(child),
                Some(NodeKind::TypeHint) => parts.return_type = Some(child),
                Some(NodeKind::Block) => parts.body = Some(child),
                _ => {}
            }
        }
        Some(parts)
    }

    /// `(type hint, default value)` of a `Param` or `PropertyDecl` node.
    pub fn typed_slot_parts(&self, index: NodeIndex) -> Option<(Option<&str>, Option<NodeIndex>)> {
        let node = self.get(index)?;
        if !matches!(node.kind, NodeKind::Param | NodeKind::PropertyDecl) {
            return None;
        }
        let mut hint = None;
        let mut default = None;
        for &child in &node.children {
            if self.kind(child) == Some(NodeKind::TypeHint) {
                hint = self.name_of(child);
            } else {
                default = Some(child);
            }
        }
        Some((hint, default))
    }

    pub fn class_parts(&self, index: NodeIndex) -> Option<ClassParts> {
        let node = self.get(index)?;
        if !node.kind.is_class_like() {
            return None;
        }
        let mut parts = ClassParts {
            extends: Vec::new(),
            implements: Vec::new(),
            traits: Vec::new(),
            members: Vec::new(),
        };
        for &child in &node.children {
            match self.kind(child) {
                Some(NodeKind::Extends) => parts.extends.extend_from_slice(self.children(child)),
                Some(NodeKind::Implements) => {
                    parts.implements.extend_from_slice(self.children(child))
                }
                Some(NodeKind::TraitUse) => parts.traits.extend_from_slice(self.children(child)),
                Some(_) => parts.members.push(child),
                None => {}
            }
        }
        Some(parts)
    }

    /// Value expression of a `ConstDecl`/`ClassConstDecl`.
    pub fn const_value(&self, index: NodeIndex) -> Option<NodeIndex> {
        let node = self.get(index)?;
        if !matches!(node.kind, NodeKind::ConstDecl | NodeKind::ClassConstDecl) {
            return None;
        }
        let value = node.child(0);
        value.is_some().then_some(value)
    }

    /// `(key, value)` of an `ArrayItem`.
    pub fn array_item_parts(&self, index: NodeIndex) -> Option<(Option<NodeIndex>, NodeIndex)> {
        let node = self.get(index)?;
        if node.kind != NodeKind::ArrayItem {
            return None;
        }
        match node.children.as_slice() {
            [value] => Some((None, *value)),
            [key, value] => Some((Some(*key), *value)),
            _ => None,
        }
    }

    /// Lower-cased name of a `ConstFetch` node.
    pub fn const_fetch_name(&self, index: NodeIndex) -> Option<String> {
        let node = self.get(index)?;
        if node.kind != NodeKind::ConstFetch {
            return None;
        }
        node.name().map(str::to_ascii_lowercase)
    }

    /// Whether the node is the literal `null`.
    pub fn is_null_literal(&self, index: NodeIndex) -> bool {
        self.const_fetch_name(index).as_deref() == Some("null")
    }

    /// `Some(true)`/`Some(false)` when the node is a boolean literal.
    pub fn bool_literal(&self, index: NodeIndex) -> Option<bool> {
        match self.const_fetch_name(index)?.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "../tests/arena_tests.rs"]
mod tests;
