use smallvec::SmallVec;
use std::sync::Arc;

/// Index of a node inside a [`crate::NodeArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Sentinel for "no node".
    pub const NONE: NodeIndex = NodeIndex(u32::MAX);

    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    #[inline]
    pub fn is_some(self) -> bool {
        !self.is_none()
    }
}

/// Node kind tags.
///
/// Child layouts (`[..]` lists the children in order, `?` marks optional):
///
/// | Kind | Value | Children |
/// |------|-------|----------|
/// | `File` | file path | statements |
/// | `Namespace` | namespace name | statements |
/// | `Use` | imported name | `[Name alias]?` (flags: `USE_FUNCTION` / `USE_CONST`) |
/// | `Block` | - | statements |
/// | `If` | - | `[cond, Block, ElseIf*, Else?]` |
/// | `ElseIf` | - | `[cond, Block]` |
/// | `Else` | - | `[Block]` |
/// | `While` | - | `[cond, Block]` |
/// | `ExprStmt` | - | `[expr]` |
/// | `Assign` | - | `[Variable, expr]` |
/// | `Return` | - | `[expr]?` |
/// | `Echo` / `Unset` / `Isset` | - | expressions / variables |
/// | `FunctionDecl` / `MethodDecl` | name | `[Param*, TypeHint?, Block?]` |
/// | `Closure` | - | `[Param*, ClosureUse*, TypeHint?, Block]` |
/// | `ClosureUse` | variable name | - |
/// | `Param` | variable name | `[TypeHint?, default?]` |
/// | `TypeHint` | declared type text (`?int`, `Foo\|null`) | - |
/// | `ClassDecl` / `InterfaceDecl` / `TraitDecl` | name | `[Extends?, Implements?, TraitUse*, members*]` |
/// | `Extends` / `Implements` / `TraitUse` | - | `Name*` |
/// | `PropertyDecl` | property name | `[TypeHint?, default?]` |
/// | `ClassConstDecl` / `ConstDecl` | constant name | `[expr]` |
/// | `Variable` | name without `$` | - |
/// | `Name` | name as written | - |
/// | `IntLiteral` / `FloatLiteral` / `StringLiteral` | the literal | - |
/// | `ConstFetch` | constant name (`null`, `true`, `PHP_EOL`) | - |
/// | `Array` | - | `ArrayItem*` |
/// | `ArrayItem` | - | `[value]` or `[key, value]` |
/// | `New` | - | `[Name, args*]` |
/// | `Call` | - | `[Name, args*]` |
/// | `StaticCall` | method name | `[Name, args*]` |
/// | `ClassConstFetch` | constant name (`class` for `Foo::class`) | `[Name]` |
/// | `Binary` | [`BinaryOp`] | `[left, right]` |
/// | `Not` | - | `[expr]` |
/// | `InstanceOf` | - | `[expr, Name]` |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Namespace,
    Use,
    Block,
    If,
    ElseIf,
    Else,
    While,
    ExprStmt,
    Assign,
    Return,
    Echo,
    Unset,
    FunctionDecl,
    MethodDecl,
    Closure,
    ClosureUse,
    Param,
    TypeHint,
    ClassDecl,
    InterfaceDecl,
    TraitDecl,
    Extends,
    Implements,
    TraitUse,
    PropertyDecl,
    ClassConstDecl,
    ConstDecl,
    Variable,
    Name,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    ConstFetch,
    Array,
    ArrayItem,
    New,
    Call,
    StaticCall,
    ClassConstFetch,
    Binary,
    Not,
    InstanceOf,
    Isset,
}

impl NodeKind {
    pub fn is_class_like(self) -> bool {
        matches!(
            self,
            NodeKind::ClassDecl | NodeKind::InterfaceDecl | NodeKind::TraitDecl
        )
    }

    pub fn is_statement(self) -> bool {
        matches!(
            self,
            NodeKind::Namespace
                | NodeKind::Use
                | NodeKind::Block
                | NodeKind::If
                | NodeKind::While
                | NodeKind::ExprStmt
                | NodeKind::Assign
                | NodeKind::Return
                | NodeKind::Echo
                | NodeKind::Unset
                | NodeKind::FunctionDecl
                | NodeKind::ClassDecl
                | NodeKind::InterfaceDecl
                | NodeKind::TraitDecl
                | NodeKind::ConstDecl
        )
    }
}

/// Binary operators the analyzer distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Identical,
    NotIdentical,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    BooleanAnd,
    BooleanOr,
    Plus,
    Minus,
    Mul,
    Div,
    Concat,
    Coalesce,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Identical
                | BinaryOp::NotIdentical
                | BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessOrEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterOrEqual
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Mul | BinaryOp::Div
        )
    }
}

/// Scalar payload of a node.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeValue {
    None,
    Name(Arc<str>),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Op(BinaryOp),
}

/// Modifier and import flags carried by declaration nodes.
pub mod node_flags {
    pub const NONE: u32 = 0;
    pub const ABSTRACT: u32 = 1 << 0;
    pub const FINAL: u32 = 1 << 1;
    pub const STATIC: u32 = 1 << 2;
    pub const PRIVATE: u32 = 1 << 3;
    pub const PROTECTED: u32 = 1 << 4;
    pub const DEPRECATED: u32 = 1 << 5;
    pub const BY_REF: u32 = 1 << 6;
    pub const USE_FUNCTION: u32 = 1 << 7;
    pub const USE_CONST: u32 = 1 << 8;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub line: u32,
    pub flags: u32,
    pub value: NodeValue,
    pub children: SmallVec<[NodeIndex; 4]>,
}

impl Node {
    /// The name payload, if this node carries one.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        match &self.value {
            NodeValue::Name(name) => Some(name),
            _ => None,
        }
    }

    #[inline]
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    #[inline]
    pub fn child(&self, i: usize) -> NodeIndex {
        self.children.get(i).copied().unwrap_or(NodeIndex::NONE)
    }
}
