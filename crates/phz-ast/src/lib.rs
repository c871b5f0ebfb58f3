//! Syntax tree interface for the phz analyzer.
//!
//! Tokenizing and parsing happen outside the analysis core. A parser hands the
//! core a [`NodeArena`] whose nodes carry a stable [`NodeKind`] tag, a line
//! number, an optional scalar payload and an ordered child list. The child
//! layout of every kind is documented on [`NodeKind`]; the typed accessors on
//! [`NodeArena`] decode those layouts and return `None` for malformed trees.
//!
//! The analyzer never mutates a tree it has been given.

mod arena;
mod builder;
mod node;

pub use arena::{ClassParts, FunctionParts, IfParts, NodeArena};
pub use builder::AstBuilder;
pub use node::{BinaryOp, Node, NodeIndex, NodeKind, NodeValue, node_flags};
