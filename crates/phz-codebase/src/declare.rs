//! Declaration phase: record every declaration of one file in the CodeBase.
//!
//! The collector walks statements only (expressions declare nothing). It
//! tracks `namespace` blocks and `use` imports so that names in `extends`,
//! `implements` and type hints resolve the same way the checker resolves
//! them later.
//!
//! A declaration whose name is already taken (a function defined in both arms
//! of an `if`, a class declared in two files) is given the next free
//! alternate id before insertion, and a `Redeclared*` issue is raised.

use crate::codebase::CodeBase;
use crate::decls::{
    ClassDecl, ConstantDecl, DeclFlags, DeclInfo, FunctionDecl, MethodDecl, ParamDecl,
    PropertyDecl, Visibility,
};
use phz_ast::{NodeArena, NodeIndex, NodeKind, NodeValue, node_flags};
use phz_common::{IssueCollector, IssueKind, limits};
use phz_solver::{ImportKind, NamespaceMap, Qsn, SymbolKind, Type, UnionType};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct DeclarationCollector<'a> {
    codebase: &'a mut CodeBase,
    arena: &'a NodeArena,
    issues: &'a mut IssueCollector,
    file: Arc<str>,
    namespace_map: NamespaceMap,
    /// Nesting of `if`/`else`/loop bodies and function bodies around the
    /// current statement.
    conditional_depth: u32,
    declared: Vec<Qsn>,
}

impl<'a> DeclarationCollector<'a> {
    pub fn new(
        codebase: &'a mut CodeBase,
        arena: &'a NodeArena,
        file: &str,
        issues: &'a mut IssueCollector,
    ) -> Self {
        DeclarationCollector {
            codebase,
            arena,
            issues,
            file: Arc::from(file),
            namespace_map: NamespaceMap::new(),
            conditional_depth: 0,
            declared: Vec::new(),
        }
    }

    /// Declare everything under `root` (a `File` node or any statement list
    /// parent). Returns the names actually inserted, in source order.
    pub fn collect(mut self, root: NodeIndex) -> Vec<Qsn> {
        self.codebase.begin_file(&self.file);
        self.collect_statements(root);
        debug!(file = %self.file, declared = self.declared.len(), "declared file");
        self.declared
    }

    fn collect_statements(&mut self, parent: NodeIndex) {
        for &stmt in self.arena.children(parent) {
            self.collect_statement(stmt);
        }
    }

    fn collect_statement(&mut self, stmt: NodeIndex) {
        let Some(node) = self.arena.get(stmt) else {
            return;
        };
        match node.kind {
            NodeKind::Namespace => {
                let name = node.name().unwrap_or_default();
                let outer = std::mem::replace(&mut self.namespace_map, NamespaceMap::for_namespace(name));
                self.collect_statements(stmt);
                self.namespace_map = outer;
            }
            NodeKind::Use => self.collect_use(stmt),
            NodeKind::Block => self.collect_statements(stmt),
            NodeKind::If => {
                let Some(parts) = self.arena.if_parts(stmt) else {
                    return;
                };
                self.conditional_depth += 1;
                self.collect_statements(parts.then_block);
                for (_, block) in parts.else_ifs {
                    self.collect_statements(block);
                }
                if let Some(block) = parts.else_block {
                    self.collect_statements(block);
                }
                self.conditional_depth -= 1;
            }
            NodeKind::While => {
                if let Some((_, body)) = self.arena.while_parts(stmt) {
                    self.conditional_depth += 1;
                    self.collect_statements(body);
                    self.conditional_depth -= 1;
                }
            }
            NodeKind::FunctionDecl => self.collect_function(stmt),
            NodeKind::ClassDecl | NodeKind::InterfaceDecl | NodeKind::TraitDecl => {
                self.collect_class(stmt)
            }
            NodeKind::ConstDecl => self.collect_global_constant(stmt),
            _ => {}
        }
    }

    fn collect_use(&mut self, stmt: NodeIndex) {
        let Some(node) = self.arena.get(stmt) else {
            return;
        };
        let Some(target) = node.name() else {
            return;
        };
        let kind = if node.has_flag(node_flags::USE_FUNCTION) {
            ImportKind::Function
        } else if node.has_flag(node_flags::USE_CONST) {
            ImportKind::Constant
        } else {
            ImportKind::Class
        };
        let alias = self.arena.name_of(node.child(0));
        self.namespace_map.add_import(kind, target, alias);
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn collect_function(&mut self, stmt: NodeIndex) {
        let Some(name) = self.arena.name_of(stmt) else {
            return;
        };
        let Some(parts) = self.arena.function_parts(stmt) else {
            return;
        };
        let line = self.arena.line(stmt);
        let qsn = Qsn::function(self.namespace_map.namespace(), name);
        let Some(qsn) = self.free_alternate(&qsn, line) else {
            return;
        };
        let info = self.decl_info(stmt, DeclFlags::empty());
        let params = self.collect_params(&parts.params);
        let return_type = self.declared_type(parts.return_type);
        let decl = FunctionDecl::new(qsn.clone(), info)
            .with_params(params)
            .with_return_type(return_type);
        if self.codebase.add_function(decl).is_ok() {
            self.declared.push(qsn);
        }

        // Functions declared inside a body only exist once it runs.
        if let Some(body) = parts.body {
            self.conditional_depth += 1;
            self.collect_statements(body);
            self.conditional_depth -= 1;
        }
    }

    fn collect_params(&mut self, params: &[NodeIndex]) -> Vec<ParamDecl> {
        params
            .iter()
            .filter_map(|&param| {
                let name = self.arena.name_of(param)?;
                let (hint, default) = self.arena.typed_slot_parts(param)?;
                let line = self.arena.line(param);
                let mut union_type = match hint {
                    Some(hint) => self.parse_type(hint, line),
                    None => UnionType::empty(),
                };
                if default.is_some_and(|d| self.arena.is_null_literal(d)) && !union_type.is_empty() {
                    union_type = union_type.as_nullable();
                }
                let decl = ParamDecl::new(name, union_type);
                Some(if default.is_some() { decl.optional() } else { decl })
            })
            .collect()
    }

    // =========================================================================
    // Classes
    // =========================================================================

    fn collect_class(&mut self, stmt: NodeIndex) {
        let Some(node) = self.arena.get(stmt) else {
            return;
        };
        let Some(name) = node.name() else {
            return;
        };
        let Some(parts) = self.arena.class_parts(stmt) else {
            return;
        };
        let line = node.line;
        let mut flags = modifier_flags(node.flags);
        match node.kind {
            NodeKind::InterfaceDecl => flags |= DeclFlags::INTERFACE | DeclFlags::ABSTRACT,
            NodeKind::TraitDecl => flags |= DeclFlags::TRAIT,
            _ => {}
        }
        let is_interface = node.kind == NodeKind::InterfaceDecl;

        let qsn = Qsn::class(self.namespace_map.namespace(), name);
        let Some(qsn) = self.free_alternate(&qsn, line) else {
            return;
        };

        let extends = self.resolve_class_names(&parts.extends);
        let implements = self.resolve_class_names(&parts.implements);
        let traits = self.resolve_class_names(&parts.traits);

        let mut decl = ClassDecl::new(qsn.clone(), self.decl_info(stmt, flags)).with_traits(traits);
        if is_interface {
            // `interface A extends B, C` lists parent interfaces.
            decl = decl.with_interfaces(extends);
        } else {
            if let Some(parent) = extends.into_iter().next() {
                decl = decl.with_parent(parent);
            }
            decl = decl.with_interfaces(implements);
        }
        if self.codebase.add_class(decl).is_err() {
            return;
        }
        self.declared.push(qsn.clone());

        for &member in &parts.members {
            match self.arena.kind(member) {
                Some(NodeKind::MethodDecl) => self.collect_method(&qsn, member, is_interface),
                Some(NodeKind::PropertyDecl) => self.collect_property(&qsn, member),
                Some(NodeKind::ClassConstDecl) => self.collect_class_constant(&qsn, member),
                _ => {}
            }
        }
    }

    fn resolve_class_names(&mut self, names: &[NodeIndex]) -> Vec<Qsn> {
        names
            .iter()
            .filter_map(|&name_node| {
                let text = self.arena.name_of(name_node)?;
                self.resolve_class_name(text, self.arena.line(name_node))
            })
            .collect()
    }

    fn resolve_class_name(&mut self, text: &str, line: u32) -> Option<Qsn> {
        match Qsn::from_string_in_context(SymbolKind::Class, text, &self.namespace_map) {
            Ok(qsn) => Some(qsn),
            Err(err) => {
                self.report_malformed(text, &err.to_string(), line);
                None
            }
        }
    }

    fn collect_method(&mut self, class: &Qsn, member: NodeIndex, in_interface: bool) {
        let Some(node) = self.arena.get(member) else {
            return;
        };
        let Some(name) = node.name() else {
            return;
        };
        let Some(parts) = self.arena.function_parts(member) else {
            return;
        };
        let line = node.line;
        let mut flags = modifier_flags(node.flags);
        if in_interface || parts.body.is_none() {
            flags |= DeclFlags::ABSTRACT;
        }
        let visibility = visibility_of(node.flags);
        let qsn = Qsn::member(SymbolKind::Method, class, name, 0);
        let Some(qsn) = self.free_alternate(&qsn, line) else {
            return;
        };
        let params = self.collect_params(&parts.params);
        let return_type = self.declared_type(parts.return_type);
        let info = self.decl_info(member, flags).with_visibility(visibility);
        let decl = MethodDecl::new(qsn.clone(), info)
            .with_params(params)
            .with_return_type(return_type);
        if self.codebase.add_method(decl).is_ok() {
            self.declared.push(qsn);
        }
    }

    fn collect_property(&mut self, class: &Qsn, member: NodeIndex) {
        let Some(node) = self.arena.get(member) else {
            return;
        };
        let Some(name) = node.name() else {
            return;
        };
        let Some((hint, default)) = self.arena.typed_slot_parts(member) else {
            return;
        };
        let line = node.line;
        let flags = modifier_flags(node.flags);
        let visibility = visibility_of(node.flags);
        let union_type = match hint {
            Some(hint) => self.parse_type(hint, line),
            None => default
                .map(|value| widened(&literal_type(self.arena, value)))
                .unwrap_or_default(),
        };
        let qsn = Qsn::member(SymbolKind::Property, class, name, 0);
        let Some(qsn) = self.free_alternate(&qsn, line) else {
            return;
        };
        let info = self.decl_info(member, flags).with_visibility(visibility);
        if self
            .codebase
            .add_property(PropertyDecl::new(qsn.clone(), info, union_type))
            .is_ok()
        {
            self.declared.push(qsn);
        }
    }

    fn collect_class_constant(&mut self, class: &Qsn, member: NodeIndex) {
        let Some(name) = self.arena.name_of(member) else {
            return;
        };
        let line = self.arena.line(member);
        let union_type = self
            .arena
            .const_value(member)
            .map(|value| literal_type(self.arena, value))
            .unwrap_or_default();
        let qsn = Qsn::member(SymbolKind::ClassConstant, class, name, 0);
        let Some(qsn) = self.free_alternate(&qsn, line) else {
            return;
        };
        let info = self.decl_info(member, DeclFlags::empty());
        if self
            .codebase
            .add_constant(ConstantDecl::new(qsn.clone(), info, union_type))
            .is_ok()
        {
            self.declared.push(qsn);
        }
    }

    fn collect_global_constant(&mut self, stmt: NodeIndex) {
        let Some(name) = self.arena.name_of(stmt) else {
            return;
        };
        let line = self.arena.line(stmt);
        let union_type = self
            .arena
            .const_value(stmt)
            .map(|value| literal_type(self.arena, value))
            .unwrap_or_default();
        let qsn = Qsn::constant(self.namespace_map.namespace(), name);
        let Some(qsn) = self.free_alternate(&qsn, line) else {
            return;
        };
        let info = self.decl_info(stmt, DeclFlags::empty());
        if self
            .codebase
            .add_constant(ConstantDecl::new(qsn.clone(), info, union_type))
            .is_ok()
        {
            self.declared.push(qsn);
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// The name this declaration will be stored under, raising a
    /// redeclaration issue when it is not the canonical one.
    fn free_alternate(&mut self, qsn: &Qsn, line: u32) -> Option<Qsn> {
        let Some(free) = self.codebase.next_free_alternate(qsn) else {
            warn!(name = %qsn, limit = limits::MAX_ALTERNATE_ID, "alternate ids exhausted");
            return None;
        };
        if free.is_alternate() {
            let kind = match qsn.kind() {
                SymbolKind::Class => Some(IssueKind::RedeclaredClass),
                SymbolKind::Function => Some(IssueKind::RedeclaredFunction),
                _ => None,
            };
            if let Some(kind) = kind {
                let previous = self
                    .codebase
                    .decl_info(&qsn.canonical())
                    .map(|info| format!("{}:{}", info.file, info.line))
                    .unwrap_or_else(|| qsn.canonical().to_string());
                self.issues.emit_kind(
                    kind,
                    Arc::clone(&self.file),
                    line,
                    vec![free.to_string(), previous],
                );
            }
            debug!(name = %free, "declared under alternate id");
        }
        Some(free)
    }

    fn decl_info(&self, node: NodeIndex, flags: DeclFlags) -> DeclInfo {
        let mut flags = flags;
        if self.conditional_depth > 0 {
            flags |= DeclFlags::CONDITIONAL;
        }
        DeclInfo::new(Arc::clone(&self.file), self.arena.line(node)).with_flags(flags)
    }

    fn declared_type(&mut self, hint: Option<NodeIndex>) -> UnionType {
        let Some(hint) = hint else {
            return UnionType::empty();
        };
        let line = self.arena.line(hint);
        match self.arena.name_of(hint) {
            Some(text) => self.parse_type(text, line),
            None => UnionType::empty(),
        }
    }

    /// Parse a declared type; declared types are guaranteed at runtime, so
    /// they are also the real types.
    fn parse_type(&mut self, text: &str, line: u32) -> UnionType {
        match UnionType::from_type_string(text, &self.namespace_map) {
            Ok(union_type) => union_type.as_real(),
            Err(err) => {
                self.report_malformed(text, &err.to_string(), line);
                UnionType::empty()
            }
        }
    }

    fn report_malformed(&mut self, text: &str, reason: &str, line: u32) {
        self.issues.emit_kind(
            IssueKind::MalformedName,
            Arc::clone(&self.file),
            line,
            vec![text.to_string(), reason.to_string()],
        );
    }
}

fn modifier_flags(node_bits: u32) -> DeclFlags {
    let mut flags = DeclFlags::empty();
    if node_bits & node_flags::ABSTRACT != 0 {
        flags |= DeclFlags::ABSTRACT;
    }
    if node_bits & node_flags::FINAL != 0 {
        flags |= DeclFlags::FINAL;
    }
    if node_bits & node_flags::STATIC != 0 {
        flags |= DeclFlags::STATIC;
    }
    if node_bits & node_flags::DEPRECATED != 0 {
        flags |= DeclFlags::DEPRECATED;
    }
    flags
}

fn visibility_of(node_bits: u32) -> Visibility {
    if node_bits & node_flags::PRIVATE != 0 {
        Visibility::Private
    } else if node_bits & node_flags::PROTECTED != 0 {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

/// Type of a constant initializer. Only literal forms are understood;
/// anything else is unknown.
pub fn literal_type(arena: &NodeArena, value: NodeIndex) -> UnionType {
    let Some(node) = arena.get(value) else {
        return UnionType::empty();
    };
    match (&node.kind, &node.value) {
        (NodeKind::IntLiteral, NodeValue::Int(v)) => UnionType::of(Type::int_literal(*v)),
        (NodeKind::FloatLiteral, _) => UnionType::of(Type::Float),
        (NodeKind::StringLiteral, NodeValue::Str(s)) => UnionType::of(Type::string_literal(s)),
        (NodeKind::Array, _) if node.children.is_empty() => UnionType::of(Type::empty_array()),
        (NodeKind::Array, _) => UnionType::of(Type::Array),
        (NodeKind::ConstFetch, _) => match arena.const_fetch_name(value).as_deref() {
            Some("null") => UnionType::of(Type::Null),
            Some("true") => UnionType::of(Type::True),
            Some("false") => UnionType::of(Type::False),
            _ => UnionType::empty(),
        },
        _ => UnionType::empty(),
    }
}

/// `0` becomes `int`, `[]` becomes `array`: a property default does not pin
/// the property to that value.
fn widened(union_type: &UnionType) -> UnionType {
    union_type.iter().map(Type::widened).collect()
}

#[cfg(test)]
#[path = "../tests/declare_tests.rs"]
mod tests;
