//! Analysis plugins.
//!
//! A plugin observes the walk and may raise issues. It sees the symbol table
//! and the context read-only; it cannot change types or scopes.

use crate::context::Context;
use phz_ast::{NodeArena, NodeIndex};
use phz_codebase::{ClassDecl, CodeBase, FunctionDecl, MethodDecl};
use phz_common::IssueCollector;
use tracing::trace;

/// Hooks invoked by the statement walker. Every hook defaults to doing
/// nothing.
pub trait AnalysisPlugin: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// After each statement, with the context reached after it.
    fn on_node_analyzed(
        &self,
        _codebase: &CodeBase,
        _ctx: &Context,
        _arena: &NodeArena,
        _node: NodeIndex,
        _issues: &mut IssueCollector,
    ) {
    }

    /// After every method of a class-like has been walked.
    fn on_class_analyzed(&self, _codebase: &CodeBase, _class: &ClassDecl, _issues: &mut IssueCollector) {}

    /// After a method body, with the context at its end.
    fn on_method_analyzed(
        &self,
        _codebase: &CodeBase,
        _method: &MethodDecl,
        _ctx: &Context,
        _issues: &mut IssueCollector,
    ) {
    }

    /// After a function body, with the context at its end.
    fn on_function_analyzed(
        &self,
        _codebase: &CodeBase,
        _function: &FunctionDecl,
        _ctx: &Context,
        _issues: &mut IssueCollector,
    ) {
    }
}

/// The registered plugins, called in registration order.
#[derive(Default)]
pub struct PluginSet {
    plugins: Vec<Box<dyn AnalysisPlugin>>,
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn AnalysisPlugin>) {
        trace!(plugin = plugin.name(), "plugin registered");
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.plugins.iter().map(|plugin| plugin.name())
    }

    pub fn node_analyzed(
        &self,
        codebase: &CodeBase,
        ctx: &Context,
        arena: &NodeArena,
        node: NodeIndex,
        issues: &mut IssueCollector,
    ) {
        for plugin in &self.plugins {
            plugin.on_node_analyzed(codebase, ctx, arena, node, issues);
        }
    }

    pub fn class_analyzed(&self, codebase: &CodeBase, class: &ClassDecl, issues: &mut IssueCollector) {
        for plugin in &self.plugins {
            plugin.on_class_analyzed(codebase, class, issues);
        }
    }

    pub fn method_analyzed(
        &self,
        codebase: &CodeBase,
        method: &MethodDecl,
        ctx: &Context,
        issues: &mut IssueCollector,
    ) {
        for plugin in &self.plugins {
            plugin.on_method_analyzed(codebase, method, ctx, issues);
        }
    }

    pub fn function_analyzed(
        &self,
        codebase: &CodeBase,
        function: &FunctionDecl,
        ctx: &Context,
        issues: &mut IssueCollector,
    ) {
        for plugin in &self.plugins {
            plugin.on_function_analyzed(codebase, function, ctx, issues);
        }
    }
}

impl std::fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
