//! Statement walker: the analysis phase for one file.
//!
//! The walker threads a [`Context`] through the statements of a file, in
//! source order. Assignments rebind variables; `if` and `while` split the
//! context with the [`ConditionVisitor`] and join the branch scopes again
//! with [`Scope::merge`]. Function, method and closure bodies are walked in
//! their own closed scopes as they are reached.
//!
//! Problems are reported as issues. An error raised while analysing one
//! statement becomes an issue at that statement and the walk continues with
//! the context from before it. Fatal errors (see [`CheckError::is_fatal`])
//! abandon the rest of the file.

use crate::conditions::ConditionVisitor;
use crate::context::Context;
use crate::error::{CheckError, CheckResult};
use crate::plugin::PluginSet;
use crate::scope::{GlobalState, Scope, Variable, VariableFlags};
use phz_ast::{BinaryOp, NodeArena, NodeIndex, NodeKind, node_flags};
use phz_codebase::{CodeBase, ParamDecl};
use phz_common::{IssueCollector, IssueKind, limits};
use phz_solver::{
    DepthCounter, ImportKind, LiteralValue, NamespaceMap, Qsn, RecursionProfile, ShapeKey,
    Soundness, SymbolKind, Type, TypeCheck, UnionType,
};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Variables PHP defines in every scope.
const SUPERGLOBALS: &[&str] = &[
    "GLOBALS", "_SERVER", "_GET", "_POST", "_FILES", "_COOKIE", "_SESSION", "_REQUEST", "_ENV",
];

/// Tunables for one walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalkOptions {
    pub soundness: Soundness,
    pub report_possibly_undefined: bool,
    /// Statement and expression nesting allowed before the file is abandoned.
    pub max_depth: u32,
}

impl Default for WalkOptions {
    fn default() -> Self {
        WalkOptions {
            soundness: Soundness::Lenient,
            report_possibly_undefined: true,
            max_depth: limits::MAX_WALK_DEPTH,
        }
    }
}

/// The context after a statement, and whether control leaves the enclosing
/// body there.
struct Flow {
    ctx: Context,
    exits: bool,
}

impl Flow {
    fn next(ctx: Context) -> Flow {
        Flow { ctx, exits: false }
    }
}

/// The declared return type of the body being walked.
struct ReturnFrame {
    name: String,
    declared: UnionType,
}

pub struct StatementWalker<'a> {
    codebase: &'a CodeBase,
    arena: &'a NodeArena,
    plugins: &'a PluginSet,
    issues: &'a mut IssueCollector,
    options: WalkOptions,
    depth: DepthCounter,
    returns: Vec<ReturnFrame>,
}

impl<'a> StatementWalker<'a> {
    pub fn new(
        codebase: &'a CodeBase,
        arena: &'a NodeArena,
        plugins: &'a PluginSet,
        issues: &'a mut IssueCollector,
    ) -> Self {
        StatementWalker::with_options(codebase, arena, plugins, issues, WalkOptions::default())
    }

    pub fn with_options(
        codebase: &'a CodeBase,
        arena: &'a NodeArena,
        plugins: &'a PluginSet,
        issues: &'a mut IssueCollector,
        options: WalkOptions,
    ) -> Self {
        StatementWalker {
            codebase,
            arena,
            plugins,
            issues,
            options,
            depth: DepthCounter::with_profile(RecursionProfile::Custom {
                max_depth: options.max_depth,
                max_iterations: u32::MAX,
            }),
            returns: Vec::new(),
        }
    }

    /// Walk the statements under `root` in the global scope backed by
    /// `globals`. Returns the context at the end of the file.
    ///
    /// On a fatal error an `AnalysisAborted` issue is raised and the error
    /// is returned; issues raised before it are kept.
    #[tracing::instrument(level = "debug", skip_all, fields(file = %file))]
    pub fn walk_file(
        &mut self,
        root: NodeIndex,
        file: &str,
        globals: Arc<GlobalState>,
    ) -> CheckResult<Context> {
        let ctx = Context::new(file, Scope::global(globals));
        match self.walk_statements(ctx, self.arena.children(root)) {
            Ok(flow) => Ok(flow.ctx),
            Err(err) => {
                warn!(file, error = %err, "file abandoned");
                let line = self.arena.line(root);
                self.issues.emit(err.to_issue(&Arc::from(file), line));
                Err(err)
            }
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn walk_statements(&mut self, ctx: Context, statements: &[NodeIndex]) -> CheckResult<Flow> {
        let mut ctx = ctx;
        for &stmt in statements {
            let flow = self.walk_statement(&ctx, stmt)?;
            if flow.exits {
                return Ok(flow);
            }
            ctx = flow.ctx;
        }
        Ok(Flow::next(ctx))
    }

    /// Walk one statement, turning a recoverable error into an issue.
    fn walk_statement(&mut self, ctx: &Context, stmt: NodeIndex) -> CheckResult<Flow> {
        if !self.depth.enter() {
            return Err(CheckError::NestingLimit {
                limit: self.options.max_depth,
            });
        }
        let at = ctx.with_line(self.arena.line(stmt));
        let result = self.statement(&at, stmt);
        self.depth.leave();

        let flow = match result {
            Ok(flow) => flow,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                debug!(at = %at, error = %err, "statement recovered");
                self.issues.emit(err.to_issue(at.file(), at.line()));
                Flow::next(at)
            }
        };
        self.plugins
            .node_analyzed(self.codebase, &flow.ctx, self.arena, stmt, self.issues);
        Ok(flow)
    }

    fn statement(&mut self, ctx: &Context, stmt: NodeIndex) -> CheckResult<Flow> {
        let Some(node) = self.arena.get(stmt) else {
            return Err(malformed_tree("dangling statement index"));
        };
        match node.kind {
            NodeKind::Namespace => {
                let name = node.name().unwrap_or_default();
                let inner = ctx.with_namespace_map(NamespaceMap::for_namespace(name));
                let flow = self.walk_statements(inner, &node.children)?;
                Ok(Flow {
                    ctx: flow.ctx.with_namespace_map(ctx.namespace_map().clone()),
                    exits: flow.exits,
                })
            }
            NodeKind::Use => {
                let Some(target) = node.name() else {
                    return Err(malformed_tree("use without a name"));
                };
                let kind = if node.has_flag(node_flags::USE_FUNCTION) {
                    ImportKind::Function
                } else if node.has_flag(node_flags::USE_CONST) {
                    ImportKind::Constant
                } else {
                    ImportKind::Class
                };
                let mut map = ctx.namespace_map().clone();
                map.add_import(kind, target, self.arena.name_of(node.child(0)));
                Ok(Flow::next(ctx.with_namespace_map(map)))
            }
            NodeKind::Block => self.walk_statements(ctx.clone(), &node.children),
            NodeKind::ExprStmt | NodeKind::Echo | NodeKind::ConstDecl => {
                for &expr in &node.children {
                    self.infer(ctx, expr)?;
                }
                Ok(Flow::next(ctx.clone()))
            }
            NodeKind::Assign => self.walk_assign(ctx, stmt),
            NodeKind::Return => self.walk_return(ctx, stmt),
            NodeKind::Unset => {
                let scope = node
                    .children
                    .iter()
                    .filter_map(|&var| self.arena.variable_name(var))
                    .fold(ctx.scope().clone(), |scope, name| scope.with_unset_variable(name));
                Ok(Flow::next(ctx.with_scope(scope)))
            }
            NodeKind::If => self.walk_if(ctx, stmt),
            NodeKind::While => self.walk_while(ctx, stmt),
            NodeKind::FunctionDecl => {
                self.walk_function(ctx, stmt)?;
                Ok(Flow::next(ctx.clone()))
            }
            NodeKind::ClassDecl | NodeKind::InterfaceDecl | NodeKind::TraitDecl => {
                self.walk_class(ctx, stmt)?;
                Ok(Flow::next(ctx.clone()))
            }
            _ => {
                self.infer(ctx, stmt)?;
                Ok(Flow::next(ctx.clone()))
            }
        }
    }

    fn walk_assign(&mut self, ctx: &Context, stmt: NodeIndex) -> CheckResult<Flow> {
        let (target, value) = self
            .arena
            .assign_parts(stmt)
            .ok_or_else(|| malformed_tree("assignment without target or value"))?;
        let union_type = self.infer(ctx, value)?;
        let Some(name) = self.arena.variable_name(target) else {
            return Ok(Flow::next(ctx.clone()));
        };
        trace!(name, ty = %union_type, "assigned");
        let variable = Variable::new(name, union_type.with_possibly_undefined(false), ctx.line());
        Ok(Flow::next(ctx.with_variable(variable)))
    }

    fn walk_return(&mut self, ctx: &Context, stmt: NodeIndex) -> CheckResult<Flow> {
        let returned = match self.arena.children(stmt).first() {
            Some(&value) => self.infer(ctx, value)?,
            None => UnionType::of(Type::Void),
        };
        if let Some(frame) = self.returns.last()
            && !returned.can_cast_to_union_type_in(&frame.declared, self.options.soundness, self.codebase)
        {
            let args = vec![returned.to_string(), frame.name.clone(), frame.declared.to_string()];
            self.issues.emit(ctx.issue(IssueKind::TypeMismatchReturn, args));
        }
        Ok(Flow {
            ctx: ctx.clone(),
            exits: true,
        })
    }

    fn walk_if(&mut self, ctx: &Context, stmt: NodeIndex) -> CheckResult<Flow> {
        let parts = self
            .arena
            .if_parts(stmt)
            .ok_or_else(|| malformed_tree("if without condition or body"))?;

        let mut ends: SmallVec<[Scope; 4]> = SmallVec::new();
        let branch = ctx.with_scope(Scope::branch(ctx.scope()));
        self.infer(&branch, parts.condition)?;
        let (when_true, mut when_false) = self.condition_branches(&branch, parts.condition);
        let flow = self.walk_statement(&when_true, parts.then_block)?;
        if !flow.exits {
            ends.push(flow.ctx.scope().clone());
        }

        for (condition, block) in parts.else_ifs {
            let fallthrough = when_false.with_scope(Scope::branch(when_false.scope()));
            self.infer(&fallthrough, condition)?;
            let (when_true, next_false) = self.condition_branches(&fallthrough, condition);
            let flow = self.walk_statement(&when_true, block)?;
            if !flow.exits {
                ends.push(flow.ctx.scope().clone());
            }
            when_false = next_false;
        }

        match parts.else_block {
            Some(block) => {
                let flow = self.walk_statement(&when_false, block)?;
                if !flow.exits {
                    ends.push(flow.ctx.scope().clone());
                }
            }
            None => ends.push(when_false.scope().clone()),
        }

        if ends.is_empty() {
            return Ok(Flow {
                ctx: ctx.clone(),
                exits: true,
            });
        }
        Ok(Flow::next(ctx.with_scope(Scope::merge(ctx.scope(), &ends))))
    }

    /// The loop body is walked once and joined with the path that never
    /// enters it.
    fn walk_while(&mut self, ctx: &Context, stmt: NodeIndex) -> CheckResult<Flow> {
        let (condition, body) = self
            .arena
            .while_parts(stmt)
            .ok_or_else(|| malformed_tree("while without condition or body"))?;
        let branch = ctx.with_scope(Scope::branch(ctx.scope()));
        self.infer(&branch, condition)?;
        let (when_true, when_false) = self.condition_branches(&branch, condition);
        let flow = self.walk_statement(&when_true, body)?;

        let mut ends: SmallVec<[Scope; 2]> = smallvec::smallvec![when_false.scope().clone()];
        if !flow.exits {
            ends.push(flow.ctx.scope().clone());
        }
        Ok(Flow::next(ctx.with_scope(Scope::merge(ctx.scope(), &ends))))
    }

    fn condition_branches(&mut self, ctx: &Context, condition: NodeIndex) -> (Context, Context) {
        ConditionVisitor::new(self.codebase, self.arena, self.issues).branches(ctx, condition)
    }

    fn narrowed(&mut self, ctx: &Context, condition: NodeIndex, sense: bool) -> Context {
        ConditionVisitor::new(self.codebase, self.arena, self.issues).narrow(ctx, condition, sense)
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    /// The declared name a declaration node was stored under: the alternate
    /// whose recorded file and line match the node.
    fn locate(&self, canonical: &Qsn, file: &str, line: u32) -> Qsn {
        self.codebase
            .alternates_of(canonical)
            .into_iter()
            .find(|qsn| {
                self.codebase
                    .decl_info(qsn)
                    .is_some_and(|info| &*info.file == file && info.line == line)
            })
            .unwrap_or_else(|| canonical.clone())
    }

    fn walk_function(&mut self, ctx: &Context, stmt: NodeIndex) -> CheckResult<()> {
        let name = self
            .arena
            .name_of(stmt)
            .ok_or_else(|| malformed_tree("function without a name"))?;
        let parts = self
            .arena
            .function_parts(stmt)
            .ok_or_else(|| malformed_tree("function without parts"))?;
        let canonical = Qsn::function(ctx.namespace_map().namespace(), name);
        let qsn = self.locate(&canonical, ctx.file(), ctx.line());
        let decl = self.codebase.get_function(&qsn)?;
        let Some(body) = parts.body else {
            return Ok(());
        };

        let body_ctx = Context::new(ctx.file().clone(), Scope::function_like(None, qsn.clone()))
            .with_namespace_map(ctx.namespace_map().clone())
            .with_line(ctx.line());
        let body_ctx = self.bind_params(body_ctx, &decl.params);
        let declared = self.bind_class_types(&body_ctx, &decl.return_type);
        let end = self.walk_body(body_ctx, body, qsn.to_string(), declared)?;
        self.plugins
            .function_analyzed(self.codebase, decl, &end, self.issues);
        Ok(())
    }

    fn walk_class(&mut self, ctx: &Context, stmt: NodeIndex) -> CheckResult<()> {
        let name = self
            .arena
            .name_of(stmt)
            .ok_or_else(|| malformed_tree("class without a name"))?;
        let parts = self
            .arena
            .class_parts(stmt)
            .ok_or_else(|| malformed_tree("class without parts"))?;
        let canonical = Qsn::class(ctx.namespace_map().namespace(), name);
        let class = self.locate(&canonical, ctx.file(), ctx.line());
        let decl = self.codebase.get_class(&class)?;

        let class_ctx = Context::new(ctx.file().clone(), Scope::class_body(class.clone()))
            .with_namespace_map(ctx.namespace_map().clone());
        for &member in &parts.members {
            let member_ctx = class_ctx.with_line(self.arena.line(member));
            let result = self.walk_member(&member_ctx, &class, member, decl.is_interface());
            self.recover(&member_ctx, result)?;
        }
        self.plugins.class_analyzed(self.codebase, decl, self.issues);
        Ok(())
    }

    fn walk_member(
        &mut self,
        ctx: &Context,
        class: &Qsn,
        member: NodeIndex,
        in_interface: bool,
    ) -> CheckResult<()> {
        let Some(node) = self.arena.get(member) else {
            return Err(malformed_tree("dangling member index"));
        };
        match node.kind {
            NodeKind::MethodDecl => {
                let name = node.name().ok_or_else(|| malformed_tree("method without a name"))?;
                let Some(body) = self.arena.function_parts(member).and_then(|parts| parts.body) else {
                    return Ok(());
                };
                let canonical = Qsn::member(SymbolKind::Method, class, name, 0);
                let qsn = self.locate(&canonical, ctx.file(), ctx.line());
                let method = self.codebase.get_method(&qsn)?;

                let mut body_ctx =
                    Context::new(ctx.file().clone(), Scope::function_like(Some(class.clone()), qsn.clone()))
                        .with_namespace_map(ctx.namespace_map().clone())
                        .with_line(ctx.line());
                if !method.is_static() && !in_interface {
                    let this = Variable::new("this", UnionType::of(Type::Class(class.clone())), ctx.line())
                        .with_flags(VariableFlags::THIS);
                    body_ctx = body_ctx.with_variable(this);
                }
                let body_ctx = self.bind_params(body_ctx, &method.params);
                let declared = self.bind_class_types(&body_ctx, &method.return_type);
                let end = self.walk_body(body_ctx, body, qsn.to_string(), declared)?;
                self.plugins
                    .method_analyzed(self.codebase, method, &end, self.issues);
            }
            NodeKind::PropertyDecl => {
                if let Some((_, Some(default))) = self.arena.typed_slot_parts(member) {
                    let init_ctx = ctx.with_scope(Scope::property(class.clone()));
                    self.infer(&init_ctx, default)?;
                }
            }
            NodeKind::ClassConstDecl => {
                if let Some(value) = self.arena.const_value(member) {
                    self.infer(ctx, value)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Walk a function-like body under its own return frame.
    fn walk_body(
        &mut self,
        ctx: Context,
        body: NodeIndex,
        name: String,
        declared: UnionType,
    ) -> CheckResult<Context> {
        self.returns.push(ReturnFrame { name, declared });
        let result = self.walk_statement(&ctx, body);
        self.returns.pop();
        Ok(result?.ctx)
    }

    fn bind_params(&self, ctx: Context, params: &[ParamDecl]) -> Context {
        params.iter().fold(ctx, |ctx, param| {
            let union_type = self.bind_class_types(&ctx, &param.union_type);
            let variable = Variable::new(param.name.clone(), union_type, ctx.line())
                .with_flags(VariableFlags::PARAMETER);
            ctx.with_variable(variable)
        })
    }

    fn recover(&mut self, ctx: &Context, result: CheckResult<()>) -> CheckResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                self.issues.emit(err.to_issue(ctx.file(), ctx.line()));
                Ok(())
            }
        }
    }

    /// Replace `self`, `static` and `parent` in a declared type with the
    /// classes they denote at `ctx`.
    fn bind_class_types(&self, ctx: &Context, union_type: &UnionType) -> UnionType {
        self.bind_class_types_to(ctx.scope().class_qsn().or(ctx.class()), union_type)
    }

    fn bind_class_types_to(&self, class: Option<&Qsn>, union_type: &UnionType) -> UnionType {
        let needs_binding = |ty: &Type| matches!(ty, Type::SelfType | Type::StaticType | Type::ParentType);
        let Some(class) = class else {
            return union_type.clone();
        };
        if !union_type.iter().any(needs_binding) {
            return union_type.clone();
        }
        let bind = |ty: &Type| match ty {
            Type::SelfType | Type::StaticType => Type::Class(class.clone()),
            Type::ParentType => match self.codebase.get_class(class).ok().and_then(|decl| decl.parent.clone()) {
                Some(parent) => Type::Class(parent),
                None => Type::Object,
            },
            other => other.clone(),
        };
        let bound = UnionType::from_types(union_type.types().iter().map(bind))
            .with_possibly_undefined(union_type.is_possibly_undefined());
        if union_type.real_types().is_empty() {
            bound
        } else {
            bound.with_real_types(union_type.real_types().iter().map(bind))
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// The type of `expr` at `ctx`, reporting undefined names on the way.
    pub fn infer(&mut self, ctx: &Context, expr: NodeIndex) -> CheckResult<UnionType> {
        if !self.depth.enter() {
            return Err(CheckError::NestingLimit {
                limit: self.options.max_depth,
            });
        }
        let result = self.expression(ctx, expr);
        self.depth.leave();
        result
    }

    fn expression(&mut self, ctx: &Context, expr: NodeIndex) -> CheckResult<UnionType> {
        let Some(node) = self.arena.get(expr) else {
            return Ok(UnionType::empty());
        };
        let ctx = &ctx.with_line(node.line);
        match node.kind {
            NodeKind::IntLiteral | NodeKind::FloatLiteral | NodeKind::StringLiteral => {
                Ok(phz_codebase::literal_type(self.arena, expr))
            }
            NodeKind::ConstFetch => self.infer_constant(ctx, expr),
            NodeKind::Variable => Ok(match node.name() {
                Some(name) => self.read_variable(ctx, name),
                None => UnionType::empty(),
            }),
            NodeKind::Array => self.infer_array(ctx, expr),
            NodeKind::New => self.infer_new(ctx, expr),
            NodeKind::Call => self.infer_call(ctx, expr),
            NodeKind::StaticCall => self.infer_static_call(ctx, expr),
            NodeKind::ClassConstFetch => self.infer_class_constant(ctx, expr),
            NodeKind::Binary => self.infer_binary(ctx, expr),
            NodeKind::Not => {
                if let Some(operand) = self.arena.not_operand(expr) {
                    self.infer(ctx, operand)?;
                }
                Ok(UnionType::of(Type::Bool))
            }
            NodeKind::InstanceOf => {
                if let Some((operand, class)) = self.arena.instanceof_parts(expr) {
                    self.infer(ctx, operand)?;
                    ctx.resolve_class_name(class, self.codebase)?;
                }
                Ok(UnionType::of(Type::Bool))
            }
            // isset() reads nothing that could be undefined.
            NodeKind::Isset => Ok(UnionType::of(Type::Bool)),
            NodeKind::Closure => self.infer_closure(ctx, expr),
            NodeKind::Assign => match self.arena.assign_parts(expr) {
                Some((_, value)) => self.infer(ctx, value),
                None => Ok(UnionType::empty()),
            },
            _ => Ok(UnionType::empty()),
        }
    }

    fn read_variable(&mut self, ctx: &Context, name: &str) -> UnionType {
        match ctx.get_variable(name) {
            Some(variable) => {
                if variable.is_possibly_undefined() && self.options.report_possibly_undefined {
                    self.issues.emit(ctx.issue(
                        IssueKind::PossiblyUndefinedVariable,
                        vec![name.to_string()],
                    ));
                }
                variable.union_type.with_possibly_undefined(false)
            }
            None if SUPERGLOBALS.contains(&name) => UnionType::of(Type::Array),
            None => {
                self.issues
                    .emit(ctx.issue(IssueKind::UndefinedVariable, vec![name.to_string()]));
                UnionType::empty()
            }
        }
    }

    fn infer_constant(&mut self, ctx: &Context, expr: NodeIndex) -> CheckResult<UnionType> {
        let literal = phz_codebase::literal_type(self.arena, expr);
        if !literal.is_unknown() {
            return Ok(literal);
        }
        let Some(name) = self.arena.name_of(expr) else {
            return Ok(UnionType::empty());
        };
        let qsn = ctx.resolve_global_fallback(SymbolKind::GlobalConstant, name, self.codebase)?;
        match self.codebase.get_constant(&qsn) {
            Ok(decl) => Ok(decl.union_type.clone()),
            Err(err) => {
                self.issues.emit(CheckError::from(err).to_issue(ctx.file(), ctx.line()));
                Ok(UnionType::empty())
            }
        }
    }

    fn infer_array(&mut self, ctx: &Context, expr: NodeIndex) -> CheckResult<UnionType> {
        let items = self.arena.children(expr);
        if items.is_empty() {
            return Ok(UnionType::of(Type::empty_array()));
        }
        let mut element = UnionType::impossible();
        let mut fields: Vec<(ShapeKey, UnionType)> = Vec::with_capacity(items.len());
        let mut keyed = false;
        let mut shaped = true;
        let mut next_index = 0i64;
        for &item in items {
            let Some((key, value)) = self.arena.array_item_parts(item) else {
                continue;
            };
            let value_type = self.infer(ctx, value)?;
            element = element.with_union_type(&value_type);
            let shape_key = match key {
                None => Some(ShapeKey::Int(next_index)),
                Some(key) => {
                    keyed = true;
                    match self.infer(ctx, key)?.types() {
                        [Type::Literal(LiteralValue::Int(index))] => Some(ShapeKey::Int(*index)),
                        [Type::Literal(LiteralValue::String(text))] => Some(ShapeKey::String(text.clone())),
                        _ => None,
                    }
                }
            };
            match shape_key {
                Some(shape_key) => {
                    if let ShapeKey::Int(index) = shape_key {
                        next_index = index.saturating_add(1);
                    }
                    fields.push((shape_key, value_type));
                }
                None => shaped = false,
            }
        }
        if keyed && shaped {
            return Ok(UnionType::of(Type::array_shape(fields)));
        }
        if element.is_impossible() {
            return Ok(UnionType::of(Type::Array));
        }
        Ok(UnionType::of(Type::array_of(element)))
    }

    fn infer_args(&mut self, ctx: &Context, args: &[NodeIndex]) -> CheckResult<Vec<UnionType>> {
        args.iter().map(|&arg| self.infer(ctx, arg)).collect()
    }

    fn infer_new(&mut self, ctx: &Context, expr: NodeIndex) -> CheckResult<UnionType> {
        let Some((class_name, args)) = self.arena.call_parts(expr) else {
            return Ok(UnionType::empty());
        };
        let class = ctx.resolve_class_name(class_name, self.codebase)?;
        let arg_types = self.infer_args(ctx, args)?;
        let Some(declared) = self.codebase.resolve_alternate(&class) else {
            self.issues
                .emit(ctx.issue(IssueKind::UndefinedClass, vec![class.to_string()]));
            return Ok(UnionType::of(Type::Class(class)));
        };
        if let Some(constructor) = self.codebase.find_method(&declared, "__construct") {
            let name = format!("{class}::__construct");
            self.check_arguments(ctx, Some(&class), &constructor.params, &arg_types, &name);
        }
        Ok(UnionType::of(Type::Class(class)))
    }

    fn infer_call(&mut self, ctx: &Context, expr: NodeIndex) -> CheckResult<UnionType> {
        let Some((name, args)) = self.arena.call_parts(expr) else {
            return Ok(UnionType::empty());
        };
        let arg_types = self.infer_args(ctx, args)?;
        let bare = name.trim_start_matches('\\');
        if TypeCheck::from_function_name(bare).is_some() {
            return Ok(UnionType::of(Type::Bool));
        }
        if bare.eq_ignore_ascii_case("get_class") {
            return Ok(UnionType::of(Type::String));
        }

        let qsn = ctx.resolve_global_fallback(SymbolKind::Function, name, self.codebase)?;
        match self.codebase.get_function(&qsn) {
            Ok(decl) => {
                self.check_arguments(ctx, None, &decl.params, &arg_types, &decl.qsn.to_string());
                Ok(decl.return_type.clone())
            }
            Err(err) => {
                self.issues.emit(CheckError::from(err).to_issue(ctx.file(), ctx.line()));
                Ok(UnionType::empty())
            }
        }
    }

    fn infer_static_call(&mut self, ctx: &Context, expr: NodeIndex) -> CheckResult<UnionType> {
        let Some((class_name, method_name, args)) = self.arena.static_call_parts(expr) else {
            return Ok(UnionType::empty());
        };
        let class = ctx.resolve_class_name(class_name, self.codebase)?;
        let arg_types = self.infer_args(ctx, args)?;
        let Some(class) = self.codebase.resolve_alternate(&class) else {
            self.issues
                .emit(ctx.issue(IssueKind::UndefinedClass, vec![class.to_string()]));
            return Ok(UnionType::empty());
        };
        let Some(method) = self.codebase.find_method(&class, method_name) else {
            self.issues.emit(ctx.issue(
                IssueKind::UndefinedMethod,
                vec![format!("{class}::{method_name}")],
            ));
            return Ok(UnionType::empty());
        };
        self.check_arguments(ctx, Some(&class), &method.params, &arg_types, &method.qsn.to_string());
        Ok(self.bind_class_types_to(Some(&class), &method.return_type))
    }

    fn infer_class_constant(&mut self, ctx: &Context, expr: NodeIndex) -> CheckResult<UnionType> {
        let Some((class_name, constant)) = self.arena.class_const_parts(expr) else {
            return Ok(UnionType::empty());
        };
        let class = ctx.resolve_class_name(class_name, self.codebase)?;
        if constant.eq_ignore_ascii_case("class") {
            return Ok(UnionType::of(Type::String));
        }
        match self.codebase.find_class_constant(&class, constant) {
            Some(decl) => Ok(decl.union_type.clone()),
            None => {
                self.issues.emit(ctx.issue(
                    IssueKind::UndefinedConstant,
                    vec![format!("{class}::{constant}")],
                ));
                Ok(UnionType::empty())
            }
        }
    }

    fn infer_binary(&mut self, ctx: &Context, expr: NodeIndex) -> CheckResult<UnionType> {
        let Some((op, left, right)) = self.arena.binary_parts(expr) else {
            return Ok(UnionType::empty());
        };
        match op {
            BinaryOp::BooleanAnd | BinaryOp::BooleanOr => {
                self.infer(ctx, left)?;
                // The right operand only runs once the left one has decided.
                // Its narrowing stays in a layer the expression owns.
                let branch = ctx.with_scope(Scope::branch(ctx.scope()));
                let right_ctx = self.narrowed(&branch, left, op == BinaryOp::BooleanAnd);
                self.infer(&right_ctx, right)?;
                Ok(UnionType::of(Type::Bool))
            }
            BinaryOp::Coalesce => {
                let left_type = match self.arena.variable_name(left) {
                    Some(name) => ctx
                        .get_variable(name)
                        .map(|variable| variable.union_type)
                        .unwrap_or_default(),
                    None => self.infer(ctx, left)?,
                };
                let right_type = self.infer(ctx, right)?;
                if left_type.is_unknown() {
                    return Ok(UnionType::empty());
                }
                Ok(left_type
                    .as_non_nullable()
                    .with_possibly_undefined(false)
                    .with_union_type(&right_type))
            }
            BinaryOp::Concat => {
                self.infer(ctx, left)?;
                self.infer(ctx, right)?;
                Ok(UnionType::of(Type::String))
            }
            op if op.is_arithmetic() => {
                let left_type = self.infer(ctx, left)?;
                let right_type = self.infer(ctx, right)?;
                Ok(arithmetic_type(op, &left_type, &right_type))
            }
            _ => {
                self.infer(ctx, left)?;
                self.infer(ctx, right)?;
                Ok(UnionType::of(Type::Bool))
            }
        }
    }

    fn infer_closure(&mut self, ctx: &Context, expr: NodeIndex) -> CheckResult<UnionType> {
        let closure_type = UnionType::of(Type::Class(Qsn::class("", "Closure")));
        let Some(parts) = self.arena.function_parts(expr) else {
            return Ok(closure_type);
        };
        let is_static = self.arena.get(expr).is_some_and(|node| node.has_flag(node_flags::STATIC));
        let name = format!("closure_{}", ctx.line());
        let qsn = Qsn::function(ctx.namespace_map().namespace(), &name);

        let mut body_ctx = Context::new(ctx.file().clone(), Scope::closure(ctx.scope(), qsn.clone(), None))
            .with_namespace_map(ctx.namespace_map().clone())
            .with_class(ctx.class().cloned())
            .with_line(ctx.line());
        if !is_static && let Some(this) = ctx.get_variable("this") {
            body_ctx = body_ctx.with_variable(this);
        }
        for &import in &parts.uses {
            let Some(name) = self.arena.name_of(import) else {
                continue;
            };
            match ctx.get_variable(name) {
                Some(variable) => {
                    body_ctx = body_ctx.with_variable(variable.with_flags(VariableFlags::CLOSURE_USE));
                }
                None => {
                    let at = ctx.with_line(self.arena.line(import));
                    self.issues
                        .emit(at.issue(IssueKind::UndefinedVariable, vec![name.to_string()]));
                }
            }
        }

        let mut params = Vec::with_capacity(parts.params.len());
        for &param in &parts.params {
            let Some(param_name) = self.arena.name_of(param) else {
                continue;
            };
            let (hint, default) = self.arena.typed_slot_parts(param).unwrap_or((None, None));
            let mut union_type = self.declared_type(ctx, hint)?;
            if default.is_some_and(|value| self.arena.is_null_literal(value)) && !union_type.is_unknown() {
                union_type = union_type.as_nullable();
            }
            params.push(ParamDecl::new(param_name, union_type));
        }
        let body_ctx = self.bind_params(body_ctx, &params);
        let return_hint = parts.return_type.and_then(|hint| self.arena.name_of(hint));
        let declared = self.declared_type(ctx, return_hint)?;
        let declared = self.bind_class_types(&body_ctx, &declared);

        if let Some(body) = parts.body {
            self.walk_body(body_ctx, body, qsn.to_string(), declared)?;
        }
        Ok(closure_type)
    }

    fn declared_type(&self, ctx: &Context, hint: Option<&str>) -> CheckResult<UnionType> {
        match hint {
            Some(text) => Ok(UnionType::from_type_string(text, ctx.namespace_map())?.as_real()),
            None => Ok(UnionType::empty()),
        }
    }

    fn check_arguments(
        &mut self,
        ctx: &Context,
        class: Option<&Qsn>,
        params: &[ParamDecl],
        args: &[UnionType],
        function: &str,
    ) {
        for (position, (param, arg)) in params.iter().zip(args).enumerate() {
            let expected = self.bind_class_types_to(class, &param.union_type);
            if arg.can_cast_to_union_type_in(&expected, self.options.soundness, self.codebase) {
                continue;
            }
            self.issues.emit(ctx.issue(
                IssueKind::TypeMismatchArgument,
                vec![
                    (position + 1).to_string(),
                    param.name.to_string(),
                    arg.to_string(),
                    function.to_string(),
                    expected.to_string(),
                ],
            ));
        }
    }
}

fn arithmetic_type(op: BinaryOp, left: &UnionType, right: &UnionType) -> UnionType {
    let int_like = |side: &UnionType| {
        !side.is_unknown() && side.iter().all(|ty| matches!(ty.widened(), Type::Int | Type::Bool))
    };
    let has_float = |side: &UnionType| side.has_type(&Type::Float);
    if int_like(left) && int_like(right) {
        if op == BinaryOp::Div {
            return UnionType::from_types([Type::Int, Type::Float]);
        }
        return UnionType::of(Type::Int);
    }
    if has_float(left) || has_float(right) {
        return UnionType::of(Type::Float);
    }
    UnionType::from_types([Type::Int, Type::Float])
}

fn malformed_tree(what: &str) -> CheckError {
    CheckError::InvariantViolation(format!("malformed syntax tree: {what}"))
}

#[cfg(test)]
#[path = "../tests/walker_tests.rs"]
mod tests;
