use super::*;
use crate::plugin::AnalysisPlugin;
use phz_ast::{AstBuilder, NodeValue};
use phz_codebase::{DeclarationCollector, FunctionDecl};
use std::sync::atomic::{AtomicUsize, Ordering};

const FILE: &str = "test.php";

struct Run {
    issues: IssueCollector,
    result: CheckResult<Context>,
}

impl Run {
    fn ctx(&self) -> &Context {
        self.result.as_ref().expect("walk should succeed")
    }

    fn type_of(&self, name: &str) -> String {
        self.ctx()
            .get_variable(name)
            .map(|variable| variable.union_type.to_string())
            .unwrap_or_else(|| "unbound".to_string())
    }

    fn args_of(&self, kind: IssueKind) -> Vec<Vec<String>> {
        self.issues
            .issues()
            .iter()
            .filter(|issue| issue.kind == kind)
            .map(|issue| issue.args.clone())
            .collect()
    }
}

fn analyze(arena: &NodeArena, root: NodeIndex) -> Run {
    analyze_with(arena, root, &PluginSet::new(), WalkOptions::default())
}

fn analyze_with(arena: &NodeArena, root: NodeIndex, plugins: &PluginSet, options: WalkOptions) -> Run {
    let mut codebase = CodeBase::new();
    let mut issues = IssueCollector::new();
    DeclarationCollector::new(&mut codebase, arena, FILE, &mut issues).collect(root);
    let result = StatementWalker::with_options(&codebase, arena, plugins, &mut issues, options)
        .walk_file(root, FILE, GlobalState::new());
    Run { issues, result }
}

#[test]
fn test_undefined_variable_is_reported_at_its_line() {
    let mut b = AstBuilder::new();
    b.at(3);
    let x = b.var("x");
    let echo = b.echo(&[x]);
    let root = b.file(FILE, &[echo]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    let issues = run.issues.issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueKind::UndefinedVariable);
    assert_eq!(issues[0].line, 3);
    assert_eq!(issues[0].args, vec!["x".to_string()]);
}

#[test]
fn test_assignment_binds_literal_type() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let assign = b.assign("a", one);
    let a = b.var("a");
    let echo = b.echo(&[a]);
    let root = b.file(FILE, &[assign, echo]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert!(run.issues.is_empty());
    assert_eq!(run.type_of("a"), "1");
}

#[test]
fn test_if_else_merge_at_file_level() {
    // if ($c) { $a = 1; $b = 'x'; } else { $a = 2; }
    let mut b = AstBuilder::new();
    let flag = b.bool_lit(true);
    let flag_type = b.call("is_bool", &[flag]);
    let set_c = b.assign("c", flag_type);
    let one = b.int(1);
    let a1 = b.assign("a", one);
    let x = b.string("x");
    let b1 = b.assign("b", x);
    let then_block = b.block(&[a1, b1]);
    let two = b.int(2);
    let a2 = b.assign("a", two);
    let else_block = b.block(&[a2]);
    let c = b.var("c");
    let if_stmt = b.if_stmt(c, then_block, &[], Some(else_block));
    let root = b.file(FILE, &[set_c, if_stmt]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert_eq!(run.type_of("a"), "1|2");
    assert_eq!(run.type_of("b"), "'x'|undefined");
}

#[test]
fn test_possibly_undefined_read_after_if() {
    // function f(bool $c) { if ($c) { $b = 'x'; } echo $b; }
    let mut b = AstBuilder::new();
    let param = b.param("c", Some("bool"), None);
    let x = b.string("x");
    let assign = b.assign("b", x);
    let then_block = b.block(&[assign]);
    let c = b.var("c");
    let if_stmt = b.if_stmt(c, then_block, &[], None);
    b.at(4);
    let read = b.var("b");
    let echo = b.echo(&[read]);
    let body = b.block(&[if_stmt, echo]);
    let function = b.function("f", &[param], None, body);
    let root = b.file(FILE, &[function]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert_eq!(run.args_of(IssueKind::PossiblyUndefinedVariable), vec![vec!["b".to_string()]]);
    assert!(!run.issues.has_kind(IssueKind::UndefinedVariable));

    let quiet = WalkOptions {
        report_possibly_undefined: false,
        ..WalkOptions::default()
    };
    let run = analyze_with(&arena, root, &PluginSet::new(), quiet);
    assert!(run.issues.is_empty());
}

#[test]
fn test_while_body_assignment_is_possibly_undefined() {
    // function f(int $i) { while ($i) { $w = 1; } echo $w; }
    let mut b = AstBuilder::new();
    let param = b.param("i", Some("int"), None);
    let one = b.int(1);
    let assign = b.assign("w", one);
    let body = b.block(&[assign]);
    let i = b.var("i");
    let loop_stmt = b.while_stmt(i, body);
    let w = b.var("w");
    let echo = b.echo(&[w]);
    let fn_body = b.block(&[loop_stmt, echo]);
    let function = b.function("f", &[param], None, fn_body);
    let root = b.file(FILE, &[function]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert!(run.issues.has_kind(IssueKind::PossiblyUndefinedVariable));
}

#[test]
fn test_unset_variable_is_undefined_afterwards() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let assign = b.assign("gone", one);
    let target = b.var("gone");
    let unset = b.unset(&[target]);
    let read = b.var("gone");
    let echo = b.echo(&[read]);
    let root = b.file(FILE, &[assign, unset, echo]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert_eq!(run.args_of(IssueKind::UndefinedVariable), vec![vec!["gone".to_string()]]);
}

#[test]
fn test_return_type_mismatch() {
    // function f(): int { return 'x'; }
    let mut b = AstBuilder::new();
    let x = b.string("x");
    let ret = b.ret(Some(x));
    let body = b.block(&[ret]);
    let function = b.function("f", &[], Some("int"), body);
    let root = b.file(FILE, &[function]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert_eq!(
        run.args_of(IssueKind::TypeMismatchReturn),
        vec![vec!["'x'".to_string(), "\\f".to_string(), "int".to_string()]]
    );
}

#[test]
fn test_early_return_narrows_rest_of_body() {
    // function f(?int $x): int { if ($x === null) { return 0; } return $x; }
    let mut b = AstBuilder::new();
    let param = b.param("x", Some("?int"), None);
    let zero = b.int(0);
    let early = b.ret(Some(zero));
    let then_block = b.block(&[early]);
    let x = b.var("x");
    let null = b.null();
    let cond = b.binary(BinaryOp::Identical, x, null);
    let if_stmt = b.if_stmt(cond, then_block, &[], None);
    let x_again = b.var("x");
    let ret = b.ret(Some(x_again));
    let body = b.block(&[if_stmt, ret]);
    let function = b.function("f", &[param], Some("int"), body);
    let root = b.file(FILE, &[function]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert!(run.issues.is_empty(), "unexpected issues: {:?}", run.issues.issues());
}

#[test]
fn test_argument_type_mismatch() {
    // function g(int $n) {} g('x');
    let mut b = AstBuilder::new();
    let param = b.param("n", Some("int"), None);
    let body = b.block(&[]);
    let function = b.function("g", &[param], None, body);
    let arg = b.string("x");
    let call = b.call("g", &[arg]);
    let stmt = b.expr_stmt(call);
    let root = b.file(FILE, &[function, stmt]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert_eq!(
        run.args_of(IssueKind::TypeMismatchArgument),
        vec![vec![
            "1".to_string(),
            "n".to_string(),
            "'x'".to_string(),
            "\\g".to_string(),
            "int".to_string(),
        ]]
    );
}

#[test]
fn test_undefined_symbols_are_reported() {
    let mut b = AstBuilder::new();
    let new_object = b.new_object("Missing", &[]);
    let s1 = b.expr_stmt(new_object);
    let call = b.call("nope", &[]);
    let s2 = b.expr_stmt(call);
    let constant = b.const_fetch("NOPE");
    let s3 = b.expr_stmt(constant);
    let root = b.file(FILE, &[s1, s2, s3]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert!(run.issues.has_kind(IssueKind::UndefinedClass));
    assert!(run.issues.has_kind(IssueKind::UndefinedFunction));
    assert!(run.issues.has_kind(IssueKind::UndefinedConstant));
}

#[test]
fn test_static_call_binds_static_return_type() {
    // class Util { public static function make(): static { return new Util(); } }
    // $u = Util::make(); Util::missing();
    let mut b = AstBuilder::new();
    let created = b.new_object("Util", &[]);
    let ret = b.ret(Some(created));
    let body = b.block(&[ret]);
    let make = b.method("make", node_flags::STATIC, &[], Some("static"), Some(body));
    let class = b.class("Util", node_flags::NONE, None, &[], &[make]);
    let call = b.static_call("Util", "make", &[]);
    let assign = b.assign("u", call);
    let missing = b.static_call("Util", "missing", &[]);
    let stmt = b.expr_stmt(missing);
    let root = b.file(FILE, &[class, assign, stmt]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    let u = run.ctx().get_variable("u").unwrap().union_type;
    assert_eq!(u.types(), &[Type::Class(Qsn::class("", "Util"))]);
    assert_eq!(run.args_of(IssueKind::UndefinedMethod), vec![vec!["\\util::missing".to_string()]]);
    assert!(!run.issues.has_kind(IssueKind::TypeMismatchReturn));
}

#[test]
fn test_this_is_bound_in_instance_methods_only() {
    let mut b = AstBuilder::new();
    let this_ok = b.var("this");
    let echo_ok = b.echo(&[this_ok]);
    let body_ok = b.block(&[echo_ok]);
    let instance = b.method("run", node_flags::NONE, &[], None, Some(body_ok));
    b.at(7);
    let this_bad = b.var("this");
    let echo_bad = b.echo(&[this_bad]);
    let body_bad = b.block(&[echo_bad]);
    let stat = b.method("make", node_flags::STATIC, &[], None, Some(body_bad));
    let class = b.class("Job", node_flags::NONE, None, &[], &[instance, stat]);
    let root = b.file(FILE, &[class]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    let undefined: Vec<_> = run
        .issues
        .issues()
        .iter()
        .filter(|issue| issue.kind == IssueKind::UndefinedVariable)
        .collect();
    assert_eq!(undefined.len(), 1);
    assert_eq!(undefined[0].line, 7);
}

#[test]
fn test_closure_sees_only_imported_variables() {
    // $y = 1; $x = 2; $f = function () use ($y, $z) { echo $y; echo $x; };
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let set_y = b.assign("y", one);
    let two = b.int(2);
    let set_x = b.assign("x", two);
    let y = b.var("y");
    let echo_y = b.echo(&[y]);
    let x = b.var("x");
    let echo_x = b.echo(&[x]);
    let body = b.block(&[echo_y, echo_x]);
    let closure = b.closure(node_flags::NONE, &[], &["y", "z"], None, body);
    let set_f = b.assign("f", closure);
    let root = b.file(FILE, &[set_y, set_x, set_f]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    let mut undefined: Vec<String> = run
        .args_of(IssueKind::UndefinedVariable)
        .into_iter()
        .flatten()
        .collect();
    undefined.sort();
    assert_eq!(undefined, vec!["x".to_string(), "z".to_string()]);
    assert_eq!(run.type_of("f"), "\\closure");
}

#[test]
fn test_closure_in_method_resolves_self_and_this() {
    // class Job {
    //     public static function make(): int { return 1; }
    //     public function run() {
    //         $f = function () { $n = self::make(); echo $this; };
    //         $g = static function () { echo $this; };   // line 9
    //     }
    // }
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let ret = b.ret(Some(one));
    let make_body = b.block(&[ret]);
    let make = b.method("make", node_flags::STATIC, &[], Some("int"), Some(make_body));

    let call = b.static_call("self", "make", &[]);
    let set_n = b.assign("n", call);
    let this = b.var("this");
    let echo_this = b.echo(&[this]);
    let closure_body = b.block(&[set_n, echo_this]);
    let closure = b.closure(node_flags::NONE, &[], &[], None, closure_body);
    let set_f = b.assign("f", closure);

    b.at(9);
    let this = b.var("this");
    let echo_this = b.echo(&[this]);
    let static_body = b.block(&[echo_this]);
    let static_closure = b.closure(node_flags::STATIC, &[], &[], None, static_body);
    let set_g = b.assign("g", static_closure);

    let run_body = b.block(&[set_f, set_g]);
    let run_method = b.method("run", node_flags::NONE, &[], None, Some(run_body));
    let class = b.class("Job", node_flags::NONE, None, &[], &[make, run_method]);
    let root = b.file(FILE, &[class]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert!(run.result.is_ok());
    let issues = run.issues.issues();
    assert_eq!(issues.len(), 1, "{issues:?}");
    assert_eq!(issues[0].kind, IssueKind::UndefinedVariable);
    assert_eq!(issues[0].line, 9);
}

#[test]
fn test_coalesce_does_not_report_undefined_left_operand() {
    let mut b = AstBuilder::new();
    let maybe = b.var("maybe");
    let fallback = b.int(1);
    let coalesce = b.binary(BinaryOp::Coalesce, maybe, fallback);
    let assign = b.assign("v", coalesce);
    let root = b.file(FILE, &[assign]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert!(run.issues.is_empty());
    assert!(run.ctx().get_variable("v").is_some());
}

#[test]
fn test_short_circuit_right_operand_sees_narrowed_type() {
    // function f(?string $s) { $ok = $s !== null && is_string($s); }
    let mut b = AstBuilder::new();
    let param = b.param("s", Some("?string"), None);
    let s = b.var("s");
    let null = b.null();
    let left = b.binary(BinaryOp::NotIdentical, s, null);
    let s_again = b.var("s");
    let right = b.call("is_string", &[s_again]);
    let and = b.binary(BinaryOp::BooleanAnd, left, right);
    let assign = b.assign("ok", and);
    let body = b.block(&[assign]);
    let function = b.function("f", &[param], None, body);
    let root = b.file(FILE, &[function]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert!(!run.issues.has_kind(IssueKind::ImpossibleCondition));
}

#[test]
fn test_short_circuit_at_file_level_keeps_globals() {
    // $c = is_bool(true);
    // if ($c) { $x = 1; } else { $x = 'a'; }
    // $ok = is_string($x) && $x;
    // if (is_int($x)) { $n = $x; }
    // $y = $x;
    let mut b = AstBuilder::new();
    let flag = b.bool_lit(true);
    let flag_type = b.call("is_bool", &[flag]);
    let set_c = b.assign("c", flag_type);
    let one = b.int(1);
    let x1 = b.assign("x", one);
    let then_block = b.block(&[x1]);
    let a = b.string("a");
    let x2 = b.assign("x", a);
    let else_block = b.block(&[x2]);
    let c = b.var("c");
    let if_stmt = b.if_stmt(c, then_block, &[], Some(else_block));

    let x = b.var("x");
    let left = b.call("is_string", &[x]);
    let right = b.var("x");
    let and = b.binary(BinaryOp::BooleanAnd, left, right);
    let set_ok = b.assign("ok", and);

    let x = b.var("x");
    let is_int = b.call("is_int", &[x]);
    let x = b.var("x");
    let set_n = b.assign("n", x);
    let int_block = b.block(&[set_n]);
    let int_check = b.if_stmt(is_int, int_block, &[], None);

    let x = b.var("x");
    let set_y = b.assign("y", x);
    let root = b.file(FILE, &[set_c, if_stmt, set_ok, int_check, set_y]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert!(!run.issues.has_kind(IssueKind::ImpossibleCondition));
    assert!(!run.issues.has_kind(IssueKind::RedundantCondition));
    let mut members: Vec<String> = run.type_of("y").split('|').map(str::to_string).collect();
    members.sort();
    assert_eq!(members, vec!["'a'".to_string(), "1".to_string()]);
    assert_eq!(run.type_of("x"), run.type_of("y"));
}

#[test]
fn test_global_variables_are_shared_between_files() {
    let globals = GlobalState::new();
    let codebase = CodeBase::new();
    let plugins = PluginSet::new();
    let mut issues = IssueCollector::new();

    let mut first = AstBuilder::new();
    let empty = first.array(&[]);
    let assign = first.assign("config", empty);
    let first_root = first.file("a.php", &[assign]);
    let first_arena = first.finish();
    StatementWalker::new(&codebase, &first_arena, &plugins, &mut issues)
        .walk_file(first_root, "a.php", globals.clone())
        .unwrap();

    let mut second = AstBuilder::new();
    let config = second.var("config");
    let echo = second.echo(&[config]);
    let second_root = second.file("b.php", &[echo]);
    let second_arena = second.finish();
    StatementWalker::new(&codebase, &second_arena, &plugins, &mut issues)
        .walk_file(second_root, "b.php", globals.clone())
        .unwrap();

    assert!(issues.is_empty());
    assert!(globals.contains("config"));
}

#[test]
fn test_malformed_tree_abandons_file() {
    let mut b = AstBuilder::new();
    let x = b.var("x");
    let echo = b.echo(&[x]);
    b.at(2);
    let broken = b.node(NodeKind::If, NodeValue::None, node_flags::NONE, &[]);
    b.at(3);
    let y = b.var("y");
    let after = b.echo(&[y]);
    let root = b.file(FILE, &[echo, broken, after]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert!(matches!(run.result, Err(CheckError::InvariantViolation(_))));
    assert!(run.issues.has_kind(IssueKind::AnalysisAborted));
    // Reported before the failure; nothing after it.
    assert_eq!(run.args_of(IssueKind::UndefinedVariable), vec![vec!["x".to_string()]]);
}

#[test]
fn test_nesting_limit_abandons_file() {
    let mut b = AstBuilder::new();
    let x = b.var("x");
    let mut stmt = b.echo(&[x]);
    for _ in 0..10 {
        stmt = b.block(&[stmt]);
    }
    let root = b.file(FILE, &[stmt]);
    let arena = b.finish();

    let options = WalkOptions {
        max_depth: 5,
        ..WalkOptions::default()
    };
    let run = analyze_with(&arena, root, &PluginSet::new(), options);
    assert_eq!(run.result.unwrap_err(), CheckError::NestingLimit { limit: 5 });
    assert!(run.issues.has_kind(IssueKind::AnalysisAborted));
    assert!(!run.issues.has_kind(IssueKind::UndefinedVariable));
}

#[test]
fn test_recoverable_error_continues_with_next_statement() {
    // echo new parent(); echo $after;
    let mut b = AstBuilder::new();
    let bad = b.new_object("parent", &[]);
    let echo_bad = b.echo(&[bad]);
    let after = b.var("after");
    let echo_after = b.echo(&[after]);
    let root = b.file(FILE, &[echo_bad, echo_after]);
    let arena = b.finish();

    let run = analyze(&arena, root);
    assert!(run.result.is_ok());
    assert!(run.issues.has_kind(IssueKind::MalformedName));
    assert!(run.issues.has_kind(IssueKind::UndefinedVariable));
}

#[derive(Default)]
struct CountingPlugin {
    nodes: AtomicUsize,
    functions: AtomicUsize,
    classes: AtomicUsize,
    methods: AtomicUsize,
}

impl AnalysisPlugin for Arc<CountingPlugin> {
    fn name(&self) -> &str {
        "counting"
    }

    fn on_node_analyzed(
        &self,
        _codebase: &CodeBase,
        _ctx: &Context,
        _arena: &NodeArena,
        _node: NodeIndex,
        _issues: &mut IssueCollector,
    ) {
        self.nodes.fetch_add(1, Ordering::Relaxed);
    }

    fn on_class_analyzed(
        &self,
        _codebase: &CodeBase,
        _class: &phz_codebase::ClassDecl,
        _issues: &mut IssueCollector,
    ) {
        self.classes.fetch_add(1, Ordering::Relaxed);
    }

    fn on_method_analyzed(
        &self,
        _codebase: &CodeBase,
        _method: &phz_codebase::MethodDecl,
        _ctx: &Context,
        _issues: &mut IssueCollector,
    ) {
        self.methods.fetch_add(1, Ordering::Relaxed);
    }

    fn on_function_analyzed(
        &self,
        _codebase: &CodeBase,
        function: &FunctionDecl,
        ctx: &Context,
        issues: &mut IssueCollector,
    ) {
        self.functions.fetch_add(1, Ordering::Relaxed);
        if ctx.get_variable("leftover").is_some() {
            issues.emit(ctx.issue(IssueKind::UndefinedFunction, vec![function.qsn.to_string()]));
        }
    }
}

#[test]
fn test_plugin_hooks_run_during_walk() {
    // function f() { $leftover = 1; } class K { public function m() {} } $b = 2;
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let assign = b.assign("leftover", one);
    let body = b.block(&[assign]);
    let function = b.function("f", &[], None, body);
    let method_body = b.block(&[]);
    let method = b.method("m", node_flags::NONE, &[], None, Some(method_body));
    let class = b.class("K", node_flags::NONE, None, &[], &[method]);
    let two = b.int(2);
    let top = b.assign("b", two);
    let root = b.file(FILE, &[function, class, top]);
    let arena = b.finish();

    let counter = Arc::new(CountingPlugin::default());
    let mut plugins = PluginSet::new();
    plugins.register(Box::new(counter.clone()));

    let run = analyze_with(&arena, root, &plugins, WalkOptions::default());
    // function, its body block, the assignment inside, the method body
    // block, the class, and the top-level assignment.
    assert_eq!(counter.nodes.load(Ordering::Relaxed), 6);
    assert_eq!(counter.functions.load(Ordering::Relaxed), 1);
    assert_eq!(counter.classes.load(Ordering::Relaxed), 1);
    assert_eq!(counter.methods.load(Ordering::Relaxed), 1);
    assert_eq!(run.args_of(IssueKind::UndefinedFunction), vec![vec!["\\f".to_string()]]);
}
