use super::*;
use phz_ast::AstBuilder;

fn declare(arena: &NodeArena, root: NodeIndex) -> (CodeBase, IssueCollector, Vec<Qsn>) {
    let mut codebase = CodeBase::new();
    let mut issues = IssueCollector::new();
    let declared = DeclarationCollector::new(&mut codebase, arena, "test.php", &mut issues).collect(root);
    (codebase, issues, declared)
}

#[test]
fn test_conditional_redeclaration_gets_alternate_ids() {
    // if ($flag) { function f(): int {} } else { function f(string $s): string {} }
    let mut b = AstBuilder::new();
    let then_body = b.block(&[]);
    let first = b.function("f", &[], Some("int"), then_body);
    let then_block = b.block(&[first]);
    let param = b.param("s", Some("string"), None);
    let else_body = b.block(&[]);
    b.at(5);
    let second = b.function("f", &[param], Some("string"), else_body);
    let else_block = b.block(&[second]);
    let cond = b.var("flag");
    let if_stmt = b.if_stmt(cond, then_block, &[], Some(else_block));
    let root = b.file("test.php", &[if_stmt]);
    let arena = b.finish();

    let (codebase, issues, declared) = declare(&arena, root);

    let f0 = Qsn::function("", "f");
    let f1 = f0.with_alternate_id(1);
    assert_eq!(declared, vec![f0.clone(), f1.clone()]);

    let first = codebase.get_function(&f0).unwrap();
    let second = codebase.get_function(&f1).unwrap();
    assert_eq!(first.return_type, UnionType::of(Type::Int).as_real());
    assert_eq!(second.return_type, UnionType::of(Type::String).as_real());
    assert_eq!(second.params.len(), 1);
    assert!(first.info.has(DeclFlags::CONDITIONAL));
    assert!(second.info.has(DeclFlags::CONDITIONAL));

    assert_eq!(issues.count_kind(IssueKind::RedeclaredFunction), 1);
    assert_eq!(issues.issues()[0].line, 5);
}

#[test]
fn test_namespace_and_imports_resolve_parents() {
    // namespace App; use Lib\Base as Root; class User extends Root implements \Countable {}
    let mut b = AstBuilder::new();
    let import = b.use_import("Lib\\Base", Some("Root"), node_flags::NONE);
    let class = b.class("User", node_flags::FINAL, Some("Root"), &["\\Countable"], &[]);
    let ns = b.namespace("App", &[import, class]);
    let root = b.file("test.php", &[ns]);
    let arena = b.finish();

    let (codebase, issues, _) = declare(&arena, root);
    assert!(issues.is_empty());

    let user = codebase.get_class(&Qsn::class("\\App", "User")).unwrap();
    assert_eq!(user.parent, Some(Qsn::class("\\Lib", "Base")));
    assert_eq!(user.interfaces.as_slice(), &[Qsn::class("", "Countable")]);
    assert!(user.info.has(DeclFlags::FINAL));
    assert!(!user.info.has(DeclFlags::CONDITIONAL));
}

#[test]
fn test_class_members_are_declared() {
    let mut b = AstBuilder::new();
    let body = b.block(&[]);
    let run = b.method(
        "run",
        node_flags::STATIC | node_flags::PROTECTED,
        &[],
        Some("?self"),
        Some(body),
    );
    let zero = b.int(0);
    let count = b.property("count", node_flags::PRIVATE, None, Some(zero));
    let limit_value = b.int(10);
    let limit = b.class_const("LIMIT", limit_value);
    let class = b.class("Job", node_flags::NONE, None, &[], &[run, count, limit]);
    let root = b.file("test.php", &[class]);
    let arena = b.finish();

    let (codebase, _, declared) = declare(&arena, root);
    assert_eq!(declared.len(), 4);

    let job = Qsn::class("", "Job");
    let run = codebase.find_method(&job, "run").unwrap();
    assert!(run.is_static());
    assert_eq!(run.info.visibility, Visibility::Protected);
    assert!(run.return_type.has_type(&Type::SelfType));
    assert!(run.return_type.contains_nullable());

    let count = codebase.find_property(&job, "count").unwrap();
    assert_eq!(count.union_type, UnionType::of(Type::Int));
    assert_eq!(count.info.visibility, Visibility::Private);

    let limit = codebase.find_class_constant(&job, "LIMIT").unwrap();
    assert_eq!(limit.union_type, UnionType::of(Type::int_literal(10)));
}

#[test]
fn test_interface_extends_lists_interfaces() {
    let mut b = AstBuilder::new();
    let method = b.method("size", node_flags::NONE, &[], Some("int"), None);
    let iface = b.interface("Sized", &["Countable", "Traversable"], &[method]);
    let root = b.file("test.php", &[iface]);
    let arena = b.finish();

    let (codebase, _, _) = declare(&arena, root);
    let decl = codebase.get_class(&Qsn::class("", "Sized")).unwrap();
    assert!(decl.is_interface());
    assert_eq!(decl.parent, None);
    assert_eq!(decl.interfaces.len(), 2);
    let size = codebase.find_method(&Qsn::class("", "Sized"), "size").unwrap();
    assert!(size.info.has(DeclFlags::ABSTRACT));
}

#[test]
fn test_malformed_type_hint_is_reported() {
    let mut b = AstBuilder::new();
    let body = b.block(&[]);
    let f = b.function("broken", &[], Some("int|"), body);
    let root = b.file("test.php", &[f]);
    let arena = b.finish();

    let (codebase, issues, _) = declare(&arena, root);
    assert!(issues.has_kind(IssueKind::MalformedName));
    let decl = codebase.get_function(&Qsn::function("", "broken")).unwrap();
    assert!(decl.return_type.is_unknown());
}

#[test]
fn test_global_constants_and_nullable_defaults() {
    let mut b = AstBuilder::new();
    let value = b.string("v1");
    let constant = b.const_decl("VERSION", value);
    let null = b.null();
    let param = b.param("x", Some("int"), Some(null));
    let body = b.block(&[]);
    let f = b.function("g", &[param], None, body);
    let ns = b.namespace("App", &[constant, f]);
    let root = b.file("test.php", &[ns]);
    let arena = b.finish();

    let (codebase, _, _) = declare(&arena, root);
    let version = codebase.get_constant(&Qsn::constant("\\App", "VERSION")).unwrap();
    assert_eq!(version.union_type, UnionType::of(Type::string_literal("v1")));

    let g = codebase.get_function(&Qsn::function("\\App", "g")).unwrap();
    assert!(g.params[0].is_optional);
    assert!(g.params[0].union_type.contains_nullable());
    assert!(g.return_type.is_unknown());
}

#[test]
fn test_declarations_in_bodies_are_conditional() {
    let mut b = AstBuilder::new();
    let inner_body = b.block(&[]);
    let inner = b.function("inner", &[], None, inner_body);
    let outer_body = b.block(&[inner]);
    let outer = b.function("outer", &[], None, outer_body);
    let cond = b.var("running");
    let looped = b.class("Looped", node_flags::NONE, None, &[], &[]);
    let loop_body = b.block(&[looped]);
    let while_stmt = b.while_stmt(cond, loop_body);
    let root = b.file("test.php", &[outer, while_stmt]);
    let arena = b.finish();

    let (codebase, _, declared) = declare(&arena, root);
    assert_eq!(declared.len(), 3);
    let inner = codebase.get_function(&Qsn::function("", "inner")).unwrap();
    assert!(inner.info.has(DeclFlags::CONDITIONAL));
    let outer = codebase.get_function(&Qsn::function("", "outer")).unwrap();
    assert!(!outer.info.has(DeclFlags::CONDITIONAL));
    let looped = codebase.get_class(&Qsn::class("", "Looped")).unwrap();
    assert!(looped.info.has(DeclFlags::CONDITIONAL));
}

#[test]
fn test_redeclaring_a_class_across_calls() {
    let mut codebase = CodeBase::new();
    let mut issues = IssueCollector::new();
    for file in ["a.php", "b.php"] {
        let mut b = AstBuilder::new();
        let class = b.class("Dup", node_flags::NONE, None, &[], &[]);
        let root = b.file(file, &[class]);
        let arena = b.finish();
        DeclarationCollector::new(&mut codebase, &arena, file, &mut issues).collect(root);
    }

    let dup = Qsn::class("", "Dup");
    assert_eq!(codebase.alternates_of(&dup).len(), 2);
    assert_eq!(issues.count_kind(IssueKind::RedeclaredClass), 1);
    assert_eq!(codebase.get_class(&dup.with_alternate_id(1)).unwrap().info.file.as_ref(), "b.php");
}
