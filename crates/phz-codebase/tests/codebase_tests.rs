use super::*;
use crate::decls::{DeclFlags, ParamDecl};
use phz_solver::{Type, TypeError, UnionType};

fn class(name: &str) -> Qsn {
    Qsn::class("\\App", name)
}

fn info(file: &str, line: u32) -> DeclInfo {
    DeclInfo::new(file, line)
}

fn method(owner: &Qsn, name: &str, file: &str) -> MethodDecl {
    MethodDecl::new(Qsn::member(SymbolKind::Method, owner, name, 0), info(file, 1))
        .with_return_type(UnionType::of(Type::Int))
}

/// `Derived extends Base implements Iface`, all in `a.php`.
fn hierarchy() -> CodeBase {
    let mut codebase = CodeBase::new();
    codebase
        .add_class(ClassDecl::new(class("Iface"), info("a.php", 1).with_flags(DeclFlags::INTERFACE)))
        .unwrap();
    codebase
        .add_class(ClassDecl::new(class("Base"), info("a.php", 2)).with_interfaces([class("Iface")]))
        .unwrap();
    codebase
        .add_class(ClassDecl::new(class("Derived"), info("a.php", 3)).with_parent(class("Base")))
        .unwrap();
    codebase
}

#[test]
fn test_add_get_and_has() {
    let mut codebase = CodeBase::new();
    let foo = Qsn::function("\\App", "foo");
    codebase
        .add_function(FunctionDecl::new(foo.clone(), info("a.php", 4)))
        .unwrap();

    assert!(codebase.has_function(&foo));
    assert!(codebase.has_function(&Qsn::function("\\App", "FOO")));
    assert_eq!(codebase.get_function(&foo).unwrap().info.line, 4);
    assert!(!codebase.has_class(&class("Foo")));
}

#[test]
fn test_missing_lookup_is_not_found() {
    let codebase = CodeBase::new();
    let missing = Qsn::function("", "nope");
    assert_eq!(
        codebase.get_function(&missing),
        Err(CodeBaseError::NotFound {
            kind: SymbolKind::Function,
            qsn: missing.clone(),
        })
    );
    assert_eq!(
        codebase.get_function(&missing).unwrap_err().to_string(),
        "function \\nope is not declared"
    );
}

#[test]
fn test_same_name_is_never_merged() {
    let mut codebase = CodeBase::new();
    let foo = Qsn::function("", "foo");
    codebase
        .add_function(FunctionDecl::new(foo.clone(), info("a.php", 1)))
        .unwrap();
    let second = FunctionDecl::new(foo.clone(), info("b.php", 9))
        .with_return_type(UnionType::of(Type::String));

    assert!(matches!(
        codebase.add_function(second),
        Err(CodeBaseError::AlreadyDeclared { .. })
    ));
    assert_eq!(codebase.get_function(&foo).unwrap().info.file.as_ref(), "a.php");
}

#[test]
fn test_resolve_alternate_falls_back_to_lowest_survivor() {
    let mut codebase = CodeBase::new();
    let foo = Qsn::function("", "foo");
    assert_eq!(codebase.resolve_alternate(&foo), None);

    for (id, file) in [(0, "a.php"), (1, "b.php"), (2, "c.php")] {
        codebase
            .add_function(FunctionDecl::new(foo.with_alternate_id(id), info(file, 1)))
            .unwrap();
    }
    assert_eq!(codebase.resolve_alternate(&foo), Some(foo.clone()));

    codebase.remove_file("a.php");
    assert!(!codebase.has_function(&foo));
    assert_eq!(codebase.resolve_alternate(&foo), Some(foo.with_alternate_id(1)));

    codebase.remove_file("b.php");
    assert_eq!(codebase.resolve_alternate(&foo), Some(foo.with_alternate_id(2)));
    // An explicit alternate that is still declared resolves to itself.
    assert_eq!(
        codebase.resolve_alternate(&foo.with_alternate_id(2)),
        Some(foo.with_alternate_id(2))
    );
}

#[test]
fn test_next_free_alternate_does_not_insert() {
    let mut codebase = CodeBase::new();
    let foo = Qsn::function("", "foo");
    assert_eq!(codebase.next_free_alternate(&foo), Some(foo.clone()));

    codebase
        .add_function(FunctionDecl::new(foo.clone(), info("a.php", 1)))
        .unwrap();
    let alternate = codebase.next_free_alternate(&foo).unwrap();
    assert_eq!(alternate.alternate_id(), 1);
    assert!(!codebase.has_function(&alternate));

    codebase
        .add_function(FunctionDecl::new(alternate.clone(), info("a.php", 5)))
        .unwrap();
    assert_eq!(codebase.alternates_of(&alternate), vec![foo.clone(), alternate]);
    assert_eq!(codebase.next_free_alternate(&foo).unwrap().alternate_id(), 2);
}

#[test]
fn test_member_maps_for_scope() {
    let mut codebase = hierarchy();
    let base = class("Base");
    codebase.add_method(method(&base, "run", "a.php")).unwrap();
    codebase.add_method(method(&base, "Stop", "a.php")).unwrap();
    codebase
        .add_property(PropertyDecl::new(
            Qsn::member(SymbolKind::Property, &base, "$count", 0),
            info("a.php", 2),
            UnionType::of(Type::Int),
        ))
        .unwrap();

    let methods = codebase.get_method_map_for_scope(&base);
    assert_eq!(methods.keys().copied().collect::<Vec<_>>(), vec!["run", "stop"]);

    let properties = codebase.get_property_map_for_scope(&base);
    assert!(properties.contains_key("count"));
    assert!(codebase.get_constant_map_for_scope(&base).is_empty());
    assert!(codebase.get_method_map_for_scope(&class("Derived")).is_empty());
}

#[test]
fn test_find_method_walks_parents_and_traits() {
    let mut codebase = hierarchy();
    let helper = class("Helper");
    codebase
        .add_class(ClassDecl::new(helper.clone(), info("a.php", 4).with_flags(DeclFlags::TRAIT)))
        .unwrap();
    let with_trait = ClassDecl::new(class("Leaf"), info("a.php", 5))
        .with_parent(class("Derived"))
        .with_traits([helper.clone()]);
    codebase.add_class(with_trait).unwrap();
    codebase.add_method(method(&class("Base"), "run", "a.php")).unwrap();
    codebase.add_method(method(&helper, "assist", "a.php")).unwrap();
    codebase.add_method(method(&class("Iface"), "describe", "a.php")).unwrap();

    let run = codebase.find_method(&class("Leaf"), "RUN").unwrap();
    assert_eq!(run.owner(), Some(&class("Base")));
    assert!(codebase.find_method(&class("Leaf"), "assist").is_some());
    assert!(codebase.find_method(&class("Derived"), "describe").is_some());
    assert!(codebase.find_method(&class("Derived"), "assist").is_none());
}

#[test]
fn test_find_method_terminates_on_cycles() {
    let mut codebase = CodeBase::new();
    codebase
        .add_class(ClassDecl::new(class("A"), info("a.php", 1)).with_parent(class("B")))
        .unwrap();
    codebase
        .add_class(ClassDecl::new(class("B"), info("a.php", 2)).with_parent(class("A")))
        .unwrap();
    assert!(codebase.find_method(&class("A"), "missing").is_none());
}

#[test]
fn test_expanded_types_through_codebase() {
    let codebase = hierarchy();
    let expanded = UnionType::of(Type::Class(class("Derived")))
        .as_expanded_types(&codebase)
        .unwrap();
    for name in ["Derived", "Base", "Iface"] {
        assert!(expanded.has_type(&Type::Class(class(name))), "missing {name}");
    }
    assert_eq!(expanded.len(), 3);
}

#[test]
fn test_expansion_depth_limit_is_configurable() {
    let codebase = hierarchy().with_expansion_depth_limit(1);
    let result = UnionType::of(Type::Class(class("Derived"))).as_expanded_types(&codebase);
    assert!(matches!(result, Err(TypeError::RecursionDepthExceeded { limit: 1, .. })));
}

#[test]
fn test_remove_file_removes_only_that_file() {
    let mut codebase = hierarchy();
    let base = class("Base");
    codebase.add_method(method(&base, "run", "a.php")).unwrap();
    codebase
        .add_function(FunctionDecl::new(Qsn::function("", "other"), info("b.php", 1)))
        .unwrap();
    let before = codebase.generation();

    assert_eq!(codebase.declared_in_file("a.php").len(), 4);
    assert_eq!(codebase.remove_file("a.php"), 4);

    assert!(!codebase.has_class(&base));
    assert!(!codebase.has_method(&Qsn::member(SymbolKind::Method, &base, "run", 0)));
    assert!(codebase.get_method_map_for_scope(&base).is_empty());
    assert!(codebase.has_function(&Qsn::function("", "other")));
    assert!(!codebase.is_file_loaded("a.php"));
    assert!(codebase.is_file_loaded("b.php"));
    assert!(codebase.generation() > before);
    assert_eq!(codebase.remove_file("a.php"), 0);
}

#[test]
fn test_generation_change_invalidates_expansions() {
    let mut codebase = hierarchy();
    let derived = UnionType::of(Type::Class(class("Derived")));
    let first = derived.as_expanded_types(&codebase).unwrap();
    assert_eq!(first.len(), 3);

    codebase.remove_file("a.php");
    codebase
        .add_class(ClassDecl::new(class("Derived"), info("c.php", 1)))
        .unwrap();
    let second = derived.as_expanded_types(&codebase).unwrap();
    assert_eq!(second, derived);
    assert!(codebase.expansion_cache().stats().invalidations >= 1);
}

#[test]
fn test_begin_file_tracks_loaded_files() {
    let mut codebase = CodeBase::new();
    assert!(codebase.begin_file("a.php"));
    assert!(!codebase.begin_file("a.php"));
    assert!(codebase.is_file_loaded("a.php"));
    assert!(codebase.declared_in_file("a.php").is_empty());
    assert_eq!(codebase.loaded_files().count(), 1);
}

#[test]
fn test_required_params() {
    let decl = FunctionDecl::new(Qsn::function("", "f"), info("a.php", 1)).with_params(vec![
        ParamDecl::new("a", UnionType::of(Type::Int)),
        ParamDecl::new("b", UnionType::empty()).optional(),
    ]);
    assert_eq!(decl.required_params(), 1);
}
