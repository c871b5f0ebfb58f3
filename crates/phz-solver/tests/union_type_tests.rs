use super::*;

fn map() -> NamespaceMap {
    NamespaceMap::for_namespace("App")
}

#[test]
fn test_equality_ignores_member_order() {
    let a = UnionType::from_types([Type::Int, Type::String, Type::Null]);
    let b = UnionType::from_types([Type::Null, Type::Int, Type::String]);
    assert_eq!(a, b);

    let mut hasher_a = FxHasher::default();
    a.hash(&mut hasher_a);
    let mut hasher_b = FxHasher::default();
    b.hash(&mut hasher_b);
    assert_eq!(hasher_a.finish(), hasher_b.finish());
}

#[test]
fn test_duplicates_collapse() {
    let union = UnionType::from_types([Type::Int, Type::Int, Type::String]);
    assert_eq!(union.len(), 2);
}

#[test]
fn test_true_and_false_fold_into_bool() {
    let union = UnionType::from_types([Type::True, Type::Int, Type::False]);
    assert_eq!(union, UnionType::from_types([Type::Bool, Type::Int]));

    let with_bool = UnionType::from_types([Type::Bool, Type::True]);
    assert_eq!(with_bool.types(), &[Type::Bool]);
}

#[test]
fn test_unknown_and_impossible_are_distinct() {
    let unknown = UnionType::empty();
    let impossible = UnionType::impossible();

    assert!(unknown.is_unknown());
    assert!(!unknown.is_impossible());
    assert!(impossible.is_impossible());
    assert!(!impossible.is_unknown());
    assert_ne!(unknown, impossible);
    assert_eq!(impossible.to_string(), "impossible");
    assert_eq!(unknown.to_string(), "");
}

#[test]
fn test_union_with_impossible_is_identity() {
    let int = UnionType::of(Type::Int);
    assert_eq!(int.with_union_type(&UnionType::impossible()), int);
    assert_eq!(UnionType::impossible().with_union_type(&int), int);
}

#[test]
fn test_with_union_type_merges_flags_and_real_types() {
    let a = UnionType::from_real_types([Type::Int]);
    let b = UnionType::from_real_types([Type::String]).with_possibly_undefined(true);
    let merged = a.with_union_type(&b);

    assert_eq!(merged, UnionType::from_real_types([Type::Int, Type::String]).with_possibly_undefined(true));
    assert!(merged.is_possibly_undefined());

    let inferred_only = a.with_union_type(&UnionType::of(Type::Float));
    assert!(inferred_only.real_types().is_empty());
}

#[test]
fn test_display_is_sorted_with_undefined_suffix() {
    let union = UnionType::from_types([Type::String, Type::Int, Type::Null]);
    assert_eq!(union.to_string(), "int|null|string");

    let undefined = union.with_possibly_undefined(true);
    assert_eq!(undefined.to_string(), "int|null|string|undefined");
}

#[test]
fn test_nullable_helpers() {
    let union = UnionType::from_real_types([Type::Int]).as_nullable();
    assert!(union.contains_nullable());
    assert_eq!(union.real_types().len(), 2);
    assert_eq!(union.as_non_nullable(), UnionType::from_real_types([Type::Int]));
    assert!(UnionType::of(Type::Null).is_null());
    assert!(!union.is_null());
}

#[test]
fn test_as_non_nullable_without_null_is_unchanged() {
    let union = UnionType::from_types([Type::Int, Type::String]).with_possibly_undefined(true);
    assert_eq!(union.as_non_nullable(), union);
    let only_null = UnionType::of(Type::Null).as_non_nullable();
    assert!(only_null.types().is_empty());
}

#[test]
fn test_with_type_keeps_possibly_undefined() {
    let undefined = UnionType::of(Type::Int).with_possibly_undefined(true);
    let widened = undefined.with_type(Type::String);
    assert!(widened.is_possibly_undefined());
    assert_eq!(widened.to_string(), "int|string|undefined");

    let from_impossible = UnionType::impossible().with_possibly_undefined(true).with_type(Type::Int);
    assert!(!from_impossible.is_impossible());
    assert!(from_impossible.is_possibly_undefined());
    assert!(from_impossible.real_types().is_empty());
}

#[test]
fn test_without_type() {
    let union = UnionType::from_types([Type::Int, Type::String]);
    assert_eq!(union.without_type(&Type::Int), UnionType::of(Type::String));
}

#[test]
fn test_parse_nullable_and_union_strings() {
    let nullable = UnionType::from_type_string("?int", &map()).unwrap();
    assert_eq!(nullable, UnionType::from_types([Type::Int, Type::Null]));

    let union = UnionType::from_type_string("Foo|string|null", &map()).unwrap();
    assert!(union.has_type(&Type::Class(Qsn::class("\\App", "Foo"))));
    assert!(union.has_type(&Type::String));
    assert!(union.has_type(&Type::Null));
}

#[test]
fn test_parse_array_forms() {
    let list = UnionType::from_type_string("int[]", &map()).unwrap();
    assert_eq!(list.types(), &[Type::array_of(UnionType::of(Type::Int))]);
    assert_eq!(list.to_string(), "int[]");

    let keyed = UnionType::from_type_string("array<string, int|float>", &map()).unwrap();
    assert_eq!(
        keyed.types(),
        &[Type::GenericArray {
            key: ArrayKey::String,
            element: UnionType::from_types([Type::Int, Type::Float]),
        }]
    );

    let shape = UnionType::from_type_string("array{id:int, 'name':?string}", &map()).unwrap();
    assert_eq!(shape.to_string(), "array{id:int,name:null|string}");
}

#[test]
fn test_parse_templates_and_keywords() {
    let templates = [Arc::<str>::from("T")];
    let union =
        UnionType::from_type_string_with_templates("T|static|Integer", &map(), &templates).unwrap();
    assert!(union.has_type(&Type::Template(Arc::from("T"))));
    assert!(union.has_type(&Type::StaticType));
    assert!(union.has_type(&Type::Int));
}

#[test]
fn test_parse_rejects_empty_members() {
    assert!(UnionType::from_type_string("int|", &map()).is_err());
    assert!(UnionType::from_type_string("", &map()).is_err());
}

#[test]
fn test_truthiness_of_union() {
    assert_eq!(
        UnionType::from_types([Type::Null, Type::False]).truthiness(),
        Truthiness::AlwaysFalsy
    );
    assert_eq!(
        UnionType::of(Type::Object).truthiness(),
        Truthiness::AlwaysTruthy
    );
    assert_eq!(
        UnionType::from_types([Type::Object, Type::Null]).truthiness(),
        Truthiness::Either
    );
}

#[test]
fn test_serde_round_trip_preserves_flags() {
    let union = UnionType::from_types([Type::Int, Type::Class(Qsn::class("\\A", "B"))])
        .with_possibly_undefined(true);
    let json = serde_json::to_string(&union).unwrap();
    let back: UnionType = serde_json::from_str(&json).unwrap();
    assert_eq!(back, union);
}
