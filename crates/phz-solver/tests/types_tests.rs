use super::*;

#[test]
fn test_keywords_map_to_types() {
    assert_eq!(Type::from_keyword("INT"), Some(Type::Int));
    assert_eq!(Type::from_keyword("double"), Some(Type::Float));
    assert_eq!(Type::from_keyword("boolean"), Some(Type::Bool));
    assert_eq!(Type::from_keyword("self"), Some(Type::SelfType));
    assert_eq!(Type::from_keyword("Foo"), None);
}

#[test]
fn test_literal_truthiness() {
    assert_eq!(Type::int_literal(0).truthiness(), Truthiness::AlwaysFalsy);
    assert_eq!(Type::int_literal(7).truthiness(), Truthiness::AlwaysTruthy);
    assert_eq!(Type::string_literal("").truthiness(), Truthiness::AlwaysFalsy);
    assert_eq!(Type::string_literal("0").truthiness(), Truthiness::AlwaysFalsy);
    assert_eq!(Type::string_literal("0.0").truthiness(), Truthiness::AlwaysTruthy);
    assert_eq!(Type::empty_array().truthiness(), Truthiness::AlwaysFalsy);
}

#[test]
fn test_falsy_variants_of_scalars() {
    assert_eq!(Type::Bool.falsy_variants(), vec![Type::False]);
    assert_eq!(Type::Int.falsy_variants(), vec![Type::int_literal(0)]);
    assert_eq!(
        Type::String.falsy_variants(),
        vec![Type::string_literal(""), Type::string_literal("0")]
    );
    assert_eq!(Type::Array.falsy_variants(), vec![Type::empty_array()]);
    assert!(Type::Object.falsy_variants().is_empty());
}

#[test]
fn test_truthy_variants() {
    assert_eq!(Type::Bool.truthy_variants(), vec![Type::True]);
    assert!(Type::Null.truthy_variants().is_empty());
    assert_eq!(Type::Int.truthy_variants(), vec![Type::Int]);
}

#[test]
fn test_array_shape_sorts_and_dedups_keys() {
    let shape = Type::array_shape([
        (ShapeKey::String(Arc::from("b")), UnionType::of(Type::Int)),
        (ShapeKey::String(Arc::from("a")), UnionType::of(Type::Int)),
        (ShapeKey::String(Arc::from("b")), UnionType::of(Type::String)),
    ]);
    assert_eq!(shape.to_string(), "array{a:int,b:string}");
}

#[test]
fn test_display_of_compound_types() {
    let class = Type::Class(Qsn::class("\\App", "User"));
    assert_eq!(class.to_string(), "\\App\\user");
    assert_eq!(Type::string_literal("x").to_string(), "'x'");
    let list = Type::array_of(UnionType::from_types([Type::Int, Type::String]));
    assert_eq!(list.to_string(), "array<int|string>");
}

#[test]
fn test_widened() {
    assert_eq!(Type::int_literal(3).widened(), Type::Int);
    assert_eq!(Type::True.widened(), Type::Bool);
    assert_eq!(Type::empty_array().widened(), Type::Array);
}
