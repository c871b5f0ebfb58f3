use super::*;
use crate::expand::{Ancestors, ExpansionCache};
use crate::qsn::Qsn;
use rustc_hash::FxHashMap;

struct Hierarchy {
    parents: FxHashMap<Qsn, Ancestors>,
    cache: ExpansionCache,
}

impl Hierarchy {
    fn new() -> Self {
        Hierarchy {
            parents: FxHashMap::default(),
            cache: ExpansionCache::new(),
        }
    }

    fn with(mut self, class: &str, ancestors: &[&str]) -> Self {
        self.parents.insert(
            Qsn::class("", class),
            ancestors.iter().map(|a| Qsn::class("", a)).collect(),
        );
        self
    }
}

impl TypeDatabase for Hierarchy {
    fn direct_ancestors(&self, class: &Qsn) -> Option<Ancestors> {
        self.parents.get(class).cloned()
    }

    fn generation(&self) -> u64 {
        1
    }

    fn expansion_cache(&self) -> &ExpansionCache {
        &self.cache
    }
}

fn class(name: &str) -> Type {
    Type::Class(Qsn::class("", name))
}

#[test]
fn test_scalar_cast_rules() {
    assert!(Type::Int.can_cast_to_type(&Type::Float));
    assert!(!Type::Float.can_cast_to_type(&Type::Int));
    assert!(Type::int_literal(3).can_cast_to_type(&Type::Int));
    assert!(Type::True.can_cast_to_type(&Type::Bool));
    assert!(!Type::Bool.can_cast_to_type(&Type::True));
    assert!(Type::string_literal("strlen").can_cast_to_type(&Type::Callable));
}

#[test]
fn test_null_only_casts_to_null_or_mixed() {
    assert!(Type::Null.can_cast_to_type(&Type::Null));
    assert!(Type::Null.can_cast_to_type(&Type::Mixed));
    assert!(!Type::Null.can_cast_to_type(&Type::Int));
    assert!(!Type::Null.can_cast_to_type(&class("Foo")));
}

#[test]
fn test_arrays_cast_to_iterable() {
    let list = Type::array_of(UnionType::of(Type::Int));
    assert!(list.can_cast_to_type(&Type::Array));
    assert!(list.can_cast_to_type(&Type::Iterable));
    assert!(Type::Array.can_cast_to_type(&Type::Iterable));
    assert!(!Type::Iterable.can_cast_to_type(&Type::Array));

    let floats = Type::array_of(UnionType::of(Type::Float));
    assert!(list.can_cast_to_type(&floats));
    assert!(!floats.can_cast_to_type(&list));
}

#[test]
fn test_array_shape_casts() {
    let shape = Type::array_shape([(ShapeKey::Int(0), UnionType::of(Type::Int))]);
    let ints = Type::GenericArray {
        key: ArrayKey::Int,
        element: UnionType::of(Type::Int),
    };
    let string_keyed = Type::GenericArray {
        key: ArrayKey::String,
        element: UnionType::of(Type::Int),
    };
    assert!(shape.can_cast_to_type(&ints));
    assert!(!shape.can_cast_to_type(&string_keyed));
}

#[test]
fn test_class_casts_structurally_only_to_itself_and_object() {
    assert!(class("Foo").can_cast_to_type(&Type::Object));
    assert!(class("Foo").can_cast_to_type(&class("FOO")));
    assert!(!class("Foo").can_cast_to_type(&class("Bar")));
    assert!(class("Closure").can_cast_to_type(&Type::Callable));
}

#[test]
fn test_lenient_and_strict_modes() {
    let source = UnionType::from_types([Type::Int, Type::Null]);
    let target = UnionType::of(Type::Int);
    assert!(source.can_cast_to_union_type(&target, Soundness::Lenient));
    assert!(!source.can_cast_to_union_type(&target, Soundness::Strict));
}

#[test]
fn test_unknown_casts_anywhere() {
    let target = UnionType::of(Type::Int);
    assert!(UnionType::empty().can_cast_to_union_type(&target, Soundness::Strict));
    assert!(target.can_cast_to_union_type(&UnionType::empty(), Soundness::Strict));
}

#[test]
fn test_inheritance_aware_cast() {
    let db = Hierarchy::new()
        .with("Base", &[])
        .with("Derived", &["Base"])
        .with("Other", &[]);
    let derived = UnionType::of(class("Derived"));
    let base = UnionType::of(class("Base"));

    assert!(!derived.can_cast_to_union_type(&base, Soundness::Strict));
    assert!(derived.can_cast_to_union_type_in(&base, Soundness::Strict, &db));
    assert!(!base.can_cast_to_union_type_in(&derived, Soundness::Strict, &db));

    let mixed_source = UnionType::from_types([class("Derived"), class("Other")]);
    assert!(mixed_source.can_cast_to_union_type_in(&base, Soundness::Lenient, &db));
    assert!(!mixed_source.can_cast_to_union_type_in(&base, Soundness::Strict, &db));
}

#[test]
fn test_cast_falls_back_when_expansion_cycles() {
    let db = Hierarchy::new().with("A", &["B"]).with("B", &["A"]);
    let a = UnionType::of(class("A"));
    assert!(a.can_cast_to_union_type_in(&a, Soundness::Strict, &db));
    assert!(!a.can_cast_to_union_type_in(&UnionType::of(class("B")), Soundness::Strict, &db));
}
