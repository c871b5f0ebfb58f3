use super::*;
use rustc_hash::FxHashMap;
use std::cell::Cell;

#[derive(Default)]
struct Hierarchy {
    parents: FxHashMap<Qsn, Ancestors>,
    generation: Cell<u64>,
    cache: ExpansionCache,
    depth_limit: Option<u32>,
}

impl Hierarchy {
    fn declare(&mut self, class: &str, ancestors: &[&str]) {
        let ancestors = ancestors.iter().map(|name| Qsn::class("", name)).collect();
        self.parents.insert(Qsn::class("", class), ancestors);
        self.generation.set(self.generation.get() + 1);
    }
}

impl TypeDatabase for Hierarchy {
    fn direct_ancestors(&self, class: &Qsn) -> Option<Ancestors> {
        self.parents.get(class).cloned()
    }

    fn generation(&self) -> u64 {
        self.generation.get()
    }

    fn expansion_cache(&self) -> &ExpansionCache {
        &self.cache
    }

    fn expansion_depth_limit(&self) -> u32 {
        self.depth_limit.unwrap_or(limits::MAX_TYPE_EXPANSION_DEPTH)
    }
}

fn class(name: &str) -> Type {
    Type::Class(Qsn::class("", name))
}

#[test]
fn test_expansion_includes_every_ancestor() {
    let mut db = Hierarchy::default();
    db.declare("I", &[]);
    db.declare("Base", &["I"]);
    db.declare("Derived", &["Base"]);

    let expanded = UnionType::of(class("Derived")).as_expanded_types(&db).unwrap();

    assert_eq!(expanded.len(), 3);
    assert!(expanded.has_type(&class("Derived")));
    assert!(expanded.has_type(&class("Base")));
    assert!(expanded.has_type(&class("I")));
}

#[test]
fn test_expansion_keeps_non_class_members() {
    let mut db = Hierarchy::default();
    db.declare("Base", &[]);
    db.declare("Derived", &["Base"]);

    let source = UnionType::from_types([class("Derived"), Type::Null]);
    let expanded = source.as_expanded_types(&db).unwrap();
    assert_eq!(
        expanded,
        UnionType::from_types([class("Derived"), class("Base"), Type::Null])
    );
}

#[test]
fn test_diamond_is_not_a_cycle() {
    let mut db = Hierarchy::default();
    db.declare("K", &[]);
    db.declare("I", &["K"]);
    db.declare("J", &["K"]);
    db.declare("C", &["I", "J"]);

    let expanded = UnionType::of(class("C")).as_expanded_types(&db).unwrap();
    assert_eq!(expanded.len(), 4);
}

#[test]
fn test_cycle_reports_inheritance_cycle() {
    let mut db = Hierarchy::default();
    db.declare("A", &["B"]);
    db.declare("B", &["A"]);

    let err = UnionType::of(class("A")).as_expanded_types(&db).unwrap_err();
    assert!(matches!(err, TypeError::InheritanceCycle { .. }));
}

#[test]
fn test_deep_chain_exceeds_depth_limit() {
    let mut db = Hierarchy {
        depth_limit: Some(3),
        ..Hierarchy::default()
    };
    db.declare("C0", &["C1"]);
    db.declare("C1", &["C2"]);
    db.declare("C2", &["C3"]);
    db.declare("C3", &["C4"]);
    db.declare("C4", &[]);

    let err = UnionType::of(class("C0")).as_expanded_types(&db).unwrap_err();
    assert_eq!(
        err,
        TypeError::RecursionDepthExceeded {
            class: Qsn::class("", "C3"),
            limit: 3
        }
    );
}

#[test]
fn test_unknown_class_expands_to_itself() {
    let db = Hierarchy::default();
    let source = UnionType::of(class("Missing"));
    assert_eq!(source.as_expanded_types(&db).unwrap(), source);
}

#[test]
fn test_generic_array_elements_expand() {
    let mut db = Hierarchy::default();
    db.declare("Base", &[]);
    db.declare("Derived", &["Base"]);

    let source = UnionType::of(Type::array_of(UnionType::of(class("Derived"))));
    let expanded = source.as_expanded_types(&db).unwrap();
    assert_eq!(
        expanded,
        UnionType::of(Type::array_of(UnionType::from_types([
            class("Derived"),
            class("Base")
        ])))
    );
}

#[test]
fn test_expansion_is_idempotent() {
    let mut db = Hierarchy::default();
    db.declare("Base", &[]);
    db.declare("Derived", &["Base"]);

    let once = UnionType::of(class("Derived")).as_expanded_types(&db).unwrap();
    let twice = once.as_expanded_types(&db).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_cache_hits_and_generation_invalidation() {
    let mut db = Hierarchy::default();
    db.declare("Base", &[]);
    db.declare("Derived", &["Base"]);
    let source = UnionType::of(class("Derived"));

    let _ = source.as_expanded_types(&db).unwrap();
    let _ = source.as_expanded_types(&db).unwrap();
    assert_eq!(db.cache.stats().hits, 1);

    db.declare("Iface", &[]);
    db.declare("Derived", &["Base", "Iface"]);
    let refreshed = source.as_expanded_types(&db).unwrap();
    assert!(refreshed.has_type(&class("Iface")));
    assert!(db.cache.stats().invalidations >= 2);
}

#[test]
fn test_scalar_union_skips_cache() {
    let db = Hierarchy::default();
    let source = UnionType::from_types([Type::Int, Type::String]);
    assert_eq!(source.as_expanded_types(&db).unwrap(), source);
    assert!(db.cache.is_empty());
}
