use super::*;
use crate::builder::AstBuilder;
use crate::node::node_flags;

#[test]
fn test_if_parts_decodes_elseif_and_else() {
    let mut b = AstBuilder::new();
    let c1 = b.var("a");
    let t1 = b.block(&[]);
    let c2 = b.var("b");
    let t2 = b.block(&[]);
    let e = b.block(&[]);
    let if_node = b.if_stmt(c1, t1, &[(c2, t2)], Some(e));
    let arena = b.finish();

    let parts = arena.if_parts(if_node).unwrap();
    assert_eq!(parts.condition, c1);
    assert_eq!(parts.then_block, t1);
    assert_eq!(parts.else_ifs, vec![(c2, t2)]);
    assert_eq!(parts.else_block, Some(e));
}

#[test]
fn test_binary_parts_rejects_other_kinds() {
    let mut b = AstBuilder::new();
    let x = b.var("x");
    let one = b.int(1);
    let cmp = b.binary(BinaryOp::Identical, x, one);
    let arena = b.finish();

    assert_eq!(arena.binary_parts(cmp), Some((BinaryOp::Identical, x, one)));
    assert_eq!(arena.binary_parts(x), None);
    assert_eq!(arena.binary_parts(NodeIndex::NONE), None);
}

#[test]
fn test_function_parts_and_params() {
    let mut b = AstBuilder::new();
    let default = b.int(3);
    let p = b.param("count", Some("int"), Some(default));
    let body = b.block(&[]);
    let f = b.function("make", &[p], Some("?string"), body);
    let arena = b.finish();

    let parts = arena.function_parts(f).unwrap();
    assert_eq!(parts.params, vec![p]);
    assert_eq!(parts.body, Some(body));
    let hint = parts.return_type.unwrap();
    assert_eq!(arena.name_of(hint), Some("?string"));

    let (hint, default_value) = arena.typed_slot_parts(p).unwrap();
    assert_eq!(hint, Some("int"));
    assert_eq!(default_value, Some(default));
}

#[test]
fn test_class_parts_split_heritage_and_members() {
    let mut b = AstBuilder::new();
    let m = b.method("run", node_flags::STATIC, &[], None, None);
    let c = b.class("Derived", node_flags::FINAL, Some("Base"), &["Iface", "Other"], &[m]);
    let arena = b.finish();

    let parts = arena.class_parts(c).unwrap();
    assert_eq!(parts.extends.len(), 1);
    assert_eq!(arena.name_of(parts.extends[0]), Some("Base"));
    assert_eq!(parts.implements.len(), 2);
    assert_eq!(parts.members, vec![m]);
    assert!(arena.get(c).unwrap().has_flag(node_flags::FINAL));
}

#[test]
fn test_literal_helpers() {
    let mut b = AstBuilder::new();
    let null = b.null();
    let upper_true = b.const_fetch("TRUE");
    let other = b.const_fetch("PHP_EOL");
    let arena = b.finish();

    assert!(arena.is_null_literal(null));
    assert_eq!(arena.bool_literal(upper_true), Some(true));
    assert_eq!(arena.bool_literal(other), None);
    assert!(!arena.is_null_literal(other));
}

#[test]
fn test_call_parts_and_array_items() {
    let mut b = AstBuilder::new();
    let x = b.var("x");
    let call = b.call("is_string", &[x]);
    let k = b.string("a");
    let v = b.int(1);
    let arr = b.array(&[(Some(k), v), (None, v)]);
    let arena = b.finish();

    let (name, args) = arena.call_parts(call).unwrap();
    assert_eq!(name, "is_string");
    assert_eq!(args, &[x]);

    let items = arena.children(arr);
    assert_eq!(arena.array_item_parts(items[0]), Some((Some(k), v)));
    assert_eq!(arena.array_item_parts(items[1]), Some((None, v)));
}
