//! Narrowing and walk benchmarks.
//!
//! Measures union algebra, guard application against a class hierarchy, and
//! a full declare + walk of generated files with nested branches.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use phz::ast::{AstBuilder, NodeArena, NodeIndex};
use phz::codebase::{ClassDecl, CodeBase, DeclInfo};
use phz::solver::{NarrowingContext, Qsn, Type, TypeCheck, TypeGuard, UnionType};
use phz::{Analyzer, AnalyzerOptions};

fn scalar_union() -> UnionType {
    UnionType::from_types([Type::Null, Type::Int, Type::Float, Type::String, Type::Array, Type::Bool])
}

/// A linear chain `C0 <- C1 <- ... <- C{depth-1}`.
fn class_chain(depth: usize) -> CodeBase {
    let mut codebase = CodeBase::new();
    for level in 0..depth {
        let mut decl = ClassDecl::new(Qsn::class("\\Bench", &format!("C{level}")), DeclInfo::new("bench.php", 1));
        if level > 0 {
            decl = decl.with_parent(Qsn::class("\\Bench", &format!("C{}", level - 1)));
        }
        if codebase.add_class(decl).is_err() {
            break;
        }
    }
    codebase
}

/// `$c = is_bool(true);` followed by `depth` nested if/else statements,
/// each assigning a different literal to `$x`, then `is_string` checks.
fn nested_branches(depth: usize) -> (NodeArena, NodeIndex) {
    let mut b = AstBuilder::new();
    let value = b.bool_lit(true);
    let check = b.call("is_bool", &[value]);
    let set_c = b.assign("c", check);

    let text = b.string("leaf");
    let mut inner = b.assign("x", text);
    for level in 0..depth {
        let then_block = b.block(&[inner]);
        let number = b.int(level as i64);
        let assign = b.assign("x", number);
        let else_block = b.block(&[assign]);
        let c = b.var("c");
        inner = b.if_stmt(c, then_block, &[], Some(else_block));
    }

    let x = b.var("x");
    let is_string = b.call("is_string", &[x]);
    let x_then = b.var("x");
    let s = b.assign("s", x_then);
    let then_block = b.block(&[s]);
    let narrowed = b.if_stmt(is_string, then_block, &[], None);

    let root = b.file("bench.php", &[set_c, inner, narrowed]);
    (b.finish(), root)
}

fn bench_union_algebra(c: &mut Criterion) {
    let mut group = c.benchmark_group("union_algebra");
    let union = scalar_union();
    let other = UnionType::from_types([Type::String, Type::Object, Type::Callable]);

    group.bench_function("with_union_type", |b| {
        b.iter(|| black_box(union.with_union_type(black_box(&other))))
    });
    group.bench_function("as_non_nullable", |b| b.iter(|| black_box(union.as_non_nullable())));
    group.bench_function("display", |b| b.iter(|| black_box(union.to_string())));
    group.finish();
}

fn bench_narrow(c: &mut Criterion) {
    let mut group = c.benchmark_group("narrow");
    let union = scalar_union();
    let flat = NarrowingContext::without_hierarchy();

    let guards = [
        ("is_string", TypeGuard::IsType(TypeCheck::String)),
        ("identical_null", TypeGuard::Identical(Type::Null)),
        ("truthy", TypeGuard::Truthy),
        ("isset", TypeGuard::IsSet),
    ];
    for (name, guard) in &guards {
        for sense in [true, false] {
            group.bench_with_input(BenchmarkId::new(*name, sense), &sense, |b, &sense| {
                b.iter(|| black_box(flat.narrow(&union, guard, sense)))
            });
        }
    }

    for depth in [4usize, 16] {
        let codebase = class_chain(depth);
        let narrowing = NarrowingContext::new(&codebase);
        let leaf = UnionType::from_types([
            Type::Class(Qsn::class("\\Bench", &format!("C{}", depth - 1))),
            Type::Null,
        ]);
        let guard = TypeGuard::InstanceOf(UnionType::of(Type::Class(Qsn::class("\\Bench", "C0"))));
        group.bench_with_input(BenchmarkId::new("instanceof_chain", depth), &depth, |b, _| {
            b.iter(|| black_box(narrowing.narrow(&leaf, &guard, true)))
        });
    }
    group.finish();
}

fn bench_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("walk");
    for depth in [8usize, 64] {
        let (arena, root) = nested_branches(depth);
        group.bench_with_input(BenchmarkId::new("nested_if", depth), &depth, |b, _| {
            b.iter(|| {
                let mut analyzer = Analyzer::new(AnalyzerOptions::default());
                analyzer.add_file("bench.php", arena.clone(), root);
                let summary = analyzer.analyze_all();
                black_box((summary, analyzer.issue_count()))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_union_algebra, bench_narrow, bench_walk);
criterion_main!(benches);
