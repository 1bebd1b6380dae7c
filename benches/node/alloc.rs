use criterion::{criterion_group, Criterion};
use pvec_nodes::{make_inner, make_leaf, Node, BRANCHING};
use std::hint::black_box;

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc");

    group.bench_function("leaf/free_list", |b| {
        b.iter(|| make_leaf(black_box([1u64; BRANCHING])))
    });
    group.bench_function("leaf/boxed", |b| {
        b.iter(|| Box::new(Node::Leaf(black_box([1u64; BRANCHING]))))
    });
    group.bench_function("inner/free_list", |b| {
        b.iter(|| make_inner::<u64>(black_box([const { None }; BRANCHING])))
    });

    let leaf = make_leaf([1u64; BRANCHING]);
    group.bench_function("handle/clone_drop", |b| b.iter(|| black_box(leaf.clone())));
}

criterion_group!(bench_alloc_group, criterion_benchmark);
