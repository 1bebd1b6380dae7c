use criterion::{criterion_group, BatchSize, Criterion};
use pvec_nodes::{child_index, make_inner, make_leaf, InnerSlots, NodeHandle, BRANCHING};
use std::hint::black_box;

/// A full two-level trie holding `BRANCHING * BRANCHING` elements.
fn full_trie() -> NodeHandle<u64> {
    let mut children: InnerSlots<u64> = [const { None }; BRANCHING];
    for (leaf_idx, slot) in children.iter_mut().enumerate() {
        let first = (leaf_idx * BRANCHING) as u64;
        *slot = Some(make_leaf(std::array::from_fn(|idx| first + idx as u64)));
    }
    make_inner(children)
}

/// Copy the path to `index`, writing `value` into the new leaf.
fn update(root: &NodeHandle<u64>, index: usize, value: u64) -> NodeHandle<u64> {
    let children = root.as_inner().expect("root is an inner node");
    let slot = child_index(index, 1);
    let old_leaf = children[slot].as_ref().expect("trie is full");

    let mut values = *old_leaf.as_leaf().expect("second level holds leaves");
    values[child_index(index, 0)] = value;

    let mut new_children = children.clone();
    new_children[slot] = Some(make_leaf(values));
    make_inner(new_children)
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_copy");
    let trie = full_trie();

    group.bench_function("update", |b| {
        let mut index = 0;
        b.iter(|| {
            index = (index + 7) % (BRANCHING * BRANCHING);
            update(black_box(&trie), index, 0)
        })
    });

    group.bench_function("build_and_drop", |b| b.iter(full_trie));

    group.bench_function("drop_unshared", |b| {
        b.iter_batched(full_trie, drop, BatchSize::SmallInput)
    });
}

criterion_group!(bench_path_copy_group, criterion_benchmark);
