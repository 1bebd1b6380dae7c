use criterion::criterion_main;

mod node;

criterion_main!(
    node::alloc::bench_alloc_group,
    tree::path_copy::bench_path_copy_group,
);
