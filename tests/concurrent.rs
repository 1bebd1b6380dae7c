//! Stress tests for sharing nodes between threads.
//!
//! ```bash
//! cargo test --release --test concurrent
//! ```

mod common;

use common::{inner_of, leaf_values, DropCounter, Tracked};
use pvec_nodes::{free_list, NodeHandle, BRANCHING};
use std::{
    sync::{mpsc, Barrier},
    thread,
};

const THREADS: usize = 8;
const ROUNDS: usize = 20_000;

fn shared_tree(drops: &DropCounter, leaves: usize) -> NodeHandle<Tracked> {
    inner_of((0..leaves).map(|idx| drops.leaf((idx * BRANCHING) as u64)))
}

#[test]
fn concurrent_clone_and_drop_balance() {
    let drops = DropCounter::default();
    let root = shared_tree(&drops, BRANCHING);
    let children = root.as_inner().unwrap();

    thread::scope(|scope| {
        for worker in 0..THREADS {
            let root = &root;
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    let copy = root.clone();
                    let leaf = copy.as_inner().unwrap()[(worker + round) % BRANCHING]
                        .clone()
                        .unwrap();
                    assert!(leaf.ref_count() >= 2);
                    drop(copy);
                    drop(leaf);
                }
            });
        }
    });

    assert_eq!(root.ref_count(), 1);
    for child in children.iter().flatten() {
        assert_eq!(child.ref_count(), 1);
    }
    assert_eq!(drops.get(), 0);

    drop(root);
    assert_eq!(drops.get(), BRANCHING * BRANCHING);
}

#[test]
fn last_release_races_destroy_once() {
    const ITERATIONS: usize = 200;

    let drops = DropCounter::default();

    for iteration in 0..ITERATIONS {
        let tree = shared_tree(&drops, 4);
        let barrier = Barrier::new(THREADS);
        let copies: Vec<_> = (0..THREADS).map(|_| tree.clone()).collect();
        drop(tree);

        thread::scope(|scope| {
            for copy in copies {
                let barrier = &barrier;
                scope.spawn(move || {
                    assert_eq!(leaf_values(copy.as_inner().unwrap()[0].as_ref().unwrap())[1], 1);
                    barrier.wait();
                    drop(copy);
                });
            }
        });

        assert_eq!(drops.get(), (iteration + 1) * 4 * BRANCHING);
    }
}

#[test]
fn release_recycles_on_dropping_thread() {
    const NODES: usize = 500;

    let (sender, receiver) = mpsc::channel::<NodeHandle<u64>>();

    let producer = thread::spawn(move || {
        for idx in 0..NODES {
            sender
                .send(pvec_nodes::make_leaf([idx as u64; BRANCHING]))
                .unwrap();
        }
        free_list::local_stats()
    });

    let consumer = thread::spawn(move || {
        let mut received = 0;
        for (idx, handle) in receiver.into_iter().enumerate() {
            assert_eq!(handle.as_leaf().unwrap()[0], idx as u64);
            received += 1;
        }
        (received, free_list::local_stats(), free_list::local_cached_blocks())
    });

    let producer_stats = producer.join().unwrap();
    let (received, consumer_stats, cached) = consumer.join().unwrap();

    assert_eq!(received, NODES);
    assert_eq!(producer_stats.allocations(), NODES as u64);
    assert_eq!(producer_stats.releases(), 0);

    // Every block ended up in the pool of the consumer, which never
    // allocated a node itself.
    assert_eq!(consumer_stats.allocations(), 0);
    assert_eq!(consumer_stats.releases(), NODES as u64);
    assert_eq!(cached, NODES);
}

#[test]
fn threads_build_over_shared_leaves() {
    const TREES_PER_THREAD: usize = 2_000;

    let drops = DropCounter::default();
    let leaves: Vec<_> = (0..BRANCHING).map(|idx| drops.leaf(idx as u64)).collect();

    let stats: Vec<_> = thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|worker| {
                let leaves = &leaves;
                scope.spawn(move || {
                    let mut kept = Vec::new();
                    for tree in 0..TREES_PER_THREAD {
                        let fan_out = 1 + (worker + tree) % BRANCHING;
                        let root = inner_of(leaves.iter().take(fan_out).cloned());
                        let parent = inner_of([root.clone(), root]);
                        if tree % 10 == 0 {
                            kept.push(parent);
                        }
                    }
                    drop(kept);
                    free_list::local_stats()
                })
            })
            .collect();

        workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect()
    });

    for leaf in &leaves {
        assert_eq!(leaf.ref_count(), 1);
    }
    for worker_stats in &stats {
        assert_eq!(worker_stats.allocations(), 2 * TREES_PER_THREAD as u64);
        assert_eq!(worker_stats.releases(), worker_stats.allocations());
        // After the first few trees, nodes come out of the free list.
        assert!(worker_stats.hits > worker_stats.misses);
    }

    assert_eq!(drops.get(), 0);
    drop(leaves);
    assert_eq!(drops.get(), BRANCHING * BRANCHING);
}
