#![no_main]

use libfuzzer_sys::arbitrary::{self, Arbitrary};
use pvec_nodes::{free_list, make_inner, make_leaf, InnerSlots, Node, NodeHandle, BRANCHING};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

#[derive(Debug)]
struct Tracked(Arc<AtomicUsize>);

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Arbitrary, Debug)]
enum Action {
    MakeLeaf,
    MakeInner {
        // indices of the handles to use as children
        children: Vec<u8>,
    },
    Clone {
        handle: u8,
    },
    Drop {
        handle: u8,
    },
    Unwrap {
        handle: u8,
    },
    WriteIfUnique {
        handle: u8,
    },
    SetCapacity {
        capacity: u8,
    },
}

fn pick(handles: &[NodeHandle<Tracked>], idx: u8) -> Option<usize> {
    (!handles.is_empty()).then(|| usize::from(idx) % handles.len())
}

libfuzzer_sys::fuzz_target!(|actions: Vec<Action>| {
    let drops = Arc::new(AtomicUsize::new(0));
    let mut handles: Vec<NodeHandle<Tracked>> = Vec::new();
    let mut leaves_created = 0;
    let mut elements_replaced = 0;

    for action in actions {
        match action {
            Action::MakeLeaf => {
                handles.push(make_leaf(std::array::from_fn(|_| {
                    Tracked(Arc::clone(&drops))
                })));
                leaves_created += 1;
            },
            Action::MakeInner { children } => {
                let mut slots: InnerSlots<Tracked> = [const { None }; BRANCHING];
                for (slot, idx) in slots.iter_mut().zip(children) {
                    *slot = pick(&handles, idx).map(|idx| handles[idx].clone());
                }
                handles.push(make_inner(slots));
            },
            Action::Clone { handle } => {
                if let Some(idx) = pick(&handles, handle) {
                    let copy = handles[idx].clone();
                    handles.push(copy);
                }
            },
            Action::Drop { handle } => {
                if let Some(idx) = pick(&handles, handle) {
                    handles.swap_remove(idx);
                }
            },
            Action::Unwrap { handle } => {
                if let Some(idx) = pick(&handles, handle) {
                    let handle = handles.swap_remove(idx);
                    match handle.try_unwrap() {
                        Ok(node) => assert!(matches!(node, Node::Leaf(_) | Node::Inner(_))),
                        Err(handle) => {
                            assert!(handle.ref_count() > 1);
                            handles.push(handle);
                        },
                    }
                }
            },
            Action::WriteIfUnique { handle } => {
                if let Some(idx) = pick(&handles, handle) {
                    let unique = handles[idx].is_unique();
                    match handles[idx].get_mut() {
                        Some(Node::Leaf(values)) => {
                            assert!(unique);
                            values[0] = Tracked(Arc::clone(&drops));
                            elements_replaced += 1;
                        },
                        Some(Node::Inner(children)) => {
                            assert!(unique);
                            children[0] = None;
                        },
                        None => assert!(!unique),
                    }
                }
            },
            Action::SetCapacity { capacity } => {
                free_list::set_local_capacity(usize::from(capacity));
            },
        }

        let mut held: HashMap<*const Node<Tracked>, usize> = HashMap::new();
        for handle in &handles {
            *held.entry(handle.as_ptr()).or_default() += 1;
        }
        for handle in &handles {
            // Inner nodes may hold further references.
            assert!(handle.ref_count() >= held[&handle.as_ptr()]);
        }
    }

    drop(handles);
    assert_eq!(
        drops.load(Ordering::Relaxed),
        leaves_created * BRANCHING + elements_replaced
    );
});
