#![allow(dead_code)]

use pvec_nodes::{make_inner, make_leaf, InnerSlots, NodeHandle, BRANCHING};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// An element that counts how many times it has been dropped.
#[derive(Debug)]
pub struct Tracked {
    pub value: u64,
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Shared drop counter for [`Tracked`] elements.
#[derive(Debug, Clone, Default)]
pub struct DropCounter(Arc<AtomicUsize>);

impl DropCounter {
    pub fn tracked(&self, value: u64) -> Tracked {
        Tracked {
            value,
            drops: Arc::clone(&self.0),
        }
    }

    pub fn leaf(&self, first: u64) -> NodeHandle<Tracked> {
        make_leaf(std::array::from_fn(|idx| self.tracked(first + idx as u64)))
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fill the first slots of an inner node with `children`, leaving the rest
/// absent.
pub fn inner_of<T>(children: impl IntoIterator<Item = NodeHandle<T>>) -> NodeHandle<T> {
    let mut slots: InnerSlots<T> = [const { None }; BRANCHING];
    for (slot, child) in slots.iter_mut().zip(children) {
        *slot = Some(child);
    }
    make_inner(slots)
}

/// Values stored in a leaf, in slot order.
pub fn leaf_values(handle: &NodeHandle<Tracked>) -> Vec<u64> {
    handle
        .as_leaf()
        .expect("expected a leaf node")
        .iter()
        .map(|tracked| tracked.value)
        .collect()
}
