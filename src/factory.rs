//! Construction of new nodes.
//!
//! Every node is built by one of these functions: the node is moved into a
//! block taken from the calling thread's [free list](crate::free_list) and
//! the returned handle is its only owner.

use crate::{
    node::{InnerSlots, LeafSlots, Node},
    AllocationError, NodeHandle,
};
use std::alloc::handle_alloc_error;

/// Allocate `node` and return the first handle to it.
///
/// # Aborts
///  - Calls [`handle_alloc_error`] if no memory is available, like `Box::new`
///    does. Use [`try_make_node`] to handle that case.
pub fn make_node<T>(node: Node<T>) -> NodeHandle<T> {
    match try_make_node(node) {
        Ok(handle) => handle,
        Err(err) => handle_alloc_error(err.layout()),
    }
}

/// Allocate `node` and return the first handle to it, or the allocation
/// error. On error `node` is dropped.
pub fn try_make_node<T>(node: Node<T>) -> Result<NodeHandle<T>, AllocationError> {
    NodeHandle::try_new(node)
}

/// Allocate a leaf node holding `values`.
///
/// ```
/// use pvec_nodes::{make_leaf, BRANCHING};
///
/// let leaf = make_leaf([1u64; BRANCHING]);
/// assert_eq!(leaf.ref_count(), 1);
/// assert_eq!(leaf.as_leaf().unwrap()[31], 1);
/// ```
pub fn make_leaf<T>(values: LeafSlots<T>) -> NodeHandle<T> {
    make_node(Node::Leaf(values))
}

/// Fallible version of [`make_leaf`].
pub fn try_make_leaf<T>(values: LeafSlots<T>) -> Result<NodeHandle<T>, AllocationError> {
    try_make_node(Node::Leaf(values))
}

/// Allocate an inner node holding `children`.
pub fn make_inner<T>(children: InnerSlots<T>) -> NodeHandle<T> {
    make_node(Node::Inner(children))
}

/// Fallible version of [`make_inner`].
pub fn try_make_inner<T>(children: InnerSlots<T>) -> Result<NodeHandle<T>, AllocationError> {
    try_make_node(Node::Inner(children))
}
