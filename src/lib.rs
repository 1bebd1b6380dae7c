#![deny(
    missing_docs,
    clippy::missing_safety_doc,
    unsafe_op_in_unsafe_fn,
    deprecated_in_future,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    rustdoc::invalid_codeblock_attributes
)]
#![doc(
    html_playground_url = "https://play.rust-lang.org/",
    test(attr(deny(warnings)))
)]

//! Nodes for persistent vectors built on a 32-way trie.
//!
//! A [`Node`] is either a leaf of [`BRANCHING`] elements or an inner node of
//! [`BRANCHING`] optional children. Nodes live behind [`NodeHandle`]s, which
//! count their owners so that many versions of a vector can share every
//! subtree they have in common. Building a new version only allocates the
//! nodes on the path to the change; everything else is shared by cloning a
//! handle.
//!
//! Node memory comes from a per-thread [free list](free_list), so the
//! constant churn of path copying rarely reaches the global allocator.
//!
//! ```
//! use pvec_nodes::{make_inner, make_leaf, BRANCHING};
//!
//! let leaf = make_leaf([0u32; BRANCHING]);
//!
//! let mut children = [const { None }; BRANCHING];
//! children[0] = Some(leaf.clone());
//! let root = make_inner(children);
//!
//! assert_eq!(leaf.ref_count(), 2);
//! drop(root);
//! assert_eq!(leaf.ref_count(), 1);
//! ```
//!
//! How many slots of a node are in use is not recorded in the node. The
//! vector built on top keeps its length and derives the fill of each node from
//! it; unused leaf slots still have to hold valid elements and unused child
//! slots are `None`.

mod allocator;
mod error;
mod factory;
pub mod free_list;
mod handle;
mod node;
mod ref_count;
mod tracing_helpers;

pub use allocator::{Allocator, Global};
pub use error::AllocationError;
pub use factory::*;
pub use free_list::{BlockPool, PoolStats, DEFAULT_POOL_CAPACITY};
pub use handle::NodeHandle;
pub use node::*;
pub use ref_count::RefCount;
