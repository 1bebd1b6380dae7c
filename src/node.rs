//! Trie node representation

use crate::NodeHandle;

/// Number of index bits consumed by each level of the trie.
pub const BRANCHING_LOG: u32 = 5;
/// Number of slots in every node.
pub const BRANCHING: usize = 1 << BRANCHING_LOG;
/// Mask selecting the slot index of a single level.
pub const BRANCHING_MASK: usize = BRANCHING - 1;

/// Select the slot that holds position `index` at the given `depth`, where
/// depth 0 is the leaf level.
///
/// ```
/// use pvec_nodes::child_index;
///
/// assert_eq!(child_index(1000, 0), 1000 & 31);
/// assert_eq!(child_index(1000, 1), (1000 >> 5) & 31);
/// ```
#[inline]
pub const fn child_index(index: usize, depth: u32) -> usize {
    let Some(shift) = depth.checked_mul(BRANCHING_LOG) else {
        return 0;
    };
    match index.checked_shr(shift) {
        Some(shifted) => shifted & BRANCHING_MASK,
        None => 0,
    }
}

/// The slots of a leaf node.
pub type LeafSlots<T> = [T; BRANCHING];

/// The slots of an inner node, where `None` marks an absent child.
pub type InnerSlots<T> = [Option<NodeHandle<T>>; BRANCHING];

/// The variant of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Node that holds elements
    Leaf,
    /// Node that holds references to child nodes
    Inner,
}

/// A trie node, holding either elements or children.
///
/// The variant is chosen at construction and never changes. Every slot holds
/// valid data; how many of them are meaningful is tracked by whoever builds
/// the trie, not by the node.
///
/// Nodes are not [`Clone`]; sharing happens by cloning the
/// [`NodeHandle`] that points to a node.
#[derive(Debug)]
pub enum Node<T> {
    /// Node that holds elements
    Leaf(LeafSlots<T>),
    /// Node that holds references to child nodes
    Inner(InnerSlots<T>),
}

impl<T> Node<T> {
    /// An inner node with every child slot absent.
    pub fn empty_inner() -> Self {
        Node::Inner([const { None }; BRANCHING])
    }

    /// A leaf node whose slot `i` holds `f(i)`.
    pub fn leaf_from_fn(f: impl FnMut(usize) -> T) -> Self {
        Node::Leaf(std::array::from_fn(f))
    }

    /// Which variant this node is.
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Leaf(_) => NodeKind::Leaf,
            Node::Inner(_) => NodeKind::Inner,
        }
    }

    /// Returns `true` if this is a leaf node.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Returns `true` if this is an inner node.
    pub fn is_inner(&self) -> bool {
        matches!(self, Node::Inner(_))
    }

    /// The element slots, if this is a leaf node.
    pub fn as_leaf(&self) -> Option<&LeafSlots<T>> {
        match self {
            Node::Leaf(values) => Some(values),
            Node::Inner(_) => None,
        }
    }

    /// Mutable element slots, if this is a leaf node.
    pub fn as_leaf_mut(&mut self) -> Option<&mut LeafSlots<T>> {
        match self {
            Node::Leaf(values) => Some(values),
            Node::Inner(_) => None,
        }
    }

    /// The child slots, if this is an inner node.
    pub fn as_inner(&self) -> Option<&InnerSlots<T>> {
        match self {
            Node::Inner(children) => Some(children),
            Node::Leaf(_) => None,
        }
    }

    /// Mutable child slots, if this is an inner node.
    pub fn as_inner_mut(&mut self) -> Option<&mut InnerSlots<T>> {
        match self {
            Node::Inner(children) => Some(children),
            Node::Leaf(_) => None,
        }
    }

    /// Take the element slots out of a leaf node, or give back the node if it
    /// is an inner node.
    pub fn into_leaf(self) -> Result<LeafSlots<T>, Self> {
        match self {
            Node::Leaf(values) => Ok(values),
            inner @ Node::Inner(_) => Err(inner),
        }
    }

    /// Take the child slots out of an inner node, or give back the node if it
    /// is a leaf node.
    pub fn into_inner(self) -> Result<InnerSlots<T>, Self> {
        match self {
            Node::Inner(children) => Ok(children),
            leaf @ Node::Leaf(_) => Err(leaf),
        }
    }
}
