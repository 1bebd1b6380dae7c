//! Shared ownership of heap allocated nodes.

use crate::{
    free_list,
    node::{InnerSlots, Node},
    ref_count::RefCount,
    AllocationError,
};
use std::{
    alloc::Layout,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    mem::{self, ManuallyDrop},
    ops::Deref,
    ptr::{self, NonNull},
};

/// The heap block behind a [`NodeHandle`].
struct NodeBlock<T> {
    count: RefCount,
    node: Node<T>,
}

/// A counted reference to a [`Node`].
///
/// Cloning a handle shares the node and bumps its count, moving a handle
/// leaves the count untouched. Dropping the last handle destroys the node,
/// releasing its children, and hands the memory to the free list of the
/// thread that dropped it.
///
/// Two handles are equal when they point to the same node, regardless of the
/// node contents. An absent child is written as `None`; an
/// `Option<NodeHandle<T>>` is the size of a pointer.
pub struct NodeHandle<T> {
    ptr: NonNull<NodeBlock<T>>,
    marker: PhantomData<NodeBlock<T>>,
}

// SAFETY: Nodes are only mutated through a unique handle, and the count is
// atomic, so sharing handles across threads is sound as long as the elements
// themselves may be shared and sent.
unsafe impl<T: Send + Sync> Send for NodeHandle<T> {}
// SAFETY: See above.
unsafe impl<T: Send + Sync> Sync for NodeHandle<T> {}

impl<T> NodeHandle<T> {
    /// Layout of the block every node of this element type lives in.
    pub(crate) const LAYOUT: Layout = Layout::new::<NodeBlock<T>>();

    /// Move `node` into a block from the calling thread's pool.
    pub(crate) fn try_new(node: Node<T>) -> Result<Self, AllocationError> {
        let ptr = free_list::allocate(Self::LAYOUT)?.cast::<NodeBlock<T>>();

        // SAFETY: The block is valid for writes of `Self::LAYOUT`, which is the
        // layout of `NodeBlock<T>`.
        unsafe {
            ptr.as_ptr().write(NodeBlock {
                count: RefCount::new(),
                node,
            })
        };

        Ok(NodeHandle {
            ptr,
            marker: PhantomData,
        })
    }

    fn block(&self) -> &NodeBlock<T> {
        // SAFETY: The block stays alive for as long as this handle exists.
        unsafe { self.ptr.as_ref() }
    }

    /// The referenced node.
    pub fn node(&self) -> &Node<T> {
        &self.block().node
    }

    /// Number of handles currently pointing to the node.
    pub fn ref_count(&self) -> usize {
        self.block().count.get()
    }

    /// Returns `true` if this is the only handle to the node.
    pub fn is_unique(&self) -> bool {
        self.block().count.is_unique()
    }

    /// Mutable access to the node, if this is the only handle to it.
    ///
    /// This is how a freshly built node is filled in before it gets shared.
    /// Once the handle has been cloned the node is immutable, and this returns
    /// `None` until all the other handles are gone again.
    pub fn get_mut(&mut self) -> Option<&mut Node<T>> {
        if !self.is_unique() {
            return None;
        }

        // SAFETY: There are no other handles, and no new one can be created
        // while `self` is mutably borrowed, so this is the only access to the
        // node.
        Some(unsafe { &mut (*self.ptr.as_ptr()).node })
    }

    /// Take the node out of a unique handle, recycling its block. A shared
    /// handle is given back unchanged.
    pub fn try_unwrap(self) -> Result<Node<T>, Self> {
        if !self.is_unique() {
            return Err(self);
        }

        let this = ManuallyDrop::new(self);
        // SAFETY: This is the only handle, so the block is read exactly once
        // and then released without running its destructor.
        let block = unsafe { this.ptr.as_ptr().read() };
        // SAFETY: The block came from `free_list::allocate` with `Self::LAYOUT`
        // and nothing refers to it anymore.
        unsafe { free_list::deallocate(this.ptr.cast(), Self::LAYOUT) };

        Ok(block.node)
    }

    /// Returns `true` if both handles point to the same node.
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    /// Address of the referenced node.
    pub fn as_ptr(&self) -> *const Node<T> {
        // SAFETY: The pointer is valid, no reference is created.
        unsafe { ptr::addr_of!((*self.ptr.as_ptr()).node) }
    }
}

/// Destroy a node whose count has dropped to zero, along with every
/// descendant that loses its last owner as a result.
///
/// This neither recurses nor allocates. Blocks waiting to be destroyed form a
/// stack linked through their count words, which are dead once the count is
/// zero.
///
/// # Safety
///  - The count of `root` must have just reached zero, and `root` must not be
///    accessed by anything else afterwards.
unsafe fn release<T>(root: NonNull<NodeBlock<T>>) {
    let mut pending: DyingLink<T> = None;
    let mut current = Some(root);

    while let Some(block) = current {
        // SAFETY: The block lost its last owner, so this is the only access.
        let node = unsafe { &mut (*block.as_ptr()).node };
        if let Node::Inner(children) = node {
            detach_children(children, &mut pending);
        }

        // SAFETY: The block is initialized and, after the children were
        // detached, dropping it runs no other node's destructor. It came from
        // `free_list::allocate` with the node layout.
        unsafe {
            ptr::drop_in_place(block.as_ptr());
            free_list::deallocate(block.cast(), NodeHandle::<T>::LAYOUT);
        }

        current = pending;
        if let Some(next) = current {
            // SAFETY: Every block on the stack had its link written when it
            // was pushed, and is not destroyed before it is popped.
            pending = unsafe { dying_link(next).read() };
        }
    }
}

/// Link to the next block waiting in [`release`].
type DyingLink<T> = Option<NonNull<NodeBlock<T>>>;

/// The count word of `block`, reused as a [`DyingLink`].
///
/// # Safety
///  - `block` must point to a live block whose count is zero.
unsafe fn dying_link<T>(block: NonNull<NodeBlock<T>>) -> *mut DyingLink<T> {
    // SAFETY: Covered by the function safety doc, no reference is created.
    unsafe { ptr::addr_of_mut!((*block.as_ptr()).count) }.cast()
}

/// Release every child of a dying inner node, pushing the ones whose count
/// reached zero onto `pending`.
fn detach_children<T>(children: &mut InnerSlots<T>, pending: &mut DyingLink<T>) {
    for slot in children.iter_mut() {
        if let Some(child) = slot.take() {
            let child = ManuallyDrop::new(child);
            if child.block().count.decrement() {
                // SAFETY: The count just reached zero, so nothing else reads
                // the count word and the block stays alive until popped.
                unsafe { dying_link(child.ptr).write(*pending) };
                *pending = Some(child.ptr);
            }
        }
    }
}

const _: () = {
    assert!(mem::size_of::<RefCount>() >= mem::size_of::<DyingLink<u8>>());
    assert!(mem::align_of::<RefCount>() >= mem::align_of::<DyingLink<u8>>());
};

impl<T> Clone for NodeHandle<T> {
    fn clone(&self) -> Self {
        self.block().count.increment();
        NodeHandle {
            ptr: self.ptr,
            marker: PhantomData,
        }
    }
}

impl<T> Drop for NodeHandle<T> {
    fn drop(&mut self) {
        if self.block().count.decrement() {
            // SAFETY: This was the last handle.
            unsafe { release(self.ptr) };
        }
    }
}

impl<T> Deref for NodeHandle<T> {
    type Target = Node<T>;

    fn deref(&self) -> &Node<T> {
        self.node()
    }
}

impl<T> PartialEq for NodeHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T> Eq for NodeHandle<T> {}

impl<T> Hash for NodeHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr.hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("ptr", &self.ptr)
            .field("ref_count", &self.ref_count())
            .field("node", self.node())
            .finish()
    }
}

impl<T> fmt::Pointer for NodeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}
