//! Recycling of fixed-size node blocks.
//!
//! Building and tearing down tries allocates and frees a large number of
//! blocks that all have the same few layouts. A [`BlockPool`] keeps released
//! blocks on an intrusive free list per layout and hands them out again
//! before asking its [`Allocator`] for fresh memory.
//!
//! Nodes use one pool per thread, created lazily on the first allocation made
//! by that thread and trimmed when the thread exits. A block is always
//! returned to the pool of the thread that *releases* it, which need not be
//! the thread that allocated it, since the last handle to a node can be
//! dropped anywhere. Pools fill up unevenly when one thread builds and another
//! releases. Each pool caches at most [`capacity`](BlockPool::capacity) blocks
//! per layout and spills anything beyond that back to the allocator.

use crate::{
    allocator::{do_alloc, Allocator, Global},
    tracing_helpers::{debug_log, trace_log},
    AllocationError,
};
use std::{
    alloc::{Layout, LayoutError},
    cell::RefCell,
    fmt,
    mem,
    ptr::NonNull,
};

/// Number of blocks each thread caches per layout unless changed with
/// [`set_local_capacity`].
pub const DEFAULT_POOL_CAPACITY: usize = 4096;

/// The link written into the first word of every free block.
#[repr(C)]
struct FreeBlock {
    next: Option<NonNull<FreeBlock>>,
}

/// Widen `layout` so that a free block can hold the list link.
fn block_layout(layout: Layout) -> Result<Layout, LayoutError> {
    let link = Layout::new::<FreeBlock>();
    Layout::from_size_align(
        layout.size().max(link.size()),
        layout.align().max(link.align()),
    )
}

/// An intrusive LIFO list of unused blocks.
///
/// The list does not own an allocator and never frees anything. Blocks still
/// on the list when it is dropped are leaked, so the owner has to drain it.
pub(crate) struct FreeList {
    head: Option<NonNull<FreeBlock>>,
    len: usize,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        FreeList { head: None, len: 0 }
    }

    /// Push an unused block on top of the list.
    ///
    /// # Safety
    ///  - `block` must be valid for writes of a pointer-sized, pointer-aligned
    ///    value.
    ///  - Nothing else may access `block` until it is popped again.
    pub(crate) unsafe fn push(&mut self, block: NonNull<u8>) {
        let block = block.cast::<FreeBlock>();
        // SAFETY: Covered by the function safety doc.
        unsafe { block.as_ptr().write(FreeBlock { next: self.head }) };
        self.head = Some(block);
        self.len += 1;
    }

    /// Pop the most recently pushed block.
    pub(crate) fn pop(&mut self) -> Option<NonNull<u8>> {
        let block = self.head?;
        // SAFETY: Every block on the list was initialized with a link in `push`
        // and is not accessed by anything else while it is on the list.
        self.head = unsafe { block.as_ptr().read().next };
        self.len -= 1;
        Some(block.cast())
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// Counters describing how a [`BlockPool`] served its requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Allocations served from a free list.
    pub hits: u64,
    /// Allocations forwarded to the allocator.
    pub misses: u64,
    /// Released blocks kept on a free list.
    pub recycled: u64,
    /// Released blocks handed back to the allocator because the free list
    /// was at capacity.
    pub spilled: u64,
    /// Cached blocks handed back to the allocator by [`BlockPool::trim`].
    pub trimmed: u64,
}

impl PoolStats {
    /// Total number of blocks handed out.
    pub fn allocations(&self) -> u64 {
        self.hits + self.misses
    }

    /// Total number of blocks taken back.
    pub fn releases(&self) -> u64 {
        self.recycled + self.spilled
    }
}

struct SizeClass {
    layout: Layout,
    free: FreeList,
}

/// A cache of released blocks, keyed by layout, in front of an
/// [`Allocator`].
pub struct BlockPool<A: Allocator = Global> {
    classes: Vec<SizeClass>,
    capacity: usize,
    stats: PoolStats,
    alloc: A,
}

// SAFETY: The pool exclusively owns every block on its free lists, so moving
// it to another thread moves that ownership along with the allocator.
unsafe impl<A: Allocator + Send> Send for BlockPool<A> {}

impl BlockPool<Global> {
    /// Create a pool over the global allocator caching at most `capacity`
    /// blocks per layout.
    pub fn new(capacity: usize) -> Self {
        Self::new_in(Global, capacity)
    }
}

impl<A: Allocator> BlockPool<A> {
    /// Create a pool over `alloc` caching at most `capacity` blocks per
    /// layout.
    pub fn new_in(alloc: A, capacity: usize) -> Self {
        BlockPool {
            classes: Vec::new(),
            capacity,
            stats: PoolStats::default(),
            alloc,
        }
    }

    /// The allocator backing this pool.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Maximum number of blocks cached per layout.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the per-layout capacity, spilling cached blocks beyond the new
    /// limit back to the allocator.
    pub fn set_capacity(&mut self, capacity: usize) {
        debug_log!(old = self.capacity, new = capacity, "changing block pool capacity");
        self.capacity = capacity;

        for class in &mut self.classes {
            while class.free.len() > capacity {
                let Some(block) = class.free.pop() else {
                    break;
                };
                // SAFETY: The block came from `self.alloc` with `class.layout`.
                unsafe { self.alloc.deallocate(block, class.layout) };
                self.stats.spilled += 1;
            }
        }
    }

    /// Number of blocks currently cached over all layouts.
    pub fn cached_blocks(&self) -> usize {
        self.classes.iter().map(|class| class.free.len()).sum()
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    fn class_index(&self, layout: Layout) -> Option<usize> {
        self.classes
            .iter()
            .position(|class| class.layout == layout)
    }

    /// Allocate a block that fits `layout`.
    ///
    /// A previously released block with the same layout is reused if one is
    /// cached, otherwise the request goes to the allocator. Failure of the
    /// allocator is reported as is, without retrying.
    pub fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocationError> {
        let padded = block_layout(layout).map_err(|_| AllocationError::new(layout))?;

        if let Some(idx) = self.class_index(padded) {
            if let Some(block) = self.classes[idx].free.pop() {
                self.stats.hits += 1;
                return Ok(block);
            }
        }

        trace_log!(
            size = padded.size(),
            align = padded.align(),
            "block pool miss"
        );
        self.stats.misses += 1;
        do_alloc(&self.alloc, padded)
    }

    /// Take back a block, caching it for reuse unless the free list for its
    /// layout is full.
    ///
    /// # Safety
    ///  - `ptr` must have been returned by [`BlockPool::allocate`] with the
    ///    same `layout`, on a pool whose allocator can free blocks of this
    ///    pool's allocator (for the global allocator, any thread's pool).
    ///  - `ptr` must not be used after this call and must not be released
    ///    twice.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        let padded =
            block_layout(layout).expect("layout was already accepted by `allocate`");

        let idx = match self.class_index(padded) {
            Some(idx) => idx,
            None => {
                self.classes.push(SizeClass {
                    layout: padded,
                    free: FreeList::new(),
                });
                self.classes.len() - 1
            },
        };

        let class = &mut self.classes[idx];
        if class.free.len() >= self.capacity {
            trace_log!(size = padded.size(), "block pool full, spilling block");
            self.stats.spilled += 1;
            // SAFETY: Covered by the function safety doc, the block was
            // allocated with `padded`.
            unsafe { self.alloc.deallocate(ptr, padded) };
            return;
        }

        // SAFETY: The block is at least as large and aligned as a `FreeBlock`
        // and ownership of it passes to the free list.
        unsafe { class.free.push(ptr) };
        self.stats.recycled += 1;
    }

    /// Hand every cached block back to the allocator, returning how many
    /// blocks were released.
    pub fn trim(&mut self) -> usize {
        let mut released = 0;
        for class in &mut self.classes {
            while let Some(block) = class.free.pop() {
                // SAFETY: The block came from `self.alloc` with `class.layout`.
                unsafe { self.alloc.deallocate(block, class.layout) };
                released += 1;
            }
            debug_assert!(class.free.is_empty());
        }

        self.stats.trimmed += released as u64;
        if released > 0 {
            debug_log!(released, "trimmed block pool");
        }
        released
    }
}

impl<A: Allocator> Drop for BlockPool<A> {
    fn drop(&mut self) {
        self.trim();
        debug_log!(stats = ?self.stats, "block pool torn down");
    }
}

impl<A: Allocator> fmt::Debug for BlockPool<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPool")
            .field("capacity", &self.capacity)
            .field("cached_blocks", &self.cached_blocks())
            .field("stats", &self.stats)
            .finish()
    }
}

thread_local! {
    static LOCAL_POOL: RefCell<BlockPool> = RefCell::new(BlockPool::new(DEFAULT_POOL_CAPACITY));
}

/// Run `f` on the calling thread's pool.
///
/// Returns `None` once the pool has been destroyed during thread exit, or if
/// the pool is already borrowed further up the stack.
fn with_local_pool<R>(f: impl FnOnce(&mut BlockPool) -> R) -> Option<R> {
    LOCAL_POOL
        .try_with(|pool| pool.try_borrow_mut().ok().map(|mut pool| f(&mut *pool)))
        .ok()
        .flatten()
}

/// Allocate a block fitting `layout` from the calling thread's pool.
///
/// Falls back to the global allocator when the thread's pool is not
/// available.
pub fn allocate(layout: Layout) -> Result<NonNull<u8>, AllocationError> {
    match with_local_pool(|pool| pool.allocate(layout)) {
        Some(result) => result,
        None => {
            let padded = block_layout(layout).map_err(|_| AllocationError::new(layout))?;
            do_alloc(&Global, padded)
        },
    }
}

/// Release a block to the calling thread's pool.
///
/// # Safety
///  - `ptr` must have been returned by [`allocate`] (on any thread) with the
///    same `layout`.
///  - `ptr` must not be used after this call and must not be released twice.
pub unsafe fn deallocate(ptr: NonNull<u8>, layout: Layout) {
    // SAFETY: Every thread's pool is backed by the global allocator, so a
    // block from any of them may be cached by this one.
    let released = with_local_pool(|pool| unsafe { pool.deallocate(ptr, layout) });
    if released.is_none() {
        let padded =
            block_layout(layout).expect("layout was already accepted by `allocate`");
        // SAFETY: The block was allocated from the global allocator with
        // `padded`, either directly or through a pool.
        unsafe { Global.deallocate(ptr, padded) };
    }
}

/// Counters of the calling thread's pool.
pub fn local_stats() -> PoolStats {
    with_local_pool(|pool| pool.stats()).unwrap_or_default()
}

/// Number of blocks cached by the calling thread's pool.
pub fn local_cached_blocks() -> usize {
    with_local_pool(|pool| pool.cached_blocks()).unwrap_or(0)
}

/// Per-layout capacity of the calling thread's pool.
pub fn local_capacity() -> usize {
    with_local_pool(|pool| pool.capacity()).unwrap_or(0)
}

/// Change the per-layout capacity of the calling thread's pool.
pub fn set_local_capacity(capacity: usize) {
    with_local_pool(|pool| pool.set_capacity(capacity));
}

/// Release every block cached by the calling thread's pool to the global
/// allocator, returning how many were released.
pub fn trim_local() -> usize {
    with_local_pool(BlockPool::trim).unwrap_or(0)
}

const _: () = assert!(mem::size_of::<FreeBlock>() == mem::size_of::<usize>());
