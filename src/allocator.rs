pub use self::inner::{Allocator, Global};
pub(crate) use self::inner::do_alloc;

// This uses `allocator-api2` when the feature is enabled.
// If any crate enables "nightly" in `allocator-api2`,
// `allocator_api2::alloc::Allocator` is a re-export of
// `core::alloc::Allocator`, so nightly allocators work here as well.
#[cfg(feature = "allocator-api2")]
mod inner {
    use crate::AllocationError;
    use std::{alloc::Layout, ptr::NonNull};

    pub use allocator_api2::alloc::{Allocator, Global};

    pub(crate) fn do_alloc<A: Allocator>(
        alloc: &A,
        layout: Layout,
    ) -> Result<NonNull<u8>, AllocationError> {
        match alloc.allocate(layout) {
            Ok(ptr) => Ok(ptr.cast()),
            Err(_) => Err(AllocationError::new(layout)),
        }
    }
}

// Default case.
// When `allocator-api2` is not enabled, a minimal copy of the allocator
// trait is provided so that a `BlockPool` can still be backed by something
// other than the global heap.
#[cfg(not(feature = "allocator-api2"))]
mod inner {
    use crate::AllocationError;
    use std::{
        alloc::{alloc, dealloc, Layout},
        ptr::NonNull,
    };

    /// A source of raw memory blocks for a
    /// [`BlockPool`](crate::free_list::BlockPool).
    ///
    /// # Safety
    ///
    /// Blocks returned by [`Allocator::allocate`] must stay valid until they
    /// are passed back to [`Allocator::deallocate`] on the same allocator,
    /// and must fit the requested layout.
    pub unsafe trait Allocator {
        /// Attempts to allocate a block of memory.
        fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocationError>;

        /// Deallocates the memory referenced by `ptr`.
        ///
        /// # Safety
        ///
        /// * `ptr` must denote a block of memory [*currently allocated*] via
        ///   this allocator, and
        /// * `layout` must [*fit*] that block of memory.
        ///
        /// [*currently allocated*]: https://doc.rust-lang.org/std/alloc/trait.Allocator.html#currently-allocated-memory
        /// [*fit*]: https://doc.rust-lang.org/std/alloc/trait.Allocator.html#memory-fitting
        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
    }

    unsafe impl<A: Allocator + ?Sized> Allocator for &A {
        #[inline]
        fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocationError> {
            (**self).allocate(layout)
        }

        #[inline]
        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
            // SAFETY: Requirements are forwarded to the caller.
            unsafe { (**self).deallocate(ptr, layout) }
        }
    }

    /// The global memory allocator.
    #[derive(Debug, Copy, Clone, Default)]
    pub struct Global;

    unsafe impl Allocator for Global {
        #[inline]
        fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocationError> {
            debug_assert_ne!(layout.size(), 0, "zero-sized blocks are never pooled");
            // SAFETY: Every layout reaching the pool has a non-zero size, see
            // `free_list::block_layout`.
            NonNull::new(unsafe { alloc(layout) }).ok_or(AllocationError::new(layout))
        }

        #[inline]
        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
            // SAFETY: Covered by the trait safety doc.
            unsafe { dealloc(ptr.as_ptr(), layout) };
        }
    }

    pub(crate) fn do_alloc<A: Allocator>(
        alloc: &A,
        layout: Layout,
    ) -> Result<NonNull<u8>, AllocationError> {
        alloc.allocate(layout)
    }
}
