use std::{alloc::Layout, error::Error, fmt};

/// The allocator backing a node pool could not provide a block.
///
/// This is the only recoverable failure of this crate. It is never retried
/// internally; the infallible constructors such as
/// [`make_leaf`](crate::make_leaf) turn it into
/// [`handle_alloc_error`](std::alloc::handle_alloc_error) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationError {
    layout: Layout,
}

impl AllocationError {
    pub(crate) fn new(layout: Layout) -> Self {
        AllocationError { layout }
    }

    /// The layout of the block that could not be allocated.
    pub fn layout(&self) -> Layout {
        self.layout
    }
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to allocate a node block of {} bytes (align {})",
            self.layout.size(),
            self.layout.align()
        )
    }
}

impl Error for AllocationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_block_size() {
        let err = AllocationError::new(Layout::from_size_align(272, 8).unwrap());

        assert_eq!(
            err.to_string(),
            "failed to allocate a node block of 272 bytes (align 8)"
        );
        assert_eq!(err.layout().size(), 272);
    }
}
