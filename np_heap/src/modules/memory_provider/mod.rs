mod heap;

#[cfg(unix)]
mod mmap;

pub use heap::HeapMemoryProvider;

#[cfg(unix)]
pub use mmap::MMapMemoryProvider;

use core::ptr::NonNull;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("could not provide a memory block of {size} bytes")]
pub struct AllocError {
    pub size: usize,
}

/// A module that provides zeroed memory blocks during runtime
/// (e.g. trough `mmap` or the global allocator)
pub trait MemoryProviderModule: Send + Sync {
    /// Returns a new, zeroed memory block with `size` bytes that is aligned to `align`.
    ///
    /// It is guaranteed that `size` is a non zero multiple of `min_size()` and of `align`
    /// and that `align` is a power of two.
    fn map_block(&self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError>;

    /// Removes the memory block.
    ///
    /// ### Safety
    ///
    /// `ptr`, `size` and `align` have to be the exact values of a previous `map_block` call
    /// and the block must not be accessed afterwards.
    unsafe fn unmap_block(&self, ptr: NonNull<u8>, size: usize, align: usize);

    /// Gets the minimum size of a memory block.
    /// This should be the same value on every call or things might break.
    fn min_size(&self) -> usize;
}
