mod simulated;

pub use simulated::SimulatedAddressSpace;

use core::ptr::NonNull;
use thiserror::Error;

use crate::CallerId;

/// A range `[start, start + len)` in the virtual address space of a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualRange {
    pub start: usize,
    pub len: usize,
}

impl VirtualRange {
    pub const fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// Exclusive end of this range, `None` if it would overflow the address space
    pub const fn end(&self) -> Option<usize> {
        self.start.checked_add(self.len)
    }

    pub(crate) fn overlaps(&self, other: &VirtualRange) -> bool {
        match (self.end(), other.end()) {
            (Some(self_end), Some(other_end)) => {
                self.start < other_end && other.start < self_end
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("range is empty")]
    EmptyRange,

    #[error("range is not aligned to the page size")]
    Unaligned,

    #[error("range overlaps an existing mapping")]
    Overlap,

    #[error("range exceeds the address space")]
    OutOfBounds,

    #[error("range of {requested} bytes exceeds the backing storage of {available} bytes")]
    ExceedsStorage { requested: usize, available: usize },
}

/// A module that can make backing memory visible in the address space of a caller
/// (e.g. `remap_pfn_range` in a kernel)
pub trait AddressSpaceModule: Send + Sync {
    /// Maps `[backing, backing + range.len)` into the virtual range `range` of `caller`.
    ///
    /// It is guaranteed that `range.len` is a non zero multiple of the heap's page size
    /// and that the backing memory stays valid until `unmap_range` is called for this range.
    fn map_range(
        &self,
        caller: CallerId,
        range: VirtualRange,
        backing: NonNull<u8>,
    ) -> Result<(), MapError>;

    /// Removes a mapping that was established by `map_range`
    fn unmap_range(&self, caller: CallerId, range: VirtualRange);
}
