/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{
    alloc::{alloc_zeroed, dealloc, Layout},
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

use log::warn;

use super::{AllocError, MemoryProviderModule};

/// Provides memory blocks from the global allocator.
///
/// An optional limit caps the amount of bytes that can be handed out at the same time,
/// which is how memory pressure is modelled for this provider.
pub struct HeapMemoryProvider {
    /// bytes that are currently handed out
    outstanding: AtomicUsize,

    limit: Option<usize>,
}

impl HeapMemoryProvider {
    pub fn new() -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
            limit: None,
        }
    }

    /// Creates a provider that never has more than `limit` bytes handed out
    pub fn with_limit(limit: usize) -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
            limit: Some(limit),
        }
    }

    /// Bytes that were mapped and are not unmapped yet
    pub fn outstanding_bytes(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    fn reserve(&self, size: usize) -> Result<(), AllocError> {
        let limit = match self.limit {
            Some(limit) => limit,
            None => {
                self.outstanding.fetch_add(size, Ordering::AcqRel);
                return Ok(());
            }
        };

        self.outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |curr| {
                curr.checked_add(size).filter(|total| *total <= limit)
            })
            .map(|_| ())
            .map_err(|_| AllocError { size })
    }
}

impl Default for HeapMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProviderModule for HeapMemoryProvider {
    fn map_block(&self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
        let layout = Layout::from_size_align(size, align).map_err(|_| AllocError { size })?;
        if layout.size() == 0 {
            return Err(AllocError { size });
        }

        self.reserve(size)?;

        match NonNull::new(unsafe { alloc_zeroed(layout) }) {
            Some(ptr) => Ok(ptr),
            None => {
                warn!("global allocator could not provide {} bytes", size);
                self.outstanding.fetch_sub(size, Ordering::AcqRel);
                Err(AllocError { size })
            }
        }
    }

    unsafe fn unmap_block(&self, ptr: NonNull<u8>, size: usize, align: usize) {
        let layout = Layout::from_size_align_unchecked(size, align);
        dealloc(ptr.as_ptr(), layout);

        self.outstanding.fetch_sub(size, Ordering::AcqRel);
    }

    fn min_size(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod test {
    use super::HeapMemoryProvider;
    use crate::modules::memory_provider::{AllocError, MemoryProviderModule};

    #[test]
    fn test_blocks_are_zeroed_and_aligned() {
        let provider = HeapMemoryProvider::new();
        let ptr = provider.map_block(3 * 4096, 4096).unwrap();

        assert_eq!(ptr.as_ptr() as usize % 4096, 0);
        let data = unsafe { core::slice::from_raw_parts(ptr.as_ptr(), 3 * 4096) };
        assert!(data.iter().all(|x| *x == 0));
        assert_eq!(provider.outstanding_bytes(), 3 * 4096);

        unsafe { provider.unmap_block(ptr, 3 * 4096, 4096) };
        assert_eq!(provider.outstanding_bytes(), 0);
    }

    #[test]
    fn test_limit() {
        let provider = HeapMemoryProvider::with_limit(2 * 4096);

        let a = provider.map_block(4096, 4096).unwrap();
        let b = provider.map_block(4096, 4096).unwrap();
        assert_eq!(
            provider.map_block(4096, 4096),
            Err(AllocError { size: 4096 })
        );

        // limit is about outstanding bytes, so freeing makes room again
        unsafe { provider.unmap_block(a, 4096, 4096) };
        let c = provider.map_block(4096, 4096).unwrap();

        unsafe {
            provider.unmap_block(b, 4096, 4096);
            provider.unmap_block(c, 4096, 4096);
        }
        assert_eq!(provider.outstanding_bytes(), 0);
    }

    #[test]
    fn test_zero_sized_block() {
        let provider = HeapMemoryProvider::new();
        assert!(provider.map_block(0, 4096).is_err());
        assert_eq!(provider.outstanding_bytes(), 0);
    }
}
