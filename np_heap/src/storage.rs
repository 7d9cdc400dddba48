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

use core::ptr::NonNull;
use std::sync::Arc;

use crate::modules::memory_provider::{AllocError, MemoryProviderModule};

/// One zeroed, page aligned memory block that backs an object.
///
/// The block is given back to the memory provider once the last owner is dropped.
pub(crate) struct Storage<P: MemoryProviderModule> {
    ptr: NonNull<u8>,
    len: usize,
    align: usize,
    provider: Arc<P>,
}

// `Storage` exclusively owns its block, which is plain memory without thread affinity.
unsafe impl<P: MemoryProviderModule> Send for Storage<P> {}
unsafe impl<P: MemoryProviderModule> Sync for Storage<P> {}

impl<P: MemoryProviderModule> Storage<P> {
    pub(crate) fn allocate(provider: &Arc<P>, len: usize, align: usize) -> Result<Self, AllocError> {
        let ptr = provider.map_block(len, align)?;

        Ok(Self {
            ptr,
            len,
            align,
            provider: provider.clone(),
        })
    }

    pub(crate) fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl<P: MemoryProviderModule> Drop for Storage<P> {
    fn drop(&mut self) {
        unsafe { self.provider.unmap_block(self.ptr, self.len, self.align) };
    }
}
