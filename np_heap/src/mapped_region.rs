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

use core::ptr::{copy_nonoverlapping, NonNull};
use std::sync::Arc;

use crate::{
    modules::{
        address_space::{AddressSpaceModule, VirtualRange},
        memory_provider::MemoryProviderModule,
    },
    storage::Storage,
    CallerId, ObjectKey,
};

/// A mapping of an object's storage into the virtual range of one caller.
///
/// All mappings of the same object share the same bytes.
/// Dropping the region removes the mapping from the address space. The storage
/// stays valid for as long as a region refers to it, even if the object is
/// deleted in the meantime.
///
/// The heap does not synchronize accesses to the mapped bytes.
/// Callers have to agree on using the object lock for that.
pub struct MappedRegion<P: MemoryProviderModule, S: AddressSpaceModule> {
    key: ObjectKey,
    caller: CallerId,
    range: VirtualRange,
    storage: Arc<Storage<P>>,
    address_space: Arc<S>,
}

impl<P: MemoryProviderModule, S: AddressSpaceModule> MappedRegion<P, S> {
    pub(crate) fn new(
        key: ObjectKey,
        caller: CallerId,
        range: VirtualRange,
        storage: Arc<Storage<P>>,
        address_space: Arc<S>,
    ) -> Self {
        debug_assert!(range.len <= storage.len());

        Self {
            key,
            caller,
            range,
            storage,
            address_space,
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.key
    }

    pub fn caller(&self) -> CallerId {
        self.caller
    }

    /// Virtual range of the caller this region is mapped to
    pub fn range(&self) -> VirtualRange {
        self.range
    }

    pub fn len(&self) -> usize {
        self.range.len
    }

    pub fn is_empty(&self) -> bool {
        self.range.len == 0
    }

    /// Start of the backing memory
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.storage.as_ptr()
    }

    /// Whether `self` and `other` are backed by the same storage
    pub fn shares_storage_with(&self, other: &MappedRegion<P, S>) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Copies `dest.len()` bytes starting at `offset` out of this region.
    ///
    /// ### Safety
    ///
    /// No other caller may write the same bytes concurrently (e.g. hold the object lock).
    pub unsafe fn read_at(&self, offset: usize, dest: &mut [u8]) {
        self.check_bounds(offset, dest.len());
        copy_nonoverlapping(
            self.as_ptr().as_ptr().add(offset),
            dest.as_mut_ptr(),
            dest.len(),
        );
    }

    /// Copies `src` into this region starting at `offset`.
    ///
    /// ### Safety
    ///
    /// No other caller may read or write the same bytes concurrently (e.g. hold the object lock).
    pub unsafe fn write_at(&self, offset: usize, src: &[u8]) {
        self.check_bounds(offset, src.len());
        copy_nonoverlapping(src.as_ptr(), self.as_ptr().as_ptr().add(offset), src.len());
    }

    fn check_bounds(&self, offset: usize, len: usize) {
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.len()),
            "illegal access, offset: {}, len: {}, region size: {}",
            offset,
            len,
            self.len()
        );
    }
}

impl<P: MemoryProviderModule, S: AddressSpaceModule> Drop for MappedRegion<P, S> {
    fn drop(&mut self) {
        self.address_space.unmap_range(self.caller, self.range);
    }
}
