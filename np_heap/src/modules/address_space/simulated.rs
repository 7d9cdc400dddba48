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

use std::{collections::BTreeMap, collections::HashMap, ptr::NonNull};

use log::{trace, warn};
use parking_lot::Mutex;

use super::{AddressSpaceModule, MapError, VirtualRange};
use crate::CallerId;

#[derive(Debug, Clone, Copy)]
struct Mapping {
    len: usize,
    backing: usize,
}

/// Keeps a page table like bookkeeping of which virtual ranges of which caller
/// point to which backing memory.
///
/// Virtual addresses are only translated, never dereferenced, so this is usable
/// to run the heap in a single process (tests, playground, user space transports).
pub struct SimulatedAddressSpace {
    page_size: usize,

    /// caller -> (start of range -> mapping)
    mappings: Mutex<HashMap<CallerId, BTreeMap<usize, Mapping>>>,
}

impl SimulatedAddressSpace {
    pub fn new(page_size: usize) -> Self {
        assert!(page_size.is_power_of_two(), "page size has to be a power of two");

        Self {
            page_size,
            mappings: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a virtual address of `caller` to the backing memory it points to
    pub fn translate(&self, caller: CallerId, addr: usize) -> Option<NonNull<u8>> {
        let mappings = self.mappings.lock();
        let (start, mapping) = mappings.get(&caller)?.range(..=addr).next_back()?;

        let offset = addr - start;
        if offset >= mapping.len {
            return None;
        }

        NonNull::new((mapping.backing + offset) as *mut u8)
    }

    /// Number of ranges that are currently mapped for `caller`
    pub fn mapping_count(&self, caller: CallerId) -> usize {
        self.mappings
            .lock()
            .get(&caller)
            .map(|ranges| ranges.len())
            .unwrap_or(0)
    }
}

impl AddressSpaceModule for SimulatedAddressSpace {
    fn map_range(
        &self,
        caller: CallerId,
        range: VirtualRange,
        backing: NonNull<u8>,
    ) -> Result<(), MapError> {
        if range.len == 0 {
            return Err(MapError::EmptyRange);
        }
        if range.start % self.page_size != 0 || range.len % self.page_size != 0 {
            return Err(MapError::Unaligned);
        }
        if range.end().is_none() {
            return Err(MapError::OutOfBounds);
        }

        let mut mappings = self.mappings.lock();
        let ranges = mappings.entry(caller).or_default();

        // only the closest mapping below the end of `range` can overlap,
        // as existing mappings never overlap each other
        if let Some((start, mapping)) = ranges.range(..range.start + range.len).next_back() {
            if range.overlaps(&VirtualRange::new(*start, mapping.len)) {
                return Err(MapError::Overlap);
            }
        }

        trace!(
            "{}::map_range: [{:#x}, {:#x}) -> {:p}",
            caller,
            range.start,
            range.start + range.len,
            backing
        );

        ranges.insert(
            range.start,
            Mapping {
                len: range.len,
                backing: backing.as_ptr() as usize,
            },
        );
        Ok(())
    }

    fn unmap_range(&self, caller: CallerId, range: VirtualRange) {
        let mut mappings = self.mappings.lock();

        let removed = mappings
            .get_mut(&caller)
            .and_then(|ranges| ranges.remove(&range.start));

        if mappings.get(&caller).is_some_and(|ranges| ranges.is_empty()) {
            mappings.remove(&caller);
        }

        if removed.is_none() {
            warn!(
                "{}::unmap_range: no mapping starts at {:#x}",
                caller, range.start
            );
        }
    }
}

#[cfg(test)]
mod test {
    use core::ptr::NonNull;

    use super::SimulatedAddressSpace;
    use crate::{
        modules::address_space::{AddressSpaceModule, MapError, VirtualRange},
        CallerId,
    };

    const PAGE: usize = 4096;

    #[test]
    fn test_translate() {
        let space = SimulatedAddressSpace::new(PAGE);
        let mut backing = vec![0u8; 2 * PAGE];
        let backing_ptr = NonNull::new(backing.as_mut_ptr()).unwrap();

        let caller = CallerId(1);
        space
            .map_range(caller, VirtualRange::new(0x10000, 2 * PAGE), backing_ptr)
            .unwrap();

        assert_eq!(
            space.translate(caller, 0x10000 + 5).unwrap().as_ptr(),
            unsafe { backing.as_mut_ptr().add(5) }
        );
        assert!(space.translate(caller, 0x10000 + 2 * PAGE).is_none());
        assert!(space.translate(caller, 0x10000 - 1).is_none());

        // other callers have their own address space
        assert!(space.translate(CallerId(2), 0x10000).is_none());
        assert_eq!(space.mapping_count(caller), 1);

        space.unmap_range(caller, VirtualRange::new(0x10000, 2 * PAGE));
        assert_eq!(space.mapping_count(caller), 0);
        assert!(space.translate(caller, 0x10000).is_none());
    }

    #[test]
    fn test_invalid_ranges() {
        let space = SimulatedAddressSpace::new(PAGE);
        let mut backing = vec![0u8; 4 * PAGE];
        let backing_ptr = NonNull::new(backing.as_mut_ptr()).unwrap();
        let caller = CallerId(7);

        assert_eq!(
            space.map_range(caller, VirtualRange::new(0x10000, 0), backing_ptr),
            Err(MapError::EmptyRange)
        );
        assert_eq!(
            space.map_range(caller, VirtualRange::new(0x10001, PAGE), backing_ptr),
            Err(MapError::Unaligned)
        );
        assert_eq!(
            space.map_range(caller, VirtualRange::new(0x10000, PAGE + 1), backing_ptr),
            Err(MapError::Unaligned)
        );
        assert_eq!(
            space.map_range(caller, VirtualRange::new(usize::MAX - PAGE + 1, PAGE), backing_ptr),
            Err(MapError::OutOfBounds)
        );
        assert_eq!(space.mapping_count(caller), 0);
    }

    #[test]
    fn test_overlap() {
        let space = SimulatedAddressSpace::new(PAGE);
        let mut backing = vec![0u8; 4 * PAGE];
        let backing_ptr = NonNull::new(backing.as_mut_ptr()).unwrap();
        let caller = CallerId(3);

        space
            .map_range(caller, VirtualRange::new(0x10000, 2 * PAGE), backing_ptr)
            .unwrap();

        // starts inside
        assert_eq!(
            space.map_range(caller, VirtualRange::new(0x10000 + PAGE, 2 * PAGE), backing_ptr),
            Err(MapError::Overlap)
        );
        // ends inside
        assert_eq!(
            space.map_range(caller, VirtualRange::new(0x10000 - PAGE, 2 * PAGE), backing_ptr),
            Err(MapError::Overlap)
        );
        // covers completely
        assert_eq!(
            space.map_range(caller, VirtualRange::new(0x10000 - PAGE, 4 * PAGE), backing_ptr),
            Err(MapError::Overlap)
        );

        // directly adjacent is fine
        space
            .map_range(caller, VirtualRange::new(0x10000 + 2 * PAGE, PAGE), backing_ptr)
            .unwrap();
        space
            .map_range(caller, VirtualRange::new(0x10000 - PAGE, PAGE), backing_ptr)
            .unwrap();

        // same range for another caller is fine as well
        space
            .map_range(CallerId(4), VirtualRange::new(0x10000, 2 * PAGE), backing_ptr)
            .unwrap();

        assert_eq!(space.mapping_count(caller), 3);
    }
}
