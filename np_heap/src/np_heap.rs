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

use std::sync::Arc;

use log::{debug, info, trace, warn};

use crate::{
    mapped_region::MappedRegion,
    modules::{
        address_space::{AddressSpaceModule, MapError, VirtualRange},
        memory_provider::MemoryProviderModule,
    },
    object_lock::ReleaseError,
    object_record::ObjectRecord,
    object_registry::ObjectRegistry,
    storage::Storage,
    util::checked_round_up_to_nearest,
    CallerId, HeapError, NPConfig, ObjectKey,
};

/// Shared heap of lazily backed objects.
///
/// Objects are addressed by byte offsets, every offset inside the same page
/// refers to the same object. An object gets its backing memory on the first `map`
/// and keeps it until it is deleted.
///
/// `lock` and `unlock` form a critical section that can span any number of calls.
/// All other operations never wait for the object lock.
pub struct NPHeap<P: MemoryProviderModule, S: AddressSpaceModule> {
    config: NPConfig,
    registry: ObjectRegistry<P>,
    memory_provider: Arc<P>,
    address_space: Arc<S>,
}

impl<P: MemoryProviderModule, S: AddressSpaceModule> NPHeap<P, S> {
    pub fn new(config: NPConfig, memory_provider: P, address_space: S) -> Self {
        assert!(
            config.page_size.is_power_of_two(),
            "page size has to be a power of two"
        );
        assert!(
            config.page_size % memory_provider.min_size() == 0,
            "page size has to be a multiple of the memory provider's block size"
        );

        info!(
            "Created heap with page_size={} bytes, strict_locking={}",
            config.page_size, config.strict_locking
        );

        Self {
            config,
            registry: ObjectRegistry::new(),
            memory_provider: Arc::new(memory_provider),
            address_space: Arc::new(address_space),
        }
    }

    pub fn config(&self) -> &NPConfig {
        &self.config
    }

    pub fn memory_provider(&self) -> &P {
        &self.memory_provider
    }

    pub fn address_space(&self) -> &S {
        &self.address_space
    }

    /// Number of objects that were ever referenced.
    /// Deleting an object does not decrease this number.
    pub fn object_count(&self) -> usize {
        self.registry.len()
    }

    pub fn key_of(&self, offset: u64) -> ObjectKey {
        ObjectKey::from_offset(offset, self.config.page_size)
    }

    /// Blocks until `caller` holds the lock of the object at `offset`.
    ///
    /// Creates the object if it was never referenced before.
    /// The lock is held until `unlock` is called for the same object.
    pub fn lock(&self, caller: CallerId, offset: u64) -> Result<(), HeapError> {
        let key = self.key_of(offset);
        trace!("{}::lock: enter, key = {}", caller, key);

        let record = self.registry.find_or_create(key)?;
        record.lock().acquire(caller);

        debug!("{}::lock: locked object {}", caller, key);
        Ok(())
    }

    /// Same as `lock`, but fails with `Busy` instead of waiting for the current holder
    pub fn try_lock(&self, caller: CallerId, offset: u64) -> Result<(), HeapError> {
        let key = self.key_of(offset);

        let record = self.registry.find_or_create(key)?;
        if !record.lock().try_acquire(caller) {
            trace!("{}::try_lock: object {} is locked", caller, key);
            return Err(HeapError::Busy(key.as_u64()));
        }

        debug!("{}::try_lock: locked object {}", caller, key);
        Ok(())
    }

    /// Releases the lock of the object at `offset` and wakes up one waiting caller.
    pub fn unlock(&self, caller: CallerId, offset: u64) -> Result<(), HeapError> {
        let key = self.key_of(offset);
        let record = self.find(caller, key, "unlock")?;

        match record.lock().release(caller, self.config.strict_locking) {
            Ok(()) => {
                debug!("{}::unlock: unlocked object {}", caller, key);
                Ok(())
            }
            Err(ReleaseError::NotHeld) if !self.config.strict_locking => {
                warn!("{}::unlock: object {} was not locked", caller, key);
                Ok(())
            }
            Err(ReleaseError::NotHeld) => Err(HeapError::NotLockHolder(key.as_u64())),
            Err(ReleaseError::HeldBy(holder)) => {
                warn!(
                    "{}::unlock: object {} is locked by {}",
                    caller, key, holder
                );
                Err(HeapError::NotLockHolder(key.as_u64()))
            }
        }
    }

    /// Current size of the object at `offset` in bytes, 0 if it has no storage.
    ///
    /// Does not wait for the object lock, so the result may already be outdated
    /// if another caller maps or deletes this object concurrently.
    pub fn get_size(&self, offset: u64) -> Result<u64, HeapError> {
        let key = self.key_of(offset);

        match self.registry.find(key) {
            Some(record) => Ok(record.size()),
            None => {
                debug!("get_size: no object for key {}", key);
                Err(HeapError::NotFound(key.as_u64()))
            }
        }
    }

    /// Releases the storage of the object at `offset`.
    ///
    /// The object itself stays registered with size 0 and the next `map`
    /// allocates fresh storage. Deleting an object without storage does nothing.
    /// Existing mappings keep their bytes until they are dropped.
    pub fn delete(&self, caller: CallerId, offset: u64) -> Result<(), HeapError> {
        let key = self.key_of(offset);
        let record = self.find(caller, key, "delete")?;
        self.check_lock_holder(caller, &record)?;

        let released = record.storage().take();

        match released {
            Some(storage) => debug!(
                "{}::delete: released {} bytes of object {}",
                caller,
                storage.len(),
                key
            ),
            None => trace!("{}::delete: object {} has no storage", caller, key),
        }

        Ok(())
    }

    /// Maps the object at `offset` into `caller`'s virtual range starting at `target_start`.
    ///
    /// `length` is rounded up to the page size. On the first mapping the object gets
    /// storage of that size, every further mapping shows the same bytes and may not be
    /// bigger than the existing storage.
    /// If mapping fresh storage fails, the storage is released again and the object
    /// stays without storage.
    pub fn map(
        &self,
        caller: CallerId,
        offset: u64,
        target_start: usize,
        length: u64,
    ) -> Result<MappedRegion<P, S>, HeapError> {
        self.map_object(caller, self.key_of(offset), target_start, length)
    }

    /// Same as `map`, but addresses the object by its page offset
    /// (the unit in which mapping requests carry their offset)
    pub fn map_at_page_offset(
        &self,
        caller: CallerId,
        page_offset: u64,
        target_start: usize,
        length: u64,
    ) -> Result<MappedRegion<P, S>, HeapError> {
        self.map_object(
            caller,
            ObjectKey::from_page_offset(page_offset),
            target_start,
            length,
        )
    }

    fn map_object(
        &self,
        caller: CallerId,
        key: ObjectKey,
        target_start: usize,
        length: u64,
    ) -> Result<MappedRegion<P, S>, HeapError> {
        trace!(
            "{}::map: enter, key = {}, length = {}, target = {:#x}",
            caller,
            key,
            length,
            target_start
        );

        let map_len = usize::try_from(length)
            .ok()
            .filter(|len| *len > 0)
            .and_then(|len| checked_round_up_to_nearest(len, self.config.page_size))
            .ok_or(HeapError::InvalidLength(length))?;
        let range = VirtualRange::new(target_start, map_len);

        let record = self.registry.find_or_create(key)?;
        self.check_lock_holder(caller, &record)?;

        let mut slot = record.storage();
        let existing = slot.current().cloned();

        if let Some(storage) = existing {
            // mapping existing storage does not touch the slot
            drop(slot);

            if map_len > storage.len() {
                warn!(
                    "{}::map: requested {} bytes, but object {} only has {} bytes",
                    caller,
                    map_len,
                    key,
                    storage.len()
                );
                return Err(MapError::ExceedsStorage {
                    requested: map_len,
                    available: storage.len(),
                }
                .into());
            }

            self.address_space
                .map_range(caller, range, storage.as_ptr())
                .map_err(|err| {
                    warn!("{}::map: remapping object {} failed: {}", caller, key, err);
                    err
                })?;

            debug!("{}::map: mapped existing object {}", caller, key);
            return Ok(self.region(key, caller, range, storage));
        }

        // the slot stays locked until the fresh storage is mapped and published,
        // so concurrent first mappings of this object agree on one allocation
        let storage = Arc::new(
            Storage::allocate(&self.memory_provider, map_len, self.config.page_size).map_err(
                |err| {
                    warn!("{}::map: object {}: {}", caller, key, err);
                    err
                },
            )?,
        );

        if let Err(err) = self
            .address_space
            .map_range(caller, range, storage.as_ptr())
        {
            // `storage` is dropped here, which hands the block back to the provider
            warn!("{}::map: first mapping of object {} failed: {}", caller, key, err);
            return Err(err.into());
        }

        slot.install(storage.clone());
        debug!(
            "{}::map: allocated and mapped {} bytes for object {}",
            caller, map_len, key
        );

        Ok(self.region(key, caller, range, storage))
    }

    fn region(
        &self,
        key: ObjectKey,
        caller: CallerId,
        range: VirtualRange,
        storage: Arc<Storage<P>>,
    ) -> MappedRegion<P, S> {
        MappedRegion::new(key, caller, range, storage, self.address_space.clone())
    }

    fn find(
        &self,
        caller: CallerId,
        key: ObjectKey,
        operation: &str,
    ) -> Result<Arc<ObjectRecord<P>>, HeapError> {
        self.registry.find(key).ok_or_else(|| {
            debug!("{}::{}: no object for key {}", caller, operation, key);
            HeapError::NotFound(key.as_u64())
        })
    }

    fn check_lock_holder(
        &self,
        caller: CallerId,
        record: &ObjectRecord<P>,
    ) -> Result<(), HeapError> {
        if self.config.strict_locking && !record.lock().is_held_by(caller) {
            warn!(
                "{}: object {} is not locked by this caller",
                caller,
                record.key()
            );
            return Err(HeapError::NotLockHolder(record.key().as_u64()));
        }

        Ok(())
    }
}
