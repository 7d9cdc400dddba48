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

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::{Mutex, MutexGuard};

use crate::{
    modules::memory_provider::MemoryProviderModule, object_lock::ObjectLock, storage::Storage,
    ObjectKey,
};

pub(crate) type StorageSlot<P> = Option<Arc<Storage<P>>>;

/// State of one object: its caller held lock, its size and its backing storage.
///
/// Records are never removed from the registry, deleting an object only
/// releases its storage.
pub(crate) struct ObjectRecord<P: MemoryProviderModule> {
    key: ObjectKey,
    lock: ObjectLock,

    /// Only held to inspect or replace the storage, never while waiting for
    /// the object lock, so every holder leaves it in bounded time.
    storage: Mutex<StorageSlot<P>>,

    /// Length of the storage, 0 if there is none.
    /// Can be read without any lock.
    size: AtomicU64,
}

impl<P: MemoryProviderModule> ObjectRecord<P> {
    pub(crate) fn new(key: ObjectKey) -> Self {
        Self {
            key,
            lock: ObjectLock::new(),
            storage: Mutex::new(None),
            size: AtomicU64::new(0),
        }
    }

    pub(crate) fn key(&self) -> ObjectKey {
        self.key
    }

    pub(crate) fn lock(&self) -> &ObjectLock {
        &self.lock
    }

    pub(crate) fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Grants exclusive access to the storage slot of this object
    pub(crate) fn storage(&self) -> StorageGuard<'_, P> {
        StorageGuard {
            record: self,
            slot: self.storage.lock(),
        }
    }
}

/// Exclusive access to the storage slot of an [`ObjectRecord`].
///
/// Keeps `size` in sync with the slot.
pub(crate) struct StorageGuard<'a, P: MemoryProviderModule> {
    record: &'a ObjectRecord<P>,
    slot: MutexGuard<'a, StorageSlot<P>>,
}

impl<P: MemoryProviderModule> StorageGuard<'_, P> {
    pub(crate) fn current(&self) -> Option<&Arc<Storage<P>>> {
        self.slot.as_ref()
    }

    /// Publishes `storage` as backing of this object
    pub(crate) fn install(&mut self, storage: Arc<Storage<P>>) {
        debug_assert!(self.slot.is_none(), "storage is never replaced implicitly");

        let len = storage.len() as u64;
        *self.slot = Some(storage);
        self.record.size.store(len, Ordering::Release);
    }

    /// Removes the storage of this object and returns it
    pub(crate) fn take(&mut self) -> Option<Arc<Storage<P>>> {
        let storage = self.slot.take();
        self.record.size.store(0, Ordering::Release);
        storage
    }
}
