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

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::{
    modules::memory_provider::MemoryProviderModule, object_record::ObjectRecord, HeapError,
    ObjectKey,
};

/// Index of all objects that were ever referenced.
///
/// The registry lock is only held inside `find` and `find_or_create`.
/// Callers receive a shared handle to the record, so they never touch
/// a record's own lock or storage while holding the registry lock.
pub(crate) struct ObjectRegistry<P: MemoryProviderModule> {
    objects: Mutex<HashMap<ObjectKey, Arc<ObjectRecord<P>>>>,
}

impl<P: MemoryProviderModule> ObjectRegistry<P> {
    pub(crate) fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn find(&self, key: ObjectKey) -> Option<Arc<ObjectRecord<P>>> {
        self.objects.lock().get(&key).cloned()
    }

    /// Returns the record of `key` and creates it first if it does not exist yet.
    ///
    /// If multiple callers race to create the same key, exactly one record is inserted
    /// and all of them receive it.
    pub(crate) fn find_or_create(&self, key: ObjectKey) -> Result<Arc<ObjectRecord<P>>, HeapError> {
        let mut objects = self.objects.lock();

        if let Some(record) = objects.get(&key) {
            return Ok(record.clone());
        }

        // grow the map before creating the record, so a failed
        // insertion does not leave anything behind
        objects
            .try_reserve(1)
            .map_err(|_| HeapError::OutOfMemory)?;

        #[cfg(feature = "verbose_registry_logs")]
        log::trace!("registry: create record for key {}", key);

        let record = Arc::new(ObjectRecord::new(key));
        objects.insert(key, record.clone());

        Ok(record)
    }

    /// Number of records, which is the number of distinct keys ever referenced
    pub(crate) fn len(&self) -> usize {
        self.objects.lock().len()
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{Arc, Barrier},
        thread,
    };

    use super::ObjectRegistry;
    use crate::{modules::memory_provider::HeapMemoryProvider, ObjectKey};

    #[test]
    fn test_find_or_create() {
        let registry = ObjectRegistry::<HeapMemoryProvider>::new();
        let key = ObjectKey::from_page_offset(1);

        assert!(registry.find(key).is_none());
        assert_eq!(registry.len(), 0);

        let created = registry.find_or_create(key).unwrap();
        let found = registry.find(key).unwrap();
        let found_again = registry.find_or_create(key).unwrap();

        assert!(Arc::ptr_eq(&created, &found));
        assert!(Arc::ptr_eq(&created, &found_again));
        assert_eq!(created.key(), key);
        assert_eq!(created.size(), 0);
        assert_eq!(registry.len(), 1);

        registry.find_or_create(ObjectKey::from_page_offset(2)).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_racing_creators_share_one_record() {
        const THREADS: usize = 8;

        let registry = ObjectRegistry::<HeapMemoryProvider>::new();
        let barrier = Barrier::new(THREADS);
        let key = ObjectKey::from_page_offset(42);

        let records: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        registry.find_or_create(key).unwrap()
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for record in records.iter() {
            assert!(Arc::ptr_eq(record, &records[0]));
        }
        assert_eq!(registry.len(), 1);
    }
}
