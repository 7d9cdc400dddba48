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

use log::warn;
use parking_lot::{Condvar, Mutex};

use crate::CallerId;

/// Outcome of [`ObjectLock::release`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseError {
    /// Nobody holds this lock
    NotHeld,

    /// Somebody else holds this lock
    HeldBy(CallerId),
}

/// Mutual exclusion that is acquired and released by two separate calls.
///
/// There is no guard: whoever calls `acquire` keeps the lock until some later
/// call to `release`, possibly from another thread.
/// The lock is not reentrant, acquiring it twice without a release in between
/// blocks forever.
pub(crate) struct ObjectLock {
    holder: Mutex<Option<CallerId>>,
    released: Condvar,
}

impl ObjectLock {
    pub(crate) fn new() -> Self {
        Self {
            holder: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    /// Blocks until this lock is free, then takes it for `caller`
    pub(crate) fn acquire(&self, caller: CallerId) {
        let mut holder = self.holder.lock();
        while holder.is_some() {
            self.released.wait(&mut holder);
        }

        *holder = Some(caller);
    }

    /// Takes this lock for `caller` if it is free.
    pub(crate) fn try_acquire(&self, caller: CallerId) -> bool {
        let mut holder = self.holder.lock();
        if holder.is_some() {
            return false;
        }

        *holder = Some(caller);
        true
    }

    /// Releases this lock and wakes up one waiter.
    ///
    /// If `owner_only` is set, only the caller that acquired the lock may release it.
    pub(crate) fn release(&self, caller: CallerId, owner_only: bool) -> Result<(), ReleaseError> {
        let mut holder = self.holder.lock();

        match *holder {
            None => return Err(ReleaseError::NotHeld),
            Some(curr) if owner_only && curr != caller => return Err(ReleaseError::HeldBy(curr)),
            Some(curr) if curr != caller => {
                warn!("{}::release: releasing lock held by {}", caller, curr);
            }
            Some(_) => {}
        }

        *holder = None;
        drop(holder);

        self.released.notify_one();
        Ok(())
    }

    pub(crate) fn holder(&self) -> Option<CallerId> {
        *self.holder.lock()
    }

    pub(crate) fn is_held_by(&self, caller: CallerId) -> bool {
        self.holder() == Some(caller)
    }
}
