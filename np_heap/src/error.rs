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

use thiserror::Error;

use crate::modules::{address_space::MapError, memory_provider::AllocError};

/// Errors returned by the operations of [`crate::NPHeap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
    /// No object was ever registered for this key
    #[error("no object registered for key {0}")]
    NotFound(u64),

    /// Either the registry could not grow or no backing memory was left
    #[error("out of memory")]
    OutOfMemory,

    /// The address space refused to establish the mapping
    #[error("mapping failed: {0}")]
    MapFailed(#[from] MapError),

    /// The object lock is held by another caller (only returned by `try_lock`)
    #[error("object {0} is locked")]
    Busy(u64),

    #[error("invalid mapping length {0}")]
    InvalidLength(u64),

    /// Only raised with `NPConfig::strict_locking`
    #[error("caller does not hold the lock of object {0}")]
    NotLockHolder(u64),
}

impl From<AllocError> for HeapError {
    fn from(_: AllocError) -> Self {
        HeapError::OutOfMemory
    }
}

impl HeapError {
    /// Positive errno value that represents this error on the wire
    pub fn errno(&self) -> i32 {
        match self {
            HeapError::NotFound(_) => libc::ENOENT,
            HeapError::OutOfMemory => libc::ENOMEM,
            HeapError::MapFailed(_) => libc::EAGAIN,
            HeapError::Busy(_) => libc::EAGAIN,
            HeapError::InvalidLength(_) => libc::EINVAL,
            HeapError::NotLockHolder(_) => libc::EPERM,
        }
    }

    /// Whether trying the same request again later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HeapError::OutOfMemory | HeapError::MapFailed(_) | HeapError::Busy(_)
        )
    }
}
