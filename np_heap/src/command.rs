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

use core::mem::size_of;

use log::{debug, warn};
use memoffset::offset_of;
use static_assertions::const_assert_eq;
use thiserror::Error;

use crate::{
    modules::{address_space::AddressSpaceModule, memory_provider::MemoryProviderModule},
    CallerId, HeapError, NPHeap,
};

/// Request payload a caller passes for every command.
///
/// Only the fields relevant to an operation are read: all of them use `offset`,
/// `op`, `size` and `data` are carried for compatibility with the caller side struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NPHeapCmd {
    pub op: u64,
    pub offset: u64,
    pub size: u64,
    pub data: u64,
}

/// Size of the in memory representation of [`NPHeapCmd`]
pub const CMD_SIZE: usize = size_of::<NPHeapCmd>();

const_assert_eq!(CMD_SIZE, 32);

/// The payload could not be read from the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request payload has {len} bytes, expected {expected}")]
pub struct TransportFault {
    pub len: usize,
    pub expected: usize,
}

impl NPHeapCmd {
    pub fn new(offset: u64, size: u64) -> Self {
        Self {
            offset,
            size,
            ..Default::default()
        }
    }

    /// Decodes a request from its in memory representation (native endianness)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransportFault> {
        if bytes.len() < CMD_SIZE {
            return Err(TransportFault {
                len: bytes.len(),
                expected: CMD_SIZE,
            });
        }

        let read_field = |offset: usize| {
            let mut field = [0u8; size_of::<u64>()];
            field.copy_from_slice(&bytes[offset..offset + size_of::<u64>()]);
            u64::from_ne_bytes(field)
        };

        Ok(Self {
            op: read_field(offset_of!(NPHeapCmd, op)),
            offset: read_field(offset_of!(NPHeapCmd, offset)),
            size: read_field(offset_of!(NPHeapCmd, size)),
            data: read_field(offset_of!(NPHeapCmd, data)),
        })
    }

    /// In memory representation of this request (native endianness)
    pub fn to_bytes(&self) -> [u8; CMD_SIZE] {
        let mut bytes = [0u8; CMD_SIZE];

        let mut write_field = |offset: usize, value: u64| {
            bytes[offset..offset + size_of::<u64>()].copy_from_slice(&value.to_ne_bytes());
        };

        write_field(offset_of!(NPHeapCmd, op), self.op);
        write_field(offset_of!(NPHeapCmd, offset), self.offset);
        write_field(offset_of!(NPHeapCmd, size), self.size);
        write_field(offset_of!(NPHeapCmd, data), self.data);

        bytes
    }
}

const IOC_TYPE: u32 = b'N' as u32;

/// ioctl style command number (read/write direction, type `N`, payload size)
const fn iowr(nr: u32) -> u32 {
    const IOC_READ_WRITE: u32 = 3;
    (IOC_READ_WRITE << 30) | ((CMD_SIZE as u32) << 16) | (IOC_TYPE << 8) | nr
}

/// Commands that are dispatched through [`dispatch`].
///
/// Mapping is not a command, the transport calls [`NPHeap::map_at_page_offset`]
/// for mapping requests directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Lock,
    Unlock,
    GetSize,
    Delete,
}

impl Operation {
    pub const fn code(self) -> u32 {
        match self {
            Operation::Lock => iowr(0x01),
            Operation::Unlock => iowr(0x02),
            Operation::GetSize => iowr(0x03),
            Operation::Delete => iowr(0x04),
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        [
            Operation::Lock,
            Operation::Unlock,
            Operation::GetSize,
            Operation::Delete,
        ]
        .into_iter()
        .find(|op| op.code() == code)
    }
}

/// Executes the command `code` with the raw request `payload` on behalf of `caller`.
///
/// Returns a non negative value on success (0, or the size for `GetSize`)
/// and a negative errno otherwise.
pub fn dispatch<P: MemoryProviderModule, S: AddressSpaceModule>(
    heap: &NPHeap<P, S>,
    caller: CallerId,
    code: u32,
    payload: &[u8],
) -> i64 {
    let op = match Operation::from_code(code) {
        Some(op) => op,
        None => {
            debug!("{}::dispatch: unknown command {:#x}", caller, code);
            return -(libc::ENOTTY as i64);
        }
    };

    let cmd = match NPHeapCmd::from_bytes(payload) {
        Ok(cmd) => cmd,
        Err(err) => {
            warn!("{}::dispatch: {:?}: {}", caller, op, err);
            return -(libc::EFAULT as i64);
        }
    };

    let res = match op {
        Operation::Lock => heap.lock(caller, cmd.offset).map(|_| 0),
        Operation::Unlock => heap.unlock(caller, cmd.offset).map(|_| 0),
        Operation::GetSize => heap
            .get_size(cmd.offset)
            .map(|size| i64::try_from(size).unwrap_or(i64::MAX)),
        Operation::Delete => heap.delete(caller, cmd.offset).map(|_| 0),
    };

    res.unwrap_or_else(|err: HeapError| -(err.errno() as i64))
}
