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

use core::fmt;

/// Page granular identifier of an object.
///
/// All byte offsets inside the same page resolve to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(u64);

impl ObjectKey {
    pub const fn from_offset(offset: u64, page_size: usize) -> Self {
        ObjectKey(offset / page_size as u64)
    }

    /// Uses a page offset (e.g. `vm_pgoff` of a mapping request) directly as key
    pub const fn from_page_offset(page_offset: u64) -> Self {
        ObjectKey(page_offset)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// First byte offset that resolves to this key
    pub const fn base_offset(&self, page_size: usize) -> u64 {
        self.0 * page_size as u64
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
