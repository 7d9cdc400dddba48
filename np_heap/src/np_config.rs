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

use static_assertions::const_assert;

pub const DEFAULT_PAGE_SIZE: usize = 4096;

const_assert!(DEFAULT_PAGE_SIZE.is_power_of_two());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NPConfig {
    /// Granularity of object keys and of every mapping.
    ///
    /// Has to be a power of two and a multiple of the memory provider's `min_size()`.
    pub page_size: usize,

    /// If set, `map` and `delete` require the caller to hold the object lock
    /// and only the holder may `unlock` it.
    ///
    /// Otherwise these operations run unsynchronized with the object lock
    /// and coordination is left to the callers.
    pub strict_locking: bool,
}

impl NPConfig {
    /// Default configuration with the page size reported by the operating system
    pub fn from_system() -> Self {
        Self {
            page_size: system_page_size(),
            ..Default::default()
        }
    }
}

#[cfg(unix)]
fn system_page_size() -> usize {
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) };

    if page_size > 0 && (page_size as usize).is_power_of_two() {
        page_size as usize
    } else {
        DEFAULT_PAGE_SIZE
    }
}

#[cfg(not(unix))]
fn system_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for NPConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            strict_locking: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::NPConfig;

    #[test]
    fn test_from_system() {
        let config = NPConfig::from_system();

        assert!(config.page_size.is_power_of_two());
        assert!(!config.strict_locking);

        #[cfg(unix)]
        assert_eq!(config.page_size, unsafe {
            libc::sysconf(libc::_SC_PAGE_SIZE) as usize
        });

        #[cfg(not(unix))]
        assert_eq!(config.page_size, super::DEFAULT_PAGE_SIZE);
    }
}
