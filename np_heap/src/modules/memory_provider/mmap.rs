use core::ptr::{null_mut, NonNull};

use libc::{
    c_void, mmap, munmap, sysconf, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE,
    _SC_PAGE_SIZE,
};
use log::error;

use super::{AllocError, MemoryProviderModule};

/// Provides anonymous, page aligned memory blocks directly from the operating system
pub struct MMapMemoryProvider {
    page_size: usize,
}

impl MMapMemoryProvider {
    pub fn new() -> Self {
        Self {
            page_size: unsafe { sysconf(_SC_PAGE_SIZE) as usize },
        }
    }
}

impl Default for MMapMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProviderModule for MMapMemoryProvider {
    fn map_block(&self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
        if size == 0 {
            return Err(AllocError { size });
        }

        let base_ptr = unsafe {
            mmap(
                null_mut(),
                size,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if base_ptr == MAP_FAILED {
            return Err(AllocError { size });
        }

        if base_ptr as usize % align != 0 {
            // mmap only guarantees alignment to the system page size
            unsafe { munmap(base_ptr, size) };
            return Err(AllocError { size });
        }

        NonNull::new(base_ptr as *mut u8).ok_or(AllocError { size })
    }

    unsafe fn unmap_block(&self, ptr: NonNull<u8>, size: usize, _align: usize) {
        let code = munmap(ptr.as_ptr() as *mut c_void, size);

        if code != 0 {
            error!("Could not unmap {} bytes at {:p}", size, ptr);
        }
    }

    fn min_size(&self) -> usize {
        self.page_size
    }
}
