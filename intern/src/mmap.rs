//! Anonymous memory mappings backing slabs.
//!
//! Each slab owns one private anonymous mapping obtained directly from the
//! operating system. Dropping the mapping returns the pages with `munmap`,
//! which is how emptied slabs give memory back.

use std::ptr::NonNull;

/// An anonymous, page-aligned, read/write memory region.
pub(crate) struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
}

impl Mapping {
    /// Map `len` bytes of zeroed anonymous memory.
    pub fn new(len: usize) -> Result<Self, std::io::Error> {
        if len == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "cannot map zero bytes",
            ));
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(std::io::Error::last_os_error());
        }

        Ok(Self {
            // SAFETY: mmap returned a non-MAP_FAILED pointer, which is never null.
            ptr: unsafe { NonNull::new_unchecked(ptr as *mut u8) },
            len,
        })
    }

    /// Base pointer of the mapping (page-aligned).
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Mapped length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        unsafe {
            let result = libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
            debug_assert_eq!(result, 0, "munmap failed");
        }
    }
}

// Safety: the mapping is raw memory owned exclusively by this handle.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_and_write() {
        let map = Mapping::new(4096).expect("mapping failed");
        assert_eq!(map.len(), 4096);
        unsafe {
            std::ptr::write_volatile(map.as_ptr(), 42);
            assert_eq!(std::ptr::read_volatile(map.as_ptr()), 42);
        }
    }

    #[test]
    fn test_zero_size_fails() {
        assert!(Mapping::new(0).is_err());
    }

    #[test]
    fn test_mapping_is_zeroed() {
        let map = Mapping::new(512).expect("mapping failed");
        let bytes = unsafe { std::slice::from_raw_parts(map.as_ptr(), map.len()) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_distinct_mappings() {
        let a = Mapping::new(4096).expect("mapping failed");
        let b = Mapping::new(4096).expect("mapping failed");
        assert_ne!(a.as_ptr(), b.as_ptr());
    }
}
