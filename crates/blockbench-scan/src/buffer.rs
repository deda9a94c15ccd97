//! Alignment-compliant block buffers for direct I/O.
//!
//! `O_DIRECT` reads require the destination address to be aligned to the
//! device's logical sector size. `Vec<u8>` only guarantees byte alignment, so
//! block buffers are allocated through `std::alloc` with an explicit layout and
//! freed in `Drop`, which releases them on every worker exit path.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use crate::error::{ScanError, ScanResult};

/// A heap buffer of fixed length whose start address honours `align`.
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

// SAFETY: the buffer uniquely owns its allocation; no interior sharing.
unsafe impl Send for AlignedBuffer {}

impl AlignedBuffer {
    /// Allocate `len` zeroed bytes aligned to `align` (a power of two).
    pub fn new(len: usize, align: usize) -> ScanResult<Self> {
        if len == 0 {
            return Err(ScanError::InvalidConfig("block buffer length must be non-zero".into()));
        }
        let layout =
            Layout::from_size_align(len, align).map_err(|_| ScanError::Alloc { size: len, align })?;
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(ScanError::Alloc { size: len, align })?;
        Ok(Self { ptr, len, layout })
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; zero-length buffers are rejected at construction.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Alignment the buffer was allocated with.
    #[inline]
    pub fn align(&self) -> usize {
        self.layout.align()
    }

    /// Shared view of the whole buffer.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len initialized (zeroed) bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Mutable view of the whole buffer.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for len bytes and uniquely borrowed through &mut self.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with exactly this layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("len", &self.len)
            .field("align", &self.layout.align())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_aligned() {
        for align in [512usize, 4096] {
            let buf = AlignedBuffer::new(3 * align, align).unwrap();
            assert_eq!(buf.as_slice().as_ptr() as usize % align, 0);
            assert_eq!(buf.len(), 3 * align);
            assert_eq!(buf.align(), align);
        }
    }

    #[test]
    fn starts_zeroed_and_is_writable() {
        let mut buf = AlignedBuffer::new(4096, 512).unwrap();
        assert!(buf.as_slice().iter().all(|&b| b == 0));
        buf.as_mut_slice()[4095] = 0xAB;
        assert_eq!(buf.as_slice()[4095], 0xAB);
    }

    #[test]
    fn rejects_bad_layouts() {
        assert!(AlignedBuffer::new(0, 512).is_err());
        assert!(matches!(
            AlignedBuffer::new(4096, 3),
            Err(ScanError::Alloc { align: 3, .. })
        ));
    }
}
