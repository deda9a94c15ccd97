//! Read-only device handles for block scanning.
//!
//! Each worker opens its own handle; handles are never shared between
//! threads. With direct I/O enabled the file is opened with `O_DIRECT`, so
//! buffers, offsets and lengths must all respect [`BlockDevice::alignment`].

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use tracing::debug;

use crate::error::{ScanError, ScanResult};

/// Alignment assumed when the device does not report one.
pub const DEFAULT_ALIGNMENT: usize = 512;

/// `BLKSSZGET` from `<linux/fs.h>`: logical sector size of a block device.
const BLKSSZGET: libc::c_ulong = 0x1268;

/// An open, read-only handle to a block device or image file.
#[derive(Debug)]
pub struct BlockDevice {
    file: File,
    alignment: usize,
    direct_io: bool,
}

impl BlockDevice {
    /// Open `path` for reading, bypassing the page cache when `direct_io` is set.
    pub fn open(path: &Path, direct_io: bool) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(if direct_io { libc::O_DIRECT } else { 0 })
            .open(path)?;
        let alignment = logical_block_size(&file);
        debug!(path = %path.display(), direct_io, alignment, "opened device");
        Ok(Self {
            file,
            alignment,
            direct_io,
        })
    }

    /// Minimum I/O alignment in bytes.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Whether the handle was opened with `O_DIRECT`.
    pub fn is_direct(&self) -> bool {
        self.direct_io
    }

    /// Size in bytes, found by seeking to the end. Leaves the cursor at EOF.
    pub fn size(&mut self) -> std::io::Result<u64> {
        self.file.seek(SeekFrom::End(0))
    }

    /// Fails with `NotAligned` if direct I/O is on and `value` breaks the alignment.
    pub fn check_aligned(&self, value: u64) -> ScanResult<()> {
        if self.direct_io && value % self.alignment as u64 != 0 {
            return Err(ScanError::NotAligned {
                value,
                alignment: self.alignment as u64,
            });
        }
        Ok(())
    }

    /// Position the cursor at absolute `offset`.
    pub fn seek_to(&mut self, offset: u64) -> ScanResult<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map(|_| ())
            .map_err(|source| ScanError::Seek { offset, source })
    }

    /// Fill `buf` with one block using a single `read` call.
    ///
    /// Anything other than a full block is an error: short reads, EOF and
    /// `EINTR` are not retried. `offset` is only used for error reporting.
    pub fn read_block(&mut self, buf: &mut [u8], offset: u64) -> ScanResult<()> {
        match self.file.read(buf) {
            Ok(n) if n == buf.len() => Ok(()),
            Ok(n) => Err(ScanError::ShortRead {
                offset,
                expected: buf.len(),
                actual: n,
            }),
            Err(source) => Err(ScanError::Read { offset, source }),
        }
    }
}

/// Open `path` read-only and return its size in bytes.
///
/// Uses a throwaway handle; workers open their own.
pub fn probe_size(path: &Path, direct_io: bool) -> ScanResult<u64> {
    let probe = |path: &Path| -> std::io::Result<u64> { BlockDevice::open(path, direct_io)?.size() };
    probe(path).map_err(|source| ScanError::Probe {
        path: path.to_path_buf(),
        source,
    })
}

fn logical_block_size(file: &File) -> usize {
    let is_block = file
        .metadata()
        .map(|m| m.file_type().is_block_device())
        .unwrap_or(false);
    if !is_block {
        return DEFAULT_ALIGNMENT;
    }
    let mut sector: libc::c_int = 0;
    // SAFETY: BLKSSZGET writes one c_int through the pointer.
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), BLKSSZGET as _, &mut sector as *mut libc::c_int) };
    if rc == 0 && sector > 0 && (sector as usize).is_power_of_two() {
        sector as usize
    } else {
        DEFAULT_ALIGNMENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn image(blocks: usize, block: usize) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        for i in 0..blocks {
            f.write_all(&vec![i as u8; block]).unwrap();
        }
        f.flush().unwrap();
        f
    }

    #[test]
    fn regular_file_uses_default_alignment() {
        let img = image(1, 4096);
        let dev = BlockDevice::open(img.path(), false).unwrap();
        assert_eq!(dev.alignment(), DEFAULT_ALIGNMENT);
        assert!(!dev.is_direct());
    }

    #[test]
    fn probe_reports_file_size() {
        let img = image(3, 4096);
        assert_eq!(probe_size(img.path(), false).unwrap(), 3 * 4096);
    }

    #[test]
    fn probe_missing_path_is_fatal() {
        let err = probe_size(Path::new("/nonexistent/blockbench-device"), false).unwrap_err();
        assert!(matches!(err, ScanError::Probe { .. }));
        assert!(err.is_fatal_to_process());
    }

    #[test]
    fn seek_then_read_blocks() {
        let img = image(4, 1024);
        let mut dev = BlockDevice::open(img.path(), false).unwrap();
        dev.seek_to(2 * 1024).unwrap();
        let mut buf = vec![0u8; 1024];
        dev.read_block(&mut buf, 2048).unwrap();
        assert!(buf.iter().all(|&b| b == 2));
        dev.read_block(&mut buf, 3072).unwrap();
        assert!(buf.iter().all(|&b| b == 3));
    }

    #[test]
    fn read_past_end_is_short_read() {
        let img = image(1, 1024);
        let mut dev = BlockDevice::open(img.path(), false).unwrap();
        dev.seek_to(512).unwrap();
        let mut buf = vec![0u8; 1024];
        let err = dev.read_block(&mut buf, 512).unwrap_err();
        assert!(matches!(
            err,
            ScanError::ShortRead { expected: 1024, actual: 512, .. }
        ));
    }

    #[test]
    fn alignment_only_enforced_for_direct_io() {
        let img = image(1, 1024);
        let dev = BlockDevice::open(img.path(), false).unwrap();
        assert!(dev.check_aligned(100).is_ok());
    }
}
