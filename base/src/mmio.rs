// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Read-only mappings of memory mapped hardware registers.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::path::PathBuf;
use std::ptr::null_mut;

use remain::sorted;
use thiserror::Error;

const DEV_MEM: &str = "/dev/mem";

#[sorted]
#[derive(Error, Debug)]
pub enum MmioError {
    /// The requested physical range is empty or cannot be expressed as a file offset.
    #[error("invalid register range {addr:#x}+{len:#x}")]
    InvalidAddress { addr: u64, len: usize },
    /// A read fell outside the mapping or was not naturally aligned.
    #[error("invalid register offset {0:#x}")]
    InvalidOffset(usize),
    #[error("failed to mmap register range: {0}")]
    Mmap(io::Error),
    #[error("failed to open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
}

pub type MmioResult<T> = std::result::Result<T, MmioError>;

/// Returns the system page size in bytes.
pub fn pagesize() -> usize {
    // SAFETY:
    // Trivially safe: sysconf only reads a system constant.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

/// A read-only mapping of `len` bytes of physical address space.
///
/// The mapping is released when the region is dropped.
#[derive(Debug)]
pub struct MmioRegion {
    base: *mut u8,
    map_len: usize,
    // Distance from `base` (page aligned) to the first requested byte.
    start: usize,
    len: usize,
}

// SAFETY:
// The region is only ever read through volatile loads and owns its mapping exclusively.
unsafe impl Send for MmioRegion {}
// SAFETY:
// See `Send`; concurrent volatile reads of device memory are allowed.
unsafe impl Sync for MmioRegion {}

impl MmioRegion {
    /// Maps `len` bytes starting at physical address `addr` through `/dev/mem`.
    pub fn map(addr: u64, len: usize) -> MmioResult<MmioRegion> {
        MmioRegion::map_file(Path::new(DEV_MEM), addr, len)
    }

    /// Maps `len` bytes at byte offset `addr` of the file at `path`.
    ///
    /// `addr` does not need to be page aligned.
    pub fn map_file(path: &Path, addr: u64, len: usize) -> MmioResult<MmioRegion> {
        let invalid = || MmioError::InvalidAddress { addr, len };
        if len == 0 {
            return Err(invalid());
        }

        let page_mask = pagesize() as u64 - 1;
        let page_base = addr & !page_mask;
        let start = (addr - page_base) as usize;
        let map_len = start.checked_add(len).ok_or_else(invalid)?;
        let offset: libc::off_t = page_base.try_into().map_err(|_| invalid())?;

        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .map_err(|source| MmioError::Open {
                path: path.to_owned(),
                source,
            })?;

        // SAFETY:
        // A fresh shared read-only mapping is requested at an address chosen by the kernel, so no
        // existing memory is affected. The result is checked before use.
        let base = unsafe {
            libc::mmap(
                null_mut(),
                map_len,
                libc::PROT_READ,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                offset,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(MmioError::Mmap(io::Error::last_os_error()));
        }

        Ok(MmioRegion {
            base: base as *mut u8,
            map_len,
            start,
            len,
        })
    }

    /// Size of the requested range in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads the 32-bit register at `offset` bytes from the start of the requested range.
    pub fn read_u32(&self, offset: usize) -> MmioResult<u32> {
        let end = offset
            .checked_add(std::mem::size_of::<u32>())
            .ok_or(MmioError::InvalidOffset(offset))?;
        let pos = self.start + offset;
        if end > self.len || pos % std::mem::align_of::<u32>() != 0 {
            return Err(MmioError::InvalidOffset(offset));
        }

        // SAFETY:
        // `pos..pos + 4` lies inside the live mapping and `base` is page aligned, so the pointer is
        // valid and aligned for a u32 read.
        let value = unsafe { std::ptr::read_volatile(self.base.add(pos) as *const u32) };
        Ok(value)
    }
}

impl Drop for MmioRegion {
    fn drop(&mut self) {
        // SAFETY:
        // `base` and `map_len` describe a mapping created in `map_file` that nothing else
        // references.
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.map_len);
        }
    }
}
