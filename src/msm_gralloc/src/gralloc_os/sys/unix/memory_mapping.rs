// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::num::NonZeroUsize;
use std::ptr::NonNull;

use libc::c_void;
use libc::off_t;
use log::error;
use nix::sys::mman::mmap;
use nix::sys::mman::munmap;
use nix::sys::mman::MapFlags;
use nix::sys::mman::ProtFlags;

use crate::gralloc_os::descriptor::SafeDescriptor;
use crate::gralloc_utils::GrallocError;
use crate::gralloc_utils::GrallocResult;
use crate::gralloc_utils::GRALLOC_MAP_ACCESS_MASK;
use crate::gralloc_utils::GRALLOC_MAP_ACCESS_READ;
use crate::gralloc_utils::GRALLOC_MAP_ACCESS_RW;
use crate::gralloc_utils::GRALLOC_MAP_ACCESS_WRITE;

/// Wraps a shared memory mapping in the current process. Provides RAII semantics including munmap
/// when no longer needed.
#[derive(Debug)]
pub struct MemoryMapping {
    addr: NonNull<c_void>,
    size: usize,
}

// The mapping is plain shared memory; the raw pointer is only handed out as an address.
unsafe impl Send for MemoryMapping {}
unsafe impl Sync for MemoryMapping {}

impl Drop for MemoryMapping {
    fn drop(&mut self) {
        // This is safe because we mmap the area at addr ourselves, and nobody
        // else is holding a reference to it.
        if let Err(e) = unsafe { munmap(self.addr, self.size) } {
            error!("failed to unmap {:#x} ({} bytes): {}", self.addr(), self.size, e);
        }
    }
}

impl MemoryMapping {
    /// Maps `size` bytes of `descriptor` starting at `offset`.  The descriptor may be closed once
    /// this returns.
    pub fn from_safe_descriptor(
        descriptor: &SafeDescriptor,
        size: usize,
        offset: u64,
        map_info: u32,
    ) -> GrallocResult<MemoryMapping> {
        let non_zero_size =
            NonZeroUsize::new(size).ok_or(GrallocError::InvalidArgument("zero size mapping"))?;
        let prot = match map_info & GRALLOC_MAP_ACCESS_MASK {
            GRALLOC_MAP_ACCESS_READ => ProtFlags::PROT_READ,
            GRALLOC_MAP_ACCESS_WRITE => ProtFlags::PROT_WRITE,
            GRALLOC_MAP_ACCESS_RW => ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            _ => return Err(GrallocError::InvalidArgument("incorrect access flags")),
        };
        let offset: off_t = offset.try_into()?;

        let addr = unsafe {
            mmap(
                None,
                non_zero_size,
                prot,
                MapFlags::MAP_SHARED,
                descriptor,
                offset,
            )?
        };
        Ok(MemoryMapping { addr, size })
    }

    /// Returns the address of the mapping.
    pub fn addr(&self) -> u64 {
        self.addr.as_ptr() as u64
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the mapped bytes.
    pub fn as_slice(&self) -> &[u8] {
        // Safe because the mapping is valid for `size` bytes until drop.
        unsafe { std::slice::from_raw_parts(self.addr.as_ptr() as *const u8, self.size) }
    }

    /// Returns the mapped bytes for writing.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // Safe because the mapping is valid for `size` bytes until drop and we hold it mutably.
        unsafe { std::slice::from_raw_parts_mut(self.addr.as_ptr() as *mut u8, self.size) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gralloc_os::SharedMemory;

    #[test]
    fn map_shared_memory() {
        let shm = SharedMemory::new("msm_gralloc_map", 4096).unwrap();
        let descriptor: SafeDescriptor = shm.into();

        let mut mapping =
            MemoryMapping::from_safe_descriptor(&descriptor, 4096, 0, GRALLOC_MAP_ACCESS_RW)
                .unwrap();
        assert_ne!(mapping.addr(), 0);
        assert_eq!(mapping.size(), 4096);

        mapping.as_mut_slice()[17] = 0xab;

        let second =
            MemoryMapping::from_safe_descriptor(&descriptor, 4096, 0, GRALLOC_MAP_ACCESS_READ)
                .unwrap();
        assert_eq!(second.as_slice()[17], 0xab);
    }

    #[test]
    fn reject_bad_access() {
        let shm = SharedMemory::new("msm_gralloc_map", 4096).unwrap();
        let descriptor: SafeDescriptor = shm.into();

        assert!(MemoryMapping::from_safe_descriptor(&descriptor, 4096, 0, 0).is_err());
        assert!(
            MemoryMapping::from_safe_descriptor(&descriptor, 0, 0, GRALLOC_MAP_ACCESS_RW).is_err()
        );
    }
}
