// Copyright 2017 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::convert::TryInto;
use std::ffi::CString;
use std::os::unix::io::OwnedFd;

use libc::off_t;
use nix::sys::memfd::memfd_create;
use nix::sys::memfd::MFdFlags;
use nix::unistd::ftruncate;
use nix::unistd::sysconf;
use nix::unistd::SysconfVar;

use crate::gralloc_os::descriptor::AsRawDescriptor;
use crate::gralloc_os::descriptor::FromRawDescriptor;
use crate::gralloc_os::descriptor::IntoRawDescriptor;
use crate::gralloc_os::RawDescriptor;
use crate::gralloc_os::SafeDescriptor;
use crate::gralloc_utils::align_to;
use crate::gralloc_utils::GrallocError;
use crate::gralloc_utils::GrallocResult;

/// Anonymous shared memory backed by a memfd.
pub struct SharedMemory {
    fd: OwnedFd,
    size: u64,
}

impl SharedMemory {
    /// Creates a new shared memory object of the given size.
    ///
    /// |debug_name| will appear in `/proc/self/fd/<shm fd>` for the purposes of debugging. It
    /// does not need to be unique.
    ///
    /// The file descriptor is opened with the close on exec flag and allows memfd sealing.
    pub fn new<T: Into<Vec<u8>>>(debug_name: T, size: u64) -> GrallocResult<SharedMemory> {
        let debug_name = CString::new(debug_name)?;
        let fd = memfd_create(
            debug_name.as_c_str(),
            MFdFlags::MFD_CLOEXEC | MFdFlags::MFD_ALLOW_SEALING,
        )?;

        let size_off_t: off_t = size.try_into()?;
        ftruncate(&fd, size_off_t)?;

        Ok(SharedMemory { fd, size })
    }

    /// Gets the size in bytes of the shared memory.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl AsRawDescriptor for SharedMemory {
    fn as_raw_descriptor(&self) -> RawDescriptor {
        self.fd.as_raw_descriptor()
    }
}

impl IntoRawDescriptor for SharedMemory {
    fn into_raw_descriptor(self) -> RawDescriptor {
        self.fd.into_raw_descriptor()
    }
}

impl From<SharedMemory> for SafeDescriptor {
    fn from(sm: SharedMemory) -> SafeDescriptor {
        // Safe because we own the SharedMemory at this point.
        unsafe { SafeDescriptor::from_raw_descriptor(sm.into_raw_descriptor()) }
    }
}

/// Returns the system's page size in bytes.
pub fn page_size() -> GrallocResult<u64> {
    match sysconf(SysconfVar::PAGE_SIZE)? {
        Some(page_size) => Ok(page_size.try_into()?),
        None => Err(GrallocError::InvalidArgument("no page size")),
    }
}

/// Uses the system's page size in bytes to round the given value up to the nearest page boundary.
pub fn round_up_to_page_size(v: u64) -> GrallocResult<u64> {
    align_to(v, page_size()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_rounding() {
        let page = page_size().unwrap();
        assert_eq!(round_up_to_page_size(0).unwrap(), 0);
        assert_eq!(round_up_to_page_size(1).unwrap(), page);
        assert_eq!(round_up_to_page_size(page).unwrap(), page);
        assert_eq!(round_up_to_page_size(page + 1).unwrap(), 2 * page);
        assert!(matches!(
            round_up_to_page_size(u64::MAX - 5),
            Err(GrallocError::CheckedArithmetic { .. })
        ));
    }

    #[test]
    fn shared_memory_size() {
        let shm = SharedMemory::new("msm_gralloc_test", 8192).unwrap();
        assert_eq!(shm.size(), 8192);
        assert!(shm.as_raw_descriptor() >= 0);
    }
}
