// Copyright 2020 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::os::unix::io::AsFd;
use std::os::unix::io::AsRawFd;
use std::os::unix::io::BorrowedFd;
use std::os::unix::io::IntoRawFd;
use std::os::unix::io::OwnedFd;
use std::os::unix::io::RawFd;

use crate::gralloc_os::descriptor::AsRawDescriptor;
use crate::gralloc_os::descriptor::FromRawDescriptor;
use crate::gralloc_os::descriptor::IntoRawDescriptor;
use crate::gralloc_os::descriptor::SafeDescriptor;

type Error = std::io::Error;
type Result<T> = std::result::Result<T, Error>;

pub type RawDescriptor = RawFd;

impl Drop for SafeDescriptor {
    fn drop(&mut self) {
        let _ = unsafe { libc::close(self.descriptor) };
    }
}

impl AsRawFd for SafeDescriptor {
    fn as_raw_fd(&self) -> RawFd {
        self.as_raw_descriptor()
    }
}

impl AsFd for SafeDescriptor {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // The descriptor stays open for as long as self is alive.
        unsafe { BorrowedFd::borrow_raw(self.descriptor) }
    }
}

impl SafeDescriptor {
    /// Duplicates the descriptor.  Both refer to the same open file, so a region handed out by
    /// the framebuffer device stays valid after the device is dropped.
    pub fn try_clone(&self) -> Result<SafeDescriptor> {
        // Safe because this doesn't modify any memory and we check the return value.
        let descriptor = unsafe { libc::fcntl(self.descriptor, libc::F_DUPFD_CLOEXEC, 0) };
        if descriptor < 0 {
            Err(Error::last_os_error())
        } else {
            Ok(SafeDescriptor { descriptor })
        }
    }
}

impl From<OwnedFd> for SafeDescriptor {
    fn from(fd: OwnedFd) -> SafeDescriptor {
        // Safe because we own the OwnedFd at this point.
        unsafe { SafeDescriptor::from_raw_descriptor(fd.into_raw_descriptor()) }
    }
}

impl AsRawDescriptor for OwnedFd {
    fn as_raw_descriptor(&self) -> RawDescriptor {
        self.as_raw_fd()
    }
}

impl IntoRawDescriptor for OwnedFd {
    fn into_raw_descriptor(self) -> RawDescriptor {
        self.into_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gralloc_os::SharedMemory;

    #[test]
    fn clone_is_distinct() {
        let shm = SharedMemory::new("descriptor_test", 4096).unwrap();
        let descriptor: SafeDescriptor = shm.into();
        let clone = descriptor.try_clone().unwrap();
        assert_ne!(descriptor.as_raw_descriptor(), clone.as_raw_descriptor());

        let raw = clone.into_raw_descriptor();
        // Safe because `raw` was just released by `clone`.
        let owned = unsafe { SafeDescriptor::from_raw_descriptor(raw) };
        assert_eq!(owned.as_raw_descriptor(), raw);
    }
}
