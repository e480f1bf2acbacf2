// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! framebuffer: Fixed-size slots carved from a single display memory region.

use std::sync::Mutex;

use log::debug;

use crate::checked_arithmetic;
use crate::checked_range;
use crate::gralloc_os::round_up_to_page_size;
use crate::gralloc_os::SafeDescriptor;
use crate::gralloc_os::SharedMemory;
use crate::gralloc_utils::*;
use crate::heap::HeapRegion;

/// Most slots a device may expose; the slot map is a 32-bit mask.
pub const MAX_FRAMEBUFFER_SLOTS: u32 = 32;

pub struct FramebufferDevice {
    descriptor: SafeDescriptor,
    slot_size: u64,
    num_slots: u32,
    in_use: Mutex<u32>,
}

impl FramebufferDevice {
    /// Creates a device with `num_slots` slots of at least `slot_size` bytes.
    pub fn new(num_slots: u32, slot_size: u64) -> GrallocResult<FramebufferDevice> {
        if num_slots == 0 || num_slots > MAX_FRAMEBUFFER_SLOTS {
            return Err(GrallocError::InvalidArgument("bad framebuffer slot count"));
        }

        let slot_size = round_up_to_page_size(slot_size)?;
        let num = num_slots as u64;
        let total = checked_arithmetic!(slot_size * num)?;
        let shm = SharedMemory::new("msm_gralloc_fb", total)?;
        debug!("framebuffer: {} slots of {} bytes", num_slots, slot_size);

        Ok(FramebufferDevice {
            descriptor: shm.into(),
            slot_size,
            num_slots,
            in_use: Mutex::new(0),
        })
    }

    pub fn num_slots(&self) -> u32 {
        self.num_slots
    }

    pub fn slot_size(&self) -> u64 {
        self.slot_size
    }

    /// Returns true if buffers should be carved from this device.  A single slot can not be page
    /// flipped, so such a device is bypassed.
    pub fn is_usable(&self) -> bool {
        self.num_slots > 1
    }

    /// Takes a free slot large enough for `size` bytes.
    pub fn acquire(&self, size: u64) -> GrallocResult<(u32, HeapRegion)> {
        let slot_size = self.slot_size;
        checked_range!(size <= slot_size)?;

        let mut in_use = self.in_use.lock().map_err(|_| GrallocError::Unsupported)?;
        let slot = (0..self.num_slots)
            .find(|s| *in_use & (1 << s) == 0)
            .ok_or(GrallocError::OutOfMemory)?;

        let region = HeapRegion {
            descriptor: self.descriptor.try_clone()?,
            size: self.slot_size,
            offset: self.slot_size * slot as u64,
        };
        *in_use |= 1 << slot;
        Ok((slot, region))
    }

    /// Returns a slot taken by `acquire`.
    pub fn release(&self, slot: u32, region: HeapRegion) -> GrallocResult<()> {
        drop(region);
        let mut in_use = self.in_use.lock().map_err(|_| GrallocError::Unsupported)?;
        if slot >= self.num_slots || *in_use & (1 << slot) == 0 {
            return Err(GrallocError::InvalidArgument("framebuffer slot not in use"));
        }

        *in_use &= !(1 << slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots() {
        let fb = FramebufferDevice::new(2, 100).unwrap();
        let page = fb.slot_size();
        assert!(fb.is_usable());

        let (first, region) = fb.acquire(page).unwrap();
        assert_eq!(first, 0);
        assert_eq!(region.offset, 0);
        let (second, other) = fb.acquire(1).unwrap();
        assert_eq!(second, 1);
        assert_eq!(other.offset, page);

        assert!(matches!(fb.acquire(1), Err(GrallocError::OutOfMemory)));
        assert!(matches!(
            fb.acquire(page + 1),
            Err(GrallocError::CheckedRange { .. })
        ));

        fb.release(first, region).unwrap();
        let (again, region) = fb.acquire(1).unwrap();
        assert_eq!(again, 0);
        fb.release(again, region).unwrap();
        fb.release(second, other).unwrap();
    }

    #[test]
    fn single_slot_bypassed() {
        let fb = FramebufferDevice::new(1, 4096).unwrap();
        assert!(!fb.is_usable());
        assert!(FramebufferDevice::new(0, 4096).is_err());
        assert!(FramebufferDevice::new(33, 4096).is_err());
    }
}
