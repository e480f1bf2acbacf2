// Copyright 2021 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Usage bits of an allocation request.  The low half follows the Android gralloc usage
//! numbering, the high half carries the MSM private requests.

use bitflags::bitflags;

bitflags! {
    /// Intended producers and consumers of a buffer.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Usage: u32 {
        const SW_READ_RARELY = 0x0000_0002;
        const SW_READ_OFTEN = 0x0000_0003;
        const SW_READ_MASK = 0x0000_000f;
        const SW_WRITE_RARELY = 0x0000_0020;
        const SW_WRITE_OFTEN = 0x0000_0030;
        const SW_WRITE_MASK = 0x0000_00f0;
        const HW_TEXTURE = 0x0000_0100;
        const HW_RENDER = 0x0000_0200;
        const HW_2D = 0x0000_0400;
        const HW_COMPOSER = 0x0000_0800;
        const HW_FB = 0x0000_1000;
        const PROTECTED = 0x0000_4000;
        const HW_VIDEO_ENCODER = 0x0001_0000;
        const HW_CAMERA_WRITE = 0x0002_0000;
        const HW_CAMERA_READ = 0x0004_0000;
        const HW_CAMERA_ZSL = 0x0006_0000;
        const HW_CAMERA_MASK = 0x0006_0000;

        const PRIVATE_SECURE_DISPLAY = 0x0100_0000;
        const PRIVATE_MM_HEAP = 0x0200_0000;
        const PRIVATE_INTERNAL_ONLY = 0x0400_0000;
        const PRIVATE_EXTERNAL_ONLY = 0x0800_0000;
        /// Request for the block-compressed tiled layout.
        const PRIVATE_ALLOC_UBWC = 0x1000_0000;
        const PRIVATE_UNCACHED = 0x2000_0000;
        const PRIVATE_CAMERA_HEAP = 0x4000_0000;
        const PRIVATE_ADSP_HEAP = 0x8000_0000;
    }
}

impl Usage {
    /// Returns true if the CPU reads the buffer.
    #[inline(always)]
    pub fn sw_read(self) -> bool {
        self.intersects(Usage::SW_READ_MASK)
    }

    /// Returns true if the CPU writes the buffer.
    #[inline(always)]
    pub fn sw_write(self) -> bool {
        self.intersects(Usage::SW_WRITE_MASK)
    }

    /// Returns true if the CPU touches the buffer at all.
    #[inline(always)]
    pub fn sw_access(self) -> bool {
        self.sw_read() || self.sw_write()
    }

    /// Returns true if the GPU samples from or renders into the buffer.
    #[inline(always)]
    pub fn gpu_access(self) -> bool {
        self.intersects(Usage::HW_TEXTURE | Usage::HW_RENDER)
    }

    /// Returns true if a camera produces or consumes the buffer.
    #[inline(always)]
    pub fn camera(self) -> bool {
        self.intersects(Usage::HW_CAMERA_MASK)
    }

    /// Returns true if the camera usage is exactly zero shutter lag (read and write).
    #[inline(always)]
    pub fn camera_zsl(self) -> bool {
        self.bits() & Usage::HW_CAMERA_MASK.bits() == Usage::HW_CAMERA_ZSL.bits()
    }

    /// Returns true if the buffer should be allocated without CPU caching.  Protected buffers,
    /// explicit uncached requests and rare CPU access all avoid the cache.
    pub fn uncached(self) -> bool {
        if self.intersects(Usage::PRIVATE_UNCACHED | Usage::PROTECTED) {
            return true;
        }

        self.bits() & Usage::SW_WRITE_MASK.bits() == Usage::SW_WRITE_RARELY.bits()
            || self.bits() & Usage::SW_READ_MASK.bits() == Usage::SW_READ_RARELY.bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_access() {
        assert!(Usage::SW_READ_RARELY.sw_read());
        assert!(Usage::SW_WRITE_OFTEN.sw_write());
        assert!(!Usage::HW_TEXTURE.sw_access());
        assert!((Usage::HW_RENDER | Usage::SW_READ_OFTEN).sw_access());
    }

    #[test]
    fn camera_modes() {
        assert!(Usage::HW_CAMERA_ZSL.camera_zsl());
        assert!(!Usage::HW_CAMERA_READ.camera_zsl());
        assert!(Usage::HW_CAMERA_WRITE.camera());
        assert!(!Usage::HW_COMPOSER.camera());
    }

    #[test]
    fn cache_policy() {
        assert!(!Usage::empty().uncached());
        assert!(!Usage::SW_READ_OFTEN.uncached());
        assert!(!(Usage::SW_READ_OFTEN | Usage::SW_WRITE_OFTEN).uncached());
        assert!(Usage::SW_READ_RARELY.uncached());
        assert!(Usage::SW_WRITE_RARELY.uncached());
        assert!(Usage::PROTECTED.uncached());
        assert!((Usage::PRIVATE_UNCACHED | Usage::HW_TEXTURE).uncached());
    }
}
