// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! handle: The allocated buffer.  Owns the primary and metadata regions and whatever mappings of
//! them currently exist.

use bitflags::bitflags;

use crate::formats::PixelFormat;
use crate::gralloc_os::MemoryMapping;
use crate::gralloc_os::SafeDescriptor;
use crate::heap::HeapRegion;
use crate::layout::BufferGeometry;
use crate::layout::PlaneDescriptor;
use crate::usage::Usage;

bitflags! {
    /// Properties of an allocated buffer.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct BufferFlags: u32 {
        /// Carved from the framebuffer device.
        const FRAMEBUFFER = 0x0000_0001;
        /// Allocated through a heap driver.
        const USES_HEAP_DRIVER = 0x0000_0008;
        /// The CPU wrote to the buffer since the last cache clean.
        const NEEDS_FLUSH = 0x0000_0020;
        /// A device other than the CPU may write the buffer.
        const NON_CPU_WRITER = 0x0000_0080;
        const CACHED = 0x0000_0200;
        const SECURE_BUFFER = 0x0000_0400;
        const EXTERNAL_ONLY = 0x0000_2000;
        const INTERNAL_ONLY = 0x0000_4000;
        const VIDEO_ENCODER = 0x0001_0000;
        const CAMERA_WRITE = 0x0002_0000;
        const CAMERA_READ = 0x0004_0000;
        const HW_COMPOSER = 0x0008_0000;
        const HW_TEXTURE = 0x0010_0000;
        const CPU_RENDERED = 0x0020_0000;
        const SECURE_DISPLAY = 0x0100_0000;
        const DISP_CONSUMER = 0x0400_0000;
        /// Laid out block-compressed.
        const UBWC_ALIGNED = 0x0800_0000;
    }
}

impl BufferFlags {
    /// Allocation-type tags recorded at allocation and used to pick the driver on free.
    pub fn allocation_type(self) -> BufferFlags {
        self & (BufferFlags::USES_HEAP_DRIVER | BufferFlags::SECURE_BUFFER)
    }

    /// Flags implied by the usage of a request.
    pub fn from_usage(usage: Usage) -> BufferFlags {
        let mut flags = BufferFlags::empty();
        let pairs = [
            (Usage::PRIVATE_EXTERNAL_ONLY, BufferFlags::EXTERNAL_ONLY),
            (Usage::PRIVATE_INTERNAL_ONLY, BufferFlags::INTERNAL_ONLY),
            (Usage::HW_VIDEO_ENCODER, BufferFlags::VIDEO_ENCODER),
            (Usage::HW_CAMERA_WRITE, BufferFlags::CAMERA_WRITE),
            (Usage::HW_CAMERA_READ, BufferFlags::CAMERA_READ),
            (Usage::HW_COMPOSER, BufferFlags::HW_COMPOSER),
            (Usage::HW_TEXTURE, BufferFlags::HW_TEXTURE),
            (Usage::PRIVATE_SECURE_DISPLAY, BufferFlags::SECURE_DISPLAY),
        ];
        for (bit, flag) in pairs {
            if usage.contains(bit) {
                flags |= flag;
            }
        }

        if usage.sw_write() {
            flags |= BufferFlags::CPU_RENDERED;
        }

        if usage.intersects(
            Usage::HW_VIDEO_ENCODER | Usage::HW_CAMERA_WRITE | Usage::HW_RENDER | Usage::HW_FB,
        ) {
            flags |= BufferFlags::NON_CPU_WRITER;
        }

        if usage.intersects(Usage::HW_COMPOSER | Usage::HW_FB) {
            flags |= BufferFlags::DISP_CONSUMER;
        }

        flags
    }
}

/// Broad consumer class of a buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BufferType {
    Ui,
    Video,
}

impl BufferType {
    pub fn of(format: PixelFormat) -> BufferType {
        if format.is_rgb() {
            BufferType::Ui
        } else {
            BufferType::Video
        }
    }
}

/// An allocated buffer.  Exclusively owned by the caller until passed back to `free`.
#[derive(Debug)]
pub struct BufferHandle {
    pub(crate) primary: Option<HeapRegion>,
    pub(crate) metadata: Option<HeapRegion>,
    pub(crate) primary_mapping: Option<MemoryMapping>,
    pub(crate) metadata_mapping: Option<MemoryMapping>,
    pub(crate) metadata_alloc_type: BufferFlags,
    pub(crate) fb_slot: Option<u32>,
    pub(crate) flags: BufferFlags,
    pub(crate) geometry: BufferGeometry,
    pub(crate) usage: Usage,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) size: u64,
    pub(crate) buffer_type: BufferType,
}

impl BufferHandle {
    /// Width requested by the caller.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height requested by the caller.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Stride in pixels.
    pub fn stride(&self) -> u32 {
        self.geometry.aligned_width
    }

    pub fn aligned_height(&self) -> u32 {
        self.geometry.aligned_height
    }

    /// Concrete format, after placeholder resolution.
    pub fn format(&self) -> PixelFormat {
        self.geometry.format
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// Size in bytes of the primary region.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    pub fn geometry(&self) -> &BufferGeometry {
        &self.geometry
    }

    pub fn planes(&self) -> &[PlaneDescriptor] {
        &self.geometry.planes
    }

    /// Address of the mapped primary region, or 0 if it is not mapped.
    pub fn base(&self) -> u64 {
        self.primary_mapping
            .as_ref()
            .map(|m| m.addr())
            .unwrap_or(0)
    }

    /// Address of the mapped metadata region, or 0 if it is not mapped.
    pub fn metadata_base(&self) -> u64 {
        self.metadata_mapping
            .as_ref()
            .map(|m| m.addr())
            .unwrap_or(0)
    }

    /// Descriptor of the primary region, shared with other processes.
    pub fn descriptor(&self) -> Option<&SafeDescriptor> {
        self.primary.as_ref().map(|r| &r.descriptor)
    }

    /// Descriptor of the metadata region.
    pub fn metadata_descriptor(&self) -> Option<&SafeDescriptor> {
        self.metadata.as_ref().map(|r| &r.descriptor)
    }

    /// Offset of the buffer inside the primary descriptor.
    pub fn offset(&self) -> u64 {
        self.primary.as_ref().map(|r| r.offset).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_derived_flags() {
        let flags = BufferFlags::from_usage(Usage::HW_VIDEO_ENCODER | Usage::HW_COMPOSER);
        assert!(flags.contains(BufferFlags::VIDEO_ENCODER | BufferFlags::HW_COMPOSER));
        assert!(flags.contains(BufferFlags::NON_CPU_WRITER | BufferFlags::DISP_CONSUMER));
        assert!(!flags.contains(BufferFlags::CPU_RENDERED));

        let flags = BufferFlags::from_usage(Usage::SW_WRITE_OFTEN | Usage::HW_TEXTURE);
        assert!(flags.contains(BufferFlags::CPU_RENDERED | BufferFlags::HW_TEXTURE));
        assert!(!flags.contains(BufferFlags::NON_CPU_WRITER));
    }

    #[test]
    fn allocation_type_tags() {
        let flags = BufferFlags::USES_HEAP_DRIVER | BufferFlags::SECURE_BUFFER | BufferFlags::CACHED;
        assert_eq!(
            flags.allocation_type(),
            BufferFlags::USES_HEAP_DRIVER | BufferFlags::SECURE_BUFFER
        );
    }

    #[test]
    fn buffer_types() {
        assert_eq!(BufferType::of(PixelFormat::RGBA_8888), BufferType::Ui);
        assert_eq!(BufferType::of(PixelFormat::YCBCR_420_SP), BufferType::Video);
        assert_eq!(BufferType::of(PixelFormat::BLOB), BufferType::Video);
    }
}
