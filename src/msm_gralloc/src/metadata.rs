// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! metadata: Record stored in the side region of every buffer.

use std::mem::size_of;

use bitflags::bitflags;
use zerocopy::AsBytes;
use zerocopy::FromBytes;

use crate::gralloc_utils::*;

bitflags! {
    /// Fields of `BufferMetadata` that hold a value.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MetadataOps: u32 {
        const UPDATE_BUFFER_GEOMETRY = 0x0080;
        const UPDATE_COLOR_SPACE = 0x0200;
        const MAP_SECURE_BUFFER = 0x0400;
        const LINEAR_FORMAT = 0x1000;
        const SET_SINGLE_BUFFER_MODE = 0x4000;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ColorSpace {
    ItuR601,
    ItuR601Full,
    ItuR709,
    ItuR2020,
    ItuR2020Full,
}

impl ColorSpace {
    fn to_raw(self) -> u32 {
        match self {
            ColorSpace::ItuR601 => 0,
            ColorSpace::ItuR601Full => 1,
            ColorSpace::ItuR709 => 2,
            ColorSpace::ItuR2020 => 3,
            ColorSpace::ItuR2020Full => 4,
        }
    }

    fn from_raw(raw: u32) -> Option<ColorSpace> {
        match raw {
            0 => Some(ColorSpace::ItuR601),
            1 => Some(ColorSpace::ItuR601Full),
            2 => Some(ColorSpace::ItuR709),
            3 => Some(ColorSpace::ItuR2020),
            4 => Some(ColorSpace::ItuR2020Full),
            _ => None,
        }
    }
}

/// Wire layout of the metadata region.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, AsBytes, FromBytes)]
pub struct BufferMetadata {
    pub operation: u32,
    pub color_space: u32,
    pub map_secure_buffer: u32,
    pub linear_format: u32,
    pub single_buffer_mode: u32,
    pub slice_width: u32,
    pub slice_height: u32,
}

/// Bytes used by the record.  The region itself is rounded up to a page.
pub const METADATA_SIZE: usize = size_of::<BufferMetadata>();

impl BufferMetadata {
    pub fn read(bytes: &[u8]) -> GrallocResult<BufferMetadata> {
        BufferMetadata::read_from_prefix(bytes)
            .ok_or(GrallocError::InvalidArgument("metadata region too small"))
    }

    pub fn write(&self, bytes: &mut [u8]) -> GrallocResult<()> {
        self.write_to_prefix(bytes)
            .ok_or(GrallocError::InvalidArgument("metadata region too small"))
    }

    fn ops(&self) -> MetadataOps {
        MetadataOps::from_bits_truncate(self.operation)
    }

    fn set_op(&mut self, op: MetadataOps) {
        self.operation |= op.bits();
    }

    pub fn color_space(&self) -> Option<ColorSpace> {
        if !self.ops().contains(MetadataOps::UPDATE_COLOR_SPACE) {
            return None;
        }
        ColorSpace::from_raw(self.color_space)
    }

    pub fn set_color_space(&mut self, color_space: ColorSpace) {
        self.color_space = color_space.to_raw();
        self.set_op(MetadataOps::UPDATE_COLOR_SPACE);
    }

    /// Producer-declared slice width and height.
    pub fn buffer_geometry(&self) -> Option<(u32, u32)> {
        if !self.ops().contains(MetadataOps::UPDATE_BUFFER_GEOMETRY) {
            return None;
        }
        Some((self.slice_width, self.slice_height))
    }

    pub fn set_buffer_geometry(&mut self, width: u32, height: u32) {
        self.slice_width = width;
        self.slice_height = height;
        self.set_op(MetadataOps::UPDATE_BUFFER_GEOMETRY);
    }

    /// Linear format that consumers should use instead of the compressed allocation format.
    pub fn linear_format(&self) -> Option<u32> {
        if !self.ops().contains(MetadataOps::LINEAR_FORMAT) {
            return None;
        }
        Some(self.linear_format)
    }

    pub fn set_linear_format(&mut self, format: u32) {
        self.linear_format = format;
        self.set_op(MetadataOps::LINEAR_FORMAT);
    }

    pub fn map_secure_buffer(&self) -> Option<bool> {
        if !self.ops().contains(MetadataOps::MAP_SECURE_BUFFER) {
            return None;
        }
        Some(self.map_secure_buffer != 0)
    }

    pub fn set_map_secure_buffer(&mut self, map: bool) {
        self.map_secure_buffer = map as u32;
        self.set_op(MetadataOps::MAP_SECURE_BUFFER);
    }

    pub fn single_buffer_mode(&self) -> Option<bool> {
        if !self.ops().contains(MetadataOps::SET_SINGLE_BUFFER_MODE) {
            return None;
        }
        Some(self.single_buffer_mode != 0)
    }

    pub fn set_single_buffer_mode(&mut self, enable: bool) {
        self.single_buffer_mode = enable as u32;
        self.set_op(MetadataOps::SET_SINGLE_BUFFER_MODE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields() {
        let metadata = BufferMetadata::default();
        assert_eq!(metadata.color_space(), None);
        assert_eq!(metadata.buffer_geometry(), None);
        assert_eq!(metadata.linear_format(), None);
        assert_eq!(metadata.single_buffer_mode(), None);
    }

    #[test]
    fn stored_in_region() {
        let mut region = vec![0u8; 4096];
        let mut metadata = BufferMetadata::read(&region).unwrap();
        metadata.set_color_space(ColorSpace::ItuR709);
        metadata.set_buffer_geometry(1280, 720);
        metadata.set_single_buffer_mode(true);
        metadata.write(&mut region).unwrap();

        let stored = BufferMetadata::read(&region).unwrap();
        assert_eq!(stored.color_space(), Some(ColorSpace::ItuR709));
        assert_eq!(stored.buffer_geometry(), Some((1280, 720)));
        assert_eq!(stored.single_buffer_mode(), Some(true));
        assert_eq!(stored.map_secure_buffer(), None);
        assert_eq!(
            MetadataOps::from_bits_truncate(stored.operation),
            MetadataOps::UPDATE_COLOR_SPACE
                | MetadataOps::UPDATE_BUFFER_GEOMETRY
                | MetadataOps::SET_SINGLE_BUFFER_MODE
        );
    }

    #[test]
    fn short_region() {
        let mut short = [0u8; 8];
        assert!(BufferMetadata::read(&short).is_err());
        assert!(BufferMetadata::default().write(&mut short).is_err());
        assert_eq!(METADATA_SIZE, 28);
    }
}
