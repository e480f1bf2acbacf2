// Copyright 2021 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! venus: Plane geometry expected by the video codec and display blocks.
//!
//! Strides, scanlines and meta-plane footprints are named constants per color format.  Only
//! progressive frames are described and no extradata is appended to the buffers.

use crate::gralloc_utils::align_to;
use crate::gralloc_utils::checked_add;
use crate::gralloc_utils::checked_mul;
use crate::gralloc_utils::GrallocResult;
use crate::gralloc_utils::GRALLOC_SIZE_4K;

/// Color formats understood by the video subsystem.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VenusColorFormat {
    Nv12,
    Nv21,
    Nv12Ubwc,
    Nv12Bpp10Ubwc,
    P010Ubwc,
}

/// How the luma stride is derived from the width in pixels.
#[derive(Copy, Clone)]
enum StrideRule {
    /// One byte per pixel, rounded to the given unit.
    Bytes(u64),
    /// Three 10-bit pixels packed in four bytes: the width is rounded to 192 pixels first.
    Packed10,
    /// Two bytes per pixel, rounded to the given unit.
    Words(u64),
}

#[derive(Copy, Clone)]
struct VenusParams {
    stride: StrideRule,
    y_scanline_align: u64,
    uv_scanline_align: u64,
    /// Pixel footprint of one meta-plane entry, luma then chroma.  None for linear formats.
    meta_tiles: Option<[(u64, u64); 2]>,
}

static NV12_PARAMS: VenusParams = VenusParams {
    stride: StrideRule::Bytes(128),
    y_scanline_align: 32,
    uv_scanline_align: 16,
    meta_tiles: None,
};

static NV12_UBWC_PARAMS: VenusParams = VenusParams {
    stride: StrideRule::Bytes(128),
    y_scanline_align: 32,
    uv_scanline_align: 32,
    meta_tiles: Some([(32, 8), (16, 8)]),
};

static NV12_BPP10_UBWC_PARAMS: VenusParams = VenusParams {
    stride: StrideRule::Packed10,
    y_scanline_align: 16,
    uv_scanline_align: 16,
    meta_tiles: Some([(48, 4), (24, 4)]),
};

static P010_UBWC_PARAMS: VenusParams = VenusParams {
    stride: StrideRule::Words(256),
    y_scanline_align: 16,
    uv_scanline_align: 16,
    meta_tiles: Some([(32, 4), (16, 4)]),
};

const META_STRIDE_ALIGN: u64 = 64;
const META_SCANLINE_ALIGN: u64 = 16;

/// Strides and scanlines of every plane of a video buffer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct VenusPlanes {
    pub y_stride: u64,
    pub uv_stride: u64,
    pub y_scanlines: u64,
    pub uv_scanlines: u64,
    pub y_meta_stride: u64,
    pub y_meta_scanlines: u64,
    pub uv_meta_stride: u64,
    pub uv_meta_scanlines: u64,
}

/// Byte size of each plane in memory order.  Meta planes are zero for linear formats.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct VenusPlaneSizes {
    pub y_meta: u64,
    pub y: u64,
    pub uv_meta: u64,
    pub uv: u64,
}

impl VenusPlaneSizes {
    /// Bytes of pixel data, without the meta planes.
    pub fn data(&self) -> GrallocResult<u64> {
        checked_add(self.y, self.uv)
    }

    /// Bytes of compression bookkeeping.
    pub fn meta(&self) -> GrallocResult<u64> {
        checked_add(self.y_meta, self.uv_meta)
    }
}

fn meta_stride(width: u64, tile_width: u64) -> GrallocResult<u64> {
    align_to(width.div_ceil(tile_width), META_STRIDE_ALIGN)
}

fn meta_scanlines(height: u64, tile_height: u64) -> GrallocResult<u64> {
    align_to(height.div_ceil(tile_height), META_SCANLINE_ALIGN)
}

impl VenusColorFormat {
    fn params(self) -> &'static VenusParams {
        match self {
            VenusColorFormat::Nv12 | VenusColorFormat::Nv21 => &NV12_PARAMS,
            VenusColorFormat::Nv12Ubwc => &NV12_UBWC_PARAMS,
            VenusColorFormat::Nv12Bpp10Ubwc => &NV12_BPP10_UBWC_PARAMS,
            VenusColorFormat::P010Ubwc => &P010_UBWC_PARAMS,
        }
    }

    /// The compressed variant used when a linear format is allocated block-compressed.
    pub fn compressed(self) -> VenusColorFormat {
        match self {
            VenusColorFormat::Nv12 => VenusColorFormat::Nv12Ubwc,
            other => other,
        }
    }

    /// Returns true if the format carries meta planes.
    pub fn is_compressed(self) -> bool {
        self.params().meta_tiles.is_some()
    }

    /// Luma stride in bytes.
    pub fn y_stride(self, width: u32) -> GrallocResult<u64> {
        let width = width as u64;
        match self.params().stride {
            StrideRule::Bytes(unit) => align_to(width, unit),
            StrideRule::Packed10 => align_to(checked_mul(align_to(width, 192)?, 4)? / 3, 256),
            StrideRule::Words(unit) => align_to(checked_mul(width, 2)?, unit),
        }
    }

    /// Computes the strides and scanlines of all planes.
    pub fn planes(self, width: u32, height: u32) -> GrallocResult<VenusPlanes> {
        let params = self.params();
        let y_stride = self.y_stride(width)?;
        let chroma_width = (width as u64 + 1) >> 1;
        let chroma_height = (height as u64 + 1) >> 1;

        let mut planes = VenusPlanes {
            y_stride,
            uv_stride: y_stride,
            y_scanlines: align_to(height as u64, params.y_scanline_align)?,
            uv_scanlines: align_to(chroma_height, params.uv_scanline_align)?,
            ..Default::default()
        };

        if let Some([(y_tile_w, y_tile_h), (uv_tile_w, uv_tile_h)]) = params.meta_tiles {
            planes.y_meta_stride = meta_stride(width as u64, y_tile_w)?;
            planes.y_meta_scanlines = meta_scanlines(height as u64, y_tile_h)?;
            planes.uv_meta_stride = meta_stride(chroma_width, uv_tile_w)?;
            planes.uv_meta_scanlines = meta_scanlines(chroma_height, uv_tile_h)?;
        }

        Ok(planes)
    }

    /// Width and height in pixels covered by the luma plane.
    pub fn aligned_dimensions(self, width: u32, height: u32) -> GrallocResult<(u64, u64)> {
        let planes = self.planes(width, height)?;
        let aligned_width = match self.params().stride {
            StrideRule::Bytes(_) => planes.y_stride,
            StrideRule::Packed10 => planes.y_stride / 4 * 3,
            StrideRule::Words(_) => planes.y_stride / 2,
        };
        Ok((aligned_width, planes.y_scanlines))
    }

    /// Byte size of each plane.  Compressed formats page-align every plane individually.
    pub fn plane_sizes(self, width: u32, height: u32) -> GrallocResult<VenusPlaneSizes> {
        let planes = self.planes(width, height)?;
        let y = checked_mul(planes.y_stride, planes.y_scanlines)?;
        let uv = checked_mul(planes.uv_stride, planes.uv_scanlines)?;

        if !self.is_compressed() {
            return Ok(VenusPlaneSizes {
                y,
                uv,
                ..Default::default()
            });
        }

        Ok(VenusPlaneSizes {
            y_meta: align_to(
                checked_mul(planes.y_meta_stride, planes.y_meta_scanlines)?,
                GRALLOC_SIZE_4K,
            )?,
            y: align_to(y, GRALLOC_SIZE_4K)?,
            uv_meta: align_to(
                checked_mul(planes.uv_meta_stride, planes.uv_meta_scanlines)?,
                GRALLOC_SIZE_4K,
            )?,
            uv: align_to(uv, GRALLOC_SIZE_4K)?,
        })
    }

    /// Total byte size of a buffer, rounded to 4 KiB.
    pub fn buffer_size(self, width: u32, height: u32) -> GrallocResult<u64> {
        let sizes = self.plane_sizes(width, height)?;
        align_to(checked_add(sizes.data()?, sizes.meta()?)?, GRALLOC_SIZE_4K)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_linear() {
        let planes = VenusColorFormat::Nv12.planes(1920, 1080).unwrap();
        assert_eq!(planes.y_stride, 1920);
        assert_eq!(planes.uv_stride, 1920);
        assert_eq!(planes.y_scanlines, 1088);
        assert_eq!(planes.uv_scanlines, 544);
        assert_eq!(planes.y_meta_stride, 0);

        assert_eq!(
            VenusColorFormat::Nv12.buffer_size(1920, 1080).unwrap(),
            3133440
        );
        assert_eq!(
            VenusColorFormat::Nv12.aligned_dimensions(1920, 1080).unwrap(),
            (1920, 1088)
        );

        let odd = VenusColorFormat::Nv21.planes(176, 144).unwrap();
        assert_eq!(odd.y_stride, 256);
        assert_eq!(odd.y_scanlines, 160);
        assert_eq!(odd.uv_scanlines, 80);
    }

    #[test]
    fn nv12_compressed_4k() {
        let planes = VenusColorFormat::Nv12Ubwc.planes(4096, 2160).unwrap();
        assert_eq!(planes.y_stride, 4096);
        assert_eq!(planes.y_scanlines, 2176);
        assert_eq!(planes.uv_scanlines, 1088);
        assert_eq!(planes.y_meta_stride, 128);
        assert_eq!(planes.y_meta_scanlines, 272);
        assert_eq!(planes.uv_meta_stride, 128);
        assert_eq!(planes.uv_meta_scanlines, 144);

        let sizes = VenusColorFormat::Nv12Ubwc.plane_sizes(4096, 2160).unwrap();
        assert_eq!(sizes.y, 8912896);
        assert_eq!(sizes.uv, 4456448);
        assert_eq!(sizes.y_meta, 36864);
        assert_eq!(sizes.uv_meta, 20480);
        assert_eq!(
            VenusColorFormat::Nv12Ubwc.buffer_size(4096, 2160).unwrap(),
            13426688
        );
    }

    #[test]
    fn ten_bit_compressed() {
        assert_eq!(VenusColorFormat::Nv12Bpp10Ubwc.y_stride(1920).unwrap(), 2560);
        assert_eq!(
            VenusColorFormat::Nv12Bpp10Ubwc
                .aligned_dimensions(1920, 1080)
                .unwrap(),
            (1920, 1088)
        );

        assert_eq!(VenusColorFormat::P010Ubwc.y_stride(1920).unwrap(), 3840);
        assert_eq!(
            VenusColorFormat::P010Ubwc.aligned_dimensions(1920, 1080).unwrap(),
            (1920, 1088)
        );

        let planes = VenusColorFormat::P010Ubwc.planes(1920, 1080).unwrap();
        assert_eq!(planes.y_meta_stride, 64);
        assert_eq!(planes.y_meta_scanlines, 272);
        assert!(VenusColorFormat::P010Ubwc.is_compressed());
        assert!(!VenusColorFormat::Nv21.is_compressed());
        assert!(VenusColorFormat::Nv12.compressed().is_compressed());
    }

    #[test]
    fn oversized_dimensions() {
        assert!(VenusColorFormat::Nv12
            .buffer_size(4294967040, 4294967264)
            .is_err());
        assert!(VenusColorFormat::Nv12Ubwc
            .plane_sizes(u32::MAX, u32::MAX)
            .is_err());
        assert!(VenusColorFormat::P010Ubwc.y_stride(u32::MAX).is_ok());
    }
}
