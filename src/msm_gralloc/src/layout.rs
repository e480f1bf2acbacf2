// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! layout: Byte size and plane table of a buffer, computed from its aligned dimensions.

use crate::alignment::compressed_block_footprint;
use crate::formats::*;
use crate::gralloc_utils::*;
use crate::venus::VenusColorFormat;

/// Memory representation of the pixel data.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Tiling {
    Linear,
    BlockCompressedTiled,
}

/// What a plane holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PlaneRole {
    Luma,
    Chroma(ChromaOrder),
    /// All channels of a packed format.
    Combined,
    /// Compression bookkeeping for the data plane that follows it.
    Meta,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PlaneDescriptor {
    pub stride: u64,
    pub offset: u64,
    pub role: PlaneRole,
}

impl PlaneDescriptor {
    fn new(role: PlaneRole, stride: u64, offset: u64) -> PlaneDescriptor {
        PlaneDescriptor {
            stride,
            offset,
            role,
        }
    }
}

/// Aligned dimensions, size and plane table of a buffer.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct BufferGeometry {
    pub format: PixelFormat,
    pub aligned_width: u32,
    pub aligned_height: u32,
    pub size: u64,
    pub tiling: Tiling,
    pub planes: Vec<PlaneDescriptor>,
}

/// Offsets and strides of the Y, Cb and Cr samples of a YUV buffer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct YcbcrLayout {
    pub y_offset: u64,
    pub cb_offset: u64,
    pub cr_offset: u64,
    pub y_stride: u64,
    pub c_stride: u64,
    /// Distance in bytes between two consecutive samples of the same chroma channel.
    pub chroma_step: u64,
}

impl BufferGeometry {
    pub fn is_compressed(&self) -> bool {
        self.tiling == Tiling::BlockCompressedTiled
    }

    /// Offset of the first pixel plane, past any meta plane.
    pub fn data_offset(&self) -> u64 {
        self.planes
            .iter()
            .find(|p| p.role != PlaneRole::Meta)
            .map(|p| p.offset)
            .unwrap_or(0)
    }

    /// Describes the Y/Cb/Cr sample positions.  Packed and RGB formats have none.
    pub fn ycbcr_layout(&self) -> GrallocResult<YcbcrLayout> {
        let info = self.format.info()?;
        let luma = self
            .planes
            .iter()
            .find(|p| p.role == PlaneRole::Luma)
            .ok_or(GrallocError::Unsupported)?;

        let mut layout = YcbcrLayout {
            y_offset: luma.offset,
            y_stride: luma.stride,
            ..Default::default()
        };

        let sample = info.bytes_per_pixel as u64;
        for plane in self.planes.iter() {
            match plane.role {
                PlaneRole::Chroma(ChromaOrder::CbCr) => {
                    layout.cb_offset = plane.offset;
                    layout.cr_offset = checked_add(plane.offset, sample)?;
                    layout.c_stride = plane.stride;
                    layout.chroma_step = 2 * sample;
                }
                PlaneRole::Chroma(ChromaOrder::CrCb) => {
                    layout.cr_offset = plane.offset;
                    layout.cb_offset = checked_add(plane.offset, sample)?;
                    layout.c_stride = plane.stride;
                    layout.chroma_step = 2 * sample;
                }
                PlaneRole::Chroma(ChromaOrder::Cb) => {
                    layout.cb_offset = plane.offset;
                    layout.c_stride = plane.stride;
                    layout.chroma_step = sample;
                }
                PlaneRole::Chroma(ChromaOrder::Cr) => {
                    layout.cr_offset = plane.offset;
                    layout.c_stride = plane.stride;
                    layout.chroma_step = sample;
                }
                _ => (),
            }
        }

        Ok(layout)
    }
}

fn align_4k(value: u64) -> GrallocResult<u64> {
    align_to(value, GRALLOC_SIZE_4K)
}

/// Size of the meta plane of a compressed RGB surface: one byte per block, with the block grid
/// padded to 64 columns and 16 rows.
pub fn rgb_meta_size(
    aligned_width: u32,
    aligned_height: u32,
    bytes_per_pixel: u32,
) -> GrallocResult<u64> {
    let (block_w, block_h) = compressed_block_footprint(bytes_per_pixel)?;
    let columns = align_to((aligned_width as u64).div_ceil(block_w as u64), 64)?;
    let rows = align_to((aligned_height as u64).div_ceil(block_h as u64), 16)?;
    align_4k(checked_mul(columns, rows)?)
}

fn rgb_meta_stride(aligned_width: u32, bytes_per_pixel: u32) -> GrallocResult<u64> {
    let (block_w, _) = compressed_block_footprint(bytes_per_pixel)?;
    align_to((aligned_width as u64).div_ceil(block_w as u64), 64)
}

fn validate(width: u32, height: u32, info: &FormatInfo) -> GrallocResult<()> {
    if width == 0 || height == 0 {
        return Err(GrallocError::InvalidArgument("zero width or height"));
    }

    if info.size == SizeFormula::Blob && height != 1 {
        return Err(GrallocError::InvalidArgument("blob height must be 1"));
    }

    if info.even_width && width % 2 != 0 {
        return Err(GrallocError::InvalidArgument("width must be even"));
    }

    if info.even_height && height % 2 != 0 {
        return Err(GrallocError::InvalidArgument("height must be even"));
    }

    Ok(())
}

/// Total size of a linear buffer.
fn linear_size(
    width: u32,
    height: u32,
    aligned_width: u32,
    aligned_height: u32,
    info: &FormatInfo,
) -> GrallocResult<u64> {
    let aw = aligned_width as u64;
    let ah = aligned_height as u64;
    let luma = checked_mul(aw, ah)?;

    let size = match info.size {
        SizeFormula::Packed => align_4k(checked_mul(luma, info.bytes_per_pixel as u64)?)?,
        SizeFormula::SemiPlanar420 => align_4k(checked_add(checked_add(luma, luma / 2)?, 1)?)?,
        SizeFormula::SemiPlanarAdreno => {
            let chroma_w = align_to(width as u64 / 2, 32)?;
            let chroma_h = align_to(height as u64 / 2, 32)?;
            let chroma = checked_mul(checked_mul(chroma_w, chroma_h)?, 2)?;
            checked_add(align_4k(luma)?, align_4k(chroma)?)?
        }
        SizeFormula::SemiPlanarTiled => {
            let chroma = checked_mul(aw, align_to(height as u64 / 2, 32)?)?;
            checked_add(
                align_to(luma, GRALLOC_SIZE_8K)?,
                align_to(chroma, GRALLOC_SIZE_8K)?,
            )?
        }
        SizeFormula::Planar420 => {
            let c_stride = align_to(aw / 2, 16)?;
            let chroma = checked_mul(checked_mul(c_stride, ah / 2)?, 2)?;
            align_4k(checked_add(luma, chroma)?)?
        }
        SizeFormula::Yuv422 => align_4k(checked_mul(luma, 2)?)?,
        SizeFormula::P010 => align_4k(checked_add(checked_mul(luma, 3)?, 1)?)?,
        SizeFormula::Zsl => align_4k(checked_mul(luma, 3)? / 2)?,
        SizeFormula::Venus(color) => color.buffer_size(width, height)?,
        SizeFormula::Blob => width as u64,
    };

    Ok(size)
}

fn linear_planes(
    aligned_width: u32,
    aligned_height: u32,
    info: &FormatInfo,
) -> GrallocResult<Vec<PlaneDescriptor>> {
    let aw = aligned_width as u64;
    let ah = aligned_height as u64;
    let bpp = info.bytes_per_pixel as u64;
    let y_stride = checked_mul(aw, bpp)?;

    let planes = match info.planes {
        PlaneLayout::Single => vec![PlaneDescriptor::new(PlaneRole::Combined, y_stride, 0)],
        PlaneLayout::SemiPlanar(order) => {
            let chroma_offset = match info.size {
                SizeFormula::SemiPlanarAdreno => align_4k(checked_mul(aw, ah)?)?,
                SizeFormula::SemiPlanarTiled => align_to(checked_mul(aw, ah)?, GRALLOC_SIZE_8K)?,
                _ => checked_mul(y_stride, ah)?,
            };
            vec![
                PlaneDescriptor::new(PlaneRole::Luma, y_stride, 0),
                PlaneDescriptor::new(PlaneRole::Chroma(order), y_stride, chroma_offset),
            ]
        }
        PlaneLayout::PlanarCrCb => {
            let c_stride = align_to(aw / 2, 16)?;
            let cr_offset = checked_mul(aw, ah)?;
            let cb_offset = checked_add(cr_offset, checked_mul(c_stride, ah / 2)?)?;
            vec![
                PlaneDescriptor::new(PlaneRole::Luma, aw, 0),
                PlaneDescriptor::new(PlaneRole::Chroma(ChromaOrder::Cr), c_stride, cr_offset),
                PlaneDescriptor::new(PlaneRole::Chroma(ChromaOrder::Cb), c_stride, cb_offset),
            ]
        }
        PlaneLayout::Venus(..) => {
            return Err(GrallocError::InvalidArgument(
                "video planes depend on the unaligned size",
            ))
        }
    };

    Ok(planes)
}

fn venus_planes(
    color: VenusColorFormat,
    order: ChromaOrder,
    width: u32,
    height: u32,
) -> GrallocResult<Vec<PlaneDescriptor>> {
    let planes = color.planes(width, height)?;
    let sizes = color.plane_sizes(width, height)?;

    if !color.is_compressed() {
        return Ok(vec![
            PlaneDescriptor::new(PlaneRole::Luma, planes.y_stride, 0),
            PlaneDescriptor::new(
                PlaneRole::Chroma(order),
                planes.uv_stride,
                checked_mul(planes.y_stride, planes.y_scanlines)?,
            ),
        ]);
    }

    let y_offset = sizes.y_meta;
    let uv_meta_offset = checked_add(y_offset, sizes.y)?;
    let uv_offset = checked_add(uv_meta_offset, sizes.uv_meta)?;
    Ok(vec![
        PlaneDescriptor::new(PlaneRole::Meta, planes.y_meta_stride, 0),
        PlaneDescriptor::new(PlaneRole::Luma, planes.y_stride, y_offset),
        PlaneDescriptor::new(PlaneRole::Meta, planes.uv_meta_stride, uv_meta_offset),
        PlaneDescriptor::new(PlaneRole::Chroma(order), planes.uv_stride, uv_offset),
    ])
}

/// Computes the geometry of a `width` x `height` buffer of `format` given its aligned
/// dimensions.  A pure function of its arguments.
pub fn compute_layout(
    width: u32,
    height: u32,
    format: PixelFormat,
    aligned_width: u32,
    aligned_height: u32,
    tiling: Tiling,
) -> GrallocResult<BufferGeometry> {
    let info = format.info()?;
    validate(width, height, info)?;

    let tiling = match info.compression {
        Compression::Always => Tiling::BlockCompressedTiled,
        Compression::Never => Tiling::Linear,
        Compression::DisplayCapable => tiling,
    };

    let (size, planes) = match (info.planes, tiling) {
        (PlaneLayout::Venus(color, order), tiling) => {
            let color = match tiling {
                Tiling::BlockCompressedTiled => color.compressed(),
                Tiling::Linear => color,
            };
            (
                color.buffer_size(width, height)?,
                venus_planes(color, order, width, height)?,
            )
        }
        (PlaneLayout::Single, Tiling::BlockCompressedTiled) => {
            let bpp = info.bytes_per_pixel;
            let meta = rgb_meta_size(aligned_width, aligned_height, bpp)?;
            let stride = checked_mul(aligned_width as u64, bpp as u64)?;
            let data = align_4k(checked_mul(stride, aligned_height as u64)?)?;
            (
                checked_add(data, meta)?,
                vec![
                    PlaneDescriptor::new(
                        PlaneRole::Meta,
                        rgb_meta_stride(aligned_width, bpp)?,
                        0,
                    ),
                    PlaneDescriptor::new(PlaneRole::Combined, stride, meta),
                ],
            )
        }
        (_, Tiling::BlockCompressedTiled) => {
            return Err(GrallocError::UnsupportedFormat(format));
        }
        (_, Tiling::Linear) => (
            linear_size(width, height, aligned_width, aligned_height, info)?,
            linear_planes(aligned_width, aligned_height, info)?,
        ),
    };

    Ok(BufferGeometry {
        format,
        aligned_width,
        aligned_height,
        size,
        tiling,
        planes,
    })
}
