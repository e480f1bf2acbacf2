// Copyright 2021 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! formats: Pixel format identifiers and the per-format table driving alignment, size and plane
//! layout calculations.

use std::fmt;

use crate::gralloc_utils::*;
use crate::venus::VenusColorFormat;

/// GPU format identifiers understood by the vendor geometry library.
pub const ADRENO_PIXELFORMAT_UNKNOWN: u32 = 0;
pub const ADRENO_PIXELFORMAT_R10G10B10A2_UNORM: u32 = 24;
pub const ADRENO_PIXELFORMAT_R8G8B8A8: u32 = 28;
pub const ADRENO_PIXELFORMAT_B5G6R5: u32 = 85;
pub const ADRENO_PIXELFORMAT_NV12: u32 = 103;
pub const ADRENO_PIXELFORMAT_P010: u32 = 104;
pub const ADRENO_PIXELFORMAT_NV12_EXT: u32 = 506;
pub const ADRENO_PIXELFORMAT_R8G8B8X8: u32 = 507;
pub const ADRENO_PIXELFORMAT_A2B10G10R10_UNORM: u32 = 532;
pub const ADRENO_PIXELFORMAT_R10G10B10X2_UNORM: u32 = 537;
pub const ADRENO_PIXELFORMAT_R5G6B5: u32 = 610;
pub const ADRENO_PIXELFORMAT_TP10: u32 = 654;

/// A pixel format identifier, numbered like the Android HAL formats.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct PixelFormat(pub u32);

impl PixelFormat {
    pub const RGBA_8888: PixelFormat = PixelFormat(0x1);
    pub const RGBX_8888: PixelFormat = PixelFormat(0x2);
    pub const RGB_888: PixelFormat = PixelFormat(0x3);
    pub const RGB_565: PixelFormat = PixelFormat(0x4);
    pub const BGRA_8888: PixelFormat = PixelFormat(0x5);
    pub const RGBA_5551: PixelFormat = PixelFormat(0x6);
    pub const RGBA_4444: PixelFormat = PixelFormat(0x7);
    pub const YCBCR_422_SP: PixelFormat = PixelFormat(0x10);
    pub const YCRCB_420_SP: PixelFormat = PixelFormat(0x11);
    pub const YCBCR_422_I: PixelFormat = PixelFormat(0x14);
    pub const RGBA_FP16: PixelFormat = PixelFormat(0x16);
    pub const RAW16: PixelFormat = PixelFormat(0x20);
    pub const BLOB: PixelFormat = PixelFormat(0x21);
    pub const IMPLEMENTATION_DEFINED: PixelFormat = PixelFormat(0x22);
    pub const YCBCR_420_888: PixelFormat = PixelFormat(0x23);
    pub const RAW_OPAQUE: PixelFormat = PixelFormat(0x24);
    pub const RAW10: PixelFormat = PixelFormat(0x25);
    pub const RAW12: PixelFormat = PixelFormat(0x26);
    pub const RGBA_1010102: PixelFormat = PixelFormat(0x2b);
    pub const NV12_ENCODEABLE: PixelFormat = PixelFormat(0x102);
    pub const YCBCR_420_SP: PixelFormat = PixelFormat(0x109);
    pub const YCRCB_422_SP: PixelFormat = PixelFormat(0x10b);
    pub const BGRX_8888: PixelFormat = PixelFormat(0x112);
    pub const NV21_ZSL: PixelFormat = PixelFormat(0x113);
    pub const YCRCB_420_SP_VENUS: PixelFormat = PixelFormat(0x114);
    pub const BGR_565: PixelFormat = PixelFormat(0x115);
    pub const RGBX_1010102: PixelFormat = PixelFormat(0x118);
    pub const ABGR_2101010: PixelFormat = PixelFormat(0x11b);
    pub const YCBCR_420_P010: PixelFormat = PixelFormat(0x11f);
    pub const CBYCRY_422_I: PixelFormat = PixelFormat(0x120);
    pub const RAW8: PixelFormat = PixelFormat(0x123);
    pub const YCBCR_420_P010_UBWC: PixelFormat = PixelFormat(0x124);
    pub const Y8: PixelFormat = PixelFormat(0x2020_3859);
    pub const Y16: PixelFormat = PixelFormat(0x2036_3159);
    pub const YV12: PixelFormat = PixelFormat(0x3231_5659);
    pub const YCRCB_420_SP_ADRENO: PixelFormat = PixelFormat(0x7fa3_0c01);
    pub const YCBCR_420_SP_TILED: PixelFormat = PixelFormat(0x7fa3_0c03);
    pub const YCBCR_420_SP_VENUS: PixelFormat = PixelFormat(0x7fa3_0c04);
    pub const YCBCR_420_SP_VENUS_UBWC: PixelFormat = PixelFormat(0x7fa3_0c06);
    pub const YCBCR_420_TP10_UBWC: PixelFormat = PixelFormat(0x7fa3_0c09);
}

/// Broad class of a format.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FormatFamily {
    Rgb,
    Yuv,
    /// Camera sensor and single-channel formats.
    Raw,
    /// Opaque byte containers laid out as a 1xN image.
    Blob,
}

/// Rule producing the aligned width and height of a format.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AlignmentRule {
    /// GPU geometry authority, or the 32x32 fallback.
    Gpu,
    /// Fixed pixel units.
    Pixels { width: u32, height: u32 },
    /// Bit-packed sensor rows: the width becomes a byte count rounded to 8.
    RawPacked { bits: u32 },
    /// Video subsystem strides and scanlines.
    Venus(VenusColorFormat),
    /// Dimensions are used as given.
    Unaligned,
}

/// Formula for the total byte size of a linear buffer, evaluated on aligned dimensions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SizeFormula {
    /// width * height * bytes per pixel.
    Packed,
    /// Luma plane plus half-height chroma plane, one guard byte.
    SemiPlanar420,
    /// Luma plane and a 32-aligned chroma plane, each page aligned.
    SemiPlanarAdreno,
    /// Luma plane and chroma plane each aligned to 8 KiB.
    SemiPlanarTiled,
    /// Luma plane and two quarter-size planes with 16-aligned stride.
    Planar420,
    /// Two bytes per pixel 4:2:2.
    Yuv422,
    /// 16-bit luma, 16-bit interleaved chroma, one guard byte.
    P010,
    /// Zero shutter lag camera buffers: 12 bits per pixel.
    Zsl,
    Venus(VenusColorFormat),
    /// width bytes, height must be one.
    Blob,
}

/// Chroma channel order inside an interleaved chroma plane, or the channel of a planar one.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ChromaOrder {
    CbCr,
    CrCb,
    Cb,
    Cr,
}

/// Plane arrangement of a format in memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PlaneLayout {
    /// A single plane of packed pixels.
    Single,
    /// Luma plane followed by an interleaved chroma plane.
    SemiPlanar(ChromaOrder),
    /// Luma plane followed by Cr then Cb quarter-size planes.
    PlanarCrCb,
    /// Video subsystem luma and chroma planes separated by whole scanlines.
    Venus(VenusColorFormat, ChromaOrder),
}

/// Whether a format may use the block-compressed tiled layout.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Compression {
    Never,
    /// Compressed only if the display pipeline accepts it and the request asks for it.
    DisplayCapable,
    /// The format is compressed by definition.
    Always,
}

/// Static properties of a concrete pixel format.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FormatInfo {
    pub family: FormatFamily,
    pub bytes_per_pixel: u32,
    pub alignment: AlignmentRule,
    pub size: SizeFormula,
    pub planes: PlaneLayout,
    pub compression: Compression,
    pub gpu_format: u32,
    pub even_width: bool,
    pub even_height: bool,
}

const fn rgb(bytes_per_pixel: u32, compression: Compression, gpu_format: u32) -> FormatInfo {
    FormatInfo {
        family: FormatFamily::Rgb,
        bytes_per_pixel,
        alignment: AlignmentRule::Gpu,
        size: SizeFormula::Packed,
        planes: PlaneLayout::Single,
        compression,
        gpu_format,
        even_width: false,
        even_height: false,
    }
}

const fn semi_planar(align: u32, size: SizeFormula, order: ChromaOrder) -> FormatInfo {
    FormatInfo {
        family: FormatFamily::Yuv,
        bytes_per_pixel: 1,
        alignment: AlignmentRule::Pixels {
            width: align,
            height: 1,
        },
        size,
        planes: PlaneLayout::SemiPlanar(order),
        compression: Compression::Never,
        gpu_format: ADRENO_PIXELFORMAT_UNKNOWN,
        even_width: false,
        even_height: false,
    }
}

const fn venus(
    color: VenusColorFormat,
    order: ChromaOrder,
    compression: Compression,
    gpu_format: u32,
) -> FormatInfo {
    FormatInfo {
        family: FormatFamily::Yuv,
        bytes_per_pixel: 1,
        alignment: AlignmentRule::Venus(color),
        size: SizeFormula::Venus(color),
        planes: PlaneLayout::Venus(color, order),
        compression,
        gpu_format,
        even_width: false,
        even_height: false,
    }
}

const fn raw(bytes_per_pixel: u32, alignment: AlignmentRule) -> FormatInfo {
    FormatInfo {
        family: FormatFamily::Raw,
        bytes_per_pixel,
        alignment,
        size: SizeFormula::Packed,
        planes: PlaneLayout::Single,
        compression: Compression::Never,
        gpu_format: ADRENO_PIXELFORMAT_UNKNOWN,
        even_width: false,
        even_height: false,
    }
}

static RGBA_8888_INFO: FormatInfo = rgb(4, Compression::DisplayCapable, ADRENO_PIXELFORMAT_R8G8B8A8);
static RGBX_8888_INFO: FormatInfo = rgb(4, Compression::DisplayCapable, ADRENO_PIXELFORMAT_R8G8B8X8);
static BGRA_8888_INFO: FormatInfo = rgb(4, Compression::Never, ADRENO_PIXELFORMAT_UNKNOWN);
static RGB_888_INFO: FormatInfo = rgb(3, Compression::Never, ADRENO_PIXELFORMAT_UNKNOWN);
static RGB_565_INFO: FormatInfo = rgb(2, Compression::Never, ADRENO_PIXELFORMAT_B5G6R5);
static BGR_565_INFO: FormatInfo = rgb(2, Compression::DisplayCapable, ADRENO_PIXELFORMAT_R5G6B5);
static RGBA_16BIT_INFO: FormatInfo = rgb(2, Compression::Never, ADRENO_PIXELFORMAT_UNKNOWN);
static RGBA_FP16_INFO: FormatInfo = rgb(8, Compression::Never, ADRENO_PIXELFORMAT_UNKNOWN);
static RGBA_1010102_INFO: FormatInfo = rgb(
    4,
    Compression::DisplayCapable,
    ADRENO_PIXELFORMAT_R10G10B10A2_UNORM,
);
static RGBX_1010102_INFO: FormatInfo = rgb(
    4,
    Compression::DisplayCapable,
    ADRENO_PIXELFORMAT_R10G10B10X2_UNORM,
);
static ABGR_2101010_INFO: FormatInfo =
    rgb(4, Compression::Never, ADRENO_PIXELFORMAT_A2B10G10R10_UNORM);

static NV12_INFO: FormatInfo = semi_planar(32, SizeFormula::SemiPlanar420, ChromaOrder::CbCr);
static NV21_INFO: FormatInfo = semi_planar(32, SizeFormula::SemiPlanar420, ChromaOrder::CrCb);
static NV21_ADRENO_INFO: FormatInfo =
    semi_planar(32, SizeFormula::SemiPlanarAdreno, ChromaOrder::CrCb);
static NV16_INFO: FormatInfo = FormatInfo {
    even_width: true,
    ..semi_planar(16, SizeFormula::Yuv422, ChromaOrder::CbCr)
};
static NV61_INFO: FormatInfo = FormatInfo {
    even_width: true,
    ..semi_planar(16, SizeFormula::Yuv422, ChromaOrder::CrCb)
};

static NV12_TILED_INFO: FormatInfo = FormatInfo {
    alignment: AlignmentRule::Pixels {
        width: 128,
        height: 32,
    },
    ..semi_planar(128, SizeFormula::SemiPlanarTiled, ChromaOrder::CbCr)
};

static NV21_ZSL_INFO: FormatInfo = FormatInfo {
    alignment: AlignmentRule::Pixels {
        width: 64,
        height: 64,
    },
    ..semi_planar(64, SizeFormula::Zsl, ChromaOrder::CrCb)
};

static P010_INFO: FormatInfo = FormatInfo {
    bytes_per_pixel: 2,
    gpu_format: ADRENO_PIXELFORMAT_P010,
    ..semi_planar(16, SizeFormula::P010, ChromaOrder::CbCr)
};

static YV12_INFO: FormatInfo = FormatInfo {
    planes: PlaneLayout::PlanarCrCb,
    even_width: true,
    even_height: true,
    ..semi_planar(16, SizeFormula::Planar420, ChromaOrder::CrCb)
};

static YUV_422_I_INFO: FormatInfo = FormatInfo {
    bytes_per_pixel: 2,
    planes: PlaneLayout::Single,
    even_width: true,
    ..semi_planar(16, SizeFormula::Yuv422, ChromaOrder::CbCr)
};

static NV12_ENCODEABLE_INFO: FormatInfo = venus(
    VenusColorFormat::Nv12,
    ChromaOrder::CbCr,
    Compression::DisplayCapable,
    ADRENO_PIXELFORMAT_NV12,
);
static NV12_VENUS_INFO: FormatInfo = venus(
    VenusColorFormat::Nv12,
    ChromaOrder::CbCr,
    Compression::DisplayCapable,
    ADRENO_PIXELFORMAT_NV12_EXT,
);
static NV21_VENUS_INFO: FormatInfo = venus(
    VenusColorFormat::Nv21,
    ChromaOrder::CrCb,
    Compression::Never,
    ADRENO_PIXELFORMAT_UNKNOWN,
);
static NV12_UBWC_INFO: FormatInfo = venus(
    VenusColorFormat::Nv12Ubwc,
    ChromaOrder::CbCr,
    Compression::Always,
    ADRENO_PIXELFORMAT_NV12_EXT,
);
static TP10_UBWC_INFO: FormatInfo = FormatInfo {
    bytes_per_pixel: 2,
    ..venus(
        VenusColorFormat::Nv12Bpp10Ubwc,
        ChromaOrder::CbCr,
        Compression::Always,
        ADRENO_PIXELFORMAT_TP10,
    )
};
static P010_UBWC_INFO: FormatInfo = FormatInfo {
    bytes_per_pixel: 2,
    ..venus(
        VenusColorFormat::P010Ubwc,
        ChromaOrder::CbCr,
        Compression::Always,
        ADRENO_PIXELFORMAT_P010,
    )
};

static RAW16_INFO: FormatInfo = raw(
    2,
    AlignmentRule::Pixels {
        width: 16,
        height: 1,
    },
);
static RAW12_INFO: FormatInfo = raw(1, AlignmentRule::RawPacked { bits: 12 });
static RAW10_INFO: FormatInfo = raw(1, AlignmentRule::RawPacked { bits: 10 });
static RAW8_INFO: FormatInfo = raw(
    1,
    AlignmentRule::Pixels {
        width: 8,
        height: 1,
    },
);
static Y8_INFO: FormatInfo = raw(
    1,
    AlignmentRule::Pixels {
        width: 16,
        height: 1,
    },
);

static BLOB_INFO: FormatInfo = FormatInfo {
    family: FormatFamily::Blob,
    bytes_per_pixel: 1,
    alignment: AlignmentRule::Unaligned,
    size: SizeFormula::Blob,
    planes: PlaneLayout::Single,
    compression: Compression::Never,
    gpu_format: ADRENO_PIXELFORMAT_UNKNOWN,
    even_width: false,
    even_height: false,
};

impl PixelFormat {
    /// Returns the static properties of a concrete format.  Placeholder formats have none and
    /// must be resolved first.
    pub fn info(&self) -> GrallocResult<&'static FormatInfo> {
        match *self {
            PixelFormat::RGBA_8888 => Ok(&RGBA_8888_INFO),
            PixelFormat::RGBX_8888 => Ok(&RGBX_8888_INFO),
            PixelFormat::BGRA_8888 | PixelFormat::BGRX_8888 => Ok(&BGRA_8888_INFO),
            PixelFormat::RGB_888 => Ok(&RGB_888_INFO),
            PixelFormat::RGB_565 => Ok(&RGB_565_INFO),
            PixelFormat::BGR_565 => Ok(&BGR_565_INFO),
            PixelFormat::RGBA_5551 | PixelFormat::RGBA_4444 => Ok(&RGBA_16BIT_INFO),
            PixelFormat::RGBA_FP16 => Ok(&RGBA_FP16_INFO),
            PixelFormat::RGBA_1010102 => Ok(&RGBA_1010102_INFO),
            PixelFormat::RGBX_1010102 => Ok(&RGBX_1010102_INFO),
            PixelFormat::ABGR_2101010 => Ok(&ABGR_2101010_INFO),
            PixelFormat::YCBCR_420_SP => Ok(&NV12_INFO),
            PixelFormat::YCRCB_420_SP => Ok(&NV21_INFO),
            PixelFormat::YCRCB_420_SP_ADRENO => Ok(&NV21_ADRENO_INFO),
            PixelFormat::YCBCR_420_SP_TILED => Ok(&NV12_TILED_INFO),
            PixelFormat::NV21_ZSL => Ok(&NV21_ZSL_INFO),
            PixelFormat::YCBCR_422_SP => Ok(&NV16_INFO),
            PixelFormat::YCRCB_422_SP => Ok(&NV61_INFO),
            PixelFormat::YCBCR_422_I | PixelFormat::CBYCRY_422_I => Ok(&YUV_422_I_INFO),
            PixelFormat::YCBCR_420_P010 => Ok(&P010_INFO),
            PixelFormat::YV12 => Ok(&YV12_INFO),
            PixelFormat::NV12_ENCODEABLE => Ok(&NV12_ENCODEABLE_INFO),
            PixelFormat::YCBCR_420_SP_VENUS => Ok(&NV12_VENUS_INFO),
            PixelFormat::YCRCB_420_SP_VENUS => Ok(&NV21_VENUS_INFO),
            PixelFormat::YCBCR_420_SP_VENUS_UBWC => Ok(&NV12_UBWC_INFO),
            PixelFormat::YCBCR_420_TP10_UBWC => Ok(&TP10_UBWC_INFO),
            PixelFormat::YCBCR_420_P010_UBWC => Ok(&P010_UBWC_INFO),
            PixelFormat::RAW16 | PixelFormat::Y16 => Ok(&RAW16_INFO),
            PixelFormat::RAW12 => Ok(&RAW12_INFO),
            PixelFormat::RAW10 => Ok(&RAW10_INFO),
            PixelFormat::RAW8 => Ok(&RAW8_INFO),
            PixelFormat::Y8 => Ok(&Y8_INFO),
            PixelFormat::BLOB | PixelFormat::RAW_OPAQUE => Ok(&BLOB_INFO),
            _ => Err(GrallocError::UnsupportedFormat(*self)),
        }
    }

    /// Returns true if the format is a placeholder resolved from usage at allocation time.
    pub fn is_placeholder(&self) -> bool {
        *self == PixelFormat::IMPLEMENTATION_DEFINED || *self == PixelFormat::YCBCR_420_888
    }

    /// Returns true for uncompressed RGB formats.
    pub fn is_rgb(&self) -> bool {
        matches!(self.info(), Ok(info) if info.family == FormatFamily::Rgb)
    }

    /// Returns true for YUV formats.
    pub fn is_yuv(&self) -> bool {
        matches!(self.info(), Ok(info) if info.family == FormatFamily::Yuv)
    }

    fn name(&self) -> Option<&'static str> {
        let name = match *self {
            PixelFormat::RGBA_8888 => "RGBA_8888",
            PixelFormat::RGBX_8888 => "RGBX_8888",
            PixelFormat::RGB_888 => "RGB_888",
            PixelFormat::RGB_565 => "RGB_565",
            PixelFormat::BGRA_8888 => "BGRA_8888",
            PixelFormat::RGBA_5551 => "RGBA_5551",
            PixelFormat::RGBA_4444 => "RGBA_4444",
            PixelFormat::YCBCR_422_SP => "YCbCr_422_SP",
            PixelFormat::YCRCB_420_SP => "YCrCb_420_SP",
            PixelFormat::YCBCR_422_I => "YCbCr_422_I",
            PixelFormat::RGBA_FP16 => "RGBA_FP16",
            PixelFormat::RAW16 => "RAW16",
            PixelFormat::BLOB => "BLOB",
            PixelFormat::IMPLEMENTATION_DEFINED => "IMPLEMENTATION_DEFINED",
            PixelFormat::YCBCR_420_888 => "YCbCr_420_888",
            PixelFormat::RAW_OPAQUE => "RAW_OPAQUE",
            PixelFormat::RAW10 => "RAW10",
            PixelFormat::RAW12 => "RAW12",
            PixelFormat::RGBA_1010102 => "RGBA_1010102",
            PixelFormat::NV12_ENCODEABLE => "NV12_ENCODEABLE",
            PixelFormat::YCBCR_420_SP => "YCbCr_420_SP",
            PixelFormat::YCRCB_422_SP => "YCrCb_422_SP",
            PixelFormat::BGRX_8888 => "BGRX_8888",
            PixelFormat::NV21_ZSL => "NV21_ZSL",
            PixelFormat::YCRCB_420_SP_VENUS => "YCrCb_420_SP_VENUS",
            PixelFormat::BGR_565 => "BGR_565",
            PixelFormat::RGBX_1010102 => "RGBX_1010102",
            PixelFormat::ABGR_2101010 => "ABGR_2101010",
            PixelFormat::YCBCR_420_P010 => "YCbCr_420_P010",
            PixelFormat::CBYCRY_422_I => "CbYCrY_422_I",
            PixelFormat::RAW8 => "RAW8",
            PixelFormat::YCBCR_420_P010_UBWC => "YCbCr_420_P010_UBWC",
            PixelFormat::Y8 => "Y8",
            PixelFormat::Y16 => "Y16",
            PixelFormat::YV12 => "YV12",
            PixelFormat::YCRCB_420_SP_ADRENO => "YCrCb_420_SP_ADRENO",
            PixelFormat::YCBCR_420_SP_TILED => "YCbCr_420_SP_TILED",
            PixelFormat::YCBCR_420_SP_VENUS => "YCbCr_420_SP_VENUS",
            PixelFormat::YCBCR_420_SP_VENUS_UBWC => "YCbCr_420_SP_VENUS_UBWC",
            PixelFormat::YCBCR_420_TP10_UBWC => "YCbCr_420_TP10_UBWC",
            _ => return None,
        };
        Some(name)
    }
}

impl From<u32> for PixelFormat {
    fn from(u: u32) -> PixelFormat {
        PixelFormat(u)
    }
}

impl From<PixelFormat> for u32 {
    fn from(f: PixelFormat) -> u32 {
        f.0
    }
}

impl fmt::Debug for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "format(0x{:x})", self.0),
        }
    }
}
