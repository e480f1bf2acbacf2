// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! alignment: Aligned width and height of a buffer.  RGB formats defer to a GPU geometry
//! authority, every other family uses fixed per-format rules.

use std::sync::Arc;

use log::info;
use log::warn;

use crate::adreno::AdrenoUtils;
use crate::checked_arithmetic;
use crate::config::GrallocConfig;
use crate::formats::*;
use crate::gralloc_utils::*;

/// Alignment in pixels used for RGB formats when no GPU library is available.
pub const FALLBACK_ALIGNMENT: u32 = 32;

/// Surface padding threshold handed to the GPU library.
pub const PADDING_THRESHOLD: u32 = 512;

/// Raster mode handed to the GPU library.
pub const RASTER_MODE: u32 = 0;

/// Vendor rules for GPU-friendly surface geometry.
pub trait GpuGeometryAuthority: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the aligned width and height, or None if the authority has no answer and the
    /// fallback rule should apply.
    fn aligned_width_height(
        &self,
        width: u32,
        height: u32,
        bpp: u32,
        tiled: bool,
        raster_mode: u32,
        padding_threshold: u32,
    ) -> Option<(u32, u32)>;

    /// Returns true if the GPU can sample or render `gpu_format` in the compressed tiled layout.
    fn is_compressed_tiling_supported(&self, gpu_format: u32) -> bool;
}

/// Fixed 32x32 alignment, no compressed tiling support.
pub struct FallbackGeometry;

impl FallbackGeometry {
    fn align(width: u32, height: u32) -> GrallocResult<(u32, u32)> {
        let width = align_to(width as u64, FALLBACK_ALIGNMENT as u64)?;
        let height = align_to(height as u64, FALLBACK_ALIGNMENT as u64)?;
        Ok((to_u32(width)?, to_u32(height)?))
    }
}

impl GpuGeometryAuthority for FallbackGeometry {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn aligned_width_height(
        &self,
        width: u32,
        height: u32,
        _bpp: u32,
        _tiled: bool,
        _raster_mode: u32,
        _padding_threshold: u32,
    ) -> Option<(u32, u32)> {
        FallbackGeometry::align(width, height).ok()
    }

    fn is_compressed_tiling_supported(&self, _gpu_format: u32) -> bool {
        false
    }
}

/// Pixel footprint of one compression block for a given bytes-per-pixel class.
pub fn compressed_block_footprint(bytes_per_pixel: u32) -> GrallocResult<(u32, u32)> {
    match bytes_per_pixel {
        2 | 4 => Ok((16, 4)),
        8 => Ok((8, 4)),
        16 => Ok((4, 4)),
        _ => Err(GrallocError::InvalidArgument(
            "no compression block for pixel size",
        )),
    }
}

/// Compressed RGB surfaces are a whole number of 4x4 block macro tiles.
const MACRO_TILE_BLOCKS: u32 = 4;

fn to_u32(value: u64) -> GrallocResult<u32> {
    Ok(u32::try_from(value)?)
}

/// Chooses the geometry authority once and applies the alignment rules.
pub struct AlignmentProvider {
    authority: Arc<dyn GpuGeometryAuthority>,
}

impl AlignmentProvider {
    /// Selects the authority: the fallback if disabled by `config`, else `custom`, else the
    /// vendor library named by `config`.  A library that fails to load selects the fallback.
    pub fn new(
        config: &GrallocConfig,
        custom: Option<Arc<dyn GpuGeometryAuthority>>,
    ) -> AlignmentProvider {
        let authority: Arc<dyn GpuGeometryAuthority> = if config.disable_gpu_authority {
            Arc::new(FallbackGeometry)
        } else if let Some(custom) = custom {
            custom
        } else {
            match AdrenoUtils::load(&config.gpu_library) {
                Ok(adreno) => Arc::new(adreno),
                Err(e) => {
                    warn!("GPU geometry library unavailable, using fallback alignment: {}", e);
                    Arc::new(FallbackGeometry)
                }
            }
        };

        info!("using {} geometry authority", authority.name());
        AlignmentProvider { authority }
    }

    /// Provider that always uses `authority`.
    pub fn with_authority(authority: Arc<dyn GpuGeometryAuthority>) -> AlignmentProvider {
        AlignmentProvider { authority }
    }

    pub fn authority(&self) -> &Arc<dyn GpuGeometryAuthority> {
        &self.authority
    }

    fn gpu_aligned(
        &self,
        width: u32,
        height: u32,
        info: &FormatInfo,
        tiled: bool,
    ) -> GrallocResult<(u32, u32)> {
        let bpp = match info.bytes_per_pixel {
            3 => 3,
            2 => 2,
            _ => 4,
        };

        match self.authority.aligned_width_height(
            width,
            height,
            bpp,
            tiled,
            RASTER_MODE,
            PADDING_THRESHOLD,
        ) {
            Some(aligned) => Ok(aligned),
            None => FallbackGeometry::align(width, height),
        }
    }

    /// Returns the aligned width and height of a `width` x `height` buffer of `info`.  `tiled`
    /// selects the compressed layout.
    pub fn aligned_dimensions(
        &self,
        width: u32,
        height: u32,
        info: &FormatInfo,
        tiled: bool,
    ) -> GrallocResult<(u32, u32)> {
        if width == 0 || height == 0 {
            return Err(GrallocError::InvalidArgument("zero width or height"));
        }

        match info.alignment {
            AlignmentRule::Gpu => {
                let (aligned_w, aligned_h) = self.gpu_aligned(width, height, info, tiled)?;
                if !tiled {
                    return Ok((aligned_w, aligned_h));
                }

                let (block_w, block_h) = compressed_block_footprint(info.bytes_per_pixel)?;
                let tile_w = (block_w * MACRO_TILE_BLOCKS) as u64;
                let tile_h = (block_h * MACRO_TILE_BLOCKS) as u64;
                Ok((
                    to_u32(align_to(aligned_w as u64, tile_w)?)?,
                    to_u32(align_to(aligned_h as u64, tile_h)?)?,
                ))
            }
            AlignmentRule::Pixels {
                width: unit_w,
                height: unit_h,
            } => Ok((
                to_u32(align_to(width as u64, unit_w as u64)?)?,
                to_u32(align_to(height as u64, unit_h as u64)?)?,
            )),
            AlignmentRule::RawPacked { bits } => {
                let width = width as u64;
                let bits = bits as u64;
                let row_bits = checked_arithmetic!(width * bits)?;
                Ok((to_u32(align_to(row_bits / 8, 8)?)?, height))
            }
            AlignmentRule::Venus(color) => {
                let color = if tiled { color.compressed() } else { color };
                let (aligned_w, aligned_h) = color.aligned_dimensions(width, height)?;
                Ok((to_u32(aligned_w)?, to_u32(aligned_h)?))
            }
            AlignmentRule::Unaligned => Ok((width, height)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::*;

    /// Authority with 64 pixel alignment that reports compressed support for every GPU format.
    #[derive(Default)]
    pub struct MockAuthority {
        pub calls: AtomicUsize,
    }

    impl GpuGeometryAuthority for MockAuthority {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn aligned_width_height(
            &self,
            width: u32,
            height: u32,
            _bpp: u32,
            _tiled: bool,
            _raster_mode: u32,
            _padding_threshold: u32,
        ) -> Option<(u32, u32)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(((width + 63) & !63, (height + 63) & !63))
        }

        fn is_compressed_tiling_supported(&self, gpu_format: u32) -> bool {
            gpu_format != ADRENO_PIXELFORMAT_UNKNOWN
        }
    }

    fn fallback() -> AlignmentProvider {
        AlignmentProvider::with_authority(Arc::new(FallbackGeometry))
    }

    #[test]
    fn rgb_fallback() {
        let provider = fallback();
        let info = PixelFormat::RGBA_8888.info().unwrap();
        assert_eq!(
            provider.aligned_dimensions(1920, 1080, info, false).unwrap(),
            (1920, 1088)
        );
        assert_eq!(
            provider.aligned_dimensions(1, 1, info, false).unwrap(),
            (32, 32)
        );
    }

    struct DecliningAuthority;

    impl GpuGeometryAuthority for DecliningAuthority {
        fn name(&self) -> &'static str {
            "declining"
        }

        fn aligned_width_height(
            &self,
            _width: u32,
            _height: u32,
            _bpp: u32,
            _tiled: bool,
            _raster_mode: u32,
            _padding_threshold: u32,
        ) -> Option<(u32, u32)> {
            None
        }

        fn is_compressed_tiling_supported(&self, _gpu_format: u32) -> bool {
            false
        }
    }

    #[test]
    fn unalignable_width_fails() {
        let info = PixelFormat::RGBA_8888.info().unwrap();
        assert!(matches!(
            fallback().aligned_dimensions(u32::MAX - 10, 1, info, false),
            Err(GrallocError::TryFromIntError(_))
        ));

        let declining = AlignmentProvider::with_authority(Arc::new(DecliningAuthority));
        assert_eq!(
            declining.aligned_dimensions(100, 50, info, false).unwrap(),
            (128, 64)
        );
        assert!(declining
            .aligned_dimensions(u32::MAX - 10, 1, info, false)
            .is_err());
    }

    #[test]
    fn rgb_compressed_macro_tile() {
        let provider = fallback();
        let info = PixelFormat::RGBA_8888.info().unwrap();
        assert_eq!(
            provider.aligned_dimensions(1920, 1080, info, true).unwrap(),
            (1920, 1088)
        );
        assert_eq!(
            provider.aligned_dimensions(20, 20, info, true).unwrap(),
            (64, 32)
        );

        let fp16 = PixelFormat::RGBA_FP16.info().unwrap();
        assert_eq!(
            provider.aligned_dimensions(20, 20, fp16, true).unwrap(),
            (32, 32)
        );
    }

    #[test]
    fn yuv_never_consults_authority() {
        let mock = Arc::new(MockAuthority::default());
        let provider = AlignmentProvider::with_authority(mock.clone());

        let nv12 = PixelFormat::YCBCR_420_SP.info().unwrap();
        assert_eq!(
            provider.aligned_dimensions(1920, 1080, nv12, false).unwrap(),
            (1920, 1080)
        );
        let raw10 = PixelFormat::RAW10.info().unwrap();
        assert_eq!(
            provider.aligned_dimensions(4000, 3000, raw10, false).unwrap(),
            (5000, 3000)
        );
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);

        let rgb = PixelFormat::RGB_565.info().unwrap();
        assert_eq!(
            provider.aligned_dimensions(100, 100, rgb, false).unwrap(),
            (128, 128)
        );
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disabled_authority() {
        let config = GrallocConfig::default().set_disable_gpu_authority(true);
        let mock: Arc<dyn GpuGeometryAuthority> = Arc::new(MockAuthority::default());
        let provider = AlignmentProvider::new(&config, Some(mock));
        assert_eq!(provider.authority().name(), "fallback");
    }

    #[test]
    fn missing_library_falls_back() {
        let config = GrallocConfig::default().set_gpu_library("/nonexistent/libgpu.so");
        let provider = AlignmentProvider::new(&config, None);
        assert_eq!(provider.authority().name(), "fallback");
    }

    #[test]
    fn aligned_dimensions_cover_request() {
        let provider = fallback();
        let formats = [
            (PixelFormat::RGBA_8888, 32, 32),
            (PixelFormat::RGB_565, 32, 32),
            (PixelFormat::YCBCR_420_SP, 32, 1),
            (PixelFormat::YCRCB_420_SP_ADRENO, 32, 1),
            (PixelFormat::YCBCR_420_SP_TILED, 128, 32),
            (PixelFormat::NV21_ZSL, 64, 64),
            (PixelFormat::YV12, 16, 1),
            (PixelFormat::RAW16, 16, 1),
            (PixelFormat::RAW8, 8, 1),
            (PixelFormat::RAW12, 8, 1),
            (PixelFormat::YCBCR_420_SP_VENUS, 128, 32),
            (PixelFormat::YCBCR_420_SP_VENUS_UBWC, 128, 32),
        ];

        for (format, unit_w, unit_h) in formats {
            let info = format.info().unwrap();
            for (w, h) in [(1, 1), (31, 17), (176, 144), (1279, 719), (1920, 1080)] {
                let (aw, ah) = provider.aligned_dimensions(w, h, info, false).unwrap();
                assert!(aw >= w && ah >= h, "{:?} {}x{}", format, w, h);
                assert_eq!(aw % unit_w, 0, "{:?} {}x{}", format, w, h);
                assert_eq!(ah % unit_h, 0, "{:?} {}x{}", format, w, h);
            }
        }
    }

    #[test]
    fn zero_dimensions() {
        let info = PixelFormat::RGBA_8888.info().unwrap();
        assert!(matches!(
            fallback().aligned_dimensions(0, 10, info, false),
            Err(GrallocError::InvalidArgument(_))
        ));
    }
}
