// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! context: Allocator-wide state shared by the layout code: configuration, the chosen geometry
//! authority and the cached display capabilities.

use std::sync::Arc;

use log::debug;

use crate::alignment::AlignmentProvider;
use crate::alignment::GpuGeometryAuthority;
use crate::capability::DisplayCapabilities;
use crate::capability::FormatCapability;
use crate::config::GrallocConfig;
use crate::formats::PixelFormat;
use crate::gralloc_utils::*;
use crate::layout::compute_layout;
use crate::layout::BufferGeometry;
use crate::layout::Tiling;
use crate::usage::Usage;

pub struct GrallocContext {
    config: GrallocConfig,
    alignment: AlignmentProvider,
    capability: FormatCapability,
}

impl GrallocContext {
    pub fn new(
        config: GrallocConfig,
        authority: Option<Arc<dyn GpuGeometryAuthority>>,
        display: Box<dyn DisplayCapabilities>,
    ) -> GrallocContext {
        let alignment = AlignmentProvider::new(&config, authority);
        let capability = FormatCapability::new(&config, display, alignment.authority().clone());
        GrallocContext {
            config,
            alignment,
            capability,
        }
    }

    pub fn config(&self) -> &GrallocConfig {
        &self.config
    }

    pub fn alignment(&self) -> &AlignmentProvider {
        &self.alignment
    }

    pub fn capability(&self) -> &FormatCapability {
        &self.capability
    }

    /// Removes the compressed-tiling request from framebuffer usage unless enabled.
    pub fn adjust_usage(&self, usage: Usage) -> Usage {
        if usage.contains(Usage::HW_FB) && !self.config.enable_fb_compression {
            return usage - Usage::PRIVATE_ALLOC_UBWC;
        }

        usage
    }

    /// Maps a placeholder format to a concrete one based on `usage`.  Concrete formats are
    /// returned unchanged.
    pub fn resolve_format(&self, format: PixelFormat, usage: Usage) -> GrallocResult<PixelFormat> {
        if !format.is_placeholder() {
            return Ok(format);
        }

        let resolved = if usage.contains(Usage::PRIVATE_ALLOC_UBWC) {
            PixelFormat::YCBCR_420_SP_VENUS_UBWC
        } else if usage.contains(Usage::HW_VIDEO_ENCODER) {
            if self.capability.display_supports_compressed_writeback()
                && !self.capability.compression_disabled_for_encode()
                && usage.contains(Usage::HW_COMPOSER)
            {
                PixelFormat::YCBCR_420_SP_VENUS_UBWC
            } else {
                PixelFormat::NV12_ENCODEABLE
            }
        } else if usage.camera_zsl() {
            PixelFormat::NV21_ZSL
        } else if usage.contains(Usage::HW_CAMERA_READ) {
            PixelFormat::YCRCB_420_SP
        } else if usage.contains(Usage::HW_CAMERA_WRITE) {
            if format == PixelFormat::YCBCR_420_888 {
                PixelFormat::NV21_ZSL
            } else {
                PixelFormat::YCBCR_420_SP_VENUS
            }
        } else if usage.contains(Usage::HW_COMPOSER) {
            PixelFormat::RGBA_8888
        } else if format == PixelFormat::YCBCR_420_888 {
            PixelFormat::NV21_ZSL
        } else {
            return Err(GrallocError::UnsupportedFormat(format));
        };

        debug!("resolved {:?} with usage {:?} to {:?}", format, usage, resolved);
        Ok(resolved)
    }

    /// Selects the memory representation of `format` for `usage`.
    pub fn tiling(&self, format: PixelFormat, usage: Usage) -> Tiling {
        if self.capability.is_compressed_tiling_eligible(format, usage) {
            Tiling::BlockCompressedTiled
        } else {
            Tiling::Linear
        }
    }

    /// Returns the aligned width and height of a concrete format.
    pub fn get_aligned_dimensions(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: Usage,
    ) -> GrallocResult<(u32, u32)> {
        let info = format.info()?;
        let tiled = self.tiling(format, usage) == Tiling::BlockCompressedTiled;
        self.alignment
            .aligned_dimensions(width, height, info, tiled)
    }

    /// Computes the full geometry of a concrete format.
    pub fn compute_geometry(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: Usage,
    ) -> GrallocResult<BufferGeometry> {
        let info = format.info()?;
        let tiling = self.tiling(format, usage);
        let (aligned_width, aligned_height) = self.alignment.aligned_dimensions(
            width,
            height,
            info,
            tiling == Tiling::BlockCompressedTiled,
        )?;

        compute_layout(width, height, format, aligned_width, aligned_height, tiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::tests::MockAuthority;
    use crate::alignment::FallbackGeometry;
    use crate::capability::StaticDisplayCapabilities;
    use crate::layout::PlaneRole;

    fn context(config: GrallocConfig, display: StaticDisplayCapabilities) -> GrallocContext {
        GrallocContext::new(config, Some(Arc::new(FallbackGeometry)), Box::new(display))
    }

    fn full_display() -> StaticDisplayCapabilities {
        StaticDisplayCapabilities {
            compressed_tiling: true,
            compressed_writeback: true,
        }
    }

    #[test]
    fn placeholder_resolution() {
        let ctx = context(GrallocConfig::default(), full_display());
        let implementation = PixelFormat::IMPLEMENTATION_DEFINED;
        let flexible = PixelFormat::YCBCR_420_888;

        let cases = [
            (implementation, Usage::PRIVATE_ALLOC_UBWC, PixelFormat::YCBCR_420_SP_VENUS_UBWC),
            (
                implementation,
                Usage::HW_VIDEO_ENCODER | Usage::HW_COMPOSER,
                PixelFormat::YCBCR_420_SP_VENUS_UBWC,
            ),
            (implementation, Usage::HW_VIDEO_ENCODER, PixelFormat::NV12_ENCODEABLE),
            (implementation, Usage::HW_CAMERA_ZSL, PixelFormat::NV21_ZSL),
            (implementation, Usage::HW_CAMERA_READ, PixelFormat::YCRCB_420_SP),
            (implementation, Usage::HW_CAMERA_WRITE, PixelFormat::YCBCR_420_SP_VENUS),
            (flexible, Usage::HW_CAMERA_WRITE, PixelFormat::NV21_ZSL),
            (implementation, Usage::HW_COMPOSER, PixelFormat::RGBA_8888),
            (flexible, Usage::HW_TEXTURE, PixelFormat::NV21_ZSL),
            (PixelFormat::RGB_565, Usage::HW_VIDEO_ENCODER, PixelFormat::RGB_565),
        ];

        for (format, usage, expected) in cases {
            assert_eq!(ctx.resolve_format(format, usage).unwrap(), expected);
        }

        assert!(matches!(
            ctx.resolve_format(implementation, Usage::HW_TEXTURE),
            Err(GrallocError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn encoder_without_writeback() {
        let display = StaticDisplayCapabilities {
            compressed_tiling: true,
            compressed_writeback: false,
        };
        let ctx = context(GrallocConfig::default(), display);
        assert_eq!(
            ctx.resolve_format(
                PixelFormat::IMPLEMENTATION_DEFINED,
                Usage::HW_VIDEO_ENCODER | Usage::HW_COMPOSER
            )
            .unwrap(),
            PixelFormat::NV12_ENCODEABLE
        );
    }

    #[test]
    fn framebuffer_strips_compression() {
        let usage = Usage::HW_FB | Usage::PRIVATE_ALLOC_UBWC;
        let ctx = context(GrallocConfig::default(), full_display());
        assert_eq!(ctx.adjust_usage(usage), Usage::HW_FB);

        let ctx = context(
            GrallocConfig::default().set_enable_fb_compression(true),
            full_display(),
        );
        assert_eq!(ctx.adjust_usage(usage), usage);
    }

    #[test]
    fn compressed_rgb_geometry() {
        let ctx = context(GrallocConfig::default(), full_display());
        let usage = Usage::HW_COMPOSER | Usage::PRIVATE_ALLOC_UBWC;

        assert_eq!(
            ctx.get_aligned_dimensions(1920, 1080, PixelFormat::RGBA_8888, usage)
                .unwrap(),
            (1920, 1088)
        );
        let geometry = ctx
            .compute_geometry(1920, 1080, PixelFormat::RGBA_8888, usage)
            .unwrap();
        assert_eq!(geometry.tiling, Tiling::BlockCompressedTiled);
        assert_eq!(geometry.size, 8392704);

        let geometry = ctx
            .compute_geometry(1920, 1080, PixelFormat::RGBA_8888, usage | Usage::SW_READ_OFTEN)
            .unwrap();
        assert_eq!(geometry.tiling, Tiling::Linear);
        assert_eq!(geometry.size, 8355840);
    }

    #[test]
    fn encoder_input_4k() {
        let ctx = GrallocContext::new(
            GrallocConfig::default(),
            Some(Arc::new(MockAuthority::default())),
            Box::new(full_display()),
        );
        let usage = Usage::HW_VIDEO_ENCODER | Usage::PRIVATE_ALLOC_UBWC;

        let geometry = ctx
            .compute_geometry(4096, 2160, PixelFormat::NV12_ENCODEABLE, usage)
            .unwrap();
        assert_eq!(geometry.tiling, Tiling::BlockCompressedTiled);
        assert_eq!((geometry.aligned_width, geometry.aligned_height), (4096, 2176));
        assert_eq!(geometry.size, 8912896 + 4456448 + 36864 + 20480);
        assert_eq!(geometry.planes[0].role, PlaneRole::Meta);

        let ctx = context(
            GrallocConfig::default().set_disable_compression_for_encode(true),
            full_display(),
        );
        let geometry = ctx
            .compute_geometry(4096, 2160, PixelFormat::NV12_ENCODEABLE, usage)
            .unwrap();
        assert_eq!(geometry.tiling, Tiling::Linear);
        assert_eq!(geometry.planes.len(), 2);
    }

    #[test]
    fn geometry_is_deterministic() {
        let ctx = context(GrallocConfig::default(), full_display());
        let formats = [
            PixelFormat::RGBA_8888,
            PixelFormat::YCBCR_420_SP,
            PixelFormat::YV12,
            PixelFormat::YCBCR_420_SP_VENUS_UBWC,
            PixelFormat::RAW12,
        ];

        for format in formats {
            let first = ctx
                .compute_geometry(1280, 720, format, Usage::HW_TEXTURE)
                .unwrap();
            let second = ctx
                .compute_geometry(1280, 720, format, Usage::HW_TEXTURE)
                .unwrap();
            assert_eq!(first, second);
            assert_eq!(first.size % 4096, 0);
            assert!(first.aligned_width >= 1280 && first.aligned_height >= 720);
        }
    }
}
