// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! capability: Whether a format/usage pair gets the block-compressed tiled layout.

use std::sync::Arc;

use log::debug;
use once_cell::sync::OnceCell;

use crate::alignment::GpuGeometryAuthority;
use crate::config::GrallocConfig;
use crate::formats::*;
use crate::usage::Usage;

/// Display pipeline capabilities.  Queried at most once per allocator.
pub trait DisplayCapabilities: Send + Sync {
    /// Returns true if the display engine can scan out compressed tiled buffers.
    fn supports_compressed_tiling(&self) -> bool;

    /// Returns true if the display write-back path can produce compressed tiled buffers.
    fn supports_compressed_writeback(&self) -> bool;
}

/// Fixed display capabilities.
#[derive(Copy, Clone, Debug, Default)]
pub struct StaticDisplayCapabilities {
    pub compressed_tiling: bool,
    pub compressed_writeback: bool,
}

impl DisplayCapabilities for StaticDisplayCapabilities {
    fn supports_compressed_tiling(&self) -> bool {
        self.compressed_tiling
    }

    fn supports_compressed_writeback(&self) -> bool {
        self.compressed_writeback
    }
}

#[derive(Copy, Clone, Debug)]
struct CachedDisplayCaps {
    compressed_tiling: bool,
    compressed_writeback: bool,
}

pub struct FormatCapability {
    display: Box<dyn DisplayCapabilities>,
    cached: OnceCell<CachedDisplayCaps>,
    authority: Arc<dyn GpuGeometryAuthority>,
    disable_gfx_compression: bool,
    disable_compression_for_encode: bool,
}

impl FormatCapability {
    pub fn new(
        config: &GrallocConfig,
        display: Box<dyn DisplayCapabilities>,
        authority: Arc<dyn GpuGeometryAuthority>,
    ) -> FormatCapability {
        FormatCapability {
            display,
            cached: OnceCell::new(),
            authority,
            disable_gfx_compression: config.disable_gfx_compression,
            disable_compression_for_encode: config.disable_compression_for_encode,
        }
    }

    fn display_caps(&self) -> CachedDisplayCaps {
        *self.cached.get_or_init(|| {
            let caps = CachedDisplayCaps {
                compressed_tiling: self.display.supports_compressed_tiling(),
                compressed_writeback: self.display.supports_compressed_writeback(),
            };
            debug!("display capabilities: {:?}", caps);
            caps
        })
    }

    pub fn display_supports_compressed_tiling(&self) -> bool {
        self.display_caps().compressed_tiling
    }

    pub fn display_supports_compressed_writeback(&self) -> bool {
        self.display_caps().compressed_writeback
    }

    pub fn compression_disabled_for_encode(&self) -> bool {
        self.disable_compression_for_encode
    }

    /// Returns true if the GPU can use the compressed layout for `gpu_format`.
    pub fn gpu_supports_compressed_tiling(&self, gpu_format: u32) -> bool {
        !self.disable_gfx_compression && self.authority.is_compressed_tiling_supported(gpu_format)
    }

    /// Decides whether `format` with `usage` is laid out block-compressed.
    pub fn is_compressed_tiling_eligible(&self, format: PixelFormat, usage: Usage) -> bool {
        // CPU access needs a linear layout, whatever else is requested.
        if usage.sw_access() {
            return false;
        }

        let info = match format.info() {
            Ok(info) => info,
            Err(_) => return false,
        };

        match info.compression {
            Compression::Always => return true,
            Compression::Never => return false,
            Compression::DisplayCapable => (),
        }

        if !self.display_supports_compressed_tiling() {
            return false;
        }

        if usage.contains(Usage::HW_VIDEO_ENCODER) && self.disable_compression_for_encode {
            return false;
        }

        if !usage.contains(Usage::PRIVATE_ALLOC_UBWC) {
            return false;
        }

        if usage.gpu_access() {
            return self.gpu_supports_compressed_tiling(info.gpu_format);
        }

        true
    }
}
