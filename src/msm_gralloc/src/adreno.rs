// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! adreno: Geometry authority backed by the vendor GPU utility library, resolved at runtime.

use std::os::raw::c_int;
use std::path::Path;

use libloading::Library;
use log::debug;

use crate::alignment::GpuGeometryAuthority;
use crate::gralloc_utils::GrallocError;
use crate::gralloc_utils::GrallocResult;

/// Default name of the vendor GPU utility library.
pub const ADRENO_UTILS_LIBRARY: &str = "libadreno_utils.so";

type ComputeAlignedWidthAndHeightFn = unsafe extern "C" fn(
    width: c_int,
    height: c_int,
    bpp: c_int,
    tile_mode: c_int,
    raster_mode: c_int,
    padding_threshold: c_int,
    aligned_w: *mut c_int,
    aligned_h: *mut c_int,
);
type IsUbwcSupportedByGpuFn = unsafe extern "C" fn(format: c_int) -> c_int;

/// Function pointers resolved from the vendor library.  They stay valid for as long as `_library`
/// is loaded, which is the lifetime of this struct.
pub struct AdrenoUtils {
    compute_aligned_width_and_height: ComputeAlignedWidthAndHeightFn,
    is_ubwc_supported_by_gpu: IsUbwcSupportedByGpuFn,
    _library: Library,
}

impl AdrenoUtils {
    /// Opens the library at `path` and resolves every symbol used by the allocator.
    pub fn load<P: AsRef<Path>>(path: P) -> GrallocResult<AdrenoUtils> {
        // Safe because the library only runs its own initializers, which are expected to be sound
        // for a graphics userspace library.
        let library =
            unsafe { Library::new(path.as_ref().as_os_str()) }.map_err(GrallocError::LoadLibrary)?;

        // Safe because the signatures match the exported C prototypes, and the pointers are only
        // used while `library` is held by the returned struct.
        let (compute_aligned_width_and_height, is_ubwc_supported_by_gpu) = unsafe {
            let compute: ComputeAlignedWidthAndHeightFn = *library
                .get::<ComputeAlignedWidthAndHeightFn>(b"compute_aligned_width_and_height\0")
                .map_err(GrallocError::FindSymbol)?;
            let ubwc: IsUbwcSupportedByGpuFn = *library
                .get::<IsUbwcSupportedByGpuFn>(b"isUBWCSupportedByGpu\0")
                .map_err(GrallocError::FindSymbol)?;
            (compute, ubwc)
        };

        debug!("loaded GPU geometry library {}", path.as_ref().display());
        Ok(AdrenoUtils {
            compute_aligned_width_and_height,
            is_ubwc_supported_by_gpu,
            _library: library,
        })
    }
}

impl GpuGeometryAuthority for AdrenoUtils {
    fn name(&self) -> &'static str {
        "adreno"
    }

    fn aligned_width_height(
        &self,
        width: u32,
        height: u32,
        bpp: u32,
        tiled: bool,
        raster_mode: u32,
        padding_threshold: u32,
    ) -> Option<(u32, u32)> {
        let width = c_int::try_from(width).ok()?;
        let height = c_int::try_from(height).ok()?;
        let bpp = c_int::try_from(bpp).ok()?;
        let raster_mode = c_int::try_from(raster_mode).ok()?;
        let padding_threshold = c_int::try_from(padding_threshold).ok()?;

        let mut aligned_w: c_int = 0;
        let mut aligned_h: c_int = 0;
        // Safe because both out pointers reference live locals and the library writes two ints.
        unsafe {
            (self.compute_aligned_width_and_height)(
                width,
                height,
                bpp,
                tiled as c_int,
                raster_mode,
                padding_threshold,
                &mut aligned_w,
                &mut aligned_h,
            )
        };

        if aligned_w < width || aligned_h < height {
            return None;
        }

        Some((u32::try_from(aligned_w).ok()?, u32::try_from(aligned_h).ok()?))
    }

    fn is_compressed_tiling_supported(&self, gpu_format: u32) -> bool {
        let format = match c_int::try_from(gpu_format) {
            Ok(format) => format,
            Err(_) => return false,
        };

        // Safe because the function takes a plain integer.
        unsafe { (self.is_ubwc_supported_by_gpu)(format) != 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library() {
        match AdrenoUtils::load("/nonexistent/libadreno_utils.so") {
            Err(GrallocError::LoadLibrary(_)) => (),
            _ => panic!("expected a load failure"),
        }
    }
}
