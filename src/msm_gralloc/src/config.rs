// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! config: Process-wide allocator knobs.  Read once when the allocator is built and immutable
//! afterwards.

use std::env;
use std::path::PathBuf;

use log::debug;

use crate::adreno::ADRENO_UTILS_LIBRARY;

const DISABLE_GPU_AUTHORITY: &str = "GRALLOC_DISABLE_GPU_AUTHORITY";
const GFX_UBWC_DISABLE: &str = "GRALLOC_GFX_UBWC_DISABLE";
const VIDEO_DISABLE_UBWC: &str = "GRALLOC_VIDEO_DISABLE_UBWC";
const ENABLE_FB_UBWC: &str = "GRALLOC_ENABLE_FB_UBWC";
const MASTER_SIDE_CP: &str = "GRALLOC_MASTER_SIDE_CP";
const LEGACY_CP_HEAP: &str = "GRALLOC_LEGACY_CP_HEAP";
const GPU_LIBRARY: &str = "GRALLOC_GPU_LIBRARY";

/// Allocator configuration.
#[derive(Clone, Debug)]
pub struct GrallocConfig {
    pub disable_gpu_authority: bool,
    pub disable_gfx_compression: bool,
    pub disable_compression_for_encode: bool,
    pub enable_fb_compression: bool,
    pub master_side_content_protection: bool,
    pub legacy_cp_heap: bool,
    pub gpu_library: PathBuf,
}

impl Default for GrallocConfig {
    fn default() -> Self {
        GrallocConfig {
            disable_gpu_authority: false,
            disable_gfx_compression: false,
            disable_compression_for_encode: false,
            enable_fb_compression: false,
            master_side_content_protection: false,
            legacy_cp_heap: false,
            gpu_library: PathBuf::from(ADRENO_UTILS_LIBRARY),
        }
    }
}

/// Interprets a property value: decimal integers are true when non-zero, as are "true" and "yes".
fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => return true,
        "false" | "no" | "off" => return false,
        _ => (),
    }

    let digits: String = value
        .chars()
        .enumerate()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(_, c)| c)
        .collect();
    digits.parse::<i64>().map(|v| v != 0).unwrap_or(false)
}

impl GrallocConfig {
    /// Builds a configuration from `GRALLOC_*` environment variables.  Unset variables keep their
    /// default.
    pub fn from_env() -> GrallocConfig {
        GrallocConfig::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> GrallocConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|v| parse_flag(&v)).unwrap_or(false);
        let mut config = GrallocConfig {
            disable_gpu_authority: flag(DISABLE_GPU_AUTHORITY),
            disable_gfx_compression: flag(GFX_UBWC_DISABLE),
            disable_compression_for_encode: flag(VIDEO_DISABLE_UBWC),
            enable_fb_compression: flag(ENABLE_FB_UBWC),
            master_side_content_protection: flag(MASTER_SIDE_CP),
            legacy_cp_heap: flag(LEGACY_CP_HEAP),
            ..Default::default()
        };

        if let Some(path) = lookup(GPU_LIBRARY) {
            config.gpu_library = PathBuf::from(path);
        }

        debug!("gralloc config: {:?}", config);
        config
    }

    pub fn set_disable_gpu_authority(mut self, v: bool) -> GrallocConfig {
        self.disable_gpu_authority = v;
        self
    }

    pub fn set_disable_gfx_compression(mut self, v: bool) -> GrallocConfig {
        self.disable_gfx_compression = v;
        self
    }

    pub fn set_disable_compression_for_encode(mut self, v: bool) -> GrallocConfig {
        self.disable_compression_for_encode = v;
        self
    }

    pub fn set_enable_fb_compression(mut self, v: bool) -> GrallocConfig {
        self.enable_fb_compression = v;
        self
    }

    pub fn set_master_side_content_protection(mut self, v: bool) -> GrallocConfig {
        self.master_side_content_protection = v;
        self
    }

    pub fn set_legacy_cp_heap(mut self, v: bool) -> GrallocConfig {
        self.legacy_cp_heap = v;
        self
    }

    pub fn set_gpu_library<P: Into<PathBuf>>(mut self, path: P) -> GrallocConfig {
        self.gpu_library = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap as Map;

    use super::*;

    #[test]
    fn flag_values() {
        assert!(parse_flag("1"));
        assert!(parse_flag("42abc"));
        assert!(parse_flag("true"));
        assert!(parse_flag(" TRUE "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("abc"));
    }

    #[test]
    fn lookup_overrides_defaults() {
        let mut props: Map<&str, &str> = Map::new();
        props.insert("GRALLOC_DISABLE_GPU_AUTHORITY", "1");
        props.insert("GRALLOC_VIDEO_DISABLE_UBWC", "true");
        props.insert("GRALLOC_GPU_LIBRARY", "/vendor/lib64/libadreno_utils.so");

        let config = GrallocConfig::from_lookup(|k| props.get(k).map(|v| v.to_string()));
        assert!(config.disable_gpu_authority);
        assert!(config.disable_compression_for_encode);
        assert!(!config.disable_gfx_compression);
        assert!(!config.legacy_cp_heap);
        assert_eq!(
            config.gpu_library,
            PathBuf::from("/vendor/lib64/libadreno_utils.so")
        );

        let config = GrallocConfig::from_lookup(|_| None);
        assert_eq!(config.gpu_library, PathBuf::from(ADRENO_UTILS_LIBRARY));
    }
}
