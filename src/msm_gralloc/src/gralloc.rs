// Copyright 2021 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! gralloc: Buffer allocation for MSM display, GPU, camera and video blocks.

use std::sync::Arc;

use log::debug;
use log::error;
use log::warn;

use crate::alignment::GpuGeometryAuthority;
use crate::capability::DisplayCapabilities;
use crate::capability::StaticDisplayCapabilities;
use crate::config::GrallocConfig;
use crate::context::GrallocContext;
use crate::formats::PixelFormat;
use crate::framebuffer::FramebufferDevice;
use crate::gralloc_os::round_up_to_page_size;
use crate::gralloc_utils::*;
use crate::handle::BufferFlags;
use crate::handle::BufferHandle;
use crate::handle::BufferType;
use crate::heap::AllocationController;
use crate::heap::HeapDriver;
use crate::heap::HeapRegion;
use crate::heap::RegionGuard;
use crate::layout::BufferGeometry;
use crate::metadata::ColorSpace;
use crate::metadata::METADATA_SIZE;
use crate::system_heap::SystemHeap;
use crate::usage::Usage;

/// A buffer allocation request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AllocationRequest {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub usage: Usage,
}

impl AllocationRequest {
    pub fn new(width: u32, height: u32, format: PixelFormat, usage: Usage) -> AllocationRequest {
        AllocationRequest {
            width,
            height,
            format,
            usage,
        }
    }
}

/// The buffer allocator.  Safe to share between threads; operations on a single handle must be
/// serialized by the caller.
pub struct MsmGralloc {
    pub(crate) context: GrallocContext,
    pub(crate) controller: AllocationController,
    pub(crate) framebuffer: Option<FramebufferDevice>,
}

/// Builder for `MsmGralloc`.
pub struct MsmGrallocBuilder {
    config: GrallocConfig,
    heap_driver: Option<Box<dyn HeapDriver>>,
    gpu_authority: Option<Arc<dyn GpuGeometryAuthority>>,
    display: Option<Box<dyn DisplayCapabilities>>,
    framebuffer: Option<FramebufferDevice>,
}

impl Default for MsmGrallocBuilder {
    fn default() -> Self {
        MsmGrallocBuilder::new()
    }
}

impl MsmGrallocBuilder {
    /// Create new a MsmGrallocBuilder with the default configuration.
    pub fn new() -> MsmGrallocBuilder {
        MsmGrallocBuilder {
            config: GrallocConfig::default(),
            heap_driver: None,
            gpu_authority: None,
            display: None,
            framebuffer: None,
        }
    }

    pub fn set_config(mut self, config: GrallocConfig) -> MsmGrallocBuilder {
        self.config = config;
        self
    }

    /// Sets the heap driver.  Without one, buffers come from system memory.
    pub fn set_heap_driver(mut self, driver: Box<dyn HeapDriver>) -> MsmGrallocBuilder {
        self.heap_driver = Some(driver);
        self
    }

    /// Sets the GPU geometry authority instead of loading the vendor library.
    pub fn set_gpu_authority(
        mut self,
        authority: Arc<dyn GpuGeometryAuthority>,
    ) -> MsmGrallocBuilder {
        self.gpu_authority = Some(authority);
        self
    }

    /// Sets the display capability source.  Without one, the display accepts no compressed
    /// buffers.
    pub fn set_display_capabilities(
        mut self,
        display: Box<dyn DisplayCapabilities>,
    ) -> MsmGrallocBuilder {
        self.display = Some(display);
        self
    }

    pub fn set_framebuffer(mut self, framebuffer: FramebufferDevice) -> MsmGrallocBuilder {
        self.framebuffer = Some(framebuffer);
        self
    }

    /// Builds the allocator.  The GPU library, if any, is loaded here.
    pub fn build(self) -> GrallocResult<MsmGralloc> {
        let heap_driver = match self.heap_driver {
            Some(driver) => driver,
            None => SystemHeap::init()?,
        };
        let display = self
            .display
            .unwrap_or_else(|| Box::new(StaticDisplayCapabilities::default()));

        let context = GrallocContext::new(self.config, self.gpu_authority, display);
        Ok(MsmGralloc {
            context,
            controller: AllocationController::new(heap_driver),
            framebuffer: self.framebuffer,
        })
    }
}

impl MsmGralloc {
    pub fn context(&self) -> &GrallocContext {
        &self.context
    }

    pub fn controller(&self) -> &AllocationController {
        &self.controller
    }

    /// Returns the aligned width and height a request would get, after placeholder resolution.
    pub fn get_aligned_dimensions(
        &self,
        request: &AllocationRequest,
    ) -> GrallocResult<(u32, u32)> {
        let usage = self.context.adjust_usage(request.usage);
        let format = self.context.resolve_format(request.format, usage)?;
        self.context
            .get_aligned_dimensions(request.width, request.height, format, usage)
    }

    /// Returns the geometry a request would get, after placeholder resolution.
    pub fn compute_geometry(&self, request: &AllocationRequest) -> GrallocResult<BufferGeometry> {
        let usage = self.context.adjust_usage(request.usage);
        let format = self.context.resolve_format(request.format, usage)?;
        self.context
            .compute_geometry(request.width, request.height, format, usage)
    }

    /// Allocates a buffer and its metadata region.
    pub fn allocate(&self, request: &AllocationRequest) -> GrallocResult<BufferHandle> {
        self.allocate_with_min_size(request, 0)
    }

    /// Allocates a buffer whose primary region holds at least `min_size` bytes.
    pub fn allocate_with_min_size(
        &self,
        request: &AllocationRequest,
        min_size: u64,
    ) -> GrallocResult<BufferHandle> {
        if request.width == 0 || request.height == 0 {
            return Err(GrallocError::InvalidArgument("zero width or height"));
        }

        let usage = self.context.adjust_usage(request.usage);
        let format = self.context.resolve_format(request.format, usage)?;
        let geometry = self
            .context
            .compute_geometry(request.width, request.height, format, usage)?;
        let size = round_up_to_page_size(geometry.size.max(min_size))?;

        let mut flags = BufferFlags::from_usage(usage);
        if geometry.is_compressed() {
            flags |= BufferFlags::UBWC_ALIGNED;
        }

        let use_framebuffer = usage.contains(Usage::HW_FB)
            && self
                .framebuffer
                .as_ref()
                .map(|fb| fb.is_usable())
                .unwrap_or(false);

        let config = self.context.config();
        let (primary, fb_slot, primary_guard) = if use_framebuffer {
            match self.framebuffer.as_ref() {
                Some(fb) => {
                    let (slot, region) = fb.acquire(size)?;
                    flags |= BufferFlags::FRAMEBUFFER;
                    (Some(region), Some(slot), None)
                }
                None => return Err(GrallocError::InvalidArgument("no framebuffer device")),
            }
        } else {
            let (region, alloc_type) = self.controller.allocate(size, usage, format, config)?;
            flags |= alloc_type;
            (
                None,
                None,
                Some(RegionGuard::new(&self.controller, region, alloc_type)),
            )
        };

        let metadata_size = round_up_to_page_size(METADATA_SIZE as u64)?;
        let metadata = match self
            .controller
            .allocate(metadata_size, Usage::empty(), PixelFormat::BLOB, config)
        {
            Ok(metadata) => metadata,
            Err(e) => {
                // The guard frees the primary region.
                drop(primary_guard);
                if let (Some(fb), Some(slot), Some(region)) =
                    (self.framebuffer.as_ref(), fb_slot, primary)
                {
                    if let Err(release_err) = fb.release(slot, region) {
                        error!("failed to release framebuffer slot {}: {}", slot, release_err);
                    }
                }
                return Err(e);
            }
        };

        // Heap drivers may pad the request, protected buffers in particular.
        let (primary, size) = match primary_guard.and_then(|g| g.into_inner()) {
            Some((region, _)) => {
                let size = region.size;
                (Some(region), size)
            }
            None => (primary, size),
        };
        let (metadata_region, metadata_alloc_type) = metadata;

        let mut handle = BufferHandle {
            primary,
            metadata: Some(metadata_region),
            primary_mapping: None,
            metadata_mapping: None,
            metadata_alloc_type,
            fb_slot,
            flags,
            buffer_type: BufferType::of(format),
            geometry,
            usage,
            width: request.width,
            height: request.height,
            size,
        };

        if let Err(e) = self.init_metadata(&mut handle) {
            warn!("failed to initialize metadata: {}", e);
        }

        debug!(
            "allocated {:?} {}x{} stride {} size {} flags {:?}",
            handle.format(),
            handle.width,
            handle.height,
            handle.stride(),
            handle.size,
            handle.flags
        );
        Ok(handle)
    }

    fn init_metadata(&self, handle: &mut BufferHandle) -> GrallocResult<()> {
        self.update_metadata(handle, |metadata| {
            metadata.set_color_space(ColorSpace::ItuR601)
        })
    }

    /// Releases both regions of `handle`.  A missing handle is ignored.  The first error is
    /// returned after every release has been attempted.
    pub fn free(&self, handle: Option<BufferHandle>) -> GrallocResult<()> {
        let mut handle = match handle {
            Some(handle) => handle,
            None => return Ok(()),
        };

        let mut result = self.unmap(&mut handle);
        if let Some(region) = handle.primary.take() {
            result = result.and(self.free_primary(&handle, region));
        }

        if let Some(region) = handle.metadata.take() {
            result = result.and(self.controller.free(region, handle.metadata_alloc_type));
        }

        result
    }

    fn free_primary(&self, handle: &BufferHandle, region: HeapRegion) -> GrallocResult<()> {
        if handle.flags.contains(BufferFlags::FRAMEBUFFER) {
            return match (self.framebuffer.as_ref(), handle.fb_slot) {
                (Some(fb), Some(slot)) => fb.release(slot, region),
                _ => Err(GrallocError::InvalidArgument("framebuffer slot missing")),
            };
        }

        self.controller
            .free(region, handle.flags.allocation_type())
    }
}
