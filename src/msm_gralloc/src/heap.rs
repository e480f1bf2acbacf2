// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! heap: Heap selection from usage, and the controller that routes allocations to heap drivers.

use std::collections::BTreeMap as Map;

use bitflags::bitflags;
use log::error;
use log::warn;

use crate::config::GrallocConfig;
use crate::formats::PixelFormat;
use crate::gralloc_os::page_size;
use crate::gralloc_os::MemoryMapping;
use crate::gralloc_os::SafeDescriptor;
use crate::gralloc_utils::*;
use crate::handle::BufferFlags;
use crate::usage::Usage;

bitflags! {
    /// Heap identifiers understood by the heap driver.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct HeapMask: u32 {
        const CP_MM = 1 << 8;
        const SECURE = 1 << 9;
        const SECURE_DISPLAY = 1 << 10;
        const CAMERA = 1 << 20;
        const ADSP = 1 << 22;
        const SYSTEM = 1 << 25;
    }
}

bitflags! {
    /// Protection and caching flags of a heap allocation.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct HeapFlags: u32 {
        const CACHED = 1;
        const CP_PIXEL = 1 << 19;
        const CP_CAMERA = 1 << 21;
        const ALLOW_NON_CONTIG = 1 << 24;
        const CP_SEC_DISPLAY = 1 << 25;
        const CP_CAMERA_PREVIEW = 1 << 27;
        const SECURE = 1 << 31;
    }
}

/// Heap, flags and allocation-type tag chosen for a usage.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HeapSelection {
    pub heap_mask: HeapMask,
    pub flags: HeapFlags,
    pub alloc_type: BufferFlags,
}

/// Chooses heap, protection flags and allocation type for `usage`.
pub fn select_heap(usage: Usage, config: &GrallocConfig) -> HeapSelection {
    let mut heap_mask = HeapMask::empty();
    let mut flags = HeapFlags::empty();

    if usage.contains(Usage::PROTECTED) {
        if usage.contains(Usage::PRIVATE_SECURE_DISPLAY) {
            heap_mask = HeapMask::SECURE_DISPLAY;
            flags = if config.legacy_cp_heap {
                HeapFlags::SECURE
            } else {
                HeapFlags::SECURE | HeapFlags::CP_SEC_DISPLAY
            };
        } else if usage.camera() {
            heap_mask = HeapMask::SECURE_DISPLAY;
            flags = if config.legacy_cp_heap {
                HeapFlags::SECURE
            } else if usage.contains(Usage::HW_COMPOSER) {
                HeapFlags::SECURE | HeapFlags::CP_CAMERA_PREVIEW
            } else {
                HeapFlags::SECURE | HeapFlags::CP_CAMERA
            };
        } else if config.legacy_cp_heap {
            heap_mask = HeapMask::CP_MM;
            flags = HeapFlags::SECURE | HeapFlags::ALLOW_NON_CONTIG;
        } else {
            heap_mask = HeapMask::SECURE;
            flags = HeapFlags::SECURE | HeapFlags::CP_PIXEL;
        }
    } else if usage.contains(Usage::PRIVATE_MM_HEAP) {
        warn!("MM heap requested without protected usage, using the system heap");
        heap_mask = HeapMask::SYSTEM;
    }

    if usage.contains(Usage::PRIVATE_CAMERA_HEAP) {
        heap_mask |= HeapMask::CAMERA;
    }

    if usage.contains(Usage::PRIVATE_ADSP_HEAP) {
        heap_mask |= HeapMask::ADSP;
    }

    if heap_mask.is_empty() {
        heap_mask = HeapMask::SYSTEM;
    }

    if !usage.uncached() {
        flags |= HeapFlags::CACHED;
    }

    let alloc_type = if flags.contains(HeapFlags::SECURE) {
        BufferFlags::SECURE_BUFFER
    } else {
        BufferFlags::empty()
    };

    HeapSelection {
        heap_mask,
        flags,
        alloc_type,
    }
}

/// Alignment of a primary region.  Protected buffers need large alignment and are padded to it.
pub fn heap_alignment(
    usage: Usage,
    format: PixelFormat,
    config: &GrallocConfig,
) -> GrallocResult<u64> {
    if usage.contains(Usage::PROTECTED) {
        if usage.contains(Usage::PRIVATE_SECURE_DISPLAY) || usage.camera() {
            return Ok(GRALLOC_SIZE_2M);
        }

        if config.master_side_content_protection {
            return Ok(GRALLOC_SIZE_4K);
        }

        return Ok(GRALLOC_SIZE_1M);
    }

    if format == PixelFormat::YCBCR_420_SP_TILED {
        return Ok(GRALLOC_SIZE_8K);
    }

    page_size()
}

/// Cache maintenance operations on a mapped region.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CacheOp {
    Clean,
    Invalidate,
    CleanAndInvalidate,
}

/// An allocation request handed to a heap driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HeapRequest {
    pub size: u64,
    pub alignment: u64,
    pub heap_mask: HeapMask,
    pub flags: HeapFlags,
}

/// A raw memory region returned by a heap driver.
#[derive(Debug)]
pub struct HeapRegion {
    pub descriptor: SafeDescriptor,
    pub size: u64,
    pub offset: u64,
}

/// Physical memory allocator.  Must be safe for concurrent use on unrelated regions.
pub trait HeapDriver: Send + Sync {
    fn allocate(&self, request: &HeapRequest) -> GrallocResult<HeapRegion>;

    fn free(&self, region: HeapRegion) -> GrallocResult<()>;

    /// Maps `size` bytes of `region` at `offset` into the process, readable and writable.
    fn map(&self, region: &HeapRegion, size: u64, offset: u64) -> GrallocResult<MemoryMapping> {
        let size = usize::try_from(size)?;
        MemoryMapping::from_safe_descriptor(
            &region.descriptor,
            size,
            region.offset + offset,
            GRALLOC_MAP_ACCESS_RW,
        )
    }

    fn unmap(&self, mapping: MemoryMapping) -> GrallocResult<()> {
        drop(mapping);
        Ok(())
    }

    fn cache_op(
        &self,
        region: &HeapRegion,
        mapping: &MemoryMapping,
        op: CacheOp,
    ) -> GrallocResult<()>;
}

/// Routes allocations to the heap driver of each allocation type.
pub struct AllocationController {
    drivers: Map<BufferFlags, Box<dyn HeapDriver>>,
    default_driver: Box<dyn HeapDriver>,
}

impl AllocationController {
    /// Controller that sends every allocation type to `driver`.
    pub fn new(driver: Box<dyn HeapDriver>) -> AllocationController {
        AllocationController {
            drivers: Default::default(),
            default_driver: driver,
        }
    }

    /// Sends allocations tagged `alloc_type` to `driver` instead of the default driver.
    pub fn insert_driver(&mut self, alloc_type: BufferFlags, driver: Box<dyn HeapDriver>) {
        self.drivers.insert(alloc_type.allocation_type(), driver);
    }

    /// Returns the driver responsible for regions of `alloc_type`.
    pub fn get_heap_driver(&self, alloc_type: BufferFlags) -> GrallocResult<&dyn HeapDriver> {
        if !alloc_type.contains(BufferFlags::USES_HEAP_DRIVER) {
            return Err(GrallocError::InvalidHeapDriver);
        }

        let key = alloc_type.allocation_type();
        if let Some(driver) = self.drivers.get(&key) {
            return Ok(driver.as_ref());
        }

        Ok(self.default_driver.as_ref())
    }

    /// Allocates `size` bytes with the heap chosen for `usage`.  Protected sizes are padded to
    /// their alignment.  Returns the region and its allocation type.
    pub fn allocate(
        &self,
        size: u64,
        usage: Usage,
        format: PixelFormat,
        config: &GrallocConfig,
    ) -> GrallocResult<(HeapRegion, BufferFlags)> {
        let selection = select_heap(usage, config);
        let alignment = heap_alignment(usage, format, config)?;
        let size = if usage.contains(Usage::PROTECTED) {
            align_to(size, alignment)?
        } else {
            size
        };

        let alloc_type = selection.alloc_type | BufferFlags::USES_HEAP_DRIVER;
        let driver = self.get_heap_driver(alloc_type)?;
        let request = HeapRequest {
            size,
            alignment,
            heap_mask: selection.heap_mask,
            flags: selection.flags,
        };

        match driver.allocate(&request) {
            Ok(region) => {
                let mut tags = alloc_type;
                if selection.flags.contains(HeapFlags::CACHED) {
                    tags |= BufferFlags::CACHED;
                }
                Ok((region, tags))
            }
            Err(e) => {
                error!(
                    "failed to allocate {} bytes, heap {:?} flags {:?}: {}",
                    size, selection.heap_mask, selection.flags, e
                );
                match e {
                    GrallocError::PermissionDenied => Err(e),
                    _ => Err(GrallocError::OutOfMemory),
                }
            }
        }
    }

    /// Returns `region` to the driver it was allocated from.
    pub fn free(&self, region: HeapRegion, alloc_type: BufferFlags) -> GrallocResult<()> {
        self.get_heap_driver(alloc_type)?.free(region)
    }
}

/// Frees a region on drop unless it is taken back.
pub struct RegionGuard<'a> {
    controller: &'a AllocationController,
    region: Option<(HeapRegion, BufferFlags)>,
}

impl<'a> RegionGuard<'a> {
    pub fn new(
        controller: &'a AllocationController,
        region: HeapRegion,
        alloc_type: BufferFlags,
    ) -> RegionGuard<'a> {
        RegionGuard {
            controller,
            region: Some((region, alloc_type)),
        }
    }

    /// Keeps the region.
    pub fn into_inner(mut self) -> Option<(HeapRegion, BufferFlags)> {
        self.region.take()
    }
}

impl Drop for RegionGuard<'_> {
    fn drop(&mut self) {
        if let Some((region, alloc_type)) = self.region.take() {
            if let Err(e) = self.controller.free(region, alloc_type) {
                error!("failed to release region: {}", e);
            }
        }
    }
}
