// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! mapper: CPU mappings, cache maintenance and metadata access for allocated buffers.

use log::error;

use crate::formats::PixelFormat;
use crate::gralloc::MsmGralloc;
use crate::gralloc_utils::*;
use crate::handle::BufferFlags;
use crate::handle::BufferHandle;
use crate::heap::CacheOp;
use crate::layout::PlaneDescriptor;
use crate::metadata::BufferMetadata;
use crate::metadata::ColorSpace;
use crate::usage::Usage;

/// Addresses of the Y, Cb and Cr samples of a locked YUV buffer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Ycbcr {
    pub y: u64,
    pub cb: u64,
    pub cr: u64,
    pub y_stride: u64,
    pub c_stride: u64,
    pub chroma_step: u64,
}

impl MsmGralloc {
    fn map_metadata(&self, handle: &mut BufferHandle) -> GrallocResult<()> {
        if handle.metadata_mapping.is_some() {
            return Ok(());
        }

        let region = handle
            .metadata
            .as_ref()
            .ok_or(GrallocError::InvalidArgument("buffer has no metadata region"))?;
        let driver = self.controller.get_heap_driver(handle.metadata_alloc_type)?;
        handle.metadata_mapping = Some(driver.map(region, region.size, 0)?);
        Ok(())
    }

    /// Maps the metadata region and, unless the buffer is protected or carved from the
    /// framebuffer, the primary region.  The metadata mapping is kept when the primary region is
    /// refused.
    pub fn map(&self, handle: &mut BufferHandle) -> GrallocResult<()> {
        self.map_metadata(handle)?;

        if handle
            .flags
            .intersects(BufferFlags::FRAMEBUFFER | BufferFlags::SECURE_BUFFER)
        {
            return Err(GrallocError::PermissionDenied);
        }

        if handle.primary_mapping.is_some() {
            return Ok(());
        }

        let region = handle
            .primary
            .as_ref()
            .ok_or(GrallocError::InvalidArgument("buffer has no primary region"))?;
        let driver = self.controller.get_heap_driver(handle.flags.allocation_type())?;
        handle.primary_mapping = Some(driver.map(region, handle.size, 0)?);
        Ok(())
    }

    /// Unmaps both regions.  The recorded base addresses read as 0 afterwards.
    pub fn unmap(&self, handle: &mut BufferHandle) -> GrallocResult<()> {
        let mut result = Ok(());

        if let Some(mapping) = handle.primary_mapping.take() {
            let unmapped = self
                .controller
                .get_heap_driver(handle.flags.allocation_type())
                .and_then(|driver| driver.unmap(mapping));
            result = result.and(unmapped);
        }

        if let Some(mapping) = handle.metadata_mapping.take() {
            let unmapped = self
                .controller
                .get_heap_driver(handle.metadata_alloc_type)
                .and_then(|driver| driver.unmap(mapping));
            result = result.and(unmapped);
        }

        if let Err(e) = &result {
            error!("failed to unmap buffer: {}", e);
        }
        result
    }

    /// Imports a buffer received from another process.  Protected buffers only get their
    /// metadata mapped.
    pub fn register_buffer(&self, handle: &mut BufferHandle) -> GrallocResult<()> {
        match self.map(handle) {
            Ok(()) | Err(GrallocError::PermissionDenied) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn cache_op(&self, handle: &BufferHandle, op: CacheOp) -> GrallocResult<()> {
        let (region, mapping) = match (handle.primary.as_ref(), handle.primary_mapping.as_ref()) {
            (Some(region), Some(mapping)) => (region, mapping),
            _ => return Ok(()),
        };

        self.controller
            .get_heap_driver(handle.flags.allocation_type())?
            .cache_op(region, mapping, op)
    }

    /// Prepares the buffer for CPU access with `usage` and returns the primary base address.
    pub fn lock(&self, handle: &mut BufferHandle, usage: Usage) -> GrallocResult<u64> {
        if usage.sw_access() && handle.primary_mapping.is_none() {
            self.map(handle)?;
        }

        if handle
            .flags
            .contains(BufferFlags::USES_HEAP_DRIVER | BufferFlags::CACHED)
        {
            if usage.sw_read() && handle.flags.contains(BufferFlags::NON_CPU_WRITER) {
                self.cache_op(handle, CacheOp::Invalidate)?;
            }

            if usage.sw_write() {
                handle.flags |= BufferFlags::NEEDS_FLUSH;
            }
        }

        Ok(handle.base())
    }

    /// Locks a YUV buffer and returns the addresses of its samples.
    pub fn lock_ycbcr(&self, handle: &mut BufferHandle, usage: Usage) -> GrallocResult<Ycbcr> {
        let layout = handle.geometry.ycbcr_layout()?;
        let base = self.lock(handle, usage)?;
        Ok(Ycbcr {
            y: base + layout.y_offset,
            cb: base + layout.cb_offset,
            cr: base + layout.cr_offset,
            y_stride: layout.y_stride,
            c_stride: layout.c_stride,
            chroma_step: layout.chroma_step,
        })
    }

    /// Ends CPU access, writing back CPU caches if the buffer was written.
    pub fn unlock(&self, handle: &mut BufferHandle) -> GrallocResult<()> {
        if handle.flags.contains(BufferFlags::NEEDS_FLUSH) {
            self.cache_op(handle, CacheOp::Clean)?;
            handle.flags.remove(BufferFlags::NEEDS_FLUSH);
        }

        Ok(())
    }

    pub(crate) fn update_metadata<F>(&self, handle: &mut BufferHandle, update: F) -> GrallocResult<()>
    where
        F: FnOnce(&mut BufferMetadata),
    {
        self.map_metadata(handle)?;
        let mapping = handle
            .metadata_mapping
            .as_mut()
            .ok_or(GrallocError::InvalidArgument("metadata not mapped"))?;

        let mut metadata = BufferMetadata::read(mapping.as_slice())?;
        update(&mut metadata);
        metadata.write(mapping.as_mut_slice())
    }

    /// Returns the metadata record of `handle`, mapping the metadata region if needed.
    pub fn metadata(&self, handle: &mut BufferHandle) -> GrallocResult<BufferMetadata> {
        self.map_metadata(handle)?;
        let mapping = handle
            .metadata_mapping
            .as_ref()
            .ok_or(GrallocError::InvalidArgument("metadata not mapped"))?;
        BufferMetadata::read(mapping.as_slice())
    }

    pub fn set_color_space(
        &self,
        handle: &mut BufferHandle,
        color_space: ColorSpace,
    ) -> GrallocResult<()> {
        self.update_metadata(handle, |m| m.set_color_space(color_space))
    }

    pub fn get_color_space(&self, handle: &mut BufferHandle) -> GrallocResult<Option<ColorSpace>> {
        Ok(self.metadata(handle)?.color_space())
    }

    /// Declares the dimensions the producer actually fills.
    pub fn set_buffer_geometry(
        &self,
        handle: &mut BufferHandle,
        width: u32,
        height: u32,
    ) -> GrallocResult<()> {
        self.update_metadata(handle, |m| m.set_buffer_geometry(width, height))
    }

    /// Declares that the content is linear `format` despite a compressed allocation.
    pub fn set_linear_format(
        &self,
        handle: &mut BufferHandle,
        format: PixelFormat,
    ) -> GrallocResult<()> {
        self.update_metadata(handle, |m| m.set_linear_format(format.0))
    }

    pub fn set_map_secure_buffer(&self, handle: &mut BufferHandle, map: bool) -> GrallocResult<()> {
        self.update_metadata(handle, |m| m.set_map_secure_buffer(map))
    }

    pub fn get_map_secure_buffer(&self, handle: &mut BufferHandle) -> GrallocResult<bool> {
        Ok(self.metadata(handle)?.map_secure_buffer().unwrap_or(false))
    }

    pub fn set_single_buffer_mode(
        &self,
        handle: &mut BufferHandle,
        enable: bool,
    ) -> GrallocResult<()> {
        self.update_metadata(handle, |m| m.set_single_buffer_mode(enable))
    }

    pub fn get_single_buffer_mode(&self, handle: &mut BufferHandle) -> GrallocResult<bool> {
        Ok(self.metadata(handle)?.single_buffer_mode().unwrap_or(false))
    }

    /// Stride and height in pixels, honoring a producer-declared geometry.
    pub fn custom_stride_and_height(
        &self,
        handle: &mut BufferHandle,
    ) -> GrallocResult<(u32, u32)> {
        match self.metadata(handle)?.buffer_geometry() {
            Some((width, height)) => self.context.get_aligned_dimensions(
                width,
                height,
                handle.format(),
                handle.usage,
            ),
            None => Ok((handle.stride(), handle.aligned_height())),
        }
    }

    /// Returns true if consumers see compressed content: the buffer is compressed and no linear
    /// format override is set.
    pub fn compressed_tiling_in_effect(&self, handle: &mut BufferHandle) -> GrallocResult<bool> {
        if !self.is_compressed_tiling_applied(handle) {
            return Ok(false);
        }

        Ok(self.metadata(handle)?.linear_format().is_none())
    }

    pub fn is_compressed_tiling_applied(&self, handle: &BufferHandle) -> bool {
        handle.flags.contains(BufferFlags::UBWC_ALIGNED)
    }

    pub fn get_plane_layout<'a>(&self, handle: &'a BufferHandle) -> &'a [PlaneDescriptor] {
        handle.planes()
    }

    /// Offset of the pixel data of an RGB buffer, past the meta plane of a compressed one.
    pub fn rgb_data_offset(&self, handle: &BufferHandle) -> GrallocResult<u64> {
        if !handle.format().is_rgb() {
            return Err(GrallocError::UnsupportedFormat(handle.format()));
        }

        Ok(handle.geometry.data_offset())
    }

    /// Address of the pixel data of a mapped RGB buffer.
    pub fn rgb_data_address(&self, handle: &BufferHandle) -> GrallocResult<u64> {
        let offset = self.rgb_data_offset(handle)?;
        match handle.base() {
            0 => Err(GrallocError::InvalidArgument("buffer not mapped")),
            base => Ok(base + offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::alignment::tests::MockAuthority;
    use crate::capability::StaticDisplayCapabilities;
    use crate::gralloc::AllocationRequest;
    use crate::gralloc::MsmGrallocBuilder;
    use crate::heap::tests::HeapStats;
    use crate::heap::tests::MockHeap;

    fn gralloc(stats: &Arc<HeapStats>) -> MsmGralloc {
        MsmGrallocBuilder::new()
            .set_heap_driver(Box::new(MockHeap::new(stats.clone(), None)))
            .set_gpu_authority(Arc::new(MockAuthority::default()))
            .set_display_capabilities(Box::new(StaticDisplayCapabilities {
                compressed_tiling: true,
                compressed_writeback: true,
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn map_and_unmap() {
        let stats = Arc::new(HeapStats::default());
        let gralloc = gralloc(&stats);
        let request = AllocationRequest::new(64, 64, PixelFormat::RGBA_8888, Usage::SW_READ_OFTEN);
        let mut handle = gralloc.allocate(&request).unwrap();

        gralloc.map(&mut handle).unwrap();
        assert_ne!(handle.base(), 0);
        assert_ne!(handle.metadata_base(), 0);

        gralloc.unmap(&mut handle).unwrap();
        assert_eq!(handle.base(), 0);
        assert_eq!(handle.metadata_base(), 0);

        gralloc.free(Some(handle)).unwrap();
    }

    #[test]
    fn protected_buffers_are_not_mappable() {
        let stats = Arc::new(HeapStats::default());
        let gralloc = gralloc(&stats);
        let request = AllocationRequest::new(64, 64, PixelFormat::RGBA_8888, Usage::PROTECTED);
        let mut handle = gralloc.allocate(&request).unwrap();
        assert!(handle.flags().contains(BufferFlags::SECURE_BUFFER));

        assert!(matches!(
            gralloc.map(&mut handle),
            Err(GrallocError::PermissionDenied)
        ));
        assert_eq!(handle.base(), 0);
        assert_ne!(handle.metadata_base(), 0);

        assert!(matches!(
            gralloc.lock(&mut handle, Usage::SW_READ_OFTEN),
            Err(GrallocError::PermissionDenied)
        ));
        gralloc.register_buffer(&mut handle).unwrap();
        gralloc.free(Some(handle)).unwrap();
    }

    #[test]
    fn cache_maintenance() {
        let stats = Arc::new(HeapStats::default());
        let gralloc = gralloc(&stats);
        let usage = Usage::SW_READ_OFTEN | Usage::SW_WRITE_OFTEN | Usage::HW_RENDER;
        let request = AllocationRequest::new(64, 64, PixelFormat::RGBA_8888, usage);
        let mut handle = gralloc.allocate(&request).unwrap();
        assert!(handle.flags().contains(BufferFlags::CACHED | BufferFlags::NON_CPU_WRITER));

        // Read after a GPU write invalidates, a CPU write needs a flush on unlock.
        let base = gralloc.lock(&mut handle, usage).unwrap();
        assert_ne!(base, 0);
        assert_eq!(stats.cache_ops.load(Ordering::SeqCst), 1);
        assert!(handle.flags().contains(BufferFlags::NEEDS_FLUSH));

        gralloc.unlock(&mut handle).unwrap();
        assert_eq!(stats.cache_ops.load(Ordering::SeqCst), 2);
        assert!(!handle.flags().contains(BufferFlags::NEEDS_FLUSH));

        gralloc.unlock(&mut handle).unwrap();
        assert_eq!(stats.cache_ops.load(Ordering::SeqCst), 2);

        gralloc.free(Some(handle)).unwrap();
    }

    #[test]
    fn uncached_buffers_skip_maintenance() {
        let stats = Arc::new(HeapStats::default());
        let gralloc = gralloc(&stats);
        let usage = Usage::SW_READ_RARELY | Usage::SW_WRITE_RARELY | Usage::HW_RENDER;
        let request = AllocationRequest::new(64, 64, PixelFormat::RGBA_8888, usage);
        let mut handle = gralloc.allocate(&request).unwrap();

        gralloc.lock(&mut handle, usage).unwrap();
        gralloc.unlock(&mut handle).unwrap();
        assert_eq!(stats.cache_ops.load(Ordering::SeqCst), 0);
        gralloc.free(Some(handle)).unwrap();
    }

    #[test]
    fn ycbcr_lock() {
        let stats = Arc::new(HeapStats::default());
        let gralloc = gralloc(&stats);
        let request = AllocationRequest::new(
            1920,
            1080,
            PixelFormat::YCRCB_420_SP,
            Usage::SW_READ_OFTEN,
        );
        let mut handle = gralloc.allocate(&request).unwrap();

        let ycbcr = gralloc.lock_ycbcr(&mut handle, Usage::SW_READ_OFTEN).unwrap();
        assert_eq!(ycbcr.y, handle.base());
        assert_eq!(ycbcr.cr, handle.base() + 1920 * 1080);
        assert_eq!(ycbcr.cb, ycbcr.cr + 1);
        assert_eq!(ycbcr.chroma_step, 2);
        gralloc.unlock(&mut handle).unwrap();
        gralloc.free(Some(handle)).unwrap();
    }

    #[test]
    fn metadata_operations() {
        let stats = Arc::new(HeapStats::default());
        let gralloc = gralloc(&stats);
        let usage = Usage::HW_COMPOSER | Usage::PRIVATE_ALLOC_UBWC;
        let request = AllocationRequest::new(1920, 1080, PixelFormat::RGBA_8888, usage);
        let mut handle = gralloc.allocate(&request).unwrap();

        assert_eq!(
            gralloc.get_color_space(&mut handle).unwrap(),
            Some(ColorSpace::ItuR601)
        );
        gralloc
            .set_color_space(&mut handle, ColorSpace::ItuR709)
            .unwrap();
        assert_eq!(
            gralloc.get_color_space(&mut handle).unwrap(),
            Some(ColorSpace::ItuR709)
        );

        assert!(!gralloc.get_single_buffer_mode(&mut handle).unwrap());
        gralloc.set_single_buffer_mode(&mut handle, true).unwrap();
        assert!(gralloc.get_single_buffer_mode(&mut handle).unwrap());

        assert!(!gralloc.get_map_secure_buffer(&mut handle).unwrap());
        gralloc.set_map_secure_buffer(&mut handle, true).unwrap();
        assert!(gralloc.get_map_secure_buffer(&mut handle).unwrap());

        assert_eq!(
            gralloc.custom_stride_and_height(&mut handle).unwrap(),
            (1920, 1088)
        );
        gralloc.set_buffer_geometry(&mut handle, 1280, 720).unwrap();
        assert_eq!(
            gralloc.custom_stride_and_height(&mut handle).unwrap(),
            (1280, 768)
        );

        assert!(gralloc.is_compressed_tiling_applied(&handle));
        assert!(gralloc.compressed_tiling_in_effect(&mut handle).unwrap());
        gralloc
            .set_linear_format(&mut handle, PixelFormat::RGBA_8888)
            .unwrap();
        assert!(!gralloc.compressed_tiling_in_effect(&mut handle).unwrap());

        gralloc.free(Some(handle)).unwrap();
    }

    #[test]
    fn rgb_data() {
        let stats = Arc::new(HeapStats::default());
        let gralloc = gralloc(&stats);
        let usage = Usage::HW_COMPOSER | Usage::PRIVATE_ALLOC_UBWC;
        let request = AllocationRequest::new(1920, 1080, PixelFormat::RGBA_8888, usage);
        let mut handle = gralloc.allocate(&request).unwrap();

        let meta = gralloc.get_plane_layout(&handle)[1].offset;
        assert_eq!(gralloc.rgb_data_offset(&handle).unwrap(), meta);
        assert!(gralloc.rgb_data_address(&handle).is_err());

        gralloc.map(&mut handle).unwrap();
        assert_eq!(
            gralloc.rgb_data_address(&handle).unwrap(),
            handle.base() + meta
        );

        let request = AllocationRequest::new(64, 64, PixelFormat::YCBCR_420_SP, Usage::empty());
        let nv12 = gralloc.allocate(&request).unwrap();
        assert!(gralloc.rgb_data_offset(&nv12).is_err());

        gralloc.free(Some(handle)).unwrap();
        gralloc.free(Some(nv12)).unwrap();
        assert_eq!(stats.outstanding(), 0);
    }
}
