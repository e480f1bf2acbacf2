// Copyright 2021 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A crate for computing the geometry of pixel buffers on Qualcomm MSM display stacks, along
//! with allocating, mapping and annotating those buffers.

mod adreno;
mod alignment;
mod capability;
mod config;
mod context;
mod formats;
mod framebuffer;
mod gralloc;
mod gralloc_os;
mod gralloc_utils;
mod handle;
mod heap;
mod layout;
#[macro_use]
mod macros;
mod mapper;
mod metadata;
mod system_heap;
mod usage;
mod venus;

pub use crate::adreno::AdrenoUtils;
pub use crate::adreno::ADRENO_UTILS_LIBRARY;
pub use crate::alignment::AlignmentProvider;
pub use crate::alignment::FallbackGeometry;
pub use crate::alignment::GpuGeometryAuthority;
pub use crate::capability::DisplayCapabilities;
pub use crate::capability::FormatCapability;
pub use crate::capability::StaticDisplayCapabilities;
pub use crate::config::GrallocConfig;
pub use crate::context::GrallocContext;
pub use crate::formats::*;
pub use crate::framebuffer::FramebufferDevice;
pub use crate::gralloc::AllocationRequest;
pub use crate::gralloc::MsmGralloc;
pub use crate::gralloc::MsmGrallocBuilder;
pub use crate::gralloc_os::AsRawDescriptor;
pub use crate::gralloc_os::FromRawDescriptor as GrallocFromRawDescriptor;
pub use crate::gralloc_os::IntoRawDescriptor as GrallocIntoRawDescriptor;
pub use crate::gralloc_os::MemoryMapping;
pub use crate::gralloc_os::SafeDescriptor as GrallocDescriptor;
pub use crate::gralloc_os::SharedMemory;
pub use crate::gralloc_utils::*;
pub use crate::handle::BufferFlags;
pub use crate::handle::BufferHandle;
pub use crate::handle::BufferType;
pub use crate::heap::select_heap;
pub use crate::heap::AllocationController;
pub use crate::heap::CacheOp;
pub use crate::heap::HeapDriver;
pub use crate::heap::HeapFlags;
pub use crate::heap::HeapMask;
pub use crate::heap::HeapRegion;
pub use crate::heap::HeapRequest;
pub use crate::heap::HeapSelection;
pub use crate::layout::compute_layout;
pub use crate::layout::BufferGeometry;
pub use crate::layout::PlaneDescriptor;
pub use crate::layout::PlaneRole;
pub use crate::layout::Tiling;
pub use crate::layout::YcbcrLayout;
pub use crate::mapper::Ycbcr;
pub use crate::metadata::BufferMetadata;
pub use crate::metadata::ColorSpace;
pub use crate::system_heap::SystemHeap;
pub use crate::usage::Usage;
pub use crate::venus::VenusColorFormat;
