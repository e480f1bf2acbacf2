// Copyright 2021 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Heap driver allocating from system memory.  On Linux systems, this is done with memfd, which
//! has no notion of heaps, protection or cache maintenance.

use log::trace;

use crate::gralloc_os::MemoryMapping;
use crate::gralloc_os::SharedMemory;
use crate::gralloc_utils::*;
use crate::heap::CacheOp;
use crate::heap::HeapDriver;
use crate::heap::HeapFlags;
use crate::heap::HeapRegion;
use crate::heap::HeapRequest;

/// A heap driver capable of allocation from system memory.
pub struct SystemHeap(());

impl SystemHeap {
    fn new() -> Self {
        SystemHeap(())
    }

    /// Returns a new `SystemHeap` instance.
    pub fn init() -> GrallocResult<Box<dyn HeapDriver>> {
        Ok(Box::new(SystemHeap::new()))
    }
}

impl HeapDriver for SystemHeap {
    fn allocate(&self, request: &HeapRequest) -> GrallocResult<HeapRegion> {
        // memfd memory can not be protected from the CPU.
        if request.flags.contains(HeapFlags::SECURE) {
            return Err(GrallocError::PermissionDenied);
        }

        let size = align_to(request.size, request.alignment)?;
        let shm = SharedMemory::new("msm_gralloc", size)?;
        Ok(HeapRegion {
            descriptor: shm.into(),
            size,
            offset: 0,
        })
    }

    fn free(&self, region: HeapRegion) -> GrallocResult<()> {
        drop(region);
        Ok(())
    }

    fn cache_op(
        &self,
        _region: &HeapRegion,
        mapping: &MemoryMapping,
        op: CacheOp,
    ) -> GrallocResult<()> {
        trace!("{:?} on {:#x}: coherent memory, nothing to do", op, mapping.addr());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapMask;

    fn request(size: u64, flags: HeapFlags) -> HeapRequest {
        HeapRequest {
            size,
            alignment: 4096,
            heap_mask: HeapMask::SYSTEM,
            flags,
        }
    }

    #[test]
    fn allocate_and_map() {
        let heap = SystemHeap::init().unwrap();
        let region = heap.allocate(&request(5000, HeapFlags::CACHED)).unwrap();
        assert_eq!(region.size, 8192);

        let mut mapping = heap.map(&region, region.size, 0).unwrap();
        mapping.as_mut_slice()[8191] = 7;
        heap.cache_op(&region, &mapping, CacheOp::Clean).unwrap();
        heap.unmap(mapping).unwrap();

        let mapping = heap.map(&region, 4096, 4096).unwrap();
        assert_eq!(mapping.as_slice()[4095], 7);
        heap.unmap(mapping).unwrap();

        heap.free(region).unwrap();
    }

    #[test]
    fn secure_unsupported() {
        let heap = SystemHeap::init().unwrap();
        assert!(matches!(
            heap.allocate(&request(4096, HeapFlags::SECURE)),
            Err(GrallocError::PermissionDenied)
        ));
    }
}
