// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! OS primitives used by the heap drivers: owned descriptors, shared memory and process mappings.

mod descriptor;
pub mod sys;

pub use descriptor::AsRawDescriptor;
pub use descriptor::FromRawDescriptor;
pub use descriptor::IntoRawDescriptor;
pub use descriptor::SafeDescriptor;

pub use sys::platform::descriptor::RawDescriptor;
pub use sys::platform::memory_mapping::MemoryMapping;
pub use sys::platform::shm::page_size;
pub use sys::platform::shm::round_up_to_page_size;
pub use sys::platform::shm::SharedMemory;
