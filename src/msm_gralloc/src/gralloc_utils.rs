// Copyright 2020 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! gralloc_utils: Error types, result alias and mapping constants shared by the rest of the crate.

use std::ffi::NulError;
use std::io::Error as IoError;
use std::num::TryFromIntError;

#[cfg(unix)]
use nix::Error as NixError;
use remain::sorted;
use thiserror::Error;

use crate::checked_arithmetic;
use crate::formats::PixelFormat;

/// Mapping access flags.
pub const GRALLOC_MAP_ACCESS_MASK: u32 = 0xf0;
pub const GRALLOC_MAP_ACCESS_READ: u32 = 0x10;
pub const GRALLOC_MAP_ACCESS_WRITE: u32 = 0x20;
pub const GRALLOC_MAP_ACCESS_RW: u32 = 0x30;

/// Allocation granularity used by the layout formulas.  Independent of the host page size so that
/// geometry stays a pure function of its inputs.
pub const GRALLOC_SIZE_4K: u64 = 4096;
pub const GRALLOC_SIZE_8K: u64 = 8192;
pub const GRALLOC_SIZE_1M: u64 = 0x100000;
pub const GRALLOC_SIZE_2M: u64 = 0x200000;

/// An error generated while computing a layout, allocating or mapping a buffer.
#[sorted]
#[derive(Error, Debug)]
pub enum GrallocError {
    /// Checked Arithmetic error
    #[error("arithmetic failed: {}({}) {op} {}({})", .field1.0, .field1.1, .field2.0, .field2.1)]
    CheckedArithmetic {
        field1: (&'static str, usize),
        field2: (&'static str, usize),
        op: &'static str,
    },
    /// Checked Range error
    #[error("range check failed: {}({}) vs {}({})", .field1.0, .field1.1, .field2.0, .field2.1)]
    CheckedRange {
        field1: (&'static str, usize),
        field2: (&'static str, usize),
    },
    /// A symbol could not be resolved in the GPU geometry library.
    #[error("failed to find symbol in GPU library: {0}")]
    FindSymbol(libloading::Error),
    /// The width, height or format of a request violates a format invariant.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// No heap driver is registered for the allocation type of a buffer.
    #[error("invalid heap driver")]
    InvalidHeapDriver,
    /// An input/output error occured.
    #[error("an input/output error occur: {0}")]
    IoError(IoError),
    /// The GPU geometry library could not be opened.
    #[error("failed to load GPU library: {0}")]
    LoadLibrary(libloading::Error),
    /// Nix crate error.
    #[cfg(unix)]
    #[error("The errno is {0}")]
    NixError(NixError),
    #[error("Nul Error occured {0}")]
    NulError(NulError),
    /// The heap driver could not satisfy an allocation.
    #[error("out of memory")]
    OutOfMemory,
    /// A protected or framebuffer region can not be mapped into the process.
    #[error("permission denied")]
    PermissionDenied,
    /// An attempted integer conversion failed.
    #[error("int conversion failed: {0}")]
    TryFromIntError(TryFromIntError),
    /// The command is unsupported.
    #[error("the requested function is not implemented")]
    Unsupported,
    /// No layout rule or concrete format exists for the request.
    #[error("unsupported pixel format {0:?}")]
    UnsupportedFormat(PixelFormat),
}

#[cfg(unix)]
impl From<NixError> for GrallocError {
    fn from(e: NixError) -> GrallocError {
        GrallocError::NixError(e)
    }
}

impl From<NulError> for GrallocError {
    fn from(e: NulError) -> GrallocError {
        GrallocError::NulError(e)
    }
}

impl From<IoError> for GrallocError {
    fn from(e: IoError) -> GrallocError {
        GrallocError::IoError(e)
    }
}

impl From<TryFromIntError> for GrallocError {
    fn from(e: TryFromIntError) -> GrallocError {
        GrallocError::TryFromIntError(e)
    }
}

/// The result of an operation in this crate.
pub type GrallocResult<T> = std::result::Result<T, GrallocError>;

/// Rounds `value` up to the next multiple of `alignment`, which need not be a power of two.
pub fn align_to(value: u64, alignment: u64) -> GrallocResult<u64> {
    if alignment == 0 {
        return Err(GrallocError::InvalidArgument("zero alignment"));
    }

    let remainder = value % alignment;
    if remainder == 0 {
        return Ok(value);
    }

    let padding = alignment - remainder;
    checked_arithmetic!(value + padding)
}

/// `x + y`, failing with `CheckedArithmetic` on overflow.
pub fn checked_add(x: u64, y: u64) -> GrallocResult<u64> {
    checked_arithmetic!(x + y)
}

/// `x * y`, failing with `CheckedArithmetic` on overflow.
pub fn checked_mul(x: u64, y: u64) -> GrallocResult<u64> {
    checked_arithmetic!(x * y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment() {
        assert_eq!(align_to(0, 32).unwrap(), 0);
        assert_eq!(align_to(1, 32).unwrap(), 32);
        assert_eq!(align_to(1920, 128).unwrap(), 1920);
        assert_eq!(align_to(1080, 32).unwrap(), 1088);
        assert_eq!(align_to(200, 192).unwrap(), 384);
        assert!(align_to(5, 0).is_err());
        assert!(align_to(u64::MAX - 1, 4096).is_err());
    }
}
