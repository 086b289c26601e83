//! Host-side error type shared by the CPU and GPU backends.
//!
//! The kernels themselves have no error path: a unit of work past the declared
//! count simply does nothing. Everything here is detected before a launch.

use thiserror::Error;

use crate::core::FloatWidth;

#[derive(Error, Debug)]
pub enum PackError {
    #[error("No GPU adapter available")]
    BackendUnavailable,

    #[error("Failed to request device: {0}")]
    DeviceRequest(String),

    #[error("{0} kernels are not available on this device")]
    UnsupportedWidth(FloatWidth),

    #[error("Pipeline validation error: {0}")]
    PipelineValidation(String),

    #[error("rotation code {0} is outside 0..4")]
    InvalidRotation(u32),

    #[error("{label}: declared count {declared} exceeds index list length {available}")]
    IndexCountMismatch {
        label: &'static str,
        declared: u32,
        available: usize,
    },

    #[error("{label}: range {start}..{end} does not fit in buffer of length {len}")]
    RangeOutOfBounds {
        label: &'static str,
        start: u64,
        end: u64,
        len: usize,
    },

    #[error("launch of {units} units cannot cover {count} elements")]
    LaunchTooSmall { units: u32, count: u32 },

    #[error("buffer layout exceeds u32 addressing")]
    LayoutOverflow,

    #[error("{label}: workgroups {workgroups} exceed max {max} per dimension")]
    WorkgroupLimit {
        label: &'static str,
        workgroups: u64,
        max: u32,
    },

    #[error("{label}: buffer size {bytes} bytes exceeds max {max} bytes")]
    StorageLimit {
        label: &'static str,
        bytes: u64,
        max: u64,
    },

    #[error("kernels bind {required} storage buffers but the device allows {max} per stage")]
    StorageBindingLimit { required: u32, max: u32 },

    #[error("buffer mapping failed: {0}")]
    BufferMap(String),
}

pub type Result<T> = std::result::Result<T, PackError>;
