pub mod core;
pub mod error;
pub mod gpu;
pub mod layout;
pub mod reference_cpu;

pub use crate::core::{DispatchStats, FieldElement, FloatWidth, Launch, Rotation};
pub use crate::error::{PackError, Result};
pub use crate::gpu::{BackendCapabilities, DeviceArray, GpuPacker, GpuPackerConfig};
pub use crate::layout::{BufferLayout, TransferKind};
