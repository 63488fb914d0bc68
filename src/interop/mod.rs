//! Capabilities shared with other GPU APIs

pub mod cuda;

pub use cuda::{CudaDriverApi, CudaError, CudaInterop, DeviceUuid};
