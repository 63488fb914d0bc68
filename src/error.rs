//! Error types for the library

use crate::vector::ImageId;
use thiserror::Error;

/// Error types for the vector renderer and the frame renderer
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Host allocation of {requested} {what} failed")]
    HostAllocation { what: &'static str, requested: usize },

    #[error("Unknown image id {0}")]
    UnknownImage(ImageId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[cfg(feature = "ash")]
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Graphics error: {0}")]
    Graphics(#[from] crate::graphics::error::GraphicsError),

    #[error("CUDA interop error: {0}")]
    Cuda(#[from] crate::interop::cuda::CudaError),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<Box<dyn std::error::Error>> for RenderError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        RenderError::Other(err.to_string())
    }
}

/// Convenience type alias for Results with [`RenderError`]
pub type CrateResult<T> = std::result::Result<T, RenderError>;
