//! Frame renderer on top of ash
//!
//! - [`frame_cache`] keeps per-swapchain-image pools of matrix uniform buffers
//! - [`renderer`] records draws and dispatches, binding the matrix block before each draw
//! - [`device`] creates an instance, device and graphics queue for headless use

#[cfg(feature = "ash")]
pub mod buffer;
#[cfg(feature = "ash")]
pub mod device;
pub mod error;
pub mod frame_cache;
#[cfg(feature = "ash")]
pub mod renderer;

pub use frame_cache::{MatrixBlockCache, MatrixResourceAllocator};
#[cfg(feature = "ash")]
pub use renderer::{ComputeData, GraphicsPipelineTarget, RasterData, Renderer, SwapchainInfo};
