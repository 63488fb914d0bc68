//! Vulkan rendering helpers and a vector-graphics rasterizer
//!
//! - [`graphics`]: frame renderer with a per-swapchain-image matrix cache
//! - [`vector`]: batched fills, strokes and triangle lists replayed through
//!   stencil-then-cover pipelines
//! - [`widget`]: vector widgets and their backend registry
//! - [`interop`]: CUDA device matching as an injected capability

pub mod config;
pub mod error;
pub mod graphics;
pub mod interop;
pub mod logging;
pub mod vector;
pub mod widget;

pub use config::{CanvasConfig, RendererConfig, WidgetSettings};
pub use error::{CrateResult, RenderError};
