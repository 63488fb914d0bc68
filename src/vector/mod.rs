//! Vector-graphics rasterizer backend
//!
//! Flattened paths come in as fill fans and stroke strips. They are batched
//! per frame into a handful of growable arrays and replayed at flush time:
//! - [`recorder`] turns fills, strokes and triangle lists into draw calls
//! - [`replay`] walks the calls through stencil-then-cover passes
//! - [`pipeline`] derives fixed-function state from a render-state key and caches pipelines
//! - [`device`] is the seam to the graphics API, implemented for Vulkan in `vulkan`

pub mod device;
pub mod growable;
pub mod pipeline;
pub mod recorder;
pub mod renderer;
pub mod replay;
pub mod texture;
pub mod types;
pub mod uniforms;
#[cfg(feature = "ash")]
pub mod vulkan;

pub use device::{FrameUpload, TextureDesc, TextureRegion, VectorDevice};
pub use pipeline::{PipelineDescription, PipelineKey, StencilStroke, Topology};
pub use recorder::{CallKind, DrawCall, DrawState, PathRecord};
pub use renderer::VectorRenderer;
pub use replay::FlushStats;
pub use types::{
    BlendFactor, Bounds, Color, CompositeOp, CompositeOperation, ImageFlags, ImageId, Paint,
    PathData, Scissor, Span, TextureKind, Vertex,
};
pub use uniforms::UniformOffset;
