//! Vector-graphics widgets and their pluggable backends

pub mod backend;
pub mod canvas;
pub mod registry;
pub mod vector_widget;

pub use backend::{FrameInfo, SurfaceLayout, VectorBackend};
pub use canvas::{CanvasBackend, DeviceFactory};
pub use registry::{BackendConstructor, BackendRegistry, RenderHook};
pub use vector_widget::VectorWidget;
