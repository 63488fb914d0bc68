use crate::error::CrateResult;
use std::any::Any;

/// Size and scale of the area a widget draws into
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SurfaceLayout {
    /// Logical window size
    pub window_width: f32,
    pub window_height: f32,
    pub scale_factor: f32,
    /// Framebuffer shown on screen
    pub fbo_width_display: u32,
    pub fbo_height_display: u32,
    /// Framebuffer rendered into, larger than the display one when supersampling
    pub fbo_width_internal: u32,
    pub fbo_height_internal: u32,
}

impl Default for SurfaceLayout {
    fn default() -> Self {
        Self {
            window_width: 1.0,
            window_height: 1.0,
            scale_factor: 1.0,
            fbo_width_display: 1,
            fbo_height_display: 1,
            fbo_width_internal: 1,
            fbo_height_internal: 1,
        }
    }
}

impl SurfaceLayout {
    /// Ratio of internal framebuffer pixels to logical window units
    pub fn device_pixel_ratio(&self) -> f32 {
        if self.window_width > 0.0 {
            self.fbo_width_internal as f32 / self.window_width
        } else {
            1.0
        }
    }
}

/// The swapchain slot a frame is recorded for
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    pub slot: usize,
    pub slot_count: usize,
}

impl FrameInfo {
    pub fn single() -> Self {
        Self {
            slot: 0,
            slot_count: 1,
        }
    }
}

/// A renderer a [`VectorWidget`](super::VectorWidget) draws through
pub trait VectorBackend: Any {
    fn id(&self) -> &'static str;

    fn initialize(&mut self, layout: &SurfaceLayout) -> CrateResult<()>;

    fn on_resize(&mut self, layout: &SurfaceLayout) -> CrateResult<()>;

    fn render_start(&mut self, frame: &FrameInfo) -> CrateResult<()>;

    fn render_end(&mut self) -> CrateResult<()>;

    fn destroy(&mut self);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
