//! Construction-time settings.
//!
//! Everything here is passed in explicitly; nothing reads global state.

use glam::Vec4;

/// How fill fans are laid out in the vertex buffer
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FillTopology {
    /// Fans are re-triangulated into independent triangles around vertex 0
    #[default]
    TriangleList,
    /// Fans are copied verbatim
    TriangleFan,
}

/// Options for one vector renderer instance
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CanvasConfig {
    /// Draw the anti-aliasing fringe passes and use the edge-AA fragment shader
    pub antialias: bool,
    /// Render strokes through the three-pass stencil technique
    pub stencil_strokes: bool,
    /// Extra validation and logging of recorded calls
    pub debug: bool,
    pub fill_topology: FillTopology,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            antialias: true,
            stencil_strokes: true,
            debug: false,
            fill_topology: FillTopology::TriangleList,
        }
    }
}

/// Rendering API a vector backend targets
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderSystem {
    OpenGl,
    OpenGlEs,
    #[default]
    Vulkan,
}

impl RenderSystem {
    pub fn name(self) -> &'static str {
        match self {
            RenderSystem::OpenGl => "opengl",
            RenderSystem::OpenGlEs => "opengles",
            RenderSystem::Vulkan => "vulkan",
        }
    }
}

/// Settings of a vector widget and its framebuffer
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WidgetSettings {
    pub render_system: RenderSystem,
    pub clear_before_render: bool,
    pub clear_color: Vec4,
    pub use_msaa: bool,
    pub msaa_samples: u32,
    /// Only used when MSAA is off
    pub supersampling_factor: u32,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            render_system: RenderSystem::Vulkan,
            clear_before_render: true,
            clear_color: Vec4::ZERO,
            use_msaa: false,
            msaa_samples: 8,
            supersampling_factor: 4,
        }
    }
}

/// Settings of the frame renderer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RendererConfig {
    /// Upper bound of matrix blocks allocated over all swapchain images, which
    /// is also the size of the matrix descriptor pool
    pub max_frame_cache_size: u32,
    /// Descriptor set index the matrix block is bound at
    pub matrix_set_index: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_frame_cache_size: 1000,
            matrix_set_index: 7,
        }
    }
}
