//! A window region drawn with a vector backend
//!
//! The widget owns the framebuffer geometry and the backend instance. The
//! backend is created from the registry's default entry on the first
//! [`VectorWidget::render`] call, not at construction.

use crate::config::WidgetSettings;
use crate::error::{CrateResult, RenderError};
use crate::widget::backend::{FrameInfo, SurfaceLayout, VectorBackend};
use crate::widget::registry::BackendRegistry;

const DEFAULT_WINDOW_OFFSET: f32 = 20.0;

struct ActiveBackend {
    id: String,
    backend: Box<dyn VectorBackend>,
}

pub struct VectorWidget {
    settings: WidgetSettings,
    registry: BackendRegistry,
    active: Option<ActiveBackend>,
    window_offset: (f32, f32),
    window_size: (f32, f32),
    display_scale: f32,
    /// Overrides the display scale when positive
    custom_scale_factor: f32,
    layout: SurfaceLayout,
}

impl VectorWidget {
    pub fn new(settings: WidgetSettings, registry: BackendRegistry) -> Self {
        let mut widget = Self {
            settings,
            registry,
            active: None,
            window_offset: (DEFAULT_WINDOW_OFFSET, DEFAULT_WINDOW_OFFSET),
            window_size: (1.0, 1.0),
            display_scale: 1.0,
            custom_scale_factor: 0.0,
            layout: SurfaceLayout::default(),
        };
        widget.layout = widget.compute_layout();
        widget
    }

    pub fn settings(&self) -> &WidgetSettings {
        &self.settings
    }

    pub fn registry_mut(&mut self) -> &mut BackendRegistry {
        &mut self.registry
    }

    pub fn set_default_backend_id(&mut self, id: impl Into<String>) {
        self.registry.set_default_id(id);
    }

    pub fn layout(&self) -> &SurfaceLayout {
        &self.layout
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    pub fn backend_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.id.as_str())
    }

    /// The active backend as its concrete type
    pub fn backend_mut<T: VectorBackend>(&mut self) -> Option<&mut T> {
        self.active
            .as_mut()
            .and_then(|active| active.backend.as_any_mut().downcast_mut::<T>())
    }

    /// Position and logical size of the widget inside its window
    pub fn set_window_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> CrateResult<()> {
        self.window_offset = (x, y);
        self.window_size = (width.max(1.0), height.max(1.0));
        self.on_window_size_changed()
    }

    pub fn set_display_scale(&mut self, scale: f32) -> CrateResult<()> {
        self.display_scale = scale;
        self.on_window_size_changed()
    }

    pub fn set_custom_scale_factor(&mut self, scale: f32) -> CrateResult<()> {
        self.custom_scale_factor = scale;
        self.on_window_size_changed()
    }

    fn compute_layout(&self) -> SurfaceLayout {
        let scale_factor = if self.custom_scale_factor > 0.0 {
            self.custom_scale_factor
        } else {
            self.display_scale
        };
        let (window_width, window_height) = self.window_size;
        let fbo_width_display = (window_width * scale_factor).ceil().max(1.0) as u32;
        let fbo_height_display = (window_height * scale_factor).ceil().max(1.0) as u32;
        let supersampling = if self.settings.use_msaa {
            1
        } else {
            self.settings.supersampling_factor.max(1)
        };

        SurfaceLayout {
            window_width,
            window_height,
            scale_factor,
            fbo_width_display,
            fbo_height_display,
            fbo_width_internal: fbo_width_display * supersampling,
            fbo_height_internal: fbo_height_display * supersampling,
        }
    }

    /// Recompute framebuffer sizes and tell an initialised backend
    pub fn on_window_size_changed(&mut self) -> CrateResult<()> {
        self.layout = self.compute_layout();
        if let Some(active) = self.active.as_mut() {
            active.backend.on_resize(&self.layout)?;
        }
        Ok(())
    }

    fn initialize(&mut self) -> CrateResult<()> {
        let id = self
            .registry
            .default_id()
            .ok_or_else(|| RenderError::Other("no vector backend registered".to_string()))?
            .to_string();
        let mut backend = self.registry.create(&id, &self.settings)?;
        backend.initialize(&self.layout)?;
        log::debug!(
            "vector widget uses backend {id} ({}), framebuffer {}x{}",
            self.settings.render_system.name(),
            self.layout.fbo_width_internal,
            self.layout.fbo_height_internal
        );
        self.active = Some(ActiveBackend { id, backend });
        Ok(())
    }

    /// Draw one frame for `frame.slot`, creating the backend on first use
    pub fn render(&mut self, frame: &FrameInfo) -> CrateResult<()> {
        if self.active.is_none() {
            self.initialize()?;
        }
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };

        active.backend.render_start(frame)?;
        let drawn = self.registry.render(&active.id, active.backend.as_mut());
        // render_end closes the frame even when the hook failed
        let ended = active.backend.render_end();
        drawn.and(ended)
    }

    /// Whether the mouse, in window coordinates, is over the widget
    pub fn is_mouse_over(&self, mouse_x: f32, mouse_y: f32) -> bool {
        let (x, y) = self.window_offset;
        let (width, height) = self.window_size;
        mouse_x >= x && mouse_y >= y && mouse_x <= x + width && mouse_y <= y + height
    }

    /// Like [`Self::is_mouse_over`] with the widget placed inside a parent
    /// rectangle that clips it
    pub fn is_mouse_over_in_parent(
        &self,
        mouse_x: f32,
        mouse_y: f32,
        parent: (f32, f32, f32, f32),
    ) -> bool {
        let (parent_x, parent_y, parent_width, parent_height) = parent;
        let inside_parent = mouse_x >= parent_x
            && mouse_y >= parent_y
            && mouse_x <= parent_x + parent_width
            && mouse_y <= parent_y + parent_height;
        inside_parent && self.is_mouse_over(mouse_x - parent_x, mouse_y - parent_y)
    }

    pub fn destroy(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.backend.destroy();
        }
    }
}

impl Drop for VectorWidget {
    fn drop(&mut self) {
        self.destroy();
    }
}
