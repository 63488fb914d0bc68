//! Vector backend over [`VectorRenderer`]
//!
//! Frames for different swapchain slots may be in flight at the same time,
//! so every slot gets its own renderer and with it its own vertex, uniform
//! and descriptor storage.
//!
//! When the slot count shrinks, the renderers of the removed slots are
//! dropped. Dropping a renderer waits for its device to go idle before its
//! pipelines, textures and buffers are destroyed.

use crate::config::{CanvasConfig, WidgetSettings};
use crate::error::{CrateResult, RenderError};
use crate::vector::{FlushStats, VectorDevice, VectorRenderer};
use crate::widget::backend::{FrameInfo, SurfaceLayout, VectorBackend};
use glam::Vec4;
use std::any::Any;

/// Creates the device of a swapchain slot
pub type DeviceFactory<D> = Box<dyn FnMut(usize) -> CrateResult<D>>;

pub struct CanvasBackend<D: VectorDevice> {
    config: CanvasConfig,
    clear_color: Option<Vec4>,
    make_device: DeviceFactory<D>,
    contexts: Vec<VectorRenderer<D>>,
    current: Option<usize>,
    layout: SurfaceLayout,
    last_stats: FlushStats,
}

impl<D: VectorDevice + 'static> CanvasBackend<D> {
    pub const ID: &'static str = "canvas";

    pub fn new(config: CanvasConfig, settings: &WidgetSettings, make_device: DeviceFactory<D>) -> Self {
        Self {
            config,
            clear_color: settings.clear_before_render.then_some(settings.clear_color),
            make_device,
            contexts: Vec::new(),
            current: None,
            layout: SurfaceLayout::default(),
            last_stats: FlushStats::default(),
        }
    }

    /// Colour the target is cleared to before drawing, if it is cleared at all
    pub fn clear_color(&self) -> Option<Vec4> {
        self.clear_color
    }

    pub fn slot_count(&self) -> usize {
        self.contexts.len()
    }

    /// Renderer of the slot being recorded, between `render_start` and `render_end`
    pub fn context_mut(&mut self) -> Option<&mut VectorRenderer<D>> {
        let slot = self.current?;
        self.contexts.get_mut(slot)
    }

    pub fn context(&self, slot: usize) -> Option<&VectorRenderer<D>> {
        self.contexts.get(slot)
    }

    pub fn last_stats(&self) -> FlushStats {
        self.last_stats
    }

    fn ensure_slots(&mut self, slot_count: usize) -> CrateResult<()> {
        if self.contexts.len() > slot_count {
            log::debug!(
                "dropping vector contexts of swapchain slots {slot_count}..{}",
                self.contexts.len()
            );
            self.contexts.truncate(slot_count);
        }
        while self.contexts.len() < slot_count {
            let slot = self.contexts.len();
            let device = (self.make_device)(slot)?;
            self.contexts.push(VectorRenderer::new(device, self.config));
            log::debug!("created vector context for swapchain slot {slot}");
        }
        Ok(())
    }
}

impl<D: VectorDevice + 'static> VectorBackend for CanvasBackend<D> {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn initialize(&mut self, layout: &SurfaceLayout) -> CrateResult<()> {
        self.layout = *layout;
        Ok(())
    }

    fn on_resize(&mut self, layout: &SurfaceLayout) -> CrateResult<()> {
        self.layout = *layout;
        Ok(())
    }

    fn render_start(&mut self, frame: &FrameInfo) -> CrateResult<()> {
        if frame.slot >= frame.slot_count {
            return Err(RenderError::InvalidArgument(format!(
                "swapchain slot {} out of {}",
                frame.slot, frame.slot_count
            )));
        }
        self.ensure_slots(frame.slot_count)?;
        self.current = Some(frame.slot);

        let layout = self.layout;
        let context = &mut self.contexts[frame.slot];
        context.cancel();
        context.begin_frame(
            layout.window_width,
            layout.window_height,
            layout.device_pixel_ratio(),
        );
        Ok(())
    }

    fn render_end(&mut self) -> CrateResult<()> {
        let Some(slot) = self.current.take() else {
            return Ok(());
        };
        if let Some(context) = self.contexts.get_mut(slot) {
            self.last_stats = context.flush()?;
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.current = None;
        self.contexts.clear();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
