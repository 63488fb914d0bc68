//! Public entry point of the vector rasterizer backend.

use crate::config::CanvasConfig;
use crate::error::{CrateResult, RenderError};
use crate::vector::device::{FrameUpload, TextureDesc, TextureRegion, VectorDevice};
use crate::vector::pipeline::PipelineCache;
use crate::vector::recorder::{DrawState, FrameRecorder};
use crate::vector::replay::{FlushStats, Replay};
use crate::vector::texture::{TextureEntry, TextureTable};
use crate::vector::types::{Bounds, ImageFlags, ImageId, PathData, TextureKind, Vertex};
use shared::ViewUniforms;

/// Records vector draw calls for a frame and replays them on a device.
///
/// Typical frame:
/// 1. [`VectorRenderer::begin_frame`] with the viewport size
/// 2. any number of [`fill`](VectorRenderer::fill), [`stroke`](VectorRenderer::stroke)
///    and [`triangles`](VectorRenderer::triangles) submissions
/// 3. [`VectorRenderer::flush`] inside the render pass, or
///    [`VectorRenderer::cancel`] to drop the frame
pub struct VectorRenderer<D: VectorDevice> {
    device: D,
    recorder: FrameRecorder,
    pipelines: PipelineCache<D::Pipeline>,
    textures: TextureTable<D::Texture>,
    view: ViewUniforms,
    device_pixel_ratio: f32,
}

impl<D: VectorDevice> VectorRenderer<D> {
    pub fn new(device: D, config: CanvasConfig) -> Self {
        let alignment = device.min_uniform_alignment();
        log::debug!("vector renderer: {config:?}, uniform alignment {alignment}");
        Self {
            device,
            recorder: FrameRecorder::new(config, alignment),
            pipelines: PipelineCache::new(),
            textures: TextureTable::new(),
            view: ViewUniforms::default(),
            device_pixel_ratio: 1.0,
        }
    }

    pub fn config(&self) -> &CanvasConfig {
        self.recorder.config()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn recorder(&self) -> &FrameRecorder {
        &self.recorder
    }

    /// Number of distinct pipelines compiled so far
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Set the logical viewport for the next flush
    pub fn begin_frame(&mut self, width: f32, height: f32, device_pixel_ratio: f32) {
        self.view.view_size = [width, height];
        self.device_pixel_ratio = if device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
    }

    /// Anti-aliasing fringe width matching the current pixel ratio
    pub fn fringe_width(&self) -> f32 {
        1.0 / self.device_pixel_ratio
    }

    pub fn view_size(&self) -> [f32; 2] {
        self.view.view_size
    }

    /// Record a fill. Returns `false` when the draw was dropped.
    pub fn fill(&mut self, state: &DrawState, bounds: Bounds, paths: &[PathData<'_>]) -> bool {
        self.recorder.fill(&self.textures, state, bounds, paths).is_ok()
    }

    /// Record a stroke. Returns `false` when the draw was dropped.
    pub fn stroke(&mut self, state: &DrawState, stroke_width: f32, paths: &[PathData<'_>]) -> bool {
        self.recorder
            .stroke(&self.textures, state, stroke_width, paths)
            .is_ok()
    }

    /// Record a triangle list. Returns `false` when the draw was dropped.
    pub fn triangles(&mut self, state: &DrawState, vertices: &[Vertex]) -> bool {
        self.recorder.triangles(&self.textures, state, vertices).is_ok()
    }

    /// Upload the frame and replay every recorded call in submission order.
    ///
    /// The recorded frame is discarded afterwards whether or not replay
    /// succeeded; an error means a GPU resource could not be created.
    pub fn flush(&mut self) -> CrateResult<FlushStats> {
        let result = self.replay();
        self.recorder.reset();
        if let Ok(stats) = &result {
            log::trace!(
                "flushed {} calls: {} draws, {} descriptor sets",
                stats.calls,
                stats.draws,
                stats.descriptor_sets
            );
        }
        result
    }

    fn replay(&mut self) -> CrateResult<FlushStats> {
        if self.recorder.is_empty() {
            return Ok(FlushStats::default());
        }

        let config = *self.recorder.config();
        let stride = self.recorder.uniforms().stride();
        let (vertices, uniforms, calls, paths) = self.recorder.frame_data();
        self.device.upload(&FrameUpload {
            vertices: bytemuck::cast_slice(vertices),
            uniforms,
            view: self.view,
        })?;

        self.pipelines.reset_binding();
        self.device.prepare_descriptors(calls.len())?;

        let mut replay = Replay {
            device: &mut self.device,
            pipelines: &mut self.pipelines,
            textures: &self.textures,
            paths,
            config,
            stride,
            stats: FlushStats::default(),
        };
        for call in calls {
            replay.call(call)?;
        }
        Ok(replay.stats)
    }

    /// Drop everything recorded since the last flush
    pub fn cancel(&mut self) {
        self.recorder.reset();
    }

    /// Create a texture, zero-filled when `data` is `None`
    pub fn create_texture(
        &mut self,
        kind: TextureKind,
        width: u32,
        height: u32,
        flags: ImageFlags,
        data: Option<&[u8]>,
    ) -> CrateResult<ImageId> {
        let desc = TextureDesc {
            kind,
            width,
            height,
            flags,
        };
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidArgument(format!(
                "texture size {width}x{height}"
            )));
        }
        if let Some(data) = data {
            if data.len() < desc.byte_len() {
                return Err(RenderError::InvalidArgument(format!(
                    "texture data holds {} bytes, {} needed",
                    data.len(),
                    desc.byte_len()
                )));
            }
        }

        let slot = self.textures.vacant_slot()?;
        let resource = self.device.create_texture(&desc, data)?;
        let id = self.textures.occupy(slot, TextureEntry { resource, desc });
        log::debug!("created {kind:?} texture {id} ({width}x{height})");
        Ok(id)
    }

    /// Copy `region` of `data` (the whole image) into texture `id`
    pub fn update_texture(&mut self, id: ImageId, region: TextureRegion, data: &[u8]) -> CrateResult<()> {
        let entry = self
            .textures
            .get_mut(id)
            .ok_or(RenderError::UnknownImage(id))?;
        if !region.fits(&entry.desc) {
            return Err(RenderError::InvalidArgument(format!(
                "region {region:?} outside {}x{} texture",
                entry.desc.width, entry.desc.height
            )));
        }
        if data.len() < entry.desc.byte_len() {
            return Err(RenderError::InvalidArgument(format!(
                "texture data holds {} bytes, {} needed",
                data.len(),
                entry.desc.byte_len()
            )));
        }
        let desc = entry.desc;
        self.device
            .update_texture(&mut entry.resource, &desc, region, data)
    }

    /// Destroy texture `id`; returns whether it existed
    pub fn delete_texture(&mut self, id: ImageId) -> bool {
        match self.textures.remove(id) {
            Some(entry) => {
                self.device.destroy_texture(entry.resource);
                log::debug!("deleted texture {id}");
                true
            }
            None => false,
        }
    }

    pub fn texture_size(&self, id: ImageId) -> Option<(u32, u32)> {
        self.textures.size(id)
    }
}

impl<D: VectorDevice> Drop for VectorRenderer<D> {
    fn drop(&mut self) {
        let device = &mut self.device;
        // Frames of this context may still be in flight
        device.wait_idle();
        self.textures.drain(|texture| device.destroy_texture(texture));
        self.pipelines.drain(|pipeline| device.destroy_pipeline(pipeline));
    }
}
