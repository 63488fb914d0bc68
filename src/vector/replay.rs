//! Replays recorded draw calls against a [`VectorDevice`].

use crate::config::{CanvasConfig, FillTopology};
use crate::error::CrateResult;
use crate::vector::device::VectorDevice;
use crate::vector::pipeline::{PipelineCache, PipelineKey, StencilStroke, Topology};
use crate::vector::recorder::{CallKind, DrawCall, PathRecord};
use crate::vector::texture::TextureTable;
use crate::vector::types::Span;

/// Counters of one flush
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub calls: usize,
    pub draws: usize,
    pub descriptor_sets: usize,
}

pub(crate) struct Replay<'a, D: VectorDevice> {
    pub device: &'a mut D,
    pub pipelines: &'a mut PipelineCache<D::Pipeline>,
    pub textures: &'a TextureTable<D::Texture>,
    pub paths: &'a [PathRecord],
    pub config: CanvasConfig,
    pub stride: usize,
    pub stats: FlushStats,
}

impl<D: VectorDevice> Replay<'_, D> {
    pub fn call(&mut self, call: &DrawCall) -> CrateResult<()> {
        match call.kind {
            CallKind::Fill => self.fill(call)?,
            CallKind::ConvexFill => self.convex_fill(call)?,
            CallKind::Stroke => self.stroke(call)?,
            CallKind::Triangles => self.triangles(call)?,
        }
        self.stats.calls += 1;
        Ok(())
    }

    fn fill_topology(&self) -> Topology {
        match self.config.fill_topology {
            FillTopology::TriangleList => Topology::TriangleList,
            FillTopology::TriangleFan => Topology::TriangleFan,
        }
    }

    fn base_key(&self, call: &DrawCall, topology: Topology) -> PipelineKey {
        PipelineKey {
            topology,
            edge_aa_shader: self.config.antialias,
            composite: call.composite,
            ..PipelineKey::default()
        }
    }

    /// Allocate and bind the descriptor set of the `block`-th uniform block of `call`
    fn bind_uniforms(&mut self, call: &DrawCall, block: usize) -> CrateResult<()> {
        let offset = call.uniform.advanced(block, self.stride)?;
        let texture = call
            .image
            .and_then(|id| self.textures.get(id))
            .map(|entry| &entry.resource);
        let set = self.device.allocate_descriptor_set(offset, texture)?;
        self.device.bind_descriptor_set(set);
        self.stats.descriptor_sets += 1;
        Ok(())
    }

    fn draw(&mut self, span: Span) {
        if span.is_empty() {
            return;
        }
        self.device.draw(span.offset as u32, span.count as u32);
        self.stats.draws += 1;
    }

    fn draw_fills(&mut self, call: &DrawCall) {
        for i in call.paths.range() {
            let span = self.paths[i].fill;
            self.draw(span);
        }
    }

    fn draw_strokes(&mut self, call: &DrawCall) {
        for i in call.paths.range() {
            let span = self.paths[i].stroke;
            self.draw(span);
        }
    }

    fn fill(&mut self, call: &DrawCall) -> CrateResult<()> {
        // Stencil: accumulate winding without touching colour
        let mut key = self.base_key(call, self.fill_topology());
        key.stencil_fill = true;
        self.pipelines.bind(&key, &mut *self.device)?;
        self.bind_uniforms(call, 0)?;
        self.draw_fills(call);

        self.bind_uniforms(call, 1)?;

        if self.config.antialias {
            key.topology = Topology::TriangleStrip;
            key.stencil_fill = false;
            key.stencil_test = true;
            key.edge_aa = true;
            self.pipelines.bind(&key, &mut *self.device)?;
            self.draw_strokes(call);
        }

        // Cover the bounds where the stencil is non-zero and clear it
        key.topology = Topology::TriangleStrip;
        key.stencil_fill = false;
        key.stencil_test = true;
        key.edge_aa = false;
        self.pipelines.bind(&key, &mut *self.device)?;
        self.draw(call.triangles);
        Ok(())
    }

    fn convex_fill(&mut self, call: &DrawCall) -> CrateResult<()> {
        let mut key = self.base_key(call, self.fill_topology());
        self.pipelines.bind(&key, &mut *self.device)?;
        self.bind_uniforms(call, 0)?;
        self.draw_fills(call);

        if self.config.antialias {
            key.topology = Topology::TriangleStrip;
            self.pipelines.bind(&key, &mut *self.device)?;
            self.draw_strokes(call);
        }
        Ok(())
    }

    fn stroke(&mut self, call: &DrawCall) -> CrateResult<()> {
        let mut key = self.base_key(call, Topology::TriangleStrip);

        if !self.config.stencil_strokes {
            self.pipelines.bind(&key, &mut *self.device)?;
            self.bind_uniforms(call, 0)?;
            self.draw_strokes(call);
            return Ok(());
        }

        // Interior without overlap, thresholded
        key.stencil_stroke = StencilStroke::Fill;
        self.pipelines.bind(&key, &mut *self.device)?;
        self.bind_uniforms(call, 1)?;
        self.draw_strokes(call);

        // Anti-aliased edges where the interior did not draw
        key.stencil_stroke = StencilStroke::DrawAa;
        self.pipelines.bind(&key, &mut *self.device)?;
        self.bind_uniforms(call, 0)?;
        self.draw_strokes(call);

        key.stencil_stroke = StencilStroke::Clear;
        self.pipelines.bind(&key, &mut *self.device)?;
        self.draw_strokes(call);
        Ok(())
    }

    fn triangles(&mut self, call: &DrawCall) -> CrateResult<()> {
        if call.triangles.is_empty() {
            return Ok(());
        }
        let key = self.base_key(call, Topology::TriangleList);
        self.pipelines.bind(&key, &mut *self.device)?;
        self.bind_uniforms(call, 0)?;
        self.draw(call.triangles);
        Ok(())
    }
}
