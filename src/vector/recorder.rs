//! Records fills, strokes and triangle lists into the frame's arrays.
//!
//! Each submission becomes one [`DrawCall`] referencing spans of the path,
//! vertex and uniform arrays. A submission that fails part way leaves the
//! recorder exactly as it was before the submission.

use crate::config::{CanvasConfig, FillTopology};
use crate::error::{CrateResult, RenderError};
use crate::vector::growable::{GrowableBuffer, CALL_FLOOR, PATH_FLOOR, VERTEX_FLOOR};
use crate::vector::texture::TextureLookup;
use crate::vector::types::{Bounds, CompositeOperation, ImageId, Paint, PathData, Scissor, Span, Vertex};
use crate::vector::uniforms::{
    convert_paint, simple_fill_uniforms, TextureInfo, UniformArena, UniformOffset,
    STROKE_ALPHA_THRESHOLD,
};
use shared::ShaderType;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// Stencil-then-cover fill of arbitrary paths
    #[default]
    Fill,
    /// Single convex path drawn directly
    ConvexFill,
    Stroke,
    Triangles,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DrawCall {
    pub kind: CallKind,
    pub image: Option<ImageId>,
    pub paths: Span,
    /// Cover quad for fills, vertex list for triangles
    pub triangles: Span,
    pub uniform: UniformOffset,
    pub composite: CompositeOperation,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PathRecord {
    pub fill: Span,
    pub stroke: Span,
}

/// Paint and clipping shared by one submission
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawState {
    pub paint: Paint,
    pub composite: CompositeOperation,
    pub scissor: Scissor,
    /// Width of the anti-aliasing fringe in canvas units
    pub fringe: f32,
}

impl DrawState {
    pub fn new(paint: Paint) -> Self {
        Self {
            paint,
            composite: CompositeOperation::default(),
            scissor: Scissor::NONE,
            fringe: 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Checkpoint {
    calls: usize,
    paths: usize,
    verts: usize,
    uniforms: usize,
}

#[derive(Debug)]
pub struct FrameRecorder {
    config: CanvasConfig,
    calls: GrowableBuffer<DrawCall>,
    paths: GrowableBuffer<PathRecord>,
    verts: GrowableBuffer<Vertex>,
    uniforms: UniformArena,
}

/// Vertices a fill fan of `n` vertices occupies under `topology`
pub fn fill_vertex_count(topology: FillTopology, n: usize) -> usize {
    match topology {
        FillTopology::TriangleList => n.saturating_sub(2) * 3,
        FillTopology::TriangleFan => n,
    }
}

impl FrameRecorder {
    pub fn new(config: CanvasConfig, min_uniform_alignment: usize) -> Self {
        Self {
            config,
            calls: GrowableBuffer::new("draw calls", CALL_FLOOR),
            paths: GrowableBuffer::new("paths", PATH_FLOOR),
            verts: GrowableBuffer::new("vertices", VERTEX_FLOOR),
            uniforms: UniformArena::new(min_uniform_alignment),
        }
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    /// Record a fill of `paths` covering `bounds`.
    pub fn fill(
        &mut self,
        textures: &impl TextureLookup,
        state: &DrawState,
        bounds: Bounds,
        paths: &[PathData<'_>],
    ) -> CrateResult<()> {
        let checkpoint = self.checkpoint();
        let result = self.record_fill(textures, state, bounds, paths);
        self.finish(result, checkpoint, "fill")
    }

    /// Record a stroke of `paths` with the given stroke width.
    pub fn stroke(
        &mut self,
        textures: &impl TextureLookup,
        state: &DrawState,
        stroke_width: f32,
        paths: &[PathData<'_>],
    ) -> CrateResult<()> {
        let checkpoint = self.checkpoint();
        let result = self.record_stroke(textures, state, stroke_width, paths);
        self.finish(result, checkpoint, "stroke")
    }

    /// Record an already triangulated vertex list.
    pub fn triangles(
        &mut self,
        textures: &impl TextureLookup,
        state: &DrawState,
        vertices: &[Vertex],
    ) -> CrateResult<()> {
        let checkpoint = self.checkpoint();
        let result = self.record_triangles(textures, state, vertices);
        self.finish(result, checkpoint, "triangles")
    }

    fn record_fill(
        &mut self,
        textures: &impl TextureLookup,
        state: &DrawState,
        bounds: Bounds,
        paths: &[PathData<'_>],
    ) -> CrateResult<()> {
        let topology = self.config.fill_topology;
        let convex = paths.len() == 1 && paths[0].convex;
        let quad_verts = if convex { 0 } else { 4 };

        let path_offset = self.paths.allocate(paths.len())?;
        let vertex_total = paths
            .iter()
            .map(|p| fill_vertex_count(topology, p.fill.len()) + p.stroke.len())
            .sum::<usize>()
            + quad_verts;
        let mut offset = self.verts.allocate(vertex_total)?;

        for (i, path) in paths.iter().enumerate() {
            let mut record = PathRecord::default();
            if !path.fill.is_empty() {
                let count = self.write_fill(offset, path.fill);
                record.fill = Span::new(offset, count);
                offset += count;
            }
            if !path.stroke.is_empty() {
                let count = path.stroke.len();
                self.verts.as_mut_slice()[offset..offset + count].copy_from_slice(path.stroke);
                record.stroke = Span::new(offset, count);
                offset += count;
            }
            self.paths.as_mut_slice()[path_offset + i] = record;
        }

        let mut call = DrawCall {
            kind: if convex {
                CallKind::ConvexFill
            } else {
                CallKind::Fill
            },
            image: state.paint.image,
            paths: Span::new(path_offset, paths.len()),
            composite: state.composite,
            ..DrawCall::default()
        };

        if convex {
            call.uniform = self.uniforms.allocate(1)?;
            let frag = self.paint_uniforms(textures, state, state.fringe, -1.0)?;
            self.write_block(call.uniform, frag)?;
        } else {
            let (min, max) = (bounds.min, bounds.max);
            let quad = [
                Vertex::new(max.x, max.y, 0.5, 1.0),
                Vertex::new(max.x, min.y, 0.5, 1.0),
                Vertex::new(min.x, max.y, 0.5, 1.0),
                Vertex::new(min.x, min.y, 0.5, 1.0),
            ];
            self.verts.as_mut_slice()[offset..offset + 4].copy_from_slice(&quad);
            call.triangles = Span::new(offset, 4);

            call.uniform = self.uniforms.allocate(2)?;
            self.write_block(call.uniform, simple_fill_uniforms())?;
            let frag = self.paint_uniforms(textures, state, state.fringe, -1.0)?;
            self.write_block(self.uniforms.offset_of(call.uniform, 1)?, frag)?;
        }

        self.push_call(call)
    }

    fn record_stroke(
        &mut self,
        textures: &impl TextureLookup,
        state: &DrawState,
        stroke_width: f32,
        paths: &[PathData<'_>],
    ) -> CrateResult<()> {
        let path_offset = self.paths.allocate(paths.len())?;
        let vertex_total = paths.iter().map(|p| p.stroke.len()).sum::<usize>();
        let mut offset = self.verts.allocate(vertex_total)?;

        for (i, path) in paths.iter().enumerate() {
            let mut record = PathRecord::default();
            if !path.stroke.is_empty() {
                let count = path.stroke.len();
                self.verts.as_mut_slice()[offset..offset + count].copy_from_slice(path.stroke);
                record.stroke = Span::new(offset, count);
                offset += count;
            }
            self.paths.as_mut_slice()[path_offset + i] = record;
        }

        let mut call = DrawCall {
            kind: CallKind::Stroke,
            image: state.paint.image,
            paths: Span::new(path_offset, paths.len()),
            composite: state.composite,
            ..DrawCall::default()
        };

        if self.config.stencil_strokes {
            call.uniform = self.uniforms.allocate(2)?;
            let coverage = self.paint_uniforms(textures, state, stroke_width, -1.0)?;
            self.write_block(call.uniform, coverage)?;
            let edges = self.paint_uniforms(textures, state, stroke_width, STROKE_ALPHA_THRESHOLD)?;
            self.write_block(self.uniforms.offset_of(call.uniform, 1)?, edges)?;
        } else {
            call.uniform = self.uniforms.allocate(1)?;
            let frag = self.paint_uniforms(textures, state, stroke_width, -1.0)?;
            self.write_block(call.uniform, frag)?;
        }

        self.push_call(call)
    }

    fn record_triangles(
        &mut self,
        textures: &impl TextureLookup,
        state: &DrawState,
        vertices: &[Vertex],
    ) -> CrateResult<()> {
        let offset = self.verts.extend_from_slice(vertices)?;

        let uniform = self.uniforms.allocate(1)?;
        let mut frag = self.paint_uniforms(textures, state, 1.0, -1.0)?;
        frag.shader_type = ShaderType::Image as i32;
        self.write_block(uniform, frag)?;

        self.push_call(DrawCall {
            kind: CallKind::Triangles,
            image: state.paint.image,
            triangles: Span::new(offset, vertices.len()),
            uniform,
            composite: state.composite,
            ..DrawCall::default()
        })
    }

    /// Write `fan` at `offset` in the configured topology, returning the count
    fn write_fill(&mut self, offset: usize, fan: &[Vertex]) -> usize {
        let out = self.verts.as_mut_slice();
        match self.config.fill_topology {
            FillTopology::TriangleFan => {
                out[offset..offset + fan.len()].copy_from_slice(fan);
                fan.len()
            }
            FillTopology::TriangleList => {
                let mut k = offset;
                for j in 2..fan.len() {
                    out[k] = fan[0];
                    out[k + 1] = fan[j - 1];
                    out[k + 2] = fan[j];
                    k += 3;
                }
                k - offset
            }
        }
    }

    fn paint_uniforms(
        &self,
        textures: &impl TextureLookup,
        state: &DrawState,
        width: f32,
        stroke_thr: f32,
    ) -> CrateResult<shared::FragUniforms> {
        let texture: Option<TextureInfo> = match state.paint.image {
            Some(id) => Some(textures.info(id).ok_or(RenderError::UnknownImage(id))?),
            None => None,
        };
        Ok(convert_paint(
            &state.paint,
            texture.as_ref(),
            &state.scissor,
            width,
            state.fringe,
            stroke_thr,
        ))
    }

    fn write_block(&mut self, offset: UniformOffset, frag: shared::FragUniforms) -> CrateResult<()> {
        let block = self
            .uniforms
            .block_mut(offset)
            .ok_or_else(|| RenderError::Other(format!("uniform offset {} out of range", offset.bytes())))?;
        *block = frag;
        Ok(())
    }

    fn push_call(&mut self, call: DrawCall) -> CrateResult<()> {
        let index = self.calls.allocate(1)?;
        self.calls.as_mut_slice()[index] = call;
        if self.config.debug {
            log::debug!(
                "recorded {:?} #{index}: {} paths, {} triangle verts, uniform @{}",
                call.kind,
                call.paths.count,
                call.triangles.count,
                call.uniform.bytes()
            );
        }
        Ok(())
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            calls: self.calls.len(),
            paths: self.paths.len(),
            verts: self.verts.len(),
            uniforms: self.uniforms.len(),
        }
    }

    fn finish(&mut self, result: CrateResult<()>, checkpoint: Checkpoint, what: &str) -> CrateResult<()> {
        if let Err(err) = &result {
            log::warn!("dropping {what} call: {err}");
            self.calls.truncate(checkpoint.calls);
            self.paths.truncate(checkpoint.paths);
            self.verts.truncate(checkpoint.verts);
            self.uniforms.truncate(checkpoint.uniforms);
        }
        result
    }

    /// Vertices, strided uniform bytes, calls and paths of the frame
    pub fn frame_data(&mut self) -> (&[Vertex], &[u8], &[DrawCall], &[PathRecord]) {
        (
            self.verts.as_slice(),
            self.uniforms.strided_bytes(),
            self.calls.as_slice(),
            self.paths.as_slice(),
        )
    }

    pub fn calls(&self) -> &[DrawCall] {
        self.calls.as_slice()
    }

    pub fn paths(&self) -> &[PathRecord] {
        self.paths.as_slice()
    }

    pub fn vertices(&self) -> &[Vertex] {
        self.verts.as_slice()
    }

    pub fn uniforms(&self) -> &UniformArena {
        &self.uniforms
    }

    pub fn uniforms_mut(&mut self) -> &mut UniformArena {
        &mut self.uniforms
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Forget everything recorded this frame, keeping capacities
    pub fn reset(&mut self) {
        self.calls.reset();
        self.paths.reset();
        self.verts.reset();
        self.uniforms.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::device::TextureDesc;
    use crate::vector::texture::{TextureEntry, TextureTable};
    use crate::vector::types::{Color, ImageFlags, TextureKind};
    use glam::Vec2;

    fn square() -> Vec<Vertex> {
        vec![
            Vertex::new(0.0, 0.0, 0.5, 1.0),
            Vertex::new(10.0, 0.0, 0.5, 1.0),
            Vertex::new(10.0, 10.0, 0.5, 1.0),
            Vertex::new(0.0, 10.0, 0.5, 1.0),
        ]
    }

    fn strip(n: usize) -> Vec<Vertex> {
        (0..n).map(|i| Vertex::new(i as f32, 0.0, 0.0, 1.0)).collect()
    }

    fn recorder(config: CanvasConfig) -> FrameRecorder {
        FrameRecorder::new(config, 256)
    }

    fn no_textures() -> TextureTable<()> {
        TextureTable::new()
    }

    #[test]
    fn convex_fill_has_one_block_and_no_quad() {
        let mut rec = recorder(CanvasConfig::default());
        let fan = square();
        let path = PathData {
            fill: &fan,
            stroke: &[],
            convex: true,
        };
        rec.fill(&no_textures(), &DrawState::new(Paint::color(Color::WHITE)), Bounds::default(), &[path])
            .unwrap();

        let call = rec.calls()[0];
        assert_eq!(call.kind, CallKind::ConvexFill);
        assert_eq!(call.triangles.count, 0);
        assert_eq!(rec.uniforms().len(), 1);
        assert_eq!(rec.vertices().len(), 6);
        assert_eq!(rec.paths()[0].fill, Span::new(0, 6));
    }

    #[test]
    fn concave_fill_list_topology() {
        let mut rec = recorder(CanvasConfig::default());
        let fan = square();
        let fringe = strip(10);
        let paths = [
            PathData {
                fill: &fan,
                stroke: &fringe,
                convex: false,
            },
            PathData {
                fill: &fan,
                stroke: &[],
                convex: false,
            },
        ];
        let bounds = Bounds::new(0.0, 0.0, 10.0, 10.0);
        rec.fill(&no_textures(), &DrawState::new(Paint::color(Color::BLACK)), bounds, &paths)
            .unwrap();

        let call = rec.calls()[0];
        assert_eq!(call.kind, CallKind::Fill);
        // 2 fans of 4 -> 2*(4-2)*3 = 12, plus 10 fringe, plus 4 quad
        assert_eq!(rec.vertices().len(), 26);
        assert_eq!(call.triangles, Span::new(22, 4));
        assert_eq!(rec.paths()[0].fill, Span::new(0, 6));
        assert_eq!(rec.paths()[0].stroke, Span::new(6, 10));
        assert_eq!(rec.paths()[1].fill, Span::new(16, 6));
        assert_eq!(rec.uniforms().len(), 2);

        let quad = &rec.vertices()[22..26];
        assert_eq!(quad[0], Vertex::new(10.0, 10.0, 0.5, 1.0));
        assert_eq!(quad[1], Vertex::new(10.0, 0.0, 0.5, 1.0));
        assert_eq!(quad[2], Vertex::new(0.0, 10.0, 0.5, 1.0));
        assert_eq!(quad[3], Vertex::new(0.0, 0.0, 0.5, 1.0));

        let block0 = rec.uniforms().block(call.uniform).unwrap();
        assert_eq!(block0.stroke_thr, -1.0);
        assert_eq!(block0.shader(), Some(ShaderType::Simple));
    }

    #[test]
    fn list_triangulation_keeps_fan_winding() {
        let mut rec = recorder(CanvasConfig::default());
        let fan = square();
        let path = PathData {
            fill: &fan,
            stroke: &[],
            convex: true,
        };
        rec.fill(&no_textures(), &DrawState::new(Paint::color(Color::WHITE)), Bounds::default(), &[path])
            .unwrap();
        let v = rec.vertices();
        assert_eq!([v[0], v[1], v[2]], [fan[0], fan[1], fan[2]]);
        assert_eq!([v[3], v[4], v[5]], [fan[0], fan[2], fan[3]]);
    }

    #[test]
    fn fan_topology_copies_verbatim() {
        let config = CanvasConfig {
            fill_topology: FillTopology::TriangleFan,
            ..CanvasConfig::default()
        };
        let mut rec = recorder(config);
        let fan = square();
        let path = PathData {
            fill: &fan,
            stroke: &[],
            convex: false,
        };
        rec.fill(&no_textures(), &DrawState::new(Paint::color(Color::WHITE)), Bounds::default(), &[path])
            .unwrap();
        assert_eq!(&rec.vertices()[..4], fan.as_slice());
        assert_eq!(rec.vertices().len(), 8);
    }

    #[test]
    fn stencil_stroke_uses_two_thresholds() {
        let mut rec = recorder(CanvasConfig::default());
        let s = strip(8);
        let path = PathData {
            fill: &[],
            stroke: &s,
            convex: false,
        };
        rec.stroke(&no_textures(), &DrawState::new(Paint::color(Color::WHITE)), 3.0, &[path])
            .unwrap();

        let call = rec.calls()[0];
        assert_eq!(call.kind, CallKind::Stroke);
        assert_eq!(rec.uniforms().len(), 2);
        let first = rec.uniforms().block(call.uniform).unwrap();
        let second = rec
            .uniforms()
            .block(rec.uniforms().offset_of(call.uniform, 1).unwrap())
            .unwrap();
        assert_eq!(first.stroke_thr, -1.0);
        assert_eq!(second.stroke_thr, STROKE_ALPHA_THRESHOLD);
        assert_eq!(first.stroke_mult, 2.0);
    }

    #[test]
    fn plain_stroke_uses_one_block() {
        let config = CanvasConfig {
            stencil_strokes: false,
            ..CanvasConfig::default()
        };
        let mut rec = recorder(config);
        let s = strip(4);
        let path = PathData {
            fill: &[],
            stroke: &s,
            convex: false,
        };
        rec.stroke(&no_textures(), &DrawState::new(Paint::color(Color::WHITE)), 1.0, &[path])
            .unwrap();
        assert_eq!(rec.uniforms().len(), 1);
        assert_eq!(rec.paths()[0].stroke, Span::new(0, 4));
    }

    #[test]
    fn triangles_are_tagged_as_image() {
        let mut textures = TextureTable::new();
        let id = textures
            .insert(TextureEntry {
                resource: (),
                desc: TextureDesc {
                    kind: TextureKind::Alpha,
                    width: 2,
                    height: 2,
                    flags: ImageFlags::empty(),
                },
            })
            .unwrap();
        let mut rec = recorder(CanvasConfig::default());
        let paint = Paint::image_pattern(Vec2::ZERO, Vec2::splat(2.0), 0.0, id, 1.0);
        rec.triangles(&textures, &DrawState::new(paint), &strip(3)).unwrap();

        let call = rec.calls()[0];
        assert_eq!(call.kind, CallKind::Triangles);
        assert_eq!(call.image, Some(id));
        assert_eq!(call.triangles, Span::new(0, 3));
        let block = rec.uniforms().block(call.uniform).unwrap();
        assert_eq!(block.shader(), Some(ShaderType::Image));
        assert_eq!(block.tex_type, shared::tex_type::ALPHA);
    }

    #[test]
    fn failed_submission_leaves_no_trace() {
        let mut rec = recorder(CanvasConfig::default());
        let fan = square();
        let path = PathData {
            fill: &fan,
            stroke: &[],
            convex: false,
        };
        let state = DrawState::new(Paint::color(Color::WHITE));
        rec.fill(&no_textures(), &state, Bounds::default(), &[path]).unwrap();

        let missing = ImageId::new(7).unwrap();
        let bad = DrawState::new(Paint::image_pattern(Vec2::ZERO, Vec2::ONE, 0.0, missing, 1.0));
        let err = rec.fill(&no_textures(), &bad, Bounds::default(), &[path]).unwrap_err();
        assert!(matches!(err, RenderError::UnknownImage(id) if id == missing));

        assert_eq!(rec.calls().len(), 1);
        assert_eq!(rec.paths().len(), 1);
        assert_eq!(rec.vertices().len(), 10);
        assert_eq!(rec.uniforms().len(), 2);
    }

    #[test]
    fn reset_clears_all_arrays() {
        let mut rec = recorder(CanvasConfig::default());
        rec.triangles(&no_textures(), &DrawState::new(Paint::color(Color::WHITE)), &strip(3))
            .unwrap();
        rec.reset();
        assert!(rec.is_empty());
        assert!(rec.vertices().is_empty());
        assert!(rec.paths().is_empty());
        assert!(rec.uniforms().is_empty());
    }
}
