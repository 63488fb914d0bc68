//! Render-state keys, the fixed-function state derived from them, and the
//! pipeline cache.

use crate::error::CrateResult;
use crate::vector::device::VectorDevice;
use crate::vector::growable::PIPELINE_FLOOR;
use crate::vector::types::CompositeOperation;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Topology {
    #[default]
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

/// Sub-pass of a stencil stroke
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum StencilStroke {
    #[default]
    None,
    /// Stroke interior into the stencil buffer and colour
    Fill,
    /// Anti-aliased edges where the stencil is still zero
    DrawAa,
    /// Reset the stencil buffer
    Clear,
}

/// Everything that selects a distinct pipeline
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub topology: Topology,
    pub stencil_stroke: StencilStroke,
    pub stencil_fill: bool,
    pub stencil_test: bool,
    pub edge_aa: bool,
    pub edge_aa_shader: bool,
    pub composite: CompositeOperation,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StencilFace {
    pub fail: StencilOp,
    pub depth_fail: StencilOp,
    pub pass: StencilOp,
    pub compare: CompareOp,
    pub reference: u32,
    pub compare_mask: u32,
    pub write_mask: u32,
}

impl StencilFace {
    const fn uniform(op: StencilOp, compare: CompareOp) -> Self {
        Self {
            fail: op,
            depth_fail: op,
            pass: op,
            compare,
            reference: 0,
            compare_mask: 0xff,
            write_mask: 0xff,
        }
    }

    const fn with_pass(mut self, pass: StencilOp) -> Self {
        self.pass = pass;
        self
    }
}

/// Depth and stencil state of one pipeline.
///
/// The depth test is always on with `LessOrEqual` and writes disabled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
    pub stencil_test: bool,
    pub front: StencilFace,
    pub back: StencilFace,
}

impl DepthStencilState {
    pub fn for_key(key: &PipelineKey) -> Self {
        use CompareOp::*;
        use StencilOp::*;

        let (stencil_test, front, back) = match key.stencil_stroke {
            StencilStroke::Fill => {
                let base = StencilFace::uniform(Keep, Equal);
                (
                    true,
                    base.with_pass(IncrementAndClamp),
                    base.with_pass(DecrementAndClamp),
                )
            }
            StencilStroke::DrawAa => {
                let base = StencilFace::uniform(Keep, Equal);
                (true, base, base)
            }
            StencilStroke::Clear => {
                let base = StencilFace::uniform(Zero, Always);
                (true, base, base)
            }
            StencilStroke::None if key.stencil_fill => {
                let base = StencilFace::uniform(Keep, Always);
                (
                    true,
                    base.with_pass(IncrementAndWrap),
                    base.with_pass(DecrementAndWrap),
                )
            }
            StencilStroke::None if key.stencil_test && key.edge_aa => {
                let base = StencilFace::uniform(Keep, Equal);
                (true, base, base)
            }
            StencilStroke::None if key.stencil_test => {
                let base = StencilFace::uniform(Zero, NotEqual);
                (true, base, base)
            }
            StencilStroke::None => {
                let base = StencilFace::uniform(Keep, Always);
                (false, base, base)
            }
        };

        Self {
            depth_test: true,
            depth_write: false,
            depth_compare: LessOrEqual,
            stencil_test,
            front,
            back,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    /// Cull back faces, counter-clockwise is front
    Back,
}

/// Fixed-function description a device turns into a pipeline object
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineDescription {
    pub topology: Topology,
    pub cull: CullMode,
    pub color_write: bool,
    pub blend: CompositeOperation,
    pub depth_stencil: DepthStencilState,
    /// Use the fragment variant with the anti-aliasing stroke mask
    pub edge_aa_shader: bool,
}

impl PipelineDescription {
    pub fn for_key(key: &PipelineKey) -> Self {
        let cull = if key.stencil_fill {
            CullMode::None
        } else {
            CullMode::Back
        };
        let color_write = !(key.stencil_fill || key.stencil_stroke == StencilStroke::Clear);

        Self {
            topology: key.topology,
            cull,
            color_write,
            blend: key.composite,
            depth_stencil: DepthStencilState::for_key(key),
            edge_aa_shader: key.edge_aa_shader,
        }
    }
}

/// Compiled pipelines keyed by [`PipelineKey`], plus the currently bound one
#[derive(Debug)]
pub struct PipelineCache<P> {
    entries: Vec<(PipelineKey, P)>,
    current: Option<usize>,
}

impl<P: Copy> PipelineCache<P> {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(PIPELINE_FLOOR),
            current: None,
        }
    }

    pub fn find(&self, key: &PipelineKey) -> Option<P> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, pipeline)| *pipeline)
    }

    fn find_or_create<D>(&mut self, key: &PipelineKey, device: &mut D) -> CrateResult<usize>
    where
        D: VectorDevice<Pipeline = P>,
    {
        if let Some(index) = self.entries.iter().position(|(k, _)| k == key) {
            return Ok(index);
        }

        let description = PipelineDescription::for_key(key);
        let pipeline = device.create_pipeline(&description)?;
        log::debug!(
            "created pipeline #{} for {:?} ({:?})",
            self.entries.len(),
            key.topology,
            key.stencil_stroke
        );
        self.entries.push((*key, pipeline));
        Ok(self.entries.len() - 1)
    }

    /// Bind the pipeline for `key`, compiling it on first use.
    ///
    /// Nothing is emitted when it is already bound.
    pub fn bind<D>(&mut self, key: &PipelineKey, device: &mut D) -> CrateResult<P>
    where
        D: VectorDevice<Pipeline = P>,
    {
        let index = self.find_or_create(key, device)?;
        let pipeline = self.entries[index].1;
        if self.current != Some(index) {
            device.bind_pipeline(pipeline);
            self.current = Some(index);
        }
        Ok(pipeline)
    }

    /// Forget the current binding; the next [`PipelineCache::bind`] always binds
    pub fn reset_binding(&mut self) {
        self.current = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every pipeline, handing each to `destroy`
    pub fn drain(&mut self, mut destroy: impl FnMut(P)) {
        self.current = None;
        for (_, pipeline) in self.entries.drain(..) {
            destroy(pipeline);
        }
    }
}

impl<P: Copy> Default for PipelineCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PipelineKey {
        PipelineKey::default()
    }

    #[test]
    fn plain_key_disables_stencil() {
        let ds = DepthStencilState::for_key(&key());
        assert!(!ds.stencil_test);
        assert!(ds.depth_test);
        assert!(!ds.depth_write);
        assert_eq!(ds.depth_compare, CompareOp::LessOrEqual);
        assert_eq!(ds.back.compare, CompareOp::Always);
        assert_eq!(ds.back.pass, StencilOp::Keep);
    }

    #[test]
    fn stencil_fill_counts_winding() {
        let ds = DepthStencilState::for_key(&PipelineKey {
            stencil_fill: true,
            ..key()
        });
        assert!(ds.stencil_test);
        assert_eq!(ds.front.compare, CompareOp::Always);
        assert_eq!(ds.front.pass, StencilOp::IncrementAndWrap);
        assert_eq!(ds.back.pass, StencilOp::DecrementAndWrap);
        assert_eq!(ds.front.fail, StencilOp::Keep);
        assert_eq!(ds.front.write_mask, 0xff);
    }

    #[test]
    fn cover_passes_compare_against_zero() {
        let aa = DepthStencilState::for_key(&PipelineKey {
            stencil_test: true,
            edge_aa: true,
            ..key()
        });
        assert_eq!(aa.front.compare, CompareOp::Equal);
        assert_eq!(aa.front.pass, StencilOp::Keep);
        assert_eq!(aa.front, aa.back);

        let cover = DepthStencilState::for_key(&PipelineKey {
            stencil_test: true,
            ..key()
        });
        assert_eq!(cover.front.compare, CompareOp::NotEqual);
        assert_eq!(cover.front.fail, StencilOp::Zero);
        assert_eq!(cover.front.pass, StencilOp::Zero);
        assert_eq!(cover.front, cover.back);
    }

    #[test]
    fn stencil_stroke_modes() {
        let with = |mode| {
            DepthStencilState::for_key(&PipelineKey {
                stencil_stroke: mode,
                ..key()
            })
        };

        let fill = with(StencilStroke::Fill);
        assert_eq!(fill.front.compare, CompareOp::Equal);
        assert_eq!(fill.front.pass, StencilOp::IncrementAndClamp);
        assert_eq!(fill.back.pass, StencilOp::DecrementAndClamp);

        let aa = with(StencilStroke::DrawAa);
        assert_eq!(aa.front.pass, StencilOp::Keep);
        assert_eq!(aa.back.pass, StencilOp::Keep);

        let clear = with(StencilStroke::Clear);
        assert_eq!(clear.front.compare, CompareOp::Always);
        assert_eq!(clear.front.fail, StencilOp::Zero);
        assert_eq!(clear.front.depth_fail, StencilOp::Zero);
        assert_eq!(clear.back.pass, StencilOp::Zero);
    }

    #[test]
    fn colour_writes_and_culling() {
        let fill = PipelineDescription::for_key(&PipelineKey {
            stencil_fill: true,
            ..key()
        });
        assert_eq!(fill.cull, CullMode::None);
        assert!(!fill.color_write);

        let clear = PipelineDescription::for_key(&PipelineKey {
            stencil_stroke: StencilStroke::Clear,
            ..key()
        });
        assert_eq!(clear.cull, CullMode::Back);
        assert!(!clear.color_write);

        let plain = PipelineDescription::for_key(&key());
        assert!(plain.color_write);
    }
}
