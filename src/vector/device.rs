//! The seam between draw-call replay and a graphics API.

use crate::error::{CrateResult, RenderError};
use crate::vector::pipeline::PipelineDescription;
use crate::vector::types::{ImageFlags, TextureKind};
use crate::vector::uniforms::UniformOffset;
use shared::ViewUniforms;
use std::fmt;

/// Everything uploaded once per flush
#[derive(Copy, Clone, Debug)]
pub struct FrameUpload<'a> {
    pub vertices: &'a [u8],
    pub uniforms: &'a [u8],
    pub view: ViewUniforms,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    pub flags: ImageFlags,
}

impl TextureDesc {
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.kind.bytes_per_pixel()
    }
}

/// Sub-rectangle of a texture in texels
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TextureRegion {
    pub fn fits(&self, desc: &TextureDesc) -> bool {
        self.x.checked_add(self.width).is_some_and(|r| r <= desc.width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= desc.height)
    }
}

/// Graphics API operations used by the vector renderer.
///
/// All commands are recorded in call order into whatever command stream the
/// implementation currently targets.
pub trait VectorDevice {
    type Pipeline: Copy + PartialEq + fmt::Debug;
    type DescriptorSet: Copy + fmt::Debug;
    type Texture;

    /// Minimum alignment of dynamic uniform-buffer offsets
    fn min_uniform_alignment(&self) -> usize;

    fn create_pipeline(&mut self, description: &PipelineDescription) -> CrateResult<Self::Pipeline>;
    fn destroy_pipeline(&mut self, pipeline: Self::Pipeline);

    /// Copy the frame's data to the GPU, growing buffers that are too small
    fn upload(&mut self, frame: &FrameUpload<'_>) -> CrateResult<()>;

    /// Make room for the descriptor sets of `call_count` draw calls and
    /// release the previous frame's sets.
    fn prepare_descriptors(&mut self, call_count: usize) -> CrateResult<()>;

    /// Descriptor set with the view uniforms, the fragment block at `uniform`,
    /// and `texture` or a placeholder when `None`.
    fn allocate_descriptor_set(
        &mut self,
        uniform: UniformOffset,
        texture: Option<&Self::Texture>,
    ) -> CrateResult<Self::DescriptorSet>;

    fn bind_pipeline(&mut self, pipeline: Self::Pipeline);
    fn bind_descriptor_set(&mut self, set: Self::DescriptorSet);
    fn draw(&mut self, first_vertex: u32, vertex_count: u32);

    /// Create a texture; `data` is tightly packed rows, zero-filled when `None`
    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> CrateResult<Self::Texture>;

    /// Copy `region` out of `data`, which holds the whole image
    fn update_texture(
        &mut self,
        texture: &mut Self::Texture,
        desc: &TextureDesc,
        region: TextureRegion,
        data: &[u8],
    ) -> CrateResult<()>;

    fn destroy_texture(&mut self, texture: Self::Texture);

    /// Block until the GPU has finished every command recorded so far
    fn wait_idle(&mut self);
}

/// What to do with the descriptor pool before a frame's replay
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PoolAction {
    /// Destroy the pool and create one for this many calls
    Recreate(usize),
    /// Return every set of the previous frame to the pool
    Reset,
}

/// Tracks how many draw calls the current descriptor pool was sized for
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DescriptorPoolPlan {
    capacity: usize,
}

impl DescriptorPoolPlan {
    pub fn prepare(&mut self, call_count: usize) -> PoolAction {
        if call_count > self.capacity {
            self.capacity = call_count;
            PoolAction::Recreate(call_count)
        } else {
            PoolAction::Reset
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forget the pool, so the next frame recreates it
    pub fn invalidate(&mut self) {
        self.capacity = 0;
    }

    /// Descriptor counts of a pool sized for `calls`: (max sets, uniform buffers, samplers)
    pub fn pool_sizes(calls: usize) -> CrateResult<(u32, u32, u32)> {
        u32::try_from(calls)
            .ok()
            .and_then(|calls| Some((calls.checked_mul(2)?, calls.checked_mul(4)?, calls.checked_mul(2)?)))
            .ok_or_else(|| {
                RenderError::InvalidArgument(format!("{calls} draw calls exceed the descriptor pool limits"))
            })
    }
}
