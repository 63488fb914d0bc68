//! Plain-old-data blocks shared between the host renderer and the fill shaders
#![no_std]

use bytemuck::{Pod, Zeroable};
use core::fmt::{self, Display};
use glam::Mat4;

/// Vertex layout consumed by the fill vertex shader: 2×f32 position, 2×f32 UV
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub u: f32,
    pub v: f32,
}

impl Vertex {
    #[inline]
    pub const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self { x, y, u, v }
    }
}

/// Byte offset of the UV attribute inside [`Vertex`]
pub const VERTEX_UV_OFFSET: u32 = 2 * core::mem::size_of::<f32>() as u32;

/// Fragment shader variant selected per uniform block
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum ShaderType {
    FillGradient = 0,
    FillImage = 1,
    Simple = 2,
    Image = 3,
}

impl Display for ShaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderType::FillGradient => write!(f, "fill-gradient"),
            ShaderType::FillImage => write!(f, "fill-image"),
            ShaderType::Simple => write!(f, "simple"),
            ShaderType::Image => write!(f, "image"),
        }
    }
}

impl TryFrom<i32> for ShaderType {
    type Error = &'static str;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ShaderType::FillGradient),
            1 => Ok(ShaderType::FillImage),
            2 => Ok(ShaderType::Simple),
            3 => Ok(ShaderType::Image),
            _ => Err("Invalid ShaderType value"),
        }
    }
}

/// How the fragment shader interprets the sampled texel
pub mod tex_type {
    /// RGBA with premultiplied alpha
    pub const RGBA_PREMULTIPLIED: i32 = 0;
    /// RGBA with straight alpha, premultiplied in the shader
    pub const RGBA_STRAIGHT: i32 = 1;
    /// Single channel coverage
    pub const ALPHA: i32 = 2;
}

/// Per-draw fragment uniforms
///
/// Transforms are stored as 3×4 column blocks (`std140` mat3 layout) so the
/// block can be copied verbatim into a uniform buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FragUniforms {
    pub scissor_mat: [f32; 12],
    pub paint_mat: [f32; 12],
    pub inner_color: [f32; 4],
    pub outer_color: [f32; 4],
    pub scissor_ext: [f32; 2],
    pub scissor_scale: [f32; 2],
    pub extent: [f32; 2],
    pub radius: f32,
    pub feather: f32,
    pub stroke_mult: f32,
    pub stroke_thr: f32,
    pub tex_type: i32,
    pub shader_type: i32,
}

impl FragUniforms {
    /// Size of one block before alignment padding
    pub const SIZE: usize = core::mem::size_of::<Self>();

    pub fn shader(&self) -> Option<ShaderType> {
        ShaderType::try_from(self.shader_type).ok()
    }
}

/// Vertex-stage uniforms: the logical viewport size in pixels
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ViewUniforms {
    pub view_size: [f32; 2],
}

/// Model, view, projection and their product, as bound at set 7 by the renderer
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MatrixBlock {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub mvp: Mat4,
}

impl Default for MatrixBlock {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            mvp: Mat4::IDENTITY,
        }
    }
}

impl MatrixBlock {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// Recompute `mvp = projection · view · model`
    #[inline]
    pub fn update_mvp(&mut self) {
        self.mvp = self.projection * self.view * self.model;
    }
}

#[inline]
pub const fn align_up(size: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        size
    } else {
        size.div_ceil(alignment) * alignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frag_uniforms_have_no_padding() {
        assert_eq!(FragUniforms::SIZE, 176);
        assert_eq!(core::mem::size_of::<Vertex>(), 16);
    }

    #[test]
    fn align_up_rounds_to_next_multiple() {
        assert_eq!(align_up(176, 256), 256);
        assert_eq!(align_up(176, 16), 176);
        assert_eq!(align_up(177, 16), 192);
        assert_eq!(align_up(176, 0), 176);
    }

    #[test]
    fn mvp_is_projection_view_model() {
        let mut block = MatrixBlock {
            model: Mat4::from_translation(glam::Vec3::new(1.0, 0.0, 0.0)),
            view: Mat4::from_scale(glam::Vec3::splat(2.0)),
            projection: Mat4::IDENTITY,
            mvp: Mat4::ZERO,
        };
        block.update_mvp();
        let p = block.mvp.transform_point3(glam::Vec3::ZERO);
        assert_eq!(p, glam::Vec3::new(2.0, 0.0, 0.0));
    }
}
