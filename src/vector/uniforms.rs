//! Fragment uniform blocks: paint conversion and the strided per-frame arena.

use crate::error::{CrateResult, RenderError};
use crate::vector::growable::{GrowableBuffer, UNIFORM_FLOOR};
use crate::vector::types::{ImageFlags, Paint, Scissor, TextureKind};
use glam::{Affine2, Vec2};
use shared::{align_up, tex_type, FragUniforms, ShaderType};

/// Alpha threshold of the anti-aliased stencil stroke pass
pub const STROKE_ALPHA_THRESHOLD: f32 = 1.0 - 0.5 / 255.0;

/// Byte offset of a uniform block inside the frame's uniform buffer
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct UniformOffset(u32);

impl UniformOffset {
    #[inline]
    pub fn bytes(self) -> u32 {
        self.0
    }

    /// Offset `blocks` blocks further at the given stride
    pub fn advanced(self, blocks: usize, stride: usize) -> CrateResult<Self> {
        blocks
            .checked_mul(stride)
            .and_then(|bytes| u32::try_from(bytes).ok())
            .and_then(|bytes| self.0.checked_add(bytes))
            .map(Self)
            .ok_or(RenderError::HostAllocation {
                what: "uniform bytes",
                requested: blocks,
            })
    }
}

/// Byte offset of block `index` at `stride`, if it is addressable
fn byte_offset(index: usize, stride: usize) -> Option<u32> {
    index
        .checked_mul(stride)
        .and_then(|bytes| u32::try_from(bytes).ok())
}

/// What paint conversion needs to know about a texture
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextureInfo {
    pub kind: TextureKind,
    pub flags: ImageFlags,
    pub width: u32,
    pub height: u32,
}

/// Column-major 3×4 layout of a 2D affine transform
pub fn xform_to_mat3x4(t: &Affine2) -> [f32; 12] {
    let a = t.matrix2.x_axis;
    let c = t.matrix2.y_axis;
    let e = t.translation;
    [a.x, a.y, 0.0, 0.0, c.x, c.y, 0.0, 0.0, e.x, e.y, 1.0, 0.0]
}

/// Inverse of `t`, or identity when `t` is singular
pub fn inverse_or_identity(t: &Affine2) -> Affine2 {
    if t.matrix2.determinant().abs() < 1e-6 {
        Affine2::IDENTITY
    } else {
        t.inverse()
    }
}

/// Build the fragment uniforms for a paint.
///
/// `texture` must describe `paint.image` when the paint has one.
pub fn convert_paint(
    paint: &Paint,
    texture: Option<&TextureInfo>,
    scissor: &Scissor,
    width: f32,
    fringe: f32,
    stroke_thr: f32,
) -> FragUniforms {
    let mut frag = FragUniforms {
        inner_color: paint.inner_color.premultiplied(),
        outer_color: paint.outer_color.premultiplied(),
        ..FragUniforms::default()
    };

    if scissor.is_none() {
        frag.scissor_ext = [1.0, 1.0];
        frag.scissor_scale = [1.0, 1.0];
    } else {
        let m = &scissor.xform.matrix2;
        frag.scissor_mat = xform_to_mat3x4(&inverse_or_identity(&scissor.xform));
        frag.scissor_ext = scissor.extent.to_array();
        frag.scissor_scale = [
            (m.x_axis.x * m.x_axis.x + m.y_axis.x * m.y_axis.x).sqrt() / fringe,
            (m.x_axis.y * m.x_axis.y + m.y_axis.y * m.y_axis.y).sqrt() / fringe,
        ];
    }

    frag.extent = paint.extent.to_array();
    frag.stroke_mult = (width * 0.5 + fringe * 0.5) / fringe;
    frag.stroke_thr = stroke_thr;

    let inverse = match texture.filter(|_| paint.image.is_some()) {
        Some(tex) => {
            let xform = if tex.flags.contains(ImageFlags::FLIP_Y) {
                let half = paint.extent.y * 0.5;
                paint.xform
                    * Affine2::from_translation(Vec2::new(0.0, half))
                    * Affine2::from_scale(Vec2::new(1.0, -1.0))
                    * Affine2::from_translation(Vec2::new(0.0, -half))
            } else {
                paint.xform
            };
            frag.shader_type = ShaderType::FillImage as i32;
            frag.tex_type = match tex.kind {
                TextureKind::Rgba if tex.flags.contains(ImageFlags::PREMULTIPLIED) => {
                    tex_type::RGBA_PREMULTIPLIED
                }
                TextureKind::Rgba => tex_type::RGBA_STRAIGHT,
                TextureKind::Alpha => tex_type::ALPHA,
            };
            inverse_or_identity(&xform)
        }
        None => {
            frag.shader_type = ShaderType::FillGradient as i32;
            frag.radius = paint.radius;
            frag.feather = paint.feather;
            inverse_or_identity(&paint.xform)
        }
    };
    frag.paint_mat = xform_to_mat3x4(&inverse);

    frag
}

/// Uniform block of the stencil pass of a concave fill
pub fn simple_fill_uniforms() -> FragUniforms {
    FragUniforms {
        stroke_thr: -1.0,
        shader_type: ShaderType::Simple as i32,
        ..FragUniforms::default()
    }
}

/// Per-frame uniform blocks laid out at a fixed stride.
///
/// The stride is the block size rounded up to the device's minimum
/// uniform-buffer offset alignment, so every [`UniformOffset`] is a valid
/// dynamic descriptor offset.
#[derive(Debug, Clone)]
pub struct UniformArena {
    blocks: GrowableBuffer<FragUniforms>,
    stride: usize,
    staging: Vec<u8>,
}

impl UniformArena {
    pub fn new(min_alignment: usize) -> Self {
        Self {
            blocks: GrowableBuffer::new("uniform blocks", UNIFORM_FLOOR),
            stride: align_up(FragUniforms::SIZE, min_alignment),
            staging: Vec::new(),
        }
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Reserve `n` consecutive zeroed blocks.
    ///
    /// Fails when the end of the last block would not be addressable by a
    /// 32-bit descriptor offset.
    pub fn allocate(&mut self, n: usize) -> CrateResult<UniformOffset> {
        let index = self.blocks.len();
        let offset = index
            .checked_add(n)
            .and_then(|end| byte_offset(end, self.stride))
            .and_then(|_| byte_offset(index, self.stride))
            .ok_or(RenderError::HostAllocation {
                what: "uniform bytes",
                requested: n,
            })?;
        self.blocks.allocate(n)?;
        Ok(UniformOffset(offset))
    }

    /// The `block`-th block after `offset`
    #[inline]
    pub fn offset_of(&self, offset: UniformOffset, block: usize) -> CrateResult<UniformOffset> {
        offset.advanced(block, self.stride)
    }

    pub fn block_mut(&mut self, offset: UniformOffset) -> Option<&mut FragUniforms> {
        let index = offset.0 as usize / self.stride;
        self.blocks.as_mut_slice().get_mut(index)
    }

    pub fn block(&self, offset: UniformOffset) -> Option<&FragUniforms> {
        self.blocks.get(offset.0 as usize / self.stride)
    }

    /// Number of blocks recorded this frame
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.blocks.capacity()
    }

    #[inline]
    pub fn reset(&mut self) {
        self.blocks.reset();
    }

    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.blocks.truncate(len);
    }

    /// Blocks serialised at the stride, ready for upload
    pub fn strided_bytes(&mut self) -> &[u8] {
        let size = self.blocks.len() * self.stride;
        self.staging.clear();
        self.staging.resize(size, 0);
        for (i, block) in self.blocks.as_slice().iter().enumerate() {
            let start = i * self.stride;
            self.staging[start..start + FragUniforms::SIZE]
                .copy_from_slice(bytemuck::bytes_of(block));
        }
        &self.staging
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::types::{Color, ImageId};

    fn tex(kind: TextureKind, flags: ImageFlags) -> TextureInfo {
        TextureInfo {
            kind,
            flags,
            width: 4,
            height: 4,
        }
    }

    #[test]
    fn offsets_are_multiples_of_stride() {
        let mut arena = UniformArena::new(256);
        assert_eq!(arena.stride(), 256);
        let a = arena.allocate(2).unwrap();
        let b = arena.allocate(1).unwrap();
        assert_eq!(a.bytes(), 0);
        assert_eq!(arena.offset_of(a, 1).unwrap().bytes(), 256);
        assert_eq!(b.bytes(), 512);
    }

    #[test]
    fn offsets_past_u32_range_are_rejected() {
        // Blocks stay small on the host; only their strided offsets grow
        let mut arena = UniformArena::new(1 << 30);
        for i in 0..3 {
            assert_eq!(arena.allocate(1).unwrap().bytes(), i << 30);
        }
        assert!(matches!(
            arena.allocate(1),
            Err(RenderError::HostAllocation { .. })
        ));
        assert_eq!(arena.len(), 3);

        let last = UniformOffset(3 << 30);
        assert!(last.advanced(1, 1 << 30).is_err());
        assert!(UniformOffset(0).advanced(usize::MAX, 2).is_err());
        assert_eq!(UniformOffset(0).advanced(2, 256).unwrap().bytes(), 512);
    }

    #[test]
    fn strided_bytes_place_blocks_at_stride() {
        let mut arena = UniformArena::new(256);
        let off = arena.allocate(2).unwrap();
        let second = arena.offset_of(off, 1).unwrap();
        arena.block_mut(second).unwrap().radius = 3.0;
        let bytes = arena.strided_bytes().to_vec();
        assert_eq!(bytes.len(), 512);
        let block: FragUniforms =
            bytemuck::pod_read_unaligned(&bytes[256..256 + FragUniforms::SIZE]);
        assert_eq!(block.radius, 3.0);
    }

    #[test]
    fn solid_paint_without_scissor() {
        let paint = Paint::color(Color::rgba(1.0, 0.0, 0.0, 0.5));
        let frag = convert_paint(&paint, None, &Scissor::NONE, 1.0, 1.0, -1.0);
        assert_eq!(frag.inner_color, [0.5, 0.0, 0.0, 0.5]);
        assert_eq!(frag.scissor_mat, [0.0; 12]);
        assert_eq!(frag.scissor_ext, [1.0, 1.0]);
        assert_eq!(frag.scissor_scale, [1.0, 1.0]);
        assert_eq!(frag.shader(), Some(ShaderType::FillGradient));
        assert_eq!(frag.stroke_mult, 1.0);
        assert_eq!(frag.paint_mat[10], 1.0);
    }

    #[test]
    fn scissor_scale_divides_by_fringe() {
        let paint = Paint::color(Color::WHITE);
        let scissor = Scissor::rect(10.0, 10.0, 20.0, 20.0);
        let frag = convert_paint(&paint, None, &scissor, 1.0, 0.5, -1.0);
        assert_eq!(frag.scissor_ext, [10.0, 10.0]);
        assert_eq!(frag.scissor_scale, [2.0, 2.0]);
        assert_eq!(frag.scissor_mat[8], -20.0);
        assert_eq!(frag.scissor_mat[9], -20.0);
    }

    #[test]
    fn texture_kind_selects_tex_type() {
        let id = ImageId::new(1).unwrap();
        let paint = Paint::image_pattern(Vec2::ZERO, Vec2::splat(4.0), 0.0, id, 1.0);
        let cases = [
            (TextureKind::Rgba, ImageFlags::PREMULTIPLIED, tex_type::RGBA_PREMULTIPLIED),
            (TextureKind::Rgba, ImageFlags::empty(), tex_type::RGBA_STRAIGHT),
            (TextureKind::Alpha, ImageFlags::empty(), tex_type::ALPHA),
        ];
        for (kind, flags, expected) in cases {
            let info = tex(kind, flags);
            let frag = convert_paint(&paint, Some(&info), &Scissor::NONE, 1.0, 1.0, -1.0);
            assert_eq!(frag.tex_type, expected);
            assert_eq!(frag.shader(), Some(ShaderType::FillImage));
        }
    }

    #[test]
    fn flip_y_mirrors_around_extent_centre() {
        let id = ImageId::new(1).unwrap();
        let paint = Paint::image_pattern(Vec2::ZERO, Vec2::new(4.0, 10.0), 0.0, id, 1.0);
        let info = tex(TextureKind::Rgba, ImageFlags::FLIP_Y);
        let frag = convert_paint(&paint, Some(&info), &Scissor::NONE, 1.0, 1.0, -1.0);
        // inverse of translate(0,5)·scale(1,-1)·translate(0,-5) maps y to 10 - y
        assert_eq!(frag.paint_mat[4..6], [0.0, -1.0]);
        assert_eq!(frag.paint_mat[9], 10.0);
    }

    #[test]
    fn singular_transform_inverts_to_identity() {
        let t = Affine2::from_scale(Vec2::ZERO);
        assert_eq!(inverse_or_identity(&t), Affine2::IDENTITY);
    }
}
