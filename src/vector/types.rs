//! Geometry, paint and image types accepted by the vector renderer.

use bitflags::bitflags;
use glam::{Affine2, Vec2};
use std::fmt::{self, Display};
use std::num::NonZeroU32;

pub use shared::Vertex;

/// Handle of a texture in the renderer's texture table.
///
/// Ids are 1-based; "no image" is expressed as `Option::<ImageId>::None`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(NonZeroU32);

impl ImageId {
    #[inline]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    #[inline]
    pub(crate) fn from_slot(slot: usize) -> Option<Self> {
        u32::try_from(slot + 1).ok().and_then(Self::new)
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.0.get() as usize - 1
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Straight-alpha RGBA colour
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    #[inline]
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::rgba(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    #[inline]
    pub fn premultiplied(&self) -> [f32; 4] {
        [self.r * self.a, self.g * self.a, self.b * self.a, self.a]
    }
}

/// Gradient or image paint.
///
/// `xform` maps paint space to canvas space; the shader evaluates the paint
/// through its inverse.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Paint {
    pub xform: Affine2,
    pub extent: Vec2,
    pub radius: f32,
    pub feather: f32,
    pub inner_color: Color,
    pub outer_color: Color,
    pub image: Option<ImageId>,
}

impl Paint {
    pub fn color(color: Color) -> Self {
        Self {
            xform: Affine2::IDENTITY,
            extent: Vec2::ZERO,
            radius: 0.0,
            feather: 1.0,
            inner_color: color,
            outer_color: color,
            image: None,
        }
    }

    /// Linear gradient from `start` (inner colour) to `end` (outer colour)
    pub fn linear_gradient(start: Vec2, end: Vec2, inner: Color, outer: Color) -> Self {
        const LARGE: f32 = 1e5;
        let delta = end - start;
        let d = delta.length();
        let dir = if d > 0.0001 { delta / d } else { Vec2::Y };

        Self {
            xform: Affine2::from_cols(
                Vec2::new(dir.y, -dir.x),
                Vec2::new(dir.x, dir.y),
                start - dir * LARGE,
            ),
            extent: Vec2::new(LARGE, LARGE + d * 0.5),
            radius: 0.0,
            feather: d.max(1.0),
            inner_color: inner,
            outer_color: outer,
            image: None,
        }
    }

    /// Box gradient: a rounded rectangle of `size` at `origin`
    pub fn box_gradient(
        origin: Vec2,
        size: Vec2,
        radius: f32,
        feather: f32,
        inner: Color,
        outer: Color,
    ) -> Self {
        Self {
            xform: Affine2::from_translation(origin + size * 0.5),
            extent: size * 0.5,
            radius,
            feather: feather.max(1.0),
            inner_color: inner,
            outer_color: outer,
            image: None,
        }
    }

    /// Image pattern with its top-left corner at `origin`, rotated by `angle`
    pub fn image_pattern(origin: Vec2, size: Vec2, angle: f32, image: ImageId, alpha: f32) -> Self {
        let tint = Color::rgba(1.0, 1.0, 1.0, alpha);
        Self {
            xform: Affine2::from_angle_translation(angle, origin),
            extent: size,
            radius: 0.0,
            feather: 0.0,
            inner_color: tint,
            outer_color: tint,
            image: Some(image),
        }
    }
}

/// Scissor rectangle given as a transform of its centre and its half extent.
///
/// A negative extent means no scissoring.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Scissor {
    pub xform: Affine2,
    pub extent: Vec2,
}

impl Scissor {
    pub const NONE: Scissor = Scissor {
        xform: Affine2::IDENTITY,
        extent: Vec2::new(-1.0, -1.0),
    };

    pub fn rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        let half = Vec2::new(width.max(0.0), height.max(0.0)) * 0.5;
        Self {
            xform: Affine2::from_translation(Vec2::new(x, y) + half),
            extent: half,
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.extent.x < -0.5 || self.extent.y < -0.5
    }
}

impl Default for Scissor {
    fn default() -> Self {
        Scissor::NONE
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturate,
}

/// Blend factors for colour and alpha, part of the pipeline key
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompositeOperation {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl CompositeOperation {
    pub const fn blend(src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            src_rgb: src,
            dst_rgb: dst,
            src_alpha: src,
            dst_alpha: dst,
        }
    }
}

impl Default for CompositeOperation {
    fn default() -> Self {
        CompositeOp::SourceOver.into()
    }
}

/// Porter-Duff style composite modes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompositeOp {
    SourceOver,
    SourceIn,
    SourceOut,
    Atop,
    DestinationOver,
    DestinationIn,
    DestinationOut,
    DestinationAtop,
    Lighter,
    Copy,
    Xor,
}

impl From<CompositeOp> for CompositeOperation {
    fn from(op: CompositeOp) -> Self {
        use BlendFactor::*;
        let (src, dst) = match op {
            CompositeOp::SourceOver => (One, OneMinusSrcAlpha),
            CompositeOp::SourceIn => (DstAlpha, Zero),
            CompositeOp::SourceOut => (OneMinusDstAlpha, Zero),
            CompositeOp::Atop => (DstAlpha, OneMinusSrcAlpha),
            CompositeOp::DestinationOver => (OneMinusDstAlpha, One),
            CompositeOp::DestinationIn => (Zero, SrcAlpha),
            CompositeOp::DestinationOut => (Zero, OneMinusSrcAlpha),
            CompositeOp::DestinationAtop => (OneMinusDstAlpha, SrcAlpha),
            CompositeOp::Lighter => (One, One),
            CompositeOp::Copy => (One, Zero),
            CompositeOp::Xor => (OneMinusDstAlpha, OneMinusSrcAlpha),
        };
        CompositeOperation::blend(src, dst)
    }
}

/// Axis-aligned bounds of a fill, used for the cover quad
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min: Vec2::new(min_x, min_y),
            max: Vec2::new(max_x, max_y),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Self {
        let mut min = Vec2::splat(f32::MAX);
        let mut max = Vec2::splat(f32::MIN);
        for p in points {
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }
}

/// One flattened path: a fill fan and a stroke/fringe triangle strip
#[derive(Copy, Clone, Debug, Default)]
pub struct PathData<'a> {
    pub fill: &'a [Vertex],
    pub stroke: &'a [Vertex],
    pub convex: bool,
}

bitflags! {
    /// Image creation flags
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ImageFlags: u32 {
        const GENERATE_MIPMAPS = 1 << 0;
        const REPEAT_X = 1 << 1;
        const REPEAT_Y = 1 << 2;
        const FLIP_Y = 1 << 3;
        const PREMULTIPLIED = 1 << 4;
        const NEAREST = 1 << 5;
    }
}

/// Pixel format of a texture
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Single 8-bit channel
    Alpha,
    /// 8-bit RGBA
    Rgba,
}

impl TextureKind {
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureKind::Alpha => 1,
            TextureKind::Rgba => 4,
        }
    }
}

/// Index range into one of the per-frame arrays
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub count: usize,
}

impl Span {
    #[inline]
    pub const fn new(offset: usize, count: usize) -> Self {
        Self { offset, count }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_ids_are_one_based() {
        let id = ImageId::from_slot(0).unwrap();
        assert_eq!(id.get(), 1);
        assert_eq!(id.slot(), 0);
        assert!(ImageId::new(0).is_none());
    }

    #[test]
    fn premultiplied_scales_rgb_by_alpha() {
        let c = Color::rgba(1.0, 0.5, 0.25, 0.5);
        assert_eq!(c.premultiplied(), [0.5, 0.25, 0.125, 0.5]);
    }

    #[test]
    fn default_composite_is_source_over() {
        let op = CompositeOperation::default();
        assert_eq!(op.src_rgb, BlendFactor::One);
        assert_eq!(op.dst_alpha, BlendFactor::OneMinusSrcAlpha);
    }

    #[test]
    fn scissor_none_is_detected() {
        assert!(Scissor::NONE.is_none());
        assert!(!Scissor::rect(0.0, 0.0, 10.0, 10.0).is_none());
    }

    #[test]
    fn gradient_maps_start_to_inner_edge() {
        let paint = Paint::linear_gradient(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Color::BLACK,
            Color::WHITE,
        );
        assert_eq!(paint.feather, 10.0);
        let local = paint.xform.inverse().transform_point2(Vec2::ZERO);
        assert!((local.y - 1e5).abs() < 1.0);
    }
}
