// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bytemuck::{Pod, Zeroable};
use peniko::Color;
use static_assertions::const_assert_eq;

use crate::draw::PlsBlendMode;
use crate::gradient::ColorRampLocation;
use crate::limits::{CONTOUR_ID_MASK, TESS_TEXTURE_WIDTH};

/// Fill rule of a path, as encoded in bit 0 of [`PathData::params`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum FillRule {
    NonZero = 0,
    EvenOdd = 1,
}

impl From<peniko::Fill> for FillRule {
    fn from(fill: peniko::Fill) -> Self {
        match fill {
            peniko::Fill::NonZero => Self::NonZero,
            peniko::Fill::EvenOdd => Self::EvenOdd,
        }
    }
}

/// How a path is shaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum PaintType {
    SolidColor = 0,
    LinearGradient = 1,
    RadialGradient = 2,
    Image = 3,
    /// The path writes coverage to the clip buffer instead of color.
    ClipUpdate = 4,
}

/// Paint-specific payload of a path record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(transparent)]
pub struct PaintData {
    pub data: [u32; 4],
}

impl PaintData {
    /// Unpremultiplied RGBA floats.
    pub fn solid_color(color: Color) -> Self {
        let rgba = [color.r, color.g, color.b, color.a].map(|c| (c as f32 / 255.0).to_bits());
        Self { data: rgba }
    }

    /// Packs the location of a color ramp and the gradient's 3 coefficients.
    pub fn gradient(location: ColorRampLocation, coeffs: [f32; 3]) -> Self {
        debug_assert!(location.right > location.left);
        debug_assert!(location.right <= 1024);
        let span = location.row << 20 | (location.right - 1) << 10 | location.left;
        Self {
            data: [
                span,
                coeffs[0].to_bits(),
                coeffs[1].to_bits(),
                coeffs[2].to_bits(),
            ],
        }
    }

    pub fn image(opacity: f32) -> Self {
        Self {
            data: [opacity.to_bits(), 0, 0, 0],
        }
    }

    pub fn clip_update(outer_clip_id: u32) -> Self {
        Self {
            data: [outer_clip_id, 0, 0, 0],
        }
    }
}

/// Per-path record, one per path ID.
///
/// This must be kept in sync with the path texture layout in the shaders.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct PathData {
    pub matrix: [f32; 6],
    /// 0 for fills.
    pub stroke_radius: f32,
    /// bit 0 fill rule, bits 1..=3 paint type, bits 4..=19 clip ID,
    /// bits 20..=23 blend mode.
    pub params: u32,
    pub paint_data: PaintData,
}

const_assert_eq!(std::mem::size_of::<PathData>(), 48);

impl PathData {
    pub fn new(
        matrix: [f32; 6],
        stroke_radius: f32,
        fill_rule: FillRule,
        paint_type: PaintType,
        clip_id: u32,
        blend_mode: PlsBlendMode,
        paint_data: PaintData,
    ) -> Self {
        Self {
            matrix,
            stroke_radius,
            params: pack_path_params(fill_rule, paint_type, clip_id, blend_mode),
            paint_data,
        }
    }
}

pub fn pack_path_params(
    fill_rule: FillRule,
    paint_type: PaintType,
    clip_id: u32,
    blend_mode: PlsBlendMode,
) -> u32 {
    debug_assert!(clip_id <= 0xffff);
    (blend_mode as u32) << 20 | clip_id << 4 | (paint_type as u32) << 1 | fill_rule as u32
}

/// Per-contour record, one per contour ID.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ContourData {
    /// Fan midpoint for fills. For strokes, `x` is 1 if the contour is
    /// closed and 0 otherwise.
    pub midpoint: [f32; 2],
    pub path_id: u32,
    /// Index of the contour's first tessellation vertex.
    pub vertex_index0: u32,
}

const_assert_eq!(std::mem::size_of::<ContourData>(), 16);

/// Flags carried in the upper bits of [`TessVertexSpan::contour_id_with_flags`].
pub mod contour_flags {
    pub const FIRST_VERTEX_OF_CONTOUR: u32 = 1 << 31;
    pub const RETROFITTED_TRIANGLE: u32 = 1 << 30;
    pub const JOIN_TYPE_MASK: u32 = 3 << 28;
    pub const ROUND_JOIN: u32 = 0;
    pub const BEVEL_JOIN: u32 = 1 << 28;
    pub const MITER_REVERT_JOIN: u32 = 2 << 28;
    pub const MITER_CLIP_JOIN: u32 = 3 << 28;
    pub const EMULATED_STROKE_CAP: u32 = 1 << 27;
    pub const CULL_EXCESS_TESSELLATION_SEGMENTS: u32 = 1 << 26;
}

/// Contour ID used by padding vertices and the end-of-flush marker.
pub const INVALID_CONTOUR_ID: u32 = 0;

/// One horizontal run of vertices in the tessellation texture.
///
/// A span covers `[x0, x1)` on row `y`. If `x1` exceeds the texture width,
/// the same curve is emitted again one row down with `x0` and `x1` shifted
/// left by the width.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct TessVertexSpan {
    pub pts: [f32; 8],
    pub join_tangent: [f32; 2],
    pub y: f32,
    /// NaN when there is no reflection.
    pub reflection_y: f32,
    /// `x1 << 16 | x0 & 0xffff`.
    pub x0x1: i32,
    pub reflection_x0x1: i32,
    /// `join << 20 | polar << 10 | parametric`.
    pub segment_counts: u32,
    pub contour_id_with_flags: u32,
}

const_assert_eq!(std::mem::size_of::<TessVertexSpan>(), 64);

impl TessVertexSpan {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pts: [[f32; 2]; 4],
        join_tangent: [f32; 2],
        y: f32,
        x0: i32,
        x1: i32,
        parametric_segment_count: u32,
        polar_segment_count: u32,
        join_segment_count: u32,
        contour_id_with_flags: u32,
    ) -> Self {
        debug_assert!(parametric_segment_count < 1 << 10);
        debug_assert!(polar_segment_count < 1 << 10);
        debug_assert!(join_segment_count < 1 << 12);
        Self {
            pts: [
                pts[0][0], pts[0][1], pts[1][0], pts[1][1], pts[2][0], pts[2][1], pts[3][0],
                pts[3][1],
            ],
            join_tangent,
            y,
            reflection_y: f32::NAN,
            x0x1: pack_x0x1(x0, x1),
            reflection_x0x1: pack_x0x1(-1, -1),
            segment_counts: join_segment_count << 20
                | polar_segment_count << 10
                | parametric_segment_count,
            contour_id_with_flags,
        }
    }

    pub fn x0(&self) -> i32 {
        // Sign-extend the low half.
        (self.x0x1 << 16) >> 16
    }

    pub fn x1(&self) -> i32 {
        self.x0x1 >> 16
    }

    pub fn contour_id(&self) -> u32 {
        self.contour_id_with_flags & CONTOUR_ID_MASK
    }

    pub fn parametric_segment_count(&self) -> u32 {
        self.segment_counts & 0x3ff
    }

    pub fn polar_segment_count(&self) -> u32 {
        (self.segment_counts >> 10) & 0x3ff
    }

    pub fn join_segment_count(&self) -> u32 {
        self.segment_counts >> 20
    }
}

fn pack_x0x1(x0: i32, x1: i32) -> i32 {
    x1 << 16 | (x0 & 0xffff)
}

/// Splits `total_vertex_count` vertices starting at `location` into the
/// `(y, x0, x1)` runs that cover them in the tessellation texture.
///
/// Each run may extend past the right edge; while it does, the next run
/// repeats it one row down shifted left by the texture width.
pub fn tessellation_span_rows(
    location: u32,
    total_vertex_count: u32,
) -> impl Iterator<Item = (u32, i32, i32)> {
    let width = TESS_TEXTURE_WIDTH as i32;
    let y = location / TESS_TEXTURE_WIDTH;
    let x0 = (location % TESS_TEXTURE_WIDTH) as i32;
    let x1 = x0 + total_vertex_count as i32;
    std::iter::successors(Some((y, x0, x1)), move |&(y, x0, x1)| {
        (x1 > width).then_some((y + 1, x0 - width, x1 - width))
    })
}

/// One vertex of an interior triangulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TriangleVertex {
    pub point: [f32; 2],
    /// `weight << 16 | path_id`.
    pub weight_path_id: i32,
}

const_assert_eq!(std::mem::size_of::<TriangleVertex>(), 12);

impl TriangleVertex {
    pub fn new(point: [f32; 2], weight: i16, path_id: u16) -> Self {
        Self {
            point,
            weight_path_id: (weight as i32) << 16 | path_id as i32,
        }
    }

    pub fn weight(&self) -> i32 {
        self.weight_path_id >> 16
    }

    pub fn path_id(&self) -> u32 {
        (self.weight_path_id & 0xffff) as u32
    }
}
