// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Path draws: tessellation layout of fills and strokes.

use std::f32::consts::PI;
use std::sync::Arc;

use peniko::kurbo::{Affine, BezPath, Cap, Join, PathEl, Point, Stroke, Vec2};
use pls_encoding::limits::{
    padding_to_align_up, MAX_PARAMETRIC_SEGMENTS, MITER_OR_BEVEL_JOIN_SEGMENTS,
    PARAMETRIC_PRECISION,
};
use pls_encoding::math::{
    angle_between, chop_cubic, cubic_end_tangent, cubic_rotation, cubic_start_tangent,
    parametric_segment_count, polar_segment_count, polar_segments_per_radian, wangs_formula_cubic,
};
use pls_encoding::{
    contour_flags, FillRule, PaintData, PaintType, PatchType, PlsBlendMode, TessVertexCounter,
    OUTER_CURVE_PATCH_SEGMENT_SPAN,
};
use smallvec::SmallVec;

use crate::arena::DrawId;
use crate::backend::{ImageTexture, RenderContextImpl};
use crate::context::{PathParams, RenderContext, ResourceCounters, Triangle};
use crate::paint::{Brush, Gradient, Paint};

/// Joins whose tangents turn by less than this are drawn as smooth.
const SMOOTH_JOIN_ANGLE: f32 = 1e-3;

/// Parametric segments of one outer curve patch, excluding its polar and
/// join vertices.
const OUTER_CURVE_PARAMETRIC_SEGMENTS: u32 = OUTER_CURVE_PATCH_SEGMENT_SPAN - 1;

/// Fill or stroke.
#[derive(Clone, Debug)]
pub enum PathStyle {
    Fill(FillRule),
    Stroke(Stroke),
}

/// A contour converted to cubics. Lines and quadratics are elevated.
#[derive(Clone, Debug, Default)]
pub(crate) struct CubicContour {
    pub(crate) cubics: SmallVec<[[Point; 4]; 8]>,
    pub(crate) closed: bool,
}

fn line_to_cubic(p0: Point, p1: Point) -> [Point; 4] {
    [p0, p0.lerp(p1, 1.0 / 3.0), p0.lerp(p1, 2.0 / 3.0), p1]
}

fn quad_to_cubic(p0: Point, p1: Point, p2: Point) -> [Point; 4] {
    [p0, p0.lerp(p1, 2.0 / 3.0), p2.lerp(p1, 2.0 / 3.0), p2]
}

/// Splits `path` into contours of cubics.
///
/// With `close_all`, every contour is closed as fills require. Contours
/// without any segment are dropped.
pub(crate) fn cubic_contours(path: &BezPath, close_all: bool) -> Vec<CubicContour> {
    let mut contours = Vec::new();
    let mut current = CubicContour::default();
    let mut start = Point::ZERO;
    let mut last = Point::ZERO;
    let mut finish = |current: &mut CubicContour, start: Point, last: Point| {
        let mut contour = std::mem::take(current);
        if contour.cubics.is_empty() {
            return;
        }
        contour.closed |= close_all;
        if contour.closed && last != start {
            contour.cubics.push(line_to_cubic(last, start));
        }
        contours.push(contour);
    };
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                finish(&mut current, start, last);
                start = p;
                last = p;
            }
            PathEl::LineTo(p) => {
                current.cubics.push(line_to_cubic(last, p));
                last = p;
            }
            PathEl::QuadTo(p1, p2) => {
                current.cubics.push(quad_to_cubic(last, p1, p2));
                last = p2;
            }
            PathEl::CurveTo(p1, p2, p3) => {
                current.cubics.push([last, p1, p2, p3]);
                last = p3;
            }
            PathEl::ClosePath => {
                current.closed = true;
                finish(&mut current, start, last);
                last = start;
            }
        }
    }
    finish(&mut current, start, last);
    contours
}

/// One `push_cubic` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct TessCurve {
    pub(crate) pts: [Point; 4],
    pub(crate) join_tangent: Vec2,
    pub(crate) flags: u32,
    pub(crate) parametric_segment_count: u32,
    pub(crate) polar_segment_count: u32,
    pub(crate) join_segment_count: u32,
}

impl TessCurve {
    fn vertex_count(&self) -> u32 {
        self.parametric_segment_count + self.polar_segment_count + self.join_segment_count - 1
    }
}

#[derive(Clone, Debug)]
pub(crate) struct TessContour {
    pub(crate) midpoint: Point,
    pub(crate) closed: bool,
    pub(crate) padding: u32,
    pub(crate) curves: SmallVec<[TessCurve; 8]>,
}

impl TessContour {
    fn vertex_count(&self) -> u32 {
        self.padding + self.curves.iter().map(TessCurve::vertex_count).sum::<u32>()
    }
}

fn midpoint_of(points: impl Iterator<Item = Point>) -> Point {
    let (sum, n) = points.fold((Vec2::ZERO, 0.0), |(sum, n), p| (sum + p.to_vec2(), n + 1.0));
    if n == 0.0 {
        Point::ZERO
    } else {
        (sum / n).to_point()
    }
}

/// Largest factor by which `matrix` stretches any vector.
fn max_scale(matrix: &Affine) -> f64 {
    let [a, b, c, d, _, _] = matrix.as_coeffs();
    let sum = (a * a + b * b + c * c + d * d) * 0.5;
    let diff = (a * a + b * b - c * c - d * d) * 0.5;
    let cross = a * c + b * d;
    (sum + (diff * diff + cross * cross).sqrt()).sqrt()
}

fn non_zero(v: Vec2) -> Vec2 {
    if v.hypot2() == 0.0 {
        Vec2::new(1.0, 0.0)
    } else {
        v
    }
}

/// Contour flags and segment count of a join turning by `angle` radians.
fn join_segments(join: Join, angle: f32, segments_per_radian: f32) -> (u32, u32) {
    if angle < SMOOTH_JOIN_ANGLE {
        return (contour_flags::ROUND_JOIN, 1);
    }
    match join {
        Join::Round => (
            contour_flags::ROUND_JOIN,
            polar_segment_count(angle, segments_per_radian).max(1) + 1,
        ),
        Join::Bevel => (contour_flags::BEVEL_JOIN, MITER_OR_BEVEL_JOIN_SEGMENTS),
        Join::Miter => (contour_flags::MITER_REVERT_JOIN, MITER_OR_BEVEL_JOIN_SEGMENTS),
    }
}

/// A cap drawn as a 180 degree join.
fn cap_segments(cap: Cap, segments_per_radian: f32) -> (u32, u32) {
    let (join_flags, segments) = match cap {
        Cap::Butt => (contour_flags::BEVEL_JOIN, MITER_OR_BEVEL_JOIN_SEGMENTS),
        Cap::Square => (contour_flags::MITER_CLIP_JOIN, MITER_OR_BEVEL_JOIN_SEGMENTS),
        Cap::Round => (
            contour_flags::ROUND_JOIN,
            polar_segment_count(PI, segments_per_radian).max(1) + 1,
        ),
    };
    (join_flags | contour_flags::EMULATED_STROKE_CAP, segments)
}

fn fill_contours(contours: &[CubicContour], matrix: &Affine) -> Vec<TessContour> {
    contours
        .iter()
        .map(|contour| {
            let curves: SmallVec<[TessCurve; 8]> = contour
                .cubics
                .iter()
                .map(|pts| TessCurve {
                    pts: *pts,
                    join_tangent: cubic_end_tangent(pts),
                    flags: 0,
                    parametric_segment_count: parametric_segment_count(
                        pts,
                        PARAMETRIC_PRECISION,
                        matrix,
                    ),
                    polar_segment_count: 0,
                    join_segment_count: 1,
                })
                .collect();
            let mut contour = TessContour {
                midpoint: midpoint_of(contour.cubics.iter().map(|pts| pts[0])),
                closed: true,
                padding: 0,
                curves,
            };
            contour.padding =
                padding_to_align_up(PatchType::MidpointFan.segment_span(), contour.vertex_count());
            contour
        })
        .collect()
}

fn stroke_contours(contours: &[CubicContour], matrix: &Affine, stroke: &Stroke) -> Vec<TessContour> {
    let radius = stroke.width as f32 * 0.5;
    let segments_per_radian = polar_segments_per_radian(radius * max_scale(matrix) as f32);
    contours
        .iter()
        .map(|contour| {
            let cubics = &contour.cubics;
            let mut curves = SmallVec::<[TessCurve; 8]>::new();
            if !contour.closed {
                // The start cap: the first cubic reversed, contributing only
                // its join.
                let first = cubics[0];
                let (flags, join) = cap_segments(stroke.start_cap, segments_per_radian);
                curves.push(TessCurve {
                    pts: [first[3], first[2], first[1], first[0]],
                    join_tangent: non_zero(cubic_start_tangent(&first)),
                    flags,
                    parametric_segment_count: 0,
                    polar_segment_count: 0,
                    join_segment_count: join,
                });
            }
            for (i, pts) in cubics.iter().enumerate() {
                let end_tangent = non_zero(cubic_end_tangent(pts));
                let (join_tangent, flags, join) = if i + 1 < cubics.len() || contour.closed {
                    let next = &cubics[(i + 1) % cubics.len()];
                    let next_tangent = non_zero(cubic_start_tangent(next));
                    let angle = angle_between(end_tangent, next_tangent);
                    let (flags, join) = join_segments(stroke.join, angle, segments_per_radian);
                    (next_tangent, flags, join)
                } else {
                    let (flags, join) = cap_segments(stroke.end_cap, segments_per_radian);
                    (-end_tangent, flags, join)
                };
                curves.push(TessCurve {
                    pts: *pts,
                    join_tangent,
                    flags,
                    parametric_segment_count: parametric_segment_count(
                        pts,
                        PARAMETRIC_PRECISION,
                        matrix,
                    ),
                    polar_segment_count: polar_segment_count(
                        cubic_rotation(pts),
                        segments_per_radian,
                    ),
                    join_segment_count: join,
                });
            }
            let mut contour = TessContour {
                midpoint: Point::ZERO,
                closed: contour.closed,
                padding: 0,
                curves,
            };
            contour.padding =
                padding_to_align_up(PatchType::MidpointFan.segment_span(), contour.vertex_count());
            contour
        })
        .collect()
}

/// Number of outer curve patches a cubic is chopped into.
pub(crate) fn find_subdivision_count(pts: &[Point; 4], matrix: &Affine) -> u32 {
    let max = MAX_PARAMETRIC_SEGMENTS.div_ceil(OUTER_CURVE_PARAMETRIC_SEGMENTS);
    let n = (wangs_formula_cubic(pts, PARAMETRIC_PRECISION, matrix)
        / OUTER_CURVE_PARAMETRIC_SEGMENTS as f32)
        .ceil();
    (n as u32).clamp(1, max)
}

fn triangulated_contours(
    contours: &[CubicContour],
    matrix: &Affine,
) -> (Vec<TessContour>, Vec<Triangle>) {
    let mut tess_contours = Vec::with_capacity(contours.len());
    let mut triangles = Vec::new();
    for contour in contours {
        let mut polygon = SmallVec::<[Point; 16]>::new();
        let mut curves = SmallVec::<[TessCurve; 8]>::new();
        for pts in &contour.cubics {
            let n = find_subdivision_count(pts, matrix);
            for k in 0..n {
                let piece = chop_cubic(pts, k as f64 / n as f64, (k + 1) as f64 / n as f64);
                polygon.push(piece[0]);
                curves.push(TessCurve {
                    pts: piece,
                    join_tangent: non_zero(cubic_end_tangent(&piece)),
                    flags: 0,
                    parametric_segment_count: OUTER_CURVE_PARAMETRIC_SEGMENTS,
                    polar_segment_count: 1,
                    join_segment_count: 1,
                });
            }
        }
        // Fan out from the first vertex; each triangle adds its own winding.
        for i in 1..polygon.len().saturating_sub(1) {
            let (a, b, c) = (polygon[0], polygon[i], polygon[i + 1]);
            let cross = (b - a).cross(c - a);
            if cross == 0.0 {
                continue;
            }
            triangles.push(Triangle {
                pts: [a, b, c],
                weight: if cross > 0.0 { 1 } else { -1 },
            });
        }
        tess_contours.push(TessContour {
            midpoint: midpoint_of(polygon.iter().copied()),
            closed: true,
            padding: 0,
            curves,
        });
    }
    (tess_contours, triangles)
}

/// A path drawn by midpoint fan patches, or by outer curve patches plus an
/// interior triangulation.
#[derive(Clone, Debug)]
pub struct PathDraw {
    patch_type: PatchType,
    matrix: Affine,
    stroke_radius: f32,
    fill_rule: FillRule,
    /// Dropped once the flush has executed.
    brush: Option<Brush>,
    paint_type: PaintType,
    paint_data: PaintData,
    blend_mode: PlsBlendMode,
    clip_id: u32,
    contours: Vec<TessContour>,
    triangles: Vec<Triangle>,
    tess_vertex_count: u32,
    padding_vertex_count: u32,
}

impl PathDraw {
    fn new(
        patch_type: PatchType,
        matrix: Affine,
        style: &PathStyle,
        contours: Vec<TessContour>,
        triangles: Vec<Triangle>,
        clip_id: u32,
    ) -> Self {
        let (stroke_radius, fill_rule) = match style {
            PathStyle::Fill(fill_rule) => (0.0, *fill_rule),
            PathStyle::Stroke(stroke) => (stroke.width as f32 * 0.5, FillRule::NonZero),
        };
        let tess_vertex_count = contours.iter().map(TessContour::vertex_count).sum();
        Self {
            patch_type,
            matrix,
            stroke_radius,
            fill_rule,
            brush: None,
            paint_type: PaintType::SolidColor,
            paint_data: PaintData::default(),
            blend_mode: PlsBlendMode::SrcOver,
            clip_id,
            contours,
            triangles,
            tess_vertex_count,
            padding_vertex_count: 0,
        }
    }

    fn with_paint(mut self, paint: &Paint) -> Self {
        self.paint_type = paint.brush.paint_type();
        self.paint_data = match &paint.brush {
            Brush::Solid(color) => PaintData::solid_color(*color),
            // Filled in once the ramp has a location.
            Brush::Gradient(_) => PaintData::default(),
            Brush::Image { opacity, .. } => PaintData::image(*opacity),
        };
        self.blend_mode = paint.pls_blend_mode();
        self.brush = Some(paint.brush.clone());
        self
    }

    /// A fill or stroke tessellated into midpoint fan patches.
    pub fn midpoint_fan(
        path: &BezPath,
        matrix: Affine,
        style: &PathStyle,
        paint: &Paint,
        clip_id: u32,
    ) -> Self {
        let contours = match style {
            PathStyle::Fill(_) => fill_contours(&cubic_contours(path, true), &matrix),
            PathStyle::Stroke(stroke) => {
                stroke_contours(&cubic_contours(path, false), &matrix, stroke)
            }
        };
        Self::new(PatchType::MidpointFan, matrix, style, contours, vec![], clip_id)
            .with_paint(paint)
    }

    /// A fill drawn as outer curve patches around a triangulated interior.
    /// Suited to paths covering a large area.
    pub fn interior_triangulation(
        path: &BezPath,
        matrix: Affine,
        fill_rule: FillRule,
        paint: &Paint,
        clip_id: u32,
    ) -> Self {
        let (contours, triangles) = triangulated_contours(&cubic_contours(path, true), &matrix);
        Self::new(
            PatchType::OuterCurves,
            matrix,
            &PathStyle::Fill(fill_rule),
            contours,
            triangles,
            clip_id,
        )
        .with_paint(paint)
    }

    /// Writes the coverage of `path` into the clip buffer as `clip_id`,
    /// intersected with `outer_clip_id` if nonzero.
    pub fn clip_update(
        path: &BezPath,
        matrix: Affine,
        fill_rule: FillRule,
        clip_id: u32,
        outer_clip_id: u32,
    ) -> Self {
        let contours = fill_contours(&cubic_contours(path, true), &matrix);
        let mut draw = Self::new(
            PatchType::MidpointFan,
            matrix,
            &PathStyle::Fill(fill_rule),
            contours,
            vec![],
            clip_id,
        );
        draw.paint_type = PaintType::ClipUpdate;
        draw.paint_data = PaintData::clip_update(outer_clip_id);
        draw
    }

    pub fn patch_type(&self) -> PatchType {
        self.patch_type
    }

    pub fn clip_id(&self) -> u32 {
        self.clip_id
    }

    pub fn blend_mode(&self) -> PlsBlendMode {
        self.blend_mode
    }

    pub fn paint_type(&self) -> PaintType {
        self.paint_type
    }

    /// True if the path has no contours and draws nothing.
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    /// Tessellation vertices of the contours, excluding leading padding.
    pub fn tess_vertex_count(&self) -> u32 {
        self.tess_vertex_count
    }

    pub fn contour_count(&self) -> usize {
        self.contours.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub(crate) fn image_texture(&self) -> Option<&Arc<dyn ImageTexture>> {
        match &self.brush {
            Some(Brush::Image { texture, .. }) => Some(texture),
            _ => None,
        }
    }

    pub(crate) fn gradient(&self) -> Option<&Gradient> {
        match &self.brush {
            Some(Brush::Gradient(gradient)) => Some(gradient.as_ref()),
            _ => None,
        }
    }

    pub(crate) fn count_resources(
        &mut self,
        counters: &mut ResourceCounters,
        tess_counter: &mut TessVertexCounter,
    ) {
        counters.path_count += 1;
        counters.contour_count += self.contours.len();
        counters.curve_count += self.contours.iter().map(|c| c.curves.len()).sum::<usize>();
        counters.triangle_vertex_count += self.triangles.len() * 3;
        self.padding_vertex_count =
            tess_counter.count_path(self.patch_type.segment_span(), self.tess_vertex_count);
    }

    pub(crate) fn push_gradient_if_needed<B: RenderContextImpl>(
        &mut self,
        context: &mut RenderContext<B>,
    ) -> bool {
        if let Some(Brush::Gradient(gradient)) = &self.brush {
            let Some(location) = context.push_gradient(gradient) else {
                return false;
            };
            self.paint_data = PaintData::gradient(location, gradient.coeffs());
        }
        true
    }

    pub(crate) fn push_to_render_context<B: RenderContextImpl>(
        &self,
        context: &mut RenderContext<B>,
        id: DrawId,
    ) {
        context.push_path(
            &PathParams {
                patch_type: self.patch_type,
                matrix: self.matrix,
                stroke_radius: self.stroke_radius,
                fill_rule: self.fill_rule,
                paint_type: self.paint_type,
                clip_id: self.clip_id,
                blend_mode: self.blend_mode,
                paint_data: self.paint_data,
                tess_vertex_count: self.tess_vertex_count,
                padding_vertex_count: self.padding_vertex_count,
            },
            self.image_texture().map(|texture| (id, texture)),
        );
        for contour in &self.contours {
            context.push_contour(contour.midpoint, contour.closed, contour.padding);
            for curve in &contour.curves {
                context.push_cubic(
                    &curve.pts,
                    curve.join_tangent,
                    curve.flags,
                    curve.parametric_segment_count,
                    curve.polar_segment_count,
                    curve.join_segment_count,
                );
            }
        }
        if !self.triangles.is_empty() {
            context.push_interior_triangulation(&self.triangles);
        }
    }

    pub(crate) fn release_refs(&mut self) {
        self.brush = None;
    }
}
