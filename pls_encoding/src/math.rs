// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Segment counting and small geometric helpers shared by the encoder.

use peniko::kurbo::{Affine, Point, Rect, Vec2};

use crate::limits::{MAX_PARAMETRIC_SEGMENTS, MAX_POLAR_SEGMENTS, POLAR_PRECISION};

/// Converts a kurbo affine to the `[xx, xy, yx, yy, tx, ty]` layout of `PathData`.
pub fn affine_to_f32(transform: &Affine) -> [f32; 6] {
    transform.as_coeffs().map(|x| x as f32)
}

pub fn point_to_f32(point: Point) -> [f32; 2] {
    [point.x as f32, point.y as f32]
}

/// Applies only the linear part of `transform` to `v`.
fn transform_vector(transform: &Affine, v: Vec2) -> Vec2 {
    let c = transform.as_coeffs();
    Vec2::new(c[0] * v.x + c[2] * v.y, c[1] * v.x + c[3] * v.y)
}

/// Wang's formula for a cubic: the number of uniform parametric segments
/// needed to stay within `1 / precision` pixels of the curve once it has been
/// transformed by `transform`.
///
/// The result is fractional; callers round up and clamp.
pub fn wangs_formula_cubic(pts: &[Point; 4], precision: f32, transform: &Affine) -> f32 {
    let d0 = transform_vector(transform, pts[0].to_vec2() - 2.0 * pts[1].to_vec2() + pts[2].to_vec2());
    let d1 = transform_vector(transform, pts[1].to_vec2() - 2.0 * pts[2].to_vec2() + pts[3].to_vec2());
    let max_len_sq = d0.hypot2().max(d1.hypot2());
    let k = 0.75 * precision as f64;
    (k * k * max_len_sq).sqrt().sqrt() as f32
}

/// Wang's formula rounded up and clamped to the range a patch can encode.
pub fn parametric_segment_count(pts: &[Point; 4], precision: f32, transform: &Affine) -> u32 {
    let n = wangs_formula_cubic(pts, precision, transform).ceil();
    (n as u32).clamp(1, MAX_PARAMETRIC_SEGMENTS)
}

/// Number of polar segments per radian of rotation for a stroke of the given
/// device-space radius.
pub fn polar_segments_per_radian(stroke_radius: f32) -> f32 {
    let cos_theta = 1.0 - 1.0 / (POLAR_PRECISION * stroke_radius.max(1e-3));
    0.5 / cos_theta.max(-1.0).acos()
}

/// Number of polar segments needed to sweep `rotation` radians.
pub fn polar_segment_count(rotation: f32, segments_per_radian: f32) -> u32 {
    ((rotation.abs() * segments_per_radian).ceil() as u32).min(MAX_POLAR_SEGMENTS)
}

/// Upper bound of the total rotation of a cubic's tangent, measured along
/// its control polygon.
pub fn cubic_rotation(pts: &[Point; 4]) -> f32 {
    let mut rotation = 0.0;
    let mut prev: Option<Vec2> = None;
    for w in pts.windows(2) {
        let edge = w[1] - w[0];
        if edge.hypot2() == 0.0 {
            continue;
        }
        if let Some(prev) = prev {
            rotation += prev.cross(edge).atan2(prev.dot(edge)).abs();
        }
        prev = Some(edge);
    }
    rotation as f32
}

/// Tangent at the start of a cubic, skipping degenerate control points.
pub fn cubic_start_tangent(pts: &[Point; 4]) -> Vec2 {
    [pts[1], pts[2], pts[3]]
        .iter()
        .map(|p| *p - pts[0])
        .find(|v| v.hypot2() > 0.0)
        .unwrap_or(Vec2::ZERO)
}

/// Tangent at the end of a cubic, skipping degenerate control points.
pub fn cubic_end_tangent(pts: &[Point; 4]) -> Vec2 {
    [pts[2], pts[1], pts[0]]
        .iter()
        .map(|p| pts[3] - *p)
        .find(|v| v.hypot2() > 0.0)
        .unwrap_or(Vec2::ZERO)
}

/// Unsigned angle between two tangents, in radians.
pub fn angle_between(a: Vec2, b: Vec2) -> f32 {
    if a.hypot2() == 0.0 || b.hypot2() == 0.0 {
        return 0.0;
    }
    a.cross(b).atan2(a.dot(b)).abs() as f32
}

/// Area of `bounds` after it has been transformed by `transform`.
pub fn find_transformed_area(bounds: &Rect, transform: &Affine) -> f32 {
    let pts = [
        *transform * Point::new(bounds.x0, bounds.y0),
        *transform * Point::new(bounds.x1, bounds.y0),
        *transform * Point::new(bounds.x1, bounds.y1),
        *transform * Point::new(bounds.x0, bounds.y1),
    ];
    let mut twice_area = 0.0;
    for i in 0..4 {
        let a = pts[i];
        let b = pts[(i + 1) % 4];
        twice_area += a.x * b.y - b.x * a.y;
    }
    (twice_area * 0.5).abs() as f32
}

/// Evaluates the sub-cubic of `pts` between parameters `t0` and `t1`.
pub fn chop_cubic(pts: &[Point; 4], t0: f64, t1: f64) -> [Point; 4] {
    let c = peniko::kurbo::CubicBez::new(pts[0], pts[1], pts[2], pts[3]);
    let sub = peniko::kurbo::ParamCurve::subsegment(&c, t0..t1);
    [sub.p0, sub.p1, sub.p2, sub.p3]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_need_one_segment() {
        let line = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(30.0, 0.0),
        ];
        assert_eq!(wangs_formula_cubic(&line, 4.0, &Affine::IDENTITY), 0.0);
        assert_eq!(parametric_segment_count(&line, 4.0, &Affine::IDENTITY), 1);
    }

    #[test]
    fn scaling_increases_segment_count() {
        let curve = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 100.0),
            Point::new(100.0, 100.0),
            Point::new(100.0, 0.0),
        ];
        let n = parametric_segment_count(&curve, 4.0, &Affine::IDENTITY);
        let n_scaled = parametric_segment_count(&curve, 4.0, &Affine::scale(16.0));
        assert!(n > 1);
        // Segment count scales with the square root of the transform scale.
        assert!(n_scaled >= 3 * n && n_scaled <= 5 * n);
    }

    #[test]
    fn rotation_of_a_half_turn() {
        let curve = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 0.0),
        ];
        let r = cubic_rotation(&curve);
        assert!((r - std::f32::consts::PI).abs() < 1e-5);
    }

    #[test]
    fn transformed_area() {
        let r = Rect::new(0.0, 0.0, 10.0, 20.0);
        assert_eq!(find_transformed_area(&r, &Affine::IDENTITY), 200.0);
        assert_eq!(find_transformed_area(&r, &Affine::scale(2.0)), 800.0);
        let rotated = find_transformed_area(&r, &Affine::rotate(0.5));
        assert!((rotated - 200.0).abs() < 1e-3);
    }

    #[test]
    fn degenerate_tangents() {
        let p = Point::new(1.0, 1.0);
        let pts = [p, p, Point::new(2.0, 1.0), Point::new(3.0, 1.0)];
        assert_eq!(cubic_start_tangent(&pts), Vec2::new(1.0, 0.0));
        assert_eq!(cubic_end_tangent(&pts), Vec2::new(1.0, 0.0));
    }
}
