// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use peniko::kurbo::{Point, Vec2};
use peniko::{BlendMode, Color, ColorStop, ColorStops};
use pls_encoding::{PaintType, PlsBlendMode};

use crate::backend::ImageTexture;

#[derive(Clone, Copy, Debug, PartialEq)]
enum GradientKind {
    Linear,
    Radial,
}

/// A linear or radial gradient, with its stops normalized to end on 1 (and,
/// for linear gradients, to begin on 0).
#[derive(Clone, Debug)]
pub struct Gradient {
    kind: GradientKind,
    stops: ColorStops,
    coeffs: [f32; 3],
}

/// Stops must be non-empty, within `[0, 1]`, and ordered.
fn validate_stops(stops: &[ColorStop]) -> bool {
    !stops.is_empty()
        && stops.iter().all(|s| (0.0..=1.0).contains(&s.offset))
        && stops.windows(2).all(|w| w[0].offset <= w[1].offset)
}

impl Gradient {
    /// Returns `None` if the stops are invalid.
    pub fn new_linear(start: Point, end: Point, stops: &[ColorStop]) -> Option<Self> {
        if !validate_stops(stops) {
            return None;
        }
        let mut stops: ColorStops = stops.iter().copied().collect();
        let (mut start, mut end) = (start, end);
        let first = stops[0].offset;
        let last = stops[stops.len() - 1].offset;
        if first != 0.0 || last != 1.0 {
            // Tighten the endpoints to the first and last stops so the ramp
            // uses the texture's full width.
            let (s, e) = (start, end);
            start = s.lerp(e, first as f64);
            end = s.lerp(e, last as f64);
            let count = stops.len();
            stops[0].offset = 0.0;
            if count > 2 && last > first {
                let m = 1.0 / (last - first);
                let a = -first * m;
                for i in 1..count - 1 {
                    let lo = stops[i - 1].offset;
                    stops[i].offset = (stops[i].offset * m + a).clamp(lo, 1.0);
                }
            }
            stops[count - 1].offset = 1.0;
        }
        let mut v: Vec2 = end - start;
        let len_sq = v.hypot2();
        if len_sq > 0.0 {
            v *= 1.0 / len_sq;
        }
        let coeffs = [v.x as f32, v.y as f32, -v.dot(start.to_vec2()) as f32];
        Some(Self {
            kind: GradientKind::Linear,
            stops,
            coeffs,
        })
    }

    /// Returns `None` if the stops are invalid.
    pub fn new_radial(center: Point, radius: f32, stops: &[ColorStop]) -> Option<Self> {
        if !validate_stops(stops) {
            return None;
        }
        let mut stops: ColorStops = stops.iter().copied().collect();
        let mut radius = radius;
        let count = stops.len();
        let last = stops[count - 1].offset;
        if last != 1.0 && last > 0.0 {
            radius *= last;
            let inverse_last = 1.0 / last;
            for stop in &mut stops[..count - 1] {
                stop.offset *= inverse_last;
            }
            stops[count - 1].offset = 1.0;
        }
        Some(Self {
            kind: GradientKind::Radial,
            stops,
            coeffs: [center.x as f32, center.y as f32, radius],
        })
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    pub fn coeffs(&self) -> [f32; 3] {
        self.coeffs
    }

    pub fn paint_type(&self) -> PaintType {
        match self.kind {
            GradientKind::Linear => PaintType::LinearGradient,
            GradientKind::Radial => PaintType::RadialGradient,
        }
    }

    /// Two stops at exactly 0 and 1 fit in two texels of the gradient texture.
    pub fn is_simple(&self) -> bool {
        self.stops.len() == 2 && self.stops[0].offset == 0.0 && self.stops[1].offset == 1.0
    }
}

/// What a path is filled with.
#[derive(Clone, Debug)]
pub enum Brush {
    Solid(Color),
    Gradient(Arc<Gradient>),
    Image {
        texture: Arc<dyn ImageTexture>,
        opacity: f32,
    },
}

impl Brush {
    pub fn paint_type(&self) -> PaintType {
        match self {
            Self::Solid(_) => PaintType::SolidColor,
            Self::Gradient(gradient) => gradient.paint_type(),
            Self::Image { .. } => PaintType::Image,
        }
    }
}

impl From<Color> for Brush {
    fn from(color: Color) -> Self {
        Self::Solid(color)
    }
}

impl From<Gradient> for Brush {
    fn from(gradient: Gradient) -> Self {
        Self::Gradient(Arc::new(gradient))
    }
}

/// A brush plus the blend mode it is composited with.
#[derive(Clone, Debug)]
pub struct Paint {
    pub brush: Brush,
    pub blend_mode: BlendMode,
}

impl Paint {
    pub fn new(brush: impl Into<Brush>) -> Self {
        Self {
            brush: brush.into(),
            blend_mode: BlendMode::default(),
        }
    }

    pub fn with_blend_mode(mut self, blend_mode: impl Into<BlendMode>) -> Self {
        self.blend_mode = blend_mode.into();
        self
    }

    pub(crate) fn pls_blend_mode(&self) -> PlsBlendMode {
        PlsBlendMode::from_mix(self.blend_mode.mix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(offset: f32, color: Color) -> ColorStop {
        ColorStop { offset, color }
    }

    #[test]
    fn linear_stops_are_normalized() {
        let gradient = Gradient::new_linear(
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            &[stop(0.25, Color::BLACK), stop(0.75, Color::WHITE)],
        );
        let gradient = gradient.as_ref();
        assert_eq!(gradient.map(Gradient::is_simple), Some(true));
        // The ramp now spans x = 25..75.
        let coeffs = gradient.map(Gradient::coeffs).unwrap_or_default();
        let t = |x: f32| coeffs[0] * x + coeffs[2];
        assert!(t(25.0).abs() < 1e-6);
        assert!((t(75.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn radial_scales_to_last_stop() {
        let gradient = Gradient::new_radial(
            Point::new(5.0, 6.0),
            10.0,
            &[stop(0.0, Color::BLACK), stop(0.5, Color::WHITE)],
        );
        let gradient = gradient.as_ref();
        assert_eq!(gradient.map(Gradient::coeffs), Some([5.0, 6.0, 5.0]));
        assert_eq!(gradient.map(Gradient::is_simple), Some(true));
    }

    #[test]
    fn invalid_stops_are_rejected() {
        assert!(Gradient::new_radial(Point::ZERO, 1.0, &[]).is_none());
        assert!(Gradient::new_linear(
            Point::ZERO,
            Point::new(1.0, 0.0),
            &[stop(0.5, Color::BLACK), stop(0.25, Color::WHITE)],
        )
        .is_none());
        assert!(Gradient::new_radial(Point::ZERO, 1.0, &[stop(1.5, Color::BLACK)]).is_none());
    }

    #[test]
    fn three_stops_are_complex() {
        let gradient = Gradient::new_linear(
            Point::ZERO,
            Point::new(1.0, 0.0),
            &[
                stop(0.0, Color::BLACK),
                stop(0.5, Color::RED),
                stop(1.0, Color::WHITE),
            ],
        );
        assert_eq!(gradient.map(|g| g.is_simple()), Some(false));
    }
}
