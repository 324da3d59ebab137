// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bytemuck::{Pod, Zeroable};
use peniko::{Color, ColorStop};
use static_assertions::const_assert_eq;

use crate::limits::GRAD_TEXTURE_WIDTH;

/// A color packed as `0xAARRGGBB`.
pub type ColorInt = u32;

pub fn pack_color(color: Color) -> ColorInt {
    (color.a as u32) << 24 | (color.r as u32) << 16 | (color.g as u32) << 8 | color.b as u32
}

/// Where a color ramp lives in the gradient texture.
///
/// `left..right` is the texel range within `row`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ColorRampLocation {
    pub row: u32,
    pub left: u32,
    pub right: u32,
}

/// A two-stop ramp written directly into the gradient texture: two RGBA8 texels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct TwoTexelRamp {
    pub color0: [u8; 4],
    pub color1: [u8; 4],
}

const_assert_eq!(std::mem::size_of::<TwoTexelRamp>(), 8);

impl TwoTexelRamp {
    pub fn new(color0: Color, color1: Color) -> Self {
        Self {
            color0: [color0.r, color0.g, color0.b, color0.a],
            color1: [color1.r, color1.g, color1.b, color1.a],
        }
    }
}

/// A horizontal run of a complex color ramp, rendered by the GPU into one
/// row of the gradient texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct GradientSpan {
    /// `x1 << 16 | x0`, both 16-bit fixed point fractions of the texture width.
    pub horizontal_span: u32,
    pub y: u32,
    pub color0: ColorInt,
    pub color1: ColorInt,
}

const_assert_eq!(std::mem::size_of::<GradientSpan>(), 16);

impl GradientSpan {
    pub fn new(x0_fixed: u32, x1_fixed: u32, y: u32, color0: ColorInt, color1: ColorInt) -> Self {
        debug_assert!(x0_fixed < 65536);
        debug_assert!(x1_fixed < 65536);
        Self {
            horizontal_span: x1_fixed << 16 | x0_fixed,
            y,
            color0,
            color1,
        }
    }

    pub fn x0_fixed(&self) -> u32 {
        self.horizontal_span & 0xffff
    }

    pub fn x1_fixed(&self) -> u32 {
        self.horizontal_span >> 16
    }
}

/// Number of spans [`complex_ramp_spans`] emits for `stop_count` stops.
pub const fn complex_ramp_span_count(stop_count: usize) -> usize {
    stop_count + 1
}

/// Encodes a multi-stop ramp as the spans that render row `y` of the
/// gradient texture.
///
/// Emits a leading span from 0 to the first stop, one span per pair of
/// adjacent stops, and a trailing span from the last stop to the right edge.
pub fn complex_ramp_spans(stops: &[ColorStop], y: u32) -> impl Iterator<Item = GradientSpan> + '_ {
    const W: f32 = (GRAD_TEXTURE_WIDTH - 1) as f32;
    const FIXED_SCALE: f32 = 65536.0 / GRAD_TEXTURE_WIDTH as f32;
    let fixed = |offset: f32| (((offset.clamp(0.0, 1.0) * W + 0.5) * FIXED_SCALE) as u32).min(65535);
    let mut last_x = 0;
    let mut last_color = stops.first().map(|s| pack_color(s.color)).unwrap_or(0);
    let inner = stops.iter().map(move |stop| {
        let x_fixed = fixed(stop.offset);
        let color = pack_color(stop.color);
        let span = GradientSpan::new(last_x, x_fixed, y, last_color, color);
        last_x = x_fixed;
        last_color = color;
        span
    });
    let trailing = stops.last().map(move |stop| {
        let color = pack_color(stop.color);
        GradientSpan::new(fixed(stop.offset), 65535, y, color, color)
    });
    inner.chain(trailing)
}
