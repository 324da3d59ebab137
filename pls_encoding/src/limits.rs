// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wire constants, resource floors and ceilings, and [`GpuResourceLimits`].

use std::ops::Add;

/// Number of buffers in every resource ring (triple buffering).
pub const BUFFER_RING_SIZE: usize = 3;

/// Tolerance used by Wang's formula when counting parametric segments.
pub const PARAMETRIC_PRECISION: f32 = 4.0;
/// Tolerance used when counting polar segments of a stroke.
pub const POLAR_PRECISION: f32 = 8.0;
pub const MAX_PARAMETRIC_SEGMENTS: u32 = 1023;
pub const MAX_POLAR_SEGMENTS: u32 = 1023;
/// Number of segments used to tessellate a miter or bevel join.
pub const MITER_OR_BEVEL_JOIN_SEGMENTS: u32 = 5;

pub const TESS_TEXTURE_WIDTH: u32 = 2048;
pub const TESS_TEXTURE_WIDTH_LOG2: u32 = 11;

pub const GRAD_TEXTURE_WIDTH: u32 = 512;
pub const GRAD_TEXTURE_WIDTH_IN_SIMPLE_RAMPS: u32 = GRAD_TEXTURE_WIDTH / 2;

pub const PATH_TEXTURE_WIDTH_IN_ITEMS: u32 = 128;
/// A `PathData` record is 48 bytes, i.e. three RGBA32 texels.
pub const PATH_TEXELS_PER_ITEM: u32 = 3;
pub const CONTOUR_TEXTURE_WIDTH_IN_ITEMS: u32 = 256;
pub const CONTOUR_TEXELS_PER_ITEM: u32 = 1;

pub const MAX_CONTOUR_ID: u32 = 65535;
pub const CONTOUR_ID_MASK: u32 = 0xffff;

/// Smallest maximum texture height guaranteed by every supported API.
pub const MAX_TEXTURE_HEIGHT: u32 = 2048;

pub const MIN_PATH_ID_COUNT: usize = PATH_TEXTURE_WIDTH_IN_ITEMS as usize * 32;
pub const MIN_CONTOUR_ID_COUNT: usize = CONTOUR_TEXTURE_WIDTH_IN_ITEMS as usize * 32;

pub const MIN_SIMPLE_GRADIENT_ROWS: usize = 1;
pub const MAX_SIMPLE_GRADIENT_ROWS: usize = 256;
pub const MIN_SIMPLE_GRADIENTS: usize =
    MIN_SIMPLE_GRADIENT_ROWS * GRAD_TEXTURE_WIDTH_IN_SIMPLE_RAMPS as usize;
pub const MAX_SIMPLE_GRADIENTS: usize =
    MAX_SIMPLE_GRADIENT_ROWS * GRAD_TEXTURE_WIDTH_IN_SIMPLE_RAMPS as usize;
pub const MIN_COMPLEX_GRADIENTS: usize = 31;
pub const MAX_COMPLEX_GRADIENTS: usize = MAX_TEXTURE_HEIGHT as usize - MAX_SIMPLE_GRADIENT_ROWS;
pub const MIN_COMPLEX_GRADIENT_SPANS: usize = MIN_COMPLEX_GRADIENTS * 8;
pub const MAX_COMPLEX_GRADIENT_SPANS: usize = MAX_COMPLEX_GRADIENTS * 64;

pub const MIN_TESS_TEXTURE_HEIGHT: usize = 32;
pub const MAX_TESS_TEXTURE_HEIGHT: usize = MAX_TEXTURE_HEIGHT as usize;
pub const MIN_TESSELLATION_VERTICES: usize = MIN_TESS_TEXTURE_HEIGHT * TESS_TEXTURE_WIDTH as usize;
pub const MAX_TESSELLATION_VERTICES: usize = MAX_TESS_TEXTURE_HEIGHT * TESS_TEXTURE_WIDTH as usize;
pub const MIN_TESSELLATION_SPANS: usize = MIN_TESSELLATION_VERTICES / 4;
/// 64-byte spans, three buffers in the ring: about 100 MiB.
pub const MAX_TESSELLATION_SPANS: usize = MAX_TESSELLATION_VERTICES / 8;

pub const MIN_TRIANGLE_VERTICES: usize = 3 * 1024;
pub const MAX_TRIANGLE_VERTICES: usize = 3 * (1 << 20);
pub const MIN_IMAGE_DRAW_UNIFORMS: usize = 16;
pub const MAX_IMAGE_DRAW_UNIFORMS: usize = 1 << 14;

/// Headroom applied when growing toward a recent high-water mark.
pub const GPU_RESOURCE_PADDING: f64 = 1.25;
/// Growth factor applied when a resource overflows mid-frame.
pub const GPU_RESOURCE_INTERMEDIATE_GROWTH_FACTOR: f64 = 2.0;

/// Largest path ID that can be encoded for the given path ID granularity.
///
/// Path IDs are stored in 16-bit float coverage planes; the exponent range
/// caps how many distinct IDs survive the round trip.
pub const fn max_path_id(granularity: u32) -> u32 {
    ((0x1f << 10) - 1) / granularity - 1023
}

/// Number of padding items needed to bring `count` up to a multiple of `n`.
pub const fn padding_to_align_up(n: u32, count: u32) -> u32 {
    let max_multiple = u32::MAX - u32::MAX % n;
    max_multiple.wrapping_sub(count) % n
}

/// Number of rows of `width` items needed to hold `count` items.
pub const fn rows_for(count: usize, width: usize) -> usize {
    (count + width - 1) / width
}

/// Capacity of every GPU resource the render context allocates.
///
/// The same struct is used to describe usage (how much of each resource a
/// flush or frame needed) so the two can be compared field by field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GpuResourceLimits {
    pub max_path_id: usize,
    pub max_contour_id: usize,
    pub max_simple_gradients: usize,
    pub max_complex_gradients: usize,
    pub max_complex_gradient_spans: usize,
    pub max_tessellation_spans: usize,
    pub max_tessellation_vertices: usize,
    pub max_triangle_vertices: usize,
    pub max_image_draw_uniforms: usize,
}

impl GpuResourceLimits {
    pub const FIELD_COUNT: usize = 9;

    pub const FIELD_NAMES: [&'static str; Self::FIELD_COUNT] = [
        "path IDs",
        "contour IDs",
        "simple gradients",
        "complex gradients",
        "complex gradient spans",
        "tessellation spans",
        "tessellation vertices",
        "triangle vertices",
        "image draw uniforms",
    ];

    pub fn to_array(&self) -> [usize; Self::FIELD_COUNT] {
        [
            self.max_path_id,
            self.max_contour_id,
            self.max_simple_gradients,
            self.max_complex_gradients,
            self.max_complex_gradient_spans,
            self.max_tessellation_spans,
            self.max_tessellation_vertices,
            self.max_triangle_vertices,
            self.max_image_draw_uniforms,
        ]
    }

    pub fn from_array(a: [usize; Self::FIELD_COUNT]) -> Self {
        Self {
            max_path_id: a[0],
            max_contour_id: a[1],
            max_simple_gradients: a[2],
            max_complex_gradients: a[3],
            max_complex_gradient_spans: a[4],
            max_tessellation_spans: a[5],
            max_tessellation_vertices: a[6],
            max_triangle_vertices: a[7],
            max_image_draw_uniforms: a[8],
        }
    }

    fn map(&self, mut f: impl FnMut(usize, usize) -> usize, other: &Self) -> Self {
        let a = self.to_array();
        let b = other.to_array();
        Self::from_array(std::array::from_fn(|i| f(a[i], b[i])))
    }

    /// Raises every field to at least the corresponding field of `other`.
    pub fn accumulate_max(&mut self, other: &Self) {
        *self = self.map(usize::max, other);
    }

    /// Scales every field that is larger than the matching `threshold` field.
    ///
    /// Fields at or below their threshold are returned unchanged.
    pub fn scaled_if_larger(&self, threshold: &Self, factor: f64) -> Self {
        self.map(
            |value, threshold| {
                if value > threshold {
                    scale(value, factor)
                } else {
                    value
                }
            },
            threshold,
        )
    }

    /// Scales every field by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        self.map(|value, _| scale(value, factor), self)
    }

    /// Returns true if any field is larger than the matching field in `limits`.
    pub fn exceeds(&self, limits: &Self) -> bool {
        self.to_array()
            .iter()
            .zip(limits.to_array())
            .any(|(usage, limit)| *usage > limit)
    }
}

impl Add for GpuResourceLimits {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.map(usize::saturating_add, &other)
    }
}

fn scale(value: usize, factor: f64) -> usize {
    (value as f64 * factor).ceil() as usize
}

/// Running tessellation vertex counter that inserts alignment padding.
///
/// Every path must begin on a boundary of its patch size so that instance
/// `n` of a patch draw covers vertices `n * span..(n + 1) * span`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TessVertexCounter {
    running_total: u32,
    padding_total: u32,
}

impl TessVertexCounter {
    /// Creates a counter starting at the current tessellation cursor.
    pub fn new(initial_vertex_count: u32) -> Self {
        Self {
            running_total: initial_vertex_count,
            padding_total: 0,
        }
    }

    /// Counts a path of `tess_vertex_count` vertices tessellated into patches
    /// of `patch_span` vertices and returns the padding inserted before it.
    pub fn count_path(&mut self, patch_span: u32, tess_vertex_count: u32) -> u32 {
        let padding = padding_to_align_up(patch_span, self.running_total);
        self.running_total += padding + tess_vertex_count;
        self.padding_total += padding;
        padding
    }

    pub fn running_total(&self) -> u32 {
        self.running_total
    }

    pub fn padding_total(&self) -> u32 {
        self.padding_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_path_id_matches_float_precision() {
        assert_eq!(max_path_id(1), 30720);
        assert_eq!(max_path_id(2), 14848);
    }

    #[test]
    fn padding() {
        assert_eq!(padding_to_align_up(8, 0), 0);
        assert_eq!(padding_to_align_up(8, 1), 7);
        assert_eq!(padding_to_align_up(8, 8), 0);
        assert_eq!(padding_to_align_up(17, 18), 16);
        assert_eq!(padding_to_align_up(17, 34), 0);
    }

    #[test]
    fn tess_vertex_counter_aligns_each_path() {
        let mut counter = TessVertexCounter::new(5);
        assert_eq!(counter.count_path(8, 16), 3);
        assert_eq!(counter.running_total(), 24);
        assert_eq!(counter.count_path(17, 17), 10);
        assert_eq!(counter.running_total(), 51);
        assert_eq!(counter.padding_total(), 13);
    }

    #[test]
    fn scaling() {
        let usage = GpuResourceLimits {
            max_path_id: 100,
            max_contour_id: 10,
            ..Default::default()
        };
        let threshold = GpuResourceLimits {
            max_path_id: 50,
            max_contour_id: 20,
            ..Default::default()
        };
        let scaled = usage.scaled_if_larger(&threshold, 2.0);
        assert_eq!(scaled.max_path_id, 200);
        assert_eq!(scaled.max_contour_id, 10);
        assert_eq!(usage.scaled(1.25).max_path_id, 125);
        assert!(usage.exceeds(&threshold));
        assert!(!usage.exceeds(&usage.scaled(2.0)));
    }

    #[test]
    fn accumulate_and_add() {
        let mut a = GpuResourceLimits {
            max_path_id: 3,
            max_tessellation_vertices: 40,
            ..Default::default()
        };
        let b = GpuResourceLimits {
            max_path_id: 7,
            max_tessellation_vertices: 10,
            ..Default::default()
        };
        assert_eq!((a + b).max_path_id, 10);
        a.accumulate_max(&b);
        assert_eq!(a.max_path_id, 7);
        assert_eq!(a.max_tessellation_vertices, 40);
    }
}
