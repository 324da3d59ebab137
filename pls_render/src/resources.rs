// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sizing of the GPU resources behind the render context's rings.
//!
//! Every resource starts at a floor and is grown when a frame needs more,
//! never past a ceiling. Resources are only reallocated while nothing is
//! mapped: at the start of a frame, after a flush, or in place before the
//! first reservation of a flush.

use pls_encoding::limits::{
    rows_for, CONTOUR_TEXELS_PER_ITEM, CONTOUR_TEXTURE_WIDTH_IN_ITEMS,
    GPU_RESOURCE_INTERMEDIATE_GROWTH_FACTOR, GPU_RESOURCE_PADDING, GRAD_TEXTURE_WIDTH_IN_SIMPLE_RAMPS,
    MAX_COMPLEX_GRADIENTS, MAX_COMPLEX_GRADIENT_SPANS, MAX_CONTOUR_ID, MAX_IMAGE_DRAW_UNIFORMS,
    MAX_SIMPLE_GRADIENTS, MAX_TESSELLATION_SPANS, MAX_TESSELLATION_VERTICES,
    MAX_TRIANGLE_VERTICES, MIN_COMPLEX_GRADIENTS, MIN_COMPLEX_GRADIENT_SPANS,
    MIN_CONTOUR_ID_COUNT, MIN_IMAGE_DRAW_UNIFORMS, MIN_PATH_ID_COUNT, MIN_SIMPLE_GRADIENTS,
    MIN_TESSELLATION_SPANS, MIN_TESSELLATION_VERTICES, MIN_TRIANGLE_VERTICES,
    PATH_TEXELS_PER_ITEM, PATH_TEXTURE_WIDTH_IN_ITEMS, TESS_TEXTURE_WIDTH,
};
use pls_encoding::{
    ContourData, GpuResourceLimits, GradientSpan, ImageDrawUniforms, PathData, TessVertexSpan,
    TriangleVertex,
};

use crate::backend::RenderContextImpl;
use crate::buffer_ring::{Filter, Format, TexelLayout, TextureIndex};
use crate::context::RenderContext;

const FLOORS: GpuResourceLimits = GpuResourceLimits {
    max_path_id: MIN_PATH_ID_COUNT,
    max_contour_id: MIN_CONTOUR_ID_COUNT,
    max_simple_gradients: MIN_SIMPLE_GRADIENTS,
    max_complex_gradients: MIN_COMPLEX_GRADIENTS,
    max_complex_gradient_spans: MIN_COMPLEX_GRADIENT_SPANS,
    max_tessellation_spans: MIN_TESSELLATION_SPANS,
    max_tessellation_vertices: MIN_TESSELLATION_VERTICES,
    max_triangle_vertices: MIN_TRIANGLE_VERTICES,
    max_image_draw_uniforms: MIN_IMAGE_DRAW_UNIFORMS,
};

/// Layout of the texture holding `PathData`, three texels per path.
pub(crate) fn path_texel_layout(height: usize) -> TexelLayout {
    TexelLayout {
        format: Format::Rgba32ui,
        renderable: false,
        width_in_items: PATH_TEXTURE_WIDTH_IN_ITEMS as usize,
        height,
        texels_per_item: PATH_TEXELS_PER_ITEM as usize,
        texture_index: TextureIndex::Path,
        filter: Filter::Nearest,
    }
}

pub(crate) fn contour_texel_layout(height: usize) -> TexelLayout {
    TexelLayout {
        format: Format::Rgba32ui,
        renderable: false,
        width_in_items: CONTOUR_TEXTURE_WIDTH_IN_ITEMS as usize,
        height,
        texels_per_item: CONTOUR_TEXELS_PER_ITEM as usize,
        texture_index: TextureIndex::Contour,
        filter: Filter::Nearest,
    }
}

/// The gradient texture: simple ramps uploaded into the top rows, complex
/// ramps rendered into one row each below them.
pub(crate) fn gradient_texel_layout(height: usize) -> TexelLayout {
    TexelLayout {
        format: Format::Rgba8,
        renderable: true,
        width_in_items: GRAD_TEXTURE_WIDTH_IN_SIMPLE_RAMPS as usize,
        height,
        texels_per_item: 2,
        texture_index: TextureIndex::Gradient,
        filter: Filter::Linear,
    }
}

impl<B: RenderContextImpl> RenderContext<B> {
    fn resource_ceilings(&self) -> GpuResourceLimits {
        GpuResourceLimits {
            max_path_id: self.max_path_id as usize,
            max_contour_id: MAX_CONTOUR_ID as usize,
            max_simple_gradients: MAX_SIMPLE_GRADIENTS,
            max_complex_gradients: MAX_COMPLEX_GRADIENTS,
            max_complex_gradient_spans: MAX_COMPLEX_GRADIENT_SPANS,
            max_tessellation_spans: MAX_TESSELLATION_SPANS,
            max_tessellation_vertices: MAX_TESSELLATION_VERTICES,
            max_triangle_vertices: MAX_TRIANGLE_VERTICES,
            max_image_draw_uniforms: MAX_IMAGE_DRAW_UNIFORMS,
        }
    }

    /// Reallocates every resource for which `should_reallocate(target,
    /// current)` holds, after clamping its target between floor and ceiling.
    fn allocate_gpu_resources(
        &mut self,
        targets: &GpuResourceLimits,
        should_reallocate: impl Fn(usize, usize) -> bool,
    ) {
        debug_assert!(!self.rings.any_mapped(), "resources reallocated while mapped");
        let ceilings = self.resource_ceilings().to_array();
        let floors = FLOORS.to_array();
        let current = self.current_limits.to_array();
        let requested = targets.to_array();
        // A target is only adopted when its resource will be reallocated.
        let clamped: [usize; GpuResourceLimits::FIELD_COUNT] = std::array::from_fn(|i| {
            let target = requested[i].max(floors[i].min(ceilings[i])).min(ceilings[i]);
            if should_reallocate(target, current[i]) {
                target
            } else {
                current[i]
            }
        });
        let targets = GpuResourceLimits::from_array(clamped);
        let current = self.current_limits;
        let mut new_limits = current;

        if targets.max_path_id != current.max_path_id {
            let height = rows_for(targets.max_path_id, PATH_TEXTURE_WIDTH_IN_ITEMS as usize);
            let ring = self.backend.make_texel_buffer_ring(path_texel_layout(height));
            self.rings.path.reset(ring);
            new_limits.max_path_id = (height * PATH_TEXTURE_WIDTH_IN_ITEMS as usize)
                .min(self.max_path_id as usize);
            debug_assert_eq!(
                std::mem::size_of::<PathData>(),
                path_texel_layout(height).item_size_in_bytes()
            );
        }

        if targets.max_contour_id != current.max_contour_id {
            let height = rows_for(targets.max_contour_id, CONTOUR_TEXTURE_WIDTH_IN_ITEMS as usize);
            let ring = self.backend.make_texel_buffer_ring(contour_texel_layout(height));
            self.rings.contour.reset(ring);
            new_limits.max_contour_id =
                (height * CONTOUR_TEXTURE_WIDTH_IN_ITEMS as usize).min(MAX_CONTOUR_ID as usize);
            debug_assert_eq!(
                std::mem::size_of::<ContourData>(),
                contour_texel_layout(height).item_size_in_bytes()
            );
        }

        // Simple and complex ramps share one texture.
        if targets.max_simple_gradients != current.max_simple_gradients
            || targets.max_complex_gradients != current.max_complex_gradients
        {
            let simple_rows = rows_for(
                targets.max_simple_gradients,
                GRAD_TEXTURE_WIDTH_IN_SIMPLE_RAMPS as usize,
            );
            let height = simple_rows + targets.max_complex_gradients;
            let ring = self.backend.make_texel_buffer_ring(gradient_texel_layout(height));
            self.rings.simple_gradients.reset(ring);
            self.simple_gradient_rows = simple_rows;
            self.gradient_texture_height = height;
            new_limits.max_simple_gradients = simple_rows * GRAD_TEXTURE_WIDTH_IN_SIMPLE_RAMPS as usize;
            new_limits.max_complex_gradients = targets.max_complex_gradients;
        }

        if targets.max_complex_gradient_spans != current.max_complex_gradient_spans {
            let ring = self.backend.make_vertex_buffer_ring(
                targets.max_complex_gradient_spans,
                std::mem::size_of::<GradientSpan>(),
            );
            self.rings.gradient_spans.reset(ring);
            new_limits.max_complex_gradient_spans = targets.max_complex_gradient_spans;
        }

        if targets.max_tessellation_spans != current.max_tessellation_spans {
            let ring = self.backend.make_vertex_buffer_ring(
                targets.max_tessellation_spans,
                std::mem::size_of::<TessVertexSpan>(),
            );
            self.rings.tess_spans.reset(ring);
            new_limits.max_tessellation_spans = targets.max_tessellation_spans;
        }

        if targets.max_tessellation_vertices != current.max_tessellation_vertices {
            let height = rows_for(targets.max_tessellation_vertices, TESS_TEXTURE_WIDTH as usize);
            self.backend.allocate_tessellation_texture(height as u32);
            self.tess_texture_height = height;
            new_limits.max_tessellation_vertices = height * TESS_TEXTURE_WIDTH as usize;
        }

        if targets.max_triangle_vertices != current.max_triangle_vertices {
            let ring = self.backend.make_vertex_buffer_ring(
                targets.max_triangle_vertices,
                std::mem::size_of::<TriangleVertex>(),
            );
            self.rings.triangles.reset(ring);
            new_limits.max_triangle_vertices = targets.max_triangle_vertices;
        }

        if targets.max_image_draw_uniforms != current.max_image_draw_uniforms {
            let ring = self.backend.make_uniform_buffer_ring(
                targets.max_image_draw_uniforms,
                std::mem::size_of::<ImageDrawUniforms>(),
            );
            self.rings.image_draw_uniforms.reset(ring);
            new_limits.max_image_draw_uniforms = targets.max_image_draw_uniforms;
        }

        if new_limits != current {
            for (i, name) in GpuResourceLimits::FIELD_NAMES.iter().enumerate() {
                let (old, new) = (current.to_array()[i], new_limits.to_array()[i]);
                if old != new {
                    log::debug!("reallocated {name}: {old} -> {new}");
                }
            }
        }
        self.current_limits = new_limits;
    }

    /// Grows every resource whose `usage` exceeds its current size to
    /// `usage * factor`. Resources that fit are left alone.
    pub(crate) fn grow_exceeded_gpu_resources(&mut self, usage: &GpuResourceLimits, factor: f64) {
        let targets = usage.scaled_if_larger(&self.current_limits, factor);
        self.allocate_gpu_resources(&targets, |target, current| target > current);
    }

    /// Shrinks resources toward the recent high-water mark.
    ///
    /// Each resource is reallocated at `1.25x` its largest recent frame usage
    /// if that frees at least a third of it. The high-water mark restarts.
    pub fn shrink_gpu_resources_to_fit(&mut self) {
        debug_assert!(self.frame.is_none());
        let targets = self.max_recent_usage.scaled(GPU_RESOURCE_PADDING);
        self.allocate_gpu_resources(&targets, |target, current| target <= current * 2 / 3);
        self.max_recent_usage = GpuResourceLimits::default();
    }

    /// Drops every resource back to its floor.
    pub fn reset_gpu_resources(&mut self) {
        debug_assert!(self.frame.is_none());
        self.allocate_gpu_resources(&GpuResourceLimits::default(), |_, _| true);
        self.max_recent_usage = GpuResourceLimits::default();
    }

    /// Grows whatever overflowed during the intermediate flushes of this frame.
    pub(crate) fn grow_after_intermediate_flush(&mut self) {
        let usage = self.frame_usage;
        self.grow_exceeded_gpu_resources(&usage, GPU_RESOURCE_INTERMEDIATE_GROWTH_FACTOR);
    }

    /// Largest per-frame usage seen since the last shrink or reset.
    pub fn max_recent_usage(&self) -> &GpuResourceLimits {
        &self.max_recent_usage
    }
}
