// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use pls_encoding::limits::{rows_for, GRAD_TEXTURE_WIDTH_IN_SIMPLE_RAMPS, TESS_TEXTURE_WIDTH};
use pls_encoding::{FlushType, FlushUniforms, GpuResourceLimits, LoadAction};

use crate::backend::{FlushDescriptor, RenderContextImpl};
use crate::context::RenderContext;
use crate::Result;

impl<B: RenderContextImpl> RenderContext<B> {
    /// Submits everything pushed since the previous flush to the backend.
    ///
    /// An intermediate flush leaves the frame open; the next flush preserves
    /// the render target instead of clearing it. An end-of-frame flush closes
    /// the frame. Per-flush state is reset even if the backend fails.
    pub fn flush(&mut self, flush_type: FlushType) -> Result<()> {
        let Some(frame) = self.frame.clone() else {
            debug_assert!(false, "flush called outside of a frame");
            return Ok(());
        };

        if self.tess_vertex_count > 0 {
            self.push_end_of_contours_marker();
        }

        let usage = self.flush_usage();
        let simple_gradient_count = self.gradients.simple_count();
        let complex_gradient_count = self.gradients.complex_count();
        let tess_data_height = rows_for(self.tess_vertex_count as usize, TESS_TEXTURE_WIDTH as usize);

        let uniforms = FlushUniforms::new(
            complex_gradient_count as u32,
            tess_data_height as u32,
            frame.render_target_width,
            frame.render_target_height,
            self.gradient_texture_height as u32,
            self.platform_features.path_id_granularity,
            self.platform_features.viewport_flips(),
        );
        if !self
            .cached_flush_uniforms
            .is_some_and(|cached| cached.bitwise_eq(&uniforms))
        {
            self.rings.flush_uniforms.ensure_mapped();
            self.rings.flush_uniforms.emplace_back(uniforms);
            self.cached_flush_uniforms = Some(uniforms);
        }

        self.rings.submit_all();

        let load_action = if self.is_first_flush_of_frame {
            frame.load_action
        } else {
            LoadAction::PreserveRenderTarget
        };
        let desc = FlushDescriptor {
            flush_type,
            load_action,
            clear_color: frame.clear_color,
            render_target_width: frame.render_target_width,
            render_target_height: frame.render_target_height,
            complex_grad_span_count: usage.max_complex_gradient_spans,
            complex_grad_rows_top: self.simple_gradient_rows,
            complex_grad_rows_height: complex_gradient_count,
            simple_gradient_count,
            simple_grad_texels_width: simple_gradient_count
                .min(GRAD_TEXTURE_WIDTH_IN_SIMPLE_RAMPS as usize)
                * 2,
            simple_grad_texels_height: rows_for(
                simple_gradient_count,
                GRAD_TEXTURE_WIDTH_IN_SIMPLE_RAMPS as usize,
            ),
            tess_vertex_span_count: usage.max_tessellation_spans,
            tess_data_height,
            path_count: usage.max_path_id,
            contour_count: usage.max_contour_id,
            triangle_vertex_count: usage.max_triangle_vertices,
            image_draw_count: usage.max_image_draw_uniforms,
            combined_shader_features: self.combined_shader_features,
            wireframe: frame.wireframe,
            draw_list: &self.draw_list,
            draws: self.draws.as_slice(),
            buffers: self.rings.buffers(),
        };
        log::trace!(
            "flush ({flush_type:?}): {} paths, {} contours, {} tessellation spans, {} batches",
            desc.path_count,
            desc.contour_count,
            desc.tess_vertex_span_count,
            desc.draw_list.len(),
        );
        let result = self.backend.flush(&desc);

        // Demand that was refused counts as usage, so the resource grows past it.
        let mut flush_usage = usage;
        flush_usage.accumulate_max(&self.rejected_demand);
        self.frame_usage = self.frame_usage + flush_usage;
        match flush_type {
            FlushType::Intermediate => {
                self.grow_after_intermediate_flush();
                self.is_first_flush_of_frame = false;
            }
            FlushType::EndOfFrame => {
                let frame_usage = std::mem::take(&mut self.frame_usage);
                self.max_recent_usage.accumulate_max(&frame_usage);
                self.frame = None;
            }
        }
        self.reset_flush_state();
        result
    }

    /// Usage accumulated over the flushes of the current frame.
    pub fn frame_usage(&self) -> &GpuResourceLimits {
        &self.frame_usage
    }
}
