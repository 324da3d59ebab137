// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use peniko::kurbo::{Affine, Point, Vec2};
use peniko::Color;
use pls_encoding::limits::{max_path_id, TESS_TEXTURE_WIDTH};
use pls_encoding::math::{affine_to_f32, point_to_f32};
use pls_encoding::{
    contour_flags, tessellation_span_rows, ContourData, DrawType, FillRule, FlushUniforms,
    GpuResourceLimits, GradientSpan, ImageDrawUniforms, LoadAction, PaintData, PaintType,
    PatchType, PathData, PlsBlendMode, ShaderFeatures, TessVertexCounter, TessVertexSpan,
    TriangleVertex, TwoTexelRamp, INVALID_CONTOUR_ID,
};

use crate::arena::{DrawId, PerFlushArena};
use crate::backend::{DrawBatch, FlushBuffers, ImageTexture, PlatformFeatures, RenderContextImpl};
use crate::buffer_ring::BufferRing;
use crate::draw::Draw;
use crate::gradient_cache::GradientCache;
use crate::{Error, Result};

/// Per-frame options passed to [`RenderContext::begin_frame`].
#[derive(Clone, Debug)]
pub struct FrameDescriptor {
    pub render_target_width: u32,
    pub render_target_height: u32,
    /// How the first flush of the frame treats the render target.
    pub load_action: LoadAction,
    pub clear_color: Color,
    /// Testing: draw patch edges only.
    pub wireframe: bool,
    /// Testing: skip every fill.
    pub fills_disabled: bool,
    /// Testing: skip every stroke.
    pub strokes_disabled: bool,
}

impl FrameDescriptor {
    pub fn new(render_target_width: u32, render_target_height: u32) -> Self {
        Self {
            render_target_width,
            render_target_height,
            load_action: LoadAction::Clear,
            clear_color: Color::TRANSPARENT,
            wireframe: false,
            fills_disabled: false,
            strokes_disabled: false,
        }
    }
}

/// Resources needed by a group of draws, counted before any of them is
/// pushed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounters {
    pub path_count: usize,
    pub contour_count: usize,
    /// Number of [`push_cubic`](RenderContext::push_cubic) calls.
    pub curve_count: usize,
    /// Tessellation vertices, including patch alignment padding.
    pub tess_vertex_count: usize,
    pub triangle_vertex_count: usize,
    pub image_draw_count: usize,
}

/// Parameters of [`RenderContext::push_path`].
#[derive(Clone, Copy, Debug)]
pub struct PathParams {
    pub patch_type: PatchType,
    pub matrix: Affine,
    /// 0 for fills.
    pub stroke_radius: f32,
    pub fill_rule: FillRule,
    pub paint_type: PaintType,
    pub clip_id: u32,
    pub blend_mode: PlsBlendMode,
    pub paint_data: PaintData,
    /// Tessellation vertices of the path's contours, a multiple of the patch
    /// span.
    pub tess_vertex_count: u32,
    /// Padding emitted before the path so it begins on a patch boundary.
    pub padding_vertex_count: u32,
}

/// One triangle of an interior triangulation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub pts: [Point; 3],
    /// Signed winding contribution.
    pub weight: i16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PushState {
    NoPath,
    PathOpen,
    ContourOpen,
}

/// Every ring the render context writes into.
#[derive(Default)]
pub(crate) struct Rings {
    pub(crate) path: BufferRing<PathData>,
    pub(crate) contour: BufferRing<ContourData>,
    pub(crate) simple_gradients: BufferRing<TwoTexelRamp>,
    pub(crate) gradient_spans: BufferRing<GradientSpan>,
    pub(crate) tess_spans: BufferRing<TessVertexSpan>,
    pub(crate) triangles: BufferRing<TriangleVertex>,
    pub(crate) flush_uniforms: BufferRing<FlushUniforms>,
    pub(crate) image_draw_uniforms: BufferRing<ImageDrawUniforms>,
}

impl Rings {
    pub(crate) fn any_mapped(&self) -> bool {
        self.path.mapped()
            || self.contour.mapped()
            || self.simple_gradients.mapped()
            || self.gradient_spans.mapped()
            || self.tess_spans.mapped()
            || self.triangles.mapped()
            || self.flush_uniforms.mapped()
            || self.image_draw_uniforms.mapped()
    }

    pub(crate) fn submit_all(&mut self) {
        self.path.submit();
        self.contour.submit();
        self.simple_gradients.submit();
        self.gradient_spans.submit();
        self.tess_spans.submit();
        self.triangles.submit();
        self.flush_uniforms.submit();
        self.image_draw_uniforms.submit();
    }

    pub(crate) fn buffers(&self) -> FlushBuffers<'_> {
        FlushBuffers {
            path_texels: self.path.ring(),
            contour_texels: self.contour.ring(),
            simple_gradient_texels: self.simple_gradients.ring(),
            gradient_spans: self.gradient_spans.ring(),
            tessellation_spans: self.tess_spans.ring(),
            triangle_vertices: self.triangles.ring(),
            flush_uniforms: self.flush_uniforms.ring(),
            image_draw_uniforms: self.image_draw_uniforms.ring(),
        }
    }
}

/// Accumulates draws into GPU buffers and hands them to a backend in
/// flushes.
///
/// A frame is `begin_frame`, any number of pushes, then
/// `flush(FlushType::EndOfFrame)`. When a push reports that it does not fit,
/// the caller issues an intermediate flush and pushes again.
pub struct RenderContext<B> {
    pub(crate) backend: B,
    pub(crate) platform_features: PlatformFeatures,
    pub(crate) max_path_id: u32,

    pub(crate) rings: Rings,

    // Resource accounting.
    pub(crate) current_limits: GpuResourceLimits,
    pub(crate) frame_usage: GpuResourceLimits,
    pub(crate) max_recent_usage: GpuResourceLimits,
    /// Largest demand a reservation was refused for this flush.
    pub(crate) rejected_demand: GpuResourceLimits,
    pub(crate) simple_gradient_rows: usize,
    pub(crate) gradient_texture_height: usize,
    pub(crate) tess_texture_height: usize,

    // Frame state.
    pub(crate) frame: Option<FrameDescriptor>,
    pub(crate) is_first_flush_of_frame: bool,
    pub(crate) cached_flush_uniforms: Option<FlushUniforms>,

    // Per-flush state.
    pub(crate) current_path_id: u32,
    pub(crate) current_contour_id: u32,
    pub(crate) tess_vertex_count: u32,
    push_state: PushState,
    current_path_is_stroke: bool,
    current_path_tess_end: u32,
    current_contour_padding: u32,
    is_first_curve_of_contour: bool,
    pub(crate) gradients: GradientCache,
    pub(crate) last_generated_clip_id: u32,
    pub(crate) clip_content_id: u32,
    pub(crate) draw_list: Vec<DrawBatch>,
    pub(crate) combined_shader_features: ShaderFeatures,
    pub(crate) draws: PerFlushArena<Draw>,
}

impl<B: RenderContextImpl> RenderContext<B> {
    /// Creates a render context with every resource at its minimum size.
    pub fn new(backend: B) -> Self {
        let platform_features = backend.platform_features();
        let granularity = platform_features.path_id_granularity.max(1);
        let mut context = Self {
            backend,
            platform_features,
            max_path_id: max_path_id(granularity),
            rings: Rings::default(),
            current_limits: GpuResourceLimits::default(),
            frame_usage: GpuResourceLimits::default(),
            max_recent_usage: GpuResourceLimits::default(),
            rejected_demand: GpuResourceLimits::default(),
            simple_gradient_rows: 0,
            gradient_texture_height: 0,
            tess_texture_height: 0,
            frame: None,
            is_first_flush_of_frame: true,
            cached_flush_uniforms: None,
            current_path_id: 0,
            current_contour_id: 0,
            tess_vertex_count: 0,
            push_state: PushState::NoPath,
            current_path_is_stroke: false,
            current_path_tess_end: 0,
            current_contour_padding: 0,
            is_first_curve_of_contour: false,
            gradients: GradientCache::default(),
            last_generated_clip_id: 0,
            clip_content_id: 0,
            draw_list: Vec::new(),
            combined_shader_features: ShaderFeatures::NONE,
            draws: PerFlushArena::default(),
        };
        let ring = context
            .backend
            .make_uniform_buffer_ring(1, std::mem::size_of::<FlushUniforms>());
        context.rings.flush_uniforms.reset(ring);
        context.reset_gpu_resources();
        context
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn platform_features(&self) -> &PlatformFeatures {
        &self.platform_features
    }

    /// Largest path (and clip) ID a single flush can use.
    pub fn max_path_id(&self) -> u32 {
        self.max_path_id
    }

    /// Current capacity of every GPU resource.
    pub fn resource_limits(&self) -> &GpuResourceLimits {
        &self.current_limits
    }

    pub fn frame_descriptor(&self) -> Option<&FrameDescriptor> {
        self.frame.as_ref()
    }

    pub fn begin_frame(&mut self, frame: FrameDescriptor) -> Result<()> {
        debug_assert!(self.frame.is_none(), "begin_frame called twice");
        if frame.render_target_width == 0 || frame.render_target_height == 0 {
            return Err(Error::InvalidRenderTarget {
                width: frame.render_target_width,
                height: frame.render_target_height,
            });
        }
        // Grow toward the high-water mark of recent frames, with headroom.
        let recent = self.max_recent_usage;
        self.grow_exceeded_gpu_resources(&recent, pls_encoding::limits::GPU_RESOURCE_PADDING);
        self.backend.prepare_to_map_buffers();
        self.frame = Some(frame);
        self.is_first_flush_of_frame = true;
        Ok(())
    }

    /// Returns a new clip ID in `1..=max_path_id`, or `None` once every ID has
    /// been handed out this flush.
    pub fn generate_clip_id(&mut self) -> Option<u32> {
        debug_assert!(self.frame.is_some());
        if self.last_generated_clip_id < self.max_path_id {
            self.last_generated_clip_id += 1;
            Some(self.last_generated_clip_id)
        } else {
            None
        }
    }

    /// ID of the clip whose coverage is currently in the clip buffer, or 0.
    pub fn clip_content_id(&self) -> u32 {
        self.clip_content_id
    }

    pub fn set_clip_content_id(&mut self, clip_id: u32) {
        self.clip_content_id = clip_id;
    }

    /// Number of tessellation vertices written so far this flush.
    pub fn tess_vertex_count(&self) -> u32 {
        self.tess_vertex_count
    }

    /// How much of each resource this flush has consumed so far.
    pub(crate) fn flush_usage(&self) -> GpuResourceLimits {
        GpuResourceLimits {
            max_path_id: self.current_path_id as usize,
            max_contour_id: self.current_contour_id as usize,
            max_simple_gradients: self.gradients.simple_count(),
            max_complex_gradients: self.gradients.complex_count(),
            max_complex_gradient_spans: self.rings.gradient_spans.items_written(),
            max_tessellation_spans: self.rings.tess_spans.items_written(),
            max_tessellation_vertices: self.tess_vertex_count as usize,
            max_triangle_vertices: self.rings.triangles.items_written(),
            max_image_draw_uniforms: self.rings.image_draw_uniforms.items_written(),
        }
    }

    /// Checks `needed` against the current allocation.
    ///
    /// If it does not fit and nothing has been mapped this flush, the
    /// overwhelmed resources are grown in place first. Refused demand is
    /// remembered so the next intermediate flush grows past it.
    pub(crate) fn ensure_capacity(&mut self, needed: &GpuResourceLimits) -> bool {
        if !needed.exceeds(&self.current_limits) {
            return true;
        }
        if !self.rings.any_mapped() {
            self.grow_exceeded_gpu_resources(
                needed,
                pls_encoding::limits::GPU_RESOURCE_INTERMEDIATE_GROWTH_FACTOR,
            );
            if !needed.exceeds(&self.current_limits) {
                return true;
            }
        }
        self.rejected_demand.accumulate_max(needed);
        false
    }

    /// Reserves room for a group of draws and maps the rings they write.
    ///
    /// Returns false if they do not fit; nothing is written in that case and
    /// the caller is expected to flush and try again.
    pub fn reserve_path_data(&mut self, counters: &ResourceCounters) -> bool {
        debug_assert!(self.frame.is_some());
        // +1 for the end-of-flush marker vertex.
        let tess_vertices = self.tess_vertex_count as usize + counters.tess_vertex_count + 1;
        // Each row boundary the vertices cross adds one span, however many
        // rows a single span covers. Every path may also emit a padding span.
        let row_breaks = tess_vertices / TESS_TEXTURE_WIDTH as usize + 1;
        let usage = self.flush_usage();
        let needed = GpuResourceLimits {
            max_path_id: usage.max_path_id + counters.path_count,
            max_contour_id: usage.max_contour_id + counters.contour_count,
            max_tessellation_spans: usage.max_tessellation_spans
                + counters.curve_count
                + counters.path_count
                + row_breaks
                + 1,
            max_tessellation_vertices: tess_vertices,
            max_triangle_vertices: usage.max_triangle_vertices + counters.triangle_vertex_count,
            max_image_draw_uniforms: usage.max_image_draw_uniforms + counters.image_draw_count,
            ..usage
        };
        if needed.max_path_id > self.max_path_id as usize || !self.ensure_capacity(&needed) {
            self.rejected_demand.accumulate_max(&needed);
            return false;
        }
        if counters.path_count > 0 {
            self.rings.path.ensure_mapped();
            self.rings.contour.ensure_mapped();
            self.rings.tess_spans.ensure_mapped();
        }
        if counters.triangle_vertex_count > 0 {
            self.rings.triangles.ensure_mapped();
        }
        if counters.image_draw_count > 0 {
            self.rings.image_draw_uniforms.ensure_mapped();
        }
        true
    }

    /// Counts, reserves and pushes a group of draws that must land in the
    /// same flush (e.g. a draw and the clip updates it depends on).
    ///
    /// On failure the draws are handed back untouched.
    pub fn push_draw_batch(&mut self, mut draws: Vec<Draw>) -> std::result::Result<(), Vec<Draw>> {
        let mut counters = ResourceCounters::default();
        let mut tess_counter = TessVertexCounter::new(self.tess_vertex_count);
        for draw in &mut draws {
            draw.count_resources(&mut counters, &mut tess_counter);
        }
        counters.tess_vertex_count = (tess_counter.running_total() - self.tess_vertex_count) as usize;
        if !self.reserve_gradients(draws.iter().filter_map(Draw::gradient))
            || !self.reserve_path_data(&counters)
        {
            return Err(draws);
        }
        for draw in &mut draws {
            if !draw.push_gradient_if_needed(self) {
                return Err(draws);
            }
        }
        for draw in draws {
            let id = self.draws.next_id();
            draw.push_to_render_context(self, id);
            self.draws.alloc(draw);
        }
        Ok(())
    }

    /// Begins a path: writes its `PathData` and the draw batch entry that
    /// will render its patches.
    ///
    /// `image` is the draw that owns the path's image texture, if the path
    /// has an image paint.
    pub fn push_path(&mut self, path: &PathParams, image: Option<(DrawId, &Arc<dyn ImageTexture>)>) {
        debug_assert!(self.frame.is_some());
        debug_assert_eq!(self.tess_vertex_count, self.current_path_tess_end);
        debug_assert!(self.rings.path.has_room_for(1));
        debug_assert!((self.current_path_id as usize) < self.current_limits.max_path_id);
        if path.padding_vertex_count > 0 {
            self.push_padding_vertices(path.padding_vertex_count);
        }
        let span = path.patch_type.segment_span();
        debug_assert_eq!(self.tess_vertex_count % span, 0);
        debug_assert_eq!(path.tess_vertex_count % span, 0);

        self.rings.path.emplace_back(PathData::new(
            affine_to_f32(&path.matrix),
            path.stroke_radius,
            path.fill_rule,
            path.paint_type,
            path.clip_id,
            path.blend_mode,
            path.paint_data,
        ));
        self.current_path_id += 1;

        let draw_type = match path.patch_type {
            PatchType::MidpointFan => DrawType::MidpointFanPatches,
            PatchType::OuterCurves => DrawType::OuterCurvePatches,
        };
        let features = path_shader_features(path);
        self.push_draw(
            draw_type,
            self.tess_vertex_count / span,
            path.tess_vertex_count / span,
            features,
            image,
            0,
        );
        self.current_path_is_stroke = path.stroke_radius != 0.0;
        self.current_path_tess_end = self.tess_vertex_count + path.tess_vertex_count;
        self.push_state = PushState::PathOpen;
    }

    /// Begins a contour of the current path.
    ///
    /// `midpoint` is the fan center of a fill; for strokes only `closed`
    /// matters. `padding_vertex_count` is emitted with the contour's first
    /// curve so the contour ends on a patch boundary.
    pub fn push_contour(&mut self, midpoint: Point, closed: bool, padding_vertex_count: u32) {
        debug_assert!(self.push_state != PushState::NoPath);
        debug_assert!(self.rings.contour.has_room_for(1));
        debug_assert!((self.current_contour_id as usize) < self.current_limits.max_contour_id);
        let midpoint = if self.current_path_is_stroke {
            [if closed { 1.0 } else { 0.0 }, 0.0]
        } else {
            point_to_f32(midpoint)
        };
        self.rings.contour.emplace_back(ContourData {
            midpoint,
            path_id: self.current_path_id,
            vertex_index0: self.tess_vertex_count,
        });
        self.current_contour_id += 1;
        self.current_contour_padding = padding_vertex_count;
        self.is_first_curve_of_contour = true;
        self.push_state = PushState::ContourOpen;
    }

    /// Appends one cubic of the current contour.
    ///
    /// Lines are cubics with their control points on the line. The cubic
    /// occupies `padding + parametric + polar + join - 1` tessellation
    /// vertices, where the padding is the contour's and only applies to its
    /// first curve.
    pub fn push_cubic(
        &mut self,
        pts: &[Point; 4],
        join_tangent: Vec2,
        additional_contour_flags: u32,
        parametric_segment_count: u32,
        polar_segment_count: u32,
        join_segment_count: u32,
    ) {
        debug_assert_eq!(self.push_state, PushState::ContourOpen);
        debug_assert!(parametric_segment_count + polar_segment_count + join_segment_count >= 1);
        let padding = std::mem::take(&mut self.current_contour_padding);
        let mut flags = self.current_contour_id | additional_contour_flags;
        if std::mem::take(&mut self.is_first_curve_of_contour) {
            flags |= contour_flags::FIRST_VERTEX_OF_CONTOUR;
        }
        let total_vertex_count =
            padding + parametric_segment_count + polar_segment_count + join_segment_count - 1;
        self.push_tessellation_spans(
            pts.map(point_to_f32),
            [join_tangent.x as f32, join_tangent.y as f32],
            total_vertex_count,
            parametric_segment_count,
            polar_segment_count,
            join_segment_count,
            flags,
        );
        debug_assert!(self.tess_vertex_count <= self.current_path_tess_end);
    }

    /// Writes the interior triangles of the current path.
    pub fn push_interior_triangulation(&mut self, triangles: &[Triangle]) {
        debug_assert!(self.push_state != PushState::NoPath);
        debug_assert!(self.rings.triangles.has_room_for(triangles.len() * 3));
        if triangles.is_empty() {
            return;
        }
        let base_vertex = self.rings.triangles.items_written() as u32;
        let path_id = self.current_path_id as u16;
        for triangle in triangles {
            for pt in triangle.pts {
                self.rings.triangles.emplace_back(TriangleVertex::new(
                    point_to_f32(pt),
                    triangle.weight,
                    path_id,
                ));
            }
        }
        // The triangles belong to the path just pushed; reuse its features.
        let features = self
            .draw_list
            .last()
            .map_or(ShaderFeatures::NONE, |batch| batch.shader_features);
        self.push_draw(
            DrawType::InteriorTriangulation,
            base_vertex,
            triangles.len() as u32 * 3,
            features,
            None,
            0,
        );
    }

    /// Writes the uniforms of an image rect and its draw batch.
    pub fn push_image_rect(
        &mut self,
        matrix: &Affine,
        opacity: f32,
        clip_id: u32,
        blend_mode: PlsBlendMode,
        image: (DrawId, &Arc<dyn ImageTexture>),
    ) {
        let offset = self.push_image_draw_uniforms(matrix, opacity, clip_id, blend_mode);
        let features = image_shader_features(clip_id, blend_mode);
        self.push_draw(DrawType::ImageRect, 0, 1, features, Some(image), offset);
    }

    /// Writes the uniforms of an image mesh and its draw batch.
    #[allow(clippy::too_many_arguments)]
    pub fn push_image_mesh(
        &mut self,
        matrix: &Affine,
        opacity: f32,
        clip_id: u32,
        blend_mode: PlsBlendMode,
        index_count: u32,
        image: (DrawId, &Arc<dyn ImageTexture>),
    ) {
        let offset = self.push_image_draw_uniforms(matrix, opacity, clip_id, blend_mode);
        let features = image_shader_features(clip_id, blend_mode);
        self.push_draw(DrawType::ImageMesh, 0, index_count, features, Some(image), offset);
    }

    fn push_image_draw_uniforms(
        &mut self,
        matrix: &Affine,
        opacity: f32,
        clip_id: u32,
        blend_mode: PlsBlendMode,
    ) -> u32 {
        debug_assert!(self.frame.is_some());
        debug_assert!(self.rings.image_draw_uniforms.has_room_for(1));
        let offset = self.rings.image_draw_uniforms.items_written() as u32;
        self.rings.image_draw_uniforms.emplace_back(ImageDrawUniforms::new(
            affine_to_f32(matrix),
            opacity,
            clip_id,
            blend_mode,
        ));
        offset
    }

    /// Appends a draw batch, merging it into the previous one when both are
    /// contiguous patch draws of the same type with compatible textures.
    fn push_draw(
        &mut self,
        draw_type: DrawType,
        base_element: u32,
        element_count: u32,
        shader_features: ShaderFeatures,
        image: Option<(DrawId, &Arc<dyn ImageTexture>)>,
        image_draw_data_offset: u32,
    ) {
        self.combined_shader_features |= shader_features;
        let bindless = self.platform_features.supports_bindless_textures;
        if let Some(tail) = self.draw_list.last_mut() {
            let contiguous = tail.base_element + tail.element_count == base_element;
            let textures_compatible = match (tail.image_draw, image) {
                (Some(tail_id), Some((_, texture))) => {
                    bindless
                        || self
                            .draws
                            .get(tail_id)
                            .and_then(Draw::image_texture)
                            .is_some_and(|t| Arc::ptr_eq(t, texture))
                }
                _ => true,
            };
            if draw_type.is_patch()
                && tail.draw_type == draw_type
                && contiguous
                && textures_compatible
            {
                tail.element_count += element_count;
                tail.shader_features |= shader_features;
                if tail.image_draw.is_none() {
                    tail.image_draw = image.map(|(id, _)| id);
                }
                return;
            }
        }
        self.draw_list.push(DrawBatch {
            draw_type,
            base_element,
            element_count,
            shader_features,
            image_draw: image.map(|(id, _)| id),
            image_draw_data_offset,
        });
    }

    fn push_padding_vertices(&mut self, count: u32) {
        self.push_tessellation_spans(
            [[0.0; 2]; 4],
            [0.0; 2],
            count,
            0,
            0,
            1,
            INVALID_CONTOUR_ID,
        );
        self.current_path_tess_end = self.tess_vertex_count;
    }

    /// Terminates the last contour of the flush with an empty cubic.
    pub(crate) fn push_end_of_contours_marker(&mut self) {
        self.push_tessellation_spans(
            [[0.0; 2]; 4],
            [0.0; 2],
            1,
            0,
            0,
            1,
            contour_flags::FIRST_VERTEX_OF_CONTOUR | INVALID_CONTOUR_ID,
        );
        self.current_path_tess_end = self.tess_vertex_count;
    }

    #[allow(clippy::too_many_arguments)]
    fn push_tessellation_spans(
        &mut self,
        pts: [[f32; 2]; 4],
        join_tangent: [f32; 2],
        total_vertex_count: u32,
        parametric_segment_count: u32,
        polar_segment_count: u32,
        join_segment_count: u32,
        contour_id_with_flags: u32,
    ) {
        for (y, x0, x1) in tessellation_span_rows(self.tess_vertex_count, total_vertex_count) {
            debug_assert!(self.rings.tess_spans.has_room_for(1));
            self.rings.tess_spans.emplace_back(TessVertexSpan::new(
                pts,
                join_tangent,
                y as f32,
                x0,
                x1,
                parametric_segment_count,
                polar_segment_count,
                join_segment_count,
                contour_id_with_flags,
            ));
        }
        self.tess_vertex_count += total_vertex_count;
    }

    /// Clears everything that only lives for one flush.
    pub(crate) fn reset_flush_state(&mut self) {
        self.current_path_id = 0;
        self.current_contour_id = 0;
        self.tess_vertex_count = 0;
        self.push_state = PushState::NoPath;
        self.current_path_is_stroke = false;
        self.current_path_tess_end = 0;
        self.current_contour_padding = 0;
        self.is_first_curve_of_contour = false;
        self.gradients.clear();
        self.last_generated_clip_id = 0;
        self.clip_content_id = 0;
        self.draw_list.clear();
        self.combined_shader_features = ShaderFeatures::NONE;
        for draw in self.draws.iter_mut() {
            draw.release_refs();
        }
        self.draws.reset();
        self.rejected_demand = GpuResourceLimits::default();
    }
}

fn path_shader_features(path: &PathParams) -> ShaderFeatures {
    let mut features = path.blend_mode.shader_features();
    if path.clip_id != 0 || path.paint_type == PaintType::ClipUpdate {
        features |= ShaderFeatures::ENABLE_CLIPPING;
    }
    if path.paint_type == PaintType::ClipUpdate && path.paint_data.data[0] != 0 {
        features |= ShaderFeatures::ENABLE_NESTED_CLIPPING;
    }
    if path.fill_rule == FillRule::EvenOdd && path.stroke_radius == 0.0 {
        features |= ShaderFeatures::ENABLE_EVEN_ODD;
    }
    features
}

fn image_shader_features(clip_id: u32, blend_mode: PlsBlendMode) -> ShaderFeatures {
    let mut features = blend_mode.shader_features();
    if clip_id != 0 {
        features |= ShaderFeatures::ENABLE_CLIPPING;
    }
    features
}
