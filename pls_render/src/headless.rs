// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A backend that renders nothing and records what every flush submitted.
//!
//! Useful for tests and for inspecting the data a frame produces.

use std::any::Any;

use bytemuck::Pod;
use pls_encoding::{
    ContourData, FlushType, GradientSpan, ImageDrawUniforms, LoadAction, PathData, ShaderFeatures,
    TessVertexSpan, TriangleVertex, TwoTexelRamp,
};

use crate::backend::{
    DrawBatch, FlushDescriptor, ImageTexture, PlatformFeatures, RenderBuffer, RenderContextImpl,
};
use crate::buffer_ring::{
    BufferRingImpl, BufferRingShadowImpl, ShadowSubmit, TexelBufferRing, TexelLayout,
    TexelUploader,
};
use crate::Result;

/// Keeps a copy of the latest buffer submitted to a ring, and counts them
/// all.
///
/// A flush only reads what was submitted for it, so older submissions are
/// overwritten rather than kept.
#[derive(Debug, Default)]
pub struct SubmissionLog {
    latest: Option<(usize, Vec<u8>)>,
    count: usize,
}

impl SubmissionLog {
    /// `(buffer index, bytes)` of the latest submission.
    pub fn latest(&self) -> Option<(usize, &[u8])> {
        self.latest.as_ref().map(|(idx, bytes)| (*idx, bytes.as_slice()))
    }

    /// Number of submissions so far.
    pub fn count(&self) -> usize {
        self.count
    }

    fn record(&mut self, idx: usize, data: &[u8]) {
        let (latest_idx, bytes) = self.latest.get_or_insert_with(Default::default);
        *latest_idx = idx;
        bytes.clear();
        bytes.extend_from_slice(data);
        self.count += 1;
    }
}

impl ShadowSubmit for SubmissionLog {
    fn on_unmap_and_submit_buffer(&mut self, buffer_idx: usize, data: &[u8]) {
        self.record(buffer_idx, data);
    }
}

impl TexelUploader for SubmissionLog {
    fn submit_texels(
        &mut self,
        texture_idx: usize,
        _layout: &TexelLayout,
        _width_in_texels: usize,
        _height: usize,
        texels: &[u8],
    ) {
        self.record(texture_idx, texels);
    }
}

fn submission_log(ring: &dyn BufferRingImpl) -> Option<&SubmissionLog> {
    let any = ring.as_any();
    any.downcast_ref::<BufferRingShadowImpl<SubmissionLog>>()
        .map(BufferRingShadowImpl::submitter)
        .or_else(|| {
            any.downcast_ref::<TexelBufferRing<SubmissionLog>>()
                .map(TexelBufferRing::uploader)
        })
}

/// Decodes the first `count` items of the ring's latest submission.
fn read_back<T: Pod>(ring: Option<&dyn BufferRingImpl>, count: usize) -> Vec<T> {
    if count == 0 {
        return vec![];
    }
    let Some((_, bytes)) = ring.and_then(submission_log).and_then(SubmissionLog::latest) else {
        return vec![];
    };
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .take(count)
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

/// Everything one flush handed to the backend, decoded.
#[derive(Clone, Debug)]
pub struct FlushRecord {
    pub flush_type: FlushType,
    pub load_action: LoadAction,
    pub path_data: Vec<PathData>,
    pub contours: Vec<ContourData>,
    pub tess_spans: Vec<TessVertexSpan>,
    pub tess_data_height: usize,
    pub simple_ramps: Vec<TwoTexelRamp>,
    pub gradient_spans: Vec<GradientSpan>,
    pub complex_grad_rows_top: usize,
    pub complex_grad_rows_height: usize,
    pub triangles: Vec<TriangleVertex>,
    pub image_draw_uniforms: Vec<ImageDrawUniforms>,
    pub draw_list: Vec<DrawBatch>,
    pub combined_shader_features: ShaderFeatures,
    /// Total flush uniform uploads so far, including this flush.
    pub flush_uniform_uploads: usize,
}

/// A [`RenderContextImpl`] with CPU-only rings.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    features: PlatformFeatures,
    tess_texture_height: u32,
    ring_allocations: usize,
    flushes: Vec<FlushRecord>,
}

impl HeadlessBackend {
    pub fn new(features: PlatformFeatures) -> Self {
        Self {
            features,
            ..Default::default()
        }
    }

    pub fn flushes(&self) -> &[FlushRecord] {
        &self.flushes
    }

    pub fn last_flush(&self) -> Option<&FlushRecord> {
        self.flushes.last()
    }

    pub fn tess_texture_height(&self) -> u32 {
        self.tess_texture_height
    }

    /// Number of rings created so far, a measure of reallocation.
    pub fn ring_allocations(&self) -> usize {
        self.ring_allocations
    }
}

impl RenderContextImpl for HeadlessBackend {
    fn platform_features(&self) -> PlatformFeatures {
        self.features
    }

    fn make_vertex_buffer_ring(
        &mut self,
        capacity: usize,
        item_size_in_bytes: usize,
    ) -> Box<dyn BufferRingImpl> {
        self.ring_allocations += 1;
        Box::new(BufferRingShadowImpl::new(
            capacity,
            item_size_in_bytes,
            SubmissionLog::default(),
        ))
    }

    fn make_uniform_buffer_ring(
        &mut self,
        capacity: usize,
        item_size_in_bytes: usize,
    ) -> Box<dyn BufferRingImpl> {
        self.make_vertex_buffer_ring(capacity, item_size_in_bytes)
    }

    fn make_texel_buffer_ring(&mut self, layout: TexelLayout) -> Box<dyn BufferRingImpl> {
        self.ring_allocations += 1;
        Box::new(TexelBufferRing::new(layout, SubmissionLog::default()))
    }

    fn allocate_tessellation_texture(&mut self, height: u32) {
        self.tess_texture_height = height;
    }

    fn flush(&mut self, desc: &FlushDescriptor<'_>) -> Result<()> {
        let buffers = &desc.buffers;
        let flush_uniform_uploads = buffers
            .flush_uniforms
            .and_then(submission_log)
            .map_or(0, SubmissionLog::count);
        self.flushes.push(FlushRecord {
            flush_type: desc.flush_type,
            load_action: desc.load_action,
            path_data: read_back(buffers.path_texels, desc.path_count),
            contours: read_back(buffers.contour_texels, desc.contour_count),
            tess_spans: read_back(buffers.tessellation_spans, desc.tess_vertex_span_count),
            tess_data_height: desc.tess_data_height,
            simple_ramps: read_back(buffers.simple_gradient_texels, desc.simple_gradient_count),
            gradient_spans: read_back(buffers.gradient_spans, desc.complex_grad_span_count),
            complex_grad_rows_top: desc.complex_grad_rows_top,
            complex_grad_rows_height: desc.complex_grad_rows_height,
            triangles: read_back(buffers.triangle_vertices, desc.triangle_vertex_count),
            image_draw_uniforms: read_back(buffers.image_draw_uniforms, desc.image_draw_count),
            draw_list: desc.draw_list.to_vec(),
            combined_shader_features: desc.combined_shader_features,
            flush_uniform_uploads,
        });
        Ok(())
    }
}

/// An image texture with a size and no pixels.
#[derive(Debug)]
pub struct HeadlessTexture {
    pub width: u32,
    pub height: u32,
}

impl ImageTexture for HeadlessTexture {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A mesh buffer with a size and no contents.
#[derive(Debug)]
pub struct HeadlessBuffer {
    pub size_in_bytes: usize,
}

impl RenderBuffer for HeadlessBuffer {
    fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
