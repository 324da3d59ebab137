// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The contract between the render context and a graphics API backend.

use std::any::Any;
use std::fmt::Debug;

use peniko::Color;
use pls_encoding::{DrawType, FlushType, LoadAction, ShaderFeatures, ViewportFlips};

use crate::arena::DrawId;
use crate::buffer_ring::{BufferRingImpl, TexelLayout};
use crate::draw::Draw;
use crate::Result;

/// A texture an image paint or image draw samples from.
pub trait ImageTexture: Debug + Send + Sync + Any {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn as_any(&self) -> &dyn Any;
}

/// A GPU buffer of mesh data (vertices, texture coordinates or indices).
pub trait RenderBuffer: Debug + Send + Sync + Any {
    fn size_in_bytes(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
}

/// Capabilities and quirks of a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlatformFeatures {
    /// Path IDs are spaced this far apart when the backend stores them in
    /// reduced-precision coverage planes.
    pub path_id_granularity: u32,
    /// Offscreen render passes (gradients, tessellation) have Y pointing down.
    pub invert_offscreen_y: bool,
    /// The on-screen render target has Y pointing up.
    pub uninvert_on_screen_y: bool,
    pub frag_coord_bottom_up: bool,
    /// Image paints can sample any texture without rebinding, so image draws
    /// may be merged freely.
    pub supports_bindless_textures: bool,
    pub avoid_flat_varyings: bool,
}

impl Default for PlatformFeatures {
    fn default() -> Self {
        Self {
            path_id_granularity: 1,
            invert_offscreen_y: false,
            uninvert_on_screen_y: false,
            frag_coord_bottom_up: false,
            supports_bindless_textures: false,
            avoid_flat_varyings: false,
        }
    }
}

impl PlatformFeatures {
    pub fn viewport_flips(&self) -> ViewportFlips {
        ViewportFlips {
            invert_offscreen_y: self.invert_offscreen_y,
            uninvert_on_screen_y: self.uninvert_on_screen_y,
        }
    }
}

/// One GPU draw call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawBatch {
    pub draw_type: DrawType,
    /// First patch instance, triangle vertex, image uniform block, or 0.
    pub base_element: u32,
    /// Patch instances, triangle vertices, or mesh indices.
    pub element_count: u32,
    /// Union of the shader features of every draw merged into the batch.
    pub shader_features: ShaderFeatures,
    /// The draw owning the image texture and mesh buffers this batch binds.
    pub image_draw: Option<DrawId>,
    /// Index of this batch's block in the image draw uniform ring.
    pub image_draw_data_offset: u32,
}

/// The rings a flush reads from.
#[derive(Clone, Copy)]
pub struct FlushBuffers<'a> {
    pub path_texels: Option<&'a dyn BufferRingImpl>,
    pub contour_texels: Option<&'a dyn BufferRingImpl>,
    pub simple_gradient_texels: Option<&'a dyn BufferRingImpl>,
    pub gradient_spans: Option<&'a dyn BufferRingImpl>,
    pub tessellation_spans: Option<&'a dyn BufferRingImpl>,
    pub triangle_vertices: Option<&'a dyn BufferRingImpl>,
    pub flush_uniforms: Option<&'a dyn BufferRingImpl>,
    pub image_draw_uniforms: Option<&'a dyn BufferRingImpl>,
}

/// Everything a backend needs to execute one flush.
pub struct FlushDescriptor<'a> {
    pub flush_type: FlushType,
    pub load_action: LoadAction,
    pub clear_color: Color,
    pub render_target_width: u32,
    pub render_target_height: u32,
    /// Number of [`GradientSpan`](pls_encoding::GradientSpan)s to draw into
    /// the complex gradient rows.
    pub complex_grad_span_count: usize,
    /// First row of the gradient texture holding complex ramps.
    pub complex_grad_rows_top: usize,
    pub complex_grad_rows_height: usize,
    pub simple_gradient_count: usize,
    /// Extent of the simple ramps written to the gradient texture.
    pub simple_grad_texels_width: usize,
    pub simple_grad_texels_height: usize,
    pub tess_vertex_span_count: usize,
    /// Rows of the tessellation texture to render.
    pub tess_data_height: usize,
    pub path_count: usize,
    pub contour_count: usize,
    pub triangle_vertex_count: usize,
    pub image_draw_count: usize,
    pub combined_shader_features: ShaderFeatures,
    pub wireframe: bool,
    pub draw_list: &'a [DrawBatch],
    /// The draws referenced by [`DrawBatch::image_draw`].
    pub draws: &'a [Draw],
    pub buffers: FlushBuffers<'a>,
}

impl<'a> FlushDescriptor<'a> {
    pub fn has_triangle_vertices(&self) -> bool {
        self.triangle_vertex_count > 0
    }

    pub fn image_draw(&self, batch: &DrawBatch) -> Option<&'a Draw> {
        batch.image_draw.and_then(|id| self.draws.get(id.index()))
    }
}

/// A graphics API backend.
///
/// Backends own the GPU objects; the render context decides what goes into
/// them and when.
pub trait RenderContextImpl {
    fn platform_features(&self) -> PlatformFeatures;

    fn make_vertex_buffer_ring(
        &mut self,
        capacity: usize,
        item_size_in_bytes: usize,
    ) -> Box<dyn BufferRingImpl>;

    fn make_uniform_buffer_ring(
        &mut self,
        capacity: usize,
        item_size_in_bytes: usize,
    ) -> Box<dyn BufferRingImpl>;

    fn make_texel_buffer_ring(&mut self, layout: TexelLayout) -> Box<dyn BufferRingImpl>;

    /// (Re)allocates the render target tessellation is drawn into, which is
    /// [`TESS_TEXTURE_WIDTH`](pls_encoding::limits::TESS_TEXTURE_WIDTH) wide.
    fn allocate_tessellation_texture(&mut self, height: u32);

    /// Called once at the start of every frame, before any ring is mapped.
    fn prepare_to_map_buffers(&mut self) {}

    fn flush(&mut self, desc: &FlushDescriptor<'_>) -> Result<()>;
}
