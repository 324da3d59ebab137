// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use peniko::kurbo::Affine;
use pls_encoding::PlsBlendMode;

use crate::arena::DrawId;
use crate::backend::{ImageTexture, RenderBuffer, RenderContextImpl};
use crate::context::{RenderContext, ResourceCounters};

/// An image drawn as a single quad, for backends without bindless textures.
#[derive(Clone, Debug)]
pub struct ImageRectDraw {
    /// Maps the unit square to device space.
    matrix: Affine,
    opacity: f32,
    clip_id: u32,
    blend_mode: PlsBlendMode,
    texture: Option<Arc<dyn ImageTexture>>,
}

impl ImageRectDraw {
    /// Draws `texture` at its natural size, transformed by `transform`.
    pub fn new(
        texture: Arc<dyn ImageTexture>,
        transform: Affine,
        opacity: f32,
        clip_id: u32,
        blend_mode: PlsBlendMode,
    ) -> Self {
        let size = Affine::scale_non_uniform(texture.width() as f64, texture.height() as f64);
        Self {
            matrix: transform * size,
            opacity,
            clip_id,
            blend_mode,
            texture: Some(texture),
        }
    }

    pub fn matrix(&self) -> Affine {
        self.matrix
    }

    pub fn clip_id(&self) -> u32 {
        self.clip_id
    }

    pub fn blend_mode(&self) -> PlsBlendMode {
        self.blend_mode
    }

    pub fn texture(&self) -> Option<&Arc<dyn ImageTexture>> {
        self.texture.as_ref()
    }

    pub(crate) fn count_resources(&self, counters: &mut ResourceCounters) {
        counters.image_draw_count += 1;
    }

    pub(crate) fn push_to_render_context<B: RenderContextImpl>(
        &self,
        context: &mut RenderContext<B>,
        id: DrawId,
    ) {
        if let Some(texture) = &self.texture {
            context.push_image_rect(
                &self.matrix,
                self.opacity,
                self.clip_id,
                self.blend_mode,
                (id, texture),
            );
        }
    }

    pub(crate) fn release_refs(&mut self) {
        self.texture = None;
    }
}

/// Buffers of an indexed, textured triangle mesh.
#[derive(Clone, Debug)]
pub struct MeshBuffers {
    pub vertices: Arc<dyn RenderBuffer>,
    pub uvs: Arc<dyn RenderBuffer>,
    pub indices: Arc<dyn RenderBuffer>,
}

/// A textured triangle mesh.
#[derive(Clone, Debug)]
pub struct ImageMeshDraw {
    matrix: Affine,
    opacity: f32,
    clip_id: u32,
    blend_mode: PlsBlendMode,
    index_count: u32,
    texture: Option<Arc<dyn ImageTexture>>,
    buffers: Option<MeshBuffers>,
}

impl ImageMeshDraw {
    pub fn new(
        texture: Arc<dyn ImageTexture>,
        buffers: MeshBuffers,
        index_count: u32,
        matrix: Affine,
        opacity: f32,
        clip_id: u32,
        blend_mode: PlsBlendMode,
    ) -> Self {
        Self {
            matrix,
            opacity,
            clip_id,
            blend_mode,
            index_count,
            texture: Some(texture),
            buffers: Some(buffers),
        }
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn clip_id(&self) -> u32 {
        self.clip_id
    }

    pub fn blend_mode(&self) -> PlsBlendMode {
        self.blend_mode
    }

    pub fn texture(&self) -> Option<&Arc<dyn ImageTexture>> {
        self.texture.as_ref()
    }

    pub fn buffers(&self) -> Option<&MeshBuffers> {
        self.buffers.as_ref()
    }

    pub(crate) fn count_resources(&self, counters: &mut ResourceCounters) {
        counters.image_draw_count += 1;
    }

    pub(crate) fn push_to_render_context<B: RenderContextImpl>(
        &self,
        context: &mut RenderContext<B>,
        id: DrawId,
    ) {
        if let Some(texture) = &self.texture {
            context.push_image_mesh(
                &self.matrix,
                self.opacity,
                self.clip_id,
                self.blend_mode,
                self.index_count,
                (id, texture),
            );
        }
    }

    pub(crate) fn release_refs(&mut self) {
        self.texture = None;
        self.buffers = None;
    }
}
