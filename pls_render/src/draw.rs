// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draws: the unit of work pushed into a render context.
//!
//! A draw is counted, reserved and pushed as part of a batch, then kept in
//! the flush's arena until the backend has executed it so the resources it
//! references (gradients, textures, mesh buffers) stay alive.

mod image;
mod path;

use std::sync::Arc;

use pls_encoding::{PlsBlendMode, TessVertexCounter};

pub use image::{ImageMeshDraw, ImageRectDraw, MeshBuffers};
pub use path::{PathDraw, PathStyle};

use crate::arena::DrawId;
use crate::backend::{ImageTexture, RenderContextImpl};
use crate::context::{RenderContext, ResourceCounters};
use crate::paint::Gradient;

#[derive(Clone, Debug)]
pub enum Draw {
    MidpointFanPath(PathDraw),
    InteriorTriangulation(PathDraw),
    ImageRect(ImageRectDraw),
    ImageMesh(ImageMeshDraw),
}

impl Draw {
    pub fn clip_id(&self) -> u32 {
        match self {
            Self::MidpointFanPath(draw) | Self::InteriorTriangulation(draw) => draw.clip_id(),
            Self::ImageRect(draw) => draw.clip_id(),
            Self::ImageMesh(draw) => draw.clip_id(),
        }
    }

    pub fn blend_mode(&self) -> PlsBlendMode {
        match self {
            Self::MidpointFanPath(draw) | Self::InteriorTriangulation(draw) => draw.blend_mode(),
            Self::ImageRect(draw) => draw.blend_mode(),
            Self::ImageMesh(draw) => draw.blend_mode(),
        }
    }

    /// The texture this draw samples, if any. `None` after the flush that
    /// executed it.
    pub fn image_texture(&self) -> Option<&Arc<dyn ImageTexture>> {
        match self {
            Self::MidpointFanPath(draw) | Self::InteriorTriangulation(draw) => {
                draw.image_texture()
            }
            Self::ImageRect(draw) => draw.texture(),
            Self::ImageMesh(draw) => draw.texture(),
        }
    }

    /// The gradient whose color ramp this draw needs, if any.
    pub fn gradient(&self) -> Option<&Gradient> {
        match self {
            Self::MidpointFanPath(draw) | Self::InteriorTriangulation(draw) => draw.gradient(),
            Self::ImageRect(_) | Self::ImageMesh(_) => None,
        }
    }

    pub fn mesh_buffers(&self) -> Option<&MeshBuffers> {
        match self {
            Self::ImageMesh(draw) => draw.buffers(),
            _ => None,
        }
    }

    /// Adds this draw's needs to `counters`. Paths also record the padding
    /// that will align them to their patch size.
    pub fn count_resources(
        &mut self,
        counters: &mut ResourceCounters,
        tess_counter: &mut TessVertexCounter,
    ) {
        match self {
            Self::MidpointFanPath(draw) | Self::InteriorTriangulation(draw) => {
                draw.count_resources(counters, tess_counter);
            }
            Self::ImageRect(draw) => draw.count_resources(counters),
            Self::ImageMesh(draw) => draw.count_resources(counters),
        }
    }

    /// Writes this draw's color ramp, if it has one. False if the gradient
    /// texture is full, which cannot happen once the batch's ramps have been
    /// reserved.
    pub(crate) fn push_gradient_if_needed<B: RenderContextImpl>(
        &mut self,
        context: &mut RenderContext<B>,
    ) -> bool {
        match self {
            Self::MidpointFanPath(draw) | Self::InteriorTriangulation(draw) => {
                draw.push_gradient_if_needed(context)
            }
            Self::ImageRect(_) | Self::ImageMesh(_) => true,
        }
    }

    pub(crate) fn push_to_render_context<B: RenderContextImpl>(
        &self,
        context: &mut RenderContext<B>,
        id: DrawId,
    ) {
        match self {
            Self::MidpointFanPath(draw) | Self::InteriorTriangulation(draw) => {
                draw.push_to_render_context(context, id);
            }
            Self::ImageRect(draw) => draw.push_to_render_context(context, id),
            Self::ImageMesh(draw) => draw.push_to_render_context(context, id),
        }
    }

    /// Drops the references that kept paints, textures and buffers alive for
    /// the flush.
    pub fn release_refs(&mut self) {
        match self {
            Self::MidpointFanPath(draw) | Self::InteriorTriangulation(draw) => draw.release_refs(),
            Self::ImageRect(draw) => draw.release_refs(),
            Self::ImageMesh(draw) => draw.release_refs(),
        }
    }
}
