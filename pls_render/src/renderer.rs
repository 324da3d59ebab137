// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A drawing front end over [`RenderContext`].

use std::sync::Arc;

use peniko::kurbo::{Affine, BezPath, Rect, Shape, Stroke};
use peniko::{BlendMode, Fill};
use pls_encoding::math::find_transformed_area;
use pls_encoding::{FillRule, FlushType, PlsBlendMode};

use crate::backend::{ImageTexture, RenderContextImpl};
use crate::context::{FrameDescriptor, RenderContext};
use crate::draw::{Draw, ImageMeshDraw, ImageRectDraw, MeshBuffers, PathDraw, PathStyle};
use crate::paint::{Brush, Paint};
use crate::Result;

/// Fills whose transformed bounds cover more pixels than this are drawn with
/// an interior triangulation instead of midpoint fans.
const INTERIOR_TRIANGULATION_MIN_AREA: f32 = 512.0 * 512.0;

#[derive(Clone, Debug)]
struct ClipElement {
    path: BezPath,
    transform: Affine,
    fill_rule: FillRule,
}

/// Issues fills, strokes, images and clips, flushing the render context when
/// it runs out of room.
///
/// A clip stays in effect until the matching [`pop_clip`](Self::pop_clip).
/// Clip contents are rendered lazily by the first draw that needs them.
pub struct Renderer<'a, B: RenderContextImpl> {
    context: &'a mut RenderContext<B>,
    clip_stack: Vec<ClipElement>,
    /// Clip ID of each stack element as currently rendered, innermost last.
    clip_ids: Vec<u32>,
}

impl<'a, B: RenderContextImpl> Renderer<'a, B> {
    pub fn new(context: &'a mut RenderContext<B>) -> Self {
        Self {
            context,
            clip_stack: Vec::new(),
            clip_ids: Vec::new(),
        }
    }

    pub fn context(&mut self) -> &mut RenderContext<B> {
        self.context
    }

    pub fn fill(
        &mut self,
        style: Fill,
        transform: Affine,
        paint: &Paint,
        path: &BezPath,
    ) -> Result<()> {
        if self.frame_flag(|f| f.fills_disabled) {
            return Ok(());
        }
        let fill_rule = FillRule::from(style);
        let large = find_transformed_area(&path.bounding_box(), &transform)
            > INTERIOR_TRIANGULATION_MIN_AREA;
        self.submit(|clip_id| {
            if large {
                Draw::InteriorTriangulation(PathDraw::interior_triangulation(
                    path, transform, fill_rule, paint, clip_id,
                ))
            } else {
                Draw::MidpointFanPath(PathDraw::midpoint_fan(
                    path,
                    transform,
                    &PathStyle::Fill(fill_rule),
                    paint,
                    clip_id,
                ))
            }
        })
    }

    pub fn stroke(
        &mut self,
        stroke: &Stroke,
        transform: Affine,
        paint: &Paint,
        path: &BezPath,
    ) -> Result<()> {
        if self.frame_flag(|f| f.strokes_disabled) || stroke.width <= 0.0 {
            return Ok(());
        }
        let style = PathStyle::Stroke(stroke.clone());
        self.submit(|clip_id| {
            Draw::MidpointFanPath(PathDraw::midpoint_fan(
                path, transform, &style, paint, clip_id,
            ))
        })
    }

    /// Draws `texture` at its natural size.
    ///
    /// With bindless textures the image is filled as a rectangle path with an
    /// image paint; otherwise it becomes an image rect draw.
    pub fn draw_image(
        &mut self,
        texture: &Arc<dyn ImageTexture>,
        transform: Affine,
        opacity: f32,
        blend_mode: BlendMode,
    ) -> Result<()> {
        if self.context.platform_features().supports_bindless_textures {
            let rect = Rect::new(0.0, 0.0, texture.width() as f64, texture.height() as f64);
            let paint = Paint::new(Brush::Image {
                texture: texture.clone(),
                opacity,
            })
            .with_blend_mode(blend_mode);
            return self.fill(Fill::NonZero, transform, &paint, &rect.to_path(0.1));
        }
        let blend_mode = PlsBlendMode::from_mix(blend_mode.mix);
        self.submit(|clip_id| {
            Draw::ImageRect(ImageRectDraw::new(
                texture.clone(),
                transform,
                opacity,
                clip_id,
                blend_mode,
            ))
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_image_mesh(
        &mut self,
        texture: &Arc<dyn ImageTexture>,
        buffers: &MeshBuffers,
        index_count: u32,
        transform: Affine,
        opacity: f32,
        blend_mode: BlendMode,
    ) -> Result<()> {
        let blend_mode = PlsBlendMode::from_mix(blend_mode.mix);
        self.submit(|clip_id| {
            Draw::ImageMesh(ImageMeshDraw::new(
                texture.clone(),
                buffers.clone(),
                index_count,
                transform,
                opacity,
                clip_id,
                blend_mode,
            ))
        })
    }

    /// Intersects the clip with `path`.
    pub fn push_clip(&mut self, style: Fill, transform: Affine, path: &BezPath) {
        self.clip_stack.push(ClipElement {
            path: path.clone(),
            transform,
            fill_rule: style.into(),
        });
    }

    pub fn pop_clip(&mut self) {
        if self.clip_stack.pop().is_none() {
            log::warn!("pop_clip without a matching push_clip");
        }
        self.clip_ids.truncate(self.clip_stack.len());
    }

    fn frame_flag(&self, flag: impl Fn(&FrameDescriptor) -> bool) -> bool {
        self.context.frame_descriptor().is_some_and(flag)
    }

    /// Builds the clip updates needed before a draw, and the ID the draw
    /// should be clipped against.
    ///
    /// Returns `None` if the flush ran out of clip IDs.
    fn clip_updates(&mut self) -> Option<(Vec<Draw>, u32, Vec<u32>)> {
        let Some(depth) = self.clip_stack.len().checked_sub(1) else {
            return Some((vec![], 0, vec![]));
        };
        let current = self.clip_ids.get(depth).copied().unwrap_or(0);
        if current != 0
            && self.clip_ids.len() == self.clip_stack.len()
            && self.context.clip_content_id() == current
        {
            return Some((vec![], current, self.clip_ids.clone()));
        }
        let mut draws = Vec::with_capacity(self.clip_stack.len());
        let mut ids = Vec::with_capacity(self.clip_stack.len());
        let mut outer = 0;
        for element in &self.clip_stack {
            let clip_id = self.context.generate_clip_id()?;
            draws.push(Draw::MidpointFanPath(PathDraw::clip_update(
                &element.path,
                element.transform,
                element.fill_rule,
                clip_id,
                outer,
            )));
            ids.push(clip_id);
            outer = clip_id;
        }
        Some((draws, outer, ids))
    }

    /// Pushes a draw (and the clip updates it depends on), flushing once and
    /// retrying if it does not fit. A draw that does not fit in an empty
    /// flush is dropped.
    fn submit(&mut self, mut make_draw: impl FnMut(u32) -> Draw) -> Result<()> {
        for attempt in 0..2 {
            if let Some((mut draws, clip_id, ids)) = self.clip_updates() {
                let draw = make_draw(clip_id);
                if let Draw::MidpointFanPath(path) | Draw::InteriorTriangulation(path) = &draw {
                    if path.is_empty() {
                        return Ok(());
                    }
                }
                draws.push(draw);
                if self.context.push_draw_batch(draws).is_ok() {
                    if clip_id != 0 {
                        self.context.set_clip_content_id(clip_id);
                    }
                    self.clip_ids = ids;
                    return Ok(());
                }
            }
            if attempt == 0 {
                log::debug!("render context full; flushing");
                self.context.flush(FlushType::Intermediate)?;
            }
        }
        log::warn!("dropping a draw that does not fit in an empty flush");
        Ok(())
    }
}
