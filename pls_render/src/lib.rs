// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A backend-agnostic core for rendering 2D vector paths with pixel local
//! storage.
//!
//! Paths are tessellated on the GPU: the CPU only writes compact per-path,
//! per-contour and per-curve records into triple-buffered rings, and a
//! [`RenderContextImpl`] backend turns each flush of those rings into draw
//! calls.
//!
//! The main types are:
//!
//! - [`RenderContext`], which owns the rings, sizes the GPU resources behind
//!   them, and orchestrates flushes.
//! - [`Renderer`], a drawing front end that fills, strokes, clips and draws
//!   images, flushing when the context runs out of room.
//! - [`HeadlessBackend`], a backend that records every flush instead of
//!   rendering it.
//!
//! ```
//! use pls_render::kurbo::{Affine, Rect, Shape};
//! use pls_render::peniko::{Color, Fill};
//! use pls_render::{FrameDescriptor, HeadlessBackend, Paint, RenderContext, Renderer};
//! use pls_render::FlushType;
//!
//! let mut context = RenderContext::new(HeadlessBackend::default());
//! context.begin_frame(FrameDescriptor::new(800, 600))?;
//! let mut renderer = Renderer::new(&mut context);
//! let rect = Rect::new(10.0, 10.0, 50.0, 50.0).to_path(0.1);
//! renderer.fill(Fill::NonZero, Affine::IDENTITY, &Paint::new(Color::RED), &rect)?;
//! context.flush(FlushType::EndOfFrame)?;
//! assert_eq!(context.backend().flushes().len(), 1);
//! # Ok::<(), pls_render::Error>(())
//! ```

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![allow(missing_docs, reason = "We have many as-yet undocumented items.")]
#![allow(
    missing_debug_implementations,
    clippy::cast_possible_truncation,
    clippy::missing_assert_message,
    reason = "Deferred"
)]

mod arena;
mod backend;
mod buffer_ring;
mod context;
mod draw;
mod flush;
mod gradient_cache;
mod headless;
mod paint;
mod renderer;
mod resources;

use thiserror::Error;

/// Styling and composition primitives.
pub use peniko;
/// 2D geometry, with a focus on curves.
pub use peniko::kurbo;

pub use pls_encoding;
pub use pls_encoding::{FillRule, FlushType, GpuResourceLimits, LoadAction, ShaderFeatures};

pub use arena::{DrawId, PerFlushArena};
pub use backend::{
    DrawBatch, FlushBuffers, FlushDescriptor, ImageTexture, PlatformFeatures, RenderBuffer,
    RenderContextImpl,
};
pub use buffer_ring::{
    BufferRing, BufferRingImpl, BufferRingShadowImpl, Filter, Format, ShadowSubmit,
    TexelBufferRing, TexelLayout, TexelUploader, TextureIndex,
};
pub use context::{FrameDescriptor, PathParams, RenderContext, ResourceCounters, Triangle};
pub use draw::{Draw, ImageMeshDraw, ImageRectDraw, MeshBuffers, PathDraw, PathStyle};
pub use headless::{FlushRecord, HeadlessBackend, HeadlessBuffer, HeadlessTexture, SubmissionLog};
pub use paint::{Brush, Gradient, Paint};
pub use renderer::Renderer;

/// Errors that can occur while rendering.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A frame was begun with a zero-sized render target.
    #[error("Render target has invalid dimensions {width}x{height}")]
    InvalidRenderTarget { width: u32, height: u32 },
    /// The backend failed to execute a flush.
    #[error("Backend failed to execute a flush")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;
