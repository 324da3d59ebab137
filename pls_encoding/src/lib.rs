// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GPU data formats of the pixel local storage path renderer.
//!
//! Everything in this crate is plain data: the records the render context
//! writes into GPU buffers and textures, the constants that fix their layout,
//! the static patch geometry, and the resource limits the render context
//! allocates against. No GPU API is referenced here.

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
    clippy::cast_possible_truncation,
    clippy::missing_assert_message,
    clippy::exhaustive_enums,
    reason = "Deferred"
)]

mod draw;
mod gradient;
pub mod limits;
pub mod math;
mod patch;
mod path;
mod uniforms;

pub use draw::{shader_unique_key, DrawType, FlushType, LoadAction, PlsBlendMode, ShaderFeatures};
pub use gradient::{
    complex_ramp_span_count, complex_ramp_spans, pack_color, ColorInt, ColorRampLocation,
    GradientSpan, TwoTexelRamp,
};
pub use limits::{GpuResourceLimits, TessVertexCounter};
pub use patch::{
    generate_patch_buffer_data, PatchType, PatchVertex, FAN_MIDPOINT_VERTEX, FAN_VERTEX,
    MIDPOINT_FAN_PATCH_BASE_INDEX, MIDPOINT_FAN_PATCH_INDEX_COUNT, MIDPOINT_FAN_PATCH_SEGMENT_SPAN,
    MIDPOINT_FAN_PATCH_VERTEX_COUNT, OUTER_CURVE_PATCH_BASE_INDEX, OUTER_CURVE_PATCH_INDEX_COUNT,
    OUTER_CURVE_PATCH_SEGMENT_SPAN, OUTER_CURVE_PATCH_VERTEX_COUNT, PATCH_INDEX_BUFFER_COUNT,
    PATCH_VERTEX_BUFFER_COUNT, STROKE_VERTEX,
};
pub use path::{
    contour_flags, pack_path_params, tessellation_span_rows, ContourData, FillRule, PaintData,
    PaintType, PathData, TessVertexSpan, TriangleVertex, INVALID_CONTOUR_ID,
};
pub use uniforms::{FlushUniforms, ImageDrawUniforms, ViewportFlips};
