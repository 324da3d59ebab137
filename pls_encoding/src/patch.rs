// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Static vertex and index data for the instanced tessellation patches.
//!
//! Every tessellated curve is drawn as instances of one of two fixed patches.
//! Instance `n` of a patch draw reads tessellation vertices
//! `n * span..=(n + 1) * span` from the tessellation texture, and each patch
//! vertex says which of those vertices it sits on (`local_vertex_id`), how far
//! to push it along the normal (`outset`), and its coverage.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// # of tessellation segments spanned by the midpoint fan patch.
pub const MIDPOINT_FAN_PATCH_SEGMENT_SPAN: u32 = 8;
pub const MIDPOINT_FAN_PATCH_VERTEX_COUNT: u32 =
    MIDPOINT_FAN_PATCH_SEGMENT_SPAN * 4 + MIDPOINT_FAN_PATCH_SEGMENT_SPAN + 1 + 1;
pub const MIDPOINT_FAN_PATCH_INDEX_COUNT: u32 = MIDPOINT_FAN_PATCH_SEGMENT_SPAN * 6
    + (MIDPOINT_FAN_PATCH_SEGMENT_SPAN - 1) * 3
    + 3;
pub const MIDPOINT_FAN_PATCH_BASE_INDEX: u32 = 0;

/// # of tessellation segments spanned by the outer curve patch. The final
/// segment is a bowtie join with zero length and no fan triangle.
pub const OUTER_CURVE_PATCH_SEGMENT_SPAN: u32 = 17;
pub const OUTER_CURVE_PATCH_VERTEX_COUNT: u32 =
    OUTER_CURVE_PATCH_SEGMENT_SPAN * 8 + OUTER_CURVE_PATCH_SEGMENT_SPAN;
pub const OUTER_CURVE_PATCH_INDEX_COUNT: u32 =
    OUTER_CURVE_PATCH_SEGMENT_SPAN * 12 + (OUTER_CURVE_PATCH_SEGMENT_SPAN - 2) * 3;
pub const OUTER_CURVE_PATCH_BASE_INDEX: u32 = MIDPOINT_FAN_PATCH_INDEX_COUNT;

pub const PATCH_VERTEX_BUFFER_COUNT: usize =
    (MIDPOINT_FAN_PATCH_VERTEX_COUNT + OUTER_CURVE_PATCH_VERTEX_COUNT) as usize;
pub const PATCH_INDEX_BUFFER_COUNT: usize =
    (MIDPOINT_FAN_PATCH_INDEX_COUNT + OUTER_CURVE_PATCH_INDEX_COUNT) as usize;

const_assert_eq!(MIDPOINT_FAN_PATCH_VERTEX_COUNT, 42);
const_assert_eq!(MIDPOINT_FAN_PATCH_INDEX_COUNT, 72);
const_assert_eq!(OUTER_CURVE_PATCH_VERTEX_COUNT, 153);
const_assert_eq!(OUTER_CURVE_PATCH_INDEX_COUNT, 249);
// Index buffer offsets must stay 4-byte aligned.
const_assert_eq!((OUTER_CURVE_PATCH_BASE_INDEX * 2) % 4, 0);

/// Vertex roles, stored in the low 2 bits of [`PatchVertex::params`].
pub const STROKE_VERTEX: i32 = 0;
pub const FAN_VERTEX: i32 = 1;
pub const FAN_MIDPOINT_VERTEX: i32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatchType {
    MidpointFan,
    OuterCurves,
}

impl PatchType {
    pub fn segment_span(self) -> u32 {
        match self {
            Self::MidpointFan => MIDPOINT_FAN_PATCH_SEGMENT_SPAN,
            Self::OuterCurves => OUTER_CURVE_PATCH_SEGMENT_SPAN,
        }
    }

    pub fn vertex_count(self) -> u32 {
        match self {
            Self::MidpointFan => MIDPOINT_FAN_PATCH_VERTEX_COUNT,
            Self::OuterCurves => OUTER_CURVE_PATCH_VERTEX_COUNT,
        }
    }

    pub fn index_count(self) -> u32 {
        match self {
            Self::MidpointFan => MIDPOINT_FAN_PATCH_INDEX_COUNT,
            Self::OuterCurves => OUTER_CURVE_PATCH_INDEX_COUNT,
        }
    }

    pub fn base_index(self) -> u32 {
        match self {
            Self::MidpointFan => MIDPOINT_FAN_PATCH_BASE_INDEX,
            Self::OuterCurves => OUTER_CURVE_PATCH_BASE_INDEX,
        }
    }

    pub fn base_vertex(self) -> u32 {
        match self {
            Self::MidpointFan => 0,
            Self::OuterCurves => MIDPOINT_FAN_PATCH_VERTEX_COUNT,
        }
    }

    /// Number of segments covered by the patch's triangle fan.
    fn fan_segment_span(self) -> u32 {
        match self {
            Self::MidpointFan => MIDPOINT_FAN_PATCH_SEGMENT_SPAN,
            Self::OuterCurves => OUTER_CURVE_PATCH_SEGMENT_SPAN - 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PatchVertex {
    /// Which of the two tessellated vertices being connected.
    pub local_vertex_id: f32,
    /// Outset from the tessellated position, along the normal.
    pub outset: f32,
    /// 0..1 across the stroke, 1 all around for fan triangles.
    pub fill_coverage: f32,
    /// `patch_segment_span << 2 | vertex_type`.
    pub params: i32,
    // Alternate position used when the patch is mirrored, so the interior
    // diagonals line up on both versions.
    pub mirrored_vertex_id: f32,
    pub mirrored_outset: f32,
    pub mirrored_fill_coverage: f32,
    pub padding: i32,
}

const_assert_eq!(std::mem::size_of::<PatchVertex>(), 32);

impl PatchVertex {
    fn new(local_vertex_id: f32, outset: f32, fill_coverage: f32, params: i32) -> Self {
        Self {
            local_vertex_id,
            outset,
            fill_coverage,
            params,
            mirrored_vertex_id: local_vertex_id,
            mirrored_outset: outset,
            mirrored_fill_coverage: fill_coverage,
            padding: 0,
        }
    }

    fn mirrored(mut self, local_vertex_id: f32, outset: f32, fill_coverage: f32) -> Self {
        self.mirrored_vertex_id = local_vertex_id;
        self.mirrored_outset = outset;
        self.mirrored_fill_coverage = fill_coverage;
        self
    }

    pub fn vertex_type(&self) -> i32 {
        self.params & 3
    }

    pub fn patch_segment_span(&self) -> i32 {
        self.params >> 2
    }
}

fn pack_params(patch_segment_span: u32, vertex_type: i32) -> i32 {
    (patch_segment_span as i32) << 2 | vertex_type
}

const BORDER_PATTERN: [u16; 6] = [0, 1, 2, 2, 1, 3];
const NEGATIVE_BORDER_PATTERN: [u16; 6] = [0, 2, 1, 1, 2, 3];

fn generate_patch(patch_type: PatchType, vertices: &mut [PatchVertex], indices: &mut [u16]) {
    let span = patch_type.segment_span();
    let base_vertex = patch_type.base_vertex() as u16;
    let mut vertex_count = 0;

    // AA border vertices.
    let stroke_params = pack_params(span, STROKE_VERTEX);
    for i in 0..span {
        let l = i as f32;
        let r = l + 1.0;
        let quad = match patch_type {
            PatchType::OuterCurves => [
                PatchVertex::new(l, 0.0, 0.5, stroke_params).mirrored(r, 0.0, 0.5),
                PatchVertex::new(l, 1.0, 0.0, stroke_params).mirrored(l, 0.0, 0.5),
                PatchVertex::new(r, 0.0, 0.5, stroke_params).mirrored(r, 1.0, 0.0),
                PatchVertex::new(r, 1.0, 0.0, stroke_params).mirrored(l, 1.0, 0.0),
            ],
            PatchType::MidpointFan => [
                PatchVertex::new(l, -1.0, 1.0, stroke_params).mirrored(r - 1.0, -1.0, 1.0),
                PatchVertex::new(l, 1.0, 0.0, stroke_params).mirrored(l - 1.0, -1.0, 1.0),
                PatchVertex::new(r, -1.0, 1.0, stroke_params).mirrored(r - 1.0, 1.0, 0.0),
                PatchVertex::new(r, 1.0, 0.0, stroke_params).mirrored(l - 1.0, 1.0, 0.0),
            ],
        };
        vertices[vertex_count..vertex_count + 4].copy_from_slice(&quad);
        vertex_count += 4;
    }

    // Bottom (negative coverage) side of the AA border.
    if patch_type == PatchType::OuterCurves {
        for i in 0..span {
            let l = i as f32;
            let r = l + 1.0;
            let quad = [
                PatchVertex::new(l, -0.0, 0.5, stroke_params).mirrored(r, -0.0, 0.5),
                PatchVertex::new(r, -0.0, 0.5, stroke_params).mirrored(r, -1.0, 0.0),
                PatchVertex::new(l, -1.0, 0.0, stroke_params).mirrored(l, -0.0, 0.5),
                PatchVertex::new(r, -1.0, 0.0, stroke_params).mirrored(l, -1.0, 0.0),
            ];
            vertices[vertex_count..vertex_count + 4].copy_from_slice(&quad);
            vertex_count += 4;
        }
    }

    // Triangle fan vertices. On outer curves the fan skips the final bowtie
    // join segment.
    let fan_vertices_idx = vertex_count;
    let fan_span = patch_type.fan_segment_span();
    debug_assert!(fan_span.is_power_of_two());
    let fan_params = pack_params(span, FAN_VERTEX);
    for i in 0..=fan_span {
        let x = i as f32;
        vertices[vertex_count] = match patch_type {
            PatchType::OuterCurves => PatchVertex::new(x, 0.0, 1.0, fan_params),
            PatchType::MidpointFan => {
                PatchVertex::new(x, -1.0, 1.0, fan_params).mirrored(x - 1.0, -1.0, 1.0)
            }
        };
        vertex_count += 1;
    }

    let midpoint_idx = vertex_count;
    if patch_type == PatchType::MidpointFan {
        vertices[vertex_count] =
            PatchVertex::new(0.0, 0.0, 1.0, pack_params(span, FAN_MIDPOINT_VERTEX));
        vertex_count += 1;
    }
    debug_assert_eq!(vertex_count, patch_type.vertex_count() as usize);

    // AA border indices.
    let mut index_count = 0;
    let mut push = |indices: &mut [u16], i: usize| {
        indices[index_count] = base_vertex + i as u16;
        index_count += 1;
    };
    let mut border_vertices_idx = 0;
    for _ in 0..span {
        for p in BORDER_PATTERN {
            push(indices, border_vertices_idx + p as usize);
        }
        border_vertices_idx += 4;
    }
    if patch_type == PatchType::OuterCurves {
        for _ in 0..span {
            for p in NEGATIVE_BORDER_PATTERN {
                push(indices, border_vertices_idx + p as usize);
            }
            border_vertices_idx += 4;
        }
    }
    debug_assert_eq!(border_vertices_idx, fan_vertices_idx);

    // Triangle fan indices, in a middle-out topology.
    let fan_span = fan_span as usize;
    let mut step = 1;
    while step < fan_span {
        for i in (0..fan_span).step_by(step * 2) {
            push(indices, fan_vertices_idx + i);
            push(indices, fan_vertices_idx + i + step);
            push(indices, fan_vertices_idx + i + step * 2);
        }
        step <<= 1;
    }
    if patch_type == PatchType::MidpointFan {
        // Triangle to the contour midpoint.
        push(indices, fan_vertices_idx);
        push(indices, fan_vertices_idx + fan_span);
        push(indices, midpoint_idx);
    }
    debug_assert_eq!(index_count, patch_type.index_count() as usize);
}

/// Fills the shared patch vertex and index buffers: the midpoint fan patch
/// first, then the outer curve patch.
pub fn generate_patch_buffer_data(
    vertices: &mut [PatchVertex; PATCH_VERTEX_BUFFER_COUNT],
    indices: &mut [u16; PATCH_INDEX_BUFFER_COUNT],
) {
    let (fan_vertices, curve_vertices) =
        vertices.split_at_mut(MIDPOINT_FAN_PATCH_VERTEX_COUNT as usize);
    let (fan_indices, curve_indices) =
        indices.split_at_mut(MIDPOINT_FAN_PATCH_INDEX_COUNT as usize);
    generate_patch(PatchType::MidpointFan, fan_vertices, fan_indices);
    generate_patch(PatchType::OuterCurves, curve_vertices, curve_indices);
}
