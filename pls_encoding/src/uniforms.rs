// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

use crate::draw::PlsBlendMode;

/// Flush-wide uniforms.
///
/// Compared bit for bit against the previous flush's copy so an unchanged
/// block is never re-uploaded; `vertex_discard_value` is NaN, so `PartialEq`
/// would never report equality.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct FlushUniforms {
    /// `2 / [complex gradients height, tessellation data height,
    /// render target width, render target height]`, sign-flipped where the
    /// platform's Y axis requires it.
    pub inverse_viewports: [f32; 4],
    pub grad_texture_inverse_height: f32,
    pub path_id_granularity: u32,
    /// A NaN written to clip-space positions to discard a vertex.
    pub vertex_discard_value: f32,
    pub padding: u32,
}

const_assert_eq!(std::mem::size_of::<FlushUniforms>(), 32);

/// Y-axis conventions that affect the viewport transforms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewportFlips {
    pub invert_offscreen_y: bool,
    pub uninvert_on_screen_y: bool,
}

impl FlushUniforms {
    pub fn new(
        complex_gradients_height: u32,
        tessellation_data_height: u32,
        render_target_width: u32,
        render_target_height: u32,
        grad_texture_height: u32,
        path_id_granularity: u32,
        flips: ViewportFlips,
    ) -> Self {
        let inverse = |x: u32| if x == 0 { 0.0 } else { 2.0 / x as f32 };
        let mut inverse_viewports = [
            inverse(complex_gradients_height),
            inverse(tessellation_data_height),
            inverse(render_target_width),
            inverse(render_target_height),
        ];
        if flips.invert_offscreen_y {
            inverse_viewports[0] = -inverse_viewports[0];
            inverse_viewports[1] = -inverse_viewports[1];
        }
        if flips.uninvert_on_screen_y {
            inverse_viewports[3] = -inverse_viewports[3];
        }
        Self {
            inverse_viewports,
            grad_texture_inverse_height: if grad_texture_height == 0 {
                0.0
            } else {
                1.0 / grad_texture_height as f32
            },
            path_id_granularity,
            vertex_discard_value: f32::NAN,
            padding: 0,
        }
    }

    pub fn bitwise_eq(&self, other: &Self) -> bool {
        bytemuck::bytes_of(self) == bytemuck::bytes_of(other)
    }
}

/// Per-draw uniforms of an image rect or image mesh, padded to the 256-byte
/// uniform buffer offset alignment.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct ImageDrawUniforms {
    pub matrix: [f32; 6],
    pub opacity: f32,
    pub clip_id: u32,
    pub blend_mode: u32,
    pub padding: [u32; 7],
    pub padding_to_alignment: [u32; 48],
}

const_assert_eq!(std::mem::size_of::<ImageDrawUniforms>(), 256);

impl ImageDrawUniforms {
    pub fn new(matrix: [f32; 6], opacity: f32, clip_id: u32, blend_mode: PlsBlendMode) -> Self {
        Self {
            matrix,
            opacity,
            clip_id,
            blend_mode: blend_mode as u32,
            padding: [0; 7],
            padding_to_alignment: [0; 48],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_flips() {
        let plain = FlushUniforms::new(4, 8, 100, 50, 16, 1, ViewportFlips::default());
        assert_eq!(plain.inverse_viewports, [0.5, 0.25, 0.02, 0.04]);
        let flipped = FlushUniforms::new(
            4,
            8,
            100,
            50,
            16,
            1,
            ViewportFlips {
                invert_offscreen_y: true,
                uninvert_on_screen_y: true,
            },
        );
        assert_eq!(flipped.inverse_viewports, [-0.5, -0.25, 0.02, -0.04]);
        assert_eq!(flipped.grad_texture_inverse_height, 1.0 / 16.0);
    }

    #[test]
    fn bitwise_equality_sees_through_nan() {
        let a = FlushUniforms::new(1, 1, 1, 1, 1, 1, ViewportFlips::default());
        let b = a;
        assert!(a.vertex_discard_value.is_nan());
        assert!(a.bitwise_eq(&b));
        let c = FlushUniforms::new(2, 1, 1, 1, 1, 1, ViewportFlips::default());
        assert!(!a.bitwise_eq(&c));
    }
}
