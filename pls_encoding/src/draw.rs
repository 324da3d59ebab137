// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use peniko::Mix;

/// Kind of GPU draw a batch issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawType {
    /// Standard paths and/or strokes.
    MidpointFanPatches,
    /// Just the outer curves of a path; the interior is triangulated.
    OuterCurvePatches,
    InteriorTriangulation,
    ImageRect,
    ImageMesh,
}

impl DrawType {
    pub fn is_patch(self) -> bool {
        matches!(self, Self::MidpointFanPatches | Self::OuterCurvePatches)
    }

    fn key(self) -> u32 {
        match self {
            Self::MidpointFanPatches | Self::OuterCurvePatches => 0,
            Self::InteriorTriangulation => 1,
            Self::ImageRect => 2,
            Self::ImageMesh => 3,
        }
    }
}

/// Whether a flush ends the frame or was forced by running out of room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushType {
    /// The flush was forced mid-frame; more draws follow on the same target.
    Intermediate,
    EndOfFrame,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadAction {
    Clear,
    PreserveRenderTarget,
}

/// Optional shader features. A batch's features are the union of the
/// features of every draw merged into it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ShaderFeatures(pub u32);

impl ShaderFeatures {
    pub const NONE: Self = Self(0);
    pub const ENABLE_CLIPPING: Self = Self(1 << 0);
    pub const ENABLE_ADVANCED_BLEND: Self = Self(1 << 1);
    pub const ENABLE_EVEN_ODD: Self = Self(1 << 2);
    pub const ENABLE_NESTED_CLIPPING: Self = Self(1 << 3);
    pub const ENABLE_HSL_BLEND_MODES: Self = Self(1 << 4);

    pub const ALL: Self = Self((1 << 5) - 1);
    /// Features that affect the vertex shader.
    pub const VERTEX_FEATURES_MASK: Self =
        Self(Self::ENABLE_CLIPPING.0 | Self::ENABLE_ADVANCED_BLEND.0);

    /// Features relevant to a given draw type.
    pub fn mask_for(draw_type: DrawType) -> Self {
        match draw_type {
            DrawType::MidpointFanPatches
            | DrawType::OuterCurvePatches
            | DrawType::InteriorTriangulation => Self::ALL,
            DrawType::ImageRect | DrawType::ImageMesh => Self(
                Self::ENABLE_CLIPPING.0
                    | Self::ENABLE_ADVANCED_BLEND.0
                    | Self::ENABLE_HSL_BLEND_MODES.0,
            ),
        }
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ShaderFeatures {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ShaderFeatures {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for ShaderFeatures {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Key a backend can use to cache the shader compiled for a draw type and
/// feature set.
pub fn shader_unique_key(draw_type: DrawType, features: ShaderFeatures) -> u32 {
    let features = features & ShaderFeatures::mask_for(draw_type);
    features.0 << 2 | draw_type.key()
}

/// Blend modes as numbered in the shaders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PlsBlendMode {
    #[default]
    SrcOver = 0,
    Screen = 1,
    Overlay = 2,
    Darken = 3,
    Lighten = 4,
    ColorDodge = 5,
    ColorBurn = 6,
    HardLight = 7,
    SoftLight = 8,
    Difference = 9,
    Exclusion = 10,
    Multiply = 11,
    Hue = 12,
    Saturation = 13,
    Color = 14,
    Luminosity = 15,
}

impl PlsBlendMode {
    pub fn from_mix(mix: Mix) -> Self {
        match mix {
            Mix::Normal | Mix::Clip => Self::SrcOver,
            Mix::Multiply => Self::Multiply,
            Mix::Screen => Self::Screen,
            Mix::Overlay => Self::Overlay,
            Mix::Darken => Self::Darken,
            Mix::Lighten => Self::Lighten,
            Mix::ColorDodge => Self::ColorDodge,
            Mix::ColorBurn => Self::ColorBurn,
            Mix::HardLight => Self::HardLight,
            Mix::SoftLight => Self::SoftLight,
            Mix::Difference => Self::Difference,
            Mix::Exclusion => Self::Exclusion,
            Mix::Hue => Self::Hue,
            Mix::Saturation => Self::Saturation,
            Mix::Color => Self::Color,
            Mix::Luminosity => Self::Luminosity,
        }
    }

    pub fn is_hsl(self) -> bool {
        matches!(
            self,
            Self::Hue | Self::Saturation | Self::Color | Self::Luminosity
        )
    }

    /// Shader features needed to draw with this blend mode.
    pub fn shader_features(self) -> ShaderFeatures {
        if self.is_hsl() {
            ShaderFeatures::ENABLE_ADVANCED_BLEND | ShaderFeatures::ENABLE_HSL_BLEND_MODES
        } else if self != Self::SrcOver {
            ShaderFeatures::ENABLE_ADVANCED_BLEND
        } else {
            ShaderFeatures::NONE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_features() {
        assert!(PlsBlendMode::SrcOver.shader_features().is_empty());
        assert_eq!(
            PlsBlendMode::Multiply.shader_features(),
            ShaderFeatures::ENABLE_ADVANCED_BLEND
        );
        let hsl = PlsBlendMode::from_mix(Mix::Saturation).shader_features();
        assert!(hsl.contains(ShaderFeatures::ENABLE_HSL_BLEND_MODES));
        assert!(hsl.contains(ShaderFeatures::ENABLE_ADVANCED_BLEND));
    }

    #[test]
    fn unique_keys_mask_irrelevant_features() {
        let even_odd = ShaderFeatures::ENABLE_EVEN_ODD;
        assert_eq!(
            shader_unique_key(DrawType::ImageMesh, even_odd),
            shader_unique_key(DrawType::ImageMesh, ShaderFeatures::NONE)
        );
        assert_ne!(
            shader_unique_key(DrawType::MidpointFanPatches, even_odd),
            shader_unique_key(DrawType::MidpointFanPatches, ShaderFeatures::NONE)
        );
        assert_ne!(
            shader_unique_key(DrawType::ImageRect, ShaderFeatures::NONE),
            shader_unique_key(DrawType::ImageMesh, ShaderFeatures::NONE)
        );
    }
}
