// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-flush deduplication of color ramps in the gradient texture.

use std::collections::{HashMap, HashSet};

use pls_encoding::limits::{GRAD_TEXTURE_WIDTH, GRAD_TEXTURE_WIDTH_IN_SIMPLE_RAMPS};
use pls_encoding::{
    complex_ramp_span_count, complex_ramp_spans, pack_color, ColorInt, ColorRampLocation,
    TwoTexelRamp,
};

use crate::backend::RenderContextImpl;
use crate::context::RenderContext;
use crate::paint::Gradient;

/// Content key of a multi-stop ramp: every stop's offset bits and color.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ComplexKey(Vec<(u32, ColorInt)>);

/// Ramps written so far this flush, by content.
#[derive(Debug, Default)]
pub(crate) struct GradientCache {
    simple: HashMap<u64, u32>,
    complex: HashMap<ComplexKey, u32>,
}

impl GradientCache {
    pub(crate) fn simple_count(&self) -> usize {
        self.simple.len()
    }

    pub(crate) fn complex_count(&self) -> usize {
        self.complex.len()
    }

    pub(crate) fn clear(&mut self) {
        self.simple.clear();
        self.complex.clear();
    }
}

/// What identifies a ramp in the cache.
enum RampKey {
    /// Both colors, packed.
    Simple(u64),
    Complex(ComplexKey),
}

fn ramp_key(gradient: &Gradient) -> RampKey {
    let stops = gradient.stops();
    if gradient.is_simple() {
        let (c0, c1) = (pack_color(stops[0].color), pack_color(stops[1].color));
        RampKey::Simple((c0 as u64) << 32 | c1 as u64)
    } else {
        RampKey::Complex(ComplexKey(
            stops
                .iter()
                .map(|stop| (stop.offset.to_bits(), pack_color(stop.color)))
                .collect(),
        ))
    }
}

fn simple_location(idx: u32) -> ColorRampLocation {
    let left = (idx * 2) % GRAD_TEXTURE_WIDTH;
    ColorRampLocation {
        row: idx / GRAD_TEXTURE_WIDTH_IN_SIMPLE_RAMPS,
        left,
        right: left + 2,
    }
}

impl<B: RenderContextImpl> RenderContext<B> {
    /// Checks that every ramp in `gradients` that is not cached yet fits in
    /// the gradient texture, without writing any of them.
    ///
    /// Once this succeeds, pushing the same gradients cannot fail.
    pub(crate) fn reserve_gradients<'a>(
        &mut self,
        gradients: impl IntoIterator<Item = &'a Gradient>,
    ) -> bool {
        let mut new_simple = HashSet::new();
        let mut new_complex = HashMap::new();
        for gradient in gradients {
            match ramp_key(gradient) {
                RampKey::Simple(key) => {
                    if !self.gradients.simple.contains_key(&key) {
                        new_simple.insert(key);
                    }
                }
                RampKey::Complex(key) => {
                    if !self.gradients.complex.contains_key(&key) {
                        new_complex.insert(key, complex_ramp_span_count(gradient.stops().len()));
                    }
                }
            }
        }
        if new_simple.is_empty() && new_complex.is_empty() {
            return true;
        }
        let mut needed = self.flush_usage();
        needed.max_simple_gradients += new_simple.len();
        needed.max_complex_gradients += new_complex.len();
        needed.max_complex_gradient_spans += new_complex.values().sum::<usize>();
        self.ensure_capacity(&needed)
    }

    /// Finds or writes the color ramp of `gradient`.
    ///
    /// Identical ramps share a location for the rest of the flush. Returns
    /// `None` when the gradient texture is full; the caller should flush and
    /// try again.
    pub fn push_gradient(&mut self, gradient: &Gradient) -> Option<ColorRampLocation> {
        debug_assert!(self.frame.is_some());
        let stops = gradient.stops();
        match ramp_key(gradient) {
            RampKey::Simple(key) => {
                if let Some(&idx) = self.gradients.simple.get(&key) {
                    return Some(simple_location(idx));
                }
                let idx = self.gradients.simple_count();
                let mut needed = self.flush_usage();
                needed.max_simple_gradients = idx + 1;
                if !self.ensure_capacity(&needed) {
                    return None;
                }
                self.rings.simple_gradients.ensure_mapped();
                self.rings
                    .simple_gradients
                    .emplace_back(TwoTexelRamp::new(stops[0].color, stops[1].color));
                self.gradients.simple.insert(key, idx as u32);
                Some(simple_location(idx as u32))
            }
            RampKey::Complex(key) => {
                let idx = match self.gradients.complex.get(&key) {
                    Some(&idx) => idx,
                    None => {
                        let idx = self.gradients.complex_count();
                        let mut needed = self.flush_usage();
                        needed.max_complex_gradients = idx + 1;
                        needed.max_complex_gradient_spans += complex_ramp_span_count(stops.len());
                        if !self.ensure_capacity(&needed) {
                            return None;
                        }
                        self.rings.gradient_spans.ensure_mapped();
                        for span in complex_ramp_spans(stops, idx as u32) {
                            self.rings.gradient_spans.emplace_back(span);
                        }
                        self.gradients.complex.insert(key, idx as u32);
                        log::trace!("complex gradient {idx}: {} stops", stops.len());
                        idx as u32
                    }
                };
                Some(ColorRampLocation {
                    row: self.simple_gradient_rows as u32 + idx,
                    left: 0,
                    right: GRAD_TEXTURE_WIDTH,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_locations_pack_two_texels_per_ramp() {
        assert_eq!(
            simple_location(0),
            ColorRampLocation {
                row: 0,
                left: 0,
                right: 2
            }
        );
        assert_eq!(
            simple_location(257),
            ColorRampLocation {
                row: 1,
                left: 2,
                right: 4
            }
        );
    }
}
