// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Accumulator encoding for order-independent voxel averaging.
//!
//! Each voxel owns [`ACCUMULATOR_WORDS`] `u32` words:
//!
//! ```text
//! word 0..4 : r_sum, g_sum, b_sum, a_sum   (sums of 8-bit quantized channels)
//! word 4    : count                         (number of contributing fragments)
//! ```
//!
//! Fragments quantize their color to 8 bits per channel and atomically add it.
//! Integer addition is associative and commutative, so the resolved average is
//! bit-identical regardless of the order fragments arrive in. The WGSL shaders
//! mirror [`quantize_channel`] and [`Accumulator::resolve`] exactly.

use crate::math::LinearRgba;

/// Number of `u32` words per voxel in the accumulator buffer.
pub const ACCUMULATOR_WORDS: usize = 5;

/// Index of the contribution counter inside a voxel's accumulator words.
pub const COUNT_WORD: usize = 4;

/// Quantizes one color channel to an 8-bit integer in `0..=255`.
///
/// Rounds half up (`floor(v * 255 + 0.5)`), matching the shader.
#[inline]
pub fn quantize_channel(v: f32) -> u32 {
    let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
    (v * 255.0 + 0.5).floor() as u32
}

/// Quantizes a color to the integer channels added into an accumulator.
#[inline]
pub fn quantize(color: LinearRgba) -> [u32; 4] {
    color.to_array().map(quantize_channel)
}

/// The decoded contents of one voxel's accumulator slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accumulator {
    /// Per-channel sums of quantized contributions.
    pub sum: [u32; 4],
    /// Number of contributions.
    pub count: u32,
}

impl Accumulator {
    /// Reads a slot from its raw words.
    #[inline]
    pub fn from_words(words: &[u32]) -> Self {
        Self {
            sum: [words[0], words[1], words[2], words[3]],
            count: words[COUNT_WORD],
        }
    }

    /// Adds one fragment contribution.
    #[inline]
    pub fn add(&mut self, quantized: [u32; 4]) {
        for (s, q) in self.sum.iter_mut().zip(quantized) {
            *s = s.wrapping_add(q);
        }
        self.count = self.count.wrapping_add(1);
    }

    /// Returns `true` if no fragment touched this voxel.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Resolves the average as 8-bit channels.
    ///
    /// Empty slots resolve to the cleared value (all zero). Division rounds
    /// half up: `(sum + count / 2) / count`.
    #[inline]
    pub fn resolve(&self) -> [u8; 4] {
        if self.count == 0 {
            return [0; 4];
        }
        let n = self.count as u64;
        self.sum
            .map(|s| (((s as u64) + n / 2) / n).min(255) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_clamps_and_rounds() {
        assert_eq!(quantize_channel(-1.0), 0);
        assert_eq!(quantize_channel(2.0), 255);
        assert_eq!(quantize_channel(f32::NAN), 0);
        assert_eq!(quantize_channel(0.5), 128);
        assert_eq!(quantize_channel(100.0 / 255.0), 100);
    }

    #[test]
    fn test_empty_accumulator_resolves_to_cleared() {
        let acc = Accumulator::default();
        assert!(acc.is_empty());
        assert_eq!(acc.resolve(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_average_of_two_is_order_independent() {
        let v1 = quantize(LinearRgba::new(0.2, 0.4, 1.0, 1.0));
        let v2 = quantize(LinearRgba::new(0.6, 0.0, 0.0, 1.0));

        let mut a = Accumulator::default();
        a.add(v1);
        a.add(v2);
        let mut b = Accumulator::default();
        b.add(v2);
        b.add(v1);

        assert_eq!(a, b);
        assert_eq!(a.count, 2);
        // 51 + 153 = 204 -> 102; 102 + 0 -> 51; 255 + 0 -> 128 (rounded half up).
        assert_eq!(a.resolve(), [102, 51, 128, 255]);
    }

    #[test]
    fn test_from_words_layout() {
        let words = [10, 20, 30, 40, 2];
        let acc = Accumulator::from_words(&words);
        assert_eq!(acc.sum, [10, 20, 30, 40]);
        assert_eq!(acc.count, 2);
        assert_eq!(acc.resolve(), [5, 10, 15, 20]);
    }
}
