// Copyright (c) 2023 The TQUIC Authors.
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

use super::minmax::MinMax;

/// History of the delay gradients measured in the last `window` round trips.
///
/// The sums are maintained incrementally, so the moving average costs O(1)
/// per round trip. Keeping the sums (rather than the oldest and latest RTT)
/// also lets gradients be excluded from the average while the window is
/// being reduced.
#[derive(Debug, Clone)]
pub struct GradientHistory {
    /// Ring buffer of gradients, its length is a power of two.
    gradients: Box<[MinMax]>,

    /// Index of the oldest entry, which the next push overwrites.
    tail: usize,

    /// Sum of the minimum gradients in the ring.
    sum_min: i64,

    /// Sum of the maximum gradients in the ring.
    sum_max: i64,
}

impl GradientHistory {
    /// Create a history of `window` entries. `window` must be a power of two.
    pub fn new(window: usize) -> Self {
        debug_assert!(window.is_power_of_two());
        Self {
            gradients: vec![MinMax::default(); window].into_boxed_slice(),
            tail: 0,
            sum_min: 0,
            sum_max: 0,
        }
    }

    /// Number of entries in the moving average.
    pub fn window(&self) -> usize {
        self.gradients.len()
    }

    /// Replace the oldest gradient with `g`.
    pub fn push(&mut self, g: MinMax) {
        let old = self.gradients[self.tail];
        self.sum_min += g.min as i64 - old.min as i64;
        self.sum_max += g.max as i64 - old.max as i64;
        self.gradients[self.tail] = g;
        self.tail = (self.tail + 1) & (self.window() - 1);
    }

    /// Smoothed gradients, i.e. the sums divided by the window and rounded
    /// to the closest integer.
    pub fn smoothed(&self) -> MinMax {
        let window = self.window() as i64;
        MinMax::new(
            div_round_closest(self.sum_min, window),
            div_round_closest(self.sum_max, window),
        )
    }

    /// Running sums of the minimum and maximum gradients.
    pub fn sum(&self) -> (i64, i64) {
        (self.sum_min, self.sum_max)
    }

    /// Forget all gradients.
    pub fn clear(&mut self) {
        self.gradients.fill(MinMax::default());
        self.tail = 0;
        self.sum_min = 0;
        self.sum_max = 0;
    }

    #[cfg(test)]
    fn iter(&self) -> impl Iterator<Item = &MinMax> {
        self.gradients.iter()
    }
}

/// Divide and round to the closest integer, halves away from zero.
fn div_round_closest(n: i64, d: i64) -> i32 {
    let q = if n >= 0 {
        (n + d / 2) / d
    } else {
        (n - d / 2) / d
    };
    q.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_round() {
        assert_eq!(div_round_closest(0, 4), 0);
        assert_eq!(div_round_closest(1, 4), 0);
        assert_eq!(div_round_closest(2, 4), 1);
        assert_eq!(div_round_closest(3, 4), 1);
        assert_eq!(div_round_closest(-1, 4), 0);
        assert_eq!(div_round_closest(-2, 4), -1);
        assert_eq!(div_round_closest(-6, 4), -2);
        assert_eq!(div_round_closest(7, 1), 7);
    }

    #[test]
    fn gradient_history_push() {
        let mut h = GradientHistory::new(4);
        assert_eq!(h.window(), 4);
        assert_eq!(h.smoothed(), MinMax::default());

        let expected = [(2, 1), (1, 0), (-2, -1), (2, 1)];
        for (g, (sum, smoothed)) in [2, -1, -3, 4].into_iter().zip(expected) {
            h.push(MinMax::new(g, 0));
            assert_eq!(h.sum(), (sum, 0));
            assert_eq!(h.smoothed().min, smoothed);
        }

        // The fifth push evicts the first gradient (2).
        h.push(MinMax::new(6, 0));
        assert_eq!(h.sum(), (6, 0));
        assert_eq!(h.smoothed().min, 2);
    }

    #[test]
    fn gradient_history_sum_in_sync() {
        let mut h = GradientHistory::new(8);
        let mut g: i32 = 7;
        for i in 0..100 {
            g = (g * 13 + i) % 2001 - 1000;
            h.push(MinMax::new(g, -g / 2));

            let sum_min: i64 = h.iter().map(|g| g.min as i64).sum();
            let sum_max: i64 = h.iter().map(|g| g.max as i64).sum();
            assert_eq!(h.sum(), (sum_min, sum_max));
        }
    }

    #[test]
    fn gradient_history_clear() {
        let mut h = GradientHistory::new(2);
        h.push(MinMax::new(100, 200));
        h.push(MinMax::new(300, 400));
        assert_eq!(h.smoothed(), MinMax::new(200, 300));

        h.clear();
        assert_eq!(h.sum(), (0, 0));
        assert!(h.iter().all(|g| g.is_empty()));

        let cloned = {
            let mut c = h.clone();
            c.push(MinMax::new(1, 1));
            c
        };
        assert_eq!(cloned.sum(), (1, 1));
        assert_eq!(h.sum(), (0, 0));
    }
}
