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

//! A pair of minimum and maximum values, used both for the RTT extremes seen
//! in one round trip and for the delay gradients derived from them.
//!
//! RTT samples are strictly positive, so `{0, 0}` doubles as the "no sample
//! yet" marker, and a zero minimum is treated as unset.

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MinMax {
    /// Minimum value, in microseconds for RTT samples.
    pub min: i32,

    /// Maximum value, in microseconds for RTT samples.
    pub max: i32,
}

impl MinMax {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Check whether no sample has been recorded.
    pub fn is_empty(&self) -> bool {
        self.min == 0 && self.max == 0
    }

    /// Clear all samples.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Update the minimum only.
    pub fn update_min(&mut self, sample: i32) {
        self.min = min_not_zero(self.min, sample);
    }

    /// Update both the minimum and the maximum.
    pub fn update(&mut self, sample: i32) {
        self.update_min(sample);
        self.max = self.max.max(sample);
    }

    /// Take the recorded samples, leaving `self` empty.
    pub fn take(&mut self) -> MinMax {
        std::mem::take(self)
    }
}

/// Minimum of two values, where zero means unset.
fn min_not_zero(a: i32, b: i32) -> i32 {
    match (a, b) {
        (0, b) => b,
        (a, 0) => a,
        (a, b) => a.min(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minmax_empty() {
        let mut m = MinMax::default();
        assert!(m.is_empty());

        m.update(10);
        assert!(!m.is_empty());
        assert_eq!(m, MinMax::new(10, 10));

        m.clear();
        assert!(m.is_empty());
    }

    #[test]
    fn minmax_update() {
        let mut m = MinMax::default();
        for sample in [30, 10, 50, 20] {
            m.update(sample);
            assert!(m.min <= m.max);
        }
        assert_eq!(m, MinMax::new(10, 50));
    }

    #[test]
    fn minmax_update_min_only() {
        let mut m = MinMax::default();

        // An unset minimum is replaced, the maximum stays unset.
        m.update_min(40);
        assert_eq!(m, MinMax::new(40, 0));
        assert!(!m.is_empty());

        m.update_min(50);
        assert_eq!(m.min, 40);

        m.update_min(30);
        assert_eq!(m.min, 30);

        m.update(35);
        assert_eq!(m, MinMax::new(30, 35));
    }

    #[test]
    fn minmax_take() {
        let mut m = MinMax::new(5, 8);
        let prev = m.take();
        assert_eq!(prev, MinMax::new(5, 8));
        assert!(m.is_empty());
    }

    #[test]
    fn minmax_min_not_exceed_max() {
        // A pseudo-random walk of samples.
        let mut m = MinMax::default();
        let mut sample: i32 = 1000;
        for i in 0..1000 {
            sample = (sample * 31 + i) % 100_000 + 1;
            if i % 3 == 0 {
                m.update_min(sample);
            } else {
                m.update(sample);
            }
            if m.max != 0 {
                assert!(m.min <= m.max);
            }
        }
    }
}
