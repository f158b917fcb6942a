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

//! Fixed-point approximation of exp(-x) used as the backoff probability.

/// exp(-x) * 2^32 - 1 for x = 0, 0.000256, 0.000512, 0.001024, ...
///
/// Entry `i` (i >= 1) is the factor for bit `i - 1` of `ux >> 8`.
const EXP_TABLE: [u32; 17] = [
    4294967295, 4293867924, 4292768835, 4290571500, 4286180203, 4277411089, 4259926645,
    4225171876, 4156510669, 4022517461, 3767350392, 3304548790, 2542520573, 1505112943,
    527446384, 64773412, 976862,
];

/// Largest value of `ux >> 8` covered by the table.
const MAX_MSB: u32 = (1 << 16) - 1;

/// Return exp(-x) scaled to the full u32 range, where `ux = x * 10^6`.
///
/// The high bits of `ux` are combined by multiplying table factors, i.e.
/// e^(a + b + ...) = e^a * e^b * ..., and the low eight bits are interpolated
/// linearly towards the next step. The result is non-increasing in `ux`, and
/// zero from `ux >= 2^24` where exp(-x) drops below 2^-32 * 223.
pub fn nexp_u32(ux: u32) -> u32 {
    let msb = ux >> 8;
    if msb > MAX_MSB {
        return 0;
    }

    let hi = scaled_exp(msb);
    let lo = scaled_exp(msb + 1);
    let frac = (ux & 0xff) as u64;

    (hi - (((hi - lo) * frac) >> 8)) as u32
}

/// exp(-msb * 0.000256) scaled to u32, zero beyond the table.
fn scaled_exp(mut msb: u32) -> u64 {
    if msb > MAX_MSB {
        return 0;
    }

    let mut res = u32::MAX as u64;
    let mut i = 1;
    while msb != 0 {
        if msb & 1 == 1 {
            res = (res * (EXP_TABLE[i] as u64 + 1)) >> 32;
        }
        i += 1;
        msb >>= 1;
    }
    res
}
