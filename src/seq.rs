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

//! Modular comparison of 32-bit TCP sequence numbers.
//! See RFC 9293 Section 3.4 and RFC 1982.

/// Check whether sequence number `a` comes strictly after `b`.
///
/// The comparison is valid as long as the two numbers are less than 2^31
/// apart, which always holds for in-flight data.
pub fn seq_after(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

/// Check whether sequence number `a` comes strictly before `b`.
pub fn seq_before(a: u32, b: u32) -> bool {
    seq_after(b, a)
}
