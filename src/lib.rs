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

//! An implementation of CAIA Delay Gradient (CDG) congestion control as a
//! pluggable strategy for a TCP stack.
//!
//! CDG uses the trend of the minimum and maximum round-trip time seen in each
//! round trip, rather than loss alone, to infer queue growth at the
//! bottleneck and back off probabilistically before the queue overflows.
//!
//! The host stack owns a [`TcpSocketState`] for each connection and drives a
//! [`CongestionController`] through it:
//!
//! * `pkts_acked` on every ACK carrying an RTT sample;
//! * `increase_window` on every ACK that may grow the window;
//! * `cwnd_event` on restarts, CWR completion and ECN marks;
//! * `ssthresh` when loss is detected.
//!
//! See <https://caia.swin.edu.au/cv/dahayes/content/networking2011-cdg-preprint.pdf>.
//!
//! ## Examples:
//!
//! ```
//! use std::time::Duration;
//! use tcp_cdg::{build_congestion_controller, RecoveryConfig, TcpSocketState};
//!
//! let mut conf = RecoveryConfig::default();
//! conf.set_cdg_window(16)?;
//!
//! let mut tcb = TcpSocketState::from(&conf);
//! let mut cc = build_congestion_controller(&conf);
//! cc.init(&tcb);
//!
//! tcb.snd_nxt = tcb.snd_nxt.wrapping_add(tcb.segment_size);
//! tcb.snd_una = tcb.snd_nxt;
//! cc.pkts_acked(&mut tcb, 1, Duration::from_millis(20));
//! cc.increase_window(&mut tcb, 1);
//! assert_eq!(cc.name(), "CDG");
//! # Ok::<(), tcp_cdg::error::Error>(())
//! ```

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

pub use crate::congestion_control::build_congestion_controller;
pub use crate::congestion_control::BackoffRng;
pub use crate::congestion_control::Cdg;
pub use crate::congestion_control::CdgConfig;
pub use crate::congestion_control::CongestionControlAlgorithm;
pub use crate::congestion_control::CongestionController;
pub use crate::congestion_control::CongestionEvent;
pub use crate::congestion_control::CongestionStats;
pub use crate::congestion_control::NewReno;
pub use crate::congestion_control::QueueState;
pub use crate::error::Error;
pub use crate::socket_state::CongState;
pub use crate::socket_state::TcpSocketState;

/// Default sender maximum segment size, typical for Ethernet with TCP
/// timestamps.
pub const DEFAULT_MAX_SEGMENT_SIZE: u32 = 1448;

/// Largest gradient history window that may be configured.
pub const MAX_CDG_WINDOW: usize = 256;

/// Default number of rounds in the gradient moving average.
const DEFAULT_CDG_WINDOW: usize = 8;

/// Default multiplicative decrease factor on delay backoff, 0.7 in 1/1024.
const DEFAULT_CDG_BACKOFF_BETA: u32 = 717;

/// Default scaling of the gradient in the backoff probability, in
/// 1/1000000 per microsecond.
const DEFAULT_CDG_BACKOFF_FACTOR: u32 = 333;

/// Default number of consecutive backoffs before they are judged
/// ineffective.
const DEFAULT_CDG_INEFFECTIVE_THRESH: u32 = 5;

/// Default number of rounds to ignore delay after ineffective backoffs.
const DEFAULT_CDG_INEFFECTIVE_HOLD: u32 = 5;

/// Result type for congestion control operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Configurations about congestion control.
///
/// Windows are expressed in segments and converted to bytes with
/// `max_segment_size` when the socket state is built.
///
/// A deserialized configuration is checked with [`RecoveryConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(remote = "Self", default)]
pub struct RecoveryConfig {
    /// The congestion control algorithm used for a connection.
    pub congestion_control_algorithm: CongestionControlAlgorithm,

    /// The sender maximum segment size in bytes.
    pub max_segment_size: u32,

    /// The initial congestion window in segments.
    pub initial_congestion_window: u32,

    /// The threshold for slow start in segments.
    pub slow_start_thresh: u32,

    /// The upper limit of the congestion window in segments.
    pub cwnd_clamp: u32,

    /// Number of rounds in the CDG gradient moving average. Zero disables the
    /// gradient history and CDG behaves like NewReno.
    pub cdg_window: usize,

    /// Multiplicative decrease factor on CDG delay backoff, in 1/1024.
    pub cdg_backoff_beta: u32,

    /// Scaling of the gradient in the CDG backoff probability.
    pub cdg_backoff_factor: u32,

    /// Number of consecutive CDG backoffs before they are judged
    /// ineffective. Zero disables ineffective backoff detection.
    pub cdg_ineffective_thresh: u32,

    /// Number of rounds the CDG delay signal is ignored after ineffective
    /// backoffs.
    pub cdg_ineffective_hold: u32,

    /// Use the shadow window to avoid compounding delay and loss backoffs.
    pub cdg_use_shadow: bool,
}

impl RecoveryConfig {
    /// Set congestion control algorithm that the connection would use.
    /// The default value is Cdg.
    pub fn set_congestion_control_algorithm(&mut self, cca: CongestionControlAlgorithm) {
        self.congestion_control_algorithm = cca;
    }

    /// Set the sender maximum segment size in bytes.
    /// The default value is `1448`.
    pub fn set_max_segment_size(&mut self, v: u32) {
        self.max_segment_size = v.max(1);
    }

    /// Set the initial congestion window in segments.
    /// The default value is 10.
    pub fn set_initial_congestion_window(&mut self, segments: u32) {
        self.initial_congestion_window = segments;
    }

    /// Set the threshold for slow start in segments.
    /// The default value is the maximum value of u32.
    pub fn set_slow_start_thresh(&mut self, segments: u32) {
        self.slow_start_thresh = segments;
    }

    /// Set the upper limit of the congestion window in segments.
    /// The default value is the maximum value of u32.
    pub fn set_cwnd_clamp(&mut self, segments: u32) {
        self.cwnd_clamp = segments;
    }

    /// Set the number of rounds in the CDG gradient moving average.
    /// The value must be zero or a power of two not larger than 256.
    /// The default value is 8.
    pub fn set_cdg_window(&mut self, v: usize) -> Result<()> {
        Self::check_cdg_window(v)?;
        self.cdg_window = v;
        Ok(())
    }

    /// Set the CDG multiplicative decrease factor in 1/1024.
    /// The value is capped by 1024. The default value is 717.
    pub fn set_cdg_backoff_beta(&mut self, v: u32) {
        self.cdg_backoff_beta = v.min(1024);
    }

    /// Set the CDG backoff probability scaling.
    /// The default value is 333.
    pub fn set_cdg_backoff_factor(&mut self, v: u32) {
        self.cdg_backoff_factor = v;
    }

    /// Set the number of backoffs after which they are judged ineffective.
    /// The default value is 5.
    pub fn set_cdg_ineffective_thresh(&mut self, v: u32) {
        self.cdg_ineffective_thresh = v;
    }

    /// Set the number of rounds to hold off after ineffective backoffs.
    /// The default value is 5.
    pub fn set_cdg_ineffective_hold(&mut self, v: u32) {
        self.cdg_ineffective_hold = v;
    }

    /// Enable the CDG shadow window.
    /// The default value is false.
    pub fn enable_cdg_shadow(&mut self, v: bool) {
        self.cdg_use_shadow = v;
    }

    /// Check a configuration that was not built with the setters, e.g. one
    /// that was deserialized.
    pub fn validate(&self) -> Result<()> {
        Self::check_cdg_window(self.cdg_window)?;
        if self.max_segment_size == 0 {
            return Err(Error::InvalidConfig("max_segment_size is zero".into()));
        }
        if self.cdg_backoff_beta > 1024 {
            return Err(Error::InvalidConfig(format!(
                "cdg_backoff_beta {} exceeds 1024",
                self.cdg_backoff_beta
            )));
        }
        Ok(())
    }

    pub(crate) fn check_cdg_window(v: usize) -> Result<()> {
        if v != 0 && !v.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "cdg_window {} is not a power of two",
                v
            )));
        }
        if v > MAX_CDG_WINDOW {
            return Err(Error::InvalidConfig(format!(
                "cdg_window {} exceeds {}",
                v, MAX_CDG_WINDOW
            )));
        }
        Ok(())
    }
}

impl Serialize for RecoveryConfig {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        RecoveryConfig::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for RecoveryConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let conf = RecoveryConfig::deserialize(deserializer)?;
        conf.validate().map_err(serde::de::Error::custom)?;
        Ok(conf)
    }
}

impl Default for RecoveryConfig {
    fn default() -> RecoveryConfig {
        RecoveryConfig {
            congestion_control_algorithm: CongestionControlAlgorithm::Cdg,
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            initial_congestion_window: 10_u32,
            slow_start_thresh: u32::MAX,
            cwnd_clamp: u32::MAX,
            cdg_window: DEFAULT_CDG_WINDOW,
            cdg_backoff_beta: DEFAULT_CDG_BACKOFF_BETA,
            cdg_backoff_factor: DEFAULT_CDG_BACKOFF_FACTOR,
            cdg_ineffective_thresh: DEFAULT_CDG_INEFFECTIVE_THRESH,
            cdg_ineffective_hold: DEFAULT_CDG_INEFFECTIVE_HOLD,
            cdg_use_shadow: false,
        }
    }
}

impl fmt::Display for RecoveryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cca={:?} mss={} window={} beta={} factor={} ineffective={}/{} shadow={}",
            self.congestion_control_algorithm,
            self.max_segment_size,
            self.cdg_window,
            self.cdg_backoff_beta,
            self.cdg_backoff_factor,
            self.cdg_ineffective_thresh,
            self.cdg_ineffective_hold,
            self.cdg_use_shadow
        )
    }
}


#[path = "congestion_control/congestion_control.rs"]
pub mod congestion_control;

pub mod error;
pub mod seq;
pub mod socket_state;
