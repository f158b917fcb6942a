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

use strum_macros::Display;

use crate::RecoveryConfig;

/// Congestion state of the sender, as tracked by the host TCP stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum CongState {
    /// Normal state, no dubious events.
    #[default]
    Open,

    /// Dubious ACKs or SACKs were received.
    Disorder,

    /// The congestion window is being reduced following a local signal such
    /// as a delay-based backoff or an ECN echo.
    Cwr,

    /// Fast retransmit is in progress.
    Recovery,

    /// A retransmission timeout fired.
    Loss,
}

/// Window state shared between the host TCP stack and the congestion control
/// strategy.
///
/// Windows and thresholds are in bytes, sequence numbers are 32-bit and wrap.
#[derive(Debug, Clone)]
pub struct TcpSocketState {
    /// Congestion window in bytes.
    pub cwnd: u32,

    /// Slow start threshold in bytes.
    pub ssthresh: u32,

    /// Sender maximum segment size in bytes.
    pub segment_size: u32,

    /// Upper limit of the congestion window in bytes.
    pub cwnd_clamp: u32,

    /// Highest sequence number cumulatively acknowledged.
    pub snd_una: u32,

    /// Next sequence number to be sent, i.e. the send high water mark.
    pub snd_nxt: u32,

    /// Recovery point recorded when entering CWR or recovery.
    pub high_tx_mark: u32,

    /// Congestion window before the last reduction.
    pub prior_cwnd: u32,

    /// Slow start threshold before the last reduction. Zero prohibits undo.
    pub prior_ssthresh: u32,

    /// Current congestion state.
    pub cong_state: CongState,
}

impl TcpSocketState {
    pub fn new(segment_size: u32, initial_cwnd: u32, ssthresh: u32) -> Self {
        Self {
            cwnd: initial_cwnd,
            ssthresh,
            segment_size,
            cwnd_clamp: u32::MAX,
            snd_una: 0,
            snd_nxt: 0,
            high_tx_mark: 0,
            prior_cwnd: 0,
            prior_ssthresh: 0,
            cong_state: CongState::Open,
        }
    }

    /// Build the initial window state from the recovery configuration.
    pub fn from(conf: &RecoveryConfig) -> Self {
        let segment_size = conf.max_segment_size;
        let initial_cwnd = conf.initial_congestion_window.saturating_mul(segment_size);
        let ssthresh = conf.slow_start_thresh.saturating_mul(segment_size);

        let mut tcb = Self::new(segment_size, initial_cwnd, ssthresh);
        tcb.cwnd_clamp = conf.cwnd_clamp.saturating_mul(segment_size);
        tcb
    }

    /// Check if in slow start.
    pub fn in_slow_start(&self) -> bool {
        self.cwnd <= self.ssthresh
    }

    /// The smallest window a reduction may leave, two segments.
    pub fn min_window(&self) -> u32 {
        self.segment_size.saturating_mul(2)
    }
}

impl Default for TcpSocketState {
    fn default() -> Self {
        Self::from(&RecoveryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_state_from_config() {
        let mut conf = RecoveryConfig::default();
        conf.set_max_segment_size(1000);
        conf.set_initial_congestion_window(4);
        conf.set_slow_start_thresh(64);
        conf.set_cwnd_clamp(100);

        let tcb = TcpSocketState::from(&conf);
        assert_eq!(tcb.segment_size, 1000);
        assert_eq!(tcb.cwnd, 4000);
        assert_eq!(tcb.ssthresh, 64000);
        assert_eq!(tcb.cwnd_clamp, 100000);
        assert_eq!(tcb.min_window(), 2000);
        assert_eq!(tcb.cong_state, CongState::Open);
        assert!(tcb.in_slow_start());
    }

    #[test]
    fn socket_state_phases() {
        let mut tcb = TcpSocketState::new(1000, 10000, 10000);
        assert!(tcb.in_slow_start());

        tcb.cwnd += 1;
        assert!(!tcb.in_slow_start());

        tcb.cong_state = CongState::Cwr;
        assert_eq!(tcb.cong_state.to_string(), "Cwr");
    }
}
