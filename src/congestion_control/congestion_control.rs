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

#![allow(unused_variables)]

use core::str::FromStr;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use strum_macros::EnumIter;

use crate::Error;
use crate::RecoveryConfig;
use crate::Result;
use crate::TcpSocketState;
pub use cdg::BackoffRng;
pub use cdg::Cdg;
pub use cdg::CdgConfig;
pub use cdg::QueueState;
pub use new_reno::NewReno;
pub use nexp::nexp_u32;

/// Available congestion control algorithm
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum CongestionControlAlgorithm {
    /// CDG (CAIA Delay Gradient) uses the gradient of the minimum and maximum
    /// round-trip time measured in each round trip to detect queue growth
    /// and backs off probabilistically before loss occurs. It tolerates
    /// non-congestion related losses and coexists with loss-based flows.
    #[default]
    Cdg,

    /// NewReno grows the window exponentially in slow start and by about one
    /// segment per round trip in congestion avoidance, and halves it on
    /// loss.
    NewReno,
}

impl FromStr for CongestionControlAlgorithm {
    type Err = Error;

    fn from_str(algor: &str) -> Result<CongestionControlAlgorithm> {
        if algor.eq_ignore_ascii_case("cdg") {
            Ok(CongestionControlAlgorithm::Cdg)
        } else if algor.eq_ignore_ascii_case("newreno") || algor.eq_ignore_ascii_case("reno") {
            Ok(CongestionControlAlgorithm::NewReno)
        } else {
            Err(Error::InvalidConfig("unknown".into()))
        }
    }
}

/// Congestion events signalled by the host stack.
#[derive(Eq, PartialEq, Debug, Clone, Copy, EnumIter)]
pub enum CongestionEvent {
    /// First transmission when no packets are in flight.
    TxStart,

    /// Congestion window restart after an idle period.
    CwndRestart,

    /// End of congestion window reduction.
    CompleteCwr,

    /// Retransmission timeout.
    Loss,

    /// An ACK without the ECN-CE mark was received.
    EcnNoCe,

    /// An ACK with the ECN-CE mark was received.
    EcnIsCe,

    /// A delayed ACK was sent.
    DelayedAck,

    /// A non-delayed ACK was sent.
    NonDelayedAck,
}

/// Congestion control statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CongestionStats {
    /// Total round trips in which a delay gradient was measured.
    pub rounds: u64,

    /// Total delay-based backoffs.
    pub backoffs: u64,

    /// Total backoffs suppressed because earlier ones were ineffective.
    pub ineffective_backoffs: u64,

    /// Total loss events, i.e. slow start threshold computations.
    pub loss_events: u64,

    /// Total ECN-CE marks received.
    pub ecn_ce_marks: u64,

    /// Total congestion window restarts.
    pub cwnd_restarts: u64,
}

/// Congestion control interfaces shared by different algorithms.
///
/// The host stack owns the window state and passes it to each callback.
pub trait CongestionController {
    /// Name of congestion control algorithm.
    fn name(&self) -> &str;

    /// Callback when the connection is established.
    fn init(&mut self, tcb: &TcpSocketState) {}

    /// Compute the slow start threshold after a loss.
    fn ssthresh(&mut self, tcb: &TcpSocketState, bytes_in_flight: u32) -> u32;

    /// Callback for growing the congestion window on an ACK.
    fn increase_window(&mut self, tcb: &mut TcpSocketState, segments_acked: u32);

    /// Callback for each ACK carrying an RTT sample.
    fn pkts_acked(&mut self, tcb: &mut TcpSocketState, segments_acked: u32, rtt: Duration) {}

    /// Congestion event.
    fn cwnd_event(&mut self, tcb: &mut TcpSocketState, event: CongestionEvent) {}

    /// Congestion window to restore when a loss turns out to be spurious.
    fn undo_cwnd(&self, tcb: &TcpSocketState) -> u32 {
        tcb.cwnd
    }

    /// Create an independent copy for a forked connection.
    fn fork(&self) -> Box<dyn CongestionController>;

    /// Congestion stats.
    fn stats(&self) -> &CongestionStats;
}

impl fmt::Debug for dyn CongestionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "congestion controller {}.", self.name())
    }
}

/// Build a congestion controller.
pub fn build_congestion_controller(conf: &RecoveryConfig) -> Box<dyn CongestionController> {
    match conf.congestion_control_algorithm {
        CongestionControlAlgorithm::Cdg => Box::new(Cdg::new(CdgConfig::from(conf))),
        CongestionControlAlgorithm::NewReno => Box::new(NewReno::new()),
    }
}


mod cdg;
mod gradient;
mod minmax;
mod new_reno;
mod nexp;
