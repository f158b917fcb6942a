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

use log::*;

use super::CongestionController;
use super::CongestionStats;
use crate::TcpSocketState;

/// NewReno congestion control algorithm.
///
/// See <https://www.rfc-editor.org/rfc/rfc5681.html> and
/// <https://www.rfc-editor.org/rfc/rfc6582.html>.
#[derive(Debug, Clone, Default)]
pub struct NewReno {
    /// Congestion statistics.
    stats: CongestionStats,
}

impl NewReno {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow the window by one segment if in slow start, and return the
    /// segments that are left for congestion avoidance.
    fn slow_start(&self, tcb: &mut TcpSocketState, segments_acked: u32) -> u32 {
        if segments_acked >= 1 {
            tcb.cwnd = tcb.cwnd.saturating_add(tcb.segment_size);
            trace!(
                "{}. in slow start, cwnd={} ssthresh={}",
                self.name(),
                tcb.cwnd,
                tcb.ssthresh
            );
            return segments_acked - 1;
        }
        0
    }

    /// Grow the window by about one segment per round trip.
    fn congestion_avoidance(&self, tcb: &mut TcpSocketState, segments_acked: u32) {
        if segments_acked > 0 {
            let seg = tcb.segment_size as u64;
            let adder = (seg * seg / (tcb.cwnd as u64).max(1)).max(1);
            tcb.cwnd = tcb.cwnd.saturating_add(adder as u32);
            trace!(
                "{}. in congestion avoidance, cwnd={} ssthresh={}",
                self.name(),
                tcb.cwnd,
                tcb.ssthresh
            );
        }
    }
}

impl CongestionController for NewReno {
    fn name(&self) -> &str {
        "NEWRENO"
    }

    fn ssthresh(&mut self, tcb: &TcpSocketState, bytes_in_flight: u32) -> u32 {
        self.stats.loss_events = self.stats.loss_events.saturating_add(1);
        tcb.min_window().max(bytes_in_flight / 2)
    }

    fn increase_window(&mut self, tcb: &mut TcpSocketState, mut segments_acked: u32) {
        if tcb.cwnd < tcb.ssthresh {
            segments_acked = self.slow_start(tcb, segments_acked);
        }

        if tcb.cwnd >= tcb.ssthresh {
            self.congestion_avoidance(tcb, segments_acked);
        }
    }

    fn fork(&self) -> Box<dyn CongestionController> {
        Box::new(self.clone())
    }

    fn stats(&self) -> &CongestionStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_reno_init() {
        let r = NewReno::new();
        assert_eq!(r.name(), "NEWRENO");
        assert_eq!(r.stats(), &CongestionStats::default());

        let tcb = TcpSocketState::new(1000, 10000, 20000);
        assert_eq!(r.undo_cwnd(&tcb), 10000);
    }

    #[test]
    fn new_reno_slow_start() {
        let mut r = NewReno::new();
        let mut tcb = TcpSocketState::new(1000, 4000, 20000);

        // One segment per call in slow start.
        r.increase_window(&mut tcb, 1);
        assert_eq!(tcb.cwnd, 5000);

        r.increase_window(&mut tcb, 3);
        assert_eq!(tcb.cwnd, 6000);

        r.increase_window(&mut tcb, 0);
        assert_eq!(tcb.cwnd, 6000);
    }

    #[test]
    fn new_reno_slow_start_to_congestion_avoidance() {
        let mut r = NewReno::new();
        let mut tcb = TcpSocketState::new(1000, 9000, 10000);

        // The first segment ends slow start, the second is used in
        // congestion avoidance: 1000 * 1000 / 10000 = 100.
        r.increase_window(&mut tcb, 2);
        assert_eq!(tcb.cwnd, 10100);
    }

    #[test]
    fn new_reno_congestion_avoidance() {
        let mut r = NewReno::new();
        let mut tcb = TcpSocketState::new(1000, 10000, 5000);

        r.increase_window(&mut tcb, 1);
        assert_eq!(tcb.cwnd, 10100);

        // The increment is at least one byte.
        let mut tcb = TcpSocketState::new(10, 1_000_000, 5000);
        r.increase_window(&mut tcb, 1);
        assert_eq!(tcb.cwnd, 1_000_001);
    }

    #[test]
    fn new_reno_ssthresh() {
        let mut r = NewReno::new();
        let tcb = TcpSocketState::new(1000, 10000, 5000);

        assert_eq!(r.ssthresh(&tcb, 30000), 15000);
        assert_eq!(r.ssthresh(&tcb, 1000), 2000);
        assert_eq!(r.stats().loss_events, 2);
    }

    #[test]
    fn new_reno_fork() {
        let mut r = NewReno::new();
        let tcb = TcpSocketState::new(1000, 10000, 5000);
        r.ssthresh(&tcb, 30000);

        let forked = r.fork();
        assert_eq!(forked.name(), "NEWRENO");
        assert_eq!(forked.stats().loss_events, 1);
    }
}
