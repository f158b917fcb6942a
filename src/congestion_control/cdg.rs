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

//! CAIA Delay Gradient (CDG) congestion control.
//!
//! CDG tracks the minimum and maximum RTT seen in each round trip. The
//! differences between consecutive rounds form the delay gradients, which are
//! smoothed with a moving average over `window` rounds. A positive gradient
//! means a queue is building up, and the sender backs off with a probability
//! that grows with the gradient. Backoffs that do not reduce the delay are
//! judged ineffective (e.g. when competing with loss-based flows), and the
//! delay signal is then ignored for a while.
//!
//! See <https://caia.swin.edu.au/cv/dahayes/content/networking2011-cdg-preprint.pdf>
//! and <https://git.kernel.org/pub/scm/linux/kernel/git/torvalds/linux.git/tree/net/ipv4/tcp_cdg.c>.

use std::time::Duration;

use log::*;
use rand::rngs::StdRng;
use rand::RngCore;
use rand::SeedableRng;

use super::gradient::GradientHistory;
use super::minmax::MinMax;
use super::new_reno::NewReno;
use super::nexp::nexp_u32;
use super::CongestionController;
use super::CongestionEvent;
use super::CongestionStats;
use crate::seq::seq_after;
use crate::CongState;
use crate::DEFAULT_CDG_WINDOW;
use crate::RecoveryConfig;
use crate::Result;
use crate::TcpSocketState;

/// Upper bound of the delayed ACK compensation counter.
const MAX_DELACK: u32 = 5;

/// Random source for backoff decisions.
pub trait BackoffRng: RngCore + Clone + 'static {
    /// Return the source of a forked controller. Its draws must not repeat
    /// the parent's.
    fn fork(&self) -> Self;
}

impl BackoffRng for StdRng {
    fn fork(&self) -> Self {
        StdRng::from_entropy()
    }
}

/// Queue occupancy inferred from the smoothed gradients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueState {
    /// No inference since the last reset, CWR or ECN mark.
    #[default]
    Unknown,

    /// The minimum RTT grows while the maximum does not: the queue is full.
    Full,

    /// Both extremes grow, or the maximum shrinks: the queue is not full.
    NonFull,
}

/// CDG Configuration.
#[derive(Debug, Clone)]
pub struct CdgConfig {
    /// Number of rounds in the gradient moving average, zero or a power of
    /// two. Zero disables the gradient history.
    window: usize,

    /// Multiplicative decrease factor on backoff, in 1/1024.
    backoff_beta: u32,

    /// Scaling of the gradient in the backoff probability.
    backoff_factor: u32,

    /// Backoffs after which they are judged ineffective, zero to disable.
    ineffective_thresh: u32,

    /// Rounds to ignore the delay signal after ineffective backoffs.
    ineffective_hold: u32,

    /// Use the shadow window on loss.
    use_shadow: bool,
}

impl CdgConfig {
    /// Build the CDG configuration. An invalid gradient window, which can
    /// only be set through the public field, falls back to the default.
    pub fn from(conf: &RecoveryConfig) -> Self {
        let window = match RecoveryConfig::check_cdg_window(conf.cdg_window) {
            Ok(()) => conf.cdg_window,
            Err(e) => {
                warn!("CDG. {}, use window {}", e, DEFAULT_CDG_WINDOW);
                DEFAULT_CDG_WINDOW
            }
        };

        Self {
            window,
            backoff_beta: conf.cdg_backoff_beta,
            backoff_factor: conf.cdg_backoff_factor,
            ineffective_thresh: conf.cdg_ineffective_thresh,
            ineffective_hold: conf.cdg_ineffective_hold,
            use_shadow: conf.cdg_use_shadow,
        }
    }

    /// Update the gradient window, which must be zero or a power of two.
    pub fn set_window(&mut self, window: usize) -> Result<&mut Self> {
        RecoveryConfig::check_cdg_window(window)?;
        self.window = window;
        Ok(self)
    }

    /// Update backoff beta.
    pub fn set_backoff_beta(&mut self, beta: u32) -> &mut Self {
        self.backoff_beta = beta.min(1024);
        self
    }

    /// Update backoff factor.
    pub fn set_backoff_factor(&mut self, factor: u32) -> &mut Self {
        self.backoff_factor = factor;
        self
    }

    /// Update ineffective backoff threshold.
    pub fn set_ineffective_thresh(&mut self, thresh: u32) -> &mut Self {
        self.ineffective_thresh = thresh;
        self
    }

    /// Update ineffective backoff hold.
    pub fn set_ineffective_hold(&mut self, hold: u32) -> &mut Self {
        self.ineffective_hold = hold;
        self
    }

    /// Enable the shadow window.
    pub fn enable_shadow(&mut self, enable: bool) -> &mut Self {
        self.use_shadow = enable;
        self
    }
}

impl Default for CdgConfig {
    fn default() -> Self {
        Self::from(&RecoveryConfig::default())
    }
}

/// CDG congestion control algorithm.
///
/// The random source `R` only decides backoffs. Cloning the controller
/// deep-copies the gradient history and all counters, including the random
/// source. Forking also deep-copies the state but gives the fork its own
/// random source.
#[derive(Debug, Clone)]
pub struct Cdg<R = StdRng> {
    /// Configuration.
    config: CdgConfig,

    /// Random source for backoff decisions.
    rng: R,

    /// Inferred queue state.
    state: QueueState,

    /// RTT extremes in the current round, in microseconds.
    rtt: MinMax,

    /// RTT extremes in the previous round, in microseconds.
    rtt_prev: MinMax,

    /// Gradient history, `None` if disabled.
    gradients: Option<GradientHistory>,

    /// The round ends when this sequence number is acknowledged.
    rtt_seq: u32,

    /// Congestion window when the last loss was detected.
    loss_cwnd: u32,

    /// Window that ignores delay backoffs, used on loss.
    shadow_wnd: u32,

    /// Consecutive backoffs without a delay decrease.
    backoff_cnt: u32,

    /// Delayed ACK compensation counter.
    delack: u32,

    /// Whether the last ACK carried the ECN-CE mark.
    ecn_ce: bool,

    /// Window growth when the gradient history is disabled.
    reno: NewReno,

    /// Congestion statistics.
    stats: CongestionStats,
}

impl Cdg<StdRng> {
    pub fn new(config: CdgConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }
}

impl<R: BackoffRng> Cdg<R> {
    /// Create a CDG controller drawing backoff decisions from `rng`.
    pub fn with_rng(config: CdgConfig, rng: R) -> Self {
        let gradients = match config.window {
            0 => None,
            window => Some(GradientHistory::new(window)),
        };

        Self {
            config,
            rng,
            state: QueueState::Unknown,
            rtt: MinMax::default(),
            rtt_prev: MinMax::default(),
            gradients,
            rtt_seq: 0,
            loss_cwnd: 0,
            shadow_wnd: 0,
            backoff_cnt: 0,
            delack: 0,
            ecn_ce: false,
            reno: NewReno::new(),
            stats: Default::default(),
        }
    }

    /// Copy the controller for a forked connection, with a random source
    /// that draws independently of this one.
    pub fn forked(&self) -> Self {
        let mut cdg = self.clone();
        cdg.rng = self.rng.fork();
        cdg
    }

    /// Current inferred queue state.
    pub fn queue_state(&self) -> QueueState {
        self.state
    }

    /// Compute the delay gradient of the round that just ended, and roll the
    /// RTT extremes over to the next round.
    fn grad(&mut self, tcb: &TcpSocketState) -> i32 {
        let mut grad = 0;
        let cur = self.rtt;
        let prev = self.rtt_prev;

        let gradients = match self.gradients.as_mut() {
            Some(gradients) if !prev.is_empty() => Some(gradients),
            _ => None,
        };

        if let Some(gradients) = gradients {
            let g = MinMax::new(cur.min - prev.min, cur.max - prev.max);
            gradients.push(g);

            let s = gradients.smoothed();
            grad = Self::select_gradient(tcb, g, s);

            if s.min > 0 && s.max <= 0 {
                self.state = QueueState::Full;
            } else if (s.min > 0 && s.max > 0) || s.max < 0 {
                self.state = QueueState::NonFull;
            }

            // Empty queue.
            if s.min >= 0 && s.max < 0 {
                self.shadow_wnd = 0;
            }

            // Backoff was effectual.
            if s.min < 0 || s.max < 0 {
                self.backoff_cnt = 0;
            }

            trace!(
                "{}. gmin={} gmax={} gmin_s={} gmax_s={} grad={} state={:?}",
                self.name(),
                g.min,
                g.max,
                s.min,
                s.max,
                grad,
                self.state
            );
        }

        self.rtt_prev = self.rtt.take();
        self.stats.rounds = self.stats.rounds.saturating_add(1);
        grad
    }

    /// Pick the gradient that drives the backoff decision.
    fn select_gradient(tcb: &TcpSocketState, g: MinMax, s: MinMax) -> i32 {
        // Only use smoothed gradients in congestion avoidance.
        if !tcb.in_slow_start() {
            return if s.min > 0 { s.min } else { s.max };
        }

        // Prefer unsmoothed gradients in slow start.
        let grad = if g.min > 0 { g.min } else { s.min };
        if grad < 0 {
            if g.max > 0 {
                g.max
            } else {
                s.max
            }
        } else {
            grad
        }
    }

    /// Back off with probability 1 - exp(-grad * backoff_factor / 10^6) and
    /// enter CWR. Return true if the window is being reduced.
    fn backoff(&mut self, tcb: &mut TcpSocketState, grad: i32) -> bool {
        if grad <= 0 {
            return false;
        }

        let x = (grad as u64 * self.config.backoff_factor as u64).min(u32::MAX as u64);
        if self.rng.next_u32() <= nexp_u32(x as u32) {
            return false;
        }

        self.backoff_cnt = self.backoff_cnt.saturating_add(1);

        let thresh = self.config.ineffective_thresh;
        if thresh != 0 && self.backoff_cnt > thresh {
            if self.backoff_cnt >= thresh.saturating_add(self.config.ineffective_hold) {
                self.backoff_cnt = 0;
            }
            self.stats.ineffective_backoffs = self.stats.ineffective_backoffs.saturating_add(1);
            debug!(
                "{}. backoff ineffective, hold off, grad={} backoff_cnt={}",
                self.name(),
                grad,
                self.backoff_cnt
            );
            return false;
        }

        // No undo of this reduction.
        tcb.prior_ssthresh = 0;
        let ssthresh = (tcb.cwnd as u64 * self.config.backoff_beta as u64) >> 10;
        tcb.ssthresh = tcb.min_window().max(ssthresh as u32);
        tcb.prior_cwnd = tcb.cwnd;
        tcb.high_tx_mark = tcb.snd_nxt;
        tcb.cong_state = CongState::Cwr;

        self.shadow_wnd = self.shadow_wnd.max(tcb.cwnd);
        self.stats.backoffs = self.stats.backoffs.saturating_add(1);

        debug!(
            "{}. backoff, grad={} backoff_cnt={} cwnd={} ssthresh={}",
            self.name(),
            grad,
            self.backoff_cnt,
            tcb.cwnd,
            tcb.ssthresh
        );
        true
    }

    /// Forget all history, e.g. after an idle period.
    fn reset(&mut self, tcb: &TcpSocketState) {
        if let Some(gradients) = self.gradients.as_mut() {
            gradients.clear();
        }

        self.state = QueueState::Unknown;
        self.rtt.clear();
        self.rtt_prev.clear();
        self.loss_cwnd = 0;
        self.backoff_cnt = 0;
        self.delack = 0;
        self.ecn_ce = false;
        self.rtt_seq = tcb.snd_nxt;
        self.shadow_wnd = tcb.cwnd;
    }
}

impl<R: BackoffRng> CongestionController for Cdg<R> {
    fn name(&self) -> &str {
        "CDG"
    }

    fn init(&mut self, tcb: &TcpSocketState) {
        self.rtt_seq = tcb.snd_nxt;
        self.shadow_wnd = tcb.cwnd;
    }

    fn ssthresh(&mut self, tcb: &TcpSocketState, bytes_in_flight: u32) -> u32 {
        self.loss_cwnd = tcb.cwnd;
        self.stats.loss_events = self.stats.loss_events.saturating_add(1);

        if self.gradients.is_none() {
            return self.reno.ssthresh(tcb, bytes_in_flight);
        }

        // The queue was not judged full, so the ECN mark is not taken as a
        // reason to halve the window.
        if self.state == QueueState::NonFull && self.ecn_ce {
            debug!(
                "{}. keep cwnd {} on ECN-CE with non-full queue",
                self.name(),
                tcb.cwnd
            );
            return tcb.cwnd;
        }

        self.shadow_wnd = (self.shadow_wnd / 2).min(tcb.cwnd);
        if self.config.use_shadow {
            return tcb.min_window().max(self.shadow_wnd).max(tcb.cwnd / 2);
        }
        tcb.min_window().max(tcb.cwnd / 2)
    }

    fn increase_window(&mut self, tcb: &mut TcpSocketState, segments_acked: u32) {
        if self.gradients.is_none() {
            return self.reno.increase_window(tcb, segments_acked);
        }

        // Measure filtered gradients once per round trip.
        if seq_after(tcb.snd_una, self.rtt_seq) && !self.rtt.is_empty() {
            let grad = self.grad(tcb);
            self.rtt_seq = tcb.snd_nxt;

            if self.backoff(tcb, grad) {
                return;
            }
        } else if !tcb.in_slow_start() {
            // In congestion avoidance, synchronize growth with the gradients.
            return;
        }

        if tcb.in_slow_start() {
            let inc = segments_acked.saturating_mul(tcb.segment_size);
            if tcb.cwnd < tcb.cwnd_clamp {
                tcb.cwnd = tcb.cwnd.saturating_add(inc).min(tcb.cwnd_clamp);
            }
        } else if tcb.cwnd < tcb.cwnd_clamp {
            tcb.cwnd = tcb
                .cwnd
                .saturating_add(tcb.segment_size)
                .min(tcb.cwnd_clamp);
        }

        if self.shadow_wnd != 0 && self.shadow_wnd < tcb.cwnd_clamp {
            self.shadow_wnd = tcb
                .cwnd
                .max(self.shadow_wnd.saturating_add(tcb.segment_size));
        }
    }

    fn pkts_acked(&mut self, tcb: &mut TcpSocketState, segments_acked: u32, rtt: Duration) {
        let sample = rtt.as_micros().min(i32::MAX as u128) as i32;
        if sample <= 0 {
            return;
        }

        // A single-segment ACK following stretch ACKs may be delayed, and
        // only bounds the minimum.
        if segments_acked == 1 && self.delack > 0 {
            self.rtt.update_min(sample);
            self.delack -= 1;
            return;
        } else if segments_acked > 1 && self.delack < MAX_DELACK {
            self.delack += 1;
        }

        self.rtt.update(sample);
    }

    fn cwnd_event(&mut self, tcb: &mut TcpSocketState, event: CongestionEvent) {
        match event {
            CongestionEvent::EcnNoCe => {
                self.ecn_ce = false;
            }
            CongestionEvent::EcnIsCe => {
                self.ecn_ce = true;
                self.state = QueueState::Unknown;
                self.stats.ecn_ce_marks = self.stats.ecn_ce_marks.saturating_add(1);
            }
            CongestionEvent::CwndRestart => {
                self.reset(tcb);
                self.stats.cwnd_restarts = self.stats.cwnd_restarts.saturating_add(1);
                debug!("{}. cwnd restart, cwnd={}", self.name(), tcb.cwnd);
            }
            CongestionEvent::CompleteCwr => {
                self.state = QueueState::Unknown;
                self.rtt_seq = tcb.snd_nxt;
                self.rtt_prev = self.rtt.take();
            }
            _ => {}
        }
    }

    fn undo_cwnd(&self, tcb: &TcpSocketState) -> u32 {
        tcb.cwnd.max(self.loss_cwnd)
    }

    fn fork(&self) -> Box<dyn CongestionController> {
        Box::new(self.forked())
    }

    fn stats(&self) -> &CongestionStats {
        &self.stats
    }
}
