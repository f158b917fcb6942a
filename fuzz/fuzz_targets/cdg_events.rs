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

#![no_main]

use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use strum::IntoEnumIterator;

use tcp_cdg::build_congestion_controller;
use tcp_cdg::seq::seq_before;
use tcp_cdg::CongestionEvent;
use tcp_cdg::RecoveryConfig;
use tcp_cdg::TcpSocketState;

fuzz_target!(|data: &[u8]| {
    let mut conf = RecoveryConfig::default();
    if let Some(&b) = data.first() {
        let _ = conf.set_cdg_window(1 << (b % 9));
        conf.enable_cdg_shadow(b & 0x80 != 0);
    }

    let mut cc = build_congestion_controller(&conf);
    let mut tcb = TcpSocketState::from(&conf);
    tcb.snd_nxt = u32::MAX - 4096;
    tcb.snd_una = tcb.snd_nxt;
    cc.init(&tcb);

    let events: Vec<CongestionEvent> = CongestionEvent::iter().collect();

    for chunk in data.chunks_exact(4).skip(1) {
        let arg = u16::from_le_bytes([chunk[1], chunk[2]]);
        match chunk[0] % 6 {
            0 => {
                let rtt = Duration::from_micros(arg as u64 * (chunk[3] as u64 + 1));
                cc.pkts_acked(&mut tcb, (chunk[3] % 4) as u32, rtt);
            }
            1 => {
                tcb.snd_nxt = tcb.snd_nxt.wrapping_add(arg as u32);
            }
            2 => {
                let una = tcb.snd_una.wrapping_add(arg as u32);
                if una == tcb.snd_nxt || seq_before(una, tcb.snd_nxt) {
                    tcb.snd_una = una;
                }
                cc.increase_window(&mut tcb, (chunk[3] % 8) as u32);
            }
            3 => {
                let ssthresh = cc.ssthresh(&tcb, tcb.cwnd);
                assert!(ssthresh >= tcb.min_window() || ssthresh == tcb.cwnd);
                tcb.ssthresh = ssthresh;
                tcb.cwnd = ssthresh;
            }
            4 => {
                let event = events[chunk[3] as usize % events.len()];
                cc.cwnd_event(&mut tcb, event);
            }
            _ => {
                tcb.cwnd = cc.undo_cwnd(&tcb);
            }
        }
        assert!(tcb.cwnd <= tcb.cwnd_clamp);
    }
});
