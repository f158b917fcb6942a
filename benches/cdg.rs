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

use std::time::Duration;

use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;

use tcp_cdg::build_congestion_controller;
use tcp_cdg::congestion_control::nexp_u32;
use tcp_cdg::CongestionControlAlgorithm;
use tcp_cdg::RecoveryConfig;
use tcp_cdg::TcpSocketState;

const ACKS_PER_ROUND: u32 = 32;

fn ack_benchmark(c: &mut Criterion, algor: CongestionControlAlgorithm, name: &str) {
    let mut conf = RecoveryConfig::default();
    conf.set_congestion_control_algorithm(algor);
    conf.set_max_segment_size(1000);

    let mut cc = build_congestion_controller(&conf);
    let mut tcb = TcpSocketState::from(&conf);
    cc.init(&tcb);

    let mut acked = 0_u32;
    c.bench_function(name, |b| {
        b.iter(|| {
            acked = acked.wrapping_add(1);
            let rtt = Duration::from_micros(20_000 + (acked % 97) as u64 * 10);
            tcb.snd_nxt = tcb.snd_nxt.wrapping_add(tcb.segment_size);
            if acked % ACKS_PER_ROUND == 0 {
                tcb.snd_una = tcb.snd_nxt;
            }
            cc.pkts_acked(&mut tcb, 1, rtt);
            cc.increase_window(&mut tcb, black_box(1));

            // Keep the window bounded.
            if tcb.cwnd > 1000 * tcb.segment_size {
                let ssthresh = cc.ssthresh(&tcb, tcb.cwnd);
                tcb.ssthresh = ssthresh;
                tcb.cwnd = ssthresh;
            }
        })
    });
}

pub fn cdg_ack_benchmark(c: &mut Criterion) {
    ack_benchmark(c, CongestionControlAlgorithm::Cdg, "cdg ack");
}

pub fn new_reno_ack_benchmark(c: &mut Criterion) {
    ack_benchmark(c, CongestionControlAlgorithm::NewReno, "newreno ack");
}

pub fn nexp_benchmark(c: &mut Criterion) {
    let mut ux = 0_u32;
    c.bench_function("nexp", |b| {
        b.iter(|| {
            ux = ux.wrapping_add(3331) & 0x00ff_ffff;
            nexp_u32(black_box(ux))
        })
    });
}

criterion_group!(
    benches,
    cdg_ack_benchmark,
    new_reno_ack_benchmark,
    nexp_benchmark
);
criterion_main!(benches);
