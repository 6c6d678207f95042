//! Benchmarks the checkpointed striped-vector Forward pass at a RAM budget
//! far below what it would take to keep every row, exercising the
//! checkpoint-replay path `forward_filter_bench` has nothing to compare
//! against (the dense reference matrix always keeps every row).
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use phmm_filter::checkpointed::CheckpointedForward;
use phmm_model::logsum::init_logsum;
use phmm_model::prelude::*;
use phmm_model::sequence::DigitalSequence;

fn linear_profile(m: usize) -> Profile {
    let mut tsc = vec![[f32::NEG_INFINITY; NUM_TRANSITIONS]; m + 1];
    for k in 1..m {
        tsc[k][Transition::MmL.index()] = (0.7_f32).ln();
        tsc[k][Transition::MdL.index()] = (0.15_f32).ln();
        tsc[k][Transition::MiL.index()] = (0.15_f32).ln();
        tsc[k][Transition::IiL.index()] = (0.4_f32).ln();
        tsc[k][Transition::ImL.index()] = (0.6_f32).ln();
        tsc[k][Transition::DdL.index()] = (0.3_f32).ln();
        tsc[k][Transition::DmL.index()] = (0.7_f32).ln();
    }
    let bsc = (0..=m + 1).map(|k| if k >= 1 && k <= m { (1.0 / m as f32).ln() } else { f32::NEG_INFINITY }).collect();
    let esc = (0..=m + 1).map(|k| if k >= 1 && k <= m { -0.1_f32 } else { f32::NEG_INFINITY }).collect();
    let gm = vec![f32::NEG_INFINITY; m];
    let half = 0.5_f32.ln();
    let xsc = SpecialTransitions::new([
        [half, half],
        [(0.5_f32).ln(), (0.5_f32).ln()],
        [(0.5_f32).ln(), (0.5_f32).ln()],
        [0.0, f32::NEG_INFINITY],
        [half, half],
    ]);
    let match_scores = vec![0.1_f32; (m + 1) * 4];
    let insert_scores = vec![-0.1_f32; (m + 1) * 4];
    Profile::from_raw(
        m, 4, tsc, bsc, esc, gm, match_scores, insert_scores, xsc,
        Mode::new(Topology::LocalOnly, Multiplicity::Unihit, LengthModel::LengthL),
    ).unwrap()
}

fn bench_checkpointed_forward(c: &mut Criterion) {
    init_logsum();
    let mut group = c.benchmark_group("checkpointed_forward");
    for &(m, l, budget) in &[(50usize, 1000usize, 32usize), (200, 5000, 64)] {
        let profile = linear_profile(m);
        let seq = DigitalSequence::new(4, (0..l).map(|i| (i % 4) as u8).collect()).unwrap();
        group.bench_function(format!("m{m}_l{l}_budget{budget}"), |b| {
            b.iter(|| {
                let result = CheckpointedForward::run(black_box(&profile), black_box(&seq), budget).unwrap();
                black_box(result.total_score);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_checkpointed_forward);
criterion_main!(benches);
