//! Single-precision log-space addition: `logsum(a, b) = log(e^a + e^b)`.
//!
//! Two variants are provided, per spec:
//!   - [`logsum_exact`]: computed via `f64` intermediate math, accurate to
//!     better than `1e-4` nats.
//!   - [`logsum`]: the fast, allocation-free, branch-predictable path used by
//!     every DP hot loop. Beyond a fixed cutoff it collapses to `max(a, b)`;
//!     inside the cutoff it adds a precomputed, quantised correction term
//!     read from a table that is built once and never mutated again.
//!
//! The table is a process-wide, lazily-initialized, read-only-after-init
//! resource: any number of threads may call [`logsum`] concurrently once the
//! first call (or an explicit [`init_logsum`]) has built it. This matches
//! the concurrency contract in spec.md §5: "a LogSum lookup table is
//! read-only after initialisation and may be shared."
use std::sync::OnceLock;

/// Quantisation resolution: one table entry per `1 / LOGSUM_SCALE` nats of
/// difference between the two operands.
const LOGSUM_SCALE: f32 = 1000.0;

/// Beyond this difference, `log(1 + exp(-diff))` is smaller than `1e-5` nats
/// and is indistinguishable from zero at single-precision, so the fast path
/// collapses to `max(a, b)` directly rather than growing the table further.
const LOGSUM_CUTOFF: f32 = 12.0;

const LOGSUM_TBL_LEN: usize = (LOGSUM_CUTOFF * LOGSUM_SCALE) as usize + 1;

struct LogSumTable {
    corrections: Vec<f32>,
}

impl LogSumTable {
    fn build() -> Self {
        let corrections = (0..LOGSUM_TBL_LEN)
            .map(|i| {
                let x = f64::from(i as u32) / f64::from(LOGSUM_SCALE);
                (1.0_f64 + (-x).exp()).ln() as f32
            })
            .collect();
        Self { corrections }
    }
}

static TABLE: OnceLock<LogSumTable> = OnceLock::new();

/// Build the fast-path lookup table. Idempotent; safe to call from multiple
/// threads or multiple times. Calling this before the first [`logsum`] call
/// is recommended but not required -- [`logsum`] initializes it lazily on
/// first use via the same `OnceLock`.
pub fn init_logsum() {
    TABLE.get_or_init(LogSumTable::build);
}

/// Fast, table-driven `log(e^a + e^b)`. Commutative and monotone. Tolerated
/// error is at most `0.01` nat. `-inf` operands behave as the additive
/// identity (`logsum(-inf, b) == b`).
#[must_use]
pub fn logsum(a: f32, b: f32) -> f32 {
    if a == f32::NEG_INFINITY {
        return b;
    }
    if b == f32::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    let diff = hi - lo;
    if diff >= LOGSUM_CUTOFF {
        return hi;
    }
    let table = TABLE.get_or_init(LogSumTable::build);
    let idx = (diff * LOGSUM_SCALE) as usize;
    hi + table.corrections[idx.min(table.corrections.len() - 1)]
}

/// Exact `log(e^a + e^b)`, computed via `f64` intermediates. Tolerated error
/// is at most `1e-4` nat. Used by property tests and by callers that need
/// tighter precision than the fast path offers (e.g. brute-force reference
/// scores in scenario tests).
#[must_use]
pub fn logsum_exact(a: f32, b: f32) -> f32 {
    if a == f32::NEG_INFINITY {
        return b;
    }
    if b == f32::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    let diff = f64::from(lo) - f64::from(hi);
    (f64::from(hi) + diff.exp().ln_1p()) as f32
}
