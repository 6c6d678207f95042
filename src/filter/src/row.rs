//! One physical row of the checkpointed Forward/Backward filter: six
//! striped probability-space state vectors plus a trailing special-state
//! block (spec.md §3 "Checkpointed striped matrix").
use crate::layout::StripeLayout;

/// The per-row special-state slots the checkpointed filter keeps: the nine
/// named in spec.md §3 plus the trailing `Scale` slot spec.md §4.10 adds
/// for this layout specifically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum FilterSpecial {
    E = 0,
    N,
    Jj,
    J,
    B,
    L,
    G,
    Cc,
    C,
    Scale,
}
pub const NUM_FILTER_SPECIAL: usize = 10;

/// A single checkpointed row: probability-space (not log-space) state,
/// rescaled whenever its magnitude threatens `f32` range (spec.md §4.10,
/// §9 "Scaled single-precision in the checkpointed filter").
#[derive(Debug, Clone)]
pub struct StripedRow {
    pub ml: Vec<f32>,
    pub mg: Vec<f32>,
    pub il: Vec<f32>,
    pub ig: Vec<f32>,
    pub dl: Vec<f32>,
    pub dg: Vec<f32>,
    pub special: [f32; NUM_FILTER_SPECIAL],
}

/// Cells are rescaled once their magnitude exceeds this; chosen well within
/// `f32::MAX` so a handful of further multiplications before the next
/// rescale check can't overflow.
pub const RESCALE_THRESHOLD: f32 = 1e30;

impl StripedRow {
    #[must_use]
    pub fn zeros(layout: &StripeLayout) -> Self {
        let n = layout.len();
        Self {
            ml: vec![0.0; n],
            mg: vec![0.0; n],
            il: vec![0.0; n],
            ig: vec![0.0; n],
            dl: vec![0.0; n],
            dg: vec![0.0; n],
            special: [0.0; NUM_FILTER_SPECIAL],
        }
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.special[FilterSpecial::Scale as usize]
    }

    /// The largest magnitude across every main-state cell in this row.
    #[must_use]
    fn row_max(&self) -> f32 {
        [&self.ml, &self.mg, &self.il, &self.ig, &self.dl, &self.dg]
            .iter()
            .flat_map(|v| v.iter().copied())
            .fold(0.0_f32, f32::max)
    }

    /// Rescale every main cell (and `E`) by `1/row_max()` if it exceeds
    /// [`RESCALE_THRESHOLD`], returning the linear scale factor applied
    /// (`1.0` if no rescale happened). Callers accumulate `ln(factor)`
    /// across rows to recover the unscaled score (spec.md §4.10's
    /// invariant: "product of row scale factors times C(L) equals the
    /// unscaled Forward value").
    pub fn rescale_if_needed(&mut self) -> f32 {
        let max = self.row_max();
        if max <= RESCALE_THRESHOLD || max == 0.0 {
            self.special[FilterSpecial::Scale as usize] = 1.0;
            return 1.0;
        }
        let factor = 1.0 / max;
        for v in [&mut self.ml, &mut self.mg, &mut self.il, &mut self.ig, &mut self.dl, &mut self.dg] {
            for cell in v.iter_mut() {
                *cell *= factor;
            }
        }
        // Every special slot but `Scale` itself must scale along with the
        // main cells they were derived from, or the next row's reads of
        // `prev.special[..]` would mix scales with `prev.ml`/etc.
        for slot in [FilterSpecial::E, FilterSpecial::N, FilterSpecial::Jj, FilterSpecial::J, FilterSpecial::B, FilterSpecial::L, FilterSpecial::G, FilterSpecial::Cc, FilterSpecial::C] {
            self.special[slot as usize] *= factor;
        }
        self.special[FilterSpecial::Scale as usize] = factor;
        factor
    }
}
