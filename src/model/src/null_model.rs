//! The background (null) model used to report bit scores relative to chance
//! (spec.md §9 item C.2: a regression test wants "bits relative to null").
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NullModelError {
    #[error("null model frequency table length {got} does not match alphabet size {expected}")]
    LengthMismatch { expected: usize, got: usize },
}

/// Per-residue background log-frequencies, plus the fixed per-residue
/// "random sequence" transition cost HMMER-family tools call `p1`.
#[derive(Debug, Clone)]
pub struct NullModel {
    log_freq: Vec<f32>,
    /// Log-odds cost of the null model's own residue-count geometric tail,
    /// i.e. `log(p1)` for the implicit single-state random generator.
    log_p1: f32,
}

impl NullModel {
    /// # Errors
    /// Returns [`NullModelError::LengthMismatch`] if `log_freq.len() !=
    /// alphabet_size`.
    pub fn new(log_freq: Vec<f32>, log_p1: f32, alphabet_size: usize) -> Result<Self, NullModelError> {
        if log_freq.len() != alphabet_size {
            return Err(NullModelError::LengthMismatch { expected: alphabet_size, got: log_freq.len() });
        }
        Ok(Self { log_freq, log_p1 })
    }

    /// A uniform null model: every residue equally likely.
    #[must_use]
    pub fn uniform(alphabet_size: usize, log_p1: f32) -> Self {
        let freq = -(alphabet_size as f32).ln();
        Self { log_freq: vec![freq; alphabet_size], log_p1 }
    }

    #[must_use]
    pub fn residue_score(&self, residue: u8) -> f32 {
        self.log_freq[usize::from(residue)]
    }

    #[must_use]
    pub fn log_p1(&self) -> f32 {
        self.log_p1
    }

    /// Total null-model log-odds for `length` independently drawn residues
    /// plus the geometric continuation cost, matching the denominator a
    /// per-residue profile score is normally reported relative to.
    #[must_use]
    pub fn null_score(&self, residues: &[u8]) -> f32 {
        let emission: f32 = residues.iter().map(|&r| self.residue_score(r)).sum();
        let continuation = self.log_p1 * (residues.len() as f32 + 1.0);
        emission + continuation
    }

    /// Converts a raw log-odds score into bits relative to this null model.
    #[must_use]
    pub fn bits(&self, raw_score: f32, residues: &[u8]) -> f32 {
        (raw_score - self.null_score(residues)) / std::f32::consts::LN_2
    }
}
