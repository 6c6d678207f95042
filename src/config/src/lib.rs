//! `phmm-config`: the engine-wide tunables that every DP crate reads but
//! none of them decide for itself -- RAM budget, LogSum precision, worker
//! thread count, and posterior-decoding thresholds (spec.md §5/§9).
//!
//! This crate owns validation only; it is not a CLI (argument parsing and
//! environment wiring are an embedder's concern, same as `phmm-model`'s
//! disclaimer that profile construction from a multiple sequence alignment
//! is out of scope).
use std::path::Path;

use located_error::LocatedError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which [`phmm_model`]-style LogSum implementation a run should use.
///
/// `Exact` computes `log(e^a+e^b)` via `f64` intermediates
/// (`phmm_model::logsum::logsum_exact`); `Fast` uses the quantised
/// lookup-table path (`phmm_model::logsum::logsum`). Production runs default
/// to `Fast`; `Exact` exists for the brute-force/enumeration test surface
/// where table quantisation error would obscure a genuine bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSumPrecision {
    Fast,
    Exact,
}

impl Default for LogSumPrecision {
    fn default() -> Self {
        LogSumPrecision::Fast
    }
}

/// Errors validating an [`EngineConfig`].
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("ram_budget_bytes must be > 0, got {0}")]
    ZeroRamBudget(u64),

    #[error("threads must be > 0, got {0}")]
    ZeroThreads(usize),

    #[error("posterior_decoding_threshold must be in (0.0, 1.0], got {0}")]
    InvalidPosteriorThreshold(f32),

    #[error("checkpoint_target_rows must be > 0, got {0}")]
    ZeroCheckpointTargetRows(usize),
}

/// The full set of engine tunables (spec.md §5 "Resource model", §9 "LogSum
/// table sizing").
///
/// Every field has a sensible default via [`EngineConfig::default`];
/// construct with [`EngineConfig::builder`] or mutate a `default()` instance
/// directly, then call [`EngineConfig::validate`] before using it (every
/// constructor path in this crate calls it for you).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Soft cap on total DP-matrix memory, in bytes. The checkpointed
    /// Forward/Backward implementation (spec.md §4.10) uses this to pick
    /// its checkpoint spacing.
    pub ram_budget_bytes: u64,

    /// Worker thread count for any `rayon`-parallelised fan-out (e.g. many
    /// independent profile/sequence pairs scored concurrently).
    pub threads: usize,

    /// Which LogSum implementation to use.
    pub logsum_precision: LogSumPrecision,

    /// Posterior-decoding cells below this probability are treated as
    /// noise by callers building a sparse mask from a `Decoding` matrix
    /// (spec.md §4.11 "sparse DP surface").
    pub posterior_decoding_threshold: f32,

    /// Target number of rows between checkpoints in the striped-vector
    /// Forward/Backward (spec.md §4.10); smaller values trade more
    /// recomputation during Backward for less peak memory.
    pub checkpoint_target_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ram_budget_bytes: 512 * 1024 * 1024,
            threads: 1,
            logsum_precision: LogSumPrecision::Fast,
            posterior_decoding_threshold: 0.01,
            checkpoint_target_rows: 1000,
        }
    }
}

impl EngineConfig {
    /// Validate every field's invariant.
    ///
    /// # Errors
    /// The first [`ConfigError`] hit, checked in field-declaration order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ram_budget_bytes == 0 {
            return Err(ConfigError::ZeroRamBudget(self.ram_budget_bytes));
        }
        if self.threads == 0 {
            return Err(ConfigError::ZeroThreads(self.threads));
        }
        if !(self.posterior_decoding_threshold > 0.0 && self.posterior_decoding_threshold <= 1.0) {
            return Err(ConfigError::InvalidPosteriorThreshold(self.posterior_decoding_threshold));
        }
        if self.checkpoint_target_rows == 0 {
            return Err(ConfigError::ZeroCheckpointTargetRows(self.checkpoint_target_rows));
        }
        Ok(())
    }

    /// Load a validated config from a TOML string.
    ///
    /// # Errors
    /// [`LoadError::Toml`] on malformed TOML, [`LoadError::Config`] if the
    /// parsed config fails [`EngineConfig::validate`].
    pub fn from_toml_str(s: &str) -> Result<Self, LoadError> {
        let config: Self = toml::from_str(s).map_err(LoadError::Toml)?;
        config.validate().map_err(LoadError::Config)?;
        log::debug!("loaded engine config: threads={}, ram_budget_bytes={}", config.threads, config.ram_budget_bytes);
        Ok(config)
    }

    /// Load a validated config from a TOML file on disk, the one IO
    /// boundary this crate owns (the core itself never touches a
    /// filesystem, per spec.md §6's "does not read/write files").
    ///
    /// # Errors
    /// An [`anyhow::Error`] carrying the failing file path/line in its
    /// context, wrapping either an IO failure or a [`LoadError`].
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path).with_loc(|| format!("failed to read engine config from {}", path.display()))?;
        Self::from_toml_str(&contents).with_loc(|| format!("failed to parse engine config loaded from {}", path.display()))
    }
}

/// Errors loading an [`EngineConfig`] from a serialized source.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("malformed config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
}

pub mod prelude {
    pub use crate::{ConfigError, EngineConfig, LoadError, LogSumPrecision};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_ram_budget() {
        let mut config = EngineConfig::default();
        config.ram_budget_bytes = 0;
        pretty_assertions::assert_eq!(config.validate().unwrap_err(), ConfigError::ZeroRamBudget(0));
    }

    #[test]
    fn rejects_zero_threads() {
        let mut config = EngineConfig::default();
        config.threads = 0;
        assert_eq!(config.validate().unwrap_err(), ConfigError::ZeroThreads(0));
    }

    #[test]
    fn rejects_out_of_range_posterior_threshold() {
        let mut config = EngineConfig::default();
        config.posterior_decoding_threshold = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPosteriorThreshold(_))));
        config.posterior_decoding_threshold = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPosteriorThreshold(_))));
    }

    #[test]
    fn loads_from_toml_with_partial_overrides() {
        let config = EngineConfig::from_toml_str("threads = 8\nlogsum_precision = \"exact\"\n").unwrap();
        assert_eq!(config.threads, 8);
        assert_eq!(config.logsum_precision, LogSumPrecision::Exact);
        assert_eq!(config.ram_budget_bytes, EngineConfig::default().ram_budget_bytes);
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = EngineConfig::from_toml_str("threads = \"not a number\"").unwrap_err();
        assert!(matches!(err, LoadError::Toml(_)));
    }

    #[test]
    fn loads_from_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "threads = 4\n").unwrap();
        let config = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(config.threads, 4);
    }

    #[test]
    fn load_from_file_reports_located_context_for_a_missing_file() {
        let err = EngineConfig::load_from_file(Path::new("/nonexistent/engine.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read engine config"));
    }
}
