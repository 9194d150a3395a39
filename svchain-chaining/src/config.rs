use std::fs::read_to_string;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use svchain_core::consts::{MIN_CHAINING_PLOIDY, MIN_TEMPLATED_INSERTION_LENGTH};

#[derive(Error, Debug)]
pub enum ChainingConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("Invalid chaining config: {0}")]
    InvalidValue(String),
}

pub type ChainingConfigResult<T> = std::result::Result<T, ChainingConfigError>;

///
/// Tunables for a chaining run. Missing keys fall back to their defaults.
///
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ChainingConfig {
    /// Variants at or below this ploidy get no connection state.
    pub min_chaining_ploidy: f64,
    /// Assembly-confirmed links may consume a breakend up to its maximum ploidy.
    pub assembly_uses_max_ploidy: bool,
    /// Upper bound on proposer rounds per cluster.
    pub max_proposal_rounds: usize,
    pub min_templated_insertion_length: u32,
}

impl Default for ChainingConfig {
    fn default() -> Self {
        ChainingConfig {
            min_chaining_ploidy: MIN_CHAINING_PLOIDY,
            assembly_uses_max_ploidy: true,
            max_proposal_rounds: 10_000,
            min_templated_insertion_length: MIN_TEMPLATED_INSERTION_LENGTH,
        }
    }
}

impl ChainingConfig {
    pub fn from_toml_str(toml_str: &str) -> ChainingConfigResult<Self> {
        let config: ChainingConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ChainingConfigResult<()> {
        if !(self.min_chaining_ploidy >= 0.0) {
            return Err(ChainingConfigError::InvalidValue(format!(
                "min_chaining_ploidy must be non-negative, got {}",
                self.min_chaining_ploidy
            )));
        }
        if self.max_proposal_rounds == 0 {
            return Err(ChainingConfigError::InvalidValue(
                "max_proposal_rounds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl TryFrom<&Path> for ChainingConfig {
    type Error = ChainingConfigError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let toml_str = read_to_string(path)?;
        ChainingConfig::from_toml_str(&toml_str)
    }
}
