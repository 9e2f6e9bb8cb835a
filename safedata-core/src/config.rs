use serde::{Deserialize, Serialize};

use crate::errors::{PrivacyError, PrivacyResult};
use crate::generalize::{BinningPolicy, AGE_COLUMN};

pub const MIN_NOISE_SCALE: u32 = 100;
pub const MAX_NOISE_SCALE: u32 = 5_000;
pub const DEFAULT_NOISE_SCALE: u32 = 1_500;
pub const DEFAULT_SEED: u64 = 42;
pub const MAX_SEED: u64 = 9_999_999;

/// Which question the post-transform score answers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RescoreStrategy {
    /// Re-score without the generalized column.
    #[default]
    DropGeneralized,
    /// Generalize the reference table with the same policy and keep the column.
    GeneralizeReference,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GeneralizationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_column")]
    pub column: String,
    #[serde(default)]
    pub policy: BinningPolicy,
}

fn default_enabled() -> bool {
    true
}

fn default_column() -> String {
    AGE_COLUMN.to_string()
}

impl Default for GeneralizationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            column: default_column(),
            policy: BinningPolicy::age_bands(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnonymizerConfig {
    #[serde(default = "default_noise_scale")]
    pub noise_scale: u32,
    /// `None` draws from OS entropy on every run.
    #[serde(default = "default_seed")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub rescore_strategy: RescoreStrategy,
    #[serde(default)]
    pub generalization: GeneralizationConfig,
}

const fn default_noise_scale() -> u32 {
    DEFAULT_NOISE_SCALE
}

const fn default_seed() -> Option<u64> {
    Some(DEFAULT_SEED)
}

impl Default for AnonymizerConfig {
    fn default() -> Self {
        Self {
            noise_scale: default_noise_scale(),
            seed: default_seed(),
            rescore_strategy: RescoreStrategy::default(),
            generalization: GeneralizationConfig::default(),
        }
    }
}

impl AnonymizerConfig {
    pub fn validate(&self) -> PrivacyResult<()> {
        if !(MIN_NOISE_SCALE..=MAX_NOISE_SCALE).contains(&self.noise_scale) {
            return Err(PrivacyError::InvalidParameter {
                parameter: "noise-scale",
                reason: format!(
                    "{} is outside {MIN_NOISE_SCALE}..={MAX_NOISE_SCALE}",
                    self.noise_scale
                ),
            });
        }
        if let Some(seed) = self.seed {
            if seed > MAX_SEED {
                return Err(PrivacyError::InvalidParameter {
                    parameter: "seed",
                    reason: format!("{seed} exceeds {MAX_SEED}"),
                });
            }
        }
        if self.generalization.enabled && self.generalization.column.is_empty() {
            return Err(PrivacyError::InvalidParameter {
                parameter: "generalization column",
                reason: "column name is empty".into(),
            });
        }
        Ok(())
    }
}
