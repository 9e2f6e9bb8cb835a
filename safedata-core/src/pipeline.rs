//! Score → transform → re-score.

use std::borrow::Cow;

use tracing::{info, warn};

use crate::config::{AnonymizerConfig, RescoreStrategy};
use crate::errors::PrivacyResult;
use crate::generalize::generalize;
use crate::noise::{inject_noise, DistortionSummary};
use crate::quasi::QuasiIdentifiers;
use crate::risk::{score, RiskResult};
use crate::table::RecordTable;

/// Before/after view of one anonymization run.
#[derive(Clone, Debug, PartialEq)]
pub struct PrivacyAssessment {
    pub baseline: RiskResult,
    pub after: RiskResult,
    pub quasi_identifiers: QuasiIdentifiers,
    /// Quasi-identifiers used for `after`; may be narrower than `quasi_identifiers`.
    pub rescore_quasi_identifiers: QuasiIdentifiers,
    pub dropped_quasi_identifiers: Vec<String>,
    pub noise_column: String,
    pub distortion: DistortionSummary,
    pub transformed: RecordTable,
}

impl PrivacyAssessment {
    pub fn risk_reduction(&self) -> f64 {
        self.after.reduction_from(&self.baseline)
    }
}

pub struct Anonymizer {
    config: AnonymizerConfig,
}

impl Anonymizer {
    pub fn new(config: AnonymizerConfig) -> PrivacyResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnonymizerConfig {
        &self.config
    }

    /// Noise `noise_column`, then generalize the configured column if present.
    pub fn transform(
        &self,
        microdata: &RecordTable,
        noise_column: &str,
    ) -> PrivacyResult<RecordTable> {
        let noised = inject_noise(
            microdata,
            noise_column,
            f64::from(self.config.noise_scale),
            self.config.seed,
        )?;
        let generalization = &self.config.generalization;
        if !generalization.enabled {
            return Ok(noised);
        }
        Ok(generalize(&noised, &generalization.column, &generalization.policy))
    }

    pub fn assess(
        &self,
        microdata: &RecordTable,
        reference: &RecordTable,
        quasi: &QuasiIdentifiers,
        noise_column: &str,
    ) -> PrivacyResult<PrivacyAssessment> {
        let baseline = score(microdata, reference, quasi)?;
        let transformed = self.transform(microdata, noise_column)?;

        let generalization = &self.config.generalization;
        let generalized_in_quasi =
            generalization.enabled && quasi.contains(&generalization.column);
        let (rescore_reference, rescore_quasi, dropped) = match self.config.rescore_strategy {
            RescoreStrategy::DropGeneralized if generalized_in_quasi => {
                warn!(
                    column = %generalization.column,
                    "re-scoring without the generalized column; before/after scores use different quasi-identifiers"
                );
                (
                    Cow::Borrowed(reference),
                    quasi.without(&generalization.column),
                    vec![generalization.column.clone()],
                )
            }
            RescoreStrategy::GeneralizeReference if generalized_in_quasi => (
                Cow::Owned(generalize(
                    reference,
                    &generalization.column,
                    &generalization.policy,
                )),
                quasi.clone(),
                Vec::new(),
            ),
            _ => (Cow::Borrowed(reference), quasi.clone(), Vec::new()),
        };

        let after = score(&transformed, &rescore_reference, &rescore_quasi)?;
        let distortion = DistortionSummary::between(microdata, &transformed, noise_column);
        info!(
            baseline_matches = baseline.match_count(),
            baseline_risk = baseline.risk_percent(),
            after_matches = after.match_count(),
            after_risk = after.risk_percent(),
            "anonymization assessed"
        );
        Ok(PrivacyAssessment {
            baseline,
            after,
            quasi_identifiers: quasi.clone(),
            rescore_quasi_identifiers: rescore_quasi,
            dropped_quasi_identifiers: dropped,
            noise_column: noise_column.to_string(),
            distortion,
            transformed,
        })
    }
}
