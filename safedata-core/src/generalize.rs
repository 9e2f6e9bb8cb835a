//! Generalization of numeric columns into ordered categorical bands.
//!
//! Generalization is best-effort: an absent column or a column that cannot be
//! binned leaves the table unchanged (with a diagnostic) instead of failing.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{PrivacyError, PrivacyResult};
use crate::table::{ColumnType, RecordTable, Value};

pub const AGE_COLUMN: &str = "age";
pub const AGE_BAND_EDGES: [f64; 8] = [0.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 120.0];
pub const AGE_BAND_LABELS: [&str; 7] = ["<20", "20-29", "30-39", "40-49", "50-59", "60-69", "70+"];

/// Half-open bins `[edges[i], edges[i + 1])` labelled by `labels[i]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBinningPolicy", into = "RawBinningPolicy")]
pub struct BinningPolicy {
    edges: Vec<f64>,
    labels: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct RawBinningPolicy {
    edges: Vec<f64>,
    labels: Vec<String>,
}

impl BinningPolicy {
    pub fn new<S: Into<String>>(
        edges: Vec<f64>,
        labels: impl IntoIterator<Item = S>,
    ) -> PrivacyResult<Self> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let invalid = |reason: String| Err(PrivacyError::InvalidBinning { reason });
        if edges.len() < 2 {
            return invalid(format!("need at least two edges, got {}", edges.len()));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return invalid("edges must be finite".into());
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return invalid("edges must be strictly increasing".into());
        }
        if labels.len() != edges.len() - 1 {
            return invalid(format!(
                "{} edges need {} labels, got {}",
                edges.len(),
                edges.len() - 1,
                labels.len()
            ));
        }
        for (i, label) in labels.iter().enumerate() {
            if label.is_empty() {
                return invalid(format!("label {i} is empty"));
            }
            if labels[..i].contains(label) {
                return invalid(format!("label '{label}' is repeated"));
            }
        }
        Ok(Self { edges, labels })
    }

    /// `<20`, `20-29`, ..., `60-69`, `70+` over `[0, 120)`.
    pub fn age_bands() -> Self {
        Self {
            edges: AGE_BAND_EDGES.to_vec(),
            labels: AGE_BAND_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Label of the bin holding `value`, or `None` outside `[first, last)`.
    pub fn label_for(&self, value: f64) -> Option<&str> {
        let idx = self.edges.partition_point(|edge| *edge <= value);
        if idx == 0 || idx == self.edges.len() {
            return None;
        }
        Some(self.labels[idx - 1].as_str())
    }
}

impl Default for BinningPolicy {
    fn default() -> Self {
        Self::age_bands()
    }
}

impl TryFrom<RawBinningPolicy> for BinningPolicy {
    type Error = PrivacyError;

    fn try_from(raw: RawBinningPolicy) -> Result<Self, Self::Error> {
        BinningPolicy::new(raw.edges, raw.labels)
    }
}

impl From<BinningPolicy> for RawBinningPolicy {
    fn from(policy: BinningPolicy) -> Self {
        RawBinningPolicy {
            edges: policy.edges,
            labels: policy.labels,
        }
    }
}

/// Replace `column` with the bin labels of `policy`.
///
/// Values outside the policy's range and missing values become missing. The
/// column is retyped as `Categorical` with the policy labels as levels. An
/// absent or non-numeric column returns an unchanged copy.
pub fn generalize(table: &RecordTable, column: &str, policy: &BinningPolicy) -> RecordTable {
    let Some(index) = table.column_index(column) else {
        debug!(column, "generalization skipped: column absent");
        return table.clone();
    };
    let kind = &table.columns()[index].kind;
    if !kind.is_numeric() {
        warn!(column, ?kind, "generalization skipped: column is not numeric");
        return table.clone();
    }

    let mut unlabeled = 0usize;
    let levels = policy.labels.clone();
    let generalized = table.map_column(index, ColumnType::Categorical { levels }, |value| {
        let Some(v) = value.as_f64() else {
            return Value::Missing;
        };
        match policy.label_for(v) {
            Some(label) => Value::text(label),
            None => {
                unlabeled += 1;
                Value::Missing
            }
        }
    });
    if unlabeled > 0 {
        debug!(column, unlabeled, "values outside binning range left unlabeled");
    }
    generalized
}

pub fn generalize_age(table: &RecordTable, column: &str) -> RecordTable {
    generalize(table, column, &BinningPolicy::age_bands())
}
