//! Re-identification risk scoring.
//!
//! Risk is measured by an inner equi-join of the microdata against a table of
//! true identities on the quasi-identifier tuple. Every joined pair counts, so
//! duplicated tuples on either side inflate the score (and can push it past
//! 100%). Rows with a missing quasi-identifier never match anything.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PrivacyResult;
use crate::quasi::QuasiIdentifiers;
use crate::table::{RecordTable, Value};

/// Outcome of one scoring call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskResult {
    match_count: u64,
    risk_percent: f64,
}

impl RiskResult {
    fn from_matches(match_count: u64, microdata_rows: usize) -> Self {
        let risk_percent = if microdata_rows == 0 {
            0.0
        } else {
            100.0 * match_count as f64 / microdata_rows as f64
        };
        Self {
            match_count,
            risk_percent,
        }
    }

    pub fn match_count(&self) -> u64 {
        self.match_count
    }

    pub fn risk_percent(&self) -> f64 {
        self.risk_percent
    }

    /// Percentage points removed relative to `baseline` (negative if risk grew).
    pub fn reduction_from(&self, baseline: &RiskResult) -> f64 {
        baseline.risk_percent - self.risk_percent
    }
}

impl fmt::Display for RiskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Matched Records: {} | Risk: {:.2}%",
            self.match_count, self.risk_percent
        )
    }
}

/// Equality key for one cell. Numbers compare by value across integer and
/// float columns; labels compare by text; numbers never equal labels.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum JoinKey {
    Int(i64),
    Float(u64),
    Label(String),
}

impl JoinKey {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Missing => None,
            Value::Integer(v) => Some(JoinKey::Int(*v)),
            Value::Float(v) if v.is_nan() => None,
            Value::Float(v) => {
                if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64 {
                    Some(JoinKey::Int(*v as i64))
                } else {
                    Some(JoinKey::Float(v.to_bits()))
                }
            }
            Value::Text(s) => Some(JoinKey::Label(s.clone())),
        }
    }
}

fn tuple_key(row: &[Value], indices: &[usize]) -> Option<Vec<JoinKey>> {
    indices
        .iter()
        .map(|&idx| JoinKey::from_value(&row[idx]))
        .collect()
}

fn column_indices(table: &RecordTable, quasi: &QuasiIdentifiers) -> Vec<usize> {
    quasi
        .iter()
        .filter_map(|name| table.column_index(name))
        .collect()
}

/// Score `microdata` against `reference` on `quasi`.
///
/// An empty quasi-identifier set joins every row with every row, so the
/// match count is `|microdata| * |reference|`.
pub fn score(
    microdata: &RecordTable,
    reference: &RecordTable,
    quasi: &QuasiIdentifiers,
) -> PrivacyResult<RiskResult> {
    quasi.ensure_present(microdata, reference)?;
    let micro_idx = column_indices(microdata, quasi);
    let ref_idx = column_indices(reference, quasi);

    let mut reference_counts: HashMap<Vec<JoinKey>, u64> = HashMap::new();
    for row in reference.raw_rows() {
        if let Some(key) = tuple_key(row, &ref_idx) {
            *reference_counts.entry(key).or_insert(0) += 1;
        }
    }

    let match_count: u64 = microdata
        .raw_rows()
        .iter()
        .filter_map(|row| tuple_key(row, &micro_idx))
        .map(|key| reference_counts.get(&key).copied().unwrap_or(0))
        .sum();

    let result = RiskResult::from_matches(match_count, microdata.len());
    debug!(
        quasi = ?quasi.as_slice(),
        microdata_rows = microdata.len(),
        reference_rows = reference.len(),
        match_count,
        risk_percent = result.risk_percent,
        "scored re-identification risk"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_io::read_table;
    use crate::errors::PrivacyError;
    use crate::table::{Column, ColumnType};

    fn table(csv: &str) -> RecordTable {
        read_table(csv.as_bytes()).unwrap()
    }

    #[test]
    fn integer_and_float_columns_join_numerically() {
        let micro = table("age\n25\n30\n");
        let reference = table("age\n25.0\n30.5\n");
        let result = score(&micro, &reference, &QuasiIdentifiers::new(["age"])).unwrap();
        assert_eq!(result.match_count(), 1);
        assert_eq!(result.risk_percent(), 50.0);
    }

    #[test]
    fn labels_never_equal_numbers() {
        let micro = RecordTable::with_rows(
            vec![Column::new(
                "age",
                ColumnType::Categorical {
                    levels: vec!["25".into()],
                },
            )],
            vec![vec![Value::text("25")]],
        )
        .unwrap();
        let reference = table("age\n25\n");
        let result = score(&micro, &reference, &QuasiIdentifiers::new(["age"])).unwrap();
        assert_eq!(result.match_count(), 0);
    }

    #[test]
    fn missing_values_never_match() {
        let micro = table("age,gender\n,M\n25,M\n");
        let reference = table("age,gender\n,M\n25,M\n");
        let result = score(
            &micro,
            &reference,
            &QuasiIdentifiers::new(["age", "gender"]),
        )
        .unwrap();
        assert_eq!(result.match_count(), 1);
    }

    #[test]
    fn missing_columns_are_rejected() {
        let micro = table("age\n25\n");
        let reference = table("gender\nM\n");
        let err = score(&micro, &reference, &QuasiIdentifiers::new(["age"])).unwrap_err();
        assert!(matches!(err, PrivacyError::MissingColumns { .. }));
    }

    #[test]
    fn reduction_is_in_percentage_points() {
        let before = RiskResult::from_matches(3, 4);
        let after = RiskResult::from_matches(1, 4);
        assert_eq!(after.reduction_from(&before), 50.0);
        assert_eq!(after.to_string(), "Matched Records: 1 | Risk: 25.00%");
    }
}
