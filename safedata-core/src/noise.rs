//! Laplace noise injection for numeric columns.
//!
//! Each call builds its own ChaCha20 generator: from a blake3-derived seed when
//! the caller supplies one, from OS entropy otherwise. No generator state
//! outlives the call.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Exp1};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{PrivacyError, PrivacyResult};
use crate::table::{ColumnType, RecordTable, Value};

/// Double-exponential distribution with the given location and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Laplace {
    location: f64,
    scale: f64,
}

impl Laplace {
    pub fn new(location: f64, scale: f64) -> PrivacyResult<Self> {
        if !scale.is_finite() || scale < 0.0 {
            return Err(PrivacyError::InvalidNoiseScale { scale });
        }
        Ok(Self { location, scale })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl Distribution<f64> for Laplace {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let magnitude: f64 = Exp1.sample(rng);
        if rng.gen::<bool>() {
            self.location + self.scale * magnitude
        } else {
            self.location - self.scale * magnitude
        }
    }
}

fn derive_seed(seed: u64) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"safedata/laplace-noise");
    hasher.update(&seed.to_le_bytes());
    *hasher.finalize().as_bytes()
}

fn noise_rng(seed: Option<u64>) -> ChaCha20Rng {
    match seed {
        Some(seed) => ChaCha20Rng::from_seed(derive_seed(seed)),
        None => ChaCha20Rng::from_entropy(),
    }
}

/// Add Laplace(0, `scale`) noise to every row of `column`, rounding to the
/// nearest integer (ties to even). The column becomes `Integer`.
///
/// Missing cells stay missing; a sample is still drawn for them so row `i`
/// always receives the `i`-th draw of the stream. Any infinite or
/// out-of-range result fails the whole call.
pub fn inject_noise(
    table: &RecordTable,
    column: &str,
    scale: f64,
    seed: Option<u64>,
) -> PrivacyResult<RecordTable> {
    let index = table
        .column_index(column)
        .filter(|&idx| table.columns()[idx].kind.is_numeric())
        .ok_or_else(|| PrivacyError::NonNumericColumn {
            column: column.to_string(),
        })?;
    let laplace = Laplace::new(0.0, scale)?;
    let mut rng = noise_rng(seed);

    let mut row = 0;
    let mut overflow: Option<(usize, f64)> = None;
    let noised = table.map_column(index, ColumnType::Integer, |value| {
        let sample = laplace.sample(&mut rng);
        let current = row;
        row += 1;
        let Some(v) = value.as_f64() else {
            return Value::Missing;
        };
        let rounded = (v + sample).round_ties_even();
        match to_integer(rounded) {
            Some(n) => Value::Integer(n),
            None => {
                overflow.get_or_insert((current, rounded));
                Value::Missing
            }
        }
    });
    if let Some((row, value)) = overflow {
        return Err(PrivacyError::UnrepresentableValue {
            column: column.to_string(),
            row,
            value,
        });
    }
    debug!(
        column,
        scale,
        seeded = seed.is_some(),
        rows = noised.len(),
        "injected laplace noise"
    );
    Ok(noised)
}

/// `i64::MAX as f64` is 2^63, one past the largest `i64`.
fn to_integer(value: f64) -> Option<i64> {
    (value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64)
        .then(|| value as i64)
}

/// How far a noised column moved from the original, row by row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistortionSummary {
    pub column: String,
    /// Rows where both tables hold a number in `column`.
    pub rows_compared: usize,
    pub mean_abs_error: f64,
    pub max_abs_error: f64,
}

impl DistortionSummary {
    pub fn between(original: &RecordTable, noised: &RecordTable, column: &str) -> Self {
        let mut summary = DistortionSummary {
            column: column.to_string(),
            ..Default::default()
        };
        let (Some(before), Some(after)) =
            (original.column_values(column), noised.column_values(column))
        else {
            return summary;
        };
        let mut total = 0.0;
        for (a, b) in before.zip(after) {
            if let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) {
                let err = (a - b).abs();
                total += err;
                summary.max_abs_error = summary.max_abs_error.max(err);
                summary.rows_compared += 1;
            }
        }
        if summary.rows_compared > 0 {
            summary.mean_abs_error = total / summary.rows_compared as f64;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::csv_io::read_table;

    fn incomes() -> RecordTable {
        read_table("id,income,gender\n1,52000,M\n2,61000.5,F\n3,,F\n4,48000,M\n".as_bytes())
            .unwrap()
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let table = incomes();
        let a = inject_noise(&table, "income", 1_000.0, Some(7)).unwrap();
        let b = inject_noise(&table, "income", 1_000.0, Some(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_generate_distinct_noise() {
        let table = incomes();
        let a = inject_noise(&table, "income", 1_000.0, Some(1)).unwrap();
        let b = inject_noise(&table, "income", 1_000.0, Some(2)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn noised_column_is_integer_and_source_untouched() {
        let table = incomes();
        let snapshot = table.clone();
        let noised = inject_noise(&table, "income", 500.0, Some(3)).unwrap();
        assert_eq!(table, snapshot);
        assert_eq!(noised.column("income").unwrap().kind, ColumnType::Integer);
        assert!(noised
            .column_values("income")
            .unwrap()
            .all(|v| matches!(v, Value::Integer(_) | Value::Missing)));
        assert!(noised.row(2).unwrap().get("income").unwrap().is_missing());
        assert_eq!(
            noised.column_values("gender").unwrap().collect::<Vec<_>>(),
            table.column_values("gender").unwrap().collect::<Vec<_>>()
        );
    }

    #[test]
    fn zero_scale_only_rounds() {
        let noised = inject_noise(&incomes(), "income", 0.0, None).unwrap();
        let values: Vec<_> = noised.column_values("income").unwrap().cloned().collect();
        assert_eq!(
            values,
            vec![
                Value::Integer(52000),
                Value::Integer(61000),
                Value::Missing,
                Value::Integer(48000)
            ]
        );
    }

    #[test]
    fn text_and_absent_columns_are_rejected() {
        let table = incomes();
        for column in ["gender", "salary"] {
            match inject_noise(&table, column, 100.0, Some(1)) {
                Err(PrivacyError::NonNumericColumn { column: named }) => assert_eq!(named, column),
                other => panic!("expected NonNumericColumn, got {other:?}"),
            }
        }
    }

    #[test]
    fn infinite_and_oversized_values_are_rejected() {
        let table = read_table("income\n100\ninf\n1e300\n".as_bytes()).unwrap();
        match inject_noise(&table, "income", 100.0, Some(1)) {
            Err(PrivacyError::UnrepresentableValue { column, row, value }) => {
                assert_eq!(column, "income");
                assert_eq!(row, 1);
                assert!(value.is_infinite());
            }
            other => panic!("expected UnrepresentableValue, got {other:?}"),
        }

        let huge = read_table("income\n1e300\n".as_bytes()).unwrap();
        assert!(matches!(
            inject_noise(&huge, "income", 0.0, None),
            Err(PrivacyError::UnrepresentableValue { row: 0, .. })
        ));
    }

    #[test]
    fn rejects_invalid_scale() {
        for scale in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                inject_noise(&incomes(), "income", scale, Some(1)),
                Err(PrivacyError::InvalidNoiseScale { .. })
            ));
        }
    }

    #[test]
    fn laplace_samples_center_on_location() {
        let laplace = Laplace::new(0.0, 100.0).unwrap();
        let mut rng = noise_rng(Some(11));
        let samples: Vec<f64> = (0..20_000).map(|_| laplace.sample(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let mean_abs = samples.iter().map(|s| s.abs()).sum::<f64>() / samples.len() as f64;
        assert!(mean.abs() < 5.0, "mean drifted: {mean}");
        let scale = laplace.scale();
        assert!(
            (mean_abs - scale).abs() < 0.1 * scale,
            "E|X| should be ~scale: {mean_abs}"
        );
    }

    #[test]
    fn distortion_summary_compares_numeric_rows() {
        let table = incomes();
        let noised = inject_noise(&table, "income", 0.0, None).unwrap();
        let summary = DistortionSummary::between(&table, &noised, "income");
        assert_eq!(summary.rows_compared, 3);
        assert_eq!(summary.max_abs_error, 0.5);
        assert!((summary.mean_abs_error - 0.5 / 3.0).abs() < 1e-9);

        let absent = DistortionSummary::between(&table, &noised, "salary");
        assert_eq!(absent.rows_compared, 0);
    }
}
