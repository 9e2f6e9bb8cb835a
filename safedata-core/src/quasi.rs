use serde::{Deserialize, Serialize};

use crate::errors::{PrivacyError, PrivacyResult};
use crate::table::RecordTable;

/// Columns tried first when no quasi-identifiers are chosen explicitly.
pub const DEFAULT_QUASI_IDENTIFIERS: [&str; 3] = ["age", "gender", "district"];

/// Ordered, duplicate-free set of quasi-identifier column names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct QuasiIdentifiers(Vec<String>);

impl QuasiIdentifiers {
    /// Keeps the first occurrence of each name.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for column in columns {
            let column = column.into();
            if !out.contains(&column) {
                out.push(column);
            }
        }
        Self(out)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Pick `age`/`gender`/`district` where both tables carry them, otherwise
    /// the first three shared columns in microdata order.
    pub fn suggested(microdata: &RecordTable, reference: &RecordTable) -> Self {
        let common = microdata.common_columns(reference);
        let preferred: Vec<&str> = DEFAULT_QUASI_IDENTIFIERS
            .iter()
            .copied()
            .filter(|name| common.contains(name))
            .collect();
        if preferred.is_empty() {
            Self::new(common.into_iter().take(3))
        } else {
            Self::new(preferred)
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|c| c == column)
    }

    pub fn without(&self, column: &str) -> Self {
        Self(self.0.iter().filter(|c| *c != column).cloned().collect())
    }

    /// Fails with both missing lists when either table lacks a column.
    pub fn ensure_present(
        &self,
        microdata: &RecordTable,
        reference: &RecordTable,
    ) -> PrivacyResult<()> {
        let missing = |table: &RecordTable| -> Vec<String> {
            self.0
                .iter()
                .filter(|c| !table.has_column(c))
                .cloned()
                .collect()
        };
        let missing_in_microdata = missing(microdata);
        let missing_in_reference = missing(reference);
        if missing_in_microdata.is_empty() && missing_in_reference.is_empty() {
            return Ok(());
        }
        Err(PrivacyError::MissingColumns {
            missing_in_microdata,
            missing_in_reference,
        })
    }
}

impl From<Vec<String>> for QuasiIdentifiers {
    fn from(value: Vec<String>) -> Self {
        Self::new(value)
    }
}

impl From<QuasiIdentifiers> for Vec<String> {
    fn from(value: QuasiIdentifiers) -> Self {
        value.0
    }
}

impl<'a> FromIterator<&'a str> for QuasiIdentifiers {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self::new(iter)
    }
}
