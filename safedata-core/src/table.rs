//! In-memory record tables.
//!
//! A [`RecordTable`] is an ordered list of typed columns plus row-major values.
//! Tables are treated as immutable snapshots by the scorer and the anonymizer:
//! every transform derives a fresh copy instead of editing in place.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{PrivacyError, PrivacyResult};

/// A single typed cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Missing,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    /// `NaN` floats count as missing, matching how delimited inputs spell gaps.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) if v.is_nan() => Ok(()),
            // Keep integral floats recognisable as floats on export ("25.0").
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.1}")
            }
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Missing)
    }
}

/// Semantic type of a column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    /// Ordered categorical; cells hold [`Value::Text`] labels drawn from `levels`.
    Categorical { levels: Vec<String> },
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl RecordTable {
    /// Empty table with the given schema. Column names must be unique.
    pub fn new(columns: Vec<Column>) -> PrivacyResult<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(PrivacyError::malformed(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn with_rows(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> PrivacyResult<Self> {
        let mut table = Self::new(columns)?;
        table.rows.reserve(rows.len());
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> PrivacyResult<()> {
        if row.len() != self.columns.len() {
            return Err(PrivacyError::malformed(format!(
                "row {} has {} fields, expected {}",
                self.rows.len() + 1,
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row(&self, index: usize) -> Option<RowView<'_>> {
        self.rows.get(index).map(|values| RowView {
            columns: &self.columns,
            values,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(|values| RowView {
            columns: &self.columns,
            values,
        })
    }

    pub fn column_values(&self, name: &str) -> Option<impl Iterator<Item = &Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Names of `Integer` / `Float` columns, in schema order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Columns present in both tables, in `self`'s order.
    pub fn common_columns(&self, other: &RecordTable) -> Vec<&str> {
        self.column_names()
            .filter(|name| other.has_column(name))
            .collect()
    }

    pub(crate) fn raw_rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Copy of the table with one column retyped and every cell rewritten.
    pub(crate) fn map_column<F>(&self, index: usize, kind: ColumnType, mut f: F) -> RecordTable
    where
        F: FnMut(&Value) -> Value,
    {
        let mut columns = self.columns.clone();
        columns[index].kind = kind;
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row[index] = f(&row[index]);
                row
            })
            .collect();
        RecordTable { columns, rows }
    }
}

/// Borrowed view of one row, addressable by column name.
#[derive(Clone, Copy, Debug)]
pub struct RowView<'a> {
    columns: &'a [Column],
    values: &'a [Value],
}

impl<'a> RowView<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .map(|idx| &self.values[idx])
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        let columns = self.columns;
        let values = self.values;
        columns
            .iter()
            .map(|c| c.name.as_str())
            .zip(values.iter())
    }
}
