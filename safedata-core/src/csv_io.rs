//! Delimited-text codec for [`RecordTable`].
//!
//! Reading infers one type per column: `Integer` when every present cell parses
//! as `i64`, `Float` when every present cell parses as `f64`, `Text` otherwise.
//! A column whose cells are all gaps is `Float`; a header-only column is `Text`.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::debug;

use crate::errors::{PrivacyError, PrivacyResult};
use crate::table::{Column, ColumnType, RecordTable, Value};

/// Cell spellings read as missing values.
const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_missing_token(field: &str) -> bool {
    MISSING_TOKENS.contains(&field)
}

#[derive(Clone, Copy, Debug)]
struct TypeCandidate {
    integer: bool,
    float: bool,
    present: usize,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            integer: true,
            float: true,
            present: 0,
        }
    }

    fn observe(&mut self, field: &str) {
        if is_missing_token(field) {
            return;
        }
        self.present += 1;
        let trimmed = field.trim();
        if self.integer && trimmed.parse::<i64>().is_err() {
            self.integer = false;
        }
        if self.float && trimmed.parse::<f64>().is_err() {
            self.float = false;
        }
    }

    fn resolve(self, rows: usize) -> ColumnType {
        if rows == 0 {
            ColumnType::Text
        } else if self.present == 0 {
            ColumnType::Float
        } else if self.integer {
            ColumnType::Integer
        } else if self.float {
            ColumnType::Float
        } else {
            ColumnType::Text
        }
    }
}

fn convert(field: &str, kind: &ColumnType) -> Value {
    if is_missing_token(field) {
        return Value::Missing;
    }
    let trimmed = field.trim();
    match kind {
        ColumnType::Integer => trimmed
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or(Value::Missing),
        ColumnType::Float => trimmed
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::Missing),
        ColumnType::Text | ColumnType::Categorical { .. } => Value::text(field),
    }
}

fn malformed(err: csv::Error) -> PrivacyError {
    let details = match err.position() {
        Some(pos) => format!("line {}: {err}", pos.line()),
        None => err.to_string(),
    };
    PrivacyError::MalformedInput { details }
}

/// Parse a table from CSV bytes with a mandatory header row.
pub fn read_table<R: Read>(reader: R) -> PrivacyResult<RecordTable> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = reader.headers().map_err(malformed)?.clone();
    if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
        return Err(PrivacyError::malformed("no columns to parse from input"));
    }

    let mut records: Vec<StringRecord> = Vec::new();
    let mut candidates = vec![TypeCandidate::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(malformed)?;
        for (candidate, field) in candidates.iter_mut().zip(record.iter()) {
            candidate.observe(field);
        }
        records.push(record);
    }

    let columns: Vec<Column> = headers
        .iter()
        .zip(candidates)
        .map(|(name, candidate)| Column::new(name, candidate.resolve(records.len())))
        .collect();
    let kinds: Vec<ColumnType> = columns.iter().map(|c| c.kind.clone()).collect();

    let mut table = RecordTable::new(columns)?;
    for record in &records {
        let row = record
            .iter()
            .zip(&kinds)
            .map(|(field, kind)| convert(field, kind))
            .collect();
        table.push_row(row)?;
    }
    debug!(
        rows = table.len(),
        columns = table.columns().len(),
        "parsed delimited table"
    );
    Ok(table)
}

pub fn read_table_path(path: &Path) -> PrivacyResult<RecordTable> {
    let file = File::open(path).map_err(|source| PrivacyError::Io {
        context: format!("unable to open {}", path.display()),
        source,
    })?;
    read_table(io::BufReader::new(file))
}

/// Serialise a table as CSV with a header row; missing cells become empty fields.
pub fn write_table<W: Write>(table: &RecordTable, writer: W) -> PrivacyResult<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    let io_err = |err: csv::Error| PrivacyError::Io {
        context: "unable to write table".into(),
        source: err.into(),
    };
    writer
        .write_record(table.column_names())
        .map_err(io_err)?;
    for row in table.rows() {
        writer
            .write_record(row.values().iter().map(|value| value.to_string()))
            .map_err(io_err)?;
    }
    writer.flush().map_err(|source| PrivacyError::Io {
        context: "unable to flush table".into(),
        source,
    })
}

pub fn to_csv_bytes(table: &RecordTable) -> PrivacyResult<Vec<u8>> {
    let mut out = Vec::new();
    write_table(table, &mut out)?;
    Ok(out)
}
