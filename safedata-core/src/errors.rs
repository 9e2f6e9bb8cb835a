use thiserror::Error;

pub type PrivacyResult<T> = Result<T, PrivacyError>;

#[derive(Debug, Error)]
pub enum PrivacyError {
    #[error(
        "quasi-identifiers missing. In microdata: {missing_in_microdata:?}, in reference: {missing_in_reference:?}"
    )]
    MissingColumns {
        missing_in_microdata: Vec<String>,
        missing_in_reference: Vec<String>,
    },
    #[error("column '{column}' is not numeric")]
    NonNumericColumn { column: String },
    #[error("column '{column}' row {row}: noised value {value} does not fit an integer")]
    UnrepresentableValue { column: String, row: usize, value: f64 },
    #[error("malformed input: {details}")]
    MalformedInput { details: String },
    #[error("noise scale must be finite and non-negative, got {scale}")]
    InvalidNoiseScale { scale: f64 },
    #[error("invalid {parameter}: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },
    #[error("invalid binning policy: {reason}")]
    InvalidBinning { reason: String },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PrivacyError {
    pub(crate) fn malformed(details: impl Into<String>) -> Self {
        Self::MalformedInput {
            details: details.into(),
        }
    }
}
