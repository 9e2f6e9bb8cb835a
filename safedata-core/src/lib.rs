//! SafeData core: re-identification risk scoring and microdata anonymization.
//!
//! Risk is estimated by joining microdata against a table of true identities on
//! a set of quasi-identifiers (age, gender, district, ...). The anonymizer
//! perturbs one numeric column with Laplace noise and generalizes a numeric
//! column into bands, after which the same scorer measures what is left.
//! Every transform returns a new table; inputs are never modified.

pub mod config;
pub mod csv_io;
pub mod errors;
pub mod generalize;
pub mod noise;
pub mod pipeline;
pub mod quasi;
pub mod risk;
pub mod table;

pub use config::{AnonymizerConfig, GeneralizationConfig, RescoreStrategy};
pub use csv_io::{read_table, read_table_path, to_csv_bytes, write_table};
pub use errors::{PrivacyError, PrivacyResult};
pub use generalize::{generalize, generalize_age, BinningPolicy, AGE_COLUMN};
pub use noise::{inject_noise, DistortionSummary, Laplace};
pub use pipeline::{Anonymizer, PrivacyAssessment};
pub use quasi::QuasiIdentifiers;
pub use risk::{score, RiskResult};
pub use table::{Column, ColumnType, RecordTable, RowView, Value};
