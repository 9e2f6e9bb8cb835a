//! One assessment run: load both tables, score, anonymize, re-score, export.
//!
//! # Example
//! ```no_run
//! use safedata_assess::config::Config;
//! use safedata_assess::service::AssessmentService;
//!
//! let service = AssessmentService::new(Config::sample());
//! let report = service.run().unwrap();
//! println!("{report}");
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use safedata_core::{
    read_table_path, score, to_csv_bytes, Anonymizer, DistortionSummary, PrivacyError,
    QuasiIdentifiers, RecordTable, RiskResult,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, SAMPLE_MICRODATA, SAMPLE_REFERENCE};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no {role} table: pass a path or place {file} in {}", dir.display())]
    MissingInput {
        role: &'static str,
        file: &'static str,
        dir: PathBuf,
    },
    #[error("unable to export {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Privacy(#[from] PrivacyError),
}

#[derive(Clone, Debug, Serialize)]
pub struct AssessmentReport {
    pub microdata: PathBuf,
    pub reference: PathBuf,
    pub microdata_rows: usize,
    pub reference_rows: usize,
    pub quasi_identifiers: Vec<String>,
    pub baseline: RiskResult,
    /// Absent for score-only runs and when the microdata has no numeric column.
    pub enhancement: Option<EnhancementReport>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EnhancementReport {
    pub noise_column: String,
    pub noise_scale: u32,
    pub seed: Option<u64>,
    pub rescore_quasi_identifiers: Vec<String>,
    pub dropped_quasi_identifiers: Vec<String>,
    pub after: RiskResult,
    pub risk_reduction: f64,
    pub distortion: DistortionSummary,
    pub output: PathBuf,
}

impl fmt::Display for AssessmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Microdata: {} ({} rows) | True identifiers: {} ({} rows)",
            self.microdata.display(),
            self.microdata_rows,
            self.reference.display(),
            self.reference_rows
        )?;
        writeln!(f, "Quasi-identifiers: [{}]", self.quasi_identifiers.join(", "))?;
        writeln!(f, "Before → {}", self.baseline)?;
        let Some(enhancement) = &self.enhancement else {
            return Ok(());
        };
        writeln!(f, "After Enhancement → {}", enhancement.after)?;
        if !enhancement.dropped_quasi_identifiers.is_empty() {
            writeln!(
                f,
                "Note: re-scored on [{}]; dropped [{}] after generalization",
                enhancement.rescore_quasi_identifiers.join(", "),
                enhancement.dropped_quasi_identifiers.join(", ")
            )?;
        }
        writeln!(
            f,
            "Risk reduction: {:.2} percentage points",
            enhancement.risk_reduction
        )?;
        let seed = enhancement
            .seed
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".into());
        writeln!(
            f,
            "Noise on '{}' (scale {}, seed {}): mean |Δ| {:.1}, max |Δ| {:.1} over {} rows",
            enhancement.noise_column,
            enhancement.noise_scale,
            seed,
            enhancement.distortion.mean_abs_error,
            enhancement.distortion.max_abs_error,
            enhancement.distortion.rows_compared
        )?;
        write!(
            f,
            "Anonymised table written to {}",
            enhancement.output.display()
        )
    }
}

pub struct AssessmentService {
    config: Config,
}

impl AssessmentService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Explicit paths win; otherwise fall back to the sample files.
    pub fn resolve_inputs(&self) -> Result<(PathBuf, PathBuf), ServiceError> {
        let inputs = &self.config.inputs;
        let microdata = resolve_input(
            inputs.microdata.as_deref(),
            &inputs.samples_dir,
            "microdata",
            SAMPLE_MICRODATA,
        )?;
        let reference = resolve_input(
            inputs.reference.as_deref(),
            &inputs.samples_dir,
            "true identifiers",
            SAMPLE_REFERENCE,
        )?;
        Ok((microdata, reference))
    }

    pub fn run(&self) -> Result<AssessmentReport, ServiceError> {
        let (microdata_path, reference_path) = self.resolve_inputs()?;
        let microdata = read_table_path(&microdata_path)?;
        let reference = read_table_path(&reference_path)?;
        info!(
            microdata = %microdata_path.display(),
            rows = microdata.len(),
            reference = %reference_path.display(),
            reference_rows = reference.len(),
            "loaded input tables"
        );

        let quasi: QuasiIdentifiers = match &self.config.assessment.quasi_identifiers {
            Some(columns) => columns.iter().map(String::as_str).collect(),
            None => QuasiIdentifiers::suggested(&microdata, &reference),
        };
        let baseline = score(&microdata, &reference, &quasi)?;

        let mut report = AssessmentReport {
            microdata: microdata_path,
            reference: reference_path,
            microdata_rows: microdata.len(),
            reference_rows: reference.len(),
            quasi_identifiers: quasi.as_slice().to_vec(),
            baseline,
            enhancement: None,
        };
        if self.config.assessment.score_only {
            return Ok(report);
        }

        let Some(noise_column) = self.noise_column(&microdata) else {
            warn!("no numeric columns found in microdata; skipping privacy enhancement");
            return Ok(report);
        };
        let anonymizer = Anonymizer::new(self.config.anonymizer.clone())?;
        let assessment = anonymizer.assess(&microdata, &reference, &quasi, &noise_column)?;

        let output = self.config.output.path.clone();
        export(&assessment.transformed, &output)?;
        info!(path = %output.display(), rows = assessment.transformed.len(), "exported anonymised table");

        report.enhancement = Some(EnhancementReport {
            noise_column,
            noise_scale: anonymizer.config().noise_scale,
            seed: anonymizer.config().seed,
            rescore_quasi_identifiers: assessment.rescore_quasi_identifiers.as_slice().to_vec(),
            dropped_quasi_identifiers: assessment.dropped_quasi_identifiers.clone(),
            after: assessment.after,
            risk_reduction: assessment.risk_reduction(),
            distortion: assessment.distortion,
            output,
        });
        Ok(report)
    }

    fn noise_column(&self, microdata: &RecordTable) -> Option<String> {
        match &self.config.assessment.noise_column {
            Some(column) => Some(column.clone()),
            None => microdata.numeric_columns().first().map(|c| c.to_string()),
        }
    }
}

fn resolve_input(
    explicit: Option<&Path>,
    samples_dir: &Path,
    role: &'static str,
    file: &'static str,
) -> Result<PathBuf, ServiceError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let fallback = samples_dir.join(file);
    if fallback.is_file() {
        info!(role, path = %fallback.display(), "using sample input");
        return Ok(fallback);
    }
    Err(ServiceError::MissingInput {
        role,
        file,
        dir: samples_dir.to_path_buf(),
    })
}

/// Serialise fully before touching the filesystem so a failed run leaves no file.
fn export(table: &RecordTable, path: &Path) -> Result<(), ServiceError> {
    let bytes = to_csv_bytes(table)?;
    let to_export_err = |source: std::io::Error| ServiceError::Export {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(to_export_err)?;
    }
    fs::write(path, bytes).map_err(to_export_err)
}
