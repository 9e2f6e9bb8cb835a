use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use safedata_assess::config::{load_config, Config, ConfigFormat};
use safedata_assess::service::{AssessmentService, ServiceError};
use safedata_core::{read_table_path, PrivacyError, Value};
use tempfile::tempdir;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn shipped_config(output: &Path) -> Config {
    let mut config = load_config(
        &manifest_dir().join("configs/safedata-assess.toml"),
        ConfigFormat::Auto,
    )
    .unwrap();
    config.inputs.samples_dir = manifest_dir().join("samples");
    config.output.path = output.to_path_buf();
    config
}

#[test]
fn shipped_samples_report_before_and_after() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("anonymised_data.csv");
    let report = AssessmentService::new(shipped_config(&output)).run().unwrap();

    assert_eq!(report.microdata_rows, 12);
    assert_eq!(report.baseline.match_count(), 9);
    assert_eq!(report.baseline.risk_percent(), 75.0);

    let enhancement = report.enhancement.as_ref().unwrap();
    assert_eq!(enhancement.noise_column, "income");
    assert_eq!(enhancement.rescore_quasi_identifiers, vec!["gender", "district"]);
    // Two reference rows share (F, Kowloon) and two share (M, Tsuen Wan).
    assert_eq!(enhancement.after.match_count(), 16);
    assert!((enhancement.after.risk_percent() - 133.33).abs() < 0.01);
    assert_eq!(enhancement.distortion.rows_compared, 11);

    let exported = read_table_path(&output).unwrap();
    assert_eq!(
        exported.column_names().collect::<Vec<_>>(),
        vec!["age", "gender", "district", "income"]
    );
    let first = exported.row(0).unwrap();
    assert_eq!(first.get("age"), Some(&Value::text("20-29")));
    let last = exported.row(11).unwrap();
    assert_eq!(last.get("income"), Some(&Value::Missing));
}

#[test]
fn seeded_runs_export_identical_files() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");
    AssessmentService::new(shipped_config(&first)).run().unwrap();
    AssessmentService::new(shipped_config(&second)).run().unwrap();
    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn missing_quasi_identifier_aborts_without_export() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("anonymised_data.csv");
    let mut config = shipped_config(&output);
    config.assessment.quasi_identifiers = Some(vec!["age".into(), "postcode".into()]);

    let err = AssessmentService::new(config).run().unwrap_err();
    match err {
        ServiceError::Privacy(PrivacyError::MissingColumns {
            missing_in_microdata,
            missing_in_reference,
        }) => {
            assert_eq!(missing_in_microdata, vec!["postcode".to_string()]);
            assert_eq!(missing_in_reference, vec!["postcode".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
}

#[test]
fn json_report_carries_both_scores() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("anonymised_data.csv");
    let report = AssessmentService::new(shipped_config(&output)).run().unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["baseline"]["match_count"], 9);
    assert_eq!(json["enhancement"]["noise_scale"], 1500);
    assert_eq!(json["enhancement"]["seed"], 42);
    assert_eq!(json["enhancement"]["dropped_quasi_identifiers"][0], "age");
}

#[test]
fn explicit_inputs_override_samples_dir() {
    let dir = tempdir().unwrap();
    let micro = dir.path().join("micro.csv");
    let ids = dir.path().join("ids.csv");
    fs::write(&micro, "zip,gender\n10001,M\n20002,F\n").unwrap();
    fs::write(&ids, "name,zip,gender\nAda,10001,M\n").unwrap();

    let mut config = Config::default();
    config.inputs.microdata = Some(micro);
    config.inputs.reference = Some(ids);
    config.inputs.samples_dir = dir.path().join("does-not-exist");
    config.assessment.score_only = true;

    let report = AssessmentService::new(config).run().unwrap();
    assert_eq!(report.quasi_identifiers, vec!["gender"]);
    assert_eq!(report.baseline.match_count(), 1);
    assert_eq!(report.baseline.risk_percent(), 50.0);
}
