use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use safedata_core::AnonymizerConfig;
use serde::Deserialize;
use thiserror::Error;

pub const SAMPLE_MICRODATA: &str = "sample_microdata.csv";
pub const SAMPLE_REFERENCE: &str = "sample_true_ids.csv";
pub const DEFAULT_OUTPUT: &str = "anonymised_data.csv";

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ConfigFormat {
    Auto,
    Toml,
    Yaml,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read assessment config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("assessment config is not valid {format:?}: {details}")]
    Parse {
        format: ConfigFormat,
        details: String,
    },
    #[error("assessment config rejected: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub inputs: InputSection,
    #[serde(default)]
    pub assessment: AssessmentSection,
    #[serde(default)]
    pub anonymizer: AnonymizerConfig,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct InputSection {
    #[serde(default)]
    pub microdata: Option<PathBuf>,
    #[serde(default)]
    pub reference: Option<PathBuf>,
    /// Where `sample_microdata.csv` / `sample_true_ids.csv` are looked up when
    /// an input path is not given.
    #[serde(default = "default_samples_dir")]
    pub samples_dir: PathBuf,
}

fn default_samples_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            microdata: None,
            reference: None,
            samples_dir: default_samples_dir(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct AssessmentSection {
    /// Suggested from the shared columns when absent.
    #[serde(default)]
    pub quasi_identifiers: Option<Vec<String>>,
    /// First numeric microdata column when absent.
    #[serde(default)]
    pub noise_column: Option<String>,
    #[serde(default)]
    pub score_only: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct OutputSection {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub report_json: bool,
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT)
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            report_json: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.anonymizer
            .validate()
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        if let Some(quasi) = &self.assessment.quasi_identifiers {
            if quasi.iter().any(|c| c.trim().is_empty()) {
                return Err(ConfigError::Validation(
                    "quasi-identifier names must not be blank".into(),
                ));
            }
        }
        if matches!(&self.assessment.noise_column, Some(c) if c.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "noise column must not be blank".into(),
            ));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation("output path is empty".into()));
        }
        Ok(())
    }

    pub fn sample() -> Self {
        Self {
            inputs: InputSection {
                microdata: Some(PathBuf::from("samples").join(SAMPLE_MICRODATA)),
                reference: Some(PathBuf::from("samples").join(SAMPLE_REFERENCE)),
                samples_dir: default_samples_dir(),
            },
            assessment: AssessmentSection {
                quasi_identifiers: Some(vec!["age".into(), "gender".into(), "district".into()]),
                noise_column: Some("income".into()),
                score_only: false,
            },
            anonymizer: AnonymizerConfig::default(),
            output: OutputSection::default(),
        }
    }
}

pub fn load_config(path: &Path, format: ConfigFormat) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&contents, resolve_format(path, format))?;
    config.validate()?;
    Ok(config)
}

/// Parse without validating. `Auto` reads TOML, like an unknown extension.
pub fn parse_config(contents: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    let parsed: Result<Config, String> = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|err| err.to_string()),
        ConfigFormat::Toml | ConfigFormat::Auto => {
            toml::from_str(contents).map_err(|err| err.to_string())
        }
    };
    parsed.map_err(|details| ConfigError::Parse { format, details })
}

fn resolve_format(path: &Path, format: ConfigFormat) -> ConfigFormat {
    match format {
        ConfigFormat::Auto => match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Toml,
        },
        _ => format,
    }
}

#[cfg(test)]
mod tests {
    use safedata_core::RescoreStrategy;

    use super::*;

    #[test]
    fn sample_config_is_valid() {
        Config::sample().validate().unwrap();
    }

    #[test]
    fn detects_out_of_range_noise_scale() {
        let mut config = Config::sample();
        config.anonymizer.noise_scale = 10_000;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn detects_blank_quasi_identifier() {
        let mut config = Config::sample();
        config.assessment.quasi_identifiers = Some(vec!["age".into(), " ".into()]);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn parses_toml_config() {
        let contents = r#"
            [inputs]
            microdata = "data/micro.csv"
            reference = "data/ids.csv"

            [assessment]
            quasi-identifiers = ["age", "gender"]
            noise-column = "income"

            [anonymizer]
            noise-scale = 2500
            seed = 7
            rescore-strategy = "generalize-reference"

            [anonymizer.generalization]
            column = "age"

            [anonymizer.generalization.policy]
            edges = [0, 18, 65, 120]
            labels = ["minor", "adult", "senior"]

            [output]
            path = "out/anon.csv"
            report-json = true
        "#;

        let config = parse_config(contents, ConfigFormat::Toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.anonymizer.noise_scale, 2_500);
        assert_eq!(config.anonymizer.seed, Some(7));
        assert_eq!(
            config.anonymizer.rescore_strategy,
            RescoreStrategy::GeneralizeReference
        );
        assert_eq!(
            config.anonymizer.generalization.policy.edges(),
            &[0.0, 18.0, 65.0, 120.0]
        );
        assert_eq!(config.anonymizer.generalization.policy.labels().len(), 3);
        assert_eq!(config.inputs.samples_dir, PathBuf::from("."));
        assert!(config.output.report_json);
    }

    #[test]
    fn parses_yaml_config() {
        let contents = r#"
            inputs:
              samples-dir: fixtures
            anonymizer:
              seed: null
        "#;
        let config = parse_config(contents, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.inputs.samples_dir, PathBuf::from("fixtures"));
        assert_eq!(config.anonymizer.seed, None);
        assert_eq!(config.output.path, PathBuf::from(DEFAULT_OUTPUT));
    }

    #[test]
    fn rejects_invalid_binning_policy() {
        let contents = r#"
            [anonymizer.generalization.policy]
            edges = [0, 18]
            labels = ["minor", "adult"]
        "#;
        assert!(matches!(
            parse_config(contents, ConfigFormat::Toml),
            Err(ConfigError::Parse {
                format: ConfigFormat::Toml,
                ..
            })
        ));
    }

    #[test]
    fn load_config_reports_path_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = load_config(&missing, ConfigFormat::Auto).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));

        let path = dir.path().join("assess.yml");
        fs::write(&path, "anonymizer:\n  noise-scale: 50\n").unwrap();
        let err = load_config(&path, ConfigFormat::Auto).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn resolves_format_from_extension() {
        assert_eq!(
            resolve_format(Path::new("a.yml"), ConfigFormat::Auto),
            ConfigFormat::Yaml
        );
        assert_eq!(
            resolve_format(Path::new("a.conf"), ConfigFormat::Auto),
            ConfigFormat::Toml
        );
        assert_eq!(
            resolve_format(Path::new("a.toml"), ConfigFormat::Yaml),
            ConfigFormat::Yaml
        );
    }
}
