use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use safedata_assess::config::{load_config, Config, ConfigFormat};
use safedata_assess::service::AssessmentService;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "safedata-assess",
    version,
    about = "Score re-identification risk, anonymize microdata and re-score"
)]
struct Cli {
    /// Path to configuration file (TOML or YAML). Built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Explicit configuration format override.
    #[arg(long, value_enum, default_value_t = ConfigFormat::Auto)]
    config_format: ConfigFormat,
    /// Microdata CSV to assess.
    #[arg(long)]
    microdata: Option<PathBuf>,
    /// CSV of true identities to link against.
    #[arg(long)]
    reference: Option<PathBuf>,
    /// Directory searched for the sample CSVs when an input is not given.
    #[arg(long, env = "SAFEDATA_SAMPLES_DIR")]
    samples_dir: Option<PathBuf>,
    /// Comma-separated quasi-identifiers; an empty value selects none.
    #[arg(long, value_delimiter = ',')]
    quasi: Option<Vec<String>>,
    /// Numeric column to perturb.
    #[arg(long)]
    noise_column: Option<String>,
    /// Laplace scale in [100, 5000].
    #[arg(long)]
    noise_scale: Option<u32>,
    #[arg(long, conflicts_with = "no_seed")]
    seed: Option<u64>,
    /// Draw noise from OS entropy.
    #[arg(long)]
    no_seed: bool,
    /// Where the anonymised CSV is written.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Only report the baseline risk.
    #[arg(long)]
    score_only: bool,
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
    /// Emit logs as JSON lines on stderr.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.microdata {
            config.inputs.microdata = Some(path.clone());
        }
        if let Some(path) = &self.reference {
            config.inputs.reference = Some(path.clone());
        }
        if let Some(dir) = &self.samples_dir {
            config.inputs.samples_dir = dir.clone();
        }
        if let Some(quasi) = &self.quasi {
            config.assessment.quasi_identifiers = Some(
                quasi
                    .iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect(),
            );
        }
        if let Some(column) = &self.noise_column {
            config.assessment.noise_column = Some(column.clone());
        }
        if let Some(scale) = self.noise_scale {
            config.anonymizer.noise_scale = scale;
        }
        if let Some(seed) = self.seed {
            config.anonymizer.seed = Some(seed);
        }
        if self.no_seed {
            config.anonymizer.seed = None;
        }
        if let Some(path) = &self.output {
            config.output.path = path.clone();
        }
        config.assessment.score_only |= self.score_only;
        config.output.report_json |= self.json;
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = match &cli.config {
        Some(path) => load_config(path, cli.config_format)?,
        None => Config::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    let report_json = config.output.report_json;
    let report = AssessmentService::new(config).run()?;
    if report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
