use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use novobench::config::Config;
use novobench::io::psm::{metrics_from_records, read_psms};
use novobench::runner::{log_report, BenchRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Train a model and save its checkpoint
    Train,
    /// Sequence spectra with a trained model
    Seq,
    /// Score a de novo result table
    Eval,
}

#[derive(Parser)]
#[command(
    name = "novobench",
    version,
    about = "Benchmark de novo peptide sequencing models"
)]
struct Cli {
    #[arg(long, value_enum)]
    mode: Mode,
    /// Dataset file or directory (train/valid/test.parquet, .mgf, ...)
    #[arg(long = "data_path", value_name = "PATH")]
    data_path: Option<PathBuf>,
    /// Checkpoint to write (train) or read (seq)
    #[arg(long = "model_path", value_name = "PATH")]
    model_path: Option<PathBuf>,
    /// YAML or JSON config (defaults when omitted)
    #[arg(long = "config_path", value_name = "PATH")]
    config_path: Option<PathBuf>,
    /// De novo result table to write (seq) or read (eval)
    #[arg(long = "denovo_output_path", value_name = "PATH")]
    denovo_output_path: Option<PathBuf>,
    /// Also write the eval report to this JSON file
    #[arg(long = "metrics_path", value_name = "PATH")]
    metrics_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config_path.as_deref())?;
    if let Some(path) = &cli.config_path {
        log::info!("Using config {}", path.display());
    }
    let runner =
        BenchRunner::new(config, cli.model_path.clone()).with_config_path(cli.config_path.clone());

    match cli.mode {
        Mode::Train => {
            let data_path = cli.data_path.context("--data_path is required for train")?;
            runner.train_from_path(&data_path)?;
        }
        Mode::Seq => {
            let data_path = cli.data_path.context("--data_path is required for seq")?;
            let output = cli
                .denovo_output_path
                .context("--denovo_output_path is required for seq")?;
            runner.predict(&data_path, &output)?;
        }
        Mode::Eval => {
            let output = cli
                .denovo_output_path
                .context("--denovo_output_path is required for eval")?;
            let records = read_psms(&output)?;
            let report = metrics_from_records(&records, runner.config())?;
            log_report("Evaluation", &report);
            let json = serde_json::to_string_pretty(&report)?;
            println!("{json}");
            if let Some(path) = &cli.metrics_path {
                std::fs::write(path, &json)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
        }
    }
    Ok(())
}
