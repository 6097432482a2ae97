use anyhow::Result;
use clap::Parser;
use sinta_etl::config;
use sinta_etl::etl::Etl;
use sinta_etl::model::OutputFormat;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about = "SINTA journals ETL: extract scraped journal records, write CSV/JSON locally and to HDFS")]
struct Args {
    /// Path to YAML config file (defaults to etl.yaml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Folder holding raw scraper output (overrides config)
    #[arg(long)]
    input_folder: Option<String>,

    /// Folder for local artifacts (overrides config)
    #[arg(long)]
    output_folder: Option<String>,

    /// Output format: csv, json or both (overrides config)
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Also persist artifacts to HDFS under the date partition
    #[arg(long)]
    save_to_hdfs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let mut cfg = config::load(args.config.as_deref())?;
    if let Some(input) = args.input_folder {
        cfg.app.input_folder = input;
    }
    if let Some(output) = args.output_folder {
        cfg.app.output_folder = output;
    }
    if let Some(format) = args.format {
        cfg.app.output_format = format;
    }
    if args.save_to_hdfs {
        cfg.hdfs.enabled = true;
    }
    config::validate(&cfg)?;
    cfg.ensure_dirs()?;

    let report = Etl::new(cfg).run().await?;
    info!(
        state = report.final_state.as_str(),
        artifacts = report.local_artifacts.len(),
        "run complete"
    );
    Ok(())
}
