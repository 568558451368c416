use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use data_preparation::{Config, DatasetEngine, IngestEngine};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Ingests a project's raw samples or turns stored samples into a training dataset.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Project YAML configuration.
    #[arg(long, short)]
    config: PathBuf,
    /// Which run loop to execute.
    #[arg(long, value_enum, default_value_t = Stage::Ingest)]
    engine: Stage,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
    /// Emit logs as JSON lines.
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Ingest,
    Dataset,
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let config = Config::from_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let report = match cli.engine {
        Stage::Ingest => IngestEngine::new(&config).run(),
        Stage::Dataset => DatasetEngine::new(&config).run(),
    }
    .with_context(|| format!("{:?} run for project '{}'", cli.engine, config.project))?;

    println!("{report}");
    Ok(())
}
