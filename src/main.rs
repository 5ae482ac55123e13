use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use film_fusion::app::fusion_use_case::FusionUseCase;
use film_fusion::config::{Config, LoggingConfig, DEFAULT_CONFIG_PATH};
use film_fusion::infra::csv_output_adapter::CsvFusionOutputAdapter;
use film_fusion::infra::csv_source_adapter::CsvSourceAdapter;
use film_fusion::logging;
use film_fusion::observability;
use film_fusion::pipeline::processing::title::{normalize_title, title_year};

#[derive(Parser)]
#[command(name = "film_fusion")]
#[command(about = "Resolve films across rating catalogs and fuse their ratings")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: load, fuse, normalize, and export
    Run {
        /// Path to the TOML configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Print the normalized comparison key of each title
    Title {
        #[arg(required = true)]
        titles: Vec<String>,
    },
}

async fn run(config_path: PathBuf) -> Result<()> {
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    let _log_guard = logging::init_logging(&config.logging);

    if let Err(e) = observability::init() {
        warn!("Metrics disabled: {}", e);
    }

    info!("Using configuration {}", config_path.display());
    let output = Arc::new(CsvFusionOutputAdapter::from_output_config(&config.output));
    let use_case = FusionUseCase::from_config(&config, Arc::new(CsvSourceAdapter::new()), output);

    let summary = use_case.run(&config.sources).await?;

    if let Some(path) = &config.output.metrics_path {
        observability::write_snapshot(path)
            .await
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }

    println!("\n📊 Fusion Results:");
    println!("   Tables loaded: {}", summary.tables_loaded);
    println!("   Tables failed: {}", summary.tables_failed);
    println!("   Observations: {}", summary.observations);
    println!("   Films resolved: {}", summary.fusion.resolved_films);
    println!("   Films retained: {}", summary.fusion.retained);
    println!("   Duplicate rows: {}", summary.fusion.duplicate_rows);
    println!("   Superscores computed: {}", summary.normalization.superscores_computed);
    println!("   Final rows: {}", summary.final_rows);
    println!("   Output file: {}", config.output.final_csv_path().display());

    if summary.quarantined_tables() > 0 {
        println!("\n⚠️  {} tables failed validation (see log)", summary.quarantined_tables());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(config).await,
        Commands::Title { titles } => {
            let _log_guard = logging::init_logging(&LoggingConfig::default());
            for title in titles {
                match title_year(&title) {
                    Some(year) => println!("{}\t{}\t{}", title, normalize_title(&title), year),
                    None => println!("{}\t{}", title, normalize_title(&title)),
                }
            }
            Ok(())
        }
    }
}
