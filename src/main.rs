use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use esp_detector::{
    app::EspDetectorApp,
    config,
    infrastructure::{directories, logging, shutdown},
};

/// Detects the Email Service Provider behind each website in a CSV file.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// CSV file with a url, website, domain or site column.
    input: PathBuf,

    /// Where to write the report (.json for JSON, anything else for CSV). Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Parallel workers (1-10). Overrides MAX_WORKERS.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Per-site timeout in seconds (5-30). Overrides FETCH_TIMEOUT_SECS.
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Column holding the addresses. Overrides URL_COLUMN and inference.
    #[arg(long)]
    url_column: Option<String>,

    /// Skip the pause between completions.
    #[arg(long)]
    no_pacing: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = config::load_config()?;
    if let Some(workers) = cli.workers {
        config.detection.set_max_workers(workers)?;
    }
    if let Some(timeout) = cli.timeout {
        config.fetch.set_timeout_secs(timeout)?;
    }
    if let Some(column) = cli.url_column {
        config.input.url_column = Some(column);
    }
    if cli.no_pacing {
        config.detection.pacing_delay = std::time::Duration::ZERO;
    }

    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config.logging, &paths)?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = EspDetectorApp::initialize(config, shutdown)?;
    app.run(&cli.input, cli.output.as_deref()).await?;
    Ok(())
}
