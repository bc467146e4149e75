use anyhow::{Context, bail};
use clap::Parser;
use iso_downloads::{Config, Ingestor};
use std::path::PathBuf;
use tracing::info;

/// Counts installer image downloads in mirror access logs and loads them
/// into InfluxDB.
#[derive(clap::Parser, Debug)]
#[command(name = "iso-downloads")]
struct Options {
    /// Directory containing the `<server>-*/<mirror>/*ubuntu.com-access.log-*.gz` files
    #[arg(long)]
    dir: PathBuf,

    /// Print the measurements as JSON lines instead of writing them to InfluxDB
    #[arg(long, visible_alias = "dryrun")]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = Options::parse();

    iso_downloads::util::tracing::init(options.verbose);

    let config = Config::from_env().context("Failed to load configuration")?;
    let ingestor = Ingestor::from_config(&config)?;

    info!(dir = %options.dir.display(), dry_run = options.dry_run, "Starting ingestion");
    let summary = ingestor.run(&options.dir, options.dry_run).await?;

    if summary.failed > 0 {
        bail!("Failed to process {} log file(s)", summary.failed);
    }

    Ok(())
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Options::command().debug_assert();
}
