use anyhow::Context;
use clap::Parser;
use iso_downloads_logs::{Decompressor, UbuntuCodenames, count_downloads};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, clap::Parser)]
struct Options {
    /// The path to the access log file to parse
    path: PathBuf,

    /// The `distro-info-data` CSV file with the known release codenames
    #[arg(long, default_value = UbuntuCodenames::DEFAULT_CSV_PATH)]
    codenames: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let options = Options::parse();

    let codenames = UbuntuCodenames::load(&options.codenames)?;

    let file = File::open(&options.path)
        .await
        .with_context(|| format!("Failed to open {}", options.path.display()))?;

    let extension = options.path.extension().and_then(|ext| ext.to_str());

    let decompressor = Decompressor::from_extension(BufReader::new(file), extension)?;
    let downloads = count_downloads(BufReader::new(decompressor), &codenames).await?;
    println!("{downloads:?}");
    println!();

    let num_releases = downloads.unique_releases().len();
    let total_keys = downloads.len();
    let total_downloads = downloads.sum_downloads();

    println!("Number of releases: {num_releases}");
    println!("Number of release/arch/flavor combinations: {total_keys}");
    println!("Total number of downloads: {total_downloads}");

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    fmt().compact().with_env_filter(env_filter).init();
}
