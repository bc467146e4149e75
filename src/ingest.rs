use crate::config::Config;
use crate::discover::discover_log_files;
use crate::pipeline::process_unit;
use crate::reader::{FileLogReader, LogReader};
use crate::unit::LogUnit;
use anyhow::Context;
use iso_downloads_influxdb::{IdempotencyStore, Measurement, MetricsStore};
use iso_downloads_logs::{CodenameRegistry, UbuntuCodenames};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{error, info, instrument, warn};

/// The stores that processed log files are loaded into.
#[derive(Clone)]
pub struct Stores {
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub metrics: Arc<dyn MetricsStore>,
}

impl Stores {
    /// Uses the same store for both the idempotency checks and the
    /// measurements.
    pub fn new<S>(store: S) -> Self
    where
        S: IdempotencyStore + MetricsStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            idempotency: store.clone(),
            metrics: store,
        }
    }

    pub fn separate(
        idempotency: impl IdempotencyStore + 'static,
        metrics: impl MetricsStore + 'static,
    ) -> Self {
        Self {
            idempotency: Arc::new(idempotency),
            metrics: Arc::new(metrics),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Log files whose measurements were written or printed.
    pub processed: usize,
    pub already_loaded: usize,
    pub unsupported: usize,
    /// Log files whose path does not describe a server, mirror and date.
    pub unparsable: usize,
    /// Log files that could not be read.
    pub failed: usize,
    pub measurements: usize,
}

/// Loads the download counts of all access logs below a directory into the
/// configured stores.
pub struct Ingestor {
    reader: Arc<dyn LogReader>,
    codenames: Arc<dyn CodenameRegistry>,
    stores: Option<Stores>,
    unsupported_servers: Vec<String>,
}

impl Ingestor {
    pub fn new(reader: Arc<dyn LogReader>, codenames: Arc<dyn CodenameRegistry>) -> Self {
        Self {
            reader,
            codenames,
            stores: None,
            unsupported_servers: Vec::new(),
        }
    }

    pub fn with_stores(mut self, stores: Stores) -> Self {
        self.stores = Some(stores);
        self
    }

    pub fn with_unsupported_servers(mut self, servers: Vec<String>) -> Self {
        self.unsupported_servers = servers;
        self
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let codenames = UbuntuCodenames::load(&config.distro_info_csv)?;

        let mut ingestor = Self::new(Arc::new(FileLogReader), Arc::new(codenames))
            .with_unsupported_servers(config.unsupported_servers.clone());

        if let Some(influxdb) = &config.influxdb {
            info!(url = %influxdb.base_url, database = %influxdb.database, "Using InfluxDB");
            ingestor = ingestor.with_stores(Stores::new(influxdb.build_client()?));
        } else {
            info!("No InfluxDB configured, printing measurements to stdout");
        }

        Ok(ingestor)
    }

    /// Processes all access logs below `log_root` in sorted order.
    ///
    /// Measurements are written to the stores, or printed to stdout as JSON
    /// lines if no stores are configured or `dry_run` is set. Store errors
    /// abort the run, while unreadable log files are skipped and counted in
    /// [RunSummary::failed].
    pub async fn run(&self, log_root: &Path, dry_run: bool) -> anyhow::Result<RunSummary> {
        let mut stdout = tokio::io::stdout();
        self.run_with_output(log_root, dry_run, &mut stdout).await
    }

    #[instrument(skip_all, fields(log_root = %log_root.display(), dry_run = dry_run))]
    pub async fn run_with_output<W>(
        &self,
        log_root: &Path,
        dry_run: bool,
        output: &mut W,
    ) -> anyhow::Result<RunSummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let paths = discover_log_files(log_root)?;
        let stores = if dry_run { None } else { self.stores.as_ref() };

        let mut summary = RunSummary::default();
        for path in paths {
            let Some(unit) = LogUnit::from_path(&path) else {
                warn!(path = %path.display(), "Skipping log file with unexpected path");
                summary.unparsable += 1;
                continue;
            };

            if self.unsupported_servers.contains(&unit.server) {
                info!(path = %path.display(), server = %unit.server, "Skipping log file of unsupported server");
                summary.unsupported += 1;
                continue;
            }

            let measurement = unit.measurement();
            let time = unit.timestamp();

            if let Some(stores) = stores {
                let exists = stores
                    .idempotency
                    .exists(&measurement, &unit.mirror, time)
                    .await
                    .with_context(|| format!("Failed to check whether {unit} was already loaded"))?;

                if exists {
                    info!(server = %unit.server, mirror = %unit.mirror, date = %unit.date, "Skipping already loaded log file");
                    summary.already_loaded += 1;
                    continue;
                }
            }

            info!(server = %unit.server, mirror = %unit.mirror, date = %unit.date, path = %path.display(), "Processing log file");

            let measurements = match self.read_unit(&path, &unit).await {
                Ok(measurements) => measurements,
                Err(error) => {
                    error!(path = %path.display(), "Failed to process log file: {error:#}");
                    summary.failed += 1;
                    continue;
                }
            };

            match stores {
                Some(stores) => {
                    if measurements.is_empty() {
                        info!(server = %unit.server, mirror = %unit.mirror, date = %unit.date, "No downloads found, nothing to write");
                    } else {
                        stores
                            .metrics
                            .write(&measurements)
                            .await
                            .with_context(|| format!("Failed to write measurements of {unit}"))?;
                    }

                    stores
                        .idempotency
                        .mark(&measurement, &unit.mirror, time)
                        .await
                        .with_context(|| format!("Failed to mark {unit} as loaded"))?;
                }
                None => print_measurements(output, &measurements).await?,
            }

            summary.processed += 1;
            summary.measurements += measurements.len();
        }

        output.flush().await?;

        info!(
            processed = summary.processed,
            already_loaded = summary.already_loaded,
            unsupported = summary.unsupported,
            unparsable = summary.unparsable,
            failed = summary.failed,
            measurements = summary.measurements,
            "Finished processing log files"
        );

        Ok(summary)
    }

    async fn read_unit(&self, path: &Path, unit: &LogUnit) -> anyhow::Result<Vec<Measurement>> {
        let reader = self.reader.open(path).await?;
        process_unit(reader, unit, self.codenames.as_ref()).await
    }
}

async fn print_measurements<W>(output: &mut W, measurements: &[Measurement]) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for measurement in measurements {
        let mut line = serde_json::to_vec(measurement)?;
        line.push(b'\n');
        output.write_all(&line).await?;
    }

    Ok(())
}
