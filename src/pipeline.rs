use crate::unit::LogUnit;
use iso_downloads_influxdb::Measurement;
use iso_downloads_logs::{AggregateKey, CodenameRegistry, count_downloads};
use tokio::io::AsyncBufRead;
use tracing::{debug, instrument};

/// Counts the image downloads in the access log of a single unit and turns
/// them into one measurement per (release, architecture, flavor).
///
/// The measurements are sorted by release, architecture and flavor.
#[instrument(skip_all, fields(server = %unit.server, mirror = %unit.mirror, date = %unit.date))]
pub async fn process_unit<R>(
    reader: R,
    unit: &LogUnit,
    codenames: &dyn CodenameRegistry,
) -> anyhow::Result<Vec<Measurement>>
where
    R: AsyncBufRead + Unpin,
{
    let downloads = count_downloads(reader, codenames).await?;

    let measurement = unit.measurement();
    let time = unit.timestamp();

    let measurements = downloads
        .into_vec()
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(key, count)| {
            let AggregateKey {
                release,
                arch,
                flavor,
            } = key;

            Measurement::new(&measurement, time)
                .tag("mirror", &unit.mirror)
                .tag("release", release)
                .tag("arch", arch)
                .tag("flavor", flavor)
                .field("downloads", count)
        })
        .collect::<Vec<_>>();

    debug!(num_measurements = measurements.len(), "Processed log");
    Ok(measurements)
}
