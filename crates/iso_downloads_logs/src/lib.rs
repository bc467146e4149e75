//! # Installer image access log parsing
//!
//! Turns web server access log lines into [DownloadRecord]s and folds the
//! valid ones into a [DownloadsMap] keyed by release, architecture and
//! flavor.

mod codenames;
mod compression;
mod download_map;
mod record;
#[cfg(test)]
mod test_utils;
mod user_agent;

pub use crate::codenames::{CodenameRegistry, UbuntuCodenames};
pub use crate::compression::Decompressor;
pub use crate::download_map::{AggregateKey, DownloadsMap, aggregate};
pub use crate::record::{DownloadRecord, IMAGE_SUFFIXES, IsoImage, Rejection};
pub use crate::user_agent::ClientTag;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, instrument, trace};

/// Reads all lines of an access log and counts the installer image downloads
/// in it.
///
/// Lines that are not valid UTF-8 or that don't describe a successful image
/// download are skipped. Only I/O errors of the underlying reader abort the
/// whole log.
#[instrument(skip_all)]
pub async fn count_downloads<R>(
    reader: R,
    codenames: &dyn CodenameRegistry,
) -> anyhow::Result<DownloadsMap>
where
    R: AsyncBufRead + Unpin,
{
    let mut num_lines = 0_usize;
    let mut num_rejected = 0_usize;

    let mut downloads = DownloadsMap::new();

    let mut lines = reader.split(b'\n');
    while let Some(line) = lines.next_segment().await? {
        num_lines += 1;

        let line = match std::str::from_utf8(&line) {
            Ok(line) => line,
            Err(error) => {
                debug!(%error, "Skipping line: invalid UTF-8");
                continue;
            }
        };

        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        let record = DownloadRecord::parse(line, codenames);
        match record.outcome {
            Ok(image) => downloads.add(&image),
            Err(rejection) => {
                num_rejected += 1;
                trace!(%rejection, target = %record.target, "Skipping line");
            }
        }
    }

    debug!(
        num_lines,
        num_rejected,
        num_downloads = downloads.sum_downloads(),
        "Finished reading log"
    );

    Ok(downloads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use claims::{assert_err, assert_ok};
    use insta::{assert_debug_snapshot, assert_snapshot};
    use std::io::{self, Cursor};
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, BufReader, ReadBuf};

    #[tokio::test]
    async fn test_basic() {
        let _guard = enable_tracing_output();

        let mut cursor = Cursor::new(include_bytes!("../test_data/basic.log"));
        let downloads = assert_ok!(count_downloads(&mut cursor, &codenames()).await);

        assert_debug_snapshot!(downloads, @r"
        DownloadsMap {
            18.04.2  amd64  desktop .. 1
            18.04.2  amd64  server .. 2
            18.04.2  i386  desktop .. 1
            20.04  amd64  desktop .. 1
            20.04  amd64  live-server .. 1
            20.04  arm64  preinstalled-server .. 1
            20.04  armhf  preinstalled-server .. 1
        }
        ");
    }

    #[tokio::test]
    async fn test_compressed() {
        let _guard = enable_tracing_output();

        let cursor = Cursor::new(include_bytes!("../test_data/basic.log.gz"));

        let decompressor = assert_ok!(Decompressor::from_extension(cursor, Some("gz")));
        let reader = BufReader::new(decompressor);

        let downloads = assert_ok!(count_downloads(reader, &codenames()).await);
        assert_eq!(downloads.sum_downloads(), 8);
        assert_eq!(downloads.len(), 7);
    }

    #[tokio::test]
    async fn test_recoverable_errors() {
        let _guard = enable_tracing_output();

        let mut cursor = Cursor::new(include_bytes!("../test_data/recoverable-errors.log"));
        let downloads = assert_ok!(count_downloads(&mut cursor, &codenames()).await);

        assert_debug_snapshot!(downloads, @r"
        DownloadsMap {
            18.04.2  amd64  desktop .. 1
            18.04.2  amd64  server .. 1
        }
        ");
    }

    #[tokio::test]
    async fn test_no_downloads() {
        let _guard = enable_tracing_output();

        let line = r#"- - [10/Mar/2019:08:18:44 +0000] "GET /ubuntu/ HTTP/1.1" 200 1372 "-" "-""#;
        let mut cursor = Cursor::new(line.as_bytes());
        let downloads = assert_ok!(count_downloads(&mut cursor, &codenames()).await);
        assert!(downloads.is_empty());
    }

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::other("connection reset")))
        }
    }

    #[tokio::test]
    async fn test_read_error() {
        let _guard = enable_tracing_output();

        let reader = BufReader::new(FailingReader);
        let error = assert_err!(count_downloads(reader, &codenames()).await);
        assert_snapshot!(error, @"connection reset");
    }
}
