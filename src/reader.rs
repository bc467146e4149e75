use anyhow::Context;
use async_trait::async_trait;
use iso_downloads_logs::Decompressor;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};

pub type BoxedLogStream = Box<dyn AsyncBufRead + Send + Unpin>;

/// Opens access log files for reading.
#[async_trait]
pub trait LogReader: Send + Sync {
    async fn open(&self, path: &Path) -> anyhow::Result<BoxedLogStream>;
}

/// Reads access logs from the local file system, decompressing them based on
/// their file extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLogReader;

#[async_trait]
impl LogReader for FileLogReader {
    async fn open(&self, path: &Path) -> anyhow::Result<BoxedLogStream> {
        let file = File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str());
        let decompressor = Decompressor::from_extension(BufReader::new(file), extension)?;

        Ok(Box::new(BufReader::new(decompressor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::write::ZstdEncoder;
    use claims::assert_err;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_open_gzip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("releases.ubuntu.com-access.log-20190310.gz");

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"line 1\nline 2\n")?;
        std::fs::write(&path, encoder.finish()?)?;

        let mut stream = FileLogReader.open(&path).await?;
        let mut content = String::new();
        stream.read_to_string(&mut content).await?;
        assert_eq!(content, "line 1\nline 2\n");

        Ok(())
    }

    #[tokio::test]
    async fn test_open_zstd() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("releases.ubuntu.com-access.log-20190310.zst");

        let mut encoder = ZstdEncoder::new(Vec::new());
        encoder.write_all(b"line 1\nline 2\n").await?;
        encoder.shutdown().await?;
        std::fs::write(&path, encoder.into_inner())?;

        let mut stream = FileLogReader.open(&path).await?;
        let mut content = String::new();
        stream.read_to_string(&mut content).await?;
        assert_eq!(content, "line 1\nline 2\n");

        Ok(())
    }

    #[tokio::test]
    async fn test_open_missing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing.gz");

        let error = assert_err!(FileLogReader.open(&path).await.map(|_| ()));
        assert!(error.to_string().starts_with("Failed to open"));

        Ok(())
    }
}
