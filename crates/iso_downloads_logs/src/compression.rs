use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufRead, AsyncRead, ReadBuf};

/// Transparently decompresses an access log based on its file extension.
pub enum Decompressor<R> {
    Gzip(GzipDecoder<R>),
    Zstd(ZstdDecoder<R>),
    Plain(R),
}

impl<R: AsyncBufRead + Unpin> Decompressor<R> {
    /// Picks a decoder for the given file extension.
    ///
    /// `gz` and `zst` files are decompressed, `log` files and files without
    /// an extension are passed through unchanged.
    pub fn from_extension(inner: R, extension: Option<&str>) -> anyhow::Result<Self> {
        match extension {
            Some("gz") => {
                // logrotate may concatenate several gzip members into one file
                let mut decoder = GzipDecoder::new(inner);
                decoder.multiple_members(true);
                Ok(Decompressor::Gzip(decoder))
            }
            Some("zst") => Ok(Decompressor::Zstd(ZstdDecoder::new(inner))),
            Some("log") | None => Ok(Decompressor::Plain(inner)),
            Some(extension) => Err(anyhow::anyhow!(
                "Unexpected log file extension: {extension}"
            )),
        }
    }
}

impl<R> fmt::Debug for Decompressor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decompressor::Gzip(_) => f.write_str("Decompressor::Gzip"),
            Decompressor::Zstd(_) => f.write_str("Decompressor::Zstd"),
            Decompressor::Plain(_) => f.write_str("Decompressor::Plain"),
        }
    }
}

impl<R: AsyncBufRead + Unpin> AsyncRead for Decompressor<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Decompressor::Gzip(decoder) => Pin::new(decoder).poll_read(cx, buf),
            Decompressor::Zstd(decoder) => Pin::new(decoder).poll_read(cx, buf),
            Decompressor::Plain(reader) => Pin::new(reader).poll_read(cx, buf),
        }
    }
}
