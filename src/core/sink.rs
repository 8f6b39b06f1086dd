use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use async_compression::tokio::write::GzipEncoder;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::BackupError;

enum SinkWriter {
    Plain(File),
    Gzip(GzipEncoder<File>),
}

/// Writable handle for one dump in progress.
///
/// Bytes go to a uniquely named temporary file in the repository directory;
/// the file only appears at its final path after `commit` has flushed,
/// synced and renamed it. A dump is therefore never observable at its final
/// name in a partially written state. Callers always write uncompressed
/// bytes; gzip wrapping is internal.
///
/// Exactly one of `commit` or `abort` must conclude the sink. If neither
/// runs (the sink is dropped mid-job), the temporary file is removed
/// best-effort on drop.
pub struct DumpSink {
    writer: Option<SinkWriter>,
    temp_path: PathBuf,
    final_path: PathBuf,
    finished: bool,
}

impl DumpSink {
    pub(crate) fn new(file: File, compress: bool, temp_path: PathBuf, final_path: PathBuf) -> Self {
        let writer = if compress {
            SinkWriter::Gzip(GzipEncoder::new(file))
        } else {
            SinkWriter::Plain(file)
        };

        Self {
            writer: Some(writer),
            temp_path,
            final_path,
            finished: false,
        }
    }

    /// Path this dump will occupy once committed.
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Finalize the dump: flush (and close the gzip stream, if any), sync
    /// the temporary file to disk, then atomically rename it to the final
    /// path. Returns the final path on success.
    pub async fn commit(mut self) -> Result<PathBuf, BackupError> {
        match self.writer.take() {
            Some(SinkWriter::Plain(mut file)) => {
                file.flush().await?;
                file.sync_all().await?;
            }
            Some(SinkWriter::Gzip(mut encoder)) => {
                // shutdown writes the gzip trailer and flushes the inner file
                encoder.shutdown().await?;
                let file = encoder.into_inner();
                file.sync_all().await?;
            }
            None => {
                return Err(io::Error::other("dump sink already closed").into());
            }
        }

        tokio::fs::rename(&self.temp_path, &self.final_path).await?;
        self.finished = true;

        info!("Dumped {}", self.final_path.display());

        Ok(self.final_path.clone())
    }

    /// Discard the dump: close the temporary file and remove it
    /// best-effort. The final path is never created for an aborted dump.
    pub async fn abort(mut self) {
        self.writer.take();

        match tokio::fs::remove_file(&self.temp_path).await {
            Ok(()) => debug!("Removed temporary dump file {}", self.temp_path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                "Failed to remove temporary dump file {}: {}",
                self.temp_path.display(),
                err
            ),
        }

        self.finished = true;
    }
}

impl Drop for DumpSink {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        // Close the descriptor before unlinking
        self.writer.take();

        if let Err(err) = std::fs::remove_file(&self.temp_path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove temporary dump file {}: {}",
                    self.temp_path.display(),
                    err
                );
            }
        }
    }
}

impl AsyncWrite for DumpSink {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut().writer.as_mut() {
            Some(SinkWriter::Plain(file)) => Pin::new(file).poll_write(cx, buf),
            Some(SinkWriter::Gzip(encoder)) => Pin::new(encoder).poll_write(cx, buf),
            None => Poll::Ready(Err(io::Error::other("dump sink already closed"))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().writer.as_mut() {
            Some(SinkWriter::Plain(file)) => Pin::new(file).poll_flush(cx),
            Some(SinkWriter::Gzip(encoder)) => Pin::new(encoder).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().writer.as_mut() {
            Some(SinkWriter::Plain(file)) => Pin::new(file).poll_shutdown(cx),
            Some(SinkWriter::Gzip(encoder)) => Pin::new(encoder).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}
