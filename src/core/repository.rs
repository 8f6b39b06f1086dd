use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local};
use tracing::{debug, info};

use crate::core::sink::DumpSink;
use crate::error::BackupError;

/// Offset-aware, second resolution, fixed width. Lexicographic order of the
/// resulting file names is chronological order.
pub const DEFAULT_DATE_FORMAT: &str = "%Y%m%dT%H%M%S%z";

/// A backup repository on the filesystem: a directory plus a naming
/// convention. Dumps are named `<name>-<datestamp>[-<part>].sql[.gz]`.
///
/// Stateless beyond its configuration; the directory is re-listed on every
/// call. One instance serves one dump part ("schema" or "data") for one run.
#[derive(Debug, Clone)]
pub struct Repository {
    name: String,
    dumpdir: PathBuf,
    compress: bool,
    date_format: String,
    part: Option<String>,
}

impl Repository {
    pub fn new(name: impl Into<String>, dumpdir: impl Into<PathBuf>, compress: bool) -> Self {
        Self {
            name: name.into(),
            dumpdir: dumpdir.into(),
            compress,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            part: None,
        }
    }

    /// Label dumps in this repository with a part name, e.g. "schema".
    pub fn with_part(mut self, part: impl Into<String>) -> Self {
        self.part = Some(part.into());
        self
    }

    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = date_format.into();
        self
    }

    pub fn dumpdir(&self) -> &Path {
        &self.dumpdir
    }

    /// File name prefix shared by all dumps in this repository.
    pub fn prefix(&self) -> String {
        format!("{}-", self.name)
    }

    /// File name suffix shared by all dumps in this repository.
    pub fn suffix(&self) -> String {
        let part = match &self.part {
            Some(part) => format!("-{part}"),
            None => String::new(),
        };
        let extension = if self.compress { ".sql.gz" } else { ".sql" };
        format!("{part}{extension}")
    }

    /// Path a dump for the given datestamp lives at. `None` means now.
    pub fn filepath(&self, datestamp: Option<DateTime<FixedOffset>>) -> PathBuf {
        let datestamp = datestamp.unwrap_or_else(|| Local::now().fixed_offset());
        let datestring = datestamp.format(&self.date_format).to_string();

        self.dumpdir
            .join(format!("{}{}{}", self.prefix(), datestring, self.suffix()))
    }

    /// List existing dumps, sorted ascending by file name (oldest first
    /// under the default date format). A missing or empty directory is an
    /// empty repository, not an error.
    pub async fn index(&self) -> Result<Vec<PathBuf>, BackupError> {
        let prefix = self.prefix();
        let suffix = self.suffix();

        let mut entries = match tokio::fs::read_dir(&self.dumpdir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut dumps = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };

            if !name.starts_with(&prefix) || !name.ends_with(&suffix) {
                continue;
            }

            if entry.file_type().await?.is_file() {
                dumps.push(entry.path());
            }
        }

        dumps.sort();

        Ok(dumps)
    }

    /// Create a new dump and return its writable sink.
    ///
    /// Bytes land in a uniquely named temporary file in the repository
    /// directory itself, so the rename performed by [`DumpSink::commit`]
    /// stays within one filesystem and is atomic. The temporary name is
    /// dot-prefixed and never matches `index()`.
    pub async fn open(
        &self,
        datestamp: Option<DateTime<FixedOffset>>,
    ) -> Result<DumpSink, BackupError> {
        let final_path = self.filepath(datestamp);

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}-", self.name))
            .suffix(".tmp")
            .tempfile_in(&self.dumpdir)?;
        let (file, temp_path) = temp.keep().map_err(|err| err.error)?;

        debug!(
            "Opened temporary dump file {} for {}",
            temp_path.display(),
            final_path.display()
        );

        Ok(DumpSink::new(
            tokio::fs::File::from_std(file),
            self.compress,
            temp_path,
            final_path,
        ))
    }

    /// Delete the oldest dumps until at most `keep` remain. No-op when the
    /// repository already holds `keep` or fewer.
    pub async fn prune(&self, keep: usize) -> Result<(), BackupError> {
        let files = self.index().await?;

        if files.len() <= keep {
            return Ok(());
        }

        let numprune = files.len() - keep;

        debug!(
            "Start pruning {} out of {} files in dir {}",
            numprune,
            files.len(),
            self.dumpdir.display()
        );

        for path in &files[..numprune] {
            tokio::fs::remove_file(path).await?;
            info!("Pruned {}", path.display());
        }

        debug!(
            "Finished pruning {} out of {} files in dir {}",
            numprune,
            files.len(),
            self.dumpdir.display()
        );

        Ok(())
    }
}
