use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::pattern::matches_any;
use crate::core::sink::DumpSink;
use crate::error::BackupError;
use crate::source::DumpSource;

const MYSQL_EXECUTABLE: &str = "mysql";
const MYSQLDUMP_EXECUTABLE: &str = "mysqldump";

/// A MySQL / MariaDB database reached through the `mysql` and `mysqldump`
/// command line tools. Credentials travel via an optional defaults file.
pub struct MySqlSource {
    database: String,
    defaults_file: Option<PathBuf>,
    mysql_executable: String,
    mysqldump_executable: String,
}

impl MySqlSource {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            defaults_file: None,
            mysql_executable: MYSQL_EXECUTABLE.to_string(),
            mysqldump_executable: MYSQLDUMP_EXECUTABLE.to_string(),
        }
    }

    pub fn with_defaults_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.defaults_file = Some(path.into());
        self
    }

    /// Override the tool names, e.g. for non-standard installs.
    pub fn with_executables(
        mut self,
        mysql: impl Into<String>,
        mysqldump: impl Into<String>,
    ) -> Self {
        self.mysql_executable = mysql.into();
        self.mysqldump_executable = mysqldump.into();
        self
    }

    /// Arguments every invocation starts with. The defaults-file flag must
    /// precede all others or the tools reject it.
    fn base_args(&self) -> Vec<String> {
        match &self.defaults_file {
            Some(path) => vec![format!("--defaults-file={}", path.display())],
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl DumpSource for MySqlSource {
    async fn list_tables(
        &self,
        includes: &[String],
        excludes: &[String],
    ) -> Result<Vec<String>, BackupError> {
        debug!("Listing tables in database {}", self.database);

        let output = Command::new(&self.mysql_executable)
            .args(self.base_args())
            .arg("--execute=SHOW TABLES")
            .arg("--batch")
            .arg("--skip-column-names")
            .arg(&self.database)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| BackupError::spawn(&self.mysql_executable, err))?;

        if !output.status.success() {
            return Err(BackupError::ExternalTool {
                command: self.mysql_executable.clone(),
                code: output.status.code(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let tables: Vec<&str> = stdout.lines().collect();

        debug!(
            "Found {} tables in database {}",
            tables.len(),
            self.database
        );

        let selection: Vec<String> = tables
            .into_iter()
            .filter(|table| matches_any(table, includes) && !matches_any(table, excludes))
            .map(String::from)
            .collect();

        debug!(
            "Selected {} tables from database {}",
            selection.len(),
            self.database
        );

        Ok(selection)
    }

    async fn dump(
        &self,
        sink: &mut DumpSink,
        tables: &[String],
        schema_only: bool,
        cancellation: CancellationToken,
    ) -> Result<(), BackupError> {
        debug!(
            "Start dumping {} tables from database {}",
            tables.len(),
            self.database
        );

        let mut cmd = Command::new(&self.mysqldump_executable);
        cmd.args(self.base_args());
        if schema_only {
            cmd.arg("--no-data");
        }
        cmd.arg(&self.database);
        cmd.args(tables);
        cmd.stdin(Stdio::null()).stdout(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|err| BackupError::spawn(&self.mysqldump_executable, err))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout not captured"))?;

        // Bounded-chunk copy; the child blocks on its pipe if we fall
        // behind. On cancellation the child is killed before the error
        // surfaces so no subprocess outlives the run.
        let copy_result = tokio::select! {
            copied = tokio::io::copy(&mut stdout, sink) => copied,
            _ = cancellation.cancelled() => {
                warn!("Dump cancelled, killing {}", self.mysqldump_executable);
                if let Err(err) = child.kill().await {
                    warn!("Failed to kill {}: {}", self.mysqldump_executable, err);
                }
                return Err(BackupError::Cancelled);
            }
        };

        let copied = match copy_result {
            Ok(copied) => copied,
            Err(err) => {
                if let Err(kill_err) = child.kill().await {
                    warn!("Failed to kill {}: {}", self.mysqldump_executable, kill_err);
                }
                return Err(err.into());
            }
        };

        let status = child.wait().await?;

        if !status.success() {
            return Err(BackupError::ExternalTool {
                command: self.mysqldump_executable.clone(),
                code: status.code(),
            });
        }

        debug!(
            "Finished dumping {} tables ({} bytes) from database {}",
            tables.len(),
            copied,
            self.database
        );

        Ok(())
    }
}
