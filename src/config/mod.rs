use clap::Parser;
use std::path::PathBuf;

/// Command line options for one dump run.
///
/// `--prune` is only valid together with `--keep`; clap rejects the
/// combination up front, before any filesystem or database work.
#[derive(Parser, Debug)]
#[command(
    name = "dumpkeeper",
    version,
    about = "Atomic, rotated schema and data dumps of a MySQL/MariaDB database"
)]
pub struct Options {
    /// Base name of dumpfile. Defaults to name of database.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Add table include pattern. May be specified multiple times.
    #[arg(short, long = "include", value_name = "PATTERN")]
    pub includes: Vec<String>,

    /// Add table exclude pattern. May be specified multiple times.
    #[arg(short, long = "exclude", value_name = "PATTERN")]
    pub excludes: Vec<String>,

    /// Compress backups using gzip
    #[arg(short, long)]
    pub compress: bool,

    /// Prune old backups after dumping the database
    #[arg(short, long, requires = "keep")]
    pub prune: bool,

    /// Keep this number of backups in prune phase
    #[arg(short, long, value_name = "N")]
    pub keep: Option<usize>,

    /// Path to MySQL defaults file
    #[arg(short = 'd', long, value_name = "PATH")]
    pub defaults_file: Option<PathBuf>,

    /// Turn on verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// The destination directory for database dumps
    pub dumpdir: PathBuf,

    /// The database to dump
    pub database: String,
}

impl Options {
    /// Dump file base name; falls back to the database name.
    pub fn basename(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.database)
    }

    /// Include patterns for the data dump; no patterns means everything.
    pub fn include_patterns(&self) -> Vec<String> {
        if self.includes.is_empty() {
            vec!["*".to_string()]
        } else {
            self.includes.clone()
        }
    }
}
