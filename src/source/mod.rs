pub mod mysql;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::sink::DumpSink;
use crate::error::BackupError;

/// A live database that can enumerate its tables and stream dumps of them.
#[async_trait]
pub trait DumpSource {
    /// List table names, filtered to those matching at least one include
    /// pattern and no exclude pattern, in the database's native order.
    async fn list_tables(
        &self,
        includes: &[String],
        excludes: &[String],
    ) -> Result<Vec<String>, BackupError>;

    /// Stream a dump of the given tables into the sink. An empty table
    /// list dumps the whole database. `schema_only` omits row data.
    async fn dump(
        &self,
        sink: &mut DumpSink,
        tables: &[String],
        schema_only: bool,
        cancellation: CancellationToken,
    ) -> Result<(), BackupError>;
}

pub use mysql::MySqlSource;
