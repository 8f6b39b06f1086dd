use chrono::{DateTime, FixedOffset};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::pattern::selects_whole_database;
use crate::core::repository::Repository;
use crate::error::BackupError;
use crate::source::DumpSource;

/// Run one backup job: resolve the table selection, open a dump sink in the
/// repository and stream the source into it. The dump becomes visible at
/// its final path only when the sink commits; any failure aborts the sink
/// and propagates.
pub async fn run_backup<S: DumpSource>(
    repository: &Repository,
    source: &S,
    includes: &[String],
    excludes: &[String],
    schema_only: bool,
    datestamp: DateTime<FixedOffset>,
    cancellation: CancellationToken,
) -> Result<(), BackupError> {
    // An empty table list makes the dump tool fall back to dumping the
    // whole database, so an unfiltered selection needs no listing round trip.
    let tables = if selects_whole_database(includes, excludes) {
        debug!("Unfiltered selection, dumping whole database");
        Vec::new()
    } else {
        source.list_tables(includes, excludes).await?
    };

    let mut sink = repository.open(Some(datestamp)).await?;

    match source.dump(&mut sink, &tables, schema_only, cancellation).await {
        Ok(()) => {
            sink.commit().await?;
            Ok(())
        }
        Err(err) => {
            sink.abort().await;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sink::DumpSink;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use tokio::io::AsyncWriteExt;

    struct ScriptedSource {
        tables: Vec<String>,
        payload: &'static [u8],
        fail_after_payload: bool,
        allow_listing: bool,
    }

    #[async_trait]
    impl DumpSource for ScriptedSource {
        async fn list_tables(
            &self,
            includes: &[String],
            excludes: &[String],
        ) -> Result<Vec<String>, BackupError> {
            assert!(
                self.allow_listing,
                "list_tables must not be called for a whole-database job"
            );
            Ok(self
                .tables
                .iter()
                .filter(|t| {
                    crate::core::pattern::matches_any(t, includes)
                        && !crate::core::pattern::matches_any(t, excludes)
                })
                .cloned()
                .collect())
        }

        async fn dump(
            &self,
            sink: &mut DumpSink,
            _tables: &[String],
            _schema_only: bool,
            _cancellation: CancellationToken,
        ) -> Result<(), BackupError> {
            sink.write_all(self.payload).await?;
            if self.fail_after_payload {
                return Err(BackupError::ExternalTool {
                    command: "mysqldump".to_string(),
                    code: Some(2),
                });
            }
            Ok(())
        }
    }

    fn stamp() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn successful_job_makes_dump_visible() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::new("db", dir.path(), false).with_part("data");
        let source = ScriptedSource {
            tables: strings(&["users", "sessions"]),
            payload: b"INSERT INTO users VALUES (1);",
            fail_after_payload: false,
            allow_listing: true,
        };

        run_backup(
            &repo,
            &source,
            &strings(&["users"]),
            &[],
            false,
            stamp(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let index = repo.index().await.unwrap();
        assert_eq!(index.len(), 1);
        let content = tokio::fs::read(&index[0]).await.unwrap();
        assert_eq!(content, b"INSERT INTO users VALUES (1);");
    }

    #[tokio::test]
    async fn failed_dump_leaves_no_visible_entry() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::new("db", dir.path(), false).with_part("data");
        let source = ScriptedSource {
            tables: strings(&["users"]),
            payload: b"partial bytes already forwarded",
            fail_after_payload: true,
            allow_listing: true,
        };

        let result = run_backup(
            &repo,
            &source,
            &strings(&["*"]),
            &strings(&["audit_*"]),
            false,
            stamp(),
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(BackupError::ExternalTool { code: Some(2), .. })
        ));
        assert!(repo.index().await.unwrap().is_empty());
        assert!(!repo.filepath(Some(stamp())).exists());
    }

    #[tokio::test]
    async fn whole_database_job_skips_table_listing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::new("db", dir.path(), false).with_part("schema");
        let source = ScriptedSource {
            tables: strings(&["users"]),
            payload: b"CREATE TABLE users ();",
            fail_after_payload: false,
            allow_listing: false,
        };

        run_backup(
            &repo,
            &source,
            &strings(&["*"]),
            &[],
            true,
            stamp(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(repo.index().await.unwrap().len(), 1);
    }
}
