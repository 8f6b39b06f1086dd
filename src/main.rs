use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use dumpkeeper::{
    config::Options,
    core::{run_backup, Repository},
    observability::init_logging,
    source::MySqlSource,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::parse();

    init_logging(options.verbose)?;

    info!("dumpkeeper v{}", env!("CARGO_PKG_VERSION"));

    let cancellation = CancellationToken::new();
    setup_shutdown_handler(cancellation.clone());

    let mut source = MySqlSource::new(&options.database);
    if let Some(path) = &options.defaults_file {
        source = source.with_defaults_file(path);
    }

    let name = options.basename();

    // Both dump parts share one run timestamp
    let datestamp = Local::now().fixed_offset();

    // Dump DDL
    let schema_repo =
        Repository::new(name, &options.dumpdir, options.compress).with_part("schema");
    run_backup(
        &schema_repo,
        &source,
        &["*".to_string()],
        &[],
        true,
        datestamp,
        cancellation.clone(),
    )
    .await
    .context("Schema dump failed")?;

    // Dump data
    let data_repo = Repository::new(name, &options.dumpdir, options.compress).with_part("data");
    run_backup(
        &data_repo,
        &source,
        &options.include_patterns(),
        &options.excludes,
        false,
        datestamp,
        cancellation.clone(),
    )
    .await
    .context("Data dump failed")?;

    if let Some(keep) = options.keep.filter(|_| options.prune) {
        schema_repo
            .prune(keep)
            .await
            .context("Failed to prune schema dumps")?;
        data_repo
            .prune(keep)
            .await
            .context("Failed to prune data dumps")?;
    }

    Ok(())
}

/// Cancel the run on SIGTERM/SIGINT so the dump subprocess gets killed
/// instead of orphaned.
fn setup_shutdown_handler(cancellation: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(e) => {
                    eprintln!("Failed to listen for SIGTERM: {}", e);
                    return;
                }
            };
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(stream) => stream,
                Err(e) => {
                    eprintln!("Failed to listen for SIGINT: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                    cancellation.cancel();
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT");
                    cancellation.cancel();
                }
            }
        }

        #[cfg(not(unix))]
        {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal (Ctrl+C)");
                    cancellation.cancel();
                }
                Err(e) => {
                    eprintln!("Failed to listen for shutdown signal: {}", e);
                }
            }
        }
    });
}
