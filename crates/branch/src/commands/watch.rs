use std::time::Duration;

use libbranch_core::{BranchError, CancelToken};
use tracing::{info, warn};

use crate::cli::{Cli, SourceArgs};
use crate::commands::sync::sync_documents;
use crate::context::BranchContext;
use crate::output::{output_success, print_human};

/// Sync the documents on a fixed interval until Ctrl-C or SIGTERM. A signal
/// during a run lets the current revision finish, then stops.
pub fn run(
    cli: &Cli,
    document_ids: &[String],
    source: &SourceArgs,
    interval: Option<u64>,
) -> Result<i32, BranchError> {
    let ctx = BranchContext::resolve(cli)?;
    let interval = interval.unwrap_or(ctx.config.watch_interval_secs);
    if interval == 0 {
        return Err(BranchError::InvalidArgs(
            "--interval must be at least 1 second".to_string(),
        ));
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(watch_loop(
        cli.clone(),
        ctx,
        source.clone(),
        document_ids.to_vec(),
        Duration::from_secs(interval),
    ))
}

async fn watch_loop(
    cli: Cli,
    ctx: BranchContext,
    source: SourceArgs,
    document_ids: Vec<String>,
    interval: Duration,
) -> Result<i32, BranchError> {
    let cancel = CancelToken::new();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    print_human(
        &cli,
        &format!(
            "Watching {} document(s) every {}s; press Ctrl-C to stop",
            document_ids.len(),
            interval.as_secs()
        ),
    );

    let mut runs = 0u64;
    loop {
        runs += 1;
        let mut job = tokio::task::spawn_blocking({
            let cli = cli.clone();
            let ctx = ctx.clone();
            let source = source.clone();
            let document_ids = document_ids.clone();
            let cancel = cancel.clone();
            move || sync_documents(&cli, &ctx, &source, &document_ids, &cancel)
        });

        let finished = tokio::select! {
            result = &mut job => Some(result),
            _ = &mut shutdown => None,
        };
        let stopping = finished.is_none();
        let result = match finished {
            Some(result) => result,
            None => {
                info!("Shutdown requested, finishing the current revision");
                cancel.cancel();
                job.await
            }
        };

        match result {
            Ok(output) => {
                info!(run = runs, exit_code = output.exit_code(), "Watch run finished");
                output_success(&cli, output);
            }
            Err(e) => warn!("Watch run {} aborted: {}", runs, e),
        }

        if stopping {
            break;
        }

        let stop = tokio::select! {
            _ = tokio::time::sleep(interval) => false,
            _ = &mut shutdown => true,
        };
        if stop {
            break;
        }
    }

    print_human(&cli, "Stopped");
    Ok(0)
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
