mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use libbranch_core::BranchError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run_command(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::output_error(&cli, &e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run the selected command and return the process exit code
fn run_command(cli: &Cli) -> Result<i32, BranchError> {
    match &cli.command {
        Command::Init { path } => commands::init::run(cli, path),
        Command::Import {
            file,
            title,
            author,
            timestamp,
            revision,
            repo,
        } => commands::import::run(
            cli,
            commands::import::ImportArgs {
                file: file.clone(),
                title: title.clone(),
                author: author.clone(),
                timestamp: timestamp.clone(),
                revision: revision.clone(),
                repo: repo.clone(),
            },
        ),
        Command::ImportAll {
            document_id,
            source,
        } => commands::import_all::run(cli, document_id, source),
        Command::Sync {
            document_ids,
            source,
        } => commands::sync::run(cli, document_ids, source),
        Command::Watch {
            document_ids,
            source,
            interval,
        } => commands::watch::run(cli, document_ids, source, *interval),
        Command::Status => commands::status::run(cli),
        Command::Diff {
            document_id,
            markup,
            repo,
        } => commands::diff::run(cli, document_id, *markup, repo.as_deref()),
    }
}
