//! callsift - Batch enrichment of call transcripts
//!
//! Entry point for the callsift CLI application.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use callsift::cli::{commands, completions, Cli, Commands};
use callsift::config::Settings;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        completions::print(shell);
        return Ok(ExitCode::SUCCESS);
    }

    let settings = Settings::load()?;
    init_logging(&settings, cli.verbose);

    match cli.command {
        None => commands::run_pipeline(&settings, None).await,
        Some(Commands::Run { concurrency }) => commands::run_pipeline(&settings, concurrency).await,
        Some(command) => {
            match command {
                Commands::Import { paths } => commands::import_files(&settings, &paths)?,
                Commands::List { limit, pending } => {
                    commands::list_records(&settings, limit, pending)?
                }
                Commands::View { id, json } => commands::view_record(&settings, &id, json)?,
                Commands::Status => commands::show_status(&settings)?,
                Commands::Retry { id } => commands::retry_record(&settings, &id)?,
                Commands::Config(config_cmd) => {
                    commands::config_command(&settings, config_cmd)?
                }
                Commands::Run { .. } | Commands::Completions { .. } => unreachable!(),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(settings: &Settings, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        settings.general.log_level.as_str()
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
