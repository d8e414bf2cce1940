//! longscribe - Transcribe long audio and video files with remote Whisper models
//!
//! Entry point for the longscribe CLI application.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use longscribe::cli::{Cli, Commands};
use longscribe::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        longscribe::cli::completions::print(shell);
        return Ok(());
    }

    let settings = Settings::load()?;

    // Initialize logging
    let default_level = if cli.verbose {
        "debug".to_string()
    } else {
        settings.general.log_level.clone()
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Transcribe {
            input,
            language,
            format,
            output,
        } => {
            longscribe::cli::commands::transcribe_file(&settings, &input, language, format, output)
                .await?;
        }
        Commands::Probe { input, json } => {
            longscribe::cli::commands::probe_file(&settings, &input, json).await?;
        }
        Commands::Doctor { json } => {
            longscribe::cli::commands::run_doctor(&settings, json).await?;
        }
        Commands::Models => {
            longscribe::cli::commands::list_models(&settings)?;
        }
        Commands::Config(config_cmd) => {
            longscribe::cli::commands::config_command(&settings, config_cmd)?;
        }
        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}
