// ABOUTME: Entry point for the terrace CLI application.
// ABOUTME: Parses arguments, initializes tracing, and dispatches to command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use terrace::commands;
use terrace::config;
use terrace::error::Result;
use terrace::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);

    let result = run(cli, &mut output).await;

    if let Err(e) = result {
        output.error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, output: &mut Output) -> Result<()> {
    match cli.command {
        Commands::Init { force } => {
            let cwd = std::env::current_dir()?;
            config::init_config(&cwd, force)?;
            output.success(&format!("Wrote {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Run {
            site,
            transition,
            dry_run,
            from_step,
            auto_confirm,
        } => {
            commands::run(
                &site,
                &transition,
                dry_run,
                from_step,
                auto_confirm,
                output,
            )
            .await
        }
        Commands::Rollback { site, tier } => commands::rollback(&site, &tier, output).await,
        Commands::Status { site } => commands::status(&site, output).await,
        Commands::Unlock { site, tier } => commands::unlock(&site, &tier, output).await,
        Commands::Exec {
            site,
            tier,
            command,
        } => commands::exec(&site, &tier, &command).await,
    }
}
