// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "terrace")]
#[command(about = "Staged multi-tier site deployment with resumable transitions")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// JSON lines output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new terrace.yml configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Run a named transition for a site (dev2stg, stg2prod, ...)
    Run {
        /// Site name from terrace.yml
        site: String,

        /// Transition name
        transition: String,

        /// Evaluate preconditions and show the plan without mutating anything
        #[arg(long)]
        dry_run: bool,

        /// Start from this step number (1-based), overriding the resume point
        #[arg(long, value_name = "N")]
        from_step: Option<usize>,

        /// Confirm swap-bearing transitions without prompting
        #[arg(short = 'y', long = "yes")]
        auto_confirm: bool,
    },

    /// Reverse the most recent swap on a tier, within the retention window
    Rollback {
        site: String,

        /// Tier to roll back (normally prod)
        tier: String,
    },

    /// Show registered environments, locks, and swap history for a site
    Status { site: String },

    /// Force-clear a tier lock left behind by a dead process
    Unlock {
        site: String,
        tier: String,
    },

    /// Run an ad-hoc command on a tier's target
    Exec {
        site: String,
        tier: String,

        /// Command to run, passed to the shell
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}
