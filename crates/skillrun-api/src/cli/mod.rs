//! CLI argument definitions.

pub mod execution;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Skillrun: run packaged automation skills as leveled workflow DAGs.
#[derive(Parser)]
#[command(name = "skr", version, about)]
pub struct Cli {
    /// Output JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a skill bundle (skill package + unit bindings) from YAML.
    Register {
        /// Path to the bundle YAML file.
        file: std::path::PathBuf,
    },

    /// Start a skill execution and wait for it to finish.
    Run {
        /// Installation UUID to run.
        installation_id: Option<uuid::Uuid>,

        /// Register this bundle first and run its installation.
        #[arg(long)]
        bundle: Option<std::path::PathBuf>,

        /// JSON input payload.
        #[arg(long)]
        input: Option<String>,

        /// Return immediately instead of waiting for completion.
        #[arg(long)]
        no_wait: bool,
    },

    /// Show the status of an execution, with per-unit detail.
    Status {
        /// Execution UUID.
        execution_id: uuid::Uuid,
    },

    /// List executions of a skill.
    List {
        /// Skill UUID.
        skill_id: uuid::Uuid,

        /// Filter by status (e.g. "success", "partial_failed").
        #[arg(long)]
        status: Option<String>,

        /// Page number (1-based).
        #[arg(long, default_value = "1")]
        page: u32,

        /// Page size.
        #[arg(long, default_value = "20")]
        per_page: u32,
    },

    /// Stop all running executions of an installation.
    Stop {
        /// Installation UUID.
        installation_id: uuid::Uuid,
    },

    /// Start the REST API server.
    Serve {
        /// Listen address.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}
