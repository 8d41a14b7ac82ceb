//! Skillrun CLI and REST API entry point.
//!
//! Binary name: `skr`
//!
//! Parses CLI arguments, initializes the database, catalog, queue worker,
//! and workload engine client, then dispatches to the appropriate command
//! handler or starts the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,skillrun=debug",
        _ => "trace",
    };
    skillrun_observe::tracing_setup::init_tracing_with_filter(filter, false)
        .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "skr", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::Register { file } => {
            cli::execution::handle_register(&state, &file, cli.json).await?;
        }

        Commands::Run {
            installation_id,
            bundle,
            input,
            no_wait,
        } => {
            cli::execution::handle_run(
                &state,
                installation_id,
                bundle.as_deref(),
                input.as_deref(),
                no_wait,
                cli.json,
            )
            .await?;
        }

        Commands::Status { execution_id } => {
            cli::execution::handle_status(&state, execution_id, cli.json).await?;
        }

        Commands::List {
            skill_id,
            status,
            page,
            per_page,
        } => {
            cli::execution::handle_list(
                &state,
                skill_id,
                status.as_deref(),
                page,
                per_page,
                cli.json,
            )
            .await?;
        }

        Commands::Stop { installation_id } => {
            cli::execution::handle_stop(&state, installation_id, cli.json).await?;
        }

        Commands::Serve { addr } => {
            let router = http::router::build_router(state);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!(addr = addr.as_str(), "REST API listening");
            axum::serve(listener, router).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    skillrun_observe::tracing_setup::shutdown_tracing();
    Ok(())
}
