// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! dagcheck - Dagu workflow validator
//!
//! Validate DAG definition documents before they reach the scheduler.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dagcheck::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dagcheck=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    dagcheck::utils::init_colors();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Validate { files, format } => {
            dagcheck::cli::validate::run(files, format, cli.verbose).await
        }
        Commands::Graph { file, format } => dagcheck::cli::graph::run(file, format, cli.verbose).await,
        Commands::Explain { kind } => dagcheck::cli::explain::run(kind, cli.verbose).await,
    }
}
