// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for dagcheck.

pub mod explain;
pub mod graph;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Dagu workflow validator
///
/// Check DAG definition documents for schema, executor, schedule and graph errors.
#[derive(Parser, Debug)]
#[clap(
    name = "dagcheck",
    version,
    about = "Validator for Dagu workflow (DAG) definitions",
    long_about = None,
    after_help = "Examples:\n\
        dagcheck validate dags/etl.yaml          Validate one DAG\n\
        dagcheck validate 'dags/*.yaml'          Validate every DAG in a directory\n\
        dagcheck graph dags/etl.yaml -f mermaid  Show the step graph\n\
        dagcheck explain CyclicDependencyError   Learn about an error kind\n\n\
        See 'dagcheck <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate DAG documents (YAML, JSON or TOML)
    Validate {
        /// Files or glob patterns to validate
        #[clap(required = true, value_name = "FILES")]
        files: Vec<String>,

        /// Output format (text, json)
        #[clap(short, long, default_value = "text", env = "DAGCHECK_FORMAT")]
        format: OutputFormat,
    },

    /// Show a DAG's steps as a graph
    Graph {
        /// DAG file
        file: PathBuf,

        /// Output format (text, dot, mermaid)
        #[clap(short, long, default_value = "text")]
        format: GraphFormat,
    },

    /// Explain an error kind with an example fix
    Explain {
        /// Error kind, e.g. CyclicDependencyError or cyclic_dependency
        kind: String,
    },
}

/// Output format for the validate command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_validate_args() {
        let cli = Cli::try_parse_from(["dagcheck", "validate", "a.yaml", "dags/*.yml", "-f", "json"]).unwrap();
        match cli.command {
            Commands::Validate { files, format } => {
                assert_eq!(files, vec!["a.yaml", "dags/*.yml"]);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_validate_needs_a_file() {
        assert!(Cli::try_parse_from(["dagcheck", "validate"]).is_err());
    }

    #[test]
    fn test_graph_format() {
        let cli = Cli::try_parse_from(["dagcheck", "-v", "graph", "etl.yaml", "--format", "Mermaid"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Graph {
                format: GraphFormat::Mermaid,
                ..
            }
        ));
        assert!("svg".parse::<GraphFormat>().is_err());
    }
}
