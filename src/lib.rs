// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! # dagcheck - Dagu workflow validator
//!
//! `dagcheck` validates Dagu DAG definition documents: steps, executors,
//! schedules, notifications and the dependency graph between steps.
//!
//! ## Features
//!
//! - **Accept or reject** - A document becomes a typed [`Dag`], or a list of every problem found
//! - **Precise locations** - Each problem carries a path such as `steps[2].executor.url`
//! - **Graph checks** - Duplicate names, unknown dependencies and every cycle
//! - **Builders** - Construct DAGs in code with the same rules as documents
//! - **Educational** - `dagcheck explain` describes each error kind with a fixed example
//!
//! ## Quick Start
//!
//! ```bash
//! # Validate every DAG in a directory
//! dagcheck validate 'dags/*.yaml'
//!
//! # Show the execution order
//! dagcheck graph dags/etl.yaml
//!
//! # Learn about an error
//! dagcheck explain CyclicDependencyError
//! ```
//!
//! ```
//! let dag = dagcheck::Dag::from_yaml(
//!     "name: hello\nsteps:\n  - name: greet\n    command: echo hello\n",
//! )
//! .unwrap();
//! assert_eq!(dag.steps()[0].name(), "greet");
//! ```

pub mod cli;
pub mod errors;
pub mod schema;
pub mod utils;

// Re-export commonly used types
pub use errors::{DagcheckError, DagcheckResult, ErrorKind, ValidationError, ValidationErrors, Violation};
pub use schema::{Dag, DagBuilder, DependencyGraph, ExecutorConfig, ExecutorKind, FieldPath, Step, StepBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
