// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! DAG document model and validation
//!
//! A document is parsed into a generic `serde_yaml::Value` first (whatever
//! its on-disk format), then [`Dag::from_value`] validates it into typed
//! structures or returns every [`ValidationError`](crate::errors::ValidationError)
//! it found.

mod builder;
mod common;
mod cron;
mod dag;
mod document;
mod executor;
mod graph;
mod infra;
mod notify;
mod path;
mod raw;
mod step;

pub use builder::{Block, DagBuilder, ExecutorBuilder, StepBuilder};
pub use common::{is_identifier, parse_duration, validate_name, Environment, Param, Precondition};
pub use cron::{CronExpr, Schedule};
pub use dag::Dag;
pub use document::{default_dag_name, load_document, parse_document, DocumentFormat};
pub use executor::{
    DockerExecutor, ExecutorConfig, ExecutorKind, HttpExecutor, HttpMethod, JqExecutor, MailExecutor,
    ShellExecutor,
};
pub use graph::DependencyGraph;
pub use infra::{ContainerConfig, LogConfig, PullPolicy, SshConfig};
pub use notify::{HandlerConfig, HandlerOn, MailConfig, MailOn, SmtpConfig};
pub use path::FieldPath;
pub use step::{ContinueOn, ParallelConfig, ParallelItems, RepeatPolicy, RetryPolicy, Step};
