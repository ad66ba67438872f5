// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Error types
//!
//! Two layers live here. [`Violation`] and [`ValidationErrors`] describe what is
//! wrong with a DAG document; [`DagcheckError`] covers everything around the
//! validator (reading files, parsing YAML/JSON/TOML, expanding globs).

mod educational;
mod validation;

pub use educational::EducationalMessage;
pub use validation::{ErrorKind, ValidationError, ValidationErrors, Violation};

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for dagcheck operations
pub type DagcheckResult<T> = Result<T, DagcheckError>;

/// Main error type for dagcheck
#[derive(Error, Debug, Diagnostic)]
pub enum DagcheckError {
    // ─────────────────────────────────────────────────────────────────────────
    // Document Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error("Unsupported document format for: {path}")]
    #[diagnostic(
        code(dagcheck::unsupported_format),
        help("Supported formats: YAML (.yaml, .yml), JSON (.json), TOML (.toml)")
    )]
    UnsupportedFormat { path: PathBuf },

    #[error("Unknown error kind '{name}'")]
    #[diagnostic(
        code(dagcheck::unknown_error_kind),
        help("Known kinds: {known}")
    )]
    UnknownErrorKind { name: String, known: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("File not found: {path}")]
    #[diagnostic(code(dagcheck::file_not_found))]
    FileNotFound {
        path: PathBuf,
        #[help]
        help: Option<String>,
    },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(dagcheck::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("No files matched pattern: {pattern}")]
    #[diagnostic(
        code(dagcheck::no_input_files),
        help("Check that files matching '{pattern}' exist")
    )]
    NoInputFiles { pattern: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(dagcheck::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(dagcheck::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(dagcheck::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(dagcheck::toml_error))]
    Toml { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(dagcheck::glob_error))]
    GlobPattern { message: String },

    #[error("Background task failed: {message}")]
    #[diagnostic(code(dagcheck::task_error))]
    Task { message: String },
}

impl From<std::io::Error> for DagcheckError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for DagcheckError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for DagcheckError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for DagcheckError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<glob::PatternError> for DagcheckError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl From<tokio::task::JoinError> for DagcheckError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task { message: e.to_string() }
    }
}

impl DagcheckError {
    /// Create a file not found error with a hint about globbing
    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound {
            path,
            help: Some("Pass a path to an existing DAG file or a quoted glob such as 'dags/*.yaml'".into()),
        }
    }

    /// The validation report carried by this error, if it is one
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}
