// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Validation violations and their aggregate
//!
//! Every problem found in a document becomes a [`ValidationError`]: a
//! [`Violation`] plus the [`FieldPath`] where it was found. Validators never
//! stop at the first problem; they push into a [`ValidationErrors`] and keep
//! going, so a caller sees every defect in one pass.

use miette::Diagnostic;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::schema::FieldPath;

/// A single rule broken by a document
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("invalid schedule '{expression}': {reason}")]
    #[diagnostic(
        code(dagcheck::invalid_schedule),
        help("Cron expressions have five fields: minute hour day-of-month month day-of-week")
    )]
    InvalidSchedule { expression: String, reason: String },

    #[error("invalid duration '{value}': {reason}")]
    #[diagnostic(
        code(dagcheck::invalid_duration),
        help("Use whole seconds (90) or a suffixed string (90s, 5m, 2h)")
    )]
    InvalidDuration { value: String, reason: String },

    #[error("invalid name '{name}': {reason}")]
    #[diagnostic(
        code(dagcheck::invalid_name),
        help("Names may only contain ASCII letters, digits, '-' and '_'")
    )]
    InvalidName { name: String, reason: String },

    #[error("unknown executor type '{found}' (valid types: {})", .valid.join(", "))]
    #[diagnostic(code(dagcheck::unknown_executor_type))]
    UnknownExecutorType {
        found: String,
        valid: Vec<&'static str>,
    },

    #[error("{executor} executor is missing required field(s): {}", .missing.join(", "))]
    #[diagnostic(code(dagcheck::incomplete_executor_config))]
    IncompleteExecutorConfig {
        executor: &'static str,
        missing: Vec<&'static str>,
    },

    #[error("step must set exactly one of 'command'/'script' or 'executor', but {reason}")]
    #[diagnostic(
        code(dagcheck::ambiguous_step_definition),
        help("Use 'command' for shell steps, or an 'executor' block for http, ssh, mail, docker and jq steps")
    )]
    AmbiguousStepDefinition { reason: String },

    #[error("duplicate step name(s): {}", .names.join(", "))]
    #[diagnostic(
        code(dagcheck::duplicate_step_name),
        help("Step names must be unique within a DAG")
    )]
    DuplicateStepName { names: Vec<String> },

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    #[diagnostic(
        code(dagcheck::unknown_dependency),
        help("Check that '{dependency}' is defined in this DAG")
    )]
    UnknownDependency { step: String, dependency: String },

    #[error("cyclic dependency: {}", render_cycle(.cycle))]
    #[diagnostic(
        code(dagcheck::cyclic_dependency),
        help("Review the 'depends' lists of these steps to remove the cycle")
    )]
    CyclicDependency { cycle: Vec<String> },

    #[error("{trigger} requires {block} with: {}", .missing.join(", "))]
    #[diagnostic(code(dagcheck::incomplete_notification_config))]
    IncompleteNotificationConfig {
        trigger: String,
        block: &'static str,
        missing: Vec<&'static str>,
    },

    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(dagcheck::invalid_type))]
    InvalidType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("missing required field '{field}'")]
    #[diagnostic(code(dagcheck::missing_field))]
    MissingField { field: &'static str },

    #[error("unknown field '{field}' in {context}")]
    #[diagnostic(code(dagcheck::unknown_field))]
    UnknownField { field: String, context: String },

    #[error("{reason}")]
    #[diagnostic(code(dagcheck::invalid_value))]
    InvalidValue { reason: String },
}

fn render_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} → {}", cycle.join(" → "), first),
        None => String::new(),
    }
}

impl Violation {
    /// The kind of this violation
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSchedule { .. } => ErrorKind::InvalidSchedule,
            Self::InvalidDuration { .. } => ErrorKind::InvalidDuration,
            Self::InvalidName { .. } => ErrorKind::InvalidName,
            Self::UnknownExecutorType { .. } => ErrorKind::UnknownExecutorType,
            Self::IncompleteExecutorConfig { .. } => ErrorKind::IncompleteExecutorConfig,
            Self::AmbiguousStepDefinition { .. } => ErrorKind::AmbiguousStepDefinition,
            Self::DuplicateStepName { .. } => ErrorKind::DuplicateStepName,
            Self::UnknownDependency { .. } => ErrorKind::UnknownDependency,
            Self::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            Self::IncompleteNotificationConfig { .. } => ErrorKind::IncompleteNotificationConfig,
            Self::InvalidType { .. } => ErrorKind::InvalidType,
            Self::MissingField { .. } => ErrorKind::MissingField,
            Self::UnknownField { .. } => ErrorKind::UnknownField,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
        }
    }

    pub(crate) fn invalid_value(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }
}

/// Kinds of violation, without their details
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    InvalidSchedule,
    InvalidDuration,
    InvalidName,
    UnknownExecutorType,
    IncompleteExecutorConfig,
    AmbiguousStepDefinition,
    DuplicateStepName,
    UnknownDependency,
    CyclicDependency,
    IncompleteNotificationConfig,
    InvalidType,
    MissingField,
    UnknownField,
    InvalidValue,
}

impl ErrorKind {
    /// Every kind, in declaration order
    pub const ALL: [ErrorKind; 14] = [
        Self::InvalidSchedule,
        Self::InvalidDuration,
        Self::InvalidName,
        Self::UnknownExecutorType,
        Self::IncompleteExecutorConfig,
        Self::AmbiguousStepDefinition,
        Self::DuplicateStepName,
        Self::UnknownDependency,
        Self::CyclicDependency,
        Self::IncompleteNotificationConfig,
        Self::InvalidType,
        Self::MissingField,
        Self::UnknownField,
        Self::InvalidValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidSchedule => "InvalidScheduleError",
            Self::InvalidDuration => "InvalidDurationError",
            Self::InvalidName => "InvalidNameError",
            Self::UnknownExecutorType => "UnknownExecutorTypeError",
            Self::IncompleteExecutorConfig => "IncompleteExecutorConfigError",
            Self::AmbiguousStepDefinition => "AmbiguousStepDefinitionError",
            Self::DuplicateStepName => "DuplicateStepNameError",
            Self::UnknownDependency => "UnknownDependencyError",
            Self::CyclicDependency => "CyclicDependencyError",
            Self::IncompleteNotificationConfig => "IncompleteNotificationConfigError",
            Self::InvalidType => "InvalidTypeError",
            Self::MissingField => "MissingFieldError",
            Self::UnknownField => "UnknownFieldError",
            Self::InvalidValue => "InvalidValueError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = crate::DagcheckError;

    /// Accepts `CyclicDependencyError`, `CyclicDependency` or `cyclic_dependency`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        let wanted = wanted.strip_suffix("error").unwrap_or(&wanted);

        Self::ALL
            .into_iter()
            .find(|kind| {
                kind.as_str()
                    .trim_end_matches("Error")
                    .eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| crate::DagcheckError::UnknownErrorKind {
                name: s.to_string(),
                known: Self::ALL
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// A violation located in the input document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    path: FieldPath,
    violation: Violation,
}

impl ValidationError {
    pub fn new(path: FieldPath, violation: Violation) -> Self {
        Self { path, violation }
    }

    pub fn kind(&self) -> ErrorKind {
        self.violation.kind()
    }

    /// Human-readable message, without the location
    pub fn message(&self) -> String {
        self.violation.to_string()
    }

    /// Where in the document the violation was found, e.g. `steps[2].executor`
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn violation(&self) -> &Violation {
        &self.violation
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.violation)
    }
}

impl std::error::Error for ValidationError {}

impl Diagnostic for ValidationError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.violation.code()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.violation.help()
    }
}

/// Every violation found in one document, in discovery order
#[derive(Error, Debug, Diagnostic, Clone, Default, PartialEq, Eq)]
#[error("document failed validation with {} error(s)", .errors.len())]
#[diagnostic(code(dagcheck::invalid_document))]
pub struct ValidationErrors {
    #[related]
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: FieldPath, violation: Violation) {
        tracing::trace!(%path, %violation, "violation");
        self.errors.push(ValidationError::new(path, violation));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.errors.iter()
    }

    /// Kinds of all violations, in discovery order
    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.errors.iter().map(ValidationError::kind).collect()
    }

    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind() == kind)
    }

    /// All violations of one kind
    pub fn of_kind(&self, kind: ErrorKind) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.kind() == kind)
    }

    /// One line per violation: `path: message`
    pub fn render(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str_accepts_several_spellings() {
        assert_eq!(
            "CyclicDependencyError".parse::<ErrorKind>().unwrap(),
            ErrorKind::CyclicDependency
        );
        assert_eq!(
            "cyclic_dependency".parse::<ErrorKind>().unwrap(),
            ErrorKind::CyclicDependency
        );
        assert_eq!(
            "invalid-schedule".parse::<ErrorKind>().unwrap(),
            ErrorKind::InvalidSchedule
        );
        assert!("nope".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn test_cycle_message_closes_the_loop() {
        let violation = Violation::CyclicDependency {
            cycle: vec!["A".into(), "C".into(), "B".into()],
        };
        assert_eq!(violation.to_string(), "cyclic dependency: A → C → B → A");
    }

    #[test]
    fn test_error_display_includes_path() {
        let mut errors = ValidationErrors::new();
        errors.push(
            FieldPath::root().key("steps").index(2).key("executor"),
            Violation::IncompleteExecutorConfig {
                executor: "http",
                missing: vec!["url"],
            },
        );

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.render(),
            "steps[2].executor: http executor is missing required field(s): url"
        );
        assert!(errors.contains(ErrorKind::IncompleteExecutorConfig));
    }
}
