// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Step model
//!
//! A step is checked in a fixed order: name, the command/executor choice,
//! executor resolution, `depends`, then the policy and infrastructure
//! sub-blocks, and finally the unknown-key check. Every problem is recorded;
//! the step value itself is only produced when none were found.
//!
//! Cross-step checks (unknown dependencies, cycles) need the whole DAG, so
//! parsing returns a [`StepDraft`] that carries the name and `depends` even
//! when the step itself was rejected.

use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_yaml::Value;
use std::sync::LazyLock;

use super::common::{self, Environment, Precondition};
use super::executor::{ExecutorConfig, ShellExecutor};
use super::infra::{ContainerConfig, LogConfig, SshConfig};
use super::raw::{self, Fields};
use super::FieldPath;
use crate::errors::{ValidationErrors, Violation};

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$(\{[A-Za-z_][A-Za-z0-9_]*\}|[A-Za-z_][A-Za-z0-9_]*)$").expect("valid regex")
});

/// How many times a failed step is retried
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_sec: Option<u64>,
    /// Exit codes that trigger a retry; empty means any failure
    #[serde(rename = "exitCode", skip_serializing_if = "Vec::is_empty")]
    pub exit_codes: Vec<i32>,
}

impl RetryPolicy {
    pub(crate) fn parse(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        let before = errors.len();
        let mut fields = Fields::open(value, path, errors)?;

        if !fields.has("limit") {
            errors.push(fields.path().clone(), Violation::MissingField { field: "limit" });
        }
        let limit = fields.count("limit", errors);
        let interval_sec = fields.duration("intervalSec", errors);
        let exit_codes = fields.int_list("exitCode", errors);
        fields.finish("retryPolicy", errors);

        if errors.len() != before {
            return None;
        }
        Some(Self {
            limit: limit?,
            interval_sec,
            exit_codes,
        })
    }
}

/// Re-run a step after it finishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatPolicy {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub repeat: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_sec: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl RepeatPolicy {
    pub(crate) fn parse(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        let before = errors.len();
        let mut fields = Fields::open(value, path, errors)?;

        let repeat = fields.flag("repeat", errors);
        let interval_sec = fields.duration("intervalSec", errors);
        let limit = fields.count("limit", errors);
        if repeat && !fields.has("intervalSec") {
            errors.push(fields.path().clone(), Violation::MissingField { field: "intervalSec" });
        }
        fields.finish("repeatPolicy", errors);

        (errors.len() == before).then_some(Self {
            repeat,
            interval_sec,
            limit,
        })
    }
}

/// Conditions under which the DAG carries on past this step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueOn {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub failure: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub mark_success: bool,
    #[serde(rename = "exitCode", skip_serializing_if = "Vec::is_empty")]
    pub exit_codes: Vec<i32>,
    /// Output patterns that count as success
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,
}

impl ContinueOn {
    pub(crate) fn parse(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        let before = errors.len();
        let mut fields = Fields::open(value, path, errors)?;

        let continue_on = Self {
            failure: fields.flag("failure", errors),
            skipped: fields.flag("skipped", errors),
            mark_success: fields.flag("markSuccess", errors),
            exit_codes: fields.int_list("exitCode", errors),
            output: fields.string_list("output", errors),
        };
        fields.finish("continueOn", errors);

        (errors.len() == before).then_some(continue_on)
    }
}

/// What a parallel step fans out over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParallelItems {
    /// Literal items; scalars are kept in their textual form
    List(Vec<String>),
    /// A variable such as `${ITEMS}` resolved at run time
    Reference(String),
}

impl Serialize for ParallelItems {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::List(items) => items.serialize(serializer),
            Self::Reference(reference) => serializer.serialize_str(reference),
        }
    }
}

/// Run the step once per item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    pub items: ParallelItems,
    pub max_concurrent: Option<u32>,
}

impl Serialize for ParallelConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Some(max_concurrent) = self.max_concurrent else {
            return self.items.serialize(serializer);
        };
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("items", &self.items)?;
        map.serialize_entry("maxConcurrent", &max_concurrent)?;
        map.end()
    }
}

impl ParallelConfig {
    pub(crate) fn parse(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        let Value::Mapping(map) = value else {
            return Self::parse_items(value, path, errors).map(|items| Self {
                items,
                max_concurrent: None,
            });
        };

        let before = errors.len();
        let mut fields = Fields::from_mapping(map, path);
        let items = match fields.get("items") {
            Some(items) => Self::parse_items(items, fields.child("items"), errors),
            None => {
                errors.push(fields.path().clone(), Violation::MissingField { field: "items" });
                None
            }
        };
        let max_concurrent = fields.positive("maxConcurrent", errors);
        fields.finish("parallel", errors);

        if errors.len() != before {
            return None;
        }
        Some(Self {
            items: items?,
            max_concurrent,
        })
    }

    fn parse_items(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<ParallelItems> {
        match value {
            Value::String(s) if REFERENCE_RE.is_match(s.trim()) => {
                Some(ParallelItems::Reference(s.trim().to_string()))
            }
            Value::String(s) => {
                errors.push(
                    path,
                    Violation::invalid_value(format!(
                        "'{}' is neither a list nor a variable reference such as ${{ITEMS}}",
                        s
                    )),
                );
                None
            }
            Value::Sequence(items) if items.is_empty() => {
                errors.push(path, Violation::invalid_value("parallel must list at least one item"));
                None
            }
            Value::Sequence(items) => {
                let before = errors.len();
                let items: Vec<String> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| {
                        let text = common::scalar_to_string(item);
                        if text.is_none() {
                            errors.push(path.index(i), raw::wrong_type("scalar", item));
                        }
                        text
                    })
                    .collect();
                (errors.len() == before).then_some(ParallelItems::List(items))
            }
            other => {
                errors.push(path, raw::wrong_type("sequence or variable reference", other));
                None
            }
        }
    }
}

/// Where a step's name comes from
#[derive(Debug, Clone, Copy)]
pub(crate) enum NameSource<'a> {
    /// Entry `n` (1-based) of a `steps` sequence; string shorthand is named `step_<n>`
    Listed(usize),
    /// Key of a `steps` mapping; an inner `name` must agree with it
    Key(&'a str),
    /// Lifecycle handler, named after its event unless a name is given
    Handler(&'static str),
}

impl NameSource<'_> {
    fn context(&self) -> String {
        match self {
            Self::Handler(event) => format!("{} handler", event),
            _ => "step".to_string(),
        }
    }

    fn fallback(&self) -> Option<String> {
        match self {
            Self::Listed(_) => None,
            Self::Key(key) => Some(key.to_string()),
            Self::Handler(event) => Some(event.to_string()),
        }
    }
}

/// Result of parsing one step, good or bad
#[derive(Debug, Clone)]
pub(crate) struct StepDraft {
    pub name: Option<String>,
    pub depends: Vec<(String, FieldPath)>,
    pub step: Option<Step>,
    pub path: FieldPath,
}

/// One unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    name: String,
    description: Option<String>,
    executor: ExecutorConfig,
    depends: Vec<String>,
    retry_policy: Option<RetryPolicy>,
    repeat_policy: Option<RepeatPolicy>,
    continue_on: Option<ContinueOn>,
    parallel: Option<ParallelConfig>,
    preconditions: Vec<Precondition>,
    env: Environment,
    dir: Option<String>,
    output: Option<String>,
    timeout_sec: Option<u64>,
    mail_on_error: bool,
    container: Option<ContainerConfig>,
    ssh: Option<SshConfig>,
    log: Option<LogConfig>,
}

impl Step {
    pub(crate) fn parse(
        value: &Value,
        path: FieldPath,
        source: NameSource<'_>,
        errors: &mut ValidationErrors,
    ) -> StepDraft {
        if let Value::String(command) = value {
            return Self::shorthand(command, path, source, errors);
        }

        let mut draft = StepDraft {
            name: None,
            depends: Vec::new(),
            step: None,
            path: path.clone(),
        };
        let before = errors.len();
        let Some(mut fields) = Fields::open(value, path, errors) else {
            draft.name = source.fallback();
            return draft;
        };

        // 1. name
        let name = Self::read_name(&mut fields, source, errors);
        draft.name = name.clone();

        // 2. exactly one of the shell family or `executor`
        let has_command = fields.has("command") || fields.has("script");
        let has_executor = fields.has("executor");
        let mut executor = None;
        match (has_command, has_executor) {
            (true, true) => {
                errors.push(
                    fields.path().clone(),
                    Violation::AmbiguousStepDefinition {
                        reason: "both are set".into(),
                    },
                );
                fields.skip(&["command", "script", "shell", "executor"]);
            }
            (false, false) => {
                errors.push(
                    fields.path().clone(),
                    Violation::AmbiguousStepDefinition {
                        reason: "neither is set".into(),
                    },
                );
                fields.skip(&["shell"]);
            }
            // 3. executor resolution
            (true, false) => {
                executor = ShellExecutor::read(&mut fields, errors)
                    .ok()
                    .flatten()
                    .map(ExecutorConfig::Shell);
            }
            (false, true) => {
                executor = fields.block("executor", errors, ExecutorConfig::resolve);
            }
        }

        // 4. depends, only checked for shape here
        if !matches!(source, NameSource::Handler(_)) {
            draft.depends = Self::read_depends(&mut fields, errors);
        }

        // 5. sub-blocks
        let description = fields.string("description", errors);
        let retry_policy = fields.block("retryPolicy", errors, RetryPolicy::parse);
        let repeat_policy = fields.block("repeatPolicy", errors, RepeatPolicy::parse);
        let continue_on = fields.block("continueOn", errors, ContinueOn::parse);
        let parallel = fields.block("parallel", errors, ParallelConfig::parse);
        let preconditions = match fields.get_aliased(&["preconditions", "precondition"], errors) {
            Some((key, value)) => Precondition::parse_list(value, fields.child(key), errors).unwrap_or_default(),
            None => Vec::new(),
        };
        let env = fields.env("env", errors);
        let dir = fields.string("dir", errors).and_then(|dir| match common::validate_path(&dir) {
            Ok(()) => Some(dir),
            Err(reason) => {
                errors.push(fields.child("dir"), Violation::InvalidValue { reason });
                None
            }
        });
        let output = fields.string("output", errors).and_then(|output| {
            if common::is_identifier(&output) {
                Some(output)
            } else {
                errors.push(
                    fields.child("output"),
                    Violation::invalid_value(format!("output '{}' is not a valid variable name", output)),
                );
                None
            }
        });
        let timeout_sec = fields.duration("timeoutSec", errors);
        let mail_on_error = fields.flag("mailOnError", errors);
        let container = fields.block("container", errors, ContainerConfig::parse);
        let ssh = fields.block("ssh", errors, SshConfig::parse);
        let log = fields.block("log", errors, LogConfig::parse);

        // 6. leftovers
        fields.finish(&source.context(), errors);

        if errors.len() != before {
            return draft;
        }
        if let (Some(name), Some(executor)) = (name, executor) {
            draft.step = Some(Self {
                name,
                description,
                executor,
                depends: draft.depends.iter().map(|(dep, _)| dep.clone()).collect(),
                retry_policy,
                repeat_policy,
                continue_on,
                parallel,
                preconditions,
                env,
                dir,
                output,
                timeout_sec,
                mail_on_error,
                container,
                ssh,
                log,
            });
        }
        draft
    }

    /// A bare string is a shell command
    fn shorthand(command: &str, path: FieldPath, source: NameSource<'_>, errors: &mut ValidationErrors) -> StepDraft {
        let name = match source {
            NameSource::Listed(n) => format!("step_{}", n),
            NameSource::Key(key) => key.to_string(),
            NameSource::Handler(event) => event.to_string(),
        };

        let before = errors.len();
        if let NameSource::Key(key) = source {
            if let Err(violation) = common::validate_name(key) {
                errors.push(path.clone(), violation);
            }
        }
        if command.trim().is_empty() {
            errors.push(path.clone(), Violation::invalid_value("command must not be empty"));
        }

        let step = (errors.len() == before).then(|| Self::from_command(name.clone(), command.to_string()));
        StepDraft {
            name: Some(name),
            depends: Vec::new(),
            step,
            path,
        }
    }

    fn from_command(name: String, command: String) -> Self {
        Self {
            name,
            description: None,
            executor: ExecutorConfig::Shell(ShellExecutor {
                command: Some(command),
                ..ShellExecutor::default()
            }),
            depends: Vec::new(),
            retry_policy: None,
            repeat_policy: None,
            continue_on: None,
            parallel: None,
            preconditions: Vec::new(),
            env: Environment::default(),
            dir: None,
            output: None,
            timeout_sec: None,
            mail_on_error: false,
            container: None,
            ssh: None,
            log: None,
        }
    }

    fn read_name(fields: &mut Fields<'_>, source: NameSource<'_>, errors: &mut ValidationErrors) -> Option<String> {
        let Some(value) = fields.get("name") else {
            match source {
                NameSource::Listed(_) => {
                    errors.push(fields.path().clone(), Violation::MissingField { field: "name" });
                }
                NameSource::Key(key) => {
                    if let Err(violation) = common::validate_name(key) {
                        errors.push(fields.path().clone(), violation);
                    }
                }
                NameSource::Handler(_) => {}
            }
            return source.fallback();
        };

        let path = fields.child("name");
        let name = raw::expect_str(value, &path, errors)?.to_string();
        if let NameSource::Key(key) = source {
            if name != key {
                errors.push(
                    path,
                    Violation::invalid_value(format!("name '{}' does not match its key '{}'", name, key)),
                );
                return Some(key.to_string());
            }
        }
        if let Err(violation) = common::validate_name(&name) {
            errors.push(path, violation);
        }
        Some(name)
    }

    fn read_depends(fields: &mut Fields<'_>, errors: &mut ValidationErrors) -> Vec<(String, FieldPath)> {
        let Some(value) = fields.get("depends") else {
            return Vec::new();
        };
        let path = fields.child("depends");
        let Some(names) = raw::expect_str_list(value, &path, errors) else {
            return Vec::new();
        };

        let listed = value.is_sequence();
        let mut depends: Vec<(String, FieldPath)> = Vec::with_capacity(names.len());
        for (i, name) in names.into_iter().enumerate() {
            let dep_path = if listed { path.index(i) } else { path.clone() };
            if depends.iter().any(|(seen, _)| *seen == name) {
                errors.push(
                    dep_path,
                    Violation::invalid_value(format!("'{}' is listed more than once", name)),
                );
                continue;
            }
            depends.push((name, dep_path));
        }
        depends
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn executor(&self) -> &ExecutorConfig {
        &self.executor
    }

    /// The shell command line, for shell steps that have one
    pub fn command(&self) -> Option<&str> {
        match &self.executor {
            ExecutorConfig::Shell(shell) => shell.command.as_deref(),
            _ => None,
        }
    }

    /// Names of the steps this one waits for
    pub fn depends(&self) -> &[String] {
        &self.depends
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }

    pub fn repeat_policy(&self) -> Option<&RepeatPolicy> {
        self.repeat_policy.as_ref()
    }

    pub fn continue_on(&self) -> Option<&ContinueOn> {
        self.continue_on.as_ref()
    }

    pub fn parallel(&self) -> Option<&ParallelConfig> {
        self.parallel.as_ref()
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn dir(&self) -> Option<&str> {
        self.dir.as_deref()
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn timeout_sec(&self) -> Option<u64> {
        self.timeout_sec
    }

    pub fn mail_on_error(&self) -> bool {
        self.mail_on_error
    }

    pub fn container(&self) -> Option<&ContainerConfig> {
        self.container.as_ref()
    }

    pub fn ssh(&self) -> Option<&SshConfig> {
        self.ssh.as_ref()
    }

    pub fn log(&self) -> Option<&LogConfig> {
        self.log.as_ref()
    }
}

fn is_empty<T>(items: &&[T]) -> bool {
    items.is_empty()
}

/// Document shape of a step; shell steps are written with `command`/`script`
/// on the step itself rather than under `executor`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StepRepr<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(flatten)]
    shell: Option<&'a ShellExecutor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    executor: Option<&'a ExecutorConfig>,
    #[serde(skip_serializing_if = "is_empty")]
    depends: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_policy: Option<&'a RetryPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeat_policy: Option<&'a RepeatPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    continue_on: Option<&'a ContinueOn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel: Option<&'a ParallelConfig>,
    #[serde(skip_serializing_if = "is_empty")]
    preconditions: &'a [Precondition],
    #[serde(skip_serializing_if = "Environment::is_empty")]
    env: &'a Environment,
    #[serde(skip_serializing_if = "Option::is_none")]
    dir: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_sec: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    mail_on_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    container: Option<&'a ContainerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssh: Option<&'a SshConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log: Option<&'a LogConfig>,
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (shell, executor) = match &self.executor {
            ExecutorConfig::Shell(shell) => (Some(shell), None),
            other => (None, Some(other)),
        };

        StepRepr {
            name: &self.name,
            description: self.description.as_deref(),
            shell,
            executor,
            depends: &self.depends,
            retry_policy: self.retry_policy.as_ref(),
            repeat_policy: self.repeat_policy.as_ref(),
            continue_on: self.continue_on.as_ref(),
            parallel: self.parallel.as_ref(),
            preconditions: &self.preconditions,
            env: &self.env,
            dir: self.dir.as_deref(),
            output: self.output.as_deref(),
            timeout_sec: self.timeout_sec,
            mail_on_error: self.mail_on_error,
            container: self.container.as_ref(),
            ssh: self.ssh.as_ref(),
            log: self.log.as_ref(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::schema::executor::ExecutorKind;

    fn parse(yaml: &str) -> (StepDraft, ValidationErrors) {
        parse_as(yaml, NameSource::Listed(1))
    }

    fn parse_as(yaml: &str, source: NameSource<'_>) -> (StepDraft, ValidationErrors) {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        let mut errors = ValidationErrors::new();
        let draft = Step::parse(&value, FieldPath::root().key("steps").index(0), source, &mut errors);
        (draft, errors)
    }

    #[test]
    fn test_full_step() {
        let (draft, errors) = parse(
            r#"
name: load
description: Load the nightly extract
command: python load.py --date ${DATE}
depends: [extract, transform]
retryPolicy:
  limit: 3
  intervalSec: 30
  exitCode: [1, 75]
continueOn:
  failure: true
  output: ["skipped"]
parallel:
  items: [eu, us]
  maxConcurrent: 2
preconditions:
  - condition: "`date +%u`"
    expected: "1"
env:
  - DATE: "2025-01-01"
dir: /srv/etl
output: LOAD_RESULT
timeoutSec: 10m
"#,
        );
        assert!(errors.is_empty(), "{}", errors.render());
        let step = draft.step.unwrap();
        assert_eq!(step.name(), "load");
        assert_eq!(step.command(), Some("python load.py --date ${DATE}"));
        assert_eq!(step.depends(), ["extract", "transform"]);
        assert_eq!(step.retry_policy().unwrap().exit_codes, vec![1, 75]);
        assert!(step.continue_on().unwrap().failure);
        assert_eq!(step.parallel().unwrap().max_concurrent, Some(2));
        assert_eq!(step.preconditions()[0].expected.as_deref(), Some("1"));
        assert_eq!(step.env().get("DATE"), Some("2025-01-01"));
        assert_eq!(step.timeout_sec(), Some(600));
    }

    #[test]
    fn test_both_command_and_executor_is_ambiguous() {
        let (draft, errors) = parse("name: a\ncommand: echo\nexecutor:\n  type: http\n");
        assert!(draft.step.is_none());
        assert_eq!(errors.kinds(), vec![ErrorKind::AmbiguousStepDefinition]);
    }

    #[test]
    fn test_neither_command_nor_executor_is_ambiguous() {
        let (draft, errors) = parse("name: a\ndepends: b\n");
        assert!(draft.step.is_none());
        assert_eq!(errors.kinds(), vec![ErrorKind::AmbiguousStepDefinition]);
        assert_eq!(draft.name.as_deref(), Some("a"));
        assert_eq!(draft.depends.len(), 1);
    }

    #[test]
    fn test_executor_step() {
        let (draft, errors) = parse("name: notify\nexecutor:\n  type: http\n  url: https://hooks.example.com\n  method: POST\n");
        assert!(errors.is_empty(), "{}", errors.render());
        let step = draft.step.unwrap();
        assert_eq!(step.executor().kind(), ExecutorKind::Http);
        assert_eq!(step.command(), None);
    }

    #[test]
    fn test_errors_are_collected_not_short_circuited() {
        let (draft, errors) = parse(
            "name: 'bad name'\ncommand: echo\nretryPolicy:\n  limit: -1\ntimeoutSec: soon\ncolour: blue\n",
        );
        assert!(draft.step.is_none());
        assert_eq!(
            errors.kinds(),
            vec![
                ErrorKind::InvalidName,
                ErrorKind::InvalidValue,
                ErrorKind::InvalidDuration,
                ErrorKind::UnknownField,
            ]
        );
        assert_eq!(errors.iter().last().unwrap().path().to_string(), "steps[0].colour");
    }

    #[test]
    fn test_missing_name_in_list_form() {
        let (draft, errors) = parse("command: echo hi\n");
        assert!(draft.name.is_none());
        assert_eq!(errors.kinds(), vec![ErrorKind::MissingField]);
    }

    #[test]
    fn test_shorthand_is_named_by_position() {
        let value = Value::String("make test".into());
        let mut errors = ValidationErrors::new();
        let draft = Step::parse(&value, FieldPath::root().key("steps").index(2), NameSource::Listed(3), &mut errors);
        assert!(errors.is_empty());
        let step = draft.step.unwrap();
        assert_eq!(step.name(), "step_3");
        assert_eq!(step.command(), Some("make test"));
    }

    #[test]
    fn test_map_key_must_agree_with_name() {
        let (draft, errors) = parse_as("name: other\ncommand: echo\n", NameSource::Key("build"));
        assert_eq!(draft.name.as_deref(), Some("build"));
        assert_eq!(errors.kinds(), vec![ErrorKind::InvalidValue]);

        let (draft, errors) = parse_as("command: echo\n", NameSource::Key("build"));
        assert!(errors.is_empty());
        assert_eq!(draft.step.unwrap().name(), "build");
    }

    #[test]
    fn test_duplicate_depends_rejected() {
        let (_, errors) = parse("name: a\ncommand: echo\ndepends: [b, c, b]\n");
        assert_eq!(errors.kinds(), vec![ErrorKind::InvalidValue]);
        assert_eq!(errors.iter().next().unwrap().path().to_string(), "steps[0].depends[2]");
    }

    #[test]
    fn test_handler_rejects_depends() {
        let (draft, errors) = parse_as("command: cleanup.sh\ndepends: a\n", NameSource::Handler("exit"));
        assert!(draft.step.is_none());
        assert_eq!(errors.kinds(), vec![ErrorKind::UnknownField]);
        assert!(errors.render().contains("exit handler"));

        let (draft, errors) = parse_as("command: cleanup.sh\n", NameSource::Handler("exit"));
        assert!(errors.is_empty());
        assert_eq!(draft.step.unwrap().name(), "exit");
    }

    #[test]
    fn test_parallel_forms() {
        let (draft, errors) = parse("name: a\ncommand: echo $ITEM\nparallel: ${HOSTS}\n");
        assert!(errors.is_empty(), "{}", errors.render());
        assert_eq!(
            draft.step.unwrap().parallel().unwrap().items,
            ParallelItems::Reference("${HOSTS}".into())
        );

        let (_, errors) = parse("name: a\ncommand: echo\nparallel:\n  items: []\n  maxConcurrent: 0\n");
        assert_eq!(errors.kinds(), vec![ErrorKind::InvalidValue, ErrorKind::InvalidValue]);
    }

    #[test]
    fn test_repeat_needs_interval() {
        let (_, errors) = parse("name: a\ncommand: echo\nrepeatPolicy:\n  repeat: true\n");
        assert_eq!(errors.kinds(), vec![ErrorKind::MissingField]);
    }

    #[test]
    fn test_serializes_shell_fields_inline() {
        let (draft, _) = parse("name: a\nexecutor:\n  type: command\n  command: echo hi\n");
        let value = serde_yaml::to_value(draft.step.unwrap()).unwrap();
        assert_eq!(value["command"], Value::String("echo hi".into()));
        assert!(value.get("executor").is_none());
    }
}
