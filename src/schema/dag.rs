// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! The DAG document
//!
//! [`Dag::from_value`] is the single entry point that turns a parsed
//! document into a validated DAG. Steps are parsed first, then the whole-graph
//! rules run over every step that produced a name, then schedule,
//! notification and infrastructure blocks are checked. Nothing stops early:
//! a rejected document reports everything that is wrong with it.

use serde::Serialize;
use serde_yaml::Value;

use super::common::{self, Environment, Param, Precondition};
use super::cron::Schedule;
use super::document::{self, DocumentFormat};
use super::graph::{self, DependencyGraph};
use super::infra::{ContainerConfig, LogConfig, SshConfig};
use super::notify::{HandlerOn, MailConfig, MailOn, Notifications, Slot, SmtpConfig};
use super::raw::{self, Fields};
use super::step::{NameSource, Step, StepDraft};
use super::FieldPath;
use crate::errors::{DagcheckResult, ValidationErrors, Violation};

/// A validated workflow definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dag {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<Schedule>,
    #[serde(skip_serializing_if = "Environment::is_empty")]
    env: Environment,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    params: Vec<Param>,
    steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    handler_on: Option<HandlerOn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mail_on: Option<MailOn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    smtp: Option<SmtpConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_mail: Option<MailConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    info_mail: Option<MailConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    container: Option<ContainerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssh: Option<SshConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log: Option<LogConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    preconditions: Vec<Precondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_sec: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delay_sec: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    restart_wait_sec: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_clean_up_time_sec: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_active_runs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_active_steps: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    skip_if_successful: bool,
}

impl Dag {
    /// Validate a parsed document
    pub fn from_value(value: &Value) -> Result<Self, ValidationErrors> {
        Self::parse(value, None)
    }

    /// Validate a parsed document, using `fallback_name` if it has no `name`
    ///
    /// This is how a DAG file is usually named after itself.
    pub fn from_named_value(value: &Value, fallback_name: &str) -> Result<Self, ValidationErrors> {
        Self::parse(value, Some(fallback_name))
    }

    pub fn from_yaml(text: &str) -> DagcheckResult<Self> {
        Self::from_text(text, DocumentFormat::Yaml)
    }

    pub fn from_json(text: &str) -> DagcheckResult<Self> {
        Self::from_text(text, DocumentFormat::Json)
    }

    pub fn from_toml(text: &str) -> DagcheckResult<Self> {
        Self::from_text(text, DocumentFormat::Toml)
    }

    fn from_text(text: &str, format: DocumentFormat) -> DagcheckResult<Self> {
        let value = document::parse_document(text, format)?;
        Ok(Self::from_value(&value)?)
    }

    fn parse(value: &Value, fallback_name: Option<&str>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let root = FieldPath::root();
        let Some(mut fields) = Fields::open(value, root, &mut errors) else {
            return Err(errors);
        };

        let name = Self::read_name(&mut fields, fallback_name, &mut errors);
        let description = fields.string("description", &mut errors);
        let group = fields.text("group", &mut errors);
        let tags = Self::read_tags(&mut fields, &mut errors);

        let drafts = Self::read_steps(&mut fields, &mut errors);
        graph::check(&fields.child("steps"), &drafts, &mut errors);

        let schedule = fields.block("schedule", &mut errors, Schedule::parse);
        let env = fields.env("env", &mut errors);
        let params = fields
            .block("params", &mut errors, |value, path, errors| Some(Param::parse_all(value, path, errors)))
            .unwrap_or_default();
        let handler_on = fields.block("handlerOn", &mut errors, HandlerOn::parse);

        let mail_on = fields.block("mailOn", &mut errors, MailOn::parse);
        let (has_smtp, has_error_mail, has_info_mail) =
            (fields.has("smtp"), fields.has("errorMail"), fields.has("infoMail"));
        let smtp = fields.block("smtp", &mut errors, SmtpConfig::parse);
        let error_mail = fields.block("errorMail", &mut errors, MailConfig::parse);
        let info_mail = fields.block("infoMail", &mut errors, MailConfig::parse);
        let step_triggers: Vec<FieldPath> = drafts
            .iter()
            .filter(|d| d.step.as_ref().is_some_and(Step::mail_on_error))
            .map(|d| d.path.clone())
            .collect();
        Notifications {
            mail_on: mail_on.as_ref(),
            smtp: Slot::new(has_smtp, smtp.as_ref()),
            error_mail: Slot::new(has_error_mail, error_mail.as_ref()),
            info_mail: Slot::new(has_info_mail, info_mail.as_ref()),
        }
        .check(&step_triggers, &mut errors);

        let container = fields.block("container", &mut errors, ContainerConfig::parse);
        let ssh = fields.block("ssh", &mut errors, SshConfig::parse);
        let log = fields.block("log", &mut errors, LogConfig::parse);
        let preconditions = match fields.get_aliased(&["preconditions", "precondition"], &mut errors) {
            Some((key, value)) => Precondition::parse_list(value, fields.child(key), &mut errors).unwrap_or_default(),
            None => Vec::new(),
        };

        let timeout_sec = fields.duration("timeoutSec", &mut errors);
        let delay_sec = fields.duration("delaySec", &mut errors);
        let restart_wait_sec = fields.duration("restartWaitSec", &mut errors);
        let max_clean_up_time_sec = fields.duration("maxCleanUpTimeSec", &mut errors);
        let max_active_runs = fields.positive("maxActiveRuns", &mut errors);
        let max_active_steps = fields.positive("maxActiveSteps", &mut errors);
        let skip_if_successful = fields.flag("skipIfSuccessful", &mut errors);
        fields.finish("DAG", &mut errors);

        let (Some(name), true) = (name, errors.is_empty()) else {
            tracing::debug!(errors = errors.len(), "document rejected");
            return Err(errors);
        };
        let steps: Vec<Step> = drafts.into_iter().filter_map(|d| d.step).collect();
        tracing::debug!(dag = %name, steps = steps.len(), "document accepted");

        Ok(Self {
            name,
            description,
            group,
            tags,
            schedule,
            env,
            params,
            steps,
            handler_on,
            mail_on,
            smtp,
            error_mail,
            info_mail,
            container,
            ssh,
            log,
            preconditions,
            timeout_sec,
            delay_sec,
            restart_wait_sec,
            max_clean_up_time_sec,
            max_active_runs,
            max_active_steps,
            skip_if_successful,
        })
    }

    fn read_name(fields: &mut Fields<'_>, fallback: Option<&str>, errors: &mut ValidationErrors) -> Option<String> {
        let name = match fields.string("name", errors) {
            Some(name) => name,
            None if fields.has("name") => return None,
            None => match fallback {
                Some(fallback) => fallback.to_string(),
                None => {
                    errors.push(fields.path().clone(), Violation::MissingField { field: "name" });
                    return None;
                }
            },
        };

        match common::validate_name(&name) {
            Ok(()) => Some(name),
            Err(violation) => {
                errors.push(fields.child("name"), violation);
                None
            }
        }
    }

    /// `tags` is a list, or one comma-separated string
    fn read_tags(fields: &mut Fields<'_>, errors: &mut ValidationErrors) -> Vec<String> {
        let Some(value) = fields.get("tags") else {
            return Vec::new();
        };
        let path = fields.child("tags");
        match value {
            Value::String(tags) => tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            other => raw::expect_str_list(other, &path, errors).unwrap_or_default(),
        }
    }

    fn read_steps(fields: &mut Fields<'_>, errors: &mut ValidationErrors) -> Vec<StepDraft> {
        let path = fields.child("steps");
        let Some(value) = fields.get("steps") else {
            errors.push(fields.path().clone(), Violation::MissingField { field: "steps" });
            return Vec::new();
        };

        let empty = match value {
            Value::Sequence(items) => items.is_empty(),
            Value::Mapping(map) => map.is_empty(),
            _ => false,
        };
        if empty {
            errors.push(path, Violation::invalid_value("a DAG needs at least one step"));
            return Vec::new();
        }

        match value {
            Value::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| Step::parse(item, path.index(i), NameSource::Listed(i + 1), errors))
                .collect(),
            Value::Mapping(map) => map
                .iter()
                .filter_map(|(key, body)| {
                    let key = raw::expect_str(key, &path, errors)?;
                    Some(Step::parse(body, path.key(key), NameSource::Key(key), errors))
                })
                .collect(),
            other => {
                errors.push(path, raw::wrong_type("sequence or mapping of steps", other));
                Vec::new()
            }
        }
    }

    /// Serialise back into document form; unset fields are left out
    pub fn to_value(&self) -> DagcheckResult<Value> {
        Ok(serde_yaml::to_value(self)?)
    }

    pub fn to_yaml(&self) -> DagcheckResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn graph(&self) -> DependencyGraph {
        DependencyGraph::new(&self.steps)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Steps in declaration order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name() == name)
    }

    pub fn handler_on(&self) -> Option<&HandlerOn> {
        self.handler_on.as_ref()
    }

    pub fn mail_on(&self) -> Option<&MailOn> {
        self.mail_on.as_ref()
    }

    pub fn smtp(&self) -> Option<&SmtpConfig> {
        self.smtp.as_ref()
    }

    pub fn error_mail(&self) -> Option<&MailConfig> {
        self.error_mail.as_ref()
    }

    pub fn info_mail(&self) -> Option<&MailConfig> {
        self.info_mail.as_ref()
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

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    pub fn timeout_sec(&self) -> Option<u64> {
        self.timeout_sec
    }

    pub fn delay_sec(&self) -> Option<u64> {
        self.delay_sec
    }

    pub fn restart_wait_sec(&self) -> Option<u64> {
        self.restart_wait_sec
    }

    pub fn max_clean_up_time_sec(&self) -> Option<u64> {
        self.max_clean_up_time_sec
    }

    pub fn max_active_runs(&self) -> Option<u32> {
        self.max_active_runs
    }

    pub fn max_active_steps(&self) -> Option<u32> {
        self.max_active_steps
    }

    pub fn skip_if_successful(&self) -> bool {
        self.skip_if_successful
    }
}
