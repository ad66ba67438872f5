// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Executor variants
//!
//! An executor block is selected by its `type` tag from a closed set. Each
//! variant reads and checks its own fields; fields belonging to other
//! variants are rejected as unknown.

use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::common::Environment;
use super::infra::{self, PullPolicy, SshConfig};
use super::raw::{self, Fields};
use super::FieldPath;
use crate::errors::{ValidationErrors, Violation};

/// The closed set of executor types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorKind {
    Shell,
    Http,
    Ssh,
    Mail,
    Docker,
    Jq,
}

impl ExecutorKind {
    pub const ALL: [ExecutorKind; 6] = [
        Self::Shell,
        Self::Http,
        Self::Ssh,
        Self::Mail,
        Self::Docker,
        Self::Jq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Http => "http",
            Self::Ssh => "ssh",
            Self::Mail => "mail",
            Self::Docker => "docker",
            Self::Jq => "jq",
        }
    }

    /// Look up a `type` tag; `command` is accepted as another name for `shell`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "command" => Some(Self::Shell),
            lower => Self::ALL.into_iter().find(|kind| kind.as_str() == lower),
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a step does its work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExecutorConfig {
    Shell(ShellExecutor),
    Http(HttpExecutor),
    Ssh(SshConfig),
    Mail(MailExecutor),
    Docker(DockerExecutor),
    Jq(JqExecutor),
}

impl ExecutorConfig {
    pub fn kind(&self) -> ExecutorKind {
        match self {
            Self::Shell(_) => ExecutorKind::Shell,
            Self::Http(_) => ExecutorKind::Http,
            Self::Ssh(_) => ExecutorKind::Ssh,
            Self::Mail(_) => ExecutorKind::Mail,
            Self::Docker(_) => ExecutorKind::Docker,
            Self::Jq(_) => ExecutorKind::Jq,
        }
    }

    /// Resolve an `executor` block into exactly one variant
    pub(crate) fn resolve(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        let before = errors.len();
        let mut fields = Fields::open(value, path, errors)?;

        let Some(tag) = fields.get("type") else {
            errors.push(fields.path().clone(), Violation::MissingField { field: "type" });
            return None;
        };
        let tag = raw::expect_str(tag, &fields.child("type"), errors)?;
        let Some(kind) = ExecutorKind::from_tag(tag) else {
            errors.push(
                fields.child("type"),
                Violation::UnknownExecutorType {
                    found: tag.to_string(),
                    valid: ExecutorKind::ALL.iter().map(ExecutorKind::as_str).collect(),
                },
            );
            return None;
        };

        let read = match kind {
            ExecutorKind::Shell => ShellExecutor::read(&mut fields, errors).map(|c| c.map(Self::Shell)),
            ExecutorKind::Http => HttpExecutor::read(&mut fields, errors).map(|c| c.map(Self::Http)),
            ExecutorKind::Ssh => SshConfig::read(&mut fields, errors).map(|c| c.map(Self::Ssh)),
            ExecutorKind::Mail => MailExecutor::read(&mut fields, errors).map(|c| c.map(Self::Mail)),
            ExecutorKind::Docker => DockerExecutor::read(&mut fields, errors).map(|c| c.map(Self::Docker)),
            ExecutorKind::Jq => JqExecutor::read(&mut fields, errors).map(|c| c.map(Self::Jq)),
        };

        let config = match read {
            Ok(config) => config,
            Err(missing) => {
                errors.push(
                    fields.path().clone(),
                    Violation::IncompleteExecutorConfig {
                        executor: kind.as_str(),
                        missing,
                    },
                );
                None
            }
        };
        fields.finish(&format!("{} executor", kind), errors);

        if errors.len() != before {
            return None;
        }
        config
    }
}

/// Runs a command line or script through a shell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShellExecutor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
}

impl ShellExecutor {
    /// Also used for step shorthand, where these fields sit on the step itself
    pub(crate) fn read(
        fields: &mut Fields<'_>,
        errors: &mut ValidationErrors,
    ) -> Result<Option<Self>, Vec<&'static str>> {
        let command = fields.text("command", errors);
        let script = fields.text("script", errors);
        let shell = fields.text("shell", errors);

        if !fields.has("command") && !fields.has("script") {
            return Err(vec!["command or script"]);
        }
        if command.is_none() && script.is_none() {
            return Ok(None);
        }
        Ok(Some(Self {
            command,
            script,
            shell,
        }))
    }
}

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    const NAMES: [(&'static str, HttpMethod); 7] = [
        ("GET", Self::Get),
        ("POST", Self::Post),
        ("PUT", Self::Put),
        ("PATCH", Self::Patch),
        ("DELETE", Self::Delete),
        ("HEAD", Self::Head),
        ("OPTIONS", Self::Options),
    ];

    fn parse(s: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, method)| *method)
    }
}

/// Sends one HTTP request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpExecutor {
    pub url: String,
    pub method: HttpMethod,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub silent: bool,
}

impl HttpExecutor {
    fn read(fields: &mut Fields<'_>, errors: &mut ValidationErrors) -> Result<Option<Self>, Vec<&'static str>> {
        let url = fields.text("url", errors).and_then(|url| {
            if url.starts_with("http://") || url.starts_with("https://") {
                Some(url)
            } else {
                errors.push(
                    fields.child("url"),
                    Violation::invalid_value(format!("url '{}' must start with http:// or https://", url)),
                );
                None
            }
        });
        let method = fields.string("method", errors).and_then(|method| {
            let parsed = HttpMethod::parse(&method);
            if parsed.is_none() {
                errors.push(
                    fields.child("method"),
                    Violation::invalid_value(format!(
                        "unsupported HTTP method '{}' (expected one of {})",
                        method,
                        HttpMethod::NAMES.map(|(name, _)| name).join(", ")
                    )),
                );
            }
            parsed
        });
        let headers = fields.string_map("headers", errors);
        let query = fields.string_map("query", errors);
        let body = fields.string("body", errors);
        let timeout_sec = fields.duration("timeoutSec", errors);
        let silent = fields.flag("silent", errors);

        let missing = missing_of(fields, &["url", "method"]);
        if !missing.is_empty() {
            return Err(missing);
        }

        Ok(match (url, method) {
            (Some(url), Some(method)) => Some(Self {
                url,
                method,
                headers,
                query,
                body,
                timeout_sec,
                silent,
            }),
            _ => None,
        })
    }
}

/// Sends an email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailExecutor {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

/// Addresses must at least look like `local@domain`
pub(crate) fn check_addresses(
    fields: &Fields<'_>,
    key: &'static str,
    addresses: &[String],
    errors: &mut ValidationErrors,
) -> bool {
    let mut ok = true;
    for (i, address) in addresses.iter().enumerate() {
        let valid = matches!(address.split_once('@'), Some((local, domain)) if !local.is_empty() && !domain.is_empty());
        if !valid {
            ok = false;
            let path = if addresses.len() == 1 { fields.child(key) } else { fields.child(key).index(i) };
            errors.push(
                path,
                Violation::invalid_value(format!("'{}' is not an email address", address)),
            );
        }
    }
    ok
}

impl MailExecutor {
    fn read(fields: &mut Fields<'_>, errors: &mut ValidationErrors) -> Result<Option<Self>, Vec<&'static str>> {
        let from = fields.text("from", errors);
        let from_ok = from
            .as_ref()
            .map_or(true, |from| check_addresses(fields, "from", std::slice::from_ref(from), errors));
        let to = fields.string_list("to", errors);
        let to_ok = check_addresses(fields, "to", &to, errors);
        let subject = fields.text("subject", errors);
        let message = fields.string("message", errors);
        let attachments = fields.string_list("attachments", errors);

        let missing = missing_of(fields, &["from", "to", "subject"]);
        if !missing.is_empty() {
            return Err(missing);
        }
        if to.is_empty() && fields.has("to") {
            errors.push(fields.child("to"), Violation::invalid_value("'to' must list at least one address"));
        }

        Ok(match (from, subject) {
            (Some(from), Some(subject)) if from_ok && to_ok && !to.is_empty() => Some(Self {
                from,
                to,
                subject,
                message,
                attachments,
            }),
            _ => None,
        })
    }
}

/// Runs a command in a new container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerExecutor {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull: Option<PullPolicy>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub auto_remove: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Environment::is_empty")]
    pub env: Environment,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

impl DockerExecutor {
    fn read(fields: &mut Fields<'_>, errors: &mut ValidationErrors) -> Result<Option<Self>, Vec<&'static str>> {
        let image = infra::read_image(fields, errors);
        let command = fields.text("command", errors);
        let pull = PullPolicy::read(fields, "pull", errors);
        let auto_remove = fields.flag("autoRemove", errors);
        let platform = fields.text("platform", errors);
        let env = fields.env("env", errors);
        let volumes = infra::read_volumes(fields, errors);
        let working_dir = fields.text("workingDir", errors);

        let missing = missing_of(fields, &["image"]);
        if !missing.is_empty() {
            return Err(missing);
        }

        Ok(image.map(|image| Self {
            image,
            command,
            pull,
            auto_remove,
            platform,
            env,
            volumes,
            working_dir,
        }))
    }
}

/// Runs a jq query over JSON input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JqExecutor {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub raw: bool,
}

impl JqExecutor {
    fn read(fields: &mut Fields<'_>, errors: &mut ValidationErrors) -> Result<Option<Self>, Vec<&'static str>> {
        let query = fields.text("query", errors);
        let input = fields.string("input", errors);
        let raw = fields.flag("raw", errors);

        let missing = missing_of(fields, &["query"]);
        if !missing.is_empty() {
            return Err(missing);
        }

        Ok(query.map(|query| Self { query, input, raw }))
    }
}

fn missing_of(fields: &Fields<'_>, required: &[&'static str]) -> Vec<&'static str> {
    required.iter().copied().filter(|key| !fields.has(key)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn resolve(yaml: &str) -> (Option<ExecutorConfig>, ValidationErrors) {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        let mut errors = ValidationErrors::new();
        let config = ExecutorConfig::resolve(&value, FieldPath::root().key("executor"), &mut errors);
        (config, errors)
    }

    #[test]
    fn test_http_executor() {
        let (config, errors) = resolve(
            "type: http\nurl: https://example.com/api\nmethod: post\nheaders:\n  Accept: application/json\ntimeoutSec: 30s\n",
        );
        assert!(errors.is_empty(), "{}", errors.render());
        match config.unwrap() {
            ExecutorConfig::Http(http) => {
                assert_eq!(http.method, HttpMethod::Post);
                assert_eq!(http.timeout_sec, Some(30));
                assert_eq!(http.headers.get("Accept").map(String::as_str), Some("application/json"));
            }
            other => panic!("Expected http executor, got {:?}", other),
        }
    }

    #[test]
    fn test_http_without_url_names_url() {
        let (config, errors) = resolve("type: http\n");
        assert!(config.is_none());
        assert_eq!(errors.kinds(), vec![ErrorKind::IncompleteExecutorConfig]);
        match errors.iter().next().unwrap().violation() {
            Violation::IncompleteExecutorConfig { executor, missing } => {
                assert_eq!(*executor, "http");
                assert!(missing.contains(&"url"));
                assert!(missing.contains(&"method"));
            }
            other => panic!("unexpected violation {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_lists_valid_types() {
        let (config, errors) = resolve("type: kafka\ntopic: events\n");
        assert!(config.is_none());
        assert_eq!(errors.kinds(), vec![ErrorKind::UnknownExecutorType]);
        let message = errors.iter().next().unwrap().message();
        assert!(message.contains("'kafka'"));
        assert!(message.contains("shell, http, ssh, mail, docker, jq"));
    }

    #[test]
    fn test_missing_type() {
        let (_, errors) = resolve("url: https://example.com\n");
        assert_eq!(errors.kinds(), vec![ErrorKind::MissingField]);
    }

    #[test]
    fn test_fields_of_other_variants_are_rejected() {
        let (config, errors) = resolve("type: docker\nimage: alpine:3.20\nurl: https://example.com\n");
        assert!(config.is_none());
        assert_eq!(errors.kinds(), vec![ErrorKind::UnknownField]);
        assert_eq!(errors.iter().next().unwrap().path().to_string(), "executor.url");
        assert!(errors.iter().next().unwrap().message().contains("docker executor"));
    }

    #[test]
    fn test_ssh_requires_credentials() {
        let (_, errors) = resolve("type: ssh\nuser: deploy\nhost: app01\n");
        assert_eq!(errors.kinds(), vec![ErrorKind::IncompleteExecutorConfig]);
        assert!(errors.render().contains("password or key"));

        let (config, errors) = resolve("type: ssh\nuser: deploy\nhost: app01\nprivateKey: /keys/id\n");
        assert!(errors.is_empty());
        assert!(matches!(config, Some(ExecutorConfig::Ssh(SshConfig { port: 22, .. }))));
    }

    #[test]
    fn test_mail_executor() {
        let (config, errors) = resolve("type: mail\nfrom: bot@example.com\nto: [a@example.com, b@example.com]\nsubject: done\n");
        assert!(errors.is_empty(), "{}", errors.render());
        assert!(matches!(config, Some(ExecutorConfig::Mail(ref m)) if m.to.len() == 2));

        let (_, errors) = resolve("type: mail\nfrom: nobody\nto: ops@example.com\nsubject: x\n");
        assert_eq!(errors.kinds(), vec![ErrorKind::InvalidValue]);
        assert_eq!(errors.iter().next().unwrap().path().to_string(), "executor.from");
    }

    #[test]
    fn test_docker_and_jq() {
        let (config, errors) = resolve("type: docker\nimage: python:3.12\ncommand: python -V\npull: never\nautoRemove: true\n");
        assert!(errors.is_empty(), "{}", errors.render());
        assert_eq!(config.unwrap().kind(), ExecutorKind::Docker);

        let (_, errors) = resolve("type: docker\n");
        assert!(errors.render().contains("docker executor is missing required field(s): image"));

        let (config, errors) = resolve("type: jq\nquery: '.items[] | .id'\nraw: true\n");
        assert!(errors.is_empty());
        assert_eq!(config.unwrap().kind(), ExecutorKind::Jq);
    }

    #[test]
    fn test_command_tag_is_shell() {
        let (config, errors) = resolve("type: command\ncommand: echo hi\nshell: bash\n");
        assert!(errors.is_empty());
        assert_eq!(config.unwrap().kind(), ExecutorKind::Shell);

        let (_, errors) = resolve("type: shell\nshell: bash\n");
        assert_eq!(errors.kinds(), vec![ErrorKind::IncompleteExecutorConfig]);
    }
}
