// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Infrastructure blocks: container, SSH target and logging
//!
//! Each block can be attached to the DAG or to a single step, and is checked
//! on its own. Problems are reported under the block's own path.

use serde::Serialize;
use serde_yaml::Value;

use super::common::{self, Environment};
use super::raw::Fields;
use super::FieldPath;
use crate::errors::{ValidationErrors, Violation};

/// When to pull a container image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PullPolicy {
    Always,
    Missing,
    Never,
}

impl PullPolicy {
    pub(crate) fn read(fields: &mut Fields<'_>, key: &'static str, errors: &mut ValidationErrors) -> Option<Self> {
        let value = fields.string(key, errors)?;
        match value.to_ascii_lowercase().as_str() {
            "always" => Some(Self::Always),
            "missing" => Some(Self::Missing),
            "never" => Some(Self::Never),
            _ => {
                errors.push(
                    fields.child(key),
                    Violation::invalid_value(format!(
                        "unknown pull policy '{}' (expected always, missing or never)",
                        value
                    )),
                );
                None
            }
        }
    }
}

/// Check an image reference such as `alpine:3.20` or `ghcr.io/org/app@sha256:...`
pub fn validate_image(image: &str) -> Result<(), String> {
    if image.trim().is_empty() {
        Err("image reference must not be empty".into())
    } else if image.chars().any(char::is_whitespace) {
        Err(format!("image reference '{}' must not contain whitespace", image))
    } else if image.starts_with(':') || image.starts_with('@') || image.ends_with(':') {
        Err(format!("image reference '{}' is missing a repository name", image))
    } else {
        Ok(())
    }
}

/// Check a volume mount of the form `source:target[:ro|rw]`
pub fn validate_volume(volume: &str) -> Result<(), String> {
    let parts: Vec<&str> = volume.split(':').collect();
    match parts.as_slice() {
        [source, target] | [source, target, "ro" | "rw"] if !source.is_empty() && !target.is_empty() => {
            Ok(())
        }
        _ => Err(format!(
            "volume '{}' must have the form source:target or source:target:ro",
            volume
        )),
    }
}

pub(crate) fn read_image(fields: &mut Fields<'_>, errors: &mut ValidationErrors) -> Option<String> {
    let image = fields.string("image", errors)?;
    match validate_image(&image) {
        Ok(()) => Some(image),
        Err(reason) => {
            errors.push(fields.child("image"), Violation::InvalidValue { reason });
            None
        }
    }
}

pub(crate) fn read_volumes(fields: &mut Fields<'_>, errors: &mut ValidationErrors) -> Vec<String> {
    let volumes = fields.string_list("volumes", errors);
    for (i, volume) in volumes.iter().enumerate() {
        if let Err(reason) = validate_volume(volume) {
            errors.push(fields.child("volumes").index(i), Violation::InvalidValue { reason });
        }
    }
    volumes
}

/// Container the DAG's or step's commands run in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfig {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<PullPolicy>,
    #[serde(skip_serializing_if = "Environment::is_empty")]
    pub env: Environment,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub keep_container: bool,
}

impl ContainerConfig {
    pub(crate) fn parse(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        let before = errors.len();
        let mut fields = Fields::open(value, path, errors)?;

        if !fields.has("image") {
            errors.push(fields.path().clone(), Violation::MissingField { field: "image" });
        }
        let image = read_image(&mut fields, errors);
        let pull_policy = PullPolicy::read(&mut fields, "pullPolicy", errors);
        let env = fields.env("env", errors);
        let volumes = read_volumes(&mut fields, errors);
        let working_dir = fields.text("workingDir", errors);
        let user = fields.text("user", errors);
        let keep_container = fields.flag("keepContainer", errors);
        fields.finish("container block", errors);

        if errors.len() != before {
            return None;
        }
        Some(Self {
            image: image?,
            pull_policy,
            env,
            volumes,
            working_dir,
            user,
            keep_container,
        })
    }
}

fn default_port() -> u16 {
    22
}

fn is_default_port(port: &u16) -> bool {
    *port == default_port()
}

/// Remote host reached over SSH
///
/// Shared by the `ssh` infrastructure block and the ssh executor; the two
/// differ only in how missing fields are reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshConfig {
    pub user: String,
    pub host: String,
    #[serde(skip_serializing_if = "is_default_port")]
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub strict_host_key: bool,
}

impl SshConfig {
    /// Read the SSH fields; `Err` carries the names of missing required fields
    pub(crate) fn read(
        fields: &mut Fields<'_>,
        errors: &mut ValidationErrors,
    ) -> Result<Option<Self>, Vec<&'static str>> {
        let user = fields.text("user", errors);
        let host = fields.text("host", errors);
        let port = read_port(fields, "port", errors);
        let key = fields
            .get_aliased(&["key", "privateKey"], errors)
            .and_then(|(name, value)| {
                let path = fields.child(name);
                let key = super::raw::expect_str(value, &path, errors)?;
                match common::validate_path(key) {
                    Ok(()) => Some(key.to_string()),
                    Err(reason) => {
                        errors.push(path, Violation::InvalidValue { reason });
                        None
                    }
                }
            });
        let password = fields.string("password", errors);
        let strict_host_key = fields.flag("strictHostKey", errors);

        let mut missing = Vec::new();
        if !fields.has("user") {
            missing.push("user");
        }
        if !fields.has("host") {
            missing.push("host");
        }
        if !fields.has("password") && !fields.has("key") && !fields.has("privateKey") {
            missing.push("password or key");
        }
        if !missing.is_empty() {
            return Err(missing);
        }

        Ok(match (user, host, port) {
            (Some(user), Some(host), Some(port)) => Some(Self {
                user,
                host,
                port,
                key,
                password,
                strict_host_key,
            }),
            _ => None,
        })
    }

    pub(crate) fn parse(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        let before = errors.len();
        let mut fields = Fields::open(value, path, errors)?;

        let config = match Self::read(&mut fields, errors) {
            Ok(config) => config,
            Err(missing) => {
                for field in missing {
                    errors.push(fields.path().clone(), Violation::MissingField { field });
                }
                None
            }
        };
        fields.finish("ssh block", errors);

        if errors.len() != before {
            return None;
        }
        config
    }
}

/// Read a TCP port given as a number or numeric string; absent means 22
pub(crate) fn read_port(fields: &mut Fields<'_>, key: &'static str, errors: &mut ValidationErrors) -> Option<u16> {
    let Some(value) = fields.get(key) else {
        return Some(default_port());
    };
    parse_port(value, fields.child(key), errors)
}

pub(crate) fn parse_port(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<u16> {
    let port = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match port.map(u16::try_from) {
        Some(Ok(port)) if port > 0 => Some(port),
        _ => {
            errors.push(
                path,
                Violation::invalid_value(format!(
                    "port must be a number between 1 and 65535, found {}",
                    common::scalar_to_string(value).unwrap_or_else(|| super::raw::type_name(value).into())
                )),
            );
            None
        }
    }
}

/// Where logs are written and how long they are kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,
}

impl LogConfig {
    pub(crate) fn parse(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        let before = errors.len();
        let mut fields = Fields::open(value, path, errors)?;

        let mut log_path = |fields: &mut Fields<'_>, key: &'static str| {
            let value = fields.string(key, errors)?;
            match common::validate_path(&value) {
                Ok(()) => Some(value),
                Err(reason) => {
                    errors.push(fields.child(key), Violation::InvalidValue { reason });
                    None
                }
            }
        };
        let dir = log_path(&mut fields, "dir");
        let stdout = log_path(&mut fields, "stdout");
        let stderr = log_path(&mut fields, "stderr");
        let retention_days = fields.count("retentionDays", errors);
        let path = fields.path().clone();
        fields.finish("log block", errors);

        if errors.len() != before {
            return None;
        }
        if dir.is_none() && stdout.is_none() && stderr.is_none() && retention_days.is_none() {
            errors.push(
                path,
                Violation::invalid_value("log block must set at least one of dir, stdout, stderr, retentionDays"),
            );
            return None;
        }

        Some(Self {
            dir,
            stdout,
            stderr,
            retention_days,
        })
    }
}
