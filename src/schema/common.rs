// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Shared value types and primitive validators
//!
//! Names, durations, environment maps, preconditions and parameters are used
//! by the DAG, its steps and its infrastructure blocks alike.

use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::raw::{self, Fields};
use super::FieldPath;
use crate::errors::{ValidationErrors, Violation};

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9]+)\s*([smh]?)\s*$").expect("valid regex"));

/// Check a DAG or step name
pub fn validate_name(name: &str) -> Result<(), Violation> {
    let reason = if name.is_empty() {
        "name must not be empty"
    } else if !NAME_RE.is_match(name) {
        "only ASCII letters, digits, '-' and '_' are allowed"
    } else {
        return Ok(());
    };

    Err(Violation::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// Whether `s` can name an environment or output variable
pub fn is_identifier(s: &str) -> bool {
    IDENT_RE.is_match(s)
}

/// Parse a duration into whole seconds
///
/// Accepts a non-negative integer, or a string such as `30`, `30s`, `5m`, `2h`.
pub fn parse_duration(value: &Value) -> Result<u64, Violation> {
    let invalid = |shown: String, reason: &str| Violation::InvalidDuration {
        value: shown,
        reason: reason.to_string(),
    };

    match value {
        Value::Number(n) => match n.as_u64() {
            Some(secs) => Ok(secs),
            None if n.as_i64().is_some() => Err(invalid(n.to_string(), "must not be negative")),
            None => Err(invalid(n.to_string(), "must be a whole number of seconds")),
        },
        Value::String(s) => {
            let caps = DURATION_RE
                .captures(s)
                .ok_or_else(|| invalid(s.clone(), "expected a number with an optional s, m or h suffix"))?;
            let amount: u64 = caps[1]
                .parse()
                .map_err(|_| invalid(s.clone(), "number is too large"))?;
            let unit = match &caps[2] {
                "m" => 60,
                "h" => 3600,
                _ => 1,
            };
            amount
                .checked_mul(unit)
                .ok_or_else(|| invalid(s.clone(), "number is too large"))
        }
        other => Err(Violation::InvalidDuration {
            value: raw::type_name(other).to_string(),
            reason: "expected an integer or a string".to_string(),
        }),
    }
}

/// Check that a filesystem path is well formed
pub fn validate_path(path: &str) -> Result<(), String> {
    if path.trim().is_empty() {
        Err("path must not be empty".into())
    } else if path.contains('\0') {
        Err("path must not contain NUL characters".into())
    } else if path.contains('\n') || path.contains('\r') {
        Err("path must not contain line breaks".into())
    } else {
        Ok(())
    }
}

/// Render a scalar as text; `None` for nulls and collections
///
/// Numbers and booleans are coerced to their YAML spelling (`8080`, `true`).
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Environment variables, keyed by name
///
/// Documents may give a mapping (`KEY: value`) or a list of single-entry
/// mappings / `KEY=value` strings. Values must be scalars; numbers and
/// booleans are converted to text explicitly, anything else is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Environment(BTreeMap<String, String>);

impl Environment {
    pub(crate) fn parse(value: &Value, path: &FieldPath, errors: &mut ValidationErrors) -> Self {
        let mut env = BTreeMap::new();

        let mut add = |key: &Value, val: &Value, key_path: &FieldPath, errors: &mut ValidationErrors| {
            let Some(key) = raw::expect_str(key, key_path, errors) else {
                return;
            };
            let entry_path = key_path.key(key);
            if !is_identifier(key) {
                errors.push(
                    entry_path,
                    Violation::invalid_value(format!("'{}' is not a valid variable name", key)),
                );
                return;
            }
            let Some(val) = scalar_to_string(val) else {
                errors.push(entry_path, raw::wrong_type("string, number or boolean", val));
                return;
            };
            if env.insert(key.to_string(), val).is_some() {
                errors.push(
                    entry_path,
                    Violation::invalid_value(format!("environment variable '{}' is set twice", key)),
                );
            }
        };

        match value {
            Value::Mapping(map) => {
                for (k, v) in map {
                    add(k, v, path, errors);
                }
            }
            Value::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = path.index(i);
                    match item {
                        Value::Mapping(map) => {
                            for (k, v) in map {
                                add(k, v, &item_path, errors);
                            }
                        }
                        Value::String(s) => match s.split_once('=') {
                            Some((k, v)) => {
                                add(&Value::from(k), &Value::from(v), &item_path, errors)
                            }
                            None => errors.push(
                                item_path,
                                Violation::invalid_value(format!("expected KEY=value, found '{}'", s)),
                            ),
                        },
                        other => errors.push(item_path, raw::wrong_type("mapping or KEY=value string", other)),
                    }
                }
            }
            other => errors.push(path.clone(), raw::wrong_type("mapping or sequence", other)),
        }

        Self(env)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A condition gating a DAG or step; checked for shape only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Precondition {
    pub condition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

impl Precondition {
    fn parse(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        if let Value::String(condition) = value {
            if condition.trim().is_empty() {
                errors.push(path, Violation::invalid_value("precondition must not be empty"));
                return None;
            }
            return Some(Self {
                condition: condition.clone(),
                expected: None,
            });
        }

        let mut fields = match value {
            Value::Mapping(map) => Fields::from_mapping(map, path),
            other => {
                errors.push(path, raw::wrong_type("string or mapping", other));
                return None;
            }
        };
        let condition = fields.text("condition", errors);
        if condition.is_none() && !fields.has("condition") {
            errors.push(fields.path().clone(), Violation::MissingField { field: "condition" });
        }
        let expected = fields.string("expected", errors);
        fields.finish("precondition", errors);

        Some(Self {
            condition: condition?,
            expected,
        })
    }

    /// A single precondition or a list of them
    pub(crate) fn parse_list(
        value: &Value,
        path: FieldPath,
        errors: &mut ValidationErrors,
    ) -> Option<Vec<Self>> {
        let before = errors.len();
        let list: Vec<Self> = match value {
            Value::Sequence(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| Self::parse(item, path.index(i), errors))
                .collect(),
            single => Self::parse(single, path, errors).into_iter().collect(),
        };
        (errors.len() == before).then_some(list)
    }
}

/// One DAG parameter, positional or named
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    pub value: String,
}

impl Serialize for Param {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.name {
            None => serializer.serialize_str(&self.value),
            Some(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(name, &self.value)?;
                map.end()
            }
        }
    }
}

impl Param {
    /// Parse `params`
    ///
    /// A string is split on whitespace (double quotes group words) and each
    /// `KEY=value` token becomes a named parameter. In list form, strings are
    /// positional and single-entry mappings are named.
    pub(crate) fn parse_all(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Vec<Self> {
        match value {
            Value::String(s) => split_params(s)
                .into_iter()
                .map(|token| match token.split_once('=') {
                    Some((name, value)) if is_identifier(name) => Self {
                        name: Some(name.to_string()),
                        value: value.to_string(),
                    },
                    _ => Self { name: None, value: token },
                })
                .collect(),
            Value::Sequence(items) => {
                let mut params = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    let item_path = path.index(i);
                    match item {
                        Value::Mapping(map) if map.len() == 1 => {
                            for (k, v) in map {
                                let Some(name) = raw::expect_str(k, &item_path, errors) else {
                                    continue;
                                };
                                match scalar_to_string(v) {
                                    Some(value) => params.push(Self {
                                        name: Some(name.to_string()),
                                        value,
                                    }),
                                    None => errors.push(
                                        item_path.key(name),
                                        raw::wrong_type("string, number or boolean", v),
                                    ),
                                }
                            }
                        }
                        Value::Mapping(_) => errors.push(
                            item_path,
                            Violation::invalid_value("a named parameter must have exactly one key"),
                        ),
                        scalar => match scalar_to_string(scalar) {
                            Some(value) => params.push(Self { name: None, value }),
                            None => errors.push(item_path, raw::wrong_type("scalar or mapping", scalar)),
                        },
                    }
                }
                params
            }
            other => {
                errors.push(path, raw::wrong_type("string or sequence", other));
                Vec::new()
            }
        }
    }
}

fn split_params(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in s.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("extract_data-2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("has space").is_err());
        assert!(validate_name("dots.not.ok").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration(&yaml("90")).unwrap(), 90);
        assert_eq!(parse_duration(&yaml("'45s'")).unwrap(), 45);
        assert_eq!(parse_duration(&yaml("5m")).unwrap(), 300);
        assert_eq!(parse_duration(&yaml("2h")).unwrap(), 7200);
        assert_eq!(parse_duration(&yaml("'30'")).unwrap(), 30);

        for bad in ["-1", "1.5", "-5s", "5d", "soon", "[1]"] {
            let err = parse_duration(&yaml(bad)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidDuration, "input {bad}");
        }

        match parse_duration(&yaml("'٣s'")).unwrap_err() {
            Violation::InvalidDuration { reason, .. } => {
                assert_eq!(reason, "expected a number with an optional s, m or h suffix")
            }
            other => panic!("unexpected violation: {:?}", other),
        }
    }

    #[test]
    fn test_env_forms_agree() {
        let mut errors = ValidationErrors::new();
        let a = Environment::parse(&yaml("A: x\nPORT: 8080\n"), &FieldPath::root(), &mut errors);
        let b = Environment::parse(&yaml("- A: x\n- PORT=8080\n"), &FieldPath::root(), &mut errors);
        assert!(errors.is_empty());
        assert_eq!(a, b);
        assert_eq!(a.get("PORT"), Some("8080"));
    }

    #[test]
    fn test_env_rejects_duplicates_and_nested_values() {
        let mut errors = ValidationErrors::new();
        Environment::parse(&yaml("- A: x\n- A: y\n- B: [1]\n"), &FieldPath::root().key("env"), &mut errors);
        assert_eq!(errors.kinds(), vec![ErrorKind::InvalidValue, ErrorKind::InvalidType]);
        assert_eq!(errors.iter().next().unwrap().path().to_string(), "env[1].A");
    }

    #[test]
    fn test_precondition_forms() {
        let mut errors = ValidationErrors::new();
        let list = Precondition::parse_list(
            &yaml("- test -f /tmp/ready\n- condition: \"`date +%u`\"\n  expected: \"1\"\n"),
            FieldPath::root(),
            &mut errors,
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].expected.as_deref(), Some("1"));

        let missing = Precondition::parse_list(&yaml("expected: x"), FieldPath::root(), &mut errors);
        assert!(missing.is_none());
        assert_eq!(errors.kinds(), vec![ErrorKind::MissingField]);
    }

    #[test]
    fn test_params_string_form() {
        let mut errors = ValidationErrors::new();
        let params = Param::parse_all(&yaml(r#"'first DATE=today MSG="hello world"'"#), FieldPath::root(), &mut errors);
        assert!(errors.is_empty());
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].name, None);
        assert_eq!(params[2].name.as_deref(), Some("MSG"));
        assert_eq!(params[2].value, "hello world");
    }
}
