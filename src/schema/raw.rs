// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Typed access to raw document mappings
//!
//! [`Fields`] wraps one mapping of the parsed document. Every getter records
//! the key as consumed and reports type problems into the shared
//! [`ValidationErrors`] instead of returning early, and [`Fields::finish`]
//! reports whatever keys nobody asked for. A `null` value counts as absent.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

use super::common::{self, Environment};
use super::FieldPath;
use crate::errors::{ValidationErrors, Violation};

/// Name of a value's YAML type, for error messages
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

pub(crate) fn wrong_type(expected: &'static str, value: &Value) -> Violation {
    Violation::InvalidType {
        expected,
        found: type_name(value),
    }
}

pub(crate) fn expect_str<'a>(
    value: &'a Value,
    path: &FieldPath,
    errors: &mut ValidationErrors,
) -> Option<&'a str> {
    match value {
        Value::String(s) => Some(s),
        other => {
            errors.push(path.clone(), wrong_type("string", other));
            None
        }
    }
}

/// A string or a sequence of strings
pub(crate) fn expect_str_list(
    value: &Value,
    path: &FieldPath,
    errors: &mut ValidationErrors,
) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Sequence(items) => {
            let before = errors.len();
            let list: Vec<String> = items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| expect_str(item, &path.index(i), errors).map(String::from))
                .collect();
            (errors.len() == before).then_some(list)
        }
        other => {
            errors.push(path.clone(), wrong_type("string or sequence of strings", other));
            None
        }
    }
}

pub(crate) fn expect_int(value: &Value, path: &FieldPath, errors: &mut ValidationErrors) -> Option<i64> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => match n.as_i64() {
            Some(i) => Some(i),
            None => {
                errors.push(path.clone(), Violation::invalid_value(format!("{} is too large", n)));
                None
            }
        },
        other => {
            errors.push(path.clone(), wrong_type("integer", other));
            None
        }
    }
}

/// Consuming view over one mapping of the document
pub(crate) struct Fields<'a> {
    map: &'a Mapping,
    path: FieldPath,
    taken: Vec<&'static str>,
}

impl<'a> Fields<'a> {
    /// Open `value` as a mapping, reporting an error if it is anything else
    pub fn open(value: &'a Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        match value {
            Value::Mapping(map) => Some(Self::from_mapping(map, path)),
            other => {
                errors.push(path, wrong_type("mapping", other));
                None
            }
        }
    }

    pub fn from_mapping(map: &'a Mapping, path: FieldPath) -> Self {
        Self {
            map,
            path,
            taken: Vec::new(),
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn child(&self, key: &str) -> FieldPath {
        self.path.key(key)
    }

    /// Whether `key` is present with a non-null value (does not consume it)
    pub fn has(&self, key: &str) -> bool {
        matches!(self.map.get(key), Some(v) if !v.is_null())
    }

    /// Mark keys as handled without reading them
    pub fn skip(&mut self, keys: &[&'static str]) {
        self.taken.extend_from_slice(keys);
    }

    pub fn get(&mut self, key: &'static str) -> Option<&'a Value> {
        self.taken.push(key);
        self.map.get(key).filter(|v| !v.is_null())
    }

    /// Read a field that may be spelled several ways; the first name is canonical
    pub fn get_aliased(
        &mut self,
        keys: &[&'static str],
        errors: &mut ValidationErrors,
    ) -> Option<(&'static str, &'a Value)> {
        let mut found: Option<(&'static str, &'a Value)> = None;
        for &key in keys {
            if let Some(value) = self.get(key) {
                match found {
                    Some((first, _)) => errors.push(
                        self.child(key),
                        Violation::invalid_value(format!(
                            "'{}' and '{}' are the same field; set only one",
                            first, key
                        )),
                    ),
                    None => found = Some((key, value)),
                }
            }
        }
        found
    }

    pub fn string(&mut self, key: &'static str, errors: &mut ValidationErrors) -> Option<String> {
        let value = self.get(key)?;
        expect_str(value, &self.child(key), errors).map(String::from)
    }

    /// A string that must not be blank
    pub fn text(&mut self, key: &'static str, errors: &mut ValidationErrors) -> Option<String> {
        let value = self.string(key, errors)?;
        if value.trim().is_empty() {
            errors.push(
                self.child(key),
                Violation::invalid_value(format!("'{}' must not be empty", key)),
            );
            return None;
        }
        Some(value)
    }

    pub fn bool(&mut self, key: &'static str, errors: &mut ValidationErrors) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            other => {
                errors.push(self.child(key), wrong_type("boolean", other));
                None
            }
        }
    }

    /// A boolean that defaults to `false` when absent or invalid
    pub fn flag(&mut self, key: &'static str, errors: &mut ValidationErrors) -> bool {
        self.bool(key, errors).unwrap_or(false)
    }

    /// A non-negative integer that fits in `u32`
    pub fn count(&mut self, key: &'static str, errors: &mut ValidationErrors) -> Option<u32> {
        let value = self.get(key)?;
        let path = self.child(key);
        let n = expect_int(value, &path, errors)?;
        match u32::try_from(n) {
            Ok(n) => Some(n),
            Err(_) if n < 0 => {
                errors.push(path, Violation::invalid_value(format!("'{}' must not be negative", key)));
                None
            }
            Err(_) => {
                errors.push(path, Violation::invalid_value(format!("'{}' is too large", key)));
                None
            }
        }
    }

    /// A count that must be at least 1
    pub fn positive(&mut self, key: &'static str, errors: &mut ValidationErrors) -> Option<u32> {
        let n = self.count(key, errors)?;
        if n == 0 {
            errors.push(
                self.child(key),
                Violation::invalid_value(format!("'{}' must be at least 1", key)),
            );
            return None;
        }
        Some(n)
    }

    pub fn duration(&mut self, key: &'static str, errors: &mut ValidationErrors) -> Option<u64> {
        let value = self.get(key)?;
        match common::parse_duration(value) {
            Ok(seconds) => Some(seconds),
            Err(violation) => {
                errors.push(self.child(key), violation);
                None
            }
        }
    }

    /// A string or list of strings; absent means empty
    pub fn string_list(&mut self, key: &'static str, errors: &mut ValidationErrors) -> Vec<String> {
        match self.get(key) {
            Some(value) => expect_str_list(value, &self.child(key), errors).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// An integer or list of integers that fit in `i32`; absent means empty
    pub fn int_list(&mut self, key: &'static str, errors: &mut ValidationErrors) -> Vec<i32> {
        let Some(value) = self.get(key) else {
            return Vec::new();
        };
        let path = self.child(key);
        let items: Vec<(FieldPath, &Value)> = match value {
            Value::Sequence(items) => items.iter().enumerate().map(|(i, v)| (path.index(i), v)).collect(),
            single => vec![(path.clone(), single)],
        };

        items
            .into_iter()
            .filter_map(|(path, item)| {
                let n = expect_int(item, &path, errors)?;
                match i32::try_from(n) {
                    Ok(n) => Some(n),
                    Err(_) => {
                        errors.push(path, Violation::invalid_value(format!("{} is out of range", n)));
                        None
                    }
                }
            })
            .collect()
    }

    /// A mapping of string keys to string values, such as HTTP headers
    pub fn string_map(
        &mut self,
        key: &'static str,
        errors: &mut ValidationErrors,
    ) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let Some(value) = self.get(key) else {
            return out;
        };
        let path = self.child(key);
        let Value::Mapping(map) = value else {
            errors.push(path, wrong_type("mapping", value));
            return out;
        };

        for (k, v) in map {
            let Some(k) = expect_str(k, &path, errors) else {
                continue;
            };
            if let Some(v) = expect_str(v, &path.key(k), errors) {
                out.insert(k.to_string(), v.to_string());
            }
        }
        out
    }

    pub fn env(&mut self, key: &'static str, errors: &mut ValidationErrors) -> Environment {
        match self.get(key) {
            Some(value) => Environment::parse(value, &self.child(key), errors),
            None => Environment::default(),
        }
    }

    /// Parse a nested block if present
    pub fn block<T>(
        &mut self,
        key: &'static str,
        errors: &mut ValidationErrors,
        parse: impl FnOnce(&'a Value, FieldPath, &mut ValidationErrors) -> Option<T>,
    ) -> Option<T> {
        let value = self.get(key)?;
        parse(value, self.child(key), errors)
    }

    /// Report every key that was never read
    pub fn finish(self, context: &str, errors: &mut ValidationErrors) {
        for key in self.map.keys() {
            match key {
                Value::String(k) if self.taken.contains(&k.as_str()) => {}
                Value::String(k) => errors.push(
                    self.path.key(k.as_str()),
                    Violation::UnknownField {
                        field: k.clone(),
                        context: context.to_string(),
                    },
                ),
                other => errors.push(self.path.clone(), wrong_type("string key", other)),
            }
        }
    }
}
