// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Cron expressions and DAG schedules

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_yaml::Value;
use std::fmt;
use std::str::FromStr;

use super::raw::{self, Fields};
use super::FieldPath;
use crate::errors::{ValidationErrors, Violation};

const MONTHS: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAYS: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];
const DESCRIPTORS: &[&str] = &[
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@midnight",
    "@hourly",
];

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    /// Symbolic names; the first maps to `names_from`
    names: &'static [&'static str],
    names_from: u32,
}

const FIELDS: [FieldSpec; 5] = [
    FieldSpec { name: "minute", min: 0, max: 59, names: &[], names_from: 0 },
    FieldSpec { name: "hour", min: 0, max: 23, names: &[], names_from: 0 },
    FieldSpec { name: "day-of-month", min: 1, max: 31, names: &[], names_from: 0 },
    FieldSpec { name: "month", min: 1, max: 12, names: MONTHS, names_from: 1 },
    FieldSpec { name: "day-of-week", min: 0, max: 7, names: WEEKDAYS, names_from: 0 },
];

/// Plain ASCII digits, no sign
fn number(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

impl FieldSpec {
    fn value(&self, token: &str) -> Result<u32, String> {
        if let Some(n) = number(token) {
            if n < self.min || n > self.max {
                return Err(format!(
                    "{} value {} is outside {}-{}",
                    self.name, n, self.min, self.max
                ));
            }
            return Ok(n);
        }

        self.names
            .iter()
            .position(|name| name.eq_ignore_ascii_case(token))
            .map(|i| i as u32 + self.names_from)
            .ok_or_else(|| format!("'{}' is not a valid {} value", token, self.name))
    }

    fn check(&self, field: &str) -> Result<(), String> {
        for item in field.split(',') {
            if item.is_empty() {
                return Err(format!("empty list item in {} field", self.name));
            }

            let (base, step) = match item.split_once('/') {
                Some((base, step)) => (base, Some(step)),
                None => (item, None),
            };

            if let Some(step) = step {
                let step = number(step)
                    .ok_or_else(|| format!("step '{}' in {} field is not a number", step, self.name))?;
                if step == 0 || step > self.max {
                    return Err(format!(
                        "step {} in {} field must be between 1 and {}",
                        step, self.name, self.max
                    ));
                }
            }

            if base == "*" {
                continue;
            }

            match base.split_once('-') {
                Some((start, end)) => {
                    let (start, end) = (self.value(start)?, self.value(end)?);
                    if start > end {
                        return Err(format!(
                            "range {} in {} field runs backwards",
                            base, self.name
                        ));
                    }
                }
                None => {
                    self.value(base)?;
                }
            }
        }
        Ok(())
    }
}

/// A validated five-field cron expression or `@descriptor`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CronExpr {
    expression: String,
}

impl CronExpr {
    pub fn parse(expression: &str) -> Result<Self, Violation> {
        let invalid = |reason: String| Violation::InvalidSchedule {
            expression: expression.to_string(),
            reason,
        };

        let trimmed = expression.trim();
        if trimmed.starts_with('@') {
            let lower = trimmed.to_ascii_lowercase();
            return if DESCRIPTORS.contains(&lower.as_str()) {
                Ok(Self { expression: lower })
            } else {
                Err(invalid(format!(
                    "unknown descriptor (expected one of {})",
                    DESCRIPTORS.join(", ")
                )))
            };
        }

        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() != FIELDS.len() {
            return Err(invalid(format!(
                "expected 5 fields (minute hour day-of-month month day-of-week), found {}",
                parts.len()
            )));
        }

        for (part, field) in parts.iter().zip(FIELDS.iter()) {
            field.check(part).map_err(invalid)?;
        }

        Ok(Self {
            expression: parts.join(" "),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.expression
    }

    pub fn is_descriptor(&self) -> bool {
        self.expression.starts_with('@')
    }

    /// The five fields, or `None` for a descriptor
    pub fn fields(&self) -> Option<Vec<&str>> {
        (!self.is_descriptor()).then(|| self.expression.split(' ').collect())
    }
}

impl FromStr for CronExpr {
    type Err = Violation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl Serialize for CronExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.expression)
    }
}

/// When a DAG starts, and optionally when it is stopped or restarted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    start: Vec<CronExpr>,
    stop: Vec<CronExpr>,
    restart: Vec<CronExpr>,
}

impl Schedule {
    /// Parse a `schedule` value: a cron string, a list of them, or a
    /// `{start, stop, restart}` mapping of either
    pub(crate) fn parse(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        let before = errors.len();

        let schedule = match value {
            Value::Mapping(map) => {
                let mut fields = Fields::from_mapping(map, path.clone());
                let start = Self::parse_list(fields.get("start"), fields.child("start"), errors);
                let stop = Self::parse_list(fields.get("stop"), fields.child("stop"), errors);
                let restart = Self::parse_list(fields.get("restart"), fields.child("restart"), errors);
                fields.finish("schedule", errors);
                Self { start, stop, restart }
            }
            other => Self {
                start: Self::parse_list(Some(other), path.clone(), errors),
                ..Self::default()
            },
        };

        if errors.len() == before && schedule.is_empty() {
            errors.push(
                path,
                Violation::InvalidSchedule {
                    expression: String::new(),
                    reason: "schedule does not contain any cron expression".into(),
                },
            );
        }

        (errors.len() == before).then_some(schedule)
    }

    fn parse_list(value: Option<&Value>, path: FieldPath, errors: &mut ValidationErrors) -> Vec<CronExpr> {
        let Some(value) = value else {
            return Vec::new();
        };

        let items: Vec<(FieldPath, &Value)> = match value {
            Value::Sequence(items) => items.iter().enumerate().map(|(i, v)| (path.index(i), v)).collect(),
            single => vec![(path, single)],
        };

        items
            .into_iter()
            .filter_map(|(path, item)| {
                let expression = raw::expect_str(item, &path, errors)?;
                CronExpr::parse(expression)
                    .map_err(|violation| errors.push(path, violation))
                    .ok()
            })
            .collect()
    }

    pub fn start(&self) -> &[CronExpr] {
        &self.start
    }

    pub fn stop(&self) -> &[CronExpr] {
        &self.stop
    }

    pub fn restart(&self) -> &[CronExpr] {
        &self.restart
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.stop.is_empty() && self.restart.is_empty()
    }
}

impl Serialize for Schedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.stop.is_empty() && self.restart.is_empty() {
            return match self.start.as_slice() {
                [single] => single.serialize(serializer),
                many => many.serialize(serializer),
            };
        }

        let mut map = serializer.serialize_map(None)?;
        for (key, list) in [("start", &self.start), ("stop", &self.stop), ("restart", &self.restart)] {
            if !list.is_empty() {
                map.serialize_entry(key, list)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_accepts_common_expressions() {
        for expr in [
            "*/5 * * * *",
            "0 2 * * *",
            "0 9 * * MON-FRI",
            "15,45 8-18/2 1 JAN,jul 0",
            "0 0 1-31/7 * 7",
            "30 4 * * sun",
            "@daily",
            "@Hourly",
        ] {
            assert!(CronExpr::parse(expr).is_ok(), "rejected {expr}");
        }
    }

    #[test]
    fn test_rejects_bad_expressions() {
        for expr in [
            "*/5 * *",
            "* * * * * 2025",
            "60 * * * *",
            "* 24 * * *",
            "* * 0 * *",
            "* * * 13 *",
            "* * * * 8",
            "*/0 * * * *",
            "10-5 * * * *",
            "1,,2 * * * *",
            "* * * FOO *",
            "+5 +2 * * *",
            "*/+5 * * * *",
            "@sometimes",
            "",
        ] {
            let err = CronExpr::parse(expr).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidSchedule, "accepted {expr}");
        }
    }

    #[test]
    fn test_error_names_expression() {
        let err = CronExpr::parse("*/5 * *").unwrap_err();
        assert!(err.to_string().contains("'*/5 * *'"));
        assert!(err.to_string().contains("found 3"));
    }

    #[test]
    fn test_normalises_whitespace() {
        let expr = CronExpr::parse("  0   2 * *  * ").unwrap();
        assert_eq!(expr.as_str(), "0 2 * * *");
        assert_eq!(expr.fields().unwrap().len(), 5);
    }

    #[test]
    fn test_schedule_forms() {
        let mut errors = ValidationErrors::new();
        let single: Value = serde_yaml::from_str("'0 1 * * *'").unwrap();
        let list: Value = serde_yaml::from_str("['0 1 * * *', '0 13 * * *']").unwrap();
        let map: Value = serde_yaml::from_str("start: '0 8 * * *'\nstop: ['0 18 * * *']").unwrap();

        assert_eq!(Schedule::parse(&single, FieldPath::root(), &mut errors).unwrap().start().len(), 1);
        assert_eq!(Schedule::parse(&list, FieldPath::root(), &mut errors).unwrap().start().len(), 2);
        let with_stop = Schedule::parse(&map, FieldPath::root(), &mut errors).unwrap();
        assert_eq!(with_stop.stop()[0].as_str(), "0 18 * * *");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_schedule_reports_each_bad_entry() {
        let mut errors = ValidationErrors::new();
        let list: Value = serde_yaml::from_str("['bad', '0 1 * * *', '* *']").unwrap();
        assert!(Schedule::parse(&list, FieldPath::root().key("schedule"), &mut errors).is_none());

        let paths: Vec<String> = errors.iter().map(|e| e.path().to_string()).collect();
        assert_eq!(paths, vec!["schedule[0]", "schedule[2]"]);
    }

    #[test]
    fn test_empty_schedule_list_is_rejected() {
        let mut errors = ValidationErrors::new();
        let empty: Value = serde_yaml::from_str("[]").unwrap();
        assert!(Schedule::parse(&empty, FieldPath::root(), &mut errors).is_none());
        assert_eq!(errors.kinds(), vec![ErrorKind::InvalidSchedule]);
    }
}
