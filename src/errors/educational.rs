// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Educational error messages
//!
//! Longer explanations for each kind of violation, with a corrected example,
//! shown by `dagcheck explain <KIND>`.

use super::ErrorKind;

/// Educational message with explanation and examples
#[derive(Debug, Clone)]
pub struct EducationalMessage {
    /// Short summary of the issue
    pub summary: String,
    /// Detailed explanation
    pub explanation: String,
    /// Example of correct usage
    pub example: Option<String>,
    /// Link to documentation
    pub docs_url: Option<String>,
}

impl EducationalMessage {
    /// Explanation for one kind of violation
    pub fn for_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidSchedule => Self::invalid_schedule(),
            ErrorKind::InvalidDuration => Self::simple(
                "Duration could not be read",
                "Durations are whole seconds, given either as a number or as a string with \
                 an 's', 'm' or 'h' suffix. Negative and fractional values are rejected.",
                "timeoutSec: 600\nretryPolicy:\n  limit: 3\n  intervalSec: 30s",
            ),
            ErrorKind::InvalidName => Self::simple(
                "Name contains characters that are not allowed",
                "DAG and step names are used as identifiers by the scheduler and in\n\
                 'depends' lists, so they are restricted to ASCII letters, digits,\n\
                 '-' and '_'. Spaces and dots are not allowed.",
                "steps:\n  - name: extract-data\n    command: ./extract.sh",
            ),
            ErrorKind::UnknownExecutorType => Self::simple(
                "Executor type is not recognised",
                "The 'type' field of an executor block selects one of a fixed set of\n\
                 executors: shell, http, ssh, mail, docker, jq.",
                "executor:\n  type: http\n  method: GET\n  url: https://example.com/health",
            ),
            ErrorKind::IncompleteExecutorConfig => Self::simple(
                "Executor block is missing required fields",
                "Each executor type has its own required fields. http needs 'url' and\n\
                 'method'; ssh needs 'user', 'host' and either 'password' or 'key';\n\
                 docker needs 'image'; mail needs 'from', 'to' and 'subject'; jq needs\n\
                 'query'.",
                "executor:\n  type: ssh\n  user: deploy\n  host: app01\n  key: ~/.ssh/id_ed25519",
            ),
            ErrorKind::AmbiguousStepDefinition => Self::simple(
                "Step does not say how it runs",
                "A step runs either a shell command (via 'command' and/or 'script') or an\n\
                 'executor' block. Setting both, or neither, leaves the step ambiguous.",
                "steps:\n  - name: greet\n    command: echo hello\n  - name: ping\n    executor:\n      type: http\n      method: GET\n      url: https://example.com",
            ),
            ErrorKind::DuplicateStepName => Self::simple(
                "Two or more steps share a name",
                "Steps are referenced by name from 'depends', so every name in a DAG must\n\
                 be unique. All duplicated names are reported together.",
                "steps:\n  - name: build\n    command: make\n  - name: build-docs\n    command: make docs",
            ),
            ErrorKind::UnknownDependency => Self::simple(
                "A step depends on a step that does not exist",
                "Every entry in 'depends' must be the name of another step in the same\n\
                 DAG. Steps may depend on steps declared later in the file.",
                "steps:\n  - name: report\n    command: ./report.sh\n    depends: [load]\n  - name: load\n    command: ./load.sh",
            ),
            ErrorKind::CyclicDependency => Self::simple(
                "Step dependencies form a cycle",
                "A DAG must be acyclic: following 'depends' from any step must never lead\n\
                 back to that step. The reported cycle starts at its alphabetically\n\
                 smallest step.",
                "steps:\n  - name: a\n    command: ./a.sh\n  - name: b\n    command: ./b.sh\n    depends: [a]",
            ),
            ErrorKind::IncompleteNotificationConfig => Self::simple(
                "Mail notifications are enabled but not configured",
                "Turning on 'mailOn.failure', 'mailOn.success' or a step's 'mailOnError'\n\
                 requires an 'smtp' block with host, port, username and password, plus\n\
                 the matching 'errorMail' or 'infoMail' block with 'from' and 'to'.",
                "mailOn:\n  failure: true\nsmtp:\n  host: smtp.example.com\n  port: 587\n  username: bot\n  password: secret\nerrorMail:\n  from: bot@example.com\n  to: ops@example.com",
            ),
            ErrorKind::InvalidType => Self::simple(
                "Field has the wrong type",
                "The field holds a value of a different shape than expected, for example\n\
                 a list where a string is required.",
                "tags: [etl, nightly]",
            ),
            ErrorKind::MissingField => Self::simple(
                "Required field is missing",
                "The block is missing a field it cannot do without.",
                "name: nightly-etl\nsteps:\n  - name: run\n    command: ./run.sh",
            ),
            ErrorKind::UnknownField => Self::simple(
                "Field is not recognised",
                "Unknown fields are rejected rather than ignored so that typos such as\n\
                 'depend' or 'comand' are caught before the DAG is deployed. Executor\n\
                 blocks only accept the fields of their own type.",
                "steps:\n  - name: run\n    command: ./run.sh\n    depends: [setup]",
            ),
            ErrorKind::InvalidValue => Self::simple(
                "Field value is not allowed",
                "The field has the right type but its value breaks a rule, for example\n\
                 an empty command, a zero 'maxConcurrent' or a port outside 1-65535.",
                "parallel:\n  items: [a, b, c]\n  maxConcurrent: 2",
            ),
        }
    }

    fn invalid_schedule() -> Self {
        Self {
            summary: "Schedule is not a valid cron expression".into(),
            explanation: "Schedules use five space-separated cron fields:\n\n\
                 minute (0-59)  hour (0-23)  day-of-month (1-31)  month (1-12 or JAN-DEC)\n\
                 day-of-week (0-7 or SUN-SAT)\n\n\
                 Each field accepts '*', single values, ranges (1-5), lists (1,15,30)\n\
                 and steps (*/5, 0-30/10). The descriptors @hourly, @daily, @weekly,\n\
                 @monthly and @yearly are also accepted."
                .into(),
            example: Some(
                "# Every five minutes:\n\
                 schedule: \"*/5 * * * *\"\n\n\
                 # Weekdays at 09:00 and 17:00:\n\
                 schedule:\n  - \"0 9 * * MON-FRI\"\n  - \"0 17 * * MON-FRI\""
                    .into(),
            ),
            docs_url: Some("https://crontab.guru/".into()),
        }
    }

    fn simple(summary: &str, explanation: &str, example: &str) -> Self {
        Self {
            summary: summary.into(),
            explanation: explanation.into(),
            example: Some(example.into()),
            docs_url: None,
        }
    }

    /// Format for display
    pub fn format(&self) -> String {
        let mut output = format!("{}\n\n{}", self.summary, self.explanation);

        if let Some(example) = &self.example {
            output.push_str("\n\nExample:\n");
            for line in example.lines() {
                output.push_str("  ");
                output.push_str(line);
                output.push('\n');
            }
        }

        if let Some(url) = &self.docs_url {
            output.push_str(&format!("\nLearn more: {}\n", url));
        }

        output
    }
}
