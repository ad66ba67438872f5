// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Fluent builders
//!
//! Builders only stage values. Nothing is checked until `build()`, which
//! assembles the same mapping a document would contain and runs it through
//! [`Dag::from_value`], so a built DAG (or its error list) is exactly what the
//! equivalent document would produce.

use serde_yaml::{Mapping, Value};

use super::dag::Dag;
use crate::errors::ValidationErrors;

/// Generic staging area for a mapping-shaped block (container, ssh, log,
/// smtp, errorMail, ...)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    fields: Mapping,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing any earlier value
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Append to a list-valued field
    pub fn push(mut self, key: &str, value: impl Into<Value>) -> Self {
        push_to(&mut self.fields, key, value.into());
        self
    }

    /// Set `key` to a nested block
    pub fn block(self, key: &str, block: Block) -> Self {
        self.set(key, block)
    }

    pub fn into_value(self) -> Value {
        Value::Mapping(self.fields)
    }
}

impl From<Block> for Value {
    fn from(block: Block) -> Self {
        block.into_value()
    }
}

fn push_to(map: &mut Mapping, key: &str, value: Value) {
    match map.get_mut(key) {
        Some(Value::Sequence(items)) => items.push(value),
        _ => {
            map.insert(key.into(), Value::Sequence(vec![value]));
        }
    }
}

fn entry_of(map: &mut Mapping, key: &str, sub_key: &str, value: Value) {
    if !matches!(map.get(key), Some(Value::Mapping(_))) {
        map.insert(key.into(), Value::Mapping(Mapping::new()));
    }
    if let Some(Value::Mapping(inner)) = map.get_mut(key) {
        inner.insert(sub_key.into(), value);
    }
}

/// Staged `executor` block
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorBuilder {
    block: Block,
}

impl ExecutorBuilder {
    /// An executor of the given `type`; the type is checked at build time
    pub fn new(kind: &str) -> Self {
        Self {
            block: Block::new().set("type", kind),
        }
    }

    pub fn shell(command: &str) -> Self {
        Self::new("shell").set("command", command)
    }

    pub fn http(method: &str, url: &str) -> Self {
        Self::new("http").set("method", method).set("url", url)
    }

    pub fn ssh(user: &str, host: &str) -> Self {
        Self::new("ssh").set("user", user).set("host", host)
    }

    pub fn mail(from: &str, to: &str, subject: &str) -> Self {
        Self::new("mail").set("from", from).set("to", to).set("subject", subject)
    }

    pub fn docker(image: &str) -> Self {
        Self::new("docker").set("image", image)
    }

    pub fn jq(query: &str) -> Self {
        Self::new("jq").set("query", query)
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.block = self.block.set(key, value);
        self
    }

    pub fn push(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.block = self.block.push(key, value);
        self
    }

    /// Add an HTTP header
    pub fn header(mut self, name: &str, value: &str) -> Self {
        entry_of(&mut self.block.fields, "headers", name, value.into());
        self
    }

    /// Add an HTTP query parameter
    pub fn query_param(mut self, name: &str, value: &str) -> Self {
        entry_of(&mut self.block.fields, "query", name, value.into());
        self
    }

    pub fn env(mut self, name: &str, value: impl Into<Value>) -> Self {
        entry_of(&mut self.block.fields, "env", name, value.into());
        self
    }
}

impl From<ExecutorBuilder> for Value {
    fn from(executor: ExecutorBuilder) -> Self {
        executor.block.into_value()
    }
}

/// Staged step
#[derive(Debug, Clone, PartialEq)]
pub struct StepBuilder {
    fields: Mapping,
}

impl StepBuilder {
    pub fn new(name: &str) -> Self {
        let mut fields = Mapping::new();
        fields.insert("name".into(), name.into());
        Self { fields }
    }

    /// A handler step; its name defaults to the event it is attached to
    pub fn handler() -> Self {
        Self { fields: Mapping::new() }
    }

    /// Set any step field by its document name
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn description(self, description: &str) -> Self {
        self.set("description", description)
    }

    pub fn command(self, command: &str) -> Self {
        self.set("command", command)
    }

    pub fn script(self, script: &str) -> Self {
        self.set("script", script)
    }

    pub fn shell(self, shell: &str) -> Self {
        self.set("shell", shell)
    }

    pub fn executor(self, executor: ExecutorBuilder) -> Self {
        self.set("executor", executor)
    }

    /// Wait for another step; may be called repeatedly
    pub fn depends_on(mut self, step: &str) -> Self {
        push_to(&mut self.fields, "depends", step.into());
        self
    }

    pub fn depends<'a>(self, steps: impl IntoIterator<Item = &'a str>) -> Self {
        steps.into_iter().fold(self, Self::depends_on)
    }

    pub fn retry(mut self, limit: u32, interval_sec: u64) -> Self {
        entry_of(&mut self.fields, "retryPolicy", "limit", limit.into());
        entry_of(&mut self.fields, "retryPolicy", "intervalSec", interval_sec.into());
        self
    }

    pub fn retry_on_exit_code(mut self, code: i32) -> Self {
        let mut policy = match self.fields.remove("retryPolicy") {
            Some(Value::Mapping(policy)) => policy,
            _ => Mapping::new(),
        };
        push_to(&mut policy, "exitCode", code.into());
        self.fields.insert("retryPolicy".into(), Value::Mapping(policy));
        self
    }

    pub fn repeat(mut self, interval_sec: u64) -> Self {
        entry_of(&mut self.fields, "repeatPolicy", "repeat", true.into());
        entry_of(&mut self.fields, "repeatPolicy", "intervalSec", interval_sec.into());
        self
    }

    pub fn continue_on_failure(mut self) -> Self {
        entry_of(&mut self.fields, "continueOn", "failure", true.into());
        self
    }

    pub fn continue_on_skipped(mut self) -> Self {
        entry_of(&mut self.fields, "continueOn", "skipped", true.into());
        self
    }

    pub fn mark_success(mut self) -> Self {
        entry_of(&mut self.fields, "continueOn", "markSuccess", true.into());
        self
    }

    /// Fan out over literal items
    pub fn parallel<'a>(mut self, items: impl IntoIterator<Item = &'a str>) -> Self {
        let items: Vec<Value> = items.into_iter().map(Value::from).collect();
        entry_of(&mut self.fields, "parallel", "items", Value::Sequence(items));
        self
    }

    /// Fan out over a variable such as `${HOSTS}`
    pub fn parallel_over(mut self, reference: &str) -> Self {
        entry_of(&mut self.fields, "parallel", "items", reference.into());
        self
    }

    pub fn max_concurrent(mut self, limit: u32) -> Self {
        entry_of(&mut self.fields, "parallel", "maxConcurrent", limit.into());
        self
    }

    pub fn precondition(mut self, condition: &str) -> Self {
        push_to(&mut self.fields, "preconditions", condition.into());
        self
    }

    pub fn precondition_expect(mut self, condition: &str, expected: &str) -> Self {
        let block = Block::new().set("condition", condition).set("expected", expected);
        push_to(&mut self.fields, "preconditions", block.into());
        self
    }

    pub fn env(mut self, name: &str, value: impl Into<Value>) -> Self {
        entry_of(&mut self.fields, "env", name, value.into());
        self
    }

    pub fn dir(self, dir: &str) -> Self {
        self.set("dir", dir)
    }

    pub fn output(self, variable: &str) -> Self {
        self.set("output", variable)
    }

    pub fn timeout_sec(self, seconds: u64) -> Self {
        self.set("timeoutSec", seconds)
    }

    pub fn mail_on_error(self, enabled: bool) -> Self {
        self.set("mailOnError", enabled)
    }

    pub fn container(self, container: Block) -> Self {
        self.set("container", container)
    }

    pub fn ssh(self, ssh: Block) -> Self {
        self.set("ssh", ssh)
    }

    pub fn log(self, log: Block) -> Self {
        self.set("log", log)
    }

    pub fn into_value(self) -> Value {
        Value::Mapping(self.fields)
    }
}

impl From<StepBuilder> for Value {
    fn from(step: StepBuilder) -> Self {
        step.into_value()
    }
}

/// Staged DAG
///
/// ```
/// use dagcheck::schema::{DagBuilder, StepBuilder};
///
/// let dag = DagBuilder::new("backup")
///     .schedule("0 3 * * *")
///     .add_step("dump", "pg_dump app > app.sql")
///     .step(StepBuilder::new("upload").command("aws s3 cp app.sql s3://backups/").depends_on("dump"))
///     .build()
///     .unwrap();
///
/// assert_eq!(dag.steps().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DagBuilder {
    fields: Mapping,
    steps: Vec<Value>,
}

impl DagBuilder {
    pub fn new(name: &str) -> Self {
        let mut fields = Mapping::new();
        fields.insert("name".into(), name.into());
        Self {
            fields,
            steps: Vec::new(),
        }
    }

    /// Set any top-level field by its document name
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn description(self, description: &str) -> Self {
        self.set("description", description)
    }

    pub fn group(self, group: &str) -> Self {
        self.set("group", group)
    }

    pub fn tag(mut self, tag: &str) -> Self {
        push_to(&mut self.fields, "tags", tag.into());
        self
    }

    /// Add a start schedule; may be called repeatedly
    pub fn schedule(mut self, cron: &str) -> Self {
        push_to(&mut self.fields, "schedule", cron.into());
        self
    }

    pub fn env(mut self, name: &str, value: impl Into<Value>) -> Self {
        entry_of(&mut self.fields, "env", name, value.into());
        self
    }

    /// Add a positional parameter
    pub fn param(mut self, value: &str) -> Self {
        push_to(&mut self.fields, "params", value.into());
        self
    }

    pub fn named_param(mut self, name: &str, value: &str) -> Self {
        let mut param = Mapping::new();
        param.insert(name.into(), value.into());
        push_to(&mut self.fields, "params", Value::Mapping(param));
        self
    }

    pub fn step(mut self, step: StepBuilder) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Add a shell step with no other settings
    pub fn add_step(self, name: &str, command: &str) -> Self {
        self.step(StepBuilder::new(name).command(command))
    }

    /// Attach a `success`, `failure` or `exit` handler
    pub fn handler(mut self, event: &str, handler: StepBuilder) -> Self {
        entry_of(&mut self.fields, "handlerOn", event, handler.into());
        self
    }

    pub fn mail_on(self, failure: bool, success: bool) -> Self {
        self.set("mailOn", Block::new().set("failure", failure).set("success", success))
    }

    pub fn smtp(self, smtp: Block) -> Self {
        self.set("smtp", smtp)
    }

    pub fn error_mail(self, mail: Block) -> Self {
        self.set("errorMail", mail)
    }

    pub fn info_mail(self, mail: Block) -> Self {
        self.set("infoMail", mail)
    }

    pub fn container(self, container: Block) -> Self {
        self.set("container", container)
    }

    pub fn ssh(self, ssh: Block) -> Self {
        self.set("ssh", ssh)
    }

    pub fn log(self, log: Block) -> Self {
        self.set("log", log)
    }

    pub fn precondition(mut self, condition: &str) -> Self {
        push_to(&mut self.fields, "preconditions", condition.into());
        self
    }

    pub fn timeout_sec(self, seconds: u64) -> Self {
        self.set("timeoutSec", seconds)
    }

    pub fn delay_sec(self, seconds: u64) -> Self {
        self.set("delaySec", seconds)
    }

    pub fn restart_wait_sec(self, seconds: u64) -> Self {
        self.set("restartWaitSec", seconds)
    }

    pub fn max_clean_up_time_sec(self, seconds: u64) -> Self {
        self.set("maxCleanUpTimeSec", seconds)
    }

    pub fn max_active_runs(self, runs: u32) -> Self {
        self.set("maxActiveRuns", runs)
    }

    pub fn max_active_steps(self, steps: u32) -> Self {
        self.set("maxActiveSteps", steps)
    }

    pub fn skip_if_successful(self, skip: bool) -> Self {
        self.set("skipIfSuccessful", skip)
    }

    /// The document this builder describes; `steps` is left out until one is staged
    pub fn to_value(&self) -> Value {
        let mut fields = self.fields.clone();
        if !self.steps.is_empty() {
            fields.insert("steps".into(), Value::Sequence(self.steps.clone()));
        }
        Value::Mapping(fields)
    }

    /// Validate everything that was staged
    pub fn build(self) -> Result<Dag, ValidationErrors> {
        Dag::from_value(&self.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn direct(yaml: &str) -> Result<Dag, ValidationErrors> {
        Dag::from_value(&serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn test_builder_matches_document() {
        let built = DagBuilder::new("deploy")
            .description("Ship the web app")
            .schedule("30 6 * * MON-FRI")
            .tag("web")
            .env("STAGE", "prod")
            .named_param("VERSION", "latest")
            .max_active_steps(2)
            .add_step("build", "make build")
            .step(
                StepBuilder::new("push")
                    .executor(ExecutorBuilder::docker("alpine:3.20").set("command", "echo pushed"))
                    .depends_on("build")
                    .retry(3, 10),
            )
            .step(
                StepBuilder::new("announce")
                    .executor(
                        ExecutorBuilder::http("POST", "https://chat.example.com/hook")
                            .header("Content-Type", "application/json"),
                    )
                    .depends(["push", "build"])
                    .continue_on_failure(),
            )
            .handler("failure", StepBuilder::handler().command("./rollback.sh"))
            .build()
            .unwrap();

        let documented = direct(
            r#"
name: deploy
description: Ship the web app
schedule: ["30 6 * * MON-FRI"]
tags: [web]
env:
  STAGE: prod
params:
  - VERSION: latest
maxActiveSteps: 2
steps:
  - name: build
    command: make build
  - name: push
    executor:
      type: docker
      image: alpine:3.20
      command: echo pushed
    depends: [build]
    retryPolicy: {limit: 3, intervalSec: 10}
  - name: announce
    executor:
      type: http
      method: POST
      url: https://chat.example.com/hook
      headers:
        Content-Type: application/json
    depends: [push, build]
    continueOn: {failure: true}
handlerOn:
  failure:
    command: ./rollback.sh
"#,
        )
        .unwrap();

        assert_eq!(built, documented);
    }

    #[test]
    fn test_builder_reports_the_same_errors() {
        let built = DagBuilder::new("bad")
            .schedule("*/5 * *")
            .step(StepBuilder::new("call").executor(ExecutorBuilder::new("http").set("method", "GET")))
            .step(StepBuilder::new("call").command("echo").depends_on("missing"))
            .build()
            .unwrap_err();

        let documented = direct(
            "name: bad\nschedule: ['*/5 * *']\nsteps:\n  - name: call\n    executor: {type: http, method: GET}\n  - name: call\n    command: echo\n    depends: [missing]\n",
        )
        .unwrap_err();

        assert_eq!(built, documented);
        assert_eq!(
            built.kinds(),
            vec![
                ErrorKind::IncompleteExecutorConfig,
                ErrorKind::DuplicateStepName,
                ErrorKind::UnknownDependency,
                ErrorKind::InvalidSchedule,
            ]
        );
    }

    #[test]
    fn test_builder_without_steps_matches_document_without_steps() {
        let built = DagBuilder::new("empty").build().unwrap_err();
        assert_eq!(built, direct("name: empty\n").unwrap_err());
        assert_eq!(built.kinds(), vec![ErrorKind::MissingField]);
    }

    #[test]
    fn test_nothing_is_checked_before_build() {
        let builder = DagBuilder::new("not a valid name").max_active_runs(0);
        assert_eq!(builder.to_value()["maxActiveRuns"], Value::from(0u32));

        let errors = builder.build().unwrap_err();
        assert!(errors.contains(ErrorKind::InvalidName));
        assert!(errors.contains(ErrorKind::InvalidValue));
    }

    #[test]
    fn test_parallel_and_policies() {
        let dag = DagBuilder::new("fanout")
            .step(
                StepBuilder::new("sync")
                    .command("rsync -a src/ $ITEM:/srv/")
                    .parallel(["web1", "web2"])
                    .max_concurrent(1)
                    .retry(2, 5)
                    .retry_on_exit_code(255)
                    .repeat(3600)
                    .precondition_expect("`hostname`", "deploy01")
                    .output("SYNC_OUT"),
            )
            .build()
            .unwrap();

        let step = &dag.steps()[0];
        assert_eq!(step.parallel().unwrap().max_concurrent, Some(1));
        assert_eq!(step.retry_policy().unwrap().exit_codes, vec![255]);
        assert_eq!(step.repeat_policy().unwrap().interval_sec, Some(3600));
        assert_eq!(step.output(), Some("SYNC_OUT"));
    }

    #[test]
    fn test_notification_blocks() {
        let smtp = Block::new()
            .set("host", "smtp.example.com")
            .set("port", 587)
            .set("username", "bot")
            .set("password", "secret");
        let mail = Block::new().set("from", "bot@example.com").push("to", "ops@example.com");

        let dag = DagBuilder::new("watched")
            .add_step("work", "./work.sh")
            .mail_on(true, false)
            .smtp(smtp.clone())
            .error_mail(mail)
            .build()
            .unwrap();
        assert!(dag.mail_on().unwrap().failure);

        let errors = DagBuilder::new("unwatched")
            .add_step("work", "./work.sh")
            .mail_on(true, false)
            .smtp(smtp)
            .build()
            .unwrap_err();
        assert_eq!(errors.kinds(), vec![ErrorKind::IncompleteNotificationConfig]);
        assert!(errors.render().contains("errorMail"));
    }
}
