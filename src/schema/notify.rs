// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Lifecycle handlers and email notification

use serde::Serialize;
use serde_yaml::Value;

use super::executor;
use super::infra;
use super::raw::Fields;
use super::step::{NameSource, Step};
use super::FieldPath;
use crate::errors::{ValidationErrors, Violation};

/// A handler is shaped like a step, minus `depends`
pub type HandlerConfig = Step;

/// Steps run when the DAG finishes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HandlerOn {
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<HandlerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<HandlerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit: Option<HandlerConfig>,
}

impl HandlerOn {
    pub const EVENTS: [&'static str; 3] = ["success", "failure", "exit"];

    pub(crate) fn parse(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        let before = errors.len();
        let mut fields = Fields::open(value, path, errors)?;

        let mut handler = |fields: &mut Fields<'_>, event: &'static str| {
            let value = fields.get(event)?;
            Step::parse(value, fields.child(event), NameSource::Handler(event), errors).step
        };
        let success = handler(&mut fields, "success");
        let failure = handler(&mut fields, "failure");
        let exit = handler(&mut fields, "exit");
        fields.finish("handlerOn", errors);

        (errors.len() == before).then_some(Self { success, failure, exit })
    }

    pub fn success(&self) -> Option<&HandlerConfig> {
        self.success.as_ref()
    }

    pub fn failure(&self) -> Option<&HandlerConfig> {
        self.failure.as_ref()
    }

    pub fn exit(&self) -> Option<&HandlerConfig> {
        self.exit.as_ref()
    }

    /// Handlers that are set, with their event names
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &HandlerConfig)> {
        Self::EVENTS
            .into_iter()
            .zip([&self.success, &self.failure, &self.exit])
            .filter_map(|(event, handler)| handler.as_ref().map(|h| (event, h)))
    }
}

/// Which DAG outcomes send an email
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MailOn {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub failure: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub success: bool,
}

impl MailOn {
    /// Triggers that parsed are kept even when a sibling key is rejected, so
    /// the notification check still sees them
    pub(crate) fn parse(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        let mut fields = Fields::open(value, path, errors)?;
        let mail_on = Self {
            failure: fields.flag("failure", errors),
            success: fields.flag("success", errors),
        };
        fields.finish("mailOn", errors);
        Some(mail_on)
    }
}

/// Mail server connection
///
/// Every field is optional on its own; which ones are needed depends on the
/// notifications that are switched on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SmtpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl SmtpConfig {
    pub(crate) fn parse(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        let before = errors.len();
        let mut fields = Fields::open(value, path, errors)?;
        let host = fields.text("host", errors);
        let port = fields
            .get("port")
            .and_then(|port| infra::parse_port(port, fields.child("port"), errors));
        let username = fields.text("username", errors);
        let password = fields.string("password", errors);
        fields.finish("smtp", errors);

        (errors.len() == before).then_some(Self {
            host,
            port,
            username,
            password,
        })
    }

    fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.is_none() {
            missing.push("host");
        }
        if self.port.is_none() {
            missing.push("port");
        }
        if self.username.is_none() {
            missing.push("username");
        }
        if self.password.is_none() {
            missing.push("password");
        }
        missing
    }
}

/// Sender and recipients for one kind of notification (`errorMail`, `infoMail`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub attach_logs: bool,
}

impl MailConfig {
    pub(crate) fn parse(value: &Value, path: FieldPath, errors: &mut ValidationErrors) -> Option<Self> {
        let before = errors.len();
        let mut fields = Fields::open(value, path, errors)?;
        let from = fields.text("from", errors);
        if let Some(from) = &from {
            executor::check_addresses(&fields, "from", std::slice::from_ref(from), errors);
        }
        let to = fields.string_list("to", errors);
        executor::check_addresses(&fields, "to", &to, errors);
        let prefix = fields.string("prefix", errors);
        let attach_logs = fields.flag("attachLogs", errors);
        fields.finish("mail block", errors);

        (errors.len() == before).then_some(Self {
            from,
            to,
            prefix,
            attach_logs,
        })
    }

    fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.from.is_none() {
            missing.push("from");
        }
        if self.to.is_empty() {
            missing.push("to");
        }
        missing
    }
}

/// One notification block as found in the document
pub(crate) enum Slot<'a, T> {
    Absent,
    /// Present but rejected; its own errors are already recorded
    Rejected,
    Parsed(&'a T),
}

impl<'a, T> Slot<'a, T> {
    pub fn new(present: bool, parsed: Option<&'a T>) -> Self {
        match (parsed, present) {
            (Some(block), _) => Self::Parsed(block),
            (None, true) => Self::Rejected,
            (None, false) => Self::Absent,
        }
    }

    fn missing(&self, all: &[&'static str], missing: impl FnOnce(&T) -> Vec<&'static str>) -> Vec<&'static str> {
        match self {
            Self::Absent => all.to_vec(),
            Self::Rejected => Vec::new(),
            Self::Parsed(block) => missing(*block),
        }
    }
}

/// The notification blocks of a DAG, as parsed
pub(crate) struct Notifications<'a> {
    pub mail_on: Option<&'a MailOn>,
    pub smtp: Slot<'a, SmtpConfig>,
    pub error_mail: Slot<'a, MailConfig>,
    pub info_mail: Slot<'a, MailConfig>,
}

impl Notifications<'_> {
    /// Check that every enabled notification has what it needs to be sent
    ///
    /// `step_triggers` are the paths of steps with `mailOnError` set. Each
    /// missing block is reported once, against the first trigger needing it.
    pub fn check(&self, step_triggers: &[FieldPath], errors: &mut ValidationErrors) {
        let root = FieldPath::root();
        let mail_on = self.mail_on.cloned().unwrap_or_default();

        let mut failure_triggers: Vec<(String, FieldPath)> = Vec::new();
        if mail_on.failure {
            failure_triggers.push(("mailOn.failure".into(), root.key("mailOn").key("failure")));
        }
        for path in step_triggers {
            let path = path.key("mailOnError");
            failure_triggers.push((path.to_string(), path));
        }
        let success_trigger = mail_on
            .success
            .then(|| ("mailOn.success".to_string(), root.key("mailOn").key("success")));

        let first = failure_triggers.first().or(success_trigger.as_ref());
        let Some((trigger, path)) = first else {
            return;
        };

        let smtp_missing = self
            .smtp
            .missing(&["host", "port", "username", "password"], SmtpConfig::missing);
        Self::report(trigger, path, "smtp", smtp_missing, errors);

        if let Some((trigger, path)) = failure_triggers.first() {
            let missing = self.error_mail.missing(&["from", "to"], MailConfig::missing);
            Self::report(trigger, path, "errorMail", missing, errors);
        }
        if let Some((trigger, path)) = &success_trigger {
            let missing = self.info_mail.missing(&["from", "to"], MailConfig::missing);
            Self::report(trigger, path, "infoMail", missing, errors);
        }
    }

    fn report(
        trigger: &str,
        path: &FieldPath,
        block: &'static str,
        missing: Vec<&'static str>,
        errors: &mut ValidationErrors,
    ) {
        if missing.is_empty() {
            return;
        }
        errors.push(
            path.clone(),
            Violation::IncompleteNotificationConfig {
                trigger: trigger.to_string(),
                block,
                missing,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_handler_on() {
        let mut errors = ValidationErrors::new();
        let value = yaml("success:\n  command: echo ok\nexit: cleanup.sh\n");
        let handlers = HandlerOn::parse(&value, FieldPath::root().key("handlerOn"), &mut errors).unwrap();
        assert!(errors.is_empty(), "{}", errors.render());

        let events: Vec<&str> = handlers.iter().map(|(event, _)| event).collect();
        assert_eq!(events, vec!["success", "exit"]);
        assert_eq!(handlers.exit().unwrap().command(), Some("cleanup.sh"));
        assert!(handlers.failure().is_none());
    }

    #[test]
    fn test_handler_on_rejects_unknown_events_and_ambiguity() {
        let mut errors = ValidationErrors::new();
        let value = yaml("cancel:\n  command: echo\nfailure:\n  description: nothing to run\n");
        assert!(HandlerOn::parse(&value, FieldPath::root().key("handlerOn"), &mut errors).is_none());
        assert_eq!(
            errors.kinds(),
            vec![ErrorKind::AmbiguousStepDefinition, ErrorKind::UnknownField]
        );
        assert_eq!(errors.iter().next().unwrap().path().to_string(), "handlerOn.failure");
    }

    fn check(mail_on: MailOn, smtp: Option<SmtpConfig>, error_mail: Option<MailConfig>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        Notifications {
            mail_on: Some(&mail_on),
            smtp: Slot::new(false, smtp.as_ref()),
            error_mail: Slot::new(false, error_mail.as_ref()),
            info_mail: Slot::Absent,
        }
        .check(&[], &mut errors);
        errors
    }

    #[test]
    fn test_enabled_trigger_requires_smtp() {
        let errors = check(
            MailOn {
                failure: true,
                success: false,
            },
            None,
            None,
        );
        assert_eq!(
            errors.kinds(),
            vec![ErrorKind::IncompleteNotificationConfig, ErrorKind::IncompleteNotificationConfig]
        );
        assert_eq!(
            errors.render().lines().next().unwrap(),
            "mailOn.failure: mailOn.failure requires smtp with: host, port, username, password"
        );
    }

    #[test]
    fn test_partial_smtp_names_missing_fields() {
        let smtp = SmtpConfig {
            host: Some("smtp.example.com".into()),
            port: Some(587),
            ..SmtpConfig::default()
        };
        let mail = MailConfig {
            from: Some("dagu@example.com".into()),
            to: vec!["ops@example.com".into()],
            ..MailConfig::default()
        };
        let errors = check(
            MailOn {
                failure: true,
                success: false,
            },
            Some(smtp),
            Some(mail),
        );
        assert_eq!(errors.len(), 1);
        assert!(errors.render().ends_with("requires smtp with: username, password"));
    }

    #[test]
    fn test_disabled_triggers_need_nothing() {
        let errors = check(MailOn::default(), None, None);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_step_mail_on_error_is_a_trigger() {
        let mut errors = ValidationErrors::new();
        Notifications {
            mail_on: None,
            smtp: Slot::Absent,
            error_mail: Slot::Absent,
            info_mail: Slot::Absent,
        }
        .check(&[FieldPath::root().key("steps").index(1)], &mut errors);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.iter().next().unwrap().path().to_string(), "steps[1].mailOnError");
    }

    #[test]
    fn test_rejected_block_counts_as_present() {
        let mut errors = ValidationErrors::new();
        Notifications {
            mail_on: Some(&MailOn {
                failure: true,
                success: false,
            }),
            smtp: Slot::Rejected,
            error_mail: Slot::Absent,
            info_mail: Slot::Absent,
        }
        .check(&[], &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.render(),
            "mailOn.failure: mailOn.failure requires errorMail with: from, to"
        );
    }

    #[test]
    fn test_mail_on_keeps_triggers_next_to_unknown_keys() {
        let mut errors = ValidationErrors::new();
        let value = yaml("failure: true\nretry: true\n");
        let mail_on = MailOn::parse(&value, FieldPath::root().key("mailOn"), &mut errors).unwrap();
        assert!(mail_on.failure);
        assert_eq!(errors.kinds(), vec![ErrorKind::UnknownField]);
    }

    #[test]
    fn test_smtp_port_accepts_string() {
        let mut errors = ValidationErrors::new();
        let value = yaml("host: smtp.example.com\nport: '587'\nusername: bot\npassword: secret\n");
        let smtp = SmtpConfig::parse(&value, FieldPath::root().key("smtp"), &mut errors).unwrap();
        assert_eq!(smtp.port, Some(587));
        assert!(smtp.missing().is_empty());
    }
}
