//! Command payloads that mutate emails.
//!
//! Each command is deserialized once, validated, and handed to
//! [`EmailService`](super::EmailService). Unknown fields are rejected so that
//! a command cannot smuggle in changes it does not declare.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use super::types::{EmailContentUpdate, EmailId};

/// Reject control characters other than newline, carriage return and tab.
fn no_control_chars(value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
    {
        return Err(ValidationError::new("no_control_chars")
            .with_message("must not contain control characters".into()));
    }
    Ok(())
}

/// Create a new draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EmailCreateDraftCommand {
    /// Sender; the configured default sender is used when absent.
    #[serde(default)]
    #[validate(email)]
    pub from: Option<String>,
    /// Recipient.
    #[serde(default)]
    #[validate(email)]
    pub to: Option<String>,
    /// Subject line.
    #[serde(default)]
    #[validate(length(max = 100), custom(function = "no_control_chars"))]
    pub subject: Option<String>,
    /// Message body.
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub body: Option<String>,
}

impl EmailCreateDraftCommand {
    /// Create an empty command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender.
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Set the recipient.
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Set the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Edit the content of an existing draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EmailSaveDraftCommand {
    /// Target draft.
    pub id: EmailId,
    /// New sender.
    #[serde(default)]
    #[validate(email)]
    pub from: Option<String>,
    /// New recipient.
    #[serde(default)]
    #[validate(email)]
    pub to: Option<String>,
    /// New subject.
    #[serde(default)]
    #[validate(length(max = 100), custom(function = "no_control_chars"))]
    pub subject: Option<String>,
    /// New body.
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub body: Option<String>,
}

impl EmailSaveDraftCommand {
    /// Create a command that changes nothing yet.
    pub fn new(id: impl Into<EmailId>) -> Self {
        Self {
            id: id.into(),
            from: None,
            to: None,
            subject: None,
            body: None,
        }
    }

    /// Set the sender.
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Set the recipient.
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Set the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Content changes carried by this command.
    pub fn content(&self) -> EmailContentUpdate {
        EmailContentUpdate {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
        }
    }
}

/// Send a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailSendCommand {
    /// Target draft.
    pub id: EmailId,
}

impl EmailSendCommand {
    pub fn new(id: impl Into<EmailId>) -> Self {
        Self { id: id.into() }
    }
}

/// Delete a draft or sent email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailDeleteDraftCommand {
    /// Target email.
    pub id: EmailId,
}

impl EmailDeleteDraftCommand {
    pub fn new(id: impl Into<EmailId>) -> Self {
        Self { id: id.into() }
    }
}

/// Any email command, tagged for transport as `{"cmd": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "payload", rename_all = "camelCase")]
pub enum EmailCommand {
    CreateDraft(EmailCreateDraftCommand),
    SaveDraft(EmailSaveDraftCommand),
    Send(EmailSendCommand),
    DeleteDraft(EmailDeleteDraftCommand),
}

impl EmailCommand {
    /// Command name as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            EmailCommand::CreateDraft(_) => "createDraft",
            EmailCommand::SaveDraft(_) => "saveDraft",
            EmailCommand::Send(_) => "send",
            EmailCommand::DeleteDraft(_) => "deleteDraft",
        }
    }

    /// Email targeted by the command; `None` for creation.
    pub fn target(&self) -> Option<&EmailId> {
        match self {
            EmailCommand::CreateDraft(_) => None,
            EmailCommand::SaveDraft(cmd) => Some(&cmd.id),
            EmailCommand::Send(cmd) => Some(&cmd.id),
            EmailCommand::DeleteDraft(cmd) => Some(&cmd.id),
        }
    }
}

impl Validate for EmailCommand {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            EmailCommand::CreateDraft(cmd) => cmd.validate(),
            EmailCommand::SaveDraft(cmd) => cmd.validate(),
            EmailCommand::Send(_) | EmailCommand::DeleteDraft(_) => Ok(()),
        }
    }
}

impl From<EmailCreateDraftCommand> for EmailCommand {
    fn from(cmd: EmailCreateDraftCommand) -> Self {
        EmailCommand::CreateDraft(cmd)
    }
}

impl From<EmailSaveDraftCommand> for EmailCommand {
    fn from(cmd: EmailSaveDraftCommand) -> Self {
        EmailCommand::SaveDraft(cmd)
    }
}

impl From<EmailSendCommand> for EmailCommand {
    fn from(cmd: EmailSendCommand) -> Self {
        EmailCommand::Send(cmd)
    }
}

impl From<EmailDeleteDraftCommand> for EmailCommand {
    fn from(cmd: EmailDeleteDraftCommand) -> Self {
        EmailCommand::DeleteDraft(cmd)
    }
}
