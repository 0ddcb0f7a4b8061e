//! Email types for postbox.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length for an email subject, in characters.
pub const MAX_SUBJECT_LENGTH: usize = 100;

/// Maximum length for an email body, in characters.
pub const MAX_BODY_LENGTH: usize = 10000;

/// Opaque email identifier.
///
/// Assigned by [`EmailRepository::insert`](super::EmailRepository::insert)
/// and never by callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailId(String);

impl EmailId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EmailId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EmailId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of an email.
///
/// Transitions only go forward: `draft -> sent` and `draft | sent -> deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    /// Being composed; content is still editable.
    Draft,
    /// Sent; content is frozen.
    Sent,
    /// Soft-deleted.
    Deleted,
}

impl EmailStatus {
    /// All status values, in lifecycle order.
    pub const ALL: [EmailStatus; 3] = [EmailStatus::Draft, EmailStatus::Sent, EmailStatus::Deleted];

    /// Convert status to its stored string literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Draft => "draft",
            EmailStatus::Sent => "sent",
            EmailStatus::Deleted => "deleted",
        }
    }

    /// Check whether moving from this status to `next` is a legal transition.
    pub fn can_become(&self, next: EmailStatus) -> bool {
        matches!(
            (self, next),
            (EmailStatus::Draft, EmailStatus::Sent)
                | (EmailStatus::Draft, EmailStatus::Deleted)
                | (EmailStatus::Sent, EmailStatus::Deleted)
        )
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(EmailStatus::Draft),
            "sent" => Ok(EmailStatus::Sent),
            "deleted" => Ok(EmailStatus::Deleted),
            _ => Err(format!("unknown email status: {s}")),
        }
    }
}

/// An email record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    /// Identifier, `None` until the email is first persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EmailId>,
    /// Sender address.
    pub from: String,
    /// Recipient address.
    #[serde(default)]
    pub to: Option<String>,
    /// Subject line.
    #[serde(default)]
    pub subject: Option<String>,
    /// Message body.
    #[serde(default)]
    pub body: Option<String>,
    /// Lifecycle status.
    pub status: EmailStatus,
    /// Whether the email is outgoing.
    pub is_out: bool,
    /// Read/unread flag.
    pub is_seen: bool,
    /// Timestamp of the record.
    pub ts: DateTime<Utc>,
}

impl Email {
    /// Build an unpersisted outgoing draft.
    pub fn draft(from: impl Into<String>, ts: DateTime<Utc>) -> Self {
        Self {
            id: None,
            from: from.into(),
            to: None,
            subject: None,
            body: None,
            status: EmailStatus::Draft,
            is_out: true,
            is_seen: false,
            ts,
        }
    }

    /// Check if the email has been assigned an identity by storage.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Check if the email is still a draft.
    pub fn is_draft(&self) -> bool {
        self.status == EmailStatus::Draft
    }

    /// Project to the list view.
    pub fn short(&self) -> EmailShort {
        EmailShort::from(self)
    }
}

/// Read-only list projection of an [`Email`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailShort {
    /// Identifier of the projected email.
    pub id: Option<EmailId>,
    /// Subject line.
    pub subject: Option<String>,
    /// Timestamp.
    pub ts: DateTime<Utc>,
}

impl From<&Email> for EmailShort {
    fn from(email: &Email) -> Self {
        Self {
            id: email.id.clone(),
            subject: email.subject.clone(),
            ts: email.ts,
        }
    }
}

impl From<Email> for EmailShort {
    fn from(email: Email) -> Self {
        Self {
            id: email.id,
            subject: email.subject,
            ts: email.ts,
        }
    }
}

/// Content changes for a draft. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailContentUpdate {
    /// New sender.
    pub from: Option<String>,
    /// New recipient.
    pub to: Option<String>,
    /// New subject.
    pub subject: Option<String>,
    /// New body.
    pub body: Option<String>,
}

impl EmailContentUpdate {
    /// Create an empty update.
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

    /// Check if the update is empty.
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.subject.is_none() && self.body.is_none()
    }

    /// Apply the update to an in-memory email.
    pub fn apply_to(&self, email: &mut Email) {
        if let Some(ref from) = self.from {
            email.from = from.clone();
        }
        if let Some(ref to) = self.to {
            email.to = Some(to.clone());
        }
        if let Some(ref subject) = self.subject {
            email.subject = Some(subject.clone());
        }
        if let Some(ref body) = self.body {
            email.body = Some(body.clone());
        }
    }
}
