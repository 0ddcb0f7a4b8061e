//! Email service for postbox.
//!
//! This module applies email commands: it validates payloads, enforces the
//! status lifecycle and resolves paging against the configured limits.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::config::{Config, EmailConfig, QueryConfig};
use crate::datetime::now;
use crate::db::Database;
use crate::{PostboxError, Result};

use super::command::{
    EmailCommand, EmailCreateDraftCommand, EmailDeleteDraftCommand, EmailSaveDraftCommand,
    EmailSendCommand,
};
use super::filter::{EmailFilter, Page};
use super::repository::EmailRepository;
use super::types::{Email, EmailId, EmailShort, EmailStatus};

/// Statuses from which an email may be deleted.
const DELETABLE: [EmailStatus; 2] = [EmailStatus::Draft, EmailStatus::Sent];

/// What deleting an email does to the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Keep the row and set its status to `deleted`.
    #[default]
    Soft,
    /// Remove the row.
    Hard,
}

/// Result of a delete command.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// The email is kept with status `deleted`.
    SoftDeleted(Email),
    /// The email no longer exists.
    Removed(EmailId),
}

/// Result of [`EmailService::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Created(Email),
    Saved(Email),
    Sent(Email),
    Deleted(DeleteOutcome),
}

impl CommandOutcome {
    /// The resulting email, if it still exists.
    pub fn email(&self) -> Option<&Email> {
        match self {
            CommandOutcome::Created(email)
            | CommandOutcome::Saved(email)
            | CommandOutcome::Sent(email)
            | CommandOutcome::Deleted(DeleteOutcome::SoftDeleted(email)) => Some(email),
            CommandOutcome::Deleted(DeleteOutcome::Removed(_)) => None,
        }
    }
}

/// Service for email operations.
pub struct EmailService<'a> {
    db: &'a Database,
    email: EmailConfig,
    query: QueryConfig,
}

impl<'a> EmailService<'a> {
    /// Create a new EmailService with default settings.
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            email: EmailConfig::default(),
            query: QueryConfig::default(),
        }
    }

    /// Create a new EmailService using the email and query sections of `config`.
    pub fn from_config(db: &'a Database, config: &Config) -> Self {
        Self::new(db)
            .with_email_config(config.email.clone())
            .with_query_config(config.query.clone())
    }

    /// Replace the email command settings.
    pub fn with_email_config(mut self, email: EmailConfig) -> Self {
        self.email = email;
        self
    }

    /// Replace the paging settings.
    pub fn with_query_config(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }

    fn repo(&self) -> EmailRepository<'_> {
        EmailRepository::new(self.db.pool())
    }

    /// Validate and apply any email command.
    pub async fn execute(&self, command: EmailCommand) -> Result<CommandOutcome> {
        debug!(cmd = command.name(), "Executing email command");
        match command {
            EmailCommand::CreateDraft(cmd) => self.create_draft(&cmd).await.map(CommandOutcome::Created),
            EmailCommand::SaveDraft(cmd) => self.save_draft(&cmd).await.map(CommandOutcome::Saved),
            EmailCommand::Send(cmd) => self.send(&cmd).await.map(CommandOutcome::Sent),
            EmailCommand::DeleteDraft(cmd) => {
                self.delete_draft(&cmd).await.map(CommandOutcome::Deleted)
            }
        }
    }

    /// Create a new outgoing draft.
    ///
    /// # Errors
    ///
    /// Returns a validation error if an address is malformed, the subject
    /// or body is too long, or no sender is given and none is configured.
    pub async fn create_draft(&self, cmd: &EmailCreateDraftCommand) -> Result<Email> {
        cmd.validate()?;

        let from = cmd
            .from
            .clone()
            .unwrap_or_else(|| self.email.default_from.clone());
        if from.trim().is_empty() {
            return Err(PostboxError::Validation(
                "from: a sender is required when email.default_from is not set".to_string(),
            ));
        }
        let mut email = Email::draft(from, now());
        email.to = cmd.to.clone();
        email.subject = cmd.subject.clone();
        email.body = cmd.body.clone();

        let email = self.repo().insert(&email).await?;
        if let Some(ref id) = email.id {
            info!(id = %id, "Draft created");
        }
        Ok(email)
    }

    /// Update the content of a draft.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the email does not exist and `InvalidState` if it
    /// is no longer a draft.
    pub async fn save_draft(&self, cmd: &EmailSaveDraftCommand) -> Result<Email> {
        cmd.validate()?;

        let repo = self.repo();
        let update = cmd.content();
        if !repo
            .update_content(&cmd.id, &update, EmailStatus::Draft)
            .await?
        {
            return Err(self.reject(&cmd.id, "save").await);
        }

        info!(id = %cmd.id, "Draft saved");
        self.get(&cmd.id).await
    }

    /// Send a draft. Only the status changes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the email does not exist and `InvalidState` if it
    /// has already been sent or deleted.
    pub async fn send(&self, cmd: &EmailSendCommand) -> Result<Email> {
        if !self
            .repo()
            .transition_status(&cmd.id, &[EmailStatus::Draft], EmailStatus::Sent)
            .await?
        {
            return Err(self.reject(&cmd.id, "send").await);
        }

        info!(id = %cmd.id, "Email sent");
        self.get(&cmd.id).await
    }

    /// Delete a draft or sent email according to the configured delete mode.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the email does not exist and `InvalidState` if it
    /// is already deleted.
    pub async fn delete_draft(&self, cmd: &EmailDeleteDraftCommand) -> Result<DeleteOutcome> {
        let repo = self.repo();
        match self.email.delete_mode {
            DeleteMode::Soft => {
                if !repo
                    .transition_status(&cmd.id, &DELETABLE, EmailStatus::Deleted)
                    .await?
                {
                    return Err(self.reject(&cmd.id, "delete").await);
                }
                info!(id = %cmd.id, "Email moved to deleted");
                Ok(DeleteOutcome::SoftDeleted(self.get(&cmd.id).await?))
            }
            DeleteMode::Hard => {
                if !repo.remove(&cmd.id, &DELETABLE).await? {
                    return Err(self.reject(&cmd.id, "delete").await);
                }
                info!(id = %cmd.id, "Email removed");
                Ok(DeleteOutcome::Removed(cmd.id.clone()))
            }
        }
    }

    /// Get an email by ID.
    pub async fn get(&self, id: &EmailId) -> Result<Email> {
        self.repo()
            .get_by_id(id)
            .await?
            .ok_or_else(|| PostboxError::NotFound(format!("email {id}")))
    }

    /// Set the read/unread flag of an email.
    pub async fn mark_seen(&self, id: &EmailId, seen: bool) -> Result<Email> {
        if !self.repo().set_seen(id, seen).await? {
            return Err(PostboxError::NotFound(format!("email {id}")));
        }
        self.get(id).await
    }

    /// Find emails matching `filter`, newest first.
    pub async fn search(&self, filter: &EmailFilter, page: Option<Page>) -> Result<Vec<Email>> {
        self.repo().search(filter, self.resolve_page(page)).await
    }

    /// Like [`search`](Self::search) but returns list projections.
    pub async fn list_short(
        &self,
        filter: &EmailFilter,
        page: Option<Page>,
    ) -> Result<Vec<EmailShort>> {
        self.repo().search_short(filter, self.resolve_page(page)).await
    }

    /// Count emails matching `filter`.
    pub async fn count(&self, filter: &EmailFilter) -> Result<i64> {
        self.repo().count(filter).await
    }

    fn resolve_page(&self, page: Option<Page>) -> Page {
        page.unwrap_or_else(|| Page::new(0, self.query.default_limit))
            .clamped(self.query.max_limit)
    }

    /// Build the error for a guarded update that matched no row.
    async fn reject(&self, id: &EmailId, action: &'static str) -> PostboxError {
        let error = match self.repo().get_by_id(id).await {
            Ok(Some(email)) => PostboxError::InvalidState {
                id: id.clone(),
                status: email.status,
                action,
            },
            Ok(None) => PostboxError::NotFound(format!("email {id}")),
            Err(e) => e,
        };
        warn!(id = %id, action, "Email command rejected: {error}");
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    async fn create(service: &EmailService<'_>, subject: &str) -> Email {
        service
            .create_draft(&EmailCreateDraftCommand::new().from("a@x.com").subject(subject))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_draft_defaults() {
        let db = setup_db().await;
        let service = EmailService::new(&db);

        let email = create(&service, "hi").await;
        assert!(email.id.is_some());
        assert_eq!(email.status, EmailStatus::Draft);
        assert!(email.is_out);
        assert!(!email.is_seen);
        assert_eq!(email.from, "a@x.com");
        assert!(email.to.is_none());
    }

    #[tokio::test]
    async fn test_create_draft_uses_default_from() {
        let db = setup_db().await;
        let service = EmailService::new(&db).with_email_config(EmailConfig {
            default_from: "noreply@example.com".to_string(),
            ..Default::default()
        });

        let email = service
            .create_draft(&EmailCreateDraftCommand::new().subject("hi"))
            .await
            .unwrap();
        assert_eq!(email.from, "noreply@example.com");
    }

    #[tokio::test]
    async fn test_create_draft_requires_sender() {
        let db = setup_db().await;
        let service = EmailService::new(&db);

        let result = service
            .create_draft(&EmailCreateDraftCommand::new().subject("x"))
            .await;
        assert!(matches!(result, Err(PostboxError::Validation(_))));

        let blank = service
            .create_draft(&EmailCreateDraftCommand::new().from("   ").subject("x"))
            .await;
        assert!(matches!(blank, Err(PostboxError::Validation(_))));
        assert_eq!(service.count(&EmailFilter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_draft_validation() {
        let db = setup_db().await;
        let service = EmailService::new(&db);

        let result = service
            .create_draft(&EmailCreateDraftCommand::new().from("not-an-address"))
            .await;
        assert!(matches!(result, Err(PostboxError::Validation(_))));
        assert_eq!(service.count(&EmailFilter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_draft_updates_given_fields() {
        let db = setup_db().await;
        let service = EmailService::new(&db);
        let email = create(&service, "first").await;
        let id = email.id.clone().unwrap();

        let saved = service
            .save_draft(&EmailSaveDraftCommand::new(id.clone()).body("text"))
            .await
            .unwrap();
        assert_eq!(saved.subject.as_deref(), Some("first"));
        assert_eq!(saved.body.as_deref(), Some("text"));
        assert_eq!(saved.ts, email.ts);
        assert_eq!(saved.status, EmailStatus::Draft);
    }

    #[tokio::test]
    async fn test_save_draft_after_send_rejected() {
        let db = setup_db().await;
        let service = EmailService::new(&db);
        let id = create(&service, "x").await.id.unwrap();
        service.send(&EmailSendCommand::new(id.clone())).await.unwrap();

        let result = service
            .save_draft(&EmailSaveDraftCommand::new(id.clone()).subject("changed"))
            .await;
        assert!(matches!(
            result,
            Err(PostboxError::InvalidState {
                status: EmailStatus::Sent,
                action: "save",
                ..
            })
        ));
        assert_eq!(service.get(&id).await.unwrap().subject.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_send_twice_rejected() {
        let db = setup_db().await;
        let service = EmailService::new(&db);
        let draft = create(&service, "go").await;
        let id = draft.id.clone().unwrap();

        let sent = service.send(&EmailSendCommand::new(id.clone())).await.unwrap();
        assert_eq!(sent.status, EmailStatus::Sent);
        assert_eq!(sent.subject, draft.subject);
        assert_eq!(sent.ts, draft.ts);

        let again = service.send(&EmailSendCommand::new(id)).await;
        assert!(matches!(again, Err(PostboxError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_missing_id_not_found() {
        let db = setup_db().await;
        let service = EmailService::new(&db);
        let missing = EmailId::from("missing");

        let send = service.send(&EmailSendCommand::new(missing.clone())).await;
        assert!(matches!(send, Err(PostboxError::NotFound(_))));

        let save = service
            .save_draft(&EmailSaveDraftCommand::new(missing.clone()).subject("s"))
            .await;
        assert!(matches!(save, Err(PostboxError::NotFound(_))));

        let delete = service
            .delete_draft(&EmailDeleteDraftCommand::new(missing.clone()))
            .await;
        assert!(matches!(delete, Err(PostboxError::NotFound(_))));

        let seen = service.mark_seen(&missing, true).await;
        assert!(matches!(seen, Err(PostboxError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_soft_delete() {
        let db = setup_db().await;
        let service = EmailService::new(&db);
        let id = create(&service, "old").await.id.unwrap();

        let outcome = service
            .delete_draft(&EmailDeleteDraftCommand::new(id.clone()))
            .await
            .unwrap();
        match outcome {
            DeleteOutcome::SoftDeleted(email) => assert_eq!(email.status, EmailStatus::Deleted),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let again = service
            .delete_draft(&EmailDeleteDraftCommand::new(id.clone()))
            .await;
        assert!(matches!(
            again,
            Err(PostboxError::InvalidState {
                status: EmailStatus::Deleted,
                ..
            })
        ));

        let send = service.send(&EmailSendCommand::new(id)).await;
        assert!(matches!(send, Err(PostboxError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_hard_delete() {
        let db = setup_db().await;
        let service = EmailService::new(&db).with_email_config(EmailConfig {
            delete_mode: DeleteMode::Hard,
            ..Default::default()
        });
        let id = create(&service, "gone").await.id.unwrap();
        service.send(&EmailSendCommand::new(id.clone())).await.unwrap();

        let outcome = service
            .delete_draft(&EmailDeleteDraftCommand::new(id.clone()))
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::Removed(id.clone()));
        assert!(matches!(
            service.get(&id).await,
            Err(PostboxError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_seen() {
        let db = setup_db().await;
        let service = EmailService::new(&db);
        let id = create(&service, "unread").await.id.unwrap();

        let email = service.mark_seen(&id, true).await.unwrap();
        assert!(email.is_seen);
        assert_eq!(email.status, EmailStatus::Draft);

        let email = service.mark_seen(&id, false).await.unwrap();
        assert!(!email.is_seen);
    }

    #[tokio::test]
    async fn test_execute_dispatch() {
        let db = setup_db().await;
        let service = EmailService::new(&db);

        let json = r#"{"cmd":"createDraft","payload":{"from":"a@x.com","subject":"hi"}}"#;
        let command: EmailCommand = serde_json::from_str(json).unwrap();
        let outcome = service.execute(command).await.unwrap();
        let id = match outcome {
            CommandOutcome::Created(ref email) => email.id.clone().unwrap(),
            ref other => panic!("unexpected outcome: {other:?}"),
        };

        let outcome = service
            .execute(EmailSendCommand::new(id.clone()).into())
            .await
            .unwrap();
        assert_eq!(outcome.email().unwrap().status, EmailStatus::Sent);

        let outcome = service
            .execute(EmailDeleteDraftCommand::new(id).into())
            .await
            .unwrap();
        assert_eq!(outcome.email().unwrap().status, EmailStatus::Deleted);
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_payload() {
        let db = setup_db().await;
        let service = EmailService::new(&db);

        let command: EmailCommand = EmailCreateDraftCommand::new()
            .subject("s".repeat(101))
            .into();
        let result = service.execute(command).await;
        assert!(matches!(result, Err(PostboxError::Validation(_))));
    }

    #[tokio::test]
    async fn test_paging_uses_config() {
        let db = setup_db().await;
        let service = EmailService::new(&db).with_query_config(QueryConfig {
            default_limit: 2,
            max_limit: 3,
        });
        for i in 0..5 {
            create(&service, &format!("m{i}")).await;
        }

        let all = EmailFilter::new();
        assert_eq!(service.search(&all, None).await.unwrap().len(), 2);
        assert_eq!(
            service
                .list_short(&all, Some(Page::new(0, 100)))
                .await
                .unwrap()
                .len(),
            3
        );
        assert_eq!(
            service
                .search(&all, Some(Page::new(4, 10)))
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(service.count(&all).await.unwrap(), 5);
    }

    #[test]
    fn test_delete_mode_serde() {
        let mode: DeleteMode = serde_json::from_str("\"hard\"").unwrap();
        assert_eq!(mode, DeleteMode::Hard);
        assert_eq!(DeleteMode::default(), DeleteMode::Soft);
        assert!(serde_json::from_str::<DeleteMode>("\"purge\"").is_err());
    }
}
