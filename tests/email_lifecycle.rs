//! Email lifecycle tests for postbox.
//!
//! Drives drafts through creation, editing, sending, deletion and search
//! using the public service API.

use std::collections::HashSet;

use postbox::{
    Database, DeleteMode, DeleteOutcome, Email, EmailCommand, EmailCreateDraftCommand,
    EmailDeleteDraftCommand, EmailFilter, EmailSaveDraftCommand, EmailSendCommand, EmailService,
    EmailShort, EmailStatus, PostboxError,
};
use postbox::config::EmailConfig;

async fn setup_test_db() -> Database {
    Database::open_in_memory().await.unwrap()
}

async fn create_draft(service: &EmailService<'_>, subject: &str, body: Option<&str>) -> Email {
    let mut cmd = EmailCreateDraftCommand::new()
        .from("a@x.com")
        .subject(subject);
    if let Some(body) = body {
        cmd = cmd.body(body);
    }
    service.create_draft(&cmd).await.unwrap()
}

/// Identity is absent before persistence and unique after.
#[tokio::test]
async fn test_identity_assigned_on_persist() {
    let db = setup_test_db().await;
    let service = EmailService::new(&db);

    let unsaved = Email::draft("a@x.com", postbox::datetime::now());
    assert!(unsaved.id.is_none());

    let mut ids = HashSet::new();
    for i in 0..20 {
        let email = create_draft(&service, &format!("mail {i}"), None).await;
        let id = email.id.expect("persisted email must have an id");
        assert!(ids.insert(id), "ids must be unique");
    }
}

/// Stored status is always one of the three known values.
#[tokio::test]
async fn test_status_values_closed() {
    let db = setup_test_db().await;
    let service = EmailService::new(&db);

    let a = create_draft(&service, "a", None).await.id.unwrap();
    let b = create_draft(&service, "b", None).await.id.unwrap();
    create_draft(&service, "c", None).await;
    service.send(&EmailSendCommand::new(a.clone())).await.unwrap();
    service
        .delete_draft(&EmailDeleteDraftCommand::new(b))
        .await
        .unwrap();

    let statuses: Vec<String> = sqlx::query_scalar("SELECT status FROM emails ORDER BY status")
        .fetch_all(db.pool())
        .await
        .unwrap();
    assert_eq!(statuses, ["deleted", "draft", "sent"]);

    let bad = sqlx::query("UPDATE emails SET status = 'archived' WHERE id = ?")
        .bind(a.as_str())
        .execute(db.pool())
        .await;
    assert!(bad.is_err(), "unknown status must be rejected by storage");
}

/// Creating a draft from a JSON command yields a fresh outgoing draft.
#[tokio::test]
async fn test_create_draft_command() {
    let db = setup_test_db().await;
    let service = EmailService::new(&db);

    let json = r#"{"cmd":"createDraft","payload":{"from":"a@x.com","subject":"hi"}}"#;
    let command: EmailCommand = serde_json::from_str(json).unwrap();
    let outcome = service.execute(command).await.unwrap();
    let email = outcome.email().unwrap().clone();

    assert!(email.id.is_some());
    assert_eq!(email.status, EmailStatus::Draft);
    assert!(email.is_out);
    assert!(!email.is_seen);
    assert_eq!(email.from, "a@x.com");
    assert_eq!(email.subject.as_deref(), Some("hi"));

    let stored = service.get(email.id.as_ref().unwrap()).await.unwrap();
    assert_eq!(stored, email);
}

/// Sending moves a draft to sent; sending again is rejected.
#[tokio::test]
async fn test_send_draft_once() {
    let db = setup_test_db().await;
    let service = EmailService::new(&db);
    let draft = create_draft(&service, "report", Some("numbers")).await;
    let id = draft.id.clone().unwrap();

    let sent = service.send(&EmailSendCommand::new(id.clone())).await.unwrap();
    assert_eq!(sent.status, EmailStatus::Sent);
    assert_eq!(sent.subject, draft.subject);
    assert_eq!(sent.body, draft.body);
    assert_eq!(sent.ts, draft.ts);

    let err = service
        .send(&EmailSendCommand::new(id.clone()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PostboxError::InvalidState {
            status: EmailStatus::Sent,
            action: "send",
            ..
        }
    ));
    assert_eq!(service.get(&id).await.unwrap(), sent);
}

/// A term matches subject, body, recipient or sender, ignoring ASCII case.
#[tokio::test]
async fn test_term_search_fields() {
    let db = setup_test_db().await;
    let service = EmailService::new(&db);

    let by_subject = create_draft(&service, "Invoice #12", None).await;
    let by_body = create_draft(&service, "Hello", Some("see the INVOICE")).await;
    let by_to = service
        .create_draft(
            &EmailCreateDraftCommand::new()
                .from("a@x.com")
                .to("invoice@billing.example")
                .subject("q"),
        )
        .await
        .unwrap();
    let by_from = service
        .create_draft(
            &EmailCreateDraftCommand::new()
                .from("Invoices@shop.example")
                .subject("r"),
        )
        .await
        .unwrap();
    create_draft(&service, "Lunch", Some("pizza")).await;

    let filter = EmailFilter::new().with_term("invoice");
    let found = service.search(&filter, None).await.unwrap();
    let found_ids: HashSet<_> = found.iter().map(|e| e.id.clone().unwrap()).collect();
    let expected: HashSet<_> = [by_subject, by_body, by_to, by_from]
        .into_iter()
        .map(|e| e.id.unwrap())
        .collect();
    assert_eq!(found_ids, expected);
    assert_eq!(service.count(&filter).await.unwrap(), 4);
}

/// Short projections carry exactly id, subject and ts of their email.
#[tokio::test]
async fn test_short_projection() {
    let db = setup_test_db().await;
    let service = EmailService::new(&db);
    create_draft(&service, "one", Some("body one")).await;
    create_draft(&service, "two", Some("body two")).await;

    let all = EmailFilter::new();
    let emails = service.search(&all, None).await.unwrap();
    let shorts = service.list_short(&all, None).await.unwrap();
    let projected: Vec<EmailShort> = emails.iter().map(Email::short).collect();
    assert_eq!(shorts, projected);

    for short in &shorts {
        let json = serde_json::to_value(short).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["id", "subject", "ts"]);
    }
}

/// Drafts can be edited until sent; deletion then follows the configured mode.
#[tokio::test]
async fn test_full_lifecycle_hard_delete() {
    let db = setup_test_db().await;
    let service = EmailService::new(&db).with_email_config(EmailConfig {
        default_from: "me@example.com".to_string(),
        delete_mode: DeleteMode::Hard,
    });

    let draft = service
        .create_draft(&EmailCreateDraftCommand::new())
        .await
        .unwrap();
    assert_eq!(draft.from, "me@example.com");
    let id = draft.id.unwrap();

    let saved = service
        .save_draft(
            &EmailSaveDraftCommand::new(id.clone())
                .to("you@example.com")
                .subject("plans"),
        )
        .await
        .unwrap();
    assert_eq!(saved.to.as_deref(), Some("you@example.com"));

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

/// Filters built from query pairs select by status and term together.
#[tokio::test]
async fn test_filter_from_query() {
    let db = setup_test_db().await;
    let service = EmailService::new(&db);
    let sent = create_draft(&service, "weekly invoice", None).await;
    create_draft(&service, "invoice draft", None).await;
    service
        .send(&EmailSendCommand::new(sent.id.clone().unwrap()))
        .await
        .unwrap();

    let filter = EmailFilter::from_query([("term", "INVOICE"), ("status", "sent")]).unwrap();
    let found = service.search(&filter, None).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, sent.id);
}
