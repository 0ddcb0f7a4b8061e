//! Email repository for postbox.
//!
//! Maps [`Email`] to rows of the `emails` table. Identity is assigned here, on
//! insert, and status changes are guarded on the status the caller expects so
//! that concurrent commands cannot both win.

use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use super::filter::{EmailFilter, Page};
use super::types::{Email, EmailContentUpdate, EmailId, EmailShort, EmailStatus};
use crate::datetime::{from_db_string, is_storable, to_db_string};
use crate::db::DbPool;
use crate::{PostboxError, Result};

const EMAIL_COLUMNS: &str = "id, sender, recipient, subject, body, status, is_out, is_seen, ts";

/// Repository for email persistence.
pub struct EmailRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> EmailRepository<'a> {
    /// Create a new EmailRepository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Persist a new email and return it with its freshly assigned ID.
    ///
    /// Fails with a validation error if the email already has an ID or its
    /// timestamp cannot be stored.
    pub async fn insert(&self, email: &Email) -> Result<Email> {
        if let Some(ref id) = email.id {
            return Err(PostboxError::Validation(format!(
                "email {id} is already persisted"
            )));
        }
        if !is_storable(&email.ts) {
            return Err(PostboxError::Validation(format!(
                "timestamp out of range: {}",
                email.ts
            )));
        }

        let id = EmailId::generate();
        sqlx::query(
            "INSERT INTO emails (id, sender, recipient, subject, body, status, is_out, is_seen, ts)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(&email.from)
        .bind(&email.to)
        .bind(&email.subject)
        .bind(&email.body)
        .bind(email.status.as_str())
        .bind(email.is_out)
        .bind(email.is_seen)
        .bind(to_db_string(&email.ts))
        .execute(self.pool)
        .await?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| PostboxError::NotFound(format!("email {id}")))
    }

    /// Get an email by ID.
    pub async fn get_by_id(&self, id: &EmailId) -> Result<Option<Email>> {
        let row: Option<EmailRow> =
            sqlx::query_as(&format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ?"))
                .bind(id.as_str())
                .fetch_optional(self.pool)
                .await?;

        row.map(Email::try_from).transpose()
    }

    /// Update content fields of an email whose status is `expected`.
    ///
    /// Returns false if no such email exists in that status.
    pub async fn update_content(
        &self,
        id: &EmailId,
        update: &EmailContentUpdate,
        expected: EmailStatus,
    ) -> Result<bool> {
        if update.is_empty() {
            let current = self.get_by_id(id).await?;
            return Ok(current.is_some_and(|email| email.status == expected));
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE emails SET ");
        let mut separated = query.separated(", ");

        if let Some(ref from) = update.from {
            separated.push("sender = ");
            separated.push_bind_unseparated(from.clone());
        }
        if let Some(ref to) = update.to {
            separated.push("recipient = ");
            separated.push_bind_unseparated(to.clone());
        }
        if let Some(ref subject) = update.subject {
            separated.push("subject = ");
            separated.push_bind_unseparated(subject.clone());
        }
        if let Some(ref body) = update.body {
            separated.push("body = ");
            separated.push_bind_unseparated(body.clone());
        }

        query.push(" WHERE id = ");
        query.push_bind(id.as_str().to_string());
        query.push(" AND status = ");
        query.push_bind(expected.as_str());

        let result = query.build().execute(self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move an email to `to` if its current status is one of `from`.
    ///
    /// Returns false if no such email exists in any of those statuses.
    pub async fn transition_status(
        &self,
        id: &EmailId,
        from: &[EmailStatus],
        to: EmailStatus,
    ) -> Result<bool> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE emails SET status = ");
        query.push_bind(to.as_str());
        query.push(" WHERE id = ");
        query.push_bind(id.as_str().to_string());
        push_status_guard(&mut query, from);

        let result = query.build().execute(self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the read/unread flag.
    pub async fn set_seen(&self, id: &EmailId, seen: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE emails SET is_seen = ? WHERE id = ?")
            .bind(seen)
            .bind(id.as_str())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Physically delete an email whose status is one of `from`.
    pub async fn remove(&self, id: &EmailId, from: &[EmailStatus]) -> Result<bool> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM emails WHERE id = ");
        query.push_bind(id.as_str().to_string());
        push_status_guard(&mut query, from);

        let result = query.build().execute(self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find emails matching `filter`, newest first.
    pub async fn search(&self, filter: &EmailFilter, page: Page) -> Result<Vec<Email>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {EMAIL_COLUMNS} FROM emails"));
        filter.push_where(&mut query)?;
        push_order_and_page(&mut query, page);
        debug!("Email search: {}", query.sql());

        let rows: Vec<EmailRow> = query.build_query_as().fetch_all(self.pool).await?;
        rows.into_iter().map(Email::try_from).collect()
    }

    /// Like [`search`](Self::search) but selects only the list projection.
    pub async fn search_short(&self, filter: &EmailFilter, page: Page) -> Result<Vec<EmailShort>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id, subject, ts FROM emails");
        filter.push_where(&mut query)?;
        push_order_and_page(&mut query, page);
        debug!("Email short search: {}", query.sql());

        let rows: Vec<EmailShortRow> = query.build_query_as().fetch_all(self.pool).await?;
        rows.into_iter().map(EmailShort::try_from).collect()
    }

    /// Count emails matching `filter`.
    pub async fn count(&self, filter: &EmailFilter) -> Result<i64> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM emails");
        filter.push_where(&mut query)?;

        let count: i64 = query.build_query_scalar().fetch_one(self.pool).await?;
        Ok(count)
    }
}

fn push_status_guard(query: &mut QueryBuilder<'_, Sqlite>, statuses: &[EmailStatus]) {
    query.push(" AND status IN (");
    let mut separated = query.separated(", ");
    for status in statuses {
        separated.push_bind(status.as_str());
    }
    separated.push_unseparated(")");
}

fn push_order_and_page(query: &mut QueryBuilder<'_, Sqlite>, page: Page) {
    query.push(" ORDER BY ts DESC, id ASC LIMIT ");
    query.push_bind(page.limit);
    query.push(" OFFSET ");
    query.push_bind(page.offset);
}

/// Internal struct for mapping database rows to Email.
#[derive(sqlx::FromRow)]
struct EmailRow {
    id: String,
    sender: String,
    recipient: Option<String>,
    subject: Option<String>,
    body: Option<String>,
    status: String,
    is_out: bool,
    is_seen: bool,
    ts: String,
}

impl TryFrom<EmailRow> for Email {
    type Error = PostboxError;

    fn try_from(row: EmailRow) -> Result<Self> {
        let status = row.status.parse::<EmailStatus>().map_err(|e| {
            PostboxError::Database(format!("email {}: {e}", row.id))
        })?;
        let ts = from_db_string(&row.ts).ok_or_else(|| {
            PostboxError::Database(format!("email {}: invalid timestamp {}", row.id, row.ts))
        })?;

        Ok(Email {
            id: Some(EmailId::from(row.id)),
            from: row.sender,
            to: row.recipient,
            subject: row.subject,
            body: row.body,
            status,
            is_out: row.is_out,
            is_seen: row.is_seen,
            ts,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EmailShortRow {
    id: String,
    subject: Option<String>,
    ts: String,
}

impl TryFrom<EmailShortRow> for EmailShort {
    type Error = PostboxError;

    fn try_from(row: EmailShortRow) -> Result<Self> {
        let ts = from_db_string(&row.ts).ok_or_else(|| {
            PostboxError::Database(format!("email {}: invalid timestamp {}", row.id, row.ts))
        })?;

        Ok(EmailShort {
            id: Some(EmailId::from(row.id)),
            subject: row.subject,
            ts,
        })
    }
}
