//! Database schema and migrations for postbox.
//!
//! Migrations are applied in order when the database is first opened or
//! upgraded; the schema_version table tracks which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: emails table
    r#"
CREATE TABLE emails (
    id          TEXT PRIMARY KEY,
    sender      TEXT NOT NULL,
    recipient   TEXT,
    subject     TEXT,
    body        TEXT,
    status      TEXT NOT NULL CHECK (status IN ('draft', 'sent', 'deleted')),
    is_out      INTEGER NOT NULL,
    is_seen     INTEGER NOT NULL DEFAULT 0,
    ts          TEXT NOT NULL           -- RFC 3339 UTC, microseconds
);

CREATE INDEX idx_emails_ts ON emails(ts);
CREATE INDEX idx_emails_status ON emails(status);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_first_migration_contains_emails_table() {
        let first = MIGRATIONS[0];
        assert!(first.contains("CREATE TABLE emails"));
        for column in [
            "sender", "recipient", "subject", "body", "status", "is_out", "is_seen", "ts",
        ] {
            assert!(first.contains(column), "missing column {column}");
        }
    }

    #[test]
    fn test_status_values_constrained() {
        assert!(MIGRATIONS[0].contains("CHECK (status IN ('draft', 'sent', 'deleted'))"));
    }
}
