//! postbox - email drafts and mailbox storage
//!
//! Email records with a draft/sent/deleted lifecycle, command payloads that
//! create, edit, send and delete them, and filtered listing over SQLite.

pub mod config;
pub mod datetime;
pub mod db;
pub mod email;
pub mod error;
pub mod logging;

pub use config::Config;
pub use db::{Database, DbPool};
pub use email::{
    CommandOutcome, DeleteMode, DeleteOutcome, Email, EmailCommand, EmailContentUpdate,
    EmailCreateDraftCommand, EmailDeleteDraftCommand, EmailFilter, EmailId, EmailRepository,
    EmailSaveDraftCommand, EmailSendCommand, EmailService, EmailShort, EmailStatus, FilterError,
    Page, TsRange,
};
pub use error::{PostboxError, Result};
