//! Email module for postbox.
//!
//! This module provides the email entity and its lifecycle:
//! - Drafts are created, edited, sent and deleted through commands
//! - Filters select emails by time range, search term and status
//! - Emails can be listed in full or as short projections

mod command;
mod filter;
mod repository;
mod service;
mod types;

pub use command::{
    EmailCommand, EmailCreateDraftCommand, EmailDeleteDraftCommand, EmailSaveDraftCommand,
    EmailSendCommand,
};
pub use filter::{
    EmailField, EmailFilter, FilterError, FilterFieldSpec, FilterOp, Page, TsRange,
    EMAIL_FILTER_FIELDS,
};
pub use repository::EmailRepository;
pub use service::{CommandOutcome, DeleteMode, DeleteOutcome, EmailService};
pub use types::{
    Email, EmailContentUpdate, EmailId, EmailShort, EmailStatus, MAX_BODY_LENGTH,
    MAX_SUBJECT_LENGTH,
};
