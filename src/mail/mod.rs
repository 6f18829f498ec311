//! Mail module.
//!
//! This module provides the in-game mail core:
//! - Message submission behind the anti-abuse policy
//! - Inbox and sent views with stable pagination
//! - Read tracking and per-party logical deletion
//! - Item and currency attachments stored atomically with their message

mod mailbox;
mod repository;
mod service;
mod spam_guard;
mod types;
mod validation;

pub use mailbox::{MailboxQuery, MailboxView, Page};
pub use repository::{AttachmentRepository, MessageRepository};
pub use service::{MailService, SubmitRequest};
pub use spam_guard::{Candidate, RejectReason, SpamGuard, SpamPolicy, Verdict};
pub use types::{
    Attachment, AttachmentData, AttachmentType, Message, NewAttachment, NewMessage, Party,
    SentRecord, MAX_BODY_LENGTH, MAX_ITEM_NAME_LENGTH, MAX_SUBJECT_LENGTH,
};
