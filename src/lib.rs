//! gamemail - in-game mail service core.
//!
//! Players exchange messages that may carry items or currency. The crate
//! covers submission admission control, mailbox views and message state
//! transitions on top of a SQLite store.

pub mod clock;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod logging;
pub mod mail;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository};
pub use error::{MailError, Result};
pub use mail::{
    Attachment, AttachmentType, MailService, MailboxView, Message, NewAttachment, Page,
    RejectReason, SpamGuard, SpamPolicy, SubmitRequest, Verdict,
};
