//! Mail service.
//!
//! High-level message operations: admission control on submit, per-party
//! access checks, read tracking and soft deletion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use validator::{Validate, ValidationErrors};

use super::mailbox::{MailboxView, Page};
use super::repository::MessageRepository;
use super::spam_guard::{Candidate, SpamGuard, SpamPolicy, Verdict};
use super::types::{Message, NewAttachment, NewMessage, Party, MAX_BODY_LENGTH, MAX_SUBJECT_LENGTH};
use super::validation::{
    into_mail_error, max_chars, no_control_chars, not_empty_trimmed, validate_attachment,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, MailConfig, MailboxConfig};
use crate::db::{Database, UserRepository};
use crate::{MailError, Result};

/// Request to submit a message.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Recipient user ID.
    pub recipient_id: i64,
    /// Message subject.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// Items and currency to attach.
    pub attachments: Vec<NewAttachment>,
}

impl SubmitRequest {
    /// Create a new submit request without attachments.
    pub fn new(recipient_id: i64, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient_id,
            subject: subject.into(),
            body: body.into(),
            attachments: Vec::new(),
        }
    }

    /// Add attachments.
    pub fn with_attachments(mut self, attachments: Vec<NewAttachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

impl Validate for SubmitRequest {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let subject = self.subject.trim();
        for check in [
            not_empty_trimmed(subject),
            max_chars(subject, MAX_SUBJECT_LENGTH),
            no_control_chars(subject),
        ] {
            if let Err(e) = check {
                errors.add("subject", e);
            }
        }

        let body = self.body.trim();
        for check in [
            not_empty_trimmed(body),
            max_chars(body, MAX_BODY_LENGTH),
            no_control_chars(body),
        ] {
            if let Err(e) = check {
                errors.add("body", e);
            }
        }

        for (index, attachment) in self.attachments.iter().enumerate() {
            validate_attachment(index, attachment, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Per-sender async locks held across evaluate-then-insert.
#[derive(Default)]
struct SenderLocks {
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl SenderLocks {
    async fn acquire(&self, sender_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop locks nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(sender_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Service for mail operations.
pub struct MailService {
    db: Arc<Database>,
    mail: MailConfig,
    mailbox: MailboxConfig,
    guard: SpamGuard,
    clock: Arc<dyn Clock>,
    sender_locks: SenderLocks,
}

impl MailService {
    /// Create a new MailService using the system clock.
    pub fn new(db: Arc<Database>, config: &Config) -> Self {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    /// Create a new MailService with an explicit time source.
    pub fn with_clock(db: Arc<Database>, config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            guard: SpamGuard::new(SpamPolicy::from(&config.mail)),
            mail: config.mail.clone(),
            mailbox: config.mailbox.clone(),
            clock,
            sender_locks: SenderLocks::default(),
        }
    }

    /// The anti-abuse policy in force.
    pub fn policy(&self) -> &SpamPolicy {
        self.guard.policy()
    }

    /// Submit a message.
    ///
    /// Input is validated before the anti-abuse rules run. On success the
    /// message and all of its attachments are committed together.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Subject or body is empty or too long, or an attachment is invalid
    /// - The sender account does not exist or is inactive
    /// - The anti-abuse policy rejects the message
    /// - The store fails
    pub async fn submit(&self, sender_id: i64, request: &SubmitRequest) -> Result<Message> {
        request.validate().map_err(into_mail_error)?;
        if request.attachments.len() > self.mail.max_attachments {
            return Err(MailError::Validation(format!(
                "attachments: at most {} attachments per message",
                self.mail.max_attachments
            )));
        }

        let subject = request.subject.trim();
        let body = request.body.trim();

        let _sender_lock = if self.mail.serialize_submissions {
            Some(self.sender_locks.acquire(sender_id).await)
        } else {
            None
        };

        let pool = self.db.pool();
        let repo = MessageRepository::new(pool);
        let now = self.clock.now();

        let users = UserRepository::new(pool)
            .get_by_ids(&[sender_id, request.recipient_id])
            .await?;
        if !users.get(&sender_id).is_some_and(|sender| sender.is_active) {
            warn!(sender_id, "Submission from missing or inactive sender");
            return Err(MailError::Forbidden(
                "sender account is missing or inactive".to_string(),
            ));
        }
        let recipient = users.get(&request.recipient_id);
        let since = now
            .checked_sub_signed(self.guard.lookback())
            .ok_or_else(|| MailError::Config("rate-limit lookback out of range".to_string()))?;
        let history = repo.list_sent_since(sender_id, since).await?;

        let candidate = Candidate {
            sender_id,
            recipient_id: request.recipient_id,
            subject,
            body,
        };
        let verdict = self
            .guard
            .evaluate(now, &candidate, recipient, &history);
        if let Verdict::Reject(reason) = verdict {
            warn!(
                sender_id,
                recipient_id = request.recipient_id,
                reason = reason.as_str(),
                "Message rejected"
            );
            return Err(MailError::Rejected(reason));
        }

        let new_message = NewMessage::new(sender_id, request.recipient_id, subject, body, now);
        let message = repo.create(&new_message, &request.attachments).await?;

        info!(
            message_id = message.id,
            sender_id,
            recipient_id = message.recipient_id,
            attachments = message.attachments.len(),
            "Message sent"
        );
        Ok(message)
    }

    /// Get a message the actor takes part in.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Message doesn't exist or the actor has deleted it
    /// - Actor is neither sender nor recipient
    pub async fn get_by_id(&self, actor_id: i64, message_id: i64) -> Result<Message> {
        let (message, _) = self.load_visible(actor_id, message_id).await?;
        Ok(message)
    }

    /// List the actor's inbox, newest first.
    pub async fn get_inbox(
        &self,
        actor_id: i64,
        skip: i64,
        limit: Option<i64>,
        unread_only: bool,
    ) -> Result<Page<Message>> {
        self.mailbox_view()
            .inbox(actor_id, skip, limit, unread_only)
            .await
    }

    /// List the messages the actor has sent, newest first.
    pub async fn get_sent(
        &self,
        actor_id: i64,
        skip: i64,
        limit: Option<i64>,
    ) -> Result<Page<Message>> {
        self.mailbox_view().sent(actor_id, skip, limit).await
    }

    /// Mark a message as read.
    ///
    /// Only the recipient may do this. Repeating the call succeeds and
    /// keeps the first `read_at`.
    pub async fn mark_read(&self, actor_id: i64, message_id: i64) -> Result<Message> {
        let (message, party) = self.load_visible(actor_id, message_id).await?;
        if party != Party::Recipient {
            return Err(MailError::Forbidden(
                "only the recipient can mark a message as read".to_string(),
            ));
        }
        if message.is_read {
            return Ok(message);
        }

        let repo = MessageRepository::new(self.db.pool());
        if repo.mark_as_read(message_id, self.clock.now()).await? {
            debug!(message_id, actor_id, "Message marked as read");
        }
        repo.get_by_id(message_id)
            .await?
            .ok_or_else(|| MailError::NotFound("message".to_string()))
    }

    /// Hide a message from the actor's side only.
    ///
    /// Deleting an already deleted message again succeeds.
    pub async fn soft_delete(&self, actor_id: i64, message_id: i64) -> Result<()> {
        let repo = MessageRepository::new(self.db.pool());
        let message = repo
            .get_by_id(message_id)
            .await?
            .ok_or_else(|| MailError::NotFound("message".to_string()))?;
        let party = message.party_of(actor_id).ok_or_else(not_a_party)?;

        if repo.hide_for(message_id, party).await? {
            debug!(message_id, actor_id, ?party, "Message deleted");
        }
        Ok(())
    }

    /// Count unread messages in the actor's inbox.
    pub async fn count_unread(&self, actor_id: i64) -> Result<i64> {
        MessageRepository::new(self.db.pool())
            .count_unread(actor_id)
            .await
    }

    /// A mailbox view over this service's store.
    pub fn mailbox_view(&self) -> MailboxView<'_> {
        MailboxView::new(self.db.pool(), &self.mailbox)
    }

    async fn load_visible(&self, actor_id: i64, message_id: i64) -> Result<(Message, Party)> {
        let message = MessageRepository::new(self.db.pool())
            .get_by_id(message_id)
            .await?
            .ok_or_else(|| MailError::NotFound("message".to_string()))?;
        let party = message.party_of(actor_id).ok_or_else(not_a_party)?;
        if !message.is_visible_to(party) {
            return Err(MailError::NotFound("message".to_string()));
        }
        Ok((message, party))
    }
}

fn not_a_party() -> MailError {
    MailError::Forbidden("not a participant of this message".to_string())
}
