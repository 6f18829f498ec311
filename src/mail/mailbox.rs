//! Mailbox listing: inbox and sent views under per-party soft delete.

use std::collections::HashMap;

use serde::Serialize;

use super::repository::MessageRepository;
use super::types::{Message, Party};
use crate::config::MailboxConfig;
use crate::db::{DbPool, UserRepository};
use crate::{MailError, Result};

/// Filters for one mailbox page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxQuery {
    /// User whose mailbox is listed.
    pub owner_id: i64,
    /// Which side of the message the owner is on.
    pub party: Party,
    /// Only messages the recipient has not read yet.
    pub unread_only: bool,
    /// Number of messages to skip.
    pub skip: i64,
    /// Maximum number of messages to return.
    pub limit: i64,
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total matches across all pages.
    pub total: i64,
    /// Offset this page starts at.
    pub skip: i64,
    /// Page size that was applied.
    pub limit: i64,
}

impl<T> Page<T> {
    /// Whether more items exist beyond this page.
    pub fn has_more(&self) -> bool {
        self.skip + (self.items.len() as i64) < self.total
    }

    /// Offset of the following page, if there is one.
    ///
    /// A zero-sized page never advances, so it has no successor.
    pub fn next_skip(&self) -> Option<i64> {
        if self.limit == 0 || self.items.is_empty() {
            return None;
        }
        self.has_more()
            .then_some(self.skip + self.items.len() as i64)
    }
}

/// Composes and runs mailbox queries.
pub struct MailboxView<'a> {
    pool: &'a DbPool,
    default_page_size: i64,
    max_page_size: i64,
}

impl<'a> MailboxView<'a> {
    /// Create a view with the configured page limits.
    pub fn new(pool: &'a DbPool, config: &MailboxConfig) -> Self {
        Self {
            pool,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    /// Build a query, validating paging.
    ///
    /// `skip` and `limit` must be non-negative. A missing limit uses the
    /// default page size; larger limits are clamped to the maximum.
    pub fn compose(
        &self,
        owner_id: i64,
        party: Party,
        unread_only: bool,
        skip: i64,
        limit: Option<i64>,
    ) -> Result<MailboxQuery> {
        if skip < 0 {
            return Err(MailError::Validation(
                "skip must not be negative".to_string(),
            ));
        }
        let limit = limit.unwrap_or(self.default_page_size);
        if limit < 0 {
            return Err(MailError::Validation(
                "limit must not be negative".to_string(),
            ));
        }

        Ok(MailboxQuery {
            owner_id,
            party,
            // Unread state only means something for received mail
            unread_only: unread_only && party == Party::Recipient,
            skip,
            limit: limit.min(self.max_page_size),
        })
    }

    /// Run a query.
    pub async fn fetch(&self, query: &MailboxQuery) -> Result<Page<Message>> {
        let repo = MessageRepository::new(self.pool);
        let total = repo.count_matching(query).await?;
        let items = if query.limit == 0 {
            Vec::new()
        } else {
            repo.list(query).await?
        };

        Ok(Page {
            items,
            total,
            skip: query.skip,
            limit: query.limit,
        })
    }

    /// Messages received by `owner_id` and not deleted by them.
    pub async fn inbox(
        &self,
        owner_id: i64,
        skip: i64,
        limit: Option<i64>,
        unread_only: bool,
    ) -> Result<Page<Message>> {
        let query = self.compose(owner_id, Party::Recipient, unread_only, skip, limit)?;
        self.fetch(&query).await
    }

    /// Messages sent by `owner_id` and not deleted by them.
    pub async fn sent(
        &self,
        owner_id: i64,
        skip: i64,
        limit: Option<i64>,
    ) -> Result<Page<Message>> {
        let query = self.compose(owner_id, Party::Sender, false, skip, limit)?;
        self.fetch(&query).await
    }

    /// Resolve the usernames of every party on `messages` in one query.
    pub async fn usernames(&self, messages: &[Message]) -> Result<HashMap<i64, String>> {
        let mut ids: Vec<i64> = messages
            .iter()
            .flat_map(|m| [m.sender_id, m.recipient_id])
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let users = UserRepository::new(self.pool).get_by_ids(&ids).await?;
        Ok(users
            .into_iter()
            .map(|(id, user)| (id, user.username))
            .collect())
    }
}
