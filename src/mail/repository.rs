//! Mail repository for database operations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::mailbox::MailboxQuery;
use super::types::{
    Attachment, AttachmentData, AttachmentType, Message, NewAttachment, NewMessage, Party,
    SentRecord,
};
use crate::datetime::{parse_db_timestamp, to_db_timestamp};
use crate::db::DbPool;
use crate::{MailError, Result};

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, subject, body, is_read, read_at, \
     is_deleted_by_sender, is_deleted_by_recipient, created_at";

const ATTACHMENT_COLUMNS: &str =
    "id, message_id, attachment_type, item_id, item_name, quantity, attachment_data";

/// Repository for message operations.
pub struct MessageRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> MessageRepository<'a> {
    /// Create a new MessageRepository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Store a message and its attachments atomically.
    ///
    /// Either the message and every attachment become visible, or nothing
    /// does. Returns the stored message.
    pub async fn create(
        &self,
        message: &NewMessage,
        attachments: &[NewAttachment],
    ) -> Result<Message> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO messages (sender_id, recipient_id, subject, body, created_at)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(&message.subject)
        .bind(&message.body)
        .bind(to_db_timestamp(&message.created_at))
        .fetch_one(&mut *tx)
        .await?;

        for attachment in attachments {
            insert_attachment(&mut *tx, id, attachment).await?;
        }

        tx.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| MailError::NotFound("message".to_string()))
    }

    /// Get a message by ID, with attachments, regardless of delete flags.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Message>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?");
        let row: Option<MessageRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let attachments = AttachmentRepository::new(self.pool)
            .list_by_message(id)
            .await?;
        row.into_message(attachments).map(Some)
    }

    /// List one page of a mailbox, newest first.
    ///
    /// Ties on `created_at` are broken by descending ID so that pages are
    /// stable.
    pub async fn list(&self, query: &MailboxQuery) -> Result<Vec<Message>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE "));
        push_mailbox_filter(&mut builder, query);
        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(query.limit);
        builder.push(" OFFSET ");
        builder.push_bind(query.skip);

        let rows: Vec<MessageRow> = builder.build_query_as().fetch_all(self.pool).await?;

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut attachments = AttachmentRepository::new(self.pool)
            .list_by_messages(&ids)
            .await?;

        rows.into_iter()
            .map(|row| {
                let list = attachments.remove(&row.id).unwrap_or_default();
                row.into_message(list)
            })
            .collect()
    }

    /// Count all messages matching a mailbox filter, ignoring paging.
    pub async fn count_matching(&self, query: &MailboxQuery) -> Result<i64> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM messages WHERE ");
        push_mailbox_filter(&mut builder, query);

        let count: i64 = builder.build_query_scalar().fetch_one(self.pool).await?;
        Ok(count)
    }

    /// Messages sent by `sender_id` strictly after `since`, newest first.
    ///
    /// Includes messages the sender has since deleted.
    pub async fn list_sent_since(
        &self,
        sender_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<SentRecord>> {
        let rows: Vec<SentRow> = sqlx::query_as(
            "SELECT id, recipient_id, subject, body, created_at FROM messages
             WHERE sender_id = ? AND created_at > ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(sender_id)
        .bind(to_db_timestamp(&since))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(SentRow::into_record).collect()
    }

    /// Mark a message as read.
    ///
    /// Only the first transition sets `read_at`. Returns true if this call
    /// changed the row.
    pub async fn mark_as_read(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = 1, read_at = ? WHERE id = ? AND is_read = 0",
        )
        .bind(to_db_timestamp(&at))
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Hide a message from one party. Returns true if the flag changed.
    pub async fn hide_for(&self, id: i64, party: Party) -> Result<bool> {
        let sql = match party {
            Party::Sender => {
                "UPDATE messages SET is_deleted_by_sender = 1
                 WHERE id = ? AND is_deleted_by_sender = 0"
            }
            Party::Recipient => {
                "UPDATE messages SET is_deleted_by_recipient = 1
                 WHERE id = ? AND is_deleted_by_recipient = 0"
            }
        };
        let result = sqlx::query(sql).bind(id).execute(self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count unread messages visible in a recipient's inbox.
    pub async fn count_unread(&self, recipient_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages
             WHERE recipient_id = ? AND is_deleted_by_recipient = 0 AND is_read = 0",
        )
        .bind(recipient_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Physically remove messages hidden from both parties.
    ///
    /// Attachments go with them. Returns the number of messages removed.
    pub async fn purge_hidden(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM messages WHERE is_deleted_by_sender = 1 AND is_deleted_by_recipient = 1",
        )
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Count all stored messages.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

/// Repository for attachment lookups.
pub struct AttachmentRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> AttachmentRepository<'a> {
    /// Create a new AttachmentRepository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// List the attachments of one message in creation order.
    pub async fn list_by_message(&self, message_id: i64) -> Result<Vec<Attachment>> {
        let sql = format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE message_id = ? ORDER BY id"
        );
        let rows: Vec<AttachmentRow> = sqlx::query_as(&sql)
            .bind(message_id)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(AttachmentRow::into_attachment).collect()
    }

    /// Load the attachments of many messages in one query, grouped by
    /// message ID.
    pub async fn list_by_messages(
        &self,
        message_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Attachment>>> {
        let mut grouped: HashMap<i64, Vec<Attachment>> = HashMap::new();
        if message_ids.is_empty() {
            return Ok(grouped);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE message_id IN ("
        ));
        let mut separated = builder.separated(", ");
        for id in message_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY message_id, id");

        let rows: Vec<AttachmentRow> = builder.build_query_as().fetch_all(self.pool).await?;
        for row in rows {
            let attachment = row.into_attachment()?;
            grouped
                .entry(attachment.message_id)
                .or_default()
                .push(attachment);
        }
        Ok(grouped)
    }

    /// Count all stored attachments.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attachments")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

async fn insert_attachment(
    conn: &mut SqliteConnection,
    message_id: i64,
    attachment: &NewAttachment,
) -> Result<()> {
    let data = attachment
        .attachment_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| MailError::Validation(format!("attachment data: {e}")))?;

    sqlx::query(
        "INSERT INTO attachments
            (message_id, attachment_type, item_id, item_name, quantity, attachment_data)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(message_id)
    .bind(attachment.attachment_type.as_str())
    .bind(attachment.item_id)
    .bind(&attachment.item_name)
    .bind(attachment.quantity)
    .bind(data)
    .execute(conn)
    .await?;
    Ok(())
}

fn push_mailbox_filter(builder: &mut QueryBuilder<'_, Sqlite>, query: &MailboxQuery) {
    match query.party {
        Party::Recipient => {
            builder.push("recipient_id = ");
            builder.push_bind(query.owner_id);
            builder.push(" AND is_deleted_by_recipient = 0");
        }
        Party::Sender => {
            builder.push("sender_id = ");
            builder.push_bind(query.owner_id);
            builder.push(" AND is_deleted_by_sender = 0");
        }
    }
    if query.unread_only {
        builder.push(" AND is_read = 0");
    }
}

/// Internal struct for mapping database rows to Message.
#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    sender_id: i64,
    recipient_id: i64,
    subject: String,
    body: String,
    is_read: bool,
    read_at: Option<String>,
    is_deleted_by_sender: bool,
    is_deleted_by_recipient: bool,
    created_at: String,
}

impl MessageRow {
    fn into_message(self, attachments: Vec<Attachment>) -> Result<Message> {
        Ok(Message {
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            subject: self.subject,
            body: self.body,
            is_read: self.is_read,
            read_at: self
                .read_at
                .as_deref()
                .map(parse_db_timestamp)
                .transpose()?,
            is_deleted_by_sender: self.is_deleted_by_sender,
            is_deleted_by_recipient: self.is_deleted_by_recipient,
            created_at: parse_db_timestamp(&self.created_at)?,
            attachments,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SentRow {
    id: i64,
    recipient_id: i64,
    subject: String,
    body: String,
    created_at: String,
}

impl SentRow {
    fn into_record(self) -> Result<SentRecord> {
        Ok(SentRecord {
            id: self.id,
            recipient_id: self.recipient_id,
            subject: self.subject,
            body: self.body,
            created_at: parse_db_timestamp(&self.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AttachmentRow {
    id: i64,
    message_id: i64,
    attachment_type: String,
    item_id: Option<i64>,
    item_name: Option<String>,
    quantity: f64,
    attachment_data: Option<String>,
}

impl AttachmentRow {
    fn into_attachment(self) -> Result<Attachment> {
        let attachment_type: AttachmentType = self
            .attachment_type
            .parse()
            .map_err(MailError::Integrity)?;
        let attachment_data = self
            .attachment_data
            .as_deref()
            .map(serde_json::from_str::<AttachmentData>)
            .transpose()
            .map_err(|e| MailError::Integrity(format!("invalid attachment data: {e}")))?;

        Ok(Attachment {
            id: self.id,
            message_id: self.message_id,
            attachment_type,
            item_id: self.item_id,
            item_name: self.item_name,
            quantity: self.quantity,
            attachment_data,
        })
    }
}
