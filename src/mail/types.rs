//! Mail types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length for message subject (in characters).
pub const MAX_SUBJECT_LENGTH: usize = 200;

/// Maximum length for message body (in characters).
pub const MAX_BODY_LENGTH: usize = 10_000;

/// Maximum length for an attached item's display name (in characters).
pub const MAX_ITEM_NAME_LENGTH: usize = 200;

/// Free-form attachment metadata: string keys to primitive JSON values.
pub type AttachmentData = serde_json::Map<String, serde_json::Value>;

/// Kind of thing attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentType {
    /// An inventory item.
    Item,
    /// A soft currency.
    Currency,
    /// Gold.
    Gold,
}

impl AttachmentType {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentType::Item => "item",
            AttachmentType::Currency => "currency",
            AttachmentType::Gold => "gold",
        }
    }
}

impl fmt::Display for AttachmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttachmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "item" => Ok(AttachmentType::Item),
            "currency" => Ok(AttachmentType::Currency),
            "gold" => Ok(AttachmentType::Gold),
            _ => Err(format!("unknown attachment type: {s}")),
        }
    }
}

/// The two roles a user can hold on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    /// The user who sent the message.
    Sender,
    /// The user the message was sent to.
    Recipient,
}

/// A stored attachment. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    /// Attachment ID.
    pub id: i64,
    /// Owning message ID.
    pub message_id: i64,
    /// Attachment kind.
    pub attachment_type: AttachmentType,
    /// Game item ID, if any.
    pub item_id: Option<i64>,
    /// Game item display name, if any.
    pub item_name: Option<String>,
    /// Amount attached.
    pub quantity: f64,
    /// Opaque metadata passed through to the game.
    pub attachment_data: Option<AttachmentData>,
}

/// An attachment to be created together with a message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewAttachment {
    /// Attachment kind.
    pub attachment_type: AttachmentType,
    /// Game item ID, if any.
    #[serde(default)]
    pub item_id: Option<i64>,
    /// Game item display name, if any.
    #[serde(default)]
    pub item_name: Option<String>,
    /// Amount attached.
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    /// Opaque metadata.
    #[serde(default)]
    pub attachment_data: Option<AttachmentData>,
}

fn default_quantity() -> f64 {
    1.0
}

impl NewAttachment {
    /// Create an attachment of the given kind with quantity 1.
    pub fn new(attachment_type: AttachmentType) -> Self {
        Self {
            attachment_type,
            item_id: None,
            item_name: None,
            quantity: default_quantity(),
            attachment_data: None,
        }
    }

    /// Attach a specific game item.
    pub fn with_item(mut self, item_id: i64, item_name: impl Into<String>) -> Self {
        self.item_id = Some(item_id);
        self.item_name = Some(item_name.into());
        self
    }

    /// Set the quantity.
    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = quantity;
        self
    }

    /// Set the metadata.
    pub fn with_data(mut self, data: AttachmentData) -> Self {
        self.attachment_data = Some(data);
        self
    }
}

/// A stored message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Message ID.
    pub id: i64,
    /// Sender user ID.
    pub sender_id: i64,
    /// Recipient user ID.
    pub recipient_id: i64,
    /// Message subject.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// Whether the recipient has read the message.
    pub is_read: bool,
    /// When the recipient first read the message. Set iff `is_read`.
    pub read_at: Option<DateTime<Utc>>,
    /// Whether the sender has deleted the message from their view.
    pub is_deleted_by_sender: bool,
    /// Whether the recipient has deleted the message from their view.
    pub is_deleted_by_recipient: bool,
    /// When the message was stored.
    pub created_at: DateTime<Utc>,
    /// Attached items and currency.
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// The role `user_id` holds on this message, if any.
    pub fn party_of(&self, user_id: i64) -> Option<Party> {
        if self.sender_id == user_id {
            Some(Party::Sender)
        } else if self.recipient_id == user_id {
            Some(Party::Recipient)
        } else {
            None
        }
    }

    /// Check if the message is visible to the sender.
    pub fn is_visible_to_sender(&self) -> bool {
        !self.is_deleted_by_sender
    }

    /// Check if the message is visible to the recipient.
    pub fn is_visible_to_recipient(&self) -> bool {
        !self.is_deleted_by_recipient
    }

    /// Check if the message is visible to the given party.
    pub fn is_visible_to(&self, party: Party) -> bool {
        match party {
            Party::Sender => self.is_visible_to_sender(),
            Party::Recipient => self.is_visible_to_recipient(),
        }
    }

    /// A message hidden from both parties may be physically purged.
    pub fn can_be_purged(&self) -> bool {
        self.is_deleted_by_sender && self.is_deleted_by_recipient
    }
}

/// New message for creation.
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Sender user ID.
    pub sender_id: i64,
    /// Recipient user ID.
    pub recipient_id: i64,
    /// Message subject.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    /// Create a new message.
    pub fn new(
        sender_id: i64,
        recipient_id: i64,
        subject: impl Into<String>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sender_id,
            recipient_id,
            subject: subject.into(),
            body: body.into(),
            created_at,
        }
    }
}

/// One of a sender's recent sends, as seen by the anti-abuse rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    /// Message ID.
    pub id: i64,
    /// Recipient user ID.
    pub recipient_id: i64,
    /// Message subject.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// When the message was stored.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> Message {
        Message {
            id: 1,
            sender_id: 1,
            recipient_id: 2,
            subject: "Test".to_string(),
            body: "Body".to_string(),
            is_read: false,
            read_at: None,
            is_deleted_by_sender: false,
            is_deleted_by_recipient: false,
            created_at: Utc::now(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_attachment_type_round_trip() {
        for t in [
            AttachmentType::Item,
            AttachmentType::Currency,
            AttachmentType::Gold,
        ] {
            assert_eq!(t.as_str().parse::<AttachmentType>().unwrap(), t);
        }
        assert_eq!(
            "GOLD".parse::<AttachmentType>().unwrap(),
            AttachmentType::Gold
        );
        assert!("pet".parse::<AttachmentType>().is_err());
    }

    #[test]
    fn test_new_attachment_defaults() {
        let attachment = NewAttachment::new(AttachmentType::Gold);
        assert_eq!(attachment.quantity, 1.0);
        assert!(attachment.item_id.is_none());
        assert!(attachment.attachment_data.is_none());

        let item = NewAttachment::new(AttachmentType::Item)
            .with_item(123, "Sword of Dawn")
            .with_quantity(2.0);
        assert_eq!(item.item_id, Some(123));
        assert_eq!(item.item_name.as_deref(), Some("Sword of Dawn"));
        assert_eq!(item.quantity, 2.0);
    }

    #[test]
    fn test_new_attachment_deserialize_default_quantity() {
        let attachment: NewAttachment =
            serde_json::from_str(r#"{"attachment_type": "item", "item_id": 7}"#).unwrap();
        assert_eq!(attachment.attachment_type, AttachmentType::Item);
        assert_eq!(attachment.item_id, Some(7));
        assert_eq!(attachment.quantity, 1.0);

        let unknown = serde_json::from_str::<NewAttachment>(r#"{"attachment_type": "pet"}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn test_party_of() {
        let message = sample_message();
        assert_eq!(message.party_of(1), Some(Party::Sender));
        assert_eq!(message.party_of(2), Some(Party::Recipient));
        assert_eq!(message.party_of(3), None);
    }

    #[test]
    fn test_visibility_is_per_party() {
        let message = Message {
            is_deleted_by_sender: true,
            ..sample_message()
        };
        assert!(!message.is_visible_to(Party::Sender));
        assert!(message.is_visible_to(Party::Recipient));

        let message = Message {
            is_deleted_by_recipient: true,
            ..sample_message()
        };
        assert!(message.is_visible_to(Party::Sender));
        assert!(!message.is_visible_to(Party::Recipient));
    }

    #[test]
    fn test_message_can_be_purged() {
        let message = sample_message();
        assert!(!message.can_be_purged());

        let sender_deleted = Message {
            is_deleted_by_sender: true,
            ..message.clone()
        };
        assert!(!sender_deleted.can_be_purged());

        let both_deleted = Message {
            is_deleted_by_sender: true,
            is_deleted_by_recipient: true,
            ..message
        };
        assert!(both_deleted.can_be_purged());
    }
}
