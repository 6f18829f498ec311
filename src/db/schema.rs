//! Database schema and migrations.
//!
//! Migrations are applied in order when the database is opened; the
//! `schema_version` table records which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: users (owned by the identity subsystem; the mail core only reads them)
    r#"
CREATE TABLE users (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    username         TEXT NOT NULL UNIQUE,
    email            TEXT NOT NULL UNIQUE,
    hashed_password  TEXT NOT NULL,
    is_active        INTEGER NOT NULL DEFAULT 1,
    created_at       TEXT NOT NULL
);
"#,
    // v2: messages with independent per-party soft-delete flags
    r#"
CREATE TABLE messages (
    id                       INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id                INTEGER NOT NULL REFERENCES users(id),
    recipient_id             INTEGER NOT NULL REFERENCES users(id),
    subject                  TEXT NOT NULL,
    body                     TEXT NOT NULL,
    is_read                  INTEGER NOT NULL DEFAULT 0,
    is_deleted_by_sender     INTEGER NOT NULL DEFAULT 0,
    is_deleted_by_recipient  INTEGER NOT NULL DEFAULT 0,
    created_at               TEXT NOT NULL,
    read_at                  TEXT,
    CHECK (sender_id <> recipient_id),
    CHECK ((is_read = 0 AND read_at IS NULL) OR (is_read = 1 AND read_at IS NOT NULL))
);

CREATE INDEX idx_messages_sender_id ON messages(sender_id);
CREATE INDEX idx_messages_recipient_id ON messages(recipient_id);
CREATE INDEX idx_messages_is_read ON messages(is_read);
CREATE INDEX idx_messages_created_at ON messages(created_at);
CREATE INDEX idx_messages_recipient_read ON messages(recipient_id, is_read);
CREATE INDEX idx_messages_sender_created ON messages(sender_id, created_at);
"#,
    // v3: attachments live and die with their message
    r#"
CREATE TABLE attachments (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id       INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
    attachment_type  TEXT NOT NULL,
    item_id          INTEGER,
    item_name        TEXT,
    quantity         REAL NOT NULL DEFAULT 1.0 CHECK (quantity >= 0),
    attachment_data  TEXT
);

CREATE INDEX idx_attachments_message_id ON attachments(message_id);
"#,
];
