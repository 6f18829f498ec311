//! User model.
//!
//! Users belong to the identity subsystem. The mail core reads their
//! existence and active flag, and resolves usernames for display.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered player account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login username (unique).
    pub username: String,
    /// Email address (unique).
    pub email: String,
    /// Credential hash produced by the identity subsystem.
    #[serde(skip_serializing)]
    pub hashed_password: String,
    /// Whether the account is active. Inactive users cannot receive mail.
    pub is_active: bool,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether this account may receive mail.
    pub fn can_receive_mail(&self) -> bool {
        self.is_active
    }
}

/// New user for creation.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Already hashed credential.
    pub hashed_password: String,
    /// Whether the account starts active.
    pub is_active: bool,
}

impl NewUser {
    /// Create a new active user.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        hashed_password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            hashed_password: hashed_password.into(),
            is_active: true,
        }
    }

    /// Set the initial active flag.
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}
