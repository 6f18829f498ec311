//! Test helpers for integration tests.
//!
//! Provides an in-memory database, a service driven by a manual clock and
//! user creation helpers.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use gamemail::db::{NewUser, UserRepository};
use gamemail::{Config, Database, MailService, ManualClock};

/// A service wired to a fresh in-memory database.
pub struct TestMail {
    pub db: Arc<Database>,
    pub service: Arc<MailService>,
    pub clock: ManualClock,
}

impl TestMail {
    /// Set up with the default configuration.
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    /// Set up with a custom configuration.
    pub async fn with_config(config: Config) -> Self {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let service = Arc::new(MailService::with_clock(
            Arc::clone(&db),
            &config,
            Arc::new(clock.clone()),
        ));
        Self { db, service, clock }
    }

    /// Create an active user and return the user ID.
    pub async fn user(&self, username: &str) -> i64 {
        self.create_user(username, true).await
    }

    /// Create an inactive user and return the user ID.
    pub async fn inactive_user(&self, username: &str) -> i64 {
        self.create_user(username, false).await
    }

    async fn create_user(&self, username: &str, is_active: bool) -> i64 {
        let new_user = NewUser::new(username, format!("{username}@example.com"), "hash")
            .with_active(is_active);
        UserRepository::new(self.db.pool())
            .create(&new_user)
            .await
            .unwrap()
            .id
    }
}
