//! Anti-abuse policy for message submission.
//!
//! [`SpamGuard`] is a pure evaluator: given the current time, the
//! candidate message, the recipient account and the sender's recent send
//! history, it decides whether the message may be stored. It never reads
//! or writes the store itself.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::types::SentRecord;
use crate::config::{MailConfig, MAX_WINDOW_SECS};
use crate::db::User;

/// Why a submission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Sender and recipient are the same user.
    SelfSend,
    /// Recipient does not exist or is inactive.
    RecipientInvalid,
    /// The sender's previous message was too recent.
    TooSoon,
    /// The sender hit the per-minute cap.
    MinuteLimit,
    /// The sender hit the per-hour cap.
    HourLimit,
    /// Same subject and body already sent to this recipient recently.
    Duplicate,
}

impl RejectReason {
    /// Stable machine-readable code.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::SelfSend => "self_send",
            RejectReason::RecipientInvalid => "recipient_invalid",
            RejectReason::TooSoon => "too_soon",
            RejectReason::MinuteLimit => "minute_limit",
            RejectReason::HourLimit => "hour_limit",
            RejectReason::Duplicate => "duplicate",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::SelfSend => "cannot send a message to yourself",
            RejectReason::RecipientInvalid => "recipient does not exist or is inactive",
            RejectReason::TooSoon => "sending too fast, wait a few seconds",
            RejectReason::MinuteLimit => "too many messages per minute",
            RejectReason::HourLimit => "too many messages per hour",
            RejectReason::Duplicate => "identical message already sent to this recipient",
        };
        f.write_str(text)
    }
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The message may be stored.
    Admit,
    /// The message must not be stored.
    Reject(RejectReason),
}

impl Verdict {
    /// Check if the message was admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Verdict::Admit)
    }
}

/// Thresholds the guard enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpamPolicy {
    /// Minimum gap between two sends by the same sender.
    pub min_interval: Duration,
    /// Maximum sends within the last minute.
    pub max_per_minute: u32,
    /// Maximum sends within the last hour.
    pub max_per_hour: u32,
    /// Window for identical-content suppression.
    pub duplicate_window: Duration,
}

impl From<&MailConfig> for SpamPolicy {
    fn from(config: &MailConfig) -> Self {
        Self {
            min_interval: window(config.min_interval_secs),
            max_per_minute: config.max_per_minute,
            max_per_hour: config.max_per_hour,
            duplicate_window: window(config.duplicate_window_secs),
        }
    }
}

/// Convert configured seconds to a window, clamped to [`MAX_WINDOW_SECS`].
fn window(secs: u64) -> Duration {
    let max = Duration::seconds(MAX_WINDOW_SECS as i64);
    i64::try_from(secs.min(MAX_WINDOW_SECS))
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(max)
}

impl Default for SpamPolicy {
    fn default() -> Self {
        Self::from(&MailConfig::default())
    }
}

/// A message the sender wants to submit.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Sender user ID.
    pub sender_id: i64,
    /// Recipient user ID.
    pub recipient_id: i64,
    /// Normalized subject.
    pub subject: &'a str,
    /// Normalized body.
    pub body: &'a str,
}

/// Rules in evaluation order.
const RULES: [RejectReason; 6] = [
    RejectReason::SelfSend,
    RejectReason::RecipientInvalid,
    RejectReason::TooSoon,
    RejectReason::MinuteLimit,
    RejectReason::HourLimit,
    RejectReason::Duplicate,
];

/// Stateless submission policy evaluator.
#[derive(Debug, Clone)]
pub struct SpamGuard {
    policy: SpamPolicy,
}

impl SpamGuard {
    /// Create a guard enforcing `policy`.
    pub fn new(policy: SpamPolicy) -> Self {
        Self { policy }
    }

    /// The enforced thresholds.
    pub fn policy(&self) -> &SpamPolicy {
        &self.policy
    }

    /// How far back the caller must load the sender's history.
    pub fn lookback(&self) -> Duration {
        Duration::hours(1)
            .max(self.policy.duplicate_window)
            .max(self.policy.min_interval)
    }

    /// Evaluate the rules in order and stop at the first failure.
    ///
    /// `recipient` is `None` when no such user exists. `history` holds the
    /// sender's own sends, including ones they later deleted.
    pub fn evaluate(
        &self,
        now: DateTime<Utc>,
        candidate: &Candidate<'_>,
        recipient: Option<&User>,
        history: &[SentRecord],
    ) -> Verdict {
        match RULES
            .iter()
            .find(|rule| self.fails(**rule, now, candidate, recipient, history))
        {
            Some(reason) => Verdict::Reject(*reason),
            None => Verdict::Admit,
        }
    }

    /// Evaluate every rule and return all failures in rule order.
    pub fn evaluate_all(
        &self,
        now: DateTime<Utc>,
        candidate: &Candidate<'_>,
        recipient: Option<&User>,
        history: &[SentRecord],
    ) -> Vec<RejectReason> {
        RULES
            .iter()
            .copied()
            .filter(|rule| self.fails(*rule, now, candidate, recipient, history))
            .collect()
    }

    fn fails(
        &self,
        rule: RejectReason,
        now: DateTime<Utc>,
        candidate: &Candidate<'_>,
        recipient: Option<&User>,
        history: &[SentRecord],
    ) -> bool {
        match rule {
            RejectReason::SelfSend => candidate.sender_id == candidate.recipient_id,
            RejectReason::RecipientInvalid => !recipient.is_some_and(User::can_receive_mail),
            RejectReason::TooSoon => too_soon(now, history, self.policy.min_interval),
            RejectReason::MinuteLimit => {
                count_since(now, history, Duration::seconds(60))
                    >= self.policy.max_per_minute as usize
            }
            RejectReason::HourLimit => {
                count_since(now, history, Duration::seconds(3600))
                    >= self.policy.max_per_hour as usize
            }
            RejectReason::Duplicate => {
                is_duplicate(now, candidate, history, self.policy.duplicate_window)
            }
        }
    }
}

/// The most recent send is closer to `now` than `min_interval`.
fn too_soon(now: DateTime<Utc>, history: &[SentRecord], min_interval: Duration) -> bool {
    history
        .iter()
        .map(|record| record.created_at)
        .max()
        .is_some_and(|latest| now - latest < min_interval)
}

/// Sends strictly inside `(now - window, now]`.
fn count_since(now: DateTime<Utc>, history: &[SentRecord], window: Duration) -> usize {
    let cutoff = now - window;
    history
        .iter()
        .filter(|record| record.created_at > cutoff)
        .count()
}

fn is_duplicate(
    now: DateTime<Utc>,
    candidate: &Candidate<'_>,
    history: &[SentRecord],
    window: Duration,
) -> bool {
    let cutoff = now - window;
    history.iter().any(|record| {
        record.created_at > cutoff
            && record.recipient_id == candidate.recipient_id
            && record.subject == candidate.subject
            && record.body == candidate.body
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn user(id: i64, is_active: bool) -> User {
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            hashed_password: "hash".to_string(),
            is_active,
            created_at: now() - Duration::days(30),
        }
    }

    fn sent(id: i64, recipient_id: i64, subject: &str, secs_ago: i64) -> SentRecord {
        SentRecord {
            id,
            recipient_id,
            subject: subject.to_string(),
            body: "body".to_string(),
            created_at: now() - Duration::seconds(secs_ago),
        }
    }

    fn candidate(recipient_id: i64, subject: &str) -> Candidate<'_> {
        Candidate {
            sender_id: 1,
            recipient_id,
            subject,
            body: "body",
        }
    }

    fn guard() -> SpamGuard {
        SpamGuard::new(SpamPolicy::default())
    }

    #[test]
    fn test_admit_with_empty_history() {
        let bob = user(2, true);
        let verdict = guard().evaluate(now(), &candidate(2, "Hi"), Some(&bob), &[]);
        assert_eq!(verdict, Verdict::Admit);
        assert!(verdict.is_admitted());
    }

    #[test]
    fn test_self_send() {
        let alice = user(1, true);
        let verdict = guard().evaluate(now(), &candidate(1, "Hi"), Some(&alice), &[]);
        assert_eq!(verdict, Verdict::Reject(RejectReason::SelfSend));
    }

    #[test]
    fn test_recipient_missing_or_inactive() {
        let verdict = guard().evaluate(now(), &candidate(2, "Hi"), None, &[]);
        assert_eq!(verdict, Verdict::Reject(RejectReason::RecipientInvalid));

        let carol = user(3, false);
        let verdict = guard().evaluate(now(), &candidate(3, "Hi"), Some(&carol), &[]);
        assert_eq!(verdict, Verdict::Reject(RejectReason::RecipientInvalid));
    }

    #[test]
    fn test_too_soon_applies_across_recipients() {
        let bob = user(2, true);
        let history = vec![sent(10, 3, "to carol", 2)];
        let verdict = guard().evaluate(now(), &candidate(2, "Hi"), Some(&bob), &history);
        assert_eq!(verdict, Verdict::Reject(RejectReason::TooSoon));

        let history = vec![sent(10, 3, "to carol", 3)];
        let verdict = guard().evaluate(now(), &candidate(2, "Hi"), Some(&bob), &history);
        assert_eq!(verdict, Verdict::Admit);
    }

    #[test]
    fn test_minute_limit() {
        let bob = user(2, true);
        // 10 sends, 5 seconds apart, the latest 5 seconds ago
        let history: Vec<_> = (0..10)
            .map(|i| sent(i, 2, &format!("s{i}"), 5 + i * 5))
            .collect();
        let verdict = guard().evaluate(now(), &candidate(2, "new"), Some(&bob), &history);
        assert_eq!(verdict, Verdict::Reject(RejectReason::MinuteLimit));

        // One fewer and it passes
        let verdict = guard().evaluate(now(), &candidate(2, "new"), Some(&bob), &history[..9]);
        assert_eq!(verdict, Verdict::Admit);
    }

    #[test]
    fn test_minute_window_boundary_is_exclusive() {
        let bob = user(2, true);
        let mut history: Vec<_> = (0..9)
            .map(|i| sent(i, 2, &format!("s{i}"), 5 + i * 5))
            .collect();
        // Exactly 60 seconds old: outside the window
        history.push(sent(99, 2, "old", 60));
        let verdict = guard().evaluate(now(), &candidate(2, "new"), Some(&bob), &history);
        assert_eq!(verdict, Verdict::Admit);
    }

    #[test]
    fn test_hour_limit() {
        let bob = user(2, true);
        // 50 sends spread over the last hour, none within the last minute
        let history: Vec<_> = (0..50)
            .map(|i| sent(i, 2, &format!("s{i}"), 61 + i * 70))
            .collect();
        let verdict = guard().evaluate(now(), &candidate(2, "new"), Some(&bob), &history);
        assert_eq!(verdict, Verdict::Reject(RejectReason::HourLimit));

        let verdict = guard().evaluate(now(), &candidate(2, "new"), Some(&bob), &history[..49]);
        assert_eq!(verdict, Verdict::Admit);
    }

    #[test]
    fn test_duplicate_same_recipient_only() {
        let bob = user(2, true);
        let carol = user(3, true);
        let history = vec![sent(1, 2, "Hi", 10)];

        let verdict = guard().evaluate(now(), &candidate(2, "Hi"), Some(&bob), &history);
        assert_eq!(verdict, Verdict::Reject(RejectReason::Duplicate));

        let verdict = guard().evaluate(now(), &candidate(3, "Hi"), Some(&carol), &history);
        assert_eq!(verdict, Verdict::Admit);

        let verdict = guard().evaluate(now(), &candidate(2, "Hi again"), Some(&bob), &history);
        assert_eq!(verdict, Verdict::Admit);
    }

    #[test]
    fn test_duplicate_window_expires() {
        let bob = user(2, true);
        let history = vec![sent(1, 2, "Hi", 300)];
        let verdict = guard().evaluate(now(), &candidate(2, "Hi"), Some(&bob), &history);
        assert_eq!(verdict, Verdict::Admit);
    }

    #[test]
    fn test_first_failure_wins_but_all_are_reported() {
        let bob = user(2, true);
        let history: Vec<_> = (0..10).map(|i| sent(i, 2, "Hi", 1 + i)).collect();

        let verdict = guard().evaluate(now(), &candidate(2, "Hi"), Some(&bob), &history);
        assert_eq!(verdict, Verdict::Reject(RejectReason::TooSoon));

        let all = guard().evaluate_all(now(), &candidate(2, "Hi"), Some(&bob), &history);
        assert_eq!(
            all,
            vec![
                RejectReason::TooSoon,
                RejectReason::MinuteLimit,
                RejectReason::Duplicate
            ]
        );
    }

    #[test]
    fn test_custom_policy() {
        let policy = SpamPolicy {
            min_interval: Duration::zero(),
            max_per_minute: 2,
            max_per_hour: 100,
            duplicate_window: Duration::zero(),
        };
        let guard = SpamGuard::new(policy);
        let bob = user(2, true);
        let history = vec![sent(1, 2, "Hi", 0), sent(2, 2, "Hi", 0)];

        let all = guard.evaluate_all(now(), &candidate(2, "Hi"), Some(&bob), &history);
        assert_eq!(all, vec![RejectReason::MinuteLimit]);
    }

    #[test]
    fn test_lookback_covers_every_window() {
        assert_eq!(guard().lookback(), Duration::hours(1));

        let wide = SpamGuard::new(SpamPolicy {
            duplicate_window: Duration::hours(2),
            ..SpamPolicy::default()
        });
        assert_eq!(wide.lookback(), Duration::hours(2));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = SpamPolicy::default();
        assert_eq!(policy.min_interval, Duration::seconds(3));
        assert_eq!(policy.max_per_minute, 10);
        assert_eq!(policy.max_per_hour, 50);
        assert_eq!(policy.duplicate_window, Duration::seconds(300));
    }

    #[test]
    fn test_policy_clamps_oversized_windows() {
        let config = MailConfig {
            min_interval_secs: u64::MAX,
            duplicate_window_secs: 10_000_000_000_000_000,
            ..MailConfig::default()
        };
        let policy = SpamPolicy::from(&config);
        assert_eq!(policy.min_interval, Duration::days(30));
        assert_eq!(policy.duplicate_window, Duration::days(30));
        assert_eq!(SpamGuard::new(policy).lookback(), Duration::days(30));
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(RejectReason::SelfSend.as_str(), "self_send");
        assert_eq!(RejectReason::Duplicate.as_str(), "duplicate");
        assert_eq!(
            serde_json::to_string(&RejectReason::MinuteLimit).unwrap(),
            "\"minute_limit\""
        );
    }
}
