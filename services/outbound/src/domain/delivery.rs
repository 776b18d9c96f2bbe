//! Delivery state machine.
//!
//! `Pending → Processing → Delivered | Failed | Bounced`, with `Failed`
//! re-entering `Processing` through the retry sweep until the attempt cap.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use herald_domain::UnknownVariant;
use herald_domain::channel::{Channel, RecipientRole};

use crate::domain::types::RoutingPolicy;
use crate::error::OutboundError;

/// Attempts after which a failed delivery is no longer rescheduled.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Wait before retrying after the given attempt failed: 2^attempt minutes.
pub fn retry_backoff(attempt: u32) -> Duration {
    Duration::minutes(1_i64 << attempt.min(16))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Processing,
    Delivered,
    Failed,
    Bounced,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Delivered,
        Self::Failed,
        Self::Bounced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Bounced => "bounced",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "delivery status",
                value: s.to_owned(),
            })
    }
}

/// Current state of a delivery. Timestamps and retry scheduling live only on
/// the variants they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Processing {
        started_at: DateTime<Utc>,
    },
    Delivered {
        delivered_at: DateTime<Utc>,
    },
    Failed {
        failed_at: DateTime<Utc>,
        error: String,
        /// `None` once the attempt cap is reached.
        next_retry_at: Option<DateTime<Utc>>,
    },
    Bounced {
        bounced_at: DateTime<Utc>,
        error: Option<String>,
    },
}

impl DeliveryState {
    pub fn status(&self) -> DeliveryStatus {
        match self {
            Self::Pending => DeliveryStatus::Pending,
            Self::Processing { .. } => DeliveryStatus::Processing,
            Self::Delivered { .. } => DeliveryStatus::Delivered,
            Self::Failed { .. } => DeliveryStatus::Failed,
            Self::Bounced { .. } => DeliveryStatus::Bounced,
        }
    }

    pub fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Failed { next_retry_at, .. } => *next_retry_at,
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Bounced { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

/// Outcome reported by a channel sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed { error: String },
    Bounced { error: Option<String> },
}

/// Result of applying an event to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// Nothing changed; the reason is for logs.
    Ignored(&'static str),
}

impl Transition {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// One tracked hand-off of an event to one contact over one channel.
#[derive(Debug, Clone)]
pub struct OutboundDelivery {
    pub id: Uuid,
    pub event_id: Uuid,
    pub policy_id: Uuid,
    pub contact_id: Uuid,
    pub channel: Channel,
    pub role: RecipientRole,
    /// Only ever increases.
    pub attempt_count: u32,
    pub state: DeliveryState,
    pub sent_at: Option<DateTime<Utc>>,
    pub external_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboundDelivery {
    pub fn pending(
        event_id: Uuid,
        policy: &RoutingPolicy,
        contact_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_id,
            policy_id: policy.id,
            contact_id,
            channel: policy.channel,
            role: policy.role,
            attempt_count: 0,
            state: DeliveryState::Pending,
            sent_at: None,
            external_message_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> DeliveryStatus {
        self.state.status()
    }

    /// Failed, not exhausted, and its retry time has come.
    pub fn is_due_for_retry(&self, now: DateTime<Utc>) -> bool {
        self.attempt_count < MAX_DELIVERY_ATTEMPTS
            && self.state.next_retry_at().is_some_and(|at| at <= now)
    }

    /// A sender starts working on the delivery.
    ///
    /// Already `Processing` is a no-op so competing consumers of the same
    /// message do not double-count the attempt.
    pub fn begin_attempt(&mut self, now: DateTime<Utc>) -> Transition {
        match self.state {
            DeliveryState::Pending => {
                self.enter_processing(now);
                Transition::Applied
            }
            DeliveryState::Processing { .. } => Transition::Ignored("already processing"),
            DeliveryState::Failed { .. } => {
                Transition::Ignored("failed deliveries are claimed by the retry sweep")
            }
            DeliveryState::Delivered { .. } | DeliveryState::Bounced { .. } => {
                Transition::Ignored("delivery is terminal")
            }
        }
    }

    /// Retry sweep pick-up: `Failed` with a due retry re-enters `Processing`.
    pub fn claim_retry(&mut self, now: DateTime<Utc>) -> Transition {
        if !self.is_due_for_retry(now) {
            return Transition::Ignored("not due for retry");
        }
        self.enter_processing(now);
        Transition::Applied
    }

    /// Apply a sender's outcome report.
    ///
    /// A report against `Pending` means the sender skipped `begin_attempt`;
    /// it still counts as an attempt. Reports against `Failed`, `Bounced` or
    /// `Delivered` are late duplicates and ignored, except that a hard bounce
    /// may arrive after `Delivered`.
    pub fn record_outcome(
        &mut self,
        outcome: DeliveryOutcome,
        external_message_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Transition {
        match (&self.state, &outcome) {
            (DeliveryState::Pending, _) => self.attempt_count += 1,
            (DeliveryState::Processing { .. }, _) => {}
            (DeliveryState::Delivered { .. }, DeliveryOutcome::Bounced { .. }) => {}
            (DeliveryState::Delivered { .. }, _) => {
                return Transition::Ignored("delivery already delivered");
            }
            (DeliveryState::Failed { .. }, _) => {
                return Transition::Ignored("delivery already failed");
            }
            (DeliveryState::Bounced { .. }, _) => {
                return Transition::Ignored("delivery already bounced");
            }
        }

        if external_message_id.is_some() {
            self.external_message_id = external_message_id;
        }
        self.state = match outcome {
            DeliveryOutcome::Delivered => {
                self.sent_at.get_or_insert(now);
                DeliveryState::Delivered { delivered_at: now }
            }
            DeliveryOutcome::Failed { error } => {
                let next_retry_at = (self.attempt_count < MAX_DELIVERY_ATTEMPTS)
                    .then(|| now + retry_backoff(self.attempt_count));
                DeliveryState::Failed {
                    failed_at: now,
                    error,
                    next_retry_at,
                }
            }
            DeliveryOutcome::Bounced { error } => DeliveryState::Bounced {
                bounced_at: now,
                error,
            },
        };
        self.updated_at = now;
        Transition::Applied
    }

    /// Operator re-queue: `Failed` (exhausted or not) back to `Pending`.
    /// `attempt_count` is kept.
    pub fn requeue(&mut self, now: DateTime<Utc>) -> Result<(), OutboundError> {
        if !matches!(self.state, DeliveryState::Failed { .. }) {
            return Err(OutboundError::DeliveryNotRetriable);
        }
        self.state = DeliveryState::Pending;
        self.updated_at = now;
        Ok(())
    }

    fn enter_processing(&mut self, now: DateTime<Utc>) {
        self.attempt_count += 1;
        self.state = DeliveryState::Processing { started_at: now };
        self.updated_at = now;
    }
}
