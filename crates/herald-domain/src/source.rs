//! Producing subsystem and event kind of an outbound event.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::UnknownVariant;

/// Subsystem that raised an outbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Import,
    Workflow,
    Billing,
    Integration,
    Platform,
}

impl Service {
    pub const ALL: [Service; 5] = [
        Self::Import,
        Self::Workflow,
        Self::Billing,
        Self::Integration,
        Self::Platform,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Workflow => "workflow",
            Self::Billing => "billing",
            Self::Integration => "integration",
            Self::Platform => "platform",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "service",
                value: s.to_owned(),
            })
    }
}

/// Kind of thing that happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    ImportFailed,
    ImportCompleted,
    WorkflowStuck,
    WorkflowFailed,
    SagaCompensated,
    PaymentFailed,
    SyncFailed,
    SystemAlert,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Self::ImportFailed,
        Self::ImportCompleted,
        Self::WorkflowStuck,
        Self::WorkflowFailed,
        Self::SagaCompensated,
        Self::PaymentFailed,
        Self::SyncFailed,
        Self::SystemAlert,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImportFailed => "import_failed",
            Self::ImportCompleted => "import_completed",
            Self::WorkflowStuck => "workflow_stuck",
            Self::WorkflowFailed => "workflow_failed",
            Self::SagaCompensated => "saga_compensated",
            Self::PaymentFailed => "payment_failed",
            Self::SyncFailed => "sync_failed",
            Self::SystemAlert => "system_alert",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "topic",
                value: s.to_owned(),
            })
    }
}
