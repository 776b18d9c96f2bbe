//! Event severity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::UnknownVariant;

/// How urgent an outbound event is.
///
/// Ordered `Info < Warning < Urgent < Critical`. Stored as a small integer so
/// that minimum-severity filters compare on the order, never lexically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info = 0,
    Warning = 1,
    Urgent = 2,
    Critical = 3,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Info, Self::Warning, Self::Urgent, Self::Critical];

    /// Convert from the stored integer. Returns `None` for unknown values.
    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            0 => Some(Self::Info),
            1 => Some(Self::Warning),
            2 => Some(Self::Urgent),
            3 => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_i16(self) -> i16 {
        self as i16
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Urgent => "urgent",
            Self::Critical => "critical",
        }
    }

    /// Whether an event of this severity passes a policy's optional minimum.
    pub fn meets(self, minimum: Option<Severity>) -> bool {
        minimum.is_none_or(|min| self >= min)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "severity",
                value: s.to_owned(),
            })
    }
}
