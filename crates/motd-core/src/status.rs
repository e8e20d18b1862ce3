//! Operator health model reported to the host platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health of the operator after its last reconciliation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorHealth {
    /// Nothing has been reconciled yet.
    Unknown,
    /// Waiting on something outside the operator (e.g. the supervisor).
    Waiting,
    /// The service layer is declared and the supervisor has converged.
    Active,
    /// Needs operator intervention, usually configuration.
    Blocked,
    /// The last reconciliation attempt failed.
    Error,
}

impl OperatorHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Blocked => "blocked",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for OperatorHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Health plus the human-readable context shown next to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitStatus {
    pub health: OperatorHealth,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub since: DateTime<Utc>,
}

impl UnitStatus {
    pub fn new(health: OperatorHealth, message: impl Into<String>) -> Self {
        Self {
            health,
            message: message.into(),
            since: Utc::now(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(OperatorHealth::Unknown, "")
    }

    pub fn active() -> Self {
        Self::new(OperatorHealth::Active, "")
    }

    pub fn waiting(message: impl Into<String>) -> Self {
        Self::new(OperatorHealth::Waiting, message)
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(OperatorHealth::Blocked, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(OperatorHealth::Error, message)
    }

    /// Status describing a failed reconciliation.
    ///
    /// Configuration problems are shown to the user as-is, without the
    /// error-kind prefix.
    pub fn from_error(err: &crate::Error) -> Self {
        match err {
            crate::Error::InvalidConfig(msg) => Self::new(err.health(), msg.clone()),
            _ => Self::new(err.health(), err.to_string()),
        }
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.health)
        } else {
            write!(f, "{}: {}", self.health, self.message)
        }
    }
}
