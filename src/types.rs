use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

use crate::errors::DebuggerError;
use crate::interpreter::Cursor;

pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const MAX_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MEMORY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Initialized,
    Running,
    Paused,
    Completed,
    Error,
}

impl ExecutionStatus {
    /// Terminal until the next reset
    pub fn is_final(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Error)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Initialized => "initialized",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Paused => "paused",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(s)
    }
}

impl FromStr for RiskLevel {
    type Err = DebuggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(DebuggerError::Validation(format!(
                "Invalid risk level: {}. Must be one of: low, medium, high",
                other
            ))),
        }
    }
}

/// Per-session execution options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionOptions {
    pub debug_mode: bool,
    pub timeout_ms: u64,
    /// Cap on the combined stdout/stderr bytes of a single command
    pub memory_limit_bytes: usize,
    pub auto_continue: bool,
    /// `low` is safe mode: high-risk commands are refused
    pub risk_level: RiskLevel,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            debug_mode: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            auto_continue: false,
            risk_level: RiskLevel::Medium,
        }
    }
}

impl SessionOptions {
    pub fn validate(&self) -> Result<(), DebuggerError> {
        if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(DebuggerError::Validation(format!(
                "timeout_ms must be between {} and {}, got {}",
                MIN_TIMEOUT_MS, MAX_TIMEOUT_MS, self.timeout_ms
            )));
        }
        if self.memory_limit_bytes == 0 {
            return Err(DebuggerError::Validation(
                "memory_limit_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Output of the external semantic analysis pass. Only used for reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Analysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_summary: Option<RiskSummary>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskSummary {
    pub overall: RiskLevel,
    #[serde(default)]
    pub high_risk_steps: Vec<String>,
}

/// One debug command received by a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonValue>,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub program_name: String,
    pub status: ExecutionStatus,
    pub current_step: Option<Cursor>,
    pub steps_executed: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_risk: Option<RiskLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        assert!(SessionOptions::default().validate().is_ok());
    }

    #[test]
    fn test_timeout_bounds() {
        let too_short = SessionOptions {
            timeout_ms: 999,
            ..Default::default()
        };
        assert!(matches!(
            too_short.validate(),
            Err(DebuggerError::Validation(_))
        ));

        let too_long = SessionOptions {
            timeout_ms: 300_001,
            ..Default::default()
        };
        assert!(too_long.validate().is_err());

        let edge = SessionOptions {
            timeout_ms: 300_000,
            ..Default::default()
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: SessionOptions =
            serde_json::from_str(r#"{"risk_level": "low"}"#).unwrap();
        assert_eq!(options.risk_level, RiskLevel::Low);
        assert_eq!(options.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(options.debug_mode);
    }

    #[test]
    fn test_risk_level_parse() {
        assert_eq!("HIGH".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert!("extreme".parse::<RiskLevel>().is_err());
    }
}
