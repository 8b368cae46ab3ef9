//! Error handling for the execution planner
//!
//! Compilation is all-or-nothing: a `PlanError` means no plan was built.
//! Degraded-but-recoverable conditions (skipped lines, uncatalogued resources)
//! are not errors; they travel on the plan as [`PlanDiagnostic`] values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal compilation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Circular dependency detected at attribute '{attribute}': {chain}")]
    CircularDependency { attribute: String, chain: String },

    #[error("Phase construction failed: {message}")]
    PhaseConstruction { message: String },
}

impl PlanError {
    pub(crate) fn phase(message: impl Into<String>) -> Self {
        PlanError::PhaseConstruction {
            message: message.into(),
        }
    }

    /// Attribute named by a circular dependency error
    pub fn offending_attribute(&self) -> Option<&str> {
        match self {
            PlanError::CircularDependency { attribute, .. } => Some(attribute),
            PlanError::PhaseConstruction { .. } => None,
        }
    }
}

/// Result alias for plan compilation
pub type PlanResult<T> = Result<T, PlanError>;

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid verb name '{verb}': expected domain.action")]
    InvalidVerbName { verb: String },

    #[error("Strength weight {weight} for pattern '{pattern}' is outside 1..=10")]
    StrengthOutOfRange { pattern: String, weight: u8 },

    #[error(
        "Duration {duration_ms}ms for '{name}' plus domain overhead {overhead_ms}ms exceeds the sequential baseline of {baseline_ms}ms"
    )]
    DurationExceedsBaseline {
        name: String,
        duration_ms: u64,
        overhead_ms: u64,
        baseline_ms: u64,
    },

    #[error("Resource '{resource}' names unknown creation verb '{verb}'")]
    UnknownCreationVerb { resource: String, verb: String },
}

/// Kind of a non-fatal planning diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    /// A line did not match the `(domain.action ...)` shape and was skipped.
    ParseSkip,
    /// A resource-creation verb had no catalog entry; enrichment was omitted.
    UnknownResourceType,
}

/// Informational diagnostic collected during compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDiagnostic {
    pub kind: DiagnosticKind,
    /// 1-based source line, when the diagnostic points at one
    pub line: Option<usize>,
    pub message: String,
}

impl PlanDiagnostic {
    pub fn parse_skip(line: usize, content: &str) -> Self {
        Self {
            kind: DiagnosticKind::ParseSkip,
            line: Some(line),
            message: format!("Line {} is not a verb invocation: '{}'", line, content),
        }
    }

    pub fn unknown_resource(line: usize, verb: &str, resource_type: &str) -> Self {
        Self {
            kind: DiagnosticKind::UnknownResourceType,
            line: Some(line),
            message: format!(
                "Verb '{}' creates resource '{}' which has no catalog entry",
                verb, resource_type
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_display() {
        let err = PlanError::CircularDependency {
            attribute: "a".into(),
            chain: "a -> b -> a".into(),
        };
        assert_eq!(
            err.to_string(),
            "Circular dependency detected at attribute 'a': a -> b -> a"
        );
        assert_eq!(err.offending_attribute(), Some("a"));
    }

    #[test]
    fn test_phase_error_has_no_attribute() {
        let err = PlanError::phase("levels not contiguous");
        assert!(err.offending_attribute().is_none());
        assert!(err.to_string().contains("levels not contiguous"));
    }

    #[test]
    fn test_diagnostic_serializes_kind() {
        let diag = PlanDiagnostic::parse_skip(3, "not a verb");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["kind"], "PARSE_SKIP");
        assert_eq!(json["line"], 3);
    }
}
