//! Error types for shared schema context construction

use std::fmt;

use thiserror::Error;

use crate::sql::definition::{IdentifierKind, SqlDefinition};

/// Request rule that a [`SharedSchemaContextError::InvalidRequest`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRule {
    /// Same-tenant foreign key constraint references unregistered tables or mismatched columns
    ForeignKeyMapping,
    /// Table registered for tenant column creation has no column definition
    TenantColumnTableMapping,
    /// Table skipped for default value generation has no tenant column
    SkippedDefaultValueTable,
    /// Configured identifier length bounds are inconsistent
    IdentifierLengthBounds,
}

impl fmt::Display for RequestRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestRule::ForeignKeyMapping => "foreign key mapping",
            RequestRule::TenantColumnTableMapping => "tenant column table mapping",
            RequestRule::SkippedDefaultValueTable => "skipped default value table",
            RequestRule::IdentifierLengthBounds => "identifier length bounds",
        };
        f.write_str(name)
    }
}

/// Single identifier rejected by a SQL definitions validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlDefinitionViolation {
    /// Offending identifier
    pub identifier: String,
    /// What the identifier names (function, constraint, policy)
    pub kind: IdentifierKind,
    /// Index of the defining artifact in the produced definitions
    pub definition_index: usize,
    /// Human readable reason
    pub message: String,
}

impl fmt::Display for SqlDefinitionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' (definition {}): {}",
            self.kind, self.identifier, self.definition_index, self.message
        )
    }
}

fn format_violations(violations: &[SqlDefinitionViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur while building a shared schema context
#[derive(Debug, Error)]
pub enum SharedSchemaContextError {
    #[error("Invalid request ({rule}): {message}")]
    InvalidRequest { rule: RequestRule, message: String },

    /// Generation completed but produced identifiers were rejected.
    /// `definitions` holds everything that would have been produced.
    #[error("Invalid SQL definitions: {}", format_violations(.violations))]
    InvalidSqlDefinitions {
        violations: Vec<SqlDefinitionViolation>,
        definitions: Vec<SqlDefinition>,
    },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SharedSchemaContextError {
    pub fn invalid_request(rule: RequestRule, msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            rule,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Rule violated by the request, if this is a request violation
    pub fn request_rule(&self) -> Option<RequestRule> {
        match self {
            Self::InvalidRequest { rule, .. } => Some(*rule),
            _ => None,
        }
    }

    /// Whether this error signals a defect rather than a user mistake
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

pub type Result<T> = std::result::Result<T, SharedSchemaContextError>;
