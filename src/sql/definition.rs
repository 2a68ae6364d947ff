//! SQL definition value type
//!
//! Every producer returns a [`SqlDefinition`]: the DDL that applies a change,
//! the DDL that removes it again and a list of queries that check whether the
//! change is present.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Checking statement used when a caller does not supply one
pub const DEFAULT_CHECKING_STATEMENT: &str = "SELECT 1";

/// What a generated identifier names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Function,
    Constraint,
    Policy,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Function => f.write_str("function"),
            IdentifierKind::Constraint => f.write_str("constraint"),
            IdentifierKind::Policy => f.write_str("policy"),
        }
    }
}

/// Identifier created by a definition's create script
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefinedIdentifier {
    pub kind: IdentifierKind,
    pub name: String,
}

/// Generated change: create script, drop script and checking statements
///
/// Checking statements are single-value queries. A positive number means the
/// create script was probably applied; it is not a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlDefinition {
    create_script: String,
    drop_script: String,
    checking_statements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identifier: Option<DefinedIdentifier>,
}

impl SqlDefinition {
    pub fn new(
        create_script: impl Into<String>,
        drop_script: impl Into<String>,
        checking_statements: Vec<String>,
    ) -> Self {
        Self {
            create_script: create_script.into(),
            drop_script: drop_script.into(),
            checking_statements,
            identifier: None,
        }
    }

    /// Definition with only a create script; drop and check default to `SELECT 1`
    pub fn from_create_script(create_script: impl Into<String>) -> Self {
        Self::new(
            create_script,
            DEFAULT_CHECKING_STATEMENT,
            vec![DEFAULT_CHECKING_STATEMENT.to_string()],
        )
    }

    /// Attach the identifier this definition creates
    pub fn with_identifier(mut self, kind: IdentifierKind, name: impl Into<String>) -> Self {
        self.identifier = Some(DefinedIdentifier {
            kind,
            name: name.into(),
        });
        self
    }

    pub fn create_script(&self) -> &str {
        &self.create_script
    }

    pub fn drop_script(&self) -> &str {
        &self.drop_script
    }

    pub fn checking_statements(&self) -> &[String] {
        &self.checking_statements
    }

    pub fn identifier(&self) -> Option<&DefinedIdentifier> {
        self.identifier.as_ref()
    }
}
