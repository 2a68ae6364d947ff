//! SQL definition validators

use crate::error::{RequestRule, Result, SharedSchemaContextError, SqlDefinitionViolation};
use crate::request::SharedSchemaContextRequest;
use crate::sql::definition::SqlDefinition;
use crate::validators::SqlDefinitionsValidator;

/// Rejects identifiers whose byte length falls outside `min..=max`
///
/// PostgreSQL silently truncates identifiers longer than 63 bytes, so two
/// long names sharing a prefix would collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierLengthValidator {
    min: usize,
    max: usize,
}

impl IdentifierLengthValidator {
    pub fn new(min: usize, max: usize) -> Result<Self> {
        if min == 0 {
            return Err(SharedSchemaContextError::invalid_request(
                RequestRule::IdentifierLengthBounds,
                "identifier minimum length must be at least 1",
            ));
        }
        if min > max {
            return Err(SharedSchemaContextError::invalid_request(
                RequestRule::IdentifierLengthBounds,
                format!(
                    "identifier minimum length {} is greater than maximum length {}",
                    min, max
                ),
            ));
        }
        Ok(Self { min, max })
    }

    pub fn from_request(request: &SharedSchemaContextRequest) -> Result<Self> {
        Self::new(request.identifier_min_length, request.identifier_max_length)
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

impl SqlDefinitionsValidator for IdentifierLengthValidator {
    fn validate(&self, definitions: &[SqlDefinition]) -> Vec<SqlDefinitionViolation> {
        definitions
            .iter()
            .enumerate()
            .filter_map(|(index, definition)| Some((index, definition.identifier()?)))
            .filter_map(|(index, defined)| {
                let length = defined.name.len();
                let message = if length > self.max {
                    format!("length {} exceeds maximum {}", length, self.max)
                } else if length < self.min {
                    format!("length {} is below minimum {}", length, self.min)
                } else {
                    return None;
                };
                Some(SqlDefinitionViolation {
                    identifier: defined.name.clone(),
                    kind: defined.kind,
                    definition_index: index,
                    message,
                })
            })
            .collect()
    }
}
