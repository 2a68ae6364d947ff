//! Request and SQL definition validators
//!
//! Request validators run before generation and reject inconsistent
//! requests. SQL definition validators run on the complete output and
//! report every offending identifier.

pub mod definitions;
pub mod request;

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, SqlDefinitionViolation};
use crate::request::SharedSchemaContextRequest;
use crate::sql::definition::SqlDefinition;

pub use definitions::IdentifierLengthValidator;
pub use request::{
    CreateTenantColumnTableMappingValidator, ForeignKeysMappingValidator,
    SkippedDefaultValueTablesValidator,
};

/// Rejects a request before any SQL is generated
pub trait SharedSchemaContextRequestValidator: fmt::Debug + Send + Sync {
    fn validate(&self, request: &SharedSchemaContextRequest) -> Result<()>;
}

/// Inspects the generated definitions; an empty result means they are accepted
pub trait SqlDefinitionsValidator: fmt::Debug + Send + Sync {
    fn validate(&self, definitions: &[SqlDefinition]) -> Vec<SqlDefinitionViolation>;
}

/// Request validators run by default, in order
pub fn default_request_validators() -> Vec<Arc<dyn SharedSchemaContextRequestValidator>> {
    vec![
        Arc::new(ForeignKeysMappingValidator),
        Arc::new(CreateTenantColumnTableMappingValidator),
        Arc::new(SkippedDefaultValueTablesValidator),
    ]
}

/// SQL definition validators derived from the request's identifier bounds
pub fn default_sql_definitions_validators(
    request: &SharedSchemaContextRequest,
) -> Result<Vec<Arc<dyn SqlDefinitionsValidator>>> {
    Ok(vec![Arc::new(IdentifierLengthValidator::from_request(
        request,
    )?)])
}
