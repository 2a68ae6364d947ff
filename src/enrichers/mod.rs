//! Enricher chain
//!
//! Each enricher consumes the context produced so far plus a request snapshot
//! and returns the context with new SQL definitions appended. The default
//! order matters: later stages embed invocations of functions registered by
//! earlier ones.

pub mod custom;
pub mod functions;
pub mod tables;

use std::fmt;
use std::sync::Arc;

use crate::context::SharedSchemaContext;
use crate::error::Result;
use crate::request::SharedSchemaContextRequest;
use crate::types::CustomSqlDefinitionPosition;

pub use custom::CustomSqlDefinitionsEnricher;
pub use functions::{
    GetCurrentTenantIdFunctionEnricher, IsRecordBelongsToCurrentTenantFunctionEnricher,
    IsTenantValidFunctionEnricher, SetCurrentTenantIdFunctionEnricher,
    TenantHasAuthoritiesFunctionEnricher,
};
pub use tables::{
    CurrentTenantIdPropertyTypeEnricher, RlsPolicyEnricher, RowLevelSecurityEnricher,
    SameTenantConstraintEnricher, TenantColumnDefaultValueEnricher, TenantColumnEnricher,
    ValidTenantValueConstraintEnricher,
};

/// Pipeline stage that appends SQL definitions to the context
pub trait SharedSchemaContextEnricher: fmt::Debug + Send + Sync {
    /// Stage name used in logs
    fn name(&self) -> &str;

    fn enrich(
        &self,
        context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext>;
}

/// The default chain, in execution order
pub fn default_enrichers() -> Vec<Arc<dyn SharedSchemaContextEnricher>> {
    vec![
        Arc::new(CustomSqlDefinitionsEnricher::new(
            CustomSqlDefinitionPosition::AtBeginning,
        )),
        Arc::new(GetCurrentTenantIdFunctionEnricher),
        Arc::new(SetCurrentTenantIdFunctionEnricher),
        Arc::new(TenantHasAuthoritiesFunctionEnricher),
        Arc::new(IsTenantValidFunctionEnricher),
        Arc::new(TenantColumnEnricher),
        Arc::new(RowLevelSecurityEnricher),
        Arc::new(RlsPolicyEnricher),
        Arc::new(IsRecordBelongsToCurrentTenantFunctionEnricher),
        Arc::new(SameTenantConstraintEnricher),
        Arc::new(ValidTenantValueConstraintEnricher),
        Arc::new(TenantColumnDefaultValueEnricher),
        Arc::new(CurrentTenantIdPropertyTypeEnricher),
        Arc::new(CustomSqlDefinitionsEnricher::new(
            CustomSqlDefinitionPosition::AtEnd,
        )),
    ]
}
