//! Shared schema context
//!
//! The accumulated result of a build: the ordered SQL definitions and the
//! invocation factories registered by enrichers. Create scripts must run in
//! order; drop scripts in reverse.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, SharedSchemaContextError};
use crate::sql::definition::SqlDefinition;
use crate::sql::function::{
    EqualsCurrentTenantIdentifierFunctionInvocationFactory,
    GetCurrentTenantIdFunctionInvocationFactory,
    IsRecordBelongsToCurrentTenantFunctionInvocationFactory,
    IsTenantValidFunctionInvocationFactory, SetCurrentTenantIdFunctionInvocationFactory,
    TenantHasAuthoritiesFunctionInvocationFactory,
};
use crate::types::TableKey;

fn missing(factory: &str) -> SharedSchemaContextError {
    SharedSchemaContextError::internal(format!(
        "{} factory is not registered; the enricher that produces it must run earlier",
        factory
    ))
}

/// Ordered SQL definitions plus named invocation factories
#[derive(Debug, Clone, Default)]
pub struct SharedSchemaContext {
    sql_definitions: Vec<SqlDefinition>,
    get_current_tenant_id: Option<Arc<dyn GetCurrentTenantIdFunctionInvocationFactory>>,
    set_current_tenant_id: Option<Arc<dyn SetCurrentTenantIdFunctionInvocationFactory>>,
    equals_current_tenant_identifier:
        Option<Arc<dyn EqualsCurrentTenantIdentifierFunctionInvocationFactory>>,
    tenant_has_authorities: Option<Arc<dyn TenantHasAuthoritiesFunctionInvocationFactory>>,
    is_tenant_valid: Option<Arc<dyn IsTenantValidFunctionInvocationFactory>>,
    record_belongs_to_current_tenant:
        BTreeMap<TableKey, Arc<dyn IsRecordBelongsToCurrentTenantFunctionInvocationFactory>>,
    current_tenant_id_property_type: Option<String>,
}

impl SharedSchemaContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Definitions in execution order
    pub fn sql_definitions(&self) -> &[SqlDefinition] {
        &self.sql_definitions
    }

    pub fn into_sql_definitions(self) -> Vec<SqlDefinition> {
        self.sql_definitions
    }

    pub fn add_sql_definition(&mut self, definition: SqlDefinition) {
        self.sql_definitions.push(definition);
    }

    /// Create scripts in execution order
    pub fn create_scripts(&self) -> Vec<&str> {
        self.sql_definitions
            .iter()
            .map(SqlDefinition::create_script)
            .collect()
    }

    /// Drop scripts in reverse execution order
    pub fn drop_scripts(&self) -> Vec<&str> {
        self.sql_definitions
            .iter()
            .rev()
            .map(SqlDefinition::drop_script)
            .collect()
    }

    // ------------------------------------------------------------------
    // Factories
    // ------------------------------------------------------------------

    pub fn get_current_tenant_id_function(
        &self,
    ) -> Option<&Arc<dyn GetCurrentTenantIdFunctionInvocationFactory>> {
        self.get_current_tenant_id.as_ref()
    }

    pub fn require_get_current_tenant_id_function(
        &self,
    ) -> Result<&Arc<dyn GetCurrentTenantIdFunctionInvocationFactory>> {
        self.get_current_tenant_id
            .as_ref()
            .ok_or_else(|| missing("get current tenant id"))
    }

    pub fn set_get_current_tenant_id_function(
        &mut self,
        factory: Arc<dyn GetCurrentTenantIdFunctionInvocationFactory>,
    ) {
        self.get_current_tenant_id = Some(factory);
    }

    pub fn set_current_tenant_id_function(
        &self,
    ) -> Option<&Arc<dyn SetCurrentTenantIdFunctionInvocationFactory>> {
        self.set_current_tenant_id.as_ref()
    }

    pub fn set_set_current_tenant_id_function(
        &mut self,
        factory: Arc<dyn SetCurrentTenantIdFunctionInvocationFactory>,
    ) {
        self.set_current_tenant_id = Some(factory);
    }

    pub fn equals_current_tenant_identifier_function(
        &self,
    ) -> Option<&Arc<dyn EqualsCurrentTenantIdentifierFunctionInvocationFactory>> {
        self.equals_current_tenant_identifier.as_ref()
    }

    pub fn set_equals_current_tenant_identifier_function(
        &mut self,
        factory: Arc<dyn EqualsCurrentTenantIdentifierFunctionInvocationFactory>,
    ) {
        self.equals_current_tenant_identifier = Some(factory);
    }

    pub fn tenant_has_authorities_function(
        &self,
    ) -> Option<&Arc<dyn TenantHasAuthoritiesFunctionInvocationFactory>> {
        self.tenant_has_authorities.as_ref()
    }

    pub fn require_tenant_has_authorities_function(
        &self,
    ) -> Result<&Arc<dyn TenantHasAuthoritiesFunctionInvocationFactory>> {
        self.tenant_has_authorities
            .as_ref()
            .ok_or_else(|| missing("tenant has authorities"))
    }

    pub fn set_tenant_has_authorities_function(
        &mut self,
        factory: Arc<dyn TenantHasAuthoritiesFunctionInvocationFactory>,
    ) {
        self.tenant_has_authorities = Some(factory);
    }

    pub fn is_tenant_valid_function(
        &self,
    ) -> Option<&Arc<dyn IsTenantValidFunctionInvocationFactory>> {
        self.is_tenant_valid.as_ref()
    }

    pub fn require_is_tenant_valid_function(
        &self,
    ) -> Result<&Arc<dyn IsTenantValidFunctionInvocationFactory>> {
        self.is_tenant_valid
            .as_ref()
            .ok_or_else(|| missing("is tenant valid"))
    }

    pub fn set_is_tenant_valid_function(
        &mut self,
        factory: Arc<dyn IsTenantValidFunctionInvocationFactory>,
    ) {
        self.is_tenant_valid = Some(factory);
    }

    pub fn record_belongs_to_current_tenant_function(
        &self,
        table: &TableKey,
    ) -> Option<&Arc<dyn IsRecordBelongsToCurrentTenantFunctionInvocationFactory>> {
        self.record_belongs_to_current_tenant.get(table)
    }

    pub fn require_record_belongs_to_current_tenant_function(
        &self,
        table: &TableKey,
    ) -> Result<&Arc<dyn IsRecordBelongsToCurrentTenantFunctionInvocationFactory>> {
        self.record_belongs_to_current_tenant
            .get(table)
            .ok_or_else(|| missing(&format!("record belongs to current tenant ({})", table)))
    }

    pub fn add_record_belongs_to_current_tenant_function(
        &mut self,
        table: TableKey,
        factory: Arc<dyn IsRecordBelongsToCurrentTenantFunctionInvocationFactory>,
    ) {
        self.record_belongs_to_current_tenant.insert(table, factory);
    }

    /// Tenant identifier type the generated functions were declared with
    pub fn current_tenant_id_property_type(&self) -> Option<&str> {
        self.current_tenant_id_property_type.as_deref()
    }

    pub fn set_current_tenant_id_property_type(&mut self, property_type: impl Into<String>) {
        self.current_tenant_id_property_type = Some(property_type.into());
    }
}
