//! Enrichers that generate tenant functions and register their invocation factories

use std::sync::Arc;

use tracing::debug;

use crate::context::SharedSchemaContext;
use crate::enrichers::SharedSchemaContextEnricher;
use crate::error::Result;
use crate::request::SharedSchemaContextRequest;
use crate::sql::function::{
    EqualsCurrentTenantIdentifierFunctionParameters, GetCurrentTenantIdFunctionParameters,
    IsRecordBelongsToCurrentTenantFunctionParameters, IsTenantValidFunctionParameters,
    SetCurrentTenantIdFunctionParameters, TenantHasAuthoritiesFunctionParameters,
    generate_equals_current_tenant_identifier_function, generate_get_current_tenant_id_function,
    generate_is_record_belongs_to_current_tenant_function, generate_is_tenant_valid_function,
    generate_set_current_tenant_id_function, generate_tenant_has_authorities_function,
};

/// Function reading the current tenant from the configured property
#[derive(Debug, Clone, Copy, Default)]
pub struct GetCurrentTenantIdFunctionEnricher;

impl SharedSchemaContextEnricher for GetCurrentTenantIdFunctionEnricher {
    fn name(&self) -> &str {
        "get_current_tenant_id_function"
    }

    fn enrich(
        &self,
        mut context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext> {
        let definition =
            generate_get_current_tenant_id_function(&GetCurrentTenantIdFunctionParameters {
                function_name: request.get_current_tenant_id_function_name.clone(),
                schema: request.default_schema.clone(),
                current_tenant_id_property: request.current_tenant_id_property.clone(),
                current_tenant_id_property_type: request.current_tenant_id_property_type.clone(),
            });
        context.add_sql_definition(definition.function().sql_definition().clone());
        context.set_get_current_tenant_id_function(Arc::new(definition));
        Ok(context)
    }
}

/// Function writing the current tenant into the configured property
#[derive(Debug, Clone, Copy, Default)]
pub struct SetCurrentTenantIdFunctionEnricher;

impl SharedSchemaContextEnricher for SetCurrentTenantIdFunctionEnricher {
    fn name(&self) -> &str {
        "set_current_tenant_id_function"
    }

    fn enrich(
        &self,
        mut context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext> {
        let definition =
            generate_set_current_tenant_id_function(&SetCurrentTenantIdFunctionParameters {
                function_name: request.set_current_tenant_id_function_name.clone(),
                schema: request.default_schema.clone(),
                current_tenant_id_property: request.current_tenant_id_property.clone(),
                current_tenant_id_property_type: request
                    .resolved_current_tenant_id_property_type()
                    .to_string(),
            });
        context.add_sql_definition(definition.function().sql_definition().clone());
        context.set_set_current_tenant_id_function(Arc::new(definition));
        Ok(context)
    }
}

/// The equals-current-tenant function followed by the tenant-has-authorities
/// function that policies call
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantHasAuthoritiesFunctionEnricher;

impl SharedSchemaContextEnricher for TenantHasAuthoritiesFunctionEnricher {
    fn name(&self) -> &str {
        "tenant_has_authorities_function"
    }

    fn enrich(
        &self,
        mut context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext> {
        let argument_type = request.resolved_current_tenant_id_property_type();
        let get_current_tenant_id = Arc::clone(context.require_get_current_tenant_id_function()?);

        let equals = generate_equals_current_tenant_identifier_function(
            &EqualsCurrentTenantIdentifierFunctionParameters {
                function_name: request.equals_current_tenant_identifier_function_name.clone(),
                schema: request.default_schema.clone(),
                argument_type: argument_type.to_string(),
                get_current_tenant_id: get_current_tenant_id.as_ref(),
            },
        );
        let authorities =
            generate_tenant_has_authorities_function(&TenantHasAuthoritiesFunctionParameters {
                function_name: request.tenant_has_authorities_function_name.clone(),
                schema: request.default_schema.clone(),
                argument_type: argument_type.to_string(),
                equals_current_tenant_identifier: &equals,
            });

        context.add_sql_definition(equals.function().sql_definition().clone());
        context.add_sql_definition(authorities.function().sql_definition().clone());
        context.set_equals_current_tenant_identifier_function(Arc::new(equals));
        context.set_tenant_has_authorities_function(Arc::new(authorities));
        Ok(context)
    }
}

/// Blacklist check function, only when the blacklist is enabled
#[derive(Debug, Clone, Copy, Default)]
pub struct IsTenantValidFunctionEnricher;

impl SharedSchemaContextEnricher for IsTenantValidFunctionEnricher {
    fn name(&self) -> &str {
        "is_tenant_valid_function"
    }

    fn enrich(
        &self,
        mut context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext> {
        let Some(constraint) = &request.valid_tenant_value_constraint else {
            return Ok(context);
        };
        let definition = generate_is_tenant_valid_function(&IsTenantValidFunctionParameters {
            function_name: constraint.is_tenant_valid_function_name.clone(),
            schema: request.default_schema.clone(),
            argument_type: request.resolved_current_tenant_id_property_type().to_string(),
            tenant_identifiers_blacklist: constraint.tenant_identifiers_blacklist.clone(),
        });
        context.add_sql_definition(definition.function().sql_definition().clone());
        context.set_is_tenant_valid_function(Arc::new(definition));
        Ok(context)
    }
}

/// Record ownership function for every table with a policy
///
/// The function lives in the table's schema and takes the primary key
/// columns in name order.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsRecordBelongsToCurrentTenantFunctionEnricher;

impl SharedSchemaContextEnricher for IsRecordBelongsToCurrentTenantFunctionEnricher {
    fn name(&self) -> &str {
        "is_record_belongs_to_current_tenant_function"
    }

    fn enrich(
        &self,
        mut context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext> {
        let get_current_tenant_id = Arc::clone(context.require_get_current_tenant_id_function()?);

        for table in request.table_rls_policies.keys() {
            let primary_key_columns = match request.table_columns.get(table) {
                Some(columns) if !columns.primary_key_columns.is_empty() => {
                    columns.primary_key_columns.clone()
                }
                _ => {
                    debug!(
                        table = %table,
                        "No primary key columns, skipping record ownership function"
                    );
                    continue;
                }
            };
            let definition = generate_is_record_belongs_to_current_tenant_function(
                &IsRecordBelongsToCurrentTenantFunctionParameters {
                    function_name: request.record_belongs_function_name(table),
                    table: table.clone(),
                    tenant_column: request.tenant_column(table).to_string(),
                    primary_key_columns,
                    get_current_tenant_id: get_current_tenant_id.as_ref(),
                },
            );
            context.add_sql_definition(definition.function().sql_definition().clone());
            context
                .add_record_belongs_to_current_tenant_function(table.clone(), Arc::new(definition));
        }
        Ok(context)
    }
}
