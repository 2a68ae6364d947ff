//! Enrichers that generate per-table statements

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::context::SharedSchemaContext;
use crate::enrichers::SharedSchemaContextEnricher;
use crate::error::Result;
use crate::request::SharedSchemaContextRequest;
use crate::sql::ddl::{
    RlsPolicyParameters, generate_add_column, generate_check_constraint,
    generate_enable_row_level_security, generate_force_row_level_security, generate_rls_policy,
    generate_set_default, generate_set_not_null, same_tenant_condition, valid_tenant_condition,
};
use crate::sql::function::{FunctionArgumentValue, PermissionCommandPolicy};
use crate::sql::sanitize::identifier;

/// Tenant column for every table marked for column creation
///
/// Emits add column, set default and set not null in that order. The default
/// is the current tenant invocation and is left out for skip-listed tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantColumnEnricher;

impl SharedSchemaContextEnricher for TenantColumnEnricher {
    fn name(&self) -> &str {
        "tenant_column"
    }

    fn enrich(
        &self,
        mut context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext> {
        if request.create_tenant_column_tables.is_empty() {
            return Ok(context);
        }
        let default_value = context
            .require_get_current_tenant_id_function()?
            .get_current_tenant_id_invocation();
        let column_type = request.resolved_current_tenant_id_property_type();

        for table in &request.create_tenant_column_tables {
            let column = request.tenant_column(table);
            context.add_sql_definition(generate_add_column(table, column, column_type));
            if request.tenant_column_default_skipped(table) {
                debug!(table = %table, "Tenant column default skipped");
            } else {
                context.add_sql_definition(generate_set_default(table, column, &default_value));
            }
            context.add_sql_definition(generate_set_not_null(table, column));
        }
        Ok(context)
    }
}

/// Enables row level security, and forces it for the owner when configured
#[derive(Debug, Clone, Copy, Default)]
pub struct RowLevelSecurityEnricher;

impl SharedSchemaContextEnricher for RowLevelSecurityEnricher {
    fn name(&self) -> &str {
        "row_level_security"
    }

    fn enrich(
        &self,
        mut context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext> {
        for table in request.table_rls_policies.keys() {
            context.add_sql_definition(generate_enable_row_level_security(table));
            if request.force_row_level_security_for_table_owner {
                context.add_sql_definition(generate_force_row_level_security(table));
            }
        }
        Ok(context)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RlsPolicyEnricher;

impl SharedSchemaContextEnricher for RlsPolicyEnricher {
    fn name(&self) -> &str {
        "rls_policy"
    }

    fn enrich(
        &self,
        mut context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext> {
        if request.table_rls_policies.is_empty() {
            return Ok(context);
        }
        let authorities = Arc::clone(context.require_tenant_has_authorities_function()?);

        for (table, policy) in &request.table_rls_policies {
            context.add_sql_definition(generate_rls_policy(&RlsPolicyParameters {
                policy_name: policy.policy_name.clone(),
                table: table.clone(),
                tenant_column: request.tenant_column(table).to_string(),
                grantee: request.grantee.clone(),
                command: PermissionCommandPolicy::All,
                tenant_has_authorities: authorities.as_ref(),
            }));
        }
        Ok(context)
    }
}

/// CHECK constraints keeping foreign keys inside the current tenant
///
/// Each constraint calls the foreign table's record ownership function with
/// the foreign key columns passed for the matching primary key columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameTenantConstraintEnricher;

impl SharedSchemaContextEnricher for SameTenantConstraintEnricher {
    fn name(&self) -> &str {
        "same_tenant_constraint"
    }

    fn enrich(
        &self,
        mut context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext> {
        for (key, properties) in &request.same_tenant_constraints {
            let record_belongs = Arc::clone(
                context.require_record_belongs_to_current_tenant_function(&key.foreign_key_table)?,
            );
            let primary_key_values: BTreeMap<String, FunctionArgumentValue> = properties
                .foreign_key_primary_key_columns_mappings
                .iter()
                .map(|(foreign_key_column, primary_key_column)| {
                    (
                        primary_key_column.clone(),
                        FunctionArgumentValue::reference(identifier(foreign_key_column)),
                    )
                })
                .collect();
            let invocation =
                record_belongs.is_record_belongs_to_current_tenant_invocation(&primary_key_values)?;
            let condition = same_tenant_condition(&key.foreign_key_columns, &invocation);
            context.add_sql_definition(generate_check_constraint(
                &key.main_table,
                &properties.constraint_name,
                &condition,
            ));
        }
        Ok(context)
    }
}

/// Blacklist CHECK constraint on the tenant column of every table with a policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidTenantValueConstraintEnricher;

impl SharedSchemaContextEnricher for ValidTenantValueConstraintEnricher {
    fn name(&self) -> &str {
        "valid_tenant_value_constraint"
    }

    fn enrich(
        &self,
        mut context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext> {
        if request.valid_tenant_value_constraint.is_none() {
            return Ok(context);
        }
        let is_tenant_valid = Arc::clone(context.require_is_tenant_valid_function()?);

        for table in request.table_rls_policies.keys() {
            let Some(constraint_name) = request.valid_tenant_value_constraint_name(table) else {
                continue;
            };
            let column = request.tenant_column(table);
            let invocation = is_tenant_valid.is_tenant_identifier_valid_invocation(
                &FunctionArgumentValue::reference(identifier(column)),
            );
            context.add_sql_definition(generate_check_constraint(
                table,
                &constraint_name,
                &valid_tenant_condition(column, &invocation),
            ));
        }
        Ok(context)
    }
}

/// Tenant column default for tables whose column already exists
///
/// Only runs when the current tenant should be the default in all tables.
/// Tables marked for column creation got their default together with the
/// column; skip-listed tables get none.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantColumnDefaultValueEnricher;

impl SharedSchemaContextEnricher for TenantColumnDefaultValueEnricher {
    fn name(&self) -> &str {
        "tenant_column_default_value"
    }

    fn enrich(
        &self,
        mut context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext> {
        if !request.current_tenant_identifier_as_default_value_for_tenant_column_in_all_tables {
            return Ok(context);
        }
        let default_value = context
            .require_get_current_tenant_id_function()?
            .get_current_tenant_id_invocation();

        for table in request.table_rls_policies.keys() {
            if request.create_tenant_column_tables.contains(table) {
                continue;
            }
            if request.tenant_column_default_skipped(table) {
                debug!(table = %table, "Tenant column default skipped");
                continue;
            }
            context.add_sql_definition(generate_set_default(
                table,
                request.tenant_column(table),
                &default_value,
            ));
        }
        Ok(context)
    }
}

/// Records the tenant identifier type the generated functions were declared with
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentTenantIdPropertyTypeEnricher;

impl SharedSchemaContextEnricher for CurrentTenantIdPropertyTypeEnricher {
    fn name(&self) -> &str {
        "current_tenant_id_property_type"
    }

    fn enrich(
        &self,
        mut context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext> {
        context.set_current_tenant_id_property_type(
            request.resolved_current_tenant_id_property_type(),
        );
        Ok(context)
    }
}
