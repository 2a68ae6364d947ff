//! Request validators

use std::collections::BTreeSet;

use crate::error::{RequestRule, Result, SharedSchemaContextError};
use crate::request::SharedSchemaContextRequest;
use crate::validators::SharedSchemaContextRequestValidator;

/// Checks same-tenant foreign key constraints against the registered tables
///
/// Both tables need column metadata and the foreign table needs a primary
/// key. The mapped primary key columns must be distinct and cover the whole
/// primary key, so every argument of the record ownership function gets
/// exactly one foreign key column.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForeignKeysMappingValidator;

impl SharedSchemaContextRequestValidator for ForeignKeysMappingValidator {
    fn validate(&self, request: &SharedSchemaContextRequest) -> Result<()> {
        let violation = |msg: String| {
            SharedSchemaContextError::invalid_request(RequestRule::ForeignKeyMapping, msg)
        };

        for (key, properties) in &request.same_tenant_constraints {
            if !request.table_columns.contains_key(&key.main_table) {
                return Err(violation(format!(
                    "constraint '{}' references table '{}' which has no column definition",
                    properties.constraint_name, key.main_table
                )));
            }
            let Some(foreign) = request.table_columns.get(&key.foreign_key_table) else {
                return Err(violation(format!(
                    "constraint '{}' references foreign table '{}' which has no column definition",
                    properties.constraint_name, key.foreign_key_table
                )));
            };
            if foreign.primary_key_columns.is_empty() {
                return Err(violation(format!(
                    "constraint '{}' references foreign table '{}' which has no primary key columns",
                    properties.constraint_name, key.foreign_key_table
                )));
            }

            let mappings = &properties.foreign_key_primary_key_columns_mappings;
            if mappings.is_empty() {
                return Err(violation(format!(
                    "constraint '{}' has no foreign key column mappings",
                    properties.constraint_name
                )));
            }
            if mappings.len() != foreign.primary_key_columns.len() {
                return Err(violation(format!(
                    "constraint '{}' maps {} foreign key columns but table '{}' has {} primary key columns",
                    properties.constraint_name,
                    mappings.len(),
                    key.foreign_key_table,
                    foreign.primary_key_columns.len()
                )));
            }
            if !mappings.keys().eq(key.foreign_key_columns.iter()) {
                return Err(violation(format!(
                    "constraint '{}' foreign key columns do not match its column mappings",
                    properties.constraint_name
                )));
            }
            if let Some(column) = mappings
                .values()
                .find(|column| !foreign.primary_key_columns.contains_key(*column))
            {
                return Err(violation(format!(
                    "constraint '{}' maps to column '{}' which is not a primary key column of table '{}'",
                    properties.constraint_name, column, key.foreign_key_table
                )));
            }
            let mapped: BTreeSet<&String> = mappings.values().collect();
            if let Some(column) = foreign
                .primary_key_columns
                .keys()
                .find(|column| !mapped.contains(column))
            {
                return Err(violation(format!(
                    "constraint '{}' maps no foreign key column to primary key column '{}' of table '{}'",
                    properties.constraint_name, column, key.foreign_key_table
                )));
            }
        }
        Ok(())
    }
}

/// Checks that every table marked for tenant column creation has column metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateTenantColumnTableMappingValidator;

impl SharedSchemaContextRequestValidator for CreateTenantColumnTableMappingValidator {
    fn validate(&self, request: &SharedSchemaContextRequest) -> Result<()> {
        match request
            .create_tenant_column_tables
            .iter()
            .find(|table| !request.table_columns.contains_key(*table))
        {
            Some(table) => Err(SharedSchemaContextError::invalid_request(
                RequestRule::TenantColumnTableMapping,
                format!(
                    "table '{}' is registered for tenant column creation but has no column definition",
                    table
                ),
            )),
            None => Ok(()),
        }
    }
}

/// Checks that tables skipped for default value generation have a tenant column
#[derive(Debug, Clone, Copy, Default)]
pub struct SkippedDefaultValueTablesValidator;

impl SharedSchemaContextRequestValidator for SkippedDefaultValueTablesValidator {
    fn validate(&self, request: &SharedSchemaContextRequest) -> Result<()> {
        match request
            .tables_without_tenant_column_default
            .iter()
            .find(|table| !request.table_columns.contains_key(*table))
        {
            Some(table) => Err(SharedSchemaContextError::invalid_request(
                RequestRule::SkippedDefaultValueTable,
                format!(
                    "table '{}' is skipped for tenant column default value but has no tenant column",
                    table
                ),
            )),
            None => Ok(()),
        }
    }
}
