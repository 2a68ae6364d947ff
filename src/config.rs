//! Configuration surface
//!
//! A serde representation of every builder option, typically loaded from
//! JSON, and its mapping onto [`DefaultSharedSchemaContextBuilder`] calls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::builder::DefaultSharedSchemaContextBuilder;
use crate::error::{Result, SharedSchemaContextError};
use crate::sql::definition::{DEFAULT_CHECKING_STATEMENT, SqlDefinition};
use crate::types::{CustomSqlDefinitionPosition, TableKey};

/// Blacklist of tenant identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidTenantValueConstraintConfiguration {
    pub tenant_identifiers_blacklist: Vec<String>,
    pub is_tenant_valid_function_name: Option<String>,
    pub is_tenant_valid_constraint_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryKeyDefinitionConfiguration {
    /// Overrides `is_<table>_belongs_to_current_tenant`
    pub name_for_function_that_checks_if_record_exists_in_table: Option<String>,
    pub pk_columns_name_to_type: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RlsPolicyConfiguration {
    pub name: String,
    pub tenant_column: Option<String>,
    pub create_tenant_column: bool,
    pub skip_adding_of_tenant_column_default_value: bool,
    pub valid_tenant_value_constraint_name: Option<String>,
    pub primary_key_definition: Option<PrimaryKeyDefinitionConfiguration>,
}

/// Same-tenant constraint declared on the enclosing table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForeignKeyConfiguration {
    pub constraint_name: String,
    /// Referenced table, in the enclosing table's schema
    pub table_name: String,
    /// Foreign key column to referenced primary key column
    pub foreign_key_primary_key_columns_mappings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfiguration {
    pub name: String,
    /// Falls back to the default schema
    pub schema: Option<String>,
    pub rls_policy: Option<RlsPolicyConfiguration>,
    pub foreign_keys: Vec<ForeignKeyConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlDefinitionsValidationConfiguration {
    pub identifier_max_length: Option<usize>,
    pub identifier_min_length: Option<usize>,
    pub disabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomDefinitionPositionConfiguration {
    AtBeginning,
    AtEnd,
    /// Requires `custom_position`
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDefinitionConfiguration {
    pub position: CustomDefinitionPositionConfiguration,
    #[serde(default)]
    pub custom_position: Option<String>,
    pub creation_script: String,
    /// Defaults to `SELECT 1`
    #[serde(default)]
    pub drop_script: Option<String>,
    /// Defaults to a single `SELECT 1`
    #[serde(default)]
    pub validation_scripts: Option<Vec<String>>,
}

impl CustomDefinitionConfiguration {
    fn position(&self) -> Result<CustomSqlDefinitionPosition> {
        match self.position {
            CustomDefinitionPositionConfiguration::AtBeginning => {
                Ok(CustomSqlDefinitionPosition::AtBeginning)
            }
            CustomDefinitionPositionConfiguration::AtEnd => Ok(CustomSqlDefinitionPosition::AtEnd),
            CustomDefinitionPositionConfiguration::Custom => self
                .custom_position
                .clone()
                .map(CustomSqlDefinitionPosition::Custom)
                .ok_or_else(|| {
                    SharedSchemaContextError::configuration(
                        "custom definition with CUSTOM position requires custom_position",
                    )
                }),
        }
    }

    fn definition(&self) -> SqlDefinition {
        SqlDefinition::new(
            self.creation_script.clone(),
            self.drop_script
                .clone()
                .unwrap_or_else(|| DEFAULT_CHECKING_STATEMENT.to_string()),
            self.validation_scripts
                .clone()
                .unwrap_or_else(|| vec![DEFAULT_CHECKING_STATEMENT.to_string()]),
        )
    }
}

/// Every builder option; absent fields keep the builder defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedSchemaContextConfiguration {
    pub default_schema: Option<String>,
    pub current_tenant_id_property_type: Option<String>,
    pub current_tenant_id_property: Option<String>,
    pub get_current_tenant_id_function_name: Option<String>,
    pub set_current_tenant_id_function_name: Option<String>,
    pub equals_current_tenant_identifier_function_name: Option<String>,
    pub tenant_has_authorities_function_name: Option<String>,
    pub force_row_level_security_for_table_owner: Option<bool>,
    pub default_tenant_id_column: Option<String>,
    pub grantee: Option<String>,
    pub current_tenant_identifier_as_default_value_for_tenant_column_in_all_tables: Option<bool>,
    pub valid_tenant_value_constraint: Option<ValidTenantValueConstraintConfiguration>,
    pub tables: Vec<TableConfiguration>,
    pub sql_definitions_validation: Option<SqlDefinitionsValidationConfiguration>,
    pub custom_definitions: Vec<CustomDefinitionConfiguration>,
}

impl SharedSchemaContextConfiguration {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Fresh builder for the configured default schema with every option applied
    pub fn to_builder(&self) -> Result<DefaultSharedSchemaContextBuilder> {
        let builder = match &self.default_schema {
            Some(schema) => DefaultSharedSchemaContextBuilder::with_default_schema(schema),
            None => DefaultSharedSchemaContextBuilder::new(),
        };
        self.apply(builder)
    }

    /// Map every configured option onto `builder`
    ///
    /// The default schema is fixed when the builder is created, so
    /// `default_schema` is only used by [`Self::to_builder`] and to resolve
    /// table schemas here.
    pub fn apply(
        &self,
        builder: DefaultSharedSchemaContextBuilder,
    ) -> Result<DefaultSharedSchemaContextBuilder> {
        let mut builder = builder;

        if let Some(property_type) = &self.current_tenant_id_property_type {
            builder = builder.current_tenant_id_property_type(property_type);
        }
        if let Some(property) = &self.current_tenant_id_property {
            builder = builder.current_tenant_id_property(property);
        }
        if let Some(name) = &self.get_current_tenant_id_function_name {
            builder = builder.get_current_tenant_id_function_name(name);
        }
        if let Some(name) = &self.set_current_tenant_id_function_name {
            builder = builder.set_current_tenant_id_function_name(name);
        }
        if let Some(name) = &self.equals_current_tenant_identifier_function_name {
            builder = builder.equals_current_tenant_identifier_function_name(name);
        }
        if let Some(name) = &self.tenant_has_authorities_function_name {
            builder = builder.tenant_has_authorities_function_name(name);
        }
        if let Some(enabled) = self.force_row_level_security_for_table_owner {
            builder = builder.force_row_level_security_for_table_owner(enabled);
        }
        if let Some(column) = &self.default_tenant_id_column {
            builder = builder.default_tenant_id_column(column);
        }
        if let Some(grantee) = &self.grantee {
            builder = builder.grantee(grantee);
        }
        if let Some(enabled) =
            self.current_tenant_identifier_as_default_value_for_tenant_column_in_all_tables
        {
            builder = builder
                .current_tenant_identifier_as_default_value_for_tenant_column_in_all_tables(
                    enabled,
                );
        }
        if let Some(constraint) = &self.valid_tenant_value_constraint {
            builder = builder.create_valid_tenant_value_constraint(
                constraint.tenant_identifiers_blacklist.iter().cloned(),
                constraint.is_tenant_valid_function_name.as_deref(),
                constraint.is_tenant_valid_constraint_name.as_deref(),
            );
        }

        for table in &self.tables {
            builder = self.apply_table(builder, table);
        }

        if let Some(validation) = &self.sql_definitions_validation {
            if let Some(length) = validation.identifier_max_length {
                builder = builder.identifier_max_length(length);
            }
            if let Some(length) = validation.identifier_min_length {
                builder = builder.identifier_min_length(length);
            }
            builder = builder.disable_default_sql_definitions_validators(validation.disabled);
        }

        for custom in &self.custom_definitions {
            builder = builder.add_custom_sql_definition(custom.position()?, custom.definition());
        }

        Ok(builder)
    }

    fn apply_table(
        &self,
        mut builder: DefaultSharedSchemaContextBuilder,
        table: &TableConfiguration,
    ) -> DefaultSharedSchemaContextBuilder {
        let schema = table
            .schema
            .as_deref()
            .or(builder.request().default_schema.as_deref())
            .map(str::to_string);
        let key = TableKey::new(&table.name, schema.as_deref());

        if let Some(policy) = &table.rls_policy {
            let primary_key = policy.primary_key_definition.clone().unwrap_or_default();
            builder = builder.create_rls_policy_for_table_key(
                key.clone(),
                primary_key.pk_columns_name_to_type,
                policy.tenant_column.as_deref(),
                &policy.name,
            );
            if policy.create_tenant_column {
                builder = builder.create_tenant_column_for_table_key(key.clone());
            }
            if policy.skip_adding_of_tenant_column_default_value {
                builder =
                    builder.skip_adding_of_tenant_column_default_value_for_table_key(key.clone());
            }
            if let Some(name) = &policy.valid_tenant_value_constraint_name {
                builder = builder
                    .register_custom_valid_tenant_value_constraint_name_for_table_key(
                        key.clone(),
                        name,
                    );
            }
            if let Some(name) = &primary_key.name_for_function_that_checks_if_record_exists_in_table
            {
                builder = builder
                    .set_name_for_function_that_checks_if_record_exists_in_table_key(
                        key.clone(),
                        name,
                    );
            }
        }

        for foreign_key in &table.foreign_keys {
            builder = builder.create_same_tenant_constraint_for_foreign_key_keys(
                key.clone(),
                TableKey::new(&foreign_key.table_name, schema.as_deref()),
                foreign_key.foreign_key_primary_key_columns_mappings.clone(),
                &foreign_key.constraint_name,
            );
        }
        builder
    }
}
