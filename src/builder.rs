//! Shared schema context builder
//!
//! The single entry point: configure the request through fluent setters, then
//! call [`DefaultSharedSchemaContextBuilder::build`]. A configured builder can
//! be built any number of times.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::SharedSchemaContext;
use crate::enrichers::{SharedSchemaContextEnricher, default_enrichers};
use crate::error::{Result, SharedSchemaContextError, SqlDefinitionViolation};
use crate::request::{
    DEFAULT_IS_TENANT_VALID_CONSTRAINT_NAME, DEFAULT_IS_TENANT_VALID_FUNCTION_NAME,
    SharedSchemaContextRequest,
};
use crate::sql::definition::{DEFAULT_CHECKING_STATEMENT, SqlDefinition};
use crate::types::{
    CustomSqlDefinitionPair, CustomSqlDefinitionPosition, SameTenantConstraintKey,
    SameTenantConstraintProperties, TableColumns, TableKey, TableRlsPolicyProperties,
    ValidTenantValueConstraint,
};
use crate::validators::{
    SharedSchemaContextRequestValidator, SqlDefinitionsValidator, default_request_validators,
    default_sql_definitions_validators,
};

fn string_map<K: Into<String>, V: Into<String>>(
    entries: impl IntoIterator<Item = (K, V)>,
) -> BTreeMap<String, String> {
    entries
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// Builder for [`SharedSchemaContext`]
///
/// Tables registered by name resolve against the default schema given to
/// [`DefaultSharedSchemaContextBuilder::with_default_schema`]; the `*_key`
/// variants take an explicit [`TableKey`].
#[derive(Debug, Clone)]
pub struct DefaultSharedSchemaContextBuilder {
    request: SharedSchemaContextRequest,
    enrichers: Vec<Arc<dyn SharedSchemaContextEnricher>>,
    validators: Vec<Arc<dyn SharedSchemaContextRequestValidator>>,
    sql_definitions_validators: Option<Vec<Arc<dyn SqlDefinitionsValidator>>>,
    disable_default_sql_definitions_validators: bool,
}

impl Default for DefaultSharedSchemaContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultSharedSchemaContextBuilder {
    /// Create a builder whose functions and tables live in the connection's current schema
    pub fn new() -> Self {
        Self::from_request(SharedSchemaContextRequest::default())
    }

    /// Create a builder whose functions and tables live in `schema`
    pub fn with_default_schema(schema: impl Into<String>) -> Self {
        let schema = schema.into();
        Self::from_request(SharedSchemaContextRequest::new(Some(schema.as_str())))
    }

    fn from_request(request: SharedSchemaContextRequest) -> Self {
        Self {
            request,
            enrichers: default_enrichers(),
            validators: default_request_validators(),
            sql_definitions_validators: None,
            disable_default_sql_definitions_validators: false,
        }
    }

    /// Current state of the request
    pub fn request(&self) -> &SharedSchemaContextRequest {
        &self.request
    }

    // ------------------------------------------------------------------
    // Tenant property and functions
    // ------------------------------------------------------------------

    /// Set the configuration parameter holding the current tenant
    ///
    /// Defaults to `"app.current_tenant_id"`.
    pub fn current_tenant_id_property(mut self, property: impl Into<String>) -> Self {
        self.request.current_tenant_id_property = property.into();
        self
    }

    /// Declare the tenant identifier type (default: VARCHAR(255))
    pub fn current_tenant_id_property_type(mut self, property_type: impl Into<String>) -> Self {
        self.request.current_tenant_id_property_type = Some(property_type.into());
        self
    }

    pub fn get_current_tenant_id_function_name(mut self, name: impl Into<String>) -> Self {
        self.request.get_current_tenant_id_function_name = name.into();
        self
    }

    pub fn set_current_tenant_id_function_name(mut self, name: impl Into<String>) -> Self {
        self.request.set_current_tenant_id_function_name = name.into();
        self
    }

    pub fn equals_current_tenant_identifier_function_name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.request.equals_current_tenant_identifier_function_name = name.into();
        self
    }

    pub fn tenant_has_authorities_function_name(mut self, name: impl Into<String>) -> Self {
        self.request.tenant_has_authorities_function_name = name.into();
        self
    }

    // ------------------------------------------------------------------
    // Policies
    // ------------------------------------------------------------------

    /// Apply policies to the table owner too (default: false)
    pub fn force_row_level_security_for_table_owner(mut self, enabled: bool) -> Self {
        self.request.force_row_level_security_for_table_owner = enabled;
        self
    }

    /// Tenant column used by tables that do not name their own (default: "tenant_id")
    pub fn default_tenant_id_column(mut self, column: impl Into<String>) -> Self {
        self.request.default_tenant_id_column = column.into();
        self
    }

    /// Role the policies apply to (default: PUBLIC)
    pub fn grantee(mut self, grantee: impl Into<String>) -> Self {
        self.request.grantee = Some(grantee.into());
        self
    }

    /// Register a policy for a table in the default schema
    ///
    /// `primary_key_columns` maps column names to SQL types. `tenant_column`
    /// falls back to the default tenant column.
    pub fn create_rls_policy_for_table<K: Into<String>, V: Into<String>>(
        self,
        table: &str,
        primary_key_columns: impl IntoIterator<Item = (K, V)>,
        tenant_column: Option<&str>,
        policy_name: impl Into<String>,
    ) -> Self {
        let key = self.request.table_key(table);
        self.create_rls_policy_for_table_key(key, primary_key_columns, tenant_column, policy_name)
    }

    pub fn create_rls_policy_for_table_key<K: Into<String>, V: Into<String>>(
        mut self,
        table: TableKey,
        primary_key_columns: impl IntoIterator<Item = (K, V)>,
        tenant_column: Option<&str>,
        policy_name: impl Into<String>,
    ) -> Self {
        self.request.table_columns.insert(
            table.clone(),
            TableColumns::new(
                tenant_column.map(str::to_string),
                string_map(primary_key_columns),
            ),
        );
        self.request.table_rls_policies.insert(
            table,
            TableRlsPolicyProperties {
                policy_name: policy_name.into(),
            },
        );
        self
    }

    // ------------------------------------------------------------------
    // Tenant column
    // ------------------------------------------------------------------

    /// Add the tenant column to a table instead of expecting it to exist
    pub fn create_tenant_column_for_table(self, table: &str) -> Self {
        let key = self.request.table_key(table);
        self.create_tenant_column_for_table_key(key)
    }

    pub fn create_tenant_column_for_table_key(mut self, table: TableKey) -> Self {
        self.request.create_tenant_column_tables.insert(table);
        self
    }

    /// Use the current tenant as tenant column default in tables whose column already exists
    pub fn current_tenant_identifier_as_default_value_for_tenant_column_in_all_tables(
        mut self,
        enabled: bool,
    ) -> Self {
        self.request
            .current_tenant_identifier_as_default_value_for_tenant_column_in_all_tables = enabled;
        self
    }

    pub fn skip_adding_of_tenant_column_default_value_for_table(self, table: &str) -> Self {
        let key = self.request.table_key(table);
        self.skip_adding_of_tenant_column_default_value_for_table_key(key)
    }

    pub fn skip_adding_of_tenant_column_default_value_for_table_key(
        mut self,
        table: TableKey,
    ) -> Self {
        self.request.tables_without_tenant_column_default.insert(table);
        self
    }

    // ------------------------------------------------------------------
    // Same tenant constraints
    // ------------------------------------------------------------------

    /// Require rows referenced through a foreign key to belong to the current tenant
    ///
    /// `mappings` maps foreign key columns of `main_table` to primary key
    /// columns of `foreign_key_table`.
    pub fn create_same_tenant_constraint_for_foreign_key<K: Into<String>, V: Into<String>>(
        self,
        main_table: &str,
        foreign_key_table: &str,
        mappings: impl IntoIterator<Item = (K, V)>,
        constraint_name: impl Into<String>,
    ) -> Self {
        let main = self.request.table_key(main_table);
        let foreign = self.request.table_key(foreign_key_table);
        self.create_same_tenant_constraint_for_foreign_key_keys(
            main,
            foreign,
            mappings,
            constraint_name,
        )
    }

    pub fn create_same_tenant_constraint_for_foreign_key_keys<K: Into<String>, V: Into<String>>(
        mut self,
        main_table: TableKey,
        foreign_key_table: TableKey,
        mappings: impl IntoIterator<Item = (K, V)>,
        constraint_name: impl Into<String>,
    ) -> Self {
        let mappings = string_map(mappings);
        self.request.same_tenant_constraints.insert(
            SameTenantConstraintKey {
                main_table,
                foreign_key_table,
                foreign_key_columns: mappings.keys().cloned().collect(),
            },
            SameTenantConstraintProperties {
                constraint_name: constraint_name.into(),
                foreign_key_primary_key_columns_mappings: mappings,
            },
        );
        self
    }

    /// Override the name of a table's record ownership function
    pub fn set_name_for_function_that_checks_if_record_exists_in_table(
        self,
        table: &str,
        function_name: impl Into<String>,
    ) -> Self {
        let key = self.request.table_key(table);
        self.set_name_for_function_that_checks_if_record_exists_in_table_key(key, function_name)
    }

    pub fn set_name_for_function_that_checks_if_record_exists_in_table_key(
        mut self,
        table: TableKey,
        function_name: impl Into<String>,
    ) -> Self {
        self.request
            .record_belongs_function_names
            .insert(table, function_name.into());
        self
    }

    // ------------------------------------------------------------------
    // Tenant identifier blacklist
    // ------------------------------------------------------------------

    /// Reject blacklisted tenant identifiers in every table with a policy
    pub fn create_valid_tenant_value_constraint(
        mut self,
        tenant_identifiers_blacklist: impl IntoIterator<Item = impl Into<String>>,
        is_tenant_valid_function_name: Option<&str>,
        is_tenant_valid_constraint_name: Option<&str>,
    ) -> Self {
        self.request.valid_tenant_value_constraint = Some(ValidTenantValueConstraint {
            tenant_identifiers_blacklist: tenant_identifiers_blacklist
                .into_iter()
                .map(Into::into)
                .collect(),
            is_tenant_valid_function_name: is_tenant_valid_function_name
                .unwrap_or(DEFAULT_IS_TENANT_VALID_FUNCTION_NAME)
                .to_string(),
            is_tenant_valid_constraint_name: is_tenant_valid_constraint_name
                .unwrap_or(DEFAULT_IS_TENANT_VALID_CONSTRAINT_NAME)
                .to_string(),
        });
        self
    }

    pub fn register_custom_valid_tenant_value_constraint_name_for_table(
        self,
        table: &str,
        constraint_name: impl Into<String>,
    ) -> Self {
        let key = self.request.table_key(table);
        self.register_custom_valid_tenant_value_constraint_name_for_table_key(key, constraint_name)
    }

    pub fn register_custom_valid_tenant_value_constraint_name_for_table_key(
        mut self,
        table: TableKey,
        constraint_name: impl Into<String>,
    ) -> Self {
        self.request
            .valid_tenant_value_constraint_names
            .insert(table, constraint_name.into());
        self
    }

    // ------------------------------------------------------------------
    // Custom definitions
    // ------------------------------------------------------------------

    pub fn add_custom_sql_definition(
        mut self,
        position: CustomSqlDefinitionPosition,
        definition: SqlDefinition,
    ) -> Self {
        self.request
            .custom_sql_definitions
            .push(CustomSqlDefinitionPair {
                position,
                definition,
            });
        self
    }

    /// Custom definition whose drop script and check are `SELECT 1`
    pub fn add_custom_sql_definition_script(
        self,
        position: CustomSqlDefinitionPosition,
        create_script: impl Into<String>,
    ) -> Self {
        self.add_custom_sql_definition(position, SqlDefinition::from_create_script(create_script))
    }

    /// Custom definition whose check is `SELECT 1`
    pub fn add_custom_sql_definition_with_drop(
        self,
        position: CustomSqlDefinitionPosition,
        create_script: impl Into<String>,
        drop_script: impl Into<String>,
    ) -> Self {
        self.add_custom_sql_definition(
            position,
            SqlDefinition::new(
                create_script,
                drop_script,
                vec![DEFAULT_CHECKING_STATEMENT.to_string()],
            ),
        )
    }

    pub fn add_custom_sql_definition_with_checks(
        self,
        position: CustomSqlDefinitionPosition,
        create_script: impl Into<String>,
        drop_script: impl Into<String>,
        checking_statements: Vec<String>,
    ) -> Self {
        self.add_custom_sql_definition(
            position,
            SqlDefinition::new(create_script, drop_script, checking_statements),
        )
    }

    // ------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------

    /// Replace the enricher chain
    pub fn enrichers(mut self, enrichers: Vec<Arc<dyn SharedSchemaContextEnricher>>) -> Self {
        self.enrichers = enrichers;
        self
    }

    /// Replace the request validators
    pub fn validators(
        mut self,
        validators: Vec<Arc<dyn SharedSchemaContextRequestValidator>>,
    ) -> Self {
        self.validators = validators;
        self
    }

    /// Replace the SQL definition validators, including the default identifier length check
    pub fn sql_definitions_validators(
        mut self,
        validators: Vec<Arc<dyn SqlDefinitionsValidator>>,
    ) -> Self {
        self.sql_definitions_validators = Some(validators);
        self
    }

    /// Skip the default identifier length check (default: false)
    pub fn disable_default_sql_definitions_validators(mut self, disabled: bool) -> Self {
        self.disable_default_sql_definitions_validators = disabled;
        self
    }

    /// Maximum identifier length in bytes (default: 63)
    pub fn identifier_max_length(mut self, length: usize) -> Self {
        self.request.identifier_max_length = length;
        self
    }

    /// Minimum identifier length in bytes (default: 1)
    pub fn identifier_min_length(mut self, length: usize) -> Self {
        self.request.identifier_min_length = length;
        self
    }

    fn resolve_sql_definitions_validators(
        &self,
        request: &SharedSchemaContextRequest,
    ) -> Result<Vec<Arc<dyn SqlDefinitionsValidator>>> {
        match &self.sql_definitions_validators {
            Some(validators) => Ok(validators.clone()),
            None if self.disable_default_sql_definitions_validators => Ok(Vec::new()),
            None => default_sql_definitions_validators(request),
        }
    }

    /// Validate the request, run the enricher chain and validate its output
    ///
    /// Every stage sees the same snapshot of the request taken at the start
    /// of the build; the builder itself is left untouched.
    pub fn build(&self) -> Result<SharedSchemaContext> {
        let request = self.request.snapshot();

        for validator in &self.validators {
            debug!(stage = ?validator, "Validating request");
            if let Err(e) = validator.validate(&request) {
                warn!(stage = ?validator, error = %e, "Request rejected");
                return Err(e);
            }
        }

        let sql_definitions_validators = self
            .resolve_sql_definitions_validators(&request)
            .inspect_err(|e| warn!(error = %e, "Request rejected"))?;

        let mut context = SharedSchemaContext::new();
        for enricher in &self.enrichers {
            context = enricher.enrich(context, &request)?;
            debug!(
                stage = enricher.name(),
                definitions = context.sql_definitions().len(),
                "Enricher applied"
            );
        }

        let violations: Vec<SqlDefinitionViolation> = sql_definitions_validators
            .iter()
            .flat_map(|validator| validator.validate(context.sql_definitions()))
            .collect();
        if !violations.is_empty() {
            warn!(
                violations = violations.len(),
                definitions = context.sql_definitions().len(),
                "Generated SQL definitions rejected"
            );
            return Err(SharedSchemaContextError::InvalidSqlDefinitions {
                violations,
                definitions: context.into_sql_definitions(),
            });
        }

        info!(
            definitions = context.sql_definitions().len(),
            "Shared schema context built"
        );
        Ok(context)
    }
}
