//! Shared schema context request
//!
//! The request is the mutable description of the desired multi-tenant schema.
//! The builder owns it while it is being configured; `build()` works on an
//! immutable [`SharedSchemaContextRequest::snapshot`].

use std::collections::{BTreeMap, BTreeSet};

use crate::sql::function::DEFAULT_TENANT_ID_PROPERTY_TYPE;
use crate::types::{
    CustomSqlDefinitionPair, SameTenantConstraintKey, SameTenantConstraintProperties,
    TableColumns, TableKey, TableRlsPolicyProperties, ValidTenantValueConstraint,
};

pub const DEFAULT_CURRENT_TENANT_ID_PROPERTY: &str = "app.current_tenant_id";
pub const DEFAULT_GET_CURRENT_TENANT_ID_FUNCTION_NAME: &str = "get_current_tenant_id";
pub const DEFAULT_SET_CURRENT_TENANT_ID_FUNCTION_NAME: &str = "set_current_tenant_id";
pub const DEFAULT_EQUALS_CURRENT_TENANT_IDENTIFIER_FUNCTION_NAME: &str =
    "is_id_equals_current_tenant_id";
pub const DEFAULT_TENANT_HAS_AUTHORITIES_FUNCTION_NAME: &str = "tenant_has_authorities";
pub const DEFAULT_TENANT_ID_COLUMN: &str = "tenant_id";
pub const DEFAULT_IS_TENANT_VALID_FUNCTION_NAME: &str = "is_tenant_identifier_valid";
pub const DEFAULT_IS_TENANT_VALID_CONSTRAINT_NAME: &str = "tenant_identifier_valid";
/// PostgreSQL truncates identifiers longer than 63 bytes
pub const DEFAULT_IDENTIFIER_MAX_LENGTH: usize = 63;
pub const DEFAULT_IDENTIFIER_MIN_LENGTH: usize = 1;

/// Desired multi-tenant schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedSchemaContextRequest {
    /// Schema for generated functions and for tables registered by name
    pub default_schema: Option<String>,
    /// Configuration parameter that holds the current tenant
    pub current_tenant_id_property: String,
    /// Explicitly declared tenant identifier type
    pub current_tenant_id_property_type: Option<String>,
    pub get_current_tenant_id_function_name: String,
    pub set_current_tenant_id_function_name: String,
    pub equals_current_tenant_identifier_function_name: String,
    pub tenant_has_authorities_function_name: String,
    pub force_row_level_security_for_table_owner: bool,
    pub default_tenant_id_column: String,
    /// Role the policies apply to; `None` means `PUBLIC`
    pub grantee: Option<String>,
    pub table_columns: BTreeMap<TableKey, TableColumns>,
    pub table_rls_policies: BTreeMap<TableKey, TableRlsPolicyProperties>,
    pub create_tenant_column_tables: BTreeSet<TableKey>,
    pub same_tenant_constraints: BTreeMap<SameTenantConstraintKey, SameTenantConstraintProperties>,
    pub record_belongs_function_names: BTreeMap<TableKey, String>,
    /// `Some` enables the tenant identifier blacklist constraint
    pub valid_tenant_value_constraint: Option<ValidTenantValueConstraint>,
    pub valid_tenant_value_constraint_names: BTreeMap<TableKey, String>,
    pub current_tenant_identifier_as_default_value_for_tenant_column_in_all_tables: bool,
    pub tables_without_tenant_column_default: BTreeSet<TableKey>,
    pub custom_sql_definitions: Vec<CustomSqlDefinitionPair>,
    pub identifier_min_length: usize,
    pub identifier_max_length: usize,
}

impl Default for SharedSchemaContextRequest {
    fn default() -> Self {
        Self {
            default_schema: None,
            current_tenant_id_property: DEFAULT_CURRENT_TENANT_ID_PROPERTY.to_string(),
            current_tenant_id_property_type: None,
            get_current_tenant_id_function_name: DEFAULT_GET_CURRENT_TENANT_ID_FUNCTION_NAME
                .to_string(),
            set_current_tenant_id_function_name: DEFAULT_SET_CURRENT_TENANT_ID_FUNCTION_NAME
                .to_string(),
            equals_current_tenant_identifier_function_name:
                DEFAULT_EQUALS_CURRENT_TENANT_IDENTIFIER_FUNCTION_NAME.to_string(),
            tenant_has_authorities_function_name: DEFAULT_TENANT_HAS_AUTHORITIES_FUNCTION_NAME
                .to_string(),
            force_row_level_security_for_table_owner: false,
            default_tenant_id_column: DEFAULT_TENANT_ID_COLUMN.to_string(),
            grantee: None,
            table_columns: BTreeMap::new(),
            table_rls_policies: BTreeMap::new(),
            create_tenant_column_tables: BTreeSet::new(),
            same_tenant_constraints: BTreeMap::new(),
            record_belongs_function_names: BTreeMap::new(),
            valid_tenant_value_constraint: None,
            valid_tenant_value_constraint_names: BTreeMap::new(),
            current_tenant_identifier_as_default_value_for_tenant_column_in_all_tables: false,
            tables_without_tenant_column_default: BTreeSet::new(),
            custom_sql_definitions: Vec::new(),
            identifier_min_length: DEFAULT_IDENTIFIER_MIN_LENGTH,
            identifier_max_length: DEFAULT_IDENTIFIER_MAX_LENGTH,
        }
    }
}

impl SharedSchemaContextRequest {
    pub fn new(default_schema: Option<&str>) -> Self {
        Self {
            default_schema: default_schema.map(str::to_string),
            ..Self::default()
        }
    }

    /// Independent deep copy handed to validators and enrichers
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Key for a table registered by name, in the default schema
    pub fn table_key(&self, table: &str) -> TableKey {
        TableKey::new(table, self.default_schema.as_deref())
    }

    /// Declared tenant type, or `VARCHAR(255)`
    pub fn resolved_current_tenant_id_property_type(&self) -> &str {
        self.current_tenant_id_property_type
            .as_deref()
            .unwrap_or(DEFAULT_TENANT_ID_PROPERTY_TYPE)
    }

    /// Tenant column of a table, falling back to the default tenant column
    pub fn tenant_column(&self, table: &TableKey) -> &str {
        self.table_columns
            .get(table)
            .and_then(|columns| columns.tenant_column_name.as_deref())
            .unwrap_or(&self.default_tenant_id_column)
    }

    /// Name of the function that checks that a record of `table` belongs to the current tenant
    pub fn record_belongs_function_name(&self, table: &TableKey) -> String {
        self.record_belongs_function_names
            .get(table)
            .cloned()
            .unwrap_or_else(|| format!("is_{}_belongs_to_current_tenant", table.table))
    }

    /// Name of the blacklist constraint on `table`, if the blacklist is enabled
    pub fn valid_tenant_value_constraint_name(&self, table: &TableKey) -> Option<String> {
        let constraint = self.valid_tenant_value_constraint.as_ref()?;
        Some(
            self.valid_tenant_value_constraint_names
                .get(table)
                .cloned()
                .unwrap_or_else(|| constraint.is_tenant_valid_constraint_name.clone()),
        )
    }

    /// Whether the table is excluded from tenant column default generation
    pub fn tenant_column_default_skipped(&self, table: &TableKey) -> bool {
        self.tables_without_tenant_column_default.contains(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_columns(tenant: Option<&str>) -> TableColumns {
        let mut pk = BTreeMap::new();
        pk.insert("id".to_string(), "bigint".to_string());
        TableColumns::new(tenant.map(str::to_string), pk)
    }

    #[test]
    fn test_default_request() {
        let request = SharedSchemaContextRequest::default();
        assert_eq!(request.default_schema, None);
        assert_eq!(request.current_tenant_id_property, "app.current_tenant_id");
        assert_eq!(request.get_current_tenant_id_function_name, "get_current_tenant_id");
        assert_eq!(request.default_tenant_id_column, "tenant_id");
        assert_eq!(request.identifier_min_length, 1);
        assert_eq!(request.identifier_max_length, 63);
        assert!(!request.force_row_level_security_for_table_owner);
        assert!(request.valid_tenant_value_constraint.is_none());
    }

    #[test]
    fn test_table_key_uses_default_schema() {
        let request = SharedSchemaContextRequest::new(Some("app"));
        assert_eq!(request.table_key("users"), TableKey::new("users", Some("app")));
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut request = SharedSchemaContextRequest::default();
        let snapshot = request.snapshot();
        request
            .create_tenant_column_tables
            .insert(TableKey::new("users", None));
        request.grantee = Some("app_user".to_string());

        assert!(snapshot.create_tenant_column_tables.is_empty());
        assert_eq!(snapshot.grantee, None);
        assert_ne!(snapshot, request);
    }

    #[test]
    fn test_resolved_property_type() {
        let mut request = SharedSchemaContextRequest::default();
        assert_eq!(request.resolved_current_tenant_id_property_type(), "VARCHAR(255)");
        request.current_tenant_id_property_type = Some("uuid".to_string());
        assert_eq!(request.resolved_current_tenant_id_property_type(), "uuid");
    }

    #[test]
    fn test_tenant_column_fallback() {
        let mut request = SharedSchemaContextRequest::default();
        let users = TableKey::new("users", None);
        let posts = TableKey::new("posts", None);
        request.table_columns.insert(users.clone(), users_columns(Some("tenant")));
        request.table_columns.insert(posts.clone(), users_columns(None));

        assert_eq!(request.tenant_column(&users), "tenant");
        assert_eq!(request.tenant_column(&posts), "tenant_id");
        assert_eq!(request.tenant_column(&TableKey::new("other", None)), "tenant_id");
    }

    #[test]
    fn test_record_belongs_function_name() {
        let mut request = SharedSchemaContextRequest::default();
        let users = TableKey::new("users", None);
        assert_eq!(
            request.record_belongs_function_name(&users),
            "is_users_belongs_to_current_tenant"
        );
        request
            .record_belongs_function_names
            .insert(users.clone(), "user_owned".to_string());
        assert_eq!(request.record_belongs_function_name(&users), "user_owned");
    }

    #[test]
    fn test_valid_tenant_value_constraint_name() {
        let mut request = SharedSchemaContextRequest::default();
        let users = TableKey::new("users", None);
        let posts = TableKey::new("posts", None);
        assert_eq!(request.valid_tenant_value_constraint_name(&users), None);

        request.valid_tenant_value_constraint = Some(ValidTenantValueConstraint {
            tenant_identifiers_blacklist: vec!["invalid".to_string()],
            is_tenant_valid_function_name: DEFAULT_IS_TENANT_VALID_FUNCTION_NAME.to_string(),
            is_tenant_valid_constraint_name: DEFAULT_IS_TENANT_VALID_CONSTRAINT_NAME.to_string(),
        });
        request
            .valid_tenant_value_constraint_names
            .insert(posts.clone(), "posts_tenant_valid".to_string());

        assert_eq!(
            request.valid_tenant_value_constraint_name(&users).as_deref(),
            Some("tenant_identifier_valid")
        );
        assert_eq!(
            request.valid_tenant_value_constraint_name(&posts).as_deref(),
            Some("posts_tenant_valid")
        );
    }
}
