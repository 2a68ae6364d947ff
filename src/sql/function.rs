//! Tenant function generation
//!
//! Produces the SQL functions that read and write the current tenant,
//! compare identifiers against it and check record ownership. Every produced
//! definition doubles as an invocation factory so that later stages can embed
//! calls without knowing how the function was named.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, SharedSchemaContextError};
use crate::sql::definition::{IdentifierKind, SqlDefinition};
use crate::sql::sanitize::{identifier, qualified_name, quote_literal, schema_literal};
use crate::types::TableKey;

/// Tenant identifier type used when none is declared
pub const DEFAULT_TENANT_ID_PROPERTY_TYPE: &str = "VARCHAR(255)";

/// Type of the descriptive arguments of the tenant-has-authorities function
const AUTHORITY_ARGUMENT_TYPE: &str = "VARCHAR(255)";

// ============================================================================
// Arguments and references
// ============================================================================

/// Argument passed to a generated function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionArgumentValue {
    /// Rendered as a single-quoted literal
    String(String),
    /// Rendered verbatim: a column reference, expression or numeric literal
    Reference(String),
}

impl FunctionArgumentValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn reference(value: impl Into<String>) -> Self {
        Self::Reference(value.into())
    }

    pub fn to_sql(&self) -> String {
        match self {
            Self::String(value) => quote_literal(value),
            Self::Reference(value) => value.clone(),
        }
    }
}

/// Command a row level security policy applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionCommandPolicy {
    All,
    Select,
    Insert,
    Update,
    Delete,
}

impl PermissionCommandPolicy {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Whether the policy accepts a `USING` expression
    pub fn has_using_expression(&self) -> bool {
        !matches!(self, Self::Insert)
    }

    /// Whether the policy accepts a `WITH CHECK` expression
    pub fn has_with_check_expression(&self) -> bool {
        !matches!(self, Self::Select | Self::Delete)
    }
}

/// Policy clause a tenant-has-authorities invocation is evaluated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RlsExpressionType {
    Using,
    WithCheck,
}

impl RlsExpressionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Using => "USING",
            Self::WithCheck => "WITH_CHECK",
        }
    }
}

/// Name and schema of a generated function
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionReference {
    pub schema: Option<String>,
    pub name: String,
}

impl FunctionReference {
    pub fn new(name: impl Into<String>, schema: Option<&str>) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.into(),
        }
    }

    /// Function reference as used in SQL
    pub fn reference(&self) -> String {
        qualified_name(self.schema.as_deref(), &self.name)
    }

    fn invocation(&self, arguments: &[String]) -> String {
        format!("{}({})", self.reference(), arguments.join(", "))
    }
}

/// Generated function: reference, argument types and SQL definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    reference: FunctionReference,
    argument_types: Vec<String>,
    sql_definition: SqlDefinition,
}

impl FunctionDefinition {
    fn new(
        reference: FunctionReference,
        argument_types: Vec<String>,
        create_script: String,
    ) -> Self {
        let drop_script = format!(
            "DROP FUNCTION IF EXISTS {}({});",
            reference.reference(),
            argument_types.join(", ")
        );
        let check = format!(
            "SELECT COUNT(1) FROM pg_proc pg, pg_catalog.pg_namespace pgn \
             WHERE pg.proname = {} AND pgn.nspname = {} AND pg.pronamespace = pgn.oid;",
            quote_literal(&reference.name),
            schema_literal(reference.schema.as_deref())
        );
        let sql_definition = SqlDefinition::new(create_script, drop_script, vec![check])
            .with_identifier(IdentifierKind::Function, reference.name.clone());
        Self {
            reference,
            argument_types,
            sql_definition,
        }
    }

    pub fn reference(&self) -> &FunctionReference {
        &self.reference
    }

    pub fn argument_types(&self) -> &[String] {
        &self.argument_types
    }

    pub fn sql_definition(&self) -> &SqlDefinition {
        &self.sql_definition
    }
}

// ============================================================================
// Invocation factories
// ============================================================================

/// Builds `get_current_tenant_id()` style expressions
pub trait GetCurrentTenantIdFunctionInvocationFactory: fmt::Debug + Send + Sync {
    fn get_current_tenant_id_invocation(&self) -> String;
}

/// Builds `set_current_tenant_id('value')` style expressions
pub trait SetCurrentTenantIdFunctionInvocationFactory: fmt::Debug + Send + Sync {
    fn set_current_tenant_id_invocation(&self, tenant: &FunctionArgumentValue) -> String;
}

/// Builds expressions comparing a value with the current tenant
pub trait EqualsCurrentTenantIdentifierFunctionInvocationFactory: fmt::Debug + Send + Sync {
    fn equals_current_tenant_identifier_invocation(&self, value: &FunctionArgumentValue) -> String;
}

/// Builds the predicate used in row level security policies
pub trait TenantHasAuthoritiesFunctionInvocationFactory: fmt::Debug + Send + Sync {
    fn tenant_has_authorities_invocation(
        &self,
        tenant: &FunctionArgumentValue,
        command: PermissionCommandPolicy,
        expression: RlsExpressionType,
        table: &TableKey,
    ) -> String;
}

/// Builds expressions checking that a record belongs to the current tenant
pub trait IsRecordBelongsToCurrentTenantFunctionInvocationFactory:
    fmt::Debug + Send + Sync
{
    /// `primary_key_values` maps every primary key column to the value passed for it
    fn is_record_belongs_to_current_tenant_invocation(
        &self,
        primary_key_values: &BTreeMap<String, FunctionArgumentValue>,
    ) -> Result<String>;
}

/// Builds expressions checking a tenant identifier against the blacklist
pub trait IsTenantValidFunctionInvocationFactory: fmt::Debug + Send + Sync {
    fn is_tenant_identifier_valid_invocation(&self, value: &FunctionArgumentValue) -> String;
}

// ============================================================================
// Get current tenant
// ============================================================================

#[derive(Debug, Clone)]
pub struct GetCurrentTenantIdFunctionParameters {
    pub function_name: String,
    pub schema: Option<String>,
    pub current_tenant_id_property: String,
    /// Explicitly declared tenant type; the setting value is cast to it
    pub current_tenant_id_property_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetCurrentTenantIdFunctionDefinition {
    function: FunctionDefinition,
}

impl GetCurrentTenantIdFunctionDefinition {
    pub fn function(&self) -> &FunctionDefinition {
        &self.function
    }
}

impl GetCurrentTenantIdFunctionInvocationFactory for GetCurrentTenantIdFunctionDefinition {
    fn get_current_tenant_id_invocation(&self) -> String {
        self.function.reference.invocation(&[])
    }
}

pub fn generate_get_current_tenant_id_function(
    params: &GetCurrentTenantIdFunctionParameters,
) -> GetCurrentTenantIdFunctionDefinition {
    let reference = FunctionReference::new(&params.function_name, params.schema.as_deref());
    let setting = format!(
        "current_setting({})",
        quote_literal(&params.current_tenant_id_property)
    );
    let (return_type, body) = match &params.current_tenant_id_property_type {
        Some(property_type) => (
            property_type.as_str(),
            format!("CAST({} AS {})", setting, property_type),
        ),
        None => (DEFAULT_TENANT_ID_PROPERTY_TYPE, setting),
    };
    let create = format!(
        "CREATE OR REPLACE FUNCTION {}() RETURNS {} AS $$\nSELECT {}\n$$ LANGUAGE sql\nSTABLE\nPARALLEL SAFE;",
        reference.reference(),
        return_type,
        body
    );
    GetCurrentTenantIdFunctionDefinition {
        function: FunctionDefinition::new(reference, vec![], create),
    }
}

// ============================================================================
// Set current tenant
// ============================================================================

#[derive(Debug, Clone)]
pub struct SetCurrentTenantIdFunctionParameters {
    pub function_name: String,
    pub schema: Option<String>,
    pub current_tenant_id_property: String,
    pub current_tenant_id_property_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCurrentTenantIdFunctionDefinition {
    function: FunctionDefinition,
}

impl SetCurrentTenantIdFunctionDefinition {
    pub fn function(&self) -> &FunctionDefinition {
        &self.function
    }
}

impl SetCurrentTenantIdFunctionInvocationFactory for SetCurrentTenantIdFunctionDefinition {
    fn set_current_tenant_id_invocation(&self, tenant: &FunctionArgumentValue) -> String {
        self.function.reference.invocation(&[tenant.to_sql()])
    }
}

pub fn generate_set_current_tenant_id_function(
    params: &SetCurrentTenantIdFunctionParameters,
) -> SetCurrentTenantIdFunctionDefinition {
    let reference = FunctionReference::new(&params.function_name, params.schema.as_deref());
    let create = format!(
        "CREATE OR REPLACE FUNCTION {}({}) RETURNS VOID AS $$\nBEGIN\nPERFORM set_config({}, $1::text, false);\nEND\n$$ LANGUAGE plpgsql\nVOLATILE;",
        reference.reference(),
        params.current_tenant_id_property_type,
        quote_literal(&params.current_tenant_id_property)
    );
    SetCurrentTenantIdFunctionDefinition {
        function: FunctionDefinition::new(
            reference,
            vec![params.current_tenant_id_property_type.clone()],
            create,
        ),
    }
}

// ============================================================================
// Equals current tenant
// ============================================================================

#[derive(Debug, Clone)]
pub struct EqualsCurrentTenantIdentifierFunctionParameters<'a> {
    pub function_name: String,
    pub schema: Option<String>,
    pub argument_type: String,
    pub get_current_tenant_id: &'a dyn GetCurrentTenantIdFunctionInvocationFactory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualsCurrentTenantIdentifierFunctionDefinition {
    function: FunctionDefinition,
}

impl EqualsCurrentTenantIdentifierFunctionDefinition {
    pub fn function(&self) -> &FunctionDefinition {
        &self.function
    }
}

impl EqualsCurrentTenantIdentifierFunctionInvocationFactory
    for EqualsCurrentTenantIdentifierFunctionDefinition
{
    fn equals_current_tenant_identifier_invocation(&self, value: &FunctionArgumentValue) -> String {
        self.function.reference.invocation(&[value.to_sql()])
    }
}

pub fn generate_equals_current_tenant_identifier_function(
    params: &EqualsCurrentTenantIdentifierFunctionParameters<'_>,
) -> EqualsCurrentTenantIdentifierFunctionDefinition {
    let reference = FunctionReference::new(&params.function_name, params.schema.as_deref());
    let create = format!(
        "CREATE OR REPLACE FUNCTION {}({}) RETURNS BOOLEAN AS $$\nSELECT $1 = {}\n$$ LANGUAGE sql\nSTABLE\nPARALLEL SAFE;",
        reference.reference(),
        params.argument_type,
        params.get_current_tenant_id.get_current_tenant_id_invocation()
    );
    EqualsCurrentTenantIdentifierFunctionDefinition {
        function: FunctionDefinition::new(reference, vec![params.argument_type.clone()], create),
    }
}

// ============================================================================
// Tenant has authorities
// ============================================================================

#[derive(Debug, Clone)]
pub struct TenantHasAuthoritiesFunctionParameters<'a> {
    pub function_name: String,
    pub schema: Option<String>,
    pub argument_type: String,
    pub equals_current_tenant_identifier:
        &'a dyn EqualsCurrentTenantIdentifierFunctionInvocationFactory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantHasAuthoritiesFunctionDefinition {
    function: FunctionDefinition,
}

impl TenantHasAuthoritiesFunctionDefinition {
    pub fn function(&self) -> &FunctionDefinition {
        &self.function
    }
}

impl TenantHasAuthoritiesFunctionInvocationFactory for TenantHasAuthoritiesFunctionDefinition {
    fn tenant_has_authorities_invocation(
        &self,
        tenant: &FunctionArgumentValue,
        command: PermissionCommandPolicy,
        expression: RlsExpressionType,
        table: &TableKey,
    ) -> String {
        self.function.reference.invocation(&[
            tenant.to_sql(),
            quote_literal(command.as_sql()),
            quote_literal(expression.as_str()),
            quote_literal(&table.table),
            table_schema_argument(table),
        ])
    }
}

/// Schema argument naming the policy's table
///
/// Without an explicit schema the table's namespace is looked up through a
/// `regclass` constant. The constant is bound when the policy is created, so
/// the session search path at query time does not change the result.
fn table_schema_argument(table: &TableKey) -> String {
    match &table.schema {
        Some(schema) => quote_literal(schema),
        None => format!(
            "(SELECT relnamespace::regnamespace::text FROM pg_catalog.pg_class \
             WHERE oid = {}::regclass)",
            quote_literal(&table.reference())
        ),
    }
}

/// Function arguments: tenant, command, clause, table, schema.
/// Only the tenant is evaluated; the rest lets overrides grant per-table authority.
pub fn generate_tenant_has_authorities_function(
    params: &TenantHasAuthoritiesFunctionParameters<'_>,
) -> TenantHasAuthoritiesFunctionDefinition {
    let reference = FunctionReference::new(&params.function_name, params.schema.as_deref());
    let mut argument_types = vec![params.argument_type.clone()];
    argument_types.extend(std::iter::repeat_n(AUTHORITY_ARGUMENT_TYPE.to_string(), 4));
    let create = format!(
        "CREATE OR REPLACE FUNCTION {}({}) RETURNS BOOLEAN AS $$\nSELECT {}\n$$ LANGUAGE sql\nSTABLE\nPARALLEL SAFE;",
        reference.reference(),
        argument_types.join(", "),
        params
            .equals_current_tenant_identifier
            .equals_current_tenant_identifier_invocation(&FunctionArgumentValue::reference("$1"))
    );
    TenantHasAuthoritiesFunctionDefinition {
        function: FunctionDefinition::new(reference, argument_types, create),
    }
}

// ============================================================================
// Is record belongs to current tenant
// ============================================================================

#[derive(Debug, Clone)]
pub struct IsRecordBelongsToCurrentTenantFunctionParameters<'a> {
    pub function_name: String,
    pub table: TableKey,
    pub tenant_column: String,
    /// Primary key column name to SQL type, in argument order
    pub primary_key_columns: BTreeMap<String, String>,
    pub get_current_tenant_id: &'a dyn GetCurrentTenantIdFunctionInvocationFactory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsRecordBelongsToCurrentTenantFunctionDefinition {
    function: FunctionDefinition,
    primary_key_columns: Vec<String>,
}

impl IsRecordBelongsToCurrentTenantFunctionDefinition {
    pub fn function(&self) -> &FunctionDefinition {
        &self.function
    }

    /// Primary key columns in argument order
    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key_columns
    }
}

impl IsRecordBelongsToCurrentTenantFunctionInvocationFactory
    for IsRecordBelongsToCurrentTenantFunctionDefinition
{
    fn is_record_belongs_to_current_tenant_invocation(
        &self,
        primary_key_values: &BTreeMap<String, FunctionArgumentValue>,
    ) -> Result<String> {
        let mut arguments = Vec::with_capacity(self.primary_key_columns.len());
        for column in &self.primary_key_columns {
            let value = primary_key_values.get(column).ok_or_else(|| {
                SharedSchemaContextError::internal(format!(
                    "no value for primary key column '{}' of function '{}'",
                    column, self.function.reference.name
                ))
            })?;
            arguments.push(value.to_sql());
        }
        if primary_key_values.len() != arguments.len() {
            return Err(SharedSchemaContextError::internal(format!(
                "function '{}' takes {} primary key values, got {}",
                self.function.reference.name,
                arguments.len(),
                primary_key_values.len()
            )));
        }
        Ok(self.function.reference.invocation(&arguments))
    }
}

pub fn generate_is_record_belongs_to_current_tenant_function(
    params: &IsRecordBelongsToCurrentTenantFunctionParameters<'_>,
) -> IsRecordBelongsToCurrentTenantFunctionDefinition {
    let reference = FunctionReference::new(&params.function_name, params.table.schema.as_deref());
    let mut conditions: Vec<String> = params
        .primary_key_columns
        .keys()
        .enumerate()
        .map(|(index, column)| format!("rt.{} = ${}", identifier(column), index + 1))
        .collect();
    conditions.push(format!(
        "rt.{} = {}",
        identifier(&params.tenant_column),
        params.get_current_tenant_id.get_current_tenant_id_invocation()
    ));
    let argument_types: Vec<String> = params.primary_key_columns.values().cloned().collect();
    let create = format!(
        "CREATE OR REPLACE FUNCTION {}({}) RETURNS BOOLEAN AS $$\nSELECT EXISTS (\n\tSELECT 1 FROM {} rt WHERE {}\n)\n$$ LANGUAGE sql\nSTABLE\nPARALLEL SAFE;",
        reference.reference(),
        argument_types.join(", "),
        params.table.reference(),
        conditions.join(" AND ")
    );
    IsRecordBelongsToCurrentTenantFunctionDefinition {
        function: FunctionDefinition::new(reference, argument_types, create),
        primary_key_columns: params.primary_key_columns.keys().cloned().collect(),
    }
}

// ============================================================================
// Is tenant identifier valid
// ============================================================================

#[derive(Debug, Clone)]
pub struct IsTenantValidFunctionParameters {
    pub function_name: String,
    pub schema: Option<String>,
    pub argument_type: String,
    pub tenant_identifiers_blacklist: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsTenantValidFunctionDefinition {
    function: FunctionDefinition,
}

impl IsTenantValidFunctionDefinition {
    pub fn function(&self) -> &FunctionDefinition {
        &self.function
    }
}

impl IsTenantValidFunctionInvocationFactory for IsTenantValidFunctionDefinition {
    fn is_tenant_identifier_valid_invocation(&self, value: &FunctionArgumentValue) -> String {
        self.function.reference.invocation(&[value.to_sql()])
    }
}

pub fn generate_is_tenant_valid_function(
    params: &IsTenantValidFunctionParameters,
) -> IsTenantValidFunctionDefinition {
    let reference = FunctionReference::new(&params.function_name, params.schema.as_deref());
    let blacklist: Vec<String> = params
        .tenant_identifiers_blacklist
        .iter()
        .map(|value| quote_literal(value))
        .collect();
    let create = format!(
        "CREATE OR REPLACE FUNCTION {}({}) RETURNS BOOLEAN AS $$\nSELECT $1 <> ALL (ARRAY[{}]::{}[])\n$$ LANGUAGE sql\nIMMUTABLE\nPARALLEL SAFE;",
        reference.reference(),
        params.argument_type,
        blacklist.join(", "),
        params.argument_type
    );
    IsTenantValidFunctionDefinition {
        function: FunctionDefinition::new(reference, vec![params.argument_type.clone()], create),
    }
}
