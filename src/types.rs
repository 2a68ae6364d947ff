//! Core type definitions for shared schema requests
//!
//! Includes table keys, per-table column metadata, same-tenant foreign key
//! constraints and custom SQL definition positions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sql::definition::SqlDefinition;
use crate::sql::sanitize::qualified_name;

// ============================================================================
// Table identity
// ============================================================================

/// Schema-qualified table identity, used as a mapping key throughout the request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableKey {
    /// Schema name; `None` means the connection's current schema
    pub schema: Option<String>,
    /// Table name
    pub table: String,
}

impl TableKey {
    pub fn new(table: impl Into<String>, schema: Option<&str>) -> Self {
        Self {
            schema: schema.map(str::to_string),
            table: table.into(),
        }
    }

    /// Table reference as used in DDL (`schema.table` or `table`)
    pub fn reference(&self) -> String {
        qualified_name(self.schema.as_deref(), &self.table)
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.table),
            None => f.write_str(&self.table),
        }
    }
}

// ============================================================================
// Per-table properties
// ============================================================================

/// Column metadata of a multi-tenant table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumns {
    /// Tenant column name; `None` falls back to the request's default tenant column
    pub tenant_column_name: Option<String>,
    /// Primary key column name to SQL type
    pub primary_key_columns: BTreeMap<String, String>,
}

impl TableColumns {
    pub fn new(
        tenant_column_name: Option<String>,
        primary_key_columns: BTreeMap<String, String>,
    ) -> Self {
        Self {
            tenant_column_name,
            primary_key_columns,
        }
    }
}

/// Row level security policy properties of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRlsPolicyProperties {
    pub policy_name: String,
}

// ============================================================================
// Same-tenant foreign key constraints
// ============================================================================

/// Identity of a same-tenant constraint: referencing table, referenced table and FK columns
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SameTenantConstraintKey {
    pub main_table: TableKey,
    pub foreign_key_table: TableKey,
    pub foreign_key_columns: BTreeSet<String>,
}

/// Properties of a same-tenant constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SameTenantConstraintProperties {
    pub constraint_name: String,
    /// Foreign key column (main table) to primary key column (foreign table)
    pub foreign_key_primary_key_columns_mappings: BTreeMap<String, String>,
}

// ============================================================================
// Tenant identifier blacklist
// ============================================================================

/// Configuration of the CHECK constraint that rejects blacklisted tenant identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidTenantValueConstraint {
    pub tenant_identifiers_blacklist: Vec<String>,
    pub is_tenant_valid_function_name: String,
    pub is_tenant_valid_constraint_name: String,
}

// ============================================================================
// Custom SQL definitions
// ============================================================================

/// Where a custom SQL definition is placed in the output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CustomSqlDefinitionPosition {
    /// Before every generated definition
    AtBeginning,
    /// After every generated definition
    AtEnd,
    /// Consumed by a caller-placed enricher registered for the same label
    Custom(String),
}

/// Custom definition paired with its position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSqlDefinitionPair {
    pub position: CustomSqlDefinitionPosition,
    pub definition: SqlDefinition,
}
