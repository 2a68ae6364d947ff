//! DDL generation for multi-tenant tables
//!
//! Generates the per-table statements: tenant column creation, default value,
//! NOT NULL, row level security switches, policies and CHECK constraints.

use crate::sql::definition::{IdentifierKind, SqlDefinition};
use crate::sql::function::{
    FunctionArgumentValue, PermissionCommandPolicy, RlsExpressionType,
    TenantHasAuthoritiesFunctionInvocationFactory,
};
use crate::sql::sanitize::{identifier, quote_literal, schema_literal};
use crate::types::TableKey;

/// Grantee used when a policy has no explicit role
pub const DEFAULT_POLICY_GRANTEE: &str = "PUBLIC";

fn column_check(table: &TableKey, column: &str, condition: Option<String>) -> String {
    let mut check = format!(
        "SELECT COUNT(1) FROM information_schema.columns WHERE table_catalog = current_database() AND table_schema = {} AND table_name = {} AND column_name = {}",
        schema_literal(table.schema.as_deref()),
        quote_literal(&table.table),
        quote_literal(column)
    );
    if let Some(condition) = condition {
        check.push_str(" AND ");
        check.push_str(&condition);
    }
    check.push(';');
    check
}

fn row_security_check(table: &TableKey, flag: &str) -> String {
    format!(
        "SELECT COUNT(1) FROM pg_class pc, pg_catalog.pg_namespace pn WHERE pc.relname = {} AND pc.relnamespace = pn.oid AND pn.nspname = {} AND pc.{} = 't';",
        quote_literal(&table.table),
        schema_literal(table.schema.as_deref()),
        flag
    )
}

fn check_constraint_check(table: &TableKey, constraint_name: &str) -> String {
    format!(
        "SELECT COUNT(1) FROM information_schema.table_constraints WHERE table_catalog = current_database() AND table_schema = {} AND table_name = {} AND constraint_name = {} AND constraint_type = 'CHECK';",
        schema_literal(table.schema.as_deref()),
        quote_literal(&table.table),
        quote_literal(constraint_name)
    )
}

// ============================================================================
// Tenant column
// ============================================================================

/// Generate `ALTER TABLE .. ADD COLUMN`
pub fn generate_add_column(table: &TableKey, column: &str, column_type: &str) -> SqlDefinition {
    let table_ref = table.reference();
    let column_ref = identifier(column);
    SqlDefinition::new(
        format!("ALTER TABLE {} ADD COLUMN {} {};", table_ref, column_ref, column_type),
        format!("ALTER TABLE {} DROP COLUMN {};", table_ref, column_ref),
        vec![column_check(table, column, None)],
    )
}

/// Generate `ALTER TABLE .. ALTER COLUMN .. SET DEFAULT`
///
/// `default_expression` is stored verbatim, which is what the check compares against.
pub fn generate_set_default(
    table: &TableKey,
    column: &str,
    default_expression: &str,
) -> SqlDefinition {
    let table_ref = table.reference();
    let column_ref = identifier(column);
    SqlDefinition::new(
        format!(
            "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
            table_ref, column_ref, default_expression
        ),
        format!(
            "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
            table_ref, column_ref
        ),
        vec![column_check(
            table,
            column,
            Some(format!("column_default = {}", quote_literal(default_expression))),
        )],
    )
}

/// Generate `ALTER TABLE .. ALTER COLUMN .. SET NOT NULL`
pub fn generate_set_not_null(table: &TableKey, column: &str) -> SqlDefinition {
    let table_ref = table.reference();
    let column_ref = identifier(column);
    SqlDefinition::new(
        format!(
            "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL;",
            table_ref, column_ref
        ),
        format!(
            "ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL;",
            table_ref, column_ref
        ),
        vec![column_check(table, column, Some("is_nullable = 'NO'".to_string()))],
    )
}

// ============================================================================
// Row level security switches
// ============================================================================

/// Generate `ALTER TABLE .. ENABLE ROW LEVEL SECURITY`
pub fn generate_enable_row_level_security(table: &TableKey) -> SqlDefinition {
    let table_ref = table.reference();
    SqlDefinition::new(
        format!("ALTER TABLE {} ENABLE ROW LEVEL SECURITY;", table_ref),
        format!("ALTER TABLE {} DISABLE ROW LEVEL SECURITY;", table_ref),
        vec![row_security_check(table, "relrowsecurity")],
    )
}

/// Generate `ALTER TABLE .. FORCE ROW LEVEL SECURITY` (applies policies to the table owner)
pub fn generate_force_row_level_security(table: &TableKey) -> SqlDefinition {
    let table_ref = table.reference();
    SqlDefinition::new(
        format!("ALTER TABLE {} FORCE ROW LEVEL SECURITY;", table_ref),
        format!("ALTER TABLE {} NO FORCE ROW LEVEL SECURITY;", table_ref),
        vec![row_security_check(table, "relforcerowsecurity")],
    )
}

// ============================================================================
// Row level security policy
// ============================================================================

#[derive(Debug, Clone)]
pub struct RlsPolicyParameters<'a> {
    pub policy_name: String,
    pub table: TableKey,
    pub tenant_column: String,
    /// `None` targets `PUBLIC`
    pub grantee: Option<String>,
    pub command: PermissionCommandPolicy,
    pub tenant_has_authorities: &'a dyn TenantHasAuthoritiesFunctionInvocationFactory,
}

/// Generate `CREATE POLICY` whose clauses call the tenant-has-authorities function
pub fn generate_rls_policy(params: &RlsPolicyParameters<'_>) -> SqlDefinition {
    let table_ref = params.table.reference();
    let policy_ref = identifier(&params.policy_name);
    let grantee = params
        .grantee
        .as_deref()
        .map(identifier)
        .unwrap_or_else(|| DEFAULT_POLICY_GRANTEE.to_string());
    let tenant = FunctionArgumentValue::reference(identifier(&params.tenant_column));

    let mut lines = vec![
        format!("CREATE POLICY {} ON {}", policy_ref, table_ref),
        format!("FOR {}", params.command.as_sql()),
        format!("TO {}", grantee),
    ];
    if params.command.has_using_expression() {
        lines.push(format!(
            "USING ({})",
            params.tenant_has_authorities.tenant_has_authorities_invocation(
                &tenant,
                params.command,
                RlsExpressionType::Using,
                &params.table,
            )
        ));
    }
    if params.command.has_with_check_expression() {
        lines.push(format!(
            "WITH CHECK ({})",
            params.tenant_has_authorities.tenant_has_authorities_invocation(
                &tenant,
                params.command,
                RlsExpressionType::WithCheck,
                &params.table,
            )
        ));
    }

    let check = format!(
        "SELECT COUNT(1) FROM pg_catalog.pg_policy pg, pg_class pc, pg_catalog.pg_namespace pn WHERE pg.polrelid = pc.oid AND pc.relnamespace = pn.oid AND pg.polname = {} AND pc.relname = {} AND pn.nspname = {};",
        quote_literal(&params.policy_name),
        quote_literal(&params.table.table),
        schema_literal(params.table.schema.as_deref())
    );
    SqlDefinition::new(
        format!("{};", lines.join("\n")),
        format!("DROP POLICY IF EXISTS {} ON {};", policy_ref, table_ref),
        vec![check],
    )
    .with_identifier(IdentifierKind::Policy, params.policy_name.clone())
}

// ============================================================================
// CHECK constraints
// ============================================================================

/// Generate `ALTER TABLE .. ADD CONSTRAINT .. CHECK (..)`
pub fn generate_check_constraint(
    table: &TableKey,
    constraint_name: &str,
    condition: &str,
) -> SqlDefinition {
    let table_ref = table.reference();
    let constraint_ref = identifier(constraint_name);
    SqlDefinition::new(
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({});",
            table_ref, constraint_ref, condition
        ),
        format!(
            "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
            table_ref, constraint_ref
        ),
        vec![check_constraint_check(table, constraint_name)],
    )
    .with_identifier(IdentifierKind::Constraint, constraint_name)
}

/// Condition of a same-tenant foreign key constraint
///
/// Rows with any NULL foreign key column pass, mirroring `MATCH SIMPLE` foreign keys.
pub fn same_tenant_condition<'a>(
    foreign_key_columns: impl IntoIterator<Item = &'a String>,
    record_belongs_invocation: &str,
) -> String {
    let nulls: Vec<String> = foreign_key_columns
        .into_iter()
        .map(|column| format!("{} IS NULL", identifier(column)))
        .collect();
    format!("({}) OR ({})", nulls.join(" OR "), record_belongs_invocation)
}

/// Condition of the tenant identifier blacklist constraint
pub fn valid_tenant_condition(tenant_column: &str, is_tenant_valid_invocation: &str) -> String {
    format!(
        "{} IS NULL OR {}",
        identifier(tenant_column),
        is_tenant_valid_invocation
    )
}
