//! Integration tests for shared-schema-rls
//!
//! These tests exercise the public builder API end to end. Nothing is
//! executed against a database; the generated SQL is inspected as text.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use shared_schema_rls::sql::IdentifierKind;
use shared_schema_rls::{
    CustomSqlDefinitionPosition, CustomSqlDefinitionsEnricher, DefaultSharedSchemaContextBuilder,
    FunctionArgumentValue, RequestRule, SharedSchemaContextConfiguration,
    SharedSchemaContextEnricher, SharedSchemaContextError, SqlDefinition, TableKey,
    default_enrichers,
};

/// Users and posts, posts referencing users through a same-tenant constraint
fn blog_builder() -> DefaultSharedSchemaContextBuilder {
    DefaultSharedSchemaContextBuilder::with_default_schema("blog")
        .current_tenant_id_property("blog.tenant")
        .force_row_level_security_for_table_owner(true)
        .create_tenant_column_for_table("users")
        .create_tenant_column_for_table("posts")
        .create_rls_policy_for_table("users", [("id", "bigint")], None, "users_rls")
        .create_rls_policy_for_table(
            "posts",
            [("id", "bigint"), ("region", "text")],
            None,
            "posts_rls",
        )
        .create_same_tenant_constraint_for_foreign_key(
            "posts",
            "users",
            [("author_id", "id")],
            "posts_author_same_tenant",
        )
        .create_valid_tenant_value_constraint(["invalid"], None, None)
}

fn position_of(scripts: &[&str], needle: &str) -> usize {
    scripts
        .iter()
        .position(|script| script.starts_with(needle))
        .unwrap_or_else(|| panic!("no script starting with {needle:?}"))
}

// ==================== End to end ====================

#[test]
fn test_single_table_scenario() {
    let context = DefaultSharedSchemaContextBuilder::new()
        .current_tenant_id_property("tenant_id")
        .create_rls_policy_for_table("users", [("id", "bigint")], Some("tenant_id"), "users_rls")
        .build()
        .unwrap();

    assert_eq!(
        context.create_scripts(),
        vec![
            "CREATE OR REPLACE FUNCTION get_current_tenant_id() RETURNS VARCHAR(255) AS $$\nSELECT current_setting('tenant_id')\n$$ LANGUAGE sql\nSTABLE\nPARALLEL SAFE;",
            "CREATE OR REPLACE FUNCTION set_current_tenant_id(VARCHAR(255)) RETURNS VOID AS $$\nBEGIN\nPERFORM set_config('tenant_id', $1::text, false);\nEND\n$$ LANGUAGE plpgsql\nVOLATILE;",
            "CREATE OR REPLACE FUNCTION is_id_equals_current_tenant_id(VARCHAR(255)) RETURNS BOOLEAN AS $$\nSELECT $1 = get_current_tenant_id()\n$$ LANGUAGE sql\nSTABLE\nPARALLEL SAFE;",
            "CREATE OR REPLACE FUNCTION tenant_has_authorities(VARCHAR(255), VARCHAR(255), VARCHAR(255), VARCHAR(255), VARCHAR(255)) RETURNS BOOLEAN AS $$\nSELECT is_id_equals_current_tenant_id($1)\n$$ LANGUAGE sql\nSTABLE\nPARALLEL SAFE;",
            "ALTER TABLE users ENABLE ROW LEVEL SECURITY;",
            "CREATE POLICY users_rls ON users\nFOR ALL\nTO PUBLIC\n\
             USING (tenant_has_authorities(tenant_id, 'ALL', 'USING', 'users', \
             (SELECT relnamespace::regnamespace::text FROM pg_catalog.pg_class \
             WHERE oid = 'users'::regclass)))\n\
             WITH CHECK (tenant_has_authorities(tenant_id, 'ALL', 'WITH_CHECK', 'users', \
             (SELECT relnamespace::regnamespace::text FROM pg_catalog.pg_class \
             WHERE oid = 'users'::regclass)));",
            "CREATE OR REPLACE FUNCTION is_users_belongs_to_current_tenant(bigint) RETURNS BOOLEAN AS $$\nSELECT EXISTS (\n\tSELECT 1 FROM users rt WHERE rt.id = $1 AND rt.tenant_id = get_current_tenant_id()\n)\n$$ LANGUAGE sql\nSTABLE\nPARALLEL SAFE;",
        ]
    );
    assert_eq!(
        context.drop_scripts().first().copied(),
        Some("DROP FUNCTION IF EXISTS is_users_belongs_to_current_tenant(bigint);")
    );
    assert_eq!(
        context
            .get_current_tenant_id_function()
            .unwrap()
            .get_current_tenant_id_invocation(),
        "get_current_tenant_id()"
    );
    assert_eq!(context.current_tenant_id_property_type(), Some("VARCHAR(255)"));
}

#[test]
fn test_factories_exposed_to_callers() {
    let context = blog_builder().build().unwrap();
    let tenant = FunctionArgumentValue::string("acme");

    assert_eq!(
        context
            .set_current_tenant_id_function()
            .unwrap()
            .set_current_tenant_id_invocation(&tenant),
        "blog.set_current_tenant_id('acme')"
    );
    assert_eq!(
        context
            .is_tenant_valid_function()
            .unwrap()
            .is_tenant_identifier_valid_invocation(&tenant),
        "blog.is_tenant_identifier_valid('acme')"
    );
    assert!(
        context
            .record_belongs_to_current_tenant_function(&TableKey::new("posts", Some("blog")))
            .is_some()
    );
}

// ==================== Pipeline properties ====================

#[test]
fn test_build_is_deterministic() {
    let builder = blog_builder();
    let first = builder.build().unwrap();
    let second = builder.build().unwrap();
    assert_eq!(first.sql_definitions(), second.sql_definitions());

    let rebuilt = blog_builder().build().unwrap();
    assert_eq!(first.sql_definitions(), rebuilt.sql_definitions());
}

#[test]
fn test_tenant_column_precedes_row_level_security() {
    let context = blog_builder().build().unwrap();
    let scripts = context.create_scripts();

    for table in ["users", "posts"] {
        let add = position_of(&scripts, &format!("ALTER TABLE blog.{table} ADD COLUMN"));
        let default = position_of(
            &scripts,
            &format!("ALTER TABLE blog.{table} ALTER COLUMN tenant_id SET DEFAULT"),
        );
        let not_null = position_of(
            &scripts,
            &format!("ALTER TABLE blog.{table} ALTER COLUMN tenant_id SET NOT NULL"),
        );
        let enable = position_of(&scripts, &format!("ALTER TABLE blog.{table} ENABLE ROW"));
        let force = position_of(&scripts, &format!("ALTER TABLE blog.{table} FORCE ROW"));
        let policy = position_of(&scripts, &format!("CREATE POLICY {table}_rls"));

        assert!(add < default && default < not_null);
        assert!(not_null < enable && enable < force && force < policy);
    }
}

#[test]
fn test_record_function_precedes_same_tenant_constraint() {
    let context = blog_builder().build().unwrap();
    let scripts = context.create_scripts();

    let function = position_of(
        &scripts,
        "CREATE OR REPLACE FUNCTION blog.is_users_belongs_to_current_tenant(",
    );
    let constraint = position_of(
        &scripts,
        "ALTER TABLE blog.posts ADD CONSTRAINT posts_author_same_tenant",
    );
    assert!(function < constraint);
    assert_eq!(
        scripts[constraint],
        "ALTER TABLE blog.posts ADD CONSTRAINT posts_author_same_tenant CHECK ((author_id IS NULL) OR (blog.is_users_belongs_to_current_tenant(author_id)));"
    );
}

#[test]
fn test_every_function_is_defined_before_use() {
    let context = blog_builder().build().unwrap();
    let definitions = context.sql_definitions();

    for (index, definition) in definitions.iter().enumerate() {
        let Some(identifier) = definition.identifier() else {
            continue;
        };
        if identifier.kind != IdentifierKind::Function {
            continue;
        }
        let call = format!("{}(", identifier.name);
        for earlier in &definitions[..index] {
            assert!(
                !earlier.create_script().contains(&call),
                "{} used before it is defined",
                identifier.name
            );
        }
    }
}

#[test]
fn test_blacklist_constraints_per_table() {
    let context = blog_builder()
        .register_custom_valid_tenant_value_constraint_name_for_table("posts", "posts_tenant_ok")
        .build()
        .unwrap();
    let scripts = context.create_scripts();

    assert!(scripts.contains(
        &"ALTER TABLE blog.posts ADD CONSTRAINT posts_tenant_ok CHECK (tenant_id IS NULL OR blog.is_tenant_identifier_valid(tenant_id));"
    ));
    assert!(scripts.contains(
        &"ALTER TABLE blog.users ADD CONSTRAINT tenant_identifier_valid CHECK (tenant_id IS NULL OR blog.is_tenant_identifier_valid(tenant_id));"
    ));
}

// ==================== Validation ====================

#[test]
fn test_foreign_key_to_unregistered_table_is_rejected() {
    let err = DefaultSharedSchemaContextBuilder::new()
        .create_rls_policy_for_table("posts", [("id", "bigint")], None, "posts_rls")
        .create_same_tenant_constraint_for_foreign_key(
            "posts",
            "users",
            [("author_id", "id")],
            "posts_author_same_tenant",
        )
        .build()
        .unwrap_err();

    assert_eq!(err.request_rule(), Some(RequestRule::ForeignKeyMapping));
    assert!(!matches!(
        err,
        SharedSchemaContextError::InvalidSqlDefinitions { .. }
    ));
}

#[test]
fn test_foreign_key_mapped_twice_to_one_primary_key_column_is_rejected() {
    let err = DefaultSharedSchemaContextBuilder::new()
        .create_rls_policy_for_table(
            "users",
            [("id", "bigint"), ("region", "text")],
            None,
            "users_rls",
        )
        .create_rls_policy_for_table("posts", [("id", "bigint")], None, "posts_rls")
        .create_same_tenant_constraint_for_foreign_key(
            "posts",
            "users",
            [("a_id", "id"), ("b_id", "id")],
            "posts_users_same_tenant",
        )
        .build()
        .unwrap_err();

    assert_eq!(err.request_rule(), Some(RequestRule::ForeignKeyMapping));
    assert!(!err.is_internal());
}

#[test]
fn test_foreign_key_to_table_without_primary_key_is_rejected() {
    let err = DefaultSharedSchemaContextBuilder::new()
        .create_rls_policy_for_table("users", Vec::<(&str, &str)>::new(), None, "users_rls")
        .create_rls_policy_for_table("posts", [("id", "bigint")], None, "posts_rls")
        .create_same_tenant_constraint_for_foreign_key(
            "posts",
            "users",
            Vec::<(&str, &str)>::new(),
            "posts_users_same_tenant",
        )
        .build()
        .unwrap_err();

    assert_eq!(err.request_rule(), Some(RequestRule::ForeignKeyMapping));
    assert!(!err.is_internal());
}

#[test]
fn test_skip_list_wins_over_global_default() {
    let context = DefaultSharedSchemaContextBuilder::new()
        .current_tenant_identifier_as_default_value_for_tenant_column_in_all_tables(true)
        .create_rls_policy_for_table("users", [("id", "bigint")], None, "users_rls")
        .create_rls_policy_for_table("posts", [("id", "bigint")], None, "posts_rls")
        .create_tenant_column_for_table("posts")
        .skip_adding_of_tenant_column_default_value_for_table("users")
        .skip_adding_of_tenant_column_default_value_for_table("posts")
        .build()
        .unwrap();

    assert!(
        context
            .create_scripts()
            .iter()
            .all(|script| !script.contains("SET DEFAULT"))
    );
}

#[test]
fn test_global_default_for_existing_columns() {
    let context = DefaultSharedSchemaContextBuilder::new()
        .current_tenant_identifier_as_default_value_for_tenant_column_in_all_tables(true)
        .create_rls_policy_for_table("users", [("id", "bigint")], Some("org"), "users_rls")
        .build()
        .unwrap();

    let defaults: Vec<&str> = context
        .create_scripts()
        .into_iter()
        .filter(|script| script.contains("SET DEFAULT"))
        .collect();
    assert_eq!(
        defaults,
        vec!["ALTER TABLE users ALTER COLUMN org SET DEFAULT get_current_tenant_id();"]
    );
}

#[test]
fn test_too_long_function_name_is_reported() {
    let name = "get_the_identifier_of_the_tenant_that_is_currently_using_the_session";
    assert!(name.len() > 63);

    let err = DefaultSharedSchemaContextBuilder::new()
        .get_current_tenant_id_function_name(name)
        .build()
        .unwrap_err();

    match err {
        SharedSchemaContextError::InvalidSqlDefinitions {
            violations,
            definitions,
        } => {
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].identifier, name);
            assert_eq!(violations[0].kind, IdentifierKind::Function);
            assert_eq!(definitions.len(), 4);
            let source = &definitions[violations[0].definition_index];
            assert!(source.create_script().contains(name));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ==================== Custom definitions ====================

#[test]
fn test_custom_definitions_placement() {
    let context = DefaultSharedSchemaContextBuilder::new()
        .create_rls_policy_for_table("users", [("id", "bigint")], None, "users_rls")
        .add_custom_sql_definition_script(
            CustomSqlDefinitionPosition::AtEnd,
            "GRANT SELECT ON users TO app_user;",
        )
        .add_custom_sql_definition_with_drop(
            CustomSqlDefinitionPosition::AtBeginning,
            "CREATE ROLE app_user;",
            "DROP ROLE app_user;",
        )
        .build()
        .unwrap();

    let scripts = context.create_scripts();
    assert_eq!(scripts.first().copied(), Some("CREATE ROLE app_user;"));
    assert!(scripts[1].starts_with("CREATE OR REPLACE FUNCTION get_current_tenant_id()"));
    assert_eq!(scripts.last().copied(), Some("GRANT SELECT ON users TO app_user;"));
    assert_eq!(context.drop_scripts().last().copied(), Some("DROP ROLE app_user;"));
    assert_eq!(context.drop_scripts().first().copied(), Some("SELECT 1"));
}

#[test]
fn test_custom_label_needs_placed_enricher() {
    let builder = DefaultSharedSchemaContextBuilder::new().add_custom_sql_definition(
        CustomSqlDefinitionPosition::Custom("after_functions".to_string()),
        SqlDefinition::from_create_script("SELECT 'after functions';"),
    );
    let without = builder.build().unwrap();
    assert!(!without.create_scripts().contains(&"SELECT 'after functions';"));

    let mut enrichers = default_enrichers();
    enrichers.insert(
        5,
        Arc::new(CustomSqlDefinitionsEnricher::new(
            CustomSqlDefinitionPosition::Custom("after_functions".to_string()),
        )) as Arc<dyn SharedSchemaContextEnricher>,
    );
    let with = builder.enrichers(enrichers).build().unwrap();
    assert_eq!(with.create_scripts()[4], "SELECT 'after functions';");
}

// ==================== Configuration ====================

#[test]
fn test_configuration_matches_builder() {
    let config = SharedSchemaContextConfiguration::from_json(
        r#"{
            "default_schema": "blog",
            "current_tenant_id_property": "blog.tenant",
            "force_row_level_security_for_table_owner": true,
            "valid_tenant_value_constraint": { "tenant_identifiers_blacklist": ["invalid"] },
            "tables": [
                { "name": "users",
                  "rls_policy": { "name": "users_rls", "create_tenant_column": true,
                                  "primary_key_definition": { "pk_columns_name_to_type": { "id": "bigint" } } } },
                { "name": "posts",
                  "rls_policy": { "name": "posts_rls", "create_tenant_column": true,
                                  "primary_key_definition": { "pk_columns_name_to_type": { "id": "bigint", "region": "text" } } },
                  "foreign_keys": [ { "constraint_name": "posts_author_same_tenant", "table_name": "users",
                                      "foreign_key_primary_key_columns_mappings": { "author_id": "id" } } ] }
            ]
        }"#,
    )
    .unwrap();

    let from_config = config.to_builder().unwrap().build().unwrap();
    let from_builder = blog_builder().build().unwrap();
    assert_eq!(from_config.sql_definitions(), from_builder.sql_definitions());
}
