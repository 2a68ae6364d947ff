//! Identifier and literal rendering
//!
//! Generated DDL keeps ordinary lowercase names bare so that catalog checks
//! (e.g. `column_default = 'get_current_tenant_id()'`) match what PostgreSQL
//! stores. Anything else is double-quoted.

use std::sync::LazyLock;

use regex::Regex;

/// PostgreSQL reserved keywords that cannot be used as unquoted identifiers
pub const POSTGRES_RESERVED_WORDS: &[&str] = &[
    "ALL",
    "ANALYSE",
    "ANALYZE",
    "AND",
    "ANY",
    "ARRAY",
    "AS",
    "ASC",
    "ASYMMETRIC",
    "BOTH",
    "CASE",
    "CAST",
    "CHECK",
    "COLLATE",
    "COLUMN",
    "CONSTRAINT",
    "CREATE",
    "CURRENT_CATALOG",
    "CURRENT_DATE",
    "CURRENT_ROLE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
    "CURRENT_USER",
    "DEFAULT",
    "DEFERRABLE",
    "DESC",
    "DISTINCT",
    "DO",
    "ELSE",
    "END",
    "EXCEPT",
    "FALSE",
    "FETCH",
    "FOR",
    "FOREIGN",
    "FROM",
    "GRANT",
    "GROUP",
    "HAVING",
    "IN",
    "INITIALLY",
    "INTERSECT",
    "INTO",
    "LATERAL",
    "LEADING",
    "LIMIT",
    "LOCALTIME",
    "LOCALTIMESTAMP",
    "NOT",
    "NULL",
    "OFFSET",
    "ON",
    "ONLY",
    "OR",
    "ORDER",
    "PLACING",
    "PRIMARY",
    "REFERENCES",
    "RETURNING",
    "SELECT",
    "SESSION_USER",
    "SOME",
    "SYMMETRIC",
    "TABLE",
    "THEN",
    "TO",
    "TRAILING",
    "TRUE",
    "UNION",
    "UNIQUE",
    "USER",
    "USING",
    "VARIADIC",
    "WHEN",
    "WHERE",
    "WINDOW",
    "WITH",
];

static BARE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_$]*$").expect("bare identifier pattern"));

/// Quote a SQL identifier unconditionally
///
/// # Example
/// ```
/// use shared_schema_rls::sql::quote_identifier;
///
/// assert_eq!(quote_identifier("my_table"), "\"my_table\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Whether an identifier must be quoted to keep its exact spelling
pub fn requires_quoting(identifier: &str) -> bool {
    !BARE_IDENTIFIER.is_match(identifier)
        || POSTGRES_RESERVED_WORDS.contains(&identifier.to_uppercase().as_str())
}

/// Render an identifier, quoting it only when PostgreSQL would otherwise fold or reject it
///
/// # Example
/// ```
/// use shared_schema_rls::sql::identifier;
///
/// assert_eq!(identifier("users"), "users");
/// assert_eq!(identifier("order"), "\"order\"");
/// assert_eq!(identifier("Users"), "\"Users\"");
/// ```
pub fn identifier(name: &str) -> String {
    if requires_quoting(name) {
        quote_identifier(name)
    } else {
        name.to_string()
    }
}

/// Render `schema.name`, or just `name` when no schema is given
pub fn qualified_name(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", identifier(schema), identifier(name)),
        None => identifier(name),
    }
}

/// Render a single-quoted string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Schema as used in catalog checks; falls back to `current_schema()`
pub fn schema_literal(schema: Option<&str>) -> String {
    match schema {
        Some(schema) => quote_literal(schema),
        None => "current_schema()".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // quote_identifier Tests
    // =========================================================================

    #[test]
    fn test_quote_identifier_simple() {
        assert_eq!(quote_identifier("my_table"), "\"my_table\"");
        assert_eq!(quote_identifier("a"), "\"a\"");
    }

    #[test]
    fn test_quote_identifier_with_quotes() {
        assert_eq!(
            quote_identifier("table\"with\"quotes"),
            "\"table\"\"with\"\"quotes\""
        );
    }

    #[test]
    fn test_quote_identifier_empty() {
        assert_eq!(quote_identifier(""), "\"\"");
    }

    // =========================================================================
    // identifier Tests
    // =========================================================================

    #[test]
    fn test_identifier_keeps_plain_names_bare() {
        assert_eq!(identifier("users"), "users");
        assert_eq!(identifier("tenant_id"), "tenant_id");
        assert_eq!(identifier("_private"), "_private");
        assert_eq!(identifier("col$1"), "col$1");
    }

    #[test]
    fn test_identifier_quotes_reserved_words() {
        assert_eq!(identifier("user"), "\"user\"");
        assert_eq!(identifier("select"), "\"select\"");
        assert_eq!(identifier("order"), "\"order\"");
    }

    #[test]
    fn test_identifier_quotes_mixed_case_and_special_chars() {
        assert_eq!(identifier("Users"), "\"Users\"");
        assert_eq!(identifier("my-table"), "\"my-table\"");
        assert_eq!(identifier("my table"), "\"my table\"");
        assert_eq!(identifier("1abc"), "\"1abc\"");
        assert_eq!(identifier(""), "\"\"");
    }

    #[test]
    fn test_requires_quoting() {
        assert!(!requires_quoting("posts"));
        assert!(requires_quoting("table"));
        assert!(requires_quoting("Posts"));
    }

    // =========================================================================
    // qualified_name / literal Tests
    // =========================================================================

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified_name(None, "users"), "users");
        assert_eq!(qualified_name(Some("public"), "users"), "public.users");
        assert_eq!(
            qualified_name(Some("Tenants"), "user"),
            "\"Tenants\".\"user\""
        );
    }

    #[test]
    fn test_quote_literal_escapes_quotes() {
        assert_eq!(quote_literal("abc"), "'abc'");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_schema_literal() {
        assert_eq!(schema_literal(Some("public")), "'public'");
        assert_eq!(schema_literal(None), "current_schema()");
    }

    #[test]
    fn test_reserved_words_contains_common_keywords() {
        assert!(POSTGRES_RESERVED_WORDS.contains(&"SELECT"));
        assert!(POSTGRES_RESERVED_WORDS.contains(&"USER"));
        assert!(POSTGRES_RESERVED_WORDS.len() > 50);
    }
}
