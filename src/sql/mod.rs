//! SQL generation utilities
//!
//! Provides the SQL definition value type, identifier rendering and the
//! producers for tenant functions and per-table statements.

pub mod ddl;
pub mod definition;
pub mod function;
pub mod sanitize;

pub use definition::{
    DEFAULT_CHECKING_STATEMENT, DefinedIdentifier, IdentifierKind, SqlDefinition,
};
pub use function::{FunctionArgumentValue, PermissionCommandPolicy, RlsExpressionType};
pub use sanitize::{
    POSTGRES_RESERVED_WORDS, identifier, qualified_name, quote_identifier, quote_literal,
};
