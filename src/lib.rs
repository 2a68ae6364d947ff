//! # shared-schema-rls
//!
//! Generates the PostgreSQL DDL that turns a shared schema into a
//! multi-tenant one enforced by row level security.
//!
//! Every table carries a tenant column. A session announces its tenant by
//! setting a configuration parameter, and generated policies only let rows of
//! that tenant through. The crate produces the SQL; it never connects to a
//! database.
//!
//! ## Features
//!
//! - **Tenant functions**: get/set the current tenant and compare identifiers against it
//! - **Row level security**: enable (and optionally force) RLS and create one policy per table
//! - **Tenant columns**: add the column with the current tenant as default and NOT NULL
//! - **Same-tenant foreign keys**: CHECK constraints that keep references inside one tenant
//! - **Tenant blacklist**: CHECK constraints rejecting reserved tenant identifiers
//! - **Reversible output**: every definition carries its drop script and checking queries
//!
//! ## Quick Start
//!
//! ```rust
//! use shared_schema_rls::DefaultSharedSchemaContextBuilder;
//!
//! let context = DefaultSharedSchemaContextBuilder::new()
//!     .current_tenant_id_property("app.tenant_id")
//!     .create_tenant_column_for_table("users")
//!     .create_rls_policy_for_table("users", [("id", "bigint")], None, "users_rls")
//!     .build()?;
//!
//! // Apply in order
//! for script in context.create_scripts() {
//!     println!("{script}");
//! }
//! // Revert in reverse order
//! let drop_scripts = context.drop_scripts();
//! assert_eq!(drop_scripts.len(), context.sql_definitions().len());
//! # Ok::<(), shared_schema_rls::SharedSchemaContextError>(())
//! ```
//!
//! ## Configuration
//!
//! The same options can be loaded from JSON:
//!
//! ```rust
//! use shared_schema_rls::SharedSchemaContextConfiguration;
//!
//! let config = SharedSchemaContextConfiguration::from_json(r#"{
//!     "grantee": "app_user",
//!     "tables": [
//!         { "name": "users",
//!           "rls_policy": { "name": "users_rls",
//!                           "primary_key_definition": { "pk_columns_name_to_type": { "id": "bigint" } } } }
//!     ]
//! }"#)?;
//! let context = config.to_builder()?.build()?;
//! assert!(context.get_current_tenant_id_function().is_some());
//! # Ok::<(), shared_schema_rls::SharedSchemaContextError>(())
//! ```

pub mod builder;
pub mod config;
pub mod context;
pub mod enrichers;
pub mod error;
pub mod request;
pub mod sql;
pub mod types;
pub mod validators;

pub use builder::DefaultSharedSchemaContextBuilder;
pub use config::SharedSchemaContextConfiguration;
pub use context::SharedSchemaContext;
pub use enrichers::{CustomSqlDefinitionsEnricher, SharedSchemaContextEnricher, default_enrichers};
pub use error::{RequestRule, Result, SharedSchemaContextError, SqlDefinitionViolation};
pub use request::SharedSchemaContextRequest;
pub use sql::{FunctionArgumentValue, IdentifierKind, SqlDefinition};
pub use types::{CustomSqlDefinitionPosition, TableKey};
pub use validators::{
    IdentifierLengthValidator, SharedSchemaContextRequestValidator, SqlDefinitionsValidator,
};
