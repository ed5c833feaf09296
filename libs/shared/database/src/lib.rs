pub mod context;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod schema;

pub use context::{AppState, TenantContext};
pub use error::TenantError;
pub use migrations::{MigrationDescriptor, SchemaMigrator, MIGRATIONS};
pub use pool::TenantPools;
pub use schema::{normalize, SchemaName, TenantDirectory};
