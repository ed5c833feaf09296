use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;

use crate::error::TenantError;
use crate::migrations::SchemaMigrator;
use crate::pool::TenantPools;
use crate::schema::{self, SchemaName, TenantDirectory};

/// Everything a tenant-scoped request needs, resolved once by the tenant
/// middleware and passed explicitly through every call boundary. Nothing
/// downstream reads tenant identity from ambient state.
#[derive(Clone)]
pub struct TenantContext {
    pub schema: SchemaName,
    pub pool: PgPool,
    pub user: AuthUser,
}

/// Process-wide shared state: configuration, the global registry pool,
/// and the tenant routing layer built on top of it.
pub struct AppState {
    pub config: AppConfig,
    pub registry: PgPool,
    pub pools: TenantPools,
    pub directory: TenantDirectory,
    pub migrator: SchemaMigrator,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, TenantError> {
        let registry = PgPoolOptions::new()
            .max_connections(config.tenant_pool_max_connections)
            .connect_lazy(&config.database_url)?;

        let directory = TenantDirectory::new(
            registry.clone(),
            Duration::from_secs(config.tenant_cache_ttl_secs),
        );
        let migrator = SchemaMigrator::new(registry.clone());
        let pools = TenantPools::new(config.clone());

        Ok(Self {
            config,
            registry,
            pools,
            directory,
            migrator,
        })
    }

    /// Registers a tenant, creates its schema, and runs all migrations.
    pub async fn provision_tenant(
        &self,
        slug: &str,
        display_name: &str,
    ) -> Result<SchemaName, TenantError> {
        let schema = schema::normalize(slug)?;

        self.directory.register(slug, &schema, display_name).await?;
        let pool = self.pools.get_pool(&schema).await?;
        self.migrator.ensure_tenant_tables(&schema, &pool).await?;
        self.directory.invalidate(schema.as_str()).await;

        info!("Provisioned tenant {} (schema {})", slug, schema);
        Ok(schema)
    }
}
