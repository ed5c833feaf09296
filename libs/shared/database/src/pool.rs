use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::error::TenantError;
use crate::schema::SchemaName;

/// One lazily-built `PgPool` per tenant schema, keyed by schema name.
///
/// Every pooled connection has its `search_path` pinned to the tenant
/// schema, so queries running through a tenant pool cannot see any other
/// tenant's tables. The check-then-create path is serialized per key:
/// two requests racing for an unseen tenant produce exactly one pool.
pub struct TenantPools {
    config: AppConfig,
    pools: RwLock<HashMap<String, PgPool>>,
    building: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    initializations: AtomicUsize,
}

impl TenantPools {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            pools: RwLock::new(HashMap::new()),
            building: Mutex::new(HashMap::new()),
            initializations: AtomicUsize::new(0),
        }
    }

    /// Returns the cached pool for the schema, building it on first use.
    ///
    /// A freshly built pool is probed before it is published, so a
    /// half-initialized pool is never cached; the builder's error
    /// propagates and the next caller retries from scratch.
    pub async fn get_pool(&self, schema: &SchemaName) -> Result<PgPool, TenantError> {
        if let Some(pool) = self.pools.read().await.get(schema.as_str()) {
            return Ok(pool.clone());
        }

        let gate = {
            let mut building = self.building.lock().await;
            building
                .entry(schema.as_str().to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = gate.lock().await;

        // Losers of the race arrive here after the winner has published.
        if let Some(pool) = self.pools.read().await.get(schema.as_str()) {
            return Ok(pool.clone());
        }

        let pool = self.build_pool(schema).await?;
        self.pools
            .write()
            .await
            .insert(schema.as_str().to_string(), pool.clone());

        info!("Initialized connection pool for tenant schema {}", schema);
        Ok(pool)
    }

    /// Closes every cached pool and clears the cache. Called once at
    /// process shutdown.
    pub async fn close_all(&self) {
        let mut pools = self.pools.write().await;
        for (schema, pool) in pools.drain() {
            pool.close().await;
            debug!("Closed tenant pool for schema {}", schema);
        }
    }

    /// Number of pools built over the process lifetime. One per schema
    /// when the single-flight gate holds.
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::Relaxed)
    }

    async fn build_pool(&self, schema: &SchemaName) -> Result<PgPool, TenantError> {
        let schema_ident = schema.as_str().to_string();

        let pool = PgPoolOptions::new()
            .max_connections(self.config.tenant_pool_max_connections)
            .after_connect(move |conn, _meta| {
                let set_path = format!("SET search_path TO \"{}\"", schema_ident);
                Box::pin(async move {
                    conn.execute(set_path.as_str()).await?;
                    Ok(())
                })
            })
            .connect_lazy(&self.config.database_url)?;

        // Probe before caching.
        sqlx::query("SELECT 1").execute(&pool).await?;

        self.initializations.fetch_add(1, Ordering::Relaxed);
        Ok(pool)
    }
}
