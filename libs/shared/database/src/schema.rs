use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::TenantError;

/// PostgreSQL identifier limit.
const MAX_SCHEMA_LEN: usize = 63;

/// Schemas that must never be handed to a tenant.
const RESERVED_SCHEMAS: &[&str] = &[
    "public",
    "pg_catalog",
    "information_schema",
    "pg_toast",
    "pg_temp",
];

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

/// A validated, normalized tenant schema name. The only way to obtain one
/// is [`normalize`], so anything holding a `SchemaName` is safe to splice
/// into DDL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaName(String);

impl SchemaName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates a raw tenant identifier and folds it to the lowercase schema
/// name used everywhere downstream. Schema names end up interpolated into
/// DDL statements, so the grammar here is the injection boundary.
pub fn normalize(raw: &str) -> Result<SchemaName, TenantError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(TenantError::InvalidIdentifier(
            "tenant identifier is empty".to_string(),
        ));
    }
    if trimmed.len() > MAX_SCHEMA_LEN {
        return Err(TenantError::InvalidIdentifier(format!(
            "tenant identifier exceeds {} characters",
            MAX_SCHEMA_LEN
        )));
    }
    if !identifier_pattern().is_match(trimmed) {
        return Err(TenantError::InvalidIdentifier(format!(
            "tenant identifier {:?} contains characters outside [A-Za-z0-9_] or starts with a digit",
            trimmed
        )));
    }

    let normalized = trimmed.to_lowercase();
    if RESERVED_SCHEMAS.contains(&normalized.as_str()) {
        return Err(TenantError::InvalidIdentifier(format!(
            "tenant identifier {:?} is a reserved schema name",
            trimmed
        )));
    }

    Ok(SchemaName(normalized))
}

struct CacheEntry {
    allowed: bool,
    expires_at: Instant,
}

/// Allow-list over the `public.tenants` registry with a TTL cache.
///
/// A cached verdict may be stale for up to the TTL after a tenant is
/// revoked; callers with an active revocation path should use
/// [`TenantDirectory::invalidate`].
pub struct TenantDirectory {
    registry: PgPool,
    ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl TenantDirectory {
    pub fn new(registry: PgPool, ttl: Duration) -> Self {
        Self {
            registry,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Creates the global tenant registry table. Idempotent.
    pub async fn ensure_registry(&self) -> Result<(), TenantError> {
        sqlx::raw_sql(
            r#"CREATE TABLE IF NOT EXISTS public.tenants (
                id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                slug        TEXT UNIQUE NOT NULL,
                schema_name TEXT UNIQUE NOT NULL,
                display_name TEXT NOT NULL,
                is_active   BOOLEAN NOT NULL DEFAULT TRUE,
                created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.registry)
        .await?;
        Ok(())
    }

    /// Registers a tenant in the allow-list. The schema itself is created
    /// by the migrator on first use.
    pub async fn register(
        &self,
        slug: &str,
        schema: &SchemaName,
        display_name: &str,
    ) -> Result<(), TenantError> {
        sqlx::query(
            r#"INSERT INTO public.tenants (slug, schema_name, display_name, is_active)
               VALUES ($1, $2, $3, TRUE)
               ON CONFLICT (slug) DO UPDATE SET is_active = TRUE, display_name = $3"#,
        )
        .bind(slug)
        .bind(schema.as_str())
        .bind(display_name)
        .execute(&self.registry)
        .await?;
        Ok(())
    }

    /// Checks that the schema is registered, active, and actually present
    /// in the catalog. Verdicts are cached for the configured TTL.
    pub async fn assert_allowed(&self, schema: &SchemaName) -> Result<(), TenantError> {
        if let Some(allowed) = self.cached(schema.as_str()).await {
            return if allowed {
                Ok(())
            } else {
                Err(TenantError::NotAllowed(schema.to_string()))
            };
        }

        let allowed = self.lookup(schema).await?;
        debug!("Allow-list lookup for schema {}: {}", schema, allowed);

        self.cache.write().await.insert(
            schema.as_str().to_string(),
            CacheEntry {
                allowed,
                expires_at: Instant::now() + self.ttl,
            },
        );

        if allowed {
            Ok(())
        } else {
            Err(TenantError::NotAllowed(schema.to_string()))
        }
    }

    /// Evicts a cached verdict, forcing the next check to hit the registry.
    pub async fn invalidate(&self, schema: &str) {
        self.cache.write().await.remove(schema);
    }

    async fn cached(&self, key: &str) -> Option<bool> {
        let cache = self.cache.read().await;
        cache
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.allowed)
    }

    async fn lookup(&self, schema: &SchemaName) -> Result<bool, TenantError> {
        let registered: Option<(bool,)> =
            sqlx::query_as("SELECT is_active FROM public.tenants WHERE schema_name = $1")
                .bind(schema.as_str())
                .fetch_optional(&self.registry)
                .await?;

        if !matches!(registered, Some((true,))) {
            return Ok(false);
        }

        let exists: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM pg_namespace WHERE nspname = $1")
                .bind(schema.as_str())
                .fetch_optional(&self.registry)
                .await?;

        Ok(exists.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn accepts_plain_identifiers() {
        assert_eq!(normalize("clinic_42").unwrap().as_str(), "clinic_42");
        assert_eq!(normalize("  Northside  ").unwrap().as_str(), "northside");
        assert_eq!(normalize("_internal").unwrap().as_str(), "_internal");
    }

    #[test]
    fn rejects_empty_and_overlong() {
        assert_matches!(normalize(""), Err(TenantError::InvalidIdentifier(_)));
        assert_matches!(normalize("   "), Err(TenantError::InvalidIdentifier(_)));

        let long = "a".repeat(64);
        assert_matches!(normalize(&long), Err(TenantError::InvalidIdentifier(_)));
        assert!(normalize(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn rejects_bad_grammar() {
        for raw in ["42clinic", "clinic-42", "clinic 42", "clinic;drop", "clinic.42"] {
            assert_matches!(normalize(raw), Err(TenantError::InvalidIdentifier(_)), "{}", raw);
        }
    }

    #[test]
    fn rejects_reserved_names_case_insensitively() {
        for raw in ["public", "Public", "PUBLIC", "pg_catalog", "Information_Schema"] {
            assert_matches!(normalize(raw), Err(TenantError::InvalidIdentifier(_)), "{}", raw);
        }
    }
}
