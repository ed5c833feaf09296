// Live tenancy-layer tests against a real PostgreSQL instance.
//
// Only run when LIVE_DB_TESTS=true and DATABASE_URL points at a disposable
// database.

use std::sync::Arc;

use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{normalize, AppState, SchemaMigrator, TenantError};

fn should_run_live_tests() -> bool {
    std::env::var("LIVE_DB_TESTS").unwrap_or_default() == "true"
}

fn test_config(cache_ttl_secs: u64) -> AppConfig {
    AppConfig {
        database_url: std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set for live tests"),
        jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
        payment_base_url: "http://localhost:0".to_string(),
        payment_key_id: String::new(),
        payment_key_secret: String::new(),
        payment_webhook_secret: String::new(),
        tenant_cache_ttl_secs: cache_ttl_secs,
        tenant_pool_max_connections: 5,
    }
}

fn unique_slug() -> String {
    format!("qa_{}", Uuid::new_v4().simple())
}

#[tokio::test]
async fn get_pool_returns_one_pool_per_schema() {
    if !should_run_live_tests() {
        return;
    }

    let state = AppState::new(test_config(60)).expect("app state");
    state.directory.ensure_registry().await.expect("registry");

    let slug = unique_slug();
    let schema = state
        .provision_tenant(&slug, "Pool Test Clinic")
        .await
        .expect("provision");

    let before = state.pools.initializations();
    let _first = state.pools.get_pool(&schema).await.expect("first pool");
    let _second = state.pools.get_pool(&schema).await.expect("second pool");

    // Provisioning already built the pool; both calls above reuse it and
    // no second initialization happens.
    assert_eq!(state.pools.initializations(), before);
}

#[tokio::test]
async fn concurrent_first_access_initializes_exactly_once() {
    if !should_run_live_tests() {
        return;
    }

    let state = Arc::new(AppState::new(test_config(60)).expect("app state"));
    state.directory.ensure_registry().await.expect("registry");

    let slug = unique_slug();
    let schema = normalize(&slug).expect("schema name");

    let before = state.pools.initializations();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        let schema = schema.clone();
        handles.push(tokio::spawn(async move {
            state.pools.get_pool(&schema).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().expect("pool");
    }

    assert_eq!(state.pools.initializations(), before + 1);
}

#[tokio::test]
async fn rerunning_ensure_records_nothing_new() {
    if !should_run_live_tests() {
        return;
    }

    let state = AppState::new(test_config(60)).expect("app state");
    state.directory.ensure_registry().await.expect("registry");

    let slug = unique_slug();
    let schema = state
        .provision_tenant(&slug, "Migration Test Clinic")
        .await
        .expect("provision");
    let pool = state.pools.get_pool(&schema).await.expect("pool");

    let (applied,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert!(applied > 0);

    // A fresh migrator has no process-local marker, so this exercises the
    // real pending-set computation against the recorded versions.
    let migrator = SchemaMigrator::new(state.registry.clone());
    migrator
        .ensure_tenant_tables(&schema, &pool)
        .await
        .expect("re-run ensure");

    let (applied_after,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
        .fetch_one(&pool)
        .await
        .expect("count after");
    assert_eq!(applied, applied_after);
}

#[tokio::test]
async fn unknown_tenant_is_not_allowed() {
    if !should_run_live_tests() {
        return;
    }

    let state = AppState::new(test_config(60)).expect("app state");
    state.directory.ensure_registry().await.expect("registry");

    let schema = normalize(&unique_slug()).expect("schema name");
    let result = state.directory.assert_allowed(&schema).await;
    assert!(matches!(result, Err(TenantError::NotAllowed(_))));
}

#[tokio::test]
async fn revocation_is_visible_after_invalidation() {
    if !should_run_live_tests() {
        return;
    }

    let state = AppState::new(test_config(60)).expect("app state");
    state.directory.ensure_registry().await.expect("registry");

    let slug = unique_slug();
    let schema = state
        .provision_tenant(&slug, "Revocation Test Clinic")
        .await
        .expect("provision");

    state
        .directory
        .assert_allowed(&schema)
        .await
        .expect("allowed after provisioning");

    sqlx::query("UPDATE public.tenants SET is_active = FALSE WHERE slug = $1")
        .bind(&slug)
        .execute(&state.registry)
        .await
        .expect("revoke");

    // The cached verdict holds for up to the TTL; that staleness is
    // accepted policy.
    state
        .directory
        .assert_allowed(&schema)
        .await
        .expect("stale verdict still cached");

    state.directory.invalidate(schema.as_str()).await;
    let result = state.directory.assert_allowed(&schema).await;
    assert!(matches!(result, Err(TenantError::NotAllowed(_))));
}
