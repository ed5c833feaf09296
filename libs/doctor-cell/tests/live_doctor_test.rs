// Live doctor registry tests. Run with LIVE_DB_TESTS=true and a
// disposable DATABASE_URL.

use assert_matches::assert_matches;
use uuid::Uuid;

use doctor_cell::{CreateDoctorRequest, DoctorError, DoctorService, UpdateDoctorRequest};
use shared_config::AppConfig;
use shared_database::{AppState, TenantContext};
use shared_models::auth::{AuthUser, Role, TenantUser};

fn should_run_live_tests() -> bool {
    std::env::var("LIVE_DB_TESTS").unwrap_or_default() == "true"
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set for live tests"),
        jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
        payment_base_url: "http://localhost:0".to_string(),
        payment_key_id: String::new(),
        payment_key_secret: String::new(),
        payment_webhook_secret: String::new(),
        tenant_cache_ttl_secs: 60,
        tenant_pool_max_connections: 5,
    }
}

async fn tenant_context(state: &AppState) -> TenantContext {
    let slug = format!("qa_{}", Uuid::new_v4().simple());
    let schema = state
        .provision_tenant(&slug, "Doctor Test Clinic")
        .await
        .expect("provision tenant");
    let pool = state.pools.get_pool(&schema).await.expect("tenant pool");

    TenantContext {
        schema,
        pool,
        user: AuthUser::Tenant(TenantUser {
            id: Uuid::new_v4(),
            tenant: slug,
            email: None,
            role: Role::Admin,
            created_at: None,
        }),
    }
}

#[tokio::test]
async fn create_rejects_duplicate_email() {
    if !should_run_live_tests() {
        return;
    }

    let state = AppState::new(test_config()).expect("app state");
    let ctx = tenant_context(&state).await;
    let service = DoctorService::new(&ctx);

    let created = service
        .create(CreateDoctorRequest {
            full_name: "Dr. Asha Rao".to_string(),
            email: "asha@clinic.example".to_string(),
            specialty: Some("cardiology".to_string()),
        })
        .await
        .expect("create doctor");
    assert_eq!(created.last_sequence_number, 0);
    assert!(created.is_active);

    let duplicate = service
        .create(CreateDoctorRequest {
            full_name: "Dr. Asha Rao".to_string(),
            email: "asha@clinic.example".to_string(),
            specialty: None,
        })
        .await;
    assert_matches!(duplicate, Err(DoctorError::EmailExists(_)));
}

#[tokio::test]
async fn list_hides_deactivated_doctors() {
    if !should_run_live_tests() {
        return;
    }

    let state = AppState::new(test_config()).expect("app state");
    let ctx = tenant_context(&state).await;
    let service = DoctorService::new(&ctx);

    let doctor = service
        .create(CreateDoctorRequest {
            full_name: "Dr. Vikram Shah".to_string(),
            email: "vikram@clinic.example".to_string(),
            specialty: None,
        })
        .await
        .expect("create doctor");

    assert_eq!(service.list().await.expect("list").len(), 1);

    let updated = service
        .update(
            doctor.id,
            UpdateDoctorRequest {
                full_name: None,
                specialty: Some("dermatology".to_string()),
                is_active: Some(false),
            },
        )
        .await
        .expect("update doctor");
    assert_eq!(updated.specialty.as_deref(), Some("dermatology"));
    assert!(!updated.is_active);

    assert!(service.list().await.expect("list").is_empty());
}
