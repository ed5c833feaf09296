// Live queue tests against a real PostgreSQL instance.
//
// Only run when LIVE_DB_TESTS=true and DATABASE_URL points at a disposable
// database; each test provisions its own throwaway tenant schema.

use assert_matches::assert_matches;
use uuid::Uuid;

use queue_cell::{CreateQueueRequest, PaymentMode, QueueError, QueueService, QueueStatus};
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

struct LiveTenant {
    ctx: TenantContext,
}

impl LiveTenant {
    /// Provisions a fresh tenant schema and returns a context acting as
    /// the given role.
    async fn new(state: &AppState, role: Role) -> Self {
        let slug = format!("qa_{}", Uuid::new_v4().simple());
        let schema = state
            .provision_tenant(&slug, "Live Test Clinic")
            .await
            .expect("provision tenant");
        let pool = state.pools.get_pool(&schema).await.expect("tenant pool");

        let ctx = TenantContext {
            schema,
            pool,
            user: AuthUser::Tenant(TenantUser {
                id: Uuid::new_v4(),
                tenant: slug,
                email: None,
                role,
                created_at: None,
            }),
        };
        Self { ctx }
    }

    async fn seed_doctor(&self, last_sequence_number: i64) -> Uuid {
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO doctors (full_name, email, last_sequence_number) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind("Dr. Test")
        .bind(format!("doctor-{}@clinic.example", Uuid::new_v4().simple()))
        .bind(last_sequence_number)
        .fetch_one(&self.ctx.pool)
        .await
        .expect("seed doctor");
        id
    }

    async fn seed_patient(&self) -> Uuid {
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO patients (full_name) VALUES ($1) RETURNING id",
        )
        .bind("Test Patient")
        .fetch_one(&self.ctx.pool)
        .await
        .expect("seed patient");
        id
    }

    async fn doctor_counter(&self, doctor_id: Uuid) -> i64 {
        let (counter,): (i64,) =
            sqlx::query_as("SELECT last_sequence_number FROM doctors WHERE id = $1")
                .bind(doctor_id)
                .fetch_one(&self.ctx.pool)
                .await
                .expect("doctor counter");
        counter
    }
}

fn booking(patient_id: Uuid, doctor_id: Uuid, payment_mode: PaymentMode) -> CreateQueueRequest {
    CreateQueueRequest {
        patient_id,
        doctor_id,
        payment_mode,
        remark: None,
    }
}

#[tokio::test]
async fn booking_consumes_the_doctor_counter() {
    if !should_run_live_tests() {
        return;
    }

    let state = AppState::new(test_config()).expect("app state");
    let tenant = LiveTenant::new(&state, Role::Staff).await;
    let doctor_id = tenant.seed_doctor(5).await;
    let patient_id = tenant.seed_patient().await;

    let entry = QueueService::new(&tenant.ctx)
        .create(booking(patient_id, doctor_id, PaymentMode::Cash))
        .await
        .expect("create booking");

    assert_eq!(entry.sequence_number, 6);
    assert_eq!(entry.status, QueueStatus::Booked);
    assert_eq!(tenant.doctor_counter(doctor_id).await, 6);
}

#[tokio::test]
async fn concurrent_bookings_produce_contiguous_unique_sequences() {
    if !should_run_live_tests() {
        return;
    }

    const BOOKINGS: i64 = 8;

    let state = AppState::new(test_config()).expect("app state");
    let tenant = LiveTenant::new(&state, Role::Staff).await;
    let doctor_id = tenant.seed_doctor(0).await;

    let mut patients = Vec::new();
    for _ in 0..BOOKINGS {
        patients.push(tenant.seed_patient().await);
    }

    let mut handles = Vec::new();
    for patient_id in patients {
        let ctx = tenant.ctx.clone();
        handles.push(tokio::spawn(async move {
            QueueService::new(&ctx)
                .create(booking(patient_id, doctor_id, PaymentMode::Cash))
                .await
        }));
    }

    let mut sequences: Vec<i64> = Vec::new();
    for handle in handles {
        let entry = handle.await.unwrap().expect("concurrent booking");
        sequences.push(entry.sequence_number);
    }

    sequences.sort_unstable();
    assert_eq!(sequences, (1..=BOOKINGS).collect::<Vec<_>>());
    assert_eq!(tenant.doctor_counter(doctor_id).await, BOOKINGS);
}

#[tokio::test]
async fn duplicate_same_day_booking_is_rejected() {
    if !should_run_live_tests() {
        return;
    }

    let state = AppState::new(test_config()).expect("app state");
    let tenant = LiveTenant::new(&state, Role::Staff).await;
    let doctor_id = tenant.seed_doctor(0).await;
    let patient_id = tenant.seed_patient().await;

    let queue = QueueService::new(&tenant.ctx);
    let first = queue
        .create(booking(patient_id, doctor_id, PaymentMode::Cash))
        .await
        .expect("first booking");

    let second = queue
        .create(booking(patient_id, doctor_id, PaymentMode::Cash))
        .await;

    match second {
        Err(QueueError::DuplicateBooking { existing_id }) => {
            assert_eq!(existing_id, first.id);
        }
        other => panic!("expected duplicate booking error, got {:?}", other.map(|e| e.id)),
    }

    // Counter stays where the only successful booking left it.
    assert_eq!(tenant.doctor_counter(doctor_id).await, 1);
}

#[tokio::test]
async fn skip_increments_counter_and_keeps_ticket_number() {
    if !should_run_live_tests() {
        return;
    }

    let state = AppState::new(test_config()).expect("app state");
    let tenant = LiveTenant::new(&state, Role::Staff).await;
    let doctor_id = tenant.seed_doctor(0).await;
    let patient_id = tenant.seed_patient().await;

    let queue = QueueService::new(&tenant.ctx);
    let entry = queue
        .create(booking(patient_id, doctor_id, PaymentMode::Cash))
        .await
        .expect("booking");

    let skipped = queue.skip(entry.id).await.expect("skip");
    assert_eq!(skipped.status, QueueStatus::Skipped);
    assert_eq!(skipped.skip_count, 1);
    assert_eq!(skipped.sequence_number, entry.sequence_number);

    let skipped_again = queue.skip(entry.id).await.expect("second skip");
    assert_eq!(skipped_again.skip_count, 2);
    assert_eq!(skipped_again.sequence_number, entry.sequence_number);
}

#[tokio::test]
async fn consultation_lifecycle_and_idempotent_completion() {
    if !should_run_live_tests() {
        return;
    }

    let state = AppState::new(test_config()).expect("app state");
    let tenant = LiveTenant::new(&state, Role::Doctor).await;
    let doctor_id = tenant.seed_doctor(0).await;
    let patient_id = tenant.seed_patient().await;

    let queue = QueueService::new(&tenant.ctx);
    let entry = queue
        .create(booking(patient_id, doctor_id, PaymentMode::Cash))
        .await
        .expect("booking");

    // Completing before the consultation starts is a state conflict.
    let premature = queue.complete(entry.id, None).await;
    assert_matches!(premature, Err(QueueError::InvalidTransition { .. }));

    let called = queue.call(entry.id).await.expect("call");
    assert_eq!(called.call_count, 1);

    let in_consultation = queue.clock_in(entry.id).await.expect("clock in");
    assert_eq!(in_consultation.status, QueueStatus::InConsultation);
    assert!(in_consultation.started_at.is_some());

    let prescription = serde_json::json!({"medication": "paracetamol", "days": 3});
    let completed = queue
        .complete(entry.id, Some(prescription.clone()))
        .await
        .expect("complete");
    assert_eq!(completed.status, QueueStatus::Completed);
    assert_eq!(completed.completed_by, Some(tenant.ctx.user.id()));
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.prescription, Some(prescription));

    // Re-completing is a no-op, not an error.
    let again = queue.complete(entry.id, None).await.expect("re-complete");
    assert_eq!(again.completed_at, completed.completed_at);
}

#[tokio::test]
async fn online_booking_waits_for_payment_verification() {
    if !should_run_live_tests() {
        return;
    }

    let state = AppState::new(test_config()).expect("app state");
    let tenant = LiveTenant::new(&state, Role::Patient).await;
    let doctor_id = tenant.seed_doctor(0).await;
    let patient_id = tenant.seed_patient().await;

    let queue = QueueService::new(&tenant.ctx);
    let entry = queue
        .create(booking(patient_id, doctor_id, PaymentMode::Online))
        .await
        .expect("booking");
    assert_eq!(entry.status, QueueStatus::PaymentFailed);

    // Failed verification leaves the entry where it was.
    let unchanged = queue
        .verify_payment(entry.id, false)
        .await
        .expect("failed verification");
    assert_eq!(unchanged.status, QueueStatus::PaymentFailed);

    let booked = queue
        .verify_payment(entry.id, true)
        .await
        .expect("successful verification");
    assert_eq!(booked.status, QueueStatus::Booked);
}
