use std::collections::HashSet;

use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::TenantError;
use crate::schema::SchemaName;

/// A versioned, idempotent schema-change step. Statements run with
/// `search_path` pinned to the tenant schema, so object names stay
/// unqualified.
pub struct MigrationDescriptor {
    /// Lexicographically sortable version stamp.
    pub version: &'static str,
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

/// The full migration history, in order. Append-only; versions must stay
/// lexicographically sorted. Every `up` block is safe to re-run against a
/// partially-applied schema, which is the only defense against two
/// processes migrating the same tenant at once.
pub const MIGRATIONS: &[MigrationDescriptor] = &[
    MigrationDescriptor {
        version: "20240301000001",
        name: "create_doctors",
        up: r#"CREATE TABLE IF NOT EXISTS doctors (
                id                   UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                full_name            TEXT NOT NULL,
                specialty            TEXT,
                email                TEXT UNIQUE NOT NULL,
                last_sequence_number BIGINT NOT NULL DEFAULT 0,
                is_active            BOOLEAN NOT NULL DEFAULT TRUE,
                created_at           TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at           TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        down: "DROP TABLE IF EXISTS doctors",
    },
    MigrationDescriptor {
        version: "20240301000002",
        name: "create_patients",
        up: r#"CREATE TABLE IF NOT EXISTS patients (
                id            UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                full_name     TEXT NOT NULL,
                phone         TEXT,
                email         TEXT,
                date_of_birth DATE,
                created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        down: "DROP TABLE IF EXISTS patients",
    },
    MigrationDescriptor {
        version: "20240301000003",
        name: "create_queue_entries",
        up: r#"CREATE TABLE IF NOT EXISTS queue_entries (
                id              UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                patient_id      UUID NOT NULL REFERENCES patients(id),
                doctor_id       UUID NOT NULL REFERENCES doctors(id),
                status          TEXT NOT NULL,
                sequence_number BIGINT NOT NULL,
                skip_count      INT NOT NULL DEFAULT 0,
                clock_in_count  INT NOT NULL DEFAULT 0,
                call_count      INT NOT NULL DEFAULT 0,
                payment_mode    TEXT NOT NULL DEFAULT 'cash',
                payment_id      UUID,
                booked_by       UUID,
                completed_by    UUID,
                cancelled_by    UUID,
                remark          TEXT,
                prescription    JSONB,
                created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                started_at      TIMESTAMPTZ,
                completed_at    TIMESTAMPTZ
            );
            CREATE UNIQUE INDEX IF NOT EXISTS queue_entries_doctor_seq_idx
                ON queue_entries (doctor_id, sequence_number);
            CREATE INDEX IF NOT EXISTS queue_entries_doctor_day_idx
                ON queue_entries (doctor_id, created_at);
            CREATE INDEX IF NOT EXISTS queue_entries_patient_idx
                ON queue_entries (patient_id)"#,
        down: "DROP TABLE IF EXISTS queue_entries",
    },
    MigrationDescriptor {
        version: "20240301000004",
        name: "create_payments",
        up: r#"CREATE TABLE IF NOT EXISTS payments (
                id             UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                reference_type TEXT NOT NULL DEFAULT 'queue_entry',
                reference_id   UUID NOT NULL,
                provider       TEXT NOT NULL,
                order_id       TEXT,
                payment_id     TEXT,
                signature      TEXT,
                amount         BIGINT NOT NULL,
                currency       TEXT NOT NULL,
                status         TEXT NOT NULL DEFAULT 'created',
                created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS payments_order_idx ON payments (order_id);
            CREATE INDEX IF NOT EXISTS payments_reference_idx
                ON payments (reference_type, reference_id)"#,
        down: "DROP TABLE IF EXISTS payments",
    },
    MigrationDescriptor {
        version: "20240301000005",
        name: "create_activity_logs",
        up: r#"CREATE TABLE IF NOT EXISTS activity_logs (
                id           UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                actor_id     UUID,
                actor_role   TEXT,
                action       TEXT NOT NULL,
                subject_type TEXT NOT NULL,
                subject_id   UUID,
                detail       JSONB,
                created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS activity_logs_subject_idx
                ON activity_logs (subject_type, subject_id)"#,
        down: "DROP TABLE IF EXISTS activity_logs",
    },
];

const CREATE_TRACKING_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS _migrations (
    version     TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    executed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#;

/// Computes the migrations still to run, preserving declaration order.
pub fn pending<'a>(
    all: &'a [MigrationDescriptor],
    executed: &HashSet<String>,
) -> Vec<&'a MigrationDescriptor> {
    all.iter()
        .filter(|m| !executed.contains(m.version))
        .collect()
}

/// Brings tenant schemas up to date against [`MIGRATIONS`].
///
/// The runner records each version immediately after its `up` block
/// succeeds and stops at the first failure, so a later invocation resumes
/// from the first unrecorded version. There is no cross-process lock;
/// idempotent DDL carries that weight.
pub struct SchemaMigrator {
    registry: PgPool,
    ensured: RwLock<HashSet<String>>,
}

impl SchemaMigrator {
    pub fn new(registry: PgPool) -> Self {
        Self {
            registry,
            ensured: RwLock::new(HashSet::new()),
        }
    }

    /// Ensures the tenant schema exists and has every migration applied.
    ///
    /// The process-local `ensured` marker is an optimization only: it
    /// skips the round-trips on the hot path, it does not guard against
    /// other processes.
    pub async fn ensure_tenant_tables(
        &self,
        schema: &SchemaName,
        pool: &PgPool,
    ) -> Result<(), TenantError> {
        if self.ensured.read().await.contains(schema.as_str()) {
            return Ok(());
        }

        // CREATE SCHEMA runs on the registry pool: the tenant pool's
        // search_path points at a schema that may not exist yet.
        sqlx::raw_sql(&format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", schema))
            .execute(&self.registry)
            .await?;

        sqlx::raw_sql(CREATE_TRACKING_TABLE).execute(pool).await?;

        let rows: Vec<(String,)> = sqlx::query_as("SELECT version FROM _migrations")
            .fetch_all(pool)
            .await?;
        let executed: HashSet<String> = rows.into_iter().map(|(v,)| v).collect();

        for migration in pending(MIGRATIONS, &executed) {
            debug!(
                "Applying migration {} ({}) to schema {}",
                migration.version, migration.name, schema
            );
            sqlx::raw_sql(migration.up)
                .execute(pool)
                .await
                .map_err(|source| TenantError::Migration {
                    version: migration.version.to_string(),
                    source,
                })?;
            sqlx::query("INSERT INTO _migrations (version, name) VALUES ($1, $2)")
                .bind(migration.version)
                .bind(migration.name)
                .execute(pool)
                .await?;
            info!(
                "Applied migration {} ({}) to schema {}",
                migration.version, migration.name, schema
            );
        }

        self.ensured
            .write()
            .await
            .insert(schema.as_str().to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_sorted_and_unique() {
        let versions: Vec<_> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn pending_preserves_order_and_skips_executed() {
        let executed: HashSet<String> =
            ["20240301000001", "20240301000003"].iter().map(|s| s.to_string()).collect();

        let remaining = pending(MIGRATIONS, &executed);
        let names: Vec<_> = remaining.iter().map(|m| m.name).collect();
        assert_eq!(
            names,
            vec!["create_patients", "create_payments", "create_activity_logs"]
        );
    }

    #[test]
    fn pending_is_empty_when_all_executed() {
        let executed: HashSet<String> =
            MIGRATIONS.iter().map(|m| m.version.to_string()).collect();
        assert!(pending(MIGRATIONS, &executed).is_empty());
    }

    #[test]
    fn up_blocks_are_rerun_safe() {
        for migration in MIGRATIONS {
            assert!(
                migration.up.contains("IF NOT EXISTS"),
                "migration {} must be idempotent",
                migration.name
            );
        }
    }
}
