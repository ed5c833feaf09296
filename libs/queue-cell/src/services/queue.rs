use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::TenantContext;
use shared_models::auth::Role;

use crate::error::QueueError;
use crate::models::{
    CreateQueueRequest, DoctorQueueView, PaymentMode, QueueEntry, QueueEntryWithNav, QueueStatus,
    UpdateQueueRequest,
};

const ENTRY_COLUMNS: &str = "id, patient_id, doctor_id, status, sequence_number, skip_count, \
     clock_in_count, call_count, payment_mode, payment_id, booked_by, completed_by, \
     cancelled_by, remark, prescription, created_at, started_at, completed_at";

#[derive(Debug, FromRow)]
struct QueueEntryRow {
    id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    status: String,
    sequence_number: i64,
    skip_count: i32,
    clock_in_count: i32,
    call_count: i32,
    payment_mode: String,
    payment_id: Option<Uuid>,
    booked_by: Option<Uuid>,
    completed_by: Option<Uuid>,
    cancelled_by: Option<Uuid>,
    remark: Option<String>,
    prescription: Option<Value>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<QueueEntryRow> for QueueEntry {
    type Error = QueueError;

    fn try_from(row: QueueEntryRow) -> Result<Self, Self::Error> {
        let status = QueueStatus::parse(&row.status).ok_or_else(|| QueueError::Corrupt {
            id: row.id,
            detail: format!("unknown status {:?}", row.status),
        })?;
        let payment_mode =
            PaymentMode::parse(&row.payment_mode).ok_or_else(|| QueueError::Corrupt {
                id: row.id,
                detail: format!("unknown payment mode {:?}", row.payment_mode),
            })?;

        Ok(QueueEntry {
            id: row.id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            status,
            sequence_number: row.sequence_number,
            skip_count: row.skip_count,
            clock_in_count: row.clock_in_count,
            call_count: row.call_count,
            payment_mode,
            payment_id: row.payment_id,
            booked_by: row.booked_by,
            completed_by: row.completed_by,
            cancelled_by: row.cancelled_by,
            remark: row.remark,
            prescription: row.prescription,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

/// Fair-rotation ordering for the doctor's working queue: least status
/// ordinal first, then least-skipped, then lowest ticket number.
pub fn queue_order(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    a.status
        .ordinal()
        .cmp(&b.status.ordinal())
        .then(a.skip_count.cmp(&b.skip_count))
        .then(a.sequence_number.cmp(&b.sequence_number))
}

fn with_nav(list: &[QueueEntry]) -> Vec<QueueEntryWithNav> {
    list.iter()
        .enumerate()
        .map(|(i, entry)| QueueEntryWithNav {
            entry: entry.clone(),
            next_queue_id: list.get(i + 1).map(|e| e.id),
            previous_queue_id: if i > 0 { Some(list[i - 1].id) } else { None },
        })
        .collect()
}

/// Shapes today's entries for one doctor into the current/next/previous
/// view. An explicit `current_id` bypasses the fair-rotation ordering.
pub fn build_doctor_queue(
    entries: Vec<QueueEntry>,
    current_id: Option<Uuid>,
) -> Result<DoctorQueueView, QueueError> {
    let mut next: Vec<QueueEntry> = entries
        .iter()
        .filter(|e| !e.status.is_terminal() && !e.status.is_payment_state())
        .cloned()
        .collect();
    next.sort_by(queue_order);

    let mut previous: Vec<QueueEntry> = entries
        .iter()
        .filter(|e| e.status.is_terminal())
        .cloned()
        .collect();
    previous.sort_by(|a, b| b.sequence_number.cmp(&a.sequence_number));

    let next = with_nav(&next);
    let previous = with_nav(&previous);

    let current = match current_id {
        Some(id) => {
            let found = next
                .iter()
                .chain(previous.iter())
                .find(|e| e.entry.id == id)
                .cloned()
                .or_else(|| {
                    // Entries outside both lists (payment states) can
                    // still be addressed directly; they carry no nav.
                    entries.iter().find(|e| e.id == id).map(|e| QueueEntryWithNav {
                        entry: e.clone(),
                        next_queue_id: None,
                        previous_queue_id: None,
                    })
                });
            Some(found.ok_or(QueueError::EntryNotFound(id))?)
        }
        None => next.first().cloned(),
    };

    Ok(DoctorQueueView {
        current,
        next,
        previous,
    })
}

/// Tenant-scoped queue operations. Holds the request's tenant context;
/// every query runs against that tenant's pool.
pub struct QueueService<'a> {
    ctx: &'a TenantContext,
}

impl<'a> QueueService<'a> {
    pub fn new(ctx: &'a TenantContext) -> Self {
        Self { ctx }
    }

    /// Books a patient into a doctor's queue.
    ///
    /// The ticket number comes from the doctor's counter row, taken
    /// `FOR UPDATE` in the same transaction that inserts the entry and
    /// writes the counter back: concurrent bookings for one doctor
    /// serialize on that row lock, so numbers are gap-free and unique.
    pub async fn create(&self, request: CreateQueueRequest) -> Result<QueueEntry, QueueError> {
        let mut tx = self.ctx.pool.begin().await?;

        // Taking the counter lock first serializes bookings per doctor,
        // which also makes the duplicate check race-free.
        let counter: Option<(i64,)> =
            sqlx::query_as("SELECT last_sequence_number FROM doctors WHERE id = $1 FOR UPDATE")
                .bind(request.doctor_id)
                .fetch_optional(&mut *tx)
                .await?;
        let last = counter
            .ok_or(QueueError::DoctorNotFound(request.doctor_id))?
            .0;
        let sequence_number = last + 1;

        let existing: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM queue_entries \
             WHERE patient_id = $1 AND doctor_id = $2 \
               AND created_at::date = CURRENT_DATE \
               AND status NOT IN ('completed', 'cancelled') \
             LIMIT 1",
        )
        .bind(request.patient_id)
        .bind(request.doctor_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((existing_id,)) = existing {
            return Err(QueueError::DuplicateBooking { existing_id });
        }

        let status = self.initial_status(request.payment_mode);

        let row: QueueEntryRow = sqlx::query_as(&format!(
            "INSERT INTO queue_entries \
                 (patient_id, doctor_id, status, sequence_number, payment_mode, booked_by, remark) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(request.patient_id)
        .bind(request.doctor_id)
        .bind(status.as_str())
        .bind(sequence_number)
        .bind(request.payment_mode.as_str())
        .bind(self.ctx.user.id())
        .bind(&request.remark)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE doctors SET last_sequence_number = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(request.doctor_id)
        .bind(sequence_number)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "Booked queue entry {} for doctor {} at sequence {}",
            row.id, request.doctor_id, sequence_number
        );
        row.try_into()
    }

    pub async fn get(&self, id: Uuid) -> Result<QueueEntry, QueueError> {
        let row: Option<QueueEntryRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM queue_entries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.ctx.pool)
        .await?;

        row.ok_or(QueueError::EntryNotFound(id))?.try_into()
    }

    /// Today's entries, newest first, optionally narrowed to one doctor.
    pub async fn list(&self, doctor_id: Option<Uuid>) -> Result<Vec<QueueEntry>, QueueError> {
        let rows: Vec<QueueEntryRow> = match doctor_id {
            Some(doctor_id) => {
                sqlx::query_as(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM queue_entries \
                     WHERE doctor_id = $1 AND created_at::date = CURRENT_DATE \
                     ORDER BY created_at DESC"
                ))
                .bind(doctor_id)
                .fetch_all(&self.ctx.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM queue_entries \
                     WHERE created_at::date = CURRENT_DATE \
                     ORDER BY created_at DESC"
                ))
                .fetch_all(&self.ctx.pool)
                .await?
            }
        };

        rows.into_iter().map(QueueEntry::try_from).collect()
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateQueueRequest,
    ) -> Result<QueueEntry, QueueError> {
        let mut tx = self.ctx.pool.begin().await?;
        let entry = Self::lock_entry(&mut tx, id).await?;

        if entry.status.is_terminal() {
            return Err(QueueError::Validation(format!(
                "queue entry {} is {} and can no longer be updated",
                id, entry.status
            )));
        }

        let remark = request.remark.or(entry.remark);
        let payment_mode = request.payment_mode.unwrap_or(entry.payment_mode);

        let row: QueueEntryRow = sqlx::query_as(&format!(
            "UPDATE queue_entries SET remark = $2, payment_mode = $3 \
             WHERE id = $1 RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(id)
        .bind(&remark)
        .bind(payment_mode.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Calls the patient to the consultation room.
    pub async fn call(&self, id: Uuid) -> Result<QueueEntry, QueueError> {
        let mut tx = self.ctx.pool.begin().await?;
        let entry = Self::lock_entry(&mut tx, id).await?;

        Self::check_transition(&entry, QueueStatus::Called, "BOOKED, SKIPPED or CALLED")?;

        let row: QueueEntryRow = sqlx::query_as(&format!(
            "UPDATE queue_entries SET status = $2, call_count = call_count + 1 \
             WHERE id = $1 RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(id)
        .bind(QueueStatus::Called.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Marks the consultation as started.
    pub async fn clock_in(&self, id: Uuid) -> Result<QueueEntry, QueueError> {
        let mut tx = self.ctx.pool.begin().await?;
        let entry = Self::lock_entry(&mut tx, id).await?;

        Self::check_transition(&entry, QueueStatus::InConsultation, "CALLED")?;

        let row: QueueEntryRow = sqlx::query_as(&format!(
            "UPDATE queue_entries \
             SET status = $2, clock_in_count = clock_in_count + 1, started_at = NOW() \
             WHERE id = $1 RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(id)
        .bind(QueueStatus::InConsultation.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Pushes the entry back in the rotation. The ticket number is never
    /// touched; fairness comes from the skip counter in the view order.
    pub async fn skip(&self, id: Uuid) -> Result<QueueEntry, QueueError> {
        let mut tx = self.ctx.pool.begin().await?;
        let entry = Self::lock_entry(&mut tx, id).await?;

        Self::check_transition(
            &entry,
            QueueStatus::Skipped,
            "BOOKED, SKIPPED, CALLED or IN_CONSULTATION",
        )?;

        let row: QueueEntryRow = sqlx::query_as(&format!(
            "UPDATE queue_entries SET status = $2, skip_count = skip_count + 1 \
             WHERE id = $1 RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(id)
        .bind(QueueStatus::Skipped.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Closes the consultation. Re-completing a completed entry returns
    /// it unchanged.
    pub async fn complete(
        &self,
        id: Uuid,
        prescription: Option<Value>,
    ) -> Result<QueueEntry, QueueError> {
        let mut tx = self.ctx.pool.begin().await?;
        let entry = Self::lock_entry(&mut tx, id).await?;

        if entry.status == QueueStatus::Completed {
            tx.rollback().await?;
            return Ok(entry);
        }

        Self::check_transition(&entry, QueueStatus::Completed, "IN_CONSULTATION")?;

        let row: QueueEntryRow = sqlx::query_as(&format!(
            "UPDATE queue_entries \
             SET status = $2, completed_by = $3, completed_at = NOW(), prescription = $4 \
             WHERE id = $1 RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(id)
        .bind(QueueStatus::Completed.as_str())
        .bind(self.ctx.user.id())
        .bind(&prescription)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Cancels any non-terminal entry, recording who and why. Entries are
    /// never hard-deleted; cancellation is the end of the road.
    pub async fn cancel(
        &self,
        id: Uuid,
        remark: Option<String>,
    ) -> Result<QueueEntry, QueueError> {
        let mut tx = self.ctx.pool.begin().await?;
        let entry = Self::lock_entry(&mut tx, id).await?;

        Self::check_transition(&entry, QueueStatus::Cancelled, "any non-terminal status")?;

        let row: QueueEntryRow = sqlx::query_as(&format!(
            "UPDATE queue_entries SET status = $2, cancelled_by = $3, remark = $4 \
             WHERE id = $1 RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(id)
        .bind(QueueStatus::Cancelled.as_str())
        .bind(self.ctx.user.id())
        .bind(remark.or(entry.remark))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Applies a payment verification outcome. Success moves the entry
    /// into the working queue; failure leaves its status untouched (the
    /// payment record carries the failure). Verification can arrive twice
    /// (client call and provider webhook), so an already-booked entry is
    /// returned as-is.
    pub async fn verify_payment(&self, id: Uuid, success: bool) -> Result<QueueEntry, QueueError> {
        let mut tx = self.ctx.pool.begin().await?;
        let entry = Self::lock_entry(&mut tx, id).await?;

        if success && entry.status == QueueStatus::Booked {
            tx.rollback().await?;
            return Ok(entry);
        }

        Self::check_transition(
            &entry,
            QueueStatus::Booked,
            "PAYMENT_PENDING or PAYMENT_FAILED",
        )?;

        if !success {
            tx.rollback().await?;
            return Ok(entry);
        }

        let row: QueueEntryRow = sqlx::query_as(&format!(
            "UPDATE queue_entries SET status = $2 WHERE id = $1 RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(id)
        .bind(QueueStatus::Booked.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// The doctor-facing view over today's queue.
    pub async fn get_queue_for_doctor(
        &self,
        doctor_id: Uuid,
        current_id: Option<Uuid>,
    ) -> Result<DoctorQueueView, QueueError> {
        let rows: Vec<QueueEntryRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM queue_entries \
             WHERE doctor_id = $1 AND created_at::date = CURRENT_DATE"
        ))
        .bind(doctor_id)
        .fetch_all(&self.ctx.pool)
        .await?;

        let entries: Vec<QueueEntry> = rows
            .into_iter()
            .map(QueueEntry::try_from)
            .collect::<Result<_, _>>()?;

        debug!(
            "Building doctor queue for {} over {} entries",
            doctor_id,
            entries.len()
        );
        build_doctor_queue(entries, current_id)
    }

    fn initial_status(&self, mode: PaymentMode) -> QueueStatus {
        match mode {
            // Online bookings sit outside the working queue until the
            // provider verification flips them to booked.
            PaymentMode::Online => QueueStatus::PaymentFailed,
            PaymentMode::Cash => match self.ctx.user.role() {
                Role::Admin | Role::Staff | Role::Doctor => QueueStatus::Booked,
                Role::Patient => QueueStatus::PaymentPending,
            },
        }
    }

    fn check_transition(
        entry: &QueueEntry,
        target: QueueStatus,
        required: &'static str,
    ) -> Result<(), QueueError> {
        if entry.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(QueueError::InvalidTransition {
                from: entry.status,
                to: target,
                required,
            })
        }
    }

    async fn lock_entry(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<QueueEntry, QueueError> {
        let row: Option<QueueEntryRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM queue_entries WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        row.ok_or(QueueError::EntryNotFound(id))?.try_into()
    }
}
