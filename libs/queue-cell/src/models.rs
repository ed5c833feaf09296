use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use shared_models::auth::Role;

/// Lifecycle of a queue entry. Declaration order is the sort ordinal used
/// by the doctor queue view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    PaymentPending,
    PaymentFailed,
    Booked,
    Called,
    InConsultation,
    Skipped,
    Cancelled,
    Completed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::PaymentPending => "payment_pending",
            QueueStatus::PaymentFailed => "payment_failed",
            QueueStatus::Booked => "booked",
            QueueStatus::Called => "called",
            QueueStatus::InConsultation => "in_consultation",
            QueueStatus::Skipped => "skipped",
            QueueStatus::Cancelled => "cancelled",
            QueueStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "payment_pending" => Some(QueueStatus::PaymentPending),
            "payment_failed" => Some(QueueStatus::PaymentFailed),
            "booked" => Some(QueueStatus::Booked),
            "called" => Some(QueueStatus::Called),
            "in_consultation" => Some(QueueStatus::InConsultation),
            "skipped" => Some(QueueStatus::Skipped),
            "cancelled" => Some(QueueStatus::Cancelled),
            "completed" => Some(QueueStatus::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Cancelled)
    }

    /// Entry has not cleared payment yet and must stay out of the
    /// doctor's working queue.
    pub fn is_payment_state(&self) -> bool {
        matches!(self, QueueStatus::PaymentPending | QueueStatus::PaymentFailed)
    }

    /// Position in the doctor queue sort order.
    pub fn ordinal(&self) -> u8 {
        match self {
            QueueStatus::PaymentPending => 0,
            QueueStatus::PaymentFailed => 1,
            QueueStatus::Booked => 2,
            QueueStatus::Called => 3,
            QueueStatus::InConsultation => 4,
            QueueStatus::Skipped => 5,
            QueueStatus::Cancelled => 6,
            QueueStatus::Completed => 7,
        }
    }

    pub fn can_transition_to(&self, target: QueueStatus) -> bool {
        use QueueStatus::*;
        match (self, target) {
            (Booked | Skipped | Called, Called) => true,
            (Called, InConsultation) => true,
            (Booked | Skipped | Called | InConsultation, Skipped) => true,
            (InConsultation, Completed) => true,
            (PaymentPending | PaymentFailed, Booked) => true,
            (_, Cancelled) => !self.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Online,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "cash",
            PaymentMode::Online => "online",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "cash" => Some(PaymentMode::Cash),
            "online" => Some(PaymentMode::Online),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub status: QueueStatus,
    pub sequence_number: i64,
    pub skip_count: i32,
    pub clock_in_count: i32,
    pub call_count: i32,
    pub payment_mode: PaymentMode,
    pub payment_id: Option<Uuid>,
    pub booked_by: Option<Uuid>,
    pub completed_by: Option<Uuid>,
    pub cancelled_by: Option<Uuid>,
    pub remark: Option<String>,
    pub prescription: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQueueRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub payment_mode: PaymentMode,
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQueueRequest {
    pub remark: Option<String>,
    pub payment_mode: Option<PaymentMode>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteQueueRequest {
    pub prescription: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CancelQueueRequest {
    pub remark: Option<String>,
}

/// A queue entry plus navigation pointers into its surrounding list.
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntryWithNav {
    #[serde(flatten)]
    pub entry: QueueEntry,
    pub next_queue_id: Option<Uuid>,
    pub previous_queue_id: Option<Uuid>,
}

/// The doctor-facing queue: the entry being served, the fair-rotation
/// ordering of upcoming entries, and today's closed history.
#[derive(Debug, Serialize)]
pub struct DoctorQueueView {
    pub current: Option<QueueEntryWithNav>,
    pub next: Vec<QueueEntryWithNav>,
    pub previous: Vec<QueueEntryWithNav>,
}

/// Queue operations and the roles that may invoke them. Enforcement is
/// the HTTP layer's job; this is the declaration it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOperation {
    Create,
    List,
    Get,
    Update,
    Call,
    ClockIn,
    Skip,
    Complete,
    Cancel,
    VerifyPayment,
}

impl QueueOperation {
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            QueueOperation::Create => &[Role::Admin, Role::Staff, Role::Patient],
            QueueOperation::List | QueueOperation::Get => {
                &[Role::Admin, Role::Staff, Role::Doctor]
            }
            QueueOperation::Update => &[Role::Admin, Role::Staff],
            QueueOperation::Call | QueueOperation::ClockIn | QueueOperation::Skip => {
                &[Role::Admin, Role::Staff, Role::Doctor]
            }
            QueueOperation::Complete => &[Role::Doctor],
            QueueOperation::Cancel => &[Role::Admin, Role::Staff, Role::Doctor],
            QueueOperation::VerifyPayment => &[Role::Admin, Role::Patient],
        }
    }
}
