// src/models/mod.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Returned when a TEXT column holds a value outside the enum's vocabulary.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// Enums are persisted as TEXT using the exact spellings below, so other
// subsystems sharing the tables read the same values.
macro_rules! text_enum {
    ($name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownVariant;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }
    };
}

text_enum!(ComplaintStatus, "complaint status" {
    Pending => "pending",
    Open => "open",
    InProgress => "in-progress",
    Resolved => "resolved",
    Rejected => "rejected",
});

impl ComplaintStatus {
    /// Statuses the scheduler, allocator and desk still act on.
    pub const ACTIVE: [ComplaintStatus; 3] = [Self::Pending, Self::Open, Self::InProgress];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }
}

text_enum!(EscalationLevel, "escalation level" {
    Staff => "staff",
    Admin => "admin",
    SuperAdmin => "superadmin",
});

text_enum!(AssignmentStatus, "assignment status" {
    Active => "Active",
    Resolved => "Resolved",
});

text_enum!(WorkerStatus, "worker status" {
    Available => "Available",
    OnDuty => "On-Duty",
    OffDuty => "Off-Duty",
    Retired => "Retired",
});

text_enum!(ResourceStatus, "resource status" {
    Available => "Available",
    InUse => "In Use",
    UnderMaintenance => "Under Maintenance",
    Unavailable => "Unavailable",
});

text_enum!(Department, "department" {
    PublicWorks => "Public Works Department (PWD)",
    Sanitation => "Sanitation Department",
    WaterSupply => "Water Supply Department",
    Electricity => "Electricity Department",
    ParksEnvironment => "Parks & Environment Department",
});

// ───────────────────────────────────────
// Complaints & citizens (owned by intake)
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Complaint {
    pub complaint_id: i64,
    pub citizen_id: i64,
    #[sqlx(try_from = "String")]
    pub department: Department,
    #[sqlx(try_from = "String")]
    pub status: ComplaintStatus,
    #[sqlx(try_from = "String")]
    pub escalation_level: EscalationLevel,
    pub location: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Escalation age is measured from here; reassignment restarts it.
    pub ladder_started_at: DateTime<Utc>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub overdue: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Citizen {
    pub citizen_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub warnings: i32,
    pub approved: bool,
}

// ───────────────────────────────────────
// Directory: workers & resources
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Worker {
    pub worker_id: i64,
    pub name: String,
    pub email: String,
    pub department: String,
    #[sqlx(try_from = "String")]
    pub status: WorkerStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Resource {
    pub resource_id: i64,
    pub name: String,
    pub department: String,
    pub category: String,
    #[sqlx(try_from = "String")]
    pub status: ResourceStatus,
}

// ───────────────────────────────────────
// Assignments
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub assignment_id: i64,
    pub complaint_id: i64,
    pub worker_ids: Vec<i64>,
    pub resource_ids: Vec<i64>,
    #[sqlx(try_from = "String")]
    pub department: Department,
    pub location: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: AssignmentStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    // Secrets exist only while Active and never leave the service.
    #[serde(skip_serializing, default)]
    pub login_id: Option<String>,
    #[serde(skip_serializing, default)]
    pub login_password_hash: Option<String>,
    #[serde(skip_serializing, default)]
    pub otp_hash: Option<String>,
    #[serde(skip_serializing, default)]
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub overdue: bool,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active
    }
}

/// Everything needed to persist a freshly allocated assignment.
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub complaint_id: i64,
    pub worker_ids: Vec<i64>,
    pub resource_ids: Vec<i64>,
    pub department: Department,
    pub location: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub login_id: String,
    pub login_password_hash: String,
    pub otp_hash: String,
    pub otp_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentFilter {
    pub worker_id: Option<i64>,
    pub resource_id: Option<i64>,
    pub department: Option<Department>,
}

impl AssignmentFilter {
    pub fn matches(&self, a: &Assignment) -> bool {
        self.worker_id.map_or(true, |w| a.worker_ids.contains(&w))
            && self.resource_id.map_or(true, |r| a.resource_ids.contains(&r))
            && self.department.map_or(true, |d| a.department == d)
    }
}

/// Descriptive fields staff may edit; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentPatch {
    pub department: Option<Department>,
    pub location: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

// ───────────────────────────────────────
// DTOs helpful for endpoints
// ───────────────────────────────────────

/// Assignment joined with its directory entries. Secrets are skipped by
/// `Assignment`'s serializer.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentDetail {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub workers: Vec<Worker>,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReceipt {
    pub assignment_id: i64,
    pub complaint_id: i64,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectionOutcome {
    pub complaint: Complaint,
    pub warnings: i32,
    pub frozen: bool,
}
