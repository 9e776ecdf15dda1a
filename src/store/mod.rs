//! Persistence seam between the engine and the shared tables.
//!
//! Every mutating method that guards an invariant is a conditional update:
//! it only applies when the record is still in the state the caller saw, and
//! reports whether it applied. The engine never does check-then-set on its own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    Assignment, AssignmentFilter, AssignmentPatch, Citizen, Complaint, ComplaintStatus, Department,
    EscalationLevel, NewAssignment, Resource, Worker,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("lock poisoned")]
    LockPoisoned,

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    // ── complaints ────────────────────────────────────────────────────────
    async fn complaint(&self, id: i64) -> StoreResult<Option<Complaint>>;

    /// Non-terminal complaints at `level` whose ladder clock started at or
    /// before `started_before`.
    async fn escalation_candidates(
        &self,
        level: EscalationLevel,
        started_before: DateTime<Utc>,
    ) -> StoreResult<Vec<Complaint>>;

    /// Moves one complaint `from` → `to` if it is still at `from` and not terminal.
    async fn escalate_complaint(
        &self,
        id: i64,
        from: EscalationLevel,
        to: EscalationLevel,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Non-terminal complaints at `level`, newest escalation first.
    async fn escalated_complaints(&self, level: EscalationLevel) -> StoreResult<Vec<Complaint>>;

    async fn overdue_complaints(&self) -> StoreResult<Vec<Complaint>>;

    /// Sets `to` when the current status is one of `from`, stamping `at`
    /// (and `resolved_at` when `to` is resolved). Returns the updated row, or
    /// `None` when the guard did not match.
    async fn transition_complaint(
        &self,
        id: i64,
        from: &[ComplaintStatus],
        to: ComplaintStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Complaint>>;

    /// Resets the ladder for a non-terminal complaint under a new department.
    async fn reassign_complaint(
        &self,
        id: i64,
        department: Department,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Complaint>>;

    async fn mark_complaint_overdue(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()>;

    /// Rejects a non-terminal complaint and adds one warning to its owner in
    /// the same step; at `freeze_at` warnings or above the account is
    /// unapproved. `None` (and no change) when the complaint is terminal or
    /// either row is missing.
    async fn reject_complaint(
        &self,
        id: i64,
        freeze_at: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<(Complaint, Citizen)>>;

    // ── citizens ──────────────────────────────────────────────────────────
    async fn citizen(&self, id: i64) -> StoreResult<Option<Citizen>>;


    // ── directory ─────────────────────────────────────────────────────────
    async fn workers(&self, ids: &[i64]) -> StoreResult<Vec<Worker>>;

    async fn resources(&self, ids: &[i64]) -> StoreResult<Vec<Resource>>;

    /// Flips every worker to On-Duty and every resource to In Use, but only
    /// if all of them are Available. Either everything is reserved or nothing is.
    async fn reserve(&self, worker_ids: &[i64], resource_ids: &[i64]) -> StoreResult<bool>;

    async fn release(&self, worker_ids: &[i64], resource_ids: &[i64]) -> StoreResult<()>;

    // ── assignments ───────────────────────────────────────────────────────
    async fn insert_assignment(&self, new: NewAssignment) -> StoreResult<Assignment>;

    async fn assignment(&self, id: i64) -> StoreResult<Option<Assignment>>;

    async fn assignment_by_login(&self, login_id: &str) -> StoreResult<Option<Assignment>>;

    async fn active_assignment_for(&self, complaint_id: i64) -> StoreResult<Option<Assignment>>;

    async fn assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>>;

    async fn update_assignment(
        &self,
        id: i64,
        patch: &AssignmentPatch,
    ) -> StoreResult<Option<Assignment>>;

    /// Removes the record and, if it was still Active, hands its workers and
    /// resources back in the same step. Returns the removed row.
    async fn delete_assignment(&self, id: i64) -> StoreResult<Option<Assignment>>;

    /// Active → Resolved with every secret cleared and its workers and
    /// resources released, all or nothing. `false` if it was not Active.
    async fn close_assignment(&self, id: i64, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Active, not yet overdue, started at or before `started_before`.
    async fn overdue_candidates(&self, started_before: DateTime<Utc>)
        -> StoreResult<Vec<Assignment>>;

    /// One-way latch. `false` if it was already set.
    async fn flag_assignment_overdue(&self, id: i64) -> StoreResult<bool>;

    async fn mark_reminder_sent(&self, id: i64) -> StoreResult<()>;
}
