// src/services/allocator.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    Assignment, AssignmentDetail, AssignmentFilter, AssignmentPatch, ComplaintStatus, Department,
    NewAssignment, ResourceStatus, WorkerStatus,
};

use super::credentials::{generate_credentials, generate_otp, hash_secret};
use super::Engine;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssignment {
    pub complaint_id: i64,
    pub worker_ids: Vec<i64>,
    pub resource_ids: Vec<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: Option<String>,
    /// Defaults to the complaint's department.
    pub department: Option<Department>,
    /// Defaults to the complaint's location.
    pub location: Option<String>,
}

/// Keeps first occurrences in order.
fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn missing_ids(wanted: &[i64], found: impl Iterator<Item = i64>) -> Vec<String> {
    let found: HashSet<i64> = found.collect();
    wanted
        .iter()
        .filter(|id| !found.contains(id))
        .map(|id| id.to_string())
        .collect()
}

fn check_dates(start: DateTime<Utc>, end: DateTime<Utc>) -> EngineResult<()> {
    if end < start {
        return Err(EngineError::Validation("end date must not be before start date".into()));
    }
    Ok(())
}

impl Engine {
    /// Binds a complaint to workers and resources and issues the handshake
    /// secrets. Nothing is mutated unless every referenced worker and
    /// resource exists and is reserved in one conditional step.
    pub async fn create_assignment(
        &self,
        req: CreateAssignment,
        now: DateTime<Utc>,
    ) -> EngineResult<AssignmentDetail> {
        let worker_ids = dedup_ids(&req.worker_ids);
        let resource_ids = dedup_ids(&req.resource_ids);
        if worker_ids.is_empty() {
            return Err(EngineError::Validation("at least one worker must be selected".into()));
        }
        if resource_ids.is_empty() {
            return Err(EngineError::Validation("at least one resource must be selected".into()));
        }
        check_dates(req.start_date, req.end_date)?;
        let location = match req.location {
            Some(l) if l.trim().is_empty() => {
                return Err(EngineError::Validation("location must not be blank".into()))
            }
            other => other,
        };

        let complaint = self
            .store
            .complaint(req.complaint_id)
            .await?
            .ok_or_else(|| EngineError::not_found("complaint", req.complaint_id))?;
        if complaint.status.is_terminal() {
            return Err(EngineError::InvalidTransition(format!(
                "complaint {} is already {}",
                complaint.complaint_id, complaint.status
            )));
        }
        let citizen = self
            .store
            .citizen(complaint.citizen_id)
            .await?
            .ok_or_else(|| EngineError::not_found("citizen", complaint.citizen_id))?;

        let workers = self.store.workers(&worker_ids).await?;
        let missing = missing_ids(&worker_ids, workers.iter().map(|w| w.worker_id));
        if !missing.is_empty() {
            return Err(EngineError::not_found("worker", missing.join(", ")));
        }
        let resources = self.store.resources(&resource_ids).await?;
        let missing = missing_ids(&resource_ids, resources.iter().map(|r| r.resource_id));
        if !missing.is_empty() {
            return Err(EngineError::not_found("resource", missing.join(", ")));
        }

        let busy: Vec<String> = workers
            .iter()
            .filter(|w| w.status != WorkerStatus::Available)
            .map(|w| format!("worker \"{}\" ({})", w.name, w.status))
            .chain(
                resources
                    .iter()
                    .filter(|r| r.status != ResourceStatus::Available)
                    .map(|r| format!("resource \"{}\" ({})", r.name, r.status)),
            )
            .collect();
        if !busy.is_empty() {
            return Err(EngineError::Unavailable(format!("not available: {}", busy.join(", "))));
        }

        if let Some(active) = self.store.active_assignment_for(complaint.complaint_id).await? {
            return Err(EngineError::InvalidTransition(format!(
                "complaint {} already has active assignment {}",
                complaint.complaint_id, active.assignment_id
            )));
        }

        // The reads above give a precise error; this guard is what actually
        // keeps two allocations from sharing a worker or resource.
        if !self.store.reserve(&worker_ids, &resource_ids).await? {
            return Err(EngineError::Unavailable(
                "workers or resources were reserved by another assignment".into(),
            ));
        }

        let policy = &self.settings.secrets;
        let credentials = generate_credentials(policy);
        let otp = generate_otp(now, policy);
        let new = NewAssignment {
            complaint_id: complaint.complaint_id,
            worker_ids: worker_ids.clone(),
            resource_ids: resource_ids.clone(),
            department: req.department.unwrap_or(complaint.department),
            location: location.unwrap_or_else(|| complaint.location.clone()),
            description: req.description,
            start_date: req.start_date,
            end_date: req.end_date,
            login_id: credentials.login_id.clone(),
            login_password_hash: hash_secret(&credentials.password),
            otp_hash: hash_secret(&otp.code),
            otp_expires_at: otp.expires_at,
        };

        let assignment = match self.store.insert_assignment(new).await {
            Ok(a) => a,
            Err(e) => {
                if let Err(release_err) = self.store.release(&worker_ids, &resource_ids).await {
                    tracing::error!(
                        complaint_id = complaint.complaint_id,
                        error = %release_err,
                        "failed to release reservation after insert failure"
                    );
                }
                return Err(e.into());
            }
        };

        if let Err(e) = self
            .store
            .transition_complaint(
                complaint.complaint_id,
                &[ComplaintStatus::Pending, ComplaintStatus::Open],
                ComplaintStatus::InProgress,
                now,
            )
            .await
        {
            tracing::warn!(complaint_id = complaint.complaint_id, error = %e, "could not mark complaint in-progress");
        }

        for w in &workers {
            self.outbox.send(
                &w.email,
                "New Assignment Credentials",
                format!(
                    "Hello {},\n\nYou have been assigned to complaint #{}.\n\
                     Login ID: {}\nPassword: {}\nLocation: {}\nDepartment: {}\n",
                    w.name,
                    complaint.complaint_id,
                    credentials.login_id,
                    credentials.password,
                    assignment.location,
                    assignment.department,
                ),
            );
        }
        self.outbox.send(
            &citizen.email,
            "Complaint Verification OTP",
            format!(
                "Dear {},\n\nA team has been assigned to your complaint #{}.\n\
                 Your OTP is: {} (valid until {}).\n\
                 Share it with the field worker only once the work is done.\n",
                citizen.first_name,
                complaint.complaint_id,
                otp.code,
                otp.expires_at.format("%Y-%m-%d %H:%M UTC"),
            ),
        );

        tracing::info!(
            assignment_id = assignment.assignment_id,
            complaint_id = complaint.complaint_id,
            workers = worker_ids.len(),
            resources = resource_ids.len(),
            "assignment created"
        );
        self.detail(assignment).await
    }

    pub async fn get_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> EngineResult<Vec<AssignmentDetail>> {
        let rows = self.store.assignments(filter).await?;
        let mut out = Vec::with_capacity(rows.len());
        for a in rows {
            out.push(self.detail(a).await?);
        }
        Ok(out)
    }

    pub async fn get_assignment_by_id(&self, id: i64) -> EngineResult<AssignmentDetail> {
        let a = self.load_assignment(id).await?;
        self.detail(a).await
    }

    /// Descriptive fields only; reservations are left as they are.
    pub async fn update_assignment(
        &self,
        id: i64,
        patch: AssignmentPatch,
    ) -> EngineResult<AssignmentDetail> {
        if patch.location.as_deref().is_some_and(|l| l.trim().is_empty()) {
            return Err(EngineError::Validation("location must not be blank".into()));
        }
        let current = self.load_assignment(id).await?;
        check_dates(
            patch.start_date.unwrap_or(current.start_date),
            patch.end_date.unwrap_or(current.end_date),
        )?;
        let updated = self
            .store
            .update_assignment(id, &patch)
            .await?
            .ok_or_else(|| EngineError::not_found("assignment", id))?;
        self.detail(updated).await
    }

    /// Compensating delete: an Active assignment gives its workers and
    /// resources back (in the same store step as the delete) and returns its
    /// complaint to `open`.
    pub async fn delete_assignment(&self, id: i64, now: DateTime<Utc>) -> EngineResult<()> {
        let a = self
            .store
            .delete_assignment(id)
            .await?
            .ok_or_else(|| EngineError::not_found("assignment", id))?;
        if a.is_active() {
            if let Err(e) = self
                .store
                .transition_complaint(
                    a.complaint_id,
                    &[ComplaintStatus::InProgress],
                    ComplaintStatus::Open,
                    now,
                )
                .await
            {
                tracing::warn!(complaint_id = a.complaint_id, error = %e, "could not reopen complaint");
            }
        }
        tracing::info!(assignment_id = id, released = a.is_active(), "assignment deleted");
        Ok(())
    }

    async fn load_assignment(&self, id: i64) -> EngineResult<Assignment> {
        self.store
            .assignment(id)
            .await?
            .ok_or_else(|| EngineError::not_found("assignment", id))
    }
}
