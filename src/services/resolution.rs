// src/services/resolution.rs

use chrono::{DateTime, Utc};

use crate::error::{EngineError, EngineResult};
use crate::models::{ComplaintStatus, ResolutionReceipt};

use super::credentials::{is_well_formed_otp, secret_matches};
use super::Engine;

impl Engine {
    /// Completes the worker/citizen handshake. Every failure is decided
    /// before the first write, so a rejected attempt leaves no trace.
    pub async fn resolve_assignment(
        &self,
        assignment_id: i64,
        otp: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<ResolutionReceipt> {
        if !is_well_formed_otp(otp) {
            return Err(EngineError::Validation("OTP must be exactly 6 digits".into()));
        }
        let assignment = self
            .store
            .assignment(assignment_id)
            .await?
            .ok_or(EngineError::AssignmentNotFound(assignment_id))?;
        if !assignment.is_active() {
            return Err(EngineError::AlreadyResolved(assignment_id));
        }
        if !secret_matches(otp, assignment.otp_hash.as_deref()) {
            tracing::warn!(assignment_id, "OTP mismatch");
            return Err(EngineError::OtpMismatch);
        }
        if assignment.otp_expires_at.map_or(true, |exp| exp < now) {
            return Err(EngineError::OtpExpired);
        }

        // Closing also frees the workers and resources. Lost a race with a
        // concurrent confirmation if nothing was Active any more.
        if !self.store.close_assignment(assignment_id, now).await? {
            return Err(EngineError::AlreadyResolved(assignment_id));
        }

        // The assignment is settled from here on. A complaint left behind is
        // still open to the escalation desk, so failures are only logged.
        let complaint = match self
            .store
            .transition_complaint(
                assignment.complaint_id,
                &ComplaintStatus::ACTIVE,
                ComplaintStatus::Resolved,
                now,
            )
            .await
        {
            Ok(None) => {
                tracing::warn!(
                    assignment_id,
                    complaint_id = assignment.complaint_id,
                    "linked complaint missing or already terminal"
                );
                None
            }
            Ok(complaint) => complaint,
            Err(e) => {
                tracing::error!(
                    assignment_id,
                    complaint_id = assignment.complaint_id,
                    error = %e,
                    "assignment resolved but complaint was not updated"
                );
                None
            }
        };

        if let Some(complaint) = &complaint {
            match self.store.citizen(complaint.citizen_id).await {
                Ok(Some(citizen)) => self.outbox.send(
                    &citizen.email,
                    "Complaint Resolved Successfully",
                    format!(
                        "Dear {},\n\nGood news! Your complaint #{} has been resolved.\n\
                         Department: {}\nLocation: {}\n\nThank you for your cooperation.\n",
                        citizen.first_name,
                        complaint.complaint_id,
                        assignment.department,
                        assignment.location,
                    ),
                ),
                Ok(None) => tracing::warn!(citizen_id = complaint.citizen_id, "citizen missing, no resolution notice"),
                Err(e) => tracing::warn!(citizen_id = complaint.citizen_id, error = %e, "could not load citizen for resolution notice"),
            }
        }

        tracing::info!(assignment_id, complaint_id = assignment.complaint_id, "assignment resolved");
        Ok(ResolutionReceipt {
            assignment_id,
            complaint_id: assignment.complaint_id,
            resolved_at: now,
        })
    }
}
