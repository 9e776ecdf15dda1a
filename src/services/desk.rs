// src/services/desk.rs

use chrono::{DateTime, Utc};

use crate::error::{EngineError, EngineResult};
use crate::models::{Complaint, ComplaintStatus, Department, EscalationLevel};

use super::Engine;

impl Engine {
    pub async fn get_escalated_complaints(&self, level: EscalationLevel) -> EngineResult<Vec<Complaint>> {
        Ok(self.store.escalated_complaints(level).await?)
    }

    /// Admin override. Complaints with an Active assignment must go through
    /// the OTP handshake (or have the assignment deleted) instead.
    pub async fn resolve_complaint(&self, id: i64, now: DateTime<Utc>) -> EngineResult<Complaint> {
        let complaint = self.load_open_complaint(id).await?;
        if let Some(a) = self.store.active_assignment_for(id).await? {
            return Err(EngineError::InvalidTransition(format!(
                "complaint {id} has active assignment {}; resolve it with the citizen OTP",
                a.assignment_id
            )));
        }
        let resolved = self
            .store
            .transition_complaint(id, &ComplaintStatus::ACTIVE, ComplaintStatus::Resolved, now)
            .await?
            .ok_or_else(|| EngineError::InvalidTransition(format!("complaint {id} changed concurrently")))?;
        tracing::info!(complaint_id = id, level = %complaint.escalation_level, "complaint resolved from escalation desk");
        Ok(resolved)
    }

    /// Hands the complaint to another department and restarts the ladder.
    pub async fn reassign_complaint(
        &self,
        id: i64,
        department: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Complaint> {
        let department: Department = department
            .parse()
            .map_err(|e: crate::models::UnknownVariant| EngineError::Validation(e.to_string()))?;
        self.load_open_complaint(id).await?;
        let complaint = self
            .store
            .reassign_complaint(id, department, now)
            .await?
            .ok_or_else(|| EngineError::InvalidTransition(format!("complaint {id} changed concurrently")))?;
        tracing::info!(complaint_id = id, %department, "complaint reassigned");
        Ok(complaint)
    }

    async fn load_open_complaint(&self, id: i64) -> EngineResult<Complaint> {
        let complaint = self
            .store
            .complaint(id)
            .await?
            .ok_or_else(|| EngineError::not_found("complaint", id))?;
        if complaint.status.is_terminal() {
            return Err(EngineError::InvalidTransition(format!(
                "complaint {id} is already {}",
                complaint.status
            )));
        }
        Ok(complaint)
    }
}
