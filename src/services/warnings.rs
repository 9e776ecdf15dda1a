// src/services/warnings.rs

use chrono::{DateTime, Utc};

use crate::error::{EngineError, EngineResult};
use crate::models::RejectionOutcome;

use super::Engine;

impl Engine {
    /// Rejects a complaint as false and ratchets its owner's warning count.
    /// Reaching the threshold freezes the account; nothing here ever thaws it.
    pub async fn reject_false_complaint(
        &self,
        complaint_id: i64,
        now: DateTime<Utc>,
    ) -> EngineResult<RejectionOutcome> {
        let complaint = self
            .store
            .complaint(complaint_id)
            .await?
            .ok_or_else(|| EngineError::not_found("complaint", complaint_id))?;
        if complaint.status.is_terminal() {
            return Err(EngineError::InvalidTransition(format!(
                "complaint {complaint_id} is already {}",
                complaint.status
            )));
        }
        if let Some(a) = self.store.active_assignment_for(complaint_id).await? {
            return Err(EngineError::InvalidTransition(format!(
                "complaint {complaint_id} has active assignment {}; delete it first",
                a.assignment_id
            )));
        }
        if self.store.citizen(complaint.citizen_id).await?.is_none() {
            return Err(EngineError::not_found("citizen", complaint.citizen_id));
        }

        // The rejection and the strike land together or not at all.
        let threshold = self.settings.warning_threshold;
        let (complaint, citizen) = self
            .store
            .reject_complaint(complaint_id, threshold, now)
            .await?
            .ok_or_else(|| {
                EngineError::InvalidTransition(format!("complaint {complaint_id} changed concurrently"))
            })?;

        let frozen = citizen.warnings >= threshold;
        if frozen {
            self.outbox.send(
                &citizen.email,
                "Account Frozen - Multiple False Complaints",
                format!(
                    "Dear {},\n\nYour account has been frozen due to multiple false complaints.\n",
                    citizen.first_name
                ),
            );
            tracing::warn!(citizen_id = citizen.citizen_id, warnings = citizen.warnings, "citizen account frozen");
        } else {
            self.outbox.send(
                &citizen.email,
                format!("Warning {}/{threshold} - False Complaint Notice", citizen.warnings),
                format!(
                    "Dear {},\n\nYour complaint #{complaint_id} was marked as false. \
                     This is warning {} of {threshold}.\n\
                     After {threshold} warnings your account will be suspended.\n",
                    citizen.first_name, citizen.warnings
                ),
            );
        }

        tracing::info!(complaint_id, citizen_id = citizen.citizen_id, warnings = citizen.warnings, "complaint rejected as false");
        Ok(RejectionOutcome { complaint, warnings: citizen.warnings, frozen })
    }
}
