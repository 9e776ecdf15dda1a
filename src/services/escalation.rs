//! Escalation scheduler: promotes stalled complaints up the fixed
//! staff → admin → superadmin ladder.
//!
//! Each tick re-reads the store, so the task carries no state and can be
//! stopped or restarted at any time. A record is promoted only if it is still
//! at the level it was selected at, which makes repeated ticks harmless.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::EngineResult;
use crate::models::EscalationLevel;

use super::{chrono_duration, Engine};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EscalationReport {
    pub to_admin: usize,
    pub to_superadmin: usize,
    pub failed: usize,
}

impl Engine {
    pub async fn run_escalation(&self, now: DateTime<Utc>) -> EngineResult<EscalationReport> {
        let policy = &self.settings.escalation;
        let mut report = EscalationReport::default();

        let steps = [
            (EscalationLevel::Staff, EscalationLevel::Admin, policy.to_admin_after),
            (EscalationLevel::Admin, EscalationLevel::SuperAdmin, policy.to_superadmin_after),
        ];
        for (from, to, after) in steps {
            let cutoff = now - chrono_duration(after);
            let candidates = self.store.escalation_candidates(from, cutoff).await?;
            for c in candidates {
                match self.store.escalate_complaint(c.complaint_id, from, to, now).await {
                    Ok(true) => {
                        tracing::info!(complaint_id = c.complaint_id, %from, %to, "complaint escalated");
                        match to {
                            EscalationLevel::SuperAdmin => report.to_superadmin += 1,
                            _ => report.to_admin += 1,
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!(complaint_id = c.complaint_id, error = %e, "escalation failed, skipping");
                    }
                }
            }
        }
        Ok(report)
    }

    pub fn spawn_escalation(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let period = engine.settings.escalation.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(every_secs = period.as_secs(), "escalation scheduler started");
            loop {
                ticker.tick().await;
                match engine.run_escalation(Utc::now()).await {
                    Ok(r) if r == EscalationReport::default() => tracing::debug!("escalation tick: nothing to do"),
                    Ok(r) => tracing::info!(
                        to_admin = r.to_admin,
                        to_superadmin = r.to_superadmin,
                        failed = r.failed,
                        "escalation tick complete"
                    ),
                    Err(e) => tracing::error!(error = %e, "escalation tick failed"),
                }
            }
        })
    }
}
