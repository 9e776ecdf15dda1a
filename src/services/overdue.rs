// src/services/overdue.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::EngineResult;
use crate::models::{Assignment, Complaint};

use super::{chrono_duration, Engine};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverdueReport {
    pub flagged: usize,
    pub reminders: usize,
    pub failed: usize,
}

impl Engine {
    /// Flags Active assignments past the SLA window and reminds their
    /// workers. The overdue latch is set before any reminder goes out, so an
    /// assignment is reminded at most once no matter how often this runs.
    pub async fn run_overdue_check(&self, now: DateTime<Utc>) -> EngineResult<OverdueReport> {
        let sla = self.settings.overdue.sla;
        let cutoff = now - chrono_duration(sla);
        let mut report = OverdueReport::default();

        for a in self.store.overdue_candidates(cutoff).await? {
            match self.flag_overdue(&a, sla, now).await {
                Ok(Some(sent)) => {
                    report.flagged += 1;
                    report.reminders += sent;
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(assignment_id = a.assignment_id, error = %e, "overdue check failed, skipping");
                }
            }
        }
        Ok(report)
    }

    async fn flag_overdue(
        &self,
        a: &Assignment,
        sla: std::time::Duration,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<usize>> {
        if !self.store.flag_assignment_overdue(a.assignment_id).await? {
            return Ok(None);
        }
        // The latch is set and will not be selected again, so nothing below
        // may cut the reminders short.
        if let Err(e) = self.store.mark_complaint_overdue(a.complaint_id, now).await {
            tracing::error!(complaint_id = a.complaint_id, error = %e, "could not mirror overdue flag to complaint");
        }

        let hours = sla.as_secs() / 3600;
        let workers = self.store.workers(&a.worker_ids).await?;
        for w in &workers {
            self.outbox.send(
                &w.email,
                "Overdue Assignment Reminder",
                format!(
                    "Dear {},\n\nAssignment #{} has exceeded the {}-hour resolution window.\n\
                     Department: {}\nLocation: {}\nDescription: {}\n\n\
                     Please take immediate action to resolve it.\n",
                    w.name,
                    a.assignment_id,
                    hours,
                    a.department,
                    a.location,
                    a.description.as_deref().unwrap_or("-"),
                ),
            );
        }
        if let Err(e) = self.store.mark_reminder_sent(a.assignment_id).await {
            tracing::warn!(assignment_id = a.assignment_id, error = %e, "could not record reminder");
        }
        tracing::warn!(assignment_id = a.assignment_id, reminders = workers.len(), "assignment marked overdue");
        Ok(Some(workers.len()))
    }

    pub async fn get_overdue_complaints(&self) -> EngineResult<Vec<Complaint>> {
        Ok(self.store.overdue_complaints().await?)
    }

    pub fn spawn_overdue_monitor(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let period = engine.settings.overdue.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(every_secs = period.as_secs(), "overdue monitor started");
            loop {
                ticker.tick().await;
                match engine.run_overdue_check(Utc::now()).await {
                    Ok(r) => tracing::info!(flagged = r.flagged, reminders = r.reminders, failed = r.failed, "overdue check completed"),
                    Err(e) => tracing::error!(error = %e, "overdue check failed"),
                }
            }
        })
    }
}
