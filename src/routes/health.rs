// src/routes/health.rs

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResp {
    pub status: &'static str,
    pub version: &'static str,
    pub escalate_to_admin_after_secs: u64,
    pub escalate_to_superadmin_after_secs: u64,
    pub overdue_sla_secs: u64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResp> {
    let s = state.engine.settings();
    Json(HealthResp {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        escalate_to_admin_after_secs: s.escalation.to_admin_after.as_secs(),
        escalate_to_superadmin_after_secs: s.escalation.to_superadmin_after.as_secs(),
        overdue_sla_secs: s.overdue.sla.as_secs(),
    })
}
