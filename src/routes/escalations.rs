// src/routes/escalations.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::api_error;
use crate::models::{Complaint, EscalationLevel};
use crate::AppState;

#[derive(Deserialize)]
pub struct LevelQ {
    pub level: EscalationLevel,
}

#[derive(Deserialize)]
pub struct ReassignBody {
    pub department: String,
}

/// GET /api/v1/escalations?level=admin|superadmin
pub async fn list_escalated(
    State(state): State<AppState>,
    Query(q): Query<LevelQ>,
) -> Result<Json<Vec<Complaint>>, (StatusCode, String)> {
    let rows = state.engine.get_escalated_complaints(q.level).await.map_err(api_error)?;
    Ok(Json(rows))
}

/// PATCH /api/v1/escalations/:id/resolve
pub async fn resolve_complaint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Complaint>, (StatusCode, String)> {
    let row = state.engine.resolve_complaint(id, Utc::now()).await.map_err(api_error)?;
    Ok(Json(row))
}

/// PATCH /api/v1/escalations/:id/reassign
pub async fn reassign_complaint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<ReassignBody>,
) -> Result<Json<Complaint>, (StatusCode, String)> {
    let row = state
        .engine
        .reassign_complaint(id, &b.department, Utc::now())
        .await
        .map_err(api_error)?;
    Ok(Json(row))
}
