// src/routes/complaints.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use super::api_error;
use crate::models::{Complaint, RejectionOutcome};
use crate::AppState;

/// POST /api/v1/complaints/:id/reject
pub async fn reject_false_complaint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RejectionOutcome>, (StatusCode, String)> {
    let out = state.engine.reject_false_complaint(id, Utc::now()).await.map_err(api_error)?;
    Ok(Json(out))
}

/// GET /api/v1/complaints/overdue
pub async fn list_overdue(
    State(state): State<AppState>,
) -> Result<Json<Vec<Complaint>>, (StatusCode, String)> {
    let rows = state.engine.get_overdue_complaints().await.map_err(api_error)?;
    Ok(Json(rows))
}
