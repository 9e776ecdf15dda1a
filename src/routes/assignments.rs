// src/routes/assignments.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::api_error;
use crate::models::{AssignmentDetail, AssignmentFilter, AssignmentPatch, ResolutionReceipt};
use crate::services::allocator::CreateAssignment;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginBody {
    pub login_id: String,
    pub login_password: String,
}

#[derive(Deserialize)]
pub struct ResolveBody {
    pub assignment_id: i64,
    pub otp: String,
}

/// POST /api/v1/assignments
pub async fn create_assignment(
    State(state): State<AppState>,
    Json(b): Json<CreateAssignment>,
) -> Result<(StatusCode, Json<AssignmentDetail>), (StatusCode, String)> {
    let detail = state.engine.create_assignment(b, Utc::now()).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/v1/assignments?worker_id=&resource_id=&department=
pub async fn list_assignments(
    State(state): State<AppState>,
    Query(q): Query<AssignmentFilter>,
) -> Result<Json<Vec<AssignmentDetail>>, (StatusCode, String)> {
    let rows = state.engine.get_assignments(&q).await.map_err(api_error)?;
    Ok(Json(rows))
}

pub async fn get_assignment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AssignmentDetail>, (StatusCode, String)> {
    let row = state.engine.get_assignment_by_id(id).await.map_err(api_error)?;
    Ok(Json(row))
}

pub async fn patch_assignment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<AssignmentPatch>,
) -> Result<Json<AssignmentDetail>, (StatusCode, String)> {
    let row = state.engine.update_assignment(id, b).await.map_err(api_error)?;
    Ok(Json(row))
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    state.engine.delete_assignment(id, Utc::now()).await.map_err(api_error)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// POST /api/v1/assignments/login
pub async fn login(
    State(state): State<AppState>,
    Json(b): Json<LoginBody>,
) -> Result<Json<AssignmentDetail>, (StatusCode, String)> {
    let view = state
        .engine
        .assignment_login(&b.login_id, &b.login_password)
        .await
        .map_err(api_error)?;
    Ok(Json(view))
}

/// POST /api/v1/assignments/resolve
pub async fn resolve(
    State(state): State<AppState>,
    Json(b): Json<ResolveBody>,
) -> Result<Json<ResolutionReceipt>, (StatusCode, String)> {
    let receipt = state
        .engine
        .resolve_assignment(b.assignment_id, b.otp.trim(), Utc::now())
        .await
        .map_err(api_error)?;
    Ok(Json(receipt))
}

/// POST /api/v1/assignments/:id/otp
pub async fn reissue_otp(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    state.engine.reissue_otp(id).map_err(api_error)?;
    Ok(Json(serde_json::json!({ "reissued": true })))
}
