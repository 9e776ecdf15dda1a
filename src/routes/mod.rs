use axum::{
    http::StatusCode,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::EngineError;
use crate::AppState;

pub mod assignments;
pub mod complaints;
pub mod escalations;
pub mod health;

// Common error mapper
pub fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("internal error: {e}"))
}

/// Engine failures carry their own status; storage faults are logged and
/// reported as a bare 500.
pub fn api_error(e: EngineError) -> (StatusCode, String) {
    match e {
        EngineError::Store(inner) => {
            tracing::error!(error = %inner, "storage failure");
            internal_error(inner)
        }
        e => (e.status(), format!("{}: {e}", e.code())),
    }
}

pub fn router(state: AppState) -> Router {
    // Very permissive CORS for local dev (tighten for prod)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        // assignments
        .route(
            "/api/v1/assignments",
            post(assignments::create_assignment).get(assignments::list_assignments),
        )
        .route("/api/v1/assignments/login", post(assignments::login))
        .route("/api/v1/assignments/resolve", post(assignments::resolve))
        .route(
            "/api/v1/assignments/:id",
            get(assignments::get_assignment)
                .patch(assignments::patch_assignment)
                .delete(assignments::delete_assignment),
        )
        .route("/api/v1/assignments/:id/otp", post(assignments::reissue_otp))
        // complaints
        .route("/api/v1/complaints/overdue", get(complaints::list_overdue))
        .route(
            "/api/v1/complaints/:id/reject",
            post(complaints::reject_false_complaint),
        )
        // escalation desk
        .route("/api/v1/escalations", get(escalations::list_escalated))
        .route(
            "/api/v1/escalations/:id/resolve",
            patch(escalations::resolve_complaint),
        )
        .route(
            "/api/v1/escalations/:id/reassign",
            patch(escalations::reassign_complaint),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
