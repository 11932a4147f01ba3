use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json};
use tracing::info;

use crate::{
    admission::Admission,
    auth::Principal,
    error::AppError,
    models::PrescribeRequest,
    service::PrescribeOutcome,
    state::AppState,
};

pub const WEEKLY_LIMIT_REACHED: &str = "weekly_limit_reached";

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

pub async fn check_availability_handler(State(state): State<Arc<AppState>>) -> Json<Admission> {
    Json(state.service.availability().await)
}

pub async fn this_week_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.service.this_week().await {
        Some(prescription) => Json(json!({
            "success": true,
            "prescription": prescription,
        })),
        None => Json(json!({
            "success": false,
            "message": "No prescription has been created this week",
        })),
    }
}

pub async fn history_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let prescriptions = state.service.history().await;

    Json(json!({
        "success": true,
        "total": prescriptions.len(),
        "prescriptions": prescriptions,
    }))
}

pub async fn prescribe_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<PrescribeRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    info!("Prescription requested by {} ({})", principal.id, principal.role);

    let outcome = state
        .service
        .prescribe(
            request.issue.as_deref(),
            request.context.unwrap_or_default(),
            Some(principal.id),
        )
        .await?;

    let body = match outcome {
        PrescribeOutcome::Created {
            record,
            week,
            next_available,
        } => json!({
            "success": true,
            "issue": record.issue,
            "context": record.context,
            "solution": record.solution,
            "timestamp": record.timestamp,
            "weekInfo": week,
            "nextPrescriptionAvailable": next_available,
        }),
        PrescribeOutcome::Blocked(blocked) => json!({
            "success": false,
            "blocked": true,
            "reason": WEEKLY_LIMIT_REACHED,
            "message": "A prescription has already been created this week. Try again next week.",
            "lastPrescriptionDate": blocked.last_prescription_date,
            "nextAvailableDate": blocked.next_available_date,
            "timeUntilNext": blocked.time_until_next,
        }),
    };

    Ok(Json(body))
}
