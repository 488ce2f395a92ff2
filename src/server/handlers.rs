//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::inference::PredictionRequest;
use crate::storage::{NewUser, PredictionRecord};

use super::error::{Result, ServerError};
use super::state::AppState;

/// `?user=` filter shared by the listing endpoints
#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub user: Option<String>,
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid JSON body: {}", e)))
}

// ============================================================================
// Prediction
// ============================================================================

pub async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Result<impl IntoResponse> {
    let request = PredictionRequest::from_json(&body).map_err(ServerError::prediction)?;

    let prediction = match state.predictor.predict(&request) {
        Ok(prediction) => prediction,
        Err(e) => {
            info!(error = %e, "Rejected prediction request");
            return Err(ServerError::prediction(e));
        }
    };

    let outcome = &prediction.outcome;
    state.recent.record(
        request.requester.as_deref(),
        &outcome.target_label(),
        prediction.neighbors.clone(),
    );

    if let Some(requester) = request.requester.clone() {
        let record = PredictionRecord::from_prediction(&requester, &prediction);
        let repository = state.repository.clone();
        // File-backed stores rewrite whole collections; keep that off the async workers.
        let logged = tokio::task::spawn_blocking(move || {
            if let Err(e) = repository.log_prediction(&record) {
                warn!(error = %e, requester = %requester, "Failed to log prediction");
                return;
            }
            if let Err(e) = repository.touch_last_login(&requester) {
                warn!(error = %e, requester = %requester, "Failed to update last login");
            }
        })
        .await;
        if let Err(e) = logged {
            warn!(error = %e, "Prediction logging task failed");
        }
    }

    info!(
        target_subject = %outcome.target_label(),
        score = outcome.score(),
        grade = %outcome.grade(),
        "Prediction served"
    );
    Ok(Json(prediction.outcome))
}

// ============================================================================
// System
// ============================================================================

pub async fn health_check() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub async fn debug_model(State(state): State<Arc<AppState>>) -> Json<Value> {
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);
    Json(json!({
        "success": true,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime.num_seconds(),
        "artifact_dir": state.config.artifact_dir.display().to_string(),
        "model": state.predictor.summary(),
    }))
}

pub async fn latest_neighbors(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Value>> {
    let result = state
        .recent
        .latest(filter.user.as_deref())
        .ok_or_else(|| ServerError::NotFound("No recent prediction".to_string()))?;
    Ok(Json(json!({
        "success": true,
        "target_subject": result.target_subject,
        "neighbors": result.neighbors,
        "recorded_at": result.recorded_at,
    })))
}

// ============================================================================
// Prediction log
// ============================================================================

pub async fn list_predictions(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Value>> {
    let predictions = state.repository.list_predictions(filter.user.as_deref())?;
    Ok(Json(json!({
        "success": true,
        "count": predictions.len(),
        "predictions": predictions,
    })))
}

// ============================================================================
// Users
// ============================================================================

pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let users = state.repository.list_users()?;
    Ok(Json(json!({ "success": true, "users": users })))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let input: NewUser = parse_body(&body)?;
    let user = state.repository.create_user(&input)?;
    info!(user_id = %user.id, "User created");
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "user": user }))))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>> {
    let input: NewUser = parse_body(&body)?;
    let user = state.repository.update_user(&id, &input)?;
    info!(user_id = %user.id, "User updated");
    Ok(Json(json!({ "success": true, "user": user })))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.repository.delete_user(&id)?;
    info!(user_id = %id, "User deleted");
    Ok(Json(json!({ "success": true })))
}
