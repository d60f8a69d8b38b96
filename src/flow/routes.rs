//! REST endpoints over one progress store.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::{FlowConfig, FlowConfigSource};
use crate::error::FlowError;

use super::progress::ProgressStore;
use super::step::{FlowVariant, Step};

/// Shared state for flow routes.
#[derive(Clone)]
pub struct FlowRouteState {
    pub store: Arc<Mutex<ProgressStore>>,
    pub config: Arc<FlowConfigSource>,
}

/// Snapshot of a store for API clients.
#[derive(Debug, Clone, Serialize)]
pub struct FlowStatus {
    pub store: String,
    pub current_step: Step,
    pub completed_steps: Vec<Step>,
    pub flow_variant: Option<FlowVariant>,
    pub spin_allowance: u32,
    pub order: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    pub next_step: Option<Step>,
    pub previous_step: Option<Step>,
    pub complete: bool,
}

impl From<&ProgressStore> for FlowStatus {
    fn from(store: &ProgressStore) -> Self {
        let current = store.current_step();
        Self {
            store: store.name().to_string(),
            current_step: current,
            completed_steps: store.completed_steps().iter().copied().collect(),
            flow_variant: store.flow_variant(),
            spin_allowance: store.spin_count(),
            order: store.step_order(),
            position: store.position(current).map(|(index, _)| index),
            next_step: store.next_step(current),
            previous_step: store.previous_step(current),
            complete: store.is_complete(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VariantRequest {
    variant: String,
}

type ApiResponse = (StatusCode, Json<Value>);

/// Build the flow REST routes.
///
/// `config` is the source every store built by the engine subscribes to, so
/// a reload through `/api/flow/config` reaches all of them.
pub fn flow_routes(store: Arc<Mutex<ProgressStore>>, config: Arc<FlowConfigSource>) -> Router {
    let state = FlowRouteState { store, config };

    Router::new()
        .route("/health", get(health))
        .route("/api/flow/status", get(get_status))
        .route("/api/flow/steps/{step}/access", get(get_access))
        .route("/api/flow/steps/{step}/complete", post(complete_step))
        .route("/api/flow/steps/{step}/advance", post(advance_step))
        .route("/api/flow/steps/{step}/current", post(set_current_step))
        .route("/api/flow/variant", post(set_variant))
        .route("/api/flow/reset", post(reset))
        .route("/api/flow/config", get(get_config).post(reload_config))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "flow-progress"
    }))
}

fn ok_status(store: &ProgressStore) -> ApiResponse {
    (StatusCode::OK, Json(json!(FlowStatus::from(store))))
}

fn error_response(err: &FlowError) -> ApiResponse {
    let status = match err {
        FlowError::UnknownStep(_) | FlowError::UnknownVariant(_) => StatusCode::BAD_REQUEST,
        FlowError::StepLocked { .. } | FlowError::StepUnreachable { .. } => StatusCode::CONFLICT,
    };
    let missing = match err {
        FlowError::StepLocked { missing, .. } => missing.clone(),
        _ => Vec::new(),
    };
    (
        status,
        Json(json!({
            "error": err.to_string(),
            "code": err.code(),
            "missing": missing,
        })),
    )
}

/// GET /api/flow/status
async fn get_status(State(state): State<FlowRouteState>) -> ApiResponse {
    let store = state.store.lock().await;
    ok_status(&store)
}

/// GET /api/flow/steps/{step}/access
///
/// Unrecognized tags report as accessible.
async fn get_access(State(state): State<FlowRouteState>, Path(tag): Path<String>) -> ApiResponse {
    let store = state.store.lock().await;
    let accessible = store.can_access_tag(&tag);
    let (missing, unreachable) = match tag.parse::<Step>() {
        Ok(step) => (
            store.missing_steps(step),
            store.dependencies(step).is_unreachable(),
        ),
        Err(_) => (Vec::new(), false),
    };
    (
        StatusCode::OK,
        Json(json!({
            "step": tag,
            "accessible": accessible,
            "unreachable": unreachable,
            "missing": missing,
        })),
    )
}

/// POST /api/flow/steps/{step}/complete
async fn complete_step(
    State(state): State<FlowRouteState>,
    Path(tag): Path<String>,
) -> ApiResponse {
    let step = match tag.parse::<Step>() {
        Ok(step) => step,
        Err(e) => return error_response(&e),
    };
    let mut store = state.store.lock().await;
    store.mark_step_complete(step);
    ok_status(&store)
}

/// POST /api/flow/steps/{step}/advance
///
/// Gated move: 409 with the missing steps when the step is not accessible.
async fn advance_step(
    State(state): State<FlowRouteState>,
    Path(tag): Path<String>,
) -> ApiResponse {
    let step = match tag.parse::<Step>() {
        Ok(step) => step,
        Err(e) => return error_response(&e),
    };
    let mut store = state.store.lock().await;
    match store.try_advance(step) {
        Ok(_) => ok_status(&store),
        Err(e) => error_response(&e),
    }
}

/// POST /api/flow/steps/{step}/current
///
/// Ungated pointer move for recovery tooling.
async fn set_current_step(
    State(state): State<FlowRouteState>,
    Path(tag): Path<String>,
) -> ApiResponse {
    let step = match tag.parse::<Step>() {
        Ok(step) => step,
        Err(e) => return error_response(&e),
    };
    let mut store = state.store.lock().await;
    info!(store = %store.name(), step = %step, "Current step forced via API");
    store.set_current_step(step);
    ok_status(&store)
}

/// POST /api/flow/variant
async fn set_variant(
    State(state): State<FlowRouteState>,
    Json(body): Json<VariantRequest>,
) -> ApiResponse {
    let variant = match body.variant.parse::<FlowVariant>() {
        Ok(variant) => variant,
        Err(e) => return error_response(&e),
    };
    let mut store = state.store.lock().await;
    store.set_survey_flow(variant);
    ok_status(&store)
}

/// POST /api/flow/reset
async fn reset(State(state): State<FlowRouteState>) -> ApiResponse {
    let mut store = state.store.lock().await;
    store.reset_progress();
    ok_status(&store)
}

/// GET /api/flow/config
async fn get_config(State(state): State<FlowRouteState>) -> Json<FlowConfig> {
    Json(state.config.current())
}

/// POST /api/flow/config
///
/// Publishes a new verification config. The step order and gating of the
/// served store follow immediately; progress is untouched.
async fn reload_config(
    State(state): State<FlowRouteState>,
    Json(config): Json<FlowConfig>,
) -> ApiResponse {
    state.config.reload(config);
    let store = state.store.lock().await;
    ok_status(&store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reflects_store() {
        let (_tx, rx) = tokio::sync::watch::channel(FlowConfig::default());
        let mut store = ProgressStore::detached(Step::Identity, rx);
        store.mark_step_complete(Step::Identity);
        store.set_current_step(Step::Otp);

        let status = FlowStatus::from(&store);
        assert_eq!(status.current_step, Step::Otp);
        assert_eq!(status.completed_steps, vec![Step::Identity]);
        assert_eq!(status.position, Some(1));
        assert_eq!(status.next_step, Some(Step::Camera));
        assert_eq!(status.previous_step, Some(Step::Identity));
        assert!(!status.complete);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["current_step"], "otp");
        assert!(json["flow_variant"].is_null());
    }

    #[test]
    fn partner_step_has_no_position() {
        let (_tx, rx) = tokio::sync::watch::channel(FlowConfig::default());
        let store = ProgressStore::detached(Step::PartnerLanding, rx);
        let json = serde_json::to_value(FlowStatus::from(&store)).unwrap();
        assert!(json.get("position").is_none());
        assert!(json["next_step"].is_null());
    }

    #[test]
    fn error_statuses() {
        let (status, body) = error_response(&FlowError::UnknownStep("lobby".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0["code"], "UNKNOWN_STEP");

        let (status, body) = error_response(&FlowError::StepLocked {
            step: Step::Otp,
            missing: vec![Step::Identity],
        });
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.0["missing"], json!(["identity"]));
    }
}
