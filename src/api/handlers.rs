use crate::api::AppState;
use crate::error::{Result, TriageError};
use crate::learning::TriageMetrics;
use crate::metrics;
use crate::models::{
    ClassificationResult, EscalationLevel, FeedbackRecord, Incident, Priority, RoutingDecision,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

/// Incident submission payload shared by classify and triage
#[derive(Debug, Deserialize, Validate)]
pub struct IncidentRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 10_000))]
    pub description: String,

    pub priority: Priority,

    #[serde(default = "default_source")]
    #[validate(length(min = 1, max = 255))]
    pub source: String,

    #[serde(default)]
    pub affected_users: u64,
}

fn default_source() -> String {
    "api".to_string()
}

impl IncidentRequest {
    fn into_incident(self) -> Incident {
        Incident::new(
            self.title,
            self.description,
            self.priority,
            self.source,
            self.affected_users,
        )
    }
}

#[derive(Debug, Serialize)]
pub struct TriageResponse {
    pub classification: ClassificationResult,
    pub routing: RoutingDecision,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FeedbackRequest {
    pub incident_id: Uuid,

    #[validate(length(min = 1))]
    pub original_category: String,

    #[validate(length(min = 1))]
    pub corrected_category: String,

    #[validate(length(min = 1, max = 255))]
    pub submitted_by: String,
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub level: EscalationLevel,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TeamLoadReport {
    #[validate(length(min = 1, max = 255))]
    pub team: String,

    #[validate(range(min = 0.0, max = 1.0))]
    pub utilization: f64,
}

/// POST /v1/classify — classify without routing
pub async fn classify(
    State(state): State<AppState>,
    Json(payload): Json<IncidentRequest>,
) -> Result<Json<ClassificationResult>> {
    payload.validate()?;
    let incident = payload.into_incident();

    let result = state.manager.classify(&incident).await;
    state.pipeline.record_classification(&incident, &result);

    Ok(Json(result))
}

/// POST /v1/route — classify, route and start escalation tracking
pub async fn route_incident(
    State(state): State<AppState>,
    Json(payload): Json<IncidentRequest>,
) -> Result<Json<TriageResponse>> {
    payload.validate()?;
    let incident = payload.into_incident();

    let classification = state.manager.classify(&incident).await;
    state
        .pipeline
        .record_classification(&incident, &classification);

    let decision = state.router.route(&incident, &classification);
    let chain = state
        .taxonomy
        .current()
        .node(&classification.chosen_category)
        .map(|n| n.escalation_chain.clone())
        .unwrap_or_default();
    state.escalation.track(decision.clone(), chain);

    Ok(Json(TriageResponse {
        classification,
        routing: decision,
    }))
}

/// POST /v1/feedback — submit a reviewer verdict
pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    payload.validate()?;

    let taxonomy = state.taxonomy.current();
    if taxonomy.node(&payload.corrected_category).is_none() {
        return Err(TriageError::Validation(format!(
            "unknown category '{}'",
            payload.corrected_category
        )));
    }

    state.pipeline.submit_feedback(FeedbackRecord::new(
        payload.incident_id,
        payload.original_category,
        payload.corrected_category,
        payload.submitted_by,
    ))?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))))
}

/// GET /v1/metrics — operational metrics summary
pub async fn metrics_summary(State(state): State<AppState>) -> Json<TriageMetrics> {
    Json(state.pipeline.get_metrics())
}

/// POST /v1/incidents/:id/resolve
pub async fn resolve_incident(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoutingDecision>> {
    let decision = state.escalation.resolve(id).await?;
    Ok(Json(decision))
}

/// POST /v1/incidents/:id/escalation — manual operator override
pub async fn override_escalation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<OverrideRequest>,
) -> Result<StatusCode> {
    state.escalation.override_level(id, payload.level)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/teams/load — external utilization report
pub async fn report_team_load(
    State(state): State<AppState>,
    Json(payload): Json<TeamLoadReport>,
) -> Result<StatusCode> {
    payload.validate()?;
    state.load.record(payload.team, payload.utilization);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/admin/retrain — queue a training job unconditionally
pub async fn force_retrain(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    state.pipeline.force_retrain();
    (StatusCode::ACCEPTED, Json(json!({ "status": "queued" })))
}

/// POST /v1/admin/taxonomy/reload
pub async fn reload_taxonomy(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>> {
    let version = state.taxonomy.reload()?;
    Ok(Json(json!({ "status": "reloaded", "version": version })))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": state.config.observability.service_name,
        "taxonomy_version": state.taxonomy.version(),
    }))
}

/// GET /metrics — Prometheus text exposition
pub async fn prometheus_metrics() -> Result<String> {
    metrics::gather()
}
