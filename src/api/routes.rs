use crate::api::{handlers, AppState};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/v1/classify", post(handlers::classify))
        .route("/v1/route", post(handlers::route_incident))
        .route("/v1/feedback", post(handlers::submit_feedback))
        .route("/v1/metrics", get(handlers::metrics_summary))
        .route(
            "/v1/incidents/:id/resolve",
            post(handlers::resolve_incident),
        )
        .route(
            "/v1/incidents/:id/escalation",
            post(handlers::override_escalation),
        )
        .route("/v1/teams/load", post(handlers::report_team_load))
        .route("/v1/admin/retrain", post(handlers::force_retrain))
        .route(
            "/v1/admin/taxonomy/reload",
            post(handlers::reload_taxonomy),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
