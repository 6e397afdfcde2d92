use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    db::Cache,
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::{RecommendationService, TourService},
};

pub mod recommendations;
pub mod tours;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recommendations: RecommendationService,
    pub tours: TourService,
    pub cache: Cache,
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/recommendations", post(recommendations::filter_based))
        .route("/recommendations/smart", post(recommendations::smart))
        .route("/recommendations/nearby", get(recommendations::nearby))
        .route("/recommendations/similar", post(recommendations::similar))
        .route("/recommendations/popular", post(recommendations::popular))
        .route("/recommendations/categories", get(recommendations::categories))
        .route("/recommendations/stats", get(recommendations::stats))
        .route("/recommendations/random", get(recommendations::random))
        .route("/tours", get(tours::list_tours))
        .route("/tours/search", get(tours::search_tours))
        .route("/tours/:id", get(tours::get_tour))
}

/// Health check endpoint, reporting catalog connectivity
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.tours.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "catalog": "ok",
                "cache": state.cache.backend_name(),
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Catalog health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "catalog": e.to_string(),
                    "cache": state.cache.backend_name(),
                })),
            )
        }
    }
}
