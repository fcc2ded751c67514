//! HTTP surface over the deal engine

use crate::deals::engine::{DealEngine, EvaluateRequest};
use crate::deals::normalize::normalize_all;
use crate::deals::types::{DealReport, Listing, MarketKey, MarketPrice};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DealEngine>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeRequest {
    #[serde(default = "default_source")]
    pub source: String,
    pub listings: Vec<Value>,
}

fn default_source() -> String {
    "manual".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPriceQuery {
    pub guitar_type: Option<String>,
}

type ApiError = (StatusCode, Json<ApiResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    let message = message.into();
    warn!("Rejected request: {}", message);
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse {
            message,
            status: "error".to_string(),
        }),
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/listings/normalize", post(normalize_listings))
        .route("/api/deals/evaluate", post(evaluate_deals))
        .route("/api/market-prices/:brand/:model", get(get_market_price))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> Json<ApiResponse> {
    Json(ApiResponse {
        message: "Guitar deals API is running!".to_string(),
        status: "ok".to_string(),
    })
}

async fn normalize_listings(Json(request): Json<NormalizeRequest>) -> Json<Vec<Listing>> {
    Json(normalize_all(&request.listings, &request.source, Utc::now()))
}

async fn evaluate_deals(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<DealReport>, ApiError> {
    if request.brand.trim().is_empty() || request.model.trim().is_empty() {
        return Err(bad_request("brand and model are required"));
    }

    Ok(Json(state.engine.evaluate(&request).await))
}

async fn get_market_price(
    State(state): State<AppState>,
    Path((brand, model)): Path<(String, String)>,
    Query(query): Query<MarketPriceQuery>,
) -> Result<Json<MarketPrice>, ApiError> {
    if brand.trim().is_empty() || model.trim().is_empty() {
        return Err(bad_request("brand and model are required"));
    }

    let guitar_type = query.guitar_type.unwrap_or_else(|| "Electric".to_string());
    let key = MarketKey::new(brand, model, guitar_type);

    Ok(Json(state.engine.market_price(&key).await))
}
