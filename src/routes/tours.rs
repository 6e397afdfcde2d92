use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppResult,
    models::{PricingRange, TourRecord, TourType},
    routes::AppState,
};

fn default_page_limit() -> usize {
    100
}

fn default_search_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct ListToursQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_page_limit")]
    pub limit: usize,
    pub category: Option<String>,
    pub tour_type: Option<TourType>,
    pub price_range: Option<PricingRange>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<TourRecord>,
    pub query: String,
    pub total: usize,
}

/// Handler for paged catalog listing
pub async fn list_tours(
    State(state): State<AppState>,
    Query(params): Query<ListToursQuery>,
) -> AppResult<Json<Vec<TourRecord>>> {
    let tours = state
        .tours
        .list(
            params.category,
            params.tour_type,
            params.price_range,
            params.skip,
            params.limit,
        )
        .await?;
    Ok(Json(tours))
}

pub async fn search_tours(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<SearchResponse>> {
    let results = state.tours.search(&params.q, params.limit).await?;

    Ok(Json(SearchResponse {
        total: results.len(),
        results,
        query: params.q,
    }))
}

/// Handler for single tour lookup
pub async fn get_tour(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<TourRecord>> {
    let tour = state.tours.get_tour(id).await?;
    Ok(Json(tour))
}
