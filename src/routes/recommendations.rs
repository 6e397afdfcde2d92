use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{
        CatalogStats, CategoryCount, FilterRecommendationMetadata, FilterRecommendationRequest,
        FilterRecommendationResponse, GeoPoint, RequestContext, SmartRecommendationResponse,
        TourRecord,
    },
    routes::AppState,
};

fn default_radius_km() -> f64 {
    10.0
}

fn default_nearby_limit() -> usize {
    10
}

fn default_similar_limit() -> usize {
    5
}

fn default_popular_radius_km() -> f64 {
    50.0
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub long: f64,
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
    #[serde(default = "default_nearby_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub long: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NearbyResponse {
    pub nearby_tours: Vec<TourRecord>,
    pub location: Location,
    pub radius_km: f64,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct SimilarRequest {
    pub tour_id: i64,
    #[serde(default = "default_similar_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarResponse {
    pub similar_tours: Vec<TourRecord>,
    pub base_tour_id: i64,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Vec<CategoryCount>,
}

#[derive(Debug, Deserialize)]
pub struct PopularRequest {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location_lat: Option<f64>,
    #[serde(default)]
    pub location_long: Option<f64>,
    #[serde(default = "default_popular_radius_km")]
    pub radius_km: f64,
    #[serde(default = "default_nearby_limit")]
    pub limit: usize,
}

impl PopularRequest {
    fn location(&self) -> Option<Location> {
        match (self.location_lat, self.location_long) {
            (Some(lat), Some(long)) => Some(Location { lat, long }),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PopularFilters {
    pub category: Option<String>,
    pub location: Option<Location>,
    pub radius_km: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PopularResponse {
    pub popular_tours: Vec<TourRecord>,
    pub total: usize,
    pub filters: PopularFilters,
}

/// Handler for the context-aware recommendation pipeline
pub async fn smart(
    State(state): State<AppState>,
    Json(request): Json<RequestContext>,
) -> AppResult<Json<SmartRecommendationResponse>> {
    let response = state.recommendations.recommend(request).await?;
    Ok(Json(response))
}

/// Handler for plain filter-based recommendations
pub async fn filter_based(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<FilterRecommendationRequest>,
) -> AppResult<Json<FilterRecommendationResponse>> {
    let (tours, filters_applied) = state.tours.filter_recommendations(&request).await?;

    Ok(Json(FilterRecommendationResponse {
        total_count: tours.len(),
        recommendations: tours,
        filters_applied,
        metadata: FilterRecommendationMetadata {
            request_id: request_id.to_string(),
            algorithm: "filter_based".to_string(),
        },
    }))
}

pub async fn popular(
    State(state): State<AppState>,
    Json(request): Json<PopularRequest>,
) -> AppResult<Json<PopularResponse>> {
    let location = request.location();
    let origin = location.as_ref().map(|l| GeoPoint::new(l.lat, l.long));

    let tours = state
        .tours
        .popular(request.category.clone(), origin, request.radius_km, request.limit)
        .await?;

    Ok(Json(PopularResponse {
        total: tours.len(),
        popular_tours: tours,
        filters: PopularFilters {
            category: request.category,
            location,
            radius_km: request.radius_km,
        },
    }))
}

pub async fn stats(State(state): State<AppState>) -> AppResult<Json<CatalogStats>> {
    let stats = state.tours.stats().await?;
    Ok(Json(stats))
}

pub async fn nearby(
    State(state): State<AppState>,
    Query(params): Query<NearbyQuery>,
) -> AppResult<Json<NearbyResponse>> {
    let origin = GeoPoint::new(params.lat, params.long);
    let tours = state
        .tours
        .nearby(origin, params.radius_km, params.limit)
        .await?;

    Ok(Json(NearbyResponse {
        total: tours.len(),
        nearby_tours: tours,
        location: Location {
            lat: params.lat,
            long: params.long,
        },
        radius_km: params.radius_km,
    }))
}

pub async fn similar(
    State(state): State<AppState>,
    Json(request): Json<SimilarRequest>,
) -> AppResult<Json<SimilarResponse>> {
    let tours = state.tours.similar(request.tour_id, request.limit).await?;

    Ok(Json(SimilarResponse {
        total: tours.len(),
        similar_tours: tours,
        base_tour_id: request.tour_id,
    }))
}

pub async fn categories(State(state): State<AppState>) -> AppResult<Json<CategoriesResponse>> {
    let categories = state.tours.categories().await?;
    Ok(Json(CategoriesResponse { categories }))
}

pub async fn random(State(state): State<AppState>) -> AppResult<Json<TourRecord>> {
    let tour = state.tours.random().await?;
    Ok(Json(tour))
}
