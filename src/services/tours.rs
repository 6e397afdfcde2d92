use std::sync::Arc;
use std::time::Duration;

use crate::{
    db::catalog::{with_timeout, CatalogStore, Predicate, TourFilter},
    error::{AppError, AppResult},
    models::{
        CatalogStats, CategoryCount, FilterRecommendationRequest, FiltersApplied, GeoPoint,
        LocationFilter, PricingRange, TourRecord, TourType, MAX_LIMIT,
    },
};

pub const MAX_NEARBY_LIMIT: usize = 100;
pub const MAX_SIMILAR_LIMIT: usize = 50;
pub const MAX_POPULAR_LIMIT: usize = 100;
pub const MAX_SEARCH_LIMIT: usize = 100;
pub const MAX_PAGE_LIMIT: usize = 1000;

fn check_limit(limit: usize, max: usize) -> AppResult<()> {
    if limit == 0 || limit > max {
        return Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}, got {}",
            max, limit
        )));
    }
    Ok(())
}

fn check_radius(radius_km: f64, name: &str) -> AppResult<()> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(AppError::InvalidInput(format!(
            "{} must be a positive number",
            name
        )));
    }
    Ok(())
}

/// Filter of a filter-based recommendation request, with the echo of what it applies
///
/// Empty time-of-day and season lists are ignored.
pub fn filter_for_request(request: &FilterRecommendationRequest) -> (TourFilter, FiltersApplied) {
    let mut filter = TourFilter::new();
    let mut applied = FiltersApplied::default();

    if let Some(origin) = request.location() {
        filter.push(Predicate::WithinRadius {
            origin,
            radius_km: request.max_distance_km,
        });
        applied.location = Some(LocationFilter {
            lat: origin.lat,
            long: origin.lon,
            max_distance_km: request.max_distance_km,
        });
    }

    if let Some(tour_type) = request.preferred_tour_type {
        filter.push(Predicate::TourTypeIn(vec![tour_type]));
        applied.tour_type = Some(tour_type);
    }

    if let Some(times) = request.preferred_time_of_day.as_ref().filter(|t| !t.is_empty()) {
        filter.push(Predicate::TimeOfDayAny(times.clone()));
        applied.time_of_day = Some(times.clone());
    }

    if let Some(seasons) = request.preferred_season.as_ref().filter(|s| !s.is_empty()) {
        filter.push(Predicate::SeasonAny(seasons.clone()));
        applied.season = Some(seasons.clone());
    }

    if let Some(group) = request.group_type {
        filter.push(Predicate::HasGroupType(group));
        applied.group_type = Some(group);
    }

    if let Some(max_price) = request.max_price_range {
        filter.push(Predicate::PriceAtMost(max_price));
        applied.max_price = Some(max_price);
    }

    if let Some(category) = &request.category_preference {
        filter.push(Predicate::CategoryEq(category.clone()));
        applied.category = Some(category.clone());
    }

    (filter, applied)
}

/// Direct catalog lookups that bypass the scoring pipeline
#[derive(Clone)]
pub struct TourService {
    catalog: Arc<dyn CatalogStore>,
    query_timeout: Duration,
}

impl TourService {
    pub fn new(catalog: Arc<dyn CatalogStore>, query_timeout: Duration) -> Self {
        Self {
            catalog,
            query_timeout,
        }
    }

    pub async fn get_tour(&self, id: i64) -> AppResult<TourRecord> {
        let filter = TourFilter::new().and(Predicate::IdIn(vec![id]));
        let tours = with_timeout(self.query_timeout, self.catalog.find_tours(&filter, Some(1))).await?;

        tours
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Tour {} not found", id)))
    }

    /// Tours within `radius_km` of the point, by ascending id
    pub async fn nearby(
        &self,
        origin: GeoPoint,
        radius_km: f64,
        limit: usize,
    ) -> AppResult<Vec<TourRecord>> {
        check_limit(limit, MAX_NEARBY_LIMIT)?;
        check_radius(radius_km, "radius_km")?;

        let filter = TourFilter::new().and(Predicate::WithinRadius { origin, radius_km });
        let tours =
            with_timeout(self.query_timeout, self.catalog.find_tours(&filter, Some(limit))).await?;

        tracing::debug!(radius_km, found = tours.len(), "Nearby tours fetched");
        Ok(tours)
    }

    pub async fn similar(&self, tour_id: i64, limit: usize) -> AppResult<Vec<TourRecord>> {
        check_limit(limit, MAX_SIMILAR_LIMIT)?;

        let base = self.get_tour(tour_id).await?;
        let tours = with_timeout(self.query_timeout, self.catalog.similar_tours(&base, limit)).await?;
        Ok(tours)
    }

    /// Tours matching explicit filters, by ascending id, without scoring
    pub async fn filter_recommendations(
        &self,
        request: &FilterRecommendationRequest,
    ) -> AppResult<(Vec<TourRecord>, FiltersApplied)> {
        check_limit(request.limit, MAX_LIMIT)?;
        if request.location().is_some() {
            check_radius(request.max_distance_km, "max_distance_km")?;
        }

        let (filter, applied) = filter_for_request(request);
        let tours = with_timeout(
            self.query_timeout,
            self.catalog.find_tours(&filter, Some(request.limit)),
        )
        .await?;

        tracing::info!(
            filters = filter.predicates().len(),
            found = tours.len(),
            "Filter-based recommendations fetched"
        );
        Ok((tours, applied))
    }

    /// Tours in a category and/or around a point, by ascending id
    pub async fn popular(
        &self,
        category: Option<String>,
        origin: Option<GeoPoint>,
        radius_km: f64,
        limit: usize,
    ) -> AppResult<Vec<TourRecord>> {
        check_limit(limit, MAX_POPULAR_LIMIT)?;

        let mut filter = TourFilter::new();
        if let Some(category) = category {
            filter.push(Predicate::CategoryEq(category));
        }
        if let Some(origin) = origin {
            check_radius(radius_km, "radius_km")?;
            filter.push(Predicate::WithinRadius { origin, radius_km });
        }

        Ok(with_timeout(self.query_timeout, self.catalog.find_tours(&filter, Some(limit))).await?)
    }

    /// Tours whose name, category or subcategory contains `query`, ignoring case
    pub async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<TourRecord>> {
        check_limit(limit, MAX_SEARCH_LIMIT)?;

        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("search query must not be empty".to_string()));
        }

        let filter = TourFilter::new().and(Predicate::TextMatch(query.to_string()));
        let tours =
            with_timeout(self.query_timeout, self.catalog.find_tours(&filter, Some(limit))).await?;

        tracing::debug!(query, found = tours.len(), "Tour search");
        Ok(tours)
    }

    /// One page of the catalog, optionally narrowed by category, type and price band
    pub async fn list(
        &self,
        category: Option<String>,
        tour_type: Option<TourType>,
        price_range: Option<PricingRange>,
        skip: usize,
        limit: usize,
    ) -> AppResult<Vec<TourRecord>> {
        check_limit(limit, MAX_PAGE_LIMIT)?;

        let mut filter = TourFilter::new();
        if let Some(category) = category {
            filter.push(Predicate::CategoryEq(category));
        }
        if let Some(tour_type) = tour_type {
            filter.push(Predicate::TourTypeIn(vec![tour_type]));
        }
        if let Some(price_range) = price_range {
            filter.push(Predicate::PriceRangeEq(price_range));
        }

        Ok(with_timeout(self.query_timeout, self.catalog.find_page(&filter, skip, limit)).await?)
    }

    pub async fn stats(&self) -> AppResult<CatalogStats> {
        Ok(with_timeout(self.query_timeout, self.catalog.catalog_stats()).await?)
    }

    pub async fn categories(&self) -> AppResult<Vec<CategoryCount>> {
        Ok(with_timeout(self.query_timeout, self.catalog.category_counts()).await?)
    }

    pub async fn random(&self) -> AppResult<TourRecord> {
        with_timeout(self.query_timeout, self.catalog.random_tour())
            .await?
            .ok_or_else(|| AppError::NotFound("No tours available".to_string()))
    }

    /// Connectivity check used by the health endpoint
    pub async fn ping(&self) -> AppResult<()> {
        Ok(with_timeout(self.query_timeout, self.catalog.ping()).await?)
    }
}
