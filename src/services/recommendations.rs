use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    db::catalog::{with_timeout, CatalogStore, Predicate, TourFilter},
    error::{AppError, AppResult},
    models::{
        RankingPolicy, RecommendationMetadata, RecommendedTour, RequestContext,
        SmartRecommendationResponse, TourRecord, MAX_LIMIT, MIN_LIMIT,
    },
    services::{
        candidates::CandidateSelector,
        context::ContextDeriver,
        ranking::rank_and_select,
        reasons::ReasonGenerator,
        scoring::{LikedProfile, Scorer},
    },
};

/// Tunables of the recommendation pipeline
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub ranking_policy: RankingPolicy,
    pub tight_radius_km: f64,
    pub relaxed_radius_km: f64,
    pub catalog_timeout: Duration,
    pub liked_boost_enabled: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ranking_policy: config.ranking_policy,
            tight_radius_km: config.tight_radius_km,
            relaxed_radius_km: config.relaxed_radius_km,
            catalog_timeout: config.catalog_timeout(),
            liked_boost_enabled: config.liked_boost_enabled,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ranking_policy: RankingPolicy::Scored,
            tight_radius_km: 10.0,
            relaxed_radius_km: 30.0,
            catalog_timeout: Duration::from_secs(5),
            liked_boost_enabled: false,
        }
    }
}

/// Rejects a request whose limit is outside [MIN_LIMIT, MAX_LIMIT]
pub fn validate_request(request: &RequestContext) -> AppResult<()> {
    if !(MIN_LIMIT..=MAX_LIMIT).contains(&request.limit) {
        return Err(AppError::InvalidInput(format!(
            "limit must be between {} and {}, got {}",
            MIN_LIMIT, MAX_LIMIT, request.limit
        )));
    }
    Ok(())
}

/// Context-aware recommendation pipeline
///
/// Derives the request context, selects candidates through the tier
/// fallback, scores and ranks them, then attaches a reason to each selected
/// tour.
#[derive(Clone)]
pub struct RecommendationService {
    catalog: Arc<dyn CatalogStore>,
    context: ContextDeriver,
    candidates: CandidateSelector,
    reasons: ReasonGenerator,
    options: PipelineOptions,
}

impl RecommendationService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        context: ContextDeriver,
        reasons: ReasonGenerator,
        options: PipelineOptions,
    ) -> Self {
        let candidates = CandidateSelector::new(
            catalog.clone(),
            options.tight_radius_km,
            options.relaxed_radius_km,
            options.catalog_timeout,
        );

        Self {
            catalog,
            context,
            candidates,
            reasons,
            options,
        }
    }

    pub async fn recommend(&self, request: RequestContext) -> AppResult<SmartRecommendationResponse> {
        validate_request(&request)?;

        let derived = self.context.derive(&request).await?;
        let candidates = self.candidates.select(&request, &derived).await;

        let mut metadata = RecommendationMetadata {
            tier: candidates.tier,
            candidate_count: candidates.ids.len(),
            ranking_policy: self.options.ranking_policy,
        };

        if candidates.is_empty() {
            return Ok(SmartRecommendationResponse {
                recommendations: vec![],
                context: derived,
                metadata,
            });
        }

        let tours = self.load_tours(candidates.ids).await;
        metadata.candidate_count = tours.len();

        let liked = self.liked_profile(&request).await;
        let scored = Scorer::new(&request, &derived, &liked).score_all(tours);
        let selected = rank_and_select(scored, self.options.ranking_policy, request.limit);

        let mut recommendations = Vec::with_capacity(selected.len());
        for scored in selected {
            let reason = self
                .reasons
                .reason_for(&scored.tour, &request, &derived)
                .await;

            recommendations.push(RecommendedTour {
                tour: scored.tour,
                score: scored.score,
                recommendation_reason: reason,
            });
        }

        tracing::info!(
            tier = ?metadata.tier,
            candidates = metadata.candidate_count,
            returned = recommendations.len(),
            "Smart recommendations generated"
        );

        Ok(SmartRecommendationResponse {
            recommendations,
            context: derived,
            metadata,
        })
    }

    /// Full records for the candidate ids; a failure yields no tours
    async fn load_tours(&self, ids: Vec<i64>) -> Vec<TourRecord> {
        let filter = TourFilter::new().and(Predicate::IdIn(ids));

        match with_timeout(
            self.options.catalog_timeout,
            self.catalog.find_tours(&filter, None),
        )
        .await
        {
            Ok(tours) => tours,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load candidate tours");
                vec![]
            }
        }
    }

    async fn liked_profile(&self, request: &RequestContext) -> LikedProfile {
        let liked = request.liked_tours();
        if !self.options.liked_boost_enabled || liked.is_empty() {
            return LikedProfile::default();
        }

        let filter = TourFilter::new().and(Predicate::IdIn(liked.to_vec()));
        match with_timeout(
            self.options.catalog_timeout,
            self.catalog.find_tours(&filter, None),
        )
        .await
        {
            Ok(tours) => LikedProfile::from_tours(&tours),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load liked tours, skipping boost");
                LikedProfile::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::catalog::MockCatalogStore;
    use crate::db::{Cache, InMemoryCatalog};
    use crate::error::QueryError;
    use crate::models::{GroupType, PricingRange, Season, TierLevel, TimeOfDay, TourType};
    use crate::services::providers::MockTextGenerator;
    use crate::services::reasons::UNCONFIGURED_REASON;

    const KM: f64 = 1.0 / 111.19;

    fn tour(id: i64, km_north: f64, category: &str) -> TourRecord {
        TourRecord {
            id,
            name: format!("Tour {}", id),
            lat: 40.0 + km_north * KM,
            long: -74.0,
            pricing_range_usd: PricingRange::Medium,
            category_name: category.to_string(),
            subcategory_name: "General".to_string(),
            time_of_day_trip_type: vec![TimeOfDay::Afternoon],
            tour_type: TourType::Outdoor,
            season: vec![Season::Summer],
            group_type_suitability: vec![GroupType::Solo],
            rating: None,
        }
    }

    fn unconfigured_reasons() -> ReasonGenerator {
        let mut generator = MockTextGenerator::new();
        generator.expect_is_configured().return_const(false);
        ReasonGenerator::new(
            Arc::new(generator),
            Cache::in_memory(),
            60,
            Duration::from_secs(1),
        )
    }

    fn service(catalog: Arc<dyn CatalogStore>, options: PipelineOptions) -> RecommendationService {
        RecommendationService::new(
            catalog,
            ContextDeriver::new(None, Duration::from_secs(1)),
            unconfigured_reasons(),
            options,
        )
    }

    fn request(json: &str) -> RequestContext {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_validate_request_limit_bounds() {
        assert!(validate_request(&request(r#"{"limit": 1}"#)).is_ok());
        assert!(validate_request(&request(r#"{"limit": 50}"#)).is_ok());
        assert!(matches!(
            validate_request(&request(r#"{"limit": 0}"#)),
            Err(AppError::InvalidInput(_))
        ));
        assert!(validate_request(&request(r#"{"limit": 51}"#)).is_err());
    }

    #[tokio::test]
    async fn test_near_tours_ranked_by_distance() {
        let catalog = InMemoryCatalog::new(vec![
            tour(1, 8.0, "Culture"),
            tour(2, 2.0, "Culture"),
            tour(3, 4.0, "Culture"),
            tour(4, 20.0, "Culture"),
            tour(5, 25.0, "Culture"),
        ]);
        let service = service(Arc::new(catalog), PipelineOptions::default());

        let response = service
            .recommend(request(
                r#"{"lat": 40.0, "lon": -74.0, "local_datetime": "2024-07-01T14:00:00", "limit": 5}"#,
            ))
            .await
            .unwrap();

        let ids: Vec<i64> = response.recommendations.iter().map(|r| r.tour.id).collect();
        // 2 and 3 are within 5 km, 1 is within 10 km
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(response.metadata.tier, Some(TierLevel::Strict));
        assert_eq!(response.metadata.candidate_count, 3);
        assert!(response
            .recommendations
            .iter()
            .all(|r| r.recommendation_reason == UNCONFIGURED_REASON));
    }

    #[tokio::test]
    async fn test_result_never_exceeds_limit() {
        let tours = (1..=12).map(|id| tour(id, 1.0, "Culture")).collect();
        let service = service(Arc::new(InMemoryCatalog::new(tours)), PipelineOptions::default());

        for limit in [1, 3, 10] {
            let response = service
                .recommend(request(&format!(
                    r#"{{"lat": 40.0, "lon": -74.0, "local_datetime": "2024-07-01T14:00:00", "limit": {}}}"#,
                    limit
                )))
                .await
                .unwrap();
            assert!(response.recommendations.len() <= limit);
        }
    }

    #[tokio::test]
    async fn test_invalid_timestamp_is_rejected() {
        let service = service(Arc::new(InMemoryCatalog::new(vec![])), PipelineOptions::default());
        let result = service
            .recommend(request(r#"{"local_datetime": "yesterday"}"#))
            .await;
        assert!(matches!(result, Err(AppError::Context(_))));
    }

    #[tokio::test]
    async fn test_empty_catalog_returns_empty_list() {
        let service = service(Arc::new(InMemoryCatalog::new(vec![])), PipelineOptions::default());
        let response = service
            .recommend(request(r#"{"lat": 40.0, "lon": -74.0}"#))
            .await
            .unwrap();
        assert!(response.recommendations.is_empty());
        assert_eq!(response.metadata.tier, None);
    }

    #[tokio::test]
    async fn test_record_fetch_failure_returns_empty_list() {
        let mut catalog = MockCatalogStore::new();
        catalog.expect_find_ids().returning(|_, _| Ok(vec![1, 2]));
        catalog
            .expect_find_tours()
            .returning(|_, _| Err(QueryError::Timeout(5000)));

        let service = service(Arc::new(catalog), PipelineOptions::default());
        let response = service
            .recommend(request(r#"{"lat": 40.0, "lon": -74.0}"#))
            .await
            .unwrap();

        assert!(response.recommendations.is_empty());
        assert_eq!(response.metadata.tier, Some(TierLevel::Strict));
    }

    #[tokio::test]
    async fn test_liked_boost_only_when_enabled() {
        let tours = vec![
            tour(1, 1.0, "Food"),
            tour(2, 1.0, "Culture"),
            tour(10, 90.0, "Culture"),
        ];
        let body = r#"{"lat": 40.0, "lon": -74.0, "local_datetime": "2024-07-01T14:00:00",
                       "feedback": {"liked_tours": [10]}}"#;

        let disabled = service(
            Arc::new(InMemoryCatalog::new(tours.clone())),
            PipelineOptions::default(),
        );
        let response = disabled.recommend(request(body)).await.unwrap();
        let scores: Vec<f64> = response.recommendations.iter().map(|r| r.score).collect();
        assert_eq!(scores[0], scores[1]);

        let enabled = service(
            Arc::new(InMemoryCatalog::new(tours)),
            PipelineOptions {
                liked_boost_enabled: true,
                ..Default::default()
            },
        );
        let response = enabled.recommend(request(body)).await.unwrap();
        assert_eq!(response.recommendations[0].tour.id, 2);
        assert!(response.recommendations[0].score > response.recommendations[1].score);
    }
}
