mod geo;
mod recommendation;
mod tour;

pub use geo::{GeoPoint, EARTH_RADIUS_KM};
pub use recommendation::{
    ContextSeason, DerivedContext, FilterRecommendationMetadata, FilterRecommendationRequest,
    FilterRecommendationResponse, FiltersApplied, LocationFilter, RankingPolicy,
    RecommendationMetadata, RecommendedTour, RequestContext, ScoreBreakdown, ScoredTour,
    SmartRecommendationResponse, TierLevel, TourFeedback, UserPreferences, Weather, WeatherClass,
    MAX_LIMIT, MIN_LIMIT,
};
pub use tour::{
    CatalogStats, CategoryCount, GroupType, PricingRange, Season, TimeOfDay, TourRecord, TourRow,
    TourType,
};
