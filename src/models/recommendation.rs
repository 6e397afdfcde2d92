use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{GeoPoint, GroupType, PricingRange, Season, TimeOfDay, TourRecord, TourType};

pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 50;

fn default_limit() -> usize {
    10
}

fn default_max_distance_km() -> f64 {
    100.0
}

/// User's explicit preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserPreferences {
    #[serde(default)]
    pub tour_type: Option<TourType>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price_range: Option<PricingRange>,
}

impl UserPreferences {
    pub fn is_empty(&self) -> bool {
        self.tour_type.is_none() && self.category.is_none() && self.price_range.is_none()
    }
}

/// User's past feedback on tours
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TourFeedback {
    #[serde(default)]
    pub liked_tours: Vec<i64>,
    #[serde(default)]
    pub disliked_tours: Vec<i64>,
}

/// Request body of the smart recommendation endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestContext {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    /// User's local date and time; server local time when absent
    #[serde(default)]
    pub local_datetime: Option<String>,
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
    #[serde(default)]
    pub feedback: Option<TourFeedback>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl RequestContext {
    /// User location, only when both coordinates are given
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }

    pub fn disliked_tours(&self) -> &[i64] {
        self.feedback
            .as_ref()
            .map(|f| f.disliked_tours.as_slice())
            .unwrap_or(&[])
    }

    pub fn liked_tours(&self) -> &[i64] {
        self.feedback
            .as_ref()
            .map(|f| f.liked_tours.as_slice())
            .unwrap_or(&[])
    }
}

/// Current weather at the user's location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Weather {
    /// Condition label, e.g. "Rain", "Clear", "Clouds"
    pub condition: String,
    pub temperature_celsius: f64,
}

/// Coarse weather classes the filters and scorer act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherClass {
    Rain,
    Fair,
    Other,
}

impl Weather {
    pub fn class(&self) -> WeatherClass {
        match self.condition.as_str() {
            "Rain" => WeatherClass::Rain,
            "Clear" | "Clouds" => WeatherClass::Fair,
            _ => WeatherClass::Other,
        }
    }
}

/// Calendar season of the request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContextSeason {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl ContextSeason {
    /// Tour season matching this calendar season. Spring and Autumn have none.
    pub fn as_tour_season(&self) -> Option<Season> {
        match self {
            ContextSeason::Winter => Some(Season::Winter),
            ContextSeason::Summer => Some(Season::Summer),
            ContextSeason::Spring | ContextSeason::Autumn => None,
        }
    }

    pub fn matches(&self, tour: &TourRecord) -> bool {
        self.as_tour_season()
            .map(|season| tour.season.contains(&season))
            .unwrap_or(false)
    }
}

/// Server-computed situational context for one request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DerivedContext {
    pub weather: Option<Weather>,
    pub time_of_day: TimeOfDay,
    pub season: ContextSeason,
    pub local_datetime: NaiveDateTime,
}

impl DerivedContext {
    pub fn weather_class(&self) -> Option<WeatherClass> {
        self.weather.as_ref().map(Weather::class)
    }
}

/// Ordering applied to the candidate set
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RankingPolicy {
    /// Descending score, ties broken by ascending id
    #[default]
    Scored,
    /// Uniform shuffle, for discovery
    Random,
}

/// Candidate tier that produced the result set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TierLevel {
    Strict,
    Relaxed,
    RadiusOnly,
}

impl TierLevel {
    /// Whether the disliked-tour exclusion is part of this tier
    pub fn excludes_disliked(&self) -> bool {
        !matches!(self, TierLevel::RadiusOnly)
    }
}

/// Additive sub-scores of one tour
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub distance: f64,
    pub preference: f64,
    pub weather: f64,
    pub time_of_day: f64,
    pub feedback: f64,
    pub quality: f64,
}

impl ScoreBreakdown {
    pub const MAX_TOTAL: f64 = 100.0;

    /// Sum of sub-scores, capped at 100 with no floor
    ///
    /// A non-finite sum is returned unchanged so callers can detect it.
    pub fn total(&self) -> f64 {
        let sum = self.distance
            + self.preference
            + self.weather
            + self.time_of_day
            + self.feedback
            + self.quality;

        if sum.is_finite() {
            sum.min(Self::MAX_TOTAL)
        } else {
            sum
        }
    }
}

/// A candidate tour with its score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTour {
    pub tour: TourRecord,
    pub breakdown: ScoreBreakdown,
    pub score: f64,
}

/// A recommended tour with an explanation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendedTour {
    #[serde(flatten)]
    pub tour: TourRecord,
    pub score: f64,
    pub recommendation_reason: String,
}

/// How the recommendation list was produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationMetadata {
    pub tier: Option<TierLevel>,
    pub candidate_count: usize,
    pub ranking_policy: RankingPolicy,
}

/// Response of the smart recommendation endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmartRecommendationResponse {
    pub recommendations: Vec<RecommendedTour>,
    pub context: DerivedContext,
    pub metadata: RecommendationMetadata,
}

/// Request body of the plain filter-based recommendation endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterRecommendationRequest {
    #[serde(default)]
    pub user_location_lat: Option<f64>,
    #[serde(default)]
    pub user_location_long: Option<f64>,
    #[serde(default = "default_max_distance_km")]
    pub max_distance_km: f64,
    #[serde(default)]
    pub preferred_tour_type: Option<TourType>,
    /// Matches tours running in any of these buckets
    #[serde(default)]
    pub preferred_time_of_day: Option<Vec<TimeOfDay>>,
    /// Matches tours offered in any of these seasons
    #[serde(default)]
    pub preferred_season: Option<Vec<Season>>,
    #[serde(default)]
    pub group_type: Option<GroupType>,
    /// Most expensive acceptable price band
    #[serde(default)]
    pub max_price_range: Option<PricingRange>,
    #[serde(default)]
    pub category_preference: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl FilterRecommendationRequest {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.user_location_lat, self.user_location_long) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationFilter {
    pub lat: f64,
    pub long: f64,
    pub max_distance_km: f64,
}

/// Echo of the filters a filter-based request actually applied
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FiltersApplied {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tour_type: Option<TourType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<Vec<TimeOfDay>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<Vec<Season>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_type: Option<GroupType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<PricingRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterRecommendationMetadata {
    pub request_id: String,
    pub algorithm: String,
}

/// Response of the filter-based recommendation endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterRecommendationResponse {
    pub recommendations: Vec<TourRecord>,
    pub total_count: usize,
    pub filters_applied: FiltersApplied,
    pub metadata: FilterRecommendationMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: RequestContext = serde_json::from_str("{}").unwrap();
        assert_eq!(request.limit, 10);
        assert!(request.location().is_none());
        assert!(request.disliked_tours().is_empty());
        assert!(request.liked_tours().is_empty());
    }

    #[test]
    fn test_location_requires_both_coordinates() {
        let request: RequestContext = serde_json::from_str(r#"{"lat": 40.0}"#).unwrap();
        assert!(request.location().is_none());

        let request: RequestContext =
            serde_json::from_str(r#"{"lat": 40.0, "lon": -74.0}"#).unwrap();
        assert_eq!(request.location(), Some(GeoPoint::new(40.0, -74.0)));
    }

    #[test]
    fn test_request_parses_preferences_and_feedback() {
        let request: RequestContext = serde_json::from_str(
            r#"{
                "preferences": {"tour_type": "indoor", "price_range": "0 - 50 USD"},
                "feedback": {"disliked_tours": [3, 4]},
                "limit": 5
            }"#,
        )
        .unwrap();
        let prefs = request.preferences.clone().unwrap();
        assert_eq!(prefs.tour_type, Some(TourType::Indoor));
        assert_eq!(prefs.price_range, Some(PricingRange::Low));
        assert_eq!(prefs.category, None);
        assert_eq!(request.disliked_tours(), &[3, 4]);
        assert_eq!(request.limit, 5);
    }

    #[test]
    fn test_weather_class() {
        let weather = |condition: &str| Weather {
            condition: condition.to_string(),
            temperature_celsius: 12.0,
        };
        assert_eq!(weather("Rain").class(), WeatherClass::Rain);
        assert_eq!(weather("Clear").class(), WeatherClass::Fair);
        assert_eq!(weather("Clouds").class(), WeatherClass::Fair);
        assert_eq!(weather("Snow").class(), WeatherClass::Other);
    }

    #[test]
    fn test_spring_and_autumn_never_match_tour_seasons() {
        assert_eq!(ContextSeason::Spring.as_tour_season(), None);
        assert_eq!(ContextSeason::Autumn.as_tour_season(), None);
        assert_eq!(ContextSeason::Winter.as_tour_season(), Some(Season::Winter));
    }

    #[test]
    fn test_score_total_clamped_without_floor() {
        let high = ScoreBreakdown {
            distance: 25.0,
            preference: 30.0,
            weather: 15.0,
            time_of_day: 15.0,
            feedback: 15.0,
            quality: 5.0,
        };
        assert_eq!(high.total(), 100.0);

        let disliked = ScoreBreakdown {
            feedback: -50.0,
            time_of_day: 5.0,
            ..Default::default()
        };
        assert_eq!(disliked.total(), -45.0);
    }

    #[test]
    fn test_score_total_keeps_non_finite_sums() {
        let nan = ScoreBreakdown {
            distance: f64::NAN,
            preference: 30.0,
            ..Default::default()
        };
        assert!(nan.total().is_nan());

        let inf = ScoreBreakdown {
            weather: f64::INFINITY,
            ..Default::default()
        };
        assert_eq!(inf.total(), f64::INFINITY);
    }

    #[test]
    fn test_filter_request_defaults() {
        let request: FilterRecommendationRequest = serde_json::from_str(
            r#"{"user_location_lat": 40.0, "preferred_season": null, "group_type": "family"}"#,
        )
        .unwrap();
        assert_eq!(request.max_distance_km, 100.0);
        assert_eq!(request.limit, 10);
        assert_eq!(request.preferred_season, None);
        assert_eq!(request.group_type, Some(GroupType::Family));
        // Longitude missing
        assert!(request.location().is_none());
    }

    #[test]
    fn test_filters_applied_omits_unset_filters() {
        let applied = FiltersApplied {
            max_price: Some(PricingRange::Medium),
            ..Default::default()
        };
        let json = serde_json::to_value(&applied).unwrap();
        assert_eq!(json, serde_json::json!({"max_price": "50 - 100 USD"}));
    }

    #[test]
    fn test_ranking_policy_serde() {
        let policy: RankingPolicy = serde_json::from_str("\"random\"").unwrap();
        assert_eq!(policy, RankingPolicy::Random);
        assert_eq!(RankingPolicy::default(), RankingPolicy::Scored);
    }
}
