use std::collections::HashSet;

use crate::models::{
    DerivedContext, GeoPoint, RequestContext, ScoreBreakdown, ScoredTour, TourRecord, TourType,
    WeatherClass,
};

const PREFERENCE_MATCH: f64 = 10.0;
const DISLIKED_PENALTY: f64 = -50.0;
const HIGH_RATING: f64 = 4.5;
const HIGH_RATING_BONUS: f64 = 5.0;

const LIKED_CATEGORY_BOOST: f64 = 10.0;
const LIKED_TYPE_BOOST: f64 = 5.0;
const LIKED_BOOST_CAP: f64 = 15.0;

/// Proximity points, non-increasing in distance
pub fn distance_score(distance_km: f64) -> f64 {
    if distance_km <= 5.0 {
        25.0
    } else if distance_km <= 10.0 {
        20.0
    } else if distance_km <= 20.0 {
        15.0
    } else if distance_km <= 50.0 {
        10.0
    } else {
        5.0
    }
}

/// Suitability of a tour type for the current weather
pub fn weather_score(weather: Option<WeatherClass>, tour_type: TourType) -> f64 {
    match (weather, tour_type) {
        (_, TourType::Unknown) => 5.0,
        (Some(WeatherClass::Rain), TourType::Indoor) => 15.0,
        (Some(WeatherClass::Rain), TourType::Both) => 12.0,
        (Some(WeatherClass::Rain), TourType::Outdoor) => 5.0,
        (Some(WeatherClass::Fair), TourType::Outdoor) => 15.0,
        (Some(WeatherClass::Fair), TourType::Both) => 12.0,
        (Some(WeatherClass::Fair), TourType::Indoor) => 8.0,
        (_, TourType::Indoor) => 10.0,
        (_, TourType::Outdoor) => 8.0,
        (_, TourType::Both) => 12.0,
    }
}

/// Time-of-day fit: exact bucket 15, any declared bucket 10, none 5
pub fn time_of_day_score(tour: &TourRecord, derived: &DerivedContext) -> f64 {
    if tour.has_time_of_day(derived.time_of_day) {
        15.0
    } else if !tour.time_of_day_trip_type.is_empty() {
        10.0
    } else {
        5.0
    }
}

/// Categories and types of the tours a user liked
///
/// An empty profile contributes nothing, which is the state whenever the
/// liked boost is disabled.
#[derive(Debug, Clone, Default)]
pub struct LikedProfile {
    categories: HashSet<String>,
    tour_types: HashSet<TourType>,
}

impl LikedProfile {
    pub fn from_tours(tours: &[TourRecord]) -> Self {
        Self {
            categories: tours.iter().map(|t| t.category_name.clone()).collect(),
            tour_types: tours
                .iter()
                .map(|t| t.tour_type)
                .filter(|t| *t != TourType::Unknown)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.tour_types.is_empty()
    }

    pub fn boost(&self, tour: &TourRecord) -> f64 {
        let mut boost = 0.0;
        if self.categories.contains(&tour.category_name) {
            boost += LIKED_CATEGORY_BOOST;
        }
        if self.tour_types.contains(&tour.tour_type) {
            boost += LIKED_TYPE_BOOST;
        }
        boost.min(LIKED_BOOST_CAP)
    }
}

/// Total used for ranking; a non-finite total ranks as 0
pub fn ranked_total(tour_id: i64, breakdown: &ScoreBreakdown) -> f64 {
    let total = breakdown.total();
    if total.is_finite() {
        total
    } else {
        tracing::warn!(tour_id, ?breakdown, "Non-finite tour score, using 0");
        0.0
    }
}

/// Additive scorer over candidate tours
pub struct Scorer<'a> {
    request: &'a RequestContext,
    derived: &'a DerivedContext,
    origin: Option<GeoPoint>,
    liked: &'a LikedProfile,
}

impl<'a> Scorer<'a> {
    pub fn new(
        request: &'a RequestContext,
        derived: &'a DerivedContext,
        liked: &'a LikedProfile,
    ) -> Self {
        Self {
            request,
            derived,
            origin: request.location(),
            liked,
        }
    }

    pub fn breakdown(&self, tour: &TourRecord) -> ScoreBreakdown {
        let distance = self
            .origin
            .map(|origin| distance_score(origin.distance_km(&tour.location())))
            .unwrap_or(0.0);

        let mut preference = 0.0;
        if let Some(prefs) = &self.request.preferences {
            if prefs.tour_type == Some(tour.tour_type) {
                preference += PREFERENCE_MATCH;
            }
            if prefs.category.as_deref() == Some(tour.category_name.as_str()) {
                preference += PREFERENCE_MATCH;
            }
            if prefs.price_range == Some(tour.pricing_range_usd) {
                preference += PREFERENCE_MATCH;
            }
        }

        let feedback = if self.request.disliked_tours().contains(&tour.id) {
            DISLIKED_PENALTY
        } else {
            self.liked.boost(tour)
        };

        let quality = match tour.rating {
            Some(rating) if rating > HIGH_RATING => HIGH_RATING_BONUS,
            _ => 0.0,
        };

        ScoreBreakdown {
            distance,
            preference,
            weather: weather_score(self.derived.weather_class(), tour.tour_type),
            time_of_day: time_of_day_score(tour, self.derived),
            feedback,
            quality,
        }
    }

    /// Scores one tour. A non-finite total is replaced by 0.
    pub fn score(&self, tour: TourRecord) -> ScoredTour {
        let breakdown = self.breakdown(&tour);
        let score = ranked_total(tour.id, &breakdown);

        ScoredTour {
            tour,
            breakdown,
            score,
        }
    }

    pub fn score_all(&self, tours: Vec<TourRecord>) -> Vec<ScoredTour> {
        tours.into_iter().map(|tour| self.score(tour)).collect()
    }
}
