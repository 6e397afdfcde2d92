//! Catalog store abstraction
//!
//! The recommendation pipeline talks to the tour catalog only through
//! [`CatalogStore`]. Filters are expressed as a conjunction of typed
//! [`Predicate`]s, which each store renders in its own way (SQL for
//! Postgres, direct evaluation for the in-memory catalog).
use std::future::Future;
use std::time::Duration;

use crate::{
    error::QueryError,
    models::{
        CatalogStats, CategoryCount, GeoPoint, GroupType, PricingRange, Season, TimeOfDay,
        TourRecord, TourType,
    },
};

/// A single filter condition over tour records
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Great-circle distance from `origin` is at most `radius_km`
    WithinRadius { origin: GeoPoint, radius_km: f64 },
    /// `tour_type` is one of the given types
    TourTypeIn(Vec<TourType>),
    /// `time_of_day_trip_type` contains the bucket
    HasTimeOfDay(TimeOfDay),
    /// `time_of_day_trip_type` shares at least one bucket with the list
    TimeOfDayAny(Vec<TimeOfDay>),
    /// `season` shares at least one season with the list
    SeasonAny(Vec<Season>),
    /// `group_type_suitability` contains the group
    HasGroupType(GroupType),
    CategoryEq(String),
    PriceRangeEq(PricingRange),
    /// Price band no more expensive than the given one
    PriceAtMost(PricingRange),
    /// Case-insensitive substring of name, category or subcategory
    TextMatch(String),
    IdIn(Vec<i64>),
    IdNotIn(Vec<i64>),
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

impl Predicate {
    /// Evaluates the predicate against an in-process record
    pub fn matches(&self, tour: &TourRecord) -> bool {
        match self {
            Predicate::WithinRadius { origin, radius_km } => {
                origin.distance_km(&tour.location()) <= *radius_km
            }
            Predicate::TourTypeIn(types) => types.contains(&tour.tour_type),
            Predicate::HasTimeOfDay(bucket) => tour.has_time_of_day(*bucket),
            Predicate::TimeOfDayAny(buckets) => buckets.iter().any(|b| tour.has_time_of_day(*b)),
            Predicate::SeasonAny(seasons) => seasons.iter().any(|s| tour.season.contains(s)),
            Predicate::HasGroupType(group) => tour.group_type_suitability.contains(group),
            Predicate::CategoryEq(category) => &tour.category_name == category,
            Predicate::PriceRangeEq(range) => tour.pricing_range_usd == *range,
            Predicate::PriceAtMost(range) => tour.pricing_range_usd <= *range,
            Predicate::TextMatch(text) => {
                let needle = text.to_lowercase();
                contains_ignore_case(&tour.name, &needle)
                    || contains_ignore_case(&tour.category_name, &needle)
                    || contains_ignore_case(&tour.subcategory_name, &needle)
            }
            Predicate::IdIn(ids) => ids.contains(&tour.id),
            Predicate::IdNotIn(ids) => !ids.contains(&tour.id),
        }
    }
}

/// Conjunction of predicates; an empty filter matches every tour
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TourFilter {
    predicates: Vec<Predicate>,
}

impl TourFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, tour: &TourRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(tour))
    }
}

/// Query interface of the tour catalog
///
/// Results of `find_ids` and `find_tours` are ordered by ascending id.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Ids of the tours matching the filter
    async fn find_ids(
        &self,
        filter: &TourFilter,
        limit: Option<usize>,
    ) -> Result<Vec<i64>, QueryError>;

    /// Full records of the tours matching the filter
    async fn find_tours(
        &self,
        filter: &TourFilter,
        limit: Option<usize>,
    ) -> Result<Vec<TourRecord>, QueryError>;

    /// One page of matching tours: skips `offset` matches, returns at most `limit`
    async fn find_page(
        &self,
        filter: &TourFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TourRecord>, QueryError>;

    /// Tours most similar to `base` (excluding it), by descending
    /// [`TourRecord::similarity_to`] then ascending id
    async fn similar_tours(
        &self,
        base: &TourRecord,
        limit: usize,
    ) -> Result<Vec<TourRecord>, QueryError>;

    /// Tour counts per category, largest first
    async fn category_counts(&self) -> Result<Vec<CategoryCount>, QueryError>;

    /// Totals over the whole catalog
    async fn catalog_stats(&self) -> Result<CatalogStats, QueryError>;

    /// One uniformly random tour, if the catalog is not empty
    async fn random_tour(&self) -> Result<Option<TourRecord>, QueryError>;

    /// Connectivity check
    async fn ping(&self) -> Result<(), QueryError>;
}

/// Runs a catalog call under a timeout, mapping expiry to [`QueryError::Timeout`]
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, QueryError>
where
    F: Future<Output = Result<T, QueryError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(QueryError::Timeout(timeout.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tour() -> TourRecord {
        TourRecord {
            id: 5,
            name: "Museum Night".to_string(),
            lat: 40.0,
            long: -74.0,
            pricing_range_usd: PricingRange::High,
            category_name: "Culture".to_string(),
            subcategory_name: "Museums".to_string(),
            time_of_day_trip_type: vec![TimeOfDay::Evening, TimeOfDay::Night],
            tour_type: TourType::Indoor,
            season: vec![Season::Winter],
            group_type_suitability: vec![GroupType::Couples],
            rating: None,
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(TourFilter::new().matches(&tour()));
    }

    #[test]
    fn test_predicates_are_conjunctive() {
        let filter = TourFilter::new()
            .and(Predicate::TourTypeIn(vec![TourType::Indoor]))
            .and(Predicate::HasTimeOfDay(TimeOfDay::Night));
        assert!(filter.matches(&tour()));

        let filter = filter.and(Predicate::CategoryEq("Food".to_string()));
        assert!(!filter.matches(&tour()));
    }

    #[test]
    fn test_radius_predicate() {
        let near = Predicate::WithinRadius {
            origin: GeoPoint::new(40.05, -74.0),
            radius_km: 10.0,
        };
        let far = Predicate::WithinRadius {
            origin: GeoPoint::new(40.5, -74.0),
            radius_km: 10.0,
        };
        assert!(near.matches(&tour()));
        assert!(!far.matches(&tour()));
    }

    #[test]
    fn test_id_predicates() {
        assert!(Predicate::IdIn(vec![5, 6]).matches(&tour()));
        assert!(!Predicate::IdNotIn(vec![5]).matches(&tour()));
        assert!(Predicate::IdNotIn(vec![]).matches(&tour()));
        assert!(Predicate::PriceRangeEq(PricingRange::High).matches(&tour()));
    }

    #[test]
    fn test_membership_predicates() {
        assert!(Predicate::TimeOfDayAny(vec![TimeOfDay::Morning, TimeOfDay::Night]).matches(&tour()));
        assert!(!Predicate::TimeOfDayAny(vec![TimeOfDay::Morning]).matches(&tour()));
        assert!(!Predicate::TimeOfDayAny(vec![]).matches(&tour()));

        assert!(Predicate::SeasonAny(vec![Season::Summer, Season::Winter]).matches(&tour()));
        assert!(!Predicate::SeasonAny(vec![Season::Rainy]).matches(&tour()));

        assert!(Predicate::HasGroupType(GroupType::Couples).matches(&tour()));
        assert!(!Predicate::HasGroupType(GroupType::Family).matches(&tour()));
    }

    #[test]
    fn test_price_at_most() {
        assert!(Predicate::PriceAtMost(PricingRange::High).matches(&tour()));
        assert!(Predicate::PriceAtMost(PricingRange::Luxury).matches(&tour()));
        assert!(!Predicate::PriceAtMost(PricingRange::Medium).matches(&tour()));
    }

    #[test]
    fn test_text_match_is_case_insensitive_over_names() {
        assert!(Predicate::TextMatch("museum".to_string()).matches(&tour()));
        assert!(Predicate::TextMatch("CULT".to_string()).matches(&tour()));
        assert!(Predicate::TextMatch("eums".to_string()).matches(&tour()));
        assert!(!Predicate::TextMatch("kayak".to_string()).matches(&tour()));
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<(), QueryError> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(QueryError::Timeout(10))));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
