//! Tiered candidate selection
//!
//! Candidates come from the first tier of an ordered table that yields at
//! least one tour. Tiers trade precision for recall: the full filter set at
//! the tight radius, the full filter set at the relaxed radius, and finally
//! the tight radius alone.
use std::sync::Arc;
use std::time::Duration;

use crate::{
    db::catalog::{with_timeout, CatalogStore, Predicate, TourFilter},
    models::{DerivedContext, RequestContext, TierLevel, TourType, WeatherClass},
};

/// One attempt of the fallback search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    pub level: TierLevel,
    pub radius_km: f64,
    /// Apply weather, time-of-day and preference filters
    pub full_filters: bool,
}

/// Result of candidate selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    /// Tier that produced the ids; `None` when every tier came up empty
    pub tier: Option<TierLevel>,
    pub ids: Vec<i64>,
}

impl CandidateSet {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Weather predicate: indoor only when raining, outdoor-capable when fair
pub fn weather_predicate(derived: &DerivedContext) -> Option<Predicate> {
    match derived.weather_class()? {
        WeatherClass::Rain => Some(Predicate::TourTypeIn(vec![TourType::Indoor])),
        WeatherClass::Fair => Some(Predicate::TourTypeIn(vec![
            TourType::Outdoor,
            TourType::Both,
        ])),
        WeatherClass::Other => None,
    }
}

#[derive(Clone)]
pub struct CandidateSelector {
    catalog: Arc<dyn CatalogStore>,
    tiers: [Tier; 3],
    query_timeout: Duration,
}

impl CandidateSelector {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        tight_radius_km: f64,
        relaxed_radius_km: f64,
        query_timeout: Duration,
    ) -> Self {
        let tiers = [
            Tier {
                level: TierLevel::Strict,
                radius_km: tight_radius_km,
                full_filters: true,
            },
            Tier {
                level: TierLevel::Relaxed,
                radius_km: relaxed_radius_km,
                full_filters: true,
            },
            Tier {
                level: TierLevel::RadiusOnly,
                radius_km: tight_radius_km,
                full_filters: false,
            },
        ];

        Self {
            catalog,
            tiers,
            query_timeout,
        }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Builds the filter of a tier. The radius is omitted without a location.
    pub fn build_filter(
        tier: &Tier,
        request: &RequestContext,
        derived: &DerivedContext,
    ) -> TourFilter {
        let mut filter = TourFilter::new();

        if let Some(origin) = request.location() {
            filter.push(Predicate::WithinRadius {
                origin,
                radius_km: tier.radius_km,
            });
        }

        if tier.full_filters {
            if let Some(predicate) = weather_predicate(derived) {
                filter.push(predicate);
            }

            filter.push(Predicate::HasTimeOfDay(derived.time_of_day));

            if let Some(prefs) = &request.preferences {
                if let Some(tour_type) = prefs.tour_type {
                    filter.push(Predicate::TourTypeIn(vec![tour_type]));
                }
                if let Some(category) = &prefs.category {
                    filter.push(Predicate::CategoryEq(category.clone()));
                }
                if let Some(price_range) = prefs.price_range {
                    filter.push(Predicate::PriceRangeEq(price_range));
                }
            }
        }

        let disliked = request.disliked_tours();
        if tier.level.excludes_disliked() && !disliked.is_empty() {
            filter.push(Predicate::IdNotIn(disliked.to_vec()));
        }

        filter
    }

    /// Runs the tiers in order and returns the first non-empty result
    ///
    /// A failing tier counts as empty; when every tier is empty or fails the
    /// result is an empty set.
    pub async fn select(&self, request: &RequestContext, derived: &DerivedContext) -> CandidateSet {
        for tier in &self.tiers {
            let filter = Self::build_filter(tier, request, derived);

            let result = with_timeout(self.query_timeout, self.catalog.find_ids(&filter, None)).await;

            match result {
                Ok(ids) if !ids.is_empty() => {
                    tracing::info!(
                        tier = ?tier.level,
                        radius_km = tier.radius_km,
                        candidates = ids.len(),
                        "Candidate tier matched"
                    );
                    return CandidateSet {
                        tier: Some(tier.level),
                        ids,
                    };
                }
                Ok(_) => {
                    tracing::debug!(tier = ?tier.level, "Candidate tier empty, relaxing");
                }
                Err(e) => {
                    tracing::warn!(
                        tier = ?tier.level,
                        error = %e,
                        "Candidate query failed, falling through to next tier"
                    );
                }
            }
        }

        tracing::info!("No candidate tours found for the given criteria");
        CandidateSet::default()
    }
}
