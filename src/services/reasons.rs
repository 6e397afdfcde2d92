use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::GenerationError,
    models::{ContextSeason, DerivedContext, RequestContext, TimeOfDay, TourRecord, Weather},
    services::providers::TextGenerator,
};

/// Reason used when no generation credential is configured
pub const UNCONFIGURED_REASON: &str = "Recommended based on your preferences and current context.";

/// Reason used when generation fails or times out
pub const FALLBACK_REASON: &str = "This tour is a great fit based on your location and preferences.";

/// The parts of a derived context that reach the prompt
///
/// The exact server clock never does, so it stays out of the key.
#[derive(Serialize)]
struct PromptContext<'a> {
    time_of_day: TimeOfDay,
    weekday: String,
    season: ContextSeason,
    weather: Option<&'a Weather>,
}

impl<'a> From<&'a DerivedContext> for PromptContext<'a> {
    fn from(derived: &'a DerivedContext) -> Self {
        Self {
            time_of_day: derived.time_of_day,
            weekday: derived.local_datetime.format("%A").to_string(),
            season: derived.season,
            weather: derived.weather.as_ref(),
        }
    }
}

/// Content hash of everything that shapes a reason
///
/// Identical (tour, request, derived context) triples map to the same key.
pub fn reason_cache_key(
    tour: &TourRecord,
    request: &RequestContext,
    derived: &DerivedContext,
) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(tour.id.to_le_bytes());
    hasher.update(serde_json::to_vec(request).unwrap_or_default());
    hasher.update(serde_json::to_vec(&PromptContext::from(derived)).unwrap_or_default());

    let digest = hasher.finalize();
    CacheKey::Reason(format!("{:x}", digest))
}

/// Builds the generation prompt for one tour
pub fn build_prompt(tour: &TourRecord, request: &RequestContext, derived: &DerivedContext) -> String {
    let mut user_context = Vec::new();

    if let Some(location) = request.location() {
        user_context.push(format!(
            "- Location: Near latitude {}, longitude {}",
            location.lat, location.lon
        ));
    }

    user_context.push(format!(
        "- Time: It's currently {} on {}.",
        derived.time_of_day,
        derived.local_datetime.format("%A")
    ));

    if let Some(weather) = &derived.weather {
        user_context.push(format!(
            "- Weather: The weather is {} at {}°C.",
            weather.condition, weather.temperature_celsius
        ));
    }

    if let Some(prefs) = request.preferences.as_ref().filter(|p| !p.is_empty()) {
        let mut parts = Vec::new();
        if let Some(tour_type) = prefs.tour_type {
            parts.push(format!("type {}", tour_type.as_str()));
        }
        if let Some(category) = &prefs.category {
            parts.push(format!("category {}", category));
        }
        if let Some(price_range) = prefs.price_range {
            parts.push(format!("price {}", price_range.as_str()));
        }
        user_context.push(format!("- Preferences: {}.", parts.join(", ")));
    }

    let season_note = if derived.season.matches(tour) {
        "It is in season right now."
    } else {
        "It runs outside its main season."
    };

    let groups: Vec<&str> = tour.group_type_suitability.iter().map(|g| g.as_str()).collect();
    let times: Vec<&str> = tour.time_of_day_trip_type.iter().map(|t| t.as_str()).collect();

    format!(
        "A user is looking for a tour recommendation. Based on their context and the tour details, \
provide a short, friendly, and compelling reason (1-2 sentences) why this specific tour is being \
recommended to them.

User's Context:
{user_context}

Tour Details:
- Name: {name}
- Category: {category}
- Type: {tour_type}
- Price Range: {price}
- Summary: Best for {groups} during {times}. {season_note}

Generate only the recommendation text, without any preamble.",
        user_context = user_context.join("\n"),
        name = tour.name,
        category = tour.category_name,
        tour_type = tour.tour_type.as_str(),
        price = tour.pricing_range_usd.as_str(),
        groups = groups.join(", "),
        times = times.join(", "),
    )
}

/// Produces a short natural-language reason per recommended tour
///
/// Generated reasons are cached by content hash. Failures fall back to a
/// fixed sentence and are never cached.
#[derive(Clone)]
pub struct ReasonGenerator {
    generator: Arc<dyn TextGenerator>,
    cache: Cache,
    ttl: u64,
    timeout: Duration,
}

impl ReasonGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, cache: Cache, ttl: u64, timeout: Duration) -> Self {
        Self {
            generator,
            cache,
            ttl,
            timeout,
        }
    }

    pub async fn reason_for(
        &self,
        tour: &TourRecord,
        request: &RequestContext,
        derived: &DerivedContext,
    ) -> String {
        if !self.generator.is_configured() {
            return UNCONFIGURED_REASON.to_string();
        }

        let key = reason_cache_key(tour, request, derived);
        let prompt = build_prompt(tour, request, derived);
        let generator = self.generator.clone();
        let timeout = self.timeout;

        let result: Result<String, GenerationError> = cached!(self.cache, key, self.ttl, async move {
            match tokio::time::timeout(timeout, generator.generate(&prompt)).await {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout(timeout.as_millis() as u64)),
            }
        });

        match result {
            Ok(reason) => reason,
            Err(e) => {
                tracing::error!(tour_id = tour.id, error = %e, "Reason generation failed");
                FALLBACK_REASON.to_string()
            }
        }
    }
}
