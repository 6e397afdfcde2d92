use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use super::GeoPoint;

/// Indoor/outdoor classification of a tour
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TourType {
    Indoor,
    Outdoor,
    Both,
    /// Catalog value outside the known set
    #[serde(other)]
    Unknown,
}

impl TourType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TourType::Indoor => "indoor",
            TourType::Outdoor => "outdoor",
            TourType::Both => "both",
            TourType::Unknown => "unknown",
        }
    }

    /// Lenient decode used at the store boundary
    pub fn from_catalog(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "indoor" => TourType::Indoor,
            "outdoor" => TourType::Outdoor,
            "both" => TourType::Both,
            _ => TourType::Unknown,
        }
    }
}

/// Time-of-day bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "morning" => Ok(TimeOfDay::Morning),
            "afternoon" => Ok(TimeOfDay::Afternoon),
            "evening" => Ok(TimeOfDay::Evening),
            "night" => Ok(TimeOfDay::Night),
            other => Err(format!("unknown time of day '{}'", other)),
        }
    }
}

impl Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Season a tour is suited to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Season {
    Summer,
    Winter,
    Christmas,
    Rainy,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Summer => "Summer",
            Season::Winter => "Winter",
            Season::Christmas => "Christmas",
            Season::Rainy => "Rainy",
        }
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Summer" => Ok(Season::Summer),
            "Winter" => Ok(Season::Winter),
            "Christmas" => Ok(Season::Christmas),
            "Rainy" => Ok(Season::Rainy),
            other => Err(format!("unknown season '{}'", other)),
        }
    }
}

/// Group composition a tour suits
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    Solo,
    Family,
    Couples,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Solo => "solo",
            GroupType::Family => "family",
            GroupType::Couples => "couples",
        }
    }
}

impl FromStr for GroupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "solo" => Ok(GroupType::Solo),
            "family" => Ok(GroupType::Family),
            "couples" => Ok(GroupType::Couples),
            other => Err(format!("unknown group type '{}'", other)),
        }
    }
}

/// USD price band, ordered from cheapest to most expensive
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PricingRange {
    #[serde(rename = "0 - 50 USD")]
    Low,
    #[serde(rename = "50 - 100 USD")]
    Medium,
    #[serde(rename = "100 - 200 USD")]
    High,
    #[serde(rename = "200 - 500 USD")]
    Premium,
    #[serde(rename = "500+ USD")]
    Luxury,
}

impl PricingRange {
    pub const ALL: [PricingRange; 5] = [
        PricingRange::Low,
        PricingRange::Medium,
        PricingRange::High,
        PricingRange::Premium,
        PricingRange::Luxury,
    ];

    /// Every band no more expensive than this one, cheapest first
    pub fn up_to(self) -> Vec<PricingRange> {
        Self::ALL.into_iter().filter(|band| *band <= self).collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PricingRange::Low => "0 - 50 USD",
            PricingRange::Medium => "50 - 100 USD",
            PricingRange::High => "100 - 200 USD",
            PricingRange::Premium => "200 - 500 USD",
            PricingRange::Luxury => "500+ USD",
        }
    }
}

impl FromStr for PricingRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0 - 50 USD" => Ok(PricingRange::Low),
            "50 - 100 USD" => Ok(PricingRange::Medium),
            "100 - 200 USD" => Ok(PricingRange::High),
            "200 - 500 USD" => Ok(PricingRange::Premium),
            "500+ USD" => Ok(PricingRange::Luxury),
            other => Err(format!("unknown price band '{}'", other)),
        }
    }
}

impl Display for PricingRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tour in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TourRecord {
    pub id: i64,
    pub name: String,
    pub lat: f64,
    pub long: f64,
    pub pricing_range_usd: PricingRange,
    pub category_name: String,
    pub subcategory_name: String,
    pub time_of_day_trip_type: Vec<TimeOfDay>,
    pub tour_type: TourType,
    pub season: Vec<Season>,
    pub group_type_suitability: Vec<GroupType>,
    #[serde(default)]
    pub rating: Option<f64>,
}

impl TourRecord {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.long)
    }

    pub fn has_time_of_day(&self, bucket: TimeOfDay) -> bool {
        self.time_of_day_trip_type.contains(&bucket)
    }

    /// Similarity used by the similar-tours lookup: category 3, subcategory 2,
    /// tour type 2, price band 1.
    pub fn similarity_to(&self, other: &TourRecord) -> u32 {
        let mut score = 0;
        if self.category_name == other.category_name {
            score += 3;
        }
        if self.subcategory_name == other.subcategory_name {
            score += 2;
        }
        if self.tour_type == other.tour_type {
            score += 2;
        }
        if self.pricing_range_usd == other.pricing_range_usd {
            score += 1;
        }
        score
    }
}

/// Raw catalog row, decoded into a [`TourRecord`] at the store boundary
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TourRow {
    pub id: i64,
    pub name: String,
    pub lat: f64,
    pub long: f64,
    pub pricing_range_usd: String,
    pub category_name: String,
    pub subcategory_name: String,
    pub time_of_day_trip_type: Vec<String>,
    pub tour_type: String,
    pub season: Vec<String>,
    pub group_type_suitability: Vec<String>,
    pub rating: Option<f64>,
}

/// Parses each value, dropping the ones outside the known set
fn parse_known<T: FromStr>(values: &[String]) -> Vec<T> {
    values.iter().filter_map(|v| v.parse().ok()).collect()
}

impl TryFrom<TourRow> for TourRecord {
    type Error = String;

    fn try_from(row: TourRow) -> Result<Self, Self::Error> {
        let pricing_range_usd = row.pricing_range_usd.parse::<PricingRange>()?;

        Ok(TourRecord {
            id: row.id,
            name: row.name,
            lat: row.lat,
            long: row.long,
            pricing_range_usd,
            category_name: row.category_name,
            subcategory_name: row.subcategory_name,
            time_of_day_trip_type: parse_known(&row.time_of_day_trip_type),
            tour_type: TourType::from_catalog(&row.tour_type),
            season: parse_known(&row.season),
            group_type_suitability: parse_known(&row.group_type_suitability),
            rating: row.rating,
        })
    }
}

/// Number of tours per category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// Catalog totals, broken down by type, price band and category
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogStats {
    pub total_tours: i64,
    pub tours_by_type: BTreeMap<String, i64>,
    pub tours_by_price: BTreeMap<String, i64>,
    pub tours_by_category: BTreeMap<String, i64>,
}

impl CatalogStats {
    /// Tallies the given tours
    pub fn from_tours<'a>(tours: impl IntoIterator<Item = &'a TourRecord>) -> Self {
        let mut stats = Self::default();
        for tour in tours {
            stats.total_tours += 1;
            *stats
                .tours_by_type
                .entry(tour.tour_type.as_str().to_string())
                .or_insert(0) += 1;
            *stats
                .tours_by_price
                .entry(tour.pricing_range_usd.as_str().to_string())
                .or_insert(0) += 1;
            *stats
                .tours_by_category
                .entry(tour.category_name.clone())
                .or_insert(0) += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> TourRow {
        TourRow {
            id: 11,
            name: "Harbor Kayak".to_string(),
            lat: 40.7,
            long: -74.0,
            pricing_range_usd: "50 - 100 USD".to_string(),
            category_name: "Water".to_string(),
            subcategory_name: "Kayaking".to_string(),
            time_of_day_trip_type: vec!["morning".to_string(), "dawn".to_string()],
            tour_type: "outdoor".to_string(),
            season: vec!["Summer".to_string(), "Spring".to_string()],
            group_type_suitability: vec!["solo".to_string(), "couples".to_string()],
            rating: Some(4.8),
        }
    }

    #[test]
    fn test_row_decoding_drops_unknown_list_members() {
        let tour = TourRecord::try_from(row()).unwrap();
        assert_eq!(tour.time_of_day_trip_type, vec![TimeOfDay::Morning]);
        assert_eq!(tour.season, vec![Season::Summer]);
        assert_eq!(tour.tour_type, TourType::Outdoor);
        assert_eq!(tour.pricing_range_usd, PricingRange::Medium);
    }

    #[test]
    fn test_row_decoding_unknown_tour_type() {
        let mut raw = row();
        raw.tour_type = "hybrid".to_string();
        let tour = TourRecord::try_from(raw).unwrap();
        assert_eq!(tour.tour_type, TourType::Unknown);
    }

    #[test]
    fn test_row_decoding_rejects_unknown_price_band() {
        let mut raw = row();
        raw.pricing_range_usd = "cheap".to_string();
        let err = TourRecord::try_from(raw).unwrap_err();
        assert!(err.contains("unknown price band"));
    }

    #[test]
    fn test_pricing_range_order_and_serde() {
        assert!(PricingRange::Low < PricingRange::Medium);
        assert!(PricingRange::Premium < PricingRange::Luxury);

        let json = serde_json::to_string(&PricingRange::High).unwrap();
        assert_eq!(json, "\"100 - 200 USD\"");
        let parsed: PricingRange = serde_json::from_str("\"500+ USD\"").unwrap();
        assert_eq!(parsed, PricingRange::Luxury);
    }

    #[test]
    fn test_price_bands_up_to() {
        assert_eq!(PricingRange::Low.up_to(), vec![PricingRange::Low]);
        assert_eq!(
            PricingRange::High.up_to(),
            vec![PricingRange::Low, PricingRange::Medium, PricingRange::High]
        );
        assert_eq!(PricingRange::Luxury.up_to().len(), 5);
    }

    #[test]
    fn test_catalog_stats_from_tours() {
        let kayak = TourRecord::try_from(row()).unwrap();
        let mut museum = kayak.clone();
        museum.id = 12;
        museum.tour_type = TourType::Indoor;
        museum.category_name = "Culture".to_string();

        let stats = CatalogStats::from_tours([&kayak, &museum, &kayak]);
        assert_eq!(stats.total_tours, 3);
        assert_eq!(stats.tours_by_type["outdoor"], 2);
        assert_eq!(stats.tours_by_type["indoor"], 1);
        assert_eq!(stats.tours_by_price["50 - 100 USD"], 3);
        assert_eq!(stats.tours_by_category["Water"], 2);
    }

    #[test]
    fn test_tour_type_serde_unknown() {
        let parsed: TourType = serde_json::from_str("\"underwater\"").unwrap();
        assert_eq!(parsed, TourType::Unknown);
        assert_eq!(serde_json::to_string(&TourType::Both).unwrap(), "\"both\"");
    }

    #[test]
    fn test_similarity_weights() {
        let base = TourRecord::try_from(row()).unwrap();

        let mut other = base.clone();
        other.id = 12;
        assert_eq!(base.similarity_to(&other), 8);

        other.category_name = "Food".to_string();
        assert_eq!(base.similarity_to(&other), 5);

        other.subcategory_name = "Tasting".to_string();
        other.tour_type = TourType::Indoor;
        assert_eq!(base.similarity_to(&other), 1);
    }
}
