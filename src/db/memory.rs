use rand::seq::SliceRandom;
use std::collections::HashMap;

use crate::{
    db::catalog::{CatalogStore, TourFilter},
    error::QueryError,
    models::{CatalogStats, CategoryCount, TourRecord},
};

/// Catalog held in process memory
///
/// Evaluates the same predicates as the Postgres catalog, which makes it
/// suitable for local runs and for exercising the pipeline in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tours: Vec<TourRecord>,
}

impl InMemoryCatalog {
    pub fn new(mut tours: Vec<TourRecord>) -> Self {
        tours.sort_by_key(|t| t.id);
        Self { tours }
    }

    /// Loads the catalog from a JSON array of tour records
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let tours: Vec<TourRecord> = serde_json::from_str(json)?;
        Ok(Self::new(tours))
    }

    pub fn len(&self) -> usize {
        self.tours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tours.is_empty()
    }

    fn matching<'a>(
        &'a self,
        filter: &'a TourFilter,
        limit: Option<usize>,
    ) -> impl Iterator<Item = &'a TourRecord> + 'a {
        self.tours
            .iter()
            .filter(move |t| filter.matches(t))
            .take(limit.unwrap_or(usize::MAX))
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn find_ids(
        &self,
        filter: &TourFilter,
        limit: Option<usize>,
    ) -> Result<Vec<i64>, QueryError> {
        Ok(self.matching(filter, limit).map(|t| t.id).collect())
    }

    async fn find_tours(
        &self,
        filter: &TourFilter,
        limit: Option<usize>,
    ) -> Result<Vec<TourRecord>, QueryError> {
        Ok(self.matching(filter, limit).cloned().collect())
    }

    async fn find_page(
        &self,
        filter: &TourFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TourRecord>, QueryError> {
        Ok(self
            .tours
            .iter()
            .filter(|t| filter.matches(t))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn similar_tours(
        &self,
        base: &TourRecord,
        limit: usize,
    ) -> Result<Vec<TourRecord>, QueryError> {
        let mut scored: Vec<(u32, &TourRecord)> = self
            .tours
            .iter()
            .filter(|t| t.id != base.id)
            .map(|t| (base.similarity_to(t), t))
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then(a.id.cmp(&b.id)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn category_counts(&self) -> Result<Vec<CategoryCount>, QueryError> {
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for tour in &self.tours {
            *counts.entry(tour.category_name.as_str()).or_insert(0) += 1;
        }

        let mut counts: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(category, count)| CategoryCount {
                category: category.to_string(),
                count,
            })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then(a.category.cmp(&b.category)));

        Ok(counts)
    }

    async fn catalog_stats(&self) -> Result<CatalogStats, QueryError> {
        Ok(CatalogStats::from_tours(&self.tours))
    }

    async fn random_tour(&self) -> Result<Option<TourRecord>, QueryError> {
        let mut rng = rand::thread_rng();
        Ok(self.tours.choose(&mut rng).cloned())
    }

    async fn ping(&self) -> Result<(), QueryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::catalog::Predicate;
    use crate::models::{GroupType, PricingRange, Season, TimeOfDay, TourType};

    fn tour(id: i64, category: &str, tour_type: TourType) -> TourRecord {
        TourRecord {
            id,
            name: format!("Tour {}", id),
            lat: 40.0,
            long: -74.0,
            pricing_range_usd: PricingRange::Medium,
            category_name: category.to_string(),
            subcategory_name: "General".to_string(),
            time_of_day_trip_type: vec![TimeOfDay::Morning],
            tour_type,
            season: vec![Season::Summer],
            group_type_suitability: vec![GroupType::Family],
            rating: None,
        }
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new(vec![
            tour(3, "Food", TourType::Indoor),
            tour(1, "Culture", TourType::Indoor),
            tour(2, "Culture", TourType::Outdoor),
            tour(4, "Nature", TourType::Outdoor),
        ])
    }

    #[tokio::test]
    async fn test_find_ids_ordered_and_limited() {
        let catalog = catalog();
        let ids = catalog.find_ids(&TourFilter::new(), None).await.unwrap();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        let ids = catalog.find_ids(&TourFilter::new(), Some(2)).await.unwrap();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_find_tours_applies_filter() {
        let filter = TourFilter::new().and(Predicate::TourTypeIn(vec![TourType::Outdoor]));
        let tours = catalog().find_tours(&filter, None).await.unwrap();
        let ids: Vec<i64> = tours.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_find_page_skips_then_limits() {
        let catalog = catalog();
        let page = catalog.find_page(&TourFilter::new(), 1, 2).await.unwrap();
        let ids: Vec<i64> = page.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 3]);

        let filter = TourFilter::new().and(Predicate::CategoryEq("Culture".to_string()));
        let page = catalog.find_page(&filter, 1, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, 2);

        assert!(catalog.find_page(&filter, 5, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_stats() {
        let stats = catalog().catalog_stats().await.unwrap();
        assert_eq!(stats.total_tours, 4);
        assert_eq!(stats.tours_by_type["indoor"], 2);
        assert_eq!(stats.tours_by_category["Culture"], 2);
        assert_eq!(stats.tours_by_price["50 - 100 USD"], 4);
    }

    #[tokio::test]
    async fn test_similar_tours_excludes_base_and_orders_by_similarity() {
        let catalog = catalog();
        let base = tour(1, "Culture", TourType::Indoor);
        let similar = catalog.similar_tours(&base, 2).await.unwrap();
        let ids: Vec<i64> = similar.iter().map(|t| t.id).collect();
        // Tour 2 shares the category (3), tour 3 shares the type (2)
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_category_counts() {
        let counts = catalog().category_counts().await.unwrap();
        assert_eq!(
            counts[0],
            CategoryCount {
                category: "Culture".to_string(),
                count: 2
            }
        );
        assert_eq!(counts.len(), 3);
    }

    #[tokio::test]
    async fn test_random_tour() {
        assert!(catalog().random_tour().await.unwrap().is_some());
        assert!(InMemoryCatalog::default().random_tour().await.unwrap().is_none());
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::to_string(&vec![tour(9, "Food", TourType::Both)]).unwrap();
        let catalog = InMemoryCatalog::from_json(&json).unwrap();
        assert_eq!(catalog.len(), 1);
    }
}
