use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};

use crate::{
    db::catalog::{CatalogStore, Predicate, TourFilter},
    error::QueryError,
    models::{CatalogStats, CategoryCount, TourRecord, TourRow, EARTH_RADIUS_KM},
};

const TOUR_COLUMNS: &str = "id, name, lat, long, pricing_range_usd, category_name, \
     subcategory_name, time_of_day_trip_type, tour_type, season, group_type_suitability, rating";

/// `ILIKE` pattern matching `text` anywhere, with wildcards in `text` escaped
fn contains_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn strings<T>(values: &[T], as_str: impl Fn(&T) -> &'static str) -> Vec<String> {
    values.iter().map(|v| as_str(v).to_string()).collect()
}

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Tour catalog backed by the `tour_info` table
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends ` AND <predicate>` for every predicate of the filter
    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &TourFilter) {
        for predicate in filter.predicates() {
            builder.push(" AND ");
            match predicate {
                Predicate::WithinRadius { origin, radius_km } => {
                    // Haversine, evaluated server-side. Rounding can push the
                    // asin argument past 1 near the antipode.
                    builder
                        .push("(")
                        .push(EARTH_RADIUS_KM)
                        .push(" * 2.0 * asin(least(1.0, sqrt(power(sin(radians(lat - ")
                        .push_bind(origin.lat)
                        .push(") / 2.0), 2) + cos(radians(")
                        .push_bind(origin.lat)
                        .push(")) * cos(radians(lat)) * power(sin(radians(long - ")
                        .push_bind(origin.lon)
                        .push(") / 2.0), 2))))) <= ")
                        .push_bind(*radius_km);
                }
                Predicate::TourTypeIn(types) => {
                    builder
                        .push("tour_type = ANY(")
                        .push_bind(strings(types, |t| t.as_str()))
                        .push(")");
                }
                Predicate::HasTimeOfDay(bucket) => {
                    builder
                        .push_bind(bucket.as_str())
                        .push(" = ANY(time_of_day_trip_type)");
                }
                Predicate::TimeOfDayAny(buckets) => {
                    builder
                        .push("time_of_day_trip_type && ")
                        .push_bind(strings(buckets, |b| b.as_str()));
                }
                Predicate::SeasonAny(seasons) => {
                    builder
                        .push("season && ")
                        .push_bind(strings(seasons, |s| s.as_str()));
                }
                Predicate::HasGroupType(group) => {
                    builder
                        .push_bind(group.as_str())
                        .push(" = ANY(group_type_suitability)");
                }
                Predicate::CategoryEq(category) => {
                    builder.push("category_name = ").push_bind(category.clone());
                }
                Predicate::PriceRangeEq(range) => {
                    builder.push("pricing_range_usd = ").push_bind(range.as_str());
                }
                Predicate::PriceAtMost(range) => {
                    // Band labels do not sort as text, so list the allowed ones
                    builder
                        .push("pricing_range_usd = ANY(")
                        .push_bind(strings(&range.up_to(), |r| r.as_str()))
                        .push(")");
                }
                Predicate::TextMatch(text) => {
                    let pattern = contains_pattern(text);
                    builder
                        .push("(name ILIKE ")
                        .push_bind(pattern.clone())
                        .push(" OR category_name ILIKE ")
                        .push_bind(pattern.clone())
                        .push(" OR subcategory_name ILIKE ")
                        .push_bind(pattern)
                        .push(")");
                }
                Predicate::IdIn(ids) => {
                    builder.push("id = ANY(").push_bind(ids.clone()).push(")");
                }
                Predicate::IdNotIn(ids) => {
                    builder.push("NOT (id = ANY(").push_bind(ids.clone()).push("))");
                }
            }
        }
    }

    fn push_limit(builder: &mut QueryBuilder<'_, Postgres>, limit: Option<usize>) {
        if let Some(limit) = limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }
    }

    /// `(value, count)` pairs of one column over the whole table
    async fn group_counts(&self, column: &'static str) -> Result<Vec<(String, i64)>, QueryError> {
        let sql = format!(
            "SELECT {column}, COUNT(*) FROM tour_info GROUP BY {column}",
            column = column
        );
        Ok(sqlx::query_as(&sql).fetch_all(&self.pool).await?)
    }

    /// Decodes rows, skipping (and logging) the ones that do not fit the model
    fn decode_rows(rows: Vec<TourRow>) -> Vec<TourRecord> {
        rows.into_iter()
            .filter_map(|row| {
                let id = row.id;
                match TourRecord::try_from(row) {
                    Ok(tour) => Some(tour),
                    Err(reason) => {
                        let err = QueryError::Decode { id, reason };
                        tracing::warn!(error = %err, "Skipping undecodable tour row");
                        None
                    }
                }
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalog {
    async fn find_ids(
        &self,
        filter: &TourFilter,
        limit: Option<usize>,
    ) -> Result<Vec<i64>, QueryError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM tour_info WHERE TRUE");
        Self::push_filter(&mut builder, filter);
        builder.push(" ORDER BY id");
        Self::push_limit(&mut builder, limit);

        tracing::debug!(sql = %builder.sql(), "Executing id query");

        let rows: Vec<(i64,)> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn find_tours(
        &self,
        filter: &TourFilter,
        limit: Option<usize>,
    ) -> Result<Vec<TourRecord>, QueryError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM tour_info WHERE TRUE",
            TOUR_COLUMNS
        ));
        Self::push_filter(&mut builder, filter);
        builder.push(" ORDER BY id");
        Self::push_limit(&mut builder, limit);

        tracing::debug!(sql = %builder.sql(), "Executing tour query");

        let rows: Vec<TourRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(Self::decode_rows(rows))
    }

    async fn find_page(
        &self,
        filter: &TourFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TourRecord>, QueryError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM tour_info WHERE TRUE",
            TOUR_COLUMNS
        ));
        Self::push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY id LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset as i64);

        let rows: Vec<TourRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(Self::decode_rows(rows))
    }

    async fn similar_tours(
        &self,
        base: &TourRecord,
        limit: usize,
    ) -> Result<Vec<TourRecord>, QueryError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM tour_info
            WHERE id <> $1
            ORDER BY (CASE WHEN category_name = $2 THEN 3 ELSE 0 END
                    + CASE WHEN subcategory_name = $3 THEN 2 ELSE 0 END
                    + CASE WHEN tour_type = $4 THEN 2 ELSE 0 END
                    + CASE WHEN pricing_range_usd = $5 THEN 1 ELSE 0 END) DESC, id
            LIMIT $6
            "#,
            TOUR_COLUMNS
        );

        let rows: Vec<TourRow> = sqlx::query_as(&sql)
            .bind(base.id)
            .bind(&base.category_name)
            .bind(&base.subcategory_name)
            .bind(base.tour_type.as_str())
            .bind(base.pricing_range_usd.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Self::decode_rows(rows))
    }

    async fn category_counts(&self) -> Result<Vec<CategoryCount>, QueryError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT category_name, COUNT(*) AS tour_count
            FROM tour_info
            GROUP BY category_name
            ORDER BY tour_count DESC, category_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect())
    }

    async fn catalog_stats(&self) -> Result<CatalogStats, QueryError> {
        let (total_tours,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tour_info")
            .fetch_one(&self.pool)
            .await?;

        Ok(CatalogStats {
            total_tours,
            tours_by_type: self.group_counts("tour_type").await?.into_iter().collect(),
            tours_by_price: self.group_counts("pricing_range_usd").await?.into_iter().collect(),
            tours_by_category: self.group_counts("category_name").await?.into_iter().collect(),
        })
    }

    async fn random_tour(&self) -> Result<Option<TourRecord>, QueryError> {
        let sql = format!("SELECT {} FROM tour_info ORDER BY random() LIMIT 1", TOUR_COLUMNS);
        let row: Option<TourRow> = sqlx::query_as(&sql).fetch_optional(&self.pool).await?;
        Ok(row.and_then(|row| Self::decode_rows(vec![row]).pop()))
    }

    async fn ping(&self) -> Result<(), QueryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
