use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use tour_recs_api::{
    config::Config,
    db::{create_pool, create_redis_client, Cache, CatalogStore, InMemoryCatalog, PgCatalog},
    routes::{create_router, AppState},
    services::{
        providers::{OpenAiGenerator, OpenWeatherMapProvider, TextGenerator, WeatherProvider},
        ContextDeriver, PipelineOptions, ReasonGenerator, RecommendationService, TourService,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;

    let catalog = build_catalog(&config).await?;

    let (cache, cache_handle) = match config.redis_url.as_deref() {
        Some(url) => {
            let client = create_redis_client(url)?;
            let (cache, handle) = Cache::new(client).await;
            (cache, Some(handle))
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-memory reason cache");
            (Cache::in_memory_with_capacity(config.reason_cache_capacity), None)
        }
    };

    let weather: Option<Arc<dyn WeatherProvider>> = match config.weather_api_key.clone() {
        Some(key) if !key.trim().is_empty() => Some(Arc::new(OpenWeatherMapProvider::new(
            key,
            config.weather_api_url.clone(),
        ))),
        _ => {
            tracing::warn!("WEATHER_API_KEY not set, recommendations will omit weather");
            None
        }
    };

    let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::new(
        config.openai_api_key.clone(),
        config.openai_api_url.clone(),
        config.openai_model.clone(),
        config.openai_max_tokens,
        config.openai_temperature,
    ));
    if !generator.is_configured() {
        tracing::warn!("OPENAI_API_KEY not set, recommendation reasons will use a fixed text");
    }

    let recommendations = RecommendationService::new(
        catalog.clone(),
        ContextDeriver::new(weather, config.weather_timeout()),
        ReasonGenerator::new(
            generator,
            cache.clone(),
            config.reason_cache_ttl_secs,
            config.generation_timeout(),
        ),
        PipelineOptions::from_config(&config),
    );

    let state = AppState {
        recommendations,
        tours: TourService::new(catalog, config.catalog_timeout()),
        cache,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, ranking_policy = ?config.ranking_policy, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tour_recs_api=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Postgres catalog, or an in-memory one when CATALOG_FILE is set
async fn build_catalog(config: &Config) -> anyhow::Result<Arc<dyn CatalogStore>> {
    if let Some(path) = &config.catalog_file {
        let json = tokio::fs::read_to_string(path).await?;
        let catalog = InMemoryCatalog::from_json(&json)?;
        tracing::info!(path = %path, tours = catalog.len(), "Loaded in-memory catalog");
        return Ok(Arc::new(catalog));
    }

    let pool = create_pool(&config.database_url).await?;
    if config.run_migrations {
        sqlx::migrate!().run(&pool).await?;
        tracing::info!("Catalog migrations applied");
    }

    tracing::info!("Connected to Postgres catalog");
    Ok(Arc::new(PgCatalog::new(pool)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
