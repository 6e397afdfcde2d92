/// External data providers
///
/// The recommendation pipeline consults two outside services: a weather API
/// for the derived context and a text-generation API for recommendation
/// reasons. Each sits behind a trait so implementations can be swapped or
/// mocked.
use crate::{
    error::{AppResult, GenerationError},
    models::Weather,
};

pub mod openai;
pub mod openweather;

pub use openai::OpenAiGenerator;
pub use openweather::OpenWeatherMapProvider;

/// Source of current weather conditions
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current weather at the given coordinates
    async fn current_weather(&self, lat: f64, lon: f64) -> AppResult<Weather>;
}

/// Natural-language text generator
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a completion for the prompt
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Whether a credential is available. Callers must not invoke
    /// `generate` when this is false.
    fn is_configured(&self) -> bool;
}
