/// OpenWeatherMap current-weather provider
///
/// Calls `GET {api_url}/weather?lat=..&lon=..&appid=..&units=metric` and keeps
/// the primary condition label and the temperature in Celsius.
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::Weather,
    services::providers::WeatherProvider,
};

#[derive(Debug, Deserialize)]
struct ApiWeatherResponse {
    #[serde(default)]
    weather: Vec<ApiCondition>,
    main: Option<ApiMain>,
}

#[derive(Debug, Deserialize)]
struct ApiCondition {
    main: String,
}

#[derive(Debug, Deserialize)]
struct ApiMain {
    temp: f64,
}

impl ApiWeatherResponse {
    fn into_weather(self) -> AppResult<Weather> {
        let condition = self
            .weather
            .into_iter()
            .next()
            .map(|c| c.main)
            .unwrap_or_else(|| "Unknown".to_string());

        let temperature_celsius = self
            .main
            .map(|m| m.temp)
            .ok_or_else(|| AppError::ExternalApi("Weather response missing temperature".to_string()))?;

        Ok(Weather {
            condition,
            temperature_celsius,
        })
    }
}

#[derive(Clone)]
pub struct OpenWeatherMapProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl OpenWeatherMapProvider {
    pub fn new(api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
        }
    }
}

#[async_trait::async_trait]
impl WeatherProvider for OpenWeatherMapProvider {
    async fn current_weather(&self, lat: f64, lon: f64) -> AppResult<Weather> {
        let url = format!("{}/weather", self.api_url.trim_end_matches('/'));

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Weather API request failed");
            return Err(AppError::ExternalApi(format!(
                "Weather API returned status {}: {}",
                status, body
            )));
        }

        let payload: ApiWeatherResponse = response.json().await?;
        let weather = payload.into_weather()?;

        tracing::debug!(
            lat,
            lon,
            condition = %weather.condition,
            temperature = weather.temperature_celsius,
            "Weather fetched"
        );

        Ok(weather)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_response_deserialization() {
        let json = r#"{
            "weather": [{"id": 500, "main": "Rain", "description": "light rain"}],
            "main": {"temp": 11.4, "humidity": 87},
            "name": "New York"
        }"#;

        let payload: ApiWeatherResponse = serde_json::from_str(json).unwrap();
        let weather = payload.into_weather().unwrap();
        assert_eq!(weather.condition, "Rain");
        assert_eq!(weather.temperature_celsius, 11.4);
    }

    #[test]
    fn test_weather_response_without_conditions() {
        let json = r#"{"main": {"temp": 20.0}}"#;
        let payload: ApiWeatherResponse = serde_json::from_str(json).unwrap();
        let weather = payload.into_weather().unwrap();
        assert_eq!(weather.condition, "Unknown");
    }

    #[test]
    fn test_weather_response_missing_temperature() {
        let json = r#"{"weather": [{"main": "Clear"}]}"#;
        let payload: ApiWeatherResponse = serde_json::from_str(json).unwrap();
        let err = payload.into_weather().unwrap_err();
        assert!(err.to_string().contains("missing temperature"));
    }
}
