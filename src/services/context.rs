use chrono::{DateTime, Datelike, Local, NaiveDateTime, Timelike};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    error::ContextError,
    models::{ContextSeason, DerivedContext, RequestContext, TimeOfDay, Weather},
    services::providers::WeatherProvider,
};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Time-of-day bucket for a local hour
pub fn time_of_day_for_hour(hour: u32) -> TimeOfDay {
    match hour {
        5..=11 => TimeOfDay::Morning,
        12..=16 => TimeOfDay::Afternoon,
        17..=20 => TimeOfDay::Evening,
        _ => TimeOfDay::Night,
    }
}

/// Northern-hemisphere season for a month (1-12)
pub fn season_for_month(month: u32) -> ContextSeason {
    match month {
        12 | 1 | 2 => ContextSeason::Winter,
        3..=5 => ContextSeason::Spring,
        6..=8 => ContextSeason::Summer,
        _ => ContextSeason::Autumn,
    }
}

/// Parses the user's local timestamp
///
/// RFC 3339 values keep the wall-clock time of their own offset.
pub fn parse_local_datetime(value: &str) -> Result<NaiveDateTime, ContextError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_local());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| ContextError::InvalidTimestamp(value.to_string()))
}

/// Computes the situational context of a request
#[derive(Clone)]
pub struct ContextDeriver {
    weather_provider: Option<Arc<dyn WeatherProvider>>,
    weather_timeout: Duration,
}

impl ContextDeriver {
    pub fn new(weather_provider: Option<Arc<dyn WeatherProvider>>, weather_timeout: Duration) -> Self {
        Self {
            weather_provider,
            weather_timeout,
        }
    }

    /// Derives weather, time-of-day and season for the request
    ///
    /// Only an unparseable timestamp is an error; weather problems leave
    /// `weather` empty.
    pub async fn derive(&self, request: &RequestContext) -> Result<DerivedContext, ContextError> {
        let local_datetime = match request.local_datetime.as_deref() {
            Some(value) => parse_local_datetime(value)?,
            None => Local::now().naive_local(),
        };

        let weather = match request.location() {
            Some(point) => self.fetch_weather(point.lat, point.lon).await,
            None => None,
        };

        let context = DerivedContext {
            weather,
            time_of_day: time_of_day_for_hour(local_datetime.hour()),
            season: season_for_month(local_datetime.month()),
            local_datetime,
        };

        tracing::debug!(
            time_of_day = %context.time_of_day,
            season = ?context.season,
            weather = ?context.weather.as_ref().map(|w| w.condition.as_str()),
            "Derived request context"
        );

        Ok(context)
    }

    async fn fetch_weather(&self, lat: f64, lon: f64) -> Option<Weather> {
        let provider = self.weather_provider.as_ref()?;

        match tokio::time::timeout(self.weather_timeout, provider.current_weather(lat, lon)).await {
            Ok(Ok(weather)) => Some(weather),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Weather lookup failed, continuing without weather");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.weather_timeout.as_millis() as u64,
                    "Weather lookup timed out, continuing without weather"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::providers::MockWeatherProvider;
    use chrono::NaiveDate;

    /// Weather service that answers long after any timeout
    struct StalledWeather;

    #[async_trait::async_trait]
    impl WeatherProvider for StalledWeather {
        async fn current_weather(&self, _lat: f64, _lon: f64) -> crate::error::AppResult<Weather> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Weather {
                condition: "Clear".to_string(),
                temperature_celsius: 20.0,
            })
        }
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn request(json: &str) -> RequestContext {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_time_of_day_boundaries() {
        assert_eq!(time_of_day_for_hour(at(5, 0).hour()), TimeOfDay::Morning);
        assert_eq!(time_of_day_for_hour(at(4, 0).hour()), TimeOfDay::Night);
        assert_eq!(time_of_day_for_hour(at(11, 59).hour()), TimeOfDay::Morning);
        assert_eq!(time_of_day_for_hour(at(12, 0).hour()), TimeOfDay::Afternoon);
        assert_eq!(time_of_day_for_hour(at(16, 59).hour()), TimeOfDay::Afternoon);
        assert_eq!(time_of_day_for_hour(at(17, 0).hour()), TimeOfDay::Evening);
        assert_eq!(time_of_day_for_hour(at(21, 0).hour()), TimeOfDay::Night);
        assert_eq!(time_of_day_for_hour(at(0, 0).hour()), TimeOfDay::Night);
    }

    #[test]
    fn test_season_for_month() {
        assert_eq!(season_for_month(12), ContextSeason::Winter);
        assert_eq!(season_for_month(1), ContextSeason::Winter);
        assert_eq!(season_for_month(5), ContextSeason::Spring);
        assert_eq!(season_for_month(7), ContextSeason::Summer);
        assert_eq!(season_for_month(10), ContextSeason::Autumn);
    }

    #[test]
    fn test_parse_local_datetime_formats() {
        let expected = at(14, 30);
        assert_eq!(parse_local_datetime("2024-06-01T14:30:00").unwrap(), expected);
        assert_eq!(parse_local_datetime("2024-06-01 14:30:00").unwrap(), expected);
        assert_eq!(parse_local_datetime("2024-06-01T14:30").unwrap(), expected);
        assert_eq!(parse_local_datetime("2024-06-01T14:30:00.000").unwrap(), expected);
    }

    #[test]
    fn test_parse_rfc3339_keeps_local_wall_clock() {
        let parsed = parse_local_datetime("2024-06-01T14:30:00-04:00").unwrap();
        assert_eq!(parsed, at(14, 30));
    }

    #[test]
    fn test_parse_invalid_timestamp() {
        let err = parse_local_datetime("next tuesday").unwrap_err();
        assert!(matches!(err, ContextError::InvalidTimestamp(ref v) if v == "next tuesday"));
    }

    #[tokio::test]
    async fn test_derive_without_location_skips_weather() {
        let mut provider = MockWeatherProvider::new();
        provider.expect_current_weather().times(0);

        let deriver = ContextDeriver::new(Some(Arc::new(provider)), Duration::from_secs(1));
        let context = deriver
            .derive(&request(r#"{"local_datetime": "2024-12-24T18:15:00"}"#))
            .await
            .unwrap();

        assert_eq!(context.weather, None);
        assert_eq!(context.time_of_day, TimeOfDay::Evening);
        assert_eq!(context.season, ContextSeason::Winter);
    }

    #[tokio::test]
    async fn test_derive_with_weather() {
        let mut provider = MockWeatherProvider::new();
        provider
            .expect_current_weather()
            .times(1)
            .returning(|_, _| {
                Ok(Weather {
                    condition: "Rain".to_string(),
                    temperature_celsius: 9.5,
                })
            });

        let deriver = ContextDeriver::new(Some(Arc::new(provider)), Duration::from_secs(1));
        let context = deriver
            .derive(&request(
                r#"{"lat": 40.0, "lon": -74.0, "local_datetime": "2024-05-10T09:00:00"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(context.weather.unwrap().condition, "Rain");
        assert_eq!(context.time_of_day, TimeOfDay::Morning);
        assert_eq!(context.season, ContextSeason::Spring);
    }

    #[tokio::test]
    async fn test_weather_failure_degrades_gracefully() {
        let mut provider = MockWeatherProvider::new();
        provider
            .expect_current_weather()
            .returning(|_, _| Err(AppError::ExternalApi("quota exceeded".to_string())));

        let deriver = ContextDeriver::new(Some(Arc::new(provider)), Duration::from_secs(1));
        let context = deriver
            .derive(&request(
                r#"{"lat": 40.0, "lon": -74.0, "local_datetime": "2024-05-10T09:00:00"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(context.weather, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_weather_timeout_degrades_gracefully() {
        let deriver = ContextDeriver::new(Some(Arc::new(StalledWeather)), Duration::from_secs(3));
        let context = deriver
            .derive(&request(
                r#"{"lat": 40.0, "lon": -74.0, "local_datetime": "2024-05-10T09:00:00"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(context.weather, None);
        assert_eq!(context.time_of_day, TimeOfDay::Morning);
    }

    #[tokio::test]
    async fn test_invalid_timestamp_is_fatal() {
        let deriver = ContextDeriver::new(None, Duration::from_secs(1));
        let result = deriver
            .derive(&request(r#"{"local_datetime": "31/02/2024 25:00"}"#))
            .await;
        assert!(result.is_err());
    }
}
