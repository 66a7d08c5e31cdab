//! Mock Weather Source
//!
//! For testing and demo purposes. Returns fixed conditions per city.

use async_trait::async_trait;
use chrono::Utc;

use super::{Units, WeatherReport, WeatherSource};
use crate::error::{Result, ToolError};

/// Mock weather source with static observations
#[derive(Default)]
pub struct MockWeatherSource;

impl MockWeatherSource {
    pub const fn new() -> Self {
        Self
    }

    /// Base conditions for a city: (name, °C, conditions, humidity %, wind km/h)
    fn observation(location: &str) -> Option<(&'static str, f64, &'static str, u8, f64)> {
        match location.to_lowercase().as_str() {
            "paris" => Some(("Paris", 18.0, "partly cloudy", 62, 14.0)),
            "london" => Some(("London", 14.5, "light rain", 81, 22.0)),
            "new york" | "nyc" => Some(("New York", 22.0, "sunny", 48, 11.0)),
            "tokyo" => Some(("Tokyo", 26.0, "humid and clear", 74, 9.0)),
            "sydney" => Some(("Sydney", 20.5, "clear", 55, 18.0)),
            "berlin" => Some(("Berlin", 16.0, "overcast", 68, 16.0)),
            "san francisco" | "sf" => Some(("San Francisco", 15.0, "fog", 86, 24.0)),
            "cairo" => Some(("Cairo", 33.0, "hot and dry", 21, 12.0)),
            "reykjavik" => Some(("Reykjavik", 6.0, "windy", 77, 38.0)),
            _ => None,
        }
    }
}

#[async_trait]
impl WeatherSource for MockWeatherSource {
    async fn current(&self, location: &str, units: Units) -> Result<WeatherReport> {
        let (name, celsius, conditions, humidity, wind_kmh) = Self::observation(location)
            .ok_or_else(|| ToolError::NotFound(format!("weather for '{location}'")))?;

        let (temperature, wind_speed) = match units {
            Units::Metric => (celsius, wind_kmh),
            Units::Imperial => (celsius * 9.0 / 5.0 + 32.0, wind_kmh / 1.609),
        };

        Ok(WeatherReport {
            location: name.into(),
            temperature,
            units,
            conditions: conditions.into(),
            humidity_percent: humidity,
            wind_speed,
            observed_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "MockWeather"
    }
}
