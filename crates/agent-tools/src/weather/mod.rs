//! Weather Lookup
//!
//! `weather_lookup` tool backed by a pluggable [`WeatherSource`].

mod mock;

pub use mock::MockWeatherSource;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agent_core::{Result as CoreResult, Tool, ToolSchema, tool::ParameterSchema};

use crate::error::{Result, ToolError, str_arg};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl std::str::FromStr for Units {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "metric" | "c" | "celsius" => Ok(Self::Metric),
            "imperial" | "f" | "fahrenheit" => Ok(Self::Imperial),
            other => Err(ToolError::InvalidArgument(format!("unknown units '{other}'"))),
        }
    }
}

/// Current conditions at one location
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: String,
    pub temperature: f64,
    pub units: Units,
    pub conditions: String,
    pub humidity_percent: u8,
    pub wind_speed: f64,
    pub observed_at: DateTime<Utc>,
}

/// Weather data provider (Strategy pattern)
///
/// Implement this for each real weather API.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Current conditions for a location name
    async fn current(&self, location: &str, units: Units) -> Result<WeatherReport>;

    /// Source name
    fn name(&self) -> &str;
}

/// Tool for looking up current weather
pub struct WeatherLookupTool {
    source: Arc<dyn WeatherSource>,
}

impl WeatherLookupTool {
    pub fn new(source: Arc<dyn WeatherSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for WeatherLookupTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "weather_lookup".into(),
            description: "Get current weather conditions for a city.".into(),
            parameters: vec![
                ParameterSchema::required("location", "string", "City name, e.g. 'Paris'"),
                ParameterSchema::optional("units", "string", "'metric' or 'imperial'")
                    .with_default(serde_json::json!("metric"))
                    .with_enum(vec![serde_json::json!("metric"), serde_json::json!("imperial")]),
            ],
            category: Some("information".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, arguments: &serde_json::Value) -> CoreResult<serde_json::Value> {
        let location = str_arg(arguments, "location", &["city"])?.trim();
        if location.is_empty() {
            return Err(ToolError::InvalidArgument("location cannot be empty".into()).into());
        }
        let units = match arguments.get("units").and_then(serde_json::Value::as_str) {
            Some(u) => u.parse()?,
            None => Units::default(),
        };

        let report = self.source.current(location, units).await?;
        tracing::debug!(source = self.source.name(), %location, "Weather looked up");

        Ok(serde_json::to_value(report).map_err(ToolError::from)?)
    }
}
