use serde::Deserialize;
use serde_json::{Map, Value};

use crate::chat::render_value;
use crate::service::{BoundedClient, ServiceFailure, ServiceRequest};
use crate::session::Location;

/// Fields read from the first minutely entry of a forecast.
pub const WEATHER_FIELDS: &[&str] = &[
    "temperature",
    "temperatureApparent",
    "humidity",
    "windSpeed",
    "windGust",
    "windDirection",
    "cloudCover",
    "cloudBase",
    "cloudCeiling",
    "dewPoint",
    "precipitationProbability",
    "rainIntensity",
    "snowIntensity",
    "sleetIntensity",
    "freezingRainIntensity",
    "hailProbability",
    "hailSize",
    "pressureSurfaceLevel",
    "uvIndex",
    "uvHealthConcern",
    "visibility",
    "weatherCode",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeatherError {
    Disabled,
    LocationDisabled,
    MissingKey,
    UnknownField(String),
    Service(ServiceFailure),
}

impl std::fmt::Display for WeatherError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeatherError::Disabled => {
                write!(f, "weather is disabled, re-enable with 'user location enable'")
            }
            WeatherError::LocationDisabled => {
                write!(f, "location is disabled, enable with 'user location enable'")
            }
            WeatherError::MissingKey => write!(f, "no weather API key configured"),
            WeatherError::UnknownField(field) => write!(
                f,
                "unknown weather field '{field}', known fields: {}",
                WEATHER_FIELDS.join(", ")
            ),
            WeatherError::Service(failure) => write!(f, "{failure}"),
        }
    }
}

impl std::error::Error for WeatherError {}

/// Named values of one forecast step. Each field is optional; a value of
/// an unexpected type leaves the whole set empty and lookups fall back to
/// the raw map.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WeatherValues {
    pub temperature: Option<f64>,
    pub temperature_apparent: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_gust: Option<f64>,
    pub wind_direction: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub cloud_base: Option<f64>,
    pub cloud_ceiling: Option<f64>,
    pub dew_point: Option<f64>,
    pub precipitation_probability: Option<f64>,
    pub rain_intensity: Option<f64>,
    pub snow_intensity: Option<f64>,
    pub sleet_intensity: Option<f64>,
    pub freezing_rain_intensity: Option<f64>,
    pub hail_probability: Option<f64>,
    pub hail_size: Option<f64>,
    pub pressure_surface_level: Option<f64>,
    pub uv_index: Option<f64>,
    pub uv_health_concern: Option<f64>,
    pub visibility: Option<f64>,
    pub weather_code: Option<i64>,
}

impl WeatherValues {
    /// Look up a field by its wire name.
    pub fn get(&self, field: &str) -> Option<String> {
        let number = match field {
            "temperature" => self.temperature,
            "temperatureApparent" => self.temperature_apparent,
            "humidity" => self.humidity,
            "windSpeed" => self.wind_speed,
            "windGust" => self.wind_gust,
            "windDirection" => self.wind_direction,
            "cloudCover" => self.cloud_cover,
            "cloudBase" => self.cloud_base,
            "cloudCeiling" => self.cloud_ceiling,
            "dewPoint" => self.dew_point,
            "precipitationProbability" => self.precipitation_probability,
            "rainIntensity" => self.rain_intensity,
            "snowIntensity" => self.snow_intensity,
            "sleetIntensity" => self.sleet_intensity,
            "freezingRainIntensity" => self.freezing_rain_intensity,
            "hailProbability" => self.hail_probability,
            "hailSize" => self.hail_size,
            "pressureSurfaceLevel" => self.pressure_surface_level,
            "uvIndex" => self.uv_index,
            "uvHealthConcern" => self.uv_health_concern,
            "visibility" => self.visibility,
            "weatherCode" => return self.weather_code.map(|code| code.to_string()),
            _ => None,
        };
        number.map(|value| value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub time: Option<String>,
    pub values: WeatherValues,
    pub raw: Map<String, Value>,
}

impl WeatherSnapshot {
    pub fn from_value(raw: &Value) -> Result<Self, ServiceFailure> {
        let entry = raw
            .pointer("/timelines/minutely/0")
            .ok_or_else(|| ServiceFailure::Malformed("missing timelines.minutely[0]".to_string()))?;
        let raw_values = entry
            .get("values")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| {
                ServiceFailure::Malformed("missing timelines.minutely[0].values".to_string())
            })?;
        let values = serde_json::from_value(Value::Object(raw_values.clone())).unwrap_or_else(|err| {
            tracing::debug!(error = %err, "weather values did not match the typed shape");
            WeatherValues::default()
        });
        Ok(Self {
            time: entry.get("time").and_then(Value::as_str).map(str::to_string),
            values,
            raw: raw_values,
        })
    }

    /// Typed field first, then whatever the provider sent under that name.
    pub fn get(&self, field: &str) -> Option<String> {
        self.values
            .get(field)
            .or_else(|| self.raw.get(field).map(render_value))
    }

    fn field_or_dash(&self, field: &str) -> String {
        self.get(field).unwrap_or_else(|| "-".to_string())
    }

    pub fn summary(&self) -> String {
        format!(
            "temperature {}°C (feels like {}°C), humidity {}%, wind {} m/s, weather code {}",
            self.field_or_dash("temperature"),
            self.field_or_dash("temperatureApparent"),
            self.field_or_dash("humidity"),
            self.field_or_dash("windSpeed"),
            self.field_or_dash("weatherCode"),
        )
    }
}

#[derive(Debug)]
pub struct WeatherService {
    client: BoundedClient,
    base_url: String,
    api_key: Option<String>,
    enabled: bool,
    last: Option<WeatherSnapshot>,
}

impl WeatherService {
    pub fn new(client: BoundedClient, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            enabled: true,
            last: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn last(&self) -> Option<&WeatherSnapshot> {
        self.last.as_ref()
    }

    /// Forget the cached snapshot, e.g. after the location moved.
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    /// Return the cached snapshot, fetching when absent or when `refresh`.
    /// A failed fetch disables weather for the rest of the session.
    pub fn current(&mut self, location: &Location, refresh: bool) -> Result<&WeatherSnapshot, WeatherError> {
        if !self.enabled {
            return Err(WeatherError::Disabled);
        }
        if !location.enabled {
            return Err(WeatherError::LocationDisabled);
        }
        if refresh || self.last.is_none() {
            let snapshot = self.fetch(location)?;
            self.last = Some(snapshot);
        }
        self.last.as_ref().ok_or(WeatherError::Disabled)
    }

    fn fetch(&mut self, location: &Location) -> Result<WeatherSnapshot, WeatherError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(WeatherError::MissingKey);
        };
        let url = format!(
            "{}/weather/forecast?location={},{}&apikey={}",
            self.base_url, location.latitude, location.longitude, key
        );
        let result = self
            .client
            .invoke(ServiceRequest::get(url))
            .and_then(|raw| WeatherSnapshot::from_value(&raw));
        result.map_err(|failure| {
            self.enabled = false;
            tracing::warn!(failure = failure.kind(), error = %failure, "weather request failed");
            WeatherError::Service(failure)
        })
    }

    pub fn field(&mut self, location: &Location, field: &str) -> Result<String, WeatherError> {
        let snapshot = self.current(location, false)?;
        snapshot
            .get(field)
            .ok_or_else(|| WeatherError::UnknownField(field.to_string()))
    }
}
