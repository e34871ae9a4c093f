use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt, str::FromStr};

use crate::error::UnknownVariant;

const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

/// Unit system requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Metric,
    Imperial,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Metric => "metric",
            Unit::Imperial => "imperial",
        }
    }

    pub const fn all() -> &'static [Unit] {
        &[Unit::Metric, Unit::Imperial]
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Unit::Metric => "°C",
            Unit::Imperial => "°F",
        }
    }

    pub fn speed_symbol(&self) -> &'static str {
        match self {
            Unit::Metric => "m/s",
            Unit::Imperial => "mph",
        }
    }

    pub fn toggled(&self) -> Unit {
        match self {
            Unit::Metric => Unit::Imperial,
            Unit::Imperial => Unit::Metric,
        }
    }
}

/// Color scheme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub const fn all() -> &'static [Theme] {
        &[Theme::Light, Theme::Dark]
    }

    pub fn toggled(&self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Geolocation permission as last reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    /// The status query itself failed.
    Unknown,
    /// Not decided yet; a position request may still succeed.
    #[default]
    Prompt,
    Granted,
    Denied,
    /// No geolocation capability at all.
    Unsupported,
}

impl PermissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionStatus::Unknown => "unknown",
            PermissionStatus::Prompt => "prompt",
            PermissionStatus::Granted => "granted",
            PermissionStatus::Denied => "denied",
            PermissionStatus::Unsupported => "unsupported",
        }
    }

    pub const fn all() -> &'static [PermissionStatus] {
        &[
            PermissionStatus::Unknown,
            PermissionStatus::Prompt,
            PermissionStatus::Granted,
            PermissionStatus::Denied,
            PermissionStatus::Unsupported,
        ]
    }
}

macro_rules! string_enum {
    ($ty:ident, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<&str> for $ty {
            type Error = UnknownVariant;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                let lower = value.trim().to_lowercase();

                $ty::all()
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == lower)
                    .ok_or_else(|| UnknownVariant {
                        kind: $kind,
                        value: value.to_string(),
                        supported: $ty::all()
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::try_from(s)
            }
        }
    };
}

string_enum!(Unit, "unit");
string_enum!(Theme, "theme");
string_enum!(PermissionStatus, "permission status");

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Current conditions for one location, normalized from the provider payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city: String,
    pub country: String,
    pub region: Option<String>,
    pub coordinates: Coordinates,
    pub temperature: i32,
    pub feels_like: i32,
    pub temp_min: i32,
    pub temp_max: i32,
    pub humidity: u8,
    pub pressure: u32,
    pub wind_speed: f64,
    pub wind_deg: u16,
    pub wind_gust: Option<f64>,
    pub description: String,
    pub icon: String,
    /// Epoch seconds.
    pub sunrise: i64,
    /// Epoch seconds.
    pub sunset: i64,
    pub clouds: u8,
    pub visibility: Option<u32>,
    /// Observation time, epoch seconds.
    pub timestamp: i64,
    /// Active warnings for the location, when the provider reports any.
    #[serde(default)]
    pub alerts: Vec<WeatherAlert>,
}

/// A weather warning issued for the location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub sender: String,
    pub event: String,
    /// Epoch seconds.
    pub start: i64,
    /// Epoch seconds.
    pub end: i64,
    pub description: String,
}

impl WeatherSnapshot {
    pub fn icon_url(&self) -> String {
        format!("{ICON_BASE_URL}/{}@2x.png", self.icon)
    }
}

/// One calendar day of aggregated 3-hourly forecast samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub temp_max: i32,
    pub temp_min: i32,
    pub avg_temp: i32,
    pub feels_like: i32,
    pub icon: String,
    pub description: String,
    pub avg_humidity: i32,
    pub avg_wind_speed: i32,
    pub avg_pressure: i32,
    pub avg_clouds: i32,
}

impl ForecastDay {
    pub fn icon_url(&self) -> String {
        format!("{ICON_BASE_URL}/{}.png", self.icon)
    }
}

/// Current conditions plus the daily forecast for the same location.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub current: WeatherSnapshot,
    pub forecast: Vec<ForecastDay>,
}

/// Candidate city returned by forward geocoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySuggestion {
    pub name: String,
    pub region: Option<String>,
    pub country: String,
    pub coordinates: Coordinates,
    pub display_name: String,
}

impl CitySuggestion {
    pub fn new(
        name: String,
        region: Option<String>,
        country: String,
        coordinates: Coordinates,
    ) -> Self {
        let display_name = display_label(&name, region.as_deref(), &country);
        Self {
            name,
            region,
            country,
            coordinates,
            display_name,
        }
    }
}

/// "Name, Region, CC" or "Name, CC" when the region is unknown.
pub fn display_label(name: &str, region: Option<&str>, country: &str) -> String {
    match region.filter(|r| !r.is_empty()) {
        Some(region) => format!("{name}, {region}, {country}"),
        None => format!("{name}, {country}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_as_str_roundtrip() {
        for unit in Unit::all() {
            let parsed = Unit::try_from(unit.as_str()).expect("roundtrip should succeed");
            assert_eq!(*unit, parsed);
        }
    }

    #[test]
    fn theme_parse_is_case_insensitive() {
        assert_eq!("DARK".parse::<Theme>().unwrap(), Theme::Dark);
        assert_eq!(" light ".parse::<Theme>().unwrap(), Theme::Light);
    }

    #[test]
    fn unknown_unit_error() {
        let err = Unit::try_from("kelvin").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Unknown unit 'kelvin'"));
        assert!(msg.contains("metric, imperial"));
    }

    #[test]
    fn display_label_with_and_without_region() {
        assert_eq!(display_label("Paris", Some("Ile-de-France"), "FR"), "Paris, Ile-de-France, FR");
        assert_eq!(display_label("Paris", None, "FR"), "Paris, FR");
        assert_eq!(display_label("Paris", Some(""), "FR"), "Paris, FR");
    }

    #[test]
    fn icon_urls() {
        let day = ForecastDay {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            temp_max: 20,
            temp_min: 10,
            avg_temp: 15,
            feels_like: 14,
            icon: "10d".into(),
            description: "light rain".into(),
            avg_humidity: 70,
            avg_wind_speed: 3,
            avg_pressure: 1012,
            avg_clouds: 40,
        };
        assert_eq!(day.icon_url(), "https://openweathermap.org/img/wn/10d.png");
    }

    #[test]
    fn unit_toggle() {
        assert_eq!(Unit::Metric.toggled(), Unit::Imperial);
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
    }
}
