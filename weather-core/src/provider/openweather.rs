use anyhow::Context;
use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;

use crate::{
    error::WeatherError,
    forecast::{ForecastSample, aggregate_daily, round_half_up},
    model::{CitySuggestion, Coordinates, Unit, WeatherAlert, WeatherReport, WeatherSnapshot},
    provider::{DEFAULT_SUGGESTION_LIMIT, is_suggestible},
};

use super::WeatherProvider;

pub const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_GEO_URL: &str = "https://api.openweathermap.org/geo/1.0";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    http: Client,
    weather_url: String,
    geo_url: String,
}

/// How a location is addressed in weather requests.
#[derive(Debug, Clone, Copy)]
enum Place<'a> {
    Name(&'a str),
    At(Coordinates),
}

impl Place<'_> {
    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Place::Name(name) => vec![("q", (*name).to_string())],
            Place::At(c) => vec![("lat", c.latitude.to_string()), ("lon", c.longitude.to_string())],
        }
    }
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: Client::new(),
            weather_url: DEFAULT_WEATHER_URL.to_string(),
            geo_url: DEFAULT_GEO_URL.to_string(),
        }
    }

    /// Point the provider at custom base URLs (a proxy, or a mock server in tests).
    pub fn with_endpoints(
        api_key: impl Into<String>,
        weather_url: &str,
        geo_url: &str,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client for OpenWeather")?;

        Ok(Self {
            api_key: api_key.into(),
            http,
            weather_url: weather_url.trim_end_matches('/').to_string(),
            geo_url: geo_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        params: &[(&'static str, String)],
    ) -> Result<T, WeatherError> {
        let res = self
            .http
            .get(&url)
            .query(&[("appid", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(url = %url, error = %e, "OpenWeather request failed");
                WeatherError::from(e)
            })?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<OwErrorBody>(&body)
                .ok()
                .and_then(|b| b.message);
            tracing::debug!(
                url = %url,
                status = %status,
                body = %truncate_body(&body),
                "OpenWeather returned an error status"
            );
            return Err(WeatherError::from_status(status.as_u16(), message.as_deref()));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Failed to parse OpenWeather JSON");
            WeatherError::unknown()
        })
    }

    async fn fetch_current(&self, place: Place<'_>, unit: Unit) -> Result<OwCurrentResponse, WeatherError> {
        let mut params = place.params();
        params.push(("units", unit.as_str().to_string()));
        self.get_json(format!("{}/weather", self.weather_url), &params).await
    }

    async fn fetch_forecast(&self, place: Place<'_>, unit: Unit) -> Result<OwForecastResponse, WeatherError> {
        let mut params = place.params();
        params.push(("units", unit.as_str().to_string()));
        self.get_json(format!("{}/forecast", self.weather_url), &params).await
    }

    /// Current + forecast, issued together; both must succeed.
    async fn fetch_pair(
        &self,
        place: Place<'_>,
        unit: Unit,
    ) -> Result<(OwCurrentResponse, OwForecastResponse), WeatherError> {
        tokio::try_join!(self.fetch_current(place, unit), self.fetch_forecast(place, unit))
    }

    async fn reverse_geocode(&self, coordinates: Coordinates) -> Option<OwGeoPlace> {
        let params = [
            ("lat", coordinates.latitude.to_string()),
            ("lon", coordinates.longitude.to_string()),
            ("limit", "1".to_string()),
        ];

        match self
            .get_json::<Vec<OwGeoPlace>>(format!("{}/reverse", self.geo_url), &params)
            .await
        {
            Ok(places) => places.into_iter().next(),
            Err(e) => {
                tracing::debug!(%coordinates, error = %e, "Reverse geocode failed; using weather response name");
                None
            }
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch_by_city_name(&self, name: &str, unit: Unit) -> Result<WeatherReport, WeatherError> {
        tracing::debug!(city = %name, unit = %unit, "Fetching weather by city name");

        match self.fetch_pair(Place::Name(name), unit).await {
            Ok((current, forecast)) => Ok(build_report(current, forecast, None)),
            Err(WeatherError::CityNotFound) => {
                tracing::debug!(city = %name, "Direct lookup missed; trying geocoding");
                let candidates = self.suggest_cities(name, DEFAULT_SUGGESTION_LIMIT).await;
                match candidates.first() {
                    Some(best) => self.fetch_by_coordinates(best.coordinates, unit).await,
                    None => Err(WeatherError::CityNotFound),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_by_coordinates(
        &self,
        coordinates: Coordinates,
        unit: Unit,
    ) -> Result<WeatherReport, WeatherError> {
        tracing::debug!(%coordinates, unit = %unit, "Fetching weather by coordinates");

        let (pair, place) = tokio::join!(
            self.fetch_pair(Place::At(coordinates), unit),
            self.reverse_geocode(coordinates),
        );
        let (current, forecast) = pair?;

        Ok(build_report(current, forecast, place))
    }

    async fn suggest_cities(&self, query: &str, limit: usize) -> Vec<CitySuggestion> {
        if !is_suggestible(query) {
            return Vec::new();
        }

        let params = [("q", query.to_string()), ("limit", limit.to_string())];

        match self
            .get_json::<Vec<OwGeoPlace>>(format!("{}/direct", self.geo_url), &params)
            .await
        {
            Ok(places) => places.into_iter().take(limit).map(OwGeoPlace::into_suggestion).collect(),
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "City suggestion lookup failed");
                Vec::new()
            }
        }
    }
}

fn build_report(
    current: OwCurrentResponse,
    forecast: OwForecastResponse,
    place: Option<OwGeoPlace>,
) -> WeatherReport {
    let samples: Vec<ForecastSample> = forecast.list.into_iter().map(OwForecastEntry::into_sample).collect();

    WeatherReport {
        current: normalize_current(current, place),
        forecast: aggregate_daily(&samples, &Local),
    }
}

fn normalize_current(data: OwCurrentResponse, place: Option<OwGeoPlace>) -> WeatherSnapshot {
    let (place_name, place_country, region) = match place {
        Some(p) => (Some(p.name), Some(p.country), p.state),
        None => (None, None, None),
    };

    let city = place_name.filter(|n| !n.is_empty()).unwrap_or(data.name);
    let country = place_country
        .filter(|c| !c.is_empty())
        .or(data.sys.country)
        .unwrap_or_default();

    let (description, icon) = data
        .weather
        .into_iter()
        .next()
        .map(|w| (w.description, w.icon))
        .unwrap_or_else(|| ("Unknown".to_string(), String::new()));

    WeatherSnapshot {
        city,
        country,
        region: region.filter(|r| !r.is_empty()),
        coordinates: Coordinates::new(data.coord.lat, data.coord.lon),
        temperature: round_half_up(data.main.temp),
        feels_like: round_half_up(data.main.feels_like),
        temp_min: round_half_up(data.main.temp_min),
        temp_max: round_half_up(data.main.temp_max),
        humidity: data.main.humidity,
        pressure: data.main.pressure,
        wind_speed: data.wind.speed,
        wind_deg: data.wind.deg,
        wind_gust: data.wind.gust,
        description,
        icon,
        sunrise: data.sys.sunrise,
        sunset: data.sys.sunset,
        clouds: data.clouds.all,
        visibility: data.visibility,
        timestamp: data.dt,
        alerts: data.alerts.into_iter().map(OwAlert::into_alert).collect(),
    }
}

#[derive(Debug, Deserialize)]
struct OwErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: u8,
    pressure: u32,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    #[serde(default)]
    deg: u16,
    gust: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwClouds {
    #[serde(default)]
    all: u8,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: Option<String>,
    #[serde(default)]
    sunrise: i64,
    #[serde(default)]
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    name: String,
    coord: OwCoord,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    clouds: OwClouds,
    sys: OwSys,
    visibility: Option<u32>,
    #[serde(default)]
    alerts: Vec<OwAlert>,
}

#[derive(Debug, Deserialize)]
struct OwAlert {
    #[serde(default)]
    sender_name: String,
    #[serde(default)]
    event: String,
    #[serde(default)]
    start: i64,
    #[serde(default)]
    end: i64,
    #[serde(default)]
    description: String,
}

impl OwAlert {
    fn into_alert(self) -> WeatherAlert {
        WeatherAlert {
            sender: self.sender_name,
            event: self.event,
            start: self.start,
            end: self.end,
            description: self.description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastWind {
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwForecastClouds {
    #[serde(default)]
    all: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    weather: Vec<OwWeather>,
    wind: OwForecastWind,
    #[serde(default)]
    clouds: OwForecastClouds,
}

impl OwForecastEntry {
    fn into_sample(self) -> ForecastSample {
        let (description, icon) = self
            .weather
            .into_iter()
            .next()
            .map(|w| (w.description, w.icon))
            .unwrap_or_else(|| ("Unknown".to_string(), String::new()));

        ForecastSample {
            timestamp: self.dt,
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            humidity: self.main.humidity,
            pressure: self.main.pressure,
            wind_speed: self.wind.speed,
            clouds: self.clouds.all,
            icon,
            description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwGeoPlace {
    name: String,
    #[serde(default)]
    country: String,
    state: Option<String>,
    lat: f64,
    lon: f64,
}

impl OwGeoPlace {
    fn into_suggestion(self) -> CitySuggestion {
        CitySuggestion::new(
            self.name,
            self.state,
            self.country,
            Coordinates::new(self.lat, self.lon),
        )
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
