use crate::{
    Config, Coordinates, Unit,
    error::WeatherError,
    model::{CitySuggestion, WeatherReport},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// Queries shorter than this never reach the network.
pub const MIN_SUGGESTION_QUERY_CHARS: usize = 2;

/// Default number of candidates returned by [`WeatherProvider::suggest_cities`].
pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;

/// Gateway to a weather provider. Owns all shaping of the upstream API.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Current conditions and daily forecast for a free-text city name.
    async fn fetch_by_city_name(&self, name: &str, unit: Unit) -> Result<WeatherReport, WeatherError>;

    /// Current conditions and daily forecast for a coordinate pair.
    async fn fetch_by_coordinates(
        &self,
        coordinates: Coordinates,
        unit: Unit,
    ) -> Result<WeatherReport, WeatherError>;

    /// Forward-geocode partial input. Never fails: errors yield an empty list.
    async fn suggest_cities(&self, query: &str, limit: usize) -> Vec<CitySuggestion>;
}

/// True when `query` is long enough to be worth a suggestion lookup.
pub fn is_suggestible(query: &str) -> bool {
    query.chars().count() >= MIN_SUGGESTION_QUERY_CHARS
}

/// Construct the provider described by the config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.api_key()?;

    let provider = OpenWeatherProvider::with_endpoints(
        api_key,
        &config.endpoints.weather_url,
        &config.endpoints.geo_url,
        config.http_timeout_secs,
    )?;

    Ok(Arc::new(provider))
}
