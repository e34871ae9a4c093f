//! Closed error taxonomies raised by the gateway, the geolocation coordinator
//! and the persistence layer. Display text is safe to show to end users.

use thiserror::Error;

const DEFAULT_UNKNOWN_MESSAGE: &str = "An unexpected error occurred.";

/// Failures surfaced by [`crate::WeatherProvider`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error("Invalid request. Please check the city name.")]
    InvalidRequest,

    #[error("Invalid API key. Please check your API key.")]
    AuthError,

    #[error("City not found. Please check the city name and try again.")]
    CityNotFound,

    #[error("Too many requests. Please wait a moment and try again.")]
    RateLimited,

    #[error("Server error. Please try again later.")]
    ServerError,

    #[error("Network error. Please check your internet connection.")]
    NetworkError,

    #[error("{0}")]
    UnknownError(String),
}

impl WeatherError {
    /// Map an upstream HTTP status (and optional provider message) into the taxonomy.
    pub fn from_status(status: u16, provider_message: Option<&str>) -> Self {
        match status {
            400 => WeatherError::InvalidRequest,
            401 => WeatherError::AuthError,
            404 => WeatherError::CityNotFound,
            429 => WeatherError::RateLimited,
            500..=599 => WeatherError::ServerError,
            _ => WeatherError::UnknownError(
                provider_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or(DEFAULT_UNKNOWN_MESSAGE)
                    .to_string(),
            ),
        }
    }

    pub fn unknown() -> Self {
        WeatherError::UnknownError(DEFAULT_UNKNOWN_MESSAGE.to_string())
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return WeatherError::from_status(status.as_u16(), None);
        }
        if err.is_decode() || err.is_builder() {
            return WeatherError::unknown();
        }
        WeatherError::NetworkError
    }
}

/// One-shot position failures from [`crate::GeolocationCoordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeoError {
    #[error("Location access is blocked.")]
    Denied,

    #[error("Location information is unavailable. Please search for a city manually.")]
    Unavailable,

    #[error("Location request timed out. Please search for a city manually.")]
    Timeout,

    #[error("Geolocation is not supported on this device. Please search for a city manually.")]
    Unsupported,

    #[error("Unable to retrieve your location. Please search for a city manually.")]
    Unknown,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Returned when parsing a unit, theme or permission string fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} '{value}'. Supported values: {supported}.")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
    pub supported: String,
}
