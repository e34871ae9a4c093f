//! Core library for the `weatherdash` dashboard.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The weather gateway (OpenWeather) and its normalized models
//! - Device location permission and position resolution
//! - The dashboard state store with persisted history, favorites and preferences
//! - Debounced city suggestions
//!
//! It is used by `weather-cli`, but can also be reused by other front ends.

pub mod config;
pub mod debounce;
pub mod error;
pub mod favorites;
pub mod forecast;
pub mod geolocation;
pub mod history;
pub mod model;
pub mod provider;
pub mod state;
pub mod storage;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use debounce::SuggestionDebouncer;
pub use error::{GeoError, WeatherError};
pub use favorites::FavoriteEntry;
pub use geolocation::{GeolocationCoordinator, LocationSource};
pub use model::{
    CitySuggestion, Coordinates, ForecastDay, PermissionStatus, Theme, Unit, WeatherAlert,
    WeatherReport, WeatherSnapshot,
};
pub use provider::WeatherProvider;
pub use state::AppState;
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use store::{Intent, Store, StoreSettings};
