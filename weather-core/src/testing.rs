//! Fakes shared by unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{collections::HashMap, time::Duration};

use crate::{
    error::WeatherError,
    model::{CitySuggestion, Coordinates, ForecastDay, Unit, WeatherReport, WeatherSnapshot},
    provider::{WeatherProvider, is_suggestible},
};

pub fn snapshot_for(city: &str) -> WeatherSnapshot {
    WeatherSnapshot {
        city: city.to_string(),
        country: "XX".to_string(),
        region: None,
        coordinates: Coordinates::new(0.0, 0.0),
        temperature: 20,
        feels_like: 19,
        temp_min: 15,
        temp_max: 24,
        humidity: 50,
        pressure: 1013,
        wind_speed: 3.0,
        wind_deg: 180,
        wind_gust: None,
        description: "clear sky".to_string(),
        icon: "01d".to_string(),
        sunrise: 1_714_537_000,
        sunset: 1_714_590_000,
        clouds: 0,
        visibility: Some(10_000),
        timestamp: 1_714_557_600,
        alerts: Vec::new(),
    }
}

pub fn report_for(city: &str) -> WeatherReport {
    let forecast = (0..6)
        .map(|i| ForecastDay {
            date: chrono::NaiveDate::from_ymd_opt(2024, 5, 1 + i).unwrap(),
            temp_max: 22,
            temp_min: 12,
            avg_temp: 17,
            feels_like: 16,
            icon: "02d".to_string(),
            description: "few clouds".to_string(),
            avg_humidity: 60,
            avg_wind_speed: 4,
            avg_pressure: 1012,
            avg_clouds: 20,
        })
        .collect();

    WeatherReport {
        current: snapshot_for(city),
        forecast,
    }
}

/// Scriptable provider that records every call.
#[derive(Debug, Default)]
pub struct MockProvider {
    calls: Mutex<Vec<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    failures: Mutex<HashMap<String, WeatherError>>,
    coordinates_city: Mutex<String>,
}

impl MockProvider {
    pub fn new() -> Self {
        let provider = Self::default();
        *provider.coordinates_city.lock() = "Here".to_string();
        provider
    }

    /// Delay responses for city `name`.
    pub fn delay(&self, name: &str, delay: Duration) {
        self.delays.lock().insert(name.to_string(), delay);
    }

    /// Fail lookups for city `name`.
    pub fn fail(&self, name: &str, error: WeatherError) {
        self.failures.lock().insert(name.to_string(), error);
    }

    /// City name reported for coordinate lookups.
    pub fn set_coordinates_city(&self, city: &str) {
        *self.coordinates_city.lock() = city.to_string();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl WeatherProvider for MockProvider {
    async fn fetch_by_city_name(&self, name: &str, unit: Unit) -> Result<WeatherReport, WeatherError> {
        self.record(format!("city:{name}:{unit}"));

        let delay = self.delays.lock().get(name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failures.lock().get(name).cloned();
        match failure {
            Some(err) => Err(err),
            None => Ok(report_for(name)),
        }
    }

    async fn fetch_by_coordinates(
        &self,
        coordinates: Coordinates,
        unit: Unit,
    ) -> Result<WeatherReport, WeatherError> {
        self.record(format!("coords:{coordinates}:{unit}"));

        let city = self.coordinates_city.lock().clone();
        let mut report = report_for(&city);
        report.current.coordinates = coordinates;
        Ok(report)
    }

    async fn suggest_cities(&self, query: &str, limit: usize) -> Vec<CitySuggestion> {
        if !is_suggestible(query) {
            return Vec::new();
        }
        self.record(format!("suggest:{query}"));

        let delay = self.delays.lock().get(query).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        (0..limit.min(2))
            .map(|i| {
                CitySuggestion::new(
                    format!("{query} {i}"),
                    None,
                    "XX".to_string(),
                    Coordinates::new(i as f64, i as f64),
                )
            })
            .collect()
    }
}
