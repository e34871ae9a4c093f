//! Dashboard state and its pure transition function.
//!
//! [`AppState::reduce`] is the only place the state changes. It never touches
//! the network or storage; instead it reports which persisted cache changed so
//! the caller can write it out.

use crate::{
    favorites::{FavoriteEntry, Favorites},
    history::SearchHistory,
    model::{ForecastDay, PermissionStatus, Theme, Unit, WeatherReport, WeatherSnapshot},
    storage::{FAVORITES_KEY, HISTORY_KEY, KeyValueStore, THEME_KEY, UNIT_KEY},
};

/// Forecast days shown per page.
pub const ITEMS_PER_PAGE: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub current_weather: Option<WeatherSnapshot>,
    pub forecast: Vec<ForecastDay>,
    pub loading: bool,
    pub error: Option<String>,
    pub history: SearchHistory,
    pub favorites: Favorites,
    pub unit: Unit,
    pub theme: Theme,
    pub current_page: usize,
    pub items_per_page: usize,
    pub location_permission: PermissionStatus,
    /// Generation of the most recently started weather fetch.
    fetch_generation: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            current_weather: None,
            forecast: Vec::new(),
            loading: false,
            error: None,
            history: SearchHistory::new(),
            favorites: Favorites::new(),
            unit: Unit::default(),
            theme: Theme::default(),
            current_page: 0,
            items_per_page: ITEMS_PER_PAGE,
            location_permission: PermissionStatus::Prompt,
            fetch_generation: 0,
        }
    }
}

/// A discrete state transition.
#[derive(Debug, Clone)]
pub enum Action {
    /// A weather fetch tagged `generation` has been issued.
    FetchStart { generation: u64 },
    /// Fetch completed. `history` is recorded alongside when present.
    FetchSuccess {
        generation: u64,
        report: Box<WeatherReport>,
        history: Option<String>,
    },
    /// A failure message. `generation` ties it to a fetch; `None` leaves `loading` alone.
    FetchError {
        generation: Option<u64>,
        message: String,
    },
    /// Location permission was denied during fetch `generation`.
    LocationBlocked { generation: u64 },
    AddToHistory(String),
    RemoveFromHistory(String),
    ClearHistory,
    AddToFavorites(FavoriteEntry),
    RemoveFromFavorites(String),
    ClearFavorites,
    SetUnit(Unit),
    SetTheme(Theme),
    SetPage(usize),
    ClearError,
    SetLocationPermission(PermissionStatus),
}

/// Persisted cache touched by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persist {
    History,
    Favorites,
    Theme,
    Unit,
}

impl AppState {
    /// Build the startup state from durable storage, falling back to defaults
    /// for anything missing or unreadable.
    pub fn load(storage: &dyn KeyValueStore, default_unit: Unit) -> Self {
        let history: SearchHistory = read_json::<Vec<String>>(storage, HISTORY_KEY)
            .map(SearchHistory::from)
            .unwrap_or_default();

        let favorites: Favorites = read_json::<Vec<FavoriteEntry>>(storage, FAVORITES_KEY)
            .map(Favorites::from)
            .unwrap_or_default();

        let theme = read_raw(storage, THEME_KEY)
            .and_then(|raw| parse_or_warn(THEME_KEY, &raw))
            .unwrap_or_default();

        let unit = read_raw(storage, UNIT_KEY)
            .and_then(|raw| parse_or_warn(UNIT_KEY, &raw))
            .unwrap_or(default_unit);

        tracing::debug!(
            history = history.len(),
            favorites = favorites.len(),
            theme = %theme,
            unit = %unit,
            "Loaded persisted dashboard state"
        );

        Self {
            history,
            favorites,
            theme,
            unit,
            ..Self::default()
        }
    }

    /// Apply `action`. Returns the persisted cache that changed, if any.
    pub fn reduce(&mut self, action: Action) -> Option<Persist> {
        match action {
            Action::FetchStart { generation } => {
                self.fetch_generation = generation;
                self.loading = true;
                self.error = None;
                None
            }

            Action::FetchSuccess { generation, report, history } => {
                if !self.is_latest(generation) {
                    tracing::debug!(generation, latest = self.fetch_generation, "Discarding stale weather result");
                    return None;
                }
                let WeatherReport { current, forecast } = *report;
                self.loading = false;
                self.error = None;
                self.current_weather = Some(current);
                self.forecast = forecast;
                self.current_page = 0;

                let city = history.filter(|c| !c.trim().is_empty())?;
                self.history.push(city);
                Some(Persist::History)
            }

            Action::FetchError { generation, message } => {
                match generation {
                    Some(g) if !self.is_latest(g) => {
                        tracing::debug!(generation = g, "Discarding stale weather error");
                        return None;
                    }
                    Some(_) => self.loading = false,
                    None => {}
                }
                self.error = Some(message);
                None
            }

            Action::LocationBlocked { generation } => {
                if !self.is_latest(generation) {
                    return None;
                }
                self.loading = false;
                self.error = None;
                self.current_weather = None;
                self.forecast.clear();
                self.current_page = 0;
                self.location_permission = PermissionStatus::Denied;
                None
            }

            Action::AddToHistory(city) => {
                self.history.push(city);
                Some(Persist::History)
            }

            Action::RemoveFromHistory(city) => {
                self.history.remove(&city);
                Some(Persist::History)
            }

            Action::ClearHistory => {
                self.history.clear();
                Some(Persist::History)
            }

            Action::AddToFavorites(entry) => {
                self.favorites.add(entry).then_some(Persist::Favorites)
            }

            Action::RemoveFromFavorites(city) => {
                self.favorites.remove(&city);
                Some(Persist::Favorites)
            }

            Action::ClearFavorites => {
                self.favorites.clear();
                Some(Persist::Favorites)
            }

            Action::SetUnit(unit) => {
                self.unit = unit;
                Some(Persist::Unit)
            }

            Action::SetTheme(theme) => {
                self.theme = theme;
                Some(Persist::Theme)
            }

            Action::SetPage(page) => {
                self.current_page = page.min(self.last_page());
                None
            }

            Action::ClearError => {
                self.error = None;
                None
            }

            Action::SetLocationPermission(status) => {
                self.location_permission = status;
                None
            }
        }
    }

    /// Serialized value for the cache `which`, as written to storage.
    pub fn persisted_value(&self, which: Persist) -> (&'static str, String) {
        match which {
            Persist::History => (
                HISTORY_KEY,
                serde_json::to_string(self.history.as_slice()).unwrap_or_else(|_| "[]".to_string()),
            ),
            Persist::Favorites => (
                FAVORITES_KEY,
                serde_json::to_string(self.favorites.as_slice()).unwrap_or_else(|_| "[]".to_string()),
            ),
            Persist::Theme => (THEME_KEY, self.theme.as_str().to_string()),
            Persist::Unit => (UNIT_KEY, self.unit.as_str().to_string()),
        }
    }

    fn is_latest(&self, generation: u64) -> bool {
        generation == self.fetch_generation
    }

    pub fn is_favorite(&self, city: &str) -> bool {
        self.favorites.contains(city)
    }

    pub fn page_count(&self) -> usize {
        self.forecast.len().div_ceil(self.items_per_page.max(1))
    }

    /// Highest valid page index; 0 when there is no forecast.
    pub fn last_page(&self) -> usize {
        self.page_count().saturating_sub(1)
    }

    /// Forecast days on the current page.
    pub fn visible_forecast(&self) -> &[ForecastDay] {
        let per_page = self.items_per_page.max(1);
        let start = (self.current_page * per_page).min(self.forecast.len());
        let end = (start + per_page).min(self.forecast.len());
        &self.forecast[start..end]
    }

    pub fn has_next_page(&self) -> bool {
        self.current_page < self.last_page()
    }

    pub fn has_previous_page(&self) -> bool {
        self.current_page > 0
    }
}

fn read_raw(storage: &dyn KeyValueStore, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read persisted value; using default");
            None
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(storage: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = read_raw(storage, key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring malformed persisted value");
            None
        }
    }
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring malformed persisted value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::MemoryStore,
        testing::{report_for, snapshot_for},
    };
    use chrono::NaiveDate;

    fn days(n: usize) -> Vec<ForecastDay> {
        (0..n)
            .map(|i| ForecastDay {
                date: NaiveDate::from_ymd_opt(2024, 5, 1 + i as u32).unwrap(),
                temp_max: 20,
                temp_min: 10,
                avg_temp: 15,
                feels_like: 15,
                icon: "01d".into(),
                description: "clear".into(),
                avg_humidity: 50,
                avg_wind_speed: 3,
                avg_pressure: 1013,
                avg_clouds: 0,
            })
            .collect()
    }

    fn success(state: &mut AppState, generation: u64, city: &str) -> Option<Persist> {
        state.reduce(Action::FetchSuccess {
            generation,
            report: Box::new(report_for(city)),
            history: Some(city.to_string()),
        })
    }

    #[test]
    fn fetch_start_sets_loading_and_clears_error() {
        let mut state = AppState {
            error: Some("boom".into()),
            ..AppState::default()
        };

        state.reduce(Action::FetchStart { generation: 1 });

        assert!(state.loading);
        assert_eq!(state.error, None);
    }

    #[test]
    fn success_replaces_weather_resets_page_and_records_history() {
        let mut state = AppState::default();
        state.forecast = days(10);
        state.current_page = 1;

        state.reduce(Action::FetchStart { generation: 1 });
        let persist = success(&mut state, 1, "Paris");

        assert_eq!(persist, Some(Persist::History));
        assert!(!state.loading);
        assert_eq!(state.current_weather.as_ref().unwrap().city, "Paris");
        assert_eq!(state.current_page, 0);
        assert_eq!(state.history.as_slice(), ["Paris"]);
    }

    #[test]
    fn error_keeps_stale_weather_visible() {
        let mut state = AppState::default();
        state.reduce(Action::FetchStart { generation: 1 });
        success(&mut state, 1, "Paris");

        state.reduce(Action::FetchStart { generation: 2 });
        state.reduce(Action::FetchError {
            generation: Some(2),
            message: "City not found.".into(),
        });

        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("City not found."));
        assert_eq!(state.current_weather.as_ref().unwrap().city, "Paris");
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut state = AppState::default();
        state.reduce(Action::FetchStart { generation: 1 });
        state.reduce(Action::FetchStart { generation: 2 });

        assert_eq!(success(&mut state, 2, "Fresh"), Some(Persist::History));
        assert_eq!(success(&mut state, 1, "Stale"), None);
        state.reduce(Action::FetchError {
            generation: Some(1),
            message: "late failure".into(),
        });

        assert_eq!(state.current_weather.as_ref().unwrap().city, "Fresh");
        assert_eq!(state.error, None);
        assert_eq!(state.history.as_slice(), ["Fresh"]);
    }

    #[test]
    fn untagged_error_leaves_loading_alone() {
        let mut state = AppState::default();
        state.reduce(Action::FetchStart { generation: 1 });
        state.reduce(Action::FetchError {
            generation: None,
            message: "unsupported".into(),
        });

        assert!(state.loading);
        assert_eq!(state.error.as_deref(), Some("unsupported"));
    }

    #[test]
    fn location_blocked_clears_weather_without_error() {
        let mut state = AppState::default();
        state.reduce(Action::FetchStart { generation: 1 });
        success(&mut state, 1, "Paris");

        state.reduce(Action::FetchStart { generation: 2 });
        state.reduce(Action::LocationBlocked { generation: 2 });

        assert_eq!(state.current_weather, None);
        assert!(state.forecast.is_empty());
        assert_eq!(state.error, None);
        assert!(!state.loading);
        assert_eq!(state.location_permission, PermissionStatus::Denied);
    }

    #[test]
    fn success_without_city_name_skips_history() {
        let mut state = AppState::default();
        state.reduce(Action::FetchStart { generation: 1 });
        let persist = state.reduce(Action::FetchSuccess {
            generation: 1,
            report: Box::new(report_for("")),
            history: Some(String::new()),
        });

        assert_eq!(persist, None);
        assert!(state.history.is_empty());
        assert!(state.current_weather.is_some());
    }

    #[test]
    fn favorites_add_twice_persists_once() {
        let mut state = AppState::default();
        let entry = FavoriteEntry::from_snapshot(&snapshot_for("Rome"), Unit::Metric);

        assert_eq!(state.reduce(Action::AddToFavorites(entry.clone())), Some(Persist::Favorites));
        assert_eq!(state.reduce(Action::AddToFavorites(entry)), None);
        assert_eq!(state.favorites.len(), 1);
        assert!(state.is_favorite("Rome"));

        state.reduce(Action::RemoveFromFavorites("Nowhere".into()));
        assert_eq!(state.favorites.len(), 1);
    }

    #[test]
    fn pagination_six_days_page_size_five() {
        let mut state = AppState {
            forecast: days(6),
            ..AppState::default()
        };

        assert_eq!(state.page_count(), 2);
        assert_eq!(state.visible_forecast().len(), 5);
        assert_eq!(state.visible_forecast()[0].date, state.forecast[0].date);

        state.reduce(Action::SetPage(1));
        assert_eq!(state.visible_forecast().len(), 1);
        assert_eq!(state.visible_forecast()[0].date, state.forecast[5].date);
        assert!(!state.has_next_page());
        assert!(state.has_previous_page());
    }

    #[test]
    fn set_page_clamps_to_last_page() {
        let mut state = AppState {
            forecast: days(6),
            ..AppState::default()
        };

        state.reduce(Action::SetPage(42));
        assert_eq!(state.current_page, 1);

        let mut empty = AppState::default();
        empty.reduce(Action::SetPage(3));
        assert_eq!(empty.current_page, 0);
        assert!(empty.visible_forecast().is_empty());
    }

    #[test]
    fn clear_error_is_idempotent() {
        let mut state = AppState::default();
        state.reduce(Action::ClearError);
        state.error = Some("x".into());
        state.reduce(Action::ClearError);
        state.reduce(Action::ClearError);
        assert_eq!(state.error, None);
    }

    #[test]
    fn load_falls_back_on_malformed_values() {
        let storage = MemoryStore::new();
        storage.set(HISTORY_KEY, "not json").unwrap();
        storage.set(THEME_KEY, "sepia").unwrap();
        storage.set(UNIT_KEY, "imperial").unwrap();

        let state = AppState::load(&storage, Unit::Metric);

        assert!(state.history.is_empty());
        assert_eq!(state.theme, Theme::Light);
        assert_eq!(state.unit, Unit::Imperial);
        assert_eq!(state.location_permission, PermissionStatus::Prompt);
    }

    #[test]
    fn persisted_values_round_trip_through_load() {
        let mut state = AppState::default();
        state.reduce(Action::AddToHistory("Oslo".into()));
        state.reduce(Action::SetTheme(Theme::Dark));
        state.reduce(Action::AddToFavorites(FavoriteEntry::from_snapshot(
            &snapshot_for("Oslo"),
            Unit::Metric,
        )));

        let storage = MemoryStore::new();
        for which in [Persist::History, Persist::Favorites, Persist::Theme, Persist::Unit] {
            let (key, value) = state.persisted_value(which);
            storage.set(key, &value).unwrap();
        }

        let loaded = AppState::load(&storage, Unit::Imperial);
        assert_eq!(loaded.history, state.history);
        assert_eq!(loaded.favorites, state.favorites);
        assert_eq!(loaded.theme, Theme::Dark);
        assert_eq!(loaded.unit, Unit::Metric);
    }
}
