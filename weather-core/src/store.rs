//! The application state store.
//!
//! A [`Store`] owns the dashboard state. Intents run their asynchronous part
//! (gateway calls, geolocation) on the caller's task and submit [`Action`]s to
//! a single reducer task, which applies them one at a time, writes any changed
//! cache to storage and publishes the new state to subscribers.

use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    config::Config,
    error::GeoError,
    favorites::FavoriteEntry,
    geolocation::GeolocationCoordinator,
    model::{CitySuggestion, Coordinates, PermissionStatus, Theme, Unit},
    provider::{DEFAULT_SUGGESTION_LIMIT, WeatherProvider},
    state::{Action, AppState},
    storage::KeyValueStore,
};

/// Named requests accepted by [`Store::dispatch`].
#[derive(Debug, Clone)]
pub enum Intent {
    Search(String),
    Locate,
    SelectSuggestion(Coordinates),
    ChangeUnit(Unit),
    ChangeTheme(Theme),
    SetPage(usize),
    AddToHistory(String),
    RemoveFromHistory(String),
    ClearHistory,
    AddToFavorites(FavoriteEntry),
    AddCurrentToFavorites,
    ToggleFavorite,
    RemoveFromFavorites(String),
    ClearFavorites,
    ClearError,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Shown when location is blocked or unavailable at startup.
    pub default_city: String,
    /// Unit used when none has been persisted yet.
    pub default_unit: Unit,
    /// Bound on the whole "use my location" attempt in [`Store::initialize`].
    pub startup_location_timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            default_city: "London".to_string(),
            default_unit: Unit::Metric,
            startup_location_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&Config> for StoreSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_city: config.default_city.clone(),
            default_unit: config.default_unit,
            startup_location_timeout: config.startup_location_timeout(),
        }
    }
}

type Envelope = (Action, oneshot::Sender<()>);

/// Handle to the dashboard state. Cheap to clone; all clones share one state.
#[derive(Debug, Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    actions: mpsc::UnboundedSender<Envelope>,
    state: watch::Receiver<AppState>,
    provider: Arc<dyn WeatherProvider>,
    geolocation: GeolocationCoordinator,
    settings: StoreSettings,
    /// Last issued fetch generation. Held while enqueueing `FetchStart`
    /// so generations reach the reducer in increasing order.
    generation: Mutex<u64>,
    permission_listener: Option<JoinHandle<()>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.permission_listener.take() {
            handle.abort();
        }
    }
}

impl Store {
    /// Load persisted state and start the reducer. Must be called inside a tokio runtime.
    pub fn open(
        provider: Arc<dyn WeatherProvider>,
        geolocation: GeolocationCoordinator,
        storage: Arc<dyn KeyValueStore>,
        settings: StoreSettings,
    ) -> Self {
        let initial = AppState::load(storage.as_ref(), settings.default_unit);
        let (state_tx, state_rx) = watch::channel(initial);
        let (actions, action_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_reducer(action_rx, state_tx, storage));
        spawn_permission_forwarder(&geolocation, &actions);
        let permission_listener = geolocation.spawn_change_listener();

        Self {
            inner: Arc::new(Inner {
                actions,
                state: state_rx,
                provider,
                geolocation,
                settings,
                generation: Mutex::new(0),
                permission_listener,
            }),
        }
    }

    /// Snapshot of the current state.
    pub fn get_state(&self) -> AppState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that is notified after every applied transition.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.inner.state.clone()
    }

    pub fn provider(&self) -> Arc<dyn WeatherProvider> {
        Arc::clone(&self.inner.provider)
    }

    /// Run `intent` to completion.
    pub async fn dispatch(&self, intent: Intent) {
        tracing::debug!(?intent, "Dispatching intent");
        match intent {
            Intent::Search(city) => self.search(&city).await,
            Intent::Locate => self.locate().await,
            Intent::SelectSuggestion(coordinates) => self.select_suggestion(coordinates).await,
            Intent::ChangeUnit(unit) => self.change_unit(unit).await,
            Intent::ChangeTheme(theme) => self.change_theme(theme).await,
            Intent::SetPage(page) => self.set_page(page).await,
            Intent::AddToHistory(city) => self.add_to_history(city).await,
            Intent::RemoveFromHistory(city) => self.remove_from_history(city).await,
            Intent::ClearHistory => self.clear_history().await,
            Intent::AddToFavorites(entry) => self.add_to_favorites(entry).await,
            Intent::AddCurrentToFavorites => {
                self.add_current_to_favorites().await;
            }
            Intent::ToggleFavorite => {
                self.toggle_favorite().await;
            }
            Intent::RemoveFromFavorites(city) => self.remove_from_favorites(city).await,
            Intent::ClearFavorites => self.clear_favorites().await,
            Intent::ClearError => self.clear_error().await,
        }
    }

    /// Look up weather for a city name. Blank input is ignored.
    pub async fn search(&self, city: &str) {
        let city = city.trim();
        if city.is_empty() {
            tracing::debug!("Ignoring empty search");
            return;
        }

        let unit = self.inner.state.borrow().unit;
        let generation = self.begin_fetch().await;
        tracing::info!(city, %unit, generation, "Searching weather");

        let action = match self.inner.provider.fetch_by_city_name(city, unit).await {
            Ok(report) => Action::FetchSuccess {
                generation,
                report: Box::new(report),
                history: Some(city.to_string()),
            },
            Err(e) => {
                tracing::warn!(city, error = %e, "Weather search failed");
                Action::FetchError {
                    generation: Some(generation),
                    message: e.to_string(),
                }
            }
        };

        self.apply(action).await;
    }

    /// Show weather for the device's current position.
    pub async fn locate(&self) {
        let geolocation = &self.inner.geolocation;

        if !geolocation.is_supported() {
            tracing::info!("Geolocation unsupported");
            self.apply(Action::FetchError {
                generation: None,
                message: GeoError::Unsupported.to_string(),
            })
            .await;
            self.apply(Action::SetLocationPermission(PermissionStatus::Unsupported))
                .await;
            return;
        }

        let generation = self.begin_fetch().await;

        let status = geolocation.check_status().await;
        self.apply(Action::SetLocationPermission(status)).await;

        if status == PermissionStatus::Denied {
            tracing::info!("Location permission denied");
            self.apply(Action::LocationBlocked { generation }).await;
            return;
        }

        match geolocation.resolve_current_position().await {
            Ok(coordinates) => self.fetch_coordinates(generation, coordinates).await,
            Err(GeoError::Denied) => {
                tracing::info!("Location permission denied during position request");
                self.apply(Action::LocationBlocked { generation }).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not resolve device position");
                self.apply(Action::FetchError {
                    generation: Some(generation),
                    message: e.to_string(),
                })
                .await;
            }
        }
    }

    /// Show weather for coordinates the user picked. Skips permission checks.
    pub async fn select_suggestion(&self, coordinates: Coordinates) {
        let generation = self.begin_fetch().await;
        self.fetch_coordinates(generation, coordinates).await;
    }

    /// Persist `unit` and re-fetch the loaded city under it.
    pub async fn change_unit(&self, unit: Unit) {
        self.apply(Action::SetUnit(unit)).await;

        let city = self
            .inner
            .state
            .borrow()
            .current_weather
            .as_ref()
            .map(|w| w.city.clone());

        if let Some(city) = city {
            self.search(&city).await;
        }
    }

    pub async fn change_theme(&self, theme: Theme) {
        self.apply(Action::SetTheme(theme)).await;
    }

    /// Select a forecast page; out-of-range pages land on the last page.
    pub async fn set_page(&self, page: usize) {
        self.apply(Action::SetPage(page)).await;
    }

    pub async fn next_page(&self) {
        let page = self.inner.state.borrow().current_page + 1;
        self.set_page(page).await;
    }

    pub async fn previous_page(&self) {
        let page = self.inner.state.borrow().current_page.saturating_sub(1);
        self.set_page(page).await;
    }

    pub async fn add_to_history(&self, city: String) {
        self.apply(Action::AddToHistory(city)).await;
    }

    pub async fn remove_from_history(&self, city: String) {
        self.apply(Action::RemoveFromHistory(city)).await;
    }

    pub async fn clear_history(&self) {
        self.apply(Action::ClearHistory).await;
    }

    pub async fn add_to_favorites(&self, entry: FavoriteEntry) {
        self.apply(Action::AddToFavorites(entry)).await;
    }

    /// Pin the loaded city. Returns `false` when nothing is loaded.
    pub async fn add_current_to_favorites(&self) -> bool {
        let entry = {
            let state = self.inner.state.borrow();
            state
                .current_weather
                .as_ref()
                .map(|w| FavoriteEntry::from_snapshot(w, state.unit))
        };

        match entry {
            Some(entry) => {
                self.add_to_favorites(entry).await;
                true
            }
            None => false,
        }
    }

    /// Pin or unpin the loaded city. Returns whether it is a favorite afterwards.
    pub async fn toggle_favorite(&self) -> bool {
        let city = self
            .inner
            .state
            .borrow()
            .current_weather
            .as_ref()
            .map(|w| w.city.clone());

        let Some(city) = city else {
            return false;
        };

        if self.inner.state.borrow().is_favorite(&city) {
            self.remove_from_favorites(city).await;
            false
        } else {
            self.add_current_to_favorites().await
        }
    }

    pub async fn remove_from_favorites(&self, city: String) {
        self.apply(Action::RemoveFromFavorites(city)).await;
    }

    pub async fn clear_favorites(&self) {
        self.apply(Action::ClearFavorites).await;
    }

    pub async fn clear_error(&self) {
        self.apply(Action::ClearError).await;
    }

    /// City candidates for partial input. Never fails.
    pub async fn suggest_cities(&self, query: &str) -> Vec<CitySuggestion> {
        self.inner
            .provider
            .suggest_cities(query, DEFAULT_SUGGESTION_LIMIT)
            .await
    }

    /// Startup flow: try the device location, fall back to the default city
    /// when location is blocked, fails, or takes too long.
    pub async fn initialize(&self) {
        let default_city = self.inner.settings.default_city.clone();

        let status = self.inner.geolocation.check_status().await;
        self.apply(Action::SetLocationPermission(status)).await;

        if status == PermissionStatus::Denied {
            tracing::info!(city = %default_city, "Location denied; showing default city");
            self.search(&default_city).await;
            return;
        }

        let timeout = self.inner.settings.startup_location_timeout;
        let finished = tokio::time::timeout(timeout, self.locate()).await.is_ok();
        let has_weather = self.inner.state.borrow().current_weather.is_some();

        if !finished || !has_weather {
            tracing::info!(city = %default_city, finished, "Using default city");
            self.search(&default_city).await;
        }
    }

    async fn fetch_coordinates(&self, generation: u64, coordinates: Coordinates) {
        let unit = self.inner.state.borrow().unit;
        tracing::info!(%coordinates, %unit, generation, "Fetching weather for coordinates");

        let action = match self
            .inner
            .provider
            .fetch_by_coordinates(coordinates, unit)
            .await
        {
            Ok(report) => {
                let city = report.current.city.clone();
                Action::FetchSuccess {
                    generation,
                    report: Box::new(report),
                    history: Some(city),
                }
            }
            Err(e) => {
                tracing::warn!(%coordinates, error = %e, "Coordinate lookup failed");
                Action::FetchError {
                    generation: Some(generation),
                    message: e.to_string(),
                }
            }
        };

        self.apply(action).await;
    }

    /// Issue the next fetch generation and mark loading.
    async fn begin_fetch(&self) -> u64 {
        let (ack, done) = oneshot::channel();
        let generation = {
            let mut last = self.inner.generation.lock();
            *last += 1;
            let generation = *last;
            if self
                .inner
                .actions
                .send((Action::FetchStart { generation }, ack))
                .is_err()
            {
                tracing::warn!("State reducer has stopped; dropping fetch start");
            }
            generation
        };
        let _ = done.await;
        generation
    }

    /// Submit `action` and wait until the reducer has applied it.
    async fn apply(&self, action: Action) {
        let (ack, done) = oneshot::channel();
        if self.inner.actions.send((action, ack)).is_err() {
            tracing::warn!("State reducer has stopped; dropping action");
            return;
        }
        let _ = done.await;
    }
}

/// Single consumer of the action queue and sole writer of persisted state.
async fn run_reducer(
    mut actions: mpsc::UnboundedReceiver<Envelope>,
    state: watch::Sender<AppState>,
    storage: Arc<dyn KeyValueStore>,
) {
    while let Some((action, ack)) = actions.recv().await {
        let mut persist = None;
        state.send_modify(|s| persist = s.reduce(action));

        if let Some(which) = persist {
            let (key, value) = state.borrow().persisted_value(which);
            if let Err(e) = storage.set(key, &value) {
                tracing::warn!(key, error = %e, "Failed to persist dashboard state");
            }
        }

        let _ = ack.send(());
    }
    tracing::debug!("State reducer stopped");
}

/// Mirror published permission changes into the state.
fn spawn_permission_forwarder(
    geolocation: &GeolocationCoordinator,
    actions: &mpsc::UnboundedSender<Envelope>,
) {
    let mut statuses = geolocation.subscribe();
    let actions = actions.downgrade();

    tokio::spawn(async move {
        while statuses.changed().await.is_ok() {
            let status = *statuses.borrow_and_update();
            let Some(actions) = actions.upgrade() else {
                break;
            };
            let (ack, _) = oneshot::channel();
            if actions
                .send((Action::SetLocationPermission(status), ack))
                .is_err()
            {
                break;
            }
        }
    });
}
