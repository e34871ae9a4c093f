use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, Select, Text};
use std::sync::Arc;
use weatherdash_core::{
    Config, Coordinates, GeolocationCoordinator, Intent, JsonFileStore, PermissionStatus, Store,
    StoreSettings, SuggestionDebouncer, Theme, Unit,
    debounce::DEFAULT_QUIET_PERIOD,
    geolocation::location_source_from_config,
    provider::{WeatherProvider, openweather::OpenWeatherProvider, provider_from_config},
};

use crate::{dashboard, render};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherdash", version, about = "Weather dashboard for the terminal")]
pub struct Cli {
    /// Log request and state detail to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the API key and defaults.
    Configure,

    /// Show weather for a city.
    Show {
        /// City name, e.g. "New York".
        city: String,

        /// Forecast page to show, starting at 1.
        #[arg(long, default_value_t = 1)]
        page: usize,
    },

    /// Show weather for the saved device location.
    Locate {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },

    /// Show weather for a coordinate pair.
    Coords {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,

        #[arg(allow_negative_numbers = true)]
        longitude: f64,

        #[arg(long, default_value_t = 1)]
        page: usize,
    },

    /// List cities matching partial input.
    Suggest { text: String },

    /// Type part of a name and pick a city from suggestions.
    Pick,

    /// Show or set the unit system.
    Unit { unit: Option<Unit> },

    /// Show or set the theme.
    Theme { theme: Option<Theme> },

    /// Recent searches.
    History {
        #[command(subcommand)]
        action: Option<HistoryCommand>,
    },

    /// Pinned cities.
    Favorites {
        #[command(subcommand)]
        action: Option<FavoritesCommand>,
    },

    /// Saved device location and consent.
    Location {
        #[command(subcommand)]
        action: Option<LocationCommand>,
    },

    /// Interactive dashboard.
    Dashboard,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    List,
    Remove { city: String },
    Clear,
}

#[derive(Debug, Subcommand)]
pub enum FavoritesCommand {
    List,
    /// Look up a city and pin it.
    Add { city: String },
    Remove { city: String },
    Clear,
}

#[derive(Debug, Subcommand)]
pub enum LocationCommand {
    Show,
    /// Save this machine's position.
    Set {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,

        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },
    /// Allow weatherdash to use the saved position.
    Allow,
    /// Block location lookups.
    Deny,
    /// Drop the saved position and consent.
    Forget,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Location { action } => location(action.unwrap_or(LocationCommand::Show)),
            Command::Show { city, page } => {
                let store = open_store(&Config::load()?, true)?;
                store.search(&city).await;
                print_report(&store, page).await
            }
            Command::Locate { page } => {
                let store = open_store(&Config::load()?, true)?;
                store.locate().await;
                print_report(&store, page).await
            }
            Command::Coords {
                latitude,
                longitude,
                page,
            } => {
                let store = open_store(&Config::load()?, true)?;
                store
                    .select_suggestion(Coordinates::new(latitude, longitude))
                    .await;
                print_report(&store, page).await
            }
            Command::Suggest { text } => {
                let store = open_store(&Config::load()?, true)?;
                let suggestions = store.suggest_cities(&text).await;
                if suggestions.is_empty() {
                    println!("No matching cities.");
                }
                for s in suggestions {
                    println!("{}  ({})", s.display_name, s.coordinates);
                }
                Ok(())
            }
            Command::Pick => {
                let store = open_store(&Config::load()?, true)?;
                let debouncer = SuggestionDebouncer::spawn(store.provider(), DEFAULT_QUIET_PERIOD);
                match dashboard::pick_city(&debouncer).await? {
                    Some(city) => {
                        store.select_suggestion(city.coordinates).await;
                        print_report(&store, 1).await
                    }
                    None => Ok(()),
                }
            }
            Command::Unit { unit } => {
                let store = open_store(&Config::load()?, false)?;
                if let Some(unit) = unit {
                    store.dispatch(Intent::ChangeUnit(unit)).await;
                }
                println!("{}", store.get_state().unit);
                Ok(())
            }
            Command::Theme { theme } => {
                let store = open_store(&Config::load()?, false)?;
                if let Some(theme) = theme {
                    store.dispatch(Intent::ChangeTheme(theme)).await;
                }
                println!("{}", store.get_state().theme);
                Ok(())
            }
            Command::History { action } => {
                let store = open_store(&Config::load()?, false)?;
                match action.unwrap_or(HistoryCommand::List) {
                    HistoryCommand::List => {}
                    HistoryCommand::Remove { city } => {
                        store.dispatch(Intent::RemoveFromHistory(city)).await
                    }
                    HistoryCommand::Clear => store.dispatch(Intent::ClearHistory).await,
                }
                print!("{}", render::history(&store.get_state().history));
                Ok(())
            }
            Command::Favorites { action } => {
                let action = action.unwrap_or(FavoritesCommand::List);
                let needs_network = matches!(action, FavoritesCommand::Add { .. });
                let store = open_store(&Config::load()?, needs_network)?;

                match action {
                    FavoritesCommand::List => {}
                    FavoritesCommand::Add { city } => {
                        store.search(&city).await;
                        if let Some(error) = store.get_state().error {
                            bail!(error);
                        }
                        store.dispatch(Intent::AddCurrentToFavorites).await;
                    }
                    FavoritesCommand::Remove { city } => {
                        store.dispatch(Intent::RemoveFromFavorites(city)).await
                    }
                    FavoritesCommand::Clear => store.dispatch(Intent::ClearFavorites).await,
                }

                print!("{}", render::favorites(store.get_state().favorites.as_slice()));
                Ok(())
            }
            Command::Dashboard => {
                let store = open_store(&Config::load()?, true)?;
                dashboard::run(store).await
            }
        }
    }
}

/// Wire the store to the configured provider, location and state file.
///
/// Commands that never reach the network may run without an API key.
fn open_store(config: &Config, needs_network: bool) -> Result<Store> {
    let provider: Arc<dyn WeatherProvider> = match provider_from_config(config) {
        Ok(provider) => provider,
        Err(e) if !needs_network => {
            tracing::debug!(error = %e, "No usable provider; running offline");
            Arc::new(OpenWeatherProvider::new(String::new()))
        }
        Err(e) => return Err(e),
    };

    let geolocation = GeolocationCoordinator::new(
        location_source_from_config(&config.location),
        config.geolocation_timeout(),
    );

    let path = Config::state_file_path()?;
    let storage = JsonFileStore::open(&path)
        .with_context(|| format!("Failed to open state file: {}", path.display()))?;

    Ok(Store::open(
        provider,
        geolocation,
        Arc::new(storage),
        StoreSettings::from(config),
    ))
}

/// Print the loaded report, or fail with the user-facing error.
async fn print_report(store: &Store, page: usize) -> Result<()> {
    store.set_page(page.saturating_sub(1)).await;
    let state = store.get_state();

    if let Some(error) = &state.error {
        bail!("{error}");
    }

    match &state.current_weather {
        Some(current) => {
            print!("{}", render::current_weather(current, state.unit));
            print!("{}", render::forecast_page(&state));
        }
        None if state.location_permission == PermissionStatus::Denied => {
            print!("{}", render::blocked(std::env::consts::OS));
        }
        None => println!("No weather loaded."),
    }

    Ok(())
}

fn configure() -> Result<()> {
    let path = Config::config_file_path()?;
    let mut cfg = Config::load_from(&path)?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()?;
    if !api_key.trim().is_empty() {
        cfg.set_api_key(api_key.trim().to_string());
    }

    let current_city = cfg.default_city.clone();
    cfg.default_city = Text::new("Default city:")
        .with_default(&current_city)
        .prompt()?;

    let units = Unit::all().to_vec();
    let start = units.iter().position(|u| *u == cfg.default_unit).unwrap_or(0);
    cfg.default_unit = Select::new("Default units:", units)
        .with_starting_cursor(start)
        .prompt()?;

    cfg.save_to(&path)?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

fn location(action: LocationCommand) -> Result<()> {
    let path = Config::config_file_path()?;
    let mut cfg = Config::load_from(&path)?;

    match action {
        LocationCommand::Show => {
            match cfg.location.coordinates() {
                Some(c) => println!("Position: {c}"),
                None => println!("Position: not set"),
            }
            println!("Permission: {}", cfg.location.permission);
            return Ok(());
        }
        LocationCommand::Set {
            latitude,
            longitude,
        } => {
            if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                bail!("Coordinates out of range: {latitude}, {longitude}");
            }
            cfg.location.latitude = Some(latitude);
            cfg.location.longitude = Some(longitude);
        }
        LocationCommand::Allow => cfg.location.permission = PermissionStatus::Granted,
        LocationCommand::Deny => cfg.location.permission = PermissionStatus::Denied,
        LocationCommand::Forget => {
            cfg.location.latitude = None;
            cfg.location.longitude = None;
            cfg.location.permission = PermissionStatus::Prompt;
        }
    }

    cfg.save_to(&path)?;
    println!("Location updated: {}", cfg.location.permission);
    Ok(())
}
