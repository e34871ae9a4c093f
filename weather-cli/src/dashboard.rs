//! Interactive dashboard session.

use anyhow::Result;
use inquire::{InquireError, Select, Text};
use std::{fmt, time::Duration};
use weatherdash_core::{
    AppState, CitySuggestion, Store, SuggestionDebouncer, debounce::DEFAULT_QUIET_PERIOD,
    provider::is_suggestible,
};

use crate::render;

/// Longest we wait for suggestions after the quiet period has passed.
const SUGGESTION_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
enum MenuItem {
    Search,
    Suggest,
    Locate,
    Recent,
    RemoveRecent,
    ClearRecent,
    ToggleFavorite { pinned: bool },
    OpenFavorite,
    RemoveFavorite,
    ClearFavorites,
    NextPage,
    PreviousPage,
    ToggleUnit,
    ToggleTheme,
    DismissError,
    Quit,
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuItem::Search => "Search a city",
            MenuItem::Suggest => "Find a city (suggestions)",
            MenuItem::Locate => "Use my location",
            MenuItem::Recent => "Open a recent search",
            MenuItem::RemoveRecent => "Remove a recent search",
            MenuItem::ClearRecent => "Clear recent searches",
            MenuItem::ToggleFavorite { pinned: true } => "Remove from favorites",
            MenuItem::ToggleFavorite { pinned: false } => "Add to favorites",
            MenuItem::OpenFavorite => "Open a favorite",
            MenuItem::RemoveFavorite => "Remove a favorite",
            MenuItem::ClearFavorites => "Clear favorites",
            MenuItem::NextPage => "Next forecast page",
            MenuItem::PreviousPage => "Previous forecast page",
            MenuItem::ToggleUnit => "Switch units",
            MenuItem::ToggleTheme => "Switch theme",
            MenuItem::DismissError => "Dismiss error",
            MenuItem::Quit => "Quit",
        };
        f.write_str(label)
    }
}

/// Menu entries that make sense for `state`.
fn menu(state: &AppState) -> Vec<MenuItem> {
    let mut items = vec![MenuItem::Search, MenuItem::Suggest, MenuItem::Locate];

    if let Some(current) = &state.current_weather {
        items.push(MenuItem::ToggleFavorite {
            pinned: state.is_favorite(&current.city),
        });
    }
    if state.has_next_page() {
        items.push(MenuItem::NextPage);
    }
    if state.has_previous_page() {
        items.push(MenuItem::PreviousPage);
    }
    if !state.history.is_empty() {
        items.extend([MenuItem::Recent, MenuItem::RemoveRecent, MenuItem::ClearRecent]);
    }
    if !state.favorites.is_empty() {
        items.extend([
            MenuItem::OpenFavorite,
            MenuItem::RemoveFavorite,
            MenuItem::ClearFavorites,
        ]);
    }
    if state.error.is_some() {
        items.push(MenuItem::DismissError);
    }

    items.extend([MenuItem::ToggleUnit, MenuItem::ToggleTheme, MenuItem::Quit]);
    items
}

/// Start with the device location (or the default city), then loop on the menu.
pub async fn run(store: Store) -> Result<()> {
    store.initialize().await;
    let debouncer = SuggestionDebouncer::spawn(store.provider(), DEFAULT_QUIET_PERIOD);

    loop {
        let state = store.get_state();
        println!("{}", render::dashboard(&state));

        let Some(choice) = Select::new("What next?", menu(&state)).prompt_skippable()? else {
            break;
        };

        match choice {
            MenuItem::Search => {
                if let Some(city) = Text::new("City:").prompt_skippable()? {
                    store.search(&city).await;
                }
            }
            MenuItem::Suggest => {
                if let Some(city) = pick_city(&debouncer).await? {
                    store.select_suggestion(city.coordinates).await;
                }
            }
            MenuItem::Locate => store.locate().await,
            MenuItem::Recent => {
                if let Some(city) = choose("Recent searches", state.history.as_slice())? {
                    store.search(&city).await;
                }
            }
            MenuItem::RemoveRecent => {
                if let Some(city) = choose("Remove which?", state.history.as_slice())? {
                    store.remove_from_history(city).await;
                }
            }
            MenuItem::ClearRecent => store.clear_history().await,
            MenuItem::ToggleFavorite { .. } => {
                store.toggle_favorite().await;
            }
            MenuItem::OpenFavorite => {
                if let Some(city) = choose("Favorites", &favorite_cities(&state))? {
                    store.search(&city).await;
                }
            }
            MenuItem::RemoveFavorite => {
                if let Some(city) = choose("Remove which?", &favorite_cities(&state))? {
                    store.remove_from_favorites(city).await;
                }
            }
            MenuItem::ClearFavorites => store.clear_favorites().await,
            MenuItem::NextPage => store.next_page().await,
            MenuItem::PreviousPage => store.previous_page().await,
            MenuItem::ToggleUnit => store.change_unit(state.unit.toggled()).await,
            MenuItem::ToggleTheme => store.change_theme(state.theme.toggled()).await,
            MenuItem::DismissError => store.clear_error().await,
            MenuItem::Quit => break,
        }
    }

    Ok(())
}

fn favorite_cities(state: &AppState) -> Vec<String> {
    state.favorites.iter().map(|f| f.city.clone()).collect()
}

fn choose(prompt: &str, options: &[String]) -> Result<Option<String>> {
    if options.is_empty() {
        return Ok(None);
    }
    Ok(Select::new(prompt, options.to_vec()).prompt_skippable()?)
}

/// Treat Esc and Ctrl-C as "no answer"; other prompt failures are errors.
fn skippable<T>(answer: Result<T, InquireError>) -> Result<Option<T>> {
    match answer {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Ask for partial input, feed it through the debouncer and let the user pick a match.
pub async fn pick_city(debouncer: &SuggestionDebouncer) -> Result<Option<CitySuggestion>> {
    let Some(text) = Text::new("Start typing a city:").prompt_skippable()? else {
        return Ok(None);
    };

    if !is_suggestible(text.trim()) {
        println!("Type at least two characters to get suggestions.");
        return Ok(None);
    }

    let mut updates = debouncer.subscribe();
    updates.borrow_and_update();
    debouncer.input(&text);

    let wait = DEFAULT_QUIET_PERIOD + SUGGESTION_WAIT;
    if tokio::time::timeout(wait, updates.changed()).await.is_err() {
        tracing::warn!(query = %text, "Timed out waiting for suggestions");
    }

    let suggestions = updates.borrow_and_update().clone();
    debouncer.clear();

    if suggestions.is_empty() {
        println!("No matching cities.");
        return Ok(None);
    }

    let labels: Vec<String> = suggestions.iter().map(|s| s.display_name.clone()).collect();
    let picked = skippable(Select::new("Pick a city:", labels).raw_prompt())?;

    Ok(picked.and_then(|choice| suggestions.into_iter().nth(choice.index)))
}
