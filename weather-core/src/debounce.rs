//! Debounced city suggestions for a search box.

use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    model::CitySuggestion,
    provider::{DEFAULT_SUGGESTION_LIMIT, WeatherProvider, is_suggestible},
};

/// Quiet period after the last keystroke before a lookup is issued.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Turns a stream of input text into at most one lookup per pause in typing.
///
/// Every new input cancels the pending quiet-period timer and any lookup still
/// in flight, so a late answer for an older query is never published.
#[derive(Debug)]
pub struct SuggestionDebouncer {
    input: watch::Sender<String>,
    suggestions: watch::Receiver<Vec<CitySuggestion>>,
    task: JoinHandle<()>,
}

impl SuggestionDebouncer {
    /// Start the debouncer. Must be called inside a tokio runtime.
    pub fn spawn(provider: Arc<dyn WeatherProvider>, quiet: Duration) -> Self {
        let (input, text) = watch::channel(String::new());
        let (published, suggestions) = watch::channel(Vec::new());

        let task = tokio::spawn(run(provider, quiet, text, published));

        Self {
            input,
            suggestions,
            task,
        }
    }

    /// Report the current contents of the input.
    pub fn input(&self, text: &str) {
        self.input.send_replace(text.to_string());
    }

    /// Drop the input and any shown suggestions, e.g. after a selection.
    pub fn clear(&self) {
        self.input("");
    }

    /// Latest published suggestions.
    pub fn suggestions(&self) -> Vec<CitySuggestion> {
        self.suggestions.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<CitySuggestion>> {
        self.suggestions.clone()
    }
}

impl Drop for SuggestionDebouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    provider: Arc<dyn WeatherProvider>,
    quiet: Duration,
    mut text: watch::Receiver<String>,
    published: watch::Sender<Vec<CitySuggestion>>,
) {
    let mut pending: Option<String> = None;

    loop {
        let Some(query) = pending.take() else {
            if text.changed().await.is_err() {
                return;
            }
            pending = Some(text.borrow_and_update().trim().to_string());
            continue;
        };

        if !is_suggestible(&query) {
            published.send_replace(Vec::new());
            continue;
        }

        let lookup = async {
            tokio::time::sleep(quiet).await;
            tracing::debug!(query = %query, "Looking up city suggestions");
            provider.suggest_cities(&query, DEFAULT_SUGGESTION_LIMIT).await
        };

        tokio::select! {
            changed = text.changed() => {
                if changed.is_err() {
                    return;
                }
                pending = Some(text.borrow_and_update().trim().to_string());
            }
            results = lookup => {
                published.send_replace(results);
            }
        }
    }
}
