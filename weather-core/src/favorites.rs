use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Unit, WeatherSnapshot};

/// A pinned city with the reading it had when it was pinned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteEntry {
    pub city: String,
    pub country: String,
    pub temp: i32,
    pub unit: Unit,
    pub icon: String,
    pub added_at: DateTime<Utc>,
}

impl FavoriteEntry {
    pub fn from_snapshot(snapshot: &WeatherSnapshot, unit: Unit) -> Self {
        Self {
            city: snapshot.city.clone(),
            country: snapshot.country.clone(),
            temp: snapshot.temperature,
            unit,
            icon: snapshot.icon.clone(),
            added_at: Utc::now(),
        }
    }
}

/// Favorite cities keyed by city name, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Favorites {
    entries: Vec<FavoriteEntry>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry` unless its city is already present. Returns whether it was added.
    pub fn add(&mut self, entry: FavoriteEntry) -> bool {
        if self.contains(&entry.city) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Returns whether an entry was removed.
    pub fn remove(&mut self, city: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|f| f.city != city);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, city: &str) -> bool {
        self.entries.iter().any(|f| f.city == city)
    }

    pub fn as_slice(&self) -> &[FavoriteEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &FavoriteEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<FavoriteEntry>> for Favorites {
    /// Drops later entries that repeat a city.
    fn from(raw: Vec<FavoriteEntry>) -> Self {
        let mut favorites = Favorites::new();
        for entry in raw {
            favorites.add(entry);
        }
        favorites
    }
}
