use serde::{Deserialize, Serialize};

/// Maximum number of remembered searches.
pub const MAX_HISTORY: usize = 10;

/// Recently searched city names, most recent first, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SearchHistory {
    entries: Vec<String>,
}

impl SearchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `city` to the front, inserting it if absent. Comparison is case-sensitive.
    pub fn push(&mut self, city: impl Into<String>) {
        let city = city.into();
        self.entries.retain(|c| *c != city);
        self.entries.insert(0, city);
        self.entries.truncate(MAX_HISTORY);
    }

    /// Returns whether an entry was removed.
    pub fn remove(&mut self, city: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|c| c != city);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, city: &str) -> bool {
        self.entries.iter().any(|c| c == city)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<String>> for SearchHistory {
    /// Keeps the first occurrence of each name and at most [`MAX_HISTORY`] entries.
    fn from(raw: Vec<String>) -> Self {
        let mut entries: Vec<String> = Vec::with_capacity(raw.len().min(MAX_HISTORY));
        for city in raw {
            if entries.len() == MAX_HISTORY {
                break;
            }
            if !entries.contains(&city) {
                entries.push(city);
            }
        }
        Self { entries }
    }
}

impl From<SearchHistory> for Vec<String> {
    fn from(history: SearchHistory) -> Self {
        history.entries
    }
}
