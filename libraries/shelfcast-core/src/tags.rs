//! Case-insensitive tag dictionaries.
//!
//! Audio containers and OPF side-cars disagree on key casing (`Title`,
//! `TITLE`, `title`). Keys are normalized to lowercase once, at insert, so
//! call sites never chain `tag.X || tag.x` lookups.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Values that mean "nothing useful was tagged".
const ABSENT_VALUES: &[&str] = &["unknown", "no description"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagMap(BTreeMap<String, String>);

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(key.as_ref().to_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Look up a key and filter out placeholder values.
    ///
    /// Returns `None` when the value trims to empty, `"unknown"`, or
    /// `"no description"` (case-insensitive).
    pub fn present(&self, key: &str) -> Option<&str> {
        let value = self.get(key)?.trim();
        if value.is_empty() || ABSENT_VALUES.iter().any(|a| value.eq_ignore_ascii_case(a)) {
            return None;
        }
        Some(value)
    }

    /// First present value among `keys`, in order.
    pub fn first_present(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.present(key))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for TagMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut map = TagMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
