//! Ordered key/value item lists
//!
//! `ItemList` holds request headers, query parameters and decoded responses.
//! Unlike a map it keeps every entry in insertion order and never collapses
//! duplicate keys, so two `Set-Cookie` lines in a response stay two entries.

use super::{Error, Result};
use std::fmt;

/// Ordered list of (key, value) pairs
///
/// - Keys are not required to be unique
/// - Lookups return the first matching entry
/// - Iteration yields entries in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemList {
    items: Vec<(String, String)>,
}

impl ItemList {
    /// Create a new empty list
    pub fn new() -> Self {
        ItemList { items: Vec::new() }
    }

    /// Append an item, keeping any existing items with the same key
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.push((key.into(), value.into()));
    }

    /// Builder-style variant of [`push`](Self::push)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Get the value of the first item whose key matches exactly
    ///
    /// Returns `Error::ItemNotFound` when no item has that key.
    pub fn get(&self, key: &str) -> Result<&str> {
        self.items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| Error::ItemNotFound(key.to_string()))
    }

    /// Get the value of the first item whose key matches ignoring ASCII case
    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Get all values for a key, in order
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.items
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Count how many times a key appears
    pub fn count(&self, key: &str) -> usize {
        self.items.iter().filter(|(k, _)| k == key).count()
    }

    /// Check if a key exists
    pub fn contains(&self, key: &str) -> bool {
        self.items.iter().any(|(k, _)| k == key)
    }

    /// Remove all items with a key, returning how many were removed
    pub fn remove(&mut self, key: &str) -> usize {
        let initial_len = self.items.len();
        self.items.retain(|(k, _)| k != key);
        initial_len - self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate over all items in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render each item as `key<delimiter>value`, joining items with `separator`
    pub fn render(&self, delimiter: &str, separator: &str) -> String {
        self.iter()
            .map(|(k, v)| format!("{}{}{}", k, delimiter, v))
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl fmt::Display for ItemList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.items {
            writeln!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ItemList {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut list = ItemList::new();
        for (key, value) in iter {
            list.push(key, value);
        }
        list
    }
}

impl<'a> IntoIterator for &'a ItemList {
    type Item = &'a (String, String);
    type IntoIter = std::slice::Iter<'a, (String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
