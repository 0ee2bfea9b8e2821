//! Value resolution capabilities handed to the merger by its caller

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Resolves a string key to a value, `None` when the key is unknown
pub trait KeyResolver<T> {
    fn resolve(&self, key: &str) -> Option<T>;

    /// Every key this resolver knows, used in diagnostics
    fn keys(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Supplies values for typed keys (placeholders, system properties)
pub trait KeyBasedValueResolver<K> {
    fn value(&self, key: &K) -> Option<String>;
}

/// Resolves `tools:selector` values: library package name to library name
#[derive(Debug, Clone, Default)]
pub struct SelectorResolver {
    selectors: BTreeMap<String, String>,
}

impl SelectorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the package of a library under a display name
    pub fn add(&mut self, package: impl Into<String>, name: impl Into<String>) {
        self.selectors.insert(package.into(), name.into());
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

impl KeyResolver<String> for SelectorResolver {
    fn resolve(&self, key: &str) -> Option<String> {
        self.selectors.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.selectors.keys().cloned().collect()
    }
}

/// Map backed [`KeyBasedValueResolver`]
#[derive(Debug, Clone)]
pub struct MapValueResolver<K: Eq + Hash> {
    values: HashMap<K, String>,
}

impl<K: Eq + Hash> MapValueResolver<K> {
    pub fn new(values: HashMap<K, String>) -> Self {
        Self { values }
    }

    pub fn insert(&mut self, key: K, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Eq + Hash> Default for MapValueResolver<K> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> KeyBasedValueResolver<K> for MapValueResolver<K> {
    fn value(&self, key: &K) -> Option<String> {
        self.values.get(key).cloned()
    }
}
