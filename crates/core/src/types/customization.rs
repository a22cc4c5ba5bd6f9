//! Per-line product configuration (size, finish, hardware, ...).

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Selected options for a cart line.
///
/// Backed by a sorted map so equality and the canonical key never depend on
/// the order in which options were chosen. An absent, `null` or empty
/// customization are the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Customization(BTreeMap<String, String>);

impl Customization {
    /// No options selected.
    #[must_use]
    pub const fn none() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style option setter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up a selected option.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether no options are selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Canonical JSON encoding, stable across option order.
    ///
    /// Used as part of the line identity key in storage.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| String::from("{}"))
    }

    /// Parse a canonical key back into a customization.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the key is not an object of strings.
    pub fn from_canonical_key(key: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(key).map(Self)
    }
}

impl<'de> Deserialize<'de> for Customization {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<BTreeMap<String, String>>::deserialize(deserializer)
            .map(|options| Self(options.unwrap_or_default()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Customization {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
