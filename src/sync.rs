//! Content synchronization
//!
//! Writes the resolved display name of each located item into the page.
//! Every write is preceded by a comparison with the live value and skipped
//! when they already agree. That guard is what lets the engine react to its
//! own writes: the pass they trigger finds nothing to do, and the page
//! settles.

use crate::dom::Document;
use crate::locator::LocatedItem;
use crate::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// id → custom name. An id without an entry shows its original label.
///
/// Empty names are never stored: setting one removes the entry, which is
/// how a name is reverted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct NameOverrideMap {
    names: BTreeMap<String, String>,
}

impl NameOverrideMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear one override; returns true when the map changed
    pub fn set(&mut self, id: &str, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return self.names.remove(id).is_some();
        }
        self.names.insert(id.to_string(), name.to_string()).as_deref() != Some(name)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.names.remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.names.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.names
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for NameOverrideMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.set(k.as_ref(), v.as_ref());
        }
        map
    }
}

impl From<BTreeMap<String, String>> for NameOverrideMap {
    fn from(names: BTreeMap<String, String>) -> Self {
        names.into_iter().collect()
    }
}

impl From<NameOverrideMap> for BTreeMap<String, String> {
    fn from(map: NameOverrideMap) -> Self {
        map.names
    }
}

/// Outcome of one synchronization over a set of items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub items: usize,
    pub writes: usize,
}

pub struct ContentSynchronizer {
    aria_attribute: String,
}

impl ContentSynchronizer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            aria_attribute: config.aria_attribute.clone(),
        }
    }

    /// Override if present, otherwise the captured original
    pub fn display_name<'a>(item: &'a LocatedItem, overrides: &'a NameOverrideMap) -> Option<&'a str> {
        overrides
            .get(&item.id)
            .or_else(|| Some(item.original_label.as_str()).filter(|s| !s.is_empty()))
    }

    /// Bring one item in line with the override map; returns writes made
    pub fn apply(&self, doc: &mut Document, item: &LocatedItem, overrides: &NameOverrideMap) -> usize {
        let Some(name) = Self::display_name(item, overrides) else {
            return 0;
        };
        let mut writes = 0;
        if doc.text_content(item.label_scope) != name {
            doc.set_text_content(item.label_scope, name);
            writes += 1;
        }
        if doc.attribute(item.target, &self.aria_attribute) != Some(name) {
            doc.set_attribute(item.target, &self.aria_attribute, name);
            writes += 1;
        }
        writes
    }

    pub fn synchronize(&self, doc: &mut Document, items: &[LocatedItem], overrides: &NameOverrideMap) -> SyncReport {
        let writes = items.iter().map(|item| self.apply(doc, item, overrides)).sum();
        SyncReport {
            items: items.len(),
            writes,
        }
    }
}
