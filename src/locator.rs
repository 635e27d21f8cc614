//! Target discovery
//!
//! Turns raw walker matches into [`LocatedItem`]s. An element only becomes an
//! item when its identifier attribute matches the configured pattern and its
//! label companion has finished rendering; everything else is dropped from
//! this pass and looked at again on the next one.

use crate::dom::{Document, NodeId};
use crate::scope::{self, OpenScope};
use crate::selector::SimpleSelector;
use crate::{EngineConfig, Result};
use regex::Regex;

/// Marker key holding the first label read from an element
pub const ORIGINAL_MARKER: &str = "relabelOriginal";

/// One discovered target, valid for the current pass only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedItem {
    pub id: String,
    pub original_label: String,
    /// Element carrying the identifier and the assistive attribute
    pub target: NodeId,
    /// Companion element rendering the visible label
    pub label_host: NodeId,
    /// Companion's open shadow root; its text is the visible label
    pub label_scope: NodeId,
}

pub struct ElementLocator {
    target: SimpleSelector,
    companion: SimpleSelector,
    id_attribute: String,
    id_pattern: Regex,
}

impl ElementLocator {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            target: SimpleSelector::parse(&config.target_selector)?,
            companion: SimpleSelector::parse(&config.label_selector)?,
            id_attribute: config.id_attribute.clone(),
            id_pattern: Regex::new(&config.id_pattern)?,
        })
    }

    /// Numeric identifier embedded in an attribute value, if any
    pub fn extract_id(&self, value: &str) -> Option<String> {
        let caps = self.id_pattern.captures(value)?;
        let m = caps.get(1).or_else(|| caps.get(0))?;
        let id = m.as_str();
        (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then(|| id.to_string())
    }

    /// Raw matches for the target selector across every reachable scope
    pub fn candidates(&self, doc: &Document) -> Vec<NodeId> {
        scope::find_all(Box::new(OpenScope::document(doc)), &self.target)
    }

    /// Every ready target in the document, in discovery order.
    ///
    /// Takes `&mut` only to record first-read labels in element markers.
    pub fn locate(&self, doc: &mut Document) -> Vec<LocatedItem> {
        self.candidates(doc)
            .into_iter()
            .filter_map(|target| self.resolve(doc, target))
            .collect()
    }

    /// Resolve a single element; `None` means "not a target, or not yet"
    pub fn resolve(&self, doc: &mut Document, target: NodeId) -> Option<LocatedItem> {
        let id = doc
            .attribute(target, &self.id_attribute)
            .and_then(|v| self.extract_id(v))?;
        let (label_host, label_scope) = self.companion(doc, target)?;

        let original_label = match doc.marker(target, ORIGINAL_MARKER) {
            Some(original) => original.to_string(),
            None => {
                let text = doc.text_content(label_scope).trim().to_string();
                if text.is_empty() {
                    return None;
                }
                doc.set_marker(target, ORIGINAL_MARKER, &text);
                log::debug!("captured original label for {}: {:?}", id, text);
                text
            }
        };

        Some(LocatedItem {
            id,
            original_label,
            target,
            label_host,
            label_scope,
        })
    }

    // First companion under `target` whose own scope has rendered text.
    fn companion(&self, doc: &Document, target: NodeId) -> Option<(NodeId, NodeId)> {
        scope::find_all_in(doc, target, &self.companion)
            .into_iter()
            .find_map(|host| {
                let root = doc.open_shadow_root(host)?;
                let rendered = !doc.text_content(root).trim().is_empty();
                rendered.then_some((host, root))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ShadowMode;

    fn card(doc: &mut Document, href: &str, label: Option<&str>) -> NodeId {
        let card = doc.create_element("d2l-card");
        doc.set_attribute(card, "href", href);
        doc.append_child(doc.root(), card);
        let name = doc.create_element("d2l-organization-name");
        doc.append_child(card, name);
        if let Some(label) = label {
            let root = doc.attach_shadow(name, ShadowMode::Open);
            doc.set_text_content(root, label);
        }
        card
    }

    fn locator() -> ElementLocator {
        ElementLocator::new(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn extracts_numeric_ids_only() {
        let l = locator();
        assert_eq!(l.extract_id("/d2l/home/12345"), Some("12345".to_string()));
        assert_eq!(l.extract_id("https://lms.example.edu/d2l/home/7?ou=1"), Some("7".to_string()));
        assert_eq!(l.extract_id("/d2l/le/content/12345"), None);
        assert_eq!(l.extract_id("/d2l/home/"), None);
    }

    #[test]
    fn skips_non_targets_and_unrendered_companions() {
        let mut doc = Document::new();
        card(&mut doc, "/d2l/home/1", Some("Chemistry"));
        card(&mut doc, "/d2l/le/news/2", Some("News"));
        card(&mut doc, "/d2l/home/3", None);
        card(&mut doc, "/d2l/home/4", Some("   "));

        let items = locator().locate(&mut doc);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "1");
        assert_eq!(items[0].original_label, "Chemistry");
    }

    #[test]
    fn first_successful_read_wins() {
        let mut doc = Document::new();
        let c = card(&mut doc, "/d2l/home/9", Some("  Physics  "));
        let l = locator();
        let first = l.locate(&mut doc);
        assert_eq!(first[0].original_label, "Physics");

        doc.set_text_content(first[0].label_scope, "Something else");
        let again = l.locate(&mut doc);
        assert_eq!(again[0].original_label, "Physics");
        assert_eq!(doc.marker(c, ORIGINAL_MARKER), Some("Physics"));
    }

    #[test]
    fn bad_pattern_is_an_error() {
        let cfg = EngineConfig {
            id_pattern: "(unclosed".to_string(),
            ..Default::default()
        };
        assert!(ElementLocator::new(&cfg).is_err());
    }
}
