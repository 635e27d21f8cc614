//! Shared fixtures for the integration tests
#![allow(dead_code)]

use lms_relabel::dom::{Document, Element, NodeId, ShadowMode};
use lms_relabel::scope::find_all_in;
use std::collections::BTreeMap;

/// One course card: its own open shadow root plus a slotted name component
pub fn card_html(id: u32, label: &str) -> String {
    format!(
        r#"<d2l-card href="/d2l/home/{id}"><template shadowrootmode="open"><div class="d2l-card-container"><slot></slot></div></template><d2l-organization-name><template shadowrootmode="open">{label}</template></d2l-organization-name></d2l-card>"#
    )
}

/// A `d2l-my-courses` widget whose shadow root holds the given cards
pub fn courses_html<'a>(cards: impl IntoIterator<Item = (u32, &'a str)>) -> String {
    let inner: String = cards.into_iter().map(|(id, label)| card_html(id, label)).collect();
    format!(r#"<d2l-my-courses><template shadowrootmode="open">{inner}</template></d2l-my-courses>"#)
}

pub fn page_html(body: &str) -> String {
    format!("<html><head><title>Homepage</title></head><body>{body}</body></html>")
}

pub fn names(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn body(doc: &Document) -> NodeId {
    doc.first_by_tag(doc.root(), "body").expect("fixture has a body")
}

/// Every reachable card, in document order
pub fn cards(doc: &Document) -> Vec<NodeId> {
    let is_card = |el: &Element| el.tag() == "d2l-card";
    find_all_in(doc, doc.root(), &is_card)
}

/// Card whose `href` carries `id`
pub fn card(doc: &Document, id: u32) -> NodeId {
    let href = format!("/d2l/home/{}", id);
    cards(doc)
        .into_iter()
        .find(|c| doc.attribute(*c, "href") == Some(href.as_str()))
        .expect("card present")
}

/// Shadow root of the card's name component
pub fn label_scope(doc: &Document, card: NodeId) -> NodeId {
    let is_name = |el: &Element| el.tag() == "d2l-organization-name";
    let host = find_all_in(doc, card, &is_name)
        .into_iter()
        .next()
        .expect("name component present");
    doc.open_shadow_root(host).expect("name component rendered")
}

/// Visible label of a card
pub fn label(doc: &Document, card: NodeId) -> String {
    doc.text_content(label_scope(doc, card))
}

/// Wrap `levels` open shadow roots around a card, built node by node
pub fn nested_card(doc: &mut Document, parent: NodeId, levels: usize, id: u32, text: &str) -> NodeId {
    let mut parent = parent;
    for _ in 0..levels {
        let host = doc.create_element("x-wrapper");
        doc.append_child(parent, host);
        parent = doc.attach_shadow(host, ShadowMode::Open);
    }
    let card = doc.create_element("d2l-card");
    doc.set_attribute(card, "href", &format!("/d2l/home/{}", id));
    doc.attach_shadow(card, ShadowMode::Open);
    let name = doc.create_element("d2l-organization-name");
    let name_root = doc.attach_shadow(name, ShadowMode::Open);
    doc.set_text_content(name_root, text);
    doc.append_child(card, name);
    doc.append_child(parent, card);
    card
}
