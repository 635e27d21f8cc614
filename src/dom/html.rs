//! HTML import and export for [`Document`]
//!
//! Import goes through `scraper`. Shadow roots are written the declarative
//! way, as a `<template shadowrootmode="open|closed">` first child of the
//! host, so fixtures can describe nested component trees in plain HTML.

use super::{Document, NodeId, NodeKind, ShadowMode};
use scraper::{ElementRef, Html, Node as HtmlNode};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

fn declarative_shadow_mode(template: &ElementRef<'_>) -> Option<ShadowMode> {
    let el = template.value();
    if el.name() != "template" {
        return None;
    }
    let mode = el.attr("shadowrootmode").or_else(|| el.attr("shadowroot"))?;
    match mode.to_ascii_lowercase().as_str() {
        "open" => Some(ShadowMode::Open),
        "closed" => Some(ShadowMode::Closed),
        _ => None,
    }
}

impl Document {
    /// Parse a full HTML document
    pub fn parse_html(html: &str) -> Document {
        let parsed = Html::parse_document(html);
        let mut doc = Document::new();
        let top = doc.import_detached(parsed.root_element());
        let root = doc.root();
        doc.link(root, top);
        doc.writes = 0;
        doc
    }

    /// Parse an HTML fragment and append its top-level nodes to `parent`.
    ///
    /// Each top-level node is appended separately, so observers see one
    /// record per node. Returns the appended nodes.
    pub fn insert_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let fragment = Html::parse_fragment(html);
        let wrapper = fragment.root_element();
        let mut added = Vec::new();
        for child in wrapper.children() {
            let node = match child.value() {
                HtmlNode::Text(t) => {
                    let text: &str = t;
                    self.create_text(text)
                }
                HtmlNode::Element(_) => match ElementRef::wrap(child) {
                    Some(el) => self.import_detached(el),
                    None => continue,
                },
                _ => continue,
            };
            self.append_child(parent, node);
            added.push(node);
        }
        added
    }

    // Build a detached copy of `source` and everything beneath it.
    //
    // scraper keeps `<template>` contents under a fragment child of the
    // template element; the walk descends into it with the same container.
    fn import_detached(&mut self, source: ElementRef<'_>) -> NodeId {
        let top = self.create_imported_element(&source);
        let mut stack = vec![(*source, top)];
        while let Some((src, container)) = stack.pop() {
            for child in src.children() {
                match child.value() {
                    HtmlNode::Text(t) => {
                        let text: &str = t;
                        let node = self.create_text(text);
                        self.link(container, node);
                    }
                    HtmlNode::Fragment => stack.push((child, container)),
                    HtmlNode::Element(_) => {
                        let Some(el) = ElementRef::wrap(child) else {
                            continue;
                        };
                        let host_free = self
                            .element(container)
                            .map(|e| !e.has_shadow_root())
                            .unwrap_or(false);
                        match declarative_shadow_mode(&el) {
                            Some(mode) if host_free => {
                                let root = self.attach_shadow(container, mode);
                                stack.push((child, root));
                            }
                            _ => {
                                let node = self.create_imported_element(&el);
                                self.link(container, node);
                                stack.push((child, node));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        top
    }

    fn create_imported_element(&mut self, source: &ElementRef<'_>) -> NodeId {
        let node = self.create_element(source.value().name());
        let mut attrs: Vec<(String, String)> = source
            .value()
            .attrs()
            .filter(|(name, _)| *name != "shadowrootmode")
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        // scraper hands attributes back in hash order
        attrs.sort();
        if let Some(el) = self.element_mut(node) {
            el.attrs = attrs;
        }
        node
    }

    /// Serialize `node` (and its shadow trees) back to HTML
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            NodeKind::Document => {
                for c in self.children(node) {
                    self.write_html(*c, out);
                }
            }
            NodeKind::Text(t) => out.push_str(&escape_text(t)),
            NodeKind::ShadowRoot { mode, .. } => {
                out.push_str("<template shadowrootmode=\"");
                out.push_str(mode.as_str());
                out.push_str("\">");
                for c in self.children(node) {
                    self.write_html(*c, out);
                }
                out.push_str("</template>");
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(el.tag());
                for (k, v) in el.attrs() {
                    if k == "style" && el.style_properties().next().is_some() {
                        continue;
                    }
                    out.push_str(&format!(" {}=\"{}\"", k, escape_attr(v)));
                }
                let style = el
                    .style_properties()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect::<Vec<_>>()
                    .join("; ");
                if !style.is_empty() {
                    out.push_str(&format!(" style=\"{}\"", escape_attr(&style)));
                }
                out.push('>');
                if VOID_TAGS.contains(&el.tag()) {
                    return;
                }
                if let Some((root, _)) = self.shadow_root(node) {
                    self.write_html(root, out);
                }
                for c in self.children(node) {
                    self.write_html(*c, out);
                }
                out.push_str("</");
                out.push_str(el.tag());
                out.push('>');
            }
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r#"<html><head><title>Home</title></head><body>
<d2l-my-courses><template shadowrootmode="open"><d2l-card href="/d2l/home/42"><template shadowrootmode="open"><div class="d2l-card-container"><slot></slot></div></template><d2l-organization-name><template shadowrootmode="open">Biology</template></d2l-organization-name></d2l-card></template></d2l-my-courses>
<x-sealed><template shadowrootmode="closed"><span>hidden</span></template></x-sealed>
</body></html>"#;

    #[test]
    fn declarative_shadow_roots_are_attached() {
        let doc = Document::parse_html(NESTED);
        let body = doc.first_by_tag(doc.root(), "body").expect("body");
        let courses = doc.first_by_tag(body, "d2l-my-courses").expect("host");
        let shadow = doc.open_shadow_root(courses).expect("open root");
        let card = doc.first_by_tag(shadow, "d2l-card").expect("card");
        assert_eq!(doc.attribute(card, "href"), Some("/d2l/home/42"));
        // the template element itself is not kept as a child
        assert!(doc.first_by_tag(body, "template").is_none());

        let sealed = doc.first_by_tag(body, "x-sealed").expect("sealed host");
        assert!(doc.open_shadow_root(sealed).is_none());
        assert!(doc.shadow_root(sealed).is_some());
    }

    #[test]
    fn insert_html_notifies_once_per_top_level_node() {
        let mut doc = Document::parse_html("<html><body></body></html>");
        let body = doc.first_by_tag(doc.root(), "body").expect("body");
        doc.observe(doc.root());
        let added = doc.insert_html(body, "<div>a</div><div>b</div>");
        assert_eq!(added.len(), 2);
        assert_eq!(doc.take_mutation_records().len(), 2);
    }

    #[test]
    fn export_round_trips_shadow_roots() {
        let doc = Document::parse_html(NESTED);
        let html = doc.to_html(doc.root());
        assert!(html.contains("<template shadowrootmode=\"open\">Biology</template>"));
        assert!(html.contains("<template shadowrootmode=\"closed\">"));
        let again = Document::parse_html(&html);
        assert_eq!(again.to_html(again.root()), html);
    }

    #[test]
    fn template_contents_become_shadow_children() {
        let doc = Document::parse_html(
            r#"<html><body><d2l-card href="/d2l/home/12345"><d2l-organization-name><template shadowrootmode="open">Intro</template></d2l-organization-name></d2l-card></body></html>"#,
        );
        let name = doc.first_by_tag(doc.root(), "d2l-organization-name").expect("name");
        let root = doc.open_shadow_root(name).expect("open root");
        assert_eq!(doc.text_content(root), "Intro");
        assert!(doc
            .to_html(doc.root())
            .contains(r#"<template shadowrootmode="open">Intro</template>"#));
    }

    #[test]
    fn nested_declarative_roots_keep_their_contents() {
        let mut html = String::from("Deep");
        for _ in 0..7 {
            html = format!(r#"<x-level><template shadowrootmode="open">{}</template></x-level>"#, html);
        }
        let mut doc = Document::parse_html("<html><body></body></html>");
        let body = doc.first_by_tag(doc.root(), "body").expect("body");
        let added = doc.insert_html(body, &html);
        assert_eq!(added.len(), 1);

        let mut host = added[0];
        let mut depth = 0;
        while let Some(root) = doc.open_shadow_root(host) {
            depth += 1;
            match doc.first_by_tag(root, "x-level") {
                Some(next) => host = next,
                None => {
                    assert_eq!(doc.text_content(root), "Deep");
                    break;
                }
            }
        }
        assert_eq!(depth, 7);
    }
}
