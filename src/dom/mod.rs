//! In-memory host page model
//!
//! A small arena DOM that behaves like the parts of a browser document the
//! relabel engine touches: elements with attributes and inline custom style
//! properties, text, open and closed shadow roots, adopted stylesheets, and
//! structural-change notification per scope.
//!
//! Notification follows `MutationObserver { childList: true, subtree: true }`
//! semantics: an observer on a scope sees insertions and removals anywhere in
//! that scope's tree, but never inside a nested shadow root. Records are
//! queued and handed out by [`Document::take_mutation_records`], which the
//! page event loop calls between tasks.

pub mod html;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Handle to a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Shadow root encapsulation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowMode {
    Open,
    Closed,
}

impl ShadowMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ShadowMode::Open => "open",
            ShadowMode::Closed => "closed",
        }
    }
}

/// A constructed stylesheet that can be adopted by shadow roots.
///
/// Adoption is tracked by `Arc` identity, so two sheets with the same text
/// are still distinct registrations.
#[derive(Debug, PartialEq, Eq)]
pub struct StyleSheet {
    css: String,
}

impl StyleSheet {
    pub fn new(css: impl Into<String>) -> Self {
        Self { css: css.into() }
    }

    pub fn css(&self) -> &str {
        &self.css
    }
}

/// Element payload
#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    style: BTreeMap<String, String>,
    shadow_root: Option<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            style: BTreeMap::new(),
            shadow_root: None,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_ascii_whitespace().any(|x| x == class))
            .unwrap_or(false)
    }

    /// Inline custom style properties (`--name: value`)
    pub fn style_properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.style.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn has_shadow_root(&self) -> bool {
        self.shadow_root.is_some()
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    ShadowRoot {
        host: NodeId,
        mode: ShadowMode,
        adopted: Vec<Arc<StyleSheet>>,
    },
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    // Expando-style slots: invisible to selectors, never reported as mutations
    markers: HashMap<String, String>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            kind,
            markers: HashMap::new(),
        }
    }
}

/// Handle returned by [`Document::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// One structural change delivered to one subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub subscription: SubscriptionId,
    /// Scope root the subscription is attached to
    pub scope: NodeId,
    /// Node whose child list changed
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Arena-backed document
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    subscriptions: HashMap<NodeId, Vec<SubscriptionId>>,
    next_subscription: u64,
    pending: Vec<MutationRecord>,
    writes: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Document)],
            subscriptions: HashMap::new(),
            next_subscription: 1,
            pending: Vec::new(),
            writes: 0,
        }
    }

    /// The document node; always a scope root
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind));
        id
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(Element::new(tag)))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.nodes[node.0].kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn is_scope_root(&self, node: NodeId) -> bool {
        matches!(
            self.nodes[node.0].kind,
            NodeKind::Document | NodeKind::ShadowRoot { .. }
        )
    }

    /// Root of the tree `node` lives in: the document, a shadow root, or the
    /// top of a detached subtree.
    pub fn scope_of(&self, node: NodeId) -> NodeId {
        let mut cur = node;
        while let Some(p) = self.nodes[cur.0].parent {
            cur = p;
        }
        cur
    }

    /// Light-tree descendants of `node` in tree order, excluding `node`.
    /// Does not enter shadow roots.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[node.0].children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n.0].children.iter().rev().copied());
        }
        out
    }

    // Link without notification; used while building detached subtrees.
    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn unlink(&mut self, child: NodeId) -> Option<NodeId> {
        let parent = self.nodes[child.0].parent.take()?;
        self.nodes[parent.0].children.retain(|c| *c != child);
        Some(parent)
    }

    /// Append `child` under `parent`, moving it if it is already attached
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(old_parent) = self.unlink(child) {
            self.notify(old_parent, Vec::new(), vec![child]);
        }
        self.link(parent, child);
        self.writes += 1;
        self.notify(parent, vec![child], Vec::new());
    }

    /// Detach `child` from `parent`; returns false when it was not a child.
    ///
    /// The node stays in the arena so it can be re-inserted; arena slots are
    /// never reclaimed.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.nodes[child.0].parent != Some(parent) {
            return false;
        }
        self.unlink(child);
        self.writes += 1;
        self.notify(parent, Vec::new(), vec![child]);
        true
    }

    /// Concatenated light-tree text beneath `node`
    pub fn text_content(&self, node: NodeId) -> String {
        if let NodeKind::Text(t) = &self.nodes[node.0].kind {
            return t.clone();
        }
        let mut out = String::new();
        for n in self.descendants(node) {
            if let NodeKind::Text(t) = &self.nodes[n.0].kind {
                out.push_str(t);
            }
        }
        out
    }

    /// Replace all children of `node` with a single text node.
    ///
    /// On a text node this rewrites its data in place, which is not a
    /// structural change.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        if let NodeKind::Text(t) = &mut self.nodes[node.0].kind {
            *t = text.to_string();
            self.writes += 1;
            return;
        }
        // A lone text child is swapped for itself with the new data, so
        // repeated label writes report the same record without growing the
        // arena.
        if let &[only] = self.nodes[node.0].children.as_slice() {
            if !text.is_empty() {
                if let NodeKind::Text(t) = &mut self.nodes[only.0].kind {
                    *t = text.to_string();
                    self.writes += 1;
                    self.notify(node, vec![only], vec![only]);
                    return;
                }
            }
        }
        let removed = std::mem::take(&mut self.nodes[node.0].children);
        for r in &removed {
            self.nodes[r.0].parent = None;
        }
        let mut added = Vec::new();
        if !text.is_empty() {
            let t = self.create_text(text);
            self.link(node, t);
            added.push(t);
        }
        self.writes += 1;
        self.notify(node, added, removed);
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).and_then(|e| e.attr(name))
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(el) = self.element_mut(node) else {
            return;
        };
        match el.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => el.attrs.push((name.to_string(), value.to_string())),
        }
        self.writes += 1;
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> bool {
        let Some(el) = self.element_mut(node) else {
            return false;
        };
        let before = el.attrs.len();
        el.attrs.retain(|(k, _)| k != name);
        let removed = el.attrs.len() != before;
        if removed {
            self.writes += 1;
        }
        removed
    }

    pub fn style_property(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)
            .and_then(|e| e.style.get(name))
            .map(String::as_str)
    }

    pub fn set_style_property(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(node) {
            el.style.insert(name.to_string(), value.to_string());
            self.writes += 1;
        }
    }

    pub fn remove_style_property(&mut self, node: NodeId, name: &str) -> bool {
        let removed = self
            .element_mut(node)
            .map(|el| el.style.remove(name).is_some())
            .unwrap_or(false);
        if removed {
            self.writes += 1;
        }
        removed
    }

    pub fn marker(&self, node: NodeId, key: &str) -> Option<&str> {
        self.nodes[node.0].markers.get(key).map(String::as_str)
    }

    pub fn set_marker(&mut self, node: NodeId, key: &str, value: &str) {
        self.nodes[node.0]
            .markers
            .insert(key.to_string(), value.to_string());
    }

    /// Attach a shadow root to `host`. An existing root is returned as is.
    pub fn attach_shadow(&mut self, host: NodeId, mode: ShadowMode) -> NodeId {
        if let Some(existing) = self.element(host).and_then(|e| e.shadow_root) {
            return existing;
        }
        let root = self.push(NodeKind::ShadowRoot {
            host,
            mode,
            adopted: Vec::new(),
        });
        if let Some(el) = self.element_mut(host) {
            el.shadow_root = Some(root);
        }
        self.writes += 1;
        root
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<(NodeId, ShadowMode)> {
        let root = self.element(host)?.shadow_root?;
        match &self.nodes[root.0].kind {
            NodeKind::ShadowRoot { mode, .. } => Some((root, *mode)),
            _ => None,
        }
    }

    /// The host's shadow root when it is open; closed roots are invisible
    pub fn open_shadow_root(&self, host: NodeId) -> Option<NodeId> {
        match self.shadow_root(host)? {
            (root, ShadowMode::Open) => Some(root),
            (_, ShadowMode::Closed) => None,
        }
    }

    pub fn shadow_host(&self, root: NodeId) -> Option<NodeId> {
        match &self.nodes[root.0].kind {
            NodeKind::ShadowRoot { host, .. } => Some(*host),
            _ => None,
        }
    }

    pub fn adopted_stylesheets(&self, root: NodeId) -> &[Arc<StyleSheet>] {
        match &self.nodes[root.0].kind {
            NodeKind::ShadowRoot { adopted, .. } => adopted.as_slice(),
            _ => &[],
        }
    }

    /// Add `sheet` to the root's adopted list; false if already present
    pub fn adopt_stylesheet(&mut self, root: NodeId, sheet: &Arc<StyleSheet>) -> bool {
        let NodeKind::ShadowRoot { adopted, .. } = &mut self.nodes[root.0].kind else {
            return false;
        };
        if adopted.iter().any(|s| Arc::ptr_eq(s, sheet)) {
            return false;
        }
        adopted.push(Arc::clone(sheet));
        self.writes += 1;
        true
    }

    /// Remove `sheet` from the root's adopted list; false if absent
    pub fn drop_adopted_stylesheet(&mut self, root: NodeId, sheet: &Arc<StyleSheet>) -> bool {
        let NodeKind::ShadowRoot { adopted, .. } = &mut self.nodes[root.0].kind else {
            return false;
        };
        let before = adopted.len();
        adopted.retain(|s| !Arc::ptr_eq(s, sheet));
        let removed = adopted.len() != before;
        if removed {
            self.writes += 1;
        }
        removed
    }

    /// First light-tree element under the document with the given `id`
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|n| self.element(*n).and_then(|e| e.id()) == Some(id))
    }

    /// First light-tree element under `scope` with the given tag
    pub fn first_by_tag(&self, scope: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|n| self.element(*n).map(|e| e.tag() == tag).unwrap_or(false))
    }

    /// Subscribe to structural changes within `scope`
    pub fn observe(&mut self, scope: NodeId) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.entry(scope).or_default().push(id);
        id
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.values().map(Vec::len).sum()
    }

    fn notify(&mut self, target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        if added.is_empty() && removed.is_empty() {
            return;
        }
        let scope = self.scope_of(target);
        let Some(subs) = self.subscriptions.get(&scope) else {
            return;
        };
        for sub in subs {
            self.pending.push(MutationRecord {
                subscription: *sub,
                scope,
                target,
                added: added.clone(),
                removed: removed.clone(),
            });
        }
    }

    pub fn has_pending_records(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn take_mutation_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending)
    }

    /// Number of DOM writes performed so far
    pub fn write_count(&self) -> u64 {
        self.writes
    }
}
