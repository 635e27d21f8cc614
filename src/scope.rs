//! Traversal across nested render scopes
//!
//! Host components render into their own shadow roots, often five or more
//! levels deep. A [`ScopeNode`] is one such tree: it can answer queries about
//! its own light tree and hand out the scopes nested directly inside it.
//! Closed roots are represented by [`SealedScope`], which answers every
//! question with "nothing", so traversal stops there without special cases.

use crate::dom::{Document, NodeId, ShadowMode};
use crate::selector::ElementPredicate;

pub trait ScopeNode<'a> {
    /// Root node of this scope when it is a real, observable scope root.
    /// Element subtree views and sealed scopes return `None`.
    fn id(&self) -> Option<NodeId>;

    /// Matching elements in this scope's light tree, in tree order
    fn query_all(&self, predicate: &dyn ElementPredicate) -> Vec<NodeId>;

    /// Scopes hosted by elements of this scope
    fn child_scopes(&self) -> Vec<Box<dyn ScopeNode<'a> + 'a>>;
}

/// An accessible scope: the document, an open shadow root, or the subtree
/// beneath a single element.
#[derive(Debug, Clone, Copy)]
pub struct OpenScope<'a> {
    doc: &'a Document,
    root: NodeId,
}

impl<'a> OpenScope<'a> {
    pub fn new(doc: &'a Document, root: NodeId) -> Self {
        Self { doc, root }
    }

    pub fn document(doc: &'a Document) -> Self {
        Self::new(doc, doc.root())
    }

    pub fn root(&self) -> NodeId {
        self.root
    }
}

impl<'a> ScopeNode<'a> for OpenScope<'a> {
    fn id(&self) -> Option<NodeId> {
        self.doc.is_scope_root(self.root).then_some(self.root)
    }

    fn query_all(&self, predicate: &dyn ElementPredicate) -> Vec<NodeId> {
        self.doc
            .descendants(self.root)
            .into_iter()
            .filter(|n| {
                self.doc
                    .element(*n)
                    .map(|e| predicate.matches(e))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn child_scopes(&self) -> Vec<Box<dyn ScopeNode<'a> + 'a>> {
        let doc = self.doc;
        std::iter::once(self.root)
            .chain(doc.descendants(self.root))
            .filter_map(|n| doc.shadow_root(n))
            .map(|(root, mode)| -> Box<dyn ScopeNode<'a> + 'a> {
                match mode {
                    ShadowMode::Open => Box::new(OpenScope::new(doc, root)),
                    ShadowMode::Closed => Box::new(SealedScope),
                }
            })
            .collect()
    }
}

/// A scope that cannot be entered
#[derive(Debug, Clone, Copy, Default)]
pub struct SealedScope;

impl<'a> ScopeNode<'a> for SealedScope {
    fn id(&self) -> Option<NodeId> {
        None
    }

    fn query_all(&self, _predicate: &dyn ElementPredicate) -> Vec<NodeId> {
        Vec::new()
    }

    fn child_scopes(&self) -> Vec<Box<dyn ScopeNode<'a> + 'a>> {
        Vec::new()
    }
}

/// Visit `start` and every scope nested beneath it, depth first.
///
/// Uses an explicit stack, so host nesting depth is bounded only by the
/// document itself.
pub fn visit_scopes<'a>(start: Box<dyn ScopeNode<'a> + 'a>, mut f: impl FnMut(&dyn ScopeNode<'a>)) {
    let mut stack = vec![start];
    while let Some(scope) = stack.pop() {
        f(scope.as_ref());
        let mut children = scope.child_scopes();
        children.reverse();
        stack.extend(children);
    }
}

/// All elements matching `predicate` in `start` and its nested scopes
pub fn find_all<'a>(start: Box<dyn ScopeNode<'a> + 'a>, predicate: &dyn ElementPredicate) -> Vec<NodeId> {
    let mut found = Vec::new();
    visit_scopes(start, |scope| found.extend(scope.query_all(predicate)));
    found
}

/// Convenience wrapper: search the subtree under `node`, crossing open
/// shadow boundaries
pub fn find_all_in(doc: &Document, node: NodeId, predicate: &dyn ElementPredicate) -> Vec<NodeId> {
    find_all(Box::new(OpenScope::new(doc, node)), predicate)
}

/// Roots of every observable scope at or beneath `node`
pub fn scope_roots(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let mut roots = Vec::new();
    visit_scopes(Box::new(OpenScope::new(doc, node)), |scope| {
        if let Some(id) = scope.id() {
            roots.push(id);
        }
    });
    roots
}
