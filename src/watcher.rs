//! Change observation across render scopes
//!
//! Each scope is subscribed at most once. Scopes are recognised by a token
//! written into a marker on the scope root the first time the watcher sees
//! it, so identity survives however many times the scope is rediscovered.
//! Subscriptions are never dropped: a scope lives as long as its host.

use crate::dom::{Document, MutationRecord, NodeId, SubscriptionId};
use crate::scope;
use std::collections::HashMap;

/// Marker key holding a scope's watcher token
pub const SCOPE_TOKEN_MARKER: &str = "relabelScopeToken";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeToken(u64);

/// Scopes that already have a structural-change subscription
#[derive(Debug, Default)]
pub struct ObservedScopeSet {
    next_token: u64,
    subscriptions: HashMap<ScopeToken, SubscriptionId>,
}

impl ObservedScopeSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn token_of(doc: &Document, scope: NodeId) -> Option<ScopeToken> {
        doc.marker(scope, SCOPE_TOKEN_MARKER)
            .and_then(|t| t.parse().ok())
            .map(ScopeToken)
    }

    pub fn contains(&self, doc: &Document, scope: NodeId) -> bool {
        Self::token_of(doc, scope)
            .map(|t| self.subscriptions.contains_key(&t))
            .unwrap_or(false)
    }

    /// Subscribe to `scope` unless already done; true when newly observed
    pub fn observe(&mut self, doc: &mut Document, scope: NodeId) -> bool {
        if self.contains(doc, scope) {
            return false;
        }
        self.next_token += 1;
        let token = ScopeToken(self.next_token);
        doc.set_marker(scope, SCOPE_TOKEN_MARKER, &token.0.to_string());
        let sub = doc.observe(scope);
        self.subscriptions.insert(token, sub);
        true
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

/// Pure trailing-edge debounce over a millisecond clock.
///
/// Every trigger pushes the deadline to `now + delay`; the debounced action
/// fires once, after the last trigger, when the clock reaches the deadline.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay_ms: u64,
    deadline: Option<u64>,
}

impl Debouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            deadline: None,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn trigger(&mut self, now: u64) {
        self.deadline = Some(now + self.delay_ms);
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True exactly once per quiet period, when `now` has reached the deadline
    pub fn poll(&mut self, now: u64) -> bool {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

pub struct ChangeWatcher {
    observed: ObservedScopeSet,
    debouncer: Debouncer,
}

impl ChangeWatcher {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            observed: ObservedScopeSet::new(),
            debouncer: Debouncer::new(debounce_ms),
        }
    }

    pub fn observed(&self) -> &ObservedScopeSet {
        &self.observed
    }

    /// Subscribe to every unobserved scope at or beneath `node`.
    /// Returns how many scopes were newly observed.
    pub fn watch(&mut self, doc: &mut Document, node: NodeId) -> usize {
        let roots = scope::scope_roots(doc, node);
        let mut attached = 0;
        for root in roots {
            if self.observed.observe(doc, root) {
                log::debug!("observing scope {:?}", root);
                attached += 1;
            }
        }
        attached
    }

    /// React to delivered records: attach to scopes inside inserted nodes,
    /// then (re)arm the debounce. Returns true when anything was inserted.
    pub fn handle_records(&mut self, doc: &mut Document, records: &[MutationRecord], now: u64) -> bool {
        let mut inserted = false;
        for record in records {
            for added in &record.added {
                inserted = true;
                self.watch(doc, *added);
            }
        }
        if inserted {
            self.debouncer.trigger(now);
        }
        inserted
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.debouncer.deadline()
    }

    /// True when a debounced pass is due at `now`
    pub fn poll(&mut self, now: u64) -> bool {
        self.debouncer.poll(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ShadowMode;

    #[test]
    fn trailing_edge_resets_on_each_trigger() {
        let mut d = Debouncer::new(150);
        d.trigger(0);
        d.trigger(100);
        assert!(!d.poll(150));
        assert!(d.poll(250));
        assert!(!d.poll(400));
    }

    #[test]
    fn scopes_are_observed_once() {
        let mut doc = Document::new();
        let host = doc.create_element("d2l-enrollment-card");
        doc.append_child(doc.root(), host);
        doc.attach_shadow(host, ShadowMode::Open);

        let root = doc.root();
        let mut w = ChangeWatcher::new(150);
        assert_eq!(w.watch(&mut doc, root), 2);
        assert_eq!(w.watch(&mut doc, root), 0);
        assert_eq!(doc.subscription_count(), 2);
        assert_eq!(w.observed().len(), 2);
    }

    #[test]
    fn nested_scopes_inside_inserted_nodes_are_attached() {
        let mut doc = Document::new();
        let root = doc.root();
        let mut w = ChangeWatcher::new(150);
        w.watch(&mut doc, root);

        // build a detached host with an already-populated nested scope
        let outer = doc.create_element("d2l-my-courses");
        let outer_root = doc.attach_shadow(outer, ShadowMode::Open);
        let inner = doc.create_element("d2l-card");
        doc.append_child(outer_root, inner);
        let inner_root = doc.attach_shadow(inner, ShadowMode::Open);
        doc.append_child(root, outer);

        let records = doc.take_mutation_records();
        assert!(w.handle_records(&mut doc, &records, 10));
        assert!(w.observed().contains(&doc, outer_root));
        assert!(w.observed().contains(&doc, inner_root));
        assert_eq!(w.next_deadline(), Some(160));
    }

    #[test]
    fn removals_alone_do_not_arm_the_timer() {
        let mut doc = Document::new();
        let root = doc.root();
        let el = doc.create_element("div");
        doc.append_child(root, el);
        let mut w = ChangeWatcher::new(150);
        w.watch(&mut doc, root);
        doc.remove_child(root, el);
        let records = doc.take_mutation_records();
        assert!(!w.handle_records(&mut doc, &records, 0));
        assert_eq!(w.next_deadline(), None);
    }
}
