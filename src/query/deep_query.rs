use tracing::debug;

use crate::dom::document::Document;
use crate::dom::events::{MutationObserverId, MutationObserverInit};
use crate::dom::node::{NodeId, ShadowMode};
use crate::error::EngineError;
use crate::query::selector::SelectorList;

/// Element queries that see through open and (with privileged access)
/// closed shadow roots. Stateless: every call re-reads the live tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomQueryService;

impl DomQueryService {
    pub fn new() -> Self {
        DomQueryService
    }

    /// Shadow root of `host` as the engine can see it. Open roots come from
    /// the public accessor; closed roots need privileged access. A throwing
    /// privileged accessor is treated as "no shadow root".
    pub fn shadow_root(&self, doc: &Document, host: NodeId) -> Option<NodeId> {
        let (shadow, mode) = doc.attached_shadow(host)?;
        if mode == ShadowMode::Open {
            return Some(shadow);
        }
        if !doc.privileged_shadow_access {
            return None;
        }
        if doc.element(host).is_some_and(|e| e.shadow_access_throws) {
            debug!(host = host.0, "privileged shadow root access failed, skipping host");
            return None;
        }
        Some(shadow)
    }

    // ========================================================================
    // Selector queries
    // ========================================================================

    /// All elements matching `selector` under `root` (exclusive) followed by
    /// matches inside every reachable shadow root, in discovery order.
    pub fn deep_query(&self, doc: &Document, root: NodeId, selector: &SelectorList) -> Vec<NodeId> {
        let mut results = query_tree(doc, root, selector);
        for shadow in self.shadow_roots_under(doc, root) {
            results.extend(query_tree(doc, shadow, selector));
        }
        results
    }

    pub fn deep_query_str(
        &self,
        doc: &Document,
        root: NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>, EngineError> {
        let selector = SelectorList::parse(selector)?;
        Ok(self.deep_query(doc, root, &selector))
    }

    /// Like `deep_query`, and registers `observer` on every shadow root found
    /// so later changes inside them are reported.
    pub fn deep_query_observed(
        &self,
        doc: &mut Document,
        root: NodeId,
        selector: &SelectorList,
        observer: MutationObserverId,
    ) -> Vec<NodeId> {
        let mut results = query_tree(doc, root, selector);
        let shadows = self.shadow_roots_under(doc, root);
        for shadow in shadows {
            results.extend(query_tree(doc, shadow, selector));
            doc.observe(observer, shadow, MutationObserverInit::all());
        }
        results
    }

    /// Every shadow root reachable from `root`: roots of `:defined` hosts in
    /// the tree, each followed by the roots nested inside it.
    pub fn shadow_roots_under(&self, doc: &Document, root: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        for node in doc.descendants(root) {
            let defined = doc.element(node).is_some_and(|e| e.defined);
            if !defined {
                continue;
            }
            if let Some(shadow) = self.shadow_root(doc, node) {
                found.push(shadow);
                found.extend(self.shadow_roots_under(doc, shadow));
            }
        }
        found
    }

    // ========================================================================
    // Predicate walks
    // ========================================================================

    /// Lazy depth-first element walk from `root` (inclusive) that enters a
    /// host's shadow tree right after the host.
    pub fn walk<'a>(&self, doc: &'a Document, root: NodeId) -> ShadowWalk<'a> {
        ShadowWalk {
            doc,
            service: *self,
            stack: vec![root],
            discovered: Vec::new(),
        }
    }

    pub fn walk_filtered<F>(&self, doc: &Document, root: NodeId, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        self.walk(doc, root).filter(|n| predicate(doc, *n)).collect()
    }

    pub fn walk_filtered_observed<F>(
        &self,
        doc: &mut Document,
        root: NodeId,
        predicate: F,
        observer: MutationObserverId,
    ) -> Vec<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        let (results, shadows) = {
            let doc_ref: &Document = doc;
            let mut walk = self.walk(doc_ref, root);
            let results: Vec<NodeId> = walk.by_ref().filter(|n| predicate(doc_ref, *n)).collect();
            (results, walk.discovered)
        };
        for shadow in shadows {
            doc.observe(observer, shadow, MutationObserverInit::all());
        }
        results
    }
}

fn query_tree(doc: &Document, root: NodeId, selector: &SelectorList) -> Vec<NodeId> {
    doc.descendants(root)
        .into_iter()
        .filter(|n| selector.matches(doc, *n))
        .collect()
}

/// Iterator behind `walk_filtered`. Callers that only need the first match
/// stop the walk early.
pub struct ShadowWalk<'a> {
    doc: &'a Document,
    service: DomQueryService,
    stack: Vec<NodeId>,
    discovered: Vec<NodeId>,
}

impl ShadowWalk<'_> {
    /// Shadow roots entered so far.
    pub fn discovered(&self) -> &[NodeId] {
        &self.discovered
    }
}

impl Iterator for ShadowWalk<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(node) = self.stack.pop() {
            self.stack
                .extend(self.doc.children(node).iter().rev().copied());

            if let Some(shadow) = self.service.shadow_root(self.doc, node) {
                self.discovered.push(shadow);
                self.stack
                    .extend(self.doc.children(shadow).iter().rev().copied());
            }

            if self.doc.is_element(node) {
                return Some(node);
            }
        }
        None
    }
}
