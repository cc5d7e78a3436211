use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::observer::ObserverRegistry;
use super::{MutationRecord, ObserveOptions, ObserverId, Selector};

/// Shared document handle; the lock is never held across an `.await`
pub type SharedDocument = Arc<Mutex<Document>>;

/// Arena index of an element. Ids are never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A single element node
#[derive(Debug, Clone)]
pub struct Element {
    /// Lowercase tag name
    pub tag: String,
    /// Class list in insertion order
    pub classes: Vec<String>,
    /// Own inner content (text or an HTML fragment rendered as-is)
    pub text: String,
    /// Inline style properties
    pub style: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(tag: &str, classes: &[&str]) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            text: String::new(),
            style: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Check whether the class list contains `class`
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Parent element, if attached
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Direct children in document order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// In-memory document: `html > (head, body)` plus any detached fragments
/// under construction.
///
/// Every child-list change is reported to the observer registry before it
/// returns, so observers see mutations in the order they were applied.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Option<Element>>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    observers: ObserverRegistry,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with `head` and `body`
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            observers: ObserverRegistry::new(),
        };
        doc.root = doc.create_element("html", &[]);
        doc.head = doc.create_element("head", &[]);
        doc.body = doc.create_element("body", &[]);
        doc.link(doc.root, doc.head, None);
        doc.link(doc.root, doc.body, None);
        doc
    }

    /// Wrap in the shared handle used by the overlay
    pub fn shared() -> SharedDocument {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str, classes: &[&str]) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Element::new(tag, classes)));
        id
    }

    /// Look up a live element
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Direct children of `id` (empty for unknown ids)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map(|e| e.children()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.element(id).and_then(|e| e.parent)
    }

    /// Own inner content of `id`
    pub fn text(&self, id: NodeId) -> &str {
        self.element(id).map(|e| e.text.as_str()).unwrap_or("")
    }

    /// Replace the inner content of `id`. Returns false for unknown ids.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> bool {
        match self.element_mut(id) {
            Some(el) => {
                el.text = text.into();
                true
            }
            None => false,
        }
    }

    /// Concatenated content of `id` and all its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(el) = self.element(id) {
            out.push_str(&el.text);
            for &child in &el.children {
                self.collect_text(child, out);
            }
        }
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<&str> {
        self.element(id)
            .and_then(|e| e.style.get(property))
            .map(String::as_str)
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: impl Into<String>) -> bool {
        match self.element_mut(id) {
            Some(el) => {
                el.style.insert(property.to_string(), value.into());
                true
            }
            None => false,
        }
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if let Some(el) = self.element_mut(id) {
            if !el.has_class(class) {
                el.classes.push(class.to_string());
            }
        }
    }

    /// Whether `id` is reachable from the document root
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.element(node).and_then(|e| e.parent);
        }
        false
    }

    /// Whether `node` is `ancestor` or one of its descendants
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors_inclusive(node).contains(&ancestor)
    }

    fn ancestors_inclusive(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if self.element(node).is_none() {
                break;
            }
            chain.push(node);
            current = self.element(node).and_then(|e| e.parent);
        }
        chain
    }

    // =========================================================
    // Child-list mutations (reported to observers)
    // =========================================================

    /// Append `child` as the last child of `parent`, moving it if attached
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.insert_at(parent, child, None)
    }

    /// Insert `child` before `reference` under the reference's parent
    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) -> bool {
        match self.parent(reference) {
            Some(parent) => self.insert_at(parent, child, Some(reference)),
            None => false,
        }
    }

    /// Insert `child` right after `reference` under the reference's parent
    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        let next = {
            let siblings = self.children(parent);
            siblings
                .iter()
                .position(|&c| c == reference)
                .and_then(|i| siblings.get(i + 1).copied())
        };
        self.insert_at(parent, child, next)
    }

    fn insert_at(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) -> bool {
        if self.element(parent).is_none() || self.element(child).is_none() {
            return false;
        }
        // A node cannot become its own descendant
        if self.contains(child, parent) {
            return false;
        }
        if before == Some(child) {
            return true;
        }
        self.detach(child);
        let chain = self.ancestors_inclusive(parent);
        self.link(parent, child, before);
        self.observers.queue(
            MutationRecord {
                target: parent,
                added: vec![child],
                removed: Vec::new(),
            },
            &chain,
        );
        true
    }

    fn link(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        if let Some(el) = self.element_mut(parent) {
            let index = before
                .and_then(|b| el.children.iter().position(|&c| c == b))
                .unwrap_or(el.children.len());
            el.children.insert(index, child);
        }
        if let Some(el) = self.element_mut(child) {
            el.parent = Some(parent);
        }
    }

    fn unlink(&mut self, child: NodeId) -> Option<NodeId> {
        let parent = self.parent(child)?;
        if let Some(el) = self.element_mut(parent) {
            el.children.retain(|&c| c != child);
        }
        if let Some(el) = self.element_mut(child) {
            el.parent = None;
        }
        Some(parent)
    }

    /// Detach `node` from its parent but keep it alive for re-insertion
    pub fn detach(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.parent(node) else {
            return false;
        };
        let chain = self.ancestors_inclusive(parent);
        self.unlink(node);
        self.observers.queue(
            MutationRecord {
                target: parent,
                added: Vec::new(),
                removed: vec![node],
            },
            &chain,
        );
        true
    }

    /// Detach `node` and destroy it together with its subtree
    pub fn remove(&mut self, node: NodeId) -> bool {
        if self.element(node).is_none() {
            return false;
        }
        self.detach(node);
        self.drop_subtree(node);
        true
    }

    /// Replace `old` with `new` in place, destroying `old`
    pub fn replace_with(&mut self, old: NodeId, new: NodeId) -> bool {
        let Some(parent) = self.parent(old) else {
            return false;
        };
        if self.element(new).is_none() || old == new {
            return false;
        }
        if self.contains(new, parent) {
            return false;
        }
        self.detach(new);
        let chain = self.ancestors_inclusive(parent);
        self.link(parent, new, Some(old));
        self.unlink(old);
        self.observers.queue(
            MutationRecord {
                target: parent,
                added: vec![new],
                removed: vec![old],
            },
            &chain,
        );
        self.drop_subtree(old);
        true
    }

    /// Swap the whole child list of `parent` in one mutation.
    ///
    /// Old children that do not reappear in `children` are destroyed.
    pub fn replace_children(&mut self, parent: NodeId, children: Vec<NodeId>) -> bool {
        if self.element(parent).is_none() {
            return false;
        }
        for &child in &children {
            if self.element(child).is_none() || self.contains(child, parent) {
                return false;
            }
        }
        let chain = self.ancestors_inclusive(parent);
        let old: Vec<NodeId> = self.children(parent).to_vec();
        for &child in &old {
            self.unlink(child);
        }
        for &child in &children {
            self.unlink(child);
            self.link(parent, child, None);
        }
        let removed: Vec<NodeId> = old
            .iter()
            .copied()
            .filter(|c| !children.contains(c))
            .collect();
        self.observers.queue(
            MutationRecord {
                target: parent,
                added: children,
                removed: removed.clone(),
            },
            &chain,
        );
        for node in removed {
            self.drop_subtree(node);
        }
        true
    }

    fn drop_subtree(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(slot) = self.nodes.get_mut(id.0) {
                if let Some(el) = slot.take() {
                    stack.extend(el.children);
                }
            }
        }
    }

    // =========================================================
    // Queries
    // =========================================================

    /// First descendant of `scope` (document order) matching `selector`
    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(el) = self.element(id) else {
                continue;
            };
            if selector.matches(el) {
                return Some(id);
            }
            stack.extend(el.children.iter().rev().copied());
        }
        None
    }

    /// All descendants of `scope` matching `selector`, in document order
    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(el) = self.element(id) else {
                continue;
            };
            if selector.matches(el) {
                found.push(id);
            }
            stack.extend(el.children.iter().rev().copied());
        }
        found
    }

    /// Direct child of `parent` matching `selector`
    pub fn child_matching(&self, parent: NodeId, selector: &Selector) -> Option<NodeId> {
        self.children(parent).iter().copied().find(|&c| {
            self.element(c)
                .map(|el| selector.matches(el))
                .unwrap_or(false)
        })
    }

    /// Indented tag/class/text outline of a subtree, for diagnostics
    pub fn outline(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_outline(id, 0, &mut out);
        out
    }

    fn write_outline(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(el) = self.element(id) else {
            return;
        };
        out.push_str(&"  ".repeat(depth));
        out.push_str(&el.tag);
        for class in &el.classes {
            out.push('.');
            out.push_str(class);
        }
        if !el.text.is_empty() {
            out.push_str(&format!(" {:?}", el.text));
        }
        if let Some(width) = el.style.get("width") {
            out.push_str(&format!(" [width: {}]", width));
        }
        out.push('\n');
        for &child in &el.children {
            self.write_outline(child, depth + 1, out);
        }
    }

    // =========================================================
    // Observers
    // =========================================================

    /// Register a child-list observer on `target`
    pub fn observe(&mut self, target: NodeId, options: ObserveOptions) -> ObserverId {
        self.observers.observe(target, options)
    }

    /// Disconnect an observer; its queued records are dropped
    pub fn disconnect(&mut self, id: ObserverId) -> bool {
        self.observers.disconnect(id)
    }

    pub fn is_observing(&self, id: ObserverId) -> bool {
        self.observers.is_active(id)
    }

    /// Take the batch of records queued for `id` since the last call
    pub fn take_records(&mut self, id: ObserverId) -> Vec<MutationRecord> {
        self.observers.take_records(id)
    }

    /// Whether any registration has undelivered records
    pub fn has_pending_records(&self) -> bool {
        self.observers.has_pending()
    }

    /// Wakes whoever delivers batches when records are queued
    pub fn mutation_notify(&self) -> Arc<Notify> {
        self.observers.notify_handle()
    }
}
