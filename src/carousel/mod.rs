//! Rotating content regions inside widgets.
//!
//! Each registered region cycles through a fixed list of fragments (time
//! range, next update). Entries whose element has left the document are
//! pruned on every tick.

mod fade;

pub use fade::{fade_swap, FadeScheduler};

use parking_lot::Mutex;

use crate::dom::{Document, NodeId};

/// One rotating region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarouselEntry {
    /// Element whose content rotates
    pub element: NodeId,
    /// Fragments to rotate through, in order
    pub contents: Vec<String>,
    /// Index of the fragment currently shown
    pub position: usize,
}

/// Registry of every rotating region on the page
#[derive(Debug, Default)]
pub struct CarouselRegistry {
    entries: Mutex<Vec<CarouselEntry>>,
}

impl CarouselRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `element`, replacing any previous entry for it
    pub fn register(&self, element: NodeId, contents: Vec<String>) {
        let mut entries = self.entries.lock();
        entries.retain(|e| e.element != element);
        entries.push(CarouselEntry {
            element,
            contents,
            position: 0,
        });
    }

    /// Replace the rotation contents of a registered element.
    ///
    /// Returns the fragment for the current position so the caller can show
    /// fresh data right away, or `None` if `element` is not registered.
    pub fn update_contents(&self, element: NodeId, contents: Vec<String>) -> Option<String> {
        let mut entries = self.entries.lock();
        let entry = entries.iter_mut().find(|e| e.element == element)?;
        if entry.position >= contents.len() {
            entry.position = 0;
        }
        entry.contents = contents;
        entry.contents.get(entry.position).cloned()
    }

    pub fn contains(&self, element: NodeId) -> bool {
        self.entries.lock().iter().any(|e| e.element == element)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop entries whose element is no longer attached. Returns how many.
    pub fn prune(&self, doc: &Document) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| doc.is_connected(e.element));
        before - entries.len()
    }

    /// Prune, then advance every region with more than one fragment.
    ///
    /// Returns the `(element, fragment)` swaps to perform.
    pub fn tick(&self, doc: &Document) -> Vec<(NodeId, String)> {
        self.prune(doc);
        let mut entries = self.entries.lock();
        entries
            .iter_mut()
            .filter(|e| e.contents.len() > 1)
            .map(|e| {
                e.position = (e.position + 1) % e.contents.len();
                (e.element, e.contents[e.position].clone())
            })
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
