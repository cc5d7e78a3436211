//! Structural knowledge of the host dashboard's markup.
//!
//! The host publishes no schema, so every selector the overlay relies on
//! lives behind [`HostMarkup`]. A markup change on the host side means a new
//! implementation here, not changes in the detector or renderer.

mod dashboard;

pub use dashboard::DashboardMarkup;

use crate::config::Placement;
use crate::dom::{Document, NodeId};

/// Where a new widget goes relative to its insertion anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// Immediately before the anchor
    Before,
    /// Immediately after the anchor
    After,
    /// As the anchor's last child
    Append,
}

/// A resolved insertion target inside a node container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionPoint {
    pub anchor: NodeId,
    pub position: InsertPosition,
}

impl InsertionPoint {
    /// Attach `fragment` at this point. Returns false if the anchor is gone.
    pub fn insert(&self, doc: &mut Document, fragment: NodeId) -> bool {
        match self.position {
            InsertPosition::Before => doc.insert_before(self.anchor, fragment),
            InsertPosition::After => doc.insert_after(self.anchor, fragment),
            InsertPosition::Append => doc.append_child(self.anchor, fragment),
        }
    }
}

/// Capability interface over the host page structure
pub trait HostMarkup: Send + Sync {
    /// The section holding the node list, if rendered
    fn find_primary_section(&self, doc: &Document) -> Option<NodeId>;

    /// Container for the node labelled `name` (trimmed, exact match)
    fn find_entity_anchor(&self, doc: &Document, name: &str) -> Option<NodeId>;

    /// Where a new widget should be attached inside `container`
    fn find_insertion_point(
        &self,
        doc: &Document,
        container: NodeId,
        placement: Placement,
    ) -> Option<InsertionPoint>;

    /// CSS rule hiding the host's own traffic row
    fn hidden_css(&self) -> &str {
        ""
    }
}
