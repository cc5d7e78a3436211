use once_cell::sync::Lazy;

use super::{HostMarkup, InsertPosition, InsertionPoint};
use crate::config::Placement;
use crate::dom::{Document, NodeId, Selector};

/// Primary section signatures, grid layout first
static SECTION_SELECTORS: Lazy<Vec<Selector>> =
    Lazy::new(|| vec![Selector::parse("div.node-grid"), Selector::parse("div.node-list")]);

static CONTAINER: Lazy<Selector> = Lazy::new(|| Selector::parse("div.node-card"));
static LABEL: Lazy<Selector> = Lazy::new(|| Selector::parse(".node-name"));

/// Inline placement: right below the live network rates
static INLINE_ANCHORS: Lazy<Vec<(Selector, InsertPosition)>> = Lazy::new(|| {
    vec![
        (Selector::parse(".node-network"), InsertPosition::After),
        (Selector::parse(".node-stats"), InsertPosition::After),
        (Selector::parse(".node-body"), InsertPosition::Append),
    ]
});

/// Footer placement: just above the card footer
static FOOTER_ANCHORS: Lazy<Vec<(Selector, InsertPosition)>> = Lazy::new(|| {
    vec![
        (Selector::parse(".node-footer"), InsertPosition::Before),
        (Selector::parse(".node-body"), InsertPosition::Append),
    ]
});

const HIDDEN_CSS: &str = ".node-card .node-traffic { display: none !important; }";

/// Markup of the node dashboard (grid and list layouts)
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardMarkup;

impl DashboardMarkup {
    pub fn new() -> Self {
        Self
    }
}

impl HostMarkup for DashboardMarkup {
    fn find_primary_section(&self, doc: &Document) -> Option<NodeId> {
        SECTION_SELECTORS
            .iter()
            .find_map(|sel| doc.query_selector(doc.body(), sel))
    }

    fn find_entity_anchor(&self, doc: &Document, name: &str) -> Option<NodeId> {
        let scope = self.find_primary_section(doc).unwrap_or(doc.body());
        let name = name.trim();
        doc.query_selector_all(scope, &CONTAINER)
            .into_iter()
            .find(|&container| {
                doc.query_selector_all(container, &LABEL)
                    .into_iter()
                    .any(|label| doc.text_content(label).trim() == name)
            })
    }

    fn find_insertion_point(
        &self,
        doc: &Document,
        container: NodeId,
        placement: Placement,
    ) -> Option<InsertionPoint> {
        let candidates = match placement {
            Placement::Inline => &*INLINE_ANCHORS,
            Placement::Footer => &*FOOTER_ANCHORS,
        };
        candidates.iter().find_map(|(sel, position)| {
            doc.query_selector(container, sel).map(|anchor| InsertionPoint {
                anchor,
                position: *position,
            })
        })
    }

    fn hidden_css(&self) -> &str {
        HIDDEN_CSS
    }
}
