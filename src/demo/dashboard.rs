//! A host page that keeps re-rendering its node list the way a reactive
//! frontend does: sometimes the whole section is swapped for a new
//! instance, sometimes the cards are only reordered.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::dom::{Document, NodeId, Selector, SharedDocument};
use crate::render::{read_widget, WIDGET_CLASS};

/// Section layouts the dashboard switches between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Grid,
    List,
}

impl Layout {
    fn class(self) -> &'static str {
        match self {
            Layout::Grid => "node-grid",
            Layout::List => "node-list",
        }
    }

    fn toggled(self) -> Self {
        match self {
            Layout::Grid => Layout::List,
            Layout::List => Layout::Grid,
        }
    }
}

/// What a re-render did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rerender {
    /// A new section instance replaced the old one
    Replaced(NodeId),
    /// Cards of the current section were reordered
    Reordered(NodeId),
    /// Nothing was rendered yet; the section was created
    Rendered(NodeId),
}

/// Demo host page
pub struct DemoDashboard {
    document: SharedDocument,
    nodes: Vec<String>,
    layout: Mutex<Layout>,
    renders: AtomicUsize,
}

impl DemoDashboard {
    pub fn new(document: SharedDocument, nodes: Vec<String>) -> Self {
        Self {
            document,
            nodes,
            layout: Mutex::new(Layout::Grid),
            renders: AtomicUsize::new(0),
        }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    /// Current section, if rendered
    pub fn section(&self) -> Option<NodeId> {
        let doc = self.document.lock();
        self.section_in(&doc)
    }

    /// Render the node list the first time
    pub fn render(&self) -> NodeId {
        let mut doc = self.document.lock();
        let layout = *self.layout.lock();
        let section = build_section(&mut doc, layout, &self.nodes);
        let body = doc.body();
        doc.append_child(body, section);
        section
    }

    /// Next re-render step: even steps replace the section, odd steps
    /// reorder its cards
    pub fn rerender(&self) -> Rerender {
        let Some(current) = self.section() else {
            return Rerender::Rendered(self.render());
        };
        let step = self.renders.fetch_add(1, Ordering::SeqCst);
        let mut doc = self.document.lock();

        if step % 2 == 0 {
            let mut layout = self.layout.lock();
            *layout = layout.toggled();
            let section = build_section(&mut doc, *layout, &self.nodes);
            doc.replace_with(current, section);
            debug!("Demo: replaced section with {}", layout.class());
            Rerender::Replaced(section)
        } else {
            let mut cards = doc.children(current).to_vec();
            cards.rotate_left(1);
            doc.replace_children(current, cards);
            debug!("Demo: reordered cards");
            Rerender::Reordered(current)
        }
    }

    /// Re-render every `interval` until the handle is aborted
    pub fn start(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                self.rerender();
            }
        })
    }

    /// One line per card with the values its widget displays
    pub fn widget_summary(&self) -> Vec<String> {
        let doc = self.document.lock();
        let Some(section) = self.section_in(&doc) else {
            return Vec::new();
        };
        doc.children(section)
            .iter()
            .map(|&card| {
                let name = doc
                    .query_selector(card, &Selector::class("node-name"))
                    .map(|label| doc.text_content(label))
                    .unwrap_or_default();
                match doc.query_selector(card, &Selector::class(WIDGET_CLASS)) {
                    Some(widget) => {
                        let w = read_widget(&doc, widget);
                        format!(
                            "{}: [{}] {} / {} {} | {}",
                            name, w.cycle, w.used, w.total, w.percent, w.carousel
                        )
                    }
                    None => format!("{}: -", name),
                }
            })
            .collect()
    }

    fn section_in(&self, doc: &Document) -> Option<NodeId> {
        let layout = *self.layout.lock();
        doc.query_selector(doc.body(), &Selector::class(layout.class()))
    }
}

fn build_section(doc: &mut Document, layout: Layout, nodes: &[String]) -> NodeId {
    let section = doc.create_element("div", &[layout.class()]);
    for name in nodes {
        let card = build_card(doc, name);
        doc.append_child(section, card);
    }
    section
}

/// ```text
/// div.node-card
///   div.node-header > span.node-name
///   div.node-body   > div.node-stats, div.node-network
///   div.node-traffic
///   div.node-footer
/// ```
fn build_card(doc: &mut Document, name: &str) -> NodeId {
    let card = doc.create_element("div", &["node-card"]);

    let header = doc.create_element("div", &["node-header"]);
    let label = doc.create_element("span", &["node-name"]);
    doc.set_text(label, name);
    doc.append_child(header, label);
    doc.append_child(card, header);

    let body = doc.create_element("div", &["node-body"]);
    let stats = doc.create_element("div", &["node-stats"]);
    doc.set_text(stats, "CPU 3% | MEM 41%");
    doc.append_child(body, stats);
    let network = doc.create_element("div", &["node-network"]);
    doc.set_text(network, "up 1.2 MB/s | down 3.4 MB/s");
    doc.append_child(body, network);
    doc.append_child(card, body);

    let traffic = doc.create_element("div", &["node-traffic"]);
    doc.set_text(traffic, "native traffic");
    doc.append_child(card, traffic);

    let footer = doc.create_element("div", &["node-footer"]);
    doc.append_child(card, footer);
    card
}
