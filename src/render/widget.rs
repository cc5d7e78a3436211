//! Widget fragment: build, locate and update in place.
//!
//! ```text
//! div.tl-widget.tl-widget-<id>
//!   div.tl-head   > span.tl-cycle
//!   div.tl-usage  > span.tl-used, span.tl-sep, span.tl-total, span.tl-percent
//!   div.tl-carousel
//!   div.tl-bar    > div.tl-bar-fill
//! ```

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::dom::{Document, NodeId, Selector};
use crate::format::{
    color_for_percentage, compute_percentage, format_byte_size, format_date, ByteSize,
};
use crate::usage::EntityUsage;

/// Class shared by every widget
pub const WIDGET_CLASS: &str = "tl-widget";

static UNSAFE_CLASS_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9-]").unwrap());

static CYCLE: Lazy<Selector> = Lazy::new(|| Selector::class("tl-cycle"));
static USED: Lazy<Selector> = Lazy::new(|| Selector::class("tl-used"));
static TOTAL: Lazy<Selector> = Lazy::new(|| Selector::class("tl-total"));
static PERCENT: Lazy<Selector> = Lazy::new(|| Selector::class("tl-percent"));
static CAROUSEL: Lazy<Selector> = Lazy::new(|| Selector::class("tl-carousel"));
static BAR_FILL: Lazy<Selector> = Lazy::new(|| Selector::class("tl-bar-fill"));

/// Entity-scoped class, e.g. `tl-widget-s1`.
///
/// Bytes outside `[A-Za-z0-9-]` (underscore included) are written as `_xx`
/// hex, so distinct ids never share a class.
pub fn widget_class(entity_id: &str) -> String {
    let escaped = UNSAFE_CLASS_CHARS.replace_all(entity_id, |caps: &Captures| {
        caps[0]
            .bytes()
            .map(|b| format!("_{:02x}", b))
            .collect::<String>()
    });
    format!("{}-{}", WIDGET_CLASS, escaped)
}

/// Everything a widget displays, computed from one usage record
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetView {
    pub cycle_label: String,
    pub used: ByteSize,
    pub total: ByteSize,
    /// Unclamped percentage with two decimals
    pub percent: String,
    pub color: String,
    pub time_range: String,
    pub next_update: Option<String>,
}

impl WidgetView {
    pub fn from_usage(usage: &EntityUsage) -> Self {
        let percent = compute_percentage(usage.used, usage.max);
        let color = color_for_percentage(percent.parse::<f64>().unwrap_or(0.0));
        let next_update = usage
            .next_update
            .as_deref()
            .map(format_date)
            .filter(|d| !d.is_empty())
            .map(|d| format!("<span class=\"tl-next\">Next update {}</span>", d));

        Self {
            cycle_label: usage.cycle_label.clone(),
            used: format_byte_size(usage.used),
            total: format_byte_size(usage.max),
            percent,
            color,
            time_range: format!(
                "<span class=\"tl-range\">{} ~ {}</span>",
                format_date(&usage.from),
                format_date(&usage.to)
            ),
            next_update,
        }
    }

    /// Fragments the carousel rotates through; the time range comes first
    pub fn carousel_contents(&self) -> Vec<String> {
        let mut contents = vec![self.time_range.clone()];
        if let Some(ref next) = self.next_update {
            contents.push(next.clone());
        }
        contents
    }

    /// Bar width: the percentage as-is, not clamped to 100
    pub fn bar_width(&self) -> String {
        format!("{}%", self.percent)
    }
}

/// Existing widget for `entity_id` under `container`
pub fn find_widget(doc: &Document, container: NodeId, entity_id: &str) -> Option<NodeId> {
    doc.query_selector(container, &Selector::class(&widget_class(entity_id)))
}

/// Carousel region of a widget
pub fn carousel_region(doc: &Document, widget: NodeId) -> Option<NodeId> {
    doc.query_selector(widget, &CAROUSEL)
}

fn child(doc: &mut Document, parent: NodeId, tag: &str, class: &str, text: &str) -> NodeId {
    let el = doc.create_element(tag, &[class]);
    doc.set_text(el, text);
    doc.append_child(parent, el);
    el
}

/// Build a detached widget. Returns `(widget, carousel region)`.
pub fn build_widget(doc: &mut Document, entity_id: &str, view: &WidgetView) -> (NodeId, NodeId) {
    let scoped = widget_class(entity_id);
    let widget = doc.create_element("div", &[WIDGET_CLASS, &scoped]);

    let head = child(doc, widget, "div", "tl-head", "");
    child(doc, head, "span", "tl-cycle", "");

    let usage = child(doc, widget, "div", "tl-usage", "");
    child(doc, usage, "span", "tl-used", "");
    child(doc, usage, "span", "tl-sep", " / ");
    child(doc, usage, "span", "tl-total", "");
    child(doc, usage, "span", "tl-percent", "");

    let region = child(doc, widget, "div", "tl-carousel", "");
    doc.set_text(region, view.time_range.clone());

    let bar = child(doc, widget, "div", "tl-bar", "");
    child(doc, bar, "div", "tl-bar-fill", "");

    apply_view(doc, widget, view);
    (widget, region)
}

/// Write every data-bearing field of `view` into an existing widget.
///
/// The carousel region is left to the caller since its content depends on
/// the rotation state.
pub fn apply_view(doc: &mut Document, widget: NodeId, view: &WidgetView) {
    let fields = [
        (&*CYCLE, view.cycle_label.clone()),
        (&*USED, view.used.to_string()),
        (&*TOTAL, view.total.to_string()),
        (&*PERCENT, format!("{}%", view.percent)),
    ];
    for (selector, text) in fields {
        if let Some(el) = doc.query_selector(widget, selector) {
            doc.set_text(el, text);
        }
    }
    if let Some(fill) = doc.query_selector(widget, &BAR_FILL) {
        doc.set_style(fill, "width", view.bar_width());
        doc.set_style(fill, "background-color", view.color.clone());
    }
}

/// Displayed values read back from a widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetFields {
    pub cycle: String,
    pub used: String,
    pub total: String,
    pub percent: String,
    pub carousel: String,
    pub bar_width: String,
    pub bar_color: String,
}

/// Read the rendered values of a widget
pub fn read_widget(doc: &Document, widget: NodeId) -> WidgetFields {
    let text = |sel: &Selector| {
        doc.query_selector(widget, sel)
            .map(|el| doc.text(el).to_string())
            .unwrap_or_default()
    };
    let fill = doc.query_selector(widget, &BAR_FILL);
    let style = |prop: &str| {
        fill.and_then(|f| doc.style(f, prop))
            .unwrap_or_default()
            .to_string()
    };

    WidgetFields {
        cycle: text(&CYCLE),
        used: text(&USED),
        total: text(&TOTAL),
        percent: text(&PERCENT),
        carousel: text(&CAROUSEL),
        bar_width: style("width"),
        bar_color: style("background-color"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn usage(used: f64, max: f64) -> EntityUsage {
        EntityUsage {
            id: "s1".to_string(),
            name: "Node-A".to_string(),
            used,
            max,
            cycle_label: "Monthly".to_string(),
            from: "2025-01-01".to_string(),
            to: "2025-02-01".to_string(),
            next_update: Some("2025-02-01 00:00:00".to_string()),
        }
    }

    #[test]
    fn test_widget_class_sanitized() {
        assert_eq!(widget_class("s1"), "tl-widget-s1");
        assert_eq!(widget_class("node a/b"), "tl-widget-node_20a_2fb");
        assert_eq!(widget_class("é"), "tl-widget-_c3_a9");
    }

    #[test]
    fn test_widget_class_distinct_ids_stay_distinct() {
        assert_eq!(widget_class("a b"), "tl-widget-a_20b");
        assert_eq!(widget_class("a_b"), "tl-widget-a_5fb");
        assert_ne!(widget_class("a b"), widget_class("a_b"));
    }

    #[test]
    fn test_view() {
        let view = WidgetView::from_usage(&usage(5e9, 5e9));
        assert_eq!(view.used.to_string(), "5.00 GB");
        assert_eq!(view.percent, "100.00");
        assert_eq!(
            view.time_range,
            "<span class=\"tl-range\">2025-01-01 ~ 2025-02-01</span>"
        );
        assert_eq!(view.carousel_contents().len(), 2);
    }

    #[test]
    fn test_view_without_next_update() {
        let mut u = usage(1.0, 2.0);
        u.next_update = Some("garbage".to_string());
        let view = WidgetView::from_usage(&u);
        assert!(view.next_update.is_none());
        assert_eq!(view.carousel_contents(), vec![view.time_range.clone()]);
    }

    #[test]
    fn test_bar_width_unclamped() {
        let view = WidgetView::from_usage(&usage(3e9, 2e9));
        assert_eq!(view.bar_width(), "150.00%");
    }

    #[test]
    fn test_build_and_read() {
        let mut doc = Document::new();
        let view = WidgetView::from_usage(&usage(1500.0, 3000.0));
        let (widget, region) = build_widget(&mut doc, "s1", &view);

        assert_eq!(carousel_region(&doc, widget), Some(region));
        let fields = read_widget(&doc, widget);
        assert_eq!(fields.cycle, "Monthly");
        assert_eq!(fields.used, "1.50 KB");
        assert_eq!(fields.total, "3.00 KB");
        assert_eq!(fields.percent, "50.00%");
        assert_eq!(fields.bar_width, "50.00%");
        assert_eq!(fields.carousel, view.time_range);
        assert_eq!(fields.bar_color, color_for_percentage(50.0));
    }

    #[test]
    fn test_find_widget_scoped_by_entity() {
        let mut doc = Document::new();
        let container = doc.create_element("div", &["node-card"]);
        let view = WidgetView::from_usage(&usage(1.0, 2.0));
        let (widget, _) = build_widget(&mut doc, "s1", &view);
        doc.append_child(container, widget);

        assert_eq!(find_widget(&doc, container, "s1"), Some(widget));
        assert_eq!(find_widget(&doc, container, "s2"), None);
    }
}
