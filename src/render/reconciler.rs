//! Bring derived widgets in line with the latest usage data.

use tracing::debug;

use super::widget::{apply_view, build_widget, carousel_region, find_widget, WidgetView};
use crate::carousel::CarouselRegistry;
use crate::config::OverlayConfig;
use crate::dom::Document;
use crate::host::HostMarkup;
use crate::usage::{flatten_cycles, UsagePayload};

/// What a reconciliation pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// New widgets attached
    pub inserted: usize,
    /// Existing widgets refreshed in place
    pub updated: usize,
    /// Widgets removed because display is off
    pub removed: usize,
    /// Entities with no anchor or insertion point this pass
    pub skipped: usize,
}

/// Reconcile widgets against `payload`.
///
/// Safe to call any number of times: an existing widget is updated in place
/// and never rebuilt, so the carousel registry keeps pointing at live
/// regions. Entities the host has not rendered yet are skipped and picked up
/// on a later pass.
pub fn reconcile(
    doc: &mut Document,
    markup: &dyn HostMarkup,
    payload: &UsagePayload,
    config: &OverlayConfig,
    carousel: &CarouselRegistry,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for (name, usage) in flatten_cycles(payload) {
        let Some(container) = markup.find_entity_anchor(doc, &name) else {
            debug!("Reconcile: no anchor for {:?}", name);
            report.skipped += 1;
            continue;
        };
        let existing = find_widget(doc, container, &usage.id);

        if !config.show_stats {
            if let Some(widget) = existing {
                doc.remove(widget);
                report.removed += 1;
            }
            continue;
        }

        let view = WidgetView::from_usage(&usage);
        let contents = view.carousel_contents();

        if let Some(widget) = existing {
            apply_view(doc, widget, &view);
            if let Some(region) = carousel_region(doc, widget) {
                let shown = match carousel.update_contents(region, contents.clone()) {
                    Some(current) => current,
                    None => {
                        if config.carousel_interval_ms > 0 {
                            carousel.register(region, contents);
                        }
                        view.time_range.clone()
                    }
                };
                doc.set_text(region, shown);
            }
            report.updated += 1;
            continue;
        }

        let Some(point) = markup.find_insertion_point(doc, container, config.placement) else {
            debug!("Reconcile: no insertion point for {:?}", name);
            report.skipped += 1;
            continue;
        };

        let (widget, region) = build_widget(doc, &usage.id, &view);
        if !point.insert(doc, widget) {
            doc.remove(widget);
            report.skipped += 1;
            continue;
        }
        if config.carousel_interval_ms > 0 {
            carousel.register(region, contents);
        }
        report.inserted += 1;
    }

    report
}
