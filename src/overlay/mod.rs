//! Overlay: the orchestrator wiring detector, fetch gate and reconciler.
//!
//! [`Overlay`] owns every piece of per-page state (cache slot, carousel
//! registry, timers, detector) through an [`OverlayContext`]. Nothing is
//! global: two overlays on two documents are fully independent.

mod context;
mod timers;

pub use context::OverlayContext;

use std::sync::Arc;

use crate::config::{ConfigSource, OverlayConfig};
use crate::dom::SharedDocument;
use crate::host::HostMarkup;
use crate::logging::LogSwitch;
use crate::monitor::DetectorState;
use crate::usage::UsageSource;

/// Handle to a running overlay. Dropping it tears everything down.
pub struct Overlay<S: UsageSource> {
    ctx: Arc<OverlayContext<S>>,
}

impl<S: UsageSource> Overlay<S> {
    /// Create an overlay for `document`; nothing runs until [`start`](Self::start)
    pub fn new(
        document: SharedDocument,
        source: Arc<S>,
        markup: Arc<dyn HostMarkup>,
        defaults: OverlayConfig,
        overrides: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            ctx: Arc::new(OverlayContext::new(
                document, source, markup, defaults, overrides,
            )),
        }
    }

    /// Start observing, ticking and refreshing. Must run inside a tokio runtime.
    pub fn start(&self) {
        OverlayContext::start(&self.ctx);
    }

    /// Let the `log` flag switch diagnostics on and off while running
    pub fn set_log_switch(&self, switch: Arc<dyn LogSwitch>) {
        self.ctx.set_log_switch(switch);
    }

    /// Re-merge configuration now and apply it if it changed.
    ///
    /// Returns true if the configuration was replaced.
    pub fn recheck_config(&self) -> bool {
        OverlayContext::recheck_config(&self.ctx)
    }

    /// Stop every timer and observer. Idempotent.
    pub fn shutdown(&self) {
        self.ctx.shutdown();
    }

    /// Active configuration
    pub fn config(&self) -> OverlayConfig {
        self.ctx.config()
    }

    pub fn detector_state(&self) -> DetectorState {
        self.ctx.detector_state()
    }

    /// Refresh timer loops currently alive
    pub fn live_refresh_timers(&self) -> usize {
        self.ctx.timers.live_refresh()
    }

    /// Carousel timer loops currently alive
    pub fn live_carousel_timers(&self) -> usize {
        self.ctx.timers.live_carousel()
    }

    /// Registered carousel regions
    pub fn carousel_len(&self) -> usize {
        self.ctx.carousel.len()
    }

    pub fn context(&self) -> &Arc<OverlayContext<S>> {
        &self.ctx
    }
}

impl<S: UsageSource> Drop for Overlay<S> {
    fn drop(&mut self) {
        self.ctx.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigOverrides, NoOverrides, SharedOverrides};
    use crate::dom::{Document, NodeId, Selector};
    use crate::host::DashboardMarkup;
    use crate::render::WIDGET_CLASS;
    use crate::usage::fetcher::tests::{StubSource, NODE_A};
    use crate::usage::{FetchError, UsageResponse};
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Source that answers after 500 ms and records every endpoint asked for
    #[derive(Default)]
    struct SlowSource {
        endpoints: Mutex<Vec<String>>,
    }

    impl UsageSource for SlowSource {
        async fn fetch(&self, endpoint: &str) -> Result<UsageResponse, FetchError> {
            self.endpoints.lock().push(endpoint.to_string());
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(serde_json::from_str(NODE_A)?)
        }
    }

    /// Records every level change it is asked for
    #[derive(Default)]
    struct RecordingSwitch {
        levels: Mutex<Vec<bool>>,
    }

    impl LogSwitch for RecordingSwitch {
        fn set_verbose(&self, verbose: bool) {
            self.levels.lock().push(verbose);
        }
    }

    fn card(doc: &mut Document, name: &str) -> NodeId {
        let card = doc.create_element("div", &["node-card"]);
        let label = doc.create_element("span", &["node-name"]);
        doc.set_text(label, name);
        doc.append_child(card, label);
        let network = doc.create_element("div", &["node-network"]);
        doc.append_child(card, network);
        card
    }

    /// Shared document with one grid holding a card per name
    fn dashboard(names: &[&str]) -> (SharedDocument, NodeId) {
        let document = Document::shared();
        let grid = {
            let mut doc = document.lock();
            let grid = doc.create_element("div", &["node-grid"]);
            for name in names {
                let c = card(&mut doc, name);
                doc.append_child(grid, c);
            }
            let body = doc.body();
            doc.append_child(body, grid);
            grid
        };
        (document, grid)
    }

    fn overlay(
        document: &SharedDocument,
        source: &Arc<StubSource>,
        overrides: Arc<dyn ConfigSource>,
    ) -> Overlay<StubSource> {
        Overlay::new(
            document.clone(),
            source.clone(),
            Arc::new(DashboardMarkup),
            OverlayConfig::default(),
            overrides,
        )
    }

    fn widget_count(document: &SharedDocument) -> usize {
        let doc = document.lock();
        doc.query_selector_all(doc.root(), &Selector::class(WIDGET_CLASS))
            .len()
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_inserts_widget() {
        let (document, grid) = dashboard(&["Node-A"]);
        let source = Arc::new(StubSource::new(NODE_A));
        let overlay = overlay(&document, &source, Arc::new(NoOverrides));

        overlay.start();
        settle().await;

        assert_eq!(widget_count(&document), 1);
        assert_eq!(source.calls(), 1);
        assert_eq!(overlay.detector_state(), DetectorState::Tracking(grid));
        assert_eq!(overlay.live_refresh_timers(), 1);
        assert_eq!(overlay.live_carousel_timers(), 1);
        assert_eq!(overlay.carousel_len(), 1);

        let doc = document.lock();
        let style = doc.query_selector(doc.head(), &Selector::parse("style.tl-style"));
        assert!(style.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_ignored() {
        let (document, _) = dashboard(&["Node-A"]);
        let source = Arc::new(StubSource::new(NODE_A));
        let overlay = overlay(&document, &source, Arc::new(NoOverrides));

        overlay.start();
        overlay.start();
        settle().await;

        assert_eq!(widget_count(&document), 1);
        assert_eq!(overlay.live_refresh_timers(), 1);
        let doc = document.lock();
        let styles = doc.query_selector_all(doc.head(), &Selector::parse("style.tl-style"));
        assert_eq!(styles.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_override_hides_widgets_and_keeps_one_timer_each() {
        let (document, _) = dashboard(&["Node-A"]);
        let source = Arc::new(StubSource::new(NODE_A));
        let overrides = Arc::new(SharedOverrides::new());
        let overlay = overlay(&document, &source, overrides.clone());

        overlay.start();
        settle().await;
        assert_eq!(widget_count(&document), 1);

        overrides.set(ConfigOverrides {
            show_stats: Some(false),
            ..Default::default()
        });
        tokio::time::sleep(Duration::from_millis(1100)).await;
        settle().await;

        assert!(!overlay.config().show_stats);
        assert_eq!(widget_count(&document), 0);
        assert_eq!(overlay.live_refresh_timers(), 1);
        assert_eq!(overlay.live_carousel_timers(), 1);
        // Same endpoint, so the cached payload was reused
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recheck_without_changes() {
        let (document, _) = dashboard(&["Node-A"]);
        let source = Arc::new(StubSource::new(NODE_A));
        let overlay = overlay(&document, &source, Arc::new(NoOverrides));

        overlay.start();
        settle().await;
        assert!(!overlay.recheck_config());
    }

    #[tokio::test(start_paused = true)]
    async fn test_endpoint_change_refetches() {
        let (document, _) = dashboard(&["Node-A"]);
        let source = Arc::new(StubSource::new(NODE_A));
        let overrides = Arc::new(SharedOverrides::new());
        let overlay = overlay(&document, &source, overrides.clone());

        overlay.start();
        settle().await;
        overrides.set(ConfigOverrides {
            endpoint: Some("/api/v2/cycles".to_string()),
            ..Default::default()
        });
        assert!(overlay.recheck_config());
        settle().await;

        assert_eq!(source.calls(), 2);
        assert_eq!(widget_count(&document), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_endpoint_change_during_fetch_requests_new_endpoint() {
        let (document, _) = dashboard(&["Node-A"]);
        let source = Arc::new(SlowSource::default());
        let overrides = Arc::new(SharedOverrides::new());
        let overlay = Overlay::new(
            document.clone(),
            source.clone(),
            Arc::new(DashboardMarkup),
            OverlayConfig::default(),
            overrides.clone(),
        );

        overlay.start();
        settle().await;
        overrides.set(ConfigOverrides {
            endpoint: Some("/new".to_string()),
            ..Default::default()
        });
        assert!(overlay.recheck_config());

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;

        assert_eq!(
            *source.endpoints.lock(),
            vec!["/api/v1/traffic/cycles".to_string(), "/new".to_string()]
        );
        assert_eq!(widget_count(&document), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_flag_reaches_switch() {
        let (document, _) = dashboard(&["Node-A"]);
        let source = Arc::new(StubSource::new(NODE_A));
        let overrides = Arc::new(SharedOverrides::new());
        let overlay = overlay(&document, &source, overrides.clone());
        let switch = Arc::new(RecordingSwitch::default());
        overlay.set_log_switch(switch.clone());

        overlay.start();
        settle().await;
        assert_eq!(*switch.levels.lock(), vec![false]);

        overrides.set(ConfigOverrides {
            log: Some(true),
            ..Default::default()
        });
        assert!(overlay.recheck_config());
        assert_eq!(*switch.levels.lock(), vec![false, true]);

        // Other changes leave the filter alone
        overrides.set(ConfigOverrides {
            log: Some(true),
            show_stats: Some(false),
            ..Default::default()
        });
        assert!(overlay.recheck_config());
        assert_eq!(*switch.levels.lock(), vec![false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabling_carousel_restores_time_range() {
        let (document, _) = dashboard(&["Node-A"]);
        let source = Arc::new(StubSource::new(NODE_A));
        let overrides = Arc::new(SharedOverrides::new());
        let overlay = overlay(&document, &source, overrides.clone());
        let region_text = |document: &SharedDocument| {
            let doc = document.lock();
            let region = doc
                .query_selector(doc.root(), &Selector::class("tl-carousel"))
                .unwrap();
            doc.text(region).to_string()
        };

        overlay.start();
        settle().await;
        let time_range = region_text(&document);

        tokio::time::sleep(Duration::from_millis(8_000 + 600)).await;
        settle().await;
        assert_ne!(region_text(&document), time_range);

        overrides.set(ConfigOverrides {
            carousel_interval_ms: Some(0),
            ..Default::default()
        });
        assert!(overlay.recheck_config());
        settle().await;

        assert_eq!(overlay.carousel_len(), 0);
        assert_eq!(region_text(&document), time_range);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabling_carousel_stops_its_timer() {
        let (document, _) = dashboard(&["Node-A"]);
        let source = Arc::new(StubSource::new(NODE_A));
        let overrides = Arc::new(SharedOverrides::new());
        let overlay = overlay(&document, &source, overrides.clone());

        overlay.start();
        settle().await;
        overrides.set(ConfigOverrides {
            carousel_interval_ms: Some(0),
            ..Default::default()
        });
        assert!(overlay.recheck_config());
        settle().await;

        assert_eq!(overlay.live_carousel_timers(), 0);
        assert_eq!(overlay.live_refresh_timers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_section_rerender_uses_cache() {
        let (document, grid) = dashboard(&["Node-A"]);
        let source = Arc::new(StubSource::new(NODE_A));
        let overlay = overlay(&document, &source, Arc::new(NoOverrides));

        overlay.start();
        settle().await;

        let replacement = {
            let mut doc = document.lock();
            let list = doc.create_element("div", &["node-list"]);
            let c = card(&mut doc, "Node-A");
            doc.append_child(list, c);
            doc.replace_with(grid, list);
            list
        };
        settle().await;

        assert_eq!(overlay.detector_state(), DetectorState::Tracking(replacement));
        let doc = document.lock();
        let widgets = doc.query_selector_all(replacement, &Selector::class(WIDGET_CLASS));
        assert_eq!(widgets.len(), 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_card_added_later_gets_widget() {
        let (document, grid) = dashboard(&[]);
        let source = Arc::new(StubSource::new(NODE_A));
        let overlay = overlay(&document, &source, Arc::new(NoOverrides));

        overlay.start();
        settle().await;
        assert_eq!(widget_count(&document), 0);

        {
            let mut doc = document.lock();
            let c = card(&mut doc, "Node-A");
            doc.append_child(grid, c);
        }
        settle().await;

        assert_eq!(widget_count(&document), 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_timer_refetches() {
        let (document, _) = dashboard(&["Node-A"]);
        let source = Arc::new(StubSource::new(NODE_A));
        let overlay = overlay(&document, &source, Arc::new(NoOverrides));

        overlay.start();
        settle().await;
        assert_eq!(source.calls(), 1);

        tokio::time::sleep(Duration::from_millis(60_500)).await;
        settle().await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_leaves_page_alone() {
        let (document, _) = dashboard(&["Node-A"]);
        let source = Arc::new(StubSource::failing());
        let overlay = overlay(&document, &source, Arc::new(NoOverrides));

        overlay.start();
        settle().await;

        assert_eq!(widget_count(&document), 0);
        assert!(source.calls() >= 1);
        assert!(matches!(overlay.detector_state(), DetectorState::Tracking(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_carousel_rotates_region() {
        let (document, _) = dashboard(&["Node-A"]);
        let source = Arc::new(StubSource::new(NODE_A));
        let overlay = overlay(&document, &source, Arc::new(NoOverrides));

        overlay.start();
        settle().await;
        let region_text = |document: &SharedDocument| {
            let doc = document.lock();
            let region = doc
                .query_selector(doc.root(), &Selector::class("tl-carousel"))
                .unwrap();
            doc.text(region).to_string()
        };
        let before = region_text(&document);

        tokio::time::sleep(Duration::from_millis(8_000 + 600)).await;
        settle().await;

        assert_ne!(region_text(&document), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_everything() {
        let (document, grid) = dashboard(&["Node-A"]);
        let source = Arc::new(StubSource::new(NODE_A));
        let overlay = overlay(&document, &source, Arc::new(NoOverrides));

        overlay.start();
        settle().await;
        overlay.shutdown();
        overlay.shutdown();
        settle().await;

        assert_eq!(overlay.live_refresh_timers(), 0);
        assert_eq!(overlay.live_carousel_timers(), 0);
        assert_eq!(overlay.detector_state(), DetectorState::Disconnected);
        assert!(!overlay.recheck_config());

        // Mutations after shutdown go unnoticed
        {
            let mut doc = document.lock();
            let c = card(&mut doc, "Node-B");
            doc.append_child(grid, c);
        }
        settle().await;
        assert_eq!(source.calls(), 1);
    }
}
