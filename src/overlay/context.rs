//! Per-overlay state and the tasks that drive it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::timers::{LiveGuard, TimerKind, Timers};
use crate::carousel::{CarouselRegistry, FadeScheduler};
use crate::config::{ConfigSource, OverlayConfig};
use crate::dom::{Selector, SharedDocument};
use crate::host::HostMarkup;
use crate::logging::LogSwitch;
use crate::monitor::{change_channel, ChangeDetector, ChangeSignalReceiver, DetectorState};
use crate::render::{reconcile, ReconcileReport};
use crate::usage::{FetchGate, UsagePayload, UsageSource};

/// Delay before configuration is merged a second time, for overrides that
/// land after start
const RECHECK_DELAY: Duration = Duration::from_millis(1000);

/// Class of the injected stylesheet element
const STYLE_CLASS: &str = "tl-style";

/// Clears the in-flight flag when a refresh ends or is dropped
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Everything one overlay owns
pub struct OverlayContext<S> {
    document: SharedDocument,
    markup: Arc<dyn HostMarkup>,
    gate: FetchGate<S>,
    pub(crate) carousel: CarouselRegistry,
    fades: FadeScheduler,
    defaults: OverlayConfig,
    overrides: Arc<dyn ConfigSource>,
    config: RwLock<OverlayConfig>,
    detector: Mutex<ChangeDetector>,
    log_switch: RwLock<Option<Arc<dyn LogSwitch>>>,
    signals: Mutex<Option<ChangeSignalReceiver>>,
    pub(crate) timers: Timers,
    started: AtomicBool,
    running: AtomicBool,
    refreshing: AtomicBool,
}

impl<S: UsageSource> OverlayContext<S> {
    pub fn new(
        document: SharedDocument,
        source: Arc<S>,
        markup: Arc<dyn HostMarkup>,
        defaults: OverlayConfig,
        overrides: Arc<dyn ConfigSource>,
    ) -> Self {
        let (tx, rx) = change_channel();
        Self {
            fades: FadeScheduler::new(document.clone()),
            document,
            detector: Mutex::new(ChangeDetector::new(markup.clone(), tx)),
            log_switch: RwLock::new(None),
            markup,
            gate: FetchGate::new(source),
            carousel: CarouselRegistry::new(),
            config: RwLock::new(defaults.clone()),
            defaults,
            overrides,
            signals: Mutex::new(Some(rx)),
            timers: Timers::default(),
            started: AtomicBool::new(false),
            running: AtomicBool::new(false),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Active configuration
    pub fn config(&self) -> OverlayConfig {
        self.config.read().clone()
    }

    pub fn detector_state(&self) -> DetectorState {
        self.detector.lock().state()
    }

    /// Route the `log` flag to a live filter; applied at start and on
    /// every config change that flips it
    pub fn set_log_switch(&self, switch: Arc<dyn LogSwitch>) {
        *self.log_switch.write() = Some(switch);
    }

    fn apply_log_flag(&self, verbose: bool) {
        if let Some(switch) = self.log_switch.read().as_ref() {
            switch.set_verbose(verbose);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start once; later calls are ignored
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.running.store(true, Ordering::SeqCst);

        let config = self.defaults.merged(self.overrides.load().as_ref());
        info!(
            "Overlay starting (refresh {}ms, carousel {}ms, placement {:?})",
            config.refresh_interval_ms, config.carousel_interval_ms, config.placement
        );
        self.apply_log_flag(config.log);
        *self.config.write() = config;

        self.inject_css();
        self.restart_carousel();

        {
            let mut doc = self.document.lock();
            self.detector.lock().start(&mut doc);
        }
        self.spawn_detector_pump();
        self.spawn_change_handler();
        self.refresh_now();

        let ctx = Arc::clone(self);
        let recheck = tokio::spawn(async move {
            tokio::time::sleep(RECHECK_DELAY).await;
            OverlayContext::recheck_config(&ctx);
        });
        self.timers.replace(TimerKind::Recheck, recheck);
    }

    /// Add the host-specific stylesheet to `<head>` once
    fn inject_css(&self) {
        let css = self.markup.hidden_css();
        if css.is_empty() {
            return;
        }
        let mut doc = self.document.lock();
        let head = doc.head();
        let selector = Selector::parse(&format!("style.{}", STYLE_CLASS));
        if doc.child_matching(head, &selector).is_some() {
            return;
        }
        let style = doc.create_element("style", &[STYLE_CLASS]);
        doc.set_text(style, css);
        doc.append_child(head, style);
    }

    /// Hand queued mutation batches to the detector whenever the document
    /// reports new records
    fn spawn_detector_pump(self: &Arc<Self>) {
        let notify = self.document.lock().mutation_notify();
        let ctx = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                notify.notified().await;
                if !ctx.is_running() {
                    break;
                }
                let mut doc = ctx.document.lock();
                ctx.detector.lock().deliver(&mut doc);
            }
        });
        self.timers.replace(TimerKind::Detector, handle);
    }

    fn spawn_change_handler(self: &Arc<Self>) {
        let Some(mut rx) = self.signals.lock().take() else {
            return;
        };
        let ctx = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(signal) = rx.recv().await {
                debug!("Overlay: {:?}", signal);
                ctx.handle_change();
            }
        });
        self.timers.replace(TimerKind::Changes, handle);
    }

    /// A section was armed or its children changed
    fn handle_change(self: &Arc<Self>) {
        if !self.is_running() {
            return;
        }
        self.refresh_now();
        if !self.timers.is_active(TimerKind::Refresh) {
            self.restart_refresh_timer();
        }
    }

    /// Reconcile right away from a fresh cache, or fetch in the background
    pub(crate) fn refresh_now(self: &Arc<Self>) {
        let config = self.config();
        if let Some(payload) = self.gate.cached(&config.endpoint, refresh_period(&config)) {
            self.apply(&payload, &config);
            return;
        }
        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            ctx.refresh_cycle(refresh_period(&ctx.config())).await;
        });
    }

    /// Fetch through the gate and reconcile with whatever config is current
    /// when the data arrives.
    ///
    /// Only one cycle runs at a time; the running one reconciles against the
    /// document as it is when its data lands. If the endpoint changed while
    /// the request was out, the result is dropped and the new endpoint is
    /// fetched before the cycle ends.
    async fn refresh_cycle(&self, freshness: Duration) {
        if self.refreshing.swap(true, Ordering::SeqCst) {
            debug!("Overlay: refresh already in flight");
            return;
        }
        let _in_flight = InFlight(&self.refreshing);

        loop {
            let endpoint = self.config().endpoint;
            let fetched = self.gate.fetch(&endpoint, freshness).await;
            if !self.is_running() {
                return;
            }
            let config = self.config();
            if config.endpoint != endpoint {
                debug!("Overlay: endpoint changed during fetch, refetching");
                continue;
            }
            if let Some(payload) = fetched {
                self.apply(&payload, &config);
            }
            return;
        }
    }

    fn apply(&self, payload: &UsagePayload, config: &OverlayConfig) -> ReconcileReport {
        let mut doc = self.document.lock();
        let report = reconcile(&mut doc, &*self.markup, payload, config, &self.carousel);
        debug!(
            "Reconciled: {} inserted, {} updated, {} removed, {} skipped",
            report.inserted, report.updated, report.removed, report.skipped
        );
        report
    }

    /// Stop the refresh loop and start a new one at the current interval
    fn restart_refresh_timer(self: &Arc<Self>) {
        let period = refresh_period(&self.config());
        // Ticks land just after the entry fetched at start turns stale
        let freshness = period - period / 10;
        let live = self.timers.refresh_counter();
        let ctx = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let _live = LiveGuard::new(live);
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                ctx.refresh_cycle(freshness).await;
            }
        });
        self.timers.replace(TimerKind::Refresh, handle);
    }

    /// Stop the carousel loop and start a new one if rotation is enabled
    fn restart_carousel(self: &Arc<Self>) {
        let config = self.config();
        if config.carousel_interval_ms == 0 {
            // Regions fall back to the time range on the next reconcile
            self.timers.stop(TimerKind::Carousel);
            self.fades.cancel_all();
            self.carousel.clear();
            return;
        }
        let period = Duration::from_millis(config.carousel_interval_ms);
        let live = self.timers.carousel_counter();
        let ctx = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let _live = LiveGuard::new(live);
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                ctx.rotate_carousel();
            }
        });
        self.timers.replace(TimerKind::Carousel, handle);
    }

    fn rotate_carousel(&self) {
        let fade = Duration::from_millis(self.config().fade_duration_ms);
        let swaps = {
            let doc = self.document.lock();
            self.carousel.tick(&doc)
        };
        for (region, content) in swaps {
            self.fades.schedule(region, content, fade);
        }
    }

    /// Merge overrides again; on any difference replace the config, restart
    /// both timers and refresh. Returns true if the config changed.
    pub fn recheck_config(self: &Arc<Self>) -> bool {
        if !self.is_running() {
            return false;
        }
        let merged = self.defaults.merged(self.overrides.load().as_ref());
        let previous = {
            let mut config = self.config.write();
            if *config == merged {
                debug!("Overlay config unchanged");
                return false;
            }
            std::mem::replace(&mut *config, merged.clone())
        };

        if previous.log != merged.log {
            self.apply_log_flag(merged.log);
        }
        info!("Overlay config changed, restarting timers");
        if previous.endpoint != merged.endpoint {
            self.gate.invalidate();
        }
        self.restart_refresh_timer();
        self.restart_carousel();
        self.refresh_now();
        true
    }

    /// Stop timers, observers and pending fades. Idempotent.
    pub fn shutdown(&self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        self.timers.stop_all();
        {
            let mut doc = self.document.lock();
            self.detector.lock().disconnect(&mut doc);
        }
        self.fades.cancel_all();
        if was_running {
            info!("Overlay stopped");
        }
    }
}

fn refresh_period(config: &OverlayConfig) -> Duration {
    Duration::from_millis(config.refresh_interval_ms)
}
