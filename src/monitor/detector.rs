//! Two-tier change detection over the host page.
//!
//! The outer observer watches the whole document for the primary section
//! appearing or being swapped out. The inner observer watches only the
//! tracked section's direct children and is re-armed on every new section
//! instance. Each delivery produces at most one [`ChangeSignal`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::dom::{Document, NodeId, ObserveOptions, ObserverId};
use crate::host::HostMarkup;

/// Message sent from the detector to its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSignal {
    /// A new section instance is now tracked (initial arming included)
    SectionArmed(NodeId),
    /// The tracked section's child list changed
    ChildrenChanged(NodeId),
}

/// Sender for change signals
pub type ChangeSignalSender = mpsc::UnboundedSender<ChangeSignal>;
/// Receiver for change signals
pub type ChangeSignalReceiver = mpsc::UnboundedReceiver<ChangeSignal>;

/// Create a channel for change signals
pub fn change_channel() -> (ChangeSignalSender, ChangeSignalReceiver) {
    mpsc::unbounded_channel()
}

/// Detector lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Not started, or no section rendered yet
    Idle,
    /// Inner observer armed on this section
    Tracking(NodeId),
    /// Torn down; terminal
    Disconnected,
}

/// Outer/inner observer pair
pub struct ChangeDetector {
    markup: Arc<dyn HostMarkup>,
    tx: ChangeSignalSender,
    outer: Option<ObserverId>,
    inner: Option<ObserverId>,
    state: DetectorState,
}

impl ChangeDetector {
    /// Create an idle detector reporting to `tx`
    pub fn new(markup: Arc<dyn HostMarkup>, tx: ChangeSignalSender) -> Self {
        Self {
            markup,
            tx,
            outer: None,
            inner: None,
            state: DetectorState::Idle,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Section currently tracked by the inner observer
    pub fn tracked_section(&self) -> Option<NodeId> {
        match self.state {
            DetectorState::Tracking(section) => Some(section),
            _ => None,
        }
    }

    /// Arm the outer observer and track the section if already rendered.
    ///
    /// Tracking a section emits [`ChangeSignal::SectionArmed`] before this
    /// returns, so the first render is never missed.
    pub fn start(&mut self, doc: &mut Document) {
        if self.state == DetectorState::Disconnected || self.outer.is_some() {
            return;
        }
        self.outer = Some(doc.observe(doc.root(), ObserveOptions::subtree()));
        if let Some(section) = self.rescan(doc) {
            self.emit(ChangeSignal::SectionArmed(section));
        }
    }

    /// Consume queued mutation batches.
    ///
    /// Returns true if a signal was emitted. A batch that both replaces the
    /// section and touches the old section's children yields a single
    /// `SectionArmed`.
    pub fn deliver(&mut self, doc: &mut Document) -> bool {
        let Some(outer) = self.outer else {
            return false;
        };
        if self.state == DetectorState::Disconnected {
            return false;
        }

        let inner_records = self
            .inner
            .map(|id| doc.take_records(id))
            .unwrap_or_default();
        let outer_records = doc.take_records(outer);

        if !outer_records.is_empty() {
            if let Some(section) = self.rescan(doc) {
                self.emit(ChangeSignal::SectionArmed(section));
                return true;
            }
        }

        match self.tracked_section() {
            Some(section) if !inner_records.is_empty() => {
                debug!(
                    "Detector: {} child-list record(s) on tracked section",
                    inner_records.len()
                );
                self.emit(ChangeSignal::ChildrenChanged(section));
                true
            }
            _ => false,
        }
    }

    /// Look for the primary section; re-arm the inner observer if it is a
    /// different instance. Returns the newly tracked section.
    fn rescan(&mut self, doc: &mut Document) -> Option<NodeId> {
        match self.markup.find_primary_section(doc) {
            Some(section) if self.tracked_section() != Some(section) => {
                if let Some(inner) = self.inner.take() {
                    doc.disconnect(inner);
                }
                self.inner = Some(doc.observe(section, ObserveOptions::children()));
                self.state = DetectorState::Tracking(section);
                debug!("Detector: tracking section {:?}", section);
                Some(section)
            }
            Some(_) => None,
            None => {
                // Section gone without a replacement yet
                if let Some(section) = self.tracked_section() {
                    if !doc.is_connected(section) {
                        if let Some(inner) = self.inner.take() {
                            doc.disconnect(inner);
                        }
                        self.state = DetectorState::Idle;
                        debug!("Detector: section {:?} detached", section);
                    }
                }
                None
            }
        }
    }

    fn emit(&self, signal: ChangeSignal) {
        // Receiver gone means the owner is shutting down
        let _ = self.tx.send(signal);
    }

    /// Disconnect both observers. Idempotent; no signals afterwards.
    pub fn disconnect(&mut self, doc: &mut Document) {
        if let Some(inner) = self.inner.take() {
            doc.disconnect(inner);
        }
        if let Some(outer) = self.outer.take() {
            doc.disconnect(outer);
        }
        self.state = DetectorState::Disconnected;
    }
}
