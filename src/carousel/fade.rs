//! Opacity fade around a content swap.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::dom::{NodeId, SharedDocument};

/// Fade `element` out over half of `duration`, swap its content, fade back in.
///
/// The second half is carried by the CSS transition set here; nothing is
/// awaited after the swap. Detached elements are left untouched.
pub async fn fade_swap(document: SharedDocument, element: NodeId, content: String, duration: Duration) {
    let half = duration / 2;
    {
        let mut doc = document.lock();
        if !doc.is_connected(element) {
            return;
        }
        doc.set_style(
            element,
            "transition",
            format!("opacity {}ms ease", half.as_millis()),
        );
        doc.set_style(element, "opacity", "0");
    }

    tokio::time::sleep(half).await;

    let mut doc = document.lock();
    if doc.element(element).is_some() {
        doc.set_text(element, content);
        doc.set_style(element, "opacity", "1");
    }
}

/// Runs fades as tasks keyed by element.
///
/// Scheduling a fade for an element cancels the one still pending for it, so
/// two swaps never interleave on the same region.
pub struct FadeScheduler {
    document: SharedDocument,
    pending: Mutex<HashMap<NodeId, JoinHandle<()>>>,
}

impl FadeScheduler {
    pub fn new(document: SharedDocument) -> Self {
        Self {
            document,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Start a fade swap on `element`, cancelling any pending one for it
    pub fn schedule(&self, element: NodeId, content: String, duration: Duration) {
        let mut pending = self.pending.lock();
        pending.retain(|_, handle| !handle.is_finished());
        if let Some(previous) = pending.remove(&element) {
            previous.abort();
        }
        let handle = tokio::spawn(fade_swap(
            self.document.clone(),
            element,
            content,
            duration,
        ));
        pending.insert(element, handle);
    }

    /// Number of fades not yet finished
    pub fn pending(&self) -> usize {
        let mut pending = self.pending.lock();
        pending.retain(|_, handle| !handle.is_finished());
        pending.len()
    }

    /// Abort every pending fade and restore the opacity of regions caught
    /// mid-fade
    pub fn cancel_all(&self) {
        let cancelled: Vec<NodeId> = self
            .pending
            .lock()
            .drain()
            .map(|(element, handle)| {
                handle.abort();
                element
            })
            .collect();

        let mut doc = self.document.lock();
        for element in cancelled {
            if doc.style(element, "opacity") == Some("0") {
                doc.set_style(element, "opacity", "1");
            }
        }
    }
}
