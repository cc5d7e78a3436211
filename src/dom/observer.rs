//! Mutation observer registry.
//!
//! Registrations queue child-list records as the document changes. Records
//! stay queued until the owner takes them, so every mutation applied between
//! two deliveries arrives as one batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Notify;

use super::NodeId;

/// Handle for an observer registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// What an observer registration listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Report additions/removals of direct children
    pub child_list: bool,
    /// Extend observation to every descendant of the target
    pub subtree: bool,
}

impl ObserveOptions {
    /// Direct children of the target only
    pub fn children() -> Self {
        Self {
            child_list: true,
            subtree: false,
        }
    }

    /// Child-list changes anywhere below the target
    pub fn subtree() -> Self {
        Self {
            child_list: true,
            subtree: true,
        }
    }
}

/// A single child-list mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Parent whose child list changed
    pub target: NodeId,
    /// Nodes inserted under `target`
    pub added: Vec<NodeId>,
    /// Nodes removed from `target`
    pub removed: Vec<NodeId>,
}

#[derive(Debug)]
struct Registration {
    target: NodeId,
    options: ObserveOptions,
    queue: Vec<MutationRecord>,
}

/// All live observer registrations of one document
#[derive(Debug)]
pub(crate) struct ObserverRegistry {
    registrations: BTreeMap<ObserverId, Registration>,
    next_id: u64,
    notify: Arc<Notify>,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        Self {
            registrations: BTreeMap::new(),
            next_id: 1,
            notify: Arc::new(Notify::new()),
        }
    }

    pub(crate) fn observe(&mut self, target: NodeId, options: ObserveOptions) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.registrations.insert(
            id,
            Registration {
                target,
                options,
                queue: Vec::new(),
            },
        );
        id
    }

    /// Remove a registration and drop its queued records.
    /// Returns false if it was already gone.
    pub(crate) fn disconnect(&mut self, id: ObserverId) -> bool {
        self.registrations.remove(&id).is_some()
    }

    pub(crate) fn is_active(&self, id: ObserverId) -> bool {
        self.registrations.contains_key(&id)
    }

    pub(crate) fn take_records(&mut self, id: ObserverId) -> Vec<MutationRecord> {
        self.registrations
            .get_mut(&id)
            .map(|r| std::mem::take(&mut r.queue))
            .unwrap_or_default()
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.registrations.values().any(|r| !r.queue.is_empty())
    }

    pub(crate) fn notify_handle(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Queue a record for every interested registration.
    ///
    /// `chain` is the target followed by its ancestors, captured before the
    /// mutation was applied.
    pub(crate) fn queue(&mut self, record: MutationRecord, chain: &[NodeId]) {
        let mut queued = false;
        for registration in self.registrations.values_mut() {
            if !registration.options.child_list {
                continue;
            }
            let interested = registration.target == record.target
                || (registration.options.subtree && chain.contains(&registration.target));
            if interested {
                registration.queue.push(record.clone());
                queued = true;
            }
        }
        if queued {
            self.notify.notify_one();
        }
    }
}
