//! In-memory document model the overlay works against.
//!
//! The host page owns the tree and mutates it freely; the overlay only reads
//! structure, observes child-list changes and manages the fragments it
//! inserted itself.

mod document;
mod observer;
mod selector;

pub use document::{Document, Element, NodeId, SharedDocument};
pub use observer::{MutationRecord, ObserveOptions, ObserverId};
pub use selector::Selector;
