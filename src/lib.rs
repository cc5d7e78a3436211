//! Traffic usage widgets for a node dashboard.
//!
//! Watches the host page for its node list, fetches per-node traffic usage
//! through a single-slot cache and keeps one widget per node card in sync,
//! surviving re-renders that replace or reorder the list.

pub mod carousel;
pub mod config;
pub mod demo;
pub mod dom;
pub mod format;
pub mod host;
pub mod logging;
pub mod monitor;
pub mod overlay;
pub mod render;
pub mod usage;
