//! Usage statistics: decode the traffic endpoint payload and gate refreshes.
//!
//! The gate keeps a single cached payload and only hits the source when the
//! cached copy is older than the refresh interval.

pub mod fetcher;
pub mod parser;
pub mod types;

pub use fetcher::{FetchGate, FileSource, HttpSource, UsageSource};
pub use parser::{cycle_order, flatten_cycles, EntityUsage};
pub use types::{FetchError, UsageCycle, UsageData, UsagePayload, UsageResponse};
