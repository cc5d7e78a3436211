//! Simulated node dashboard used by the binary.

pub mod dashboard;

pub use dashboard::{DemoDashboard, Rerender};
