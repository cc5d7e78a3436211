//! Log filter that can be switched while running.

use tracing::warn;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Filter for this crate's diagnostics: `debug` when verbose, `warn` otherwise
pub fn filter_for(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("trafficlens=debug")
    } else {
        EnvFilter::new("trafficlens=warn")
    }
}

/// Turns diagnostics on or off at runtime
pub trait LogSwitch: Send + Sync {
    fn set_verbose(&self, verbose: bool);
}

impl LogSwitch for reload::Handle<EnvFilter, Registry> {
    fn set_verbose(&self, verbose: bool) {
        if let Err(e) = self.reload(filter_for(verbose)) {
            warn!("Failed to switch log filter: {}", e);
        }
    }
}
