mod overrides;
mod settings;

pub use overrides::{ConfigSource, FileOverrides, NoOverrides, SharedOverrides};
pub use settings::{Config, ConfigOverrides, DemoSettings, OverlayConfig, Placement, Settings};
