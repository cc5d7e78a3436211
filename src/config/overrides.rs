//! Sources of late-bound configuration overrides.
//!
//! The embedding side may publish overrides before or shortly after the
//! overlay starts; the overlay reads them at startup and once more after a
//! short delay.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use super::ConfigOverrides;

/// A live override source, read on every config check
pub trait ConfigSource: Send + Sync {
    /// Current overrides, `None` if nothing has been published
    fn load(&self) -> Option<ConfigOverrides>;
}

/// No overrides at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverrides;

impl ConfigSource for NoOverrides {
    fn load(&self) -> Option<ConfigOverrides> {
        None
    }
}

/// Overrides set programmatically by the embedder at any time
#[derive(Debug, Clone, Default)]
pub struct SharedOverrides {
    inner: Arc<RwLock<Option<ConfigOverrides>>>,
}

impl SharedOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish (or replace) the overrides
    pub fn set(&self, overrides: ConfigOverrides) {
        *self.inner.write() = Some(overrides);
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

impl ConfigSource for SharedOverrides {
    fn load(&self) -> Option<ConfigOverrides> {
        self.inner.read().clone()
    }
}

/// Overrides read from a TOML file that may appear after startup
#[derive(Debug, Clone)]
pub struct FileOverrides {
    path: PathBuf,
}

impl FileOverrides {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileOverrides {
    fn load(&self) -> Option<ConfigOverrides> {
        if !self.path.exists() {
            return None;
        }
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to read overrides {:?}: {}", self.path, e);
                return None;
            }
        };
        match toml::from_str(&content) {
            Ok(overrides) => Some(overrides),
            Err(e) => {
                warn!("Failed to parse overrides {:?}: {}", self.path, e);
                None
            }
        }
    }
}
