use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Traffic usage widgets for the node dashboard")]
pub struct Config {
    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Dashboard base URL the endpoint path is resolved against
    #[arg(short = 'u', long)]
    pub base_url: Option<String>,

    /// Read the usage response from a local JSON file instead of HTTP
    #[arg(short, long)]
    pub payload: Option<PathBuf>,

    /// TOML file with late-bound overrides, re-read on every config check
    #[arg(short, long)]
    pub overrides: Option<PathBuf>,

    /// Node names rendered by the demo dashboard (repeatable)
    #[arg(short, long = "node")]
    pub nodes: Vec<String>,

    /// Refresh interval in milliseconds
    #[arg(short = 'i', long)]
    pub refresh_interval: Option<u64>,

    /// Stop after this many seconds (runs until Ctrl-C otherwise)
    #[arg(long)]
    pub duration: Option<u64>,
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Where new widgets are attached inside a node card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Below the live network section
    #[default]
    Inline,
    /// Above the card footer
    Footer,
}

/// Options the overlay runs with.
///
/// Compared as a whole when late overrides arrive; any difference triggers
/// a restart of both timers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Show traffic widgets at all
    #[serde(default = "default_show_stats")]
    pub show_stats: bool,

    /// Widget placement inside each card
    #[serde(default)]
    pub placement: Placement,

    /// Data refresh interval in milliseconds (also the cache freshness window)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_ms: u64,

    /// Carousel rotation interval in milliseconds (0 disables rotation)
    #[serde(default = "default_carousel_interval")]
    pub carousel_interval_ms: u64,

    /// Opacity fade duration for carousel swaps in milliseconds
    #[serde(default = "default_fade_duration")]
    pub fade_duration_ms: u64,

    /// Statistics endpoint path
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Emit diagnostics
    #[serde(default)]
    pub log: bool,
}

fn default_show_stats() -> bool {
    true
}

fn default_refresh_interval() -> u64 {
    60_000
}

fn default_carousel_interval() -> u64 {
    8_000
}

fn default_fade_duration() -> u64 {
    600
}

fn default_endpoint() -> String {
    "/api/v1/traffic/cycles".to_string()
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            show_stats: default_show_stats(),
            placement: Placement::default(),
            refresh_interval_ms: default_refresh_interval(),
            carousel_interval_ms: default_carousel_interval(),
            fade_duration_ms: default_fade_duration(),
            endpoint: default_endpoint(),
            log: false,
        }
    }
}

/// Key overlay applied on top of [`OverlayConfig`]; unset keys keep the base
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    pub show_stats: Option<bool>,
    pub placement: Option<Placement>,
    pub refresh_interval_ms: Option<u64>,
    pub carousel_interval_ms: Option<u64>,
    pub fade_duration_ms: Option<u64>,
    pub endpoint: Option<String>,
    pub log: Option<bool>,
}

impl OverlayConfig {
    /// Minimum refresh interval to keep the endpoint from being hammered
    pub const MIN_REFRESH_INTERVAL_MS: u64 = 1_000;

    /// Overlay `overrides` onto a copy of `self` and normalize the result
    pub fn merged(&self, overrides: Option<&ConfigOverrides>) -> Self {
        let mut merged = self.clone();
        if let Some(o) = overrides {
            if let Some(v) = o.show_stats {
                merged.show_stats = v;
            }
            if let Some(v) = o.placement {
                merged.placement = v;
            }
            if let Some(v) = o.refresh_interval_ms {
                merged.refresh_interval_ms = v;
            }
            if let Some(v) = o.carousel_interval_ms {
                merged.carousel_interval_ms = v;
            }
            if let Some(v) = o.fade_duration_ms {
                merged.fade_duration_ms = v;
            }
            if let Some(ref v) = o.endpoint {
                merged.endpoint = v.clone();
            }
            if let Some(v) = o.log {
                merged.log = v;
            }
        }
        merged.validate();
        merged
    }

    /// Validate and normalize values
    ///
    /// Keeps the refresh interval above its floor and the fade shorter than
    /// the carousel period it runs in.
    pub fn validate(&mut self) {
        if self.refresh_interval_ms < Self::MIN_REFRESH_INTERVAL_MS {
            self.refresh_interval_ms = Self::MIN_REFRESH_INTERVAL_MS;
        }
        if self.carousel_interval_ms > 0 && self.fade_duration_ms > self.carousel_interval_ms {
            self.fade_duration_ms = self.carousel_interval_ms;
        }
    }
}

/// Demo dashboard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoSettings {
    /// Node names rendered as cards
    #[serde(default = "default_demo_nodes")]
    pub nodes: Vec<String>,

    /// How often the demo host re-renders its node list (milliseconds)
    #[serde(default = "default_rerender_interval")]
    pub rerender_interval_ms: u64,
}

fn default_demo_nodes() -> Vec<String> {
    vec!["Node-A".to_string()]
}

fn default_rerender_interval() -> u64 {
    15_000
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            nodes: default_demo_nodes(),
            rerender_interval_ms: default_rerender_interval(),
        }
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Dashboard base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Overlay defaults (late overrides are applied on top)
    #[serde(default)]
    pub overlay: OverlayConfig,

    /// Demo dashboard settings
    #[serde(default)]
    pub demo: DemoSettings,
}

fn default_base_url() -> String {
    "http://127.0.0.1:25774".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            overlay: OverlayConfig::default(),
            demo: DemoSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {:?}", p))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", p));
            }
        }

        // Try default config locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("trafficlens/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/trafficlens/config.toml")),
            dirs::home_dir().map(|p| p.join(".trafficlens.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", path));
            }
        }

        Ok(Self::default())
    }

    /// Merge CLI config into settings (CLI takes precedence)
    pub fn merge_cli(&mut self, cli: &Config) {
        if let Some(ref base_url) = cli.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(interval) = cli.refresh_interval {
            self.overlay.refresh_interval_ms = interval;
        }
        if !cli.nodes.is_empty() {
            self.demo.nodes = cli.nodes.clone();
        }
        if cli.debug {
            self.overlay.log = true;
        }
    }

    /// Validate and normalize settings values
    pub fn validate(&mut self) {
        const MIN_RERENDER_INTERVAL: u64 = 100;

        self.overlay.validate();
        if self.demo.rerender_interval_ms < MIN_RERENDER_INTERVAL {
            self.demo.rerender_interval_ms = MIN_RERENDER_INTERVAL;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.overlay.show_stats);
        assert_eq!(settings.overlay.placement, Placement::Inline);
        assert_eq!(settings.overlay.refresh_interval_ms, 60_000);
        assert_eq!(settings.demo.nodes, vec!["Node-A".to_string()]);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            base_url = "https://status.example.com"

            [overlay]
            show_stats = false
            placement = "footer"
            carousel_interval_ms = 0

            [demo]
            nodes = ["Tokyo", "Frankfurt"]
        "#;

        let settings: Settings = toml::from_str(toml).expect("Should parse TOML");
        assert_eq!(settings.base_url, "https://status.example.com");
        assert!(!settings.overlay.show_stats);
        assert_eq!(settings.overlay.placement, Placement::Footer);
        assert_eq!(settings.overlay.carousel_interval_ms, 0);
        assert_eq!(settings.overlay.refresh_interval_ms, 60_000);
        assert_eq!(settings.demo.nodes.len(), 2);
    }

    #[test]
    fn test_merge_overrides() {
        let base = OverlayConfig::default();
        let overrides = ConfigOverrides {
            show_stats: Some(false),
            endpoint: Some("/api/other".to_string()),
            ..Default::default()
        };

        let merged = base.merged(Some(&overrides));
        assert!(!merged.show_stats);
        assert_eq!(merged.endpoint, "/api/other");
        assert_eq!(merged.refresh_interval_ms, base.refresh_interval_ms);
        assert_ne!(merged, base);

        assert_eq!(base.merged(None), base);
        assert_eq!(base.merged(Some(&ConfigOverrides::default())), base);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = OverlayConfig {
            refresh_interval_ms: 10,
            carousel_interval_ms: 500,
            fade_duration_ms: 2_000,
            ..Default::default()
        };
        config.validate();
        assert_eq!(config.refresh_interval_ms, 1_000);
        assert_eq!(config.fade_duration_ms, 500);

        // Fade is left alone when the carousel is off
        let mut config = OverlayConfig {
            carousel_interval_ms: 0,
            fade_duration_ms: 2_000,
            ..Default::default()
        };
        config.validate();
        assert_eq!(config.fade_duration_ms, 2_000);
    }

    #[test]
    fn test_load_missing_custom_path_falls_back() {
        let path = PathBuf::from("/nonexistent/trafficlens/config.toml");
        assert!(Settings::load(Some(&path)).is_ok());
    }

    #[test]
    fn test_load_invalid_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "overlay = 12").unwrap();
        assert!(Settings::load(Some(&path)).is_err());
    }
}
