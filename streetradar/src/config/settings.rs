//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use crate::provider::{ProviderKind, RenderMode};
use crate::style::TileStyle;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// HTTP client settings
    pub http: HttpSettings,
    /// Coverage line style
    pub style: TileStyle,
    /// Tile rendering settings
    pub render: RenderSettings,
    /// Log file location
    pub logging: LoggingSettings,
    /// Per-provider overrides from `[provider.<id>]` sections
    pub providers: BTreeMap<ProviderKind, ProviderSettings>,
}

/// HTTP client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    /// Request timeout in seconds
    pub timeout: u64,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

/// Tile rendering configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Edge length of rendered tiles in pixels
    pub tile_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

/// Overrides for one provider. Unset fields keep the built-in defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    /// Tile URL template
    pub url: Option<String>,
    /// TileJSON endpoint
    pub metadata_url: Option<String>,
    pub min_zoom: Option<u8>,
    pub max_zoom: Option<u8>,
    pub mode: Option<RenderMode>,
    /// Whether the provider's layer is built at all
    pub enabled: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            url: None,
            metadata_url: None,
            min_zoom: None,
            max_zoom: None,
            mode: None,
            enabled: true,
        }
    }
}
