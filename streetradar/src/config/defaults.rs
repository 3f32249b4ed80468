//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::settings::*;
use crate::provider::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::style::TileStyle;

/// Default HTTP request timeout (seconds).
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = DEFAULT_TIMEOUT_SECS;

/// Default rendered tile edge (pixels).
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Largest accepted tile edge (pixels).
pub const MAX_TILE_SIZE: u32 = 4096;

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE: &str = "streetradar.log";

/// Default log file path (~/.streetradar/streetradar.log).
pub fn default_log_file() -> PathBuf {
    super::file::config_directory().join(DEFAULT_LOG_FILE)
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            http: HttpSettings {
                timeout: DEFAULT_HTTP_TIMEOUT_SECS,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            style: TileStyle::default(),
            render: RenderSettings {
                tile_size: DEFAULT_TILE_SIZE,
            },
            logging: LoggingSettings {
                file: default_log_file(),
            },
            providers: BTreeMap::new(),
        }
    }
}
