//! Configuration for StreetRadar coverage layers.
//!
//! User configuration lives in an INI file at `~/.streetradar/config.ini`:
//!
//! ```ini
//! [http]
//! timeout = 30
//!
//! [style]
//! color = 2f7ef5
//! weight = 2.0
//! opacity = 0.8
//!
//! [render]
//! tile_size = 256
//!
//! [provider.apple]
//! metadata_url = https://example.com/tiles.json
//! min_zoom = 3
//! max_zoom = 16
//! ```
//!
//! A missing file yields [`ConfigFile::default`].

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    default_log_file, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LOG_FILE, DEFAULT_TILE_SIZE,
    MAX_TILE_SIZE,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, HttpSettings, LoggingSettings, ProviderSettings, RenderSettings};
