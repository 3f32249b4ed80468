//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::fmt::Write;

use super::parser::PROVIDER_SECTION_PREFIX;
use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let color = config.style.color;
    let mut out = format!(
        r#"[http]
; Request timeout in seconds
timeout = {}
; User-Agent header sent to tile servers
user_agent = {}

[style]
; Coverage line color as hex rrggbb (leading # optional)
color = {:02x}{:02x}{:02x}
; Line width in pixels
weight = {}
; Line opacity, 0.0 to 1.0
opacity = {}

[render]
; Tile edge length in pixels
tile_size = {}

[logging]
file = {}
"#,
        config.http.timeout,
        config.http.user_agent,
        color.r,
        color.g,
        color.b,
        config.style.weight,
        config.style.opacity,
        config.render.tile_size,
        config.logging.file.display(),
    );

    for (kind, settings) in &config.providers {
        let _ = write!(out, "\n[{}{}]\n", PROVIDER_SECTION_PREFIX, kind.id());
        if let Some(url) = &settings.url {
            let _ = writeln!(out, "url = {}", url);
        }
        if let Some(url) = &settings.metadata_url {
            let _ = writeln!(out, "metadata_url = {}", url);
        }
        if let Some(zoom) = settings.min_zoom {
            let _ = writeln!(out, "min_zoom = {}", zoom);
        }
        if let Some(zoom) = settings.max_zoom {
            let _ = writeln!(out, "max_zoom = {}", zoom);
        }
        if let Some(mode) = settings.mode {
            let _ = writeln!(out, "mode = {}", mode);
        }
        let _ = writeln!(out, "enabled = {}", settings.enabled);
    }

    out
}
