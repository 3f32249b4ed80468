//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::MAX_TILE_SIZE;
use super::file::ConfigFileError;
use super::settings::{ConfigFile, ProviderSettings};
use crate::coord::MAX_ZOOM;
use crate::provider::{ProviderKind, RenderMode};
use crate::style::Rgb;

/// Prefix of per-provider section names, e.g. `[provider.apple]`.
pub(super) const PROVIDER_SECTION_PREFIX: &str = "provider.";

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [http] section
    if let Some(section) = ini.section(Some("http")) {
        if let Some(v) = section.get("timeout") {
            let timeout: u64 = parse_value("http", "timeout", v, "must be a positive integer (seconds)")?;
            if timeout == 0 {
                return Err(invalid("http", "timeout", v, "must be a positive integer (seconds)"));
            }
            config.http.timeout = timeout;
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if !v.is_empty() {
                config.http.user_agent = v.to_string();
            }
        }
    }

    // [style] section
    if let Some(section) = ini.section(Some("style")) {
        if let Some(v) = section.get("color") {
            config.style.color = parse_value::<Rgb>("style", "color", v, "expected #rrggbb or #rgb")?;
        }
        if let Some(v) = section.get("weight") {
            let weight: f32 = parse_value("style", "weight", v, "must be a non-negative number")?;
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid("style", "weight", v, "must be a non-negative number"));
            }
            config.style.weight = weight;
        }
        if let Some(v) = section.get("opacity") {
            let opacity: f32 = parse_value("style", "opacity", v, "must be between 0.0 and 1.0")?;
            if !(0.0..=1.0).contains(&opacity) {
                return Err(invalid("style", "opacity", v, "must be between 0.0 and 1.0"));
            }
            config.style.opacity = opacity;
        }
    }

    // [render] section
    if let Some(section) = ini.section(Some("render")) {
        if let Some(v) = section.get("tile_size") {
            let reason = format!("must be an integer between 1 and {}", MAX_TILE_SIZE);
            let size: u32 = parse_value("render", "tile_size", v, &reason)?;
            if size == 0 || size > MAX_TILE_SIZE {
                return Err(invalid("render", "tile_size", v, &reason));
            }
            config.render.tile_size = size;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    // [provider.<id>] sections
    for name in ini.sections().flatten() {
        let Some(id) = name.strip_prefix(PROVIDER_SECTION_PREFIX) else {
            continue;
        };
        let kind: ProviderKind = id.parse().map_err(|_| ConfigFileError::InvalidValue {
            section: name.to_string(),
            key: String::new(),
            value: id.to_string(),
            reason: format!("unknown provider; must be one of: {}", provider_ids()),
        })?;
        if let Some(section) = ini.section(Some(name)) {
            let settings = parse_provider_section(name, section)?;
            config.providers.insert(kind, settings);
        }
    }

    Ok(config)
}

fn parse_provider_section(
    name: &str,
    section: &Properties,
) -> Result<ProviderSettings, ConfigFileError> {
    let mut settings = ProviderSettings::default();

    if let Some(v) = section.get("url") {
        let v = v.trim();
        if !v.is_empty() {
            let has_xyz = ["{x}", "{y}", "{z}"].iter().all(|p| v.contains(p));
            if !has_xyz && !v.contains("{quadkey}") {
                return Err(invalid(
                    name,
                    "url",
                    v,
                    "must contain {x}, {y} and {z}, or {quadkey}",
                ));
            }
            settings.url = Some(v.to_string());
        }
    }
    if let Some(v) = section.get("metadata_url") {
        let v = v.trim();
        if !v.is_empty() {
            settings.metadata_url = Some(v.to_string());
        }
    }

    let zoom_reason = format!("must be an integer between 0 and {}", MAX_ZOOM);
    if let Some(v) = section.get("min_zoom") {
        settings.min_zoom = Some(parse_zoom(name, "min_zoom", v, &zoom_reason)?);
    }
    if let Some(v) = section.get("max_zoom") {
        settings.max_zoom = Some(parse_zoom(name, "max_zoom", v, &zoom_reason)?);
    }
    if let (Some(min), Some(max)) = (settings.min_zoom, settings.max_zoom) {
        if min > max {
            return Err(invalid(
                name,
                "max_zoom",
                &max.to_string(),
                "must not be below min_zoom",
            ));
        }
    }

    if let Some(v) = section.get("mode") {
        settings.mode = Some(parse_value::<RenderMode>(
            name,
            "mode",
            v,
            "must be 'raster' or 'vector'",
        )?);
    }
    if let Some(v) = section.get("enabled") {
        settings.enabled = parse_bool(v);
    }

    Ok(settings)
}

fn parse_zoom(section: &str, key: &str, value: &str, reason: &str) -> Result<u8, ConfigFileError> {
    let zoom: u8 = parse_value(section, key, value, reason)?;
    if zoom > MAX_ZOOM {
        return Err(invalid(section, key, value, reason));
    }
    Ok(zoom)
}

fn parse_value<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn provider_ids() -> String {
    ProviderKind::ALL
        .iter()
        .map(|k| k.id())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a boolean value from a config string.
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive)
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
