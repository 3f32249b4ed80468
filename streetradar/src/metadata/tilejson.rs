//! TileJSON descriptor parsing and validation.

use super::MetadataError;
use crate::coord::{ZoomRange, MAX_ZOOM};
use crate::provider::ProviderKind;
use serde::Deserialize;
use serde_json::Value;

/// Validated descriptor of a remote tile archive.
#[derive(Debug, Clone, PartialEq)]
pub struct TileJsonMetadata {
    /// First entry of `tiles`, with `{x}`/`{y}`/`{z}` placeholders
    pub tile_url_template: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub attribution: String,
    /// TileJSON spec version, e.g. "2.2.0"
    pub tilejson: Option<String>,
    pub name: Option<String>,
    /// `[west, south, east, north]` in degrees
    pub bounds: Option<[f64; 4]>,
    /// `[lon, lat, zoom]`
    pub center: Option<[f64; 3]>,
}

/// Wire shape before validation. Fields that drive validation stay untyped
/// so a wrong type is reported as invalid metadata rather than a parse error.
#[derive(Debug, Deserialize)]
struct RawTileJson {
    tilejson: Option<String>,
    tiles: Option<Value>,
    minzoom: Option<Value>,
    maxzoom: Option<Value>,
    attribution: Option<String>,
    name: Option<String>,
    bounds: Option<Vec<f64>>,
    center: Option<Vec<f64>>,
}

impl TileJsonMetadata {
    /// Parses and validates a TileJSON body.
    ///
    /// Malformed JSON is a [`MetadataError::Fetch`]; well-formed JSON that
    /// does not describe a usable archive is a [`MetadataError::Invalid`].
    pub fn from_json(provider: ProviderKind, body: &[u8]) -> Result<Self, MetadataError> {
        let raw: RawTileJson = serde_json::from_slice(body).map_err(|e| MetadataError::Fetch {
            provider,
            reason: format!("malformed TileJSON: {}", e),
        })?;

        let invalid = |reason: String| MetadataError::Invalid { provider, reason };

        let tile_url_template = raw
            .tiles
            .as_ref()
            .and_then(Value::as_array)
            .and_then(|tiles| tiles.first())
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| invalid("missing or empty tile URL template".to_string()))?
            .to_string();

        let min_zoom = parse_zoom(raw.minzoom.as_ref()).map_err(|r| invalid(format!("minzoom {}", r)))?;
        let max_zoom = parse_zoom(raw.maxzoom.as_ref()).map_err(|r| invalid(format!("maxzoom {}", r)))?;
        if min_zoom > max_zoom {
            return Err(invalid(format!(
                "minzoom {} exceeds maxzoom {}",
                min_zoom, max_zoom
            )));
        }

        Ok(Self {
            tile_url_template,
            min_zoom,
            max_zoom,
            attribution: raw.attribution.unwrap_or_default(),
            tilejson: raw.tilejson,
            name: raw.name,
            bounds: raw.bounds.and_then(|b| <[f64; 4]>::try_from(b).ok()),
            center: raw.center.and_then(|c| <[f64; 3]>::try_from(c).ok()),
        })
    }

    /// Zoom bounds advertised by the archive.
    pub fn zoom_range(&self) -> ZoomRange {
        ZoomRange::new(self.min_zoom, self.max_zoom)
    }
}

fn parse_zoom(value: Option<&Value>) -> Result<u8, String> {
    let value = value.ok_or_else(|| "is missing".to_string())?;
    let zoom = value
        .as_f64()
        .ok_or_else(|| format!("is not numeric: {}", value))?;
    if zoom.fract() != 0.0 || zoom < 0.0 || zoom > MAX_ZOOM as f64 {
        return Err(format!("out of range: {}", zoom));
    }
    Ok(zoom as u8)
}
