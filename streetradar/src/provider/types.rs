//! Provider types

use crate::coord::{reproject_tile_to_alt_mercator, tile_to_quadkey, TileCoord, ZoomRange};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur during provider operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// HTTP request failed before a status was received
    HttpError(String),
    /// Render mode name not recognized
    InvalidRenderMode(String),
    /// Provider name not recognized
    UnknownProvider(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::InvalidRenderMode(mode) => write!(f, "Invalid render mode: {}", mode),
            ProviderError::UnknownProvider(name) => write!(f, "Unknown provider: {}", name),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Street-level imagery providers with coverage layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    Google,
    Bing,
    Yandex,
    Apple,
    Naver,
    Ja,
}

impl ProviderKind {
    /// Every provider, in display order.
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::Google,
        ProviderKind::Bing,
        ProviderKind::Yandex,
        ProviderKind::Apple,
        ProviderKind::Naver,
        ProviderKind::Ja,
    ];

    /// Stable lowercase identifier used in config files and logs.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Bing => "bing",
            Self::Yandex => "yandex",
            Self::Apple => "apple",
            Self::Naver => "naver",
            Self::Ja => "ja",
        }
    }

    /// Human-readable provider name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Google => "Google Street View",
            Self::Bing => "Bing Streetside",
            Self::Yandex => "Yandex Panoramas",
            Self::Apple => "Apple Look Around",
            Self::Naver => "Naver Street View",
            Self::Ja => "Já.is Götusýn",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.id() == needle)
            .ok_or_else(|| ProviderError::UnknownProvider(s.to_string()))
    }
}

/// How a provider's tiles are turned into pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Pre-rendered PNG/JPEG tiles, blitted as-is
    #[default]
    Raster,
    /// Mapbox Vector Tiles, stroked locally with the layer style
    Vector,
}

impl RenderMode {
    /// Content type requested from the tile endpoint.
    pub fn accept(&self) -> &'static str {
        match self {
            Self::Raster => "image/png,image/jpeg;q=0.9,*/*;q=0.5",
            Self::Vector => "application/x-protobuf",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raster => f.write_str("raster"),
            Self::Vector => f.write_str("vector"),
        }
    }
}

impl FromStr for RenderMode {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raster" => Ok(Self::Raster),
            "vector" => Ok(Self::Vector),
            other => Err(ProviderError::InvalidRenderMode(other.to_string())),
        }
    }
}

/// Coordinate remapping applied before a tile URL is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordTransform {
    /// Spherical Web Mercator grid, used as-is
    #[default]
    Identity,
    /// Ellipsoidal World Mercator (EPSG:3395) grid
    AltMercator,
}

impl CoordTransform {
    /// Maps a requested tile onto the provider's grid.
    pub fn apply(&self, tile: TileCoord) -> TileCoord {
        match self {
            Self::Identity => tile,
            Self::AltMercator => {
                let (x, y) = reproject_tile_to_alt_mercator(tile.x, tile.y, tile.z);
                TileCoord { x, y, z: tile.z }
            }
        }
    }
}

/// Everything the generic coverage engine needs to know about one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    /// Tile URL with `{x}`, `{y}`, `{z}` and/or `{quadkey}` placeholders.
    ///
    /// Providers with a metadata endpoint use the TileJSON template instead
    /// once it has been resolved.
    pub url_template: String,
    /// TileJSON endpoint, if the provider publishes one
    pub metadata_url: Option<String>,
    pub transform: CoordTransform,
    pub mode: RenderMode,
    /// Zoom bounds assumed when no metadata is available
    pub zoom_range: ZoomRange,
}

impl ProviderSpec {
    /// Expands a URL template for the given tile.
    ///
    /// The coordinate transform runs first, so `{x}`/`{y}` and `{quadkey}`
    /// both address the provider's own grid.
    pub fn tile_url(&self, template: &str, tile: TileCoord) -> String {
        let mapped = self.transform.apply(tile);
        let mut url = template
            .replace("{z}", &mapped.z.to_string())
            .replace("{x}", &mapped.x.to_string())
            .replace("{y}", &mapped.y.to_string());
        if url.contains("{quadkey}") {
            url = url.replace("{quadkey}", &tile_to_quadkey(mapped.x, mapped.y, mapped.z));
        }
        url
    }

    /// Content type to request from the tile endpoint.
    pub fn accept(&self) -> &'static str {
        self.mode.accept()
    }
}
