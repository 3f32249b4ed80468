//! Coordinate type definitions

use std::fmt;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Zoom levels addressable by the slippy-map pyramid.
///
/// 30 keeps `2^z` inside a `u32` for tile indices.
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 30;

/// Tile coordinates in the standard slippy-map pyramid.
///
/// `x` grows eastward from the antimeridian, `y` grows southward from the
/// northern edge of the Web Mercator square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Column (east-west), 0 at west
    pub x: u32,
    /// Row (north-south), 0 at north
    pub y: u32,
    /// Zoom level
    pub z: u8,
}

impl TileCoord {
    /// Creates a tile coordinate, checking `0 <= x, y < 2^z`.
    pub fn new(x: u32, y: u32, z: u8) -> Result<Self, CoordError> {
        if z > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(z));
        }
        let tile = Self { x, y, z };
        if !tile.is_valid() {
            return Err(CoordError::OutOfRange { x, y, z });
        }
        Ok(tile)
    }

    /// Number of tiles along one edge at this zoom level.
    ///
    /// Saturates at `u64::MAX` for zoom levels of 64 and above.
    #[inline]
    pub fn tiles_per_edge(&self) -> u64 {
        1u64.checked_shl(u32::from(self.z)).unwrap_or(u64::MAX)
    }

    /// Returns true if the coordinate lies inside the pyramid.
    #[inline]
    pub fn is_valid(&self) -> bool {
        if self.z > MAX_ZOOM {
            return false;
        }
        let n = self.tiles_per_edge();
        (self.x as u64) < n && (self.y as u64) < n
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Creates a point, checking latitude and longitude ranges.
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordError::InvalidLatitude(lat));
        }
        if !(MIN_LON..=MAX_LON).contains(&lon) {
            return Err(CoordError::InvalidLongitude(lon));
        }
        Ok(Self { lat, lon })
    }
}

/// Inclusive zoom range supported by a tile source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomRange {
    pub min: u8,
    pub max: u8,
}

impl ZoomRange {
    /// Creates a range; `min` and `max` are swapped into order if reversed.
    pub fn new(min: u8, max: u8) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    #[inline]
    pub fn contains(&self, zoom: u8) -> bool {
        (self.min..=self.max).contains(&zoom)
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self {
            min: MIN_ZOOM,
            max: 22,
        }
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Latitude is outside the valid range
    InvalidLatitude(f64),
    /// Longitude is outside valid range (-180.0 to 180.0)
    InvalidLongitude(f64),
    /// Zoom level is outside valid range
    InvalidZoom(u8),
    /// Tile indices do not fit the pyramid at this zoom
    OutOfRange { x: u32, y: u32, z: u8 },
    /// Quadkey contains invalid characters or is too long
    InvalidQuadkey(String),
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::InvalidLatitude(lat) => {
                write!(
                    f,
                    "Invalid latitude: {} (must be between {} and {})",
                    lat, MIN_LAT, MAX_LAT
                )
            }
            CoordError::InvalidLongitude(lon) => {
                write!(
                    f,
                    "Invalid longitude: {} (must be between {} and {})",
                    lon, MIN_LON, MAX_LON
                )
            }
            CoordError::InvalidZoom(zoom) => {
                write!(
                    f,
                    "Invalid zoom level: {} (must be between {} and {})",
                    zoom, MIN_ZOOM, MAX_ZOOM
                )
            }
            CoordError::OutOfRange { x, y, z } => {
                write!(f, "Tile {}/{}/{} lies outside the pyramid", z, x, y)
            }
            CoordError::InvalidQuadkey(quadkey) => {
                write!(
                    f,
                    "Invalid quadkey: '{}' (must contain only digits 0-3 and length <= {})",
                    quadkey, MAX_ZOOM
                )
            }
        }
    }
}

impl std::error::Error for CoordError {}
