//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude),
//! Web Mercator tile coordinates, and the provider-specific addressing
//! schemes used by coverage providers:
//!
//! - Bing addresses tiles by quadkey (see [`tile_to_quadkey`])
//! - Yandex serves its grid on the ellipsoidal World Mercator (EPSG:3395),
//!   see [`reproject_tile_to_alt_mercator`]

mod mercator;
mod types;

pub use mercator::{
    lat_lon_to_web_mercator, lat_lon_to_world_mercator, reproject_tile_to_alt_mercator,
    web_mercator_to_lat_lon, ALT_MERCATOR_MIN_ZOOM, WGS84_ECCENTRICITY, WGS84_SEMI_MAJOR_AXIS,
};
pub use types::{
    CoordError, GeoPoint, TileCoord, ZoomRange, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON,
    MIN_ZOOM,
};

use std::f64::consts::PI;

/// Converts geographic coordinates to tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 30)
///
/// # Returns
///
/// A `Result` containing the tile coordinates or an error if inputs are invalid.
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = 2.0_f64.powi(zoom as i32);
    let max_index = (n as u64 - 1) as u32;

    // lon = 180 and lat = MIN_LAT land exactly on the far edge
    let x = (((lon + 180.0) / 360.0 * n) as u32).min(max_index);

    let lat_rad = lat.to_radians();
    let y = (((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as u32).min(max_index);

    Ok(TileCoord { x, y, z: zoom })
}

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the latitude/longitude of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> (f64, f64) {
    let n = 2.0_f64.powi(tile.z as i32);

    let lon = tile.x as f64 / n * 360.0 - 180.0;

    let y = tile.y as f64 / n;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();

    (lat, lon)
}

/// Encodes a tile as a Bing Maps quadkey.
///
/// Each digit selects a quadrant, coarsest level first: bit `i - 1` of `x`
/// contributes 1 and bit `i - 1` of `y` contributes 2, for `i` from `z`
/// down to 1. Zoom 0 yields the empty string.
pub fn tile_to_quadkey(x: u32, y: u32, z: u8) -> String {
    let mut quadkey = String::with_capacity(z as usize);

    for level in (1..=z).rev() {
        let shift = u32::from(level - 1);
        let mut digit = b'0';
        // Levels above bit 31 are always zero for u32 indices
        if x.checked_shr(shift).unwrap_or(0) & 1 != 0 {
            digit += 1;
        }
        if y.checked_shr(shift).unwrap_or(0) & 1 != 0 {
            digit += 2;
        }
        quadkey.push(digit as char);
    }

    quadkey
}

/// Decodes a Bing Maps quadkey back into a tile.
pub fn quadkey_to_tile(quadkey: &str) -> Result<TileCoord, CoordError> {
    if quadkey.len() > MAX_ZOOM as usize {
        return Err(CoordError::InvalidQuadkey(quadkey.to_string()));
    }

    let z = quadkey.len() as u8;
    let mut x = 0u32;
    let mut y = 0u32;

    for (i, c) in quadkey.chars().enumerate() {
        let mask = 1u32 << (z as usize - 1 - i);
        match c {
            '0' => {}
            '1' => x |= mask,
            '2' => y |= mask,
            '3' => {
                x |= mask;
                y |= mask;
            }
            _ => return Err(CoordError::InvalidQuadkey(quadkey.to_string())),
        }
    }

    Ok(TileCoord { x, y, z })
}
