//! Spherical (EPSG:3857) and ellipsoidal (EPSG:3395) Mercator projections.
//!
//! Yandex serves its coverage grid on the WGS84 ellipsoid rather than the
//! sphere every other provider uses. The same `(x, y, z)` therefore covers a
//! slightly different patch of ground, and the offset grows with latitude
//! and zoom until it reaches a whole tile.

use super::{tile_to_lat_lon, TileCoord};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use tracing::{trace, warn};

/// WGS84 equatorial radius in meters (also the EPSG:3857 sphere radius).
pub const WGS84_SEMI_MAJOR_AXIS: f64 = 6_378_137.0;

/// WGS84 first eccentricity.
pub const WGS84_ECCENTRICITY: f64 = 0.0818191908426;

/// Below this zoom the sphere/ellipsoid offset is under a pixel.
pub const ALT_MERCATOR_MIN_ZOOM: u8 = 5;

const TILE_SIZE: f64 = 256.0;

/// Projects latitude/longitude (degrees) to EPSG:3857 meters.
#[inline]
pub fn lat_lon_to_web_mercator(lat: f64, lon: f64) -> (f64, f64) {
    let x = WGS84_SEMI_MAJOR_AXIS * lon.to_radians();
    let y = WGS84_SEMI_MAJOR_AXIS * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Inverse of [`lat_lon_to_web_mercator`], returning `(lat, lon)` in degrees.
#[inline]
pub fn web_mercator_to_lat_lon(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WGS84_SEMI_MAJOR_AXIS).to_degrees();
    let lat = (2.0 * (y / WGS84_SEMI_MAJOR_AXIS).exp().atan() - FRAC_PI_2).to_degrees();
    (lat, lon)
}

/// Projects latitude/longitude (degrees) to EPSG:3395 World Mercator meters.
#[inline]
pub fn lat_lon_to_world_mercator(lat: f64, lon: f64) -> (f64, f64) {
    let phi = lat.to_radians();
    let e = WGS84_ECCENTRICITY;
    let e_sin = e * phi.sin();

    let x = WGS84_SEMI_MAJOR_AXIS * lon.to_radians();
    let y = WGS84_SEMI_MAJOR_AXIS
        * ((FRAC_PI_4 + phi / 2.0).tan() * ((1.0 - e_sin) / (1.0 + e_sin)).powf(e / 2.0)).ln();
    (x, y)
}

/// Remaps a spherical-Mercator tile onto the EPSG:3395 tile grid.
///
/// Identity below [`ALT_MERCATOR_MIN_ZOOM`]. Otherwise the tile's northwest
/// corner is carried through EPSG:3857 meters into EPSG:3395 meters and back
/// to tile indices. Any degenerate result falls back to the input tile.
pub fn reproject_tile_to_alt_mercator(x: u32, y: u32, z: u8) -> (u32, u32) {
    if z < ALT_MERCATOR_MIN_ZOOM {
        return (x, y);
    }

    match alt_mercator_tile(x, y, z) {
        Some((alt_x, alt_y)) => {
            trace!(x, y, z, alt_x, alt_y, "Reprojected tile onto EPSG:3395 grid");
            (alt_x, alt_y)
        }
        None => {
            warn!(
                x,
                y, z, "EPSG:3395 reprojection failed, using spherical tile indices"
            );
            (x, y)
        }
    }
}

fn alt_mercator_tile(x: u32, y: u32, z: u8) -> Option<(u32, u32)> {
    let (lat, lon) = tile_to_lat_lon(&TileCoord { x, y, z });

    let (sx, sy) = lat_lon_to_web_mercator(lat, lon);
    let (lat, lon) = web_mercator_to_lat_lon(sx, sy);
    let (mx, my) = lat_lon_to_world_mercator(lat, lon);

    let tiles = 2.0_f64.powi(z as i32);
    let meters_per_pixel = 2.0 * PI * WGS84_SEMI_MAJOR_AXIS / (TILE_SIZE * tiles);
    let origin = PI * WGS84_SEMI_MAJOR_AXIS;

    let px = (mx + origin) / meters_per_pixel;
    let py = (origin - my) / meters_per_pixel;

    let tx = (px / TILE_SIZE).floor();
    let ty = (py / TILE_SIZE).floor();

    if !tx.is_finite() || !ty.is_finite() {
        return None;
    }
    if tx < 0.0 || ty < 0.0 || tx >= tiles || ty >= tiles {
        return None;
    }

    Some((tx as u32, ty as u32))
}
