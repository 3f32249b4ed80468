//! StreetRadar - street-level imagery coverage tiles
//!
//! This library provides the tile machinery behind StreetRadar's coverage
//! overlays: slippy-map addressing, per-provider tile endpoints, TileJSON
//! metadata resolution, and rendering of Mapbox Vector Tiles or raster
//! tiles into pixel surfaces for a host map grid.
//!
//! # High-Level API
//!
//! For most use cases, the [`layer`] module is the entry point:
//!
//! ```ignore
//! use std::sync::Arc;
//! use streetradar::config::ConfigFile;
//! use streetradar::layer::{CoverageEngine, CoverageLayer};
//!
//! let config = ConfigFile::load()?;
//! let engine = Arc::new(CoverageEngine::from_config(&config)?);
//! let layers = CoverageLayer::for_enabled(&engine, &config.provider_factory(), config.style)?;
//!
//! let surface = layers[0].create_tile(tile, |error, surface| {
//!     // hand the finished surface to the map
//! });
//! ```

pub mod config;
pub mod coord;
pub mod fetch;
pub mod layer;
pub mod logging;
pub mod metadata;
pub mod mvt;
pub mod provider;
pub mod style;

/// Version of the StreetRadar library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_coord_module_exists() {
        use crate::coord::to_tile_coords;
        let result = to_tile_coords(40.7128, -74.0060, 16);
        assert!(result.is_ok());
    }
}
