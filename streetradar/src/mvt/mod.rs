//! Mapbox Vector Tile decoding and rendering.
//!
//! Coverage data arrives as MVT protobuf with line features in a fixed
//! integer extent (typically 4096 units per edge). [`decode_tile`] turns the
//! payload into [`DecodedLayer`]s; [`decode_and_render`] strokes the
//! LineString features onto any [`DrawSurface`], usually a [`TileSurface`].
//!
//! Raster providers skip decoding and go through [`render_raster`] instead.

mod geometry;
pub mod proto;
mod render;

pub use geometry::{
    decode_geometry, decode_tile, DecodeError, DecodedFeature, DecodedLayer, ExtentPoint,
    GeometryType, DEFAULT_EXTENT,
};
pub use render::{decode_and_render, render_raster, DrawSurface, RenderSummary, TileSurface};

#[cfg(test)]
pub(crate) use geometry::tests::line_tile;
