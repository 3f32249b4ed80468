//! Rasterizing decoded tiles onto a pixel surface.

use super::geometry::{decode_tile, DecodeError, GeometryType};
use crate::style::TileStyle;
use parking_lot::Mutex;
use std::sync::Arc;
use tiny_skia::{ColorU8, LineCap, LineJoin, PathBuilder, Pixmap, Stroke, Transform};
use tracing::{debug, trace};

/// Something coverage lines can be drawn on.
pub trait DrawSurface {
    /// Resets every pixel to transparent.
    fn clear(&mut self);

    /// Strokes one connected path through `points` (pixel space).
    fn stroke_polyline(&mut self, points: &[(f32, f32)], style: &TileStyle);
}

impl DrawSurface for Pixmap {
    fn clear(&mut self) {
        self.fill(tiny_skia::Color::TRANSPARENT);
    }

    fn stroke_polyline(&mut self, points: &[(f32, f32)], style: &TileStyle) {
        let Some((&(x0, y0), rest)) = points.split_first() else {
            return;
        };
        if rest.is_empty() {
            return;
        }

        let mut path_builder = PathBuilder::new();
        path_builder.move_to(x0, y0);
        for &(x, y) in rest {
            path_builder.line_to(x, y);
        }

        if let Some(path) = path_builder.finish() {
            self.stroke_path(
                &path,
                &style.paint(),
                &Stroke {
                    width: style.weight,
                    line_cap: LineCap::Round,
                    line_join: LineJoin::Round,
                    ..Default::default()
                },
                Transform::identity(),
                None,
            );
        }
    }
}

/// Shared handle to one tile's pixels.
///
/// Handed to the map grid synchronously and filled in later by the tile's
/// render task; clones refer to the same pixels.
#[derive(Clone)]
pub struct TileSurface {
    pixmap: Arc<Mutex<Pixmap>>,
    size: u32,
}

impl TileSurface {
    /// A transparent square surface, or `None` for a zero or oversized edge.
    pub fn new(size: u32) -> Option<Self> {
        Pixmap::new(size, size).map(Self::from_pixmap)
    }

    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        let size = pixmap.width();
        Self {
            pixmap: Arc::new(Mutex::new(pixmap)),
            size,
        }
    }

    /// Edge length in pixels.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Runs `f` with exclusive access to the pixels.
    pub fn with_pixmap<R>(&self, f: impl FnOnce(&mut Pixmap) -> R) -> R {
        let mut pixmap = self.pixmap.lock();
        f(&mut *pixmap)
    }

    /// Copy of the current pixels.
    pub fn snapshot(&self) -> Pixmap {
        self.pixmap.lock().clone()
    }

    /// True when every pixel is fully transparent.
    pub fn is_blank(&self) -> bool {
        self.pixmap.lock().pixels().iter().all(|p| p.alpha() == 0)
    }

    /// Alpha of one pixel, `None` outside the surface.
    pub fn alpha_at(&self, x: u32, y: u32) -> Option<u8> {
        self.pixmap.lock().pixel(x, y).map(|p| p.alpha())
    }

    /// PNG encoding of the current pixels.
    pub fn encode_png(&self) -> Result<Vec<u8>, DecodeError> {
        self.pixmap
            .lock()
            .encode_png()
            .map_err(|e| DecodeError::Image(e.to_string()))
    }

    /// True if both handles refer to the same pixels.
    pub fn same_surface(&self, other: &TileSurface) -> bool {
        Arc::ptr_eq(&self.pixmap, &other.pixmap)
    }
}

impl std::fmt::Debug for TileSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileSurface").field("size", &self.size).finish()
    }
}

/// What one render pass did. Rendering never fails; problems are counted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderSummary {
    pub layers: usize,
    /// LineString features drawn or attempted
    pub features: usize,
    pub strokes: usize,
    /// Rings with fewer than two points, plus non-line features
    pub skipped: usize,
    /// Features whose geometry failed to decode
    pub malformed: usize,
    /// Set when the payload itself could not be parsed
    pub error: Option<DecodeError>,
}

/// Decodes a vector tile and strokes its line features onto `surface`.
///
/// Coordinates scale as `pixel = coord / extent * tile_size`. Decode errors
/// are reported in the summary and leave the surface as it was.
pub fn decode_and_render<S: DrawSurface + ?Sized>(
    bytes: &[u8],
    surface: &mut S,
    style: &TileStyle,
    tile_size: u32,
) -> RenderSummary {
    let mut summary = RenderSummary::default();

    let layers = match decode_tile(bytes) {
        Ok(layers) => layers,
        Err(e) => {
            debug!(bytes = bytes.len(), error = %e, "Vector tile decode failed");
            summary.error = Some(e);
            return summary;
        }
    };

    let mut points: Vec<(f32, f32)> = Vec::new();
    for layer in &layers {
        summary.layers += 1;
        summary.malformed += layer.malformed;
        summary.skipped += layer.unknown;
        let scale = tile_size as f32 / layer.extent as f32;

        for feature in &layer.features {
            if feature.geometry_type != GeometryType::LineString {
                summary.skipped += 1;
                continue;
            }
            summary.features += 1;

            for ring in &feature.rings {
                if ring.len() < 2 {
                    summary.skipped += 1;
                    continue;
                }
                points.clear();
                points.extend(
                    ring.iter()
                        .map(|&(x, y)| (x as f32 * scale, y as f32 * scale)),
                );
                surface.stroke_polyline(&points, style);
                summary.strokes += 1;
            }
        }
    }

    trace!(
        layers = summary.layers,
        features = summary.features,
        strokes = summary.strokes,
        skipped = summary.skipped,
        malformed = summary.malformed,
        "Vector tile rendered"
    );
    summary
}

/// Decodes a PNG/JPEG tile and copies it onto `pixmap`, scaled to fit.
///
/// The style's opacity multiplies the image alpha.
pub fn render_raster(bytes: &[u8], pixmap: &mut Pixmap, style: &TileStyle) -> Result<(), DecodeError> {
    let image = image::load_from_memory(bytes).map_err(|e| DecodeError::Image(e.to_string()))?;

    let (width, height) = (pixmap.width(), pixmap.height());
    let mut rgba = image.to_rgba8();
    if rgba.dimensions() != (width, height) {
        rgba = image::imageops::resize(&rgba, width, height, image::imageops::FilterType::Triangle);
    }

    let alpha_scale = style.opacity.clamp(0.0, 1.0);
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = src.0;
        let a = (a as f32 * alpha_scale).round() as u8;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(())
}
