//! Vector tile decoding into tile-extent geometry.
//!
//! Geometry is a stream of `u32` command integers. Each command packs an id
//! in the low 3 bits and a repeat count above them, followed by `count`
//! parameter groups of zigzag-encoded deltas from the previous cursor
//! position:
//!
//! ```text
//! [9, 0, 0, 10, 8192, 8192]
//!  │  └──┘  │   └────────┘
//!  │   │    │    LineTo +4096,+4096
//!  │   │    LineTo x1
//!  │   MoveTo 0,0
//!  MoveTo x1
//! ```

use super::proto::{self, GeomType};
use prost::Message;
use thiserror::Error;

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

/// Extent assumed when a layer omits it.
pub const DEFAULT_EXTENT: u32 = 4096;

/// Errors decoding a vector tile payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The payload is not a valid protobuf `Tile` message.
    #[error("invalid vector tile protobuf: {0}")]
    Protobuf(String),

    /// A feature's command stream is malformed.
    #[error("malformed geometry: {0}")]
    Geometry(String),

    /// A raster payload or surface could not be decoded or encoded as an image.
    #[error("image codec error: {0}")]
    Image(String),
}

/// Geometry kind of a decoded feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
}

/// A point in tile-extent integer space.
pub type ExtentPoint = (i32, i32);

/// One feature's decoded geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFeature {
    pub id: Option<u64>,
    pub geometry_type: GeometryType,
    pub rings: Vec<Vec<ExtentPoint>>,
}

/// One decoded layer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLayer {
    pub name: String,
    pub extent: u32,
    pub features: Vec<DecodedFeature>,
    /// Features dropped because their geometry could not be decoded
    pub malformed: usize,
    /// Features with an unknown geometry type
    pub unknown: usize,
}

/// Parses a vector tile payload into layers of decoded features.
///
/// A protobuf error fails the whole tile. A feature with a malformed command
/// stream is counted in [`DecodedLayer::malformed`] and skipped.
pub fn decode_tile(bytes: &[u8]) -> Result<Vec<DecodedLayer>, DecodeError> {
    let tile = proto::Tile::decode(bytes).map_err(|e| DecodeError::Protobuf(e.to_string()))?;

    Ok(tile.layers.into_iter().map(decode_layer).collect())
}

fn decode_layer(layer: proto::Layer) -> DecodedLayer {
    let extent = match layer.extent() {
        0 => DEFAULT_EXTENT,
        extent => extent,
    };
    let mut decoded = DecodedLayer {
        name: layer.name,
        extent,
        features: Vec::with_capacity(layer.features.len()),
        malformed: 0,
        unknown: 0,
    };

    for feature in layer.features {
        let geometry_type = match feature.r#type() {
            GeomType::Point => GeometryType::Point,
            GeomType::Linestring => GeometryType::LineString,
            GeomType::Polygon => GeometryType::Polygon,
            GeomType::Unknown => {
                decoded.unknown += 1;
                continue;
            }
        };

        match decode_geometry(&feature.geometry) {
            Ok(rings) => decoded.features.push(DecodedFeature {
                id: feature.id,
                geometry_type,
                rings,
            }),
            Err(e) => {
                tracing::trace!(layer = %decoded.name, id = ?feature.id, error = %e, "Skipping malformed feature");
                decoded.malformed += 1;
            }
        }
    }

    decoded
}

#[inline]
fn zigzag(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Decodes a command stream into rings of absolute extent coordinates.
///
/// Every MoveTo starts a new ring, so a multi-point MoveTo yields one
/// single-point ring per point. ClosePath repeats the ring's first point.
pub fn decode_geometry(commands: &[u32]) -> Result<Vec<Vec<ExtentPoint>>, DecodeError> {
    let mut rings: Vec<Vec<ExtentPoint>> = Vec::new();
    let mut current: Vec<ExtentPoint> = Vec::new();
    let (mut x, mut y) = (0i32, 0i32);
    let mut i = 0;

    while i < commands.len() {
        let command = commands[i];
        let id = command & 0x7;
        let count = (command >> 3) as usize;
        i += 1;

        match id {
            CMD_MOVE_TO | CMD_LINE_TO => {
                if id == CMD_LINE_TO && current.is_empty() {
                    return Err(DecodeError::Geometry("LineTo before MoveTo".to_string()));
                }
                let params = count
                    .checked_mul(2)
                    .filter(|&n| n <= commands.len() - i)
                    .ok_or_else(|| {
                        DecodeError::Geometry(format!(
                            "command at {} wants {} points, stream has {} values left",
                            i - 1,
                            count,
                            commands.len() - i
                        ))
                    })?;

                for pair in commands[i..i + params].chunks_exact(2) {
                    x = x.checked_add(zigzag(pair[0])).ok_or_else(overflow)?;
                    y = y.checked_add(zigzag(pair[1])).ok_or_else(overflow)?;
                    if id == CMD_MOVE_TO && !current.is_empty() {
                        rings.push(std::mem::take(&mut current));
                    }
                    current.push((x, y));
                }
                i += params;
            }
            CMD_CLOSE_PATH => {
                if let Some(&first) = current.first() {
                    current.push(first);
                }
            }
            other => {
                return Err(DecodeError::Geometry(format!(
                    "unknown command id {} at {}",
                    other,
                    i - 1
                )));
            }
        }
    }

    if !current.is_empty() {
        rings.push(current);
    }
    Ok(rings)
}

fn overflow() -> DecodeError {
    DecodeError::Geometry("coordinate overflow".to_string())
}
