//! Per-tile lifecycle.
//!
//! ```text
//! Requested ──► Rendering ──► Delivered(Drawn | OutOfRange | Failed)
//!                   ▲                    │
//!                   └──── style change ──┘
//! ```

use crate::mvt::TileSurface;
use std::fmt;

/// How a delivered tile ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOutcome {
    /// Drawn, possibly with no coverage lines at all
    Drawn,
    /// Outside the provider's zoom bounds, delivered blank
    OutOfRange,
    /// Delivered blank with an error
    Failed,
}

/// Where a tile request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    Requested,
    Rendering,
    Delivered(TileOutcome),
}

impl TileState {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("requested"),
            Self::Rendering => f.write_str("rendering"),
            Self::Delivered(TileOutcome::Drawn) => f.write_str("delivered (drawn)"),
            Self::Delivered(TileOutcome::OutOfRange) => f.write_str("delivered (out of range)"),
            Self::Delivered(TileOutcome::Failed) => f.write_str("delivered (failed)"),
        }
    }
}

/// A live tile tracked by its layer.
#[derive(Debug, Clone)]
pub(crate) struct TileEntry {
    pub surface: TileSurface,
    /// Identifies the render allowed to write this tile's pixels
    pub generation: u64,
    pub state: TileState,
}
