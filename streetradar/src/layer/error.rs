//! Layer and per-tile error types.

use crate::mvt::DecodeError;
use thiserror::Error;

/// Why a tile was delivered blank with an error flag.
///
/// These never escape the tile's completion callback.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TileError {
    /// No usable HTTP response (network failure or unexpected status)
    #[error("tile transport error: {0}")]
    Transport(String),

    /// The payload could not be decoded
    #[error("tile decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The tile task was dropped before finishing
    #[error("tile task aborted before completion")]
    Aborted,
}

/// Errors constructing a layer or engine.
#[derive(Debug, Error)]
pub enum LayerError {
    /// Tile edge is zero or too large for a pixel buffer
    #[error("invalid tile size: {0}")]
    InvalidTileSize(u32),

    /// Layers spawn tile tasks and must be created inside a tokio runtime
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] crate::provider::ProviderError),
}
