//! Provider-agnostic tile rendering.
//!
//! The engine owns the shared HTTP client, the metadata resolver and the tile
//! fetcher. One engine serves every layer built from it, so metadata requests
//! for the same provider coalesce across layers.

use super::error::{LayerError, TileError};
use super::state::TileOutcome;
use crate::config::{ConfigFile, DEFAULT_TILE_SIZE, MAX_TILE_SIZE};
use crate::coord::{TileCoord, ZoomRange};
use crate::fetch::{TileFetchOutcome, TileFetcher};
use crate::metadata::MetadataResolver;
use crate::mvt::{decode_and_render, render_raster};
use crate::provider::{AsyncHttpClient, AsyncReqwestClient, ProviderSpec, RenderMode};
use crate::style::TileStyle;
use std::sync::Arc;
use tiny_skia::Pixmap;
use tracing::{debug, info, warn};

/// Where tiles for a provider come from right now.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSource {
    pub template: String,
    pub bounds: ZoomRange,
    /// False when the provider has no metadata or it could not be resolved
    pub from_metadata: bool,
}

/// Result of rendering one tile.
#[derive(Debug)]
pub struct RenderedTile {
    pub pixmap: Pixmap,
    pub outcome: TileOutcome,
    pub error: Option<TileError>,
}

impl RenderedTile {
    fn drawn(pixmap: Pixmap) -> Self {
        Self {
            pixmap,
            outcome: TileOutcome::Drawn,
            error: None,
        }
    }

    fn failed(pixmap: Pixmap, error: TileError) -> Self {
        Self {
            pixmap,
            outcome: TileOutcome::Failed,
            error: Some(error),
        }
    }
}

/// Fetches and renders tiles for any [`ProviderSpec`].
pub struct CoverageEngine<C> {
    resolver: MetadataResolver<C>,
    fetcher: TileFetcher<C>,
    tile_size: u32,
    blank: Pixmap,
}

impl CoverageEngine<AsyncReqwestClient> {
    /// Builds an engine with a reqwest client configured from `[http]` and
    /// `[render]`.
    pub fn from_config(config: &ConfigFile) -> Result<Self, LayerError> {
        let client = AsyncReqwestClient::with_options(config.http.timeout, &config.http.user_agent)?;
        Self::with_tile_size(client, config.render.tile_size)
    }
}

impl<C: AsyncHttpClient> CoverageEngine<C> {
    /// Creates an engine rendering tiles of [`DEFAULT_TILE_SIZE`] pixels.
    pub fn new(client: C) -> Result<Self, LayerError> {
        Self::with_tile_size(client, DEFAULT_TILE_SIZE)
    }

    /// Creates an engine rendering square tiles of `tile_size` pixels.
    ///
    /// # Errors
    ///
    /// [`LayerError::InvalidTileSize`] if the size is zero or above
    /// [`MAX_TILE_SIZE`].
    pub fn with_tile_size(client: C, tile_size: u32) -> Result<Self, LayerError> {
        if tile_size > MAX_TILE_SIZE {
            return Err(LayerError::InvalidTileSize(tile_size));
        }
        let blank =
            Pixmap::new(tile_size, tile_size).ok_or(LayerError::InvalidTileSize(tile_size))?;

        let client = Arc::new(client);
        Ok(Self {
            resolver: MetadataResolver::new(Arc::clone(&client)),
            fetcher: TileFetcher::new(client),
            tile_size,
            blank,
        })
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn resolver(&self) -> &MetadataResolver<C> {
        &self.resolver
    }

    pub fn fetcher(&self) -> &TileFetcher<C> {
        &self.fetcher
    }

    /// A fully transparent pixmap of the engine's tile size.
    pub fn blank_pixmap(&self) -> Pixmap {
        self.blank.clone()
    }

    /// Resolves the URL template and zoom bounds to use for `spec`.
    ///
    /// Providers with a metadata endpoint wait for their TileJSON. If it
    /// cannot be resolved the provider's built-in template and bounds are used.
    pub async fn tile_source(&self, spec: &ProviderSpec) -> TileSource {
        let fallback = || TileSource {
            template: spec.url_template.clone(),
            bounds: spec.zoom_range,
            from_metadata: false,
        };

        if spec.metadata_url.is_none() {
            return fallback();
        }

        match self.resolver.get_metadata(spec).await {
            Ok(meta) => TileSource {
                template: meta.tile_url_template.clone(),
                bounds: meta.zoom_range(),
                from_metadata: true,
            },
            Err(e) => {
                warn!(
                    provider = %spec.kind,
                    error = %e,
                    "Metadata unavailable, using built-in tile template"
                );
                fallback()
            }
        }
    }

    /// Fetches `tile` and draws it onto `pixmap`.
    ///
    /// Never fails: problems come back as [`TileOutcome::Failed`] with the
    /// pixmap left as it was passed in.
    pub async fn render_tile(
        &self,
        spec: &ProviderSpec,
        style: &TileStyle,
        tile: TileCoord,
        mut pixmap: Pixmap,
    ) -> RenderedTile {
        if !tile.is_valid() {
            debug!(provider = %spec.kind, tile = %tile, "Tile outside the grid");
            return RenderedTile {
                pixmap,
                outcome: TileOutcome::OutOfRange,
                error: None,
            };
        }

        let source = self.tile_source(spec).await;
        let outcome = self
            .fetcher
            .fetch_tile(spec, &source.template, tile, Some(source.bounds))
            .await;

        let bytes = match outcome {
            TileFetchOutcome::Data(bytes) => bytes,
            TileFetchOutcome::Empty => return RenderedTile::drawn(pixmap),
            TileFetchOutcome::OutOfBounds => {
                return RenderedTile {
                    pixmap,
                    outcome: TileOutcome::OutOfRange,
                    error: None,
                }
            }
            TileFetchOutcome::TransportError(reason) => {
                return RenderedTile::failed(pixmap, TileError::Transport(reason))
            }
        };

        match spec.mode {
            RenderMode::Vector => {
                let summary = decode_and_render(&bytes, &mut pixmap, style, self.tile_size);
                match summary.error {
                    Some(e) => {
                        warn!(provider = %spec.kind, tile = %tile, error = %e, "Vector tile rejected");
                        RenderedTile::failed(pixmap, e.into())
                    }
                    None => {
                        if summary.malformed > 0 {
                            debug!(
                                provider = %spec.kind,
                                tile = %tile,
                                malformed = summary.malformed,
                                "Skipped malformed features"
                            );
                        }
                        RenderedTile::drawn(pixmap)
                    }
                }
            }
            RenderMode::Raster => match render_raster(&bytes, &mut pixmap, style) {
                Ok(()) => RenderedTile::drawn(pixmap),
                Err(e) => {
                    warn!(provider = %spec.kind, tile = %tile, error = %e, "Raster tile rejected");
                    RenderedTile::failed(pixmap, e.into())
                }
            },
        }
    }

    /// Log metadata resolver statistics.
    pub fn log_stats(&self) {
        let stats = self.resolver.stats();
        info!(
            tile_size = self.tile_size,
            metadata_requests = stats.total_requests,
            metadata_fetches = stats.network_fetches,
            "Coverage engine statistics"
        );
        self.resolver.log_stats();
    }
}
