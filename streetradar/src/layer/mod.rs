//! Coverage layers driven by a host tile grid.
//!
//! A [`CoverageLayer`] serves one provider. The host asks it for tiles
//! through [`CoverageLayer::create_tile`] and gets a blank [`TileSurface`]
//! back immediately; a tokio task fetches and renders the tile and then
//! reports through the completion callback, exactly once.
//!
//! ```text
//! host grid ──create_tile──► CoverageLayer ──spawn──► CoverageEngine
//!     ▲                           │                  ├─ MetadataResolver (shared)
//!     │                           │                  ├─ TileFetcher
//!     └──── done(err, surface) ◄──┘                  └─ decode_and_render / render_raster
//! ```
//!
//! Style changes on an attached layer re-render every live tile in place.
//! Each render carries a generation number; only the newest render of a
//! tile may write its pixels, so a slow earlier render cannot overwrite a
//! restyled one.

mod engine;
mod error;
mod state;

pub use engine::{CoverageEngine, RenderedTile, TileSource};
pub use error::{LayerError, TileError};
pub use state::{TileOutcome, TileState};

use crate::coord::TileCoord;
use crate::metadata::{MetadataError, TileJsonMetadata};
use crate::mvt::TileSurface;
use crate::provider::{AsyncHttpClient, ProviderFactory, ProviderKind, ProviderSpec};
use crate::style::{StylePatch, TileStyle};
use parking_lot::{Mutex, RwLock};
use state::TileEntry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tiny_skia::Pixmap;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Buffered redraw notifications per layer before slow subscribers lag.
const REDRAW_CHANNEL_CAPACITY: usize = 256;

/// Boxed completion callback for hosts that cannot be generic.
pub type TileCallback = Box<dyn FnOnce(Option<TileError>, TileSurface) + Send + 'static>;

/// The callback interface a host tile grid drives.
pub trait TileGridLayer: Send + Sync {
    /// Returns a surface for `coord` now and fills it asynchronously.
    fn create_tile(&self, coord: TileCoord, done: TileCallback) -> TileSurface;

    /// The grid no longer displays `coord`.
    fn remove_tile(&self, coord: TileCoord);

    /// The layer was added to a map.
    fn on_add(&self);

    /// The layer was removed from its map.
    fn on_remove(&self);
}

/// State shared between a layer and its tile tasks.
struct LayerShared {
    provider: ProviderKind,
    style: RwLock<TileStyle>,
    attached: AtomicBool,
    tiles: Mutex<HashMap<TileCoord, TileEntry>>,
    next_generation: AtomicU64,
    redraws: broadcast::Sender<TileCoord>,
}

impl LayerShared {
    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    fn mark_rendering(&self, coord: TileCoord, generation: u64) {
        if let Some(entry) = self.tiles.lock().get_mut(&coord) {
            if entry.generation == generation {
                entry.state = TileState::Rendering;
            }
        }
    }

    /// Writes a finished render into the tile's surface.
    ///
    /// Returns false, leaving the surface untouched, when the tile was
    /// removed or a newer render has started since `generation`.
    fn deliver(
        &self,
        coord: TileCoord,
        generation: u64,
        pixmap: Pixmap,
        outcome: TileOutcome,
    ) -> bool {
        let mut tiles = self.tiles.lock();
        match tiles.get_mut(&coord) {
            Some(entry) if entry.generation == generation => {
                entry.surface.with_pixmap(move |target| *target = pixmap);
                entry.state = TileState::Delivered(outcome);
                true
            }
            _ => {
                trace!(provider = %self.provider, tile = %coord, generation, "Discarding superseded render");
                false
            }
        }
    }

    /// Marks a render that never finished as failed, unless superseded.
    fn abandon(&self, coord: TileCoord, generation: u64) {
        if let Some(entry) = self.tiles.lock().get_mut(&coord) {
            if entry.generation == generation {
                entry.state = TileState::Delivered(TileOutcome::Failed);
            }
        }
    }
}

/// Invokes a tile's completion callback exactly once.
///
/// If the tile task is dropped before finishing (runtime shutdown, panic)
/// the callback still fires with [`TileError::Aborted`].
struct Completion {
    shared: Arc<LayerShared>,
    coord: TileCoord,
    generation: u64,
    surface: TileSurface,
    done: Option<TileCallback>,
}

impl Completion {
    fn complete(mut self, error: Option<TileError>) {
        if let Some(done) = self.done.take() {
            done(error, self.surface.clone());
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        let Some(done) = self.done.take() else {
            return;
        };
        self.shared.abandon(self.coord, self.generation);
        debug!(provider = %self.shared.provider, tile = %self.coord, "Tile task aborted");
        done(Some(TileError::Aborted), self.surface.clone());
    }
}

/// Keeps a redraw from leaving its tile stuck in `Rendering`.
struct RedrawTask {
    shared: Arc<LayerShared>,
    coord: TileCoord,
    generation: u64,
    finished: bool,
}

impl RedrawTask {
    fn finish(mut self, pixmap: Pixmap, outcome: TileOutcome) {
        self.finished = true;
        if self.shared.deliver(self.coord, self.generation, pixmap, outcome) {
            // No subscribers is fine
            let _ = self.shared.redraws.send(self.coord);
        }
    }
}

impl Drop for RedrawTask {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.abandon(self.coord, self.generation);
            debug!(provider = %self.shared.provider, tile = %self.coord, "Redraw task aborted");
        }
    }
}

/// One provider's coverage overlay.
pub struct CoverageLayer<C> {
    engine: Arc<CoverageEngine<C>>,
    spec: Arc<ProviderSpec>,
    shared: Arc<LayerShared>,
    runtime: Handle,
}

impl<C: AsyncHttpClient + 'static> CoverageLayer<C> {
    /// Creates a detached layer for `spec`.
    ///
    /// Must be called from within a tokio runtime; tile tasks are spawned
    /// onto it.
    pub fn new(
        engine: Arc<CoverageEngine<C>>,
        spec: ProviderSpec,
        style: TileStyle,
    ) -> Result<Self, LayerError> {
        let runtime = Handle::try_current()?;
        let (redraws, _) = broadcast::channel(REDRAW_CHANNEL_CAPACITY);

        debug!(provider = %spec.kind, mode = %spec.mode, "Coverage layer created");
        Ok(Self {
            shared: Arc::new(LayerShared {
                provider: spec.kind,
                style: RwLock::new(style),
                attached: AtomicBool::new(false),
                tiles: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                redraws,
            }),
            engine,
            spec: Arc::new(spec),
            runtime,
        })
    }

    /// Builds one layer per enabled provider, all sharing `engine`.
    pub fn for_enabled(
        engine: &Arc<CoverageEngine<C>>,
        factory: &ProviderFactory,
        style: TileStyle,
    ) -> Result<Vec<Self>, LayerError> {
        factory
            .enabled_specs()
            .into_iter()
            .map(|spec| Self::new(Arc::clone(engine), spec, style))
            .collect()
    }

    pub fn spec(&self) -> &ProviderSpec {
        &self.spec
    }

    pub fn engine(&self) -> &Arc<CoverageEngine<C>> {
        &self.engine
    }

    /// The current line style.
    pub fn style(&self) -> TileStyle {
        *self.shared.style.read()
    }

    /// Requests a tile.
    ///
    /// Returns a blank surface synchronously. The surface is filled in the
    /// background and `done` is invoked exactly once with the same surface:
    /// `None` when the tile was drawn or is out of the provider's range,
    /// otherwise the error. Requesting a live coordinate again replaces it.
    pub fn create_tile<F>(&self, coord: TileCoord, done: F) -> TileSurface
    where
        F: FnOnce(Option<TileError>, TileSurface) + Send + 'static,
    {
        let surface = TileSurface::from_pixmap(self.engine.blank_pixmap());
        let generation = self.shared.next_generation();

        let replaced = self
            .shared
            .tiles
            .lock()
            .insert(
                coord,
                TileEntry {
                    surface: surface.clone(),
                    generation,
                    state: TileState::Requested,
                },
            )
            .is_some();
        trace!(provider = %self.spec.kind, tile = %coord, generation, replaced, "Tile requested");

        let completion = Completion {
            shared: Arc::clone(&self.shared),
            coord,
            generation,
            surface: surface.clone(),
            done: Some(Box::new(done)),
        };
        let engine = Arc::clone(&self.engine);
        let spec = Arc::clone(&self.spec);
        let shared = Arc::clone(&self.shared);

        self.runtime.spawn(async move {
            shared.mark_rendering(coord, generation);
            let style = *shared.style.read();
            let rendered = engine
                .render_tile(&spec, &style, coord, engine.blank_pixmap())
                .await;
            shared.deliver(coord, generation, rendered.pixmap, rendered.outcome);
            completion.complete(rendered.error);
        });

        surface
    }

    /// Forgets a tile. A render still in flight completes but does not
    /// write to the surface.
    pub fn remove_tile(&self, coord: TileCoord) -> bool {
        let removed = self.shared.tiles.lock().remove(&coord).is_some();
        if removed {
            trace!(provider = %self.spec.kind, tile = %coord, "Tile removed");
        }
        removed
    }

    pub fn tile_state(&self, coord: TileCoord) -> Option<TileState> {
        self.shared.tiles.lock().get(&coord).map(|entry| entry.state)
    }

    /// The surface currently registered for `coord`.
    pub fn tile_surface(&self, coord: TileCoord) -> Option<TileSurface> {
        self.shared
            .tiles
            .lock()
            .get(&coord)
            .map(|entry| entry.surface.clone())
    }

    /// Coordinates of every tile the layer is tracking.
    pub fn live_tiles(&self) -> Vec<TileCoord> {
        let mut coords: Vec<TileCoord> = self.shared.tiles.lock().keys().copied().collect();
        coords.sort_by_key(|c| (c.z, c.x, c.y));
        coords
    }

    pub fn tile_count(&self) -> usize {
        self.shared.tiles.lock().len()
    }

    pub fn on_add(&self) {
        self.shared.attached.store(true, Ordering::SeqCst);
        debug!(provider = %self.spec.kind, "Coverage layer attached");
    }

    pub fn on_remove(&self) {
        self.shared.attached.store(false, Ordering::SeqCst);
        debug!(provider = %self.spec.kind, "Coverage layer detached");
    }

    pub fn is_attached(&self) -> bool {
        self.shared.attached.load(Ordering::SeqCst)
    }

    /// Merges `patch` into the style.
    ///
    /// When attached, every live tile is re-rendered in place and announced
    /// on [`subscribe_redraws`](Self::subscribe_redraws). A detached layer
    /// only records the new style.
    pub fn set_style(&self, patch: StylePatch) {
        if patch.is_empty() {
            return;
        }
        let style = {
            let mut style = self.shared.style.write();
            style.merge(&patch);
            *style
        };

        if !self.is_attached() {
            debug!(provider = %self.spec.kind, "Style updated on detached layer, no redraw");
            return;
        }

        let count = self.redraw();
        info!(
            provider = %self.spec.kind,
            color = %style.color,
            weight = style.weight,
            opacity = style.opacity,
            tiles = count,
            "Style updated, redrawing tiles"
        );
    }

    /// Re-renders every live tile with the current style.
    ///
    /// Returns how many tiles were scheduled.
    pub fn redraw(&self) -> usize {
        let targets: Vec<(TileCoord, u64)> = {
            let mut tiles = self.shared.tiles.lock();
            tiles
                .iter_mut()
                .map(|(coord, entry)| {
                    entry.generation = self.shared.next_generation();
                    entry.state = TileState::Rendering;
                    (*coord, entry.generation)
                })
                .collect()
        };

        for &(coord, generation) in &targets {
            let engine = Arc::clone(&self.engine);
            let spec = Arc::clone(&self.spec);
            let task = RedrawTask {
                shared: Arc::clone(&self.shared),
                coord,
                generation,
                finished: false,
            };

            self.runtime.spawn(async move {
                let style = *task.shared.style.read();
                let rendered = engine
                    .render_tile(&spec, &style, coord, engine.blank_pixmap())
                    .await;
                task.finish(rendered.pixmap, rendered.outcome);
            });
        }
        targets.len()
    }

    /// Receives the coordinate of each tile whose pixels changed after its
    /// initial delivery.
    pub fn subscribe_redraws(&self) -> broadcast::Receiver<TileCoord> {
        self.shared.redraws.subscribe()
    }

    /// Cached provider metadata, if any has been resolved.
    ///
    /// Always `None` for providers without a metadata endpoint.
    pub fn get_metadata(&self) -> Option<Arc<TileJsonMetadata>> {
        self.spec.metadata_url.as_ref()?;
        self.engine.resolver().cached(self.spec.kind)
    }

    /// Resolves provider metadata, fetching it if needed.
    pub async fn resolve_metadata(&self) -> Result<Arc<TileJsonMetadata>, MetadataError> {
        self.engine.resolver().get_metadata(&self.spec).await
    }
}

impl<C: AsyncHttpClient + 'static> TileGridLayer for CoverageLayer<C> {
    fn create_tile(&self, coord: TileCoord, done: TileCallback) -> TileSurface {
        CoverageLayer::create_tile(self, coord, done)
    }

    fn remove_tile(&self, coord: TileCoord) {
        CoverageLayer::remove_tile(self, coord);
    }

    fn on_add(&self) {
        CoverageLayer::on_add(self)
    }

    fn on_remove(&self) {
        CoverageLayer::on_remove(self)
    }
}

#[cfg(test)]
mod tests;
