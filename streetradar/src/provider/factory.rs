//! Provider factory for centralized provider specs.
//!
//! Every provider runs through the same fetch/decode/render engine; what
//! differs is data: URL template, metadata endpoint, coordinate transform,
//! render mode and zoom bounds. This module owns those defaults and applies
//! user overrides from the `[provider.<id>]` config sections.

use super::types::{CoordTransform, ProviderKind, ProviderSpec, RenderMode};
use crate::config::ProviderSettings;
use crate::coord::ZoomRange;
use std::collections::BTreeMap;
use tracing::debug;

const GOOGLE_URL: &str =
    "https://mts1.googleapis.com/vt?hl=en-US&lyrs=svv|cb_client:apiv3&style=40,18&x={x}&y={y}&z={z}";
const BING_URL: &str = "https://t.ssl.ak.dynamic.tiles.virtualearth.net/comp/ch/{quadkey}?mkt=en-US&it=m,svc&shading=t&n=z&og=1&cstl=vbp&o=png";
const YANDEX_URL: &str =
    "https://core-stv-renderer.maps.yandex.net/2.x/tiles?l=stv&x={x}&y={y}&z={z}&scale=1";
const APPLE_URL: &str = "https://lookaround.streetradar.app/tiles/{z}/{x}/{y}.mvt";
const APPLE_METADATA_URL: &str = "https://lookaround.streetradar.app/tiles.json";
const NAVER_URL: &str = "https://map.pstatic.net/nrb/styles/panorama/{z}/{x}/{y}.png";
const JA_URL: &str = "https://gotusyn.ja.is/tiles/{z}/{x}/{y}.png";

/// Built-in spec for a provider, before config overrides.
pub fn default_spec(kind: ProviderKind) -> ProviderSpec {
    let (url, metadata_url, transform, mode, zoom_range) = match kind {
        ProviderKind::Google => (
            GOOGLE_URL,
            None,
            CoordTransform::Identity,
            RenderMode::Raster,
            ZoomRange::new(0, 21),
        ),
        ProviderKind::Bing => (
            BING_URL,
            None,
            CoordTransform::Identity,
            RenderMode::Raster,
            ZoomRange::new(1, 19),
        ),
        ProviderKind::Yandex => (
            YANDEX_URL,
            None,
            CoordTransform::AltMercator,
            RenderMode::Raster,
            ZoomRange::new(0, 21),
        ),
        ProviderKind::Apple => (
            APPLE_URL,
            Some(APPLE_METADATA_URL),
            CoordTransform::Identity,
            RenderMode::Vector,
            ZoomRange::default(),
        ),
        ProviderKind::Naver => (
            NAVER_URL,
            None,
            CoordTransform::Identity,
            RenderMode::Raster,
            ZoomRange::new(6, 21),
        ),
        ProviderKind::Ja => (
            JA_URL,
            None,
            CoordTransform::Identity,
            RenderMode::Raster,
            ZoomRange::new(0, 20),
        ),
    };

    ProviderSpec {
        kind,
        url_template: url.to_string(),
        metadata_url: metadata_url.map(str::to_string),
        transform,
        mode,
        zoom_range,
    }
}

/// Factory for creating provider specs.
///
/// # Example
///
/// ```
/// use streetradar::provider::{ProviderFactory, ProviderKind, RenderMode};
///
/// let factory = ProviderFactory::default();
/// let apple = factory.spec(ProviderKind::Apple);
/// assert_eq!(apple.mode, RenderMode::Vector);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProviderFactory {
    overrides: BTreeMap<ProviderKind, ProviderSettings>,
}

impl ProviderFactory {
    /// Create a factory applying the given per-provider overrides.
    pub fn new(overrides: BTreeMap<ProviderKind, ProviderSettings>) -> Self {
        Self { overrides }
    }

    /// Spec for one provider, with overrides applied.
    pub fn spec(&self, kind: ProviderKind) -> ProviderSpec {
        let mut spec = default_spec(kind);

        if let Some(settings) = self.overrides.get(&kind) {
            debug!(provider = %kind, "Applying provider overrides from config");
            if let Some(url) = &settings.url {
                spec.url_template = url.clone();
            }
            if let Some(metadata_url) = &settings.metadata_url {
                spec.metadata_url = Some(metadata_url.clone());
            }
            if let Some(mode) = settings.mode {
                spec.mode = mode;
            }
            let min = settings.min_zoom.unwrap_or(spec.zoom_range.min);
            let max = settings.max_zoom.unwrap_or(spec.zoom_range.max);
            spec.zoom_range = ZoomRange::new(min, max);
        }

        spec
    }

    /// Specs for every enabled provider, in display order.
    pub fn enabled_specs(&self) -> Vec<ProviderSpec> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.overrides.get(kind).map_or(true, |s| s.enabled))
            .map(|kind| self.spec(kind))
            .collect()
    }
}
