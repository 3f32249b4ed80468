//! Per-tile HTTP fetching and response classification.
//!
//! One request per tile, no retries. Every failure mode collapses into a
//! [`TileFetchOutcome`] so a single bad tile never aborts the rest of the
//! viewport.

use crate::coord::{TileCoord, ZoomRange};
use crate::provider::{AsyncHttpClient, ProviderSpec};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Classified result of one tile request.
#[derive(Debug, Clone, PartialEq)]
pub enum TileFetchOutcome {
    /// Non-empty 2xx body
    Data(Bytes),
    /// 204, or a 2xx with no body
    Empty,
    /// 404, or a zoom outside the provider's known bounds
    OutOfBounds,
    /// Any other status, or no response at all
    TransportError(String),
}

impl TileFetchOutcome {
    /// Maps an HTTP status and body onto an outcome.
    pub fn from_status(status: u16, body: Bytes) -> Self {
        match status {
            204 => Self::Empty,
            404 => Self::OutOfBounds,
            200..=299 if body.is_empty() => Self::Empty,
            200..=299 => Self::Data(body),
            other => Self::TransportError(format!("unexpected HTTP status {}", other)),
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }
}

/// Issues tile requests against a provider's endpoint.
pub struct TileFetcher<C> {
    client: Arc<C>,
}

impl<C> Clone for TileFetcher<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: AsyncHttpClient> TileFetcher<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Fetches one tile.
    ///
    /// # Arguments
    ///
    /// * `spec` - Provider whose transform and render mode apply
    /// * `template` - URL template, either the provider's own or one from TileJSON
    /// * `tile` - Requested tile in Web Mercator addressing
    /// * `bounds` - Zoom bounds, when known; tiles outside them are not requested
    pub async fn fetch_tile(
        &self,
        spec: &ProviderSpec,
        template: &str,
        tile: TileCoord,
        bounds: Option<ZoomRange>,
    ) -> TileFetchOutcome {
        if let Some(bounds) = bounds {
            if !bounds.contains(tile.z) {
                trace!(
                    provider = %spec.kind,
                    tile = %tile,
                    min_zoom = bounds.min,
                    max_zoom = bounds.max,
                    "Tile zoom outside provider bounds, skipping request"
                );
                return TileFetchOutcome::OutOfBounds;
            }
        }

        let url = spec.tile_url(template, tile);
        let response = match self
            .client
            .get_with_headers(&url, &[("Accept", spec.accept())])
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = %spec.kind, tile = %tile, url = %url, error = %e, "Tile request failed");
                return TileFetchOutcome::TransportError(e.to_string());
            }
        };

        let status = response.status;
        let outcome = TileFetchOutcome::from_status(status, response.body);
        match &outcome {
            TileFetchOutcome::Data(body) => {
                debug!(provider = %spec.kind, tile = %tile, bytes = body.len(), "Tile fetched")
            }
            TileFetchOutcome::Empty | TileFetchOutcome::OutOfBounds => {
                trace!(provider = %spec.kind, tile = %tile, status, "Tile has no coverage")
            }
            TileFetchOutcome::TransportError(reason) => {
                warn!(provider = %spec.kind, tile = %tile, url = %url, reason = %reason, "Tile request rejected")
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        CoordTransform, HttpResponse, MockAsyncHttpClient, ProviderError, ProviderKind, RenderMode,
    };

    fn vector_spec() -> ProviderSpec {
        ProviderSpec {
            kind: ProviderKind::Apple,
            url_template: "https://tiles.test/{z}/{x}/{y}.mvt".to_string(),
            metadata_url: None,
            transform: CoordTransform::Identity,
            mode: RenderMode::Vector,
            zoom_range: ZoomRange::default(),
        }
    }

    async fn fetch_with(
        response: Result<HttpResponse, ProviderError>,
    ) -> (TileFetchOutcome, MockAsyncHttpClient) {
        let client = MockAsyncHttpClient::new(response);
        let fetcher = TileFetcher::new(Arc::new(client.clone()));
        let spec = vector_spec();
        let outcome = fetcher
            .fetch_tile(&spec, &spec.url_template, TileCoord { x: 2, y: 3, z: 10 }, None)
            .await;
        (outcome, client)
    }

    #[test]
    fn test_status_classification() {
        let body = Bytes::from_static(&[0x1a, 0x00]);
        assert_eq!(
            TileFetchOutcome::from_status(200, body.clone()),
            TileFetchOutcome::Data(body.clone())
        );
        assert_eq!(
            TileFetchOutcome::from_status(206, body.clone()),
            TileFetchOutcome::Data(body.clone())
        );
        assert_eq!(TileFetchOutcome::from_status(204, Bytes::new()), TileFetchOutcome::Empty);
        assert_eq!(TileFetchOutcome::from_status(200, Bytes::new()), TileFetchOutcome::Empty);
        assert_eq!(TileFetchOutcome::from_status(404, body.clone()), TileFetchOutcome::OutOfBounds);
        assert!(matches!(
            TileFetchOutcome::from_status(500, body.clone()),
            TileFetchOutcome::TransportError(_)
        ));
        assert!(matches!(
            TileFetchOutcome::from_status(403, body),
            TileFetchOutcome::TransportError(_)
        ));
    }

    #[tokio::test]
    async fn test_fetch_data_uses_template_and_accept() {
        let (outcome, client) = fetch_with(Ok(HttpResponse::new(200, vec![1, 2, 3]))).await;

        assert_eq!(outcome, TileFetchOutcome::Data(Bytes::from(vec![1, 2, 3])));
        assert_eq!(client.urls(), vec!["https://tiles.test/10/2/3.mvt"]);
        assert_eq!(
            client.last_headers(),
            vec![("Accept".to_string(), "application/x-protobuf".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fetch_no_content() {
        let (outcome, _) = fetch_with(Ok(HttpResponse::new(204, Bytes::new()))).await;
        assert_eq!(outcome, TileFetchOutcome::Empty);
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let (outcome, _) = fetch_with(Ok(HttpResponse::new(404, Bytes::new()))).await;
        assert_eq!(outcome, TileFetchOutcome::OutOfBounds);
    }

    #[tokio::test]
    async fn test_fetch_server_error() {
        let (outcome, _) = fetch_with(Ok(HttpResponse::new(503, Bytes::new()))).await;
        assert!(matches!(outcome, TileFetchOutcome::TransportError(_)));
    }

    #[tokio::test]
    async fn test_fetch_network_failure_is_swallowed() {
        let (outcome, _) =
            fetch_with(Err(ProviderError::HttpError("connection reset".into()))).await;
        assert_eq!(
            outcome,
            TileFetchOutcome::TransportError("HTTP error: connection reset".to_string())
        );
    }

    #[tokio::test]
    async fn test_out_of_bounds_zoom_skips_network() {
        let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(200, vec![1])));
        let fetcher = TileFetcher::new(Arc::new(client.clone()));
        let spec = vector_spec();
        let bounds = Some(ZoomRange::new(3, 16));

        let outcome = fetcher
            .fetch_tile(&spec, &spec.url_template, TileCoord { x: 0, y: 0, z: 20 }, bounds)
            .await;
        assert_eq!(outcome, TileFetchOutcome::OutOfBounds);

        let outcome = fetcher
            .fetch_tile(&spec, &spec.url_template, TileCoord { x: 0, y: 0, z: 2 }, bounds)
            .await;
        assert_eq!(outcome, TileFetchOutcome::OutOfBounds);
        assert_eq!(client.calls(), 0);

        let outcome = fetcher
            .fetch_tile(&spec, &spec.url_template, TileCoord { x: 0, y: 0, z: 16 }, bounds)
            .await;
        assert!(outcome.is_data());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_raster_accept_and_quadkey() {
        let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(200, vec![1])));
        let fetcher = TileFetcher::new(Arc::new(client.clone()));
        let spec = ProviderSpec {
            kind: ProviderKind::Bing,
            url_template: "https://bing.test/{quadkey}.png".to_string(),
            mode: RenderMode::Raster,
            ..vector_spec()
        };

        fetcher
            .fetch_tile(&spec, &spec.url_template, TileCoord { x: 2, y: 3, z: 10 }, None)
            .await;

        assert_eq!(client.urls(), vec!["https://bing.test/0000000032.png"]);
        assert!(client.last_headers()[0].1.starts_with("image/png"));
    }
}
