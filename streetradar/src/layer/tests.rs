use super::*;
use crate::config::ProviderSettings;
use crate::coord::ZoomRange;
use crate::mvt::line_tile;
use crate::provider::{CoordTransform, HttpResponse, MockAsyncHttpClient, ProviderError, RenderMode};
use crate::style::Rgb;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

const TILE_URL: &str = "https://tiles.test/2/1/1.mvt";
const META_URL: &str = "https://meta.test/tiles.json";

type Delivery = oneshot::Receiver<(Option<TileError>, TileSurface)>;

fn spec() -> ProviderSpec {
    ProviderSpec {
        kind: ProviderKind::Apple,
        url_template: "https://tiles.test/{z}/{x}/{y}.mvt".to_string(),
        metadata_url: None,
        transform: CoordTransform::Identity,
        mode: RenderMode::Vector,
        zoom_range: ZoomRange::new(0, 18),
    }
}

fn coord() -> TileCoord {
    TileCoord { x: 1, y: 1, z: 2 }
}

fn horizontal_line() -> Vec<u8> {
    line_tile(4096, &[&[(0, 2048), (4096, 2048)]])
}

fn engine(client: &MockAsyncHttpClient) -> Arc<CoverageEngine<MockAsyncHttpClient>> {
    Arc::new(CoverageEngine::with_tile_size(client.clone(), 64).unwrap())
}

fn new_layer(client: &MockAsyncHttpClient) -> CoverageLayer<MockAsyncHttpClient> {
    CoverageLayer::new(engine(client), spec(), TileStyle::default()).unwrap()
}

fn metadata_layer(client: &MockAsyncHttpClient) -> CoverageLayer<MockAsyncHttpClient> {
    let spec = ProviderSpec {
        metadata_url: Some(META_URL.to_string()),
        ..spec()
    };
    CoverageLayer::new(engine(client), spec, TileStyle::default()).unwrap()
}

fn tilejson(template: &str, min: u8, max: u8) -> HttpResponse {
    let body = format!(
        r#"{{"tilejson":"2.2.0","tiles":["{}"],"minzoom":{},"maxzoom":{}}}"#,
        template, min, max
    );
    HttpResponse::new(200, body.into_bytes())
}

fn request<C: AsyncHttpClient + 'static>(
    layer: &CoverageLayer<C>,
    coord: TileCoord,
) -> (TileSurface, Delivery) {
    let (tx, rx) = oneshot::channel();
    let surface = layer.create_tile(coord, move |error, surface| {
        let _ = tx.send((error, surface));
    });
    (surface, rx)
}

async fn delivered(rx: Delivery) -> (Option<TileError>, TileSurface) {
    timeout(Duration::from_secs(5), rx)
        .await
        .expect("tile not delivered in time")
        .expect("completion callback dropped")
}

// ─────────────────────────────────────────────────────────────────────────
// Tile lifecycle
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_tile_returns_blank_surface_then_draws() {
    let client = MockAsyncHttpClient::not_found()
        .with_route(TILE_URL, Ok(HttpResponse::new(200, horizontal_line())));
    let layer = new_layer(&client);

    let (surface, rx) = request(&layer, coord());
    assert!(surface.is_blank());
    assert_eq!(surface.size(), 64);
    assert_eq!(layer.tile_state(coord()), Some(TileState::Requested));

    let (error, delivered_surface) = delivered(rx).await;

    assert!(error.is_none());
    assert!(delivered_surface.same_surface(&surface));
    assert!(surface.alpha_at(32, 32).unwrap() > 0);
    assert_eq!(surface.alpha_at(32, 4), Some(0));
    assert_eq!(
        layer.tile_state(coord()),
        Some(TileState::Delivered(TileOutcome::Drawn))
    );
    assert_eq!(client.urls(), vec![TILE_URL]);
}

#[tokio::test]
async fn test_zoom_outside_bounds_is_blank_without_request() {
    let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(200, horizontal_line())));
    let layer = new_layer(&client);
    let deep = TileCoord { x: 0, y: 0, z: 20 };

    let (surface, rx) = request(&layer, deep);
    let (error, _) = delivered(rx).await;

    assert!(error.is_none());
    assert!(surface.is_blank());
    assert_eq!(
        layer.tile_state(deep),
        Some(TileState::Delivered(TileOutcome::OutOfRange))
    );
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_zoom_beyond_coordinate_width_is_out_of_range() {
    let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(200, horizontal_line())));
    let layer = new_layer(&client);
    let huge = TileCoord { x: 0, y: 0, z: 64 };

    let (surface, rx) = request(&layer, huge);
    let (error, _) = delivered(rx).await;

    assert!(error.is_none());
    assert!(surface.is_blank());
    assert_eq!(
        layer.tile_state(huge),
        Some(TileState::Delivered(TileOutcome::OutOfRange))
    );
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_not_found_is_blank_without_error() {
    let client = MockAsyncHttpClient::not_found();
    let layer = new_layer(&client);

    let (surface, rx) = request(&layer, coord());
    let (error, _) = delivered(rx).await;

    assert!(error.is_none());
    assert!(surface.is_blank());
    assert_eq!(
        layer.tile_state(coord()),
        Some(TileState::Delivered(TileOutcome::OutOfRange))
    );
}

#[tokio::test]
async fn test_transport_failure_is_reported() {
    let client = MockAsyncHttpClient::new(Err(ProviderError::HttpError("connection refused".into())));
    let layer = new_layer(&client);

    let (surface, rx) = request(&layer, coord());
    let (error, _) = delivered(rx).await;

    assert!(matches!(error, Some(TileError::Transport(_))));
    assert!(surface.is_blank());
    assert_eq!(
        layer.tile_state(coord()),
        Some(TileState::Delivered(TileOutcome::Failed))
    );
}

#[tokio::test]
async fn test_undecodable_payload_is_reported() {
    let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(200, vec![0xff, 0xff, 0xff])));
    let layer = new_layer(&client);

    let (surface, rx) = request(&layer, coord());
    let (error, _) = delivered(rx).await;

    assert!(matches!(error, Some(TileError::Decode(_))));
    assert!(surface.is_blank());
}

#[tokio::test]
async fn test_callback_fires_once_per_tile() {
    let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(500, Vec::new())))
        .with_route(TILE_URL, Ok(HttpResponse::new(200, horizontal_line())));
    let layer = new_layer(&client);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let coords = [
        coord(),
        TileCoord { x: 0, y: 0, z: 2 },
        TileCoord { x: 0, y: 0, z: 25 },
        TileCoord { x: 9, y: 0, z: 2 },
    ];
    for c in coords {
        let tx = tx.clone();
        layer.create_tile(c, move |error, _| {
            let _ = tx.send((c, error));
        });
    }
    drop(tx);

    let mut seen = Vec::new();
    while let Some((c, error)) = timeout(Duration::from_secs(5), rx.recv()).await.unwrap() {
        seen.push((c, error.is_some()));
    }

    seen.sort_by_key(|(c, _)| (c.z, c.x, c.y));
    assert_eq!(
        seen,
        vec![
            (TileCoord { x: 0, y: 0, z: 2 }, true),
            (coord(), false),
            (TileCoord { x: 9, y: 0, z: 2 }, false),
            (TileCoord { x: 0, y: 0, z: 25 }, false),
        ]
    );
}

#[test]
fn test_aborted_task_reports_aborted() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(200, horizontal_line())))
        .with_delay(Duration::from_secs(60));
    let (tx, rx) = std::sync::mpsc::channel();

    let layer = runtime.block_on(async {
        let layer = new_layer(&client);
        layer.create_tile(coord(), move |error, _| {
            let _ = tx.send(error);
        });
        tokio::task::yield_now().await;
        layer
    });
    drop(runtime);

    let error = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(error, Some(TileError::Aborted));
    assert!(rx.try_recv().is_err());
    assert_eq!(
        layer.tile_state(coord()),
        Some(TileState::Delivered(TileOutcome::Failed))
    );
}

#[test]
fn test_aborted_redraw_marks_tile_failed() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(200, horizontal_line())))
        .with_delay(Duration::from_secs(60));
    let (tx, rx) = std::sync::mpsc::channel();

    let layer = runtime.block_on(async {
        let layer = new_layer(&client);
        layer.on_add();
        layer.create_tile(coord(), move |error, _| {
            let _ = tx.send(error);
        });
        tokio::task::yield_now().await;
        assert_eq!(layer.redraw(), 1);
        tokio::task::yield_now().await;
        layer
    });
    assert_eq!(layer.tile_state(coord()), Some(TileState::Rendering));
    drop(runtime);

    // The superseded initial render still answers its callback
    let error = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(error, Some(TileError::Aborted));
    assert_eq!(
        layer.tile_state(coord()),
        Some(TileState::Delivered(TileOutcome::Failed))
    );
}

#[tokio::test]
async fn test_removed_tile_is_not_drawn() {
    let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(200, horizontal_line())))
        .with_delay(Duration::from_millis(20));
    let layer = new_layer(&client);

    let (surface, rx) = request(&layer, coord());
    assert!(layer.remove_tile(coord()));
    assert!(!layer.remove_tile(coord()));

    let (error, _) = delivered(rx).await;

    assert!(error.is_none());
    assert!(surface.is_blank());
    assert_eq!(layer.tile_state(coord()), None);
    assert_eq!(layer.tile_count(), 0);
}

#[tokio::test]
async fn test_requesting_live_tile_again_replaces_it() {
    let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(200, horizontal_line())));
    let layer = new_layer(&client);

    let (first, first_rx) = request(&layer, coord());
    let (second, second_rx) = request(&layer, coord());
    delivered(first_rx).await;
    delivered(second_rx).await;

    assert!(first.is_blank());
    assert!(!second.is_blank());
    assert_eq!(layer.tile_count(), 1);
    assert!(layer.tile_surface(coord()).unwrap().same_surface(&second));
}

#[tokio::test]
async fn test_superseded_render_is_discarded() {
    let client = MockAsyncHttpClient::not_found().with_delay(Duration::from_secs(60));
    let layer = new_layer(&client);
    let (surface, _rx) = request(&layer, coord());

    layer.on_add();
    layer.set_style(StylePatch::default().weight(4.0));

    let mut ink = layer.engine().blank_pixmap();
    ink.fill(tiny_skia::Color::BLACK);

    // create_tile took generation 0, the restyle took 1
    assert!(!layer.shared.deliver(coord(), 0, ink.clone(), TileOutcome::Drawn));
    assert!(surface.is_blank());
    assert_eq!(layer.tile_state(coord()), Some(TileState::Rendering));

    assert!(layer.shared.deliver(coord(), 1, ink, TileOutcome::Drawn));
    assert!(!surface.is_blank());
}

#[tokio::test]
async fn test_live_tiles_sorted() {
    let client = MockAsyncHttpClient::not_found();
    let layer = new_layer(&client);

    for c in [
        TileCoord { x: 3, y: 1, z: 3 },
        TileCoord { x: 1, y: 1, z: 2 },
        TileCoord { x: 0, y: 2, z: 3 },
    ] {
        layer.create_tile(c, |_, _| {});
    }

    assert_eq!(
        layer.live_tiles(),
        vec![
            TileCoord { x: 1, y: 1, z: 2 },
            TileCoord { x: 0, y: 2, z: 3 },
            TileCoord { x: 3, y: 1, z: 3 },
        ]
    );
}

// ─────────────────────────────────────────────────────────────────────────
// Style
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_style_on_detached_layer_only_records() {
    let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(200, horizontal_line())));
    let layer = new_layer(&client);
    let (_, rx) = request(&layer, coord());
    delivered(rx).await;
    let mut redraws = layer.subscribe_redraws();

    layer.set_style(StylePatch::default().color(Rgb::new(255, 0, 0)));
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(layer.style().color, Rgb::new(255, 0, 0));
    assert_eq!(client.calls(), 1);
    assert!(redraws.try_recv().is_err());
}

#[tokio::test]
async fn test_set_style_on_attached_layer_redraws_live_tiles() {
    let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(200, horizontal_line())));
    let layer = new_layer(&client);
    layer.on_add();
    let (surface, rx) = request(&layer, coord());
    delivered(rx).await;
    let mut redraws = layer.subscribe_redraws();

    layer.set_style(
        StylePatch::default()
            .color(Rgb::new(255, 0, 0))
            .opacity(1.0),
    );

    let redrawn = timeout(Duration::from_secs(5), redraws.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(redrawn, coord());
    assert_eq!(client.calls(), 2);

    let pixel = surface.snapshot().pixel(32, 32).unwrap();
    assert!(pixel.red() >= 250);
    assert!(pixel.blue() <= 10);
    assert_eq!(
        layer.tile_state(coord()),
        Some(TileState::Delivered(TileOutcome::Drawn))
    );
}

#[tokio::test]
async fn test_empty_style_patch_is_ignored() {
    let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(200, horizontal_line())));
    let layer = new_layer(&client);
    layer.on_add();
    let (_, rx) = request(&layer, coord());
    delivered(rx).await;

    layer.set_style(StylePatch::default());
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(layer.style(), TileStyle::default());
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_attach_detach() {
    let layer = new_layer(&MockAsyncHttpClient::not_found());
    assert!(!layer.is_attached());
    layer.on_add();
    assert!(layer.is_attached());
    layer.on_remove();
    assert!(!layer.is_attached());
}

// ─────────────────────────────────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_metadata_template_drives_tile_requests() {
    let client = MockAsyncHttpClient::not_found()
        .with_route(META_URL, Ok(tilejson("https://meta.test/{z}/{x}/{y}.pbf", 0, 16)))
        .with_route(
            "https://meta.test/2/1/1.pbf",
            Ok(HttpResponse::new(200, horizontal_line())),
        );
    let layer = metadata_layer(&client);
    assert!(layer.get_metadata().is_none());

    let (surface, rx) = request(&layer, coord());
    let (error, _) = delivered(rx).await;

    assert!(error.is_none());
    assert!(!surface.is_blank());
    assert_eq!(client.urls(), vec![META_URL, "https://meta.test/2/1/1.pbf"]);
    let meta = layer.get_metadata().unwrap();
    assert_eq!(meta.tile_url_template, "https://meta.test/{z}/{x}/{y}.pbf");
}

#[tokio::test]
async fn test_concurrent_tiles_share_one_metadata_fetch() {
    let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(204, Vec::new())))
        .with_route(META_URL, Ok(tilejson("https://meta.test/{z}/{x}/{y}.pbf", 0, 16)))
        .with_delay(Duration::from_millis(10));
    let layer = metadata_layer(&client);

    let receivers: Vec<_> = (0..4)
        .map(|x| request(&layer, TileCoord { x, y: 0, z: 2 }).1)
        .collect();
    for rx in receivers {
        let (error, _) = delivered(rx).await;
        assert!(error.is_none());
    }

    let metadata_fetches = client.urls().iter().filter(|u| *u == META_URL).count();
    assert_eq!(metadata_fetches, 1);
    assert_eq!(client.calls(), 5);
}

#[tokio::test]
async fn test_metadata_failure_falls_back_to_builtin_template() {
    let client = MockAsyncHttpClient::not_found()
        .with_route(META_URL, Ok(HttpResponse::new(500, Vec::new())))
        .with_route(TILE_URL, Ok(HttpResponse::new(200, horizontal_line())));
    let layer = metadata_layer(&client);

    let (surface, rx) = request(&layer, coord());
    let (error, _) = delivered(rx).await;

    assert!(error.is_none());
    assert!(!surface.is_blank());
    assert!(layer.get_metadata().is_none());
    assert!(matches!(
        layer.resolve_metadata().await,
        Err(MetadataError::Fetch { .. })
    ));
}

#[tokio::test]
async fn test_get_metadata_without_endpoint() {
    let layer = new_layer(&MockAsyncHttpClient::not_found());
    assert!(layer.get_metadata().is_none());
    assert_eq!(
        layer.resolve_metadata().await.unwrap_err(),
        MetadataError::NoEndpoint(ProviderKind::Apple)
    );
}

// ─────────────────────────────────────────────────────────────────────────
// Construction
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn test_new_requires_runtime() {
    let client = MockAsyncHttpClient::not_found();
    let engine = Arc::new(CoverageEngine::new(client).unwrap());
    let result = CoverageLayer::new(engine, spec(), TileStyle::default());
    assert!(matches!(result, Err(LayerError::NoRuntime(_))));
}

#[tokio::test]
async fn test_for_enabled_shares_engine() {
    let client = MockAsyncHttpClient::not_found();
    let engine = engine(&client);
    let mut overrides = BTreeMap::new();
    overrides.insert(
        ProviderKind::Google,
        ProviderSettings {
            enabled: false,
            ..ProviderSettings::default()
        },
    );
    let factory = ProviderFactory::new(overrides);

    let layers = CoverageLayer::for_enabled(&engine, &factory, TileStyle::default()).unwrap();

    let kinds: Vec<ProviderKind> = layers.iter().map(|l| l.spec().kind).collect();
    assert_eq!(
        kinds,
        vec![
            ProviderKind::Bing,
            ProviderKind::Yandex,
            ProviderKind::Apple,
            ProviderKind::Naver,
            ProviderKind::Ja,
        ]
    );
    assert!(layers.iter().all(|l| Arc::ptr_eq(l.engine(), &engine)));
}

#[tokio::test]
async fn test_grid_trait_object_drives_layer() {
    let client = MockAsyncHttpClient::new(Ok(HttpResponse::new(200, horizontal_line())));
    let layer = new_layer(&client);
    let grid: &dyn TileGridLayer = &layer;

    grid.on_add();
    let (tx, rx) = oneshot::channel();
    let surface = grid.create_tile(
        coord(),
        Box::new(move |error, surface| {
            let _ = tx.send((error, surface));
        }),
    );
    let (error, _) = delivered(rx).await;
    grid.remove_tile(coord());
    grid.on_remove();

    assert!(error.is_none());
    assert!(!surface.is_blank());
    assert_eq!(layer.tile_count(), 0);
    assert!(!layer.is_attached());
}
