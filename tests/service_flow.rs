//! End-to-end tests through the HTTP router.
//!
//! Upstream is a local axum server so the real reqwest client, the governor
//! and the worker all run as they do in production.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anidb_mirror::server::{create_router, AppState};
use anidb_mirror::upstream::HttpAnimeClient;
use anidb_mirror::{MirrorService, Settings};
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use base64::Engine;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<anime id="1" restricted="false">
    <titles><title type="main">Test Anime</title></titles>
    <tags>
        <tag weight="400"><name>action</name></tag>
        <tag weight="300"><name>comedy</name></tag>
        <tag weight="600"><name>18 restricted</name></tag>
    </tags>
    <relatedanime>
        <anime id="2" type="sequel"/>
        <anime id="3" type="prequel"/>
    </relatedanime>
</anime>"#;

struct TestApp {
    _dir: TempDir,
    settings: Settings,
    service: Arc<MirrorService>,
}

impl TestApp {
    async fn new(configure: impl FnOnce(&mut Settings)) -> Self {
        let dir = tempdir().unwrap();
        let mut settings = Settings::with_data_dir(dir.path());
        settings.api_user = "admin".to_string();
        settings.api_pass = "secret".to_string();
        settings.throttle = Duration::from_millis(10);
        settings.min_call_delay = Duration::ZERO;
        configure(&mut settings);

        let db = settings.create_db_context();
        db.init_schema().await.unwrap();
        let service = Arc::new(MirrorService::new(db, &settings));
        Self {
            _dir: dir,
            settings,
            service,
        }
    }

    fn router(&self) -> Router {
        create_router(AppState::new(self.service.clone(), &self.settings))
    }

    async fn get(&self, uri: &str, auth: Option<(&str, &str)>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some((user, pass)) = auth {
            let token =
                base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
            request = request.header(header::AUTHORIZATION, format!("Basic {token}"));
        }
        self.router()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn get_authed(&self, uri: &str) -> Response {
        self.get(uri, Some(("admin", "secret"))).await
    }
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn stats_is_public() {
    let app = TestApp::new(|_| {}).await;

    let response = app.get("/stats", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "online");
    assert_eq!(json["cached_anime"], 0);
    assert_eq!(json["api_calls_last_24h"], 0);
    assert_eq!(json["queue_size"], 0);
    assert_eq!(json["daily_limit"], 200);
}

#[tokio::test]
async fn protected_routes_require_credentials() {
    let app = TestApp::new(|_| {}).await;

    for uri in ["/anime/1", "/search/tags?tags=action", "/tags", "/anime/1/relations"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(header_str(&response, "www-authenticate"), Some("Basic"));

        let response = app.get(uri, Some(("admin", "wrong"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    // Rejected requests never reach the queue.
    assert_eq!(app.service.queue().depth(), 0);
}

#[tokio::test]
async fn missing_anime_is_queued() {
    let app = TestApp::new(|_| {}).await;

    let response = app.get_authed("/anime/42").await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(
        json["detail"],
        "AID 42 queued for fetching. Check back in a few moments."
    );

    app.get_authed("/anime/42").await;
    assert_eq!(app.service.queue().depth(), 1);
}

#[tokio::test]
async fn invalid_ids_are_rejected() {
    let app = TestApp::new(|_| {}).await;

    assert_eq!(
        app.get_authed("/anime/0").await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        app.get_authed("/anime/-5").await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        app.get_authed("/anime/abc").await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(app.service.queue().depth(), 0);
}

#[tokio::test]
async fn cached_anime_is_served_with_headers() {
    let app = TestApp::new(|_| {}).await;
    app.service.db().records().put(1, SAMPLE).await.unwrap();

    let response = app.get_authed("/anime/1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "content-type"), Some("application/xml"));
    assert_eq!(header_str(&response, "x-cache"), Some("HIT"));
    assert_eq!(header_str(&response, "x-age-days"), Some("0"));
    assert_eq!(header_str(&response, "x-mature-filter"), Some("disabled"));
    assert!(header_str(&response, "x-status").is_none());
    assert_eq!(body_text(response).await, SAMPLE);

    let response = app.get_authed("/anime/1?mature=false").await;
    assert_eq!(header_str(&response, "x-mature-filter"), Some("enabled"));
    let body = body_text(response).await;
    assert!(!body.contains("18 restricted"));
    assert!(body.contains("action"));

    assert_eq!(app.service.queue().depth(), 0);
}

#[tokio::test]
async fn stale_anime_is_served_and_refreshed() {
    let app = TestApp::new(|s| s.update_threshold_days = 7).await;
    let old = chrono::Utc::now() - chrono::Duration::days(10);
    app.service
        .db()
        .records()
        .put_at(1, SAMPLE, old)
        .await
        .unwrap();

    let response = app.get_authed("/anime/1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-cache"), Some("STALE"));
    assert_eq!(header_str(&response, "x-status"), Some("Refreshing"));
    assert_eq!(header_str(&response, "x-age-days"), Some("10"));

    app.get_authed("/anime/1").await;
    assert_eq!(app.service.queue().depth(), 1);
}

#[tokio::test]
async fn tag_search_relations_and_listing() {
    let app = TestApp::new(|_| {}).await;
    app.service.db().records().put(1, SAMPLE).await.unwrap();

    let json = body_json(app.get_authed("/search/tags?tags=Action&min_weight=350").await).await;
    assert_eq!(json["query"], serde_json::json!(["action"]));
    assert_eq!(json["min_weight"], 350);
    assert_eq!(
        json["results"],
        serde_json::json!([{ "aid": 1, "tag_matches": 1 }])
    );

    let json = body_json(app.get_authed("/search/tags?tags=comedy&min_weight=350").await).await;
    assert_eq!(json["results"], serde_json::json!([]));

    // Default threshold is 200.
    let json = body_json(app.get_authed("/search/tags?tags=comedy").await).await;
    assert_eq!(json["min_weight"], 200);
    assert_eq!(json["results"][0]["aid"], 1);

    let json = body_json(app.get_authed("/anime/1/relations").await).await;
    assert_eq!(
        json,
        serde_json::json!([
            { "related_aid": 2, "relation_type": "sequel" },
            { "related_aid": 3, "relation_type": "prequel" }
        ])
    );

    let json = body_json(app.get_authed("/tags").await).await;
    assert_eq!(json.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn routes_nest_under_root_path() {
    let app = TestApp::new(|s| s.root_path = "/anidb".to_string()).await;

    assert_eq!(app.get("/anidb/stats", None).await.status(), StatusCode::OK);
    assert_eq!(app.get("/stats", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        app.get_authed("/anidb/anime/9").await.status(),
        StatusCode::ACCEPTED
    );
}

/// Queries seen by the fake upstream.
type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn fake_upstream(
    State(seen): State<Seen>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    seen.lock().unwrap().push(params.clone());
    match params.get("aid").map(String::as_str) {
        Some("1") => SAMPLE.into_response(),
        Some("2") => "<error>Banned</error>".into_response(),
        _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn start_upstream() -> (String, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route("/httpapi", get(fake_upstream))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/httpapi"), seen)
}

async fn wait_for_calls(app: &TestApp, expected: u64) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let calls = app.service.governor().calls_in_window().await.unwrap();
        if calls >= expected && app.service.queue().depth() == 0 {
            break;
        }
        assert!(Instant::now() < deadline, "worker did not finish in time");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    // Let the last write-through land.
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn worker_fetches_from_upstream() {
    let (url, seen) = start_upstream().await;
    let app = TestApp::new(|s| s.upstream.url = url).await;
    let client = HttpAnimeClient::new(app.settings.upstream.clone()).unwrap();
    let worker = app.service.start_worker(Arc::new(client));

    assert_eq!(app.get_authed("/anime/1").await.status(), StatusCode::ACCEPTED);
    wait_for_calls(&app, 1).await;

    let response = app.get_authed("/anime/1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-cache"), Some("HIT"));

    let queries = seen.lock().unwrap().clone();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0]["request"], "anime");
    assert_eq!(queries[0]["client"], "kometa");
    assert_eq!(queries[0]["aid"], "1");
    assert!(!queries[0].contains_key("user"));

    let json = body_json(app.get("/stats", None).await).await;
    assert_eq!(json["cached_anime"], 1);
    assert_eq!(json["api_calls_last_24h"], 1);

    worker.shutdown().await;
}

#[tokio::test]
async fn ban_and_errors_store_nothing() {
    let (url, seen) = start_upstream().await;
    let app = TestApp::new(|s| s.upstream.url = url).await;
    let client = HttpAnimeClient::new(app.settings.upstream.clone()).unwrap();
    let worker = app.service.start_worker(Arc::new(client));

    app.get_authed("/anime/2").await;
    app.get_authed("/anime/3").await;
    wait_for_calls(&app, 2).await;
    worker.shutdown().await;

    assert_eq!(seen.lock().unwrap().len(), 2);
    let records = app.service.db().records();
    assert!(records.get(2).await.unwrap().is_none());
    assert!(records.get(3).await.unwrap().is_none());
    assert_eq!(records.count().await.unwrap(), 0);

    // Both failures count against the budget, and neither id is retried.
    assert_eq!(app.service.governor().calls_in_window().await.unwrap(), 2);
    assert_eq!(app.service.queue().depth(), 0);
}

#[tokio::test]
async fn ceiling_blocks_upstream_calls() {
    let (url, seen) = start_upstream().await;
    let app = TestApp::new(|s| {
        s.upstream.url = url;
        s.daily_limit = 10;
    })
    .await;
    for aid in 100..110 {
        app.service.governor().record(aid, true).await.unwrap();
    }

    let client = HttpAnimeClient::new(app.settings.upstream.clone()).unwrap();
    let worker = app.service.start_worker(Arc::new(client));

    app.get_authed("/anime/1").await;
    wait_for_calls(&app, 10).await;
    worker.shutdown().await;

    assert!(seen.lock().unwrap().is_empty());
    assert!(app.service.db().records().get(1).await.unwrap().is_none());
    assert_eq!(app.service.governor().calls_in_window().await.unwrap(), 10);
}
