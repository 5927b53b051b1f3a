//! API integration tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scorecard_api::{create_router, ApiConfig, AppState, APP_TITLE};
use scorecard_storage::{GcsClient, GcsConfig, RetryConfig, StaticToken, VideoLibrary};

const BOUNDARY: &str = "scorecard-test-boundary";

fn test_config(work_dir: &std::path::Path) -> ApiConfig {
    ApiConfig {
        work_dir: work_dir.to_path_buf(),
        ..ApiConfig::default()
    }
}

fn router(config: ApiConfig, library: Option<VideoLibrary>) -> Router {
    create_router(AppState::with_services(config, library, None), None)
}

fn library(server: &MockServer) -> VideoLibrary {
    let mut config = GcsConfig::new("pitch-bucket");
    config.base_url = server.uri();
    config.retry = RetryConfig::none();
    VideoLibrary::new(GcsClient::new(config, Arc::new(StaticToken::anonymous())).unwrap())
}

/// Multipart body with text fields and an optional file part.
fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"video\"; filename=\"{file_name}\"\r\n\
                 Content-Type: video/mp4\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn object_json(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "bucket": "pitch-bucket",
        "size": "1048576",
        "timeCreated": "2024-03-01T12:30:00Z"
    })
}

/// Metadata GET for `videos/<name>`: 200 with the object, or 404.
async fn mount_object(server: &MockServer, name: &str, exists: bool) {
    let response = if exists {
        ResponseTemplate::new(200).set_body_json(object_json(&format!("videos/{}", name)))
    } else {
        ResponseTemplate::new(404)
    };
    Mock::given(method("GET"))
        .and(path(format!("/storage/v1/b/pitch-bucket/o/videos%2F{}", name)))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_landing_page_has_title() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(test_config(dir.path()), None)
        .oneshot(get("/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert!(response.headers().contains_key("x-request-id"));
    let html = body_text(response).await;
    assert!(html.contains(&format!("<title>{}</title>", APP_TITLE)));
    assert!(html.contains("Regular Season Game"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(test_config(dir.path()), None)
        .oneshot(get("/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_ready_degraded_without_services() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(test_config(dir.path()), None)
        .oneshot(get("/ready"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["storage"]["status"], "disabled");
    assert_eq!(json["checks"]["gemini"]["status"], "disabled");
}

#[tokio::test]
async fn test_status_reports_capabilities() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    let response = router(test_config(dir.path()), Some(library(&server)))
        .oneshot(get("/api/status"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["gemini"], false);
    assert_eq!(json["google_cloud"], true);
    assert_eq!(json["bucket"], "pitch-bucket");
    assert_eq!(json["max_upload_size_mb"], 200);
}

#[tokio::test]
async fn test_videos_unavailable_without_storage() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(test_config(dir.path()), None)
        .oneshot(get("/api/videos"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_json(response).await["detail"]
        .as_str()
        .unwrap()
        .contains("not configured"));
}

#[tokio::test]
async fn test_list_videos() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/pitch-bucket/o"))
        .and(query_param("prefix", "videos/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                {"name": "videos/20240301_120000_bullpen.mp4", "bucket": "pitch-bucket", "size": "2097152"},
                {"name": "videos/notes.txt", "bucket": "pitch-bucket", "size": "10"}
            ]
        })))
        .mount(&server)
        .await;

    let response = router(test_config(dir.path()), Some(library(&server)))
        .oneshot(get("/api/videos"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["videos"][0]["name"], "20240301_120000_bullpen.mp4");
    assert_eq!(json["videos"][0]["size"], "2.00 MB");
    assert_eq!(
        json["videos"][0]["gcs_uri"],
        "gs://pitch-bucket/videos/20240301_120000_bullpen.mp4"
    );
}

#[tokio::test]
async fn test_missing_video_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let response = router(test_config(dir.path()), Some(library(&server)))
        .oneshot(get("/api/videos/missing.mp4"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_analyze_upload_falls_back_without_gemini() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(
        &[
            ("pitcher", "Clayton Kershaw"),
            ("pitch_type", "Curveball"),
            ("game_context", "regular_season"),
            ("slow_motion", "false"),
        ],
        Some(("bullpen.mp4", &b"fake video bytes"[..])),
    );

    let response = router(test_config(dir.path()), None)
        .oneshot(multipart_request("/api/analyze", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["request"]["pitcher_name"], "Clayton Kershaw");
    assert_eq!(json["request"]["pitch_type"], "curveball");
    assert_eq!(json["request"]["slow_motion"], false);
    assert_eq!(json["outcome"]["source"]["kind"], "rule_based");
    // Elite base 90, curveball -2.
    assert_eq!(json["outcome"]["mechanics_score"], 88);
    assert!(json["outcome"]["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .any(|w| w.as_str().unwrap().contains("Gemini API unavailable")));
}

#[tokio::test]
async fn test_analyze_requires_video() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(&[("pitcher", "Amateur")], None);

    let response = router(test_config(dir.path()), None)
        .oneshot(multipart_request("/api/analyze", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["detail"]
        .as_str()
        .unwrap()
        .contains("No video file provided"));
}

#[tokio::test]
async fn test_analyze_rejects_unknown_pitch_type() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(
        &[("pitch_type", "knuckleball")],
        Some(("bullpen.mp4", &b"fake video bytes"[..])),
    );

    let response = router(test_config(dir.path()), None)
        .oneshot(multipart_request("/api/analyze", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_rejects_unsupported_format() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(&[], Some(("notes.txt", &b"hello"[..])));

    let response = router(test_config(dir.path()), None)
        .oneshot(multipart_request("/api/analyze", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_body_limit() {
    let dir = tempfile::tempdir().unwrap();
    let config = ApiConfig {
        max_upload_size: 64,
        ..test_config(dir.path())
    };
    let body = multipart_body(&[], Some(("bullpen.mp4", &[0u8; 256][..])));

    let response = router(config, None)
        .oneshot(multipart_request("/api/analyze", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_rate_limiting() {
    let dir = tempfile::tempdir().unwrap();
    let config = ApiConfig {
        rate_limit_rps: 1,
        rate_limit_burst: 1,
        ..test_config(dir.path())
    };
    let app = router(config, None);

    let request = || {
        Request::builder()
            .uri("/api/status")
            .header("X-Forwarded-For", "192.168.1.100")
            .body(Body::empty())
            .unwrap()
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.headers()["retry-after"], "1");

    // Health checks sit outside the limited routes.
    let health = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rename_video() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_object(&server, "old.mov", true).await;
    mount_object(&server, "new.mov", false).await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/b/pitch-bucket/o/videos%2Fold\.mov/copyTo/b/pitch-bucket/o/videos%2Fnew\.mov$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(object_json("videos/new.mov")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/b/pitch-bucket/o/videos%2Fold.mov"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let response = router(test_config(dir.path()), Some(library(&server)))
        .oneshot(json_request(
            "PATCH",
            "/api/videos/old.mov",
            serde_json::json!({"new_name": "new"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "new.mov");
    assert_eq!(json["size"], "1.00 MB");
}

#[tokio::test]
async fn test_rename_status_codes() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_object(&server, "a.mp4", true).await;
    mount_object(&server, "b.mp4", true).await;
    mount_object(&server, "ghost.mp4", false).await;
    let app = router(test_config(dir.path()), Some(library(&server)));

    let taken = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/api/videos/a.mp4",
            serde_json::json!({"new_name": "b.mp4"}),
        ))
        .await
        .unwrap();
    assert_eq!(taken.status(), StatusCode::CONFLICT);

    let missing = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/api/videos/ghost.mp4",
            serde_json::json!({"new_name": "real.mp4"}),
        ))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let unsupported = app
        .oneshot(json_request(
            "PATCH",
            "/api/videos/a.mp4",
            serde_json::json!({"new_name": "a.txt"}),
        ))
        .await
        .unwrap();
    assert_eq!(unsupported.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_video() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/b/pitch-bucket/o/videos%2Fbullpen.mp4"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/b/pitch-bucket/o/videos%2Fghost.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let app = router(test_config(dir.path()), Some(library(&server)));

    let response = app.clone().oneshot(delete("/api/videos/bullpen.mp4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"], 1);

    let response = app.oneshot(delete("/api/videos/ghost.mp4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_all_videos() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/pitch-bucket/o"))
        .and(query_param("prefix", "videos/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [object_json("videos/a.mp4"), object_json("videos/b.mov")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/storage/v1/b/pitch-bucket/o/videos%2F.+$"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let response = router(test_config(dir.path()), Some(library(&server)))
        .oneshot(delete("/api/videos"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"], 2);
}

#[tokio::test]
async fn test_video_content() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/pitch-bucket/o/videos%2Fbullpen.mov"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mov bytes".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/pitch-bucket/o/videos%2Fghost.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let app = router(test_config(dir.path()), Some(library(&server)));

    let response = app.clone().oneshot(get("/api/videos/bullpen.mov/content")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/quicktime");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "9");
    assert_eq!(body_text(response).await, "mov bytes");

    let response = app.oneshot(get("/api/videos/ghost.mp4/content")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_analyze_stored_video_falls_back_without_gemini() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    // Registered first so the download wins over the metadata route.
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/pitch-bucket/o/videos%2Fbullpen.mp4"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake video bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    mount_object(&server, "bullpen.mp4", true).await;

    let response = router(test_config(dir.path()), Some(library(&server)))
        .oneshot(json_request(
            "POST",
            "/api/videos/bullpen.mp4/analyze",
            serde_json::json!({
                "pitcher_name": "Amateur",
                "pitch_type": "fastball",
                "slow_motion": false
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["request"]["game_context"], "practice");
    assert_eq!(json["outcome"]["source"]["kind"], "rule_based");
    // Amateur base 70, fastball +2.
    assert_eq!(json["outcome"]["mechanics_score"], 72);
    assert_eq!(json["outcome"]["video"]["name"], "bullpen.mp4");
}

#[tokio::test]
async fn test_analyze_stored_video_requires_pitcher() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    let response = router(test_config(dir.path()), Some(library(&server)))
        .oneshot(json_request(
            "POST",
            "/api/videos/bullpen.mp4/analyze",
            serde_json::json!({"pitcher_name": "  "}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
