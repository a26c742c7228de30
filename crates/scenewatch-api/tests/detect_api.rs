//! Router-level tests for the detection endpoints.
//!
//! These drive the real router with a stub detection backend and a scratch
//! database, so handler validation and persistence are exercised without
//! model weights or FFmpeg.

use std::io::Cursor;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{Duration, Utc};
use image::{DynamicImage, Rgb, RgbImage};
use tempfile::TempDir;
use tower::ServiceExt;

use scenewatch_api::{create_router, ApiConfig, AppState};
use scenewatch_media::{Detector, StubDetector};
use scenewatch_models::DetectionRecord;
use scenewatch_store::SceneStore;

const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

struct TestApp {
    router: axum::Router,
    store: SceneStore,
    // Keeps upload/db paths alive for the test's duration
    _dir: TempDir,
}

fn test_app(detector: Arc<dyn Detector>) -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = ApiConfig {
        db_path: dir.path().join("scenes.db"),
        upload_dir: dir.path().join("uploads"),
        ..ApiConfig::default()
    };
    let store = SceneStore::open(&config.db_path).unwrap();
    let state = AppState::with_components(config, store.clone(), detector);
    TestApp {
        router: create_router(state, None),
        store,
        _dir: dir,
    }
}

async fn scene_count(store: &SceneStore) -> usize {
    store
        .get_scenes_by_time_range(Utc::now() - Duration::hours(1), Utc::now() + Duration::hours(1))
        .await
        .unwrap()
        .len()
}

/// 100x100 black PNG with a white rectangle at (25,25)-(75,75).
fn test_png() -> Vec<u8> {
    let mut img = RgbImage::new(100, 100);
    for y in 25..75 {
        for x in 25..75 {
            img.put_pixel(x, y, Rgb([255, 255, 255]));
        }
    }
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .unwrap();
    bytes
}

fn multipart_body(field_name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field_name}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
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
        .body(Body::from(body))
        .unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn image_detection_happy_path() {
    let record = DetectionRecord::new("person", 0.95, 10.0, 10.0, 50.0, 50.0).with_class_id(0);
    let app = test_app(Arc::new(StubDetector::new(vec![record])));

    let body = multipart_body("file", "scene.png", "image/png", &test_png());
    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/detect/image", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;

    let scene_id = json["scene_id"].as_i64().unwrap();
    assert!(scene_id > 0);
    let detections = json["detections"].as_array().unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0]["class"], "person");
    assert!(json["annotated_image"]
        .as_str()
        .unwrap()
        .contains("annotated_"));

    // Scene row exists, carries the resolution, and is marked processed.
    let scene = app.store.get_scene(scene_id.into()).await.unwrap();
    assert_eq!(scene.camera_id, "image_upload");
    assert_eq!(scene.resolution.as_deref(), Some("100x100"));
    assert!(scene.processed);
    assert_eq!(app.store.count_detections(scene_id.into()).await.unwrap(), 1);
}

#[tokio::test]
async fn image_with_no_matches_returns_empty_list() {
    let app = test_app(Arc::new(StubDetector::empty()));

    let body = multipart_body("file", "scene.png", "image/png", &test_png());
    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/detect/image", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert!(json["scene_id"].as_i64().unwrap() > 0);
    assert_eq!(json["detections"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn image_rejects_disallowed_content_type() {
    let app = test_app(Arc::new(StubDetector::empty()));

    let body = multipart_body("file", "notes.txt", "text/plain", b"hello");
    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/detect/image", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("invalid file type"));
    // No scene row was created.
    assert_eq!(scene_count(&app.store).await, 0);
}

#[tokio::test]
async fn image_rejects_missing_file_field() {
    let app = test_app(Arc::new(StubDetector::empty()));

    let body = multipart_body("other", "scene.png", "image/png", &test_png());
    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/detect/image", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(scene_count(&app.store).await, 0);
}

#[tokio::test]
async fn image_rejects_undecodable_upload_without_scene_row() {
    let app = test_app(Arc::new(StubDetector::empty()));

    let body = multipart_body("file", "broken.png", "image/png", b"not a png at all");
    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/detect/image", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(scene_count(&app.store).await, 0);
}

#[tokio::test]
async fn video_rejects_disallowed_content_type() {
    let app = test_app(Arc::new(StubDetector::empty()));

    let body = multipart_body("file", "clip.webm", "video/webm", b"data");
    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/detect/video", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(scene_count(&app.store).await, 0);
}

#[tokio::test]
async fn webcam_rejects_nonpositive_duration() {
    let app = test_app(Arc::new(StubDetector::empty()));

    for body in ["duration=0", "duration=-3"] {
        let response = app
            .router
            .clone()
            .oneshot(form_request("/detect/webcam", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
    assert_eq!(scene_count(&app.store).await, 0);
}

#[tokio::test]
async fn webcam_rejects_missing_duration() {
    let app = test_app(Arc::new(StubDetector::empty()));

    let response = app
        .router
        .clone()
        .oneshot(form_request("/detect/webcam", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(scene_count(&app.store).await, 0);
}

#[tokio::test]
async fn rtsp_rejects_malformed_url() {
    let app = test_app(Arc::new(StubDetector::empty()));

    let response = app
        .router
        .clone()
        .oneshot(form_request(
            "/detect/rtsp",
            "rtsp_url=http%3A%2F%2Fexample.com%2Fstream&duration=5",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = response_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("rtsp://"));
    assert_eq!(scene_count(&app.store).await, 0);
}

#[tokio::test]
async fn rtsp_rejects_nonpositive_duration() {
    let app = test_app(Arc::new(StubDetector::empty()));

    let response = app
        .router
        .clone()
        .oneshot(form_request(
            "/detect/rtsp",
            "rtsp_url=rtsp%3A%2F%2Fcam.example%2Flive&duration=0",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(scene_count(&app.store).await, 0);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app(Arc::new(StubDetector::empty()));

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn error_responses_carry_detail_only() {
    let app = test_app(Arc::new(StubDetector::empty()));

    let response = app
        .router
        .clone()
        .oneshot(form_request("/detect/webcam", "duration=0"))
        .await
        .unwrap();

    let json = response_json(response).await;
    assert!(json["detail"].is_string());
    assert!(json.get("stack_trace").is_none());
}
