//! HTTP surface tests, driven through the router with `tower::ServiceExt::oneshot`.

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use report_exporter::server::{router, AppState};
use report_exporter::CSV_HEADER;

#[path = "helpers.rs"]
mod helpers;

use helpers::{create_exporter, create_test_pool, fee_detail, insert_report, parse_csv, utc};

async fn test_app() -> (Router, AppState) {
    let pool = create_test_pool().await;
    insert_report(
        &pool,
        42,
        9001,
        utc(2023, 1, 15),
        &[fee_detail(1, 100), fee_detail(2, 200)],
    )
    .await;

    let state = AppState::new(create_exporter(&pool, 4, 1024), CancellationToken::new());
    (router(state.clone()), state)
}

fn form_post(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/reports/export")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_error(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, value["error"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn test_post_streams_csv_attachment() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(form_post(
            "shop_id=42&start_time=2023-01-01T00:00:00.000Z&end_time=2023-01-31T00:00:00Z",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"42_20230101_20230131.csv\""
    );
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let (header_row, rows) = parse_csv(std::str::from_utf8(&body).unwrap());
    assert_eq!(header_row, CSV_HEADER.to_vec());
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_get_reads_query_string() {
    let (app, _) = test_app().await;
    let request = Request::builder()
        .uri("/v1/reports/export?shop_id=42&start_time=2023-01-01T00:00:00Z&end_time=2023-01-31T00:00:00Z")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(parse_csv(std::str::from_utf8(&body).unwrap()).1.len(), 2);
}

#[tokio::test]
async fn test_parse_failures_name_the_field() {
    let cases = [
        ("start_time=2023-01-01T00:00:00Z&end_time=2023-01-31T00:00:00Z", "invalid shop_id"),
        ("shop_id=x&start_time=2023-01-01T00:00:00Z&end_time=2023-01-31T00:00:00Z", "invalid shop_id"),
        ("shop_id=42&start_time=2023-01-01&end_time=2023-01-31T00:00:00Z", "invalid start time"),
        ("shop_id=42&start_time=2023-01-01T00:00:00Z", "invalid end time"),
    ];
    for (body, expected) in cases {
        let (app, _) = test_app().await;
        let (status, error) = json_error(app, form_post(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(error, expected, "body: {body}");
    }
}

#[tokio::test]
async fn test_validation_failures_are_bad_requests() {
    let cases = [
        (
            "shop_id=42&start_time=2023-02-01T00:00:00Z&end_time=2023-01-01T00:00:00Z",
            "start time is after end time",
        ),
        (
            "shop_id=0&start_time=2023-01-01T00:00:00Z&end_time=2023-01-31T00:00:00Z",
            "shop_id is required",
        ),
        (
            "shop_id=42&start_time=2020-01-01T00:00:00Z&end_time=2023-01-31T00:00:00Z",
            "time range exceeds duration limit (limit = 365 days)",
        ),
    ];
    for (body, expected) in cases {
        let (app, _) = test_app().await;
        let (status, error) = json_error(app, form_post(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error, expected);
    }
}

#[tokio::test]
async fn test_wrong_content_type_is_a_json_client_error() {
    let (app, _) = test_app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/v1/reports/export")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(value["error"].is_string());
}

#[tokio::test]
async fn test_healthz() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_status_counts_exports() {
    let (app, state) = test_app().await;

    let response = app
        .clone()
        .oneshot(form_post(
            "shop_id=42&start_time=2023-01-01T00:00:00Z&end_time=2023-01-31T00:00:00Z",
        ))
        .await
        .unwrap();
    to_bytes(response.into_body(), usize::MAX).await.unwrap();
    json_error(app.clone(), form_post("shop_id=nope")).await;

    // Completion is recorded by a background task once the export finishes
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.stats.completed() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("export should be recorded as completed");

    let response = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let status: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status["exports"]["started"], 1);
    assert_eq!(status["exports"]["completed"], 1);
    assert_eq!(status["exports"]["in_flight"], 0);
    assert_eq!(status["exports"]["failed"], 0);
    assert_eq!(status["failures"]["validation"], 1);
}
