//! Router-level smoke test for the `/health` endpoint, driven without a real
//! socket via `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use poker_core::{Lobby, TournamentConfig};
use poker_server::api;

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let lobby = Arc::new(Lobby::new(TournamentConfig::default()));
    let app = api::create_router(lobby);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
}
