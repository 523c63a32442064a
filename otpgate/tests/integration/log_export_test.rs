//! `POST /logs` のスナップショット返却

use crate::support::{
    http::spawn_relay,
    relay::{client, current_code, fixture, stale_code},
};
use otpgate::activity::ActivityEntry;
use otpgate::api::create_app;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn export_returns_exact_copy_and_removes_snapshot() {
    let fx = fixture();
    for n in 0..20 {
        fx.state
            .activity
            .append(ActivityEntry::Startup {
                addr: format!("127.0.0.1:{}", 7000 + n),
            })
            .await
            .unwrap();
    }
    let before = std::fs::read(fx.log_path()).unwrap();

    let server = spawn_relay(create_app(fx.state.clone())).await;
    let response = client()
        .post(server.url("/logs"))
        .json(&json!({ "otp": current_code() }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-length"],
        before.len().to_string().as_str()
    );
    let body = response.bytes().await.unwrap();
    assert_eq!(body.as_ref(), before.as_slice());

    // 送信完了後に一時ファイルが消える
    let snapshot_dir = fx.snapshot_dir();
    let mut remaining = usize::MAX;
    for _ in 0..100 {
        remaining = std::fs::read_dir(&snapshot_dir).unwrap().count();
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining, 0);

    let lines = fx.log_lines();
    assert!(lines
        .last()
        .unwrap()
        .ends_with("[ADMIN] Logs exported to IP 127.0.0.1"));

    server.stop().await;
}

#[tokio::test]
async fn export_with_wrong_code_leaves_no_snapshot() {
    let fx = fixture();
    let server = spawn_relay(create_app(fx.state.clone())).await;

    let response = client()
        .post(server.url("/logs"))
        .json(&json!({ "otp": stale_code() }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(std::fs::read_dir(fx.snapshot_dir()).unwrap().count(), 0);
    let lines = fx.log_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("[AUTH FAIL] Log access attempt from IP 127.0.0.1"));

    server.stop().await;
}

#[tokio::test]
async fn export_of_empty_log_is_empty_body() {
    let fx = fixture();
    let server = spawn_relay(create_app(fx.state.clone())).await;

    let response = client()
        .post(server.url("/logs"))
        .json(&json!({ "otp": current_code() }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.bytes().await.unwrap().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn missing_snapshot_directory_is_disk_error() {
    let fx = fixture();
    std::fs::remove_dir(fx.snapshot_dir()).unwrap();
    let server = spawn_relay(create_app(fx.state.clone())).await;

    let response = client()
        .post(server.url("/logs"))
        .json(&json!({ "otp": current_code() }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Server Disk Error");
    assert!(fx
        .log_lines()
        .last()
        .unwrap()
        .contains("[ERROR] Log export failed for IP 127.0.0.1"));

    server.stop().await;
}
