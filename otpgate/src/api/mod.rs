//! REST APIハンドラー
//!
//! 2つのエンドポイントはどちらも同じ手順で前処理する:
//! メソッド確認 → JSONボディ解釈 → OTP検証 → 本処理。
//! 拒否されたリクエストはアクティビティログにちょうど1行を残す。

pub mod error;
pub mod logs;
pub mod proxy;

use crate::activity::{ActivityEntry, AuthScope};
use crate::common::error::RelayError;
use crate::common::ip::resolve_client_addr;
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use error::AppError;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

/// ルーターを構築する
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", any(proxy::fetch_and_relay))
        .route("/logs", any(logs::export_logs))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// OTPで保護された操作のリクエストボディ
pub(crate) trait OtpRequest: DeserializeOwned {
    /// 提示されたコード
    fn otp(&self) -> &str;

    /// 認証失敗時にログへ残す対象
    fn auth_scope(&self) -> AuthScope;
}

/// 接続元アドレス（プロキシヘッダー優先、なければ接続元ソケット）
pub(crate) fn client_addr(request: &Request) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    resolve_client_addr(request.headers(), peer)
}

/// 前処理を通過したリクエストだけ `action` に渡す
///
/// `action` には解釈済みボディと接続元アドレスを渡す。
pub(crate) async fn guarded<T, F, Fut>(state: &AppState, request: Request, action: F) -> Response
where
    T: OtpRequest,
    F: FnOnce(T, String) -> Fut,
    Fut: Future<Output = Response>,
{
    let client = client_addr(&request);

    if request.method() != Method::POST {
        let method = request.method().to_string();
        state
            .activity
            .record(ActivityEntry::InvalidMethod {
                method: method.clone(),
                client,
            })
            .await;
        let mut response = AppError(RelayError::MethodNotAllowed(method)).into_response();
        response
            .headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static("POST"));
        return response;
    }

    let path = request.uri().path().to_string();
    let payload: T = match decode_body(request, state.body_limit).await {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!(%path, error = %err, "Rejected request body");
            state
                .activity
                .record(ActivityEntry::BadRequest { path, client })
                .await;
            return AppError(err).into_response();
        }
    };

    match state.verifier.verify(payload.otp()) {
        Ok(true) => {}
        Ok(false) => {
            state
                .activity
                .record(ActivityEntry::AuthFail {
                    scope: payload.auth_scope(),
                    client,
                })
                .await;
            return AppError(RelayError::InvalidOtp).into_response();
        }
        Err(err) => {
            tracing::error!("OTP verification unavailable: {}", err);
            state
                .activity
                .record(ActivityEntry::ConfigError {
                    scope: payload.auth_scope(),
                    client,
                    error: err.clone(),
                })
                .await;
            return AppError(RelayError::Misconfigured(err)).into_response();
        }
    }

    action(payload, client).await
}

/// ボディを上限付きで読み出し、JSONとして解釈する
///
/// 必須フィールドの欠落も解釈失敗として扱う。
async fn decode_body<T: DeserializeOwned>(request: Request, limit: usize) -> Result<T, RelayError> {
    let bytes = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| RelayError::BadRequest(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| RelayError::BadRequest(e.to_string()))
}

/// 未定義パス
async fn not_found(State(state): State<AppState>, request: Request) -> Response {
    let client = client_addr(&request);
    let path = request.uri().path().to_string();
    state
        .activity
        .record(ActivityEntry::NotFound {
            method: request.method().to_string(),
            path: path.clone(),
            client,
        })
        .await;
    AppError(RelayError::NotFound(path)).into_response()
}
