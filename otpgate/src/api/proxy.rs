//! リソース中継（`POST /`）
//!
//! 上流のレスポンスボディをバッファせず、チャンク単位でクライアントへ流す。

use super::{error::AppError, guarded, OtpRequest};
use crate::activity::{ActivityEntry, ActivityLog, AuthScope};
use crate::common::error::RelayError;
use crate::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::io;
use std::pin::Pin;

const RELAY_DISPOSITION: &str = "attachment; filename=resource.dat";

/// `POST /` のリクエストボディ
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    /// 取得先URL
    pub url: String,
    /// ワンタイムパスワード
    pub otp: String,
}

impl OtpRequest for DownloadRequest {
    fn otp(&self) -> &str {
        &self.otp
    }

    fn auth_scope(&self) -> AuthScope {
        AuthScope::Download {
            url: self.url.clone(),
        }
    }
}

/// POST / - 認証後に指定URLを取得して中継する
pub async fn fetch_and_relay(State(state): State<AppState>, request: Request) -> Response {
    guarded(&state, request, |payload: DownloadRequest, client| {
        relay(&state, payload, client)
    })
    .await
}

async fn relay(state: &AppState, payload: DownloadRequest, client: String) -> Response {
    let DownloadRequest { url, .. } = payload;

    state
        .activity
        .record(ActivityEntry::ProxyStart {
            url: url.clone(),
            client,
        })
        .await;

    let upstream = match state.http_client.get(&url).send().await {
        Ok(response) => response,
        Err(err) => {
            let err = RelayError::from(err);
            state
                .activity
                .record(ActivityEntry::UpstreamFailure {
                    url,
                    error: err.to_string(),
                })
                .await;
            return AppError(err).into_response();
        }
    };

    tracing::debug!(
        %url,
        status = upstream.status().as_u16(),
        content_length = ?upstream.content_length(),
        "Upstream responded"
    );

    forward_as_attachment(upstream, state.activity.clone(), url)
}

/// 転送中の状態
///
/// 長さが既知なら最後のチャンクを読んだ時点で、未知ならストリーム終端で
/// 成功を記録する。hyperは `Content-Length` 分を書き終えるとボディを
/// 再度pollせずに破棄するため、終端を待つと成功を取りこぼす。
/// 結果を記録せずにドロップされた場合（クライアント切断）は中断として記録する。
struct TransferState {
    upstream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    activity: ActivityLog,
    url: String,
    expected: Option<u64>,
    transferred: u64,
    finished: bool,
}

impl TransferState {
    fn is_complete(&self) -> bool {
        self.expected == Some(self.transferred)
    }

    fn outcome(&mut self, failure: Option<String>) -> ActivityEntry {
        self.finished = true;
        let url = std::mem::take(&mut self.url);
        match failure {
            None => ActivityEntry::Success {
                url,
                bytes: self.transferred,
            },
            Some(reason) => ActivityEntry::StreamInterrupted {
                url,
                bytes: self.transferred,
                reason,
            },
        }
    }
}

impl Drop for TransferState {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // 長さ0のボディはpollされないまま破棄される
        let failure = (!self.is_complete()).then(|| "client disconnected".to_string());
        let entry = self.outcome(failure);
        let activity = self.activity.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { activity.record(entry).await });
            }
            Err(_) => {
                if let Err(e) = activity.append_blocking(&entry) {
                    tracing::warn!("{}", e);
                }
            }
        }
    }
}

/// 上流レスポンスを添付ファイルとして流す
///
/// ステータスは常に200。上流が長さを示していれば `Content-Length` を引き継ぐ。
pub(crate) fn forward_as_attachment(
    upstream: reqwest::Response,
    activity: ActivityLog,
    url: String,
) -> Response {
    let content_length = upstream.content_length();

    let transfer = TransferState {
        upstream: Box::pin(upstream.bytes_stream()),
        activity,
        url,
        expected: content_length,
        transferred: 0,
        finished: false,
    };

    let stream = futures::stream::try_unfold(transfer, |mut state| async move {
        match state.upstream.next().await {
            Some(Ok(chunk)) => {
                state.transferred += chunk.len() as u64;
                if !state.finished && state.is_complete() {
                    let entry = state.outcome(None);
                    state.activity.record(entry).await;
                }
                Ok(Some((chunk, state)))
            }
            Some(Err(err)) => {
                if !state.finished {
                    let entry = state.outcome(Some(err.to_string()));
                    state.activity.record(entry).await;
                }
                Err(io::Error::other(err))
            }
            None => {
                if !state.finished {
                    let entry = state.outcome(None);
                    state.activity.record(entry).await;
                }
                Ok(None)
            }
        }
    });

    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static(RELAY_DISPOSITION),
    );
    if let Some(len) = content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    response
}
