//! ログエクスポート（`POST /logs`）
//!
//! アクティビティログのスナップショットを作成し、その内容を返す。
//! スナップショットの一時ファイルはレスポンスボディと同じ寿命で、送信完了か
//! 切断でボディがドロップされた時点で削除される。

use super::{error::AppError, guarded, OtpRequest};
use crate::activity::{ActivityEntry, AuthScope, LogSnapshot};
use crate::common::error::RelayError;
use crate::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

/// ログファイル名が取れない場合の添付ファイル名
const FALLBACK_FILENAME: &str = "activity.log";

/// `POST /logs` のリクエストボディ
#[derive(Debug, Deserialize)]
pub struct LogExportRequest {
    /// ワンタイムパスワード
    pub otp: String,
}

impl OtpRequest for LogExportRequest {
    fn otp(&self) -> &str {
        &self.otp
    }

    fn auth_scope(&self) -> AuthScope {
        AuthScope::LogAccess
    }
}

/// POST /logs - 認証後にアクティビティログのスナップショットを返す
pub async fn export_logs(State(state): State<AppState>, request: Request) -> Response {
    guarded(&state, request, |_: LogExportRequest, client| {
        export(&state, client)
    })
    .await
}

async fn export(state: &AppState, client: String) -> Response {
    let result = match state.activity.snapshot().await {
        Ok(snapshot) => serve_snapshot(snapshot, attachment_name(state)).await,
        Err(err) => Err(RelayError::from(err)),
    };

    match result {
        Ok(response) => {
            state
                .activity
                .record(ActivityEntry::LogExport { client })
                .await;
            response
        }
        Err(err) => {
            tracing::error!("Log export failed: {}", err);
            state
                .activity
                .record(ActivityEntry::LogExportFailed {
                    client,
                    error: err.to_string(),
                })
                .await;
            AppError(err).into_response()
        }
    }
}

fn attachment_name(state: &AppState) -> String {
    state
        .activity
        .path()
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(FALLBACK_FILENAME)
        .to_string()
}

/// スナップショットを読み出すレスポンスを作る
async fn serve_snapshot(snapshot: LogSnapshot, filename: String) -> Result<Response, RelayError> {
    let len = snapshot.byte_len();
    let temp_path = snapshot.into_temp_path();
    let file = tokio::fs::File::open(&temp_path)
        .await
        .map_err(|e| RelayError::SnapshotCopy(e.to_string()))?;

    // ボディがドロップされるまで一時ファイルを残す
    let stream = ReaderStream::new(file).map(move |chunk| {
        let _snapshot = &temp_path;
        chunk
    });

    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"activity.log\""));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    Ok(response)
}
