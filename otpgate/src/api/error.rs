//! APIエラーレスポンス型
//!
//! axum用の共通エラーハンドリング

use crate::common::error::RelayError;
use axum::{response::IntoResponse, Json};
use serde_json::json;

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(pub RelayError);

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // 詳細はアクティビティログ側に残し、レスポンスには外部向けメッセージのみ返す
        let payload = json!({
            "error": self.0.external_message()
        });

        (self.0.status_code(), Json(payload)).into_response()
    }
}
