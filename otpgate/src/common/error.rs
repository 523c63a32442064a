//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! `RelayError`は`status_code()`と`external_message()`を提供し、
//! 内部情報（URL・ファイルパス・上流のエラー文言）を含まないレスポンスを生成できる。

use crate::activity::ActivityLogError;
use crate::totp::TotpError;
use axum::http::StatusCode;
use thiserror::Error;

/// リレーサーバーのエラー型
#[derive(Debug, Error)]
pub enum RelayError {
    /// POST以外のメソッド
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// リクエストボディが不正
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// 未定義のパス
    #[error("Not found: {0}")]
    NotFound(String),

    /// ワンタイムパスワード不一致
    #[error("Invalid OTP")]
    InvalidOtp,

    /// 検証器の設定エラー（シークレット未設定など）
    #[error("Verifier misconfigured: {0}")]
    Misconfigured(#[from] TotpError),

    /// 上流への接続失敗
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// 上流への接続タイムアウト
    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// スナップショット元のログファイルがない
    #[error("Activity log unavailable: {0}")]
    LogUnavailable(String),

    /// スナップショット用一時ファイルを作成できない
    #[error("Snapshot disk error: {0}")]
    SnapshotDisk(String),

    /// スナップショットのコピー失敗
    #[error("Snapshot copy error: {0}")]
    SnapshotCopy(String),

    /// 内部エラー
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns a safe error message for external clients.
    ///
    /// Full error details (`Display`) belong in the activity log and
    /// diagnostics only.
    pub fn external_message(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed(_) => "Method not allowed",
            Self::BadRequest(_) => "Bad request",
            Self::NotFound(_) => "Not found",
            Self::InvalidOtp => "Invalid OTP",
            Self::Misconfigured(_) => "Server error",
            Self::Upstream(_) => "Failed to reach target",
            Self::UpstreamTimeout(_) => "Target timed out",
            Self::LogUnavailable(_) => "Log file missing",
            Self::SnapshotDisk(_) => "Server Disk Error",
            Self::SnapshotCopy(_) => "Error snapshotting logs",
            Self::Internal(_) => "Internal server error",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidOtp => StatusCode::FORBIDDEN,
            Self::Misconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::LogUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SnapshotDisk(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SnapshotCopy(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ActivityLogError> for RelayError {
    fn from(err: ActivityLogError) -> Self {
        match err {
            ActivityLogError::SourceUnavailable(e) => Self::LogUnavailable(e.to_string()),
            ActivityLogError::Disk(e) => Self::SnapshotDisk(e.to_string()),
            ActivityLogError::Copy(e) => Self::SnapshotCopy(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout(err.to_string())
        } else {
            Self::Upstream(err.to_string())
        }
    }
}
