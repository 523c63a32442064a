//! アクティビティログのエントリ定義
//!
//! ログ利用者が依存する `[TAG] message` 形式の語彙をここに集約する。

use crate::totp::TotpError;
use std::borrow::Cow;
use std::fmt;

/// 認証失敗がどの操作に対するものか
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScope {
    /// リソース中継（`POST /`）
    Download {
        /// 要求されたURL
        url: String,
    },
    /// ログエクスポート（`POST /logs`）
    LogAccess,
}

/// アクティビティログの1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEntry {
    /// サーバー起動
    Startup {
        /// 待受アドレス
        addr: String,
    },
    /// 起動時にシークレットを使えない
    SecretUnavailable {
        /// 設定エラー種別
        error: TotpError,
    },
    /// POST以外のメソッド
    InvalidMethod {
        /// HTTPメソッド
        method: String,
        /// 送信元アドレス
        client: String,
    },
    /// リクエストボディを解釈できない
    BadRequest {
        /// リクエストパス
        path: String,
        /// 送信元アドレス
        client: String,
    },
    /// 未定義のパス
    NotFound {
        /// HTTPメソッド
        method: String,
        /// リクエストパス
        path: String,
        /// 送信元アドレス
        client: String,
    },
    /// コード不一致
    AuthFail {
        /// 対象操作
        scope: AuthScope,
        /// 送信元アドレス
        client: String,
    },
    /// 検証器の設定エラー
    ConfigError {
        /// 対象操作
        scope: AuthScope,
        /// 送信元アドレス
        client: String,
        /// 設定エラー種別
        error: TotpError,
    },
    /// 中継開始
    ProxyStart {
        /// 取得先URL
        url: String,
        /// 送信元アドレス
        client: String,
    },
    /// 上流への接続失敗
    UpstreamFailure {
        /// 取得先URL
        url: String,
        /// エラー内容
        error: String,
    },
    /// 中継完了
    Success {
        /// 取得先URL
        url: String,
        /// 転送バイト数
        bytes: u64,
    },
    /// 中継が途中で中断された
    StreamInterrupted {
        /// 取得先URL
        url: String,
        /// 中断までに転送したバイト数
        bytes: u64,
        /// 中断理由
        reason: String,
    },
    /// ログエクスポート成功
    LogExport {
        /// 送信元アドレス
        client: String,
    },
    /// ログエクスポート失敗
    LogExportFailed {
        /// 送信元アドレス
        client: String,
        /// エラー内容
        error: String,
    },
}

impl ActivityEntry {
    /// 行頭のタグ
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Startup { .. } => "[STARTUP]",
            Self::SecretUnavailable { .. } => "[ERROR]",
            Self::InvalidMethod { .. } => "[INVALID METHOD]",
            Self::BadRequest { .. } => "[BAD REQUEST]",
            Self::NotFound { .. } => "[NOT FOUND]",
            Self::AuthFail { .. } => "[AUTH FAIL]",
            Self::ConfigError { .. } => "[CONFIG ERROR]",
            Self::ProxyStart { .. } => "[PROXY]",
            Self::UpstreamFailure { .. } => "[ERROR]",
            Self::Success { .. } => "[SUCCESS]",
            Self::StreamInterrupted { .. } => "[ERROR]",
            Self::LogExport { .. } => "[ADMIN]",
            Self::LogExportFailed { .. } => "[ERROR]",
        }
    }
}

impl fmt::Display for ActivityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.tag())?;
        match self {
            Self::Startup { addr } => write!(f, "Server running on: {}", one_line(addr)),
            Self::SecretUnavailable { error } => write!(f, "{error}"),
            Self::InvalidMethod { method, client } => write!(
                f,
                "{} request from IP {}",
                one_line(method),
                one_line(client)
            ),
            Self::BadRequest { path, client } => write!(
                f,
                "Malformed request body for {} from IP {}",
                one_line(path),
                one_line(client)
            ),
            Self::NotFound {
                method,
                path,
                client,
            } => write!(
                f,
                "{} {} from IP {}",
                one_line(method),
                one_line(path),
                one_line(client)
            ),
            Self::AuthFail { scope, client } => match scope {
                AuthScope::Download { url } => write!(
                    f,
                    "Download attempt for {} from IP {}",
                    one_line(url),
                    one_line(client)
                ),
                AuthScope::LogAccess => {
                    write!(f, "Log access attempt from IP {}", one_line(client))
                }
            },
            Self::ConfigError {
                scope,
                client,
                error,
            } => match scope {
                AuthScope::Download { url } => write!(
                    f,
                    "{error}; download attempt for {} from IP {}",
                    one_line(url),
                    one_line(client)
                ),
                AuthScope::LogAccess => write!(
                    f,
                    "{error}; log access attempt from IP {}",
                    one_line(client)
                ),
            },
            Self::ProxyStart { url, client } => write!(
                f,
                "Starting download: {} (IP: {})",
                one_line(url),
                one_line(client)
            ),
            Self::UpstreamFailure { url, error } => write!(
                f,
                "Upstream failure for {}: {}",
                one_line(url),
                one_line(error)
            ),
            Self::Success { url, bytes } => {
                write!(f, "Transferred {bytes} bytes from {}", one_line(url))
            }
            Self::StreamInterrupted { url, bytes, reason } => write!(
                f,
                "Stream interrupted after {bytes} bytes from {}: {}",
                one_line(url),
                one_line(reason)
            ),
            Self::LogExport { client } => {
                write!(f, "Logs exported to IP {}", one_line(client))
            }
            Self::LogExportFailed { client, error } => write!(
                f,
                "Log export failed for IP {}: {}",
                one_line(client),
                one_line(error)
            ),
        }
    }
}

/// 制御文字をエスケープし、1エントリが必ず1行になるようにする
fn one_line(value: &str) -> Cow<'_, str> {
    if !value.chars().any(char::is_control) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(
        value
            .chars()
            .map(|c| {
                if c.is_control() {
                    c.escape_default().to_string()
                } else {
                    c.to_string()
                }
            })
            .collect(),
    )
}
