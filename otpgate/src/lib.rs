//! OTP-gated HTTP relay
//!
//! ワンタイムパスワード（TOTP）で保護された中継サーバー。
//! `POST /` で指定URLのリソースを取得してストリーミングで返し、
//! `POST /logs` でアクティビティログのスナップショットを返す。

#![warn(missing_docs)]

/// 共通型定義（エラー、クライアントアドレス）
pub mod common;

/// REST APIハンドラー
pub mod api;

/// アクティビティログ（追記・スナップショット）
pub mod activity;

/// TOTP検証
pub mod totp;

/// ロギング初期化ユーティリティ
pub mod logging;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// CLIインターフェース
pub mod cli;

/// axumサーバー起動・シャットダウンハンドリング
pub mod server;

use activity::ActivityLog;
use totp::TotpVerifier;

/// アプリケーション状態
///
/// ハンドラー間で共有する。`Clone` は内部の共有ハンドルを複製するだけ。
#[derive(Clone)]
pub struct AppState {
    /// アクティビティログ
    pub activity: ActivityLog,
    /// OTP検証器
    pub verifier: TotpVerifier,
    /// 上流取得用HTTPクライアント（接続プーリング有効）
    pub http_client: reqwest::Client,
    /// リクエストボディの上限バイト数
    pub body_limit: usize,
}
