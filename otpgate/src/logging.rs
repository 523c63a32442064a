//! ロギング初期化ユーティリティ
//!
//! 診断ログ（tracing）をコンソールへ出力する。`OTPGATE_DIAG_LOG_DIR` が設定されていれば
//! 日次ローテーションのファイルにも書き出す。アクティビティログの行も
//! `otpgate::activity` ターゲットとしてここに流れる。

use crate::config::get_env_with_fallback;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 診断ログファイルのプレフィックス
const DIAG_FILE_PREFIX: &str = "otpgate.diag";

/// ログレベル文字列からフィルタを作る（不正な値は `info`）
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 診断ログの出力先ディレクトリ
pub fn diag_log_dir() -> Option<PathBuf> {
    std::env::var("OTPGATE_DIAG_LOG_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// tracingサブスクライバーを初期化する
///
/// 返されたガードはプロセス終了まで保持すること（ドロップするとファイル出力が止まる）。
pub fn init() -> anyhow::Result<Option<WorkerGuard>> {
    let level = get_env_with_fallback("OTPGATE_LOG_LEVEL", "RUST_LOG")
        .unwrap_or_else(|| "info".to_string());

    let (file_layer, guard) = match diag_log_dir() {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::daily(&dir, DIAG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_filter(&level))
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
