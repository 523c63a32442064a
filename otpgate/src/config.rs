//! Configuration management via environment variables
//!
//! Provides helper functions for reading environment variables with fallback
//! to legacy variable names with warning logs, and the server configuration
//! assembled from them.

use crate::totp::{TotpError, TotpParams, TotpVerifier};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use zeroize::Zeroizing;

/// Get an environment variable with fallback to a legacy name
///
/// If the new variable name is set, returns its value.
/// If only the old (legacy) variable name is set, returns its value
/// and logs a deprecation warning.
///
/// # Example
/// ```
/// use otpgate::config::get_env_with_fallback;
///
/// let port = get_env_with_fallback("OTPGATE_PORT", "PORT");
/// ```
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        tracing::warn!(
            "Environment variable '{}' is deprecated, use '{}' instead",
            old_name,
            new_name
        );
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback, parsing to a specific type
///
/// Falls back to `default` when neither is set or parsing fails.
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(
    new_name: &str,
    old_name: &str,
    default: T,
) -> T {
    get_env_with_fallback(new_name, old_name)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// 旧名のない環境変数を型変換して取得する（未設定・不正値は `default`）
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// 上流取得のタイムアウト設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// 接続確立までのタイムアウト
    pub connect_timeout: Duration,
    /// 接続からボディ転送完了までのタイムアウト（`None` は無制限）
    pub timeout: Option<Duration>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Some(Duration::from_secs(600)),
        }
    }
}

impl UpstreamConfig {
    /// Load upstream timeouts from environment variables.
    ///
    /// `OTPGATE_UPSTREAM_TIMEOUT_SECS=0` disables the total timeout.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let connect_secs = env_parse(
            "OTPGATE_UPSTREAM_CONNECT_TIMEOUT_SECS",
            defaults.connect_timeout.as_secs(),
        );
        let total_secs = env_parse(
            "OTPGATE_UPSTREAM_TIMEOUT_SECS",
            defaults.timeout.map(|d| d.as_secs()).unwrap_or(0),
        );

        Self {
            connect_timeout: Duration::from_secs(connect_secs),
            timeout: (total_secs > 0).then(|| Duration::from_secs(total_secs)),
        }
    }

    /// 上流取得用のHTTPクライアントを構築する
    pub fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().connect_timeout(self.connect_timeout);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }
}

/// サーバー設定
#[derive(Clone)]
pub struct RelayConfig {
    /// バインドアドレス
    pub host: String,
    /// リッスンポート
    pub port: u16,
    /// アクティビティログファイル
    pub log_file: PathBuf,
    /// スナップショット作成先（`None` はログファイルと同じディレクトリ）
    pub snapshot_dir: Option<PathBuf>,
    /// 共有シークレット（Base32）
    pub totp_secret: Option<Zeroizing<String>>,
    /// 前後に許容するTOTPステップ数
    pub totp_skew: u64,
    /// 上流取得のタイムアウト
    pub upstream: UpstreamConfig,
    /// リクエストボディの上限バイト数
    pub body_limit: usize,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_file", &self.log_file)
            .field("snapshot_dir", &self.snapshot_dir)
            .field(
                "totp_secret",
                &self.totp_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("totp_skew", &self.totp_skew)
            .field("upstream", &self.upstream)
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7000,
            log_file: PathBuf::from("proxy.log"),
            snapshot_dir: None,
            totp_secret: None,
            totp_skew: TotpParams::default().skew,
            upstream: UpstreamConfig::default(),
            body_limit: 64 * 1024,
        }
    }
}

impl RelayConfig {
    /// Load server configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("OTPGATE_HOST").unwrap_or(defaults.host);
        let port = get_env_with_fallback_parse("OTPGATE_PORT", "PORT", defaults.port);
        let log_file = get_env_with_fallback("OTPGATE_LOG_FILE", "LOG_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.log_file);
        let snapshot_dir = std::env::var("OTPGATE_SNAPSHOT_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let totp_secret = get_env_with_fallback("OTPGATE_TOTP_SECRET", "TOTP_SECRET")
            .map(Zeroizing::new)
            .filter(|v| !v.trim().is_empty());
        let totp_skew = env_parse("OTPGATE_TOTP_SKEW", defaults.totp_skew);
        let body_limit = env_parse("OTPGATE_BODY_LIMIT_BYTES", defaults.body_limit);

        Self {
            host,
            port,
            log_file,
            snapshot_dir,
            totp_secret,
            totp_skew,
            upstream: UpstreamConfig::from_env(),
            body_limit,
        }
    }

    /// `host:port` 形式のバインドアドレス
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 設定済みシークレットから検証器を構築する
    pub fn verifier(&self) -> Result<TotpVerifier, TotpError> {
        let secret = self.totp_secret.as_ref().ok_or(TotpError::SecretMissing)?;
        let params = TotpParams {
            skew: self.totp_skew,
            ..TotpParams::default()
        };
        TotpVerifier::with_params(secret.as_str(), params)
    }
}
