//! TOTP（時間ベースワンタイムパスワード）検証
//!
//! RFC 6238 (HMAC-SHA1, 30秒ステップ, 6桁) に従い、共有シークレットと現在時刻から
//! 期待コードを導出し、送信されたコードと比較する。
//! クロックスキュー吸収のため前後 `skew` ステップ分のコードも受け付ける。

use data_encoding::{Encoding, BASE32_NOPAD};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha1 = Hmac<Sha1>;

/// 末尾ビットの検証を行わないBase32（RFC 4648）デコーダ
///
/// 認証アプリが生成するシークレットは長さが8の倍数でないことがあるため、
/// パディングなし・末尾ビット非検証で扱う。
static SECRET_ENCODING: LazyLock<Encoding> = LazyLock::new(|| {
    let mut spec = BASE32_NOPAD.specification();
    spec.check_trailing_bits = false;
    spec.encoding().unwrap_or_else(|_| BASE32_NOPAD.clone())
});

/// 検証器の設定失敗（コード不一致とは別種のエラー）
///
/// いずれのバリアントもサーバー側の設定ミスを表し、
/// 呼び出し側は 500 として扱う。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TotpError {
    /// シークレットが未設定（空文字列）
    #[error("TOTP secret is not configured")]
    SecretMissing,

    /// シークレットがBase32としてデコードできない
    #[error("TOTP secret is not valid base32")]
    MalformedSecret,
}

/// TOTPパラメーター
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotpParams {
    /// タイムステップ（秒）
    pub step_secs: u64,
    /// コード桁数
    pub digits: u32,
    /// 前後に許容するステップ数
    pub skew: u64,
}

impl Default for TotpParams {
    fn default() -> Self {
        Self {
            step_secs: 30,
            digits: 6,
            skew: 1,
        }
    }
}

/// 共有シークレットから導出したTOTP検証器
///
/// 内部状態は不変で、`Clone` は鍵バイト列の参照カウントを増やすだけ。
/// 複数リクエストから同時に呼び出してよい。
#[derive(Clone)]
pub struct TotpVerifier {
    key: Option<Arc<Zeroizing<Vec<u8>>>>,
    params: TotpParams,
}

impl fmt::Debug for TotpVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TotpVerifier")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("params", &self.params)
            .finish()
    }
}

impl TotpVerifier {
    /// Base32シークレットから検証器を作成
    ///
    /// 空白は除去され、大文字小文字および末尾の `=` パディングは無視される。
    pub fn from_base32(secret: &str) -> Result<Self, TotpError> {
        Self::with_params(secret, TotpParams::default())
    }

    /// パラメーターを指定して検証器を作成
    pub fn with_params(secret: &str, params: TotpParams) -> Result<Self, TotpError> {
        let key = decode_secret(secret)?;
        Ok(Self {
            key: Some(Arc::new(key)),
            params,
        })
    }

    /// シークレット未設定の検証器
    ///
    /// すべての検証が [`TotpError::SecretMissing`] になる。
    pub fn unconfigured() -> Self {
        Self {
            key: None,
            params: TotpParams::default(),
        }
    }

    /// 現在時刻でコードを検証する
    pub fn verify(&self, code: &str) -> Result<bool, TotpError> {
        self.verify_at(code, unix_now())
    }

    /// 指定したUNIX時刻でコードを検証する
    ///
    /// `Ok(false)` はコード不一致、`Err` は設定エラー。
    pub fn verify_at(&self, code: &str, unix_secs: u64) -> Result<bool, TotpError> {
        let key = self.key.as_ref().ok_or(TotpError::SecretMissing)?;
        let code = code.trim();
        if code.len() != self.params.digits as usize {
            return Ok(false);
        }

        let counter = unix_secs / self.params.step_secs;
        let first = counter.saturating_sub(self.params.skew);
        let last = counter.saturating_add(self.params.skew);

        // 一致したステップで打ち切らず、窓内の全ステップを比較する
        let mut matched = false;
        for step in first..=last {
            let expected = hotp(key, step, self.params.digits);
            matched |= bool::from(expected.as_bytes().ct_eq(code.as_bytes()));
        }
        Ok(matched)
    }

    /// 指定したUNIX時刻のコードを生成する
    pub fn generate_at(&self, unix_secs: u64) -> Result<String, TotpError> {
        let key = self.key.as_ref().ok_or(TotpError::SecretMissing)?;
        Ok(hotp(key, unix_secs / self.params.step_secs, self.params.digits))
    }
}

/// シークレットとコードを検証する
///
/// 呼び出しごとにシークレットをデコードする純粋関数。
/// 長時間動作するサーバーでは [`TotpVerifier`] を一度だけ構築して使う。
pub fn validate(secret: &str, code: &str) -> Result<bool, TotpError> {
    TotpVerifier::from_base32(secret)?.verify(code)
}

fn decode_secret(secret: &str) -> Result<Zeroizing<Vec<u8>>, TotpError> {
    let normalized: Zeroizing<String> = Zeroizing::new(
        secret
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect(),
    );
    let trimmed = normalized.trim_end_matches('=');
    if trimmed.is_empty() {
        return Err(TotpError::SecretMissing);
    }

    let key = SECRET_ENCODING
        .decode(trimmed.as_bytes())
        .map_err(|_| TotpError::MalformedSecret)?;
    if key.is_empty() {
        return Err(TotpError::MalformedSecret);
    }
    Ok(Zeroizing::new(key))
}

/// RFC 4226 HOTP
fn hotp(key: &[u8], counter: u64, digits: u32) -> String {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset]) & 0x7f) << 24
        | u32::from(digest[offset + 1]) << 16
        | u32::from(digest[offset + 2]) << 8
        | u32::from(digest[offset + 3]);

    let modulus = 10u32.pow(digits);
    format!("{:0width$}", binary % modulus, width = digits as usize)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
