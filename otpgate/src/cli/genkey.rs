//! genkey サブコマンド
//!
//! 新しい共有シークレットを発行し、認証アプリ登録用のQRコードを表示する。

use anyhow::{anyhow, Context};
use clap::Args;
use data_encoding::BASE32_NOPAD;
use qrcode::render::{svg, unicode};
use qrcode::QrCode;
use std::path::PathBuf;

/// 160ビット（Base32で32文字、パディングなし）
const SECRET_BYTES: usize = 20;

/// genkey サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct GenkeyArgs {
    /// Issuer shown in the authenticator app
    #[arg(long, default_value = "Server")]
    pub issuer: String,

    /// Account name shown in the authenticator app
    #[arg(long, default_value = "John Doe")]
    pub account: String,

    /// Also write the QR code as an SVG file
    #[arg(long)]
    pub svg: Option<PathBuf>,
}

/// ランダムなBase32シークレットを生成する
pub fn generate_secret() -> String {
    use rand::RngExt;
    let key: [u8; SECRET_BYTES] = rand::rng().random();
    BASE32_NOPAD.encode(&key)
}

/// 認証アプリ登録用の `otpauth://` URI
pub fn provisioning_uri(secret: &str, issuer: &str, account: &str) -> anyhow::Result<String> {
    let mut url = reqwest::Url::parse("otpauth://totp/")?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("otpauth URI cannot carry a label"))?
        .pop_if_empty()
        .push(&format!("{issuer}:{account}"));
    url.query_pairs_mut()
        .append_pair("secret", secret)
        .append_pair("issuer", issuer)
        .append_pair("algorithm", "SHA1")
        .append_pair("digits", "6")
        .append_pair("period", "30");
    Ok(url.to_string())
}

/// Execute the genkey command
pub fn execute(args: &GenkeyArgs) -> anyhow::Result<()> {
    let secret = generate_secret();
    let uri = provisioning_uri(&secret, &args.issuer, &args.account)?;

    let code = QrCode::new(uri.as_bytes())
        .map_err(|e| anyhow!("Failed to generate QR code: {e:?}"))?;

    let terminal = code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();
    println!("{terminal}");

    println!("TOTP key: {secret}");
    println!("otpauth URI: {uri}");

    if let Some(path) = &args.svg {
        let image = code
            .render::<svg::Color>()
            .min_dimensions(200, 200)
            .build();
        std::fs::write(path, image)
            .with_context(|| format!("Failed to write QR code to {}", path.display()))?;
        let path = std::path::absolute(path).unwrap_or_else(|_| path.clone());
        println!("QR code path: {}", path.display());
    }

    println!();
    println!("Set OTPGATE_TOTP_SECRET to the key above before starting the server.");
    Ok(())
}
