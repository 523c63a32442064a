//! 送信元IPアドレスの解決
//!
//! プロキシヘッダー（`X-Forwarded-For` / `Forwarded`）を優先し、
//! なければトランスポート層のピアアドレスを使う。
//!
//! `X-Forwarded-For` は先頭の要素ではなく、先頭から見て最初にIPとして
//! 解釈できる要素を使う。`unknown` や `_hidden` のような難読化識別子は
//! 読み飛ばす。

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// ピアアドレスもヘッダーもない場合の表記
pub const UNKNOWN_CLIENT: &str = "unknown";

/// IPアドレスを正規化する
///
/// IPv4-mapped IPv6（::ffff:x.x.x.x）をIPv4に変換。
/// それ以外はそのまま返す。
pub fn normalize_ip(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                IpAddr::V4(v4)
            } else {
                IpAddr::V6(v6)
            }
        }
        v4 => v4,
    }
}

/// SocketAddrからIPアドレスを抽出し正規化する（ポートは捨てる）
pub fn normalize_socket_ip(addr: &SocketAddr) -> IpAddr {
    normalize_ip(addr.ip())
}

/// ログに記録する送信元アドレスを決定する
pub fn resolve_client_addr(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    extract_client_ip_from_headers(headers)
        .or_else(|| peer.as_ref().map(normalize_socket_ip))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// プロキシヘッダーから送信元IPを取り出す
pub fn extract_client_ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    extract_x_forwarded_for(headers).or_else(|| extract_forwarded_for(headers))
}

fn extract_x_forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get("x-forwarded-for")?.to_str().ok()?;
    value
        .split(',')
        .map(str::trim)
        .find_map(parse_forwarded_ip_candidate)
}

fn extract_forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get("forwarded")?.to_str().ok()?;
    value.split(',').find_map(|entry| {
        entry
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .find_map(|(key, value)| {
                if key.trim().eq_ignore_ascii_case("for") {
                    parse_forwarded_ip_candidate(value.trim())
                } else {
                    None
                }
            })
    })
}

/// `203.0.113.1` / `203.0.113.1:8080` / `"[2001:db8::1]:443"` 形式を解釈する
fn parse_forwarded_ip_candidate(value: &str) -> Option<IpAddr> {
    let trimmed = value.trim().trim_matches('"');
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown") || trimmed.starts_with('_') {
        return None;
    }

    let host = if let Some(stripped) = trimmed.strip_prefix('[') {
        stripped.split(']').next().unwrap_or_default().trim()
    } else {
        trimmed
    };

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(normalize_ip(ip));
    }

    host.parse::<SocketAddr>()
        .ok()
        .map(|addr| normalize_socket_ip(&addr))
}
