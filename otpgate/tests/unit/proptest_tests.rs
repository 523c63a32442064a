//! Property-based tests using proptest

use axum::http::HeaderMap;
use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use otpgate::activity::{ActivityEntry, AuthScope};
use otpgate::common::ip::{normalize_ip, resolve_client_addr};
use otpgate::totp::{TotpParams, TotpVerifier};

const SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

fn verifier() -> TotpVerifier {
    TotpVerifier::from_base32(SECRET).unwrap()
}

// ---------------------------------------------------------------------------
// TotpVerifier window
// ---------------------------------------------------------------------------

proptest! {
    /// 生成したコードは同じ時刻で必ず通る
    #[test]
    fn generated_code_verifies_at_same_time(t in 60u64..4_000_000_000) {
        let v = verifier();
        let code = v.generate_at(t).unwrap();
        prop_assert_eq!(code.len(), 6);
        prop_assert!(v.verify_at(&code, t).unwrap());
    }

    /// 隣接ステップ（±1）のコードも通る
    #[test]
    fn adjacent_step_codes_verify(t in 60u64..4_000_000_000, forward in any::<bool>()) {
        let v = verifier();
        let other = if forward { t + 30 } else { t - 30 };
        let code = v.generate_at(other).unwrap();
        prop_assert!(v.verify_at(&code, t).unwrap());
    }

    /// 窓の外のコードは通らない（窓内のコードと偶然一致するケースは除く）
    #[test]
    fn codes_outside_window_are_rejected(t in 300u64..4_000_000_000, steps in 2u64..10) {
        let v = verifier();
        let code = v.generate_at(t - steps * 30).unwrap();
        let collides = (t / 30 - 1..=t / 30 + 1)
            .any(|c| v.generate_at(c * 30).unwrap() == code);
        prop_assume!(!collides);
        prop_assert!(!v.verify_at(&code, t).unwrap());
    }

    /// skew = 0 なら現在のステップのみ
    #[test]
    fn zero_skew_accepts_only_current_step(t in 60u64..4_000_000_000) {
        let strict = TotpVerifier::with_params(
            SECRET,
            TotpParams { skew: 0, ..TotpParams::default() },
        )
        .unwrap();
        let current = strict.generate_at(t).unwrap();
        let previous = strict.generate_at(t - 30).unwrap();
        prop_assert!(strict.verify_at(&current, t).unwrap());
        prop_assert_eq!(strict.verify_at(&previous, t).unwrap(), previous == current);
    }

    /// 6桁でない入力は常に不一致（設定エラーではない）
    #[test]
    fn malformed_codes_are_plain_mismatches(code in "[0-9]{0,5}|[0-9]{7,10}|[a-z]{6}", t in 0u64..4_000_000_000) {
        prop_assert_eq!(verifier().verify_at(&code, t), Ok(false));
    }
}

// ---------------------------------------------------------------------------
// Client address resolution
// ---------------------------------------------------------------------------

proptest! {
    /// IPv4-mapped IPv6は元のIPv4に戻る
    #[test]
    fn mapped_ipv4_normalizes(a in any::<u8>(), b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
        let v4 = Ipv4Addr::new(a, b, c, d);
        let mapped = IpAddr::V6(v4.to_ipv6_mapped());
        prop_assert_eq!(normalize_ip(mapped), IpAddr::V4(v4));
    }

    /// ヘッダーがなければピアアドレス（ポートなし）
    #[test]
    fn peer_address_used_without_headers(a in any::<u8>(), d in any::<u8>(), port in 1u16..=u16::MAX) {
        let ip = Ipv4Addr::new(a, 0, 0, d);
        let peer = SocketAddr::new(IpAddr::V4(ip), port);
        prop_assert_eq!(resolve_client_addr(&HeaderMap::new(), Some(peer)), ip.to_string());
    }

    /// X-Forwarded-For の先頭が優先される
    #[test]
    fn forwarded_for_first_entry_wins(segments in proptest::array::uniform8(any::<u16>())) {
        let ip = Ipv6Addr::from(segments);
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            format!("{ip}, 10.0.0.1").parse().unwrap(),
        );
        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();
        prop_assert_eq!(
            resolve_client_addr(&headers, Some(peer)),
            normalize_ip(IpAddr::V6(ip)).to_string()
        );
    }
}

// ---------------------------------------------------------------------------
// Activity entries
// ---------------------------------------------------------------------------

proptest! {
    /// どんなURL・アドレスでもエントリは1行に収まる
    #[test]
    fn entries_render_on_one_line(url in any::<String>(), client in any::<String>()) {
        let entries = [
            ActivityEntry::ProxyStart { url: url.clone(), client: client.clone() },
            ActivityEntry::AuthFail { scope: AuthScope::Download { url: url.clone() }, client: client.clone() },
            ActivityEntry::StreamInterrupted { url, bytes: 1, reason: client },
        ];
        for entry in entries {
            let rendered = entry.to_string();
            prop_assert!(!rendered.contains('\n'));
            prop_assert!(!rendered.contains('\r'));
        }
    }
}
