use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use otpgate::activity::ActivityLog;
use otpgate::totp::TotpVerifier;
use otpgate::AppState;
use tempfile::TempDir;

/// テスト用の共有シークレット（RFC 6238 のSHA1テストキー）
pub const TEST_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

/// 一時ディレクトリにログを置いたアプリケーション状態
#[allow(dead_code)]
pub struct RelayFixture {
    pub state: AppState,
    pub dir: TempDir,
}

#[allow(dead_code)]
impl RelayFixture {
    /// ログファイルのパス
    pub fn log_path(&self) -> PathBuf {
        self.state.activity.path().to_path_buf()
    }

    /// スナップショットの作成先
    pub fn snapshot_dir(&self) -> PathBuf {
        self.state.activity.snapshot_dir().to_path_buf()
    }

    /// ログの全行
    pub fn log_lines(&self) -> Vec<String> {
        read_lines(&self.log_path())
    }
}

/// 既知のシークレットで検証する状態を作る
#[allow(dead_code)]
pub fn fixture() -> RelayFixture {
    fixture_with_verifier(TotpVerifier::from_base32(TEST_SECRET).unwrap())
}

/// 検証器を指定して状態を作る
pub fn fixture_with_verifier(verifier: TotpVerifier) -> RelayFixture {
    let dir = tempfile::tempdir().unwrap();
    let activity = ActivityLog::open_with_snapshot_dir(
        dir.path().join("proxy.log"),
        dir.path().join("snapshots"),
    )
    .unwrap();
    // 環境のプロキシ設定に左右されないようにする
    let http_client = reqwest::Client::builder()
        .no_proxy()
        .connect_timeout(Duration::from_secs(2))
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap();

    RelayFixture {
        state: AppState {
            activity,
            verifier,
            http_client,
            body_limit: 64 * 1024,
        },
        dir,
    }
}

/// テストからリクエストを送るクライアント
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// 現在時刻で有効なコード
#[allow(dead_code)]
pub fn current_code() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    TotpVerifier::from_base32(TEST_SECRET)
        .unwrap()
        .generate_at(now)
        .unwrap()
}

/// 現在時刻から十分離れた時刻のコード（許容窓の外）
#[allow(dead_code)]
pub fn stale_code() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let verifier = TotpVerifier::from_base32(TEST_SECRET).unwrap();
    let stale = verifier.generate_at(now - 3600).unwrap();
    // 偶然窓内のコードと一致した場合は確実に一致しないコードに差し替える
    if verifier.verify(&stale).unwrap() {
        "abcdef".to_string()
    } else {
        stale
    }
}

/// ファイルの全行
pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| l.to_string())
        .collect()
}

/// 条件を満たす行が現れるまで待つ
#[allow(dead_code)]
pub async fn wait_for_line(path: &Path, needle: &str) -> String {
    for _ in 0..100 {
        if let Some(line) = read_lines(path).into_iter().find(|l| l.contains(needle)) {
            return line;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("no line containing {needle:?} in {}", path.display());
}
