//! アクティビティログ
//!
//! 1つのログファイルに対する追記・スナップショットを、プロセス全体で共有する
//! 単一のロックで直列化する。追記した行はコンソール（tracing）にもミラーする。
//!
//! # 不変条件
//!
//! - 追記もスナップショットも同じロックを操作全体で保持する
//! - 1エントリは1回の `write_all` で書き込まれる
//! - スナップショットはロック取得前に完了した追記をすべて含み、書きかけの行を含まない

mod entry;

pub use entry::{ActivityEntry, AuthScope};

use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempPath;
use tracing::warn;

/// ログ行のタイムスタンプ形式
const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// アクティビティログ操作のエラー
#[derive(Debug, thiserror::Error)]
pub enum ActivityLogError {
    /// ログファイルを開けない
    #[error("Failed to open activity log {path}: {source}")]
    Open {
        /// ログファイルパス
        path: PathBuf,
        /// 原因
        #[source]
        source: io::Error,
    },

    /// 追記に失敗
    #[error("Failed to append to activity log: {0}")]
    Write(#[source] io::Error),

    /// スナップショット元のログファイルが存在しない・読めない
    #[error("Activity log is unavailable: {0}")]
    SourceUnavailable(#[source] io::Error),

    /// スナップショット用一時ファイルを作成できない
    #[error("Failed to create snapshot file: {0}")]
    Disk(#[source] io::Error),

    /// スナップショットのコピーに失敗
    #[error("Failed to copy activity log: {0}")]
    Copy(#[source] io::Error),

    /// ブロッキングタスクの失敗
    #[error("Activity log task failed: {0}")]
    Join(String),
}

/// ログファイルの一時コピー
///
/// Drop時に一時ファイルを削除する。
#[derive(Debug)]
pub struct LogSnapshot {
    path: TempPath,
    len: u64,
}

impl LogSnapshot {
    /// 一時ファイルのパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// コピーしたバイト数
    pub fn byte_len(&self) -> u64 {
        self.len
    }

    /// 削除ガードを取り出す
    pub fn into_temp_path(self) -> TempPath {
        self.path
    }
}

/// プロセス全体で共有するアクティビティログのハンドル
///
/// `Clone` は同じファイル・同じロックを共有する。
#[derive(Clone)]
pub struct ActivityLog {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    snapshot_dir: PathBuf,
    file: Mutex<File>,
}

impl std::fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLog")
            .field("path", &self.inner.path)
            .field("snapshot_dir", &self.inner.snapshot_dir)
            .finish()
    }
}

impl ActivityLog {
    /// ログファイルを追記モードで開く（存在しなければ作成）
    ///
    /// スナップショットはログファイルと同じディレクトリに作成する。
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ActivityLogError> {
        let path = path.into();
        let snapshot_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::open_with_snapshot_dir(path, snapshot_dir)
    }

    /// スナップショット用ディレクトリを指定して開く
    pub fn open_with_snapshot_dir(
        path: impl Into<PathBuf>,
        snapshot_dir: impl Into<PathBuf>,
    ) -> Result<Self, ActivityLogError> {
        let path = path.into();
        let snapshot_dir = snapshot_dir.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ActivityLogError::Open {
                path: path.clone(),
                source,
            })?;
        }
        std::fs::create_dir_all(&snapshot_dir).map_err(|source| ActivityLogError::Open {
            path: snapshot_dir.clone(),
            source,
        })?;

        let file = open_append(&path)?;
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                snapshot_dir,
                file: Mutex::new(file),
            }),
        })
    }

    /// ログファイルのパス
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// スナップショットの作成先ディレクトリ
    pub fn snapshot_dir(&self) -> &Path {
        &self.inner.snapshot_dir
    }

    /// エントリを追記する
    pub async fn append(&self, entry: ActivityEntry) -> Result<(), ActivityLogError> {
        let log = self.clone();
        tokio::task::spawn_blocking(move || log.append_blocking(&entry))
            .await
            .map_err(|e| ActivityLogError::Join(e.to_string()))?
    }

    /// エントリを追記し、失敗は診断ログに残すだけにする
    ///
    /// リクエスト処理はログ書き込みの失敗で中断しない。
    pub async fn record(&self, entry: ActivityEntry) {
        if let Err(e) = self.append(entry).await {
            warn!("{}", e);
        }
    }

    /// エントリを追記する（同期版）
    pub fn append_blocking(&self, entry: &ActivityEntry) -> Result<(), ActivityLogError> {
        let line = format!("{} {}\n", Local::now().format(TIMESTAMP_FORMAT), entry);

        let mut file = self
            .inner
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // 稼働中に削除されたログファイルは作り直す
        if !self.inner.path.exists() {
            *file = open_append(&self.inner.path)?;
        }

        file.write_all(line.as_bytes())
            .map_err(ActivityLogError::Write)?;

        tracing::info!(target: "otpgate::activity", "{}", line.trim_end());
        Ok(())
    }

    /// ログファイルのスナップショットを作成する
    pub async fn snapshot(&self) -> Result<LogSnapshot, ActivityLogError> {
        let log = self.clone();
        tokio::task::spawn_blocking(move || log.snapshot_blocking())
            .await
            .map_err(|e| ActivityLogError::Join(e.to_string()))?
    }

    /// ログファイルのスナップショットを作成する（同期版）
    pub fn snapshot_blocking(&self) -> Result<LogSnapshot, ActivityLogError> {
        let _guard = self
            .inner
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut source =
            File::open(&self.inner.path).map_err(ActivityLogError::SourceUnavailable)?;

        let mut temp = tempfile::Builder::new()
            .prefix("logs_snapshot_")
            .suffix(".tmp")
            .tempfile_in(&self.inner.snapshot_dir)
            .map_err(ActivityLogError::Disk)?;

        let len = io::copy(&mut source, temp.as_file_mut()).map_err(ActivityLogError::Copy)?;
        temp.as_file_mut().flush().map_err(ActivityLogError::Copy)?;

        Ok(LogSnapshot {
            path: temp.into_temp_path(),
            len,
        })
    }
}

fn open_append(path: &Path) -> Result<File, ActivityLogError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ActivityLogError::Open {
            path: path.to_path_buf(),
            source,
        })
}
