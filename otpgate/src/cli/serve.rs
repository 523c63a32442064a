//! serve サブコマンド
//!
//! 中継サーバーを起動します。指定しなかった値は環境変数から読みます。

use crate::config::RelayConfig;
use clap::Args;
use std::path::PathBuf;

/// serve サブコマンドの引数
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bind address
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Activity log file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl ServeArgs {
    /// 引数で指定された値で設定を上書きする
    pub fn apply(self, mut config: RelayConfig) -> RelayConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(log_file) = self.log_file {
            config.log_file = log_file;
        }
        config
    }
}
