//! otpgate Server Entry Point

use clap::Parser;
use otpgate::activity::{ActivityEntry, ActivityLog};
use otpgate::cli::{Cli, Commands};
use otpgate::config::RelayConfig;
use otpgate::{logging, server, AppState};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Genkey(args)) => {
            if let Err(e) = otpgate::cli::genkey::execute(&args) {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve(args)) => {
            let _guard = logging::init().expect("failed to initialize logging");
            let config = args.apply(RelayConfig::from_env());
            run_server(config).await;
        }
        None => {
            // No subcommand - default to serve
            let _guard = logging::init().expect("failed to initialize logging");
            run_server(RelayConfig::from_env()).await;
        }
    }
}

async fn run_server(config: RelayConfig) {
    info!("otpgate v{}", env!("CARGO_PKG_VERSION"));
    info!(?config, "Loaded configuration");

    let activity = match &config.snapshot_dir {
        Some(dir) => ActivityLog::open_with_snapshot_dir(&config.log_file, dir),
        None => ActivityLog::open(&config.log_file),
    };
    let activity = match activity {
        Ok(activity) => activity,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let verifier = match config.verifier() {
        Ok(verifier) => verifier,
        Err(e) => {
            activity
                .record(ActivityEntry::SecretUnavailable { error: e })
                .await;
            std::process::exit(1);
        }
    };

    // HTTPクライアント（接続プーリング有効）を作成
    let http_client = match config.upstream.build_client() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build upstream HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let state = AppState {
        activity,
        verifier,
        http_client,
        body_limit: config.body_limit,
    };

    if let Err(e) = server::run(state, &config.bind_addr()).await {
        error!("Server error on {}: {}", config.bind_addr(), e);
        std::process::exit(1);
    }
}
