//! `server` binary: the Director entry point. Starts one listener
//! serving NLHE tables, one table per `game_id` seen on `Auth`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use engine::TableConfig;
use poker_ws::director::{Director, DirectorConfig};
use poker_ws::http;
use tracing_subscriber::EnvFilter;

/// `server --addr :8080 --small-blind 5 --big-blind 10 --start-chips 1000
/// --timeout-ms 100 --min-players 2 --max-players 9 [--seed N]
/// [--enable-stats] [--hand-limit N]`.
#[derive(Parser, Debug)]
#[command(name = "server", about = "NLHE bot-server")]
struct Args {
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: String,
    #[arg(long, default_value_t = 5)]
    small_blind: u64,
    #[arg(long, default_value_t = 10)]
    big_blind: u64,
    #[arg(long, default_value_t = 1000)]
    start_chips: u64,
    #[arg(long, default_value_t = 100)]
    timeout_ms: u64,
    #[arg(long, default_value_t = 2)]
    min_players: usize,
    #[arg(long, default_value_t = 9)]
    max_players: usize,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = false)]
    enable_stats: bool,
    #[arg(long)]
    hand_limit: Option<u64>,
    /// Optional append-only hand-history file.
    #[arg(long)]
    hand_history_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let addr: SocketAddr = match args.addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            eprintln!("invalid --addr {:?}: {err}", args.addr);
            std::process::exit(2);
        }
    };

    let config = DirectorConfig {
        table: TableConfig {
            max_seats: args.max_players,
            small_blind: args.small_blind,
            big_blind: args.big_blind,
            ante: 0,
            start_chips: args.start_chips,
            min_players: args.min_players,
            infinite_bankroll: false,
        },
        seed: args.seed.unwrap_or_else(|| std::process::id() as u64),
        decision_timeout: Duration::from_millis(args.timeout_ms),
        hand_limit: args.hand_limit,
        enable_stats: args.enable_stats,
        hand_history_path: args.hand_history_file,
    };
    let director = Arc::new(Director::new(config));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, %addr, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "server listening");

    let app = http::router(director.clone());
    let shutdown_director = director.clone();
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown_director.shutdown();
    });

    if let Err(err) = serve.await {
        tracing::error!(%err, "server exited with error");
        std::process::exit(1);
    }
}
