//! `spawn` binary: starts an embedded server on an ephemeral port,
//! launches bot subprocesses against it, and waits for `--hand-limit`
//! hands to complete.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use engine::TableConfig;
use poker_ws::director::{Director, DirectorConfig};
use poker_ws::http;
use poker_ws::spawner::{BotSpec, Spawner};
use tracing_subscriber::EnvFilter;

/// `spawn --spec "name:count,name:count,..." [--bot-cmd "name=cmd
/// args..."]... [--count N] --hand-limit N [--seed N]`. Any name in
/// `--spec` without a matching `--bot-cmd` launches the reference bot
/// via `cargo run -p reference-bot`.
#[derive(Parser, Debug)]
#[command(name = "spawn", about = "launch a server and a fleet of bots against it")]
struct Args {
    #[arg(long)]
    spec: String,
    #[arg(long = "bot-cmd")]
    bot_cmd: Vec<String>,
    #[arg(long)]
    count: Option<u32>,
    #[arg(long)]
    hand_limit: u64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, default_value_t = 5)]
    small_blind: u64,
    #[arg(long, default_value_t = 10)]
    big_blind: u64,
    #[arg(long, default_value_t = 1000)]
    start_chips: u64,
    #[arg(long, default_value_t = 100)]
    timeout_ms: u64,
}

fn parse_spec(spec: &str, default_count: Option<u32>) -> Vec<(String, u32)> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((name, count)) => (name.to_string(), count.trim().parse().unwrap_or(1)),
            None => (entry.to_string(), default_count.unwrap_or(1)),
        })
        .collect()
}

fn parse_bot_cmds(raw: &[String]) -> HashMap<String, (String, Vec<String>)> {
    raw.iter()
        .filter_map(|entry| entry.split_once('='))
        .map(|(name, cmd)| {
            let mut tokens = cmd.split_whitespace();
            let program = tokens.next().unwrap_or("true").to_string();
            let args = tokens.map(str::to_string).collect();
            (name.to_string(), (program, args))
        })
        .collect()
}

fn default_bot_command() -> (String, Vec<String>) {
    ("cargo".to_string(), vec!["run".into(), "--quiet".into(), "-p".into(), "reference-bot".into(), "--".into()])
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let bot_groups = parse_spec(&args.spec, args.count);
    let bot_cmds = parse_bot_cmds(&args.bot_cmd);

    let config = DirectorConfig {
        table: TableConfig {
            max_seats: 9,
            small_blind: args.small_blind,
            big_blind: args.big_blind,
            ante: 0,
            start_chips: args.start_chips,
            min_players: 2,
            infinite_bankroll: true,
        },
        seed: args.seed,
        decision_timeout: Duration::from_millis(args.timeout_ms),
        hand_limit: Some(args.hand_limit),
        enable_stats: true,
        hand_history_path: None,
    };
    let director = Arc::new(Director::new(config));
    let app = http::router(director.clone());

    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, "failed to bind embedded server");
            std::process::exit(1);
        }
    };
    let addr: SocketAddr = listener.local_addr().expect("bound listener has a local address");
    tracing::info!(%addr, "embedded server listening");

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(%err, "embedded server exited with error");
        }
    });

    let server_url = format!("ws://{addr}/ws");
    let specs: Vec<BotSpec> = bot_groups
        .into_iter()
        .map(|(name, count)| {
            let (command, cmd_args) = bot_cmds.get(&name).cloned().unwrap_or_else(default_bot_command);
            BotSpec { name, command, args: cmd_args, count, env_overrides: HashMap::new() }
        })
        .collect();

    let mut spawner = Spawner::new();
    if let Err(err) = spawner.launch(&specs, &server_url, args.seed) {
        tracing::error!(%err, "failed to launch bot processes");
        std::process::exit(1);
    }

    let exit_code = loop {
        if director.any_game_completed(args.hand_limit) {
            break 0;
        }
        tokio::select! {
            exit = spawner.wait_any_exit() => {
                match exit {
                    Some(exit) if matches!(&exit.status, Ok(status) if status.success()) => {
                        tracing::info!(bot_id = %exit.bot_id, "bot process exited");
                    }
                    Some(exit) => {
                        tracing::error!(bot_id = %exit.bot_id, status = ?exit.status, "bot process exited early");
                        break 1;
                    }
                    None => {}
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
    };

    spawner.shutdown(Duration::from_secs(2)).await;
    std::process::exit(exit_code);
}
