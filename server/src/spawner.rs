//! Spawner: launches bot subprocesses, injects their connection
//! environment, and supervises them until the run ends.
//!
//! `tokio::process::Child` exposes no portable SIGTERM API, and this
//! workspace carries no `libc`/`nix` dependency anywhere in its stack, so
//! shutdown shells out to the `kill` utility directly (Unix only) instead
//! of fabricating a dependency for one syscall — recorded as a deliberate
//! simplification in DESIGN.md.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// One bot type to launch: a command template, a repeat count, and any
/// extra environment overrides.
#[derive(Debug, Clone)]
pub struct BotSpec {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub count: u32,
    pub env_overrides: HashMap<String, String>,
}

#[derive(Debug)]
pub struct BotExit {
    pub bot_id: String,
    pub status: std::io::Result<std::process::ExitStatus>,
}

struct RunningBot {
    bot_id: String,
    child: Child,
}

fn bot_id(name: &str, index: u32) -> String {
    format!("{name}-{index}")
}

/// Launches and supervises a fleet of bot subprocesses against one
/// server. `wait_any_exit` surfaces every exit, early or not, to the
/// caller.
pub struct Spawner {
    pids: Vec<u32>,
    exits: mpsc::UnboundedReceiver<BotExit>,
    exits_tx: mpsc::UnboundedSender<BotExit>,
}

impl Default for Spawner {
    fn default() -> Self {
        Self::new()
    }
}

impl Spawner {
    pub fn new() -> Self {
        let (exits_tx, exits) = mpsc::unbounded_channel();
        Spawner { pids: Vec::new(), exits, exits_tx }
    }

    /// Launches every bot named by `specs`, injecting `SERVER_URL`,
    /// `SEED`, and a unique `BOT_ID` into each process's environment.
    /// Each child is supervised by its own task so the code never needs
    /// to hold more than one `&mut Child` at a time.
    pub fn launch(&mut self, specs: &[BotSpec], server_url: &str, seed: u64) -> std::io::Result<()> {
        for spec in specs {
            for i in 0..spec.count {
                let id = bot_id(&spec.name, i);
                let mut cmd = Command::new(&spec.command);
                cmd.args(&spec.args)
                    .env("SERVER_URL", server_url)
                    .env("SEED", seed.to_string())
                    .env("BOT_ID", &id)
                    .stdin(Stdio::null())
                    .kill_on_drop(true);
                for (k, v) in &spec.env_overrides {
                    cmd.env(k, v);
                }
                let child = cmd.spawn()?;
                if let Some(pid) = child.id() {
                    self.pids.push(pid);
                }
                info!(bot_id = %id, command = %spec.command, "spawned bot process");
                self.supervise(id, child);
            }
        }
        Ok(())
    }

    fn supervise(&self, bot_id: String, mut child: Child) {
        let tx = self.exits_tx.clone();
        tokio::spawn(async move {
            let status = child.wait().await;
            let _ = tx.send(BotExit { bot_id, status });
        });
    }

    pub async fn wait_any_exit(&mut self) -> Option<BotExit> {
        self.exits.recv().await
    }

    /// Terminates every bot still running: `SIGTERM`, then `SIGKILL` after
    /// `grace`.
    #[cfg(unix)]
    pub async fn shutdown(&mut self, grace: Duration) {
        for &pid in &self.pids {
            send_signal(pid, "TERM").await;
        }
        tokio::time::sleep(grace).await;
        for &pid in &self.pids {
            send_signal(pid, "KILL").await;
        }
    }

    #[cfg(not(unix))]
    pub async fn shutdown(&mut self, _grace: Duration) {
        warn!("bot process termination is only implemented for unix targets");
    }
}

#[cfg(unix)]
async fn send_signal(pid: u32, signal: &str) {
    match Command::new("kill").arg(format!("-{signal}")).arg(pid.to_string()).status().await {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(pid, signal, ?status, "kill exited non-zero"),
        Err(err) => warn!(pid, signal, %err, "failed to invoke kill"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_ids_are_name_and_index() {
        assert_eq!(bot_id("calling-station", 0), "calling-station-0");
        assert_eq!(bot_id("calling-station", 1), "calling-station-1");
    }
}
