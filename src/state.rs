use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::commands::Command;
use crate::config::Config;

/// Process-lifetime counters. Relaxed ordering: values are informational.
#[derive(Debug, Default)]
pub struct Metrics {
    updates: AtomicU64,
    callback_queries: AtomicU64,
    commands: [AtomicU64; Command::ALL.len()],
    command_errors: AtomicU64,
    send_failures: AtomicU64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub updates_total: u64,
    pub callback_queries_total: u64,
    pub commands_total: u64,
    pub commands: serde_json::Map<String, serde_json::Value>,
    pub command_errors_total: u64,
    pub send_failures_total: u64,
}

impl Metrics {
    pub fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback(&self) {
        self.callback_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command(&self, cmd: Command) {
        self.commands[cmd.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command_error(&self) {
        self.command_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut commands = serde_json::Map::new();
        let mut commands_total = 0;
        for cmd in Command::ALL {
            let count = self.commands[cmd.index()].load(Ordering::Relaxed);
            commands_total += count;
            commands.insert(cmd.name().to_string(), count.into());
        }
        MetricsSnapshot {
            updates_total: self.updates.load(Ordering::Relaxed),
            callback_queries_total: self.callback_queries.load(Ordering::Relaxed),
            commands_total,
            commands,
            command_errors_total: self.command_errors.load(Ordering::Relaxed),
            send_failures_total: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

/// State shared by the HTTP server and the bot dispatcher.
pub struct AppState {
    pub config: Config,
    pub metrics: Metrics,
    pub started_at: DateTime<Utc>,
    started: Instant,
    bot_username: OnceLock<String>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            metrics: Metrics::default(),
            started_at: Utc::now(),
            started: Instant::now(),
            bot_username: OnceLock::new(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Recorded once the startup `getMe` probe succeeds.
    pub fn set_bot_username(&self, username: String) {
        let _ = self.bot_username.set(username);
    }

    pub fn bot_username(&self) -> Option<&str> {
        self.bot_username.get().map(String::as_str)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn test_state() -> AppState {
        let config = Config::from_lookup(|key| match key {
            "TELEGRAM_BOT_TOKEN" => Some("123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw".to_string()),
            _ => None,
        })
        .unwrap();
        AppState::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts_commands() {
        let metrics = Metrics::default();
        metrics.record_update();
        metrics.record_update();
        metrics.record_command(Command::Id);
        metrics.record_command(Command::Id);
        metrics.record_command(Command::FileId);
        metrics.record_command_error();

        let snap = metrics.snapshot();
        assert_eq!(snap.updates_total, 2);
        assert_eq!(snap.commands_total, 3);
        assert_eq!(snap.commands["id"], 2);
        assert_eq!(snap.commands["fileid"], 1);
        assert_eq!(snap.commands["ping"], 0);
        assert_eq!(snap.commands.len(), Command::ALL.len());
        assert_eq!(snap.command_errors_total, 1);
        assert_eq!(snap.send_failures_total, 0);
    }

    #[test]
    fn test_bot_username_set_once() {
        let state = fixtures::test_state();
        assert_eq!(state.bot_username(), None);
        state.set_bot_username("id_bot".to_string());
        state.set_bot_username("other_bot".to_string());
        assert_eq!(state.bot_username(), Some("id_bot"));
    }
}
