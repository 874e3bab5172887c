//! Opt-in JSONL event log (`--telemetry`). One line per dispatched command,
//! finished subprocess, or failed service call.
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::RuntimeConfig;

fn unix_ms_now() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ShellEvent {
    CommandDispatched {
        head: String,
        tokens: usize,
        depth: usize,
    },
    PassthroughCompleted {
        exit_code: Option<i32>,
        output_chars: usize,
    },
    ServiceFailed {
        service: String,
        failure: String,
    },
}

#[derive(Serialize)]
struct EventLine<'a> {
    ts_unix_ms: u64,
    session: &'a str,
    #[serde(flatten)]
    event: &'a ShellEvent,
}

#[derive(Debug)]
pub struct EventLog {
    /// `None` when telemetry is off.
    path: Option<PathBuf>,
    session: String,
    write_lock: Mutex<()>,
}

impl EventLog {
    pub fn new(cfg: &RuntimeConfig) -> Self {
        Self {
            path: cfg
                .telemetry_enabled
                .then(|| cfg.telemetry_path.clone()),
            session: format!("devsh-{}-{}", unix_ms_now(), std::process::id()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Write failures are logged and otherwise ignored.
    pub fn record(&self, event: ShellEvent) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        let line = EventLine {
            ts_unix_ms: unix_ms_now(),
            session: &self.session,
            event: &event,
        };
        if let Err(err) = self.append(path, &line) {
            tracing::warn!(path = %path.display(), error = %err, "telemetry write failed");
        }
    }

    fn append(&self, path: &Path, line: &EventLine<'_>) -> Result<()> {
        let encoded = serde_json::to_string(line).context("failed to encode telemetry event")?;
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| {
                format!("failed to create telemetry directory '{}'", dir.display())
            })?;
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open telemetry file '{}'", path.display()))?;
        writeln!(file, "{encoded}").context("failed to append telemetry event")
    }
}
