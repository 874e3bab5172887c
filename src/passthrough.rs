//! Host-shell passthrough with a virtual working directory.
//!
//! The shell keeps its own notion of the current directory instead of
//! mutating the process cwd. `cd` forms are resolved in the foreground;
//! everything else runs in a host shell subprocess on a runtime worker while
//! the caller blocks until it exits.
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::runtime::Handle;

use crate::cli::PathDisplay;
use crate::theme::build_prompt;

pub const PASSTHROUGH_OUTPUT_CACHE_CHARS: usize = 8000;
pub const PASSTHROUGH_HISTORY_LIMIT: usize = 200;

/// Shell-level patterns that make a `cd` line a compound command.
pub const CHAINING_PATTERNS: &[&str] = &["&&", "||", ";", "|", "&", "$(", "`", ">", "<", "\n"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassthroughError {
    NoSuchDirectory(String),
    Launch(String),
    Interrupted,
    Worker(String),
}

impl std::fmt::Display for PassthroughError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassthroughError::NoSuchDirectory(target) => write!(f, "no such directory: {target}"),
            PassthroughError::Launch(msg) => write!(f, "{msg}"),
            PassthroughError::Interrupted => write!(f, "interrupted"),
            PassthroughError::Worker(msg) => write!(f, "subprocess worker failed: {msg}"),
        }
    }
}

impl std::error::Error for PassthroughError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    ChangedDirectory(PathBuf),
    Completed {
        exit_code: Option<i32>,
        output: String,
    },
}

/// Most recent command and its combined output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub command: String,
    pub output: String,
    pub exit_code: Option<i32>,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostShell {
    pub program: String,
    pub command_flag: &'static str,
    pub label: String,
}

pub fn detect_host_shell() -> HostShell {
    if cfg!(windows) {
        return HostShell {
            program: "cmd.exe".to_string(),
            command_flag: "/C",
            label: "cmd.exe".to_string(),
        };
    }

    let program = std::env::var("SHELL")
        .ok()
        .filter(|path| !path.trim().is_empty() && Path::new(path).exists())
        .unwrap_or_else(|| "/bin/sh".to_string());
    let label = Path::new(&program)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "sh".to_string());
    HostShell {
        program,
        command_flag: "-c",
        label,
    }
}

pub fn contains_command_chaining(command: &str) -> bool {
    CHAINING_PATTERNS.iter().any(|p| command.contains(p))
}

/// Returns `Some(target)` when `command` is a plain directory change.
/// A bare `cd` yields `Some(None)`.
pub fn parse_cd_command(command: &str) -> Option<Option<String>> {
    let trimmed = command.trim();
    if contains_command_chaining(trimmed) {
        return None;
    }
    let words = shlex::split(trimmed)?;
    if words.first().map(String::as_str) != Some("cd") {
        return None;
    }
    if words.len() == 1 {
        return Some(None);
    }
    Some(Some(words[1..].join(" ")))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .filter(|home| !home.trim().is_empty())
        .map(PathBuf::from)
}

/// Resolve `target` against `cwd`; only existing directories resolve.
pub fn resolve_directory(cwd: &Path, target: &str) -> Option<PathBuf> {
    let expanded = if target == "~" {
        home_dir()?
    } else if let Some(rest) = target.strip_prefix("~/") {
        home_dir()?.join(rest)
    } else {
        PathBuf::from(target)
    };
    let candidate = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };
    candidate.canonicalize().ok().filter(|path| path.is_dir())
}

pub fn parse_head_ref(head: &str) -> Option<String> {
    let head = head.trim();
    if let Some(reference) = head.strip_prefix("ref:") {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        return Some(
            reference
                .strip_prefix("refs/heads/")
                .unwrap_or(reference)
                .to_string(),
        );
    }
    if head.len() >= 7 && head.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(head[..7].to_string());
    }
    None
}

/// Walk upward from `start` to the nearest `.git` and read its HEAD.
pub fn find_git_branch(start: &Path) -> Option<String> {
    for dir in start.ancestors() {
        let dot_git = dir.join(".git");
        let git_dir = if dot_git.is_dir() {
            dot_git
        } else if dot_git.is_file() {
            // worktrees and submodules: `gitdir: <path>`
            let pointer = std::fs::read_to_string(&dot_git).ok()?;
            let target = pointer.trim().strip_prefix("gitdir:")?.trim();
            let target = PathBuf::from(target);
            if target.is_absolute() {
                target
            } else {
                dir.join(target)
            }
        } else {
            continue;
        };
        let head = std::fs::read_to_string(git_dir.join("HEAD")).ok()?;
        return parse_head_ref(&head);
    }
    None
}

/// Keep the last `max_chars` characters of `text`.
pub fn truncate_tail(text: &str, max_chars: usize) -> (String, bool) {
    let total = text.chars().count();
    if total <= max_chars {
        return (text.to_string(), false);
    }
    (text.chars().skip(total - max_chars).collect(), true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Stdout,
    Stderr,
}

const READ_CHUNK_BYTES: usize = 4096;

fn mirror(kind: StreamKind, bytes: &[u8]) {
    let written = match kind {
        StreamKind::Stdout => {
            let mut out = std::io::stdout().lock();
            out.write_all(bytes).and_then(|()| out.flush())
        }
        StreamKind::Stderr => {
            let mut out = std::io::stderr().lock();
            out.write_all(bytes).and_then(|()| out.flush())
        }
    };
    if let Err(err) = written {
        tracing::debug!(error = %err, "failed to mirror subprocess output");
    }
}

/// Drain one pipe in raw chunks until EOF, appending to `combined` so both
/// streams interleave in arrival order. Bytes are never decoded here.
async fn pump_stream<R>(stream: Option<R>, kind: StreamKind, echo: bool, combined: Arc<Mutex<Vec<u8>>>)
where
    R: AsyncRead + Unpin,
{
    let Some(mut stream) = stream else {
        return;
    };
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let read = match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::debug!(error = %err, stream = ?kind, "stopped reading subprocess stream");
                break;
            }
        };
        let bytes = &chunk[..read];
        if echo {
            mirror(kind, bytes);
        }
        combined
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(bytes);
    }
}

pub async fn run_shell_command(
    shell: HostShell,
    command: String,
    cwd: PathBuf,
    echo: bool,
) -> Result<(Option<i32>, String), PassthroughError> {
    let mut child = tokio::process::Command::new(&shell.program)
        .arg(shell.command_flag)
        .arg(&command)
        .current_dir(&cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| {
            PassthroughError::Launch(format!("failed to launch '{command}': {err}"))
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let work = async move {
        let combined = Arc::new(Mutex::new(Vec::new()));
        let ((), (), status) = tokio::join!(
            pump_stream(stdout, StreamKind::Stdout, echo, Arc::clone(&combined)),
            pump_stream(stderr, StreamKind::Stderr, echo, Arc::clone(&combined)),
            child.wait()
        );
        let status = status.map_err(|e| {
            PassthroughError::Worker(format!("failed to wait for subprocess: {e}"))
        })?;
        let bytes = combined.lock().unwrap_or_else(|e| e.into_inner());
        Ok((status.code(), String::from_utf8_lossy(&bytes).into_owned()))
    };

    tokio::select! {
        result = work => result,
        _ = tokio::signal::ctrl_c() => Err(PassthroughError::Interrupted),
    }
}

#[derive(Debug)]
pub struct Passthrough {
    cwd: PathBuf,
    shell: HostShell,
    path_display: PathDisplay,
    echo: bool,
    last: Option<CommandRecord>,
    history: Vec<String>,
    runtime: Handle,
}

impl Passthrough {
    pub fn new(runtime: Handle, start_dir: Option<PathBuf>, echo: bool) -> Self {
        let cwd = start_dir
            .or_else(|| std::env::current_dir().ok())
            .and_then(|dir| dir.canonicalize().ok())
            .filter(|dir| dir.is_dir())
            .unwrap_or_else(|| PathBuf::from("/"));
        Self {
            cwd,
            shell: detect_host_shell(),
            path_display: PathDisplay::Leaf,
            echo,
            last: None,
            history: Vec::new(),
            runtime,
        }
    }

    pub fn current_dir(&self) -> &Path {
        &self.cwd
    }

    /// Whether subprocess output is mirrored to the terminal as it runs.
    pub fn echoes(&self) -> bool {
        self.echo
    }

    pub fn shell_label(&self) -> &str {
        &self.shell.label
    }

    pub fn path_display(&self) -> PathDisplay {
        self.path_display
    }

    pub fn set_path_display(&mut self, display: PathDisplay) {
        self.path_display = display;
    }

    pub fn last_record(&self) -> Option<&CommandRecord> {
        self.last.as_ref()
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.last = None;
    }

    pub fn change_directory(&mut self, target: Option<&str>) -> Result<PathBuf, PassthroughError> {
        let target = match target {
            Some(target) => target.to_string(),
            None => "~".to_string(),
        };
        match resolve_directory(&self.cwd, &target) {
            Some(dir) => {
                tracing::debug!(from = %self.cwd.display(), to = %dir.display(), "changed directory");
                self.cwd = dir.clone();
                Ok(dir)
            }
            None => Err(PassthroughError::NoSuchDirectory(target)),
        }
    }

    /// Run one passthrough command and block until it finishes.
    pub fn execute(&mut self, command: &str) -> Result<ExecOutcome, PassthroughError> {
        let command = command.trim();
        self.remember(command);

        if let Some(target) = parse_cd_command(command) {
            return self
                .change_directory(target.as_deref())
                .map(ExecOutcome::ChangedDirectory);
        }

        let worker = self.runtime.spawn(run_shell_command(
            self.shell.clone(),
            command.to_string(),
            self.cwd.clone(),
            self.echo,
        ));
        let joined = self
            .runtime
            .block_on(worker)
            .map_err(|err| PassthroughError::Worker(err.to_string()))?;

        match joined {
            Ok((exit_code, output)) => {
                let (cached, truncated) = truncate_tail(&output, PASSTHROUGH_OUTPUT_CACHE_CHARS);
                self.last = Some(CommandRecord {
                    command: command.to_string(),
                    output: cached,
                    exit_code,
                    truncated,
                });
                Ok(ExecOutcome::Completed { exit_code, output })
            }
            Err(err) => {
                self.last = Some(CommandRecord {
                    command: command.to_string(),
                    output: err.to_string(),
                    exit_code: None,
                    truncated: false,
                });
                Err(err)
            }
        }
    }

    fn remember(&mut self, command: &str) {
        self.history.push(command.to_string());
        if self.history.len() > PASSTHROUGH_HISTORY_LIMIT {
            let overflow = self.history.len() - PASSTHROUGH_HISTORY_LIMIT;
            self.history.drain(..overflow);
        }
    }

    pub fn display_directory(&self) -> String {
        match self.path_display {
            PathDisplay::Full => self.cwd.display().to_string(),
            PathDisplay::Leaf => self
                .cwd
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| self.cwd.display().to_string()),
        }
    }

    pub fn git_branch(&self) -> Option<String> {
        find_git_branch(&self.cwd)
    }

    pub fn prompt(&self, chat_mode: bool) -> String {
        build_prompt(
            &self.shell.label,
            &self.display_directory(),
            self.git_branch().as_deref(),
            chat_mode,
        )
    }
}
