//! The interactive shell: owns every piece of session state and routes each
//! input line to the command tree, the passthrough executor, or chat.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Handle;

use crate::chat::{ChatError, ChatService};
use crate::codeblock::{extract_code_blocks, write_code_blocks};
use crate::commands;
use crate::config::{Preferences, RuntimeConfig, save_preferences};
use crate::console::Console;
use crate::conversation::Conversation;
use crate::error::format_cli_error;
use crate::passthrough::{ExecOutcome, Passthrough, PassthroughError};
use crate::service::{BoundedClient, HttpTransport};
use crate::session::SessionState;
use crate::telemetry::{EventLog, ShellEvent};
use crate::tokenizer::TokenQueue;
use crate::weather::{WeatherError, WeatherService};

/// Nested re-entry limit for shortcut expansion and startup replay.
pub const MAX_EXPANSION_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// `chat-<date>-<time>-<millis>`, suffixed with a counter when a log with
/// that name already exists.
pub fn unused_log_stem(dir: &Path, now: chrono::DateTime<chrono::Local>) -> String {
    let base = format!("chat-{}", now.format("%Y%m%d-%H%M%S-%3f"));
    let taken = |stem: &str| dir.join(format!("{stem}.txt")).exists();
    if !taken(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let stem = format!("{base}-{n}");
        if !taken(&stem) {
            return stem;
        }
        n += 1;
    }
}

pub struct Shell {
    pub session: SessionState,
    pub conversation: Conversation,
    pub passthrough: Passthrough,
    pub chat: ChatService,
    pub weather: WeatherService,
    pub console: Box<dyn Console>,
    pub telemetry: EventLog,
    preferences: Preferences,
    preferences_path: PathBuf,
    logs_dir: PathBuf,
    depth: usize,
    replaying_startup: bool,
}

impl Shell {
    pub fn new(
        cfg: &RuntimeConfig,
        prefs: Preferences,
        transport: Arc<dyn HttpTransport>,
        handle: Handle,
        console: Box<dyn Console>,
    ) -> Self {
        let client = BoundedClient::new(transport, cfg.service_timeout, handle.clone());
        let chat = ChatService::new(
            client.clone(),
            &cfg.chat_base_url,
            &cfg.chat_model,
            prefs.api_key.clone(),
        );
        let weather_key = prefs
            .weather_api_key
            .clone()
            .or_else(|| cfg.weather_api_key.clone());
        let weather = WeatherService::new(client, &cfg.weather_base_url, weather_key);

        let mut passthrough = Passthrough::new(handle, None, cfg.echo_subprocess_output);
        passthrough.set_path_display(prefs.path_display);

        let mut conversation = Conversation::new(prefs.cache_enabled, prefs.incognito);
        if conversation.is_recording() {
            conversation.restore(&prefs.saved_chat);
        }

        let session = SessionState::from_preferences(&prefs);
        let mut console = console;
        console.set_speed(session.effective_speed());
        console.set_buffer(session.text_buffer);

        Self {
            session,
            conversation,
            passthrough,
            chat,
            weather,
            console,
            telemetry: EventLog::new(cfg),
            preferences: prefs,
            preferences_path: cfg.preferences_path.clone(),
            logs_dir: cfg.logs_dir.clone(),
            depth: 0,
            replaying_startup: false,
        }
    }

    /// Validate a stored key and replay startup commands. Runs before the
    /// first prompt.
    pub fn boot(&mut self) {
        if self.chat.api_key().is_some() && !self.chat.enable() {
            self.say("stored API key failed validation; chat disabled (try .ai enable)");
            self.report_service_failure("chat", "probe");
        }
        if self.session.startup_enabled {
            self.replay_startup();
        }
    }

    pub fn say(&mut self, text: &str) {
        self.console.emit(text);
    }

    pub fn prompt(&self) -> String {
        self.passthrough
            .prompt(self.session.default_to_chat && self.chat.is_enabled())
    }

    /// Pop one token, tracing it when testing mode is on.
    pub fn pop(&mut self, queue: &mut TokenQueue) -> Option<String> {
        let token = queue.pop()?;
        tracing::debug!(token = %token, "popped token");
        if self.session.testing {
            self.say(&format!("[testing] token: {token}"));
        }
        Some(token)
    }

    /// Route one raw input line.
    pub fn process_line(&mut self, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }
        if let Some(rest) = line.strip_prefix('.') {
            return self.dispatch(rest);
        }
        if matches!(line, "exit" | "clear" | "help") {
            return self.dispatch(line);
        }
        if self.session.default_to_chat && self.chat.is_enabled() {
            self.chat_message(line);
        } else {
            self.run_passthrough(line);
        }
        Flow::Continue
    }

    /// Feed `line` through the command tree.
    pub fn dispatch(&mut self, line: &str) -> Flow {
        let mut queue = TokenQueue::new(line);
        self.telemetry.record(ShellEvent::CommandDispatched {
            head: queue.peek().unwrap_or_default().to_string(),
            tokens: queue.len(),
            depth: self.depth,
        });
        commands::dispatch(self, &mut queue)
    }

    /// Re-enter the router with an expanded line, bounded by
    /// [`MAX_EXPANSION_DEPTH`].
    pub fn reenter(&mut self, line: &str) -> Flow {
        if self.depth >= MAX_EXPANSION_DEPTH {
            tracing::warn!(line = %line, depth = self.depth, "expansion depth limit reached");
            self.say(&format!(
                "expansion depth limit ({MAX_EXPANSION_DEPTH}) reached, skipping '{line}'"
            ));
            return Flow::Continue;
        }
        self.depth += 1;
        let flow = self.process_line(line);
        self.depth -= 1;
        flow
    }

    pub fn is_replaying_startup(&self) -> bool {
        self.replaying_startup
    }

    /// Run every stored startup command as top-level input.
    pub fn replay_startup(&mut self) {
        let commands = self.session.startup_commands.clone();
        let outer = self.replaying_startup;
        self.replaying_startup = true;
        for command in commands {
            self.reenter(&format!(".{command}"));
        }
        self.replaying_startup = outer;
    }

    pub fn run_passthrough(&mut self, command: &str) {
        let command = command.trim();
        if command.is_empty() {
            self.say("no given arguments, try help");
            return;
        }
        match self.passthrough.execute(command) {
            Ok(ExecOutcome::ChangedDirectory(_)) => {}
            Ok(ExecOutcome::Completed { exit_code, output }) => {
                self.telemetry.record(ShellEvent::PassthroughCompleted {
                    exit_code,
                    output_chars: output.chars().count(),
                });
                if !self.passthrough.echoes() {
                    for line in output.lines() {
                        self.say(line);
                    }
                }
                match exit_code {
                    Some(0) => {}
                    Some(code) => self.say(&format!("command exited with status {code}")),
                    None => self.say("command terminated by signal"),
                }
            }
            Err(PassthroughError::Interrupted) => self.say("interrupted"),
            Err(err) => self.say(&err.to_string()),
        }
    }

    /// Send one message to chat and print the reply or the failure.
    pub fn chat_message(&mut self, message: &str) {
        match self.chat.send(&mut self.conversation, message) {
            Ok(reply) => self.say(&reply),
            Err(ChatError::Service(failure)) => {
                self.report_service_failure("chat", failure.kind());
                self.say(&format!(
                    "chat failed: {failure}. chat disabled for this session; re-enable with .ai enable"
                ));
            }
            Err(ChatError::Disabled) => {
                self.say("chat is disabled; set a key with .ai apikey set <key> or run .ai enable")
            }
            Err(err) => self.say(&err.to_string()),
        }
    }

    pub fn report_weather_error(&mut self, err: WeatherError) {
        if let WeatherError::Service(failure) = &err {
            self.report_service_failure("weather", failure.kind());
            self.say(&format!(
                "weather failed: {failure}. weather disabled; re-enable with .user location enable"
            ));
            return;
        }
        self.say(&err.to_string());
    }

    fn report_service_failure(&self, service: &str, failure: &str) {
        self.telemetry.record(ShellEvent::ServiceFailed {
            service: service.to_string(),
            failure: failure.to_string(),
        });
    }

    /// Write the last prompt and reply to `logs/chat-<timestamp>.txt`, then
    /// offer to save any fenced code blocks from the reply.
    pub fn log_last_exchange(&mut self) -> Result<Option<PathBuf>> {
        let Some(response) = self.chat.last_response() else {
            return Ok(None);
        };
        let content = response.content.clone();
        let prompt = self.chat.last_prompt().unwrap_or_default().to_string();

        std::fs::create_dir_all(&self.logs_dir).with_context(|| {
            format!("failed to create data directory '{}'", self.logs_dir.display())
        })?;
        let stem = unused_log_stem(&self.logs_dir, chrono::Local::now());
        let path = self.logs_dir.join(format!("{stem}.txt"));
        std::fs::write(&path, format!("prompt:\n{prompt}\n\nresponse:\n{content}\n"))
            .with_context(|| format!("failed to write chat log '{}'", path.display()))?;
        self.say(&format!("saved chat log to {}", path.display()));

        let blocks = extract_code_blocks(&content);
        if !blocks.is_empty()
            && self.console.confirm(&format!(
                "Found {} code block(s). Save them as files?",
                blocks.len()
            ))
        {
            for written in write_code_blocks(&self.logs_dir, &stem, &blocks)? {
                self.say(&format!("saved code block to {}", written.display()));
            }
        }
        Ok(Some(path))
    }

    pub fn save_chat_history(&mut self) {
        self.preferences.saved_chat = self.conversation.to_saved();
    }

    pub fn clear_chat_history(&mut self) {
        self.conversation.clear();
        self.preferences.saved_chat.clear();
    }

    pub fn to_preferences(&self) -> Preferences {
        let mut prefs = self.preferences.clone();
        self.session.apply_to(&mut prefs);
        prefs.api_key = self.chat.api_key().map(str::to_string);
        prefs.cache_enabled = self.conversation.cache_enabled();
        prefs.incognito = self.conversation.incognito();
        prefs.path_display = self.passthrough.path_display();
        prefs
    }

    /// Persist preferences. Failures are reported and the session goes on.
    pub fn save_preferences(&mut self) -> bool {
        let prefs = self.to_preferences();
        match save_preferences(&self.preferences_path, &prefs) {
            Ok(()) => {
                self.preferences = prefs;
                true
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "failed to save preferences");
                self.say(&format_cli_error(&err));
                false
            }
        }
    }

    /// Offer to keep the transcript, then write preferences.
    pub fn shutdown(&mut self) {
        if self.conversation.is_recording()
            && !self.conversation.is_empty()
            && self
                .console
                .confirm("Save this chat history for next time?")
        {
            self.save_chat_history();
        }
        self.save_preferences();
    }
}
