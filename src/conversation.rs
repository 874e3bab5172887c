//! Conversation transcript and the context policy for follow-up prompts.
//!
//! Turns are only recorded while the cache is enabled and incognito is off.
//! When recording and a transcript exists, the outgoing prompt embeds the
//! whole transcript verbatim ahead of the new message. No cap is applied.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn render(&self) -> String {
        format!("{}: {}", self.role.label(), self.text)
    }

    fn parse(line: &str) -> Option<Self> {
        for role in [Role::User, Role::Assistant] {
            let prefix = format!("{}: ", role.label());
            if let Some(text) = line.strip_prefix(&prefix) {
                return Some(Self {
                    role,
                    text: text.to_string(),
                });
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
    cache_enabled: bool,
    incognito: bool,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Conversation {
    pub fn new(cache_enabled: bool, incognito: bool) -> Self {
        Self {
            turns: Vec::new(),
            cache_enabled,
            incognito,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn incognito(&self) -> bool {
        self.incognito
    }

    pub fn is_recording(&self) -> bool {
        self.cache_enabled && !self.incognito
    }

    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
    }

    /// Enabling incognito drops everything recorded so far.
    pub fn set_incognito(&mut self, enabled: bool) {
        self.incognito = enabled;
        if enabled {
            self.turns.clear();
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Append one completed exchange. A no-op when not recording.
    pub fn record(&mut self, user: &str, assistant: &str) -> bool {
        if !self.is_recording() {
            return false;
        }
        self.turns.push(Turn {
            role: Role::User,
            text: user.to_string(),
        });
        self.turns.push(Turn {
            role: Role::Assistant,
            text: assistant.to_string(),
        });
        true
    }

    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(Turn::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn build_prompt(&self, message: &str) -> String {
        if !self.is_recording() || self.turns.is_empty() {
            return message.to_string();
        }
        format!(
            "Previous messages in this conversation:\n{}\n\nReply to the user's next message in that context:\n{}",
            self.transcript(),
            message
        )
    }

    pub fn to_saved(&self) -> Vec<String> {
        self.turns.iter().map(Turn::render).collect()
    }

    /// Restore a saved snapshot. Lines without a role prefix are skipped.
    pub fn restore(&mut self, saved: &[String]) {
        self.turns = saved.iter().filter_map(|line| Turn::parse(line)).collect();
    }
}
