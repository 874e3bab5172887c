//! Declarative command tree.
//!
//! Each [`Branch`] maps literal tokens to either a handler or a nested
//! branch. Walking pops one token per level; an exhausted queue selects the
//! branch default, an unknown token prints a hint and stops. Adding a
//! command is a table entry, not new control flow.
use crate::shell::{Flow, Shell};
use crate::theme::{CYAN, DIM, RESET, suggest_command};
use crate::tokenizer::TokenQueue;

pub mod ai;
pub mod top;
pub mod user;
pub mod weather;

pub const MISSING_ARGUMENTS: &str = "no given arguments, try help";

pub type Handler = fn(&mut Shell, &mut TokenQueue) -> Flow;

pub enum Route {
    Leaf(Handler),
    Branch(&'static Branch),
}

pub struct Entry {
    pub token: &'static str,
    pub usage: &'static str,
    pub route: Route,
}

pub struct Branch {
    pub name: &'static str,
    pub entries: &'static [Entry],
    /// Runs when the queue is exhausted at this branch.
    pub default: Option<Handler>,
}

impl Branch {
    pub fn tokens(&self) -> Vec<&'static str> {
        let mut tokens: Vec<&'static str> = self.entries.iter().map(|e| e.token).collect();
        tokens.push("help");
        tokens
    }

    fn find(&self, token: &str) -> Option<&'static Entry> {
        self.entries.iter().find(|entry| entry.token == token)
    }
}

pub const fn leaf(token: &'static str, usage: &'static str, handler: Handler) -> Entry {
    Entry {
        token,
        usage,
        route: Route::Leaf(handler),
    }
}

pub const fn branch(token: &'static str, usage: &'static str, next: &'static Branch) -> Entry {
    Entry {
        token,
        usage,
        route: Route::Branch(next),
    }
}

pub fn dispatch(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    walk(shell, queue, &top::ROOT)
}

pub fn walk(shell: &mut Shell, queue: &mut TokenQueue, branch: &'static Branch) -> Flow {
    let Some(token) = shell.pop(queue) else {
        return match branch.default {
            Some(handler) => handler(shell, queue),
            None => missing(shell),
        };
    };
    let token = token.to_ascii_lowercase();
    if token == "help" {
        print_help(shell, branch);
        return Flow::Continue;
    }
    match branch.find(&token).map(|entry| &entry.route) {
        Some(Route::Leaf(handler)) => handler(shell, queue),
        Some(Route::Branch(next)) => walk(shell, queue, next),
        None => unknown(shell, branch, &token),
    }
}

pub fn missing(shell: &mut Shell) -> Flow {
    shell.say(MISSING_ARGUMENTS);
    Flow::Continue
}

pub fn unknown(shell: &mut Shell, branch: &Branch, token: &str) -> Flow {
    shell.say(&format!("unknown command '{token}', try help"));
    if let Some(suggestion) = suggest_command(token, &branch.tokens()) {
        shell.say(&suggestion);
    }
    tracing::debug!(branch = branch.name, token = %token, "unknown command");
    Flow::Continue
}

/// Pop the next argument or print the missing-argument hint.
pub fn require(shell: &mut Shell, queue: &mut TokenQueue) -> Option<String> {
    match shell.pop(queue) {
        Some(token) => Some(token),
        None => {
            missing(shell);
            None
        }
    }
}

/// Raw remainder of the line, or the missing-argument hint when empty.
pub fn require_rest_raw(shell: &mut Shell, queue: &mut TokenQueue) -> Option<String> {
    let rest = queue.take_rest_raw();
    if rest.is_empty() {
        missing(shell);
        return None;
    }
    trace_rest(shell, &rest);
    Some(rest)
}

/// Remaining tokens joined by spaces, or the missing-argument hint.
pub fn require_rest_joined(shell: &mut Shell, queue: &mut TokenQueue) -> Option<String> {
    let rest = queue.take_rest_joined();
    if rest.is_empty() {
        missing(shell);
        return None;
    }
    trace_rest(shell, &rest);
    Some(rest)
}

fn trace_rest(shell: &mut Shell, rest: &str) {
    tracing::debug!(rest = %rest, "consumed remainder");
    if shell.session.testing {
        shell.say(&format!("[testing] rest: {rest}"));
    }
}

pub fn print_help(shell: &mut Shell, branch: &Branch) {
    let title = if branch.name.is_empty() {
        "commands (prefix with '.' when chat is the default entry):".to_string()
    } else {
        format!("{} commands:", branch.name)
    };
    shell.say(&title);
    for entry in branch.entries {
        let label = if branch.name.is_empty() {
            entry.token.to_string()
        } else {
            format!("{} {}", branch.name, entry.token)
        };
        shell.say(&format!("  {CYAN}{label}{RESET}  {DIM}{}{RESET}", entry.usage));
    }
}

/// Completion candidates for a `.`-prefixed line typed up to the cursor.
/// Returns the byte offset where the replaced word starts.
pub fn complete_line(head: &str) -> (usize, Vec<&'static str>) {
    let Some(body) = head.strip_prefix('.') else {
        return (head.len(), Vec::new());
    };
    let words: Vec<&str> = body.split_whitespace().collect();
    let (path, partial) = if body.is_empty() || body.ends_with(char::is_whitespace) {
        (&words[..], "")
    } else {
        (&words[..words.len() - 1], words[words.len() - 1])
    };

    let mut branch: &'static Branch = &top::ROOT;
    for word in path {
        match branch.find(word).map(|entry| &entry.route) {
            Some(Route::Branch(next)) => branch = next,
            _ => return (head.len(), Vec::new()),
        }
    }
    let candidates = branch
        .tokens()
        .into_iter()
        .filter(|token| token.starts_with(partial))
        .collect();
    (head.len() - partial.len(), candidates)
}

/// Handler for branches whose bare form does nothing.
pub fn noop(_shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    Flow::Continue
}

pub fn on_off(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}
