//! Prompt visuals, startup banner, and command-name suggestions.

pub const RESET: &str = "\x1b[0m";
pub const DIM: &str = "\x1b[2m";
pub const CYAN: &str = "\x1b[36m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BOLD_CYAN: &str = "\x1b[1;36m";
pub const BOLD_RED: &str = "\x1b[1;31m";
pub const BOLD_MAGENTA: &str = "\x1b[1;35m";

/// `<dir> <shell> [git:(branch)] [ai]: `
///
/// The `ai` marker shows that free text goes to chat instead of the host
/// shell.
pub fn build_prompt(shell_label: &str, directory: &str, branch: Option<&str>, chat_mode: bool) -> String {
    let mut prompt = format!("{BOLD_RED}{directory}{RESET} {DIM}{shell_label}{RESET}");
    if let Some(branch) = branch {
        prompt.push_str(&format!(" {BOLD_MAGENTA}git:({branch}){RESET}"));
    }
    if chat_mode {
        prompt.push_str(&format!(" {BOLD_CYAN}ai{RESET}"));
    }
    prompt.push_str(": ");
    prompt
}

/// Drop `ESC [ ... <letter>` sequences.
pub fn strip_ansi(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            plain.push(c);
            continue;
        }
        for terminator in chars.by_ref() {
            if terminator.is_ascii_alphabetic() {
                break;
            }
        }
    }
    plain
}

pub fn startup_banner(chat_available: bool) -> Vec<String> {
    let version = env!("CARGO_PKG_VERSION");
    let chat = if chat_available {
        format!("{GREEN}chat ready{RESET}")
    } else {
        format!("{YELLOW}chat disabled{RESET} {DIM}(.ai apikey set <key>){RESET}")
    };
    vec![
        format!("  {BOLD_CYAN}devsh{RESET} {DIM}v{version}{RESET}  {DIM}·{RESET}  {chat}"),
        format!(
            "  {CYAN}.help{RESET} {DIM}commands{RESET}  {DIM}·{RESET}  {CYAN}.terminal{RESET} {DIM}shell mode{RESET}  {DIM}·{RESET}  {CYAN}exit{RESET} {DIM}quit{RESET}"
        ),
    ]
}

/// Tokens the user probably meant: prefix matches first, otherwise tokens a
/// single typo away.
pub fn close_matches<'a>(input: &str, candidates: &[&'a str]) -> Vec<&'a str> {
    let input = input.to_ascii_lowercase();
    if input.is_empty() {
        return Vec::new();
    }
    let prefixed: Vec<&str> = candidates
        .iter()
        .copied()
        .filter(|token| token.starts_with(&input))
        .collect();
    if !prefixed.is_empty() {
        return prefixed;
    }
    candidates
        .iter()
        .copied()
        .filter(|token| strsim::damerau_levenshtein(&input, token) == 1)
        .collect()
}

pub fn suggest_command(input: &str, candidates: &[&str]) -> Option<String> {
    let matches = close_matches(input, candidates);
    match matches.as_slice() {
        [] => None,
        [only] => Some(format!("Did you mean {CYAN}{only}{RESET}?")),
        many => {
            let list = many
                .iter()
                .map(|token| format!("{CYAN}{token}{RESET}"))
                .collect::<Vec<_>>()
                .join(", ");
            Some(format!("Did you mean one of: {list}?"))
        }
    }
}
