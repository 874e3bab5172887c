#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Filesystem,
    Subprocess,
    Service,
    Config,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Filesystem => "FILESYSTEM",
            ErrorCategory::Subprocess => "SUBPROCESS",
            ErrorCategory::Service => "SERVICE",
            ErrorCategory::Config => "CONFIG",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Input => "Type help (or .help) to list the available commands.",
            ErrorCategory::Filesystem => {
                "Check that --data-dir (DEVSH_HOME) points to a writable directory."
            }
            ErrorCategory::Subprocess => {
                "Check the command exists on PATH and runs from the current directory."
            }
            ErrorCategory::Service => {
                "Re-validate with .ai apikey set <key> or .user location enable, then retry."
            }
            ErrorCategory::Config => {
                "Check devsh --help and the DEVSH_* environment variables for valid values."
            }
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }

    /// Process exit code used when an error of this category ends the program.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCategory::Filesystem => 2,
            ErrorCategory::Config => 3,
            _ => 1,
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("preferences file")
        || msg.contains("data directory")
        || msg.contains("failed to write")
    {
        return ErrorCategory::Filesystem;
    }

    if msg.contains("runtime")
        || msg.contains("invalid value")
        || msg.contains("configuration")
        || msg.contains("tracing subscriber")
    {
        return ErrorCategory::Config;
    }

    if msg.contains("no given arguments") || msg.contains("unknown command") {
        return ErrorCategory::Input;
    }

    if msg.contains("subprocess") || msg.contains("failed to launch") {
        return ErrorCategory::Subprocess;
    }

    if msg.contains("timed out") || msg.contains("transport") || msg.contains("malformed") {
        return ErrorCategory::Service;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error) -> String {
    let category = categorize_error(err);
    format!(
        "[{}] {}\nHint: {}",
        category.code(),
        redact_sensitive_text(&format!("{err:#}")),
        category.hint()
    )
}

pub fn redact_sensitive_text(text: &str) -> String {
    redact_api_keys(text)
}

/// Masks `sk-...` style credentials and `apikey=` query values.
pub fn redact_api_keys(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;

    while let Some((start, prefix)) = next_secret_prefix(&text[cursor..]) {
        let start = cursor + start;
        out.push_str(&text[cursor..start]);
        out.push_str(prefix);

        let value_start = start + prefix.len();
        let remainder = &text[value_start..];
        let end = remainder
            .find(|ch: char| {
                ch.is_whitespace() || matches!(ch, '"' | '\'' | '&' | ',' | ';' | ')' | ']')
            })
            .unwrap_or(remainder.len());
        out.push_str("[REDACTED]");
        cursor = value_start + end;
    }

    out.push_str(&text[cursor..]);
    out
}

fn next_secret_prefix(text: &str) -> Option<(usize, &'static str)> {
    ["sk-", "apikey="]
        .iter()
        .filter_map(|prefix| {
            text.match_indices(prefix)
                .find(|(idx, _)| {
                    text[..*idx]
                        .chars()
                        .next_back()
                        .is_none_or(|prev| !prev.is_ascii_alphanumeric())
                })
                .map(|(idx, _)| (idx, *prefix))
        })
        .min_by_key(|(idx, _)| *idx)
}

pub fn mask_secret(value: &str) -> String {
    let len = value.chars().count();
    if len <= 8 {
        return "*".repeat(len);
    }
    let tail = value.chars().skip(len - 4).collect::<String>();
    format!("{}{tail}", "*".repeat(8))
}
