use anyhow::{Context, Result};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Editor, Helper};

use crate::commands::complete_line;
use crate::shell::{Flow, Shell};
use crate::theme::startup_banner;

/// Tab completion over the command tree for `.`-prefixed lines.
#[derive(Debug, Clone, Default)]
pub struct ShellHelper;

impl Helper for ShellHelper {}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, tokens) = complete_line(&line[..pos]);
        let candidates = tokens
            .into_iter()
            .map(|token| Pair {
                display: token.to_string(),
                replacement: format!("{token} "),
            })
            .collect();
        Ok((start, candidates))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

/// Read lines until `exit` or end of input. `Ctrl-C` at the prompt drops
/// the current line; `Ctrl-D` runs the shutdown sequence.
pub fn run_repl(shell: &mut Shell) -> Result<()> {
    let mut editor: Editor<ShellHelper, DefaultHistory> =
        Editor::new().context("failed to initialize line editor")?;
    editor.set_helper(Some(ShellHelper));

    for line in startup_banner(shell.chat.is_enabled()) {
        println!("{line}");
    }

    loop {
        let prompt = shell.prompt();
        match editor.readline(&prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                if shell.process_line(&line) == Flow::Exit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                shell.shutdown();
                break;
            }
            Err(err) => {
                shell.shutdown();
                return Err(err).context("failed to read input line");
            }
        }
    }

    tracing::info!("shell exited");
    Ok(())
}
