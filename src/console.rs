//! Output seam between the shell and the user's terminal.
//!
//! Everything the dispatcher says goes through [`Console::emit`]; tests swap
//! in [`ScriptedConsole`] to capture lines and script confirmations.
use std::io::{self, BufRead, Write};
use std::time::Duration;

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};

use crate::cli::TextSpeed;
use crate::theme::{RESET, YELLOW};

pub trait Console {
    fn emit(&mut self, text: &str);
    fn confirm(&mut self, question: &str) -> bool;
    fn clear_screen(&mut self);
    fn set_speed(&mut self, _speed: TextSpeed) {}
    fn set_buffer(&mut self, _enabled: bool) {}
}

#[derive(Debug, Default)]
pub struct StdConsole {
    speed: TextSpeed,
    buffer: bool,
}

impl StdConsole {
    pub fn new(speed: TextSpeed, buffer: bool) -> Self {
        Self { speed, buffer }
    }

    fn typewrite(&self, text: &str) -> io::Result<()> {
        let delay = Duration::from_millis(self.speed.char_delay_ms());
        let mut stdout = io::stdout().lock();
        if delay.is_zero() {
            return writeln!(stdout, "{text}");
        }
        for ch in text.chars() {
            write!(stdout, "{ch}")?;
            if ch.is_ascii_alphanumeric() {
                stdout.flush()?;
                std::thread::sleep(delay);
            }
        }
        writeln!(stdout)
    }
}

/// Ask a y/N question on `output` and read the answer from `input`.
///
/// With `buffered` on, the first line is the "press enter to type" pause and
/// is discarded before the answer is read. End of input answers no.
pub fn ask_yes_no<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    buffered: bool,
) -> io::Result<bool> {
    if buffered {
        write!(output, "{question} {YELLOW}(press enter to type){RESET}")?;
        output.flush()?;
        let mut pause = String::new();
        if input.read_line(&mut pause)? == 0 {
            return Ok(false);
        }
        write!(output, "[y/N]: ")?;
    } else {
        write!(output, "{question} [y/N]: ")?;
    }
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

impl Console for StdConsole {
    fn emit(&mut self, text: &str) {
        if let Err(err) = self.typewrite(text) {
            tracing::warn!(error = %err, "failed to write to stdout");
        }
    }

    fn confirm(&mut self, question: &str) -> bool {
        let stdin = io::stdin();
        match ask_yes_no(&mut stdin.lock(), &mut io::stdout(), question, self.buffer) {
            Ok(answer) => answer,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read confirmation");
                false
            }
        }
    }

    fn clear_screen(&mut self) {
        if let Err(err) = execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0)) {
            tracing::warn!(error = %err, "failed to clear screen");
        }
    }

    fn set_speed(&mut self, speed: TextSpeed) {
        self.speed = speed;
    }

    fn set_buffer(&mut self, enabled: bool) {
        self.buffer = enabled;
    }
}

/// Records emitted lines and answers confirmations from a script.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct ScriptedConsole {
    pub lines: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    pub answers: std::sync::Arc<std::sync::Mutex<std::collections::VecDeque<bool>>>,
    pub clears: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl ScriptedConsole {
    pub fn with_answers(answers: &[bool]) -> Self {
        let console = Self::default();
        console
            .answers
            .lock()
            .unwrap()
            .extend(answers.iter().copied());
        console
    }

    pub fn output(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.output().iter().any(|line| line.contains(needle))
    }
}

#[cfg(test)]
impl Console for ScriptedConsole {
    fn emit(&mut self, text: &str) {
        self.lines.lock().unwrap().push(text.to_string());
    }

    fn confirm(&mut self, question: &str) -> bool {
        self.lines.lock().unwrap().push(question.to_string());
        self.answers.lock().unwrap().pop_front().unwrap_or(false)
    }

    fn clear_screen(&mut self) {
        self.clears
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}
