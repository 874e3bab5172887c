//! Quote- and parenthesis-aware splitting of one input line.
//!
//! Whitespace separates tokens except inside a `'...'`, `"..."` or `(...)`
//! run, which collapses into a single token with the delimiters removed.
//! An unterminated run consumes to the end of the line. Stray delimiters
//! never surface as tokens.
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Byte offset in the source line where the token (or its opening
    /// delimiter) starts.
    pub offset: usize,
}

fn closing_delimiter(ch: char) -> Option<char> {
    match ch {
        '\'' => Some('\''),
        '"' => Some('"'),
        '(' => Some(')'),
        _ => None,
    }
}

fn flush(current: &mut String, start: usize, tokens: &mut Vec<Token>) {
    if !current.is_empty() {
        tokens.push(Token {
            text: std::mem::take(current),
            offset: start,
        });
    }
}

pub fn tokenize_spanned(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0usize;
    let mut closer: Option<char> = None;
    let mut chars = line.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if let Some(close) = closer {
            if ch == close {
                flush(&mut current, start, &mut tokens);
                closer = None;
            } else {
                current.push(ch);
            }
            continue;
        }

        if ch.is_whitespace() || ch == ')' {
            flush(&mut current, start, &mut tokens);
        } else if let Some(close) = closing_delimiter(ch) {
            // an opener standing alone between spaces is stray
            let alone = current.is_empty()
                && chars.peek().is_none_or(|(_, next)| next.is_whitespace());
            if alone {
                continue;
            }
            flush(&mut current, start, &mut tokens);
            closer = Some(close);
            start = idx;
        } else {
            if current.is_empty() {
                start = idx;
            }
            current.push(ch);
        }
    }
    if closer.is_some() {
        current = current.trim().to_string();
    }
    flush(&mut current, start, &mut tokens);

    tokens
}

pub fn tokenize(line: &str) -> Vec<String> {
    tokenize_spanned(line)
        .into_iter()
        .map(|token| token.text)
        .collect()
}

/// Front-to-back token consumer for one dispatch cycle.
#[derive(Debug, Clone)]
pub struct TokenQueue {
    raw: String,
    tokens: VecDeque<Token>,
}

impl TokenQueue {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            tokens: tokenize_spanned(raw).into(),
        }
    }

    pub fn pop(&mut self) -> Option<String> {
        self.tokens.pop_front().map(|token| token.text)
    }

    pub fn peek(&self) -> Option<&str> {
        self.tokens.front().map(|token| token.text.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Raw text of the line from the next unconsumed token onward, with the
    /// original quoting intact. Consumes every remaining token.
    pub fn take_rest_raw(&mut self) -> String {
        let rest = match self.tokens.front() {
            Some(token) => self.raw[token.offset..].trim().to_string(),
            None => String::new(),
        };
        self.tokens.clear();
        rest
    }

    /// Remaining tokens joined by single spaces. Consumes them.
    pub fn take_rest_joined(&mut self) -> String {
        self.tokens
            .drain(..)
            .map(|token| token.text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
