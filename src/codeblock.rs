//! Fenced code block extraction for `ai log`, using winnow 0.7.
//!
//! Scans text for triple-backtick regions. The word after the opening fence
//! picks the file suffix through a fixed table; unknown or missing tags
//! fall back to `.txt`. Unterminated fences are ignored.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use winnow::ascii::{line_ending, till_line_ending};
use winnow::combinator::{opt, preceded};
use winnow::error::ModalResult;
use winnow::prelude::*;
use winnow::token::take_until;

pub const FENCE: &str = "```";
pub const DEFAULT_SUFFIX: &str = "txt";

const LANGUAGE_SUFFIXES: &[(&str, &str)] = &[
    ("bash", "sh"),
    ("c", "c"),
    ("c#", "cs"),
    ("cpp", "cpp"),
    ("c++", "cpp"),
    ("csharp", "cs"),
    ("css", "css"),
    ("go", "go"),
    ("html", "html"),
    ("java", "java"),
    ("javascript", "js"),
    ("js", "js"),
    ("json", "json"),
    ("kotlin", "kt"),
    ("markdown", "md"),
    ("md", "md"),
    ("php", "php"),
    ("python", "py"),
    ("py", "py"),
    ("ruby", "rb"),
    ("rust", "rs"),
    ("rs", "rs"),
    ("sh", "sh"),
    ("shell", "sh"),
    ("sql", "sql"),
    ("swift", "swift"),
    ("toml", "toml"),
    ("ts", "ts"),
    ("typescript", "ts"),
    ("xml", "xml"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("zsh", "sh"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
}

impl CodeBlock {
    pub fn suffix(&self) -> &'static str {
        self.language
            .as_deref()
            .map(suffix_for_language)
            .unwrap_or(DEFAULT_SUFFIX)
    }
}

pub fn suffix_for_language(language: &str) -> &'static str {
    let wanted = language.trim().to_ascii_lowercase();
    LANGUAGE_SUFFIXES
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, suffix)| *suffix)
        .unwrap_or(DEFAULT_SUFFIX)
}

fn skip_to_fence<'a>(i: &mut &'a str) -> ModalResult<&'a str> {
    take_until(0.., FENCE).parse_next(i)
}

/// `(info string, body)` of one complete fenced region.
fn fenced_region<'a>(i: &mut &'a str) -> ModalResult<(&'a str, &'a str)> {
    (
        preceded(FENCE, till_line_ending),
        opt(line_ending),
        take_until(0.., FENCE),
        FENCE,
    )
        .map(|(info, _, body, _)| (info, body))
        .parse_next(i)
}

fn fenced_block(i: &mut &str) -> ModalResult<CodeBlock> {
    let (info, body) = fenced_region(i)?;
    let language = info
        .split_whitespace()
        .next()
        .map(|tag| tag.to_ascii_lowercase());
    Ok(CodeBlock {
        language,
        code: body.trim_end_matches(['\n', '\r']).to_string(),
    })
}

pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut input = text;
    let mut blocks = Vec::new();
    loop {
        if skip_to_fence(&mut input).is_err() {
            break;
        }
        let start = input;
        match fenced_block(&mut input) {
            Ok(block) => blocks.push(block),
            // unterminated: step past this fence and keep scanning
            Err(_) => input = &start[FENCE.len()..],
        }
    }
    blocks
}

/// Write each block to `<dir>/<stem>-<n>.<suffix>` and return the paths.
pub fn write_code_blocks(dir: &Path, stem: &str, blocks: &[CodeBlock]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create data directory '{}'", dir.display()))?;
    let mut written = Vec::with_capacity(blocks.len());
    for (index, block) in blocks.iter().enumerate() {
        let path = dir.join(format!("{stem}-{}.{}", index + 1, block.suffix()));
        std::fs::write(&path, format!("{}\n", block.code))
            .with_context(|| format!("failed to write code block '{}'", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
