pub mod cli;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod theme;
pub mod console;
pub mod tokenizer;
pub mod passthrough;
pub mod service;
pub mod conversation;
pub mod chat;
pub mod weather;
pub mod codeblock;
pub mod session;
pub mod commands;
pub mod shell;
pub mod repl;

#[cfg(test)]
mod tests;
