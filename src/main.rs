use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;

use devtools_shell::cli::Cli;
use devtools_shell::config::{PreferencesSource, load_or_create_preferences, resolve_runtime_config};
use devtools_shell::console::StdConsole;
use devtools_shell::error::{categorize_error, format_cli_error};
use devtools_shell::repl::run_repl;
use devtools_shell::service::ReqwestTransport;
use devtools_shell::shell::Shell;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        let category = categorize_error(&err);
        eprintln!("{}", format_cli_error(&err));
        tracing::error!(category = %category.code(), error = %err, "devsh failed");
        std::process::exit(category.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_filter)?;
    let cfg = resolve_runtime_config(&cli)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let (prefs, source) = load_or_create_preferences(&cfg.preferences_path)?;
    tracing::info!(
        path = %cfg.preferences_path.display(),
        source = ?source,
        "preferences ready"
    );

    let transport = Arc::new(ReqwestTransport::new()?);
    let console = Box::new(StdConsole::new(prefs.text_speed, prefs.text_buffer));
    let mut shell = Shell::new(&cfg, prefs, transport, runtime.handle().clone(), console);
    if source == PreferencesSource::Recovered {
        shell.say("preferences file was unreadable; defaults restored");
    }

    shell.boot();
    run_repl(&mut shell)
}

fn init_tracing(log_filter: &str) -> Result<()> {
    let level = log_filter
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::WARN);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(log_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}
